//! Controller-to-satellite messages.
//!
//! Every state change the controller pushes is wrapped in an [`ApplyData`]
//! tagged with the epoch (`full_sync_id`) it was produced under and its
//! position within that epoch (`update_id`).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::name::{NodeName, ResourceName, SnapshotName, StorPoolName};
use crate::pojo::{FullSyncData, NodePojo, PropsMap, RscPojo, SnapshotPojo, StorPoolPojo};

/// A sequenced state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyData {
    pub full_sync_id: u64,
    pub update_id: u64,
    pub change: StateChange,
}

impl ApplyData {
    pub fn new(full_sync_id: u64, update_id: u64, change: StateChange) -> Self {
        Self {
            full_sync_id,
            update_id,
            change,
        }
    }
}

/// What a sequenced message changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    FullSync(Box<FullSyncData>),
    Node(NodePojo),
    NodeDeleted { name: NodeName },
    Resource(Box<RscPojo>),
    ResourceDeleted { name: ResourceName },
    StorPool(StorPoolPojo),
    StorPoolDeleted { name: StorPoolName },
    Snapshot(Box<SnapshotPojo>),
    SnapshotEnded {
        rsc_name: ResourceName,
        snapshot_name: SnapshotName,
    },
    ControllerConfig { props: PropsMap },
    CryptKey { master_key: Vec<u8> },
}

impl StateChange {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            StateChange::FullSync(_) => "full sync",
            StateChange::Node(_) => "node",
            StateChange::NodeDeleted { .. } => "node deletion",
            StateChange::Resource(_) => "resource",
            StateChange::ResourceDeleted { .. } => "resource deletion",
            StateChange::StorPool(_) => "storage pool",
            StateChange::StorPoolDeleted { .. } => "storage pool deletion",
            StateChange::Snapshot(_) => "snapshot",
            StateChange::SnapshotEnded { .. } => "snapshot end",
            StateChange::ControllerConfig { .. } => "controller config",
            StateChange::CryptKey { .. } => "crypt key",
        }
    }
}

impl fmt::Display for ApplyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (full sync {}, update {})",
            self.change.label(),
            self.full_sync_id,
            self.update_id
        )
    }
}

/// Sent by the controller when it (re)connects. Resets the satellite's epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub node_uuid: Uuid,
    pub node_name: NodeName,
    pub ctrl_uuid: Uuid,
    pub full_sync_id: u64,
}

/// One frame on the controller link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CtrlFrame {
    Authenticate(AuthRequest),
    Apply(ApplyData),
}

/// Outcome of applying a full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FullSyncStatus {
    Success,
    FailUnknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_codec() {
        let frame = CtrlFrame::Apply(ApplyData::new(
            5,
            1,
            StateChange::ResourceDeleted {
                name: ResourceName::new("r0").unwrap(),
            },
        ));
        let bytes = bincode::serialize(&frame).unwrap();
        let decoded: CtrlFrame = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_display() {
        let data = ApplyData::new(
            7,
            3,
            StateChange::ControllerConfig {
                props: PropsMap::new(),
            },
        );
        assert_eq!(data.to_string(), "controller config (full sync 7, update 3)");
    }
}
