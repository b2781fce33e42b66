//! Per-kind apply handlers.
//!
//! Each [`StateChange`] variant declares the locks it needs through
//! [`lock_request`]; the sequencer takes them in the fixed global order and
//! hands the guard to [`apply_change`]. Handlers report the keys they
//! touched so device management can be notified after the commit.

pub mod ctrl;
pub mod full_sync;
pub mod node;
pub mod rsc;
pub mod snapshot;
pub mod storpool;

use std::collections::BTreeSet;

use drover_core::keys::{ResourceKey, SnapshotKey, StorPoolKey};
use drover_core::world::{LockMode, LockRequest, WorldGuard};
use drover_proto::name::NodeName;
use drover_proto::{DrResult, StateChange};

use crate::devmgr::DeviceManager;
use crate::state::StltState;

/// Entities changed by one applied update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedKeys {
    /// Set by a full sync that found the local node.
    pub full_sync: Option<NodeName>,
    pub nodes: BTreeSet<NodeName>,
    pub rscs: BTreeSet<ResourceKey>,
    pub stor_pools: BTreeSet<StorPoolKey>,
    pub snapshots: BTreeSet<SnapshotKey>,
    pub ctrl: bool,
}

impl ChangedKeys {
    pub fn is_empty(&self) -> bool {
        self.full_sync.is_none()
            && self.nodes.is_empty()
            && self.rscs.is_empty()
            && self.stor_pools.is_empty()
            && self.snapshots.is_empty()
            && !self.ctrl
    }

    pub fn merge(&mut self, other: ChangedKeys) {
        if other.full_sync.is_some() {
            self.full_sync = other.full_sync;
        }
        self.nodes.extend(other.nodes);
        self.rscs.extend(other.rscs);
        self.stor_pools.extend(other.stor_pools);
        self.snapshots.extend(other.snapshots);
        self.ctrl |= other.ctrl;
    }

    /// Forward the changes to device management.
    pub fn notify(&self, devmgr: &dyn DeviceManager) {
        if let Some(local) = &self.full_sync {
            devmgr.full_sync_applied(local);
            return;
        }
        if self.ctrl {
            devmgr.controller_update_applied();
        }
        if !self.nodes.is_empty() {
            devmgr.node_update_applied(&self.nodes);
        }
        if !self.stor_pools.is_empty() {
            devmgr.stor_pool_update_applied(&self.stor_pools);
        }
        if !self.rscs.is_empty() {
            devmgr.rsc_update_applied(&self.rscs);
        }
        if !self.snapshots.is_empty() {
            devmgr.snapshot_update_applied(&self.snapshots);
        }
    }
}

/// Locks needed to apply `change`.
pub fn lock_request(change: &StateChange) -> LockRequest {
    match change {
        StateChange::FullSync(_) => LockRequest {
            reconf: LockMode::Write,
            ..LockRequest::all_maps()
        },
        StateChange::ControllerConfig { .. } => LockRequest::reconf_write(),
        StateChange::Node(_) => LockRequest::read().nodes(),
        StateChange::NodeDeleted { .. } => LockRequest::read().nodes().rsc_dfns().stor_pool_dfns(),
        // Peer resources may materialize nodes and remote storage pools.
        StateChange::Resource(_) | StateChange::Snapshot(_) | StateChange::CryptKey { .. } => {
            LockRequest::all_maps()
        }
        StateChange::ResourceDeleted { .. } | StateChange::SnapshotEnded { .. } => {
            LockRequest::read().rsc_dfns()
        }
        StateChange::StorPool(_) | StateChange::StorPoolDeleted { .. } => {
            LockRequest::read().nodes().stor_pool_dfns()
        }
    }
}

/// Apply one change under the locks of `guard`, which must cover
/// [`lock_request`] for it.
pub fn apply_change(
    guard: &mut WorldGuard<'_>,
    stlt: &StltState,
    change: StateChange,
) -> DrResult<ChangedKeys> {
    match change {
        StateChange::FullSync(data) => full_sync::apply_full_sync(guard, stlt, *data),
        StateChange::Node(pojo) => node::apply_node(guard.nodes_mut()?, &pojo),
        StateChange::NodeDeleted { name } => node::apply_node_deleted(guard, &name),
        StateChange::Resource(pojo) => rsc::apply_rsc(&mut guard.parts_mut()?, &pojo),
        StateChange::ResourceDeleted { name } => {
            rsc::apply_rsc_deleted(guard.rsc_dfns_mut()?, &name)
        }
        StateChange::StorPool(pojo) => storpool::apply_stor_pool(guard, &pojo),
        StateChange::StorPoolDeleted { name } => storpool::apply_stor_pool_deleted(guard, &name),
        StateChange::Snapshot(pojo) => snapshot::apply_snapshot(&mut guard.parts_mut()?, &pojo),
        StateChange::SnapshotEnded {
            rsc_name,
            snapshot_name,
        } => snapshot::apply_snapshot_ended(guard.rsc_dfns_mut()?, &rsc_name, &snapshot_name),
        StateChange::ControllerConfig { props } => ctrl::apply_ctrl_config(guard, &props),
        StateChange::CryptKey { master_key } => {
            ctrl::apply_crypt_key(&mut guard.parts_mut()?, stlt, master_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_proto::name::ResourceName;
    use drover_proto::pojo::PropsMap;

    #[test]
    fn test_only_reconfiguring_changes_take_reconf_write() {
        let full = StateChange::FullSync(Box::default());
        let ctrl = StateChange::ControllerConfig {
            props: PropsMap::new(),
        };
        let del = StateChange::ResourceDeleted {
            name: ResourceName::new("r0").unwrap(),
        };
        assert_eq!(lock_request(&full).reconf, LockMode::Write);
        assert_eq!(lock_request(&ctrl).reconf, LockMode::Write);
        assert_eq!(lock_request(&del).reconf, LockMode::Read);
        assert!(lock_request(&del).rsc_dfns);
        assert!(!lock_request(&del).nodes);
        assert!(lock_request(&full).nodes && lock_request(&full).stor_pool_dfns);
    }
}
