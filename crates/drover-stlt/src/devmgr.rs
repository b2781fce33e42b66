//! Device-management collaborator.
//!
//! Reconciliation of the replicated state against the host's devices runs
//! elsewhere. The sequencer only tells it which entities changed after an
//! update has been applied and committed.

use std::collections::BTreeSet;

use tracing::{debug, info};

use drover_core::keys::{ResourceKey, SnapshotKey, StorPoolKey};
use drover_proto::name::NodeName;

pub trait DeviceManager: Send + Sync {
    /// A coherent view of the cluster exists for the first time in this
    /// epoch.
    fn full_sync_applied(&self, local_node: &NodeName);

    fn node_update_applied(&self, nodes: &BTreeSet<NodeName>);

    fn rsc_update_applied(&self, rscs: &BTreeSet<ResourceKey>);

    fn stor_pool_update_applied(&self, pools: &BTreeSet<StorPoolKey>);

    fn snapshot_update_applied(&self, snapshots: &BTreeSet<SnapshotKey>);

    fn controller_update_applied(&self);

    /// Stop waiting for update notifications that will not arrive.
    fn force_wake_update_notifications(&self);
}

/// Device manager that only logs what it is told.
#[derive(Debug, Default)]
pub struct LoggingDeviceManager;

impl DeviceManager for LoggingDeviceManager {
    fn full_sync_applied(&self, local_node: &NodeName) {
        info!("full sync applied for local node {}", local_node);
    }

    fn node_update_applied(&self, nodes: &BTreeSet<NodeName>) {
        for node in nodes {
            debug!("node {} changed", node);
        }
    }

    fn rsc_update_applied(&self, rscs: &BTreeSet<ResourceKey>) {
        for rsc in rscs {
            debug!("resource {} changed", rsc);
        }
    }

    fn stor_pool_update_applied(&self, pools: &BTreeSet<StorPoolKey>) {
        for pool in pools {
            debug!("storage pool {} changed", pool);
        }
    }

    fn snapshot_update_applied(&self, snapshots: &BTreeSet<SnapshotKey>) {
        for snap in snapshots {
            debug!("snapshot {} changed", snap);
        }
    }

    fn controller_update_applied(&self) {
        debug!("controller properties changed");
    }

    fn force_wake_update_notifications(&self) {
        debug!("update notifications woken");
    }
}
