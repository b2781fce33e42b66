//! Full synchronization: replace the whole replica.

use tracing::{info, warn};

use drover_core::world::WorldGuard;
use drover_proto::pojo::FullSyncData;
use drover_proto::DrResult;

use super::ctrl::{invalidate_luks_passwords, sync_ctrl_props};
use super::node::merge_node;
use super::rsc::apply_rsc;
use super::snapshot::apply_snapshot;
use super::storpool::merge_stor_pool;
use super::ChangedKeys;
use crate::state::StltState;

/// Clear every map and rebuild it from `data`: nodes, controller
/// properties, storage pools, resources, snapshots. Needs every lock,
/// the reconfiguration lock in write mode.
pub fn apply_full_sync(
    guard: &mut WorldGuard<'_>,
    stlt: &StltState,
    data: FullSyncData,
) -> DrResult<ChangedKeys> {
    sync_ctrl_props(guard.conf_mut()?, &data.ctrl_props);

    let mut parts = guard.parts_mut()?;
    parts.nodes.clear();
    parts.rsc_dfns.clear();
    parts.stor_pool_dfns.clear();

    for node in &data.nodes {
        merge_node(&mut *parts.nodes, node)?;
    }
    let local = parts
        .conf
        .local_node
        .clone()
        .filter(|name| parts.nodes.contains_key(name));
    if local.is_none() {
        warn!("no node object that represents this satellite was received from the controller");
    }

    for pool in &data.stor_pools {
        merge_stor_pool(&mut *parts.nodes, &mut *parts.stor_pool_dfns, pool)?;
    }
    for rsc in &data.rscs {
        apply_rsc(&mut parts, rsc)?;
    }
    for snap in &data.snapshots {
        apply_snapshot(&mut parts, snap)?;
    }

    if let Some(key) = data.master_key {
        stlt.set_master_key(key);
        invalidate_luks_passwords(&mut *parts.rsc_dfns, local.as_ref());
    }

    info!(
        "full sync: {} nodes, {} storage pools, {} resources, {} snapshots",
        data.nodes.len(),
        data.stor_pools.len(),
        data.rscs.len(),
        data.snapshots.len()
    );
    Ok(ChangedKeys {
        full_sync: local,
        ..ChangedKeys::default()
    })
}
