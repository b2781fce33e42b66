//! Node changes and deletions.

use drover_core::keys::{ResourceKey, SnapshotKey, StorPoolKey};
use drover_core::objects::Node;
use drover_core::world::{NodesMap, WorldGuard};
use drover_proto::name::NodeName;
use drover_proto::pojo::NodePojo;
use drover_proto::{DrError, DrResult};

use super::ChangedKeys;

/// Create or update a node. Storage pools stay untouched.
pub fn merge_node(nodes: &mut NodesMap, pojo: &NodePojo) -> DrResult<()> {
    match nodes.get_mut(&pojo.name) {
        Some(node) => node.update_from(pojo),
        None => {
            nodes.insert(pojo.name.clone(), Node::from_pojo(pojo));
            Ok(())
        }
    }
}

pub fn apply_node(nodes: &mut NodesMap, pojo: &NodePojo) -> DrResult<ChangedKeys> {
    merge_node(nodes, pojo)?;
    let mut keys = ChangedKeys::default();
    keys.nodes.insert(pojo.name.clone());
    Ok(keys)
}

/// Remove a node together with its storage pools and every resource and
/// snapshot it hosts. Pool definitions no other node uses go too.
pub fn apply_node_deleted(guard: &mut WorldGuard<'_>, name: &NodeName) -> DrResult<ChangedKeys> {
    let mut keys = ChangedKeys::default();
    let (nodes, stor_pool_dfns) = guard.pools_mut()?;
    let node = nodes
        .remove(name)
        .ok_or_else(|| DrError::NotFound(format!("node {}", name)))?;
    keys.nodes.insert(name.clone());
    for pool in node.stor_pools.into_keys() {
        if !nodes.values().any(|n| n.stor_pools.contains_key(&pool)) {
            stor_pool_dfns.remove(&pool);
        }
        keys.stor_pools.insert(StorPoolKey::new(name.clone(), pool));
    }

    for dfn in guard.rsc_dfns_mut()?.values_mut() {
        if dfn.resources.remove(name).is_some() {
            keys.rscs.insert(ResourceKey::new(name.clone(), dfn.name.clone()));
        }
        for snap_dfn in dfn.snapshot_dfns.values_mut() {
            if snap_dfn.snapshots.remove(name).is_some() {
                keys.snapshots.insert(SnapshotKey::new(
                    name.clone(),
                    dfn.name.clone(),
                    snap_dfn.name.clone(),
                ));
            }
        }
    }
    Ok(keys)
}
