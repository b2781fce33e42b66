//! Storage pool changes and deletions on the local node.

use drover_core::keys::StorPoolKey;
use drover_core::objects::{StoragePool, StorPoolDefinition};
use drover_core::world::{NodesMap, StorPoolDfnMap, WorldGuard};
use drover_proto::name::StorPoolName;
use drover_proto::pojo::StorPoolPojo;
use drover_proto::{DrError, DrResult};

use super::ChangedKeys;

/// Create or update a pool definition and the pool on its node.
pub fn merge_stor_pool(
    nodes: &mut NodesMap,
    stor_pool_dfns: &mut StorPoolDfnMap,
    pojo: &StorPoolPojo,
) -> DrResult<StorPoolKey> {
    let node = nodes.get_mut(&pojo.node_name).ok_or_else(|| {
        DrError::implementation(format!(
            "storage pool {} received for unknown node {}",
            pojo.name, pojo.node_name
        ))
    })?;

    match stor_pool_dfns.get_mut(&pojo.name) {
        Some(dfn) => dfn.update_from(pojo)?,
        None => {
            stor_pool_dfns.insert(pojo.name.clone(), StorPoolDefinition::from_pojo(pojo));
        }
    }
    match node.stor_pools.get_mut(&pojo.name) {
        Some(pool) => pool.update_from(pojo)?,
        None => {
            node.stor_pools
                .insert(pojo.name.clone(), StoragePool::from_pojo(pojo));
        }
    }
    Ok(StorPoolKey::new(pojo.node_name.clone(), pojo.name.clone()))
}

pub fn apply_stor_pool(guard: &mut WorldGuard<'_>, pojo: &StorPoolPojo) -> DrResult<ChangedKeys> {
    let (nodes, stor_pool_dfns) = guard.pools_mut()?;
    let key = merge_stor_pool(nodes, stor_pool_dfns, pojo)?;
    let mut keys = ChangedKeys::default();
    keys.stor_pools.insert(key);
    Ok(keys)
}

/// Remove the local node's pool. The definition goes too once no node
/// has a pool of that name.
pub fn apply_stor_pool_deleted(
    guard: &mut WorldGuard<'_>,
    name: &StorPoolName,
) -> DrResult<ChangedKeys> {
    let mut keys = ChangedKeys::default();
    let local = guard
        .conf()
        .local_node
        .clone()
        .ok_or_else(|| DrError::implementation("local node not bound"))?;
    let (nodes, stor_pool_dfns) = guard.pools_mut()?;

    nodes
        .get_mut(&local)
        .and_then(|node| node.stor_pools.remove(name))
        .ok_or_else(|| DrError::NotFound(format!("storage pool {} on {}", name, local)))?;
    if !nodes.values().any(|n| n.stor_pools.contains_key(name)) {
        stor_pool_dfns.remove(name);
    }
    keys.stor_pools.insert(StorPoolKey::new(local, name.clone()));
    Ok(keys)
}
