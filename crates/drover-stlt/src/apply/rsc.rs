//! Resource changes and deletions.
//!
//! A resource change carries the resource definition, the local resource
//! and every peer's replica of it. Peers and their nodes are materialized as
//! needed so the layer trees of all replicas can be merged.

use std::collections::btree_map::Entry;

use tracing::debug;

use drover_core::keys::{ResourceKey, SnapshotKey};
use drover_core::merge::merge_rsc_layers;
use drover_core::objects::{Resource, ResourceDefinition};
use drover_core::world::{RscDfnMap, WorldParts};
use drover_proto::name::{NodeName, ResourceName};
use drover_proto::pojo::{RscDfnPojo, RscPojo};
use drover_proto::{DrError, DrResult};

use super::node::merge_node;
use super::ChangedKeys;

fn dfn_mut<'a>(
    rsc_dfns: &'a mut RscDfnMap,
    name: &ResourceName,
) -> DrResult<&'a mut ResourceDefinition> {
    rsc_dfns
        .get_mut(name)
        .ok_or_else(|| DrError::implementation(format!("resource definition {} vanished", name)))
}

/// Create or update a resource definition without its volume definitions.
pub fn merge_rsc_dfn(rsc_dfns: &mut RscDfnMap, pojo: &RscDfnPojo) -> DrResult<()> {
    match rsc_dfns.get_mut(&pojo.name) {
        Some(dfn) => dfn.update_from(pojo),
        None => {
            rsc_dfns.insert(pojo.name.clone(), ResourceDefinition::from_pojo(pojo));
            Ok(())
        }
    }
}

pub fn apply_rsc(parts: &mut WorldParts<'_>, pojo: &RscPojo) -> DrResult<ChangedKeys> {
    let local = parts
        .conf
        .local_node
        .clone()
        .ok_or_else(|| DrError::implementation("local node not bound"))?;
    if pojo.local.node_name != local {
        return Err(DrError::implementation(format!(
            "local resource {} received for node {}",
            pojo.rsc_dfn.name, pojo.local.node_name
        )));
    }
    let name = pojo.rsc_dfn.name.clone();
    let mut keys = ChangedKeys::default();

    merge_rsc_dfn(&mut *parts.rsc_dfns, &pojo.rsc_dfn)?;
    let removed = dfn_mut(&mut *parts.rsc_dfns, &name)?.merge_vlm_dfns(&pojo.rsc_dfn.vlm_dfns)?;
    for nr in removed {
        debug!("volume definition {}/{} removed", name, nr);
    }

    for other in &pojo.others {
        merge_node(&mut *parts.nodes, &other.node)?;
    }

    let instances = std::iter::once((&pojo.local, false))
        .chain(pojo.others.iter().map(|other| (&other.rsc, true)));
    for (inst, remote) in instances {
        let key = ResourceKey::new(inst.node_name.clone(), name.clone());
        {
            let ResourceDefinition {
                resources,
                vlm_dfns,
                ..
            } = dfn_mut(&mut *parts.rsc_dfns, &name)?;
            let rsc = match resources.entry(inst.node_name.clone()) {
                Entry::Occupied(entry) => {
                    let rsc = entry.into_mut();
                    rsc.update_from(inst)?;
                    rsc
                }
                Entry::Vacant(entry) => entry.insert(Resource::from_pojo(&name, inst)),
            };
            rsc.merge_volumes(vlm_dfns, &inst.vlms)?;
        }
        if let Some(layer) = &inst.layer {
            let materialized = merge_rsc_layers(parts, &key, layer, remote)?;
            keys.stor_pools.extend(materialized);
        }
        keys.rscs.insert(key);
    }

    let dfn = dfn_mut(&mut *parts.rsc_dfns, &name)?;
    let stale: Vec<NodeName> = dfn
        .resources
        .keys()
        .filter(|node| !keys.rscs.contains(&ResourceKey::new((*node).clone(), name.clone())))
        .cloned()
        .collect();
    for node in stale {
        debug!("resource {}/{} no longer deployed", node, name);
        dfn.resources.remove(&node);
        keys.rscs.insert(ResourceKey::new(node, name.clone()));
    }
    Ok(keys)
}

/// Remove a resource definition with all of its resources and snapshots.
pub fn apply_rsc_deleted(rsc_dfns: &mut RscDfnMap, name: &ResourceName) -> DrResult<ChangedKeys> {
    let mut keys = ChangedKeys::default();
    let dfn = rsc_dfns
        .remove(name)
        .ok_or_else(|| DrError::NotFound(format!("resource definition {}", name)))?;
    for node in dfn.resources.into_keys() {
        keys.rscs.insert(ResourceKey::new(node, name.clone()));
    }
    for (snap_name, snap_dfn) in dfn.snapshot_dfns {
        for node in snap_dfn.snapshots.into_keys() {
            keys.snapshots
                .insert(SnapshotKey::new(node, name.clone(), snap_name.clone()));
        }
    }
    Ok(keys)
}
