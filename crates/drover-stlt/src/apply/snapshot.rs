//! Snapshot changes and ended snapshots.

use std::collections::btree_map::Entry;

use drover_core::keys::SnapshotKey;
use drover_core::merge::merge_snapshot_layers;
use drover_core::objects::{check_uuid, Snapshot, SnapshotDefinition};
use drover_core::world::{RscDfnMap, WorldParts};
use drover_proto::name::{ResourceName, SnapshotName};
use drover_proto::pojo::SnapshotPojo;
use drover_proto::{DrError, DrResult};

use super::rsc::merge_rsc_dfn;
use super::ChangedKeys;

pub fn apply_snapshot(parts: &mut WorldParts<'_>, pojo: &SnapshotPojo) -> DrResult<ChangedKeys> {
    let rsc_name = pojo.rsc_dfn.name.clone();
    let snap_name = pojo.snap_dfn.name.clone();
    let key = SnapshotKey::new(pojo.node_name.clone(), rsc_name.clone(), snap_name.clone());

    merge_rsc_dfn(&mut *parts.rsc_dfns, &pojo.rsc_dfn)?;
    {
        let rsc_dfn = parts.rsc_dfns.get_mut(&rsc_name).ok_or_else(|| {
            DrError::implementation(format!("resource definition {} vanished", rsc_name))
        })?;
        let snap_dfn = match rsc_dfn.snapshot_dfns.entry(snap_name.clone()) {
            Entry::Occupied(entry) => {
                let snap_dfn = entry.into_mut();
                snap_dfn.update_from(&pojo.snap_dfn)?;
                snap_dfn
            }
            Entry::Vacant(entry) => {
                entry.insert(SnapshotDefinition::from_pojo(&rsc_name, &pojo.snap_dfn))
            }
        };
        snap_dfn.merge_vlm_dfns(&pojo.snap_dfn.vlm_dfns)?;

        let SnapshotDefinition {
            snapshots,
            vlm_dfns,
            ..
        } = snap_dfn;
        let snap = match snapshots.entry(pojo.node_name.clone()) {
            Entry::Occupied(entry) => {
                let snap = entry.into_mut();
                check_uuid("snapshot", &key.to_string(), snap.uuid, pojo.uuid)?;
                snap.flags.reset_to(pojo.flags);
                snap
            }
            Entry::Vacant(entry) => entry.insert(Snapshot::new(pojo.uuid, key.clone(), pojo.flags)),
        };
        snap.props.sync_from(&pojo.props);
        snap.merge_volumes(vlm_dfns, &pojo.vlms)?;
    }

    if let Some(layer) = &pojo.layer {
        merge_snapshot_layers(parts, &key, layer)?;
    }

    let mut keys = ChangedKeys::default();
    keys.snapshots.insert(key);
    Ok(keys)
}

/// Drop a snapshot definition the controller no longer tracks.
pub fn apply_snapshot_ended(
    rsc_dfns: &mut RscDfnMap,
    rsc_name: &ResourceName,
    snap_name: &SnapshotName,
) -> DrResult<ChangedKeys> {
    let mut keys = ChangedKeys::default();
    let snap_dfn = rsc_dfns
        .get_mut(rsc_name)
        .and_then(|dfn| dfn.snapshot_dfns.remove(snap_name))
        .ok_or_else(|| DrError::NotFound(format!("snapshot {}@{}", rsc_name, snap_name)))?;
    for node in snap_dfn.snapshots.into_keys() {
        keys.snapshots
            .insert(SnapshotKey::new(node, rsc_name.clone(), snap_name.clone()));
    }
    Ok(keys)
}
