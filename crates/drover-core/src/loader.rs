//! Persistence-path layer tree reconstruction.
//!
//! The database stores layer objects as flat rows, each naming its parent
//! by id. Rows come back in no particular order, so trees are rebuilt level
//! by level: the first pass builds every row without a parent, and every
//! further pass builds the rows whose parent was built in the pass before.
//! The number of passes equals the depth of the deepest tree. Volume-layer
//! data is loaded once every resource-layer object exists.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use drover_proto::flags::IgnoreReasons;
use drover_proto::kind::LayerKind;
use drover_proto::name::{LayerId, NodeName, ResourceName, RscSuffix, SnapshotName, VolumeNumber};
use drover_proto::{DrError, DrResult};

use crate::keys::{LayerOwner, ResourceKey, SnapshotKey};
use crate::layer::{
    check_tree, DrbdRscData, LayerTree, LoadedVlms, RscDfnLayerData, RscDfnLayerMap,
    RscLayerData, RscLayerObject, VlmDfnLayerData, VlmDfnLayerMap,
};
use crate::world::RscDfnMap;

/// One persisted resource-layer object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerIdRow {
    pub id: LayerId,
    pub parent_id: Option<LayerId>,
    pub kind: LayerKind,
    pub suffix: RscSuffix,
    pub node_name: NodeName,
    pub rsc_name: ResourceName,
    pub snap_name: Option<SnapshotName>,
    pub suspend_io: bool,
    pub ignore_reasons: IgnoreReasons,
}

impl LayerIdRow {
    pub fn owner(&self) -> LayerOwner {
        match &self.snap_name {
            None => LayerOwner::Resource(ResourceKey::new(
                self.node_name.clone(),
                self.rsc_name.clone(),
            )),
            Some(snap) => LayerOwner::Snapshot(SnapshotKey::new(
                self.node_name.clone(),
                self.rsc_name.clone(),
                snap.clone(),
            )),
        }
    }
}

/// Definition-level layer data row. `snap_name` is set for data of a
/// snapshot definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RscDfnLayerRow {
    pub rsc_name: ResourceName,
    pub snap_name: Option<SnapshotName>,
    pub data: RscDfnLayerData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlmDfnLayerRow {
    pub rsc_name: ResourceName,
    pub snap_name: Option<SnapshotName>,
    pub vlm_nr: VolumeNumber,
    pub data: VlmDfnLayerData,
}

/// Layer tables of the persistence collaborator.
pub trait LayerDbDriver {
    /// Every resource-layer object row, in any order.
    fn load_all_layer_ids(&self) -> DrResult<Vec<LayerIdRow>>;

    /// Resource-level DRBD attributes of one object, without volumes.
    fn load_drbd_rsc_data(&self, id: LayerId) -> DrResult<DrbdRscData>;

    /// Volume-layer objects of one resource-layer object.
    fn load_vlm_data(&self, id: LayerId, kind: LayerKind) -> DrResult<LoadedVlms>;

    fn load_rsc_dfn_layer_data(&self) -> DrResult<Vec<RscDfnLayerRow>>;

    fn load_vlm_dfn_layer_data(&self) -> DrResult<Vec<VlmDfnLayerRow>>;
}

/// Rebuilt trees by owner, and the number of breadth-first passes it took.
#[derive(Debug)]
pub struct LoadedTrees {
    pub trees: BTreeMap<LayerOwner, LayerTree>,
    pub passes: usize,
}

fn db_err(e: DrError) -> DrError {
    match e {
        DrError::Database(_) => e,
        other => DrError::Database(other.to_string()),
    }
}

/// Build one resource-layer object, dispatching on its kind.
fn load_rsc_object(
    driver: &dyn LayerDbDriver,
    row: &LayerIdRow,
    parent: Option<&RscLayerObject>,
) -> DrResult<RscLayerObject> {
    if let Some(parent) = parent {
        trace!("loading layer object {} below {} ({})", row.id, parent.id, parent.kind());
    }
    let data = match row.kind {
        LayerKind::Drbd => {
            let drbd = driver.load_drbd_rsc_data(row.id)?;
            if !drbd.vlms.is_empty() {
                return Err(DrError::Database(format!(
                    "DRBD data of layer object {} loaded with volumes",
                    row.id
                )));
            }
            RscLayerData::Drbd(drbd)
        }
        LayerKind::Luks | LayerKind::Nvme | LayerKind::Storage | LayerKind::Writecache => {
            RscLayerData::empty(row.kind)?
        }
    };
    let mut obj = RscLayerObject::new(row.id, row.suffix.clone(), row.owner(), data);
    obj.suspend_io = row.suspend_io;
    obj.ignore_reasons.reset_to(row.ignore_reasons);
    Ok(obj)
}

/// Rebuild every layer tree from the flat rows of `driver`.
pub fn reconstruct(driver: &dyn LayerDbDriver) -> DrResult<LoadedTrees> {
    let mut pending = driver.load_all_layer_ids()?;

    let mut seen = BTreeSet::new();
    for row in &pending {
        if !seen.insert(row.id) {
            return Err(DrError::Database(format!("duplicate layer id {}", row.id)));
        }
    }

    let mut trees: BTreeMap<LayerOwner, LayerTree> = BTreeMap::new();
    let mut frontier: BTreeSet<LayerId> = BTreeSet::new();
    let mut passes = 0;
    loop {
        let first = passes == 0;
        let (selected, rest): (Vec<LayerIdRow>, Vec<LayerIdRow>) =
            pending.into_iter().partition(|row| match row.parent_id {
                None => first,
                Some(pid) => frontier.contains(&pid),
            });
        pending = rest;
        if selected.is_empty() {
            break;
        }
        passes += 1;

        let mut next = BTreeSet::new();
        for row in selected {
            let owner = row.owner();
            let tree = trees
                .entry(owner.clone())
                .or_insert_with(|| LayerTree::new(owner.clone()));
            let parent = match row.parent_id {
                Some(pid) => Some(tree.get(pid).ok_or_else(|| {
                    DrError::Database(format!(
                        "layer object {} of {} has parent {} of another owner",
                        row.id, owner, pid
                    ))
                })?),
                None => None,
            };
            let obj = load_rsc_object(driver, &row, parent)?;
            tree.insert(obj, row.parent_id).map_err(db_err)?;
            next.insert(row.id);
        }
        debug!("layer reconstruction pass {}: {} objects", passes, next.len());
        frontier = next;
    }

    if let Some(orphan) = pending.first() {
        return Err(DrError::Database(format!(
            "{} layer objects unreachable, e.g. {} with missing parent {}",
            pending.len(),
            orphan.id,
            orphan
                .parent_id
                .map_or_else(|| "-".to_string(), |p| p.to_string())
        )));
    }

    for tree in trees.values_mut() {
        for id in tree.breadth_first() {
            let kind = match tree.get(id) {
                Some(obj) => obj.kind(),
                None => continue,
            };
            let vlms = driver.load_vlm_data(id, kind)?;
            if let Some(obj) = tree.get_mut(id) {
                obj.data.attach_vlms(vlms).map_err(db_err)?;
            }
        }
        check_tree(tree).map_err(db_err)?;
    }

    Ok(LoadedTrees { trees, passes })
}

fn rsc_dfn_layer_map<'a>(
    rsc_dfns: &'a mut RscDfnMap,
    rsc: &ResourceName,
    snap: Option<&SnapshotName>,
) -> DrResult<&'a mut RscDfnLayerMap> {
    let dfn = rsc_dfns
        .get_mut(rsc)
        .ok_or_else(|| DrError::Database(format!("layer data for unknown resource {}", rsc)))?;
    match snap {
        None => Ok(&mut dfn.layer_data),
        Some(snap) => dfn
            .snapshot_dfns
            .get_mut(snap)
            .map(|s| &mut s.layer_data)
            .ok_or_else(|| {
                DrError::Database(format!("layer data for unknown snapshot {}@{}", rsc, snap))
            }),
    }
}

fn vlm_dfn_layer_map<'a>(
    rsc_dfns: &'a mut RscDfnMap,
    rsc: &ResourceName,
    snap: Option<&SnapshotName>,
    vlm_nr: VolumeNumber,
) -> DrResult<&'a mut VlmDfnLayerMap> {
    let missing = || DrError::Database(format!("layer data for unknown volume {}/{}", rsc, vlm_nr));
    let dfn = rsc_dfns.get_mut(rsc).ok_or_else(missing)?;
    match snap {
        None => dfn
            .vlm_dfns
            .get_mut(&vlm_nr)
            .map(|v| &mut v.layer_data)
            .ok_or_else(missing),
        Some(snap) => dfn
            .snapshot_dfns
            .get_mut(snap)
            .and_then(|s| s.vlm_dfns.get_mut(&vlm_nr))
            .map(|v| &mut v.layer_data)
            .ok_or_else(missing),
    }
}

/// Load definition-level data and every layer tree into `rsc_dfns`, whose
/// resources and snapshots must already exist. Returns the number of
/// reconstruction passes.
pub fn load_layer_data(driver: &dyn LayerDbDriver, rsc_dfns: &mut RscDfnMap) -> DrResult<usize> {
    for row in driver.load_rsc_dfn_layer_data()? {
        let map = rsc_dfn_layer_map(rsc_dfns, &row.rsc_name, row.snap_name.as_ref())?;
        if map.insert(row.data.key(), row.data).is_some() {
            return Err(DrError::Database(format!(
                "duplicate definition layer data for {}",
                row.rsc_name
            )));
        }
    }
    for row in driver.load_vlm_dfn_layer_data()? {
        let map = vlm_dfn_layer_map(rsc_dfns, &row.rsc_name, row.snap_name.as_ref(), row.vlm_nr)?;
        if map.insert(row.data.key(), row.data).is_some() {
            return Err(DrError::Database(format!(
                "duplicate volume definition layer data for {}/{}",
                row.rsc_name, row.vlm_nr
            )));
        }
    }

    let loaded = reconstruct(driver)?;
    for (owner, tree) in loaded.trees {
        let unknown = || DrError::Database(format!("layer data for unknown {}", owner));
        let dfn = rsc_dfns.get_mut(owner.rsc_name()).ok_or_else(unknown)?;
        let slot = match &owner {
            LayerOwner::Resource(key) => dfn
                .resources
                .get_mut(&key.node)
                .map(|r| &mut r.layer_tree)
                .ok_or_else(unknown)?,
            LayerOwner::Snapshot(key) => dfn
                .snapshot_dfns
                .get_mut(&key.snap)
                .and_then(|s| s.snapshots.get_mut(&key.node))
                .map(|s| &mut s.layer_tree)
                .ok_or_else(unknown)?,
        };
        *slot = tree;
    }
    Ok(loaded.passes)
}
