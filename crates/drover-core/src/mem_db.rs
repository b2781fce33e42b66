//! In-memory layer tables.
//!
//! Flattens layer trees into rows the way a database driver would store
//! them and serves them back through [`LayerDbDriver`].

use std::collections::BTreeMap;

use drover_proto::kind::LayerKind;
use drover_proto::name::{LayerId, ResourceName, SnapshotName, VolumeNumber};
use drover_proto::{DrError, DrResult};

use crate::keys::LayerOwner;
use crate::layer::{
    DrbdRscData, LayerTree, LayerVlms, LoadedVlms, RscDfnLayerMap, RscLayerData, VlmDfnLayerMap,
};
use crate::loader::{LayerDbDriver, LayerIdRow, RscDfnLayerRow, VlmDfnLayerRow};
use crate::objects::ResourceDefinition;

#[derive(Debug, Default)]
pub struct MemLayerDb {
    rows: Vec<LayerIdRow>,
    drbd: BTreeMap<LayerId, DrbdRscData>,
    vlms: BTreeMap<LayerId, LoadedVlms>,
    rsc_dfn_rows: Vec<RscDfnLayerRow>,
    vlm_dfn_rows: Vec<VlmDfnLayerRow>,
}

impl MemLayerDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows in storage order.
    pub fn rows_mut(&mut self) -> &mut Vec<LayerIdRow> {
        &mut self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Store one tree. Children are written before their parents.
    pub fn persist_tree(&mut self, tree: &LayerTree) {
        let (node_name, snap_name) = match tree.owner() {
            LayerOwner::Resource(key) => (key.node.clone(), None),
            LayerOwner::Snapshot(key) => (key.node.clone(), Some(key.snap.clone())),
        };
        let rsc_name = tree.owner().rsc_name().clone();

        for id in tree.breadth_first().into_iter().rev() {
            let Some(obj) = tree.get(id) else { continue };
            self.rows.push(LayerIdRow {
                id,
                parent_id: obj.parent(),
                kind: obj.kind(),
                suffix: obj.suffix.clone(),
                node_name: node_name.clone(),
                rsc_name: rsc_name.clone(),
                snap_name: snap_name.clone(),
                suspend_io: obj.suspend_io,
                ignore_reasons: obj.ignore_reasons,
            });
            if let RscLayerData::Drbd(drbd) = &obj.data {
                self.drbd.insert(
                    id,
                    DrbdRscData {
                        vlms: LayerVlms::default(),
                        ..drbd.clone()
                    },
                );
            }
            self.vlms.insert(id, obj.data.persisted_vlms());
        }
    }

    fn persist_dfn_layers(
        &mut self,
        rsc_name: &ResourceName,
        snap_name: Option<&SnapshotName>,
        rsc_data: &RscDfnLayerMap,
        vlm_data: impl Iterator<Item = (VolumeNumber, VlmDfnLayerMap)>,
    ) {
        for data in rsc_data.values() {
            self.rsc_dfn_rows.push(RscDfnLayerRow {
                rsc_name: rsc_name.clone(),
                snap_name: snap_name.cloned(),
                data: data.clone(),
            });
        }
        for (vlm_nr, map) in vlm_data {
            for data in map.into_values() {
                self.vlm_dfn_rows.push(VlmDfnLayerRow {
                    rsc_name: rsc_name.clone(),
                    snap_name: snap_name.cloned(),
                    vlm_nr,
                    data,
                });
            }
        }
    }

    /// Store the layer data of a resource definition, its resources, and its
    /// snapshots.
    pub fn persist_rsc_dfn(&mut self, dfn: &ResourceDefinition) {
        self.persist_dfn_layers(
            &dfn.name,
            None,
            &dfn.layer_data,
            dfn.vlm_dfns
                .iter()
                .map(|(nr, v)| (*nr, v.layer_data.clone())),
        );
        for rsc in dfn.resources.values() {
            self.persist_tree(&rsc.layer_tree);
        }
        for snap_dfn in dfn.snapshot_dfns.values() {
            self.persist_dfn_layers(
                &dfn.name,
                Some(&snap_dfn.name),
                &snap_dfn.layer_data,
                snap_dfn
                    .vlm_dfns
                    .iter()
                    .map(|(nr, v)| (*nr, v.layer_data.clone())),
            );
            for snap in snap_dfn.snapshots.values() {
                self.persist_tree(&snap.layer_tree);
            }
        }
    }
}

impl LayerDbDriver for MemLayerDb {
    fn load_all_layer_ids(&self) -> DrResult<Vec<LayerIdRow>> {
        Ok(self.rows.clone())
    }

    fn load_drbd_rsc_data(&self, id: LayerId) -> DrResult<DrbdRscData> {
        self.drbd
            .get(&id)
            .cloned()
            .ok_or_else(|| DrError::Database(format!("no DRBD data for layer object {}", id)))
    }

    fn load_vlm_data(&self, id: LayerId, kind: LayerKind) -> DrResult<LoadedVlms> {
        match self.vlms.get(&id) {
            Some(vlms) if vlms.kind() == kind => Ok(vlms.clone()),
            Some(vlms) => Err(DrError::Database(format!(
                "layer object {} stored {} volumes, expected {}",
                id,
                vlms.kind(),
                kind
            ))),
            None => Err(DrError::Database(format!(
                "no volume data for layer object {}",
                id
            ))),
        }
    }

    fn load_rsc_dfn_layer_data(&self) -> DrResult<Vec<RscDfnLayerRow>> {
        Ok(self.rsc_dfn_rows.clone())
    }

    fn load_vlm_dfn_layer_data(&self) -> DrResult<Vec<VlmDfnLayerRow>> {
        Ok(self.vlm_dfn_rows.clone())
    }
}
