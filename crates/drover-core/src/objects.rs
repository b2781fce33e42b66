//! World entities.
//!
//! Ownership follows the natural containment of the cluster model: a node
//! owns its storage pools, a resource definition owns its volume
//! definitions, its per-node resources and its snapshot definitions, and
//! every resource or snapshot owns its layer tree. Cross references
//! (a volume's storage pool, a resource's node) are held as keys.
//!
//! Each entity carries an immutable uuid. Updating an entity from a received
//! description first checks that the uuids agree.

use std::collections::BTreeMap;

use uuid::Uuid;

use drover_proto::flags::{
    NodeFlags, RscDfnFlags, RscFlags, SnapshotDfnFlags, SnapshotFlags, StorPoolDfnFlags,
    VlmDfnFlags, VlmFlags,
};
use drover_proto::kind::{LayerKind, NodeType, ProviderKind};
use drover_proto::name::{NodeName, ResourceName, SnapshotName, StorPoolName, VolumeNumber};
use drover_proto::pojo::{
    NodePojo, RscDfnPojo, RscInstancePojo, SnapshotDfnPojo, SnapshotVlmDfnPojo, SnapshotVlmPojo,
    StorPoolPojo, VlmDfnPojo, VlmPojo,
};
use drover_proto::{DrError, DrResult};

use crate::keys::{LayerOwner, ResourceKey, SnapshotKey};
use crate::layer::{LayerTree, RscDfnLayerMap, VlmDfnLayerMap};
use crate::props::Props;

/// Fail with an identity divergence unless `local` and `remote` agree.
pub fn check_uuid(kind: &str, name: &str, local: Uuid, remote: Uuid) -> DrResult<()> {
    if local != remote {
        return Err(DrError::divergent(kind, name, local, remote));
    }
    Ok(())
}

// ─── Nodes and storage pools ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub uuid: Uuid,
    pub name: NodeName,
    pub node_type: NodeType,
    pub flags: NodeFlags,
    pub props: Props,
    pub stor_pools: BTreeMap<StorPoolName, StoragePool>,
}

impl Node {
    pub fn from_pojo(pojo: &NodePojo) -> Self {
        Self {
            uuid: pojo.uuid,
            name: pojo.name.clone(),
            node_type: pojo.node_type,
            flags: NodeFlags::from_bits_truncate(pojo.flags.bits()),
            props: Props::from_map(&pojo.props),
            stor_pools: BTreeMap::new(),
        }
    }

    pub fn update_from(&mut self, pojo: &NodePojo) -> DrResult<()> {
        check_uuid("node", self.name.as_str(), self.uuid, pojo.uuid)?;
        self.node_type = pojo.node_type;
        self.flags.reset_to(pojo.flags);
        self.props.sync_from(&pojo.props);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorPoolDefinition {
    pub uuid: Uuid,
    pub name: StorPoolName,
    pub flags: StorPoolDfnFlags,
    pub props: Props,
}

impl StorPoolDefinition {
    pub fn from_pojo(pojo: &StorPoolPojo) -> Self {
        Self {
            uuid: pojo.dfn_uuid,
            name: pojo.name.clone(),
            flags: StorPoolDfnFlags::from_bits_truncate(pojo.dfn_flags.bits()),
            props: Props::from_map(&pojo.dfn_props),
        }
    }

    pub fn update_from(&mut self, pojo: &StorPoolPojo) -> DrResult<()> {
        check_uuid(
            "storage pool definition",
            self.name.as_str(),
            self.uuid,
            pojo.dfn_uuid,
        )?;
        self.flags.reset_to(pojo.dfn_flags);
        self.props.sync_from(&pojo.dfn_props);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePool {
    pub uuid: Uuid,
    pub name: StorPoolName,
    pub node_name: NodeName,
    pub provider_kind: ProviderKind,
    pub free_space_mgr_name: String,
    pub external_locking: bool,
    pub props: Props,
}

impl StoragePool {
    pub fn from_pojo(pojo: &StorPoolPojo) -> Self {
        Self {
            uuid: pojo.uuid,
            name: pojo.name.clone(),
            node_name: pojo.node_name.clone(),
            provider_kind: pojo.provider_kind,
            free_space_mgr_name: pojo.free_space_mgr_name.clone(),
            external_locking: pojo.external_locking,
            props: Props::from_map(&pojo.props),
        }
    }

    pub fn update_from(&mut self, pojo: &StorPoolPojo) -> DrResult<()> {
        check_uuid("storage pool", self.name.as_str(), self.uuid, pojo.uuid)?;
        self.provider_kind = pojo.provider_kind;
        self.free_space_mgr_name = pojo.free_space_mgr_name.clone();
        self.external_locking = pojo.external_locking;
        self.props.sync_from(&pojo.props);
        Ok(())
    }
}

// ─── Resource definitions and resources ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    pub uuid: Uuid,
    pub name: ResourceName,
    pub flags: RscDfnFlags,
    pub props: Props,
    pub layer_stack: Vec<LayerKind>,
    pub external_name: Option<String>,
    pub rsc_grp_name: String,
    pub vlm_dfns: BTreeMap<VolumeNumber, VolumeDefinition>,
    pub resources: BTreeMap<NodeName, Resource>,
    pub snapshot_dfns: BTreeMap<SnapshotName, SnapshotDefinition>,
    pub layer_data: RscDfnLayerMap,
}

impl ResourceDefinition {
    /// New definition without volume definitions; those are merged
    /// separately by [`ResourceDefinition::merge_vlm_dfns`].
    pub fn from_pojo(pojo: &RscDfnPojo) -> Self {
        Self {
            uuid: pojo.uuid,
            name: pojo.name.clone(),
            flags: RscDfnFlags::from_bits_truncate(pojo.flags.bits()),
            props: Props::from_map(&pojo.props),
            layer_stack: pojo.layer_stack.clone(),
            external_name: pojo.external_name.clone(),
            rsc_grp_name: pojo.rsc_grp_name.clone(),
            vlm_dfns: BTreeMap::new(),
            resources: BTreeMap::new(),
            snapshot_dfns: BTreeMap::new(),
            layer_data: RscDfnLayerMap::new(),
        }
    }

    pub fn update_from(&mut self, pojo: &RscDfnPojo) -> DrResult<()> {
        check_uuid(
            "resource definition",
            self.name.as_str(),
            self.uuid,
            pojo.uuid,
        )?;
        self.flags.reset_to(pojo.flags);
        self.props.sync_from(&pojo.props);
        self.layer_stack = pojo.layer_stack.clone();
        self.external_name = pojo.external_name.clone();
        self.rsc_grp_name = pojo.rsc_grp_name.clone();
        Ok(())
    }

    /// Create, update and remove-by-diff volume definitions. Returns the
    /// numbers of removed definitions.
    pub fn merge_vlm_dfns(&mut self, pojos: &[VlmDfnPojo]) -> DrResult<Vec<VolumeNumber>> {
        for pojo in pojos {
            match self.vlm_dfns.get_mut(&pojo.vlm_nr) {
                Some(vlm_dfn) => vlm_dfn.update_from(&self.name, pojo)?,
                None => {
                    self.vlm_dfns
                        .insert(pojo.vlm_nr, VolumeDefinition::from_pojo(pojo));
                }
            }
        }
        let removed: Vec<VolumeNumber> = self
            .vlm_dfns
            .keys()
            .filter(|nr| !pojos.iter().any(|p| p.vlm_nr == **nr))
            .copied()
            .collect();
        for nr in &removed {
            self.vlm_dfns.remove(nr);
        }
        Ok(removed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDefinition {
    pub uuid: Uuid,
    pub vlm_nr: VolumeNumber,
    pub size_kib: u64,
    pub flags: VlmDfnFlags,
    pub props: Props,
    pub layer_data: VlmDfnLayerMap,
}

impl VolumeDefinition {
    pub fn from_pojo(pojo: &VlmDfnPojo) -> Self {
        Self {
            uuid: pojo.uuid,
            vlm_nr: pojo.vlm_nr,
            size_kib: pojo.size_kib,
            flags: VlmDfnFlags::from_bits_truncate(pojo.flags.bits()),
            props: Props::from_map(&pojo.props),
            layer_data: VlmDfnLayerMap::new(),
        }
    }

    pub fn update_from(&mut self, rsc_name: &ResourceName, pojo: &VlmDfnPojo) -> DrResult<()> {
        check_uuid(
            "volume definition",
            &format!("{}/{}", rsc_name, self.vlm_nr),
            self.uuid,
            pojo.uuid,
        )?;
        self.size_kib = pojo.size_kib;
        self.flags.reset_to(pojo.flags);
        self.props.sync_from(&pojo.props);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub uuid: Uuid,
    pub key: ResourceKey,
    pub flags: RscFlags,
    pub props: Props,
    pub volumes: BTreeMap<VolumeNumber, Volume>,
    pub layer_tree: LayerTree,
}

impl Resource {
    /// New resource without volumes; those are merged separately by
    /// [`Resource::merge_volumes`].
    pub fn from_pojo(rsc_name: &ResourceName, pojo: &RscInstancePojo) -> Self {
        let key = ResourceKey::new(pojo.node_name.clone(), rsc_name.clone());
        Self {
            uuid: pojo.uuid,
            layer_tree: LayerTree::new(LayerOwner::Resource(key.clone())),
            key,
            flags: RscFlags::from_bits_truncate(pojo.flags.bits()),
            props: Props::from_map(&pojo.props),
            volumes: BTreeMap::new(),
        }
    }

    pub fn update_from(&mut self, pojo: &RscInstancePojo) -> DrResult<()> {
        check_uuid("resource", &self.key.to_string(), self.uuid, pojo.uuid)?;
        self.flags.reset_to(pojo.flags);
        self.props.sync_from(&pojo.props);
        Ok(())
    }

    /// Create, update and remove-by-diff volumes. Every volume must belong to
    /// an existing volume definition of `vlm_dfns`.
    pub fn merge_volumes(
        &mut self,
        vlm_dfns: &BTreeMap<VolumeNumber, VolumeDefinition>,
        pojos: &[VlmPojo],
    ) -> DrResult<()> {
        for pojo in pojos {
            let vlm_dfn = vlm_dfns.get(&pojo.vlm_nr).ok_or_else(|| {
                DrError::implementation(format!(
                    "volume {} of {} has no volume definition",
                    pojo.vlm_nr, self.key
                ))
            })?;
            check_uuid(
                "volume definition",
                &format!("{}/{}", self.key.rsc, pojo.vlm_nr),
                vlm_dfn.uuid,
                pojo.vlm_dfn_uuid,
            )?;
            match self.volumes.get_mut(&pojo.vlm_nr) {
                Some(vlm) => {
                    check_uuid(
                        "volume",
                        &format!("{}/{}", self.key, pojo.vlm_nr),
                        vlm.uuid,
                        pojo.uuid,
                    )?;
                    vlm.flags.reset_to(pojo.flags);
                    vlm.props.sync_from(&pojo.props);
                }
                None => {
                    self.volumes.insert(pojo.vlm_nr, Volume::from_pojo(pojo));
                }
            }
        }
        self.volumes
            .retain(|nr, _| pojos.iter().any(|p| p.vlm_nr == *nr));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub uuid: Uuid,
    pub vlm_nr: VolumeNumber,
    pub flags: VlmFlags,
    pub props: Props,
}

impl Volume {
    pub fn from_pojo(pojo: &VlmPojo) -> Self {
        Self {
            uuid: pojo.uuid,
            vlm_nr: pojo.vlm_nr,
            flags: VlmFlags::from_bits_truncate(pojo.flags.bits()),
            props: Props::from_map(&pojo.props),
        }
    }
}

// ─── Snapshots ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDefinition {
    pub uuid: Uuid,
    pub name: SnapshotName,
    pub rsc_name: ResourceName,
    pub flags: SnapshotDfnFlags,
    pub props: Props,
    pub vlm_dfns: BTreeMap<VolumeNumber, SnapshotVolumeDefinition>,
    pub snapshots: BTreeMap<NodeName, Snapshot>,
    pub layer_data: RscDfnLayerMap,
}

impl SnapshotDefinition {
    pub fn from_pojo(rsc_name: &ResourceName, pojo: &SnapshotDfnPojo) -> Self {
        Self {
            uuid: pojo.uuid,
            name: pojo.name.clone(),
            rsc_name: rsc_name.clone(),
            flags: SnapshotDfnFlags::from_bits_truncate(pojo.flags.bits()),
            props: Props::from_map(&pojo.props),
            vlm_dfns: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            layer_data: RscDfnLayerMap::new(),
        }
    }

    pub fn update_from(&mut self, pojo: &SnapshotDfnPojo) -> DrResult<()> {
        check_uuid(
            "snapshot definition",
            &format!("{}@{}", self.rsc_name, self.name),
            self.uuid,
            pojo.uuid,
        )?;
        self.flags.reset_to(pojo.flags);
        self.props.sync_from(&pojo.props);
        Ok(())
    }

    pub fn merge_vlm_dfns(&mut self, pojos: &[SnapshotVlmDfnPojo]) -> DrResult<()> {
        for pojo in pojos {
            match self.vlm_dfns.get_mut(&pojo.vlm_nr) {
                Some(vlm_dfn) => {
                    check_uuid(
                        "snapshot volume definition",
                        &format!("{}@{}/{}", self.rsc_name, self.name, pojo.vlm_nr),
                        vlm_dfn.uuid,
                        pojo.uuid,
                    )?;
                    vlm_dfn.size_kib = pojo.size_kib;
                    vlm_dfn.props.sync_from(&pojo.props);
                }
                None => {
                    self.vlm_dfns.insert(
                        pojo.vlm_nr,
                        SnapshotVolumeDefinition {
                            uuid: pojo.uuid,
                            vlm_nr: pojo.vlm_nr,
                            size_kib: pojo.size_kib,
                            props: Props::from_map(&pojo.props),
                            layer_data: VlmDfnLayerMap::new(),
                        },
                    );
                }
            }
        }
        self.vlm_dfns
            .retain(|nr, _| pojos.iter().any(|p| p.vlm_nr == *nr));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVolumeDefinition {
    pub uuid: Uuid,
    pub vlm_nr: VolumeNumber,
    pub size_kib: u64,
    pub props: Props,
    pub layer_data: VlmDfnLayerMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub uuid: Uuid,
    pub key: SnapshotKey,
    pub flags: SnapshotFlags,
    pub props: Props,
    pub volumes: BTreeMap<VolumeNumber, SnapshotVolume>,
    pub layer_tree: LayerTree,
}

impl Snapshot {
    pub fn new(uuid: Uuid, key: SnapshotKey, flags: SnapshotFlags) -> Self {
        Self {
            uuid,
            layer_tree: LayerTree::new(LayerOwner::Snapshot(key.clone())),
            key,
            flags: SnapshotFlags::from_bits_truncate(flags.bits()),
            props: Props::new(),
            volumes: BTreeMap::new(),
        }
    }

    pub fn merge_volumes(
        &mut self,
        vlm_dfns: &BTreeMap<VolumeNumber, SnapshotVolumeDefinition>,
        pojos: &[SnapshotVlmPojo],
    ) -> DrResult<()> {
        for pojo in pojos {
            if !vlm_dfns.contains_key(&pojo.vlm_nr) {
                return Err(DrError::implementation(format!(
                    "snapshot volume {} of {} has no snapshot volume definition",
                    pojo.vlm_nr, self.key
                )));
            }
            match self.volumes.get_mut(&pojo.vlm_nr) {
                Some(vlm) => {
                    check_uuid(
                        "snapshot volume",
                        &format!("{}/{}", self.key, pojo.vlm_nr),
                        vlm.uuid,
                        pojo.uuid,
                    )?;
                    vlm.props.sync_from(&pojo.props);
                }
                None => {
                    self.volumes.insert(
                        pojo.vlm_nr,
                        SnapshotVolume {
                            uuid: pojo.uuid,
                            vlm_nr: pojo.vlm_nr,
                            props: Props::from_map(&pojo.props),
                        },
                    );
                }
            }
        }
        self.volumes
            .retain(|nr, _| pojos.iter().any(|p| p.vlm_nr == *nr));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVolume {
    pub uuid: Uuid,
    pub vlm_nr: VolumeNumber,
    pub props: Props,
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_proto::pojo::PropsMap;

    fn node_pojo(uuid: u128) -> NodePojo {
        NodePojo {
            uuid: Uuid::from_u128(uuid),
            name: NodeName::new("alpha").unwrap(),
            node_type: NodeType::Satellite,
            flags: NodeFlags::empty(),
            props: PropsMap::new(),
        }
    }

    #[test]
    fn test_node_update_checks_uuid() {
        let mut node = Node::from_pojo(&node_pojo(1));
        let mut update = node_pojo(1);
        update.flags = NodeFlags::EVACUATE;
        node.update_from(&update).unwrap();
        assert_eq!(node.flags, NodeFlags::EVACUATE);

        match node.update_from(&node_pojo(2)) {
            Err(DrError::DivergentIds { kind, .. }) => assert_eq!(kind, "node"),
            other => panic!("expected divergence, got {:?}", other),
        }
    }

    #[test]
    fn test_vlm_dfn_diff_removal() {
        let pojo = |nr: u32| VlmDfnPojo {
            uuid: Uuid::from_u128(100 + nr as u128),
            vlm_nr: VolumeNumber::new(nr).unwrap(),
            size_kib: 1024,
            flags: VlmDfnFlags::empty(),
            props: PropsMap::new(),
        };
        let mut dfn = ResourceDefinition::from_pojo(&RscDfnPojo {
            uuid: Uuid::from_u128(7),
            name: ResourceName::new("r0").unwrap(),
            flags: RscDfnFlags::empty(),
            props: PropsMap::new(),
            layer_stack: vec![LayerKind::Storage],
            external_name: None,
            rsc_grp_name: "DfltRscGrp".into(),
            vlm_dfns: Vec::new(),
        });
        dfn.merge_vlm_dfns(&[pojo(0), pojo(1)]).unwrap();
        let removed = dfn.merge_vlm_dfns(&[pojo(1)]).unwrap();
        assert_eq!(removed, vec![VolumeNumber::new(0).unwrap()]);
        assert_eq!(dfn.vlm_dfns.len(), 1);
    }
}
