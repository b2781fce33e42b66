//! Wire descriptions of world entities.
//!
//! These are plain data exchanged between controller and satellite. Each
//! carries the immutable uuid of the entity it describes, which the
//! receiving side checks against its local copy before merging anything.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::flags::{
    NodeFlags, RscDfnFlags, RscFlags, SnapshotDfnFlags, SnapshotFlags, StorPoolDfnFlags,
    VlmDfnFlags, VlmFlags,
};
use crate::kind::{LayerKind, NodeType, ProviderKind};
use crate::layer::RscLayerPojo;
use crate::name::{NodeName, ResourceName, SnapshotName, StorPoolName, VolumeNumber};

/// Property map as carried on the wire.
pub type PropsMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePojo {
    pub uuid: Uuid,
    pub name: NodeName,
    pub node_type: NodeType,
    pub flags: NodeFlags,
    pub props: PropsMap,
}

/// A storage pool on one node together with its definition's identity and
/// properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorPoolPojo {
    pub uuid: Uuid,
    pub name: StorPoolName,
    pub node_name: NodeName,
    pub dfn_uuid: Uuid,
    pub dfn_flags: StorPoolDfnFlags,
    pub provider_kind: ProviderKind,
    pub free_space_mgr_name: String,
    pub external_locking: bool,
    pub props: PropsMap,
    pub dfn_props: PropsMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlmDfnPojo {
    pub uuid: Uuid,
    pub vlm_nr: VolumeNumber,
    pub size_kib: u64,
    pub flags: VlmDfnFlags,
    pub props: PropsMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RscDfnPojo {
    pub uuid: Uuid,
    pub name: ResourceName,
    pub flags: RscDfnFlags,
    pub props: PropsMap,
    pub layer_stack: Vec<LayerKind>,
    pub external_name: Option<String>,
    pub rsc_grp_name: String,
    pub vlm_dfns: Vec<VlmDfnPojo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlmPojo {
    pub uuid: Uuid,
    pub vlm_nr: VolumeNumber,
    pub vlm_dfn_uuid: Uuid,
    pub flags: VlmFlags,
    pub props: PropsMap,
}

/// One node's instance of a resource definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RscInstancePojo {
    pub uuid: Uuid,
    pub node_name: NodeName,
    pub flags: RscFlags,
    pub props: PropsMap,
    pub vlms: Vec<VlmPojo>,
    pub layer: Option<RscLayerPojo>,
}

/// A peer's replica of a resource, with enough node information to create
/// the peer node locally when it is not known yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherRscPojo {
    pub node: NodePojo,
    pub rsc: RscInstancePojo,
}

/// A resource definition, this satellite's resource and every peer replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RscPojo {
    pub rsc_dfn: RscDfnPojo,
    pub local: RscInstancePojo,
    pub others: Vec<OtherRscPojo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVlmDfnPojo {
    pub uuid: Uuid,
    pub vlm_nr: VolumeNumber,
    pub size_kib: u64,
    pub props: PropsMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDfnPojo {
    pub uuid: Uuid,
    pub name: SnapshotName,
    pub flags: SnapshotDfnFlags,
    pub props: PropsMap,
    pub vlm_dfns: Vec<SnapshotVlmDfnPojo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVlmPojo {
    pub uuid: Uuid,
    pub vlm_nr: VolumeNumber,
    pub props: PropsMap,
}

/// This satellite's snapshot of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPojo {
    pub rsc_dfn: RscDfnPojo,
    pub snap_dfn: SnapshotDfnPojo,
    pub uuid: Uuid,
    pub node_name: NodeName,
    pub flags: SnapshotFlags,
    pub props: PropsMap,
    pub vlms: Vec<SnapshotVlmPojo>,
    pub layer: Option<RscLayerPojo>,
}

/// Everything a satellite needs to rebuild its view from scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSyncData {
    pub nodes: Vec<NodePojo>,
    pub stor_pools: Vec<StorPoolPojo>,
    pub rscs: Vec<RscPojo>,
    pub snapshots: Vec<SnapshotPojo>,
    pub ctrl_props: PropsMap,
    pub master_key: Option<Vec<u8>>,
}
