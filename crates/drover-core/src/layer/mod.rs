//! Per-resource layer trees.
//!
//! A resource (or snapshot) owns at most one tree of resource-layer objects
//! describing its device stack, e.g. DRBD over LUKS over storage. Each
//! resource-layer object owns the volume-layer objects of its kind.

pub mod data;
pub mod dfn;
pub mod tree;

pub use data::{
    DrbdRscData, DrbdVlmData, LayerVlms, LoadedVlms, LuksVlmData, NvmeVlmData, RscLayerData,
    RscLayerObject, StorageVlmData, VlmCommon, WritecacheVlmData,
};
pub use dfn::{
    DfnLayerKey, DrbdRscDfnData, DrbdVlmDfnData, RscDfnLayerData, RscDfnLayerMap,
    VlmDfnLayerData, VlmDfnLayerMap,
};
pub use tree::{check_tree, LayerTree};
