//! # drover-proto
//!
//! Wire types, identifiers and constants shared by the drover controller and
//! its satellites.
//!
//! This crate defines checked names, flag sets, layer and provider kinds,
//! the wire descriptions of every world entity and of the layer tree, the
//! sequenced update messages and the unified error type.

pub mod apply;
pub mod constants;
pub mod defaults;
pub mod error;
pub mod flags;
pub mod kind;
pub mod layer;
pub mod name;
pub mod pojo;

// Re-export commonly used types at the crate root
pub use apply::{ApplyData, AuthRequest, CtrlFrame, FullSyncStatus, StateChange};
pub use error::{DrError, DrResult};
pub use kind::{LayerKind, NodeType, ProviderKind, TransportType};
pub use name::{
    LayerId, NodeName, ResourceName, RscSuffix, SnapshotName, StorPoolName, VolumeNumber,
};
