//! # drover-core
//!
//! Satellite-side world model for drover.
//! Provides the lockable world-state maps, per-resource layer trees, the
//! builders that merge controller descriptions into them, and the loader
//! that rebuilds layer trees from persisted rows.

pub mod keys;
pub mod layer;
pub mod loader;
pub mod mem_db;
pub mod merge;
pub mod objects;
pub mod props;
pub mod tx;
pub mod world;

#[cfg(test)]
mod fixtures;

pub use keys::{LayerOwner, ResourceKey, SnapshotKey, StorPoolKey};
pub use layer::{check_tree, LayerTree, RscLayerObject};
pub use world::{LockRequest, WorldGuard, WorldParts, WorldState};
