//! Keys identifying entities across the World-State Maps.

use std::fmt;

use drover_proto::name::{NodeName, ResourceName, SnapshotName, StorPoolName};

/// A resource: one node's instance of a resource definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub node: NodeName,
    pub rsc: ResourceName,
}

impl ResourceKey {
    pub fn new(node: NodeName, rsc: ResourceName) -> Self {
        Self { node, rsc }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.rsc)
    }
}

/// A snapshot: one node's share of a snapshot definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey {
    pub node: NodeName,
    pub rsc: ResourceName,
    pub snap: SnapshotName,
}

impl SnapshotKey {
    pub fn new(node: NodeName, rsc: ResourceName, snap: SnapshotName) -> Self {
        Self { node, rsc, snap }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.node, self.rsc, self.snap)
    }
}

/// A storage pool on one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorPoolKey {
    pub node: NodeName,
    pub pool: StorPoolName,
}

impl StorPoolKey {
    pub fn new(node: NodeName, pool: StorPoolName) -> Self {
        Self { node, pool }
    }
}

impl fmt::Display for StorPoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.pool)
    }
}

/// The entity owning a layer tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerOwner {
    Resource(ResourceKey),
    Snapshot(SnapshotKey),
}

impl LayerOwner {
    pub fn node(&self) -> &NodeName {
        match self {
            LayerOwner::Resource(k) => &k.node,
            LayerOwner::Snapshot(k) => &k.node,
        }
    }

    pub fn rsc_name(&self) -> &ResourceName {
        match self {
            LayerOwner::Resource(k) => &k.rsc,
            LayerOwner::Snapshot(k) => &k.rsc,
        }
    }

    pub fn snapshot_name(&self) -> Option<&SnapshotName> {
        match self {
            LayerOwner::Resource(_) => None,
            LayerOwner::Snapshot(k) => Some(&k.snap),
        }
    }
}

impl fmt::Display for LayerOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerOwner::Resource(k) => write!(f, "resource {}", k),
            LayerOwner::Snapshot(k) => write!(f, "snapshot {}", k),
        }
    }
}
