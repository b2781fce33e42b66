//! Lock-guarded World-State Maps.
//!
//! The update sequencer mutates these maps; device management reads them.
//! Every writer takes its locks through [`WorldState::lock`], which acquires
//! them in one fixed order: reconfiguration, nodes, resource definitions,
//! storage pool definitions. Guards release on drop, so every exit path
//! unlocks.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use drover_proto::name::{NodeName, ResourceName, StorPoolName};
use drover_proto::{DrError, DrResult};

use crate::objects::{Node, ResourceDefinition, StorPoolDefinition};
use crate::props::Props;

pub type NodesMap = BTreeMap<NodeName, Node>;
pub type RscDfnMap = BTreeMap<ResourceName, ResourceDefinition>;
pub type StorPoolDfnMap = BTreeMap<StorPoolName, StorPoolDefinition>;

/// Satellite-wide configuration guarded by the reconfiguration lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SatelliteConf {
    /// Controller-provided properties.
    pub props: Props,
    /// Name of the node this satellite runs on, once authenticated.
    pub local_node: Option<NodeName>,
}

/// Mode of the reconfiguration lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

/// The locks an operation needs. Maps are only ever taken in write mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub reconf: LockMode,
    pub nodes: bool,
    pub rsc_dfns: bool,
    pub stor_pool_dfns: bool,
}

impl LockRequest {
    /// Reconfiguration lock in read mode, no map locks.
    pub const fn read() -> Self {
        Self {
            reconf: LockMode::Read,
            nodes: false,
            rsc_dfns: false,
            stor_pool_dfns: false,
        }
    }

    /// Reconfiguration lock in write mode, no map locks.
    pub const fn reconf_write() -> Self {
        Self {
            reconf: LockMode::Write,
            nodes: false,
            rsc_dfns: false,
            stor_pool_dfns: false,
        }
    }

    /// Every map in write mode under a read-held reconfiguration lock.
    pub const fn all_maps() -> Self {
        Self {
            reconf: LockMode::Read,
            nodes: true,
            rsc_dfns: true,
            stor_pool_dfns: true,
        }
    }

    pub const fn nodes(mut self) -> Self {
        self.nodes = true;
        self
    }

    pub const fn rsc_dfns(mut self) -> Self {
        self.rsc_dfns = true;
        self
    }

    pub const fn stor_pool_dfns(mut self) -> Self {
        self.stor_pool_dfns = true;
        self
    }
}

enum ReconfGuard<'a> {
    Read(RwLockReadGuard<'a, SatelliteConf>),
    Write(RwLockWriteGuard<'a, SatelliteConf>),
}

/// Locks held for one operation.
pub struct WorldGuard<'a> {
    reconf: ReconfGuard<'a>,
    nodes: Option<RwLockWriteGuard<'a, NodesMap>>,
    rsc_dfns: Option<RwLockWriteGuard<'a, RscDfnMap>>,
    stor_pool_dfns: Option<RwLockWriteGuard<'a, StorPoolDfnMap>>,
}

/// Simultaneous mutable access to every World-State Map.
pub struct WorldParts<'g> {
    pub conf: &'g SatelliteConf,
    pub nodes: &'g mut NodesMap,
    pub rsc_dfns: &'g mut RscDfnMap,
    pub stor_pool_dfns: &'g mut StorPoolDfnMap,
}

impl<'a> WorldGuard<'a> {
    pub fn conf(&self) -> &SatelliteConf {
        match &self.reconf {
            ReconfGuard::Read(g) => g,
            ReconfGuard::Write(g) => g,
        }
    }

    pub fn conf_mut(&mut self) -> DrResult<&mut SatelliteConf> {
        match &mut self.reconf {
            ReconfGuard::Write(g) => Ok(g),
            ReconfGuard::Read(_) => Err(DrError::NotLocked("reconfiguration".into())),
        }
    }

    pub fn nodes_mut(&mut self) -> DrResult<&mut NodesMap> {
        self.nodes
            .as_deref_mut()
            .ok_or_else(|| DrError::NotLocked("nodes map".into()))
    }

    pub fn rsc_dfns_mut(&mut self) -> DrResult<&mut RscDfnMap> {
        self.rsc_dfns
            .as_deref_mut()
            .ok_or_else(|| DrError::NotLocked("resource definition map".into()))
    }

    /// Nodes and storage pool definitions together, for pool changes that
    /// do not touch resources.
    pub fn pools_mut(&mut self) -> DrResult<(&mut NodesMap, &mut StorPoolDfnMap)> {
        let nodes = self
            .nodes
            .as_deref_mut()
            .ok_or_else(|| DrError::NotLocked("nodes map".into()))?;
        let stor_pool_dfns = self
            .stor_pool_dfns
            .as_deref_mut()
            .ok_or_else(|| DrError::NotLocked("storage pool definition map".into()))?;
        Ok((nodes, stor_pool_dfns))
    }

    /// Borrow every map at once. Fails unless all map locks are held.
    pub fn parts_mut(&mut self) -> DrResult<WorldParts<'_>> {
        let conf = match &self.reconf {
            ReconfGuard::Read(g) => &**g,
            ReconfGuard::Write(g) => &**g,
        };
        let nodes = self
            .nodes
            .as_deref_mut()
            .ok_or_else(|| DrError::NotLocked("nodes map".into()))?;
        let rsc_dfns = self
            .rsc_dfns
            .as_deref_mut()
            .ok_or_else(|| DrError::NotLocked("resource definition map".into()))?;
        let stor_pool_dfns = self
            .stor_pool_dfns
            .as_deref_mut()
            .ok_or_else(|| DrError::NotLocked("storage pool definition map".into()))?;
        Ok(WorldParts {
            conf,
            nodes,
            rsc_dfns,
            stor_pool_dfns,
        })
    }
}

/// The satellite's replica of cluster state.
#[derive(Default)]
pub struct WorldState {
    reconf: RwLock<SatelliteConf>,
    nodes: RwLock<NodesMap>,
    rsc_dfns: RwLock<RscDfnMap>,
    stor_pool_dfns: RwLock<StorPoolDfnMap>,
}

fn poisoned(what: &str) -> DrError {
    DrError::LockPoisoned(what.to_string())
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the locks of `req` in the fixed global order.
    pub fn lock(&self, req: LockRequest) -> DrResult<WorldGuard<'_>> {
        let reconf = match req.reconf {
            LockMode::Read => {
                ReconfGuard::Read(self.reconf.read().map_err(|_| poisoned("reconfiguration"))?)
            }
            LockMode::Write => ReconfGuard::Write(
                self.reconf
                    .write()
                    .map_err(|_| poisoned("reconfiguration"))?,
            ),
        };
        let nodes = if req.nodes {
            Some(self.nodes.write().map_err(|_| poisoned("nodes map"))?)
        } else {
            None
        };
        let rsc_dfns = if req.rsc_dfns {
            Some(
                self.rsc_dfns
                    .write()
                    .map_err(|_| poisoned("resource definition map"))?,
            )
        } else {
            None
        };
        let stor_pool_dfns = if req.stor_pool_dfns {
            Some(
                self.stor_pool_dfns
                    .write()
                    .map_err(|_| poisoned("storage pool definition map"))?,
            )
        } else {
            None
        };
        Ok(WorldGuard {
            reconf,
            nodes,
            rsc_dfns,
            stor_pool_dfns,
        })
    }

    // Read access for device management and tests.

    pub fn conf(&self) -> RwLockReadGuard<'_, SatelliteConf> {
        self.reconf.read().unwrap()
    }

    pub fn nodes(&self) -> RwLockReadGuard<'_, NodesMap> {
        self.nodes.read().unwrap()
    }

    pub fn rsc_dfns(&self) -> RwLockReadGuard<'_, RscDfnMap> {
        self.rsc_dfns.read().unwrap()
    }

    pub fn stor_pool_dfns(&self) -> RwLockReadGuard<'_, StorPoolDfnMap> {
        self.stor_pool_dfns.read().unwrap()
    }
}
