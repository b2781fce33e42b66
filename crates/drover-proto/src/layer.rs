//! Wire descriptions of the per-resource layer tree.
//!
//! A [`RscLayerPojo`] is the nested form of one resource-layer object: its
//! kind-specific attributes, its volumes, and its children. The satellite
//! merges these into its arena-backed tree; the controller produces them by
//! walking its own tree top-down.

use serde::{Deserialize, Serialize};

use crate::flags::{DrbdRscFlags, IgnoreReasons};
use crate::kind::{LayerKind, ProviderKind, TransportType};
use crate::name::{LayerId, RscSuffix, StorPoolName, VolumeNumber};
use crate::pojo::StorPoolPojo;

/// One resource-layer object with its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RscLayerPojo {
    pub id: LayerId,
    pub suffix: RscSuffix,
    pub suspend_io: bool,
    pub ignore_reasons: IgnoreReasons,
    pub data: LayerDataPojo,
    pub children: Vec<RscLayerPojo>,
}

impl RscLayerPojo {
    pub fn kind(&self) -> LayerKind {
        self.data.kind()
    }

    /// Volume numbers described at this level, in description order.
    pub fn vlm_nrs(&self) -> Vec<VolumeNumber> {
        match &self.data {
            LayerDataPojo::Drbd { vlms, .. } => vlms.iter().map(|v| v.vlm_nr).collect(),
            LayerDataPojo::Luks { vlms } => vlms.iter().map(|v| v.vlm_nr).collect(),
            LayerDataPojo::Nvme { vlms } => vlms.iter().map(|v| v.vlm_nr).collect(),
            LayerDataPojo::Storage { vlms } => vlms.iter().map(|v| v.vlm_nr).collect(),
            LayerDataPojo::Writecache { vlms } => vlms.iter().map(|v| v.vlm_nr).collect(),
        }
    }

    /// Depth-first walk over this object and every descendant.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a RscLayerPojo>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

/// Kind-specific payload of a resource-layer object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerDataPojo {
    Drbd {
        rsc: DrbdRscPojo,
        vlms: Vec<DrbdVlmPojo>,
    },
    Luks {
        vlms: Vec<LuksVlmPojo>,
    },
    Nvme {
        vlms: Vec<NvmeVlmPojo>,
    },
    Storage {
        vlms: Vec<StorageVlmPojo>,
    },
    Writecache {
        vlms: Vec<WritecacheVlmPojo>,
    },
}

impl LayerDataPojo {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerDataPojo::Drbd { .. } => LayerKind::Drbd,
            LayerDataPojo::Luks { .. } => LayerKind::Luks,
            LayerDataPojo::Nvme { .. } => LayerKind::Nvme,
            LayerDataPojo::Storage { .. } => LayerKind::Storage,
            LayerDataPojo::Writecache { .. } => LayerKind::Writecache,
        }
    }
}

/// Host-reported volume state. Carried on the wire for display only; the
/// satellite never trusts these values from a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlmStatePojo {
    pub allocated_size: Option<u64>,
    pub usable_size: Option<u64>,
    pub device_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbdRscPojo {
    pub node_id: u16,
    pub ports: Vec<u16>,
    pub port_count: u16,
    pub peer_slots: u16,
    pub al_stripes: u32,
    pub al_stripe_size: u64,
    pub flags: DrbdRscFlags,
    pub dfn: DrbdRscDfnPojo,
}

/// Definition-level DRBD data, shared by every node's DRBD object with the
/// same suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbdRscDfnPojo {
    pub suffix: RscSuffix,
    pub peer_slots: u16,
    pub al_stripes: u32,
    pub al_stripe_size: u64,
    pub transport_type: TransportType,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbdVlmPojo {
    pub vlm_nr: VolumeNumber,
    pub ext_meta_stor_pool: Option<StorPoolName>,
    pub vlm_dfn: DrbdVlmDfnPojo,
    pub state: VlmStatePojo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbdVlmDfnPojo {
    pub suffix: RscSuffix,
    pub minor_nr: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuksVlmPojo {
    pub vlm_nr: VolumeNumber,
    pub encrypted_password: Vec<u8>,
    pub modify_password: Option<Vec<u8>>,
    pub state: VlmStatePojo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmeVlmPojo {
    pub vlm_nr: VolumeNumber,
    pub state: VlmStatePojo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVlmPojo {
    pub vlm_nr: VolumeNumber,
    pub provider_kind: ProviderKind,
    /// Full pool description, so that pools of peer nodes can be
    /// materialized on first sight.
    pub stor_pool: StorPoolPojo,
    pub state: VlmStatePojo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritecacheVlmPojo {
    pub vlm_nr: VolumeNumber,
    pub cache_stor_pool: Option<StorPoolName>,
    pub state: VlmStatePojo,
}
