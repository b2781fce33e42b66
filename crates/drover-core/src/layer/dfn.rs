//! Definition-level layer data.
//!
//! Data shared by every node's instance of a resource (or volume) definition,
//! stored at most once per `(kind, suffix)` on the definition.

use std::collections::BTreeMap;

use drover_proto::kind::{LayerKind, TransportType};
use drover_proto::layer::{DrbdRscDfnPojo, DrbdVlmDfnPojo};
use drover_proto::name::{RscSuffix, VolumeNumber};

/// Key of definition-level layer data.
pub type DfnLayerKey = (LayerKind, RscSuffix);

/// Resource-definition-level layer data by `(kind, suffix)`.
pub type RscDfnLayerMap = BTreeMap<DfnLayerKey, RscDfnLayerData>;

/// Volume-definition-level layer data by `(kind, suffix)`.
pub type VlmDfnLayerMap = BTreeMap<DfnLayerKey, VlmDfnLayerData>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RscDfnLayerData {
    Drbd(DrbdRscDfnData),
}

impl RscDfnLayerData {
    pub fn key(&self) -> DfnLayerKey {
        match self {
            RscDfnLayerData::Drbd(d) => (LayerKind::Drbd, d.suffix.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbdRscDfnData {
    pub suffix: RscSuffix,
    pub peer_slots: u16,
    pub al_stripes: u32,
    pub al_stripe_size: u64,
    pub transport_type: TransportType,
    pub secret: Option<String>,
}

impl From<&DrbdRscDfnPojo> for DrbdRscDfnData {
    fn from(pojo: &DrbdRscDfnPojo) -> Self {
        Self {
            suffix: pojo.suffix.clone(),
            peer_slots: pojo.peer_slots,
            al_stripes: pojo.al_stripes,
            al_stripe_size: pojo.al_stripe_size,
            transport_type: pojo.transport_type,
            secret: pojo.secret.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VlmDfnLayerData {
    Drbd(DrbdVlmDfnData),
}

impl VlmDfnLayerData {
    pub fn key(&self) -> DfnLayerKey {
        match self {
            VlmDfnLayerData::Drbd(d) => (LayerKind::Drbd, d.suffix.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbdVlmDfnData {
    pub suffix: RscSuffix,
    pub vlm_nr: VolumeNumber,
    pub minor_nr: Option<u32>,
}

impl DrbdVlmDfnData {
    pub fn from_pojo(vlm_nr: VolumeNumber, pojo: &DrbdVlmDfnPojo) -> Self {
        Self {
            suffix: pojo.suffix.clone(),
            vlm_nr,
            minor_nr: pojo.minor_nr,
        }
    }
}
