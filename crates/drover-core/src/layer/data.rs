//! Resource-layer objects and their per-kind volume data.

use std::collections::{BTreeMap, BTreeSet};

use drover_proto::flags::{DrbdRscFlags, IgnoreReasons};
use drover_proto::kind::{LayerKind, ProviderKind};
use drover_proto::layer::VlmStatePojo;
use drover_proto::name::{LayerId, RscSuffix, VolumeNumber};
use drover_proto::{DrError, DrResult};

use crate::keys::{LayerOwner, StorPoolKey};

/// One node of a layer tree.
///
/// `parent` and `children` are maintained by [`super::LayerTree`] only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RscLayerObject {
    pub id: LayerId,
    pub suffix: RscSuffix,
    pub owner: LayerOwner,
    pub suspend_io: bool,
    pub ignore_reasons: IgnoreReasons,
    pub data: RscLayerData,
    pub(super) parent: Option<LayerId>,
    pub(super) children: BTreeSet<LayerId>,
}

impl RscLayerObject {
    pub fn new(id: LayerId, suffix: RscSuffix, owner: LayerOwner, data: RscLayerData) -> Self {
        Self {
            id,
            suffix,
            owner,
            suspend_io: false,
            ignore_reasons: IgnoreReasons::empty(),
            data,
            parent: None,
            children: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.data.kind()
    }

    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.children.iter().copied()
    }

    pub fn has_child(&self, id: LayerId) -> bool {
        self.children.contains(&id)
    }
}

/// Kind-specific state of a resource-layer object. Each variant owns a map
/// of volume-layer objects of the matching kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RscLayerData {
    Drbd(DrbdRscData),
    Luks(LayerVlms<LuksVlmData>),
    Nvme(LayerVlms<NvmeVlmData>),
    Storage(LayerVlms<StorageVlmData>),
    Writecache(LayerVlms<WritecacheVlmData>),
}

impl RscLayerData {
    /// Empty layer data of the given kind. DRBD needs its own attributes and
    /// is built through [`DrbdRscData`].
    pub fn empty(kind: LayerKind) -> DrResult<Self> {
        Ok(match kind {
            LayerKind::Luks => RscLayerData::Luks(LayerVlms::default()),
            LayerKind::Nvme => RscLayerData::Nvme(LayerVlms::default()),
            LayerKind::Storage => RscLayerData::Storage(LayerVlms::default()),
            LayerKind::Writecache => RscLayerData::Writecache(LayerVlms::default()),
            LayerKind::Drbd => {
                return Err(DrError::implementation(
                    "DRBD layer data cannot be created without attributes",
                ))
            }
        })
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            RscLayerData::Drbd(_) => LayerKind::Drbd,
            RscLayerData::Luks(_) => LayerKind::Luks,
            RscLayerData::Nvme(_) => LayerKind::Nvme,
            RscLayerData::Storage(_) => LayerKind::Storage,
            RscLayerData::Writecache(_) => LayerKind::Writecache,
        }
    }

    pub fn vlm_nrs(&self) -> Vec<VolumeNumber> {
        match self {
            RscLayerData::Drbd(d) => d.vlms.nrs(),
            RscLayerData::Luks(v) => v.nrs(),
            RscLayerData::Nvme(v) => v.nrs(),
            RscLayerData::Storage(v) => v.nrs(),
            RscLayerData::Writecache(v) => v.nrs(),
        }
    }

    pub fn remove_vlm(&mut self, nr: VolumeNumber) -> bool {
        match self {
            RscLayerData::Drbd(d) => d.vlms.remove(nr),
            RscLayerData::Luks(v) => v.remove(nr),
            RscLayerData::Nvme(v) => v.remove(nr),
            RscLayerData::Storage(v) => v.remove(nr),
            RscLayerData::Writecache(v) => v.remove(nr),
        }
    }

    /// Install volumes loaded separately from the resource-layer object.
    pub fn attach_vlms(&mut self, vlms: LoadedVlms) -> DrResult<()> {
        match (self, vlms) {
            (RscLayerData::Drbd(d), LoadedVlms::Drbd(v)) => d.vlms.extend(v),
            (RscLayerData::Luks(m), LoadedVlms::Luks(v)) => {
                m.extend(v.into_iter().map(|(nr, vlm)| (nr, vlm.without_cache())).collect())
            }
            (RscLayerData::Nvme(m), LoadedVlms::Nvme(v)) => m.extend(v),
            (RscLayerData::Storage(m), LoadedVlms::Storage(v)) => m.extend(v),
            (RscLayerData::Writecache(m), LoadedVlms::Writecache(v)) => m.extend(v),
            (data, vlms) => Err(DrError::implementation(format!(
                "{} volumes loaded for {} layer object",
                vlms.kind(),
                data.kind()
            ))),
        }
    }

    /// Copy of the volume-layer objects as they are persisted. Runtime
    /// caches are left out.
    pub fn persisted_vlms(&self) -> LoadedVlms {
        fn collect<V: Clone>(vlms: &LayerVlms<V>) -> Vec<(VolumeNumber, V)> {
            vlms.iter().map(|(nr, v)| (nr, v.clone())).collect()
        }
        match self {
            RscLayerData::Drbd(d) => LoadedVlms::Drbd(collect(&d.vlms)),
            RscLayerData::Luks(v) => LoadedVlms::Luks(
                v.iter()
                    .map(|(nr, vlm)| (nr, vlm.clone().without_cache()))
                    .collect(),
            ),
            RscLayerData::Nvme(v) => LoadedVlms::Nvme(collect(v)),
            RscLayerData::Storage(v) => LoadedVlms::Storage(collect(v)),
            RscLayerData::Writecache(v) => LoadedVlms::Writecache(collect(v)),
        }
    }

    pub fn as_drbd(&self) -> Option<&DrbdRscData> {
        match self {
            RscLayerData::Drbd(d) => Some(d),
            _ => None,
        }
    }

    pub fn storage_vlms(&self) -> Option<&LayerVlms<StorageVlmData>> {
        match self {
            RscLayerData::Storage(v) => Some(v),
            _ => None,
        }
    }

    pub fn luks_vlms(&self) -> Option<&LayerVlms<LuksVlmData>> {
        match self {
            RscLayerData::Luks(v) => Some(v),
            _ => None,
        }
    }

    pub fn luks_vlms_mut(&mut self) -> Option<&mut LayerVlms<LuksVlmData>> {
        match self {
            RscLayerData::Luks(v) => Some(v),
            _ => None,
        }
    }
}

/// Volume-layer objects of one resource-layer object, keyed by volume number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVlms<V> {
    map: BTreeMap<VolumeNumber, V>,
}

impl<V> Default for LayerVlms<V> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
}

impl<V> LayerVlms<V> {
    pub fn get(&self, nr: VolumeNumber) -> Option<&V> {
        self.map.get(&nr)
    }

    pub fn get_mut(&mut self, nr: VolumeNumber) -> Option<&mut V> {
        self.map.get_mut(&nr)
    }

    pub fn insert(&mut self, nr: VolumeNumber, vlm: V) -> Option<V> {
        self.map.insert(nr, vlm)
    }

    pub fn remove(&mut self, nr: VolumeNumber) -> bool {
        self.map.remove(&nr).is_some()
    }

    pub fn nrs(&self) -> Vec<VolumeNumber> {
        self.map.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VolumeNumber, &V)> {
        self.map.iter().map(|(nr, v)| (*nr, v))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.map.values_mut()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Add loaded volumes. A volume number loaded twice is a database
    /// inconsistency.
    fn extend(&mut self, vlms: Vec<(VolumeNumber, V)>) -> DrResult<()> {
        for (nr, vlm) in vlms {
            if self.map.insert(nr, vlm).is_some() {
                return Err(DrError::Database(format!("volume {} loaded twice", nr)));
            }
        }
        Ok(())
    }
}

/// Volumes loaded by the persistence collaborator for one layer object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedVlms {
    Drbd(Vec<(VolumeNumber, DrbdVlmData)>),
    Luks(Vec<(VolumeNumber, LuksVlmData)>),
    Nvme(Vec<(VolumeNumber, NvmeVlmData)>),
    Storage(Vec<(VolumeNumber, StorageVlmData)>),
    Writecache(Vec<(VolumeNumber, WritecacheVlmData)>),
}

impl LoadedVlms {
    pub fn kind(&self) -> LayerKind {
        match self {
            LoadedVlms::Drbd(_) => LayerKind::Drbd,
            LoadedVlms::Luks(_) => LayerKind::Luks,
            LoadedVlms::Nvme(_) => LayerKind::Nvme,
            LoadedVlms::Storage(_) => LayerKind::Storage,
            LoadedVlms::Writecache(_) => LayerKind::Writecache,
        }
    }
}

/// Host-probed state common to every volume-layer object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlmCommon {
    pub allocated_size: Option<u64>,
    pub usable_size: Option<u64>,
    pub device_path: Option<String>,
}

impl From<&VlmStatePojo> for VlmCommon {
    fn from(state: &VlmStatePojo) -> Self {
        Self {
            allocated_size: state.allocated_size,
            usable_size: state.usable_size,
            device_path: state.device_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbdRscData {
    pub node_id: u16,
    pub ports: Vec<u16>,
    pub port_count: u16,
    pub peer_slots: u16,
    pub al_stripes: u32,
    pub al_stripe_size: u64,
    pub flags: DrbdRscFlags,
    pub vlms: LayerVlms<DrbdVlmData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbdVlmData {
    pub ext_meta_stor_pool: Option<StorPoolKey>,
    pub common: VlmCommon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuksVlmData {
    pub encrypted_password: Vec<u8>,
    pub modify_password: Option<Vec<u8>>,
    /// Filled by device management once the master key is known.
    pub decrypted_password: Option<Vec<u8>>,
    pub common: VlmCommon,
}

impl LuksVlmData {
    /// The volume with its decrypted password dropped.
    pub fn without_cache(self) -> Self {
        Self {
            decrypted_password: None,
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NvmeVlmData {
    pub common: VlmCommon,
}

/// Backing-storage volume. `provider` selects the device-provider variant;
/// every variant, diskless included, references exactly one storage pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageVlmData {
    pub provider: ProviderKind,
    pub stor_pool: StorPoolKey,
    pub common: VlmCommon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritecacheVlmData {
    pub cache_stor_pool: Option<StorPoolKey>,
    pub common: VlmCommon,
}
