//! Layer, device-provider and node kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DrError;

/// Discriminant of a resource-layer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerKind {
    Drbd,
    Luks,
    Nvme,
    Storage,
    Writecache,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Drbd,
        LayerKind::Luks,
        LayerKind::Nvme,
        LayerKind::Storage,
        LayerKind::Writecache,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Drbd => "DRBD",
            LayerKind::Luks => "LUKS",
            LayerKind::Nvme => "NVME",
            LayerKind::Storage => "STORAGE",
            LayerKind::Writecache => "WRITECACHE",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = DrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayerKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DrError::InvalidValue(format!("unknown layer kind '{}'", s)))
    }
}

/// Backing-storage provider behind a storage-layer volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    Diskless,
    Lvm,
    LvmThin,
    Zfs,
    ZfsThin,
    File,
    FileThin,
    Spdk,
}

impl ProviderKind {
    /// Providers that allocate on demand.
    pub fn is_thin(self) -> bool {
        matches!(
            self,
            ProviderKind::LvmThin | ProviderKind::ZfsThin | ProviderKind::FileThin
        )
    }

    pub fn has_backing_storage(self) -> bool {
        self != ProviderKind::Diskless
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::Diskless => "DISKLESS",
            ProviderKind::Lvm => "LVM",
            ProviderKind::LvmThin => "LVM_THIN",
            ProviderKind::Zfs => "ZFS",
            ProviderKind::ZfsThin => "ZFS_THIN",
            ProviderKind::File => "FILE",
            ProviderKind::FileThin => "FILE_THIN",
            ProviderKind::Spdk => "SPDK",
        };
        f.write_str(s)
    }
}

/// DRBD replication transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    #[default]
    Ip,
    Rdma,
    Rdma10,
}

impl FromStr for TransportType {
    type Err = DrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IP" => Ok(TransportType::Ip),
            "RDMA" => Ok(TransportType::Rdma),
            "RDMA10" => Ok(TransportType::Rdma10),
            _ => Err(DrError::InvalidValue(format!("unknown transport type '{}'", s))),
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportType::Ip => "IP",
            TransportType::Rdma => "RDMA",
            TransportType::Rdma10 => "RDMA10",
        };
        f.write_str(s)
    }
}

/// Role of a cluster member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Controller,
    #[default]
    Satellite,
    Combined,
    Auxiliary,
}
