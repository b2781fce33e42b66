//! Checked object names and numeric identifiers.
//!
//! Names are validated once at the edge (wire decoding, CLI parsing) so that
//! every map keyed by a name can trust its keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{MAX_NAME_LEN, MAX_VOLUME_NUMBER};
use crate::error::{DrError, DrResult};

fn check_name(name: &str) -> DrResult<()> {
    let invalid = |reason: &str| DrError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("too long"));
    }
    let first = name.chars().next().unwrap_or('_');
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(invalid("must start with a letter or '_'"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || *c == '.'))
    {
        return Err(invalid(&format!("invalid character '{}'", bad)));
    }
    Ok(())
}

macro_rules! checked_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> DrResult<Self> {
                let name = name.into();
                check_name(&name)?;
                Ok(Self(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DrError;

            fn try_from(value: String) -> DrResult<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = DrError;

            fn try_from(value: &str) -> DrResult<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

checked_name!(
    /// Name of a cluster member.
    NodeName
);
checked_name!(
    /// Name of a resource definition (shared by all its per-node resources).
    ResourceName
);
checked_name!(
    /// Name of a storage pool definition.
    StorPoolName
);
checked_name!(
    /// Name of a snapshot definition within a resource definition.
    SnapshotName
);

/// Suffix distinguishing several layer objects of the same kind under one
/// resource (e.g. `""` for data, `".meta"` for external meta-data).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RscSuffix(pub String);

impl RscSuffix {
    pub fn data() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RscSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RscSuffix {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Volume number within a resource definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct VolumeNumber(u32);

impl VolumeNumber {
    pub fn new(nr: u32) -> DrResult<Self> {
        if nr > MAX_VOLUME_NUMBER {
            return Err(DrError::InvalidValue(format!(
                "volume number {} out of range 0..={}",
                nr, MAX_VOLUME_NUMBER
            )));
        }
        Ok(Self(nr))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for VolumeNumber {
    type Error = DrError;

    fn try_from(nr: u32) -> DrResult<Self> {
        Self::new(nr)
    }
}

impl From<VolumeNumber> for u32 {
    fn from(nr: VolumeNumber) -> u32 {
        nr.0
    }
}

impl fmt::Display for VolumeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a resource-layer object. Unique among all layer objects of
/// the cluster; assigned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert_eq!(NodeName::new("alpha-01").unwrap().as_str(), "alpha-01");
        assert!(ResourceName::new("pvc_1234.data").is_ok());
        assert!(StorPoolName::new("_internal").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(NodeName::new("").is_err());
        assert!(NodeName::new("1node").is_err());
        assert!(NodeName::new("bad name").is_err());
        assert!(NodeName::new("x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_name_deserialize_validates() {
        let ok: NodeName = bincode::deserialize(&bincode::serialize("alpha").unwrap()).unwrap();
        assert_eq!(ok.as_str(), "alpha");

        let bad = bincode::deserialize::<NodeName>(&bincode::serialize("9lives").unwrap());
        assert!(bad.is_err());
    }

    #[test]
    fn test_volume_number_range() {
        assert_eq!(VolumeNumber::new(0).unwrap().value(), 0);
        assert!(VolumeNumber::new(MAX_VOLUME_NUMBER).is_ok());
        assert!(VolumeNumber::new(MAX_VOLUME_NUMBER + 1).is_err());
    }
}
