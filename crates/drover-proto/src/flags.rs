//! State flag sets.
//!
//! Every entity carries a bit set with a fixed set of legal values. Updates
//! from the controller never patch single bits: the whole set is replaced
//! through `reset_to`, which also masks bits that are not legal for the set.

use serde::{Deserialize, Serialize};

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident { $($flag:ident = $bit:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            $(pub const $flag: $name = $name(1 << $bit);)+

            /// Every legal bit of this set.
            pub const ALL: $name = $name(0 $(| (1 << $bit))+);

            pub const fn empty() -> Self {
                Self(0)
            }

            /// Build from raw bits, dropping bits that are not legal here.
            pub const fn from_bits_truncate(bits: u64) -> Self {
                Self(bits & Self::ALL.0)
            }

            pub const fn bits(self) -> u64 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Replace the whole set.
            pub fn reset_to(&mut self, other: Self) {
                *self = Self::from_bits_truncate(other.0);
            }

            pub fn names(self) -> Vec<&'static str> {
                let mut out = Vec::new();
                $(if self.contains(Self::$flag) {
                    out.push(stringify!($flag));
                })+
                out
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

flag_set!(
    /// Node state flags.
    NodeFlags {
        DELETE = 0,
        EVICTED = 1,
        EVACUATE = 2,
        QIGNORE = 3,
    }
);

flag_set!(
    /// Resource definition state flags.
    RscDfnFlags {
        DELETE = 0,
        FAILED = 1,
        RESTORE_TARGET = 2,
        CLONING = 3,
    }
);

flag_set!(
    /// Per-node resource state flags.
    RscFlags {
        DELETE = 0,
        CLEAN = 1,
        DRBD_DISKLESS = 2,
        DISKLESS = 3,
        TIE_BREAKER = 4,
        INACTIVE = 5,
        BACKUP_RESTORE = 6,
        EVICTED = 7,
    }
);

flag_set!(
    /// Volume definition state flags.
    VlmDfnFlags {
        DELETE = 0,
        ENCRYPTED = 1,
        RESIZE = 2,
        GROSS_SIZE = 3,
    }
);

flag_set!(
    /// Per-node volume state flags.
    VlmFlags {
        DELETE = 0,
        CLEAN = 1,
        RESIZE = 2,
        DRBD_RESIZE = 3,
    }
);

flag_set!(
    /// Storage pool definition flags.
    StorPoolDfnFlags {
        DELETE = 0,
    }
);

flag_set!(
    /// Snapshot definition state flags.
    SnapshotDfnFlags {
        SUCCESSFUL = 0,
        FAILED_DEPLOYMENT = 1,
        FAILED_DISCONNECT = 2,
        DELETE = 3,
        SHIPPING = 4,
    }
);

flag_set!(
    /// Per-node snapshot state flags.
    SnapshotFlags {
        DELETE = 0,
        SUSPEND_IO = 1,
        TAKE_SNAPSHOT = 2,
        SHIPPING_SOURCE = 3,
        SHIPPING_TARGET = 4,
    }
);

flag_set!(
    /// DRBD resource-layer flags.
    DrbdRscFlags {
        DELETE = 0,
        DISKLESS = 1,
        DISK_ADD_REQUESTED = 2,
        DISK_ADDING = 3,
        DISK_REMOVE_REQUESTED = 4,
        DISK_REMOVING = 5,
        INITIALIZED = 6,
    }
);

flag_set!(
    /// Reasons why a layer is ignored by device management.
    IgnoreReasons {
        DRBD_SKIP_DISK = 0,
        SPDK_NOT_LOCAL = 1,
        NVME_TARGET_PATH = 2,
        LUKS_NO_KEY = 3,
    }
);
