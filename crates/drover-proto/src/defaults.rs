//! Tunable operational defaults for the drover satellite.
//!
//! Protocol-level constants remain in [`crate::constants`]. This module
//! centralizes the defaults that can be overridden via the config file or
//! CLI flags.

// ─── Network ────────────────────────────────────────────────────────────────

/// Default bind address for the controller link.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0";

// ─── Logging ────────────────────────────────────────────────────────────────

/// Default log filter when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ─── Update sequencing ──────────────────────────────────────────────────────

/// Seconds a gap in the update-id sequence may persist before the
/// satellite drops the controller connection to force a resync.
pub const DEFAULT_UPDATE_STALL_TIMEOUT_SECS: u64 = 120;

/// Interval between stall watchdog checks (milliseconds).
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 1000;

// ─── Files ──────────────────────────────────────────────────────────────────

/// Default satellite data directory.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/drover";

/// Name of the satellite config file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "stlt.toml";

// ─── In-process transport ───────────────────────────────────────────────────

/// Capacity of the in-process controller frame channel.
pub const DEFAULT_LOCAL_FRAME_CHANNEL_SIZE: usize = 256;
