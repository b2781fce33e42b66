//! Drover protocol and system constants.

/// Default satellite listen port for the controller connection
pub const DR_STLT_PORT: u16 = 3366;

/// Maximum length of object names
pub const MAX_NAME_LEN: usize = 48;

/// Highest legal volume number
pub const MAX_VOLUME_NUMBER: u32 = 65535;

/// Maximum frame size accepted on the controller link (64 MB)
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Update id a controller uses for the full sync of a fresh epoch
pub const FULL_SYNC_UPDATE_ID: u64 = 0;

/// Satellite property carrying the local node name
pub const KEY_NODE_NAME: &str = "NodeName";
