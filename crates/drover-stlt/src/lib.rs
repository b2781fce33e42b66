//! # drover-stlt
//!
//! The drover satellite: keeps a replica of the cluster's world state,
//! applying the controller's updates strictly in order.
//!
//! - [`sequencer`]: epoch checks, the ordered update queue and its drain loop
//! - [`apply`]: per-kind handlers run under the locks each change declares
//! - [`connection`] and [`transport`]: the controller link
//! - [`watchdog`]: closes the link when a missing update stalls the queue

pub mod apply;
pub mod config;
pub mod connection;
pub mod devmgr;
pub mod monitor;
pub mod sequencer;
pub mod state;
pub mod transport;
pub mod watchdog;

pub use config::StltConfig;
pub use devmgr::{DeviceManager, LoggingDeviceManager};
pub use monitor::UpdateMonitor;
pub use sequencer::{Stall, UpdateSequencer};
pub use state::{SharedStlt, StltState};
