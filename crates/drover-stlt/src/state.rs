//! Satellite-wide daemon state.
//!
//! Shared by the update sequencer, the controller connection task and the
//! stall watchdog. Handles are threaded through construction; nothing here
//! is global.

use std::sync::{Arc, RwLock};

use tokio::sync::Notify;

use drover_core::tx::{NoopTransactionMgr, TransactionMgr};
use drover_core::world::WorldState;

use crate::config::StltConfig;
use crate::devmgr::{DeviceManager, LoggingDeviceManager};

pub type SharedStlt = Arc<StltState>;

pub struct StltState {
    /// Replicated cluster state.
    pub world: WorldState,

    /// Reconciliation collaborator, notified after every applied update.
    pub devmgr: Arc<dyn DeviceManager>,

    /// Persistence transaction boundary.
    pub tx_mgr: Arc<dyn TransactionMgr>,

    pub config: StltConfig,

    /// Notify channel for shutdown.
    pub shutdown_notify: Arc<Notify>,

    /// Master key for LUKS volume passwords, once the controller sent one.
    master_key: RwLock<Option<Vec<u8>>>,
}

impl StltState {
    pub fn new(
        config: StltConfig,
        devmgr: Arc<dyn DeviceManager>,
        tx_mgr: Arc<dyn TransactionMgr>,
    ) -> Self {
        Self {
            world: WorldState::new(),
            devmgr,
            tx_mgr,
            config,
            shutdown_notify: Arc::new(Notify::new()),
            master_key: RwLock::new(None),
        }
    }

    /// State with the logging device manager and no persistence.
    pub fn with_defaults(config: StltConfig) -> Self {
        Self::new(
            config,
            Arc::new(LoggingDeviceManager),
            Arc::new(NoopTransactionMgr),
        )
    }

    pub fn master_key(&self) -> Option<Vec<u8>> {
        self.master_key.read().unwrap().clone()
    }

    /// An empty key clears the stored one.
    pub fn set_master_key(&self, key: Vec<u8>) {
        *self.master_key.write().unwrap() = if key.is_empty() { None } else { Some(key) };
    }
}
