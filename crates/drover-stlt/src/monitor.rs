//! Epoch and update-id bookkeeping of the controller link.

use drover_proto::constants::FULL_SYNC_UPDATE_ID;
use drover_proto::FullSyncStatus;

/// Where the satellite stands in the controller's update stream.
///
/// `full_sync_id` names the current epoch; `awaited_update_id` is the only
/// update id that may be applied next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMonitor {
    full_sync_id: u64,
    awaited_update_id: u64,
    full_sync_applied: bool,
    last_full_sync: Option<FullSyncStatus>,
}

impl UpdateMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_full_sync_id(&self) -> u64 {
        self.full_sync_id
    }

    pub fn awaited_update_id(&self) -> u64 {
        self.awaited_update_id
    }

    pub fn is_full_sync_applied(&self) -> bool {
        self.full_sync_applied
    }

    pub fn last_full_sync(&self) -> Option<FullSyncStatus> {
        self.last_full_sync
    }

    /// Start a new epoch. The announced id is adopted when it is newer than
    /// the current one; otherwise the current id is incremented.
    pub fn start_epoch(&mut self, announced: u64) -> u64 {
        self.full_sync_id = if announced > self.full_sync_id {
            announced
        } else {
            self.full_sync_id + 1
        };
        self.awaited_update_id = FULL_SYNC_UPDATE_ID;
        self.full_sync_applied = false;
        self.full_sync_id
    }

    pub fn update_applied(&mut self) {
        self.awaited_update_id += 1;
    }

    pub fn set_full_sync_applied(&mut self) {
        self.full_sync_applied = true;
        self.last_full_sync = Some(FullSyncStatus::Success);
    }

    /// Invalidate the epoch without telling the controller: everything it
    /// still sends under the old id is discarded until it authenticates
    /// again.
    pub fn full_sync_failed(&mut self) {
        self.full_sync_id += 1;
        self.full_sync_applied = false;
        self.last_full_sync = Some(FullSyncStatus::FailUnknown);
    }
}
