//! Update sequencer.
//!
//! Updates from the controller arrive tagged with the full sync id of the
//! epoch they belong to and an update id. They are queued by update id and
//! applied strictly in order: after every insert the queue is drained for as
//! long as its entry for the awaited id exists. Everything runs under one
//! queue mutex, so inserting and draining never interleave.
//!
//! A failed apply cannot be skipped and cannot be retried in place. The
//! queue is dropped and the controller connection closed; the controller
//! re-authenticates and starts a new epoch with a fresh full sync.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use drover_core::world::LockRequest;
use drover_proto::constants::KEY_NODE_NAME;
use drover_proto::{ApplyData, AuthRequest, CtrlFrame, DrResult, StateChange};

use crate::apply::{apply_change, lock_request, ChangedKeys};
use crate::monitor::UpdateMonitor;
use crate::state::SharedStlt;
use crate::transport::ConnectionCloser;

/// A gap in the queued update ids that has not closed in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stall {
    pub awaited_update_id: u64,
    pub queued: Vec<u64>,
    pub waited: Duration,
}

struct SeqInner {
    monitor: UpdateMonitor,
    queue: BTreeMap<u64, ApplyData>,
    /// When the current gap was first observed.
    gap_since: Option<Instant>,
}

pub struct UpdateSequencer {
    stlt: SharedStlt,
    inner: Mutex<SeqInner>,
    closer: Mutex<ConnectionCloser>,
}

impl UpdateSequencer {
    pub fn new(stlt: SharedStlt) -> Self {
        Self {
            stlt,
            inner: Mutex::new(SeqInner {
                monitor: UpdateMonitor::new(),
                queue: BTreeMap::new(),
                gap_since: None,
            }),
            closer: Mutex::new(ConnectionCloser::new()),
        }
    }

    pub fn stlt(&self) -> &SharedStlt {
        &self.stlt
    }

    /// Register a new controller connection. The previous one, if any, is
    /// closed: only one controller feeds the sequencer at a time.
    pub fn attach(&self) -> ConnectionCloser {
        let closer = ConnectionCloser::new();
        let old = std::mem::replace(&mut *self.closer.lock().unwrap(), closer.clone());
        old.close();
        closer
    }

    pub fn handle_frame(&self, frame: CtrlFrame) -> DrResult<()> {
        match frame {
            CtrlFrame::Authenticate(req) => self.authenticate(&req).map(|_| ()),
            CtrlFrame::Apply(data) => {
                self.apply_changed_data(data);
                Ok(())
            }
        }
    }

    /// Start a new epoch for a (re)connecting controller and bind the local
    /// node. Returns the full sync id the controller must use.
    pub fn authenticate(&self, req: &AuthRequest) -> DrResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let dropped = inner.queue.len();
        inner.queue.clear();
        inner.gap_since = None;
        if dropped > 0 {
            warn!("dropped {} queued updates of the previous epoch", dropped);
        }
        let full_sync_id = inner.monitor.start_epoch(req.full_sync_id);

        {
            let mut guard = self.stlt.world.lock(LockRequest::reconf_write())?;
            let conf = guard.conf_mut()?;
            conf.local_node = Some(req.node_name.clone());
            conf.props.set(KEY_NODE_NAME, req.node_name.as_str());
        }
        if let Some(configured) = &self.stlt.config.node_name {
            if configured.as_str() != req.node_name.as_str() {
                warn!(
                    "controller authenticated node {}, configured node name is {}",
                    req.node_name, configured
                );
            }
        }
        info!(
            "controller {} authenticated node {} ({}), full sync id {}",
            req.ctrl_uuid, req.node_name, req.node_uuid, full_sync_id
        );
        Ok(full_sync_id)
    }

    /// Queue one update and apply everything that has become applicable.
    pub fn apply_changed_data(&self, data: ApplyData) {
        let mut inner = self.inner.lock().unwrap();

        let current = inner.monitor.current_full_sync_id();
        if data.full_sync_id != current {
            warn!(
                "ignoring {}: outdated, current full sync id is {}",
                data, current
            );
            return;
        }
        let awaited = inner.monitor.awaited_update_id();
        if data.update_id < awaited {
            warn!(
                "ignoring {}: already applied, awaiting update {}",
                data, awaited
            );
            return;
        }
        if let Some(pending) = inner.queue.get(&data.update_id) {
            error!(
                "{} would overwrite the unapplied {}, closing controller connection",
                data, pending
            );
            self.abort_connection(&mut inner);
            return;
        }

        inner.queue.insert(data.update_id, data);
        self.drain(&mut inner);
    }

    fn drain(&self, inner: &mut SeqInner) {
        let mut progressed = false;
        loop {
            let awaited = inner.monitor.awaited_update_id();
            let Some(data) = inner.queue.remove(&awaited) else {
                break;
            };
            let is_full_sync = matches!(data.change, StateChange::FullSync(_));
            let label = data.to_string();

            match self.apply_one(data) {
                Ok(changed) => {
                    inner.monitor.update_applied();
                    if is_full_sync && changed.full_sync.is_some() {
                        inner.monitor.set_full_sync_applied();
                    }
                    trace!("applied {}", label);
                    changed.notify(self.stlt.devmgr.as_ref());
                }
                Err(e) if !e.is_fatal() && !is_full_sync => {
                    debug!("{}: {}, nothing to do", label, e);
                    inner.monitor.update_applied();
                }
                Err(e) => {
                    error!("failed to apply {}: {}, closing controller connection", label, e);
                    if is_full_sync {
                        inner.monitor.full_sync_failed();
                    }
                    self.abort_connection(inner);
                    return;
                }
            }
            progressed = true;
        }

        if progressed || inner.queue.is_empty() {
            inner.gap_since = None;
        }
        if !inner.queue.is_empty() && inner.gap_since.is_none() {
            inner.gap_since = Some(Instant::now());
        }
        let awaited = inner.monitor.awaited_update_id();
        for data in inner.queue.values() {
            debug!("{} queued until update {} received", data, awaited);
        }
    }

    /// Take the locks of one change, apply it and commit. The locks are
    /// released before the caller notifies device management.
    fn apply_one(&self, data: ApplyData) -> DrResult<ChangedKeys> {
        let mut guard = self.stlt.world.lock(lock_request(&data.change))?;
        match apply_change(&mut guard, &self.stlt, data.change) {
            Ok(changed) => {
                self.stlt.tx_mgr.commit()?;
                Ok(changed)
            }
            Err(e) => {
                self.stlt.tx_mgr.rollback();
                Err(e)
            }
        }
    }

    fn abort_connection(&self, inner: &mut SeqInner) {
        inner.queue.clear();
        inner.gap_since = None;
        self.closer.lock().unwrap().close();
        self.stlt.devmgr.force_wake_update_notifications();
    }

    /// Drop everything queued and close the controller connection.
    pub fn force_close(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.abort_connection(&mut inner);
    }

    /// Close the connection of `closer`. Queued updates are dropped only
    /// when it is still the attached connection.
    pub fn close_connection(&self, closer: &ConnectionCloser) {
        let mut inner = self.inner.lock().unwrap();
        let attached = self.closer.lock().unwrap().same_connection(closer);
        if attached {
            self.abort_connection(&mut inner);
        } else {
            closer.close();
        }
    }

    /// Report a gap that has been open for at least `timeout`. A zero
    /// timeout never reports.
    pub fn check_stall(&self, timeout: Duration) -> Option<Stall> {
        if timeout.is_zero() {
            return None;
        }
        let inner = self.inner.lock().unwrap();
        let waited = inner.gap_since?.elapsed();
        if waited < timeout {
            return None;
        }
        Some(Stall {
            awaited_update_id: inner.monitor.awaited_update_id(),
            queued: inner.queue.keys().copied().collect(),
            waited,
        })
    }

    pub fn monitor(&self) -> UpdateMonitor {
        self.inner.lock().unwrap().monitor.clone()
    }

    pub fn queued_ids(&self) -> Vec<u64> {
        self.inner.lock().unwrap().queue.keys().copied().collect()
    }
}
