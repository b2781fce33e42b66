//! Stall watchdog.
//!
//! A missing update leaves a gap in the queue that nothing else would ever
//! close. The watchdog polls the sequencer and force-closes the controller
//! connection once a gap has been open longer than the configured timeout;
//! the controller then re-authenticates and sends a fresh full sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{error, info};

use crate::sequencer::UpdateSequencer;

pub async fn run_watchdog(
    seq: Arc<UpdateSequencer>,
    timeout: Duration,
    interval: Duration,
    shutdown: Arc<Notify>,
) {
    if timeout.is_zero() {
        info!("update stall watchdog disabled");
        return;
    }
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let seq_c = seq.clone();
                // check_stall waits for the queue mutex, which an apply may hold
                let stall = match tokio::task::spawn_blocking(move || seq_c.check_stall(timeout)).await {
                    Ok(stall) => stall,
                    Err(e) => {
                        error!("watchdog: stall check failed: {}", e);
                        continue;
                    }
                };
                if let Some(stall) = stall {
                    error!(
                        "no update {} received for {:?}, queued updates {:?}, closing controller connection",
                        stall.awaited_update_id, stall.waited, stall.queued
                    );
                    let seq_c = seq.clone();
                    let _ = tokio::task::spawn_blocking(move || seq_c.force_close()).await;
                }
            }
            _ = shutdown.notified() => {
                info!("watchdog shutting down");
                break;
            }
        }
    }
}
