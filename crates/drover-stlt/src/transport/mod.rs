//! Controller link abstraction.
//!
//! Two implementations:
//! - [`TcpControllerTransport`](tcp::TcpControllerTransport): length-prefixed
//!   bincode frames over a TCP connection accepted from the controller
//! - [`LocalTransport`](local::LocalTransport): in-process channel for tests
//!   and development
//!
//! The connection task reads frames through [`ControllerTransport`] and
//! stops when its [`ConnectionCloser`] fires.

pub mod local;
pub mod tcp;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use drover_proto::{CtrlFrame, DrResult};

/// Inbound side of a controller connection.
#[async_trait]
pub trait ControllerTransport: Send + Sync {
    /// Human-readable peer identity for logging.
    fn peer_id(&self) -> String;

    /// Receive the next frame. `Ok(None)` means the controller closed the
    /// connection.
    async fn recv_frame(&self) -> DrResult<Option<CtrlFrame>>;

    /// Close the connection. Frames not yet read are discarded.
    async fn close(&self) -> DrResult<()>;
}

/// Handle that asks one controller connection to close.
///
/// Callable from blocking code. Closing is sticky: once closed, every
/// current and future wait on [`ConnectionCloser::closed`] completes.
#[derive(Clone, Default)]
pub struct ConnectionCloser {
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ConnectionCloser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
            self.notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether `other` is a handle of the same connection.
    pub fn same_connection(&self, other: &ConnectionCloser) -> bool {
        Arc::ptr_eq(&self.closed, &other.closed)
    }

    /// Wait until [`ConnectionCloser::close`] has been called.
    pub async fn closed(&self) {
        while !self.is_closed() {
            self.notify.notified().await;
        }
    }
}
