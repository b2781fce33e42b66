//! In-process controller link.
//!
//! Frames pushed into the [`LocalController`] handle come out of
//! [`LocalTransport::recv_frame`] in the same order. There is no network
//! I/O.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use drover_proto::defaults::DEFAULT_LOCAL_FRAME_CHANNEL_SIZE;
use drover_proto::{CtrlFrame, DrError, DrResult};

use super::ControllerTransport;

pub struct LocalTransport {
    name: String,
    /// Wrapped in a Mutex because `mpsc::Receiver::recv` takes `&mut self`.
    frame_rx: Mutex<mpsc::Receiver<CtrlFrame>>,
    closed: AtomicBool,
}

/// Controller end of a [`LocalTransport`].
#[derive(Clone)]
pub struct LocalController {
    frame_tx: mpsc::Sender<CtrlFrame>,
}

impl LocalController {
    pub async fn send(&self, frame: CtrlFrame) -> DrResult<()> {
        self.frame_tx.send(frame).await.map_err(|_| DrError::Network)
    }
}

impl LocalTransport {
    pub fn new(name: impl Into<String>) -> (Self, LocalController) {
        let (tx, rx) = mpsc::channel(DEFAULT_LOCAL_FRAME_CHANNEL_SIZE);
        let transport = Self {
            name: name.into(),
            frame_rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
        };
        (transport, LocalController { frame_tx: tx })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControllerTransport for LocalTransport {
    fn peer_id(&self) -> String {
        format!("local:{}", self.name)
    }

    async fn recv_frame(&self) -> DrResult<Option<CtrlFrame>> {
        if self.is_closed() {
            return Ok(None);
        }
        Ok(self.frame_rx.lock().await.recv().await)
    }

    async fn close(&self) -> DrResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("local transport {} closed", self.name);
            self.frame_rx.lock().await.close();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_proto::{ApplyData, StateChange};

    fn frame(update_id: u64) -> CtrlFrame {
        CtrlFrame::Apply(ApplyData::new(
            1,
            update_id,
            StateChange::CryptKey {
                master_key: vec![1, 2, 3],
            },
        ))
    }

    #[tokio::test]
    async fn test_frames_in_order() {
        let (transport, ctrl) = LocalTransport::new("t");
        ctrl.send(frame(0)).await.unwrap();
        ctrl.send(frame(1)).await.unwrap();

        assert_eq!(transport.recv_frame().await.unwrap(), Some(frame(0)));
        assert_eq!(transport.recv_frame().await.unwrap(), Some(frame(1)));
    }

    #[tokio::test]
    async fn test_sender_dropped_ends_stream() {
        let (transport, ctrl) = LocalTransport::new("t");
        drop(ctrl);
        assert_eq!(transport.recv_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (transport, ctrl) = LocalTransport::new("t");
        transport.close().await.unwrap();
        assert!(transport.is_closed());
        assert!(ctrl.send(frame(0)).await.is_err());
        assert_eq!(transport.recv_frame().await.unwrap(), None);
        assert_eq!(transport.peer_id(), "local:t");
    }
}
