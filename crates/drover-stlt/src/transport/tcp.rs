//! TCP controller link: one length-prefixed bincode frame per message.
//!
//! Wire layout of a frame: a big-endian `u32` payload length followed by the
//! bincode encoding of a [`CtrlFrame`].

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, error};

use drover_proto::constants::MAX_FRAME_LEN;
use drover_proto::{CtrlFrame, DrError, DrResult};

use super::ControllerTransport;

/// Create a TCP listener on the given address and port.
pub async fn create_listen_socket(bind_addr: &str, port: u16) -> DrResult<TcpListener> {
    let addr = format!("{}:{}", bind_addr, port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!("failed to bind to {}: {}", addr, e);
        DrError::from(e)
    })?;
    debug!("listening on {}", addr);
    Ok(listener)
}

/// Read one frame. `Ok(None)` on a clean end of stream before a frame starts.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> DrResult<Option<CtrlFrame>> {
    let len = match reader.read_u32().await {
        Ok(n) => n as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(_) => return Err(DrError::Network),
    };
    if len > MAX_FRAME_LEN {
        error!("controller frame too large: {} bytes", len);
        return Err(DrError::Protocol(format!("frame of {} bytes", len)));
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|_| DrError::Network)?;
    Ok(Some(bincode::deserialize(&buf)?))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &CtrlFrame) -> DrResult<()> {
    let data = bincode::serialize(frame)?;
    if data.len() > MAX_FRAME_LEN {
        return Err(DrError::Protocol(format!("frame of {} bytes", data.len())));
    }
    writer
        .write_u32(data.len() as u32)
        .await
        .map_err(|_| DrError::Network)?;
    writer.write_all(&data).await.map_err(|_| DrError::Network)?;
    writer.flush().await.map_err(|_| DrError::Network)
}

pub struct TcpControllerTransport {
    peer: SocketAddr,
    stream: Mutex<TcpStream>,
}

impl TcpControllerTransport {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        stream.set_nodelay(true).ok();
        Self {
            peer,
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl ControllerTransport for TcpControllerTransport {
    fn peer_id(&self) -> String {
        self.peer.to_string()
    }

    async fn recv_frame(&self) -> DrResult<Option<CtrlFrame>> {
        let mut stream = self.stream.lock().await;
        read_frame(&mut *stream).await
    }

    async fn close(&self) -> DrResult<()> {
        let mut stream = self.stream.lock().await;
        stream.shutdown().await.map_err(|_| DrError::Network)?;
        debug!("closed controller connection {}", self.peer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_proto::{ApplyData, StateChange};

    #[tokio::test]
    async fn test_frames_over_tcp() {
        let listener = create_listen_socket("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sent = CtrlFrame::Apply(ApplyData::new(
            3,
            0,
            StateChange::CryptKey {
                master_key: vec![9; 32],
            },
        ));
        let to_send = sent.clone();
        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            write_frame(&mut stream, &to_send).await.unwrap();
        });

        let (stream, peer) = listener.accept().await.unwrap();
        let transport = TcpControllerTransport::new(stream, peer);
        assert_eq!(transport.recv_frame().await.unwrap(), Some(sent));
        client.await.unwrap();
        assert_eq!(transport.recv_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut data: &[u8] = &((MAX_FRAME_LEN as u32) + 1).to_be_bytes();
        assert!(matches!(
            read_frame(&mut data).await,
            Err(DrError::Protocol(_))
        ));
    }
}
