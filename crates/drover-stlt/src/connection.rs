//! Controller connection handling.
//!
//! Frames of one connection are handed to the sequencer one at a time, in
//! arrival order. Applying runs on the blocking pool since the sequencer
//! takes std locks.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use drover_proto::{DrError, DrResult};

use crate::sequencer::UpdateSequencer;
use crate::state::SharedStlt;
use crate::transport::tcp::{create_listen_socket, TcpControllerTransport};
use crate::transport::ControllerTransport;

/// Feed every frame of `transport` to the sequencer until the controller
/// disconnects or the sequencer closes the connection.
pub async fn serve_connection(
    seq: Arc<UpdateSequencer>,
    transport: Arc<dyn ControllerTransport>,
) -> DrResult<()> {
    let closer = seq.attach();
    let peer = transport.peer_id();
    info!("controller connected from {}", peer);

    let result = loop {
        let frame = tokio::select! {
            frame = transport.recv_frame() => frame,
            _ = closer.closed() => {
                warn!("closing controller connection {}", peer);
                break Ok(());
            }
        };
        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("controller {} disconnected", peer);
                break Ok(());
            }
            Err(e) => break Err(e),
        };

        let seq_c = seq.clone();
        let handled = tokio::task::spawn_blocking(move || seq_c.handle_frame(frame))
            .await
            .map_err(|e| DrError::implementation(format!("apply task failed: {}", e)));
        match handled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("controller {}: {}", peer, e);
                seq.close_connection(&closer);
            }
            Err(e) => break Err(e),
        }
        if closer.is_closed() {
            warn!("closing controller connection {}", peer);
            break Ok(());
        }
    };

    closer.close();
    if let Err(e) = transport.close().await {
        debug!("controller {}: close failed: {}", peer, e);
    }
    result
}

/// Accept controller connections until shutdown.
pub async fn accept_loop(stlt: SharedStlt, seq: Arc<UpdateSequencer>) -> DrResult<()> {
    let listener =
        create_listen_socket(&stlt.config.listen_addr, stlt.config.listen_port).await?;
    info!(
        "accepting controller connections on {}:{}",
        stlt.config.listen_addr, stlt.config.listen_port
    );
    let shutdown = stlt.shutdown_notify.clone();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let seq_c = seq.clone();
                        tokio::spawn(async move {
                            let transport = Arc::new(TcpControllerTransport::new(stream, peer));
                            if let Err(e) = serve_connection(seq_c, transport).await {
                                debug!("controller connection {} ended: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("accept error: {}", e);
                    }
                }
            }
            _ = shutdown.notified() => {
                info!("controller listener shutting down");
                break;
            }
        }
    }

    seq.force_close();
    Ok(())
}
