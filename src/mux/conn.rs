//! Shared per-connection driver used by both roles.
//!
//! One connection is driven by two cooperating loops over the split
//! socket plus the shutdown signal:
//!
//! - the read loop keeps exactly one receive in flight: it reads up to one
//!   chunk, hands the bytes to the handler, and only then re-arms;
//! - the drain loop keeps exactly one send in flight: it waits for the
//!   handler's drain signal, moves up to one chunk out of the send ring
//!   onto the socket, and reports completion through `on_sent` (which
//!   re-fires the signal while staged bytes remain).
//!
//! Every handler interaction happens under the connection's mutex, so the
//! receive-triggered first drain and the completion-triggered next drain
//! can never race on the sending flag.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info};

use super::MuxConfig;
use crate::error::Result;
use crate::handler::IoHandler;

/// Why a connection ended; the role decides what happens next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DisconnectReason {
    /// The peer closed the connection (zero-byte read).
    PeerClosed,
    /// A socket or protocol error aborted the connection.
    Error,
    /// `stop()` was observed while the connection was live.
    Stopped,
}

/// Drive one connection to completion: wire the handler, open the
/// writable gate, pump both loops, and tear down on exit.
///
/// A failure while processing a received chunk or a send completion
/// aborts this connection only; the socket is dropped on return.
pub(crate) async fn drive_connection<H: IoHandler>(
    stream: TcpStream,
    handler: Arc<Mutex<H>>,
    config: &MuxConfig,
    mut shutdown: watch::Receiver<bool>,
) -> DisconnectReason {
    let peer = stream.peer_addr().ok();
    let (reader, writer) = stream.into_split();
    let (drain_tx, drain_rx) = mpsc::unbounded_channel();

    {
        let mut h = handler.lock().await;
        h.core_mut().attach_drain(drain_tx);
        h.core_mut().set_writable(true);
        if let Err(e) = h.on_writable_changed(true) {
            drop(h);
            error!(?peer, "handler rejected writable transition: {e}, disconnecting");
            teardown(&handler).await;
            return DisconnectReason::Error;
        }
    }

    let reason = tokio::select! {
        result = read_loop(reader, handler.clone(), config.recv_chunk_size) => {
            report(peer, result)
        }
        result = drain_loop(writer, handler.clone(), drain_rx, config.send_chunk_size) => {
            report(peer, result)
        }
        _ = shutdown.wait_for(|stopped| *stopped) => {
            debug!(?peer, "connection released on stop");
            DisconnectReason::Stopped
        }
    };

    teardown(&handler).await;
    reason
}

fn report(peer: Option<SocketAddr>, result: Result<()>) -> DisconnectReason {
    match result {
        Ok(()) => {
            info!(?peer, "connection closed by peer");
            DisconnectReason::PeerClosed
        }
        Err(e) => {
            error!(?peer, "connection failed: {e}");
            DisconnectReason::Error
        }
    }
}

/// Close the writable gate (safe even if it never opened) and reset the
/// handler's buffered state.
async fn teardown<H: IoHandler>(handler: &Arc<Mutex<H>>) {
    let mut h = handler.lock().await;
    h.core_mut().set_writable(false);
    if let Err(e) = h.on_writable_changed(false) {
        error!("handler failed writable teardown: {e}");
    }
    h.reset();
}

/// Single-inflight receive: read one chunk, hand it over, re-arm.
///
/// Returns `Ok(())` on a graceful close; decode and append errors are
/// connection-fatal and surface here.
async fn read_loop<H: IoHandler>(
    mut reader: OwnedReadHalf,
    handler: Arc<Mutex<H>>,
    chunk_size: usize,
) -> Result<()> {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let count = reader.read(&mut buf).await?;
        if count == 0 {
            return Ok(());
        }
        debug!(bytes = count, "received");
        handler.lock().await.on_receive(&buf[..count])?;
    }
}

/// Single-inflight send: for each drain request, move up to one chunk
/// from the send ring onto the socket and report the completion.
async fn drain_loop<H: IoHandler>(
    mut writer: OwnedWriteHalf,
    handler: Arc<Mutex<H>>,
    mut drain_rx: mpsc::UnboundedReceiver<()>,
    chunk_size: usize,
) -> Result<()> {
    let mut chunk = vec![0u8; chunk_size];
    while drain_rx.recv().await.is_some() {
        let count = { handler.lock().await.core_mut().send.take(&mut chunk) };
        if count > 0 {
            writer.write_all(&chunk[..count]).await?;
            debug!(bytes = count, "sent");
        }
        handler.lock().await.on_sent(count)?;
    }
    Ok(())
}
