//! Mux module - the socket-driving engine shared by both roles.
//!
//! The engine owns everything between the socket and the handler: it wires
//! a fresh handler into each connection, keeps exactly one receive and one
//! send operation in flight per connection, and turns socket errors into
//! clean disconnects. The two roles specialize it:
//!
//! - [`TcpServer`] accepts inbound connections indefinitely and drops each
//!   accepted socket on disconnect.
//! - [`TcpClient`] connects to one of a configured endpoint list and
//!   reconnects with a fixed backoff until stopped.

mod client;
mod conn;
mod server;

pub use client::TcpClient;
pub use server::TcpServer;

use std::time::Duration;

/// Default socket receive chunk size in bytes.
pub const DEFAULT_RECV_CHUNK_SIZE: usize = 4096;

/// Default socket send chunk size in bytes.
pub const DEFAULT_SEND_CHUNK_SIZE: usize = 4096;

/// Default delay between client reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Configuration shared by the engine and the handlers it creates.
///
/// The receive ring of every handler is sized to `2 * recv_chunk_size` and
/// the send ring to `send_chunk_size`, so changing these also resizes the
/// per-connection staging buffers.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Bytes requested per socket receive operation.
    pub recv_chunk_size: usize,
    /// Bytes moved per socket send operation.
    pub send_chunk_size: usize,
    /// Fixed delay between client connect retries and reconnects.
    pub reconnect_delay: Duration,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            recv_chunk_size: DEFAULT_RECV_CHUNK_SIZE,
            send_chunk_size: DEFAULT_SEND_CHUNK_SIZE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}
