//! # tcpmux
//!
//! TCP connection multiplexer: accepts or establishes connections, manages
//! a per-connection byte pipeline, and layers a configurable framing
//! protocol on top of the raw stream. For embedders who want
//! request/response or streaming semantics over TCP without re-implementing
//! buffering, partial-frame reassembly, and reconnection.
//!
//! ## Architecture
//!
//! ```text
//! socket receive ─► receive ring ─► codec decode ─► message/stream events
//! send()/send_stream() ─► send ring ─► drain (one in flight) ─► socket send
//! ```
//!
//! - [`RingBuffer`] - fixed-capacity circular staging for both directions
//! - [`handler`] - the per-connection capability ([`IoHandler`]) plus the
//!   built-in framing variants (simple length-prefixed messages, typed
//!   message/stream frames, raw echo)
//! - [`mux`] - the engine: [`TcpServer`] accepts forever, [`TcpClient`]
//!   connects and reconnects with round-robin endpoint cycling
//!
//! ## Example
//!
//! ```ignore
//! use tcpmux::{EchoHandlerFactory, MuxConfig, TcpServer};
//!
//! #[tokio::main]
//! async fn main() -> tcpmux::Result<()> {
//!     let config = MuxConfig::default();
//!     let factory = EchoHandlerFactory::new(config.clone());
//!     let mut server = TcpServer::new("127.0.0.1:9000".parse().unwrap(), factory, config);
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop();
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod error;
pub mod handler;
pub mod mux;

pub use buffer::RingBuffer;
pub use error::{MuxError, Result};
pub use handler::{
    ComplexMessageHandler, EchoHandler, EchoHandlerFactory, HandlerCore, HandlerFactory,
    IoHandler, MessageCallback, SimpleMessageHandler,
};
pub use mux::{MuxConfig, TcpClient, TcpServer};
