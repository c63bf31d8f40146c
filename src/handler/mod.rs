//! Handler module - per-connection state and the handler capability.
//!
//! Provides:
//! - [`HandlerCore`] - receive/send ring buffers plus the send coordination
//!   flags shared by every handler variant
//! - [`IoHandler`] - the capability the mux drives (`on_receive`, `reset`,
//!   `on_sent`, writable transitions)
//! - [`HandlerFactory`] - produces one fresh handler per connection
//!
//! Framing codecs ([`SimpleMessageHandler`], [`ComplexMessageHandler`]) and
//! the [`EchoHandler`] are layered on top of [`HandlerCore`]; custom variants
//! implement [`IoHandler`] the same way.
//!
//! # Example
//!
//! ```ignore
//! use tcpmux::handler::{HandlerCore, IoHandler};
//! use tcpmux::MuxConfig;
//!
//! struct Collector {
//!     core: HandlerCore,
//! }
//!
//! impl IoHandler for Collector {
//!     fn core(&self) -> &HandlerCore {
//!         &self.core
//!     }
//!
//!     fn core_mut(&mut self) -> &mut HandlerCore {
//!         &mut self.core
//!     }
//! }
//! ```

mod complex;
mod echo;
mod simple;

pub use complex::{ComplexMessageHandler, StreamCallback, INITIAL_STREAM_SINK_CAPACITY};
pub use echo::{EchoHandler, EchoHandlerFactory};
pub use simple::SimpleMessageHandler;

use tokio::sync::mpsc;
use tracing::error;

use crate::buffer::RingBuffer;
use crate::error::Result;
use crate::mux::MuxConfig;

/// Callback invoked with a decoded message payload.
///
/// The slice is a view over the handler's reusable scratch buffer and is
/// only valid for the duration of the call.
pub type MessageCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Signal fired whenever the send ring holds bytes and no drain is in
/// flight. The receiving end lives in the connection's drain task.
pub(crate) type DrainSignal = mpsc::UnboundedSender<()>;

/// Per-connection handler state: receive/send staging buffers and the
/// single-inflight-send coordination flags.
///
/// The receive ring is sized to twice the socket receive chunk so a full
/// frame header plus one pending read always fit; the send ring holds one
/// socket send chunk. All flag mutation happens under the connection's
/// mutex, so no internal locking is needed.
pub struct HandlerCore {
    pub(crate) recv: RingBuffer,
    pub(crate) send: RingBuffer,
    writable: bool,
    sending: bool,
    drain: Option<DrainSignal>,
}

impl HandlerCore {
    /// Create handler state sized from the mux configuration.
    pub fn new(config: &MuxConfig) -> Self {
        Self {
            recv: RingBuffer::with_capacity(config.recv_chunk_size * 2),
            send: RingBuffer::with_capacity(config.send_chunk_size),
            writable: false,
            sending: false,
            drain: None,
        }
    }

    /// Whether the handler is attached to a live socket.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// The receive staging buffer, for codecs draining complete frames.
    #[inline]
    pub fn recv_buffer(&mut self) -> &mut RingBuffer {
        &mut self.recv
    }

    /// Free space in the send staging buffer.
    #[inline]
    pub fn send_available(&self) -> usize {
        self.send.available()
    }

    /// Append received bytes to the receive ring.
    ///
    /// An overflow here means the codec stopped draining (framing bug) or
    /// the peer is flooding; either way it is fatal for the connection, not
    /// the process.
    pub fn buffer_received(&mut self, data: &[u8]) -> Result<()> {
        self.recv.append(data)
    }

    /// Stage bytes for sending and trigger a drain if none is in flight.
    ///
    /// When the handler is not writable (not yet attached to a socket, or
    /// already detached) the bytes are dropped and an error is logged;
    /// callers must not assume delivery.
    pub fn send_internal(&mut self, data: &[u8]) -> Result<()> {
        if !self.writable {
            error!("send buffer is not writable yet, dropping {} bytes", data.len());
            return Ok(());
        }

        self.send.append(data)?;
        if !self.sending {
            self.sending = true;
            self.notify_drain();
        }
        Ok(())
    }

    /// Clear both buffers and the sending flag for reuse.
    pub fn reset(&mut self) {
        self.recv.reset();
        self.send.reset();
        self.sending = false;
    }

    /// Record completion of a send drain; immediately requests the next
    /// drain if the send ring still holds bytes, keeping at most one
    /// outstanding send and preserving wire order.
    pub(crate) fn on_sent(&mut self) {
        self.sending = false;
        if !self.send.is_empty() {
            self.sending = true;
            self.notify_drain();
        }
    }

    /// Install the drain signal at connection setup. Set once per
    /// connection, before the writable transition.
    pub(crate) fn attach_drain(&mut self, drain: DrainSignal) {
        self.drain = Some(drain);
    }

    /// Flip the writable gate. Mux-only; handlers observe the transition
    /// through [`IoHandler::on_writable_changed`].
    pub(crate) fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    fn notify_drain(&self) {
        if let Some(drain) = &self.drain {
            // The receiver only disappears at teardown; a failed send here
            // just means the connection is already going away.
            let _ = drain.send(());
        }
    }
}

/// The capability a connection handler exposes to the mux and, through
/// the default methods, to framing codecs.
///
/// A handler owns a [`HandlerCore`]; the provided methods delegate to it,
/// so a variant without its own framing only supplies the two accessors.
pub trait IoHandler: Send + 'static {
    /// Shared per-connection state.
    fn core(&self) -> &HandlerCore;

    /// Mutable access to the shared per-connection state.
    fn core_mut(&mut self) -> &mut HandlerCore;

    /// Called by the connection's read task with each received chunk.
    /// Variants with framing append and then run their decode loop.
    fn on_receive(&mut self, data: &[u8]) -> Result<()> {
        self.core_mut().buffer_received(data)
    }

    /// Reset buffered state for reuse.
    fn reset(&mut self) {
        self.core_mut().reset();
    }

    /// Called once a previously requested send drain completes with
    /// `bytes` written. Variants pumping an outbound stream refill the
    /// send ring from here.
    fn on_sent(&mut self, bytes: usize) -> Result<()> {
        let _ = bytes;
        self.core_mut().on_sent();
        Ok(())
    }

    /// Writable-gate transition hook. `true` fires once the socket is
    /// usable (the place to kick off an initial send); `false` fires on
    /// disconnect and must be safe even if the connection never became
    /// writable.
    fn on_writable_changed(&mut self, writable: bool) -> Result<()> {
        let _ = writable;
        Ok(())
    }
}

/// Factory producing one fresh handler per connection.
///
/// The mux never reuses a handler across two different connections, so a
/// factory must not hand out shared state between handlers.
pub trait HandlerFactory: Send + Sync + 'static {
    /// The handler variant this factory produces.
    type Handler: IoHandler;

    /// Create a handler for a newly established connection.
    fn create_handler(&self) -> Self::Handler;
}

impl<H, F> HandlerFactory for F
where
    H: IoHandler,
    F: Fn() -> H + Send + Sync + 'static,
{
    type Handler = H;

    fn create_handler(&self) -> H {
        self()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Wire a handler core for decode/encode tests without a socket:
    /// installs a drain signal and opens the writable gate.
    pub(crate) fn make_writable(core: &mut HandlerCore) -> mpsc::UnboundedReceiver<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        core.attach_drain(tx);
        core.set_writable(true);
        rx
    }

    /// Drain everything staged in the send ring the way the connection's
    /// drain task would: chunked takes with an `on_sent` completion after
    /// each, until the ring is empty.
    pub(crate) fn drain_all<H: IoHandler>(handler: &mut H, chunk_size: usize) -> Vec<u8> {
        let mut wire = Vec::new();
        let mut chunk = vec![0u8; chunk_size];
        loop {
            let n = handler.core_mut().send.take(&mut chunk);
            wire.extend_from_slice(&chunk[..n]);
            handler.on_sent(n).unwrap();
            if handler.core().send.is_empty() {
                break;
            }
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        core: HandlerCore,
    }

    impl IoHandler for Plain {
        fn core(&self) -> &HandlerCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut HandlerCore {
            &mut self.core
        }
    }

    fn plain() -> Plain {
        Plain {
            core: HandlerCore::new(&MuxConfig::default()),
        }
    }

    #[test]
    fn test_send_internal_dropped_when_not_writable() {
        let mut handler = plain();
        handler.core_mut().send_internal(b"dropped").unwrap();
        assert!(handler.core().send.is_empty());
    }

    #[test]
    fn test_send_internal_triggers_single_drain() {
        let mut handler = plain();
        let mut drain_rx = test_util::make_writable(&mut handler.core);

        handler.core_mut().send_internal(b"one").unwrap();
        handler.core_mut().send_internal(b"two").unwrap();

        // Only the first append fires the signal; the second sees a drain
        // already in flight and just buffers.
        assert!(drain_rx.try_recv().is_ok());
        assert!(drain_rx.try_recv().is_err());
        assert_eq!(handler.core().send.len(), 6);
    }

    #[test]
    fn test_on_sent_requests_next_drain_when_bytes_remain() {
        let mut handler = plain();
        let mut drain_rx = test_util::make_writable(&mut handler.core);

        handler.core_mut().send_internal(b"abcdef").unwrap();
        assert!(drain_rx.try_recv().is_ok());

        // Partial drain: completion must re-arm.
        let mut chunk = [0u8; 4];
        handler.core_mut().send.take(&mut chunk);
        handler.on_sent(4).unwrap();
        assert!(drain_rx.try_recv().is_ok());

        // Full drain: completion goes idle.
        let n = handler.core_mut().send.take(&mut chunk);
        assert_eq!(n, 2);
        handler.on_sent(2).unwrap();
        assert!(drain_rx.try_recv().is_err());
    }

    #[test]
    fn test_reset_clears_buffers_and_sending_flag() {
        let mut handler = plain();
        let _drain_rx = test_util::make_writable(&mut handler.core);

        handler.on_receive(b"inbound").unwrap();
        handler.core_mut().send_internal(b"outbound").unwrap();
        handler.reset();

        assert!(handler.core().recv.is_empty());
        assert!(handler.core().send.is_empty());

        // After reset the next send must trigger a fresh drain.
        let mut drain_rx = test_util::make_writable(&mut handler.core);
        handler.core_mut().send_internal(b"again").unwrap();
        assert!(drain_rx.try_recv().is_ok());
    }

    #[test]
    fn test_receive_overflow_is_an_error() {
        let mut handler = plain();
        let big = vec![0u8; handler.core().recv.capacity() + 1];
        assert!(handler.on_receive(&big).is_err());
    }

    #[test]
    fn test_closure_factory_produces_fresh_handlers() {
        let factory = || plain();
        let mut first = factory.create_handler();
        let second = factory.create_handler();

        first.on_receive(b"only in first").unwrap();
        assert_eq!(first.core().recv.len(), 13);
        assert!(second.core().recv.is_empty());
    }
}
