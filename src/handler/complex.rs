//! Typed message/stream protocol: 12-byte header (4-byte type tag +
//! 8-byte length, both big-endian) followed by the payload.
//!
//! Two frame kinds share the header:
//! - `Message` (tag 1): bounded by the configured maximum and delivered
//!   atomically, like the simple protocol.
//! - `ByteStream` (tag 2): declares a total length up front and is drained
//!   incrementally into a growable sink; one completion event fires once
//!   the declared length has been fully received. Anything larger than the
//!   message bound should travel as a stream.
//!
//! Outbound streams piggyback on the single-inflight-send chain: the header
//! goes out immediately and every send completion pulls the next slice of
//! the source into the send ring until it is exhausted.

use bytes::{Bytes, BytesMut};
use tracing::debug;

use super::{HandlerCore, IoHandler, MessageCallback};
use crate::error::{MuxError, Result};
use crate::mux::MuxConfig;

/// Header size in bytes: 4-byte type tag + 8-byte payload length.
const HEADER_SIZE: usize = 12;

/// Default maximum bounded-message payload (4 KiB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;

/// Initial capacity reserved for the stream sink (4 MiB). The sink grows
/// past this as needed; it is a starting size, not a bound.
pub const INITIAL_STREAM_SINK_CAPACITY: usize = 4 * 1024 * 1024;

/// Frame type tag for a bounded message.
const TYPE_MESSAGE: i32 = 1;

/// Frame type tag for an unbounded byte stream.
const TYPE_BYTE_STREAM: i32 = 2;

/// Callback invoked once with the fully reassembled stream contents.
pub type StreamCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Handler supporting both bounded messages and length-declared byte
/// streams over one connection.
pub struct ComplexMessageHandler {
    core: HandlerCore,
    scratch: Vec<u8>,
    on_message: Option<MessageCallback>,
    on_stream: Option<StreamCallback>,
    /// Reassembly sink for the stream currently being received.
    /// Lazily allocated on the first stream frame, then reused.
    sink: Option<BytesMut>,
    /// Bytes still expected for the in-flight inbound stream.
    stream_read_left: u64,
    /// Remainder of the outbound stream being pumped through `on_sent`.
    out_source: Option<Bytes>,
}

impl ComplexMessageHandler {
    /// Create a handler with the default maximum message size.
    pub fn new(config: &MuxConfig) -> Self {
        Self::with_max_message_size(config, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a handler with a custom maximum bounded-message size.
    pub fn with_max_message_size(config: &MuxConfig, max_message_size: usize) -> Self {
        Self {
            core: HandlerCore::new(config),
            scratch: vec![0u8; max_message_size],
            on_message: None,
            on_stream: None,
            sink: None,
            stream_read_left: 0,
            out_source: None,
        }
    }

    /// Install the callback invoked with each decoded bounded message.
    pub fn with_message_callback(mut self, callback: MessageCallback) -> Self {
        self.on_message = Some(callback);
        self
    }

    /// Install the callback invoked once per fully received stream.
    pub fn with_stream_callback(mut self, callback: StreamCallback) -> Self {
        self.on_stream = Some(callback);
        self
    }

    /// Stage a bounded message: 12-byte header (tag 1) + payload.
    ///
    /// Empty payloads are a no-op.
    pub fn send_message(&mut self, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }

        self.core
            .send_internal(&encode_header(TYPE_MESSAGE, payload.len() as i64))?;
        self.core.send_internal(payload)?;
        debug!(len = payload.len(), "queued complex message");
        Ok(())
    }

    /// Begin sending a byte stream: the 12-byte header (tag 2, total
    /// length) is staged immediately, and each subsequent send completion
    /// forwards up to `min(send_ring_available, bytes_left)` bytes from
    /// `source` until it is exhausted.
    ///
    /// Empty sources are a no-op.
    pub fn send_stream(&mut self, source: Bytes) -> Result<()> {
        if source.is_empty() {
            return Ok(());
        }

        debug!(len = source.len(), "queued byte stream");
        self.core
            .send_internal(&encode_header(TYPE_BYTE_STREAM, source.len() as i64))?;
        self.out_source = Some(source);
        Ok(())
    }

    /// Decode loop: parse headers while no stream is mid-flight, drain the
    /// in-flight stream otherwise. Runs until the receive ring starves.
    fn decode_frames(&mut self) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        loop {
            if self.stream_read_left > 0 {
                // Resume the in-flight stream without re-reading its header.
                if self.drain_stream_payload() == 0 {
                    break;
                }
                continue;
            }

            if self.core.recv.peek(&mut header) < HEADER_SIZE {
                break;
            }

            let tag = i32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            let length = i64::from_be_bytes([
                header[4], header[5], header[6], header[7], header[8], header[9], header[10],
                header[11],
            ]);
            if length < 0 {
                return Err(MuxError::Protocol(format!(
                    "negative payload length {length}"
                )));
            }

            match tag {
                TYPE_MESSAGE => {
                    if length as u64 > self.scratch.len() as u64 {
                        return Err(MuxError::MessageTooLarge {
                            length: length as u64,
                            max: self.scratch.len(),
                        });
                    }
                    if HEADER_SIZE + length as usize > self.core.recv.len() {
                        // Partial frame; wait for more bytes.
                        break;
                    }

                    self.core.recv.skip(HEADER_SIZE);
                    let count = self.core.recv.take(&mut self.scratch[..length as usize]);
                    if let Some(callback) = self.on_message.as_mut() {
                        callback(&self.scratch[..count]);
                    }
                }
                TYPE_BYTE_STREAM => {
                    let sink = self
                        .sink
                        .get_or_insert_with(|| BytesMut::with_capacity(INITIAL_STREAM_SINK_CAPACITY));
                    sink.clear();
                    self.stream_read_left = length as u64;
                    self.core.recv.skip(HEADER_SIZE);
                    // Covers the zero-length stream, which completes here.
                    self.drain_stream_payload();
                }
                other => {
                    return Err(MuxError::Protocol(format!("unknown frame type tag {other}")));
                }
            }
        }
        Ok(())
    }

    /// Move one scratch-sized step of the in-flight stream from the receive
    /// ring into the sink; fires the stream-complete callback exactly once
    /// when the declared length is reached. Returns the bytes consumed.
    fn drain_stream_payload(&mut self) -> usize {
        let want = self.stream_read_left.min(self.scratch.len() as u64) as usize;
        let count = self.core.recv.take(&mut self.scratch[..want]);

        let sink = self.sink.as_mut().expect("stream sink initialized");
        sink.extend_from_slice(&self.scratch[..count]);
        self.stream_read_left -= count as u64;

        if self.stream_read_left == 0 {
            if let (Some(callback), Some(sink)) = (self.on_stream.as_mut(), self.sink.as_ref()) {
                callback(&sink[..]);
            }
        }

        count
    }
}

impl IoHandler for ComplexMessageHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn on_receive(&mut self, data: &[u8]) -> Result<()> {
        self.core.buffer_received(data)?;
        self.decode_frames()
    }

    fn on_sent(&mut self, bytes: usize) -> Result<()> {
        let _ = bytes;
        self.core.on_sent();

        // Pump the outbound stream: refill the send ring with the next
        // slice of the source so the drain chain keeps running.
        if let Some(mut source) = self.out_source.take() {
            let want = source.len().min(self.core.send_available());
            let chunk = source.split_to(want);
            if !source.is_empty() {
                self.out_source = Some(source);
            }
            if !chunk.is_empty() {
                self.core.send_internal(&chunk)?;
            }
        }
        Ok(())
    }
}

fn encode_header(tag: i32, length: i64) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(&tag.to_be_bytes());
    header[4..].copy_from_slice(&length.to_be_bytes());
    header
}
