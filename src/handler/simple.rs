//! Simple message protocol: 4-byte big-endian length prefix + payload.
//!
//! The decode loop re-runs on every received chunk and tolerates arbitrary
//! fragmentation: a frame split across any number of receive events is
//! reassembled from the receive ring, and one receive event may carry many
//! complete frames.

use tracing::debug;

use super::{HandlerCore, IoHandler, MessageCallback};
use crate::error::{MuxError, Result};
use crate::mux::MuxConfig;

/// Length-prefix header size in bytes.
const HEADER_SIZE: usize = 4;

/// Default maximum payload length accepted or staged (32 KiB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 * 1024;

/// Handler framing the byte stream into length-prefixed messages.
///
/// Decoded payloads are handed to the message callback as a view over a
/// reusable scratch buffer; a declared length above the configured maximum
/// is fatal for the connection.
pub struct SimpleMessageHandler {
    core: HandlerCore,
    scratch: Vec<u8>,
    on_message: Option<MessageCallback>,
}

impl SimpleMessageHandler {
    /// Create a handler with the default maximum message size.
    pub fn new(config: &MuxConfig) -> Self {
        Self::with_max_message_size(config, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a handler with a custom maximum message size.
    pub fn with_max_message_size(config: &MuxConfig, max_message_size: usize) -> Self {
        Self {
            core: HandlerCore::new(config),
            scratch: vec![0u8; max_message_size],
            on_message: None,
        }
    }

    /// Install the callback invoked with each decoded message payload.
    pub fn with_message_callback(mut self, callback: MessageCallback) -> Self {
        self.on_message = Some(callback);
        self
    }

    /// Stage a message for sending: 4-byte big-endian length, then payload.
    ///
    /// Empty payloads are a no-op. The two `send_internal` calls rely on
    /// send-ring ordering, so the header is never interleaved with other
    /// bytes as long as the connection's exclusive ownership holds.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }

        let header = (payload.len() as u32).to_be_bytes();
        self.core.send_internal(&header)?;
        self.core.send_internal(payload)?;
        debug!(len = payload.len(), "queued simple message");
        Ok(())
    }

    /// Extract every complete frame currently buffered, leaving partial
    /// frames for the next receive event.
    fn decode_frames(&mut self) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        while self.core.recv.peek(&mut header) == HEADER_SIZE {
            let payload_len = u32::from_be_bytes(header) as usize;
            if payload_len > self.scratch.len() {
                return Err(MuxError::MessageTooLarge {
                    length: payload_len as u64,
                    max: self.scratch.len(),
                });
            }

            if HEADER_SIZE + payload_len > self.core.recv.len() {
                // Partial frame; wait for more bytes.
                break;
            }

            self.core.recv.skip(HEADER_SIZE);
            let count = self.core.recv.take(&mut self.scratch[..payload_len]);
            if let Some(callback) = self.on_message.as_mut() {
                callback(&self.scratch[..count]);
            }
        }
        Ok(())
    }
}

impl IoHandler for SimpleMessageHandler {
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
}
