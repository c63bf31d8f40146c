//! Echo handler: sends every received byte straight back.
//!
//! No framing; useful for demos, integration tests, and as the smallest
//! possible [`IoHandler`] variant.

use tracing::debug;

use super::{HandlerCore, HandlerFactory, IoHandler};
use crate::error::Result;
use crate::mux::MuxConfig;

/// Size of the bounce buffer used per receive event.
const ECHO_CHUNK_SIZE: usize = 4096;

/// Handler echoing received bytes back to the peer.
pub struct EchoHandler {
    core: HandlerCore,
    scratch: Vec<u8>,
}

impl EchoHandler {
    /// Create an echo handler sized from the mux configuration.
    pub fn new(config: &MuxConfig) -> Self {
        Self {
            core: HandlerCore::new(config),
            scratch: vec![0u8; ECHO_CHUNK_SIZE],
        }
    }
}

impl IoHandler for EchoHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn on_receive(&mut self, data: &[u8]) -> Result<()> {
        self.core.buffer_received(data)?;

        // One receive event is at most one chunk, so a single take drains it.
        let count = self.core.recv.take(&mut self.scratch);
        if count > 0 {
            debug!(bytes = count, "echoing");
            self.core.send_internal(&self.scratch[..count])?;
        }
        Ok(())
    }
}

/// Factory producing one [`EchoHandler`] per connection.
pub struct EchoHandlerFactory {
    config: MuxConfig,
}

impl EchoHandlerFactory {
    /// Create a factory using the given mux configuration.
    pub fn new(config: MuxConfig) -> Self {
        Self { config }
    }
}

impl HandlerFactory for EchoHandlerFactory {
    type Handler = EchoHandler;

    fn create_handler(&self) -> EchoHandler {
        EchoHandler::new(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_util::make_writable;

    #[test]
    fn test_echoes_received_bytes() {
        let mut handler = EchoHandler::new(&MuxConfig::default());
        let _drain_rx = make_writable(handler.core_mut());

        handler.on_receive(b"bounce me").unwrap();

        let mut out = [0u8; 16];
        let n = handler.core_mut().send.take(&mut out);
        assert_eq!(&out[..n], b"bounce me");
        assert!(handler.core().recv.is_empty());
    }

    #[test]
    fn test_factory_produces_fresh_handlers() {
        let factory = EchoHandlerFactory::new(MuxConfig::default());
        let mut first = factory.create_handler();
        let second = factory.create_handler();

        first.core_mut().buffer_received(b"x").unwrap();
        assert!(second.core().recv.is_empty());
    }
}
