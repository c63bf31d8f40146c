//! Greeting client - framed messaging over a reconnecting client.
//!
//! This example demonstrates:
//! - Building a `TcpClient` with a list of candidate endpoints
//! - Wrapping `SimpleMessageHandler` to send a message once the
//!   connection becomes writable
//! - Receiving decoded messages through a callback
//!
//! Run the `echo_server` example first; the echoed frame comes back and
//! is decoded into the same greeting.
//!
//! ```sh
//! cargo run --example greeting_client
//! ```

use tcpmux::{HandlerCore, IoHandler, MuxConfig, SimpleMessageHandler, TcpClient};

/// Sends one framed greeting on connect and prints whatever framed
/// messages arrive.
struct GreetingHandler {
    inner: SimpleMessageHandler,
}

impl IoHandler for GreetingHandler {
    fn core(&self) -> &HandlerCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        self.inner.core_mut()
    }

    fn on_receive(&mut self, data: &[u8]) -> tcpmux::Result<()> {
        self.inner.on_receive(data)
    }

    fn on_writable_changed(&mut self, writable: bool) -> tcpmux::Result<()> {
        if writable {
            self.inner.send(b"hello from the greeting client")?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9000".to_string())
        .parse()?;

    let config = MuxConfig::default();
    let factory = {
        let config = config.clone();
        move || GreetingHandler {
            inner: SimpleMessageHandler::new(&config).with_message_callback(Box::new(
                |payload| {
                    println!("received: {}", String::from_utf8_lossy(payload));
                },
            )),
        }
    };

    let mut client = TcpClient::new(vec![endpoint], factory, config)?;
    client.start();

    tokio::signal::ctrl_c().await?;
    client.stop();

    Ok(())
}
