//! Echo server - smallest possible server setup.
//!
//! This example demonstrates:
//! - Building a `TcpServer` from a handler factory
//! - The built-in `EchoHandler`, which bounces every byte back
//! - Graceful shutdown on Ctrl-C
//!
//! # Trying it out
//!
//! ```sh
//! cargo run --example echo_server
//! # in another terminal:
//! nc 127.0.0.1 9000
//! ```

use tcpmux::{EchoHandlerFactory, MuxConfig, TcpServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let listen_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9000".to_string())
        .parse()?;

    let config = MuxConfig::default();
    let factory = EchoHandlerFactory::new(config.clone());
    let mut server = TcpServer::new(listen_addr, factory, config);
    server.start().await?;

    // Serve until interrupted
    tokio::signal::ctrl_c().await?;
    server.stop();

    Ok(())
}
