//! Server role: accept inbound connections indefinitely.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::conn::drive_connection;
use super::MuxConfig;
use crate::error::Result;
use crate::handler::HandlerFactory;

/// TCP server driving one handler per accepted connection.
///
/// One accept is outstanding at a time; each accepted socket gets its own
/// task, a fresh handler from the factory, and is always closed on
/// disconnect (accepted sockets are never reused).
///
/// # Example
///
/// ```ignore
/// use tcpmux::{EchoHandlerFactory, MuxConfig, TcpServer};
///
/// let config = MuxConfig::default();
/// let factory = EchoHandlerFactory::new(config.clone());
/// let mut server = TcpServer::new("127.0.0.1:9000".parse()?, factory, config);
/// server.start().await?;
/// // ...
/// server.stop();
/// ```
pub struct TcpServer<F: HandlerFactory> {
    listen_addr: SocketAddr,
    factory: Arc<F>,
    config: MuxConfig,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl<F: HandlerFactory> TcpServer<F> {
    /// Create a server for the given listen address. No socket is opened
    /// until [`start`](Self::start).
    pub fn new(listen_addr: SocketAddr, factory: F, config: MuxConfig) -> Self {
        Self {
            listen_addr,
            factory: Arc::new(factory),
            config,
            shutdown: None,
            task: None,
            local_addr: None,
        }
    }

    /// Bind the listener and spawn the accept loop.
    pub async fn start(&mut self) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        self.local_addr = Some(listener.local_addr()?);
        info!("server started, now listening on {:?}", self.local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown = Some(shutdown_tx);

        let factory = self.factory.clone();
        let config = self.config.clone();
        self.task = Some(tokio::spawn(accept_loop(
            listener,
            factory,
            config,
            shutdown_rx,
        )));
        Ok(())
    }

    /// Signal the accept loop and every live connection to stop.
    pub fn stop(&self) {
        if let Some(shutdown) = &self.shutdown {
            let _ = shutdown.send(true);
        }
    }

    /// The bound address once started; useful when listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Wait for the accept loop to finish after [`stop`](Self::stop).
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn accept_loop<F: HandlerFactory>(
    listener: TcpListener,
    factory: Arc<F>,
    config: MuxConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        debug!("waiting for new connections");
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.wait_for(|stopped| *stopped) => {
                info!("server stopped, no longer accepting");
                return;
            }
        };

        match accepted {
            Ok((stream, peer)) => {
                info!(%peer, "new connection");
                let handler = Arc::new(Mutex::new(factory.create_handler()));
                let config = config.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    // The accepted socket is dropped (closed) when the
                    // driver returns; it is never recycled.
                    drive_connection(stream, handler, &config, shutdown).await;
                });
            }
            Err(e) => {
                error!("accept failed: {e}");
                return;
            }
        }
    }
}
