//! Client role: connect to one of a configured endpoint list and
//! reconnect with a fixed backoff until stopped.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::conn::{drive_connection, DisconnectReason};
use super::MuxConfig;
use crate::error::{MuxError, Result};
use crate::handler::HandlerFactory;

/// Round-robin selection over an ordered endpoint list.
///
/// The attempt counter picks `endpoints[attempts % len]`; consecutive
/// connect failures walk the whole list, and a success (or a disconnect
/// after a successful connection) rewinds to the first endpoint.
struct EndpointCycle {
    endpoints: Vec<SocketAddr>,
    attempts: usize,
}

impl EndpointCycle {
    fn new(endpoints: Vec<SocketAddr>) -> Self {
        Self {
            endpoints,
            attempts: 0,
        }
    }

    fn current(&self) -> SocketAddr {
        self.endpoints[self.attempts % self.endpoints.len()]
    }

    fn attempt(&self) -> usize {
        self.attempts
    }

    fn record_failure(&mut self) {
        self.attempts += 1;
    }

    fn rewind(&mut self) {
        self.attempts = 0;
    }
}

/// TCP client connecting to the first reachable endpoint of a configured
/// list, retrying forever with a fixed delay.
///
/// Behavior on the three ways a connection can end:
/// - connect failure: wait `reconnect_delay`, try the next endpoint;
/// - disconnect after a successful connection (server closed it, or a
///   receive/send error): wait `reconnect_delay`, reconnect starting from
///   the first endpoint;
/// - [`stop`](Self::stop): release the socket and return, even when the
///   stop arrives during a backoff wait.
///
/// # Example
///
/// ```ignore
/// use tcpmux::{MuxConfig, SimpleMessageHandler, TcpClient};
///
/// let config = MuxConfig::default();
/// let factory = {
///     let config = config.clone();
///     move || {
///         SimpleMessageHandler::new(&config)
///             .with_message_callback(Box::new(|payload| println!("{payload:?}")))
///     }
/// };
/// let mut client = TcpClient::new(vec!["127.0.0.1:9000".parse()?], factory, config)?;
/// client.start();
/// // ...
/// client.stop();
/// ```
pub struct TcpClient<F: HandlerFactory> {
    endpoints: Vec<SocketAddr>,
    factory: Arc<F>,
    config: MuxConfig,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl<F: HandlerFactory> TcpClient<F> {
    /// Create a client for the given candidate endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Config`] if the endpoint list is empty.
    pub fn new(endpoints: Vec<SocketAddr>, factory: F, config: MuxConfig) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(MuxError::Config("endpoint list must not be empty".into()));
        }
        Ok(Self {
            endpoints,
            factory: Arc::new(factory),
            config,
            shutdown: None,
            task: None,
        })
    }

    /// Spawn the connect/reconnect loop.
    pub fn start(&mut self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown = Some(shutdown_tx);

        let endpoints = self.endpoints.clone();
        let factory = self.factory.clone();
        let config = self.config.clone();
        self.task = Some(tokio::spawn(client_loop(
            endpoints,
            factory,
            config,
            shutdown_rx,
        )));
    }

    /// Signal shutdown: a live connection is released, a pending backoff
    /// wait is cancelled, and no further connect attempt is made.
    pub fn stop(&self) {
        if let Some(shutdown) = &self.shutdown {
            let _ = shutdown.send(true);
        }
    }

    /// Wait for the connect loop to finish after [`stop`](Self::stop).
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn client_loop<F: HandlerFactory>(
    endpoints: Vec<SocketAddr>,
    factory: Arc<F>,
    config: MuxConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut cycle = EndpointCycle::new(endpoints);

    loop {
        let target = cycle.current();
        info!(
            "connecting to {target} with attempt count: {}",
            cycle.attempt() + 1
        );

        let connected = tokio::select! {
            result = TcpStream::connect(target) => result,
            _ = shutdown.wait_for(|stopped| *stopped) => {
                debug!("client stopped while connecting");
                return;
            }
        };

        match connected {
            Ok(stream) => {
                info!("connected to {target}");
                cycle.rewind();

                let handler = Arc::new(Mutex::new(factory.create_handler()));
                let reason =
                    drive_connection(stream, handler, &config, shutdown.clone()).await;
                if reason == DisconnectReason::Stopped {
                    debug!("client stopped, releasing socket");
                    return;
                }

                info!(
                    "connection with {target} was closed, reconnect in {:?}",
                    config.reconnect_delay
                );
                if backoff(&config, &mut shutdown).await {
                    return;
                }
                cycle.rewind();
            }
            Err(e) => {
                error!(
                    "failed to connect to {target}: {e}, retry in {:?}",
                    config.reconnect_delay
                );
                if backoff(&config, &mut shutdown).await {
                    return;
                }
                cycle.record_failure();
            }
        }
    }
}

/// Sleep for the reconnect delay unless shutdown is signalled first.
/// Returns true when the client should give up the loop.
async fn backoff(config: &MuxConfig, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = sleep(config.reconnect_delay) => false,
        _ = shutdown.wait_for(|stopped| *stopped) => {
            debug!("client stopped during reconnect backoff");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(ports: &[u16]) -> Vec<SocketAddr> {
        ports
            .iter()
            .map(|p| SocketAddr::from(([127, 0, 0, 1], *p)))
            .collect()
    }

    #[test]
    fn test_cycle_walks_endpoints_on_failure() {
        let endpoints = addrs(&[9001, 9002, 9003]);
        let mut cycle = EndpointCycle::new(endpoints.clone());

        // Three consecutive failures target A, B, C in order.
        let mut targets = Vec::new();
        for _ in 0..3 {
            targets.push(cycle.current());
            cycle.record_failure();
        }
        assert_eq!(targets, endpoints);

        // A fourth failure wraps back to A.
        assert_eq!(cycle.current(), endpoints[0]);
    }

    #[test]
    fn test_cycle_rewinds_after_success() {
        let endpoints = addrs(&[9001, 9002, 9003]);
        let mut cycle = EndpointCycle::new(endpoints.clone());

        cycle.record_failure();
        cycle.record_failure();
        assert_eq!(cycle.current(), endpoints[2]);

        // Successful connect rewinds, so a later post-disconnect
        // reconnection starts from the first endpoint again.
        cycle.rewind();
        assert_eq!(cycle.current(), endpoints[0]);
        assert_eq!(cycle.attempt(), 0);
    }

    #[test]
    fn test_single_endpoint_cycle() {
        let endpoints = addrs(&[9001]);
        let mut cycle = EndpointCycle::new(endpoints.clone());

        for _ in 0..5 {
            assert_eq!(cycle.current(), endpoints[0]);
            cycle.record_failure();
        }
    }

    #[tokio::test]
    async fn test_empty_endpoint_list_rejected() {
        let config = MuxConfig::default();
        let factory = {
            let config = config.clone();
            move || crate::handler::EchoHandler::new(&config)
        };
        let result = TcpClient::new(Vec::new(), factory, config);
        assert!(matches!(result, Err(MuxError::Config(_))));
    }
}
