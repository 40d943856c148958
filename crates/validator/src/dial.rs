//! Live dial validation
//!
//! A service config is valid when a real client configured with it can open a
//! connection. [`LiveDialChecker`] owns a throwaway local gRPC server on an
//! ephemeral loopback port and dials it once per config.

use crate::client_config::{ClientServiceConfig, ServiceConfigError};
use crate::ConfigChecker;
use grpc_service_config_common::{PluginError, Result};
use std::error::Error as StdError;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Endpoint, Server};
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the server may drain connections before it is aborted
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Why a dial with a candidate config failed
#[derive(Debug, Error)]
pub enum DialError {
    #[error(transparent)]
    Config(#[from] ServiceConfigError),

    #[error("failed to connect: {}", error_chain(.0))]
    Transport(#[from] tonic::transport::Error),
}

type ServerHandle = JoinHandle<std::result::Result<(), tonic::transport::Error>>;

/// Local gRPC server plus a client that dials it with candidate configs
///
/// The server runs on a private runtime until [`LiveDialChecker::shutdown`] is
/// called or the checker is dropped; both wait for the accept loop to finish.
pub struct LiveDialChecker {
    runtime: Runtime,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<ServerHandle>,
}

impl LiveDialChecker {
    /// Bind an ephemeral loopback port and start serving on it
    pub fn start() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("service-config-dial")
            .enable_all()
            .build()?;

        let listener = runtime.block_on(TcpListener::bind((Ipv4Addr::LOCALHOST, 0)))?;
        let addr = listener.local_addr()?;

        // The health service only gives the router something to route; no
        // requests are ever made.
        let (_, health_service) = tonic_health::server::health_reporter();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = runtime.spawn(
            Server::builder()
                .add_service(health_service)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                }),
        );

        info!(%addr, "started local gRPC server for service config validation");

        Ok(Self {
            runtime,
            addr,
            shutdown: Some(shutdown_tx),
            server: Some(server),
        })
    }

    /// Address of the local server
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connect to the local server with `config` as the client's service config
    ///
    /// Blocks until the connection is established or rejected. The connection
    /// is closed again on success.
    pub fn dial(&self, config: &str) -> std::result::Result<(), DialError> {
        let config = ClientServiceConfig::from_json(config)?;
        let endpoint = config.apply(
            Endpoint::from_shared(format!("http://{}", self.addr))?.connect_timeout(CONNECT_TIMEOUT),
        );

        self.runtime.block_on(async move {
            let channel = endpoint.connect().await?;
            drop(channel);
            Ok(())
        })
    }

    /// Stop the server and wait for its accept loop to terminate
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(server) = self.server.take() else {
            return Ok(());
        };
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        let joined = self.runtime.block_on(async move {
            let mut server = server;
            match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut server).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("local gRPC server did not drain in time, aborting");
                    server.abort();
                    server.await
                }
            }
        });

        info!(addr = %self.addr, "stopped local gRPC server");

        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PluginError::Io(io::Error::other(error_chain(&e)))),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(PluginError::Io(io::Error::other(e))),
        }
    }
}

impl ConfigChecker for LiveDialChecker {
    fn check(&mut self, path: &Path, config: &str) -> Result<()> {
        match self.dial(config) {
            Ok(()) => {
                debug!(path = %path.display(), "service config accepted by client");
                Ok(())
            }
            Err(e) => Err(PluginError::InvalidServiceConfig {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }
}

impl Drop for LiveDialChecker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("failed to stop local gRPC server: {}", e);
        }
    }
}

/// Starts a [`LiveDialChecker`] the first time a config needs checking
#[derive(Default)]
pub struct OnDemandDialChecker {
    checker: Option<LiveDialChecker>,
}

impl OnDemandDialChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the local server, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.checker.as_ref().map(LiveDialChecker::local_addr)
    }

    /// Stop the local server if it was started
    pub fn shutdown(self) -> Result<()> {
        match self.checker {
            Some(checker) => checker.shutdown(),
            None => Ok(()),
        }
    }
}

impl ConfigChecker for OnDemandDialChecker {
    fn check(&mut self, path: &Path, config: &str) -> Result<()> {
        let checker = match self.checker.take() {
            Some(checker) => checker,
            None => LiveDialChecker::start()?,
        };
        self.checker.insert(checker).check(path, config)
    }
}

/// Render an error with all of its sources, outermost first
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
