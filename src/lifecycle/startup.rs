//! Startup orchestration.
//!
//! # Responsibilities
//! - Create the connection registry for this run
//! - Bind the listener and begin accepting traffic
//! - Start the timeout monitor
//! - Tear everything down in order on stop
//!
//! # Design Decisions
//! - Fail fast: a bind error is returned and nothing keeps running
//! - Listener and monitor share the registry handle; nothing else does

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::liveness::{MonitorHandle, TimeoutMonitor};
use crate::net::{ConnectionContext, Listener, ListenerError};
use crate::protocol::{LoggingHandler, MessageHandler};
use crate::registry::ConnectionRegistry;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to read local address: {0}")]
    LocalAddr(std::io::Error),
}

/// A configured, not yet started server.
pub struct Server {
    config: ServerConfig,
    handler: Arc<dyn MessageHandler>,
}

impl Server {
    /// Create a server that logs every received frame.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            handler: Arc::new(LoggingHandler),
        }
    }

    /// Replace the payload handler.
    pub fn with_handler(mut self, handler: impl MessageHandler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Bind and start serving. Returns once the socket is listening.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let listener = Listener::bind(&self.config.listener).await?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let registry = ConnectionRegistry::spawn();
        let shutdown = Shutdown::new();

        let context = ConnectionContext {
            registry: registry.clone(),
            handler: self.handler,
            limits: self.config.limits,
            on_payload_mismatch: self.config.protocol.on_payload_mismatch,
        };
        let listener_task = tokio::spawn(listener.serve(context, shutdown.subscribe()));

        let monitor = if self.config.monitor.enabled {
            Some(TimeoutMonitor::new(registry.clone(), self.config.monitor.clone()).spawn())
        } else {
            tracing::info!("Timeout monitor disabled");
            None
        };

        tracing::info!(address = %local_addr, "Server listening");

        Ok(RunningServer {
            local_addr,
            registry,
            shutdown,
            listener_task,
            monitor,
        })
    }
}

/// A server that is accepting connections.
pub struct RunningServer {
    local_addr: SocketAddr,
    registry: ConnectionRegistry,
    shutdown: Shutdown,
    listener_task: JoinHandle<()>,
    monitor: Option<MonitorHandle>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Serve until `signal` resolves, then stop.
    pub async fn run_until<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.stop().await;
    }

    /// Stop sweeping, close the passive socket, and close every connection.
    pub async fn stop(self) {
        tracing::info!("Server stopping");

        if let Some(monitor) = self.monitor {
            monitor.stop().await;
        }

        self.shutdown.trigger();
        if let Err(e) = self.listener_task.await {
            tracing::error!(error = %e, "Listener task failed");
        }

        tracing::info!("Server stopped");
    }
}
