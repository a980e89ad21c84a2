//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Register each connection and drive its reads
//! - Deregister connections when their transport ends

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tokio::time::Instant;

use crate::config::{FrameLimits, ListenerConfig, PayloadMismatchPolicy};
use crate::net::connection::{CloseSignal, ConnectionId, TcpConnection};
use crate::net::transport::{FrameReader, ReadError};
use crate::observability::metrics;
use crate::protocol::{MessageHandler, Next, ReadStateMachine};
use crate::registry::ConnectionRegistry;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(std::io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = config.socket_addr().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure). The semaphore is never closed.
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|e| {
                ListenerError::Accept(std::io::Error::new(std::io::ErrorKind::Other, e))
            })?;

        // Then accept the connection
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Accept until shutdown, then close the passive socket and clear the registry.
    pub async fn serve(self, context: ConnectionContext, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Listener received shutdown signal, exiting loop");
                    break;
                }
                accepted = self.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => context.spawn_connection(stream, peer_addr, permit),
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                },
            }
        }

        drop(self);
        context.registry.clear();
        tracing::info!("Listener stopped");
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Everything a connection task needs besides its socket.
#[derive(Clone)]
pub struct ConnectionContext {
    pub registry: ConnectionRegistry,
    pub handler: Arc<dyn MessageHandler>,
    pub limits: FrameLimits,
    pub on_payload_mismatch: PayloadMismatchPolicy,
}

/// How a connection's read loop ended.
#[derive(Debug)]
pub enum ConnectionEnd {
    /// Closed through the registry (eviction, shutdown).
    Closed,
    /// The state machine asked for the connection to be dropped.
    Protocol,
    /// The peer went away or the socket failed.
    Transport(ReadError),
}

impl ConnectionContext {
    fn spawn_connection(&self, stream: TcpStream, peer_addr: SocketAddr, permit: ConnectionPermit) {
        let id = ConnectionId::new();
        let (connection, close) = TcpConnection::new(id, peer_addr, Instant::now());
        self.registry.add(connection);
        metrics::record_connection_accepted();
        tracing::info!(connection_id = %id, peer_addr = %peer_addr, "New client");

        let context = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let end = context.drive(id, stream, close).await;
            context.finish(id, peer_addr, end);
        });
    }

    /// Run one connection's read loop until it ends.
    pub async fn drive<R>(&self, id: ConnectionId, stream: R, mut close: CloseSignal) -> ConnectionEnd
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = FrameReader::new(stream, self.limits.max_header_bytes);
        let mut machine = ReadStateMachine::new(
            id,
            self.registry.clone(),
            Arc::clone(&self.handler),
            self.limits,
            self.on_payload_mismatch,
        );

        let mut next = machine.start();
        loop {
            let request = match next {
                Next::Read(request) => request,
                Next::Idle => {
                    tracing::warn!(connection_id = %id, "No read armed, waiting for eviction");
                    close.closed().await;
                    return ConnectionEnd::Closed;
                }
                Next::Close => return ConnectionEnd::Protocol,
            };

            let bytes = tokio::select! {
                biased;
                _ = close.closed() => return ConnectionEnd::Closed,
                read = reader.read(request) => match read {
                    Ok(bytes) => bytes,
                    Err(e) => return ConnectionEnd::Transport(e),
                },
            };
            next = machine.on_read(bytes, Instant::now());
        }
    }

    fn finish(&self, id: ConnectionId, peer_addr: SocketAddr, end: ConnectionEnd) {
        match end {
            ConnectionEnd::Closed => {
                tracing::debug!(connection_id = %id, peer_addr = %peer_addr, "Connection closed by server");
            }
            ConnectionEnd::Protocol => {
                tracing::info!(connection_id = %id, peer_addr = %peer_addr, "Dropping connection after framing error");
                self.registry.remove_and_disconnect(id);
            }
            ConnectionEnd::Transport(ReadError::Closed) => {
                tracing::info!(connection_id = %id, peer_addr = %peer_addr, "Client disconnected");
                self.registry.remove(id);
            }
            ConnectionEnd::Transport(e) => {
                tracing::warn!(connection_id = %id, peer_addr = %peer_addr, error = %e, "Connection failed");
                self.registry.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode, LoggingHandler, Message, MessageKind};
    use std::sync::Mutex;

    fn context(policy: PayloadMismatchPolicy, handler: Arc<dyn MessageHandler>) -> ConnectionContext {
        ConnectionContext {
            registry: ConnectionRegistry::spawn(),
            handler,
            limits: FrameLimits::default(),
            on_payload_mismatch: policy,
        }
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let first = Listener::bind(&ListenerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1,
        })
        .await
        .unwrap();
        let taken = first.local_addr().unwrap().port();

        let second = Listener::bind(&ListenerConfig {
            host: "127.0.0.1".into(),
            port: taken,
            max_connections: 1,
        })
        .await;
        assert!(matches!(second, Err(ListenerError::Bind(_))));
    }

    #[tokio::test]
    async fn drive_dispatches_frames_until_eof() {
        let received = Arc::new(Mutex::new(Vec::<Message>::new()));
        let sink = Arc::clone(&received);
        let ctx = context(
            PayloadMismatchPolicy::Disconnect,
            Arc::new(move |_: ConnectionId, m: Message| sink.lock().unwrap().push(m)),
        );

        let mut wire = encode(MessageKind::Heartbeat, &[]);
        wire.extend(b"garbage\r\n");
        wire.extend(encode(MessageKind::Text, b"hello"));
        wire.extend(encode(MessageKind::Audio, &[1, 2, 3]));

        let id = ConnectionId::new();
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let (conn, close) = TcpConnection::new(id, peer, Instant::now());
        ctx.registry.add(conn);

        let end = ctx.drive(id, wire.as_slice(), close).await;
        assert!(matches!(end, ConnectionEnd::Transport(ReadError::Closed)));

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].payload(), b"hello");
        assert_eq!(received[1].kind, MessageKind::Audio);
    }

    #[tokio::test]
    async fn short_payload_triggers_protocol_close() {
        let ctx = context(PayloadMismatchPolicy::Disconnect, Arc::new(LoggingHandler));
        let wire = b"{\"type\":\"image\",\"size\":\"10\"}\r\nabc".to_vec();

        let id = ConnectionId::new();
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let (conn, close) = TcpConnection::new(id, peer, Instant::now());
        ctx.registry.add(conn);

        let end = ctx.drive(id, wire.as_slice(), close).await;
        assert!(matches!(end, ConnectionEnd::Protocol));
    }

    #[tokio::test]
    async fn stalled_connection_waits_for_close() {
        let ctx = context(PayloadMismatchPolicy::Stall, Arc::new(LoggingHandler));
        let wire = b"{\"type\":\"image\",\"size\":\"10\"}\r\nabc".to_vec();

        let id = ConnectionId::new();
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let (conn, close) = TcpConnection::new(id, peer, Instant::now());
        ctx.registry.add(conn);

        let registry = ctx.registry.clone();
        let task = tokio::spawn(async move { ctx.drive(id, wire.as_slice(), close).await });

        tokio::task::yield_now().await;
        assert!(registry.lookup(id).await.is_some());

        registry.remove_and_disconnect(id);
        let end = task.await.unwrap();
        assert!(matches!(end, ConnectionEnd::Closed));
    }
}
