//! Connection identity and lifecycle handles.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing and registry lookup
//! - Define the [`Connection`] interface the registry stores
//! - Pair each TCP connection with a close signal its read task listens on

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::time::Instant;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A live connection as seen by the registry.
///
/// Owned by the registry from acceptance until removal.
pub trait Connection: Send + 'static {
    fn id(&self) -> ConnectionId;

    fn last_activity(&self) -> Instant;

    fn set_last_activity(&mut self, at: Instant);

    /// Ask the transport to close. Must be idempotent.
    fn close(&mut self);
}

/// Registry-side handle of an accepted TCP connection.
///
/// The socket itself lives in the connection's read task; closing this
/// handle (or dropping it) wakes that task through its [`CloseSignal`].
#[derive(Debug)]
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    last_activity: Instant,
    close_tx: watch::Sender<bool>,
}

impl TcpConnection {
    /// Create the handle and the signal the read task waits on.
    pub fn new(id: ConnectionId, peer_addr: SocketAddr, accepted_at: Instant) -> (Self, CloseSignal) {
        let (close_tx, close_rx) = watch::channel(false);
        let connection = Self {
            id,
            peer_addr,
            last_activity: accepted_at,
            close_tx,
        };
        (connection, CloseSignal { rx: close_rx })
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn last_activity(&self) -> Instant {
        self.last_activity
    }

    fn set_last_activity(&mut self, at: Instant) {
        self.last_activity = at;
    }

    fn close(&mut self) {
        if !self.close_tx.send_replace(true) {
            tracing::debug!(connection_id = %self.id, peer_addr = %self.peer_addr, "Closing connection");
        }
    }
}

/// Read-task side of a connection's close signal.
#[derive(Debug, Clone)]
pub struct CloseSignal {
    rx: watch::Receiver<bool>,
}

impl CloseSignal {
    /// Resolve once the connection is closed or its registry handle is gone.
    pub async fn closed(&mut self) {
        // Err means the sender was dropped, which counts as closed.
        let _ = self.rx.wait_for(|closed| *closed).await;
    }
}
