//! Serialized connection registry.
//!
//! One task owns the connection map. Every other party holds a cloneable
//! [`ConnectionRegistry`] handle and submits commands over an unbounded
//! channel, so mutations are applied one at a time in submission order.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::net::connection::{Connection, ConnectionId};
use crate::observability::metrics;

/// Point-in-time view of one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: ConnectionId,
    pub last_activity: Instant,
}

enum Command {
    Add(Box<dyn Connection>),
    Remove(ConnectionId),
    RemoveAndDisconnect(ConnectionId),
    UpdateActivity(ConnectionId, Instant),
    Clear,
    Lookup(ConnectionId, oneshot::Sender<Option<ActivityRecord>>),
    Snapshot(oneshot::Sender<Vec<ActivityRecord>>),
    Count(oneshot::Sender<usize>),
}

/// Handle to the registry task.
///
/// Mutations are fire-and-forget: they return immediately and become visible
/// once the registry task has processed them. Queries are answered by the
/// same task, after every command queued before them.
#[derive(Clone)]
pub struct ConnectionRegistry {
    tx: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl ConnectionRegistry {
    /// Spawn the registry task on the current runtime.
    ///
    /// The task exits once every handle has been dropped.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(RegistryTask::default().run(rx));
        Self { tx }
    }

    fn submit(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::trace!("Registry task gone, command dropped");
        }
    }

    /// Register a newly accepted connection.
    pub fn add(&self, connection: impl Connection) {
        self.submit(Command::Add(Box::new(connection)));
    }

    /// Forget a connection without touching its transport.
    pub fn remove(&self, id: ConnectionId) {
        self.submit(Command::Remove(id));
    }

    /// Forget a connection and close its transport.
    pub fn remove_and_disconnect(&self, id: ConnectionId) {
        self.submit(Command::RemoveAndDisconnect(id));
    }

    /// Refresh a connection's liveness timestamp. Never moves it backwards.
    pub fn update_activity(&self, id: ConnectionId, at: Instant) {
        self.submit(Command::UpdateActivity(id, at));
    }

    /// Close and forget every connection.
    pub fn clear(&self) {
        self.submit(Command::Clear);
    }

    async fn query<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(command(reply_tx));
        reply_rx.await.ok()
    }

    pub async fn lookup(&self, id: ConnectionId) -> Option<ActivityRecord> {
        self.query(|reply| Command::Lookup(id, reply)).await.flatten()
    }

    /// Copy of every entry as of the moment the registry task reads it.
    pub async fn snapshot(&self) -> Vec<ActivityRecord> {
        self.query(Command::Snapshot).await.unwrap_or_default()
    }

    /// Visit a snapshot. The registry keeps serving mutations meanwhile.
    pub async fn for_each_snapshot<F>(&self, mut f: F)
    where
        F: FnMut(&ActivityRecord),
    {
        for record in self.snapshot().await.iter() {
            f(record);
        }
    }

    pub async fn count(&self) -> usize {
        self.query(Command::Count).await.unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.count().await == 0
    }
}

#[derive(Default)]
struct RegistryTask {
    connections: HashMap<ConnectionId, Box<dyn Connection>>,
}

impl RegistryTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.apply(command);
        }

        for connection in self.connections.values_mut() {
            connection.close();
        }
        tracing::debug!("Registry task stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Add(connection) => {
                let id = connection.id();
                if self.connections.contains_key(&id) {
                    tracing::warn!(connection_id = %id, "Connection already registered, ignoring");
                    return;
                }
                self.connections.insert(id, connection);
                self.publish_size();
            }
            Command::Remove(id) => {
                if self.connections.remove(&id).is_some() {
                    tracing::debug!(connection_id = %id, "Connection removed");
                    self.publish_size();
                } else {
                    tracing::trace!(connection_id = %id, "Remove for unknown connection");
                }
            }
            Command::RemoveAndDisconnect(id) => match self.connections.remove(&id) {
                Some(mut connection) => {
                    connection.close();
                    tracing::debug!(connection_id = %id, "Connection removed and closed");
                    self.publish_size();
                }
                None => tracing::trace!(connection_id = %id, "Disconnect for unknown connection"),
            },
            Command::UpdateActivity(id, at) => match self.connections.get_mut(&id) {
                Some(connection) => {
                    if at > connection.last_activity() {
                        connection.set_last_activity(at);
                    }
                }
                // Late completion for a connection already evicted.
                None => tracing::trace!(connection_id = %id, "Activity for unknown connection"),
            },
            Command::Clear => {
                for (_, mut connection) in self.connections.drain() {
                    connection.close();
                }
                self.publish_size();
            }
            Command::Lookup(id, reply) => {
                let _ = reply.send(self.connections.get(&id).map(|c| record(c.as_ref())));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.connections.values().map(|c| record(c.as_ref())).collect());
            }
            Command::Count(reply) => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    fn publish_size(&self) {
        metrics::record_active_connections(self.connections.len());
    }
}

fn record(connection: &dyn Connection) -> ActivityRecord {
    ActivityRecord {
        id: connection.id(),
        last_activity: connection.last_activity(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// In-memory connection recording whether it was closed.
    pub(crate) struct MockConnection {
        pub id: ConnectionId,
        pub last_activity: Instant,
        pub closed: Arc<AtomicBool>,
    }

    impl MockConnection {
        pub(crate) fn new(last_activity: Instant) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let conn = Self {
                id: ConnectionId::new(),
                last_activity,
                closed: Arc::clone(&closed),
            };
            (conn, closed)
        }
    }

    impl Connection for MockConnection {
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
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn count_tracks_acceptances() {
        let registry = ConnectionRegistry::spawn();
        assert!(registry.is_empty().await);

        for n in 1..=25 {
            let (conn, _) = MockConnection::new(Instant::now());
            registry.add(conn);
            assert_eq!(registry.count().await, n);
        }
    }

    #[tokio::test]
    async fn duplicate_ids_are_ignored() {
        let registry = ConnectionRegistry::spawn();
        let now = Instant::now();
        let (conn, _) = MockConnection::new(now);
        let id = conn.id;
        registry.add(conn);
        registry.add(MockConnection {
            id,
            last_activity: now,
            closed: Arc::new(AtomicBool::new(false)),
        });
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn remove_keeps_transport_open() {
        let registry = ConnectionRegistry::spawn();
        let (conn, closed) = MockConnection::new(Instant::now());
        let id = conn.id;
        registry.add(conn);
        registry.remove(id);

        assert!(registry.lookup(id).await.is_none());
        assert!(!closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn remove_and_disconnect_closes_transport() {
        let registry = ConnectionRegistry::spawn();
        let (conn, closed) = MockConnection::new(Instant::now());
        let id = conn.id;
        registry.add(conn);
        registry.remove_and_disconnect(id);

        assert!(registry.is_empty().await);
        assert!(closed.load(Ordering::SeqCst));

        // Second removal of the same id is a no-op.
        registry.remove_and_disconnect(id);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_never_moves_backwards() {
        let registry = ConnectionRegistry::spawn();
        let start = Instant::now();
        let (conn, _) = MockConnection::new(start);
        let id = conn.id;
        registry.add(conn);

        let later = start + Duration::from_secs(10);
        registry.update_activity(id, later);
        registry.update_activity(id, start + Duration::from_secs(5));

        let record = registry.lookup(id).await.unwrap();
        assert_eq!(record.last_activity, later);
    }

    #[tokio::test]
    async fn activity_for_unknown_id_is_ignored() {
        let registry = ConnectionRegistry::spawn();
        registry.update_activity(ConnectionId::new(), Instant::now());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_later_mutations() {
        let registry = ConnectionRegistry::spawn();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let (conn, _) = MockConnection::new(Instant::now());
            ids.push(conn.id);
            registry.add(conn);
        }

        let mut seen = Vec::new();
        registry
            .for_each_snapshot(|record| {
                // Mutating from inside the visit must not deadlock.
                registry.remove(record.id);
                seen.push(record.id);
            })
            .await;

        seen.sort();
        ids.sort();
        assert_eq!(seen, ids);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn clear_closes_everything() {
        let registry = ConnectionRegistry::spawn();
        let mut flags = Vec::new();
        for _ in 0..4 {
            let (conn, closed) = MockConnection::new(Instant::now());
            flags.push(closed);
            registry.add(conn);
        }
        registry.clear();

        assert!(registry.is_empty().await);
        assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
    }

    #[tokio::test]
    async fn concurrent_writers_are_serialized() {
        let registry = ConnectionRegistry::spawn();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let (conn, _) = MockConnection::new(Instant::now());
                    let id = conn.id;
                    registry.add(conn);
                    registry.update_activity(id, Instant::now());
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(registry.count().await, 400);
    }
}
