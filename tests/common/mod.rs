//! Shared utilities for integration and load testing.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tether::config::ServerConfig;
use tether::net::ConnectionId;
use tether::{ConnectionRegistry, Message, RunningServer, Server};

const WAIT: Duration = Duration::from_secs(5);

/// Loopback config on an ephemeral port with the background sweeper off,
/// so tests drive sweeps themselves.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.monitor.enabled = false;
    config
}

/// Start a server whose handler forwards every message into a channel.
#[allow(dead_code)]
pub async fn start_recording_server(
    config: ServerConfig,
) -> (RunningServer, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let server = Server::new(config)
        .with_handler(move |_: ConnectionId, message: Message| {
            let _ = tx.send(message);
        })
        .start()
        .await
        .expect("server starts");
    (server, rx)
}

/// Wait until the registry holds exactly `expected` connections.
pub async fn wait_for_count(registry: &ConnectionRegistry, expected: usize) -> bool {
    let deadline = Instant::now() + WAIT;
    loop {
        if registry.count().await == expected {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait for the next handled message.
#[allow(dead_code)]
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("message within timeout")
        .expect("handler channel open")
}
