//! Dispatch of complete frames.

use crate::net::connection::ConnectionId;
use crate::protocol::message::{Message, MessageKind};

/// Receives every complete, size-checked, non-heartbeat message.
///
/// Called from the connection's own read task, so implementations must not
/// block; hand heavy work to another task.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, connection: ConnectionId, message: Message);
}

/// Default handler: logs audio separately from everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl MessageHandler for LoggingHandler {
    fn handle(&self, connection: ConnectionId, message: Message) {
        match message.kind {
            MessageKind::Audio => {
                tracing::info!(
                    connection_id = %connection,
                    bytes = message.payload().len(),
                    "Audio frame received"
                );
            }
            kind => {
                tracing::info!(
                    connection_id = %connection,
                    kind = %kind,
                    bytes = message.payload().len(),
                    "Frame received"
                );
            }
        }
    }
}

impl<F> MessageHandler for F
where
    F: Fn(ConnectionId, Message) + Send + Sync + 'static,
{
    fn handle(&self, connection: ConnectionId, message: Message) {
        self(connection, message)
    }
}
