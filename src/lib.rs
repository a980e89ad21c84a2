//! Tether: a TCP server for length-framed messages with idle eviction.

pub mod config;
pub mod lifecycle;
pub mod liveness;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod registry;

pub use config::ServerConfig;
pub use lifecycle::{RunningServer, Server, ServerError, Shutdown};
pub use protocol::{Message, MessageHandler, MessageKind};
pub use registry::ConnectionRegistry;
