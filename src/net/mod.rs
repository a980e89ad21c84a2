//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, registry handle, close signal)
//!     → transport.rs (read until terminator / read exactly N)
//!     → protocol::state (decide the next read)
//!
//! Connection ends:
//!     peer EOF / I/O error  → removed from registry
//!     framing error         → removed and closed
//!     eviction / shutdown   → close signal wakes the read task
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - The socket lives only in its read task; the registry holds a close handle
//! - Reads have no deadline; idleness is handled by the liveness sweeper

pub mod connection;
pub mod listener;
pub mod transport;

pub use connection::{CloseSignal, Connection, ConnectionId, TcpConnection};
pub use listener::{ConnectionContext, ConnectionEnd, Listener, ListenerError};
pub use transport::{FrameReader, ReadError};
