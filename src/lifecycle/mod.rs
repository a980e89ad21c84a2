//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Spawn registry → Bind listener → Spawn accept loop → Spawn timeout monitor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop monitor → Stop accepting → Close every connection
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Bind failure is returned before anything is spawned
//! - The registry is created per start, never process-wide

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{RunningServer, Server, ServerError};
