//! Connection liveness subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (interval ± jitter, first tick immediate)
//!     → registry snapshot
//!     → now - last_activity > idle_timeout ?
//!     → registry.remove_and_disconnect(id)
//! ```
//!
//! # Design Decisions
//! - Reads carry no deadlines; this sweep is the only idle enforcement
//! - Sweeps run beside read completions; a completion that lands after
//!   eviction finds no registry entry and is dropped there
//! - Stopping cancels future sweeps, never one in progress

pub mod monitor;

pub use monitor::{jittered, MonitorHandle, TimeoutMonitor};
