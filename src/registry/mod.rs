//! Connection registry subsystem.
//!
//! # Data Flow
//! ```text
//! Listener (accept)          ─┐
//! Read state machine (frame) ─┼─→ mpsc queue → registry task → HashMap<ConnectionId, Connection>
//! Timeout monitor (sweep)    ─┘                     │
//!                                                   └─→ oneshot replies (lookup, snapshot, count)
//! ```
//!
//! # Design Decisions
//! - Single writer: only the registry task touches the map
//! - Mutations are fire-and-forget; a query from another task may observe
//!   state from before a mutation that task did not submit itself
//! - Snapshots are copies, so visiting one never holds up the registry

pub mod store;

pub use store::{ActivityRecord, ConnectionRegistry};
