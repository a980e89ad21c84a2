//! Wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Transport completion (header bytes / payload bytes)
//!     → state.rs (AwaitingHeader ⇄ AwaitingPayload)
//!     → codec.rs (decode header JSON into a Message)
//!     → handler.rs (dispatch complete payloads by kind)
//!
//! Frame layout:
//!     <header JSON> \r\n <payload: exactly `size` bytes>
//! ```
//!
//! # Design Decisions
//! - Decoding is fallible; a bad header costs the peer one frame, not the connection
//! - The state machine never touches sockets; it returns the next read to arm
//! - Heartbeats carry no payload and never leave AwaitingHeader

pub mod codec;
pub mod handler;
pub mod message;
pub mod state;

pub use codec::{decode_header, encode, DecodeError, TERMINATOR};
pub use handler::{LoggingHandler, MessageHandler};
pub use message::{Message, MessageKind};
pub use state::{Next, ReadRequest, ReadState, ReadStateMachine};
