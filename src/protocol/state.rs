//! Per-connection read state machine.
//!
//! # States
//! - AwaitingHeader: next completion is a terminator-delimited header
//! - AwaitingPayload: next completion is exactly `size` payload bytes
//!
//! # State Transitions
//! ```text
//! AwaitingHeader  --bad header-->  AwaitingHeader   (read until terminator)
//! AwaitingHeader  --heartbeat-->   AwaitingHeader   (read until terminator)
//! AwaitingHeader  --header----->   AwaitingPayload  (read exactly size)
//! AwaitingPayload --payload---->   AwaitingHeader   (read until terminator)
//! AwaitingPayload --wrong size->   per PayloadMismatchPolicy
//! ```
//!
//! The machine owns no socket. Each completion returns [`Next`], telling the
//! transport driver which read to arm.

use std::sync::Arc;

use tokio::time::Instant;

use crate::config::{FrameLimits, PayloadMismatchPolicy};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::protocol::codec::{decode_header, DecodeError};
use crate::protocol::handler::MessageHandler;
use crate::protocol::message::{Message, MessageKind};
use crate::registry::ConnectionRegistry;

/// A read the transport should perform next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRequest {
    /// Read up to and including the header terminator.
    UntilTerminator,
    /// Read exactly this many payload bytes.
    Exact(usize),
}

/// What the driver should do after a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Read(ReadRequest),
    /// Arm no read; the connection idles until it is closed externally.
    Idle,
    /// Drop the connection.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    AwaitingHeader,
    AwaitingPayload { kind: MessageKind, size: usize },
}

/// Protocol state of one connection.
///
/// Only that connection's read task touches it, so it needs no locking.
pub struct ReadStateMachine {
    id: ConnectionId,
    state: ReadState,
    pending: Option<Message>,
    registry: ConnectionRegistry,
    handler: Arc<dyn MessageHandler>,
    limits: FrameLimits,
    on_mismatch: PayloadMismatchPolicy,
}

impl ReadStateMachine {
    pub fn new(
        id: ConnectionId,
        registry: ConnectionRegistry,
        handler: Arc<dyn MessageHandler>,
        limits: FrameLimits,
        on_mismatch: PayloadMismatchPolicy,
    ) -> Self {
        Self {
            id,
            state: ReadState::AwaitingHeader,
            pending: None,
            registry,
            handler,
            limits,
            on_mismatch,
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    /// The read to arm right after acceptance.
    pub fn start(&self) -> Next {
        Next::Read(ReadRequest::UntilTerminator)
    }

    /// Feed one read completion.
    pub fn on_read(&mut self, bytes: Vec<u8>, now: Instant) -> Next {
        self.registry.update_activity(self.id, now);

        match self.state {
            ReadState::AwaitingHeader => self.on_header(&bytes),
            ReadState::AwaitingPayload { kind, size } => self.on_payload(kind, size, bytes),
        }
    }

    fn on_header(&mut self, bytes: &[u8]) -> Next {
        let header = match decode_header(bytes).and_then(|m| self.check_size(m)) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.id,
                    error = %e,
                    header_len = bytes.len(),
                    "Discarding malformed header"
                );
                metrics::record_header_rejected(e.reason());
                return Next::Read(ReadRequest::UntilTerminator);
            }
        };

        metrics::record_frame(header.kind);

        if !header.kind.has_payload() {
            tracing::debug!(connection_id = %self.id, "Heartbeat");
            return Next::Read(ReadRequest::UntilTerminator);
        }

        let size = header.declared_size;
        tracing::trace!(connection_id = %self.id, kind = %header.kind, size, "Header accepted");
        self.state = ReadState::AwaitingPayload {
            kind: header.kind,
            size,
        };
        self.pending = Some(header);
        Next::Read(ReadRequest::Exact(size))
    }

    fn check_size(&self, header: Message) -> Result<Message, DecodeError> {
        if header.declared_size > self.limits.max_payload_bytes {
            return Err(DecodeError::PayloadTooLarge {
                size: header.declared_size,
                limit: self.limits.max_payload_bytes,
            });
        }
        Ok(header)
    }

    fn on_payload(&mut self, kind: MessageKind, size: usize, payload: Vec<u8>) -> Next {
        self.state = ReadState::AwaitingHeader;
        let pending = self.pending.take();

        if payload.len() != size {
            tracing::warn!(
                connection_id = %self.id,
                kind = %kind,
                expected = size,
                received = payload.len(),
                policy = ?self.on_mismatch,
                "Payload size mismatch"
            );
            metrics::record_payload_mismatch();
            return match self.on_mismatch {
                PayloadMismatchPolicy::Disconnect => Next::Close,
                PayloadMismatchPolicy::Rearm => Next::Read(ReadRequest::UntilTerminator),
                PayloadMismatchPolicy::Stall => Next::Idle,
            };
        }

        match pending {
            Some(header) => self.handler.handle(self.id, header.with_payload(payload)),
            None => tracing::error!(connection_id = %self.id, "Payload without pending header"),
        }
        Next::Read(ReadRequest::UntilTerminator)
    }
}
