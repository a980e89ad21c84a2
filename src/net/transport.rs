//! Framed reads over a byte stream.
//!
//! # Responsibilities
//! - "Read until terminator" with a bounded header length
//! - "Read exactly N" that reports short reads at end of stream
//!
//! Buffered bytes are kept between calls, so a header and its payload
//! arriving in one segment are split correctly.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::protocol::{ReadRequest, TERMINATOR};

/// Largest buffer reserved before any payload byte has arrived.
const INITIAL_PAYLOAD_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("peer closed the connection")]
    Closed,

    #[error("header exceeds {limit} bytes without a terminator")]
    HeaderTooLong { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Buffered reader performing [`ReadRequest`]s.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: BufReader<R>,
    max_header_bytes: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_header_bytes: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            max_header_bytes,
        }
    }

    pub async fn read(&mut self, request: ReadRequest) -> Result<Vec<u8>, ReadError> {
        match request {
            ReadRequest::UntilTerminator => self.read_header().await,
            ReadRequest::Exact(len) => self.read_payload(len).await,
        }
    }

    /// Read through the terminator. The returned bytes include it.
    pub async fn read_header(&mut self) -> Result<Vec<u8>, ReadError> {
        let mut header = Vec::new();
        let last = TERMINATOR[TERMINATOR.len() - 1];

        loop {
            let remaining = self.max_header_bytes.saturating_sub(header.len());
            if remaining == 0 {
                return Err(ReadError::HeaderTooLong {
                    limit: self.max_header_bytes,
                });
            }

            let mut limited = (&mut self.inner).take(remaining as u64);
            let read = limited.read_until(last, &mut header).await?;
            if read == 0 {
                return Err(ReadError::Closed);
            }
            if header.ends_with(TERMINATOR) {
                return Ok(header);
            }
        }
    }

    /// Read up to `len` bytes. Fewer come back only if the peer hit EOF first.
    pub async fn read_payload(&mut self, len: usize) -> Result<Vec<u8>, ReadError> {
        let mut payload = payload_buffer(len);
        (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut payload)
            .await?;
        if payload.is_empty() && len > 0 {
            return Err(ReadError::Closed);
        }
        Ok(payload)
    }
}

/// The buffer grows as bytes arrive, so a declared size alone costs at most
/// [`INITIAL_PAYLOAD_CAPACITY`].
fn payload_buffer(len: usize) -> Vec<u8> {
    Vec::with_capacity(len.min(INITIAL_PAYLOAD_CAPACITY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn splits_header_and_payload_from_one_segment() {
        let wire: &[u8] = b"{\"type\":\"text\",\"size\":\"5\"}\r\nhello{\"type\":\"heartbeat\",\"size\":\"0\"}\r\n";
        let mut reader = FrameReader::new(wire, 1024);

        let header = reader.read(ReadRequest::UntilTerminator).await.unwrap();
        assert_eq!(header, b"{\"type\":\"text\",\"size\":\"5\"}\r\n");

        let payload = reader.read(ReadRequest::Exact(5)).await.unwrap();
        assert_eq!(payload, b"hello");

        let heartbeat = reader.read(ReadRequest::UntilTerminator).await.unwrap();
        assert!(heartbeat.starts_with(b"{\"type\":\"heartbeat\""));

        assert!(matches!(
            reader.read(ReadRequest::UntilTerminator).await,
            Err(ReadError::Closed)
        ));
    }

    #[tokio::test]
    async fn bare_newline_does_not_end_header() {
        let wire: &[u8] = b"{\n\"type\":\"text\",\n\"size\":\"1\"\n}\r\nx";
        let mut reader = FrameReader::new(wire, 1024);
        let header = reader.read_header().await.unwrap();
        assert!(header.ends_with(b"}\r\n"));
        assert_eq!(reader.read_payload(1).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn header_limit_is_enforced() {
        let wire = vec![b'a'; 100];
        let mut reader = FrameReader::new(wire.as_slice(), 16);
        assert!(matches!(
            reader.read_header().await,
            Err(ReadError::HeaderTooLong { limit: 16 })
        ));
    }

    #[tokio::test]
    async fn short_payload_at_eof_is_delivered() {
        let wire: &[u8] = b"abc";
        let mut reader = FrameReader::new(wire, 16);
        assert_eq!(reader.read_payload(10).await.unwrap(), b"abc");
        assert!(matches!(reader.read_payload(1).await, Err(ReadError::Closed)));
        assert!(reader.read_payload(0).await.unwrap().is_empty());
    }

    #[test]
    fn declared_size_does_not_reserve_full_payload() {
        let declared = 16 * 1024 * 1024;
        assert!(payload_buffer(declared).capacity() <= INITIAL_PAYLOAD_CAPACITY);
        assert!(payload_buffer(10).capacity() >= 10);
    }

    #[tokio::test]
    async fn large_payload_arrives_in_pieces() {
        let len = 3 * INITIAL_PAYLOAD_CAPACITY + 17;
        let (client, server) = tokio::io::duplex(4096);
        let mut reader = FrameReader::new(server, 16);

        let writer = tokio::spawn(async move {
            let mut client = client;
            let body: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            for chunk in body.chunks(1000) {
                client.write_all(chunk).await.unwrap();
            }
            client
        });

        let payload = reader.read_payload(len).await.unwrap();
        assert_eq!(payload.len(), len);
        assert!(payload.iter().enumerate().all(|(i, b)| *b == (i % 251) as u8));
        drop(writer.await.unwrap());
    }
}
