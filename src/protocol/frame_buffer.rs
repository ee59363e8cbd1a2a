//! Reassembles frames from arbitrary socket reads.
//!
//! Reads may split a frame anywhere, or deliver several frames at once. The
//! buffer keeps the unconsumed tail and, once a header has been seen,
//! remembers it until the payload is complete.
//!
//! ```
//! use sockrpc_client::protocol::{Frame, FrameBuffer, Header};
//! use bytes::Bytes;
//!
//! let bytes = Frame::new(Header::request(1, 2), Bytes::from_static(b"hi")).to_bytes();
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(&bytes[..4]).unwrap().is_empty());
//! assert_eq!(buffer.push(&bytes[4..]).unwrap().len(), 1);
//! ```

use bytes::BytesMut;

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

const INITIAL_CAPACITY: usize = 64 * 1024;

pub struct FrameBuffer {
    buffer: BytesMut,
    /// Header whose payload has not fully arrived yet.
    pending_header: Option<Header>,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Buffer accepting payloads up to [`DEFAULT_MAX_PAYLOAD_SIZE`].
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            pending_header: None,
            max_payload_size,
        }
    }

    /// Append `data` and return every frame it completes, in order.
    ///
    /// # Errors
    ///
    /// A header that fails [`Header::validate`]. The byte stream cannot be
    /// resynchronized after that; the connection must be dropped.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            let header = match self.pending_header {
                Some(header) => header,
                None => {
                    let Some(header) = Header::decode(&self.buffer) else {
                        break;
                    };
                    header.validate(self.max_payload_size)?;
                    let _ = self.buffer.split_to(HEADER_SIZE);
                    header
                }
            };

            let needed = header.payload_length as usize;
            if self.buffer.len() < needed {
                self.pending_header = Some(header);
                break;
            }

            self.pending_header = None;
            let payload = self.buffer.split_to(needed).freeze();
            frames.push(Frame::new(header, payload));
        }

        Ok(frames)
    }

    /// Bytes held that do not yet form a complete frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.pending_header.is_none()
    }

    /// Discard buffered bytes and any partially received frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending_header = None;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
