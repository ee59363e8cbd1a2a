//! Decoded frames.
//!
//! # Example
//!
//! ```
//! use sockrpc_client::protocol::{Frame, FrameKind, Header};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Header::response(42, 5, false), Bytes::from_static(b"hello"));
//!
//! assert_eq!(frame.kind(), FrameKind::Response);
//! assert_eq!(frame.request_id(), 42);
//! assert_eq!(frame.to_bytes().len(), 9 + 5);
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// What a frame carries, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A call the receiver must answer.
    Request,
    /// A result value.
    Response,
    /// A response whose payload is an error value.
    ErrorResponse,
}

/// A header with its payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: Header,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn request_id(&self) -> u32 {
        self.header.request_id
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.is_error()
    }

    pub fn kind(&self) -> FrameKind {
        match (self.is_response(), self.is_error()) {
            (false, _) => FrameKind::Request,
            (true, false) => FrameKind::Response,
            (true, true) => FrameKind::ErrorResponse,
        }
    }

    /// Header and payload in one contiguous buffer.
    ///
    /// The writer task sends the two parts with a vectored write instead;
    /// this form is for peers and tests.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }
}
