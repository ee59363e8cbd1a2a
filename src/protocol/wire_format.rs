//! Frame header: `flags: u8 | request_id: u32 BE | payload_length: u32 BE`.
//!
//! Either side may send requests. The caller picks the request ID and the
//! response echoes it back.

use crate::error::{Result, RpcError};

pub const HEADER_SIZE: usize = 9;

/// 64 MiB.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Request ID that is never issued.
pub const RESERVED_REQUEST_ID: u32 = 0;

pub mod flags {
    /// Set on responses, clear on requests.
    pub const IS_RESPONSE: u8 = 0b0000_0001;
    /// Response payload is an error value.
    pub const IS_ERROR: u8 = 0b0000_0010;
    /// Bits 2-7 must be zero.
    pub const RESERVED_MASK: u8 = 0b1111_1100;

    pub const REQUEST: u8 = 0;
    pub const RESPONSE: u8 = IS_RESPONSE;
    pub const ERROR_RESPONSE: u8 = IS_RESPONSE | IS_ERROR;

    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub flags: u8,
    pub request_id: u32,
    pub payload_length: u32,
}

impl Header {
    pub fn new(flags: u8, request_id: u32, payload_length: u32) -> Self {
        Self {
            flags,
            request_id,
            payload_length,
        }
    }

    pub fn request(request_id: u32, payload_length: u32) -> Self {
        Self::new(flags::REQUEST, request_id, payload_length)
    }

    /// Response header; `is_error` marks the payload as an error value.
    pub fn response(request_id: u32, payload_length: u32, is_error: bool) -> Self {
        let flags = if is_error {
            flags::ERROR_RESPONSE
        } else {
            flags::RESPONSE
        };
        Self::new(flags, request_id, payload_length)
    }

    /// ```
    /// use sockrpc_client::protocol::Header;
    ///
    /// let bytes = Header::response(42, 100, false).encode();
    /// assert_eq!(bytes, [0x01, 0, 0, 0, 42, 0, 0, 0, 100]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let id = self.request_id.to_be_bytes();
        let len = self.payload_length.to_be_bytes();
        [
            self.flags, id[0], id[1], id[2], id[3], len[0], len[1], len[2], len[3],
        ]
    }

    /// Decode the first [`HEADER_SIZE`] bytes of `buf`; `None` if it is
    /// shorter than that.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let bytes: &[u8; HEADER_SIZE] = buf.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Self {
            flags: bytes[0],
            request_id: u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
            payload_length: u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
        })
    }

    /// Reject headers the peer must never send: reserved request ID,
    /// oversize payload, reserved flag bits, or an error flag on a request.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.request_id == RESERVED_REQUEST_ID {
            return Err(RpcError::Protocol("Request ID 0 is reserved".to_string()));
        }
        if self.payload_length > max_payload_size {
            return Err(RpcError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(RpcError::Protocol(format!(
                "Reserved flag bits set: {:#04x}",
                self.flags
            )));
        }
        if self.is_error() && !self.is_response() {
            return Err(RpcError::Protocol("Error flag set on a request".to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_RESPONSE)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol_error(header: Header, max: u32) -> String {
        match header.validate(max) {
            Err(RpcError::Protocol(msg)) => msg,
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_is_big_endian() {
        let bytes = Header::new(0x03, 0x0405_0607, 0x0809_0A0B).encode();
        assert_eq!(bytes, [0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B]);
    }

    #[test]
    fn test_decode_reads_prefix_only() {
        let mut bytes = Header::request(9, 4).encode().to_vec();
        bytes.extend_from_slice(b"tail");

        assert_eq!(Header::decode(&bytes), Some(Header::request(9, 4)));
        assert_eq!(Header::decode(&bytes[..HEADER_SIZE - 1]), None);
    }

    #[test]
    fn test_response_flags() {
        let ok = Header::response(7, 3, false);
        assert!(ok.is_response() && !ok.is_error());

        let err = Header::response(7, 3, true);
        assert_eq!(err.flags, flags::ERROR_RESPONSE);
        assert!(err.is_response() && err.is_error());

        assert!(!Header::request(7, 3).is_response());
    }

    #[test]
    fn test_validate_accepts_normal_traffic() {
        assert!(Header::request(1, 10).validate(10).is_ok());
        assert!(Header::response(u32::MAX, 0, true).validate(10).is_ok());
    }

    #[test]
    fn test_validate_rejections() {
        assert!(protocol_error(Header::request(0, 0), 10).contains("reserved"));
        assert!(protocol_error(Header::request(1, 11), 10).contains("exceeds maximum"));
        assert!(protocol_error(Header::new(0b1000_0001, 1, 0), 10).contains("Reserved flag bits"));
        assert!(protocol_error(Header::new(flags::IS_ERROR, 1, 0), 10).contains("request"));
    }
}
