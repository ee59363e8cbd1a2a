//! Response path for inbound calls.
//!
//! A [`Responder`] is created per inbound request and sends exactly one
//! response frame carrying the dispatch result.

use bytes::Bytes;

use crate::codec::MsgPackCodec;
use crate::error::Result;
use crate::protocol::Header;
use crate::value::{fault, Value};
use crate::writer::{OutboundFrame, WriterHandle};

/// Sends the response for one inbound request.
#[derive(Clone)]
pub struct Responder {
    request_id: u32,
    /// `None` in tests that only exercise encoding.
    writer: Option<WriterHandle>,
}

impl Responder {
    /// Create a responder with no writer (testing).
    pub fn new(request_id: u32) -> Self {
        Self {
            request_id,
            writer: None,
        }
    }

    pub fn with_writer(request_id: u32, writer: WriterHandle) -> Self {
        Self {
            request_id,
            writer: Some(writer),
        }
    }

    #[inline]
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Send `value` as the response. Error values set the error flag.
    ///
    /// A value that cannot be encoded, or whose encoding exceeds the peer's
    /// payload limit, is replaced by [`fault::unknown_application_error`] so
    /// the peer still gets an answer.
    pub async fn respond(&self, value: &Value) -> Result<()> {
        let (mut payload, mut is_error) = match MsgPackCodec::encode(value) {
            Ok(bytes) => (bytes, value.is_error()),
            Err(e) => {
                tracing::error!("Could not encode response {}: {}", self.request_id, e);
                (MsgPackCodec::encode(&fault::unknown_application_error())?, true)
            }
        };

        let Some(writer) = &self.writer else {
            return Ok(());
        };

        let len = match writer.payload_length(&payload) {
            Ok(len) => len,
            Err(e) => {
                tracing::error!("Response {} not sent: {}", self.request_id, e);
                payload = MsgPackCodec::encode(&fault::unknown_application_error())?;
                is_error = true;
                writer.payload_length(&payload)?
            }
        };

        let header = Header::response(self.request_id, len, is_error);
        writer
            .send(OutboundFrame::new(&header, Bytes::from(payload)))
            .await
    }
}
