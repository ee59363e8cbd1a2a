//! Wire protocol spoken on the socket.
//!
//! ```text
//! ┌───────┬────────────┬────────────────┬──────────────────────┐
//! │ flags │ request_id │ payload_length │ payload (MessagePack) │
//! │  u8   │  u32 BE    │    u32 BE      │                      │
//! └───────┴────────────┴────────────────┴──────────────────────┘
//! ```
//!
//! Request payloads are an [`RpcRequest`]; response payloads are a bare
//! [`Value`](crate::value::Value).

mod frame;
mod frame_buffer;
mod message;
mod wire_format;

pub use frame::{Frame, FrameKind};
pub use frame_buffer::FrameBuffer;
pub use message::RpcRequest;
pub use wire_format::{flags, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, RESERVED_REQUEST_ID};
