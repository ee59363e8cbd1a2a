//! Payload serialization.
//!
//! Every frame payload is MessagePack: requests carry an
//! [`RpcRequest`](crate::protocol::RpcRequest), responses a single
//! [`Value`](crate::value::Value).

mod msgpack;

pub use msgpack::MsgPackCodec;
