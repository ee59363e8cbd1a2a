//! # sockrpc-client
//!
//! Bidirectional RPC client for a local daemon reachable over a Unix domain
//! socket.
//!
//! A single persistent connection carries both directions: the client calls
//! the daemon's methods with [`Client::invoke`], and the daemon calls methods
//! the client registered, which are dispatched through a
//! [`MethodRegistry`](handler::MethodRegistry).
//!
//! ## Architecture
//!
//! - **Values**: every parameter, result and fault is a [`Value`]
//! - **Wire**: 9-byte frame header plus a MessagePack payload
//! - **Handshake**: on every connect, methods registered with a signature are
//!   announced via `registerRpcMethod`
//!
//! ## Example
//!
//! ```ignore
//! use sockrpc_client::{ClientBuilder, MethodSignature, Value, ValueType};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ClientBuilder::new()
//!         .method_with_signature(
//!             "length",
//!             MethodSignature::new(ValueType::Integer, vec![ValueType::String]),
//!             |params: &[Value]| match params.first().map(Value::as_str) {
//!                 Some(Ok(s)) => Value::from(s.len() as i64),
//!                 _ => Value::error(-1, "Parameter is not of type string."),
//!             },
//!         )
//!         .build();
//!
//!     client.start().unwrap();
//!     let result = client.invoke("getVersion", vec![]).await;
//!     client.stop().await;
//! }
//! ```

pub mod codec;
pub mod config;
pub mod demo;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod protocol;
pub mod transport;
pub mod value;
pub mod writer;

mod client;
mod session;

pub use client::{Client, ClientBuilder, ConnectionState};
pub use config::{ClientConfig, ReconnectPolicy};
pub use error::RpcError;
pub use handshake::{HandshakeReport, MethodSignature};
pub use value::{fault, StructValue, Value, ValueError, ValueType};
