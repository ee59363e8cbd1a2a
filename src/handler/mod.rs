//! Handler module - local method registry and inbound responses.
//!
//! Provides:
//! - [`MethodRegistry`] - maps method names to handlers and dispatches calls
//! - [`Handler`] - the synchronous handler contract
//! - [`Responder`] - sends a dispatch result back to the peer
//!
//! # Example
//!
//! ```
//! use sockrpc_client::handler::MethodRegistry;
//! use sockrpc_client::handshake::MethodSignature;
//! use sockrpc_client::value::{Value, ValueType};
//!
//! let mut registry = MethodRegistry::new();
//! registry.register_with_signature(
//!     "length",
//!     MethodSignature::new(ValueType::Integer, vec![ValueType::String]),
//!     |params: &[Value]| match params.first().map(Value::as_str) {
//!         Some(Ok(s)) => Value::from(s.len() as i64),
//!         _ => Value::error(-1, "Parameter is not of type string."),
//!     },
//! );
//! assert_eq!(registry.dispatch("length", &[Value::from("abc")]), Value::Integer(3));
//! ```

mod context;
mod registry;

pub use context::Responder;
pub use registry::{Handler, MethodRegistry};
