//! Method registry: name → locally implemented handler.
//!
//! Built once before the client starts and shared read-only afterwards, so
//! dispatch needs no locking. Handlers run concurrently with themselves and
//! with each other.
//!
//! # Example
//!
//! ```
//! use sockrpc_client::handler::MethodRegistry;
//! use sockrpc_client::value::{fault, Value};
//!
//! let mut registry = MethodRegistry::new();
//! registry.register("count", |params: &[Value]| Value::from(params.len() as i64));
//!
//! assert_eq!(registry.dispatch("count", &[Value::Void]), Value::Integer(1));
//! assert_eq!(
//!     registry.dispatch("missing", &[]).fault_code().unwrap(),
//!     fault::METHOD_NOT_FOUND
//! );
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::handshake::MethodSignature;
use crate::value::{fault, Value};

/// A locally implemented RPC method.
///
/// Handlers own their arity/type checks and report violations as error
/// values (conventionally [`fault::INVALID_PARAMETERS`]).
pub trait Handler: Send + Sync + 'static {
    fn call(&self, params: &[Value]) -> Value;
}

impl<F> Handler for F
where
    F: Fn(&[Value]) -> Value + Send + Sync + 'static,
{
    fn call(&self, params: &[Value]) -> Value {
        self(params)
    }
}

struct MethodEntry {
    handler: Box<dyn Handler>,
    /// Present when the method is announced to the peer on connect.
    signature: Option<MethodSignature>,
}

/// Registry mapping method names to handlers.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, MethodEntry>,
    /// Names in first-registration order.
    order: Vec<String>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler that is served locally but not announced.
    ///
    /// Registering an existing name replaces its handler (and drops any
    /// signature it had).
    pub fn register<H: Handler>(&mut self, name: &str, handler: H) {
        self.insert(name, Box::new(handler), None);
    }

    /// Register a handler and announce it with `signature` during the
    /// registration handshake. Last write wins, as with [`register`](Self::register).
    pub fn register_with_signature<H: Handler>(
        &mut self,
        name: &str,
        signature: MethodSignature,
        handler: H,
    ) {
        self.insert(name, Box::new(handler), Some(signature));
    }

    fn insert(&mut self, name: &str, handler: Box<dyn Handler>, signature: Option<MethodSignature>) {
        let previous = self
            .methods
            .insert(name.to_string(), MethodEntry { handler, signature });
        if previous.is_none() {
            self.order.push(name.to_string());
        } else {
            tracing::debug!("Replacing handler for RPC method {}", name);
        }
    }

    /// Route a call to its handler.
    ///
    /// Unknown names yield a [`fault::METHOD_NOT_FOUND`] error value. A
    /// handler's result, error values included, is returned untouched. A
    /// panicking handler is contained here and reported as
    /// [`fault::UNKNOWN_APPLICATION_ERROR`].
    pub fn dispatch(&self, method: &str, params: &[Value]) -> Value {
        let Some(entry) = self.methods.get(method) else {
            tracing::warn!("Requested method not found: {}", method);
            return fault::method_not_found(method);
        };

        match panic::catch_unwind(AssertUnwindSafe(|| entry.handler.call(params))) {
            Ok(value) => value,
            Err(payload) => {
                tracing::error!(
                    "Handler for RPC method {} panicked: {}",
                    method,
                    panic_message(payload.as_ref())
                );
                fault::unknown_application_error()
            }
        }
    }

    /// Methods to announce, in registration order.
    pub fn declared(&self) -> Vec<(String, MethodSignature)> {
        self.order
            .iter()
            .filter_map(|name| {
                let entry = self.methods.get(name)?;
                let signature = entry.signature.clone()?;
                Some((name.clone(), signature))
            })
            .collect()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
