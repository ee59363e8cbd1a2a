//! Registration handshake performed once per connection.
//!
//! Every method registered with a signature is announced to the peer with
//! `registerRpcMethod(name, signature)`, in registration order. Failures are
//! logged and skipped; there is no retry until the next connection.
//!
//! ```text
//! Client                                  Daemon
//!   │  registerRpcMethod("a", [...])  ──►   │
//!   │  ◄──  Void                            │
//!   │  registerRpcMethod("b", [...])  ──►   │
//!   │  ◄──  Error(faultString)              │   logged, continue
//! ```

mod signature;

use std::future::Future;
use std::pin::Pin;

use crate::value::Value;

pub use signature::MethodSignature;

/// Name of the bootstrap method exposed by the daemon.
pub const REGISTER_METHOD: &str = "registerRpcMethod";

/// Boxed future type for object-safe async calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can call a method on the peer.
pub trait Invoker: Send + Sync {
    fn invoke<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Value>;
}

/// Outcome of one handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeReport {
    /// Methods the peer accepted, in announcement order.
    pub registered: Vec<String>,
    /// Methods the peer rejected or that could not be sent.
    pub failed: Vec<String>,
}

impl HandshakeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.registered.len() + self.failed.len()
    }
}

/// Announce each declared method to the peer.
pub async fn register_methods<I>(invoker: &I, declared: &[(String, MethodSignature)]) -> HandshakeReport
where
    I: Invoker + ?Sized,
{
    let mut report = HandshakeReport::default();

    for (name, signature) in declared {
        tracing::debug!("Registering RPC method {}", name);
        let params = vec![Value::from(name.as_str()), signature.to_value()];
        let result = invoker.invoke(REGISTER_METHOD, params).await;

        if result.is_error() {
            let reason = result.fault_string().unwrap_or_default();
            tracing::error!("Could not register RPC method {}: {}", name, reason);
            report.failed.push(name.clone());
        } else {
            report.registered.push(name.clone());
        }
    }

    if report.is_complete() {
        tracing::info!("RPC methods successfully registered.");
    } else {
        tracing::warn!(
            "Registered {} of {} RPC methods ({} failed).",
            report.registered.len(),
            report.attempted(),
            report.failed.len()
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;
    use std::sync::Mutex;

    /// Scripted peer: rejects the names in `reject`, records every call.
    struct MockInvoker {
        reject: Vec<&'static str>,
        calls: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl MockInvoker {
        fn new(reject: Vec<&'static str>) -> Self {
            Self {
                reject,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Invoker for MockInvoker {
        fn invoke<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Value> {
            Box::pin(async move {
                let name = params[0].as_str().unwrap().to_string();
                self.calls.lock().unwrap().push((method.to_string(), params));
                if self.reject.contains(&name.as_str()) {
                    Value::error(-32602, "Method already registered.")
                } else {
                    Value::Void
                }
            })
        }
    }

    fn declared(names: &[&str]) -> Vec<(String, MethodSignature)> {
        names
            .iter()
            .map(|n| (n.to_string(), MethodSignature::void()))
            .collect()
    }

    #[tokio::test]
    async fn test_all_methods_registered() {
        let invoker = MockInvoker::new(vec![]);
        let report = register_methods(&invoker, &declared(&["a", "b"])).await;

        assert!(report.is_complete());
        assert_eq!(report.registered, vec!["a", "b"]);

        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(m, _)| m == REGISTER_METHOD));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_registrations() {
        let invoker = MockInvoker::new(vec!["b"]);
        let report = register_methods(&invoker, &declared(&["a", "b", "c"])).await;

        assert_eq!(report.registered, vec!["a", "c"]);
        assert_eq!(report.failed, vec!["b"]);
        assert_eq!(report.attempted(), 3);

        // Each method attempted exactly once, in order.
        let calls = invoker.calls.lock().unwrap();
        let names: Vec<&str> = calls.iter().map(|(_, p)| p[0].as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_signature_sent_as_second_param() {
        let invoker = MockInvoker::new(vec![]);
        let signature = MethodSignature::new(ValueType::Integer, vec![ValueType::String]);
        register_methods(&invoker, &[("len".to_string(), signature.clone())]).await;

        let calls = invoker.calls.lock().unwrap();
        let (_, params) = &calls[0];
        assert_eq!(params.len(), 2);
        assert_eq!(params[1], signature.to_value());
    }

    #[tokio::test]
    async fn test_nothing_declared() {
        let invoker = MockInvoker::new(vec![]);
        let report = register_methods(&invoker, &[]).await;

        assert_eq!(report, HandshakeReport::default());
        assert!(invoker.calls.lock().unwrap().is_empty());
    }
}
