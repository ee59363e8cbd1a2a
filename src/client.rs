//! Client builder and connection lifecycle.
//!
//! The [`ClientBuilder`] collects method handlers and tuning knobs. The
//! [`Client`] runs the connection loop:
//! 1. Connect to the daemon's socket
//! 2. Spawn the writer task and the read loop
//! 3. Announce methods (handshake) while public invokes wait
//! 4. Serve inbound calls and outbound invokes until the connection drops
//! 5. Back off and reconnect, until `stop()`
//!
//! # Example
//!
//! ```ignore
//! use sockrpc_client::{Client, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::builder()
//!         .socket_path("/var/lib/homegear/homegearIPC.sock")
//!         .method("ping", |_: &[Value]| Value::from("pong"))
//!         .build();
//!
//!     client.start().unwrap();
//!     let version = client.invoke("getVersion", vec![]).await;
//!     client.stop().await;
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::{Result, RpcError};
use crate::handler::{Handler, MethodRegistry};
use crate::handshake::{self, HandshakeReport, MethodSignature};
use crate::session::Session;
use crate::transport::SocketStream;
use crate::value::{fault, Value};
use crate::writer::{spawn_writer_task, WriterConfig};

/// Lifecycle state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    registry: MethodRegistry,
    socket_path: PathBuf,
    reconnect: ReconnectPolicy,
    invoke_timeout: Duration,
    writer_config: WriterConfig,
    max_concurrent_handlers: usize,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    /// Start from a loaded [`ClientConfig`].
    pub fn from_config(config: ClientConfig) -> Self {
        let invoke_timeout = config.invoke_timeout();
        Self {
            registry: MethodRegistry::new(),
            socket_path: config.socket_path,
            reconnect: config.reconnect,
            invoke_timeout,
            writer_config: WriterConfig {
                max_pending_frames: config.max_pending_frames,
                channel_capacity: config.channel_capacity,
                ..WriterConfig::default()
            },
            max_concurrent_handlers: config.max_concurrent_handlers,
        }
    }

    /// Serve `name` locally without announcing it.
    pub fn method<H: Handler>(mut self, name: &str, handler: H) -> Self {
        self.registry.register(name, handler);
        self
    }

    /// Serve `name` locally and announce it with `signature` on every
    /// connect.
    pub fn method_with_signature<H: Handler>(
        mut self,
        name: &str,
        signature: MethodSignature,
        handler: H,
    ) -> Self {
        self.registry.register_with_signature(name, signature, handler);
        self
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// How long an invoke waits for its response.
    ///
    /// Default: 30 seconds
    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Maximum inbound calls executing at once. Further calls wait for a
    /// free slot.
    ///
    /// Default: 256
    pub fn max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.max_concurrent_handlers = limit;
        self
    }

    /// Default: 1024
    pub fn max_pending_frames(mut self, limit: usize) -> Self {
        self.writer_config.max_pending_frames = limit;
        self
    }

    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Default: 5 seconds
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.writer_config.backpressure_timeout = timeout;
        self
    }

    /// Largest frame payload, in either direction. Oversized invokes resolve
    /// to a transport fault; oversized inbound frames drop the connection.
    ///
    /// Default: 64 MiB
    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.writer_config.max_payload_size = size;
        self
    }

    pub fn build(self) -> Client {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Client {
            lifecycle: Arc::new(Lifecycle::default()),
            inner: Arc::new(Inner {
                socket_path: self.socket_path,
                reconnect: self.reconnect,
                invoke_timeout: self.invoke_timeout,
                writer_config: self.writer_config,
                handler_slots: Arc::new(Semaphore::new(self.max_concurrent_handlers.max(1))),
                registry: Arc::new(self.registry),
                state,
                gate: RwLock::new(()),
                session: Mutex::new(None),
                last_handshake: Mutex::new(None),
                runtime: Mutex::new(None),
            }),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an RPC client. Cheap to clone; all clones share one connection.
///
/// Dropping the last handle stops the connection loop.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
    lifecycle: Arc<Lifecycle>,
}

struct Runner {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owned by `Client` handles only; the connection task never holds it.
#[derive(Default)]
struct Lifecycle {
    runner: Mutex<Option<Runner>>,
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if let Some(runner) = lock(&self.runner).take() {
            tracing::debug!("Last client handle dropped; stopping connection loop");
            let _ = runner.shutdown.send(true);
        }
    }
}

struct Inner {
    socket_path: PathBuf,
    reconnect: ReconnectPolicy,
    invoke_timeout: Duration,
    writer_config: WriterConfig,
    registry: Arc<MethodRegistry>,
    handler_slots: Arc<Semaphore>,
    state: watch::Sender<ConnectionState>,
    /// Held for writing while the handshake runs; public invokes take it for
    /// reading.
    gate: RwLock<()>,
    session: Mutex<Option<Arc<Session>>>,
    last_handshake: Mutex<Option<HandshakeReport>>,
    runtime: Mutex<Option<Handle>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Disconnected,
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Spawn the connection loop on the current Tokio runtime.
    ///
    /// Returns immediately; the connection is established in the background.
    /// A stopped client can be started again.
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` if the loop is running, `Runtime` outside a Tokio
    /// runtime.
    pub fn start(&self) -> Result<()> {
        let handle = Handle::try_current()?;
        let mut runner = lock(&self.lifecycle.runner);
        if runner.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return Err(RpcError::AlreadyStarted);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        *lock(&self.inner.runtime) = Some(handle.clone());
        let task = handle.spawn(connection_loop(Arc::clone(&self.inner), shutdown_rx));
        *runner = Some(Runner { shutdown, task });

        tracing::info!("Starting RPC client on {}", self.inner.socket_path.display());
        Ok(())
    }

    /// Stop the connection loop and close the connection.
    ///
    /// Outstanding invokes resolve to a transport fault. Calling `stop` on a
    /// stopped (or never started) client does nothing.
    pub async fn stop(&self) {
        let runner = lock(&self.lifecycle.runner).take();
        if let Some(Runner { shutdown, task }) = runner {
            let _ = shutdown.send(true);
            if let Err(e) = task.await {
                tracing::warn!("Connection task ended abnormally: {}", e);
            }
            tracing::info!("RPC client stopped");
        }

        if let Some(session) = lock(&self.inner.session).take() {
            session.fail_pending();
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Call `method` on the peer and wait for the result.
    ///
    /// Always yields a value: the peer's result (possibly an error value), or
    /// a [`fault::TRANSPORT_ERROR`] error when not connected, on write
    /// failure, on connection loss or on timeout. While the registration
    /// handshake is running, the call waits for it to finish.
    ///
    /// # Panics
    ///
    /// If `method` is empty.
    pub async fn invoke(&self, method: &str, params: Vec<Value>) -> Value {
        assert!(!method.is_empty(), "RPC method name must not be empty");

        if self.state() != ConnectionState::Connected {
            return fault::not_connected();
        }

        let session = {
            let _gate = self.inner.gate.read().await;
            lock(&self.inner.session).clone()
        };

        match session {
            Some(session) => session.call(method, params).await,
            None => fault::not_connected(),
        }
    }

    /// Blocking form of [`invoke`](Self::invoke) for synchronous code, such
    /// as method handlers.
    ///
    /// Yields a transport fault if the client was never started.
    ///
    /// # Panics
    ///
    /// If called from within an async context, or if `method` is empty.
    pub fn invoke_blocking(&self, method: &str, params: Vec<Value>) -> Value {
        let Some(handle) = lock(&self.inner.runtime).clone() else {
            return fault::not_connected();
        };
        handle.block_on(self.invoke(method, params))
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Result of the most recent registration handshake.
    pub fn last_handshake(&self) -> Option<HandshakeReport> {
        lock(&self.inner.last_handshake).clone()
    }

    pub fn socket_path(&self) -> &Path {
        &self.inner.socket_path
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Connection state: {} -> {}", previous, state);
        }
    }

    /// Run one connection from handshake to teardown.
    async fn serve(&self, stream: SocketStream, shutdown: &mut watch::Receiver<bool>) -> Outcome {
        let (read_half, write_half) = stream.into_split();
        let (writer, writer_task) = spawn_writer_task(write_half, self.writer_config.clone());
        let session = Arc::new(Session::new(
            writer,
            Arc::clone(&self.registry),
            Arc::clone(&self.handler_slots),
            self.invoke_timeout,
        ));

        let gate = self.gate.write().await;
        *lock(&self.session) = Some(Arc::clone(&session));
        self.set_state(ConnectionState::Connected);
        tracing::info!("Connected to {}", self.socket_path.display());

        let max_payload_size = self.writer_config.max_payload_size;
        let mut reader = tokio::spawn(Arc::clone(&session).read_loop(read_half, max_payload_size));

        let declared = self.registry.declared();
        let report = tokio::select! {
            report = handshake::register_methods(session.as_ref(), &declared) => Some(report),
            _ = shutdown.changed() => None,
        };
        drop(gate);

        let outcome = match report {
            None => Outcome::Stopped,
            Some(report) => {
                *lock(&self.last_handshake) = Some(report);
                tokio::select! {
                    result = &mut reader => {
                        match result {
                            Ok(Ok(())) | Ok(Err(RpcError::ConnectionClosed)) => {
                                tracing::info!("Connection closed by peer");
                            }
                            Ok(Err(e)) => tracing::warn!("Connection lost: {}", e),
                            Err(e) => tracing::error!("Read loop failed: {}", e),
                        }
                        Outcome::Disconnected
                    }
                    _ = shutdown.changed() => Outcome::Stopped,
                }
            }
        };

        reader.abort();
        *lock(&self.session) = None;
        session.fail_pending();
        writer_task.abort();
        self.set_state(ConnectionState::Disconnected);

        outcome
    }
}

async fn connection_loop(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        inner.set_state(ConnectionState::Connecting);
        let connected = tokio::select! {
            result = SocketStream::connect(&inner.socket_path) => result,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok(stream) => {
                attempt = 0;
                if inner.serve(stream, &mut shutdown).await == Outcome::Stopped {
                    break;
                }
            }
            Err(e) => {
                inner.set_state(ConnectionState::Disconnected);
                if attempt == 0 {
                    tracing::warn!("Could not connect to {}: {}", inner.socket_path.display(), e);
                } else {
                    tracing::debug!("Connect attempt {} failed: {}", attempt + 1, e);
                }
            }
        }

        let delay = inner.reconnect.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        tracing::debug!("Reconnecting in {:?}", delay);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    inner.set_state(ConnectionState::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn unreachable_client() -> Client {
        let dir = std::env::temp_dir().join("sockrpc-client-missing");
        Client::builder()
            .socket_path(dir.join("absent.sock"))
            .reconnect_policy(ReconnectPolicy {
                initial_delay_ms: 5,
                max_delay_ms: 20,
                multiplier: 2.0,
            })
            .build()
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Client::builder()
            .socket_path("/tmp/test.sock")
            .invoke_timeout(Duration::from_secs(2))
            .max_concurrent_handlers(8)
            .max_pending_frames(2048)
            .channel_capacity(512)
            .backpressure_timeout(Duration::from_secs(10))
            .max_payload_size(1024);

        assert_eq!(builder.socket_path, PathBuf::from("/tmp/test.sock"));
        assert_eq!(builder.invoke_timeout, Duration::from_secs(2));
        assert_eq!(builder.max_concurrent_handlers, 8);
        assert_eq!(builder.writer_config.max_pending_frames, 2048);
        assert_eq!(builder.writer_config.channel_capacity, 512);
        assert_eq!(builder.writer_config.backpressure_timeout, Duration::from_secs(10));
        assert_eq!(builder.writer_config.max_payload_size, 1024);
    }

    #[test]
    fn test_builder_from_config() {
        let config = ClientConfig::from_json_str(
            r#"{ "socket_path": "/tmp/cfg.sock", "invoke_timeout_ms": 1500, "channel_capacity": 16 }"#,
        )
        .unwrap();
        let builder = ClientBuilder::from_config(config);

        assert_eq!(builder.socket_path, PathBuf::from("/tmp/cfg.sock"));
        assert_eq!(builder.invoke_timeout, Duration::from_millis(1500));
        assert_eq!(builder.writer_config.channel_capacity, 16);
    }

    #[test]
    fn test_builder_registers_methods() {
        let builder = Client::builder()
            .method("local", |_: &[Value]| Value::Void)
            .method_with_signature(
                "announced",
                MethodSignature::new(ValueType::String, vec![]),
                |_: &[Value]| Value::from("x"),
            );

        assert!(builder.registry.contains("local"));
        assert_eq!(builder.registry.declared().len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_before_start_is_transport_fault() {
        let client = unreachable_client();
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let result = client.invoke("anything", vec![]).await;
        assert_eq!(result.fault_code().unwrap(), fault::TRANSPORT_ERROR);
    }

    #[tokio::test]
    async fn test_start_twice_fails_and_restart_after_stop() {
        let client = unreachable_client();

        client.start().unwrap();
        assert!(matches!(client.start(), Err(RpcError::AlreadyStarted)));

        client.stop().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);

        client.start().unwrap();
        client.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let client = unreachable_client();
        client.stop().await;

        client.start().unwrap();
        client.stop().await;
        client.stop().await;

        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unreachable_socket_keeps_retrying() {
        let client = unreachable_client();
        client.start().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        // Loop is still alive after several failed attempts.
        assert!(matches!(client.start(), Err(RpcError::AlreadyStarted)));
        assert_ne!(client.state(), ConnectionState::Connected);

        let result = client.invoke("anything", vec![]).await;
        assert_eq!(result.fault_code().unwrap(), fault::TRANSPORT_ERROR);
        assert!(client.last_handshake().is_none());

        client.stop().await;
    }

    #[tokio::test]
    async fn test_dropping_last_handle_ends_loop() {
        let client = unreachable_client();
        client.start().unwrap();
        let inner = Arc::downgrade(&client.inner);

        let clone = client.clone();
        drop(client);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(clone.start(), Err(RpcError::AlreadyStarted)));

        drop(clone);
        for _ in 0..100 {
            if inner.upgrade().is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("connection loop still running after every handle was dropped");
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let client = unreachable_client();
        assert!(matches!(client.start(), Err(RpcError::Runtime(_))));
    }

    #[test]
    fn test_invoke_blocking_before_start() {
        let client = unreachable_client();
        let result = client.invoke_blocking("anything", vec![]);
        assert_eq!(result.fault_code().unwrap(), fault::TRANSPORT_ERROR);
    }

    #[tokio::test]
    #[should_panic(expected = "must not be empty")]
    async fn test_empty_method_name_panics() {
        let client = unreachable_client();
        client.invoke("", vec![]).await;
    }
}
