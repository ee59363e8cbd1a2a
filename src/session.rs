//! One connected session: request correlation and inbound dispatch.
//!
//! A session lives exactly as long as one socket connection. The read loop
//! routes response frames to the waiting `call` by request id and hands
//! request frames to the registry on the blocking pool. When the loop ends,
//! for whatever reason, every outstanding call resolves to a transport fault.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{oneshot, Semaphore};

use crate::codec::MsgPackCodec;
use crate::error::{Result, RpcError};
use crate::handler::{MethodRegistry, Responder};
use crate::handshake::{BoxFuture, Invoker};
use crate::protocol::{Frame, FrameBuffer, Header, RpcRequest, RESERVED_REQUEST_ID};
use crate::value::{fault, Value};
use crate::writer::{OutboundFrame, WriterHandle};

const READ_BUFFER_SIZE: usize = 64 * 1024;

type PendingMap = HashMap<u32, oneshot::Sender<Value>>;

pub(crate) struct Session {
    writer: WriterHandle,
    registry: Arc<MethodRegistry>,
    handler_slots: Arc<Semaphore>,
    pending: Mutex<PendingMap>,
    next_id: AtomicU32,
    invoke_timeout: Duration,
    closed: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        writer: WriterHandle,
        registry: Arc<MethodRegistry>,
        handler_slots: Arc<Semaphore>,
        invoke_timeout: Duration,
    ) -> Self {
        Self {
            writer,
            registry,
            handler_slots,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            invoke_timeout,
            closed: AtomicBool::new(false),
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_request_id(&self) -> u32 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != RESERVED_REQUEST_ID {
                return id;
            }
        }
    }

    /// Call `method` on the peer and wait for its response.
    ///
    /// Transport trouble (closed session, failed write, timeout, connection
    /// loss) resolves to a [`fault::TRANSPORT_ERROR`] value.
    pub(crate) async fn call(&self, method: &str, params: Vec<Value>) -> Value {
        if self.closed.load(Ordering::Acquire) {
            return fault::not_connected();
        }

        let payload = match MsgPackCodec::encode(&RpcRequest::new(method, params)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Could not encode request for {}: {}", method, e);
                return fault::unknown_application_error();
            }
        };

        let request_len = match self.writer.payload_length(&payload) {
            Ok(len) => len,
            Err(e) => {
                tracing::warn!("Refusing request for {}: {}", method, e);
                return fault::transport(format!("Could not send request: {e}"));
            }
        };

        let request_id = self.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending().insert(request_id, tx);
        // Removes the entry however this future ends, including when the
        // caller drops it.
        let _entry = PendingEntry {
            session: self,
            request_id,
        };

        // fail_pending may have drained the map just before our insert.
        if self.closed.load(Ordering::Acquire) {
            return fault::not_connected();
        }

        let header = Header::request(request_id, request_len);
        if let Err(e) = self
            .writer
            .send(OutboundFrame::new(&header, Bytes::from(payload)))
            .await
        {
            tracing::warn!("Could not send request {} ({}): {}", request_id, method, e);
            return fault::transport(format!("Could not send request: {e}"));
        }

        tracing::debug!("Sent request {} ({})", request_id, method);

        match tokio::time::timeout(self.invoke_timeout, rx).await {
            Ok(Ok(value)) => value,
            Ok(Err(_)) => fault::transport("Connection lost."),
            Err(_) => {
                tracing::warn!("Request {} ({}) timed out", request_id, method);
                fault::transport("Request timed out.")
            }
        }
    }

    /// Resolve every outstanding call with a transport fault and refuse new
    /// ones.
    pub(crate) fn fail_pending(&self) {
        self.closed.store(true, Ordering::Release);
        let drained: Vec<_> = self.pending().drain().collect();
        if !drained.is_empty() {
            tracing::debug!("Failing {} pending requests", drained.len());
        }
        for (_, tx) in drained {
            let _ = tx.send(fault::transport("Connection closed."));
        }
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Read frames until the peer closes the socket or a protocol error
    /// occurs. Outstanding calls are failed on exit.
    pub(crate) async fn read_loop<R>(self: Arc<Self>, mut reader: R, max_payload_size: u32) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let result = self.read_frames(&mut reader, max_payload_size).await;
        self.fail_pending();
        result
    }

    async fn read_frames<R>(self: &Arc<Self>, reader: &mut R, max_payload_size: u32) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return Err(RpcError::ConnectionClosed),
                Ok(n) => n,
                Err(e) => return Err(RpcError::Io(e)),
            };

            for frame in frame_buffer.push(&buf[..n])? {
                if frame.is_response() {
                    self.resolve(frame);
                } else {
                    self.spawn_inbound(frame);
                }
            }
        }
    }

    fn resolve(&self, frame: Frame) {
        let request_id = frame.request_id();
        let Some(tx) = self.pending().remove(&request_id) else {
            tracing::debug!("Response for unknown request {}", request_id);
            return;
        };

        let value = match MsgPackCodec::decode::<Value>(frame.payload()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Could not decode response {}: {}", request_id, e);
                fault::unknown_application_error()
            }
        };

        let _ = tx.send(value);
    }

    fn spawn_inbound(self: &Arc<Self>, frame: Frame) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.handle_inbound(frame).await;
        });
    }

    async fn handle_inbound(&self, frame: Frame) {
        let request_id = frame.request_id();
        let responder = Responder::with_writer(request_id, self.writer.clone());

        let request = match MsgPackCodec::decode::<RpcRequest>(frame.payload()) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Could not decode inbound request {}: {}", request_id, e);
                let reply = fault::parse_error(format!("Could not decode request: {e}"));
                if let Err(e) = responder.respond(&reply).await {
                    tracing::debug!("Could not answer request {}: {}", request_id, e);
                }
                return;
            }
        };

        // Calls beyond the limit queue here instead of being dropped.
        let Ok(_permit) = Arc::clone(&self.handler_slots).acquire_owned().await else {
            return;
        };

        tracing::debug!("Inbound request {} ({})", request_id, request.method);

        let registry = Arc::clone(&self.registry);
        let method = request.method.clone();
        let result = tokio::task::spawn_blocking(move || {
            registry.dispatch(&request.method, &request.params)
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Handler task for {} failed: {}", method, e);
            fault::unknown_application_error()
        });

        if let Err(e) = responder.respond(&result).await {
            tracing::warn!("Could not send response {} ({}): {}", request_id, method, e);
        }
    }
}

/// Pending-map slot of one in-flight `call`.
struct PendingEntry<'a> {
    session: &'a Session,
    request_id: u32,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.session.pending().remove(&self.request_id);
    }
}

impl Invoker for Session {
    fn invoke<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Value> {
        Box::pin(self.call(method, params))
    }
}
