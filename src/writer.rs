//! Dedicated writer task owning the socket's write half.
//!
//! Outbound requests from `invoke` callers and responses from inbound
//! handlers all funnel through one channel into a single task, so frames are
//! never interleaved on the socket.
//!
//! ```text
//! invoke()   ─┐
//! handler 1  ─┼─► mpsc::Sender<OutboundFrame> ─► writer task ─► socket
//! handler N  ─┘
//! ```
//!
//! Frames queued while a write is in flight go out together in one vectored
//! write. Senders wait while more than `max_pending_frames` are queued and
//! give up after `backpressure_timeout`.

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::error::{Result, RpcError};
use crate::protocol::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};

pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_BATCH_SIZE: usize = 64;

/// An encoded header plus payload, ready for the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    pub header: [u8; HEADER_SIZE],
    pub payload: Bytes,
}

impl OutboundFrame {
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub max_pending_frames: usize,
    pub channel_capacity: usize,
    pub backpressure_timeout: Duration,
    /// Largest payload the peer accepts; bigger frames are refused.
    pub max_payload_size: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

/// Frames queued but not yet written, with a wakeup for waiting senders.
#[derive(Default)]
struct Queued {
    count: AtomicUsize,
    drained: Notify,
}

/// Cloneable handle for queueing frames on the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    queued: Arc<Queued>,
    max_pending: usize,
    timeout: Duration,
    max_payload: u32,
}

impl WriterHandle {
    /// Queue a frame for writing.
    ///
    /// # Errors
    ///
    /// `Protocol` if the payload exceeds the size limit. `BackpressureTimeout`
    /// if the queue stays full for longer than the configured timeout;
    /// `ConnectionClosed` once the writer task is gone.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.payload_length(&frame.payload)?;

        if self.is_backpressure_active() {
            tokio::time::timeout(self.timeout, self.wait_for_room())
                .await
                .map_err(|_| RpcError::BackpressureTimeout)?;
        }

        self.queued.count.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(frame).await.is_err() {
            self.queued.count.fetch_sub(1, Ordering::AcqRel);
            return Err(RpcError::ConnectionClosed);
        }
        Ok(())
    }

    async fn wait_for_room(&self) {
        loop {
            let drained = self.queued.drained.notified();
            if !self.is_backpressure_active() {
                return;
            }
            drained.await;
        }
    }

    /// Length header value for `payload`.
    ///
    /// # Errors
    ///
    /// `Protocol` if it exceeds the peer's payload limit.
    pub fn payload_length(&self, payload: &[u8]) -> Result<u32> {
        u32::try_from(payload.len())
            .ok()
            .filter(|&len| len <= self.max_payload)
            .ok_or_else(|| {
                RpcError::Protocol(format!(
                    "Payload size {} exceeds maximum {}",
                    payload.len(),
                    self.max_payload
                ))
            })
    }

    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.pending_count() >= self.max_pending
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.queued.count.load(Ordering::Acquire)
    }

    /// The writer task has exited (socket closed or a write failed).
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task for `writer`.
///
/// The task shuts the write half down and returns `Ok` once every handle is
/// dropped; it returns the error of the first failed write.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let queued = Arc::new(Queued::default());

    let handle = WriterHandle {
        tx,
        queued: Arc::clone(&queued),
        max_pending: config.max_pending_frames.max(1),
        timeout: config.backpressure_timeout,
        max_payload: config.max_payload_size,
    };

    (handle, tokio::spawn(writer_loop(rx, writer, queued)))
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W, queued: Arc<Queued>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            let Ok(frame) = rx.try_recv() else { break };
            batch.push(frame);
        }

        let result = write_batch(&mut writer, &batch).await;
        queued.count.fetch_sub(batch.len(), Ordering::AcqRel);
        queued.drained.notify_waiters();
        batch.clear();

        if let Err(e) = result {
            tracing::debug!("Socket write failed: {}", e);
            return Err(e);
        }
    }

    let _ = writer.shutdown().await;
    Ok(())
}

async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut written = 0;

    while written < total {
        let n = writer.write_vectored(&remaining_slices(batch, written)).await?;
        if n == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
        }
        written += n;
    }

    writer.flush().await?;
    Ok(())
}

/// IoSlices covering `batch` minus its first `skip` bytes.
fn remaining_slices(batch: &[OutboundFrame], skip: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for part in batch
        .iter()
        .flat_map(|frame| [&frame.header[..], &frame.payload[..]])
    {
        let end = offset + part.len();
        if skip < end && !part.is_empty() {
            slices.push(IoSlice::new(&part[skip.saturating_sub(offset)..]));
        }
        offset = end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    fn frame(request_id: u32, payload: &'static [u8]) -> OutboundFrame {
        OutboundFrame::new(
            &Header::request(request_id, payload.len() as u32),
            Bytes::from_static(payload),
        )
    }

    #[tokio::test]
    async fn test_frame_reaches_socket() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        handle.send(frame(42, b"hello")).await.unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(Header::decode(&buf).unwrap().request_id, 42);
        assert_eq!(&buf[HEADER_SIZE..], b"hello");
    }

    #[tokio::test]
    async fn test_frames_keep_send_order() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        for id in 1..=10u32 {
            handle.send(frame(id, b"abcd")).await.unwrap();
        }

        let mut buf = vec![0u8; 10 * (HEADER_SIZE + 4)];
        server.read_exact(&mut buf).await.unwrap();
        let ids: Vec<u32> = buf
            .chunks(HEADER_SIZE + 4)
            .filter_map(|chunk| Header::decode(chunk).map(|h| h.request_id))
            .collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_backpressure_times_out_when_queue_stays_full() {
        let (tx, _rx) = mpsc::channel::<OutboundFrame>(10);
        let handle = WriterHandle {
            tx,
            queued: Arc::new(Queued {
                count: AtomicUsize::new(1),
                drained: Notify::new(),
            }),
            max_pending: 1,
            timeout: Duration::from_millis(5),
            max_payload: DEFAULT_MAX_PAYLOAD_SIZE,
        };

        assert!(handle.is_backpressure_active());
        let result = handle.send(frame(1, b"")).await;
        assert!(matches!(result, Err(RpcError::BackpressureTimeout)));
    }

    #[tokio::test]
    async fn test_backpressure_clears_after_drain() {
        let (client, mut server) = duplex(64 * 1024);
        let config = WriterConfig {
            max_pending_frames: 1,
            ..WriterConfig::default()
        };
        let (handle, _task) = spawn_writer_task(client, config);

        for id in 1..=5u32 {
            handle.send(frame(id, b"x")).await.unwrap();
        }

        let mut buf = vec![0u8; 5 * (HEADER_SIZE + 1)];
        server.read_exact(&mut buf).await.unwrap();
    }

    #[test]
    fn test_remaining_slices_skip_into_header_and_payload() {
        let batch = vec![frame(42, b"hello"), frame(43, b"")];

        // Empty payloads contribute no slice.
        assert_eq!(remaining_slices(&batch, 0).len(), 3);

        let slices = remaining_slices(&batch, 5);
        assert_eq!(slices[0].len(), HEADER_SIZE - 5);
        assert_eq!(slices[1].len(), 5);

        let slices = remaining_slices(&batch, HEADER_SIZE + 2);
        assert_eq!(slices[0].len(), 3);
        assert_eq!(slices[1].len(), HEADER_SIZE);
    }

    #[tokio::test]
    async fn test_oversize_payload_is_refused() {
        let (client, _server) = duplex(4096);
        let config = WriterConfig {
            max_payload_size: 4,
            ..WriterConfig::default()
        };
        let (handle, _task) = spawn_writer_task(client, config);

        assert_eq!(handle.payload_length(b"abcd").unwrap(), 4);
        assert!(matches!(handle.payload_length(b"abcde"), Err(RpcError::Protocol(_))));

        let result = handle.send(frame(1, b"abcde")).await;
        assert!(matches!(result, Err(RpcError::Protocol(_))));
        assert_eq!(handle.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_drop_shuts_down_task() {
        let (client, mut server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        drop(handle);
        assert!(task.await.unwrap().is_ok());

        let mut buf = Vec::new();
        assert_eq!(server.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_after_task_exit_is_connection_closed() {
        let (client, server) = duplex(16);
        drop(server);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        // First write fails on the closed pipe and ends the task.
        let _ = handle.send(frame(1, b"payload")).await;
        assert!(task.await.unwrap().is_err());

        let result = handle.send(frame(2, b"payload")).await;
        assert!(matches!(result, Err(RpcError::ConnectionClosed)));
        assert!(handle.is_closed());
    }
}
