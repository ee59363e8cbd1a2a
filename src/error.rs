//! Error types for sockrpc-client.
//!
//! These errors describe failures of the plumbing underneath the RPC layer.
//! They never leave `Client::invoke` or `MethodRegistry::dispatch`, which
//! always resolve to a [`Value`](crate::value::Value).

use thiserror::Error;

/// Transport, codec and lifecycle failures.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parsing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// The peer sent a frame header that cannot be accepted.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The socket or the writer task is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Outbound queue stayed full past the writer's timeout.
    #[error("Backpressure timeout")]
    BackpressureTimeout,

    /// `start()` called on a client whose connection loop is already running.
    #[error("Client already started")]
    AlreadyStarted,

    /// `start()` called outside a Tokio runtime.
    #[error("No Tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

pub type Result<T> = std::result::Result<T, RpcError>;
