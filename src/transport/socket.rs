//! Unix domain socket endpoint.
//!
//! # Example
//!
//! ```ignore
//! use sockrpc_client::transport::SocketStream;
//!
//! let stream = SocketStream::connect("/var/lib/homegear/homegearIPC.sock").await?;
//! let (reader, writer) = stream.into_split();
//! ```

use std::path::{Path, PathBuf};

use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};

use crate::error::Result;

/// Socket path the daemon listens on unless configured otherwise.
pub const DEFAULT_SOCKET_PATH: &str = "/var/lib/homegear/homegearIPC.sock";

/// Connected Unix domain socket.
#[derive(Debug)]
pub struct SocketStream {
    stream: UnixStream,
}

impl SocketStream {
    /// Connect to the daemon's socket.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self { stream })
    }

    /// Split into owned read and write halves.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }

    /// Get a reference to the underlying stream.
    pub fn inner(&self) -> &UnixStream {
        &self.stream
    }
}

/// Listening Unix domain socket; removes its socket file on drop.
#[derive(Debug)]
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketListener {
    /// Bind to a Unix socket path.
    ///
    /// Removes any stale socket file at the path before binding.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<SocketStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(SocketStream { stream })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
