//! Client configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! {
//!   "socket_path": "/run/daemon/ipc.sock",
//!   "invoke_timeout_ms": 10000,
//!   "reconnect": { "initial_delay_ms": 250 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::transport::DEFAULT_SOCKET_PATH;
use crate::writer::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_PENDING_FRAMES};

/// Default time an `invoke` waits for its response.
pub const DEFAULT_INVOKE_TIMEOUT_MS: u64 = 30_000;

/// Default maximum inbound calls running at once.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub socket_path: PathBuf,
    pub invoke_timeout_ms: u64,
    pub reconnect: ReconnectPolicy,
    pub max_concurrent_handlers: usize,
    pub max_pending_frames: usize,
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            invoke_timeout_ms: DEFAULT_INVOKE_TIMEOUT_MS,
            reconnect: ReconnectPolicy::default(),
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }
}

/// Exponential backoff between connection attempts.
///
/// Attempts never stop; the delay grows by `multiplier` per consecutive
/// failure and is capped at `max_delay_ms`. A successful connection resets
/// the attempt count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let millis = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.invoke_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrent_handlers, DEFAULT_MAX_CONCURRENT_HANDLERS);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ClientConfig::from_json_str(
            r#"{ "socket_path": "/tmp/x.sock", "reconnect": { "initial_delay_ms": 5 } }"#,
        )
        .unwrap();

        assert_eq!(config.socket_path, PathBuf::from("/tmp/x.sock"));
        assert_eq!(config.reconnect.initial_delay_ms, 5);
        assert_eq!(config.reconnect.max_delay_ms, 10_000);
        assert_eq!(config.invoke_timeout_ms, DEFAULT_INVOKE_TIMEOUT_MS);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ClientConfig::from_json_str(r#"{ "socket": "/tmp/x.sock" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{ "max_concurrent_handlers": 4 }"#).unwrap();

        let config = ClientConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_concurrent_handlers, 4);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = ReconnectPolicy {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(1_000));
    }
}
