//! Transport module - Unix domain socket handling.
//!
//! The client side only ever connects ([`SocketStream::connect`]); the
//! listener exists for the daemon side of the protocol and for tests that
//! play the daemon.

mod socket;

pub use socket::{SocketListener, SocketStream, DEFAULT_SOCKET_PATH};
