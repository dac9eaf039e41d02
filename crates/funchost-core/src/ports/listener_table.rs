//! Active TCP listener table port.

use std::io;

/// Source of the host's active TCP listeners.
///
/// Implementations must query live kernel state on every call; listener state
/// changes between calls, so nothing may be cached.
pub trait ListenerTable: Send + Sync {
    /// Local ports of every TCP socket currently in the listening state.
    ///
    /// The same port may appear more than once (e.g. IPv4 and IPv6).
    fn listening_ports(&self) -> io::Result<Vec<u16>>;
}
