//! Port query handlers.

use anyhow::Result;
use funchost_runtime::PortOracle;

/// Print a free port in `[lower, upper)`.
pub fn find_port(lower: Option<u16>, upper: Option<u32>) -> Result<()> {
    let port = PortOracle::system().find_available_port(lower, upper)?;
    println!("{port}");
    Ok(())
}

/// Print and return whether `port` has a listener.
pub fn is_listening(port: u16) -> Result<bool> {
    let listening = PortOracle::system().is_listening(port)?;
    println!("{}", if listening { "listening" } else { "free" });
    Ok(listening)
}
