//! Active TCP listener enumeration.
//!
//! Linux exposes the kernel socket tables under `/proc/net`; elsewhere we
//! parse `netstat -an`. Nothing is cached between calls.

use std::io;

use funchost_core::ListenerTable;

/// `/proc/net/tcp` state code for `LISTEN`.
const TCP_LISTEN: &str = "0A";

/// Listener table read from the live OS state.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemListenerTable;

impl ListenerTable for SystemListenerTable {
    fn listening_ports(&self) -> io::Result<Vec<u16>> {
        #[cfg(target_os = "linux")]
        {
            read_proc_net_tables()
        }

        #[cfg(not(target_os = "linux"))]
        {
            run_netstat()
        }
    }
}

#[cfg(target_os = "linux")]
fn read_proc_net_tables() -> io::Result<Vec<u16>> {
    let mut ports = parse_proc_net_tcp(&std::fs::read_to_string("/proc/net/tcp")?);
    match std::fs::read_to_string("/proc/net/tcp6") {
        Ok(table) => ports.extend(parse_proc_net_tcp(&table)),
        // Kernels built without IPv6 have no tcp6 table.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    Ok(ports)
}

#[cfg(not(target_os = "linux"))]
fn run_netstat() -> io::Result<Vec<u16>> {
    let output = std::process::Command::new("netstat").arg("-an").output()?;
    if !output.status.success() {
        return Err(io::Error::other(format!(
            "netstat exited with {}",
            output.status
        )));
    }
    Ok(parse_netstat(&String::from_utf8_lossy(&output.stdout)))
}

/// Local ports of listening sockets in a `/proc/net/tcp{,6}` table.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_net_tcp(table: &str) -> Vec<u16> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (local, state) = (fields.get(1)?, fields.get(3)?);
            if *state != TCP_LISTEN {
                return None;
            }
            let (_, port) = local.rsplit_once(':')?;
            u16::from_str_radix(port, 16).ok()
        })
        .collect()
}

/// Local ports of TCP sockets in the `LISTEN`/`LISTENING` state of `netstat -an`.
///
/// Handles both the BSD layout (`tcp4 0 0 *.7071 *.* LISTEN`) and the Windows
/// layout (`TCP 0.0.0.0:7071 0.0.0.0:0 LISTENING`).
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn parse_netstat(output: &str) -> Vec<u16> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let proto = fields.first()?;
            if !proto.to_ascii_lowercase().starts_with("tcp") {
                return None;
            }
            if !fields.last()?.to_ascii_uppercase().starts_with("LISTEN") {
                return None;
            }
            let local = if fields.len() >= 6 { fields[3] } else { fields.get(1)? };
            let (_, port) = local.rsplit_once([':', '.'])?;
            port.parse::<u16>().ok()
        })
        .collect()
}
