//! TCP port availability queries.

use std::collections::HashSet;
use std::sync::Arc;

use funchost_core::{FunctionsError, FunctionsResult, ListenerTable};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::system::SystemListenerTable;

/// First port (inclusive) searched when no range is given.
pub const DEFAULT_PORT_RANGE_START: u16 = 50_000;

/// End (exclusive) of the default search range.
pub const DEFAULT_PORT_RANGE_END: u16 = 60_000;

/// One past the highest TCP port.
const PORT_LIMIT: u32 = 1 << 16;

/// Answers "is anything listening on this port?" from the live listener table.
///
/// Stateless: every call re-reads the table.
#[derive(Clone)]
pub struct PortOracle {
    listeners: Arc<dyn ListenerTable>,
}

impl PortOracle {
    pub fn new(listeners: Arc<dyn ListenerTable>) -> Self {
        Self { listeners }
    }

    /// Oracle backed by the OS listener table.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemListenerTable))
    }

    /// Whether any TCP socket on this host is listening on `port`.
    pub fn is_listening(&self, port: u16) -> FunctionsResult<bool> {
        Ok(self.listeners.listening_ports()?.contains(&port))
    }

    /// Pick a port in `[lower, upper)` that nothing is listening on.
    ///
    /// Defaults to `[50000, 60000)`. `upper` is a `u32` so that 65535 can be
    /// included with `upper = 65536`; larger values are clamped. The choice
    /// is uniform over the free ports so concurrent callers rarely collide.
    pub fn find_available_port(
        &self,
        lower: Option<u16>,
        upper: Option<u32>,
    ) -> FunctionsResult<u16> {
        let lower = lower.unwrap_or(DEFAULT_PORT_RANGE_START);
        let upper = upper.unwrap_or(u32::from(DEFAULT_PORT_RANGE_END));

        let busy: HashSet<u16> = self.listeners.listening_ports()?.into_iter().collect();
        let free: Vec<u16> = (u32::from(lower)..upper.min(PORT_LIMIT))
            .filter_map(|port| u16::try_from(port).ok())
            .filter(|port| !busy.contains(port))
            .collect();

        let port = free
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(FunctionsError::NoAvailablePort { lower, upper })?;

        debug!(port = %port, lower, upper, free = free.len(), "Selected available port");
        Ok(port)
    }
}

impl std::fmt::Debug for PortOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortOracle").finish_non_exhaustive()
    }
}
