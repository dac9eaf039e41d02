//! Harness settings.
//!
//! Every timing constant the controller uses lives here so tests can shrink
//! them. Durations are stored in milliseconds to keep the serialized form flat.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Overrides the PATH lookup for the functions host tool.
pub const FUNC_PATH_ENV: &str = "FUNCHOST_FUNC_PATH";

/// Overrides the startup timeout, in whole seconds.
pub const STARTUP_TIMEOUT_ENV: &str = "FUNCHOST_STARTUP_TIMEOUT_SECS";

/// Overrides the directory the project search starts from.
pub const SEARCH_ROOT_ENV: &str = "FUNCHOST_SEARCH_ROOT";

/// Text the host prints on stdout once it is ready.
pub const DEFAULT_READINESS_MARKER: &str = "Functions:";

/// Name of the functions host tool on PATH.
pub const DEFAULT_TOOL_NAME: &str = "func";

/// Tunables for starting and stopping functions instances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessSettings {
    /// How long to wait for readiness or exit after spawning.
    pub startup_timeout_ms: u64,

    /// Port checks before giving up on a busy port.
    pub port_release_attempts: u32,
    pub port_release_delay_ms: u64,

    /// HTTP probes after readiness before giving up.
    pub confirm_attempts: u32,
    pub confirm_delay_ms: u64,
    /// Per-probe client timeout.
    pub confirm_request_timeout_ms: u64,

    /// Kill attempts per pid while the OS reports access denied.
    pub kill_attempts: u32,
    pub kill_retry_delay_ms: u64,

    /// How long teardown waits for the root process to exit after killing it.
    pub exit_wait_ms: u64,

    /// How long a tool candidate may run during discovery.
    pub probe_timeout_ms: u64,

    pub readiness_marker: String,
    pub tool_name: String,

    /// Explicit tool path; used instead of PATH discovery when it exists.
    pub func_path: Option<PathBuf>,

    /// Directory the project search starts from; the current directory if unset.
    pub search_root: Option<PathBuf>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            startup_timeout_ms: 60_000,
            port_release_attempts: 30,
            port_release_delay_ms: 200,
            confirm_attempts: 20,
            confirm_delay_ms: 500,
            confirm_request_timeout_ms: 2_000,
            kill_attempts: 3,
            kill_retry_delay_ms: 250,
            exit_wait_ms: 10_000,
            probe_timeout_ms: 10_000,
            readiness_marker: DEFAULT_READINESS_MARKER.to_string(),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            func_path: None,
            search_root: None,
        }
    }
}

impl HarnessSettings {
    /// Defaults overlaid with `FUNCHOST_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values produced by `lookup`. Unparseable numbers are ignored.
    #[must_use]
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(FUNC_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            self.func_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = lookup(STARTUP_TIMEOUT_ENV).and_then(|s| s.trim().parse::<u64>().ok())
        {
            self.startup_timeout_ms = secs.saturating_mul(1_000);
        }
        if let Some(root) = lookup(SEARCH_ROOT_ENV).filter(|p| !p.trim().is_empty()) {
            self.search_root = Some(PathBuf::from(root));
        }
        self
    }

    #[must_use]
    pub fn with_func_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.func_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = Some(root.into());
        self
    }

    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout_ms = duration_ms(timeout);
        self
    }

    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub const fn port_release_delay(&self) -> Duration {
        Duration::from_millis(self.port_release_delay_ms)
    }

    pub const fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    pub const fn confirm_request_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_request_timeout_ms)
    }

    pub const fn kill_retry_delay(&self) -> Duration {
        Duration::from_millis(self.kill_retry_delay_ms)
    }

    pub const fn exit_wait(&self) -> Duration {
        Duration::from_millis(self.exit_wait_ms)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} must be at least 1")]
    ZeroAttempts(&'static str),

    #[error("Startup timeout must be greater than zero")]
    ZeroStartupTimeout,

    #[error("Readiness marker cannot be empty")]
    EmptyReadinessMarker,

    #[error("Tool name cannot be empty")]
    EmptyToolName,
}

/// Validate settings values.
pub fn validate_settings(settings: &HarnessSettings) -> Result<(), SettingsError> {
    if settings.startup_timeout_ms == 0 {
        return Err(SettingsError::ZeroStartupTimeout);
    }

    for (name, attempts) in [
        ("port_release_attempts", settings.port_release_attempts),
        ("confirm_attempts", settings.confirm_attempts),
        ("kill_attempts", settings.kill_attempts),
    ] {
        if attempts == 0 {
            return Err(SettingsError::ZeroAttempts(name));
        }
    }

    if settings.readiness_marker.is_empty() {
        return Err(SettingsError::EmptyReadinessMarker);
    }

    if settings.tool_name.trim().is_empty() {
        return Err(SettingsError::EmptyToolName);
    }

    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = HarnessSettings::default();
        assert_eq!(settings.startup_timeout(), Duration::from_secs(60));
        assert_eq!(settings.port_release_attempts, 30);
        assert_eq!(settings.port_release_delay(), Duration::from_millis(200));
        assert_eq!(settings.confirm_attempts, 20);
        assert_eq!(settings.exit_wait(), Duration::from_secs(10));
        assert_eq!(settings.readiness_marker, "Functions:");
        assert_eq!(settings.tool_name, "func");
        assert!(settings.func_path.is_none());
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = HashMap::from([
            (FUNC_PATH_ENV, "/opt/func/func"),
            (STARTUP_TIMEOUT_ENV, "5"),
            (SEARCH_ROOT_ENV, "/src/Tests/bin/Debug"),
        ]);
        let settings =
            HarnessSettings::default().with_env_lookup(|k| env.get(k).map(ToString::to_string));

        assert_eq!(settings.func_path, Some(PathBuf::from("/opt/func/func")));
        assert_eq!(settings.startup_timeout(), Duration::from_secs(5));
        assert_eq!(settings.search_root, Some(PathBuf::from("/src/Tests/bin/Debug")));
    }

    #[test]
    fn test_env_overlay_ignores_garbage() {
        let settings = HarnessSettings::default().with_env_lookup(|k| match k {
            STARTUP_TIMEOUT_ENV => Some("soon".to_string()),
            FUNC_PATH_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(settings, HarnessSettings::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: HarnessSettings =
            serde_json::from_str(r#"{ "startup_timeout_ms": 1500, "tool_name": "func2" }"#).unwrap();
        assert_eq!(settings.startup_timeout(), Duration::from_millis(1500));
        assert_eq!(settings.tool_name, "func2");
        assert_eq!(settings.confirm_attempts, 20);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let settings = HarnessSettings {
            confirm_attempts: 0,
            ..HarnessSettings::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::ZeroAttempts("confirm_attempts"))
        );
    }

    #[test]
    fn test_validate_rejects_empty_marker() {
        let settings = HarnessSettings {
            readiness_marker: String::new(),
            ..HarnessSettings::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::EmptyReadinessMarker)
        );
    }
}
