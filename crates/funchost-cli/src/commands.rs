//! Subcommand definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use funchost_core::DEFAULT_PROVIDER;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a functions instance and keep it running until Ctrl-C
    Start(StartArgs),

    /// Print a TCP port nothing is listening on
    FindPort {
        /// Lowest port to consider (inclusive)
        #[arg(long)]
        lower: Option<u16>,
        /// Highest port to consider (exclusive, up to 65536)
        #[arg(long)]
        upper: Option<u32>,
    },

    /// Report whether anything is listening on a TCP port (exit code 1 if not)
    IsListening {
        port: u16,
    },

    /// Locate a runnable functions host tool on PATH
    Which {
        /// Tool name to look for
        #[arg(long, default_value = "func")]
        tool: String,
    },

    /// Resolve a project's build-output directory
    ResolveProject {
        /// Project folder, relative to some ancestor of the search root
        project: String,
        /// Target runtime folder (e.g. net8.0)
        runtime: String,
        /// Directory to search upward from (defaults to the current directory)
        #[arg(long)]
        from: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Project folder, relative to some ancestor of the search root
    #[arg(long)]
    pub project: String,

    /// Target runtime folder (e.g. net8.0)
    #[arg(long)]
    pub runtime: String,

    /// Port to listen on; a free one is chosen when omitted
    #[arg(long)]
    pub port: Option<u16>,

    /// Functions provider flag passed to the host
    #[arg(long, default_value = DEFAULT_PROVIDER)]
    pub provider: String,

    /// Environment variable for the host, as KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "env", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// JSON settings file whose values are flattened into environment variables
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Explicit functions host tool, skipping PATH discovery
    #[arg(long, env = "FUNCHOST_FUNC_PATH")]
    pub func_path: Option<PathBuf>,

    /// Directory the project search starts from
    #[arg(long, env = "FUNCHOST_SEARCH_ROOT")]
    pub search_root: Option<PathBuf>,

    /// Seconds to wait for the host to report readiness
    #[arg(long, env = "FUNCHOST_STARTUP_TIMEOUT_SECS")]
    pub startup_timeout: Option<u64>,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
