//! Root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Start and inspect local functions host instances.
#[derive(Parser, Debug)]
#[command(name = "funchost")]
#[command(about = "Start, probe and tear down local functions host instances")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
