//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use funchost_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Start(args) => handlers::start::execute(args).await,
        Commands::FindPort { lower, upper } => handlers::ports::find_port(lower, upper),
        Commands::IsListening { port } => {
            if !handlers::ports::is_listening(port)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Which { tool } => handlers::which::execute(&tool).await,
        Commands::ResolveProject {
            project,
            runtime,
            from,
        } => handlers::project::execute(&project, &runtime, from.as_deref()),
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
