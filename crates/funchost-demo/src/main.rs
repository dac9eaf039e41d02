//! `funchost-demo host start --port <N> --<provider>`
//!
//! Binds the port, prints a startup banner ending with the `Functions:`
//! listing, then serves the greeting function until killed.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use funchost_demo::{FUNCTION_NAME, GreetingState, router};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "funchost-demo", version)]
#[command(about = "Stand-in functions host serving a sample greeting function")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Functions host commands
    Host {
        #[command(subcommand)]
        command: HostCommand,
    },
}

#[derive(Subcommand, Debug)]
enum HostCommand {
    /// Start the host
    Start(StartArgs),
}

/// Provider flags are accepted for compatibility; every provider serves the same function.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
struct StartArgs {
    #[arg(long, default_value_t = 7071)]
    port: u16,

    #[arg(long)]
    csharp: bool,
    #[arg(long)]
    node: bool,
    #[arg(long)]
    python: bool,
    #[arg(long)]
    powershell: bool,
    #[arg(long)]
    java: bool,
    #[arg(long)]
    custom: bool,
}

impl StartArgs {
    fn provider(&self) -> &'static str {
        [
            (self.csharp, "dotnet"),
            (self.node, "node"),
            (self.python, "python"),
            (self.powershell, "powershell"),
            (self.java, "java"),
            (self.custom, "custom"),
        ]
        .into_iter()
        .find_map(|(set, name)| set.then_some(name))
        .unwrap_or("dotnet")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // Probing the tool runs it without arguments; that must succeed.
    let Some(Command::Host {
        command: HostCommand::Start(args),
    }) = cli.command
    else {
        println!("funchost-demo {}", env!("CARGO_PKG_VERSION"));
        println!("Usage: funchost-demo host start --port <PORT> --<provider>");
        return Ok(());
    };

    let listener = TcpListener::bind(("127.0.0.1", args.port))
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;

    println!("Functions host (funchost-demo {})", env!("CARGO_PKG_VERSION"));
    println!("Worker runtime: {}", args.provider());
    println!(
        "[{}] Host lock lease acquired",
        chrono::Utc::now().to_rfc3339()
    );
    println!();
    println!("Functions:");
    println!();
    println!(
        "        {FUNCTION_NAME}: [GET,POST] http://localhost:{}/api/{FUNCTION_NAME}",
        args.port
    );
    println!();

    axum::serve(listener, router(GreetingState::from_env()))
        .await
        .context("server error")?;
    Ok(())
}
