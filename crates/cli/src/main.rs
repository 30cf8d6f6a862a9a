/// Entry point for the Thicket CLI, a control-flow obfuscator for CFG IR modules.
///
/// This module parses command-line arguments and dispatches to subcommands for obfuscating a
/// module, rendering control flow graphs, or printing the textual IR. It initializes logging and
/// handles the main execution flow.
use clap::Parser;
use thicket_cli::commands::{Cmd, Command};
use tracing_subscriber::EnvFilter;

/// Command-line interface for Thicket.
///
/// Thicket reads a module of procedures as JSON, inserts bogus control flow guarded by opaque
/// predicates, and writes the transformed module back out.
#[derive(Parser)]
#[command(name = "thicket")]
#[command(about = "Thicket: bogus control-flow obfuscator")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

/// Runs the Thicket CLI with the provided arguments.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli.command.execute().await
}
