//! # catgraph CLI entry point
//!
//! Parses command-line arguments, installs the tracing subscriber and
//! dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use catgraph_cli::logging::{self, LogFormat};
use catgraph_cli::policy::{run_policy, PolicyArgs};
use catgraph_cli::serve::{run_serve, ServeArgs};

/// catgraph: admission-controlled query gateway for cats and their owners.
#[derive(Parser, Debug)]
#[command(name = "catgraph", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway.
    Serve(ServeArgs),

    /// Check or inspect a field policy document.
    Policy(PolicyArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "catgraph starting");

    let result = match cli.command {
        Commands::Serve(args) => run_serve(&args).await,
        Commands::Policy(args) => run_policy(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
