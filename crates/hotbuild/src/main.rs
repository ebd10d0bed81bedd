//! hotbuild CLI - hot-reloading build dispatcher.
//!
//! Provides commands for:
//! - `serve`: Serve the compiled server build, reloading it in development
//! - `orders subscribe|publish|save`: Dapr order pub/sub and state glue

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use commands::{OrdersArgs, ServeArgs};
use output::Output;

/// hotbuild - hot-reloading build dispatcher.
#[derive(Parser)]
#[command(name = "hotbuild", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the compiled server build.
    Serve(ServeArgs),
    /// Dapr order commands.
    Orders(OrdersArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // Check if verbose flag is set for serve command
    let verbose = matches!(&cli.command, Commands::Serve(args) if args.verbose);

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, directives.as_deref()))
        .init();

    let result = match cli.command {
        Commands::Serve(args) => tokio::runtime::Runtime::new()
            .map_err(error::CliError::from)
            .and_then(|rt| rt.block_on(args.execute())),
        Commands::Orders(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

/// Build the log filter.
///
/// `--verbose` enables DEBUG (request traces); otherwise `directives` (from
/// `RUST_LOG`) apply, defaulting to INFO.
fn log_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives.unwrap_or_default())
}
