//! `hotbuild serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use hotbuild_config::{CliSettings, Config, Mode};
use hotbuild_server::{notifier_for, run_server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover hotbuild.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Run mode; only "development" enables reloading (overrides config).
    #[arg(long, env = "APP_ENV", value_parser = parse_mode)]
    mode: Option<Mode>,

    /// Directory the compiler writes the server build to (overrides config).
    #[arg(short, long)]
    build_dir: Option<PathBuf>,

    /// Public files directory (overrides config).
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Development orchestrator origin for readiness pings (overrides config).
    #[arg(long, env = "DEV_ORIGIN")]
    dev_origin: Option<String>,

    /// Enable verbose output (debug-level request traces).
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_mode(value: &str) -> Result<Mode, std::convert::Infallible> {
    Ok(Mode::from_env_value(value))
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            mode: self.mode,
            build_dir: self.build_dir,
            public_dir: self.public_dir,
            dev_origin: self.dev_origin,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.info(&format!(
            "Starting server on {}:{} ({})",
            config.server.host, config.server.port, config.server.mode
        ));
        output.info(&format!(
            "Build: {}",
            config.build_resolved.index_path().display()
        ));
        output.info(&format!(
            "Public directory: {}",
            config.public_resolved.dir.display()
        ));

        if config.server.mode.is_development() {
            output.info(&format!(
                "Watching: {}",
                config.build_resolved.marker_path().display()
            ));
            match &config.dev.origin {
                Some(origin) => output.info(&format!("Readiness pings: {origin}/ping")),
                None => output.warning("Readiness pings: disabled (no dev origin)"),
            }
        }

        let server_config = server_config_from_config(&config);
        let notifier = notifier_for(server_config.dev_origin.as_deref());
        run_server(server_config, notifier).await?;

        Ok(())
    }
}
