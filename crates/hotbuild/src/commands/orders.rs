//! `hotbuild orders` subcommand group.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use hotbuild_config::Config;
use hotbuild_orders::{
    DEFAULT_PUBLISH_COUNT, DEFAULT_PUBLISH_INTERVAL, DEFAULT_SAVE_COUNT, DEFAULT_SAVE_INTERVAL,
    DaprClient, publish_orders, run_subscriber, save_orders,
};

use crate::error::CliError;
use crate::output::Output;

/// Sidecar connection settings shared by all order commands.
#[derive(Args)]
pub(crate) struct SidecarArgs {
    /// Path to configuration file (default: auto-discover hotbuild.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dapr sidecar host (overrides config).
    #[arg(long, env = "DAPR_HOST", global = true)]
    dapr_host: Option<String>,

    /// Dapr sidecar HTTP port (overrides config).
    #[arg(long, env = "DAPR_HTTP_PORT", global = true)]
    dapr_http_port: Option<u16>,

    /// Host the subscriber binds to (overrides config).
    #[arg(long, env = "SERVER_HOST", global = true)]
    server_host: Option<String>,

    /// Port the subscriber binds to (overrides config).
    #[arg(long, env = "APP_PORT", global = true)]
    app_port: Option<u16>,
}

impl SidecarArgs {
    /// Load configuration and apply the sidecar overrides.
    fn load_config(&self) -> Result<Config, CliError> {
        let mut config = Config::load(self.config.as_deref(), None)?;

        if let Some(host) = &self.dapr_host {
            config.orders.dapr_host.clone_from(host);
        }
        if let Some(port) = self.dapr_http_port {
            config.orders.dapr_http_port = port;
        }
        if let Some(host) = &self.server_host {
            config.orders.server_host.clone_from(host);
        }
        if let Some(port) = self.app_port {
            config.orders.app_port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Order commands.
#[derive(Args)]
pub(crate) struct OrdersArgs {
    #[command(flatten)]
    sidecar: SidecarArgs,

    #[command(subcommand)]
    command: OrdersCommand,
}

#[derive(Subcommand)]
enum OrdersCommand {
    /// Serve the subscriber app receiving order events.
    Subscribe,
    /// Publish order events.
    Publish(LoopArgs),
    /// Save orders to the state store.
    Save(LoopArgs),
}

/// Arguments for the publish and save loops.
#[derive(Args)]
struct LoopArgs {
    /// Number of orders (default: 10 for publish, 100 for save).
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Pause between orders in milliseconds (default: 1000 for publish, 500 for save).
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl LoopArgs {
    /// Pause between orders, `default` unless overridden.
    fn interval(&self, default: Duration) -> Duration {
        self.interval_ms.map_or(default, Duration::from_millis)
    }
}

impl OrdersArgs {
    /// Execute the orders subcommand.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.sidecar.load_config()?;
        let orders = &config.orders;

        match self.command {
            OrdersCommand::Subscribe => {
                output.info(&format!(
                    "Subscribing to {}/{} on {}:{}",
                    orders.pubsub, orders.topic, orders.server_host, orders.app_port
                ));
                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(run_subscriber(orders))?;
            }
            OrdersCommand::Publish(args) => {
                let count = args.count.unwrap_or(DEFAULT_PUBLISH_COUNT);
                let interval = args.interval(DEFAULT_PUBLISH_INTERVAL);
                output.info(&format!(
                    "Publishing {count} orders to {} via {}",
                    orders.topic,
                    orders.dapr_url()
                ));
                publish_orders(&DaprClient::from_config(orders), orders, count, interval)?;
                output.success(&format!("Published {count} orders"));
            }
            OrdersCommand::Save(args) => {
                let count = args.count.unwrap_or(DEFAULT_SAVE_COUNT);
                let interval = args.interval(DEFAULT_SAVE_INTERVAL);
                output.info(&format!(
                    "Saving {count} orders to {} via {}",
                    orders.state_store,
                    orders.dapr_url()
                ));
                save_orders(&DaprClient::from_config(orders), orders, count, interval)?;
                output.success(&format!("Saved {count} orders"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_loop_interval_defaults() {
        let args = LoopArgs {
            count: None,
            interval_ms: None,
        };
        assert_eq!(args.interval(DEFAULT_PUBLISH_INTERVAL), Duration::from_secs(1));
        assert_eq!(args.interval(DEFAULT_SAVE_INTERVAL), Duration::from_millis(500));
    }

    #[test]
    fn test_loop_interval_override() {
        let args = LoopArgs {
            count: Some(3),
            interval_ms: Some(10),
        };
        assert_eq!(args.interval(DEFAULT_PUBLISH_INTERVAL), Duration::from_millis(10));
    }
}
