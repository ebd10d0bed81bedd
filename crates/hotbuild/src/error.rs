//! CLI error types.

use hotbuild_config::ConfigError;
use hotbuild_orders::OrdersError;
use hotbuild_server::StartupError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Server(#[from] StartupError),

    #[error("{0}")]
    Orders(#[from] OrdersError),
}
