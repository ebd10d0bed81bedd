//! CLI command implementations.

pub(crate) mod orders;
pub(crate) mod serve;

pub(crate) use orders::OrdersArgs;
pub(crate) use serve::ServeArgs;
