//! Order pub/sub and state glue for a Dapr sidecar.
//!
//! Talks to the sidecar over its HTTP API only:
//!
//! - [`DaprClient::publish`] and [`publish_orders`] publish order events
//! - [`DaprClient::state_transaction`] and [`save_orders`] persist orders
//! - [`subscriber_router`] and [`run_subscriber`] receive order events

mod client;
mod error;
mod orders;
mod subscriber;

pub use client::{DaprClient, StateItem, StateOperation};
pub use error::OrdersError;
pub use orders::{
    DEFAULT_PUBLISH_COUNT, DEFAULT_PUBLISH_INTERVAL, DEFAULT_SAVE_COUNT, DEFAULT_SAVE_INTERVAL,
    Order, publish_orders, save_orders,
};
pub use subscriber::{ORDERS_ROUTE, Subscription, run_subscriber, subscriber_router};
