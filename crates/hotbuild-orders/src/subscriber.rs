//! Order subscriber app.
//!
//! Dapr discovers subscriptions with `GET /dapr/subscribe` and delivers
//! topic events as CloudEvents to the declared route.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use hotbuild_config::OrdersConfig;

use crate::error::OrdersError;

/// Route Dapr delivers order events to.
pub const ORDERS_ROUTE: &str = "/orders";

/// Subscription entry returned to Dapr.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Subscription {
    /// Pub/sub component name.
    pub pubsubname: String,
    /// Topic subscribed to.
    pub topic: String,
    /// App route receiving events.
    pub route: String,
}

/// The parts of a CloudEvent the subscriber reads.
#[derive(Debug, Deserialize)]
struct CloudEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

/// Create the subscriber router.
pub fn subscriber_router(config: &OrdersConfig) -> Router {
    let subscriptions = Arc::new(vec![Subscription {
        pubsubname: config.pubsub.clone(),
        topic: config.topic.clone(),
        route: ORDERS_ROUTE.to_owned(),
    }]);

    Router::new()
        .route("/dapr/subscribe", get(list_subscriptions))
        .route(ORDERS_ROUTE, post(receive_order))
        .with_state(subscriptions)
}

async fn list_subscriptions(
    State(subscriptions): State<Arc<Vec<Subscription>>>,
) -> Json<Vec<Subscription>> {
    Json(subscriptions.as_ref().clone())
}

async fn receive_order(Json(event): Json<CloudEvent>) -> StatusCode {
    tracing::info!(
        id = event.id.as_deref().unwrap_or("-"),
        data = %event.data,
        "Subscriber received order"
    );
    StatusCode::OK
}

/// Serve the subscriber app on `server_host:app_port` until Ctrl-C.
pub async fn run_subscriber(config: &OrdersConfig) -> Result<(), OrdersError> {
    let addr = SocketAddr::from_str(&format!("{}:{}", config.server_host, config.app_port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, topic = %config.topic, "Order subscriber listening");

    axum::serve(listener, subscriber_router(config))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
