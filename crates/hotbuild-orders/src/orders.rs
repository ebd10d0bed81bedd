//! Order publishing and persistence loops.

use std::thread;
use std::time::Duration;

use rand::RngExt;
use serde::{Deserialize, Serialize};

use hotbuild_config::OrdersConfig;

use crate::client::{DaprClient, StateOperation};
use crate::error::OrdersError;

/// Orders published by default.
pub const DEFAULT_PUBLISH_COUNT: u32 = 10;
/// Pause between published orders.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(1);
/// Orders saved by default.
pub const DEFAULT_SAVE_COUNT: u32 = 100;
/// Pause between saved orders.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_millis(500);

/// An order event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier.
    pub order_id: u32,
}

/// Publish orders `1..=count` to the configured topic, `interval` apart.
///
/// Stops at the first failed publish.
pub fn publish_orders(
    client: &DaprClient,
    config: &OrdersConfig,
    count: u32,
    interval: Duration,
) -> Result<(), OrdersError> {
    for order_id in 1..=count {
        let order = Order { order_id };
        client.publish(&config.pubsub, &config.topic, &order)?;
        tracing::info!(order_id, topic = %config.topic, "Published order");

        if order_id < count {
            thread::sleep(interval);
        }
    }
    Ok(())
}

/// Save orders `1..=count` to the configured state store, `interval` apart.
///
/// Each order is stored under its id with a random value in `1..1000`.
pub fn save_orders(
    client: &DaprClient,
    config: &OrdersConfig,
    count: u32,
    interval: Duration,
) -> Result<(), OrdersError> {
    let mut rng = rand::rng();

    for order_id in 1..=count {
        let key = order_id.to_string();
        let value: u32 = rng.random_range(1..1000);
        let operation =
            StateOperation::upsert(key.clone(), serde_json::json!({ "key": key, "value": value }));
        client.state_transaction(&config.state_store, &[operation])?;
        tracing::info!(order_id, value, store = %config.state_store, "Saved order");

        if order_id < count {
            thread::sleep(interval);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;

    use crate::client::tests::fake_sidecar;

    #[test]
    fn test_order_serialization() {
        let json = serde_json::to_value(Order { order_id: 5 }).unwrap();
        assert_eq!(json, serde_json::json!({ "orderId": 5 }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_publish_orders_in_sequence() {
        let (url, received) = fake_sidecar(StatusCode::NO_CONTENT).await;

        tokio::task::spawn_blocking(move || {
            publish_orders(&DaprClient::new(&url), &OrdersConfig::default(), 3, Duration::ZERO)
        })
        .await
        .unwrap()
        .unwrap();

        let received = received.lock().unwrap();
        let ids: Vec<_> = received.iter().map(|(_, body)| body["orderId"].clone()).collect();
        assert_eq!(ids, vec![serde_json::json!(1), serde_json::json!(2), serde_json::json!(3)]);
        assert!(received.iter().all(|(path, _)| path == "/v1.0/publish/remix_js_pubsub/orders"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_orders_values_in_range() {
        let (url, received) = fake_sidecar(StatusCode::NO_CONTENT).await;

        tokio::task::spawn_blocking(move || {
            save_orders(&DaprClient::new(&url), &OrdersConfig::default(), 5, Duration::ZERO)
        })
        .await
        .unwrap()
        .unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 5);
        for (index, (path, body)) in received.iter().enumerate() {
            let request = &body["operations"][0]["request"];
            assert_eq!(path, "/v1.0/state/remix_js_state/transaction");
            assert_eq!(request["key"], (index + 1).to_string());
            assert_eq!(request["value"]["key"], (index + 1).to_string());
            let value = request["value"]["value"].as_u64().unwrap();
            assert!((1..1000).contains(&value), "value {value} out of range");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_publish_orders_stops_on_error() {
        let (url, received) = fake_sidecar(StatusCode::BAD_REQUEST).await;

        let result = tokio::task::spawn_blocking(move || {
            publish_orders(&DaprClient::new(&url), &OrdersConfig::default(), 3, Duration::ZERO)
        })
        .await
        .unwrap();

        assert!(matches!(result, Err(OrdersError::HttpResponse { status: 400, .. })));
        assert_eq!(received.lock().unwrap().len(), 1);
    }
}
