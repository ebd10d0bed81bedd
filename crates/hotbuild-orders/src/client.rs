//! Dapr sidecar HTTP client.
//!
//! Sync client for the pub/sub and state APIs of a local Dapr sidecar.

use std::time::Duration;

use serde::Serialize;
use ureq::Agent;

use hotbuild_config::OrdersConfig;

use crate::error::OrdersError;

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// One operation in a state transaction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StateOperation {
    /// Operation kind (`upsert` or `delete`).
    pub operation: &'static str,
    /// Key and value the operation applies to.
    pub request: StateItem,
}

/// A key/value pair in a state store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StateItem {
    /// State key.
    pub key: String,
    /// State value.
    pub value: serde_json::Value,
}

impl StateOperation {
    /// Insert or replace `key` with `value`.
    #[must_use]
    pub fn upsert(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            operation: "upsert",
            request: StateItem {
                key: key.into(),
                value,
            },
        }
    }
}

#[derive(Serialize)]
struct Transaction<'a> {
    operations: &'a [StateOperation],
}

/// Dapr sidecar client.
pub struct DaprClient {
    agent: Agent,
    base_url: String,
}

impl DaprClient {
    /// Create a client for the sidecar at `base_url` (e.g. `http://localhost:3500`).
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Create a client from the orders configuration.
    #[must_use]
    pub fn from_config(config: &OrdersConfig) -> Self {
        Self::new(&config.dapr_url())
    }

    /// Sidecar base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Publish `event` to `topic` on the `pubsub` component.
    pub fn publish<T: Serialize>(
        &self,
        pubsub: &str,
        topic: &str,
        event: &T,
    ) -> Result<(), OrdersError> {
        let url = format!("{}/v1.0/publish/{pubsub}/{topic}", self.base_url);
        self.post_json(&url, event)
    }

    /// Apply `operations` to the `store` state component in one transaction.
    pub fn state_transaction(
        &self,
        store: &str,
        operations: &[StateOperation],
    ) -> Result<(), OrdersError> {
        let url = format!("{}/v1.0/state/{store}/transaction", self.base_url);
        self.post_json(&url, &Transaction { operations })
    }

    fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<(), OrdersError> {
        let response = self.agent.post(url).send_json(body)?;

        let status = response.status().as_u16();
        if status >= 400 {
            let error_body = response
                .into_body()
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_owned());
            return Err(OrdersError::HttpResponse {
                status,
                body: error_body,
            });
        }

        Ok(())
    }
}
