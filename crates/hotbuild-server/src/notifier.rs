//! Readiness announcements.
//!
//! After every completed reload attempt the development orchestrator is told
//! which build is current so it can release clients waiting on a rebuild.
//! Announcements are best effort: failures are logged and never reach the
//! reload path.

use std::sync::Arc;
use std::time::Duration;

use hotbuild_artifact::ServerBuild;
use serde::Serialize;
use ureq::Agent;

/// Timeout for a single ping request.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives the current build after each reload attempt.
pub trait ReadinessNotifier: Send + Sync {
    /// Announce `build` as current. Must not block the caller.
    fn announce(&self, build: Arc<ServerBuild>);
}

/// Body of the readiness ping.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PingPayload<'a> {
    build_hash: &'a str,
}

/// Posts `{"buildHash": ...}` to `{origin}/ping`.
#[derive(Clone)]
pub struct DevServerNotifier {
    agent: Agent,
    ping_url: String,
}

impl DevServerNotifier {
    /// Create a notifier for the orchestrator at `origin`.
    #[must_use]
    pub fn new(origin: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(PING_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            ping_url: format!("{}/ping", origin.trim_end_matches('/')),
        }
    }

    /// URL the ping is posted to.
    #[must_use]
    pub fn ping_url(&self) -> &str {
        &self.ping_url
    }

    fn ping(&self, build: &ServerBuild) {
        let payload = PingPayload {
            build_hash: build.build_hash(),
        };

        match self.agent.post(&self.ping_url).send_json(&payload) {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    url = %self.ping_url,
                    build_hash = payload.build_hash,
                    "Readiness announced"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    url = %self.ping_url,
                    status = response.status().as_u16(),
                    "Readiness ping rejected"
                );
            }
            Err(e) => {
                tracing::warn!(url = %self.ping_url, error = %e, "Readiness ping failed");
            }
        }
    }
}

impl ReadinessNotifier for DevServerNotifier {
    fn announce(&self, build: Arc<ServerBuild>) {
        let notifier = self.clone();
        let task = move || notifier.ping(&build);

        // Announcements may come from outside the runtime (tests, shutdown).
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(task);
            }
            Err(_) => {
                std::thread::spawn(task);
            }
        }
    }
}

/// Logs announcements when no orchestrator is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl ReadinessNotifier for LogNotifier {
    fn announce(&self, build: Arc<ServerBuild>) {
        tracing::info!(
            version = build.version(),
            build_hash = build.build_hash(),
            generation = build.generation(),
            ready = build.is_ready(),
            "Build current"
        );
    }
}

/// Pick the notifier for an optional orchestrator origin.
#[must_use]
pub fn notifier_for(origin: Option<&str>) -> Arc<dyn ReadinessNotifier> {
    match origin {
        Some(origin) => Arc::new(DevServerNotifier::new(origin)),
        None => Arc::new(LogNotifier),
    }
}
