//! Hot-reloading HTTP dispatcher for compiled server builds.
//!
//! An external compiler writes a server build (route manifest plus route
//! modules) into a build directory and touches a version marker when done.
//! This crate serves HTTP requests from that build:
//!
//! - **Development**: the marker is watched; every change reloads the build,
//!   publishes it and announces it to the development orchestrator. Requests
//!   always resolve the current build, so no restart is needed.
//! - **Production**: the build is loaded once and served for the life of the
//!   process.
//!
//! # Quick Start
//!
//! ```ignore
//! use hotbuild_server::{ServerConfig, notifier_for, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let notifier = notifier_for(config.dev_origin.as_deref());
//!     run_server(config, notifier).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! compiler ──writes──► build/index.json, build/version.txt
//!                                          │
//!                              notify ─────┘
//!                                │
//!                          BuildWatcher ──► Reloader ──► BuildPublisher
//!                                              │              │
//!                                              ▼              ▼
//!                                     ReadinessNotifier   BuildReader
//!                                             ┌───────────────┘
//! HTTP ─► axum ─► /build, public/ ─miss─► Dispatcher ─► RequestHandler
//! ```

mod app;
mod dispatch;
mod error;
mod handler;
mod middleware;
mod notifier;
mod reload;
mod state;
mod static_files;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use hotbuild_artifact::{ArtifactLoader, ServerBuild, channel};
use hotbuild_config::Mode;

pub use dispatch::Dispatcher;
pub use error::{ServerError, StartupError};
pub use handler::{BUILD_VERSION_HEADER, HandlerError, RequestHandler, create_request_handler};
pub use notifier::{DevServerNotifier, LogNotifier, ReadinessNotifier, notifier_for};
pub use reload::{BuildWatcher, DEFAULT_DEBOUNCE_MS, ReloadError, Reloader};

use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Development or production.
    pub mode: Mode,
    /// Directory the compiler writes the server build to.
    pub build_dir: PathBuf,
    /// Manifest file name inside `build_dir`.
    pub index: String,
    /// Version marker path.
    pub marker: PathBuf,
    /// Public files directory.
    pub public_dir: PathBuf,
    /// Client asset directory served under `/build`.
    pub public_build_dir: PathBuf,
    /// Development orchestrator origin for readiness announcements.
    pub dev_origin: Option<String>,
    /// Marker debounce window in milliseconds.
    pub debounce_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
            mode: Mode::Production,
            build_dir: PathBuf::from("build"),
            index: "index.json".to_owned(),
            marker: PathBuf::from("build/version.txt"),
            public_dir: PathBuf::from("public"),
            public_build_dir: PathBuf::from("public/build"),
            dev_origin: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// A loaded, ready-to-serve application.
///
/// Holds the watcher (development only) so that it lives as long as the
/// router is served.
pub struct PreparedServer {
    router: Router,
    dispatcher: Dispatcher,
    watcher: Option<BuildWatcher>,
}

impl PreparedServer {
    /// The application router.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build the next request would be answered from.
    #[must_use]
    pub fn current_build(&self) -> Arc<ServerBuild> {
        self.dispatcher.current_build()
    }

    /// Whether the build marker is being watched.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Announce the current build. No-op unless watching.
    pub fn announce_current(&self) {
        if let Some(watcher) = &self.watcher {
            watcher.reloader().announce_current();
        }
    }
}

/// Load the initial build and assemble the application.
///
/// In development the marker watcher is started; must be called from within
/// a tokio runtime.
///
/// # Errors
///
/// Returns [`StartupError`] if the initial build cannot be loaded or the
/// marker cannot be watched.
pub fn prepare(
    config: &ServerConfig,
    notifier: Arc<dyn ReadinessNotifier>,
) -> Result<PreparedServer, StartupError> {
    let loader = ArtifactLoader::new(&config.build_dir, &config.index);
    let initial = Arc::new(loader.load()?);

    if !initial.is_ready() {
        tracing::warn!(
            version = initial.version(),
            "Initial build has no asset manifest, serving it anyway"
        );
    }
    tracing::info!(
        version = initial.version(),
        routes = initial.routes().len(),
        mode = %config.mode,
        "Initial build loaded"
    );

    let (dispatcher, watcher) = if config.mode.is_development() {
        let (publisher, reader) = channel(initial);
        let reloader = Arc::new(Reloader::new(Arc::new(loader), publisher, notifier));
        let mut watcher = BuildWatcher::new(config.marker.clone(), reloader)
            .with_debounce_ms(config.debounce_ms);
        watcher.start()?;
        (Dispatcher::live(reader, config.mode), Some(watcher))
    } else {
        (Dispatcher::fixed(initial, config.mode), None)
    };

    let state = Arc::new(AppState {
        dispatcher: dispatcher.clone(),
    });
    let router = app::create_router(state, &config.public_dir, &config.public_build_dir);

    Ok(PreparedServer {
        router,
        dispatcher,
        watcher,
    })
}

/// Run the server.
///
/// # Arguments
///
/// * `config` - Server configuration
/// * `notifier` - Receives the current build after each reload
///
/// # Errors
///
/// Returns an error if the initial build cannot be loaded or the server
/// fails to start.
pub async fn run_server(
    config: ServerConfig,
    notifier: Arc<dyn ReadinessNotifier>,
) -> Result<(), StartupError> {
    let prepared = prepare(&config, notifier)?;

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, mode = %config.mode, "Server listening");

    prepared.announce_current();

    axum::serve(listener, prepared.router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(watcher) = &prepared.watcher {
        tracing::debug!(marker = %watcher.marker().display(), "Stopping build watcher");
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from hotbuild config.
///
/// # Arguments
///
/// * `config` - hotbuild configuration
#[must_use]
pub fn server_config_from_config(config: &hotbuild_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        mode: config.server.mode,
        build_dir: config.build_resolved.dir.clone(),
        index: config.build_resolved.index.clone(),
        marker: config.build_resolved.marker_path(),
        public_dir: config.public_resolved.dir.clone(),
        public_build_dir: config.public_resolved.build_dir.clone(),
        dev_origin: config.dev.origin.clone(),
        debounce_ms: config.dev.debounce_ms,
    }
}
