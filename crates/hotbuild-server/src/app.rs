//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::handler::Handler;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch;
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `public_dir` - Public files, served with a short cache policy
/// * `build_dir` - Client assets, served under `/build` as immutable
pub(crate) fn create_router(state: Arc<AppState>, public_dir: &Path, build_dir: &Path) -> Router {
    tracing::debug!(
        live_reload = state.live_reload_enabled(),
        public_dir = %public_dir.display(),
        build_dir = %build_dir.display(),
        "Creating router"
    );

    let dispatcher = dispatch::dispatch.with_state(state);

    Router::new()
        .nest_service(
            "/build",
            static_files::build_assets(build_dir, dispatcher.clone()),
        )
        .fallback_service(static_files::public_files(public_dir, dispatcher))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
}
