//! Static file serving.
//!
//! Client assets under `/build` and the rest of the public directory are
//! served from disk. A miss in either falls through to the build dispatcher.

use std::path::Path;

use axum::http::HeaderValue;
use tower::Layer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;

use crate::middleware::cache;

type CachedDir<F> = SetResponseHeader<ServeDir<F>, HeaderValue>;

/// Serve fingerprinted client assets with an immutable cache policy.
pub(crate) fn build_assets<F>(dir: &Path, fallback: F) -> CachedDir<F> {
    cache::immutable_layer().layer(
        ServeDir::new(dir)
            .fallback(fallback)
            .call_fallback_on_method_not_allowed(true),
    )
}

/// Serve public files with a short cache policy.
pub(crate) fn public_files<F>(dir: &Path, fallback: F) -> CachedDir<F> {
    cache::short_lived_layer().layer(
        ServeDir::new(dir)
            .fallback(fallback)
            .call_fallback_on_method_not_allowed(true),
    )
}
