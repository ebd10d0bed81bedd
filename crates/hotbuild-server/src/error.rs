//! Server error types.

use std::net::AddrParseError;

use axum::Json;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use hotbuild_artifact::LoadError;
use serde::Serialize;

use crate::handler::HandlerError;

/// Error answering a single request.
///
/// Rendered as a JSON 500; the server keeps running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The request handler failed.
    #[error("request dispatch failed: {0}")]
    Dispatch(#[from] HandlerError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");

        let mut response = (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response();
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

/// Error starting the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The initial build could not be loaded.
    #[error("failed to load initial build: {0}")]
    Load(#[from] LoadError),

    /// The build marker could not be watched.
    #[error("failed to watch build marker: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid listen address.
    #[error("invalid listen address: {0}")]
    Addr(#[from] AddrParseError),

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
