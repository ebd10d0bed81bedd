//! Error types for the order sidecar glue.

/// Error from Dapr sidecar operations.
#[derive(Debug, thiserror::Error)]
pub enum OrdersError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] ureq::Error),

    /// HTTP response error (sidecar returned error status).
    #[error("HTTP error: {status} - {body}")]
    HttpResponse {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// Invalid subscriber address.
    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
