//! Application state.
//!
//! Shared state for all request handlers.

use crate::dispatch::Dispatcher;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Source of per-request handlers.
    pub(crate) dispatcher: Dispatcher,
}

impl AppState {
    /// Check if builds are reloaded while running.
    #[must_use]
    pub(crate) fn live_reload_enabled(&self) -> bool {
        matches!(self.dispatcher, Dispatcher::Live { .. })
    }
}
