//! Development-mode build reloading.
//!
//! [`BuildWatcher`] observes the version marker and hands debounced changes
//! to the [`Reloader`], which loads, publishes and announces the new build.

mod debouncer;
mod reloader;
mod watcher;

pub use reloader::{ReloadError, Reloader};
pub use watcher::{BuildWatcher, DEFAULT_DEBOUNCE_MS};
