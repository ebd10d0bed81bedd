//! The current-build cell.
//!
//! Exactly one [`ServerBuild`] is current at any instant. The cell is split
//! into a single [`BuildPublisher`] (not `Clone`, owned by whoever reloads)
//! and any number of [`BuildReader`]s.
//!
//! # Thread Safety
//!
//! - `current()` takes a read lock only long enough to clone the `Arc`
//! - `publish()` swaps the pointer under the write lock
//! - a reader holding an `Arc<ServerBuild>` keeps that snapshot alive for as
//!   long as it needs it, regardless of later publishes

use std::sync::{Arc, PoisonError, RwLock};

use crate::build::ServerBuild;

type Cell = Arc<RwLock<Arc<ServerBuild>>>;

/// Create the current-build cell seeded with `initial`.
#[must_use]
pub fn channel(initial: Arc<ServerBuild>) -> (BuildPublisher, BuildReader) {
    let cell: Cell = Arc::new(RwLock::new(initial));
    let reader = BuildReader {
        cell: Arc::clone(&cell),
    };
    (BuildPublisher { cell }, reader)
}

/// Read side of the current-build cell.
#[derive(Clone, Debug)]
pub struct BuildReader {
    cell: Cell,
}

impl BuildReader {
    /// Get the current build snapshot.
    ///
    /// The returned `Arc` stays valid after later publishes.
    #[must_use]
    pub fn current(&self) -> Arc<ServerBuild> {
        // The guarded value is a single pointer, so a poisoned lock still holds
        // a complete build.
        let guard = self.cell.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }
}

/// Write side of the current-build cell.
#[derive(Debug)]
pub struct BuildPublisher {
    cell: Cell,
}

impl BuildPublisher {
    /// Make `build` current, returning the build it replaced.
    pub fn publish(&self, build: Arc<ServerBuild>) -> Arc<ServerBuild> {
        let mut guard = self.cell.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, build)
    }

    /// Get the current build snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<ServerBuild> {
        self.reader().current()
    }

    /// Create another reader for this cell.
    #[must_use]
    pub fn reader(&self) -> BuildReader {
        BuildReader {
            cell: Arc::clone(&self.cell),
        }
    }
}
