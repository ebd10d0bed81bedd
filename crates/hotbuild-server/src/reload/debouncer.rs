//! Event debouncing for the version marker.
//!
//! A single marker write usually surfaces as a burst of raw events (create,
//! data change, metadata change). The debouncer folds each burst into one
//! event per path so the build is reloaded once per distinct change.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Kind of marker event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MarkerEventKind {
    Created,
    Modified,
}

/// A debounced marker event.
#[derive(Clone, Debug)]
pub(crate) struct MarkerEvent {
    pub path: PathBuf,
    pub kind: MarkerEventKind,
}

/// Pending event waiting to be emitted.
struct PendingEvent {
    kind: MarkerEventKind,
    deadline: Instant,
}

/// Thread-safe event debouncer.
pub(crate) struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, PendingEvent>>,
    debounce_duration: Duration,
}

impl EventDebouncer {
    /// Create a new debouncer with the specified debounce duration.
    pub fn new(debounce_duration: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            debounce_duration,
        }
    }

    /// Record an event, pushing the path's deadline out by the debounce window.
    pub fn record(&self, path: PathBuf, kind: MarkerEventKind) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.debounce_duration;

        pending
            .entry(path)
            .and_modify(|event| {
                event.kind = Self::coalesce(event.kind, kind);
                event.deadline = deadline;
            })
            .or_insert(PendingEvent { kind, deadline });
    }

    /// Coalesce two event kinds. A creation anywhere in the burst wins.
    fn coalesce(existing: MarkerEventKind, new: MarkerEventKind) -> MarkerEventKind {
        use MarkerEventKind::{Created, Modified};

        match (existing, new) {
            (Modified, Modified) => Modified,
            _ => Created,
        }
    }

    /// Drain events that have passed their debounce deadline.
    pub fn drain_ready(&self) -> Vec<MarkerEvent> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let (ready, waiting): (HashMap<_, _>, HashMap<_, _>) = std::mem::take(&mut *pending)
            .into_iter()
            .partition(|(_, event)| event.deadline <= now);
        *pending = waiting;

        ready
            .into_iter()
            .map(|(path, event)| MarkerEvent {
                path,
                kind: event.kind,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_event_emitted_after_deadline() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/build/version.txt");

        debouncer.record(path.clone(), MarkerEventKind::Modified);

        // Before deadline
        let events = debouncer.drain_ready();
        assert!(events.is_empty());

        thread::sleep(Duration::from_millis(15));

        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, path);
        assert_eq!(events[0].kind, MarkerEventKind::Modified);

        // Should be empty after drain
        let events = debouncer.drain_ready();
        assert!(events.is_empty());
    }

    #[test]
    fn test_burst_coalesces_to_one_event() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/build/version.txt");

        // A compiler writing the marker: create, write, chmod
        debouncer.record(path.clone(), MarkerEventKind::Created);
        debouncer.record(path.clone(), MarkerEventKind::Modified);
        debouncer.record(path.clone(), MarkerEventKind::Modified);

        thread::sleep(Duration::from_millis(15));

        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, MarkerEventKind::Created);
    }

    #[test]
    fn test_separate_bursts_emit_separately() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/build/version.txt");

        debouncer.record(path.clone(), MarkerEventKind::Modified);
        thread::sleep(Duration::from_millis(15));
        assert_eq!(debouncer.drain_ready().len(), 1);

        debouncer.record(path, MarkerEventKind::Modified);
        thread::sleep(Duration::from_millis(15));
        assert_eq!(debouncer.drain_ready().len(), 1);
    }

    #[test]
    fn test_new_event_extends_deadline() {
        let debouncer = EventDebouncer::new(Duration::from_millis(40));
        let path = PathBuf::from("/build/version.txt");

        debouncer.record(path.clone(), MarkerEventKind::Modified);
        thread::sleep(Duration::from_millis(25));
        debouncer.record(path, MarkerEventKind::Modified);
        thread::sleep(Duration::from_millis(25));

        // 50ms after the first event, but only 25ms after the second
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_coalesce_all_combinations() {
        use MarkerEventKind::{Created, Modified};

        assert_eq!(EventDebouncer::coalesce(Created, Created), Created);
        assert_eq!(EventDebouncer::coalesce(Created, Modified), Created);
        assert_eq!(EventDebouncer::coalesce(Modified, Created), Created);
        assert_eq!(EventDebouncer::coalesce(Modified, Modified), Modified);
    }
}
