//! Version marker watcher.
//!
//! Watches the directory holding the version marker and triggers a reload for
//! every debounced create or modify of the marker. Other files in the
//! directory are ignored; the compiler touches the marker last.
//!
//! The directory's parent is watched as well, so a build directory that is
//! deleted and recreated (a clean build) is watched again.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::debouncer::{EventDebouncer, MarkerEvent, MarkerEventKind};
use super::reloader::Reloader;

/// Default debounce duration in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Interval at which debounced events are drained.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Change to the watched build directory itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirChange {
    Created,
    Removed,
}

/// Watches the version marker and reloads the build when it changes.
///
/// Dropping the watcher stops the subscription and its background tasks.
pub struct BuildWatcher {
    marker: PathBuf,
    reloader: Arc<Reloader>,
    watcher: Option<Arc<Mutex<RecommendedWatcher>>>,
    debounce_ms: u64,
    tasks: Vec<JoinHandle<()>>,
}

impl BuildWatcher {
    /// Create a watcher for `marker`. Nothing is watched until
    /// [`start`](Self::start) is called.
    #[must_use]
    pub fn new(marker: PathBuf, reloader: Arc<Reloader>) -> Self {
        Self {
            marker,
            reloader,
            watcher: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            tasks: Vec::new(),
        }
    }

    /// Set the debounce duration in milliseconds.
    #[must_use]
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    /// Marker path as given at construction.
    #[must_use]
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Reloader triggered by marker changes.
    #[must_use]
    pub fn reloader(&self) -> &Arc<Reloader> {
        &self.reloader
    }

    /// Start watching.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker directory does not exist or cannot be
    /// watched.
    pub fn start(&mut self) -> Result<(), notify::Error> {
        let marker = Self::resolve_marker(&self.marker)?;
        let Some(watch_dir) = marker.parent().map(Path::to_path_buf) else {
            return Err(notify::Error::path_not_found().add_path(marker));
        };

        let (tx, mut rx) = mpsc::channel::<Event>(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                // Use blocking_send since callback is sync
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(e) => tracing::error!(error = %e, "Build watcher error"),
            }
        })?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        if let Some(outer) = watch_dir.parent()
            && let Err(e) = watcher.watch(outer, RecursiveMode::NonRecursive)
        {
            tracing::warn!(
                error = %e,
                dir = %outer.display(),
                "Cannot watch build directory parent, a recreated build directory will not reload"
            );
        }
        let watcher = Arc::new(Mutex::new(watcher));
        self.watcher = Some(Arc::clone(&watcher));

        let debouncer = Arc::new(EventDebouncer::new(Duration::from_millis(self.debounce_ms)));
        let debouncer_for_record = Arc::clone(&debouncer);
        let marker_for_record = marker.clone();

        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match Self::watch_dir_change(&event, &watch_dir) {
                    Some(DirChange::Created) => Self::rearm(
                        &watcher,
                        &watch_dir,
                        &marker_for_record,
                        &debouncer_for_record,
                    ),
                    Some(DirChange::Removed) => tracing::warn!(
                        dir = %watch_dir.display(),
                        "Build directory removed, waiting for it to reappear"
                    ),
                    None => Self::record_event(&event, &marker_for_record, &debouncer_for_record),
                }
            }
        }));

        let reloader = Arc::clone(&self.reloader);
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);

            loop {
                interval.tick().await;

                for marker_event in debouncer.drain_ready() {
                    Self::handle_marker_event(marker_event, &reloader);
                }
            }
        }));

        tracing::info!(
            marker = %marker.display(),
            debounce_ms = self.debounce_ms,
            "Watching build marker"
        );
        Ok(())
    }

    /// Canonicalize the marker's directory; the marker itself may not exist yet.
    fn resolve_marker(marker: &Path) -> Result<PathBuf, notify::Error> {
        let file_name = marker
            .file_name()
            .ok_or_else(|| notify::Error::path_not_found().add_path(marker.to_path_buf()))?;
        let parent = match marker.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let parent = parent.canonicalize().map_err(notify::Error::io)?;
        Ok(parent.join(file_name))
    }

    /// Classify an event that concerns the watched directory itself.
    fn watch_dir_change(event: &Event, watch_dir: &Path) -> Option<DirChange> {
        if !event.paths.iter().any(|path| path.as_path() == watch_dir) {
            return None;
        }
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                Some(DirChange::Created)
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                Some(DirChange::Removed)
            }
            _ => None,
        }
    }

    /// Watch a recreated build directory again.
    ///
    /// The compiler may have written the marker before the new watch was in
    /// place, so an existing marker is recorded as created.
    fn rearm(
        watcher: &Mutex<RecommendedWatcher>,
        watch_dir: &Path,
        marker: &Path,
        debouncer: &EventDebouncer,
    ) {
        {
            let mut watcher = watcher.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = watcher.unwatch(watch_dir);
            if let Err(e) = watcher.watch(watch_dir, RecursiveMode::NonRecursive) {
                tracing::error!(
                    error = %e,
                    dir = %watch_dir.display(),
                    "Failed to watch recreated build directory"
                );
                return;
            }
        }
        tracing::info!(dir = %watch_dir.display(), "Build directory recreated, watching again");

        if marker.is_file() {
            debouncer.record(marker.to_path_buf(), MarkerEventKind::Created);
        }
    }

    /// Record a raw filesystem event into the debouncer.
    fn record_event(event: &Event, marker: &Path, debouncer: &EventDebouncer) {
        let kind = match event.kind {
            EventKind::Create(_) => MarkerEventKind::Created,
            EventKind::Modify(_) => MarkerEventKind::Modified,
            _ => return,
        };

        for path in event.paths.iter().filter(|path| path.as_path() == marker) {
            debouncer.record(path.clone(), kind);
            tracing::debug!(path = %path.display(), ?kind, "Recorded marker event");
        }
    }

    /// Spawn a reload for a debounced marker event.
    ///
    /// Reload failures are logged by the reloader; the watcher keeps going.
    fn handle_marker_event(marker_event: MarkerEvent, reloader: &Arc<Reloader>) {
        tracing::debug!(
            path = %marker_event.path.display(),
            kind = ?marker_event.kind,
            "Build marker changed"
        );

        let reloader = Arc::clone(reloader);
        tokio::spawn(async move {
            let _ = reloader.reload().await;
        });
    }
}

impl Drop for BuildWatcher {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Instant;

    use hotbuild_artifact::{ArtifactLoader, BuildReader, ServerBuild, channel};
    use notify::event::{AccessKind, CreateKind, RemoveKind};
    use tempfile::TempDir;

    use crate::notifier::ReadinessNotifier;

    #[derive(Default)]
    struct CountingNotifier {
        announced: Mutex<Vec<String>>,
    }

    impl ReadinessNotifier for CountingNotifier {
        fn announce(&self, build: Arc<ServerBuild>) {
            self.announced.lock().unwrap().push(build.version().to_owned());
        }
    }

    fn write_build(dir: &Path, version: &str) {
        fs::create_dir_all(dir.join("routes")).unwrap();
        fs::write(dir.join("routes/index.html"), format!("<p>{version}</p>")).unwrap();
        fs::write(
            dir.join("index.json"),
            format!(
                r#"{{ "version": "{version}", "assets": {{ "version": "{version}" }}, "routes": [
                    {{ "id": "root", "path": "/", "module": "routes/index.html" }}
                ] }}"#
            ),
        )
        .unwrap();
    }

    fn setup(build_dir: &Path) -> (BuildWatcher, BuildReader, Arc<CountingNotifier>) {
        write_build(build_dir, "h1");
        fs::write(build_dir.join("version.txt"), "h1").unwrap();

        let loader = Arc::new(ArtifactLoader::new(build_dir, "index.json"));
        let (publisher, reader) = channel(Arc::new(loader.load().unwrap()));
        let notifier = Arc::new(CountingNotifier::default());
        let reloader = Arc::new(Reloader::new(
            loader,
            publisher,
            Arc::clone(&notifier) as Arc<dyn ReadinessNotifier>,
        ));
        let watcher =
            BuildWatcher::new(build_dir.join("version.txt"), reloader).with_debounce_ms(20);
        (watcher, reader, notifier)
    }

    async fn wait_for_version(reader: &BuildReader, version: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if reader.current().version() == version {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }

    #[test]
    fn test_record_event_filters_to_marker() {
        let debouncer = EventDebouncer::new(Duration::ZERO);
        let marker = PathBuf::from("/build/version.txt");

        let other = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/build/index.json"));
        BuildWatcher::record_event(&other, &marker, &debouncer);
        assert!(debouncer.drain_ready().is_empty());

        let touched = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(marker.clone());
        BuildWatcher::record_event(&touched, &marker, &debouncer);
        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, MarkerEventKind::Modified);
    }

    #[test]
    fn test_record_event_ignores_remove_and_access() {
        let debouncer = EventDebouncer::new(Duration::ZERO);
        let marker = PathBuf::from("/build/version.txt");

        for kind in [
            EventKind::Remove(RemoveKind::File),
            EventKind::Access(AccessKind::Any),
        ] {
            let event = Event::new(kind).add_path(marker.clone());
            BuildWatcher::record_event(&event, &marker, &debouncer);
        }

        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_watch_dir_change() {
        let watch_dir = PathBuf::from("/work/build");

        let created = Event::new(EventKind::Create(CreateKind::Folder)).add_path(watch_dir.clone());
        assert_eq!(BuildWatcher::watch_dir_change(&created, &watch_dir), Some(DirChange::Created));

        let renamed = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(watch_dir.clone());
        assert_eq!(BuildWatcher::watch_dir_change(&renamed, &watch_dir), Some(DirChange::Created));

        let removed = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(watch_dir.clone());
        assert_eq!(BuildWatcher::watch_dir_change(&removed, &watch_dir), Some(DirChange::Removed));

        let sibling =
            Event::new(EventKind::Create(CreateKind::Folder)).add_path(PathBuf::from("/work/src"));
        assert_eq!(BuildWatcher::watch_dir_change(&sibling, &watch_dir), None);

        let marker = Event::new(EventKind::Create(CreateKind::File))
            .add_path(watch_dir.join("version.txt"));
        assert_eq!(BuildWatcher::watch_dir_change(&marker, &watch_dir), None);
    }

    #[test]
    fn test_resolve_marker_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = BuildWatcher::resolve_marker(&dir.path().join("missing/version.txt"));
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_marker_write_reloads_build() {
        let dir = TempDir::new().unwrap();
        let (mut watcher, reader, notifier) = setup(dir.path());
        watcher.start().unwrap();

        write_build(dir.path(), "h2");
        fs::write(dir.path().join("version.txt"), "h2").unwrap();

        assert!(wait_for_version(&reader, "h2").await, "build was not reloaded");
        assert!(notifier.announced.lock().unwrap().contains(&"h2".to_owned()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_artifact_write_without_marker_is_ignored() {
        let dir = TempDir::new().unwrap();
        let (mut watcher, reader, notifier) = setup(dir.path());
        watcher.start().unwrap();

        write_build(dir.path(), "h2");
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(reader.current().version(), "h1");
        assert!(notifier.announced.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_build_keeps_serving_previous() {
        let dir = TempDir::new().unwrap();
        let (mut watcher, reader, notifier) = setup(dir.path());
        watcher.start().unwrap();

        fs::write(dir.path().join("index.json"), "{ broken").unwrap();
        fs::write(dir.path().join("version.txt"), "h2").unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while notifier.announced.lock().unwrap().is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        assert_eq!(reader.current().version(), "h1");
        assert_eq!(notifier.announced.lock().unwrap().first().map(String::as_str), Some("h1"));

        // The watcher stays armed after a failed reload.
        write_build(dir.path(), "h3");
        fs::write(dir.path().join("version.txt"), "h3").unwrap();
        assert!(wait_for_version(&reader, "h3").await, "watcher stopped after failure");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recreated_build_directory_is_watched_again() {
        let root = TempDir::new().unwrap();
        let build_dir = root.path().join("build");
        let (mut watcher, reader, notifier) = setup(&build_dir);
        watcher.start().unwrap();

        fs::remove_dir_all(&build_dir).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        write_build(&build_dir, "h2");
        fs::write(build_dir.join("version.txt"), "h2").unwrap();

        assert!(wait_for_version(&reader, "h2").await, "recreated directory was not watched");
        assert!(notifier.announced.lock().unwrap().contains(&"h2".to_owned()));

        write_build(&build_dir, "h3");
        fs::write(build_dir.join("version.txt"), "h3").unwrap();
        assert!(wait_for_version(&reader, "h3").await, "watcher stopped after re-arming");
    }
}
