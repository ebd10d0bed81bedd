//! Load, publish, announce.

use std::sync::Arc;
use std::time::Instant;

use hotbuild_artifact::{ArtifactLoader, BuildPublisher, BuildReader, LoadError, ServerBuild};
use tokio::task::JoinError;

use crate::notifier::ReadinessNotifier;

/// A reload attempt that did not produce a new build.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    /// The build artifact could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The blocking load task panicked or was cancelled.
    #[error("build load task failed: {0}")]
    Join(#[from] JoinError),
}

/// Replaces the current build from disk.
///
/// Owns the only [`BuildPublisher`]. Every completed [`reload`](Self::reload)
/// announces exactly one build: the new one on success, the retained one on
/// failure.
pub struct Reloader {
    loader: Arc<ArtifactLoader>,
    publisher: BuildPublisher,
    notifier: Arc<dyn ReadinessNotifier>,
}

impl Reloader {
    /// Create a reloader.
    #[must_use]
    pub fn new(
        loader: Arc<ArtifactLoader>,
        publisher: BuildPublisher,
        notifier: Arc<dyn ReadinessNotifier>,
    ) -> Self {
        Self {
            loader,
            publisher,
            notifier,
        }
    }

    /// Reader for the build this reloader publishes.
    #[must_use]
    pub fn reader(&self) -> BuildReader {
        self.publisher.reader()
    }

    /// Build currently published.
    #[must_use]
    pub fn current(&self) -> Arc<ServerBuild> {
        self.publisher.current()
    }

    /// Announce the current build without reloading.
    pub fn announce_current(&self) {
        self.notifier.announce(self.current());
    }

    /// Load a fresh build, publish it and announce it.
    ///
    /// Concurrent calls are independent; the last one to finish stays
    /// current.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError`] if the build could not be loaded. The previous
    /// build stays current and is announced again.
    pub async fn reload(&self) -> Result<Arc<ServerBuild>, ReloadError> {
        let start = Instant::now();
        let loader = Arc::clone(&self.loader);

        let loaded = match tokio::task::spawn_blocking(move || loader.load()).await {
            Ok(Ok(build)) => Ok(Arc::new(build)),
            Ok(Err(e)) => Err(ReloadError::from(e)),
            Err(e) => Err(ReloadError::from(e)),
        };

        match loaded {
            Ok(build) => {
                self.publisher.publish(Arc::clone(&build));

                if !build.is_ready() {
                    tracing::warn!(
                        version = build.version(),
                        "Build has no asset manifest, serving it anyway"
                    );
                }
                tracing::info!(
                    version = build.version(),
                    generation = build.generation(),
                    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Build reloaded"
                );

                self.notifier.announce(Arc::clone(&build));
                Ok(build)
            }
            Err(e) => {
                let current = self.current();
                tracing::warn!(
                    error = %e,
                    version = current.version(),
                    "Build reload failed, keeping current build"
                );

                self.notifier.announce(current);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    use hotbuild_artifact::channel;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Records every announced build version.
    #[derive(Default)]
    struct RecordingNotifier {
        announced: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn versions(&self) -> Vec<String> {
            self.announced.lock().unwrap().clone()
        }
    }

    impl ReadinessNotifier for RecordingNotifier {
        fn announce(&self, build: Arc<ServerBuild>) {
            self.announced.lock().unwrap().push(build.version().to_owned());
        }
    }

    fn write_build(dir: &Path, version: &str, with_assets: bool) {
        fs::create_dir_all(dir.join("routes")).unwrap();
        fs::write(dir.join("routes/index.html"), format!("<p>{version}</p>")).unwrap();
        let assets = if with_assets {
            format!(r#""assets": {{ "version": "{version}" }},"#)
        } else {
            String::new()
        };
        fs::write(
            dir.join("index.json"),
            format!(
                r#"{{ "version": "{version}", {assets} "routes": [
                    {{ "id": "root", "path": "/", "module": "routes/index.html" }}
                ] }}"#
            ),
        )
        .unwrap();
    }

    fn setup(dir: &TempDir) -> (Reloader, BuildReader, Arc<RecordingNotifier>) {
        write_build(dir.path(), "h1", true);
        let loader = Arc::new(ArtifactLoader::new(dir.path(), "index.json"));
        let initial = Arc::new(loader.load().unwrap());
        let (publisher, reader) = channel(initial);
        let notifier = Arc::new(RecordingNotifier::default());
        let reloader = Reloader::new(
            loader,
            publisher,
            Arc::clone(&notifier) as Arc<dyn ReadinessNotifier>,
        );
        (reloader, reader, notifier)
    }

    #[tokio::test]
    async fn test_reload_publishes_and_announces_new_build() {
        let dir = TempDir::new().unwrap();
        let (reloader, reader, notifier) = setup(&dir);
        let before = reader.current();

        write_build(dir.path(), "h2", true);
        let build = reloader.reload().await.unwrap();

        assert_eq!(build.version(), "h2");
        assert_eq!(reader.current().version(), "h2");
        assert_eq!(before.version(), "h1");
        assert_eq!(notifier.versions(), vec!["h2".to_owned()]);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_current_and_announces_it() {
        let dir = TempDir::new().unwrap();
        let (reloader, reader, notifier) = setup(&dir);

        fs::write(dir.path().join("index.json"), "{ \"version\": ").unwrap();
        let err = reloader.reload().await.unwrap_err();

        assert!(matches!(err, ReloadError::Load(LoadError::Parse { .. })), "got {err:?}");
        assert_eq!(reader.current().version(), "h1");
        assert_eq!(notifier.versions(), vec!["h1".to_owned()]);
    }

    #[tokio::test]
    async fn test_consecutive_failures_leave_build_unchanged() {
        let dir = TempDir::new().unwrap();
        let (reloader, reader, notifier) = setup(&dir);
        let original = reader.current();

        fs::remove_file(dir.path().join("routes/index.html")).unwrap();
        for _ in 0..5 {
            assert!(reloader.reload().await.is_err());
        }

        assert!(Arc::ptr_eq(&original, &reader.current()));
        assert_eq!(notifier.versions().len(), 5);
    }

    #[tokio::test]
    async fn test_recovery_after_failure() {
        let dir = TempDir::new().unwrap();
        let (reloader, reader, notifier) = setup(&dir);

        fs::write(dir.path().join("index.json"), "not json").unwrap();
        assert!(reloader.reload().await.is_err());

        write_build(dir.path(), "h3", true);
        reloader.reload().await.unwrap();

        assert_eq!(reader.current().version(), "h3");
        assert_eq!(notifier.versions(), vec!["h1".to_owned(), "h3".to_owned()]);
    }

    #[tokio::test]
    async fn test_not_ready_build_is_still_published() {
        let dir = TempDir::new().unwrap();
        let (reloader, reader, notifier) = setup(&dir);

        write_build(dir.path(), "h2", false);
        let build = reloader.reload().await.unwrap();

        assert!(!build.is_ready());
        assert_eq!(reader.current().version(), "h2");
        assert_eq!(notifier.versions(), vec!["h2".to_owned()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_reloads_each_announce_once() {
        let dir = TempDir::new().unwrap();
        let (reloader, reader, notifier) = setup(&dir);
        let initial = reader.current();

        write_build(dir.path(), "h2", true);
        let (first, second) = tokio::join!(reloader.reload(), reloader.reload());
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(notifier.versions(), vec!["h2".to_owned(), "h2".to_owned()]);
        assert_ne!(first.generation(), second.generation());
        assert!(first.generation() > initial.generation());
        assert!(second.generation() > initial.generation());

        let current = reader.current();
        assert!(
            Arc::ptr_eq(&current, &first) || Arc::ptr_eq(&current, &second),
            "current build generation {} was not produced by either reload",
            current.generation()
        );
    }

    #[tokio::test]
    async fn test_announce_current() {
        let dir = TempDir::new().unwrap();
        let (reloader, _reader, notifier) = setup(&dir);

        reloader.announce_current();

        assert_eq!(notifier.versions(), vec!["h1".to_owned()]);
    }
}
