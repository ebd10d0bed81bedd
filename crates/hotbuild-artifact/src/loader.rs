//! Build artifact loading from disk.
//!
//! Provides [`ArtifactLoader`] for reading a [`ServerBuild`] from the build
//! directory an external compiler writes to.
//!
//! # Freshness
//!
//! The loader keeps no module cache. Every [`ArtifactLoader::load`] call
//! re-reads the manifest and every module it references, so a reload can
//! never observe a memoised copy of an older build. A manifest caught in the
//! middle of being rewritten fails to parse and is reported as
//! [`LoadError::Parse`].
//!
//! # Thread Safety
//!
//! `ArtifactLoader` is `Sync`; concurrent loads are independent and each
//! receives its own generation number.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use serde::Deserialize;

use crate::build::{AssetsManifest, DEFAULT_CONTENT_TYPE, Route, ServerBuild, normalize_methods};
use crate::error::LoadError;
use crate::route::RoutePattern;

/// Convert Duration to milliseconds as f64.
fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Manifest format as written by the compiler.
#[derive(Deserialize)]
struct Manifest {
    version: String,
    #[serde(default)]
    assets: Option<AssetsManifest>,
    #[serde(default)]
    routes: Vec<RouteManifest>,
}

/// Route entry as written by the compiler.
#[derive(Deserialize)]
struct RouteManifest {
    id: String,
    path: String,
    module: String,
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default = "default_status")]
    status: u16,
    #[serde(default = "default_content_type")]
    content_type: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_owned()
}

/// Loads [`ServerBuild`] snapshots from a build directory.
#[derive(Debug)]
pub struct ArtifactLoader {
    build_dir: PathBuf,
    index_path: PathBuf,
    generation: AtomicU64,
}

impl ArtifactLoader {
    /// Create a loader for `build_dir`, reading the manifest named `index`.
    #[must_use]
    pub fn new(build_dir: impl Into<PathBuf>, index: impl AsRef<Path>) -> Self {
        let build_dir = build_dir.into();
        let index_path = build_dir.join(index);
        Self {
            build_dir,
            index_path,
            generation: AtomicU64::new(0),
        }
    }

    /// Build directory this loader reads from.
    #[must_use]
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Manifest path.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Read a fresh build from disk.
    ///
    /// Blocking; run it on a blocking task from async code.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the manifest is missing or malformed, a route
    /// is invalid, or a module cannot be read.
    pub fn load(&self) -> Result<ServerBuild, LoadError> {
        let start = Instant::now();

        let content = fs::read(&self.index_path).map_err(|source| LoadError::Io {
            path: self.index_path.clone(),
            source,
        })?;
        let manifest: Manifest =
            serde_json::from_slice(&content).map_err(|source| LoadError::Parse {
                path: self.index_path.clone(),
                source,
            })?;

        let routes = manifest
            .routes
            .into_iter()
            .map(|entry| self.load_route(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let build =
            ServerBuild::new(manifest.version, manifest.assets, routes).with_generation(generation);

        tracing::debug!(
            version = build.version(),
            generation,
            route_count = build.routes().len(),
            elapsed_ms = elapsed_ms(start),
            "Build artifact loaded"
        );

        Ok(build)
    }

    /// Resolve and read a single route module.
    fn load_route(&self, entry: RouteManifest) -> Result<Route, LoadError> {
        let pattern = RoutePattern::parse(&entry.path).map_err(|reason| LoadError::InvalidRoute {
            route: entry.id.clone(),
            reason,
        })?;

        if !(100..=999).contains(&entry.status) {
            return Err(LoadError::InvalidRoute {
                route: entry.id,
                reason: format!("status {} is out of range", entry.status),
            });
        }

        let module_path = self.resolve_module(&entry.id, &entry.module)?;
        let body = fs::read(&module_path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoadError::MissingModule {
                    route: entry.id.clone(),
                    path: module_path.clone(),
                }
            } else {
                LoadError::Io {
                    path: module_path.clone(),
                    source,
                }
            }
        })?;

        Ok(Route {
            id: entry.id,
            pattern,
            methods: normalize_methods(entry.methods),
            status: entry.status,
            content_type: entry.content_type,
            headers: entry.headers,
            body: Bytes::from(body),
        })
    }

    /// Resolve a module path relative to the build directory.
    ///
    /// Absolute paths and `..` components are rejected.
    fn resolve_module(&self, route: &str, module: &str) -> Result<PathBuf, LoadError> {
        let relative = Path::new(module);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if module.is_empty() || escapes {
            return Err(LoadError::ModuleOutsideBuild {
                route: route.to_owned(),
                module: module.to_owned(),
            });
        }

        Ok(self.build_dir.join(relative))
    }
}
