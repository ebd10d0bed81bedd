//! Server build artifacts for hotbuild.
//!
//! This crate provides:
//! - [`ServerBuild`]: an immutable, fully materialised snapshot of a build
//!   written to disk by an external compiler
//! - [`ArtifactLoader`]: reads a fresh [`ServerBuild`] from disk on every call
//! - [`channel`]: the single current-build cell, split into a
//!   [`BuildPublisher`] (one writer) and [`BuildReader`]s (many readers)
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use hotbuild_artifact::{ArtifactLoader, channel};
//!
//! let loader = ArtifactLoader::new("build", "index.json");
//! let (publisher, reader) = channel(Arc::new(loader.load()?));
//!
//! // Later, after the compiler rewrote the build:
//! publisher.publish(Arc::new(loader.load()?));
//! let current = reader.current();
//! # let _ = current;
//! # Ok(())
//! # }
//! ```
//!
//! # Artifact Layout
//!
//! ```text
//! build/
//!   index.json      manifest (version, assets, routes)
//!   version.txt     version marker touched after every successful write
//!   routes/*.html   route modules referenced by the manifest
//! ```

mod build;
mod error;
mod loader;
mod route;
mod store;

pub use build::{AssetsManifest, Route, ServerBuild};
pub use error::LoadError;
pub use loader::ArtifactLoader;
pub use route::RoutePattern;
pub use store::{BuildPublisher, BuildReader, channel};
