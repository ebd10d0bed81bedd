//! Error types for artifact loading.

use std::path::PathBuf;

/// Failure to load a build artifact from disk.
///
/// A failed load never replaces the current build.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Manifest or module could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid JSON or does not match the expected shape.
    ///
    /// This is what a partially written `index.json` looks like.
    #[error("malformed build manifest {}: {source}", path.display())]
    Parse {
        /// Manifest path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Manifest references a module file that does not exist.
    #[error("route {route} references missing module {}", path.display())]
    MissingModule {
        /// Route identifier.
        route: String,
        /// Expected module path.
        path: PathBuf,
    },

    /// Module path escapes the build directory.
    #[error("route {route} module {module} is outside the build directory")]
    ModuleOutsideBuild {
        /// Route identifier.
        route: String,
        /// Module path as written in the manifest.
        module: String,
    },

    /// Route entry is structurally invalid.
    #[error("invalid route {route}: {reason}")]
    InvalidRoute {
        /// Route identifier.
        route: String,
        /// What is wrong with it.
        reason: String,
    },
}
