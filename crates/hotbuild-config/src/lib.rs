//! Configuration management for hotbuild.
//!
//! Parses `hotbuild.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings (including values sourced from environment variables such
//! as `APP_ENV` and `PORT`) can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `dev.origin`
//! - `orders.dapr_host`
//! - `orders.server_host`

mod expand;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override environment mode.
    pub mode: Option<Mode>,
    /// Override build artifact directory.
    pub build_dir: Option<PathBuf>,
    /// Override public (static files) directory.
    pub public_dir: Option<PathBuf>,
    /// Override readiness announcement origin.
    pub dev_origin: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "hotbuild.toml";

/// Longest accepted debounce window for marker events.
const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Environment mode, fixed at process start.
///
/// Only the exact value `development` selects [`Mode::Development`]; any
/// other value runs the immutable production-like mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Mode {
    /// Build is watched and hot-reloaded.
    Development,
    /// Build is loaded once and never replaced.
    #[default]
    Production,
}

impl Mode {
    /// Resolve a mode from an environment value such as `APP_ENV`.
    #[must_use]
    pub fn from_env_value(value: &str) -> Self {
        if value.trim() == "development" {
            Self::Development
        } else {
            Self::Production
        }
    }

    /// Whether this is development mode.
    #[must_use]
    pub fn is_development(self) -> bool {
        self == Self::Development
    }

    /// Mode name as reported in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl From<String> for Mode {
    fn from(value: String) -> Self {
        Self::from_env_value(&value)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Build artifact configuration (paths are relative strings from TOML).
    build: BuildConfigRaw,
    /// Static files configuration (paths are relative strings from TOML).
    public: PublicConfigRaw,
    /// Development mode configuration.
    pub dev: DevConfig,
    /// Order sidecar configuration.
    pub orders: OrdersConfig,

    /// Resolved build configuration (set after loading).
    #[serde(skip)]
    pub build_resolved: BuildConfig,
    /// Resolved static files configuration (set after loading).
    #[serde(skip)]
    pub public_resolved: PublicConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Environment mode.
    pub mode: Mode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
            mode: Mode::Production,
        }
    }
}

/// Raw build configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BuildConfigRaw {
    dir: Option<String>,
    index: Option<String>,
    marker: Option<String>,
}

/// Resolved build artifact configuration with absolute paths.
#[derive(Debug, Default)]
pub struct BuildConfig {
    /// Directory the external compiler writes the build into.
    pub dir: PathBuf,
    /// Manifest file name inside `dir`.
    pub index: String,
    /// Version marker file name inside `dir`.
    pub marker: String,
}

impl BuildConfig {
    /// Full path to the build manifest.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(&self.index)
    }

    /// Full path to the version marker.
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.dir.join(&self.marker)
    }
}

/// Raw static files configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PublicConfigRaw {
    dir: Option<String>,
    build_dir: Option<String>,
}

/// Resolved static files configuration with absolute paths.
#[derive(Debug, Default)]
pub struct PublicConfig {
    /// Directory served at `/` (short-lived cache).
    pub dir: PathBuf,
    /// Fingerprinted assets served at `/build` (immutable cache).
    pub build_dir: PathBuf,
}

/// Development mode configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Origin of the development orchestrator that receives readiness pings.
    pub origin: Option<String>,
    /// Window for coalescing version marker events.
    pub debounce_ms: u64,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            origin: None,
            debounce_ms: 50,
        }
    }
}

/// Order sidecar configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    /// Dapr sidecar host (with scheme).
    pub dapr_host: String,
    /// Dapr sidecar HTTP port.
    pub dapr_http_port: u16,
    /// Host the subscriber app binds to.
    pub server_host: String,
    /// Port the subscriber app binds to.
    pub app_port: u16,
    /// Pub/sub component name.
    pub pubsub: String,
    /// Topic carrying orders.
    pub topic: String,
    /// State store component name.
    pub state_store: String,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            dapr_host: "http://localhost".to_owned(),
            dapr_http_port: 3500,
            server_host: "127.0.0.1".to_owned(),
            app_port: 5002,
            pubsub: "remix_js_pubsub".to_owned(),
            topic: "orders".to_owned(),
            state_store: "remix_js_state".to_owned(),
        }
    }
}

impl OrdersConfig {
    /// Base URL of the Dapr sidecar HTTP API.
    #[must_use]
    pub fn dapr_url(&self) -> String {
        format!(
            "{}:{}",
            self.dapr_host.trim_end_matches('/'),
            self.dapr_http_port
        )
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`dev.origin`").
        field: String,
        /// Error message (e.g., "${`DEV_ORIGIN`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `hotbuild.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the final configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(mode) = settings.mode {
            self.server.mode = mode;
        }
        if let Some(build_dir) = &settings.build_dir {
            self.build_resolved.dir.clone_from(build_dir);
        }
        if let Some(public_dir) = &settings.public_dir {
            self.public_resolved.build_dir = public_dir.join("build");
            self.public_resolved.dir.clone_from(public_dir);
        }
        if let Some(origin) = &settings.dev_origin {
            self.dev.origin = Some(origin.clone()).filter(|o| !o.is_empty());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            build: BuildConfigRaw::default(),
            public: PublicConfigRaw::default(),
            dev: DevConfig::default(),
            orders: OrdersConfig::default(),
            build_resolved: BuildConfig {
                dir: base.join("build"),
                index: "index.json".to_owned(),
                marker: "version.txt".to_owned(),
            },
            public_resolved: PublicConfig {
                dir: base.join("public"),
                build_dir: base.join("public").join("build"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_build()?;
        self.validate_dev()?;
        self.validate_orders()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate build configuration.
    fn validate_build(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.build_resolved.index, "build.index")?;
        require_non_empty(&self.build_resolved.marker, "build.marker")?;
        Ok(())
    }

    /// Validate development configuration.
    fn validate_dev(&self) -> Result<(), ConfigError> {
        if let Some(ref origin) = self.dev.origin {
            require_http_url(origin, "dev.origin")?;
        }

        if self.dev.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "dev.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        Ok(())
    }

    /// Validate order sidecar configuration.
    fn validate_orders(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.orders.dapr_host, "orders.dapr_host")?;
        require_http_url(&self.orders.dapr_host, "orders.dapr_host")?;
        require_non_empty(&self.orders.pubsub, "orders.pubsub")?;
        require_non_empty(&self.orders.topic, "orders.topic")?;
        require_non_empty(&self.orders.state_store, "orders.state_store")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref origin) = self.dev.origin {
            let expanded = expand::expand_env(origin, "dev.origin")?;
            // An empty expansion (e.g. `${DEV_ORIGIN:-}`) means "not configured"
            self.dev.origin = Some(expanded).filter(|o| !o.is_empty());
        }

        self.orders.dapr_host = expand::expand_env(&self.orders.dapr_host, "orders.dapr_host")?;
        self.orders.server_host =
            expand::expand_env(&self.orders.server_host, "orders.server_host")?;

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.build_resolved = BuildConfig {
            dir: resolve(self.build.dir.as_deref(), "build"),
            index: self
                .build
                .index
                .clone()
                .unwrap_or_else(|| "index.json".to_owned()),
            marker: self
                .build
                .marker
                .clone()
                .unwrap_or_else(|| "version.txt".to_owned()),
        };

        let public_dir = resolve(self.public.dir.as_deref(), "public");
        let public_build_dir = match self.public.build_dir.as_deref() {
            Some(dir) => config_dir.join(dir),
            None => public_dir.join("build"),
        };
        self.public_resolved = PublicConfig {
            dir: public_dir,
            build_dir: public_build_dir,
        };
    }
}
