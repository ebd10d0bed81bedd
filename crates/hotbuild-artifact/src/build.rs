//! In-memory server build snapshot.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::route::RoutePattern;

/// Default content type for route modules.
pub(crate) const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Methods a route answers when the manifest does not list any.
const DEFAULT_METHODS: [&str; 2] = ["GET", "HEAD"];

/// Client asset manifest produced alongside the server build.
///
/// Its presence is what makes a build ready to serve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsManifest {
    /// Build hash the client bundle was produced for.
    pub version: String,
    /// URL of the client manifest script.
    #[serde(default)]
    pub url: String,
}

/// A route bound to its fully loaded module.
#[derive(Clone, Debug)]
pub struct Route {
    /// Route identifier from the manifest.
    pub id: String,
    /// Path pattern.
    pub pattern: RoutePattern,
    /// Allowed methods, upper-case.
    pub methods: Vec<String>,
    /// Response status code.
    pub status: u16,
    /// Response content type.
    pub content_type: String,
    /// Extra response headers.
    pub headers: BTreeMap<String, String>,
    /// Module body, read during load.
    pub body: Bytes,
}

impl Route {
    /// Create a `GET`/`HEAD` route returning `body` as HTML with status 200.
    #[must_use]
    pub fn new(id: impl Into<String>, pattern: RoutePattern, body: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            pattern,
            methods: DEFAULT_METHODS.iter().map(|m| (*m).to_owned()).collect(),
            status: 200,
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Replace the allowed methods.
    ///
    /// `HEAD` is implied whenever `GET` is allowed.
    #[must_use]
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods = normalize_methods(methods);
        self
    }

    /// Set the response status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set the response content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Add an extra response header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check whether the route answers `method`.
    #[must_use]
    pub fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// Upper-case method names, defaulting to `GET`/`HEAD` and implying `HEAD`
/// for `GET`.
pub(crate) fn normalize_methods<I, S>(methods: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for method in methods {
        let method = method.as_ref().trim().to_ascii_uppercase();
        if !method.is_empty() && !normalized.contains(&method) {
            normalized.push(method);
        }
    }

    if normalized.is_empty() {
        return DEFAULT_METHODS.iter().map(|m| (*m).to_owned()).collect();
    }
    if normalized.iter().any(|m| m == "GET") && !normalized.iter().any(|m| m == "HEAD") {
        normalized.push("HEAD".to_owned());
    }
    normalized
}

/// Immutable snapshot of a loaded server build.
///
/// Held behind an `Arc` and swapped as a whole; nothing in a published
/// build changes afterwards.
#[derive(Clone, Debug)]
pub struct ServerBuild {
    version: String,
    assets: Option<AssetsManifest>,
    routes: Vec<Route>,
    generation: u64,
}

impl ServerBuild {
    /// Create a build snapshot with generation 0.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        assets: Option<AssetsManifest>,
        routes: Vec<Route>,
    ) -> Self {
        Self {
            version: version.into(),
            assets,
            routes,
            generation: 0,
        }
    }

    /// Set the load generation.
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Build hash written by the compiler.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Client asset manifest, if the build carries one.
    #[must_use]
    pub fn assets(&self) -> Option<&AssetsManifest> {
        self.assets.as_ref()
    }

    /// Routes in manifest order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Load sequence number assigned by the loader.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Hash announced to the development orchestrator.
    ///
    /// Prefers the asset manifest version, falling back to the build version.
    #[must_use]
    pub fn build_hash(&self) -> &str {
        self.assets
            .as_ref()
            .map_or(self.version.as_str(), |assets| assets.version.as_str())
    }

    /// Readiness predicate: the build exposes a usable asset manifest.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.assets
            .as_ref()
            .is_some_and(|assets| !assets.version.is_empty())
    }

    /// Find the first route whose pattern matches `path`.
    #[must_use]
    pub fn match_route(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.pattern.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route(id: &str, path: &str) -> Route {
        Route::new(id, RoutePattern::parse(path).unwrap(), format!("<p>{id}</p>"))
    }

    fn assets(version: &str) -> AssetsManifest {
        AssetsManifest {
            version: version.to_owned(),
            url: format!("/build/manifest-{version}.js"),
        }
    }

    #[test]
    fn test_is_ready_requires_assets() {
        assert!(ServerBuild::new("v1", Some(assets("v1")), vec![]).is_ready());
        assert!(!ServerBuild::new("v1", None, vec![]).is_ready());
        assert!(!ServerBuild::new("v1", Some(assets("")), vec![]).is_ready());
    }

    #[test]
    fn test_build_hash_prefers_assets_version() {
        let with_assets = ServerBuild::new("server", Some(assets("client")), vec![]);
        let without_assets = ServerBuild::new("server", None, vec![]);

        assert_eq!(with_assets.build_hash(), "client");
        assert_eq!(without_assets.build_hash(), "server");
    }

    #[test]
    fn test_match_route_uses_manifest_order() {
        let build = ServerBuild::new(
            "v1",
            None,
            vec![route("user", "/users/:id"), route("catch-all", "/*")],
        );

        assert_eq!(build.match_route("/users/7").map(|r| r.id.as_str()), Some("user"));
        assert_eq!(build.match_route("/other").map(|r| r.id.as_str()), Some("catch-all"));
    }

    #[test]
    fn test_match_route_none() {
        let build = ServerBuild::new("v1", None, vec![route("root", "/")]);
        assert!(build.match_route("/missing").is_none());
    }

    #[test]
    fn test_route_defaults() {
        let r = route("root", "/");
        assert_eq!(r.methods, vec!["GET".to_owned(), "HEAD".to_owned()]);
        assert_eq!(r.status, 200);
        assert_eq!(r.content_type, DEFAULT_CONTENT_TYPE);
        assert!(r.allows("get"));
        assert!(!r.allows("POST"));
    }

    #[test]
    fn test_with_methods_implies_head() {
        let r = route("form", "/form").with_methods(["post", "get"]);
        assert_eq!(
            r.methods,
            vec!["POST".to_owned(), "GET".to_owned(), "HEAD".to_owned()]
        );
    }

    #[test]
    fn test_with_methods_empty_falls_back_to_defaults() {
        let r = route("root", "/").with_methods(Vec::<String>::new());
        assert_eq!(r.methods, vec!["GET".to_owned(), "HEAD".to_owned()]);
    }
}
