//! Request-handler factory.
//!
//! Turns a [`ServerBuild`] snapshot into something that answers HTTP
//! requests. A [`RequestHandler`] holds its own `Arc` of the build, so a
//! request keeps the snapshot it started with even if a reload publishes a
//! newer one while it is in flight.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{ALLOW, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use bytes::Bytes;
use hotbuild_artifact::{Route, ServerBuild};
use hotbuild_config::Mode;

/// Header carrying the version of the build that answered.
pub const BUILD_VERSION_HEADER: &str = "x-build-version";

/// Route data could not be turned into a response.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A route header name or value is not valid HTTP.
    #[error("route '{route}' has invalid header '{name}'")]
    InvalidHeader {
        /// Route identifier.
        route: String,
        /// Offending header name.
        name: String,
    },

    /// A route status is not a valid HTTP status code.
    #[error("route '{route}' has invalid status {status}")]
    InvalidStatus {
        /// Route identifier.
        route: String,
        /// Offending status.
        status: u16,
    },

    /// Response assembly failed.
    #[error("failed to build response")]
    Http(#[from] axum::http::Error),
}

/// Create a handler answering requests from `build`.
#[must_use]
pub fn create_request_handler(build: Arc<ServerBuild>, mode: Mode) -> RequestHandler {
    RequestHandler { build, mode }
}

/// Answers requests from one build snapshot.
#[derive(Clone, Debug)]
pub struct RequestHandler {
    build: Arc<ServerBuild>,
    mode: Mode,
}

impl RequestHandler {
    /// Build this handler answers from.
    #[must_use]
    pub fn build(&self) -> &Arc<ServerBuild> {
        &self.build
    }

    /// Answer `req`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] if the matched route carries a header or
    /// status that is not valid HTTP.
    pub fn handle<B>(&self, req: &Request<B>) -> Result<Response<Body>, HandlerError> {
        let path = req.uri().path();
        let method = req.method();

        let Some(route) = self.build.match_route(path) else {
            return self.not_found(path);
        };

        if !route.allows(method.as_str()) {
            return self.method_not_allowed(route);
        }

        self.respond(route, method)
    }

    fn respond(&self, route: &Route, method: &Method) -> Result<Response<Body>, HandlerError> {
        let status =
            StatusCode::from_u16(route.status).map_err(|_| HandlerError::InvalidStatus {
                route: route.id.clone(),
                status: route.status,
            })?;

        let body = if method == Method::HEAD {
            Body::empty()
        } else {
            Body::from(route.body.clone())
        };

        let mut response = Response::builder()
            .status(status)
            .header(CONTENT_TYPE, header_value(route, CONTENT_TYPE.as_str(), &route.content_type)?)
            .body(body)?;

        let headers = response.headers_mut();
        for (name, value) in &route.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| HandlerError::InvalidHeader {
                    route: route.id.clone(),
                    name: name.clone(),
                })?;
            headers.insert(header_name, header_value(route, name, value)?);
        }

        Ok(self.finish(response))
    }

    fn method_not_allowed(&self, route: &Route) -> Result<Response<Body>, HandlerError> {
        let response = Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .header(ALLOW, header_value(route, ALLOW.as_str(), &route.methods.join(", "))?)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from("Method Not Allowed"))?;
        Ok(self.finish(response))
    }

    fn not_found(&self, path: &str) -> Result<Response<Body>, HandlerError> {
        let body = if self.mode.is_development() {
            Bytes::from(format!(
                "No route matches {path} in build {}",
                self.build.version()
            ))
        } else {
            Bytes::from_static(b"Not Found")
        };

        let response = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(body))?;
        Ok(self.finish(response))
    }

    /// Stamp the build version and the mode's default cache policy.
    fn finish(&self, mut response: Response<Body>) -> Response<Body> {
        let headers = response.headers_mut();

        if let Ok(version) = HeaderValue::from_str(self.build.version()) {
            headers.insert(HeaderName::from_static(BUILD_VERSION_HEADER), version);
        }

        let cache_control = if self.mode.is_development() {
            "no-store"
        } else {
            "no-cache"
        };
        headers
            .entry(CACHE_CONTROL)
            .or_insert(HeaderValue::from_static(cache_control));

        response
    }
}

fn header_value(route: &Route, name: &str, value: &str) -> Result<HeaderValue, HandlerError> {
    HeaderValue::from_str(value).map_err(|_| HandlerError::InvalidHeader {
        route: route.id.clone(),
        name: name.to_owned(),
    })
}
