//! Request dispatch.
//!
//! In development every request resolves the current build and gets a fresh
//! handler for it. In production one handler is created at start and reused.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{OriginalUri, Request, State};
use axum::response::Response;
use hotbuild_artifact::{BuildReader, ServerBuild};
use hotbuild_config::Mode;

use crate::error::ServerError;
use crate::handler::{RequestHandler, create_request_handler};
use crate::state::AppState;

/// Source of the handler for each request.
#[derive(Clone, Debug)]
pub enum Dispatcher {
    /// Resolve the current build per request.
    Live {
        /// Reader for the current build.
        reader: BuildReader,
        /// Mode passed to each handler.
        mode: Mode,
    },
    /// Reuse one handler for the life of the process.
    Fixed(RequestHandler),
}

impl Dispatcher {
    /// Dispatcher that follows reloads.
    #[must_use]
    pub fn live(reader: BuildReader, mode: Mode) -> Self {
        Self::Live { reader, mode }
    }

    /// Dispatcher pinned to `build`.
    #[must_use]
    pub fn fixed(build: Arc<ServerBuild>, mode: Mode) -> Self {
        Self::Fixed(create_request_handler(build, mode))
    }

    /// Handler for the next request.
    #[must_use]
    pub fn resolve(&self) -> RequestHandler {
        match self {
            Self::Live { reader, mode } => create_request_handler(reader.current(), *mode),
            Self::Fixed(handler) => handler.clone(),
        }
    }

    /// Build the next request would be answered from.
    #[must_use]
    pub fn current_build(&self) -> Arc<ServerBuild> {
        match self {
            Self::Live { reader, .. } => reader.current(),
            Self::Fixed(handler) => Arc::clone(handler.build()),
        }
    }
}

/// Answer a request from the dispatcher's current handler.
///
/// Requests reaching here through a nested static service are matched on
/// their original path.
pub(crate) async fn dispatch(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    mut req: Request,
) -> Result<Response<Body>, ServerError> {
    *req.uri_mut() = uri;
    let handler = state.dispatcher.resolve();
    Ok(handler.handle(&req)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotbuild_artifact::channel;

    fn build(version: &str) -> Arc<ServerBuild> {
        Arc::new(ServerBuild::new(version, None, vec![]))
    }

    #[test]
    fn test_live_dispatcher_follows_publish() {
        let (publisher, reader) = channel(build("h1"));
        let dispatcher = Dispatcher::live(reader, Mode::Development);

        let before = dispatcher.resolve();
        publisher.publish(build("h2"));
        let after = dispatcher.resolve();

        assert_eq!(before.build().version(), "h1");
        assert_eq!(after.build().version(), "h2");
        assert_eq!(dispatcher.current_build().version(), "h2");
    }

    #[test]
    fn test_fixed_dispatcher_ignores_publish() {
        let (publisher, reader) = channel(build("h1"));
        let dispatcher = Dispatcher::fixed(reader.current(), Mode::Production);

        publisher.publish(build("h2"));

        assert_eq!(dispatcher.resolve().build().version(), "h1");
        assert_eq!(dispatcher.current_build().version(), "h1");
    }
}
