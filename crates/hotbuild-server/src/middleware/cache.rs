//! Cache-Control middleware for static files.
//!
//! Both layers only set the header when the response has none, so
//! responses from the build dispatcher keep their own cache policy.

use axum::http::HeaderValue;
use axum::http::header::CACHE_CONTROL;
use tower_http::set_header::SetResponseHeaderLayer;

/// Fingerprinted client assets never change.
pub(crate) const IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Other public files may change between deploys.
pub(crate) const SHORT_LIVED: &str = "public, max-age=3600";

/// Create layer that marks responses as cacheable for a year.
pub(crate) fn immutable_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE))
}

/// Create layer that marks responses as cacheable for an hour.
pub(crate) fn short_lived_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(CACHE_CONTROL, HeaderValue::from_static(SHORT_LIVED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use axum::body::Body;
    use axum::http::{Request, Response};
    use tower::{ServiceBuilder, ServiceExt, service_fn};

    async fn call(
        layer: SetResponseHeaderLayer<HeaderValue>,
        preset: Option<&'static str>,
    ) -> Response<Body> {
        let inner = service_fn(move |_req: Request<Body>| async move {
            let mut response = Response::new(Body::empty());
            if let Some(value) = preset {
                response
                    .headers_mut()
                    .insert(CACHE_CONTROL, HeaderValue::from_static(value));
            }
            Ok::<_, Infallible>(response)
        });

        ServiceBuilder::new()
            .layer(layer)
            .service(inner)
            .oneshot(Request::new(Body::empty()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_immutable_layer_sets_header() {
        let response = call(immutable_layer(), None).await;
        assert_eq!(response.headers()[CACHE_CONTROL], IMMUTABLE);
    }

    #[tokio::test]
    async fn test_short_lived_layer_keeps_existing_header() {
        let response = call(short_lived_layer(), Some("no-store")).await;
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
    }
}
