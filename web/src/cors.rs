//! Cross-origin headers for browser clients.
//!
//! Preflight `OPTIONS` requests are answered here with `204 No Content` and an
//! empty body; they never reach a handler or the authentication extractor.
//! Every other response gets the same three `Access-Control-*` headers.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

const ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// CORS settings.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Origin`
    pub allow_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
        }
    }
}

/// Build the CORS layer.
///
/// An origin that is not a valid header value falls back to `*` with a
/// warning.
#[must_use]
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = HeaderValue::from_str(&config.allow_origin).unwrap_or_else(|_| {
        tracing::warn!(origin = %config.allow_origin, "Invalid CORS origin, using '*'");
        HeaderValue::from_static("*")
    });
    CorsLayer { origin }
}

/// Layer for [`Cors`].
#[derive(Debug, Clone)]
pub struct CorsLayer {
    origin: HeaderValue,
}

impl<S> Layer<S> for CorsLayer {
    type Service = Cors<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Cors {
            inner,
            origin: self.origin.clone(),
        }
    }
}

/// CORS middleware service.
#[derive(Debug, Clone)]
pub struct Cors<S> {
    inner: S,
    origin: HeaderValue,
}

fn apply_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

impl<S> Service<Request> for Cors<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let origin = self.origin.clone();

        if req.method() == Method::OPTIONS {
            return Box::pin(async move {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::NO_CONTENT;
                apply_headers(response.headers_mut(), origin);
                Ok(response)
            });
        }

        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut response = fut.await?;
            apply_headers(response.headers_mut(), origin);
            Ok(response)
        })
    }
}
