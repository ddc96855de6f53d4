//! Per-request spans.
//!
//! Every request entering the listener, relayed or forwarded, runs inside an
//! `http_request` span carrying its method, path and route kind. The response
//! status is recorded on the span when the inner service completes.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{field, info_span, Instrument, Span};

use crate::relay::BUILDER_PATH_PREFIX;

/// Tracing layer that creates spans for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the ready clone, leave a fresh one behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let path = req.uri().path();
        let span = info_span!(
            "http_request",
            http.method = %req.method(),
            http.target = %path,
            route = route_kind(path),
            http.status_code = field::Empty,
            otel.status_code = field::Empty,
        );

        Box::pin(
            async move {
                let result = inner.call(req).await;

                let span = Span::current();
                match &result {
                    Ok(response) => {
                        let status = response.status();
                        span.record("http.status_code", status.as_u16());
                        span.record(
                            "otel.status_code",
                            if status.is_success() { "OK" } else { "ERROR" },
                        );
                    }
                    Err(_) => {
                        span.record("otel.status_code", "ERROR");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

fn route_kind(path: &str) -> &'static str {
    if path.contains(BUILDER_PATH_PREFIX) {
        "relay"
    } else {
        "forward"
    }
}
