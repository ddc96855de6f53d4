//! Reverse proxy core.
//!
//! Every request the relay routes do not claim is buffered, forwarded to the
//! execution engine, and answered with the engine's response byte for byte.
//! Both bodies are handed to the [`EngineCallInterceptor`] on the way back.
//!
//! When forwarding fails the exchange is aborted: the handler returns a
//! response marked with [`AbortExchange`], and the connection service in
//! [`crate::service`] closes the connection instead of writing it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::EngineError;
use crate::engine::{EngineCallInterceptor, EngineClient};
use crate::middleware::RelayMetrics;
use crate::relay::BUILDER_PATH_PREFIX;

/// Marks a response that must not be written; the connection is closed instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortExchange;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to read request body: {0}")]
    ReadRequest(axum::Error),
    #[error("failed to authorize request: {0}")]
    Authorize(#[from] EngineError),
    #[error("upstream exchange failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("failed to assemble response: {0}")]
    Response(#[from] axum::http::Error),
}

/// Forwards engine traffic and taps it.
pub struct Forwarder {
    http: reqwest::Client,
    engine: Arc<EngineClient>,
    interceptor: EngineCallInterceptor,
    metrics: Arc<RelayMetrics>,
}

impl Forwarder {
    pub fn new(
        http: reqwest::Client,
        engine: Arc<EngineClient>,
        interceptor: EngineCallInterceptor,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            http,
            engine,
            interceptor,
            metrics,
        }
    }

    /// Forward one buffered exchange to the engine.
    pub async fn exchange(
        &self,
        req: Request,
        remote: Option<SocketAddr>,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = req.into_parts();
        let body = to_bytes(body, usize::MAX)
            .await
            .map_err(ForwardError::ReadRequest)?;

        let mut upstream = self
            .http
            .request(parts.method.clone(), self.engine.url().clone())
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body.clone());
        if let Some(addr) = remote {
            upstream = upstream.header("x-forwarded-for", addr.ip().to_string());
        }
        upstream = if self.engine.has_jwt() {
            self.engine.authorize(upstream).await?
        } else if let Some(auth) = parts.headers.get(header::AUTHORIZATION) {
            upstream.header(header::AUTHORIZATION, auth.clone())
        } else {
            upstream
        };

        let response = upstream.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let payload = response.bytes().await?;
        debug!(
            method = %parts.method,
            path = parts.uri.path(),
            status = status.as_u16(),
            request_bytes = body.len(),
            response_bytes = payload.len(),
            "forwarded exchange"
        );

        self.interceptor.inspect(&body, &payload);

        let mut builder = Response::builder().status(status);
        for (name, value) in headers.iter() {
            if !is_hop_by_hop(name) {
                builder = builder.header(name, value);
            }
        }
        Ok(builder.body(Body::from(payload))?)
    }
}

/// Headers that describe the upstream connection rather than the message.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "content-length"
    )
}

fn aborted() -> Response {
    let mut response = StatusCode::BAD_GATEWAY.into_response();
    response.extensions_mut().insert(AbortExchange);
    response
}

/// Fallback handler: forward everything that is not a relay route.
pub async fn forward(
    State(forwarder): State<Arc<Forwarder>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    req: Request,
) -> Response {
    let path = req.uri().path().to_owned();
    if path.contains(BUILDER_PATH_PREFIX) {
        debug!(path, "unknown builder route");
        return StatusCode::NOT_FOUND.into_response();
    }

    let method = req.method().clone();
    match forwarder
        .exchange(req, remote.map(|ConnectInfo(addr)| addr))
        .await
    {
        Ok(response) => {
            forwarder.metrics.record_proxied(true);
            response
        }
        Err(e) => {
            warn!(%method, path, error = %e, "forwarding failed, aborting exchange");
            forwarder.metrics.record_proxied(false);
            aborted()
        }
    }
}

/// Router whose fallback forwards to the engine.
pub fn routes(forwarder: Arc<Forwarder>) -> Router {
    Router::new().fallback(forward).with_state(forwarder)
}
