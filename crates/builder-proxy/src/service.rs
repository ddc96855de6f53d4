//! Builder proxy service - wiring and the connection loop.
//!
//! One listener serves both surfaces: relay routes are answered locally and
//! everything else is forwarded to the execution engine. Connections are
//! served as HTTP/1 only, so the request-header deadline runs from accept,
//! and shutdown drains in-flight exchanges.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::response::Response;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tracing::{debug, info, warn};

use crate::bid::BidBuilder;
use crate::codec::PayloadCodec;
use crate::domain::{BuildState, ProxyConfig, ProxyError, ValidatorRegistry};
use crate::engine::{EngineCallInterceptor, EngineClient, JwtProvider};
use crate::middleware::{RelayMetrics, TracingLayer};
use crate::ports::PayloadSource;
use crate::proxy::{self, AbortExchange, Forwarder};
use crate::relay::{self, RelayContext};

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Builder proxy service state
pub struct BuilderProxyService {
    config: ProxyConfig,
    state: Arc<BuildState>,
    registry: Arc<ValidatorRegistry>,
    metrics: Arc<RelayMetrics>,
    relay: Arc<RelayContext>,
    forwarder: Arc<Forwarder>,
}

impl BuilderProxyService {
    /// Create a service whose bids come from the configured engine.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        config.validate()?;
        let http = reqwest::Client::builder().build()?;
        let engine = Arc::new(Self::engine_client(&config, http.clone())?);
        let source: Arc<dyn PayloadSource> = engine.clone();
        Self::assemble(config, http, engine, source)
    }

    /// Create a service that forwards to the configured engine but fetches
    /// payloads for bids from `source`.
    pub fn with_payload_source(
        config: ProxyConfig,
        source: Arc<dyn PayloadSource>,
    ) -> Result<Self, ProxyError> {
        config.validate()?;
        let http = reqwest::Client::builder().build()?;
        let engine = Arc::new(Self::engine_client(&config, http.clone())?);
        Self::assemble(config, http, engine, source)
    }

    fn engine_client(config: &ProxyConfig, http: reqwest::Client) -> Result<EngineClient, ProxyError> {
        let url = config.engine.endpoint()?.clone();
        let jwt = config
            .engine
            .jwt_secret
            .as_ref()
            .map(|secret| Arc::new(JwtProvider::new(secret)));
        Ok(EngineClient::new(http, url, jwt))
    }

    fn assemble(
        config: ProxyConfig,
        http: reqwest::Client,
        engine: Arc<EngineClient>,
        source: Arc<dyn PayloadSource>,
    ) -> Result<Self, ProxyError> {
        let state = Arc::new(BuildState::new());
        let registry = Arc::new(ValidatorRegistry::new());
        let metrics = Arc::new(RelayMetrics::new());

        let relay = Arc::new(RelayContext {
            chain: config.chain.clone(),
            state: Arc::clone(&state),
            registry: Arc::clone(&registry),
            source,
            codec: PayloadCodec::new(config.bid.extra_data.clone().into_bytes()),
            bids: BidBuilder::new(&config.chain, &config.bid)?,
            metrics: Arc::clone(&metrics),
        });

        let interceptor = EngineCallInterceptor::new(Arc::clone(&state), Arc::clone(&metrics));
        let forwarder = Arc::new(Forwarder::new(
            http,
            engine,
            interceptor,
            Arc::clone(&metrics),
        ));

        Ok(Self {
            config,
            state,
            registry,
            metrics,
            relay,
            forwarder,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<BuildState> {
        Arc::clone(&self.state)
    }

    pub fn registry(&self) -> Arc<ValidatorRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Relay routes, the forwarding fallback and the tracing layer.
    pub fn router(&self) -> Router {
        relay::routes(Arc::clone(&self.relay))
            .merge(proxy::routes(Arc::clone(&self.forwarder)))
            .layer(TracingLayer::new())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), ProxyError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.config.server.address();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ProxyError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` resolves, then stop
    /// accepting and wait for open connections to finish.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ProxyError>
    where
        F: Future<Output = ()> + Send,
    {
        let local = listener.local_addr()?;
        let router = self.router();

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.config.server.header_read_timeout);

        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        info!(
            addr = %local,
            engine = %self.config.engine.endpoint()?,
            "builder proxy listening"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                            continue;
                        }
                    };
                    let router = router.clone();
                    let service = service_fn(move |mut req: hyper::Request<Incoming>| {
                        req.extensions_mut().insert(ConnectInfo(remote));
                        handle(router.clone(), req)
                    });
                    let conn = builder.serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn);
                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            debug!(%remote, error = %e, "connection closed with error");
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        tokio::select! {
            _ = graceful.shutdown() => info!("all connections drained"),
            _ = tokio::time::sleep(self.config.server.shutdown_timeout) => {
                warn!(timeout = ?self.config.server.shutdown_timeout, "gave up waiting for connections to drain");
            }
        }
        Ok(())
    }
}

/// Run one request through the router, turning aborted exchanges into
/// connection errors.
async fn handle(router: Router, req: hyper::Request<Incoming>) -> Result<Response, io::Error> {
    let response = match router.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.extensions().get::<AbortExchange>().is_some() {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "forwarding failed",
        ));
    }
    Ok(response)
}
