use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::exposition::CONTENT_TYPE;
use crate::registry::Registry;

/// Path the registry is served on.
pub const METRICS_PATH: &str = "/metrics";

/// Bind address used when the configured host is empty.
const UNSPECIFIED_HOST: &str = "0.0.0.0";

/// How a metrics server run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// Metrics were disabled and nothing was bound.
    Disabled,
    /// The listener and every open connection were closed after cancellation.
    Closed,
}

/// Serve the registry until `cancel` fires.
///
/// Returns [`ServeOutcome::Disabled`] straight away when `enabled` is false.
/// Otherwise binds `host:port`, failing fast if that is not possible, and
/// blocks until the listener is closed.
pub async fn start(
    enabled: bool,
    host: &str,
    port: u16,
    registry: Arc<Registry>,
    cancel: CancellationToken,
) -> Result<ServeOutcome, MetricsServerError> {
    if !enabled {
        return Ok(ServeOutcome::Disabled);
    }

    MetricsServer::new(registry, host, port)
        .bind()
        .await?
        .serve(cancel)
        .await
}

/// HTTP server for metrics endpoint
pub struct MetricsServer {
    registry: Arc<Registry>,
    addr: String,
}

impl MetricsServer {
    /// Create a new metrics server
    pub fn new(registry: Arc<Registry>, host: &str, port: u16) -> Self {
        Self {
            registry,
            addr: join_host_port(host, port),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Bind the listening socket.
    pub async fn bind(self) -> Result<BoundMetricsServer, MetricsServerError> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| MetricsServerError::BindError {
                addr: self.addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| MetricsServerError::BindError {
                addr: self.addr.clone(),
                source,
            })?;

        info!(address = %local_addr, "starting metrics server");

        Ok(BoundMetricsServer {
            registry: self.registry,
            listener,
            local_addr,
        })
    }
}

/// A metrics server holding its listening socket, ready to serve
pub struct BoundMetricsServer {
    registry: Arc<Registry>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundMetricsServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `cancel` fires or the listener fails.
    ///
    /// The accept loop runs in its own task and owns every connection task it
    /// spawns. A watcher task aborts it once `cancel` fires, which drops the
    /// listener and all open connections, idle keep-alive ones included. No
    /// in-flight request is drained.
    pub async fn serve(
        self,
        cancel: CancellationToken,
    ) -> Result<ServeOutcome, MetricsServerError> {
        let accept_loop = tokio::spawn(accept_connections(self.listener, router(self.registry)));

        // Outlives a failed accept loop so a later cancellation is still
        // reported.
        tokio::spawn(watch_cancellation(cancel, accept_loop.abort_handle()));

        match accept_loop.await {
            Ok(e) => Err(MetricsServerError::ServerError(e)),
            Err(e) if e.is_cancelled() => Ok(ServeOutcome::Closed),
            Err(e) => Err(MetricsServerError::ServerError(io::Error::other(e.to_string()))),
        }
    }
}

/// Accept connections until the listener fails, returning the failure.
///
/// Connection tasks live in a [`JoinSet`] owned by this future, so dropping it
/// aborts them.
async fn accept_connections(listener: TcpListener, router: Router) -> io::Error {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted metrics connection");
                    connections.spawn(serve_connection(stream, router.clone()));
                }
                Err(e) if is_connection_error(&e) => {
                    debug!(error = %e, "metrics connection failed before accept");
                }
                Err(e) => return e,
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn serve_connection(stream: TcpStream, router: Router) {
    let service = TowerToHyperService::new(router);
    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!(error = %e, "metrics connection error");
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Wait for cancellation, then close the accept loop and its connections.
///
/// Closing a loop that has already stopped is logged and returned, never
/// escalated.
async fn watch_cancellation(
    cancel: CancellationToken,
    accept_loop: AbortHandle,
) -> Result<(), MetricsServerError> {
    cancel.cancelled().await;

    if accept_loop.is_finished() {
        let err = MetricsServerError::AlreadyClosed;
        error!(error = %err, "failed to close metrics server");
        return Err(err);
    }

    accept_loop.abort();
    Ok(())
}

/// Router serving the registry on [`METRICS_PATH`].
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(registry)
}

/// Handler for /metrics endpoint
/// Returns Prometheus-formatted metrics
async fn metrics_handler(
    State(registry): State<Arc<Registry>>,
) -> Result<Response, MetricsHandlerError> {
    let metrics = registry
        .export_metrics()
        .map_err(|e| MetricsHandlerError::ExportError(e.to_string()))?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], metrics).into_response())
}

/// Join host and port into a bindable address, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    let host = if host.is_empty() { UNSPECIFIED_HOST } else { host };
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Metrics server error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("failed to bind to address {addr}: {source}")]
    BindError {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    ServerError(#[source] std::io::Error),
    #[error("metrics server already closed")]
    AlreadyClosed,
}

/// Metrics handler error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsHandlerError {
    #[error("failed to export metrics: {0}")]
    ExportError(String),
}

impl IntoResponse for MetricsHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            MetricsHandlerError::ExportError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, message).into_response()
    }
}
