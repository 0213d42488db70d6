//! HTTP transport
//!
//! One tokio task per accepted connection, each serving HTTP/1.1 with
//! `hyper`. The peer's socket address identifies its MCP session.
//!
//! Routes: `POST /mcp`, `GET /health`, `GET /stats`, `GET /clients`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bizmcp_protocol::{JsonRpcError, JsonRpcResponse};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::mcp::{Dispatch, Dispatcher};
use crate::session::PeerId;
use crate::stats::{ClientsReport, HealthStatus, ServerStats};

/// State shared by every connection task
pub struct HttpState {
    pub dispatcher: Arc<Dispatcher>,
    pub started_at: Instant,
    pub max_body_bytes: usize,
}

impl HttpState {
    pub fn new(dispatcher: Arc<Dispatcher>, max_body_bytes: usize) -> Self {
        Self {
            dispatcher,
            started_at: Instant::now(),
            max_body_bytes,
        }
    }
}

/// What happened to open connections at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Connections still open when shutdown began
    pub in_flight: usize,
    /// Connections aborted after the grace period
    pub aborted: usize,
}

/// Accept connections until shutdown, then drain within `grace`
pub async fn run_accept_loop(
    listener: TcpListener,
    state: Arc<HttpState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    grace: Duration,
) -> DrainReport {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, remote_addr) = match accept_result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Accept error: {}", e);
                        continue;
                    }
                };

                let peer = PeerId::new(remote_addr);
                let conn_shutdown = shutdown_tx.subscribe();
                connections.spawn(serve_connection(stream, peer, Arc::clone(&state), conn_shutdown));
            }

            Some(_) = connections.join_next(), if !connections.is_empty() => {}

            _ = shutdown_rx.recv() => {
                info!("Stopped accepting connections");
                break;
            }
        }
    }

    drop(listener);
    drain(connections, grace).await
}

async fn drain(mut connections: JoinSet<()>, grace: Duration) -> DrainReport {
    let in_flight = connections.len();
    if in_flight > 0 {
        info!(in_flight, grace_secs = grace.as_secs(), "Waiting for open connections");
    }

    let finished = tokio::time::timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await
    .is_ok();

    let aborted = if finished {
        0
    } else {
        let remaining = connections.len();
        connections.abort_all();
        while connections.join_next().await.is_some() {}
        warn!(aborted = remaining, "Aborted connections after grace period");
        remaining
    };

    DrainReport { in_flight, aborted }
}

async fn serve_connection(
    stream: TcpStream,
    peer: PeerId,
    state: Arc<HttpState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    debug!(client = %peer, "Connection opened");

    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { handle_request(req, peer, state).await }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown_rx.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        // Connection errors are expected when clients disconnect
        if !e.is_incomplete_message() {
            warn!(client = %peer, "Connection error: {}", e);
        }
    }

    debug!(client = %peer, "Connection closed");
}

/// Route one HTTP request
async fn handle_request(
    req: Request<Incoming>,
    peer: PeerId,
    state: Arc<HttpState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/mcp") => handle_mcp(req, peer, &state).await,
        (&Method::GET, "/health") => {
            info!(client = %peer, "Health check");
            json_response(StatusCode::OK, &HealthStatus::healthy())
        }
        (&Method::GET, "/stats") => json_response(
            StatusCode::OK,
            &ServerStats::collect(&state.dispatcher, state.started_at),
        ),
        (&Method::GET, "/clients") => {
            json_response(StatusCode::OK, &ClientsReport::collect(&state.dispatcher))
        }
        _ => not_found(),
    };

    Ok(response)
}

async fn handle_mcp(req: Request<Incoming>, peer: PeerId, state: &HttpState) -> Response<Full<Bytes>> {
    let body = match Limited::new(req.into_body(), state.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let status = if e.downcast_ref::<LengthLimitError>().is_some() {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            warn!(client = %peer, "Rejected request body: {}", e);
            let envelope = JsonRpcResponse::error(
                Value::Null,
                JsonRpcError::internal(format!("request body rejected: {}", e)),
            );
            return json_response(status, &envelope);
        }
    };

    match state.dispatcher.dispatch(peer, &body).await {
        Dispatch::Reply(response) => json_response(StatusCode::OK, &response),
        Dispatch::Accepted => respond(StatusCode::ACCEPTED, None, Bytes::new()),
        Dispatch::Rejected(response) => json_response(StatusCode::BAD_REQUEST, &response),
    }
}

fn respond(status: StatusCode, content_type: Option<&'static str>, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(status, Some("application/json"), Bytes::from(body)),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some("text/plain"),
                Bytes::from_static(b"Internal Server Error"),
            )
        }
    }
}

/// Return 404 Not Found
fn not_found() -> Response<Full<Bytes>> {
    respond(
        StatusCode::NOT_FOUND,
        Some("text/plain"),
        Bytes::from_static(b"Not Found"),
    )
}
