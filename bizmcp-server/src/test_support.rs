//! In-process stand-ins for the business API

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::mcp::{Downstream, DownstreamError, DownstreamRequest};

/// Scripted [`Downstream`] that counts and records every call
pub struct StubDownstream {
    responses: HashMap<&'static str, Result<Value, DownstreamError>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<DownstreamRequest>>,
}

impl StubDownstream {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request to `path` with `result`
    pub fn respond(mut self, path: &'static str, result: Result<Value, DownstreamError>) -> Self {
        self.responses.insert(path, result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<DownstreamRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Downstream for StubDownstream {
    async fn send(&self, request: DownstreamRequest) -> Result<Value, DownstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = request.path;
        self.requests.lock().unwrap().push(request);

        self.responses.get(path).cloned().unwrap_or(Err(DownstreamError::Status {
            status: 404,
            detail: Some(format!("no stub for {}", path)),
        }))
    }
}

type Agents = Arc<Mutex<HashMap<String, (String, String)>>>;

/// Business API served over real HTTP on an ephemeral port
///
/// Besides the five business endpoints it serves `/slow` (sleeps two
/// seconds) and `/garbage` (200 with a non-JSON body).
pub struct FakeBusinessApi {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl FakeBusinessApi {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let agents: Agents = Arc::new(Mutex::new(HashMap::new()));

        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let agents = Arc::clone(&agents);
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let agents = Arc::clone(&agents);
                        async move { Ok::<_, Infallible>(route(req, agents).await) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for FakeBusinessApi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn reply(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}

fn agent_not_found() -> Response<Full<Bytes>> {
    reply(StatusCode::NOT_FOUND, json!({"detail": "Agent not found"}))
}

fn query_param(req: &Request<hyper::body::Incoming>, key: &str) -> Option<String> {
    let query = req.uri().query()?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}

async fn route(req: Request<hyper::body::Incoming>, agents: Agents) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let agent_param = query_param(&req, "agent_id");

    let bytes = req
        .into_body()
        .collect()
        .await
        .map(|b| b.to_bytes())
        .unwrap_or_default();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    match (method, path.as_str()) {
        (Method::POST, "/register") => {
            let agent_id = uuid::Uuid::new_v4().to_string();
            let name = body["name"].as_str().unwrap_or_default().to_string();
            let version = body["version"].as_str().unwrap_or_default().to_string();
            agents.lock().unwrap().insert(agent_id.clone(), (name, version));
            reply(StatusCode::OK, json!({"agent_id": agent_id}))
        }
        (Method::POST, "/report_status") => {
            let agent_id = body["agent_id"].as_str().unwrap_or_default().to_string();
            if !agents.lock().unwrap().contains_key(&agent_id) {
                return agent_not_found();
            }
            reply(
                StatusCode::OK,
                json!({"message": format!("Status received for agent {}", agent_id)}),
            )
        }
        (Method::GET, "/tasks") => {
            let known = agent_param
                .map(|id| agents.lock().unwrap().contains_key(&id))
                .unwrap_or(false);
            if !known {
                return agent_not_found();
            }
            reply(
                StatusCode::OK,
                json!({"tasks": {
                    "task1": {"description": "Update inventory", "priority": "high"},
                    "task2": {"description": "Sync logs", "priority": "medium"}
                }}),
            )
        }
        (Method::POST, "/adder") => match body["number"].as_i64() {
            Some(n) => reply(StatusCode::OK, json!({"result": n + 1})),
            None => reply(StatusCode::UNPROCESSABLE_ENTITY, json!({"detail": "number required"})),
        },
        (Method::GET, "/joke") => reply(
            StatusCode::OK,
            json!({"setup": "Why do programmers prefer dark mode?", "punchline": "Because light attracts bugs."}),
        ),
        (Method::GET, "/slow") => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            reply(StatusCode::OK, json!({}))
        }
        (Method::GET, "/garbage") => {
            Response::new(Full::new(Bytes::from_static(b"<html>definitely not json</html>")))
        }
        _ => reply(StatusCode::NOT_FOUND, json!({"detail": "Not Found"})),
    }
}
