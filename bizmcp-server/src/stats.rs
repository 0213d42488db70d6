//! Informational endpoints: `/health`, `/stats`, `/clients`

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;

use crate::mcp::Dispatcher;
use crate::session::SessionSummary;

/// `GET /health` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub message: &'static str,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            status: "healthy",
            message: "MCP server is running",
        }
    }
}

/// `GET /stats` body
#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub server_status: &'static str,
    pub connected_clients: usize,
    pub total_tools: usize,
    pub uptime_secs: u64,
    pub client_details: BTreeMap<String, SessionSummary>,
}

impl ServerStats {
    pub fn collect(dispatcher: &Dispatcher, started_at: Instant) -> Self {
        Self {
            server_status: "running",
            connected_clients: dispatcher.sessions().len(),
            total_tools: dispatcher.gateway().registry().len(),
            uptime_secs: started_at.elapsed().as_secs(),
            client_details: dispatcher.sessions().summaries(),
        }
    }
}

/// `GET /clients` body
#[derive(Debug, Clone, Serialize)]
pub struct ClientsReport {
    pub connected_clients: Vec<String>,
    pub client_sessions: BTreeMap<String, SessionSummary>,
}

impl ClientsReport {
    pub fn collect(dispatcher: &Dispatcher) -> Self {
        Self {
            connected_clients: dispatcher
                .sessions()
                .peers()
                .into_iter()
                .map(|peer| peer.to_string())
                .collect(),
            client_sessions: dispatcher.sessions().summaries(),
        }
    }
}
