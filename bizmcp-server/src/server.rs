//! Server assembly and lifecycle

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bizmcp_utils::{BridgeError, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::http::{self, DrainReport, HttpState};
use crate::mcp::{Dispatcher, Downstream, Gateway, HttpDownstream, ToolRegistry};
use crate::session::SessionTracker;

/// A configured but not yet listening bridge
pub struct BridgeServer {
    config: AppConfig,
    dispatcher: Arc<Dispatcher>,
}

impl BridgeServer {
    /// Build a bridge that talks to the business API at
    /// `config.downstream.base_url`
    pub fn new(config: AppConfig) -> Result<Self> {
        let downstream = HttpDownstream::new(
            &config.downstream.base_url,
            Duration::from_secs(config.downstream.timeout_secs),
        )?;
        Ok(Self::with_downstream(config, Arc::new(downstream)))
    }

    /// Build a bridge over an arbitrary downstream
    pub fn with_downstream(config: AppConfig, downstream: Arc<dyn Downstream>) -> Self {
        let gateway = Gateway::new(Arc::new(ToolRegistry::new()), downstream);
        let sessions = SessionTracker::new(
            config.sessions.history_capacity,
            config.sessions.require_initialize,
        );

        Self {
            dispatcher: Arc::new(Dispatcher::new(gateway, sessions)),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Bind the listen address and start accepting connections
    pub async fn bind(self) -> Result<RunningServer> {
        let listen_addr = self.config.server.listen_addr.clone();
        let listener = TcpListener::bind(&listen_addr)
            .await
            .map_err(|source| BridgeError::Bind {
                addr: listen_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!("MCP HTTP server listening on {}", local_addr);
        info!("Business API: {}", self.config.downstream.base_url);
        info!(
            "Available tools: {}",
            self.dispatcher.gateway().registry().names().join(", ")
        );
        if !self.config.sessions.require_initialize {
            info!("Handshake gate disabled: sessions are created on first request");
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let state = Arc::new(HttpState::new(
            Arc::clone(&self.dispatcher),
            self.config.server.max_body_bytes,
        ));
        let grace = Duration::from_secs(self.config.server.shutdown_grace_secs);

        let task = tokio::spawn(http::run_accept_loop(
            listener,
            state,
            shutdown_tx.clone(),
            shutdown_rx,
            grace,
        ));

        Ok(RunningServer {
            local_addr,
            shutdown_tx,
            task,
            dispatcher: self.dispatcher,
        })
    }
}

/// Outcome of [`RunningServer::shutdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions discarded after their summaries were logged
    pub sessions_cleared: usize,
    pub connections: DrainReport,
}

/// Handle to a listening bridge
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<DrainReport>,
    dispatcher: Arc<Dispatcher>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL for HTTP clients, e.g. `http://127.0.0.1:3000`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Stop accepting, drain open connections, then log and discard
    /// every session
    pub async fn shutdown(self) -> ShutdownReport {
        info!("MCP HTTP server shutting down");
        let _ = self.shutdown_tx.send(());

        let connections = match self.task.await {
            Ok(report) => report,
            Err(e) => {
                error!("Accept loop failed: {}", e);
                DrainReport::default()
            }
        };

        let sessions_cleared = self.dispatcher.shutdown();
        info!("Cleanup completed");

        ShutdownReport {
            sessions_cleared,
            connections,
        }
    }
}
