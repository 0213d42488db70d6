//! Per-peer session tracking
//!
//! One [`Session`] per remote socket address. The tracker is owned by the
//! dispatcher; every mutation happens under the map's entry guard, which is
//! always released before any downstream I/O starts.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::net::SocketAddr;

use bizmcp_protocol::Implementation;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

/// Identity of a remote peer: its socket address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(SocketAddr);

impl PeerId {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// The underlying socket address
    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for PeerId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One `tools/call` as seen by the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationRecord {
    pub tool_name: String,
    pub arguments: Value,
    pub timestamp: DateTime<Utc>,
}

/// Server-side state for one peer
#[derive(Debug, Clone)]
pub struct Session {
    connected_at: DateTime<Utc>,
    client_info: Option<Implementation>,
    handshake_complete: bool,
    request_count: u64,
    history: VecDeque<InvocationRecord>,
    total_invocations: u64,
}

impl Session {
    fn new() -> Self {
        Self {
            connected_at: Utc::now(),
            client_info: None,
            handshake_complete: false,
            request_count: 0,
            history: VecDeque::new(),
            total_invocations: 0,
        }
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn client_info(&self) -> Option<&Implementation> {
        self.client_info.as_ref()
    }

    /// Whether `notifications/initialized` has been received
    pub fn handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Retained invocation records, oldest first
    pub fn history(&self) -> impl Iterator<Item = &InvocationRecord> {
        self.history.iter()
    }

    /// Every invocation ever recorded, including evicted ones
    pub fn total_invocations(&self) -> u64 {
        self.total_invocations
    }

    fn bump(&mut self) -> u64 {
        self.request_count += 1;
        self.request_count
    }

    fn push_invocation(&mut self, record: InvocationRecord, capacity: usize) {
        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(record);
        self.total_invocations += 1;
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            connected_at: self.connected_at,
            client_info: self.client_info.clone(),
            initialized: self.handshake_complete,
            requests_count: self.request_count,
            total_invocations: self.total_invocations,
            tools_called: self.history.iter().cloned().collect(),
        }
    }
}

/// Serializable view of a session, as reported by `/stats` and `/clients`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub connected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Implementation>,
    pub initialized: bool,
    pub requests_count: u64,
    pub total_invocations: u64,
    pub tools_called: Vec<InvocationRecord>,
}

/// Rejection of a request that needs an open session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not initialized for {0}: send 'initialize' first")]
    NotInitialized(PeerId),
}

/// Registry of all known peers
#[derive(Debug)]
pub struct SessionTracker {
    sessions: DashMap<PeerId, Session>,
    history_capacity: usize,
    require_initialize: bool,
}

impl SessionTracker {
    /// Create an empty tracker
    ///
    /// A capacity of zero is treated as one.
    pub fn new(history_capacity: usize, require_initialize: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            history_capacity: history_capacity.max(1),
            require_initialize,
        }
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    pub fn requires_initialize(&self) -> bool {
        self.require_initialize
    }

    /// Handle `initialize`: create or refresh the peer's session
    ///
    /// Returns `true` when the session is new.
    pub fn open(&self, peer: PeerId, client_info: Option<Implementation>) -> bool {
        let mut created = false;
        let mut session = self.sessions.entry(peer).or_insert_with(|| {
            created = true;
            Session::new()
        });
        session.bump();
        if client_info.is_some() {
            session.client_info = client_info;
        }
        drop(session);

        if created {
            info!(client = %peer, total = self.sessions.len(), "New client connected");
        }
        created
    }

    /// Handle `notifications/initialized`
    ///
    /// Returns `false` if no session exists and the gate is enforced.
    pub fn mark_initialized(&self, peer: PeerId) -> bool {
        if self.require_initialize {
            match self.sessions.get_mut(&peer) {
                Some(mut session) => {
                    session.handshake_complete = true;
                    true
                }
                None => false,
            }
        } else {
            self.sessions
                .entry(peer)
                .or_insert_with(Session::new)
                .handshake_complete = true;
            true
        }
    }

    /// Count one request against the peer's session
    pub fn touch(&self, peer: PeerId) -> Result<u64, SessionError> {
        self.with_session(peer, |session| session.bump())
    }

    /// Count one `tools/call` and append it to the peer's history
    pub fn record_invocation(
        &self,
        peer: PeerId,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<u64, SessionError> {
        let capacity = self.history_capacity;
        let record = InvocationRecord {
            tool_name: tool_name.to_string(),
            arguments: arguments.clone(),
            timestamp: Utc::now(),
        };
        self.with_session(peer, move |session| {
            session.push_invocation(record, capacity);
            session.bump()
        })
    }

    fn with_session<T>(
        &self,
        peer: PeerId,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, SessionError> {
        if self.require_initialize {
            let mut session = self
                .sessions
                .get_mut(&peer)
                .ok_or(SessionError::NotInitialized(peer))?;
            Ok(f(session.value_mut()))
        } else {
            let mut session = self.sessions.entry(peer).or_insert_with(|| {
                debug!(client = %peer, "Creating session without initialize");
                Session::new()
            });
            Ok(f(session.value_mut()))
        }
    }

    /// Snapshot of one session
    pub fn get(&self, peer: PeerId) -> Option<Session> {
        self.sessions.get(&peer).map(|s| s.value().clone())
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.sessions.contains_key(&peer)
    }

    /// Known peers, ordered by address
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.sessions.iter().map(|e| *e.key()).collect();
        peers.sort();
        peers
    }

    /// Summaries of every session keyed by peer address
    pub fn summaries(&self) -> BTreeMap<String, SessionSummary> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().summary()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Log a summary line per session, then forget all of them
    pub fn clear(&self) -> usize {
        for entry in self.sessions.iter() {
            info!(
                client = %entry.key(),
                requests = entry.request_count,
                tools_called = entry.total_invocations,
                "Session summary"
            );
        }
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }
}
