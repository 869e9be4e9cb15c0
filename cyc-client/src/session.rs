//! [`Session`] — one logical client session bound to a live connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cyc_domain::{CycServerAddress, Result};

use crate::connection::{CommMode, CycConnection};

// ---------------------------------------------------------------------------
// ConnectionStatus
// ---------------------------------------------------------------------------

/// Liveness of a session's connection, derived from the connection's own
/// closed flag at the moment of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

// ---------------------------------------------------------------------------
// SessionListener
// ---------------------------------------------------------------------------

/// Callback interface for session lifecycle events.
#[async_trait]
pub trait SessionListener: Send + Sync {
    // ---
    /// Fired exactly once, when the session closes.
    async fn on_session_closed(&self, address: &CycServerAddress) {
        let _ = address;
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Wraps exactly one [`CycConnection`].
///
/// A session does not eagerly learn that its connection closed; staleness
/// is discovered the next time the session manager is asked for the
/// current session. Once closed, a session is never reused — a fresh
/// session object is required.
pub struct Session {
    // ---
    created_at: SystemTime,
    address: CycServerAddress,
    connection: Arc<CycConnection>,
    closed: AtomicBool,
    listeners: Mutex<Vec<Arc<dyn SessionListener>>>,
}

// ---

impl Session {
    // ---
    /// Open a binary-mode connection to `address` and wrap it.
    pub async fn open(address: &CycServerAddress) -> Result<Arc<Self>> {
        // ---
        let connection = CycConnection::connect(address, CommMode::Binary).await?;
        tracing::info!(%address, conn = %connection.uuid(), "session opened");

        Ok(Arc::new(Self {
            created_at: SystemTime::now(),
            address: address.clone(),
            connection,
            closed: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }))
    }

    // ---

    pub fn creation_time(&self) -> SystemTime {
        self.created_at
    }

    pub fn server_address(&self) -> &CycServerAddress {
        &self.address
    }

    pub fn connection(&self) -> Arc<CycConnection> {
        Arc::clone(&self.connection)
    }

    // ---

    /// Whether the underlying connection is still live, checked now.
    pub fn connection_status(&self) -> ConnectionStatus {
        // ---
        if self.connection.is_closed() {
            ConnectionStatus::Disconnected
        } else {
            ConnectionStatus::Connected
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ---

    pub async fn add_close_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.lock().await.push(listener);
    }

    // ---

    /// Close the session and its connection, firing close-listeners.
    /// Idempotent: listeners fire at most once.
    pub async fn close(&self) {
        // ---
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.connection.close().await;

        let listeners = self.listeners.lock().await.clone();
        for listener in listeners {
            listener.on_session_closed(&self.address).await;
        }

        tracing::info!(address = %self.address, "session closed");
    }
}
