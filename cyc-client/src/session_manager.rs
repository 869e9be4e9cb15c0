//! [`SessionManager`] — process-wide registry of sessions with staleness
//! recovery.
//!
//! The manager is an explicitly constructed registry rather than mutable
//! global state: construct one, share it (it is cheap to clone), and pass
//! it down. `reload` swaps the registry contents atomically under the
//! registry lock; session objects already handed out keep their own
//! validity either way.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use cyc_domain::{CycError, CycServerAddress, Result};

use crate::session::{ConnectionStatus, Session};

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct SessionManager {
    // ---
    registry: Arc<Mutex<Registry>>,
}

// ---

#[derive(Default)]
struct Registry {
    // ---
    sessions: HashMap<CycServerAddress, Arc<Session>>,
    closed: bool,
}

// ---

impl SessionManager {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    // ---

    /// The current session for `address`, creating or replacing as needed.
    ///
    /// While the manager is open this always yields a non-closed session:
    /// the cached connection is health-checked at lookup time, and a
    /// connection that died silently is detected here — the stale session
    /// is closed and a fresh session+connection pair atomically replaces
    /// the cache entry. The boolean reports whether a replacement happened,
    /// so callers (and tests) can observe the recovery.
    pub async fn current_session(
        &self,
        address: &CycServerAddress,
    ) -> Result<(Arc<Session>, bool)> {
        // ---
        let mut registry = self.registry.lock().await;
        if registry.closed {
            return Err(CycError::SessionManagerClosed);
        }

        let mut was_replaced = false;
        if let Some(existing) = registry.sessions.get(address) {
            if !existing.is_closed()
                && existing.connection_status() == ConnectionStatus::Connected
            {
                return Ok((Arc::clone(existing), false));
            }

            // The connection died without the session hearing about it.
            tracing::info!(%address, "cached session is stale, replacing");
            let stale = Arc::clone(existing);
            registry.sessions.remove(address);
            stale.close().await;
            was_replaced = true;
        }

        let fresh = Session::open(address).await?;
        registry.sessions.insert(address.clone(), Arc::clone(&fresh));
        Ok((fresh, was_replaced))
    }

    // ---

    /// Close every cached session and refuse all further lookups.
    pub async fn close(&self) {
        // ---
        let mut registry = self.registry.lock().await;
        if registry.closed {
            return;
        }
        registry.closed = true;

        for (_, session) in registry.sessions.drain() {
            session.close().await;
        }
        tracing::info!("session manager closed");
    }

    // ---

    /// Discard the registry and start over: every cached session is closed
    /// and the manager is open again afterwards. Session objects held by
    /// callers remain individually valid (or invalid) independent of this
    /// swap.
    pub async fn reload(&self) {
        // ---
        let mut registry = self.registry.lock().await;
        for (_, session) in registry.sessions.drain() {
            session.close().await;
        }
        registry.closed = false;
        tracing::info!("session manager reloaded");
    }

    // ---

    pub async fn is_closed(&self) -> bool {
        self.registry.lock().await.closed
    }

    /// Number of cached sessions. Diagnostics only.
    pub async fn session_count(&self) -> usize {
        self.registry.lock().await.sessions.len()
    }
}
