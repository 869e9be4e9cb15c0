//! [`LeaseManager`] — validity tokens for logical communication streams.

use std::sync::atomic::{AtomicBool, Ordering};

// ---------------------------------------------------------------------------
// LeaseManager
// ---------------------------------------------------------------------------

/// Associates a logical communication stream with a validity flag.
///
/// A lease is independent of raw socket liveness: the socket may still be
/// open while the lease has expired, in which case a send on the stream is
/// refused unless the worker explicitly opted to ignore invalid leases.
///
/// Created when a stream is registered with a connection; invalidated on
/// session close or server-directed expiry.
#[derive(Debug)]
pub struct LeaseManager {
    // ---
    stream_label: String,
    valid: AtomicBool,
}

// ---

impl LeaseManager {
    // ---
    pub fn new(stream_label: impl Into<String>) -> Self {
        Self {
            stream_label: stream_label.into(),
            valid: AtomicBool::new(true),
        }
    }

    // ---

    pub fn stream_label(&self) -> &str {
        &self.stream_label
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Expire the lease. Idempotent.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
