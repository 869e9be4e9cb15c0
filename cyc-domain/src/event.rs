use async_trait::async_trait;

use super::error::{CycError, Result};
use super::status::WorkerStatus;
use super::value::CycValue;

// ---------------------------------------------------------------------------
// WorkerOutcome
// ---------------------------------------------------------------------------

/// How a worker terminated, with whatever the terminal event carried.
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    // ---
    /// Terminal success with the server's result.
    Finished(CycValue),

    /// Server honored a graceful cancellation.
    Canceled,

    /// Caller aborted locally; the server was never consulted.
    Aborted,

    /// Timeout, connection loss, or a server-side rejection.
    Failed(CycError),
}

// ---

impl WorkerOutcome {
    // ---
    /// The terminal status this outcome corresponds to.
    pub fn status(&self) -> WorkerStatus {
        // ---
        match self {
            WorkerOutcome::Finished(_) => WorkerStatus::Finished,
            WorkerOutcome::Canceled => WorkerStatus::Canceled,
            WorkerOutcome::Aborted => WorkerStatus::Aborted,
            WorkerOutcome::Failed(_) => WorkerStatus::Exception,
        }
    }

    // ---

    /// Collapse the outcome into a plain result, as the synchronous
    /// converse path surfaces it.
    pub fn to_result(&self) -> Result<CycValue> {
        // ---
        match self {
            WorkerOutcome::Finished(v) => Ok(v.clone()),
            WorkerOutcome::Canceled => Err(CycError::Api("command was canceled".into())),
            WorkerOutcome::Aborted => Err(CycError::Connection("worker was aborted".into())),
            WorkerOutcome::Failed(e) => Err(e.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerListener
// ---------------------------------------------------------------------------

/// Callback interface for worker lifecycle events.
///
/// All methods have default no-op implementations; implementors only
/// override what they need.
///
/// Every event for workers sharing a connection is delivered by that
/// connection's single dispatch task, strictly serialized. A listener must
/// not perform blocking or long-running work inline — that would delay
/// delivery to every other worker on the connection. Hand such work off to
/// its own task.
#[async_trait]
pub trait WorkerListener: Send + Sync {
    // ---
    /// The worker's request went on the wire; `worker_id` is now assigned.
    async fn on_started(&self, worker_id: u64) {
        let _ = worker_id;
    }

    // ---

    /// An incremental worker received an intermediate result. Delivered
    /// zero or more times, always before the terminal event.
    async fn on_data_available(&self, worker_id: u64, value: &CycValue) {
        let _ = (worker_id, value);
    }

    // ---

    /// The worker reached a terminal state. Delivered at most once; never
    /// delivered for an aborted worker.
    async fn on_terminated(&self, worker_id: u64, outcome: &WorkerOutcome) {
        let _ = (worker_id, outcome);
    }
}
