//! [`Worker`] — a one-shot, cancelable, optionally-incremental asynchronous
//! task representing exactly one remote command execution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tokio::sync::watch;

use cyc_domain::{
    CycError, Result, WorkerListener, WorkerOutcome, WorkerPriority, WorkerStatus,
};

use crate::connection::CycConnection;

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// One remote command execution.
///
/// A worker is one-shot: once it reaches a terminal status it cannot be
/// restarted, and handing it to a connection a second time is rejected.
/// Listeners are attached at construction time; events are delivered by the
/// executing connection's dispatch task, strictly ordered as
/// started → zero-or-more data-available → exactly one terminal event.
///
/// The request id is assigned when the connection starts the worker and is
/// invalid before that.
pub struct Worker {
    // ---
    command: String,
    priority: WorkerPriority,
    /// `0` means no timeout.
    timeout_millis: u64,
    incremental: bool,
    ignore_invalid_leases: bool,
    stream_label: Option<String>,
    listeners: Vec<Arc<dyn WorkerListener>>,

    /// `0` until the start event fires; ids are assigned from 1.
    id: AtomicU64,
    status_tx: watch::Sender<WorkerStatus>,
    status_rx: watch::Receiver<WorkerStatus>,
    outcome: OnceLock<Arc<WorkerOutcome>>,
    /// Set when the executing connection starts the worker.
    connection: OnceLock<Weak<CycConnection>>,
}

// ---

impl Worker {
    // ---
    pub fn new(command: impl Into<String>) -> Self {
        // ---
        let (status_tx, status_rx) = watch::channel(WorkerStatus::NotStarted);
        Self {
            command: command.into(),
            priority: WorkerPriority::default(),
            timeout_millis: 0,
            incremental: false,
            ignore_invalid_leases: false,
            stream_label: None,
            listeners: Vec::new(),
            id: AtomicU64::new(0),
            status_tx,
            status_rx,
            outcome: OnceLock::new(),
            connection: OnceLock::new(),
        }
    }

    // ---

    pub fn with_priority(mut self, priority: WorkerPriority) -> Self {
        self.priority = priority;
        self
    }

    /// `0` disables the timeout.
    pub fn with_timeout_millis(mut self, timeout_millis: u64) -> Self {
        self.timeout_millis = timeout_millis;
        self
    }

    /// Allow zero or more data-available events before the terminal event.
    pub fn incremental(mut self) -> Self {
        self.incremental = true;
        self
    }

    /// Send even when the lease for the worker's stream has expired.
    pub fn ignoring_invalid_leases(mut self) -> Self {
        self.ignore_invalid_leases = true;
        self
    }

    /// Associate the worker with a leased communication stream.
    pub fn on_stream(mut self, stream_label: impl Into<String>) -> Self {
        self.stream_label = Some(stream_label.into());
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn WorkerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    // ---

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn priority(&self) -> WorkerPriority {
        self.priority
    }

    pub fn timeout_millis(&self) -> u64 {
        self.timeout_millis
    }

    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    pub fn ignores_invalid_leases(&self) -> bool {
        self.ignore_invalid_leases
    }

    pub fn stream_label(&self) -> Option<&str> {
        self.stream_label.as_deref()
    }

    /// The request id, once the start event has fired.
    pub fn worker_id(&self) -> Option<u64> {
        match self.id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        *self.status_rx.borrow()
    }

    /// Terminal outcome, once one exists.
    pub fn outcome(&self) -> Option<Arc<WorkerOutcome>> {
        self.outcome.get().cloned()
    }

    // ---

    /// Block until the worker reaches a terminal state and return the
    /// outcome. The synchronous converse paths are built on this.
    pub async fn wait(&self) -> Result<Arc<WorkerOutcome>> {
        // ---
        let mut rx = self.status_rx.clone();
        rx.wait_for(|status| status.is_terminal())
            .await
            .map_err(|_| CycError::WorkerState("worker dropped before terminating".into()))?;

        self.outcome().ok_or_else(|| {
            CycError::WorkerState("worker terminated without recording an outcome".into())
        })
    }

    // ---

    /// Request graceful server-side termination through the normal message
    /// channel. Best-effort: the server may deliver late events before
    /// honoring it, and is expected to eventually deliver the terminal
    /// event.
    pub async fn cancel(&self) -> Result<()> {
        self.live_connection()?.cancel_communication(self).await
    }

    /// Force a local terminal transition to `Aborted`, bypassing the
    /// message channel. No further listener notifications occur for this
    /// worker; late server responses for its id are discarded.
    pub async fn abort(&self) -> Result<()> {
        self.live_connection()?.abort_communication(self).await
    }

    // ---

    fn live_connection(&self) -> Result<Arc<CycConnection>> {
        // ---
        self.connection
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| CycError::WorkerState("worker has not been started".into()))
    }

    // -----------------------------------------------------------------------
    // Connection-facing state machine
    // -----------------------------------------------------------------------

    /// Attempt a status transition through the allowed-transition table.
    fn transition(&self, next: WorkerStatus) -> bool {
        // ---
        self.status_tx.send_if_modified(|current| {
            if current.can_transition(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    // ---

    /// Assign the request id and move `NotStarted → Working`. Rejected from
    /// any other state: a worker cannot be restarted.
    pub(crate) fn begin(&self, id: u64, connection: &Arc<CycConnection>) -> Result<()> {
        // ---
        if !self.transition(WorkerStatus::Working) {
            return Err(CycError::WorkerState(format!(
                "cannot start a worker in status {}",
                self.status()
            )));
        }
        self.id.store(id, Ordering::SeqCst);
        let _ = self.connection.set(Arc::downgrade(connection));
        Ok(())
    }

    // ---

    pub(crate) fn is_working(&self) -> bool {
        self.status() == WorkerStatus::Working
    }

    // ---

    /// Move to the outcome's terminal status. Returns `false` when the
    /// worker is already terminal (or was never started), in which case the
    /// outcome is discarded — a worker never records two terminal events.
    ///
    /// The outcome is stored inside the watch update so that a waiter woken
    /// by the status change always finds it already recorded.
    pub(crate) fn try_terminate(&self, outcome: WorkerOutcome) -> bool {
        // ---
        let status = outcome.status();
        self.status_tx.send_if_modified(|current| {
            if current.can_transition(status) && self.outcome.set(Arc::new(outcome)).is_ok() {
                *current = status;
                true
            } else {
                false
            }
        })
    }

    // ---

    pub(crate) fn listeners(&self) -> &[Arc<dyn WorkerListener>] {
        &self.listeners
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use cyc_domain::CycValue;

    use super::*;

    #[test]
    fn defaults() {
        // ---
        let worker = Worker::new("(cyc-system-info)");
        assert_eq!(worker.status(), WorkerStatus::NotStarted);
        assert_eq!(worker.priority(), WorkerPriority::Normal);
        assert_eq!(worker.timeout_millis(), 0);
        assert_eq!(worker.worker_id(), None);
        assert!(!worker.is_incremental());
        assert!(worker.outcome().is_none());
    }

    #[test]
    fn terminal_outcome_is_recorded_once() {
        // ---
        let worker = Worker::new("(+ 1 2)");
        // Drive the state machine directly; the connection normally does this.
        assert!(worker.transition(WorkerStatus::Working));

        assert!(worker.try_terminate(WorkerOutcome::Finished(CycValue::Int(3))));
        assert_eq!(worker.status(), WorkerStatus::Finished);

        // A second terminal event is rejected and does not clobber the first.
        assert!(!worker.try_terminate(WorkerOutcome::Canceled));
        assert_eq!(worker.status(), WorkerStatus::Finished);
        match worker.outcome().as_deref() {
            Some(WorkerOutcome::Finished(CycValue::Int(3))) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn cannot_terminate_before_starting() {
        // ---
        let worker = Worker::new("(+ 1 2)");
        assert!(!worker.try_terminate(WorkerOutcome::Canceled));
        assert_eq!(worker.status(), WorkerStatus::NotStarted);
    }

    #[tokio::test]
    async fn wait_observes_terminal_status() {
        // ---
        let worker = Arc::new(Worker::new("(+ 1 2)"));
        assert!(worker.transition(WorkerStatus::Working));

        let waiter = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.wait().await })
        };

        assert!(worker.try_terminate(WorkerOutcome::Finished(CycValue::Nil)));
        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome.status(), WorkerStatus::Finished);
    }
}
