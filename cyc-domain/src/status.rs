use std::fmt;

// ---------------------------------------------------------------------------
// WorkerStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a one-shot worker.
///
/// ```text
/// NotStarted ──▶ Working ──▶ { Canceled, Aborted, Finished, Exception }
/// ```
///
/// The four right-hand states are terminal. A worker never leaves a
/// terminal state; restarting a worker is rejected rather than ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerStatus {
    // ---
    /// Created, not yet handed to a connection. The only state `start`
    /// accepts.
    NotStarted,

    /// Request is on the wire; events may still arrive.
    Working,

    /// Server honored a graceful cancellation.
    Canceled,

    /// Caller forced a local termination; no further events are delivered.
    Aborted,

    /// Terminal event carried a result.
    Finished,

    /// Terminal event carried an error (timeout, connection loss, or a
    /// server-side rejection).
    Exception,
}

// ---

impl WorkerStatus {
    // ---
    /// Whether this state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        // ---
        matches!(
            self,
            WorkerStatus::Canceled
                | WorkerStatus::Aborted
                | WorkerStatus::Finished
                | WorkerStatus::Exception
        )
    }

    // ---

    /// The allowed-transition table.
    ///
    /// `NotStarted` admits only `Working`; `Working` admits every terminal
    /// state; terminal states admit nothing.
    pub fn can_transition(self, next: WorkerStatus) -> bool {
        // ---
        match self {
            WorkerStatus::NotStarted => next == WorkerStatus::Working,
            WorkerStatus::Working => next.is_terminal(),
            _ => false,
        }
    }
}

// ---

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let name = match self {
            WorkerStatus::NotStarted => "not-started",
            WorkerStatus::Working => "working",
            WorkerStatus::Canceled => "canceled",
            WorkerStatus::Aborted => "aborted",
            WorkerStatus::Finished => "finished",
            WorkerStatus::Exception => "exception",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::WorkerStatus::*;

    const ALL: [super::WorkerStatus; 6] =
        [NotStarted, Working, Canceled, Aborted, Finished, Exception];

    #[test]
    fn not_started_only_admits_working() {
        // ---
        for next in ALL {
            assert_eq!(NotStarted.can_transition(next), next == Working);
        }
    }

    #[test]
    fn working_admits_every_terminal_state() {
        // ---
        for next in ALL {
            assert_eq!(Working.can_transition(next), next.is_terminal());
        }
    }

    #[test]
    fn terminal_states_admit_nothing() {
        // ---
        for from in [Canceled, Aborted, Finished, Exception] {
            for next in ALL {
                assert!(!from.can_transition(next), "{from} -> {next} must be rejected");
            }
        }
    }
}
