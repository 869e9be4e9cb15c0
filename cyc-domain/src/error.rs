use thiserror::Error;

// ---

/// Error taxonomy for the communication layer.
///
/// `Clone` is deliberate: a worker's terminal outcome is shared between the
/// dispatch task and any number of synchronous waiters, each of which may
/// need to surface the triggering error as its own.
#[derive(Debug, Clone, Error)]
pub enum CycError {
    // ---
    /// Socket-level failure, or a stale/closed connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// No terminal event arrived within the worker's timeout.
    #[error("command timed out after {0} ms")]
    Timeout(u64),

    /// Well-formed response indicating a server-side rejection.
    #[error("server rejected command: {0}")]
    Api(String),

    /// Codec given a non-literal, or malformed compact-id input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The lease for this communication stream is no longer valid.
    #[error("lease expired for stream {0}")]
    LeaseExpired(String),

    /// A worker operation was attempted in a state that forbids it.
    #[error("illegal worker state: {0}")]
    WorkerState(String),

    /// Lookup on a session manager that has been closed.
    #[error("session manager is closed")]
    SessionManagerClosed,

    #[error("io error: {0}")]
    Io(String),
}

// ---

impl From<std::io::Error> for CycError {
    fn from(e: std::io::Error) -> Self {
        CycError::Io(e.to_string())
    }
}

// ---

pub type Result<T> = std::result::Result<T, CycError>;
