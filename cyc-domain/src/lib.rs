//! Core types for the Cyc client library.
//!
//! This crate defines the vocabulary of the system. All other crates depend
//! on `cyc-domain` and speak its types. No I/O lives here.
//!
//! # Structure
//!
//! - [`error`]    — [`CycError`] and [`Result<T>`] alias
//! - [`priority`] — [`WorkerPriority`] levels forwarded to the server scheduler
//! - [`status`]   — [`WorkerStatus`] one-shot state machine
//! - [`address`]  — [`CycServerAddress`] and the `host:port[:concurrency]` grammar
//! - [`value`]    — [`CycValue`] literal model shared by codec and commands
//! - [`event`]    — [`WorkerListener`] callback trait and [`WorkerOutcome`]

mod address;
mod error;
mod event;
mod priority;
mod status;
mod value;

// --- error
pub use error::{CycError, Result};

// --- priority
pub use priority::WorkerPriority;

// --- status
pub use status::WorkerStatus;

// --- address
pub use address::{parse_pool_spec, CycServerAddress};

// --- value
pub use value::CycValue;

// --- event
pub use event::{WorkerListener, WorkerOutcome};
