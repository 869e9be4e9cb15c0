//! Communication and concurrency layer for the Cyc client.
//!
//! A caller obtains a [`Session`] through the [`SessionManager`], which
//! yields a live [`CycConnection`]; commands are built with the helpers in
//! [`command`], wrapped in a [`Worker`], and multiplexed over the
//! connection's socket. The [`ServerPool`] gates how many workers may be
//! outstanding against an address at once.
//!
//! # Structure
//!
//! - [`connection`]      — [`CycConnection`]: socket ownership, request
//!   demultiplexing, serialized event dispatch, trace levels
//! - [`worker`]          — [`Worker`]: one-shot asynchronous unit of work
//! - [`lease`]           — [`LeaseManager`]: stream validity tokens
//! - [`pool`]            — [`ServerPool`]: bounded slot queue over addresses
//! - [`session`]         — [`Session`]: one logical client session
//! - [`session_manager`] — [`SessionManager`]: cached sessions with
//!   staleness recovery
//! - [`command`]         — command text building and retrying execution

mod command;
mod connection;
mod lease;
mod pool;
mod session;
mod session_manager;
mod worker;

// --- connection
pub use connection::{
    CommMode, ConnectionInfo, CycConnection, TraceLevel, STATUS_CANCELED, STATUS_DATA,
    STATUS_ERROR, STATUS_OK,
};

// --- worker
pub use worker::Worker;

// --- lease
pub use lease::LeaseManager;

// --- pool
pub use pool::{ServerPool, DEFAULT_CONCURRENCY_LEVEL};

// --- session
pub use session::{ConnectionStatus, Session, SessionListener};

// --- session manager
pub use session_manager::SessionManager;

// --- command helper
pub use command::{build_command, wrap_with_user, CommandExecutor, DEFAULT_MAX_ATTEMPTS};
