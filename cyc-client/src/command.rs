//! Command text building and retrying synchronous execution.

use cyc_domain::{CycError, CycServerAddress, CycValue, Result};

use crate::session_manager::SessionManager;

// ---------------------------------------------------------------------------
// Command building
// ---------------------------------------------------------------------------

/// Build `(function arg1 arg2 ...)` from a function name and arguments,
/// stringifying each argument through the canonical literal rule.
pub fn build_command(function: &str, args: &[CycValue]) -> String {
    // ---
    let mut out = String::with_capacity(function.len() + 16 * args.len() + 2);
    out.push('(');
    out.push_str(function);
    for arg in args {
        out.push(' ');
        out.push_str(&arg.to_string());
    }
    out.push(')');
    out
}

// ---

/// Wrap `command` in a `clet`-style dynamic binding of the acting user, so
/// the server evaluates it with that identity in effect.
pub fn wrap_with_user(command: &str, user: &str) -> String {
    // ---
    format!(
        "(clet ((*the-cyclist* (find-cyclist {}))) {command})",
        CycValue::from(user)
    )
}

// ---------------------------------------------------------------------------
// CommandExecutor
// ---------------------------------------------------------------------------

/// Reconnect-and-retry ceiling for [`CommandExecutor`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Executes commands synchronously through the session manager, recovering
/// from exactly one class of failure: a connection that turns out to be
/// closed server-side. The dead session is closed, the next lookup rebuilds
/// the connection from the address, and the same command is retried — up to
/// the configured ceiling. Everything else propagates immediately.
pub struct CommandExecutor {
    // ---
    manager: SessionManager,
    max_attempts: u32,
}

// ---

impl CommandExecutor {
    // ---
    pub fn new(manager: SessionManager) -> Self {
        Self {
            manager,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the retry ceiling. Clamped to at least one attempt.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    // ---

    /// Run `command` against `address`, optionally bound to `user`, and
    /// block until the result or a typed error.
    pub async fn execute_command_synchronously(
        &self,
        address: &CycServerAddress,
        command: &str,
        user: Option<&str>,
        timeout_millis: u64,
    ) -> Result<CycValue> {
        // ---
        let command = match user {
            Some(user) => wrap_with_user(command, user),
            None => command.to_string(),
        };

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            let (session, was_replaced) = self.manager.current_session(address).await?;
            if was_replaced {
                tracing::info!(%address, attempt, "rebuilt stale connection before executing");
            }

            match session
                .connection()
                .converse_binary(&command, timeout_millis)
                .await
            {
                Ok(value) => return Ok(value),
                Err(e @ CycError::Connection(_)) => {
                    // The connection was dead under us. Close the session so
                    // the next lookup manufactures a fresh one, and retry.
                    tracing::warn!(%address, attempt, "command failed on a dead connection: {e}");
                    session.close().await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| CycError::Connection("retry attempts exhausted".into())))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
