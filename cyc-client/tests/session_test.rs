//! Session, session-manager, and command-executor integration tests:
//! staleness recovery, lifecycle, and reconnect-and-retry.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use cyc_client::{CommandExecutor, ConnectionStatus, SessionListener, SessionManager};
use cyc_domain::{CycError, CycServerAddress, CycValue};

use support::MockServer;

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

struct CountingCloseListener {
    fired: AtomicUsize,
}

#[async_trait]
impl SessionListener for CountingCloseListener {
    async fn on_session_closed(&self, _address: &CycServerAddress) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

// ---

#[tokio::test]
async fn close_listeners_fire_exactly_once() {
    // ---
    let server = MockServer::spawn_binary().await;
    let manager = SessionManager::new();
    let (session, _) = manager.current_session(&server.address()).await.unwrap();

    let listener = Arc::new(CountingCloseListener {
        fired: AtomicUsize::new(0),
    });
    session.add_close_listener(listener.clone()).await;

    assert_eq!(session.connection_status(), ConnectionStatus::Connected);
    assert!(!session.is_closed());

    session.close().await;
    session.close().await; // idempotent

    assert!(session.is_closed());
    assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(listener.fired.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Staleness recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_connection_is_replaced_at_lookup_time() {
    // ---
    let server = MockServer::spawn_binary().await;
    let manager = SessionManager::new();
    let address = server.address();

    let (first, was_replaced) = manager.current_session(&address).await.unwrap();
    assert!(!was_replaced);

    // A healthy cache entry is reused as-is.
    let (again, was_replaced) = manager.current_session(&address).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert!(!was_replaced);

    // Kill the connection out-of-band: the server drops the socket without
    // a response, and the session does not eagerly learn about it.
    let _ = first.connection().converse_binary("(quit)", 1_000).await;
    support::settle().await;
    assert_eq!(first.connection_status(), ConnectionStatus::Disconnected);
    assert!(!first.is_closed());

    // The next lookup detects the dead connection and swaps in a fresh pair.
    let (fresh, was_replaced) = manager.current_session(&address).await.unwrap();
    assert!(was_replaced);
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert!(!fresh.is_closed());
    assert_eq!(fresh.connection_status(), ConnectionStatus::Connected);
    assert!(first.is_closed(), "the stale session must be closed");
    assert_eq!(manager.session_count().await, 1);

    // The fresh session actually works.
    let result = fresh.connection().converse("(echo alive)").await.unwrap();
    assert_eq!(result, CycValue::String("(echo alive)".into()));
}

// ---------------------------------------------------------------------------
// Manager lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closed_manager_refuses_lookups() {
    // ---
    let server = MockServer::spawn_binary().await;
    let manager = SessionManager::new();
    let address = server.address();

    let (session, _) = manager.current_session(&address).await.unwrap();
    manager.close().await;

    assert!(manager.is_closed().await);
    assert!(session.is_closed(), "close is transitive");
    assert!(matches!(
        manager.current_session(&address).await,
        Err(CycError::SessionManagerClosed)
    ));

    // Closing again is a no-op.
    manager.close().await;
}

#[tokio::test]
async fn reload_discards_and_reopens() {
    // ---
    let server = MockServer::spawn_binary().await;
    let manager = SessionManager::new();
    let address = server.address();

    let (old, _) = manager.current_session(&address).await.unwrap();
    manager.reload().await;

    assert!(old.is_closed());
    assert_eq!(manager.session_count().await, 0);

    // A reloaded manager serves fresh sessions again — even after close.
    manager.close().await;
    manager.reload().await;
    let (fresh, was_replaced) = manager.current_session(&address).await.unwrap();
    assert!(!was_replaced);
    assert!(!fresh.is_closed());
}

// ---------------------------------------------------------------------------
// CommandExecutor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn executor_runs_commands_with_a_user_binding() {
    // ---
    let server = MockServer::spawn_binary().await;
    let manager = SessionManager::new();
    let executor = CommandExecutor::new(manager);

    let result = executor
        .execute_command_synchronously(
            &server.address(),
            "(fi-assert ...)",
            Some("TestUser"),
            1_000,
        )
        .await
        .unwrap();

    // The mock echoes the command; the user binding must wrap it.
    let CycValue::String(echoed) = result else {
        panic!("expected the echoed command");
    };
    assert!(echoed.starts_with("(clet ((*the-cyclist* (find-cyclist \"TestUser\")))"));
    assert!(echoed.contains("(fi-assert ...)"));
}

#[tokio::test]
async fn executor_reconnects_and_retries_on_a_dead_connection() {
    // ---
    let server = MockServer::spawn_binary().await;
    let manager = SessionManager::new();
    let executor = CommandExecutor::new(manager.clone());
    let address = server.address();

    // `(die)` makes the mock drop the socket without responding, so every
    // attempt fails with a connection error. The executor must rebuild the
    // connection once and then give up: exactly two connections total.
    match executor
        .execute_command_synchronously(&address, "(die)", None, 1_000)
        .await
    {
        Err(CycError::Connection(_)) => {}
        other => panic!("expected a connection error, got {other:?}"),
    }
    assert_eq!(server.accepted(), 2);

    // The manager still hands out a working session afterwards.
    let result = executor
        .execute_command_synchronously(&address, "(echo recovered)", None, 1_000)
        .await
        .unwrap();
    assert_eq!(result, CycValue::String("(echo recovered)".into()));
}

#[tokio::test]
async fn executor_does_not_retry_server_rejections() {
    // ---
    let server = MockServer::spawn_binary().await;
    let manager = SessionManager::new();
    let executor = CommandExecutor::new(manager);
    let address = server.address();

    match executor
        .execute_command_synchronously(&address, "(fail badly)", None, 1_000)
        .await
    {
        Err(CycError::Api(text)) => assert_eq!(text, "malformed command"),
        other => panic!("expected an api error, got {other:?}"),
    }

    // One connection, no reconnect attempt.
    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn retry_ceiling_is_configurable() {
    // ---
    let server = MockServer::spawn_binary().await;
    let manager = SessionManager::new();
    let executor = CommandExecutor::new(manager).with_max_attempts(4);
    let address = server.address();

    let result = executor
        .execute_command_synchronously(&address, "(die)", None, 1_000)
        .await;
    assert!(result.is_err());
    assert_eq!(server.accepted(), 4);
}
