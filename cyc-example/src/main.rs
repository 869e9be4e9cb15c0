//! Cyc client example — compact-id demo and live-server smoke client.
//!
//! * When run without `--server` the built-in compact-id demo executes.
//!
//! * When `--server` is supplied the example opens a session to a live Cyc
//!   server, runs one synchronous command through the retrying executor,
//!   and prints the connection diagnostics as JSON.
//!
//! Run with:
//!   cargo run -p cyc-example
//!   cargo run -p cyc-example -- --server 127.0.0.1:3600
//!   cargo run -p cyc-example -- --server 127.0.0.1:3600 \
//!                               --command "(cyc-system-info)" \
//!                               --user CycAdministrator

use clap::Parser;
use tracing::info;

use cyc_client::{CommandExecutor, SessionManager, TraceLevel};
use cyc_domain::{CycServerAddress, CycValue};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "cyc-example", about = "Cyc client smoke runner")]
struct Config {
    // ---
    /// Server address as `host:port[:concurrency]`.
    #[arg(long)]
    server: Option<String>,

    /// Command to execute against the live server.
    #[arg(long, default_value = "(cyc-system-info)")]
    command: String,

    /// Run the command with this acting user bound.
    #[arg(long)]
    user: Option<String>,

    /// Timeout for the command, in milliseconds. 0 disables the timeout.
    #[arg(long, default_value_t = 10_000)]
    timeout_millis: u64,

    /// Log every request and response frame.
    #[arg(long, default_value_t = false)]
    trace: bool,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    let cfg = Config::parse();

    let no_color = std::env::var("EMACS").is_ok()
        || std::env::var("NO_COLOR").is_ok()
        || std::env::var("CARGO_TERM_COLOR").as_deref() == Ok("never")
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::fmt()
        .with_target(false)
        .without_time()
        .with_ansi(!no_color)
        .init();

    println!("=== 1. Compact-id demo ===");
    compact_id_demo()?;

    if let Some(spec) = &cfg.server {
        println!();
        println!("=== 2. Live server smoke check: {spec} ===");
        let address = CycServerAddress::parse(spec)?;
        smoke_check(&cfg, &address).await?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// compact_id_demo
// ---------------------------------------------------------------------------

/// Compact ids work entirely offline: no server needed.
fn compact_id_demo() -> anyhow::Result<()> {
    // ---
    for value in [
        CycValue::from("TransportationDevice"),
        CycValue::Int(212),
        CycValue::Float(3.5),
    ] {
        let id = cyc_wire::to_compact_id(&value)?;
        let back = cyc_wire::from_compact_id(&id)?;
        let kind = if cyc_wire::is_string_compact_id(&id) {
            "string"
        } else {
            "number"
        };
        println!("  {value:<24} -> {id:<16} ({kind}, decodes to {back})");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// smoke_check
// ---------------------------------------------------------------------------

async fn smoke_check(cfg: &Config, address: &CycServerAddress) -> anyhow::Result<()> {
    // ---
    let manager = SessionManager::new();
    let (session, _) = manager.current_session(address).await?;

    if cfg.trace {
        session.connection().set_trace(TraceLevel::Messages);
    }

    let info = session.connection().connection_info();
    println!("  connection: {}", serde_json::to_string_pretty(&info)?);

    let executor = CommandExecutor::new(manager.clone());
    info!(command = %cfg.command, "executing");
    let result = executor
        .execute_command_synchronously(
            address,
            &cfg.command,
            cfg.user.as_deref(),
            cfg.timeout_millis,
        )
        .await?;
    println!("  result: {result}");

    manager.close().await;
    Ok(())
}
