//! In-process mock Cyc server for integration tests.
//!
//! Speaks the client's frame protocol over loopback TCP. Behavior is driven
//! by the command text:
//!
//! - `(fail ...)`          — respond with a server-side rejection
//! - `(sleep-forever)`     — never respond
//! - `(die)` / `(quit)`    — drop the socket without responding
//! - `(count-to N)`        — N data frames, then a terminal success
//! - `(delay-echo ...)`    — respond after a short delay
//! - anything else         — echo the command back as a terminal success

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

use cyc_client::{STATUS_CANCELED, STATUS_DATA, STATUS_ERROR, STATUS_OK};
use cyc_domain::{CycServerAddress, CycValue, WorkerListener, WorkerOutcome, WorkerStatus};
use cyc_wire::cfasl;

// ---------------------------------------------------------------------------
// MockServer
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Mode {
    Ascii,
    Binary,
}

// ---

pub struct MockServer {
    // ---
    local: SocketAddr,
    accepted: Arc<AtomicUsize>,
}

// ---

impl MockServer {
    // ---
    pub async fn spawn_binary() -> Self {
        Self::spawn(Mode::Binary).await
    }

    pub async fn spawn_ascii() -> Self {
        Self::spawn(Mode::Ascii).await
    }

    // ---

    async fn spawn(mode: Mode) -> Self {
        // ---
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let accept_counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                accept_counter.fetch_add(1, Ordering::SeqCst);
                match mode {
                    Mode::Binary => {
                        tokio::spawn(serve_binary(stream));
                    }
                    Mode::Ascii => {
                        tokio::spawn(serve_ascii(stream));
                    }
                }
            }
        });

        Self { local, accepted }
    }

    // ---

    pub fn address(&self) -> CycServerAddress {
        CycServerAddress::new("127.0.0.1", self.local.port())
    }

    /// Number of connections the server has accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Binary protocol
// ---------------------------------------------------------------------------

async fn serve_binary(stream: TcpStream) {
    // ---
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = write_half;

    loop {
        let frame = match cfasl::read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            _ => break,
        };
        let CycValue::List(items) = frame else {
            continue;
        };
        let mut items = items.into_iter();
        let Some(CycValue::Int(id)) = items.next() else {
            continue;
        };

        match items.next() {
            // `(id :cancel)` — acknowledge the cancellation.
            Some(CycValue::Keyword(kind)) if kind == "cancel" => {
                respond(&mut writer, id, STATUS_CANCELED, CycValue::Nil).await;
            }

            // `(id priority command)` — ordinary request.
            Some(CycValue::Int(_priority)) => {
                let Some(CycValue::String(command)) = items.next() else {
                    continue;
                };

                if command.starts_with("(fail") {
                    respond(
                        &mut writer,
                        id,
                        STATUS_ERROR,
                        CycValue::String("malformed command".into()),
                    )
                    .await;
                } else if command.starts_with("(sleep-forever") {
                    // Never respond; the client's watchdog owns this case.
                } else if command.starts_with("(die") || command.starts_with("(quit") {
                    return; // drop the socket with no response
                } else if let Some(n) = parse_count_to(&command) {
                    for i in 1..=n {
                        respond(&mut writer, id, STATUS_DATA, CycValue::Int(i)).await;
                    }
                    respond(&mut writer, id, STATUS_OK, CycValue::Nil).await;
                } else if command.starts_with("(delay-echo") {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    respond(&mut writer, id, STATUS_OK, CycValue::String(command)).await;
                } else {
                    respond(&mut writer, id, STATUS_OK, CycValue::String(command)).await;
                }
            }

            _ => continue,
        }
    }
}

// ---

fn parse_count_to(command: &str) -> Option<i64> {
    // ---
    command
        .strip_prefix("(count-to ")?
        .strip_suffix(')')?
        .trim()
        .parse()
        .ok()
}

// ---

async fn respond(writer: &mut OwnedWriteHalf, id: i64, status: i64, payload: CycValue) {
    // ---
    let frame = CycValue::List(vec![CycValue::Int(id), CycValue::Int(status), payload]);
    let _ = cfasl::write_frame(writer, &frame).await;
}

// ---------------------------------------------------------------------------
// Ascii protocol
// ---------------------------------------------------------------------------

async fn serve_ascii(stream: TcpStream) {
    // ---
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = write_half;

    loop {
        let mut line = String::new();
        let Ok(n) = reader.read_line(&mut line).await else {
            break;
        };
        if n == 0 {
            break;
        }

        let command = line.trim_end();
        let reply = if command.starts_with("(fail") {
            "500 malformed command\n".to_string()
        } else {
            format!("200 {command}\n")
        };
        if writer.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingListener
// ---------------------------------------------------------------------------

/// What a listener saw, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Started(u64),
    Data(CycValue),
    Terminated(WorkerStatus),
}

// ---

#[derive(Default)]
pub struct RecordingListener {
    // ---
    events: Mutex<Vec<Recorded>>,
}

// ---

impl RecordingListener {
    // ---
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }
}

// ---

#[async_trait]
impl WorkerListener for RecordingListener {
    // ---
    async fn on_started(&self, worker_id: u64) {
        self.events.lock().unwrap().push(Recorded::Started(worker_id));
    }

    async fn on_data_available(&self, _worker_id: u64, value: &CycValue) {
        self.events.lock().unwrap().push(Recorded::Data(value.clone()));
    }

    async fn on_terminated(&self, _worker_id: u64, outcome: &WorkerOutcome) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Terminated(outcome.status()));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Give background tasks (read loops, dispatchers) a moment to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
