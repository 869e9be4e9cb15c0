//! [`CycConnection`] — owns the socket to one server address and
//! multiplexes concurrently-outstanding workers over it.
//!
//! # Design
//!
//! In binary mode two background tasks are spawned per connection:
//!
//! - The **read loop** owns the socket's read half, decodes inbound CFASL
//!   frames, and routes each by request id through the pending-request
//!   table. Frames for ids no longer in the table (aborted or timed-out
//!   workers) are discarded.
//! - The **dispatch task** drains an ordered queue of worker events and
//!   invokes listeners. It is the single dispatch context for the
//!   connection: all listener callbacks for workers sharing this connection
//!   are strictly serialized relative to each other.
//!
//! Ascii mode spawns nothing: the text channel carries no request ids, so
//! each converse call holds the socket for its full round trip.
//!
//! # Wire format
//!
//! Binary requests are the CFASL list `(id priority command)`; responses
//! are `(id status payload)` with status [`STATUS_OK`], [`STATUS_DATA`],
//! [`STATUS_CANCELED`], or [`STATUS_ERROR`]. Cancellations go out as
//! `(id :cancel)`. Control frames from the server use id 0. The text
//! channel sends a newline-terminated command and reads back one
//! `<status> <payload>` line.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use cyc_domain::{CycError, CycServerAddress, CycValue, Result, WorkerListener as _, WorkerOutcome};
use cyc_wire::cfasl;

use crate::lease::LeaseManager;
use crate::worker::Worker;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// Intermediate result for an incremental worker; the request stays open.
pub const STATUS_DATA: i64 = 100;

/// Terminal success.
pub const STATUS_OK: i64 = 200;

/// Terminal acknowledgement of a graceful cancellation.
pub const STATUS_CANCELED: i64 = 204;

/// Terminal server-side rejection; the payload is the error text.
pub const STATUS_ERROR: i64 = 500;

// ---------------------------------------------------------------------------
// CommMode / TraceLevel
// ---------------------------------------------------------------------------

/// How the connection speaks to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommMode {
    /// Newline-delimited s-expression text; one request on the wire at a
    /// time.
    Ascii,

    /// CFASL frames with request ids; many workers multiplexed over the
    /// socket.
    Binary,
}

// ---

/// Diagnostic tracing. Has no effect on protocol correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceLevel {
    Off = 0,
    /// Log each request and response at message granularity.
    Messages = 1,
    /// Additionally log raw frame bytes.
    Detailed = 2,
}

// ---

impl TraceLevel {
    // ---
    fn from_u8(v: u8) -> Self {
        match v {
            1 => TraceLevel::Messages,
            2 => TraceLevel::Detailed,
            _ => TraceLevel::Off,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TraceLevel::Off => "off",
            TraceLevel::Messages => "messages",
            TraceLevel::Detailed => "detailed",
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionInfo
// ---------------------------------------------------------------------------

/// Diagnostics snapshot, serializable for operator tooling.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    // ---
    pub host: String,
    pub port: u16,
    pub uuid: Uuid,
    pub mode: &'static str,
    pub trace: &'static str,
    pub closed: bool,
}

// ---------------------------------------------------------------------------
// Internal I/O state
// ---------------------------------------------------------------------------

struct AsciiIo {
    // ---
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

// ---

type PendingRequestTable = Arc<Mutex<HashMap<u64, Arc<Worker>>>>;
type LeaseTable = Arc<Mutex<HashMap<String, Arc<LeaseManager>>>>;

struct BinaryIo {
    // ---
    writer: Mutex<OwnedWriteHalf>,
    pending: PendingRequestTable,
    leases: LeaseTable,
    next_id: AtomicU64,
    dispatch_tx: mpsc::Sender<DispatchItem>,
    read_task: JoinHandle<()>,
}

impl Drop for BinaryIo {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

// ---

enum Io {
    Ascii(Mutex<AsciiIo>),
    Binary(BinaryIo),
}

// ---

/// One unit of listener work for the dispatch task.
enum DispatchItem {
    Started { worker: Arc<Worker> },
    Data { worker: Arc<Worker>, value: CycValue },
    Terminal { worker: Arc<Worker>, outcome: WorkerOutcome },
}

// ---------------------------------------------------------------------------
// CycConnection
// ---------------------------------------------------------------------------

pub struct CycConnection {
    // ---
    address: CycServerAddress,
    uuid: Uuid,
    mode: CommMode,
    trace: AtomicU8,
    closed: Arc<AtomicBool>,
    io: Io,
}

// ---

impl CycConnection {
    // ---
    /// Default timeout for synchronous converse calls: none.
    pub const DEFAULT_TIMEOUT_MILLIS: u64 = 0;

    // ---

    /// Open a socket to `address` in the given mode.
    pub async fn connect(address: &CycServerAddress, mode: CommMode) -> Result<Arc<Self>> {
        // ---
        let stream = TcpStream::connect((address.host(), address.port()))
            .await
            .map_err(|e| CycError::Connection(format!("connect to {address}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| CycError::Connection(format!("set_nodelay: {e}")))?;

        let (read_half, write_half) = stream.into_split();
        let closed = Arc::new(AtomicBool::new(false));
        let uuid = Uuid::new_v4();

        let io = match mode {
            CommMode::Ascii => Io::Ascii(Mutex::new(AsciiIo {
                reader: BufReader::new(read_half),
                writer: write_half,
            })),

            CommMode::Binary => {
                // ---
                let pending: PendingRequestTable = Arc::new(Mutex::new(HashMap::new()));
                let leases: LeaseTable = Arc::new(Mutex::new(HashMap::new()));
                let (dispatch_tx, dispatch_rx) = mpsc::channel(256);

                // The single serialized dispatch context for this connection.
                tokio::spawn(dispatch_loop(dispatch_rx));

                let read_task = tokio::spawn(read_loop(
                    BufReader::new(read_half),
                    Arc::clone(&pending),
                    Arc::clone(&leases),
                    Arc::clone(&closed),
                    dispatch_tx.clone(),
                    uuid,
                ));

                Io::Binary(BinaryIo {
                    writer: Mutex::new(write_half),
                    pending,
                    leases,
                    next_id: AtomicU64::new(1),
                    dispatch_tx,
                    read_task,
                })
            }
        };

        tracing::info!(%address, %uuid, ?mode, "connection established");

        Ok(Arc::new(Self {
            address: address.clone(),
            uuid,
            mode,
            trace: AtomicU8::new(TraceLevel::Off as u8),
            closed,
            io,
        }))
    }

    // ---

    pub fn host(&self) -> &str {
        self.address.host()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn server_address(&self) -> &CycServerAddress {
        &self.address
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn comm_mode(&self) -> CommMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ---

    pub fn trace(&self) -> TraceLevel {
        TraceLevel::from_u8(self.trace.load(Ordering::Relaxed))
    }

    pub fn set_trace(&self, level: TraceLevel) {
        self.trace.store(level as u8, Ordering::Relaxed);
    }

    // ---

    pub fn connection_info(&self) -> ConnectionInfo {
        // ---
        ConnectionInfo {
            host: self.address.host().to_string(),
            port: self.address.port(),
            uuid: self.uuid,
            mode: match self.mode {
                CommMode::Ascii => "ascii",
                CommMode::Binary => "binary",
            },
            trace: self.trace().as_str(),
            closed: self.is_closed(),
        }
    }

    // -----------------------------------------------------------------------
    // Converse
    // -----------------------------------------------------------------------

    /// Synchronous round trip on whichever channel the connection speaks.
    pub async fn converse(self: &Arc<Self>, command: &str) -> Result<CycValue> {
        // ---
        match &self.io {
            Io::Ascii(io) => self.converse_ascii(io, command).await,
            Io::Binary(_) => {
                self.converse_binary(command, Self::DEFAULT_TIMEOUT_MILLIS)
                    .await
            }
        }
    }

    // ---

    /// Synchronous binary round trip: an internal worker is started and
    /// awaited until its terminal event (or the timeout).
    pub async fn converse_binary(
        self: &Arc<Self>,
        command: &str,
        timeout_millis: u64,
    ) -> Result<CycValue> {
        // ---
        let worker = Arc::new(Worker::new(command).with_timeout_millis(timeout_millis));
        self.converse_worker(&worker).await?;
        worker.wait().await?.to_result()
    }

    // ---

    /// Asynchronous execution: registers the worker in the pending-request
    /// table under its newly assigned id, writes the framed request, and
    /// returns as soon as the frame is on the wire. Results arrive through
    /// the worker's listeners and [`Worker::wait`].
    pub async fn converse_worker(self: &Arc<Self>, worker: &Arc<Worker>) -> Result<()> {
        // ---
        let bin = self.binary()?;
        self.ensure_open()?;

        // Leases are consulted before anything touches the wire.
        if let Some(label) = worker.stream_label() {
            if let Some(lease) = bin.leases.lock().await.get(label) {
                if !lease.is_valid() && !worker.ignores_invalid_leases() {
                    return Err(CycError::LeaseExpired(label.to_string()));
                }
            }
        }

        let id = bin.next_id.fetch_add(1, Ordering::Relaxed);
        worker.begin(id, self)?;

        bin.pending.lock().await.insert(id, Arc::clone(worker));
        let _ = bin
            .dispatch_tx
            .send(DispatchItem::Started {
                worker: Arc::clone(worker),
            })
            .await;

        // The watchdog runs regardless of server responsiveness.
        if worker.timeout_millis() > 0 {
            spawn_watchdog(
                id,
                worker.timeout_millis(),
                Arc::clone(&bin.pending),
                bin.dispatch_tx.clone(),
            );
        }

        let frame = CycValue::List(vec![
            CycValue::Int(id as i64),
            CycValue::Int(worker.priority().as_wire()),
            CycValue::String(worker.command().to_string()),
        ]);

        if let Err(e) = self.write_frame_traced(bin, &frame).await {
            bin.pending.lock().await.remove(&id);
            let _ = bin
                .dispatch_tx
                .send(DispatchItem::Terminal {
                    worker: Arc::clone(worker),
                    outcome: WorkerOutcome::Failed(e.clone()),
                })
                .await;
            return Err(e);
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Transport face of [`Worker::cancel`]: send the cancellation frame
    /// and leave the id registered — the server still owes a terminal
    /// event.
    pub async fn cancel_communication(&self, worker: &Worker) -> Result<()> {
        // ---
        let bin = self.binary()?;
        self.ensure_open()?;
        let id = worker
            .worker_id()
            .ok_or_else(|| CycError::WorkerState("cannot cancel an unstarted worker".into()))?;

        let frame = CycValue::List(vec![CycValue::Int(id as i64), CycValue::keyword("cancel")]);
        self.write_frame_traced(bin, &frame).await
    }

    // ---

    /// Transport face of [`Worker::abort`]: deregister the id so the
    /// demultiplexer discards any late response, and terminate locally
    /// without notifying listeners.
    pub async fn abort_communication(&self, worker: &Worker) -> Result<()> {
        // ---
        let bin = self.binary()?;
        let id = worker
            .worker_id()
            .ok_or_else(|| CycError::WorkerState("cannot abort an unstarted worker".into()))?;

        bin.pending.lock().await.remove(&id);
        worker.try_terminate(WorkerOutcome::Aborted);
        tracing::debug!(conn = %self.uuid, id, "worker aborted locally");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Leases
    // -----------------------------------------------------------------------

    /// Register a lease for a logical communication stream.
    pub async fn register_lease(&self, stream_label: &str) -> Result<Arc<LeaseManager>> {
        // ---
        let bin = self.binary()?;
        let lease = Arc::new(LeaseManager::new(stream_label));
        bin.leases
            .lock()
            .await
            .insert(stream_label.to_string(), Arc::clone(&lease));
        Ok(lease)
    }

    // ---

    pub async fn lease(&self, stream_label: &str) -> Option<Arc<LeaseManager>> {
        // ---
        match &self.io {
            Io::Binary(bin) => bin.leases.lock().await.get(stream_label).cloned(),
            Io::Ascii(_) => None,
        }
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Close the connection. Pending workers receive a terminal connection
    /// error; leases die with the connection. Idempotent.
    pub async fn close(&self) {
        // ---
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(conn = %self.uuid, address = %self.address, "closing connection");

        match &self.io {
            Io::Ascii(io) => {
                let mut guard = io.lock().await;
                let _ = guard.writer.shutdown().await;
            }

            Io::Binary(bin) => {
                {
                    let mut writer = bin.writer.lock().await;
                    let _ = writer.shutdown().await;
                }

                for lease in bin.leases.lock().await.values() {
                    lease.invalidate();
                }

                let drained: Vec<Arc<Worker>> =
                    bin.pending.lock().await.drain().map(|(_, w)| w).collect();
                for worker in drained {
                    let _ = bin
                        .dispatch_tx
                        .send(DispatchItem::Terminal {
                            worker,
                            outcome: WorkerOutcome::Failed(CycError::Connection(
                                "connection closed".into(),
                            )),
                        })
                        .await;
                }

                bin.read_task.abort();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn binary(&self) -> Result<&BinaryIo> {
        // ---
        match &self.io {
            Io::Binary(bin) => Ok(bin),
            Io::Ascii(_) => Err(CycError::Connection(
                "connection is not in binary mode".into(),
            )),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        // ---
        if self.is_closed() {
            return Err(CycError::Connection(format!(
                "connection {} to {} is closed",
                self.uuid, self.address
            )));
        }
        Ok(())
    }

    // ---

    async fn write_frame_traced(&self, bin: &BinaryIo, frame: &CycValue) -> Result<()> {
        // ---
        let trace = self.trace();
        if trace >= TraceLevel::Messages {
            tracing::info!(conn = %self.uuid, frame = %frame, "-> request");
        }
        if trace >= TraceLevel::Detailed {
            tracing::debug!(conn = %self.uuid, bytes = ?cfasl::encode(frame), "-> frame bytes");
        }

        let mut writer = bin.writer.lock().await;
        cfasl::write_frame(&mut *writer, frame).await.map_err(|e| {
            self.closed.store(true, Ordering::SeqCst);
            CycError::Connection(format!("write to {}: {e}", self.address))
        })
    }

    // ---

    async fn converse_ascii(&self, io: &Mutex<AsciiIo>, command: &str) -> Result<CycValue> {
        // ---
        self.ensure_open()?;
        if command.contains('\n') {
            return Err(CycError::InvalidArgument(
                "command text must be newline-free".into(),
            ));
        }

        // The text channel carries no request ids, so the whole round trip
        // holds the socket.
        let mut guard = io.lock().await;

        if self.trace() >= TraceLevel::Messages {
            tracing::info!(conn = %self.uuid, %command, "-> ascii request");
        }

        let write = async {
            guard.writer.write_all(command.as_bytes()).await?;
            guard.writer.write_all(b"\n").await?;
            guard.writer.flush().await
        };
        write.await.map_err(|e| {
            self.closed.store(true, Ordering::SeqCst);
            CycError::Connection(format!("write to {}: {e}", self.address))
        })?;

        let mut line = String::new();
        let n = guard.reader.read_line(&mut line).await.map_err(|e| {
            self.closed.store(true, Ordering::SeqCst);
            CycError::Connection(format!("read from {}: {e}", self.address))
        })?;
        if n == 0 {
            self.closed.store(true, Ordering::SeqCst);
            return Err(CycError::Connection(format!(
                "server {} closed the connection",
                self.address
            )));
        }

        if self.trace() >= TraceLevel::Messages {
            tracing::info!(conn = %self.uuid, response = %line.trim_end(), "<- ascii response");
        }

        parse_ascii_response(line.trim_end())
    }
}

// ---

/// A response line is `<status> <payload>`; 200 carries the success
/// payload, anything else carries error text.
fn parse_ascii_response(line: &str) -> Result<CycValue> {
    // ---
    let (code, rest) = line.split_once(' ').unwrap_or((line, ""));
    match code.parse::<i64>() {
        Ok(STATUS_OK) => Ok(CycValue::String(rest.to_string())),
        Ok(_) => Err(CycError::Api(rest.to_string())),
        Err(_) => Err(CycError::Connection(format!(
            "malformed response line: {line:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Read half of the socket: decode frames, demultiplex by request id.
async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    pending: PendingRequestTable,
    leases: LeaseTable,
    closed: Arc<AtomicBool>,
    dispatch_tx: mpsc::Sender<DispatchItem>,
    conn_uuid: Uuid,
) {
    // ---
    loop {
        match cfasl::read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                route_frame(frame, &pending, &leases, &dispatch_tx, conn_uuid).await;
            }
            Ok(None) => {
                tracing::info!(conn = %conn_uuid, "server closed the connection");
                break;
            }
            Err(e) => {
                if !closed.load(Ordering::SeqCst) {
                    tracing::warn!(conn = %conn_uuid, "read failed: {e}");
                }
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);

    // Every worker still awaiting a response gets a terminal connection
    // error through the ordinary dispatch path.
    let drained: Vec<Arc<Worker>> = pending.lock().await.drain().map(|(_, w)| w).collect();
    for worker in drained {
        let _ = dispatch_tx
            .send(DispatchItem::Terminal {
                worker,
                outcome: WorkerOutcome::Failed(CycError::Connection(
                    "connection closed before a terminal event arrived".into(),
                )),
            })
            .await;
    }
}

// ---

async fn route_frame(
    frame: CycValue,
    pending: &PendingRequestTable,
    leases: &LeaseTable,
    dispatch_tx: &mpsc::Sender<DispatchItem>,
    conn_uuid: Uuid,
) {
    // ---
    let CycValue::List(items) = frame else {
        tracing::warn!(conn = %conn_uuid, "dropping non-list frame");
        return;
    };
    let mut items = items.into_iter();

    let Some(CycValue::Int(id)) = items.next() else {
        tracing::warn!(conn = %conn_uuid, "dropping frame without a request id");
        return;
    };

    if id == 0 {
        handle_control_frame(items, leases, conn_uuid).await;
        return;
    }

    let Some(CycValue::Int(status)) = items.next() else {
        tracing::warn!(conn = %conn_uuid, id, "dropping frame without a status");
        return;
    };
    let payload = items.next().unwrap_or(CycValue::Nil);

    // Data frames keep the request open; everything else retires it.
    let worker = {
        let mut table = pending.lock().await;
        if status == STATUS_DATA {
            table.get(&(id as u64)).cloned()
        } else {
            table.remove(&(id as u64))
        }
    };

    let Some(worker) = worker else {
        // Aborted or timed-out id: late responses are discarded here.
        tracing::debug!(conn = %conn_uuid, id, "discarding response for unknown request id");
        return;
    };

    let item = match status {
        STATUS_DATA => DispatchItem::Data { worker, value: payload },
        STATUS_OK => DispatchItem::Terminal {
            worker,
            outcome: WorkerOutcome::Finished(payload),
        },
        STATUS_CANCELED => DispatchItem::Terminal {
            worker,
            outcome: WorkerOutcome::Canceled,
        },
        STATUS_ERROR => {
            let text = match payload {
                CycValue::String(s) => s,
                other => other.to_string(),
            };
            DispatchItem::Terminal {
                worker,
                outcome: WorkerOutcome::Failed(CycError::Api(text)),
            }
        }
        other => DispatchItem::Terminal {
            worker,
            outcome: WorkerOutcome::Failed(CycError::Connection(format!(
                "unknown response status {other}"
            ))),
        },
    };

    let _ = dispatch_tx.send(item).await;
}

// ---

/// Server-directed frames with id 0. Unknown kinds are ignored.
async fn handle_control_frame(
    mut items: std::vec::IntoIter<CycValue>,
    leases: &LeaseTable,
    conn_uuid: Uuid,
) {
    // ---
    let Some(CycValue::Keyword(kind)) = items.next() else {
        tracing::debug!(conn = %conn_uuid, "dropping control frame without a keyword");
        return;
    };

    match kind.as_str() {
        "lease-expired" => {
            if let Some(CycValue::String(label)) = items.next() {
                if let Some(lease) = leases.lock().await.get(&label) {
                    lease.invalidate();
                    tracing::warn!(conn = %conn_uuid, stream = %label, "server expired lease");
                }
            }
        }
        other => {
            tracing::debug!(conn = %conn_uuid, control = other, "ignoring unknown control frame");
        }
    }
}

// ---

/// The connection's single dispatch context. Draining one ordered queue
/// serializes every listener callback for every worker on the connection;
/// a listener that blocks here delays them all.
async fn dispatch_loop(mut rx: mpsc::Receiver<DispatchItem>) {
    // ---
    while let Some(item) = rx.recv().await {
        match item {
            DispatchItem::Started { worker } => {
                // An abort that raced the queue silences even the started
                // notification.
                if !worker.is_working() {
                    continue;
                }
                let id = worker.worker_id().unwrap_or(0);
                for listener in worker.listeners() {
                    listener.on_started(id).await;
                }
            }

            DispatchItem::Data { worker, value } => {
                // A non-incremental worker receives at most its terminal
                // event, and a data event that raced a terminal transition
                // is dropped: nothing is delivered after a terminal event.
                if !worker.is_incremental() || !worker.is_working() {
                    continue;
                }
                let id = worker.worker_id().unwrap_or(0);
                for listener in worker.listeners() {
                    listener.on_data_available(id, &value).await;
                }
            }

            DispatchItem::Terminal { worker, outcome } => {
                // The state machine admits exactly one terminal event.
                if !worker.try_terminate(outcome) {
                    continue;
                }
                let Some(outcome) = worker.outcome() else {
                    continue;
                };
                let id = worker.worker_id().unwrap_or(0);
                for listener in worker.listeners() {
                    listener.on_terminated(id, &outcome).await;
                }
            }
        }
    }
}

// ---

/// Timeout enforcement independent of server responsiveness: when the
/// deadline passes with the id still pending, the entry is freed and the
/// worker fails with a timeout.
fn spawn_watchdog(
    id: u64,
    timeout_millis: u64,
    pending: PendingRequestTable,
    dispatch_tx: mpsc::Sender<DispatchItem>,
) {
    // ---
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(timeout_millis)).await;
        let expired = pending.lock().await.remove(&id);
        if let Some(worker) = expired {
            tracing::warn!(id, timeout_millis, "worker timed out");
            let _ = dispatch_tx
                .send(DispatchItem::Terminal {
                    worker,
                    outcome: WorkerOutcome::Failed(CycError::Timeout(timeout_millis)),
                })
                .await;
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
