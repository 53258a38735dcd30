//! A single multiplexed LQTP connection: one long-lived HTTP streaming
//! duplex, many in-flight requests correlated by request id.
//!
//! Grounded on `original_source/sql/connection.go` for the handshake,
//! demultiplexing loop and `Send` structure. Restated in the idiom of
//! `hdbconnect_impl/src/conn/connection_core.rs` /
//! `conn/am_conn_core.rs`: an explicit `ConnectionState` enum (REDESIGN
//! FLAGS item) instead of the source's loose `connecting`/`closed` bools,
//! shared reader-task state behind its own `Arc` (matching the teacher's
//! `AmConnCore(Arc<MConnCore>)` shape) so the background reader never
//! needs an unsafe extended borrow of `Connection` itself, and
//! `tokio::sync::oneshot` response slots (also a REDESIGN FLAGS item)
//! instead of the source's buffered channels kept alive in a map after
//! their single use.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use secstr::SecUtf8;
use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use uuid::Uuid;

use crate::buffer_pool::BufferPool;
use crate::conn::params::ConnectParams;
use crate::error::{LbError, LbResult};
use crate::frame::Frame;
use crate::signer;
use crate::wire::{MessageType, Query, QueryResponse};
use crate::write_queue::{FrameSink, WriteQueue};

const SEND_TIMEOUT: Duration = Duration::from_secs(3);
/// Per spec §5: the handshake's control-byte write must complete within 3s.
const HANDSHAKE_WRITE_TIMEOUT: Duration = Duration::from_secs(3);
/// Per spec §5: the first HTTP response (status + headers) must arrive within 5s.
const HANDSHAKE_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Connecting,
    Ready,
    Closed,
}

/// Bridges a `tokio::sync::mpsc::Receiver<Bytes>` into the `Stream` shape
/// `reqwest::Body::wrap_stream` wants, without pulling in `tokio-stream`
/// for a single adapter.
struct OutboundStream(tokio::sync::mpsc::Receiver<Bytes>);

impl Stream for OutboundStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_recv(cx).map(|opt| opt.map(Ok))
    }
}

/// Owns the outbound half of the duplex plus the signing chain state, and
/// implements [`FrameSink`] so the write queue can hand it closed frames.
struct FrameWriter {
    body_tx: AsyncMutex<tokio::sync::mpsc::Sender<Bytes>>,
    access_key_secret: SecUtf8,
    date_header_value: String,
    prev_signature: AsyncMutex<String>,
}

impl FrameSink for FrameWriter {
    fn emit_signed<'a>(
        &'a self,
        frame: &'a Frame,
    ) -> Pin<Box<dyn std::future::Future<Output = LbResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let prev = self.prev_signature.lock().await.clone();
            let (bytes, new_sig) =
                frame.encode_signed(&self.access_key_secret, &self.date_header_value, &prev)?;
            *self.prev_signature.lock().await = new_sig;

            let tx = self.body_tx.lock().await;
            tx.send(Bytes::from(bytes))
                .await
                .map_err(|_| LbError::Closed)
        })
    }
}

/// State shared between the public `Connection` handle and its background
/// reader task, held behind its own `Arc` so the reader task's future is
/// genuinely `'static` without borrowing `Connection` itself.
///
/// `state` is a `watch` channel rather than a `Notify`: a plain `Notify`
/// can miss the `Connecting -> Ready` transition if it fires between a
/// waiter's state check and its `notified().await` call, whereas `watch`
/// always exposes the latest value to a freshly `subscribe`d receiver, so
/// `send`'s wait loop below can't stall on that race.
struct Shared {
    state: watch::Sender<ConnectionState>,
    closed: AtomicBool,
    fatal_error: AsyncMutex<Option<String>>,
    pending: AsyncMutex<HashMap<String, oneshot::Sender<QueryResponse>>>,
    stats: Stats,
}

/// Running counters for [`ConnectionStatistics`], in the spirit of the
/// teacher's `connection_statistics.rs` `ServerUsage` tracking: cheap
/// atomics updated inline rather than a separate accounting task.
#[derive(Default)]
struct Stats {
    sent: AtomicU64,
    received: AtomicU64,
    bytes_written: AtomicU64,
    last_latency_bits: AtomicU64,
}

/// A point-in-time snapshot of a connection's traffic counters. The
/// analogue of the teacher's per-connection `ServerUsage`: LQTP has no
/// server-side CPU/memory figures to report, so this tracks what the wire
/// protocol actually carries (`QueryResponseData.latency`) plus basic
/// send/receive accounting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionStatistics {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub bytes_written: u64,
    pub last_latency: f64,
}

/// One multiplexed LQTP connection.
pub struct Connection {
    id: String,
    shared: Arc<Shared>,
    write_queue: WriteQueue,
    buffers: BufferPool,
    reader_task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Connection {
    /// Opens a new connection and performs the LQTP handshake. Returns
    /// once the handshake request is in flight; the `Ready` transition
    /// happens asynchronously in the background reader task, matching the
    /// source's "connect, then signal readiness from the reader
    /// goroutine" structure.
    pub async fn connect(params: ConnectParams) -> LbResult<Self> {
        let id = Uuid::new_v4().to_string();
        let date_header_value = unix_timestamp();
        let host_header = params.host_header();
        // The source signs and dials the connection's configured URL
        // as-is; only `Conn::Ping` appends a `/query/stream` path.
        let path = params.url().path().trim_start_matches('/').to_string();

        let headers = vec![
            ("Content-Length".to_string(), "0".to_string()),
            ("Content-Type".to_string(), "application/octet-stream".to_string()),
            ("Host".to_string(), host_header),
            ("X-LBDB-Date".to_string(), date_header_value.clone()),
        ];
        let token = signer::sign_request(
            params.access_key_id(),
            params.access_key_secret(),
            "POST",
            &path,
            &headers,
            &[],
            b"",
            &date_header_value,
        )?;
        let prev_signature = signer::extract_signature_from_token(&token)?;

        let (body_tx, body_rx) = tokio::sync::mpsc::channel::<Bytes>(256);
        let writer = Arc::new(FrameWriter {
            body_tx: AsyncMutex::new(body_tx),
            access_key_secret: params.access_key_secret().clone(),
            date_header_value,
            prev_signature: AsyncMutex::new(prev_signature),
        });

        let client = reqwest::Client::builder()
            .build()
            .map_err(LbError::Http)?;

        let request = client
            .post(params.url().clone())
            .header("Content-Type", "application/octet-stream")
            .header("X-LBDB-Date", writer.date_header_value.clone())
            .header("Authorization", format!("Litebase-HMAC-SHA256 {token}"))
            .body(reqwest::Body::wrap_stream(OutboundStream(body_rx)))
            .send();

        // Per spec §5, the control byte goes out "shortly after" the
        // request begins, not after its response is awaited: a streaming
        // POST body only starts flowing once something writes into it, and
        // the source writes this byte from a separate goroutine for the
        // same reason. The channel send below is itself synchronous (it
        // just queues onto the bounded mpsc channel), so no extra task is
        // needed to avoid blocking the request future.
        tokio::time::timeout(
            HANDSHAKE_WRITE_TIMEOUT,
            writer
                .body_tx
                .lock()
                .await
                .send(Bytes::copy_from_slice(&[MessageType::OpenConnection.to_wire()])),
        )
        .await
        .map_err(|_| LbError::connect("handshake write timed out"))?
        .map_err(|_| LbError::connect("handshake write failed: connection closed"))?;

        let response = tokio::time::timeout(HANDSHAKE_RESPONSE_TIMEOUT, request)
            .await
            .map_err(|_| LbError::connect("handshake response timed out"))??;

        if !response.status().is_success() {
            return Err(LbError::connect(format!("handshake request failed: {}", response.status())));
        }

        let (state_tx, _state_rx) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(Shared {
            state: state_tx,
            closed: AtomicBool::new(false),
            fatal_error: AsyncMutex::new(None),
            pending: AsyncMutex::new(HashMap::new()),
            stats: Stats::default(),
        });

        let reader_task = tokio::spawn(Self::read_loop(Arc::clone(&shared), response));

        Ok(Self {
            id,
            shared,
            write_queue: WriteQueue::new(writer as Arc<dyn FrameSink>),
            buffers: BufferPool::new(),
            reader_task: AsyncMutex::new(Some(reader_task)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn read_loop(shared: Arc<Shared>, response: reqwest::Response) {
        let mut reader = EnvelopeReader::new(response.bytes_stream());
        loop {
            let envelope = match reader.next_envelope().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => break,
                Err(e) => {
                    *shared.fatal_error.lock().await = Some(e.to_string());
                    break;
                }
            };

            match envelope.message_type {
                MessageType::OpenConnection => {
                    let _ = shared.state.send(ConnectionState::Ready);
                }
                MessageType::CloseConnection => break,
                MessageType::Error => {
                    let message = String::from_utf8_lossy(&envelope.payload).to_string();
                    *shared.fatal_error.lock().await = Some(message);
                    break;
                }
                MessageType::Frame => match crate::wire::decode_frame_payload(&envelope.payload) {
                    Ok(responses) => {
                        let mut pending = shared.pending.lock().await;
                        for resp in responses {
                            let id = String::from_utf8_lossy(&resp.data.id).to_string();
                            if let Some(sender) = pending.remove(&id) {
                                let _ = sender.send(resp);
                            } else {
                                warn!("no pending request for response id {id}");
                            }
                        }
                    }
                    Err(e) => warn!("dropping malformed frame: {e}"),
                },
                MessageType::FrameEntry => {
                    warn!("unexpected bare FrameEntry envelope at top level");
                }
            }
        }

        shared.closed.store(true, Ordering::Release);
        let _ = shared.state.send(ConnectionState::Closed);
    }

    /// Sends a query, waiting up to 3 seconds for its response.
    pub async fn send(&self, query: Query) -> LbResult<QueryResponse> {
        if query.id.is_empty() {
            return Err(LbError::wire("message must have an id"));
        }

        self.wait_until_ready_or_closed().await;

        if self.shared.closed.load(Ordering::Acquire) {
            if let Some(msg) = self.shared.fatal_error.lock().await.clone() {
                return Err(LbError::connect(msg));
            }
            return Err(LbError::Closed);
        }

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(query.id.clone(), tx);

        let entry = {
            let mut out = self.buffers.acquire();
            let mut params_scratch = self.buffers.acquire();
            query.encode(&mut out, &mut params_scratch)?;
            out.clone()
        };

        self.shared.stats.sent.fetch_add(1, Ordering::Relaxed);
        self.shared
            .stats
            .bytes_written
            .fetch_add(entry.len() as u64, Ordering::Relaxed);
        self.write_queue.enqueue_entry(entry)?;

        match tokio::time::timeout(SEND_TIMEOUT, rx).await {
            Ok(Ok(response)) => {
                self.shared.stats.received.fetch_add(1, Ordering::Relaxed);
                self.shared
                    .stats
                    .last_latency_bits
                    .store(response.data.latency.to_bits(), Ordering::Relaxed);
                Ok(response)
            }
            Ok(Err(_)) => {
                self.shared.pending.lock().await.remove(&query.id);
                Err(LbError::Closed)
            }
            Err(_) => {
                self.shared.pending.lock().await.remove(&query.id);
                Err(LbError::Timeout {
                    request_id: query.id,
                })
            }
        }
    }

    /// A snapshot of this connection's traffic counters.
    pub fn statistics(&self) -> ConnectionStatistics {
        ConnectionStatistics {
            requests_sent: self.shared.stats.sent.load(Ordering::Relaxed),
            responses_received: self.shared.stats.received.load(Ordering::Relaxed),
            bytes_written: self.shared.stats.bytes_written.load(Ordering::Relaxed),
            last_latency: f64::from_bits(self.shared.stats.last_latency_bits.load(Ordering::Relaxed)),
        }
    }

    /// A troubleshooting summary of this connection's state. Never
    /// includes the access key secret or signature chain state.
    pub fn debug_state(&self) -> String {
        let state = *self.shared.state.subscribe().borrow();
        let stats = self.statistics();
        format!(
            "Connection {{ id: {}, state: {state:?}, closed: {}, sent: {}, received: {}, bytes_written: {}, last_latency: {} }}",
            self.id,
            self.is_closed(),
            stats.requests_sent,
            stats.responses_received,
            stats.bytes_written,
            stats.last_latency,
        )
    }

    /// Blocks until the handshake completes or the connection becomes
    /// closed, whichever happens first.
    async fn wait_until_ready_or_closed(&self) {
        let mut rx = self.shared.state.subscribe();
        loop {
            if *rx.borrow() != ConnectionState::Connecting {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Idempotent shutdown: stops the write queue and the reader task.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.write_queue.close();
        let _ = self.shared.state.send(ConnectionState::Closed);
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}

struct Envelope {
    message_type: MessageType,
    payload: Vec<u8>,
}

/// Reassembles `[type: u8][len: u32][payload]` envelopes out of an HTTP
/// response byte stream, buffering partial reads the way
/// `original_source/sql/connection.go`'s manual `resp.Body.Read` loop does,
/// but without the fixed 1024-byte re-chunking (we just grow the buffer).
struct EnvelopeReader<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S> EnvelopeReader<S>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    async fn fill_to(&mut self, n: usize) -> LbResult<bool> {
        while self.buf.len() < n {
            match self.stream.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(LbError::Http(e)),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    async fn next_envelope(&mut self) -> LbResult<Option<Envelope>> {
        if !self.fill_to(5).await? {
            return Ok(None);
        }
        let message_type = MessageType::from_wire(self.buf[0])?;
        let len = u32::from_le_bytes(self.buf[1..5].try_into().expect("checked length")) as usize;

        if !self.fill_to(5 + len).await? {
            return Err(LbError::wire("stream ended mid-envelope"));
        }

        let payload = self.buf[5..5 + len].to_vec();
        self.buf.drain(0..5 + len);

        Ok(Some(Envelope { message_type, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn unix_timestamp_is_all_digits() {
        let ts = unix_timestamp();
        assert!(!ts.is_empty());
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    fn envelope_bytes(message_type: MessageType, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![message_type.to_wire()];
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[tokio::test]
    async fn envelope_reader_reassembles_one_envelope_split_across_many_chunks() {
        let whole = envelope_bytes(MessageType::Error, b"boom");
        // Split into single-byte chunks to exercise the worst case.
        let chunks: Vec<reqwest::Result<Bytes>> = whole
            .iter()
            .map(|b| Ok(Bytes::copy_from_slice(&[*b])))
            .collect();

        let mut reader = EnvelopeReader::new(stream::iter(chunks));
        let envelope = reader.next_envelope().await.unwrap().unwrap();
        assert_eq!(envelope.message_type, MessageType::Error);
        assert_eq!(envelope.payload, b"boom");
        assert!(reader.next_envelope().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn envelope_reader_reads_multiple_envelopes_delivered_in_one_chunk() {
        let mut whole = envelope_bytes(MessageType::OpenConnection, &[]);
        whole.extend_from_slice(&envelope_bytes(MessageType::CloseConnection, &[]));
        let chunks: Vec<reqwest::Result<Bytes>> = vec![Ok(Bytes::from(whole))];

        let mut reader = EnvelopeReader::new(stream::iter(chunks));
        let first = reader.next_envelope().await.unwrap().unwrap();
        assert_eq!(first.message_type, MessageType::OpenConnection);
        let second = reader.next_envelope().await.unwrap().unwrap();
        assert_eq!(second.message_type, MessageType::CloseConnection);
        assert!(reader.next_envelope().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn envelope_reader_errors_on_stream_ending_mid_envelope() {
        let mut whole = envelope_bytes(MessageType::Error, b"partial-payload");
        whole.truncate(whole.len() - 3); // drop the tail of the payload
        let chunks: Vec<reqwest::Result<Bytes>> = vec![Ok(Bytes::from(whole))];

        let mut reader = EnvelopeReader::new(stream::iter(chunks));
        assert!(reader.next_envelope().await.is_err());
    }

    #[tokio::test]
    async fn wait_until_ready_or_closed_returns_once_state_leaves_connecting() {
        let (state_tx, _rx) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(Shared {
            state: state_tx,
            closed: AtomicBool::new(false),
            fatal_error: AsyncMutex::new(None),
            pending: AsyncMutex::new(HashMap::new()),
            stats: Stats::default(),
        });

        let waiter = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                let mut rx = shared.state.subscribe();
                loop {
                    if *rx.borrow() != ConnectionState::Connecting {
                        return;
                    }
                    if rx.changed().await.is_err() {
                        return;
                    }
                }
            })
        };

        let _ = shared.state.send(ConnectionState::Ready);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should observe the Ready transition promptly")
            .unwrap();
    }
}
