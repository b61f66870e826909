//! # Broadcast Listener
//!
//! Background task that reads server broadcasts and applies them to the
//! reconciliation engine.
//!
//! # Architecture
//!
//! The listener runs as a separate async task that:
//! 1. Awaits a read of at most `read_chunk_size` bytes
//! 2. Feeds the bytes to the connection's [`StreamDecoder`]
//! 3. Applies every decoded broadcast, in wire order, under the engine lock
//! 4. Publishes the resulting lifecycle events
//!
//! A malformed line or an unknown entity class is logged, counted in
//! [`SyncStats`] and skipped. The task ends when the server closes the
//! connection, a read fails, or the listener is cancelled; in every case the
//! session is marked Disconnected.

use crate::session::{SessionState, SessionStatus};
use netsync_core::NetSyncError;
use netsync_protocol::{Decoded, StreamDecoder};
use netsync_world::{EntitySpawner, LifecycleEvent, ReconciliationEngine};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Engine shared between the listener and the rest of the client
pub type SharedEngine<S> = Arc<Mutex<ReconciliationEngine<S>>>;

/// Running counters for one client
#[derive(Debug, Default)]
pub struct SyncStats {
    decoded: AtomicU64,
    decode_failures: AtomicU64,
    unknown_class: AtomicU64,
    applied: AtomicU64,
    write_failures: AtomicU64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decoded(&self, count: u64) {
        self.decoded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_class(&self) {
        self.unknown_class.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_applied(&self, count: u64) {
        self.applied.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of the counters
    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            decoded: self.decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            unknown_class: self.unknown_class.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Sync statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatsSnapshot {
    /// Well-formed broadcasts decoded
    pub decoded: u64,

    /// Malformed, oversized or truncated messages dropped
    pub decode_failures: u64,

    /// Broadcasts naming an entity class this client does not know
    pub unknown_class: u64,

    /// Broadcasts that created, updated or destroyed an entity
    pub applied: u64,

    /// Outbound commands lost to a failed write
    pub write_failures: u64,
}

/// Lifecycle event fan-out with at most one subscriber
///
/// Events published while nobody is subscribed are dropped, so an unused
/// sink never buffers anything.
#[derive(Clone, Default)]
pub struct EventSink {
    subscriber: Arc<Mutex<Option<mpsc::UnboundedSender<LifecycleEvent>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current subscriber and return its receiver
    ///
    /// A previous receiver sees its channel close.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LifecycleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock() = Some(tx);
        rx
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriber.lock().is_some()
    }

    /// Send `events` to the subscriber, if any
    ///
    /// A subscriber whose receiver was dropped is forgotten.
    pub fn publish(&self, events: impl IntoIterator<Item = LifecycleEvent>) {
        let mut subscriber = self.subscriber.lock();
        let delivered = match subscriber.as_ref() {
            Some(tx) => events.into_iter().all(|event| tx.send(event).is_ok()),
            None => return,
        };

        if !delivered {
            debug!("Event receiver dropped");
            *subscriber = None;
        }
    }
}

/// Why the listener stopped
#[derive(Debug)]
pub enum ListenerExit {
    /// The server closed the connection
    Closed,

    /// The listener was cancelled (client shutdown)
    Cancelled,

    /// Reading from the socket failed
    Failed(NetSyncError),
}

/// Reader task state
///
/// `R` is the read half of the connection; anything implementing
/// [`AsyncRead`] works, which keeps the listener testable over in-memory
/// pipes.
pub struct BroadcastListener<R, S: EntitySpawner> {
    reader: R,
    decoder: StreamDecoder,
    engine: SharedEngine<S>,
    events: EventSink,
    stats: Arc<SyncStats>,
    state: SessionStatus,
    cancel: CancellationToken,
    read_chunk_size: usize,
}

impl<R, S> BroadcastListener<R, S>
where
    R: AsyncRead + Unpin + Send + 'static,
    S: EntitySpawner + 'static,
{
    /// Create a listener over `reader`
    ///
    /// # Arguments
    /// * `decoder` - Decoder for this connection; may already hold bytes that
    ///   arrived together with the handshake
    pub fn new(reader: R, decoder: StreamDecoder, engine: SharedEngine<S>) -> Self {
        Self {
            reader,
            decoder,
            engine,
            events: EventSink::new(),
            stats: Arc::new(SyncStats::new()),
            state: SessionStatus::new(SessionState::Connected),
            cancel: CancellationToken::new(),
            read_chunk_size: 1024,
        }
    }

    /// Publish lifecycle events on `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_stats(mut self, stats: Arc<SyncStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Session state to mark Disconnected when the listener stops
    pub fn with_status(mut self, state: SessionStatus) -> Self {
        self.state = state;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size.max(1);
        self
    }

    /// Spawn the listener task
    pub fn spawn(self) -> JoinHandle<ListenerExit> {
        tokio::spawn(self.run())
    }

    /// Read and apply broadcasts until the connection ends
    pub async fn run(mut self) -> ListenerExit {
        info!("Broadcast listener started");

        // Lines that arrived together with the handshake
        let pending = self.decoder.decode(&[]);
        self.apply_decoded(pending);

        let cancel = self.cancel.clone();
        let mut buf = vec![0u8; self.read_chunk_size];

        let exit = loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => break ListenerExit::Cancelled,
                read = self.reader.read(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    let tail = self.decoder.finish();
                    self.apply_decoded(tail);
                    info!("Server closed connection");
                    break ListenerExit::Closed;
                }
                Ok(n) => {
                    trace!("Received {} bytes", n);
                    let decoded = self.decoder.decode(&buf[..n]);
                    self.apply_decoded(decoded);
                }
                Err(e) => {
                    warn!("Error reading from server: {}", e);
                    break ListenerExit::Failed(e.into());
                }
            }
        };

        self.state.set(SessionState::Disconnected);
        info!("Broadcast listener stopped: {:?}", exit);
        exit
    }

    /// Apply one batch of decoded messages
    ///
    /// # Returns
    /// Number of lifecycle events produced
    fn apply_decoded(&self, decoded: Decoded) -> usize {
        for failure in &decoded.failures {
            self.stats.record_decode_failure();
            warn!("Dropping malformed message: {}", failure);
        }

        if decoded.broadcasts.is_empty() {
            return 0;
        }
        self.stats.record_decoded(decoded.broadcasts.len() as u64);

        // One lock per batch; events are published while it is held
        let mut engine = self.engine.lock();
        let events: Vec<LifecycleEvent> = decoded
            .broadcasts
            .iter()
            .filter_map(|broadcast| match engine.apply(broadcast) {
                Ok(event) => event,
                Err(e) => {
                    self.stats.record_unknown_class();
                    warn!("Skipping broadcast for {}: {}", broadcast.id, e);
                    None
                }
            })
            .collect();

        let count = events.len();
        self.stats.record_applied(count as u64);
        debug!("Applied {} of {} broadcasts", count, decoded.broadcasts.len());

        self.events.publish(events);
        drop(engine);
        count
    }
}
