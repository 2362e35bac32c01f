//! Durable submission queue: form submissions that could not be sent yet.
//!
//! DESIGN
//! ======
//! The queue is one JSON array stored under a single key. Every mutation is
//! a full read-modify-write of that blob, so the persisted value always
//! matches the sequence right after the call. There is no separate dirty
//! state to flush.
//!
//! `flush` walks a snapshot in FIFO order and delivers one message at a time.
//! A delivered message is removed immediately (found again by id), so a crash
//! mid-flush loses at most the undelivered tail's progress, never a message
//! that was already acknowledged. Failed messages stay where they are.
//!
//! CONCURRENCY
//! ===========
//! - `write_lock` serializes read-modify-write cycles on the blob within this
//!   instance, so an enqueue racing a removal cannot be overwritten.
//! - `flush_guard` admits one flush at a time; an overlapping call returns a
//!   skipped report instead of delivering the same messages twice.
//! - Network calls never hold `write_lock`.
//!
//! ERROR HANDLING
//! ==============
//! Reads never fail: a missing blob is an empty queue, and an unreadable or
//! corrupt blob degrades to whatever entries still decode. The raw blob is
//! copied to `<key>:quarantine` before anything is dropped, and the recovered
//! sequence is written back so the same corruption is handled only once.
//! Entries stored without an id get one on first read, persisted in the same
//! write, so ids stay stable between a flush snapshot and its removals.
//! Write failures surface as `QueueError` from `enqueue`/`remove_at`; `flush`
//! logs them.

pub mod message;
pub mod store;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use message::{MessageKind, Payload, QueuedMessage};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

use message::StoredMessage;

use crate::transport::Transport;

/// Storage key the website uses for its offline queue.
pub const DEFAULT_QUEUE_KEY: &str = "lytspot:message-queue";

const QUARANTINE_SUFFIX: &str = ":quarantine";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("queue serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// FLUSH REPORT
// =============================================================================

/// Summary of one `flush` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Messages a delivery was attempted for.
    pub attempted: usize,
    /// Messages acknowledged by the backend.
    pub delivered: usize,
    /// Messages left in the queue after a failed delivery.
    pub failed: usize,
    /// Delivered messages whose removal could not be persisted.
    pub unremoved: usize,
    /// `true` when another flush was already running and this one did nothing.
    pub skipped: bool,
}

impl FlushReport {
    fn skipped() -> Self {
        Self { skipped: true, ..Self::default() }
    }
}

// =============================================================================
// SUBMISSION QUEUE
// =============================================================================

pub struct SubmissionQueue {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn Transport>,
    key: String,
    write_lock: Mutex<()>,
    flush_guard: tokio::sync::Mutex<()>,
}

impl SubmissionQueue {
    /// Queue persisted under [`DEFAULT_QUEUE_KEY`].
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, transport: Arc<dyn Transport>) -> Self {
        Self::with_key(store, transport, DEFAULT_QUEUE_KEY)
    }

    #[must_use]
    pub fn with_key(store: Arc<dyn KeyValueStore>, transport: Arc<dyn Transport>, key: impl Into<String>) -> Self {
        Self {
            store,
            transport,
            key: key.into(),
            write_lock: Mutex::new(()),
            flush_guard: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key raw corrupt blobs are copied to before entries are dropped.
    #[must_use]
    pub fn quarantine_key(&self) -> String {
        format!("{}{QUARANTINE_SUFFIX}", self.key)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Current persisted sequence, oldest first. Never fails.
    #[must_use]
    pub fn list_all(&self) -> Vec<QueuedMessage> {
        let _guard = self.lock_writes();
        self.load_locked()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list_all().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list_all().is_empty()
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Append a new submission and persist the whole queue.
    ///
    /// # Errors
    ///
    /// Returns a [`QueueError`] if the queue cannot be written back.
    pub fn enqueue(&self, kind: MessageKind, payload: Payload) -> Result<QueuedMessage, QueueError> {
        let message = QueuedMessage::new(kind, payload);
        self.enqueue_message(message.clone())?;
        Ok(message)
    }

    /// Append a pre-built message (keeps its id) and persist the whole queue.
    ///
    /// # Errors
    ///
    /// Returns a [`QueueError`] if the queue cannot be written back.
    pub fn enqueue_message(&self, message: QueuedMessage) -> Result<(), QueueError> {
        let _guard = self.lock_writes();
        let mut messages = self.load_locked();
        let (id, kind) = (message.id, message.kind);
        messages.push(message);
        self.persist(&messages)?;
        info!(%id, %kind, queued = messages.len(), "submission queued");
        Ok(())
    }

    /// Remove the message at `index` and persist. An out-of-range index
    /// changes nothing and returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a [`QueueError`] if the queue cannot be written back.
    pub fn remove_at(&self, index: usize) -> Result<Option<QueuedMessage>, QueueError> {
        let _guard = self.lock_writes();
        let messages = self.load_locked();
        self.remove_from(messages, index)
    }

    /// Remove the message with `id`, wherever it currently sits.
    ///
    /// # Errors
    ///
    /// Returns a [`QueueError`] if the queue cannot be written back.
    pub fn remove_by_id(&self, id: Uuid) -> Result<Option<QueuedMessage>, QueueError> {
        let _guard = self.lock_writes();
        let messages = self.load_locked();
        let Some(index) = messages.iter().position(|m| m.id == id) else {
            return Ok(None);
        };
        self.remove_from(messages, index)
    }

    fn remove_from(&self, mut messages: Vec<QueuedMessage>, index: usize) -> Result<Option<QueuedMessage>, QueueError> {
        if index >= messages.len() {
            debug!(index, len = messages.len(), "remove_at out of range; ignoring");
            return Ok(None);
        }
        let removed = messages.remove(index);
        self.persist(&messages)?;
        Ok(Some(removed))
    }

    // -------------------------------------------------------------------------
    // Flush
    // -------------------------------------------------------------------------

    /// Try to deliver every queued message, oldest first, one at a time.
    ///
    /// Delivered messages are removed as soon as they are acknowledged;
    /// failures stay queued and do not block later messages. Never returns
    /// an error. If another flush is in progress this call does nothing.
    pub async fn flush(&self) -> FlushReport {
        let Ok(_flushing) = self.flush_guard.try_lock() else {
            debug!(key = %self.key, "flush already in progress; skipping");
            return FlushReport::skipped();
        };

        let snapshot = self.list_all();
        let mut report = FlushReport::default();
        if snapshot.is_empty() {
            return report;
        }
        info!(pending = snapshot.len(), "flushing submission queue");

        for message in snapshot {
            report.attempted += 1;
            match self.transport.deliver(message.id, message.kind, &message.payload).await {
                Ok(()) => {
                    report.delivered += 1;
                    if let Err(e) = self.remove_by_id(message.id) {
                        report.unremoved += 1;
                        error!(error = %e, id = %message.id, "delivered submission could not be removed");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        error = %e,
                        id = %message.id,
                        kind = %message.kind,
                        retryable = e.retryable(),
                        "queued submission delivery failed; keeping it"
                    );
                }
            }
        }

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "submission queue flush finished"
        );
        report
    }

    // -------------------------------------------------------------------------
    // Persistence helpers
    // -------------------------------------------------------------------------

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read and decode the blob. Caller holds `write_lock`.
    ///
    /// A blob that needed repair (dropped entries or minted ids) is written
    /// back immediately. If that write fails the repair is retried on the
    /// next read.
    fn load_locked(&self) -> Vec<QueuedMessage> {
        let raw = match self.store.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, key = %self.key, "queue read failed; treating as empty");
                return Vec::new();
            }
        };

        let decoded = decode_queue(&raw);
        if decoded.dropped > 0 {
            warn!(key = %self.key, dropped = decoded.dropped, kept = decoded.messages.len(), "corrupt queue entries dropped");
            self.quarantine(&raw);
        }
        if decoded.dropped > 0 || decoded.minted > 0 {
            match self.persist(&decoded.messages) {
                Ok(()) => info!(key = %self.key, dropped = decoded.dropped, minted = decoded.minted, "queue blob repaired"),
                Err(e) => warn!(error = %e, key = %self.key, "repaired queue could not be written back"),
            }
        }
        decoded.messages
    }

    fn persist(&self, messages: &[QueuedMessage]) -> Result<(), QueueError> {
        let raw = serde_json::to_string(messages)?;
        self.store.set_item(&self.key, &raw)?;
        Ok(())
    }

    fn quarantine(&self, raw: &str) {
        let key = self.quarantine_key();
        if let Err(e) = self.store.set_item(&key, raw) {
            warn!(error = %e, key = %key, "could not quarantine corrupt queue blob");
        }
    }
}

struct Decoded {
    messages: Vec<QueuedMessage>,
    /// Entries that did not decode. A blob that is not a JSON array counts as one.
    dropped: usize,
    /// Entries that decoded but carried no id.
    minted: usize,
}

fn decode_queue(raw: &str) -> Decoded {
    if let Ok(stored) = serde_json::from_str::<Vec<StoredMessage>>(raw) {
        return finish_decode(stored, 0);
    }

    let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(raw) else {
        return Decoded { messages: Vec::new(), dropped: 1, minted: 0 };
    };

    let total = values.len();
    let stored: Vec<StoredMessage> = values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    let dropped = total - stored.len();
    finish_decode(stored, dropped)
}

fn finish_decode(stored: Vec<StoredMessage>, dropped: usize) -> Decoded {
    let mut minted = 0;
    let messages = stored
        .into_iter()
        .map(|entry| {
            let (message, was_minted) = entry.into_message();
            minted += usize::from(was_minted);
            message
        })
        .collect();
    Decoded { messages, dropped, minted }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
