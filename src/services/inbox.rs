//! Inbox service: submissions the backend has accepted.
//!
//! DESIGN
//! ======
//! The API is the receiving end of the queue's at-least-once delivery, so
//! it remembers idempotency keys and acknowledges a repeat without storing
//! it twice. Entries live in memory, bounded by capacity; the oldest entry
//! (and its key) is evicted first.
//!
//! TRADE-OFFS
//! ==========
//! A key evicted from the window can be accepted again. With the default
//! capacity that takes hundreds of newer submissions in between, which a
//! contact form does not see.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::queue::message::now_ms;
use crate::queue::{MessageKind, Payload};

/// A submission as the backend recorded it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedSubmission {
    pub id: Uuid,
    pub kind: MessageKind,
    pub payload: Payload,
    pub received_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// First time this id was seen; stored.
    Accepted(Uuid),
    /// The id is already in the inbox; nothing stored.
    Duplicate(Uuid),
}

pub struct Inbox {
    inner: Mutex<InboxInner>,
    capacity: usize,
}

struct InboxInner {
    entries: VecDeque<ReceivedSubmission>,
    seen: HashSet<Uuid>,
}

impl Inbox {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(InboxInner { entries: VecDeque::new(), seen: HashSet::new() }),
            capacity: capacity.max(1),
        }
    }

    /// Record a submission. `key` is the client's idempotency key; a fresh
    /// id is minted when the client sent none.
    pub fn accept(&self, kind: MessageKind, key: Option<Uuid>, payload: Payload) -> Acceptance {
        let id = key.unwrap_or_else(Uuid::new_v4);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if inner.seen.contains(&id) {
            info!(%id, %kind, "duplicate submission acknowledged");
            return Acceptance::Duplicate(id);
        }

        if inner.entries.len() >= self.capacity {
            if let Some(evicted) = inner.entries.pop_front() {
                inner.seen.remove(&evicted.id);
            }
        }

        let fields = payload.len();
        inner.seen.insert(id);
        inner.entries.push_back(ReceivedSubmission { id, kind, payload, received_at: now_ms() });
        info!(%id, %kind, fields, "submission received");
        Acceptance::Accepted(id)
    }

    /// Stored submissions, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ReceivedSubmission> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "inbox_test.rs"]
mod tests;
