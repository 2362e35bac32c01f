//! Queued message types: what a pending form submission looks like on disk.
//!
//! DESIGN
//! ======
//! The persisted queue is a JSON array of `QueuedMessage`. Field names are
//! camelCase so the blob matches what the website writes to `localStorage`.
//!
//! The website's entries are `{kind, payload, enqueuedAt}` with no `id`.
//! Those are read through `StoredMessage`, which leaves the id empty so the
//! queue can assign one and write it back once.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Form field contents, forwarded to the backend verbatim.
pub type Payload = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// MESSAGE KIND
// =============================================================================

/// Which form produced the submission. Determines the delivery endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Contact,
    Budget,
}

impl MessageKind {
    /// API path the submission is posted to.
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Contact => "/api/contact",
            Self::Budget => "/api/budget",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Budget => "budget",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown message kind '{0}' (expected 'contact' or 'budget')")]
pub struct UnknownKind(pub String);

impl FromStr for MessageKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contact" => Ok(Self::Contact),
            "budget" => Ok(Self::Budget),
            _ => Err(UnknownKind(s.to_owned())),
        }
    }
}

// =============================================================================
// QUEUED MESSAGE
// =============================================================================

/// A submission waiting for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    /// Assigned on the first delivery attempt (or on first read, for entries
    /// stored without one); doubles as the idempotency key.
    pub id: Uuid,
    pub kind: MessageKind,
    pub payload: Payload,
    /// Epoch milliseconds at insertion. Not used for expiry.
    pub enqueued_at: i64,
}

impl QueuedMessage {
    /// Build a message with a fresh id, stamped now.
    #[must_use]
    pub fn new(kind: MessageKind, payload: Payload) -> Self {
        Self::with_id(Uuid::new_v4(), kind, payload)
    }

    /// Build a message that keeps the id of an earlier delivery attempt.
    #[must_use]
    pub fn with_id(id: Uuid, kind: MessageKind, payload: Payload) -> Self {
        Self { id, kind, payload, enqueued_at: now_ms() }
    }
}

/// Read-side shape of a persisted entry. `id` is absent in blobs written by
/// the website.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredMessage {
    #[serde(default)]
    id: Option<Uuid>,
    kind: MessageKind,
    payload: Payload,
    enqueued_at: i64,
}

impl StoredMessage {
    /// Convert to a `QueuedMessage`, minting an id if the entry had none.
    /// The flag is `true` when an id was minted.
    pub(crate) fn into_message(self) -> (QueuedMessage, bool) {
        let minted = self.id.is_none();
        let message = QueuedMessage {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            kind: self.kind,
            payload: self.payload,
            enqueued_at: self.enqueued_at,
        };
        (message, minted)
    }
}

pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
