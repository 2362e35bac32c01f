//! Form submitter: send now, or queue for later.
//!
//! DESIGN
//! ======
//! A submission is attempted once right away. If that fails it is queued
//! exactly once, keeping the id of the failed attempt so the backend can
//! recognize a duplicate if the first request actually landed. The visitor
//! always gets the same thank-you message: a busy backend is not their
//! problem.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::queue::{MessageKind, Payload, QueuedMessage, SubmissionQueue};
use crate::transport::Transport;

/// Message shown to the visitor whatever happened behind the scenes.
pub const THANK_YOU_MESSAGE: &str = "Thanks! We received your message and will get back to you soon.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend acknowledged the submission.
    Delivered { id: Uuid },
    /// Delivery failed; the submission waits in the queue.
    Queued { id: Uuid },
    /// Delivery failed and the queue could not be written. Logged as an error.
    Unsaved { id: Uuid },
}

impl SubmitOutcome {
    #[must_use]
    pub fn id(self) -> Uuid {
        match self {
            Self::Delivered { id } | Self::Queued { id } | Self::Unsaved { id } => id,
        }
    }

    /// What the visitor sees. Identical for every outcome.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        THANK_YOU_MESSAGE
    }
}

pub struct FormSubmitter {
    queue: Arc<SubmissionQueue>,
    transport: Arc<dyn Transport>,
}

impl FormSubmitter {
    #[must_use]
    pub fn new(queue: Arc<SubmissionQueue>, transport: Arc<dyn Transport>) -> Self {
        Self { queue, transport }
    }

    /// Deliver `payload` now, falling back to the durable queue.
    pub async fn submit(&self, kind: MessageKind, payload: Payload) -> SubmitOutcome {
        let id = Uuid::new_v4();
        match self.transport.deliver(id, kind, &payload).await {
            Ok(()) => {
                info!(%id, %kind, "submission delivered");
                SubmitOutcome::Delivered { id }
            }
            Err(delivery_err) => {
                info!(%id, %kind, error = %delivery_err, "submission failed; queueing for retry");
                match self.queue.enqueue_message(QueuedMessage::with_id(id, kind, payload)) {
                    Ok(()) => SubmitOutcome::Queued { id },
                    Err(e) => {
                        error!(%id, %kind, error = %e, "submission could not be queued; it is lost");
                        SubmitOutcome::Unsaved { id }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "submitter_test.rs"]
mod tests;
