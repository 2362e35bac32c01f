use super::*;
use crate::queue::{KeyValueStore, MemoryStore, StoreError};
use crate::transport::test_helpers::{MockTransport, named};

/// Store whose writes always fail, like a browser with storage disabled.
struct ReadOnlyStore;

impl KeyValueStore for ReadOnlyStore {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage disabled".into()))
    }

    fn remove_item(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage disabled".into()))
    }
}

fn submitter_with(store: Arc<dyn KeyValueStore>, transport: Arc<MockTransport>) -> (FormSubmitter, Arc<SubmissionQueue>) {
    let queue = Arc::new(SubmissionQueue::new(store, transport.clone()));
    (FormSubmitter::new(queue.clone(), transport), queue)
}

#[tokio::test]
async fn delivered_submission_is_not_queued() {
    let transport = Arc::new(MockTransport::new());
    let (submitter, queue) = submitter_with(Arc::new(MemoryStore::new()), transport.clone());

    let outcome = submitter.submit(MessageKind::Contact, named("Ana")).await;

    assert!(matches!(outcome, SubmitOutcome::Delivered { .. }));
    assert!(queue.is_empty());
    assert_eq!(transport.attempted_names(), vec!["Ana"]);
}

#[tokio::test]
async fn failed_submission_is_queued_once_with_same_id() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_kind(MessageKind::Budget);
    let (submitter, queue) = submitter_with(Arc::new(MemoryStore::new()), transport.clone());

    let outcome = submitter.submit(MessageKind::Budget, named("Bruno")).await;

    assert!(matches!(outcome, SubmitOutcome::Queued { .. }));
    let queued = queue.list_all();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].id, outcome.id());
    assert_eq!(queued[0].id, transport.attempts()[0].id);
    assert_eq!(queued[0].kind, MessageKind::Budget);
}

#[tokio::test]
async fn queued_submission_is_delivered_by_later_flush() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_kind(MessageKind::Contact);
    let (submitter, queue) = submitter_with(Arc::new(MemoryStore::new()), transport.clone());
    let outcome = submitter.submit(MessageKind::Contact, named("Ana")).await;

    transport.recover();
    let report = queue.flush().await;

    assert_eq!(report.delivered, 1);
    let attempts = transport.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().all(|a| a.id == outcome.id()));
}

#[tokio::test]
async fn unsaved_submission_still_thanks_the_visitor() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_kind(MessageKind::Contact);
    let (submitter, _) = submitter_with(Arc::new(ReadOnlyStore), transport);

    let outcome = submitter.submit(MessageKind::Contact, named("Ana")).await;

    assert!(matches!(outcome, SubmitOutcome::Unsaved { .. }));
    assert_eq!(outcome.user_message(), THANK_YOU_MESSAGE);
}

#[test]
fn every_outcome_shows_the_same_message() {
    let id = Uuid::new_v4();
    for outcome in [SubmitOutcome::Delivered { id }, SubmitOutcome::Queued { id }, SubmitOutcome::Unsaved { id }] {
        assert_eq!(outcome.user_message(), THANK_YOU_MESSAGE);
        assert_eq!(outcome.id(), id);
    }
}
