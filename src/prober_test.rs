use super::*;
use crate::queue::{MemoryStore, MessageKind};
use crate::transport::test_helpers::{MockTransport, named};

fn setup() -> (Arc<SubmissionQueue>, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let queue = Arc::new(SubmissionQueue::new(Arc::new(MemoryStore::new()), transport.clone()));
    (queue, transport)
}

/// Poll `cond` every 10ms for up to one second.
async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn probe_once_flushes_when_reachable() {
    let (queue, transport) = setup();
    queue.enqueue(MessageKind::Contact, named("Ana")).unwrap();

    let outcome = probe_once(&queue, transport.as_ref()).await;

    let ProbeOutcome::Flushed(report) = outcome else {
        panic!("expected a flush, got {outcome:?}");
    };
    assert_eq!(report.delivered, 1);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn probe_once_leaves_queue_when_unreachable() {
    let (queue, transport) = setup();
    transport.set_ping_ok(false);
    queue.enqueue(MessageKind::Contact, named("Ana")).unwrap();

    let outcome = probe_once(&queue, transport.as_ref()).await;

    assert_eq!(outcome, ProbeOutcome::Unreachable);
    assert!(transport.attempts().is_empty());
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn spawn_probes_immediately() {
    let (queue, transport) = setup();
    queue.enqueue(MessageKind::Budget, named("Bruno")).unwrap();

    // Interval far longer than the test: only the immediate tick can fire.
    let prober = Prober::spawn(queue.clone(), transport.clone(), Duration::from_secs(3600));

    assert!(eventually(|| queue.is_empty()).await, "immediate probe should flush");
    assert_eq!(transport.ping_count(), 1);
    assert!(prober.is_running());
    prober.stop();
}

#[tokio::test]
async fn spawn_keeps_probing_on_interval() {
    let (queue, transport) = setup();
    transport.set_ping_ok(false);

    let _prober = Prober::spawn(queue, transport.clone(), Duration::from_millis(20));

    assert!(eventually(|| transport.ping_count() >= 3).await, "prober should keep ticking after failures");
}

#[tokio::test]
async fn dropping_prober_stops_ticking() {
    let (queue, transport) = setup();
    let prober = Prober::spawn(queue, transport.clone(), Duration::from_millis(10));
    assert!(eventually(|| transport.ping_count() >= 1).await);

    drop(prober);
    // Let the abort land, then make sure the count stays put.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let after_stop = transport.ping_count();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(transport.ping_count(), after_stop);
}
