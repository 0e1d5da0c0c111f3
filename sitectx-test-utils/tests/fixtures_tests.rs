use sitectx_context::{DrTupleStream, UndoAction, UndoQuantum};
use sitectx_test_utils::fixtures::{RecordingDrStream, RecordingUndoQuantum};

struct Flag(std::sync::Arc<std::sync::atomic::AtomicUsize>);

impl UndoAction for Flag {
    fn undo(self: Box<Self>) {
        self.0.fetch_add(10, std::sync::atomic::Ordering::SeqCst);
    }

    fn release(self: Box<Self>) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[test]
fn dr_stream_opens_one_record_per_unique_id() {
    let stream = RecordingDrStream::started(8);
    assert!(stream.transaction_checks(0, 1, 100));
    assert!(!stream.transaction_checks(0, 1, 100));
    assert!(stream.transaction_checks(1, 2, 101));

    stream.rollback_to(8);
    assert!(stream.transaction_checks(1, 2, 101));
    assert_eq!(stream.rollbacks(), vec![8]);
}

#[test]
fn undo_quantum_drains_on_undo_and_release() {
    let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let quantum = RecordingUndoQuantum::new(1);
    quantum.register_undo_action(Box::new(Flag(hits.clone())));
    quantum.register_undo_action(Box::new(Flag(hits.clone())));
    quantum.undo_all();
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 20);

    quantum.register_undo_action(Box::new(Flag(hits.clone())));
    quantum.release_all();
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 21);
    assert_eq!(quantum.pending(), 0);
}
