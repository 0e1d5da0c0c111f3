#![forbid(unsafe_code)]

//! Replication bookkeeping before replicated writes.

use std::sync::Arc;

use sitectx_context::{ContextConfig, DrTupleStream, ExecutionContext};
use sitectx_test_utils::fixtures::{RecordingDrStream, RecordingUndoQuantum};
use sitectx_test_utils::init_tracing_for_tests;
use sitectx_types::UniqueId;
use sitectx_types::unique_id::{MP_INIT_PID, make_id};

fn mp_unique_id(timestamp: i64) -> UniqueId {
    make_id(timestamp, 0, MP_INIT_PID).unwrap()
}

fn context(
    dr_stream: Option<Arc<RecordingDrStream>>,
    replicated: Option<Arc<RecordingDrStream>>,
) -> ExecutionContext {
    init_tracing_for_tests();
    ExecutionContext::new(ContextConfig::default().with_partition_id(1)).with_dr_streams(
        dr_stream.map(|s| s as Arc<dyn DrTupleStream>),
        replicated.map(|s| s as Arc<dyn DrTupleStream>),
    )
}

#[test]
fn check_requires_an_active_transaction() {
    let stream = RecordingDrStream::started(0);
    let ctx = context(Some(Arc::clone(&stream)), None);

    let err = ctx.check_transaction_for_dr().unwrap_err();
    assert!(err.is_contract_violation());
    assert!(stream.checks().is_empty());
}

#[test]
fn started_stream_registers_rollback_on_first_write() {
    let stream = RecordingDrStream::started(128);
    let quantum = RecordingUndoQuantum::new(1);
    let mut ctx = context(Some(Arc::clone(&stream)), None);
    let unique_id = make_id(5_000, 1, MP_INIT_PID).unwrap();
    ctx.setup_for_plan_fragments(Some(quantum.clone()), 10, 20, 19, unique_id);

    ctx.check_transaction_for_dr().unwrap();
    assert_eq!(stream.checks(), vec![(19, 20, unique_id)]);
    assert_eq!(stream.open_transaction(), Some(unique_id));
    assert_eq!(quantum.pending(), 1);

    // Later writes of the same transaction find the record already open.
    ctx.check_transaction_for_dr().unwrap();
    assert_eq!(stream.checks().len(), 2);
    assert_eq!(quantum.pending(), 1);

    quantum.undo_all();
    assert_eq!(stream.rollbacks(), vec![128]);
    assert_eq!(stream.open_transaction(), None);
}

#[test]
fn commit_releases_without_rolling_back() {
    let stream = RecordingDrStream::started(64);
    let quantum = RecordingUndoQuantum::new(2);
    let mut ctx = context(Some(Arc::clone(&stream)), None);
    ctx.setup_for_plan_fragments(Some(quantum.clone()), 1, 1, 0, mp_unique_id(1));

    ctx.check_transaction_for_dr().unwrap();
    quantum.release_all();
    assert_eq!(quantum.pending(), 0);
    assert!(stream.rollbacks().is_empty());
}

#[test]
fn unstarted_and_missing_streams_are_skipped() {
    let stopped = RecordingDrStream::stopped();
    let replicated = RecordingDrStream::started(0);
    let quantum = RecordingUndoQuantum::new(3);
    let mut ctx = context(Some(Arc::clone(&stopped)), Some(Arc::clone(&replicated)));
    ctx.setup_for_plan_fragments(Some(quantum.clone()), 1, 2, 1, mp_unique_id(7));

    assert!(ctx.is_dr_enabled());
    ctx.check_transaction_for_dr().unwrap();
    assert!(stopped.checks().is_empty());
    assert_eq!(replicated.checks().len(), 1);
    assert_eq!(quantum.pending(), 1);

    let mut bare = context(None, None);
    bare.setup_for_plan_fragments(Some(quantum.clone()), 1, 2, 1, mp_unique_id(8));
    assert!(!bare.is_dr_enabled());
    bare.check_transaction_for_dr().unwrap();
    assert_eq!(quantum.pending(), 1);
}

#[test]
fn streams_can_be_started_after_install() {
    let stream = RecordingDrStream::stopped();
    let quantum = RecordingUndoQuantum::new(4);
    let mut ctx = context(None, None);
    ctx.set_dr_stream(Some(Arc::clone(&stream) as Arc<dyn DrTupleStream>));
    ctx.setup_for_plan_fragments(Some(quantum.clone()), 1, 1, 0, mp_unique_id(9));

    ctx.check_transaction_for_dr().unwrap();
    assert_eq!(quantum.pending(), 0);

    stream.set_started(true);
    ctx.check_transaction_for_dr().unwrap();
    assert_eq!(quantum.pending(), 1);
}

#[test]
fn check_is_a_no_op_while_replication_is_disabled() {
    let stopped = RecordingDrStream::stopped();
    let ctx = context(Some(Arc::clone(&stopped)), None);

    assert!(!ctx.is_dr_enabled());
    ctx.check_transaction_for_dr().unwrap();
    assert!(stopped.checks().is_empty());
}

#[test]
fn single_partition_transactions_are_left_to_the_stream() {
    let stream = RecordingDrStream::started(32);
    let quantum = RecordingUndoQuantum::new(5);
    let mut ctx = context(Some(Arc::clone(&stream)), None);
    ctx.setup_for_plan_fragments(Some(quantum.clone()), 1, 1, 0, make_id(11, 0, 1).unwrap());

    ctx.check_transaction_for_dr().unwrap();
    assert!(stream.checks().is_empty());
    assert_eq!(quantum.pending(), 0);

    // The gate still applies to single-partition writes.
    ctx.replace_undo_quantum(None);
    assert!(ctx.check_transaction_for_dr().unwrap_err().is_contract_violation());
}
