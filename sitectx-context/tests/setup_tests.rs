#![forbid(unsafe_code)]

//! Transaction and tick setup: derived timestamps and the monotonic
//! last-committed marker.

use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::SmallRng};
use sitectx_context::{ContextConfig, ExecutionContext, UndoQuantum};
use sitectx_test_utils::fixtures::RecordingUndoQuantum;
use sitectx_test_utils::init_tracing_for_tests;
use sitectx_types::dr_timestamp::{decode_cluster_id, decode_logical_clock};
use sitectx_types::unique_id::{EPOCH_MILLIS, make_id, ts_counter_since_unix_epoch};

fn context(cluster: u8) -> ExecutionContext {
    init_tracing_for_tests();
    ExecutionContext::new(
        ContextConfig::default()
            .with_site_id(0x0001_0002)
            .with_partition_id(2)
            .with_dr_cluster_id(cluster),
    )
}

#[test]
fn new_context_has_no_transaction() {
    let ctx = context(0);
    assert!(!ctx.has_active_transaction());
    assert!(ctx.current_undo_quantum().is_none());
    assert_eq!(ctx.current_txn_id(), 0);
    assert_eq!(ctx.last_committed_sp_handle(), 0);
    assert!(ctx.executors().is_none());
    assert!(ctx.subquery_cache().is_empty());
}

#[test]
fn fragment_setup_encodes_the_dr_timestamp() {
    let mut ctx = context(3);
    let unique_id = 0x1F4000000000000;
    ctx.setup_for_plan_fragments(Some(RecordingUndoQuantum::new(9)), 100, 200, 150, unique_id);

    assert_eq!(ctx.current_undo_quantum().map(|q| q.undo_token()), Some(9));
    assert_eq!(ctx.current_txn_timestamp(), (unique_id >> 23) + EPOCH_MILLIS);
    let dr = ctx.current_dr_timestamp();
    assert_eq!(decode_cluster_id(dr), 3);
    assert_eq!(
        decode_logical_clock(dr),
        ts_counter_since_unix_epoch(unique_id >> 14)
    );
}

#[test]
fn fragment_setup_without_quantum_means_no_transaction() {
    let mut ctx = context(1);
    let unique_id = make_id(1_000, 0, 2).unwrap();
    ctx.setup_for_plan_fragments(None, 5, 6, 4, unique_id);
    assert!(!ctx.has_active_transaction());
    assert_eq!(ctx.current_unique_id(), unique_id);

    let quantum: Arc<dyn UndoQuantum> = RecordingUndoQuantum::new(1);
    ctx.replace_undo_quantum(Some(quantum));
    assert!(ctx.has_active_transaction());
    assert_eq!(ctx.current_txn_id(), 5);
    assert_eq!(ctx.current_sp_handle(), 6);
}

#[test]
fn last_committed_never_moves_backwards() {
    let mut rng = SmallRng::seed_from_u64(0x5EED_0001);
    let mut ctx = context(2);
    let mut high_water = 0;

    for round in 0..2_000 {
        let incoming = rng.random_range(0..10_000i64);
        let sp_before = ctx.current_sp_handle();
        match rng.random_range(0..3) {
            0 => {
                let sp_handle = rng.random_range(0..10_000i64);
                let unique_id = make_id(rng.random_range(0..1_000_000), 0, 2).unwrap();
                ctx.setup_for_plan_fragments(None, round, sp_handle, incoming, unique_id);
                assert_eq!(ctx.current_sp_handle(), sp_handle);
            }
            1 => {
                ctx.setup_for_tick(incoming);
                assert_eq!(ctx.current_sp_handle(), sp_before.max(incoming));
            }
            _ => {
                ctx.setup_for_quiesce(incoming);
                assert_eq!(ctx.current_sp_handle(), sp_before.max(incoming));
            }
        }
        high_water = high_water.max(incoming);
        assert_eq!(ctx.last_committed_sp_handle(), high_water);
    }
}

#[test]
fn identity_comes_from_config() {
    let ctx = ExecutionContext::new(
        ContextConfig::default()
            .with_site_id(77)
            .with_partition_id(4)
            .with_host_id(9)
            .with_hostname("db-4")
            .with_dr_cluster_id(12),
    );
    assert_eq!(ctx.site_id(), 77);
    assert_eq!(ctx.partition_id(), 4);
    assert_eq!(ctx.host_id(), 9);
    assert_eq!(ctx.hostname(), "db-4");
    assert_eq!(ctx.dr_cluster_id(), 12);
}
