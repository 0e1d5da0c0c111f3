#![forbid(unsafe_code)]

//! End-to-end: an engine thread dispatching two transactions to a worker.

use std::sync::Arc;
use std::thread;

use sitectx::unique_id::{MP_INIT_PID, make_id};
use sitectx::{
    ContextConfig, DrTupleStream, ExecutionContext, ExecutorList, ExecutorsMap, ParamValue,
    ParameterSet, PlanExecutor, TOP_LEVEL_STATEMENT_ID, TempTable, current_context, dr_timestamp,
};
use sitectx_test_utils::fixtures::{
    RecordingDrStream, RecordingUndoQuantum, RowsExecutor, SubqueryScanExecutor,
};

#[test]
fn worker_runs_fragments_of_consecutive_transactions() {
    let params = Arc::new(ParameterSet::new(vec![ParamValue::Integer(0)]));
    let stream = RecordingDrStream::started(256);
    let handle = ExecutionContext::new(
        ContextConfig::default()
            .with_site_id(0x0002_0001)
            .with_partition_id(1)
            .with_dr_cluster_id(7),
    )
    .with_parameters(Arc::clone(&params))
    .with_dr_streams(Some(Arc::clone(&stream) as Arc<dyn DrTupleStream>), None)
    .into_handle();

    let sub = RowsExecutor::offset_by_parameter("sub", 2, 0);
    let scan = SubqueryScanExecutor::new("scan_sub", 1);
    let top: ExecutorList = vec![Arc::clone(&scan) as Arc<dyn PlanExecutor>];
    let map = Arc::new(
        ExecutorsMap::new()
            .with_list(TOP_LEVEL_STATEMENT_ID, top)
            .with_list(1, vec![Arc::clone(&sub) as Arc<dyn PlanExecutor>]),
    );

    for (round, txn_id) in [(0i64, 100i64), (1, 101)] {
        let quantum = RecordingUndoQuantum::new(txn_id);
        let unique_id = make_id(10_000 + round, 0, MP_INIT_PID).unwrap();
        params.replace(vec![ParamValue::Integer(round * 10)]);

        let worker = {
            let handle = handle.clone();
            let quantum = Arc::clone(&quantum);
            let map = Arc::clone(&map);
            thread::spawn(move || -> sitectx::Result<(i64, usize)> {
                handle.bind_to_thread();
                let current = current_context()?;
                let mut ctx = current.lock()?;
                ctx.setup_for_plan_fragments(Some(quantum), txn_id, txn_id, txn_id - 1, unique_id);
                ctx.setup_for_executors(map)?;
                ctx.check_transaction_for_dr()?;

                let rows = {
                    let result = ctx.execute_subquery(TOP_LEVEL_STATEMENT_ID)?;
                    result.active_tuple_count()
                };
                ctx.cleanup_all_executors();
                assert!(ctx.all_output_temp_tables_are_empty());
                Ok((ctx.current_dr_timestamp(), rows))
            })
        };

        let (dr, rows) = worker.join().unwrap().unwrap();
        assert_eq!(rows, 1);
        assert_eq!(dr, dr_timestamp::encode(7, unique_id));
        assert_eq!(sub.runs() as i64, round + 1);
        assert!(sub.table().is_empty());
        assert!(scan.table().is_empty());
        assert_eq!(quantum.pending(), 1);
        quantum.release_all();
    }

    assert_eq!(stream.checks().len(), 2);
    assert!(stream.rollbacks().is_empty());
    assert_eq!(
        handle.with(|ctx| ctx.last_committed_sp_handle()).unwrap(),
        100
    );
}
