//! sitectx: per-site execution context for a partitioned transactional SQL
//! engine.
//!
//! This crate is the entrypoint of the workspace. It re-exports the context,
//! the executor-side building blocks and the identifier codecs from the
//! underlying `sitectx-*` crates.
//!
//! # Quick Start
//!
//! Bind a context to the worker thread, set up a transaction and run the
//! top-level executor list of a fragment:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use sitectx::{
//!     ContextConfig, ExecutionContext, ExecutorsMap, PlanExecutor, Result, TempTable,
//!     TempTableRef, TOP_LEVEL_STATEMENT_ID,
//! };
//!
//! #[derive(Debug, Default)]
//! struct Rows(AtomicUsize);
//!
//! impl TempTable for Rows {
//!     fn name(&self) -> &str {
//!         "rows"
//!     }
//!     fn active_tuple_count(&self) -> usize {
//!         self.0.load(Ordering::SeqCst)
//!     }
//!     fn delete_all_tuples(&self) {
//!         self.0.store(0, Ordering::SeqCst);
//!     }
//! }
//!
//! struct Scan(Arc<Rows>);
//!
//! impl PlanExecutor for Scan {
//!     fn name(&self) -> &str {
//!         "scan"
//!     }
//!     fn execute(&self, _ctx: &mut ExecutionContext) -> Result<()> {
//!         self.0.0.fetch_add(3, Ordering::SeqCst);
//!         Ok(())
//!     }
//!     fn output_table(&self) -> Option<TempTableRef> {
//!         Some(self.0.clone())
//!     }
//! }
//!
//! let output = Arc::new(Rows::default());
//! let scan: Arc<dyn PlanExecutor> = Arc::new(Scan(Arc::clone(&output)));
//! let map = ExecutorsMap::new().with_list(TOP_LEVEL_STATEMENT_ID, vec![scan]);
//!
//! let handle = ExecutionContext::new(ContextConfig::default().with_site_id(1)).into_handle();
//! handle.bind_to_thread();
//!
//! let current = sitectx::current_context()?;
//! let mut ctx = current.lock()?;
//! ctx.setup_for_plan_fragments(None, 1, 1, 0, 0);
//! ctx.setup_for_executors(Arc::new(map))?;
//! {
//!     let result = ctx.execute_subquery(TOP_LEVEL_STATEMENT_ID)?;
//!     assert_eq!(result.active_tuple_count(), 3);
//! }
//! // The result guard released the rows when it went out of scope.
//! assert_eq!(output.active_tuple_count(), 0);
//! ctx.cleanup_all_executors();
//! # Ok::<(), sitectx::Error>(())
//! ```
//!
//! # Architecture
//!
//! - **Context** (`sitectx-context`): the [`ExecutionContext`] aggregate,
//!   thread binding, transaction setup, executor orchestration and DR checks.
//! - **Executor support** (`sitectx-executor`): temp tables, the
//!   [`TempTableResult`] guard and the subquery cache.
//! - **Types** (`sitectx-types`): identifiers, the unique id layout and the DR
//!   hidden timestamp codec.
//! - **Errors** (`sitectx-result`): the shared [`Error`] and [`Result`].

pub use sitectx_context::{
    ContextConfig, ContextHandle, ContextRegistry, DrStreamUndoAction, DrTupleStream,
    ExecutionContext, ExecutorList, ExecutorsMap, FragmentProgress, PlanExecutor,
    SharedCollaborators, SiteEngine, Topend, TransientPool, UndoAction, UndoQuantum,
    current_context, current_engine, current_temp_string_pool, current_undo_quantum,
};

pub use sitectx_executor::{
    BatchTempTable, CacheInsert, SubqueryCache, SubqueryContext, TempTable, TempTableRef,
    TempTableResult,
};

pub use sitectx_result::{Error, Result};

pub use sitectx_types::{
    DrClusterId, HostId, ParamValue, ParameterSet, PartitionId, SiteId, SpHandle, SubqueryId,
    TOP_LEVEL_STATEMENT_ID, TxnId, UndoToken, UniqueId, dr_timestamp, unique_id,
};
