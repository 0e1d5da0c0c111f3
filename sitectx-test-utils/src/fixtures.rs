//! In-memory collaborators and executors for exercising an
//! [`ExecutionContext`] without an engine.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use sitectx_context::{
    DrTupleStream, ExecutionContext, FragmentProgress, PlanExecutor, Topend, UndoAction,
    UndoQuantum,
};
use sitectx_executor::{BatchTempTable, TempTable, TempTableRef};
use sitectx_result::{Error, Result};
use sitectx_types::{ParamValue, SpHandle, SubqueryId, UndoToken, UniqueId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Schema of every fixture output table: a single non-null `Int64` column.
pub fn value_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new("value", DataType::Int64, false)]))
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Undo quantum that keeps registered actions until told to undo or release
/// them.
pub struct RecordingUndoQuantum {
    token: UndoToken,
    actions: Mutex<Vec<Box<dyn UndoAction>>>,
}

impl RecordingUndoQuantum {
    pub fn new(token: UndoToken) -> Arc<Self> {
        Arc::new(Self {
            token,
            actions: Mutex::new(Vec::new()),
        })
    }

    pub fn pending(&self) -> usize {
        lock(&self.actions).len()
    }

    /// Undo registered actions in reverse registration order.
    pub fn undo_all(&self) {
        let actions = std::mem::take(&mut *lock(&self.actions));
        for action in actions.into_iter().rev() {
            action.undo();
        }
    }

    pub fn release_all(&self) {
        let actions = std::mem::take(&mut *lock(&self.actions));
        for action in actions {
            action.release();
        }
    }
}

impl fmt::Debug for RecordingUndoQuantum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingUndoQuantum")
            .field("token", &self.token)
            .field("pending", &self.pending())
            .finish()
    }
}

impl UndoQuantum for RecordingUndoQuantum {
    fn undo_token(&self) -> UndoToken {
        self.token
    }

    fn register_undo_action(&self, action: Box<dyn UndoAction>) {
        lock(&self.actions).push(action);
    }
}

/// DR stream that opens one transaction record per unique id and remembers
/// every rollback.
#[derive(Debug, Default)]
pub struct RecordingDrStream {
    started: AtomicBool,
    committed_uso: AtomicUsize,
    open_txn: Mutex<Option<UniqueId>>,
    checks: Mutex<Vec<(SpHandle, SpHandle, UniqueId)>>,
    rollbacks: Mutex<Vec<usize>>,
}

impl RecordingDrStream {
    pub fn started(committed_uso: usize) -> Arc<Self> {
        let stream = Self::default();
        stream.started.store(true, Ordering::SeqCst);
        stream.committed_uso.store(committed_uso, Ordering::SeqCst);
        Arc::new(stream)
    }

    pub fn stopped() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::SeqCst);
    }

    /// Arguments of every `transaction_checks` call, in call order.
    pub fn checks(&self) -> Vec<(SpHandle, SpHandle, UniqueId)> {
        lock(&self.checks).clone()
    }

    pub fn rollbacks(&self) -> Vec<usize> {
        lock(&self.rollbacks).clone()
    }

    pub fn open_transaction(&self) -> Option<UniqueId> {
        *lock(&self.open_txn)
    }
}

impl DrTupleStream for RecordingDrStream {
    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn committed_uso(&self) -> usize {
        self.committed_uso.load(Ordering::SeqCst)
    }

    fn transaction_checks(
        &self,
        last_committed_sp_handle: SpHandle,
        sp_handle: SpHandle,
        unique_id: UniqueId,
    ) -> bool {
        lock(&self.checks).push((last_committed_sp_handle, sp_handle, unique_id));
        let mut open = lock(&self.open_txn);
        if *open == Some(unique_id) {
            return false;
        }
        *open = Some(unique_id);
        true
    }

    fn rollback_to(&self, uso: usize) {
        lock(&self.rollbacks).push(uso);
        *lock(&self.open_txn) = None;
    }
}

/// Topend that stores every progress report.
#[derive(Debug, Default)]
pub struct RecordingTopend {
    reports: Mutex<Vec<FragmentProgress>>,
}

impl RecordingTopend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reports(&self) -> Vec<FragmentProgress> {
        lock(&self.reports).clone()
    }
}

impl Topend for RecordingTopend {
    fn fragment_progress(&self, progress: &FragmentProgress) {
        lock(&self.reports).push(progress.clone());
    }
}

// ---------------------------------------------------------------------------
// Executors
// ---------------------------------------------------------------------------

/// Writes `rows` integer rows `0..rows` to its own output table on every run.
///
/// With [`RowsExecutor::offset_by_parameter`] each value is shifted by the
/// integer parameter at the given index.
pub struct RowsExecutor {
    name: String,
    rows: usize,
    offset_param: Option<usize>,
    table: Arc<BatchTempTable>,
    runs: AtomicUsize,
    pool_cleanups: AtomicUsize,
}

impl RowsExecutor {
    pub fn new(name: impl Into<String>, rows: usize) -> Arc<Self> {
        Arc::new(Self::build(name.into(), rows, None))
    }

    pub fn offset_by_parameter(name: impl Into<String>, rows: usize, index: usize) -> Arc<Self> {
        Arc::new(Self::build(name.into(), rows, Some(index)))
    }

    fn build(name: String, rows: usize, offset_param: Option<usize>) -> Self {
        let table = Arc::new(BatchTempTable::new(format!("{name}_output"), value_schema()));
        Self {
            name,
            rows,
            offset_param,
            table,
            runs: AtomicUsize::new(0),
            pool_cleanups: AtomicUsize::new(0),
        }
    }

    pub fn table(&self) -> &Arc<BatchTempTable> {
        &self.table
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn pool_cleanups(&self) -> usize {
        self.pool_cleanups.load(Ordering::SeqCst)
    }
}

impl PlanExecutor for RowsExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let offset = match self.offset_param {
            None => 0,
            Some(index) => match ctx.parameters().get(index) {
                Some(ParamValue::Integer(value)) => value,
                other => {
                    return Err(Error::InvalidArgumentError(format!(
                        "parameter {index} is not an integer: {other:?}"
                    )));
                }
            },
        };
        let values = Int64Array::from_iter_values((0..self.rows as i64).map(|v| v + offset));
        let batch = RecordBatch::try_new(value_schema(), vec![Arc::new(values) as ArrayRef])?;
        self.table.append(batch)
    }

    fn output_table(&self) -> Option<TempTableRef> {
        Some(Arc::clone(&self.table) as TempTableRef)
    }

    fn cleanup_memory_pool(&self) {
        self.pool_cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fails every run with an internal error.
pub struct FailingExecutor {
    name: String,
    table: Arc<BatchTempTable>,
    pool_cleanups: AtomicUsize,
}

impl FailingExecutor {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        let table = Arc::new(BatchTempTable::new(format!("{name}_output"), value_schema()));
        Arc::new(Self {
            name,
            table,
            pool_cleanups: AtomicUsize::new(0),
        })
    }

    pub fn pool_cleanups(&self) -> usize {
        self.pool_cleanups.load(Ordering::SeqCst)
    }
}

impl PlanExecutor for FailingExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Err(Error::internal(format!("executor '{}' failed", self.name)))
    }

    fn output_table(&self) -> Option<TempTableRef> {
        Some(Arc::clone(&self.table) as TempTableRef)
    }

    fn cleanup_memory_pool(&self) {
        self.pool_cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs a subquery through the context and writes the subquery's row count to
/// its own output.
///
/// The subquery is evaluated at most once per statement as long as the
/// parameters do not change: the first evaluation caches a parameter snapshot
/// and keeps the subquery's output table alive until statement cleanup. When
/// the parameters changed, the old output is cleared, the subquery re-runs and
/// the snapshot is refreshed.
pub struct SubqueryScanExecutor {
    name: String,
    subquery_id: SubqueryId,
    table: Arc<BatchTempTable>,
}

impl SubqueryScanExecutor {
    pub fn new(name: impl Into<String>, subquery_id: SubqueryId) -> Arc<Self> {
        let name = name.into();
        let table = Arc::new(BatchTempTable::new(format!("{name}_output"), value_schema()));
        Arc::new(Self {
            name,
            subquery_id,
            table,
        })
    }

    pub fn table(&self) -> &Arc<BatchTempTable> {
        &self.table
    }
}

impl PlanExecutor for SubqueryScanExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let params = ctx.parameters().snapshot();
        let cached = ctx
            .subquery_context(self.subquery_id)
            .map(|cached| cached.params_match(&params));

        let subquery_rows = if cached == Some(true) {
            ctx.subquery_output_table(self.subquery_id)?.active_tuple_count()
        } else {
            if cached.is_some() {
                // Stale: drop the rows of the previous evaluation first.
                ctx.cleanup_subquery(self.subquery_id)?;
            }
            let result = ctx.execute_subquery(self.subquery_id)?;
            let rows = result.active_tuple_count();
            // Rows stay until the statement-level cleanup so later references
            // can reuse them.
            result.release();
            ctx.subquery_cache_mut().refresh(self.subquery_id, params);
            rows
        };

        let values = Int64Array::from(vec![subquery_rows as i64]);
        let batch = RecordBatch::try_new(value_schema(), vec![Arc::new(values) as ArrayRef])?;
        self.table.append(batch)
    }

    fn output_table(&self) -> Option<TempTableRef> {
        Some(Arc::clone(&self.table) as TempTableRef)
    }
}

/// Executor without an output table, for exercising list validation.
pub struct SinkExecutor {
    name: String,
}

impl SinkExecutor {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }
}

impl PlanExecutor for SinkExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Ok(())
    }

    fn output_table(&self) -> Option<TempTableRef> {
        None
    }
}
