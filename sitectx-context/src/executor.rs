//! The operator-tree boundary: what the orchestrator needs from a plan
//! executor, and the statement-id → executor-list table installed per fragment.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use sitectx_executor::TempTableRef;
use sitectx_result::Result;
use sitectx_types::{SubqueryId, TOP_LEVEL_STATEMENT_ID};

use crate::context::ExecutionContext;

/// One node of a compiled plan.
///
/// The planner orders executor lists so every child runs before its parent;
/// the orchestrator simply runs them front to back. Executors receive the
/// context mutably so they can run subqueries and consult the subquery cache.
/// Any per-run state they keep lives behind interior mutability, because the
/// same executor list may be run several times in one statement.
pub trait PlanExecutor: Send + Sync {
    /// Name used in logs and progress reports.
    fn name(&self) -> &str;

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<()>;

    /// Temp table this executor writes its rows to, if any.
    fn output_table(&self) -> Option<TempTableRef>;

    /// Release the rows of the output table.
    fn cleanup_temp_output(&self) {
        if let Some(table) = self.output_table() {
            table.delete_all_tuples();
        }
    }

    /// Release scratch memory held by the executor (and its inline children).
    /// Called after a failed run, when the executor may not have reached its own
    /// cleanup.
    fn cleanup_memory_pool(&self) {}
}

/// Executors of one statement, in execution order.
pub type ExecutorList = Vec<Arc<dyn PlanExecutor>>;

/// Executor lists of a fragment keyed by statement id; `0` is the top-level
/// statement and every subquery has its own id.
#[derive(Default)]
pub struct ExecutorsMap {
    lists: FxHashMap<SubqueryId, Arc<ExecutorList>>,
}

impl ExecutorsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `list` for `subquery_id`, returning any list it replaces.
    pub fn insert(
        &mut self,
        subquery_id: SubqueryId,
        list: ExecutorList,
    ) -> Option<Arc<ExecutorList>> {
        self.lists.insert(subquery_id, Arc::new(list))
    }

    pub fn with_list(mut self, subquery_id: SubqueryId, list: ExecutorList) -> Self {
        self.insert(subquery_id, list);
        self
    }

    pub fn get(&self, subquery_id: SubqueryId) -> Option<&Arc<ExecutorList>> {
        self.lists.get(&subquery_id)
    }

    pub fn top_level(&self) -> Option<&Arc<ExecutorList>> {
        self.get(TOP_LEVEL_STATEMENT_ID)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubqueryId, &Arc<ExecutorList>)> {
        self.lists.iter().map(|(id, list)| (*id, list))
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

impl std::fmt::Debug for ExecutorsMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (id, list) in &self.lists {
            let names: Vec<&str> = list.iter().map(|executor| executor.name()).collect();
            map.entry(id, &names);
        }
        map.finish()
    }
}
