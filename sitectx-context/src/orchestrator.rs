//! Running executor lists and cleaning up the temp tables they produce.

use std::sync::Arc;

use sitectx_executor::{TempTableRef, TempTableResult};
use sitectx_result::{Error, Result};
use sitectx_types::{SubqueryId, TOP_LEVEL_STATEMENT_ID};

use crate::collaborators::FragmentProgress;
use crate::context::ExecutionContext;
use crate::executor::{ExecutorList, PlanExecutor};

impl ExecutionContext {
    /// Execute every executor of `executors` in order.
    ///
    /// Intermediate output tables are cleared before returning; the output of
    /// the last executor comes back inside a [`TempTableResult`], which clears
    /// it when dropped. If an executor fails, outputs are cleaned up (the whole
    /// statement for the top-level list, only this list for a subquery), every
    /// executor's memory pool is released and the error is returned.
    pub fn execute_executors(
        &mut self,
        executors: &ExecutorList,
        subquery_id: SubqueryId,
    ) -> Result<TempTableResult> {
        let Some(last) = executors.last() else {
            tracing::error!(subquery_id, "empty executor list");
            return Err(Error::contract_violation(format!(
                "executor list for statement {subquery_id} is empty"
            )));
        };
        let final_table = last.output_table().ok_or_else(|| {
            tracing::error!(subquery_id, executor = last.name(), "final executor has no output table");
            Error::contract_violation(format!(
                "final executor '{}' of statement {subquery_id} produces no output table",
                last.name()
            ))
        })?;

        let executor_count = executors.len();
        for (index, executor) in executors.iter().enumerate() {
            tracing::trace!(subquery_id, index, executor = executor.name(), "executing");
            if let Err(err) = executor.execute(self) {
                tracing::debug!(
                    subquery_id,
                    executor = executor.name(),
                    error = %err,
                    "executor failed; cleaning up temp tables"
                );
                if subquery_id == TOP_LEVEL_STATEMENT_ID {
                    self.cleanup_all_executors();
                } else {
                    self.cleanup_executors_for_subquery(executors);
                }
                for executor in executors.iter() {
                    executor.cleanup_memory_pool();
                }
                return Err(err);
            }
            self.report_progress(subquery_id, index, executor_count, &**executor);
        }

        for executor in &executors[..executor_count - 1] {
            executor.cleanup_temp_output();
        }

        Ok(TempTableResult::new(final_table))
    }

    /// Execute the executor list registered for `subquery_id`.
    pub fn execute_subquery(&mut self, subquery_id: SubqueryId) -> Result<TempTableResult> {
        let executors = self.executors_for(subquery_id)?;
        self.execute_executors(&executors, subquery_id)
    }

    /// Output table of the last executor registered for `subquery_id`.
    pub fn subquery_output_table(&self, subquery_id: SubqueryId) -> Result<TempTableRef> {
        let executors = self.executors_for(subquery_id)?;
        executors
            .last()
            .and_then(|executor| executor.output_table())
            .ok_or_else(|| {
                Error::contract_violation(format!(
                    "statement {subquery_id} has no executor producing an output table"
                ))
            })
    }

    /// Clear the output tables of every registered executor list (top-level
    /// statement and all subqueries) and drain the subquery cache.
    ///
    /// Called once at the end of every statement, whether it succeeded or not.
    pub fn cleanup_all_executors(&mut self) {
        if let Some(map) = self.executors.as_ref() {
            tracing::debug!(statements = map.len(), "cleaning up all executors");
            for (_, executors) in map.iter() {
                self.cleanup_executors_for_subquery(executors);
            }
        }
        self.subqueries.clear();
    }

    /// Clear the output tables of `executors`.
    pub fn cleanup_executors_for_subquery(&self, executors: &ExecutorList) {
        for executor in executors.iter() {
            executor.cleanup_temp_output();
        }
    }

    /// Clear the output tables of the list registered for `subquery_id`.
    pub fn cleanup_subquery(&self, subquery_id: SubqueryId) -> Result<()> {
        let executors = self.executors_for(subquery_id)?;
        self.cleanup_executors_for_subquery(&executors);
        Ok(())
    }

    /// True when no registered executor's output table holds rows.
    pub fn all_output_temp_tables_are_empty(&self) -> bool {
        let Some(map) = self.executors.as_ref() else {
            return true;
        };
        map.iter().all(|(_, executors)| {
            executors
                .iter()
                .filter_map(|executor| executor.output_table())
                .all(|table| table.is_empty())
        })
    }

    fn executors_for(&self, subquery_id: SubqueryId) -> Result<Arc<ExecutorList>> {
        let map = self.executors.as_ref().ok_or_else(|| {
            tracing::error!(subquery_id, "no executor table installed");
            Error::contract_violation(format!(
                "statement {subquery_id} requested before any executors were installed"
            ))
        })?;
        map.get(subquery_id).cloned().ok_or_else(|| {
            tracing::error!(subquery_id, "statement id not registered");
            Error::contract_violation(format!("no executors registered for statement {subquery_id}"))
        })
    }

    fn report_progress(
        &self,
        subquery_id: SubqueryId,
        executor_index: usize,
        executor_count: usize,
        executor: &dyn PlanExecutor,
    ) {
        let Some(topend) = self.topend.as_ref() else {
            return;
        };
        let output_tuples = executor
            .output_table()
            .map_or(0, |table| table.active_tuple_count());
        topend.fragment_progress(&FragmentProgress {
            subquery_id,
            executor_name: executor.name().to_string(),
            executor_index,
            executor_count,
            output_tuples,
        });
    }
}
