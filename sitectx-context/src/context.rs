//! The execution context aggregate.

use std::fmt;
use std::sync::Arc;

use sitectx_executor::{SubqueryCache, SubqueryContext};
use sitectx_result::{Error, Result};
use sitectx_types::dr_timestamp;
use sitectx_types::unique_id::txn_timestamp_millis;
use sitectx_types::{
    DrClusterId, HostId, ParamValue, ParameterSet, PartitionId, SiteId, SpHandle, SubqueryId,
    TxnId, UniqueId,
};

use crate::collaborators::{
    DrTupleStream, SharedCollaborators, SiteEngine, Topend, TransientPool, UndoQuantum,
};
use crate::config::ContextConfig;
use crate::executor::ExecutorsMap;
use crate::registry::ContextHandle;

/// Site-global state that executors reach at runtime.
///
/// One context exists per site. It is bound to whichever worker thread runs
/// that site's fragments (see [`ContextHandle::bind_to_thread`]) and carries:
///
/// - the site's identity (site, partition, host, DR cluster)
/// - the identifiers and derived timestamps of the transaction being run
/// - shared handles to the undo quantum, replication streams, host callbacks,
///   parameter array and engine object (all owned by the engine)
/// - the executor table of the current fragment and the subquery result cache
pub struct ExecutionContext {
    pub(crate) site_id: SiteId,
    pub(crate) partition_id: PartitionId,
    pub(crate) host_id: HostId,
    pub(crate) hostname: String,
    pub(crate) dr_cluster_id: DrClusterId,

    pub(crate) txn_id: TxnId,
    pub(crate) sp_handle: SpHandle,
    pub(crate) last_committed_sp_handle: SpHandle,
    pub(crate) unique_id: UniqueId,
    pub(crate) current_txn_timestamp: i64,
    pub(crate) current_dr_timestamp: i64,

    pub(crate) shared: Arc<SharedCollaborators>,
    pub(crate) topend: Option<Arc<dyn Topend>>,
    pub(crate) params: Arc<ParameterSet>,
    pub(crate) dr_stream: Option<Arc<dyn DrTupleStream>>,
    pub(crate) dr_replicated_stream: Option<Arc<dyn DrTupleStream>>,

    pub(crate) executors: Option<Arc<ExecutorsMap>>,
    pub(crate) subqueries: SubqueryCache,
}

impl ExecutionContext {
    /// Create a context with no transaction, no collaborators and an empty
    /// parameter array. Attach collaborators with the `with_*` methods.
    pub fn new(config: ContextConfig) -> Self {
        let ContextConfig {
            site_id,
            partition_id,
            host_id,
            hostname,
            dr_cluster_id,
        } = config;

        Self {
            site_id,
            partition_id,
            host_id,
            hostname,
            dr_cluster_id,
            txn_id: 0,
            sp_handle: 0,
            last_committed_sp_handle: 0,
            unique_id: 0,
            current_txn_timestamp: 0,
            current_dr_timestamp: 0,
            shared: Arc::new(SharedCollaborators::default()),
            topend: None,
            params: Arc::new(ParameterSet::default()),
            dr_stream: None,
            dr_replicated_stream: None,
            executors: None,
            subqueries: SubqueryCache::new(),
        }
    }

    pub fn with_topend(mut self, topend: Arc<dyn Topend>) -> Self {
        self.topend = Some(topend);
        self
    }

    pub fn with_temp_string_pool(self, pool: Arc<dyn TransientPool>) -> Self {
        self.shared.set_temp_string_pool(Some(pool));
        self
    }

    pub fn with_parameters(mut self, params: Arc<ParameterSet>) -> Self {
        self.params = params;
        self
    }

    pub fn with_engine(self, engine: Arc<dyn SiteEngine>) -> Self {
        self.shared.set_engine(Some(engine));
        self
    }

    pub fn with_dr_streams(
        mut self,
        dr_stream: Option<Arc<dyn DrTupleStream>>,
        dr_replicated_stream: Option<Arc<dyn DrTupleStream>>,
    ) -> Self {
        self.dr_stream = dr_stream;
        self.dr_replicated_stream = dr_replicated_stream;
        self
    }

    /// Wrap the context for sharing with the registry.
    pub fn into_handle(self) -> ContextHandle {
        ContextHandle::new(self)
    }

    // Partition assignment may be decided after the context exists.
    pub fn set_partition_id(&mut self, partition_id: PartitionId) {
        self.partition_id = partition_id;
    }

    // ------------------------------------------------------------------
    // Transaction & tick setup
    // ------------------------------------------------------------------

    /// Configure the context for the plan fragments of one transaction.
    ///
    /// Replaces the undo quantum, records the transaction identifiers and
    /// derives the transaction timestamp and DR hidden timestamp from
    /// `unique_id`. The last-committed marker only moves forward.
    pub fn setup_for_plan_fragments(
        &mut self,
        undo_quantum: Option<Arc<dyn UndoQuantum>>,
        txn_id: TxnId,
        sp_handle: SpHandle,
        last_committed_sp_handle: SpHandle,
        unique_id: UniqueId,
    ) {
        self.shared.set_undo_quantum(undo_quantum);
        self.txn_id = txn_id;
        self.sp_handle = sp_handle;
        self.advance_last_committed(last_committed_sp_handle);
        self.unique_id = unique_id;
        self.current_txn_timestamp = txn_timestamp_millis(unique_id);
        self.current_dr_timestamp = dr_timestamp::encode(self.dr_cluster_id, unique_id);

        tracing::trace!(
            site_id = self.site_id,
            partition_id = self.partition_id,
            txn_id,
            sp_handle,
            unique_id,
            last_committed = self.last_committed_sp_handle,
            "execution context set up for plan fragments"
        );
    }

    /// Replace only the undo quantum.
    ///
    /// The engine passes `None` once a transaction's undo quantum is released,
    /// which is how [`ExecutionContext::has_active_transaction`] learns that no
    /// transaction is running.
    pub fn replace_undo_quantum(&mut self, undo_quantum: Option<Arc<dyn UndoQuantum>>) {
        self.shared.set_undo_quantum(undo_quantum);
    }

    /// Periodic housekeeping outside fragment execution.
    pub fn setup_for_tick(&mut self, last_committed_sp_handle: SpHandle) {
        self.advance_last_committed(last_committed_sp_handle);
        self.sp_handle = self.sp_handle.max(last_committed_sp_handle);
    }

    /// Flush before shutdown or snapshot.
    pub fn setup_for_quiesce(&mut self, last_committed_sp_handle: SpHandle) {
        self.advance_last_committed(last_committed_sp_handle);
        self.sp_handle = self.sp_handle.max(last_committed_sp_handle);
    }

    /// Install the executor table for the fragment about to run.
    ///
    /// Subquery results cached by a previous statement must have been drained
    /// with [`ExecutionContext::cleanup_all_executors`] first; a non-empty cache
    /// is a [`Error::ContractViolation`] and leaves the installed table as is.
    pub fn setup_for_executors(&mut self, executors: Arc<ExecutorsMap>) -> Result<()> {
        if !self.subqueries.is_empty() {
            let cached: Vec<SubqueryId> = self.subqueries.subquery_ids().collect();
            tracing::error!(?cached, "executor table installed over cached subquery results");
            return Err(Error::contract_violation(format!(
                "cannot install executors while subquery results {cached:?} are still cached"
            )));
        }
        tracing::debug!(statements = executors.len(), "installing executor table");
        self.executors = Some(executors);
        Ok(())
    }

    fn advance_last_committed(&mut self, incoming: SpHandle) {
        if incoming < self.last_committed_sp_handle {
            tracing::trace!(
                current = self.last_committed_sp_handle,
                incoming,
                "ignoring stale last committed sp handle"
            );
        }
        self.last_committed_sp_handle = self.last_committed_sp_handle.max(incoming);
    }

    // ------------------------------------------------------------------
    // Subquery result cache
    // ------------------------------------------------------------------

    /// Cached context of `subquery_id`, or `None` if it has not run in this
    /// statement.
    pub fn subquery_context(&self, subquery_id: SubqueryId) -> Option<&SubqueryContext> {
        self.subqueries.get(subquery_id)
    }

    /// Record that `subquery_id` was evaluated with `last_params`.
    pub fn set_subquery_context(
        &mut self,
        subquery_id: SubqueryId,
        last_params: Vec<ParamValue>,
    ) -> Result<&SubqueryContext> {
        self.subqueries.put(subquery_id, last_params)
    }

    pub fn subquery_cache(&self) -> &SubqueryCache {
        &self.subqueries
    }

    pub fn subquery_cache_mut(&mut self) -> &mut SubqueryCache {
        &mut self.subqueries
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// DR cluster id of the local cluster.
    pub fn dr_cluster_id(&self) -> DrClusterId {
        self.dr_cluster_id
    }

    /// Current or most recent txn id. May go backwards due to multi-partition
    /// transactions.
    pub fn current_txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Current or most recent sp handle.
    pub fn current_sp_handle(&self) -> SpHandle {
        self.sp_handle
    }

    /// Last committed sp handle known to this site.
    pub fn last_committed_sp_handle(&self) -> SpHandle {
        self.last_committed_sp_handle
    }

    pub fn current_unique_id(&self) -> UniqueId {
        self.unique_id
    }

    /// Wall-clock milliseconds of the running transaction.
    pub fn current_txn_timestamp(&self) -> i64 {
        self.current_txn_timestamp
    }

    /// DR hidden timestamp for rows written by the running transaction.
    pub fn current_dr_timestamp(&self) -> i64 {
        self.current_dr_timestamp
    }

    pub fn current_undo_quantum(&self) -> Option<Arc<dyn UndoQuantum>> {
        self.shared.undo_quantum()
    }

    pub fn has_active_transaction(&self) -> bool {
        self.shared.has_undo_quantum()
    }

    pub fn topend(&self) -> Option<&Arc<dyn Topend>> {
        self.topend.as_ref()
    }

    pub fn temp_string_pool(&self) -> Option<Arc<dyn TransientPool>> {
        self.shared.temp_string_pool()
    }

    pub fn parameters(&self) -> &Arc<ParameterSet> {
        &self.params
    }

    pub fn engine(&self) -> Option<Arc<dyn SiteEngine>> {
        self.shared.engine()
    }

    /// Handles shared with the thread binding; readable without the context
    /// lock.
    pub fn shared_collaborators(&self) -> &Arc<SharedCollaborators> {
        &self.shared
    }

    pub fn executors(&self) -> Option<&Arc<ExecutorsMap>> {
        self.executors.as_ref()
    }

    pub fn set_dr_stream(&mut self, dr_stream: Option<Arc<dyn DrTupleStream>>) {
        self.dr_stream = dr_stream;
    }

    pub fn set_dr_replicated_stream(&mut self, dr_replicated_stream: Option<Arc<dyn DrTupleStream>>) {
        self.dr_replicated_stream = dr_replicated_stream;
    }

    pub fn dr_stream(&self) -> Option<&Arc<dyn DrTupleStream>> {
        self.dr_stream.as_ref()
    }

    pub fn dr_replicated_stream(&self) -> Option<&Arc<dyn DrTupleStream>> {
        self.dr_replicated_stream.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("site_id", &self.site_id)
            .field("partition_id", &self.partition_id)
            .field("host_id", &self.host_id)
            .field("hostname", &self.hostname)
            .field("dr_cluster_id", &self.dr_cluster_id)
            .field("txn_id", &self.txn_id)
            .field("sp_handle", &self.sp_handle)
            .field("last_committed_sp_handle", &self.last_committed_sp_handle)
            .field("unique_id", &self.unique_id)
            .field("active_transaction", &self.has_active_transaction())
            .field("cached_subqueries", &self.subqueries.len())
            .finish()
    }
}
