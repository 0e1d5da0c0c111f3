//! Per-partition execution context.
//!
//! An [`ExecutionContext`] is the state a worker thread carries while it runs
//! query fragments for one site: the site's identity, the identifiers and
//! timestamps of the running transaction, shared handles to externally owned
//! subsystems (undo log, replication streams, host callbacks, parameters,
//! engine), the executor table of the current fragment and the subquery result
//! cache.
//!
//! # Lifecycle
//!
//! 1. The engine builds a context per site and wraps it in a [`ContextHandle`].
//! 2. Before dispatching work to a worker thread it calls
//!    [`ContextHandle::bind_to_thread`].
//! 3. Per transaction it calls
//!    [`ExecutionContext::setup_for_plan_fragments`], then per fragment
//!    [`ExecutionContext::setup_for_executors`].
//! 4. Executors run through [`ExecutionContext::execute_executors`]; the final
//!    result comes back as a [`TempTableResult`](sitectx_executor::TempTableResult).
//! 5. [`ExecutionContext::cleanup_all_executors`] ends every statement.
//!
//! # Module Organization
//!
//! - [`context`]: the aggregate and its setup operations
//! - [`orchestrator`]: running executor lists and temp table cleanup
//! - [`dr`]: replication bookkeeping before replicated writes
//! - [`registry`]: thread binding
//! - [`executor`]: the [`PlanExecutor`] boundary and [`ExecutorsMap`]
//! - [`collaborators`]: traits of the externally owned subsystems
//! - [`config`]: site identity configuration

pub mod collaborators;
pub mod config;
pub mod context;
pub mod dr;
pub mod executor;
pub mod orchestrator;
pub mod registry;

pub use collaborators::{
    DrStreamUndoAction, DrTupleStream, FragmentProgress, SharedCollaborators, SiteEngine, Topend,
    TransientPool, UndoAction, UndoQuantum,
};
pub use config::ContextConfig;
pub use context::ExecutionContext;
pub use executor::{ExecutorList, ExecutorsMap, PlanExecutor};
pub use registry::{
    ContextHandle, ContextRegistry, current_context, current_engine, current_temp_string_pool,
    current_undo_quantum,
};
