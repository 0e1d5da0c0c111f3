//! Executor-side building blocks used by the execution context.
//!
//! # Module Organization
//!
//! - [`temp_table`]: the [`TempTable`] contract and the Arrow-backed
//!   [`BatchTempTable`]
//! - [`result`]: [`TempTableResult`], the guard that releases a temp table's
//!   rows when the final result of an executor list goes out of scope
//! - [`subquery`]: the per-statement subquery result cache

pub mod result;
pub mod subquery;
pub mod temp_table;

pub use result::TempTableResult;
pub use subquery::{CacheInsert, SubqueryCache, SubqueryContext};
pub use temp_table::{BatchTempTable, TempTable, TempTableRef};
