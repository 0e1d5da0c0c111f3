//! Per-statement cache of evaluated subqueries.
//!
//! When a statement references the same subquery several times, the first
//! evaluation records the parameter values it ran with. Later references
//! compare the current parameters against that snapshot and reuse the output
//! table when nothing changed. The cache is drained at the statement boundary
//! by the execution context; it has no cleanup logic of its own.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use sitectx_result::{Error, Result};
use sitectx_types::{ParamValue, SubqueryId};

/// Parameter snapshot taken when a subquery was first evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct SubqueryContext {
    last_params: Vec<ParamValue>,
}

impl SubqueryContext {
    pub fn new(last_params: Vec<ParamValue>) -> Self {
        Self { last_params }
    }

    pub fn last_params(&self) -> &[ParamValue] {
        &self.last_params
    }

    /// True when `current` equals the snapshot, i.e. the cached output table
    /// is still valid.
    pub fn params_match(&self, current: &[ParamValue]) -> bool {
        self.last_params.as_slice() == current
    }

    /// Replace the snapshot after the subquery was re-evaluated.
    pub fn set_last_params(&mut self, last_params: Vec<ParamValue>) {
        self.last_params = last_params;
    }
}

/// Outcome of [`SubqueryCache::insert`].
#[derive(Debug)]
pub enum CacheInsert<'a> {
    /// A new entry was created from the supplied parameters.
    Inserted(&'a SubqueryContext),
    /// An entry already existed; it was left untouched.
    AlreadyPresent(&'a SubqueryContext),
}

impl<'a> CacheInsert<'a> {
    pub fn is_inserted(&self) -> bool {
        matches!(self, CacheInsert::Inserted(_))
    }

    pub fn context(&self) -> &'a SubqueryContext {
        match self {
            CacheInsert::Inserted(ctx) | CacheInsert::AlreadyPresent(ctx) => ctx,
        }
    }
}

#[derive(Debug, Default)]
pub struct SubqueryCache {
    entries: FxHashMap<SubqueryId, SubqueryContext>,
}

impl SubqueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `subquery_id`, or `None` when it was not evaluated yet.
    pub fn get(&self, subquery_id: SubqueryId) -> Option<&SubqueryContext> {
        self.entries.get(&subquery_id)
    }

    /// Snapshot `params` for `subquery_id` unless an entry already exists.
    pub fn insert(&mut self, subquery_id: SubqueryId, params: Vec<ParamValue>) -> CacheInsert<'_> {
        match self.entries.entry(subquery_id) {
            Entry::Occupied(existing) => CacheInsert::AlreadyPresent(existing.into_mut()),
            Entry::Vacant(slot) => CacheInsert::Inserted(slot.insert(SubqueryContext::new(params))),
        }
    }

    /// Like [`SubqueryCache::insert`], but a second insert for the same id
    /// within one statement is a [`Error::ContractViolation`].
    pub fn put(
        &mut self,
        subquery_id: SubqueryId,
        params: Vec<ParamValue>,
    ) -> Result<&SubqueryContext> {
        match self.insert(subquery_id, params) {
            CacheInsert::Inserted(ctx) => Ok(ctx),
            CacheInsert::AlreadyPresent(_) => {
                tracing::error!(subquery_id, "subquery result cached twice in one statement");
                Err(Error::contract_violation(format!(
                    "subquery {subquery_id} already has a cached result in this statement"
                )))
            }
        }
    }

    /// Record that `subquery_id` was re-evaluated with `params`, replacing a
    /// stale snapshot or creating the entry if none exists.
    pub fn refresh(&mut self, subquery_id: SubqueryId, params: Vec<ParamValue>) -> &SubqueryContext {
        match self.entries.entry(subquery_id) {
            Entry::Occupied(existing) => {
                let ctx = existing.into_mut();
                tracing::trace!(subquery_id, "refreshing stale subquery parameters");
                ctx.set_last_params(params);
                ctx
            }
            Entry::Vacant(slot) => slot.insert(SubqueryContext::new(params)),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn subquery_ids(&self) -> impl Iterator<Item = SubqueryId> + '_ {
        self.entries.keys().copied()
    }
}
