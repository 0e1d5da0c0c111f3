//! Contracts of the subsystems the execution context references but does not
//! own: the undo log, replication streams, the host callback surface, the
//! engine object and the transient string pool.
//!
//! The context stores shared handles to these and forwards them to operators.
//! It never tears them down; the engine keeps its own handles and decides when
//! they go away.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

use sitectx_types::{SpHandle, SubqueryId, UndoToken, UniqueId};

/// Work to perform if the current transaction rolls back, or to forget if it
/// commits.
pub trait UndoAction: Send {
    fn undo(self: Box<Self>);

    fn release(self: Box<Self>);
}

/// Active scope of undo records for the running transaction.
///
/// The context holds at most one at a time; holding none means no transaction
/// is active.
pub trait UndoQuantum: Send + Sync + fmt::Debug {
    fn undo_token(&self) -> UndoToken;

    fn register_undo_action(&self, action: Box<dyn UndoAction>);
}

/// Writer for a replication (DR) stream.
///
/// The context does not write rows; it only runs the stream's transaction
/// bookkeeping before the first replicated write of a transaction.
pub trait DrTupleStream: Send + Sync + fmt::Debug {
    /// True once replication has been enabled for this stream.
    fn is_started(&self) -> bool;

    /// Byte offset of the last committed transaction in the stream.
    fn committed_uso(&self) -> usize;

    /// Open the stream's transaction record for `unique_id` if it is not open
    /// yet. Returns `true` when a new transaction was opened, in which case the
    /// caller must arrange for [`DrTupleStream::rollback_to`] on undo.
    fn transaction_checks(
        &self,
        last_committed_sp_handle: SpHandle,
        sp_handle: SpHandle,
        unique_id: UniqueId,
    ) -> bool;

    /// Discard everything written after `uso`.
    fn rollback_to(&self, uso: usize);
}

/// Progress report sent to the host after each executor finishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentProgress {
    pub subquery_id: SubqueryId,
    pub executor_name: String,
    pub executor_index: usize,
    pub executor_count: usize,
    pub output_tuples: usize,
}

/// Callback surface of the host process.
pub trait Topend: Send + Sync {
    fn fragment_progress(&self, _progress: &FragmentProgress) {}
}

/// Engine object handed to operators. Opaque to the context.
pub trait SiteEngine: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Arena for strings that only live as long as the current fragment.
pub trait TransientPool: Send + Sync {
    fn allocated_bytes(&self) -> usize;

    fn purge(&self);
}

/// Collaborator handles that operator code reaches through the thread binding
/// while a fragment is running.
///
/// They live beside the context lock rather than under it: the thread running a
/// fragment holds the lock for the whole fragment, and storage or expression
/// code deep inside an executor still needs the undo quantum, engine and
/// string pool without a `&mut ExecutionContext` in hand.
#[derive(Default)]
pub struct SharedCollaborators {
    undo_quantum: RwLock<Option<Arc<dyn UndoQuantum>>>,
    engine: RwLock<Option<Arc<dyn SiteEngine>>>,
    temp_string_pool: RwLock<Option<Arc<dyn TransientPool>>>,
}

impl SharedCollaborators {
    pub fn undo_quantum(&self) -> Option<Arc<dyn UndoQuantum>> {
        read_slot(&self.undo_quantum)
    }

    pub fn engine(&self) -> Option<Arc<dyn SiteEngine>> {
        read_slot(&self.engine)
    }

    pub fn temp_string_pool(&self) -> Option<Arc<dyn TransientPool>> {
        read_slot(&self.temp_string_pool)
    }

    pub(crate) fn has_undo_quantum(&self) -> bool {
        self.undo_quantum
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    pub(crate) fn set_undo_quantum(&self, undo_quantum: Option<Arc<dyn UndoQuantum>>) {
        write_slot(&self.undo_quantum, undo_quantum);
    }

    pub(crate) fn set_engine(&self, engine: Option<Arc<dyn SiteEngine>>) {
        write_slot(&self.engine, engine);
    }

    pub(crate) fn set_temp_string_pool(&self, pool: Option<Arc<dyn TransientPool>>) {
        write_slot(&self.temp_string_pool, pool);
    }
}

// Slots are replaced whole, so a poisoned lock still holds a usable handle.
fn read_slot<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>) -> Option<Arc<T>> {
    slot.read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn write_slot<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>, value: Option<Arc<T>>) {
    *slot.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
}

impl fmt::Debug for SharedCollaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCollaborators")
            .field("undo_quantum", &self.undo_quantum())
            .field("engine", &self.engine().is_some())
            .field("temp_string_pool", &self.temp_string_pool().is_some())
            .finish()
    }
}

/// Undo action registered when a DR stream opens a transaction record: a
/// rollback truncates the stream back to its last committed position.
pub struct DrStreamUndoAction {
    stream: Arc<dyn DrTupleStream>,
    committed_uso: usize,
}

impl DrStreamUndoAction {
    pub fn new(stream: Arc<dyn DrTupleStream>, committed_uso: usize) -> Self {
        Self {
            stream,
            committed_uso,
        }
    }
}

impl UndoAction for DrStreamUndoAction {
    fn undo(self: Box<Self>) {
        tracing::debug!(uso = self.committed_uso, "rolling back DR stream");
        self.stream.rollback_to(self.committed_uso);
    }

    fn release(self: Box<Self>) {}
}
