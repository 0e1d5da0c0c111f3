//! Binding of execution contexts to worker threads.
//!
//! The engine owns each site's context through a [`ContextHandle`]. Before it
//! dispatches fragment work onto a worker thread it binds that site's handle to
//! the thread; code without a context in hand then finds it with
//! [`current_context`]. The registry only keeps weak references, so binding
//! never extends a context's life and a dropped context simply stops resolving.
//!
//! The undo quantum, engine and string pool are also reachable through the
//! binding while a fragment runs: [`current_undo_quantum`], [`current_engine`]
//! and [`current_temp_string_pool`] read them from the context's
//! [`SharedCollaborators`] and never take the execution lock.
//!
//! Only the dispatching engine thread rebinds. No lock orders bindings against
//! fragment execution; correctness relies on that single-writer discipline.

use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, RwLock, TryLockError, Weak};
use std::thread::{self, ThreadId};

use rustc_hash::FxHashMap;
use sitectx_result::{Error, Result};

use crate::collaborators::{SharedCollaborators, SiteEngine, TransientPool, UndoQuantum};
use crate::context::ExecutionContext;

struct ContextCell {
    context: Mutex<ExecutionContext>,
    shared: Arc<SharedCollaborators>,
}

/// Shared handle to a site's execution context.
#[derive(Clone)]
pub struct ContextHandle {
    inner: Arc<ContextCell>,
}

impl ContextHandle {
    pub fn new(ctx: ExecutionContext) -> Self {
        let shared = Arc::clone(ctx.shared_collaborators());
        Self {
            inner: Arc::new(ContextCell {
                context: Mutex::new(ctx),
                shared,
            }),
        }
    }

    /// Exclusive access to the context.
    ///
    /// A context is driven by one thread at a time, so finding it locked means
    /// the caller is re-entering it from inside a running executor (which must
    /// use the `&mut ExecutionContext` it was handed instead); that is reported
    /// as a [`Error::ContractViolation`] rather than deadlocking.
    pub fn lock(&self) -> Result<MutexGuard<'_, ExecutionContext>> {
        match self.inner.context.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => {
                tracing::error!("execution context re-entered while in use");
                Err(Error::contract_violation(
                    "execution context is already in use on this thread",
                ))
            }
            Err(TryLockError::Poisoned(_)) => Err(Error::internal(
                "execution context poisoned by a panicking executor",
            )),
        }
    }

    /// Run `f` with exclusive access to the context.
    pub fn with<R>(&self, f: impl FnOnce(&mut ExecutionContext) -> R) -> Result<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut *guard))
    }

    /// Make this the current context of the calling thread.
    ///
    /// Idempotent. Replaces whatever the thread was bound to before and
    /// releases this context's binding to any other thread.
    pub fn bind_to_thread(&self) {
        ContextRegistry::global().bind(thread::current().id(), self);
    }

    /// Collaborator handles of the context. Readable while another caller
    /// holds the context lock.
    pub fn shared_collaborators(&self) -> &SharedCollaborators {
        &self.inner.shared
    }

    pub fn ptr_eq(&self, other: &ContextHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn downgrade(&self) -> Weak<ContextCell> {
        Arc::downgrade(&self.inner)
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.context.try_lock() {
            Ok(ctx) => f.debug_tuple("ContextHandle").field(&*ctx).finish(),
            Err(_) => f.write_str("ContextHandle(<in use>)"),
        }
    }
}

static GLOBAL_REGISTRY: LazyLock<ContextRegistry> = LazyLock::new(ContextRegistry::new);

/// Map from worker thread to the context it currently serves.
///
/// Each thread has at most one current context and each context is current on
/// at most one thread.
#[derive(Default)]
pub struct ContextRegistry {
    bindings: RwLock<FxHashMap<ThreadId, Weak<ContextCell>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`ContextHandle::bind_to_thread`] and
    /// [`current_context`].
    pub fn global() -> &'static ContextRegistry {
        &GLOBAL_REGISTRY
    }

    /// Bind `handle` to `thread`.
    pub fn bind(&self, thread: ThreadId, handle: &ContextHandle) {
        let weak = handle.downgrade();
        let mut bindings = self
            .bindings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        bindings.retain(|bound_thread, bound| {
            if bound.strong_count() == 0 {
                tracing::warn!(thread = ?bound_thread, "pruning binding of dropped execution context");
                return false;
            }
            if *bound_thread != thread && Weak::ptr_eq(bound, &weak) {
                tracing::debug!(from = ?bound_thread, to = ?thread, "moving execution context to new thread");
                return false;
            }
            true
        });

        let replaced = bindings
            .insert(thread, weak)
            .is_some_and(|previous| !Weak::ptr_eq(&previous, &handle.downgrade()));
        tracing::debug!(thread = ?thread, replaced, "execution context bound to thread");
    }

    /// Remove the binding of `thread`. Returns `true` if one existed.
    pub fn unbind(&self, thread: ThreadId) -> bool {
        self.bindings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&thread)
            .is_some()
    }

    /// Context bound to `thread`.
    ///
    /// A thread without a binding, or whose context was dropped, is a
    /// [`Error::ContractViolation`].
    pub fn context_for(&self, thread: ThreadId) -> Result<ContextHandle> {
        let bindings = self
            .bindings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(weak) = bindings.get(&thread) else {
            tracing::error!(thread = ?thread, "no execution context bound");
            return Err(Error::contract_violation(format!(
                "no execution context bound to thread {thread:?}"
            )));
        };
        weak.upgrade()
            .map(|inner| ContextHandle { inner })
            .ok_or_else(|| {
                tracing::error!(thread = ?thread, "bound execution context was dropped");
                Error::contract_violation(format!(
                    "execution context bound to thread {thread:?} was dropped"
                ))
            })
    }

    /// Context bound to the calling thread.
    pub fn current(&self) -> Result<ContextHandle> {
        self.context_for(thread::current().id())
    }

    pub fn is_bound(&self, thread: ThreadId) -> bool {
        self.bindings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&thread)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Threads whose bound context is still alive.
    pub fn bound_threads(&self) -> Vec<ThreadId> {
        self.bindings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(thread, _)| *thread)
            .collect()
    }
}

/// Context bound to the calling thread in the global registry.
pub fn current_context() -> Result<ContextHandle> {
    ContextRegistry::global().current()
}

/// Undo quantum of the calling thread's context; `None` outside a transaction.
pub fn current_undo_quantum() -> Result<Option<Arc<dyn UndoQuantum>>> {
    Ok(current_context()?.shared_collaborators().undo_quantum())
}

/// Engine object of the calling thread's context.
pub fn current_engine() -> Result<Arc<dyn SiteEngine>> {
    current_context()?
        .shared_collaborators()
        .engine()
        .ok_or_else(|| Error::contract_violation("execution context has no engine attached"))
}

/// Transient string pool of the calling thread's context.
pub fn current_temp_string_pool() -> Result<Arc<dyn TransientPool>> {
    current_context()?
        .shared_collaborators()
        .temp_string_pool()
        .ok_or_else(|| {
            Error::contract_violation("execution context has no temp string pool attached")
        })
}
