//! Execution contexts: owners with a default executor and a release pool.
//!
//! A context-scoped registration binds a handler's continuation to an
//! owner object. The binding is deliberately asymmetric:
//!
//! - The handler holds the context *weakly* (`Weak<C>`), so a chain
//!   `future -> handler -> context` can never keep the context alive.
//! - The context holds the handler's subscription token in its
//!   [`ReleasePool`], so the context, not the handler, controls the
//!   handler's lifetime. Tearing the context down drains the pool, which
//!   drops the tokens, which evicts the still-pending handlers.
//!
//! Together these prevent both retain cycles and handlers firing against
//! an owner that no longer exists. Liveness at fire time is decided by
//! `Weak::upgrade`: once the last strong reference is gone, upgrades fail
//! and the handler observes the context as dead, even if its fields have
//! not finished dropping yet.
//!
//! # Example
//!
//! ```ignore
//! struct Worker {
//!     executor: Executor,
//!     pool: ReleasePool,
//! }
//!
//! impl ExecutionContext for Worker {
//!     fn executor(&self) -> Executor {
//!         self.executor.clone()
//!     }
//!     fn release_pool(&self) -> &ReleasePool {
//!         &self.pool
//!     }
//! }
//!
//! let worker = Arc::new(Worker::new());
//! some_future.on_success_in(&worker, None, |worker, value| worker.apply(value));
//! drop(worker); // pending handlers are evicted here, they never fire
//! ```

use crate::executor::Executor;
use std::any::Any;
use std::fmt;
use std::sync::Mutex;

/// An owner type that context-scoped registrations can bind to.
///
/// Implementors supply a default executor (used when a registration omits
/// one) and a release pool that retains subscription tokens until the
/// owner's lifetime ends. Kept as a statically dispatched trait; the core
/// never erases context types.
pub trait ExecutionContext: Send + Sync + 'static {
    /// The executor continuations run on when none is specified.
    fn executor(&self) -> Executor;

    /// The pool retaining this owner's subscription tokens.
    fn release_pool(&self) -> &ReleasePool;
}

/// A growable set of opaque retained resources, emptied on teardown.
///
/// Any thread may insert while the owner is alive; the teardown path
/// drains synchronously. Dropping the pool (as part of dropping the
/// owner) is equivalent to draining it.
#[derive(Default)]
pub struct ReleasePool {
    retained: Mutex<Vec<Box<dyn Any + Send>>>,
}

impl ReleasePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retains `resource` until the pool is drained or dropped.
    pub fn insert<R: Send + 'static>(&self, resource: R) {
        self.retained
            .lock()
            .expect("release pool lock poisoned")
            .push(Box::new(resource));
    }

    /// Drops every retained resource now.
    ///
    /// Subscription tokens held here cancel their handlers when dropped,
    /// so draining evicts every still-pending context-scoped handler.
    pub fn drain(&self) {
        let drained = {
            let mut retained = self.retained.lock().expect("release pool lock poisoned");
            std::mem::take(&mut *retained)
        };
        if !drained.is_empty() {
            tracing::trace!(released = drained.len(), "release pool drained");
        }
        drop(drained);
    }

    /// Number of currently retained resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.retained
            .lock()
            .expect("release pool lock poisoned")
            .len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ReleasePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleasePool")
            .field("retained", &self.len())
            .finish()
    }
}
