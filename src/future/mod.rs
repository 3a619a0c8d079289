//! Single-assignment completion core: [`Promise`], [`Future`],
//! [`Subscription`].
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    COMPLETION STATE MACHINE                       │
//! │                                                                   │
//! │   Producer                                Consumer                │
//! │     │                                        │                    │
//! │     │                                        │── subscribe ──► queued
//! │     │─── complete(value) ──► Completed ──────┼──► handlers fire   │
//! │     │                            │           │    (each on its    │
//! │     │─── complete(again) ──► no-op           │     own executor)  │
//! │     │                                        │── subscribe ──► fires
//! │   (drop while pending) ──► Abandoned failure │    immediately     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `Pending -> Completed` transition happens at most once; concurrent
//! completers serialize on the per-instance lock and exactly one wins.
//! Handlers registered before completion fire in registration order
//! relative to each other; handlers registered after completion are
//! scheduled immediately. No ordering is guaranteed across different
//! executors.
//!
//! # Ownership
//!
//! A [`Promise`] is the exclusively owned writable side; [`Future`]s are
//! cheap shareable read views of the same state. Dropping a promise while
//! still pending completes its dependents with
//! [`ConcurrencyError::Abandoned`] rather than leaving them hanging.
//!
//! # Cancellation
//!
//! [`Future::subscribe`] returns a [`Subscription`] token that evicts the
//! handler when dropped or cancelled. Eviction is best-effort: a racing
//! completion may have already drained the queue, in which case the
//! handler still runs once.

pub mod combinator;
pub mod makers;
mod wait;

use crate::error::ConcurrencyError;
use crate::executor::Executor;
use crate::fallible::{Failure, Fallible};
use smallvec::SmallVec;
use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Box<dyn FnOnce(Fallible<T>) + Send + 'static>;
type KeepAlive = Arc<dyn Any + Send + Sync>;

/// A queued handler: the callback plus the executor it must run on.
struct Handler<T> {
    id: u64,
    executor: Executor,
    callback: Callback<T>,
}

enum State<T> {
    Pending {
        handlers: SmallVec<[Handler<T>; 2]>,
        /// Resource kept alive only while pending; released at completion.
        /// Used by the channel bridge to pin its upstream producer.
        keep_alive: Option<KeepAlive>,
    },
    Completed(Fallible<T>),
}

pub(crate) struct Shared<T> {
    state: Mutex<State<T>>,
    next_handler_id: AtomicU64,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn new_pending() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Pending {
                handlers: SmallVec::new(),
                keep_alive: None,
            }),
            next_handler_id: AtomicU64::new(0),
        })
    }

    /// First caller wins; later attempts are no-ops returning false.
    fn complete(self: &Arc<Self>, value: Fallible<T>) -> bool {
        let (handlers, keep_alive) = {
            let mut state = self.state.lock().expect("completion state lock poisoned");
            match &mut *state {
                State::Completed(_) => return false,
                State::Pending {
                    handlers,
                    keep_alive,
                } => {
                    let handlers = std::mem::take(handlers);
                    let keep_alive = keep_alive.take();
                    *state = State::Completed(value.clone());
                    (handlers, keep_alive)
                }
            }
        };
        tracing::trace!(handlers = handlers.len(), "future completed");
        // Dispatch outside the lock, in registration order, each handler
        // on its own executor with its own clone of the value.
        for handler in handlers {
            let value = value.clone();
            let callback = handler.callback;
            handler.executor.execute(move || callback(value));
        }
        drop(keep_alive);
        true
    }

    fn subscribe(
        self: &Arc<Self>,
        executor: Executor,
        callback: Callback<T>,
    ) -> Option<Subscription<T>> {
        let mut state = self.state.lock().expect("completion state lock poisoned");
        match &mut *state {
            State::Completed(value) => {
                let value = value.clone();
                drop(state);
                executor.execute(move || callback(value));
                None
            }
            State::Pending { handlers, .. } => {
                let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
                handlers.push(Handler {
                    id,
                    executor,
                    callback,
                });
                Some(Subscription {
                    shared: Arc::downgrade(self),
                    id,
                    armed: true,
                })
            }
        }
    }

    fn snapshot(&self) -> Option<Fallible<T>> {
        match &*self.state.lock().expect("completion state lock poisoned") {
            State::Pending { .. } => None,
            State::Completed(value) => Some(value.clone()),
        }
    }

    fn is_complete(&self) -> bool {
        matches!(
            &*self.state.lock().expect("completion state lock poisoned"),
            State::Completed(_)
        )
    }

    fn set_keep_alive(&self, guard: KeepAlive) {
        let mut state = self.state.lock().expect("completion state lock poisoned");
        match &mut *state {
            State::Pending { keep_alive, .. } => *keep_alive = Some(guard),
            // Already complete: nothing left to pin.
            State::Completed(_) => drop(guard),
        }
    }

    fn evict(&self, id: u64) {
        let evicted = {
            let mut state = self.state.lock().expect("completion state lock poisoned");
            match &mut *state {
                State::Pending { handlers, .. } => {
                    let before = handlers.len();
                    handlers.retain(|handler| handler.id != id);
                    before != handlers.len()
                }
                State::Completed(_) => false,
            }
        };
        if evicted {
            tracing::trace!(handler = id, "handler evicted before firing");
        }
    }
}

/// Weak reference into a future's shared state.
///
/// Lets the channel bridge complete a future without holding it alive:
/// once every external [`Future`] reference is gone, upgrades fail and
/// the bridge stops feeding it.
pub(crate) struct WeakShared<T>(Weak<Shared<T>>);

impl<T: Clone + Send + 'static> WeakShared<T> {
    pub(crate) fn complete(&self, value: Fallible<T>) -> bool {
        self.0.upgrade().is_some_and(|shared| shared.complete(value))
    }
}

/// The writable side of a completion; completed exactly once.
///
/// Exclusively owned by its creator (not `Clone`). Completion values fan
/// out to handlers by cloning, hence the `T: Clone` bound.
pub struct Promise<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates a new pending promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Shared::new_pending(),
        }
    }

    /// Returns a shareable read view of this promise's completion.
    #[must_use]
    pub fn future(&self) -> Future<T> {
        Future {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Completes with `value`. First caller wins; returns false if the
    /// promise was already completed.
    pub fn complete(&self, value: Fallible<T>) -> bool {
        self.shared.complete(value)
    }

    /// Completes with a success value.
    pub fn succeed(&self, value: T) -> bool {
        self.complete(Fallible::Success(value))
    }

    /// Completes with a concrete error.
    pub fn fail<E>(&self, error: E) -> bool
    where
        E: StdError + Send + Sync + 'static,
    {
        self.complete(Fallible::from_error(error))
    }

    /// Completes with an already-erased failure.
    pub fn fail_with(&self, failure: Failure) -> bool {
        self.complete(Fallible::Failure(failure))
    }

    /// Returns true if already completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.is_complete()
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        // Dropping the writable side while pending means dependents can
        // never receive a value; fail them visibly instead.
        if !self.shared.is_complete() {
            self.shared
                .complete(Fallible::from_error(ConcurrencyError::Abandoned));
        }
    }
}

/// The readable, shareable side of a completion.
pub struct Future<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Returns true if the underlying promise has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.is_complete()
    }

    /// Non-blocking atomic snapshot of the completion, if any.
    #[must_use]
    pub fn completion(&self) -> Option<Fallible<T>> {
        self.shared.snapshot()
    }

    /// Shorthand: the success value if completed successfully.
    #[must_use]
    pub fn success(&self) -> Option<T> {
        self.completion().and_then(Fallible::into_success)
    }

    /// Shorthand: the failure value if completed with a failure.
    #[must_use]
    pub fn failure(&self) -> Option<Failure> {
        self.completion().and_then(Fallible::into_failure)
    }

    /// Registers `callback` to run on `executor` with the completion.
    ///
    /// If already completed, the callback is scheduled immediately and
    /// `None` is returned (there is nothing left to release). If pending,
    /// the callback is queued and the returned [`Subscription`] token
    /// controls its lifetime: dropping the token evicts the handler.
    pub fn subscribe(
        &self,
        executor: Executor,
        callback: impl FnOnce(Fallible<T>) + Send + 'static,
    ) -> Option<Subscription<T>> {
        self.shared.subscribe(executor, Box::new(callback))
    }

    /// Fire-and-forget registration: like [`subscribe`](Self::subscribe)
    /// but the handler stays queued until the future completes.
    pub fn on_complete(
        &self,
        executor: Executor,
        callback: impl FnOnce(Fallible<T>) + Send + 'static,
    ) {
        if let Some(subscription) = self.subscribe(executor, callback) {
            subscription.detach();
        }
    }

    pub(crate) fn new_pending() -> Self {
        Self {
            shared: Shared::new_pending(),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakShared<T> {
        WeakShared(Arc::downgrade(&self.shared))
    }

    pub(crate) fn set_keep_alive(&self, guard: KeepAlive) {
        self.shared.set_keep_alive(guard);
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Token controlling the lifetime of one queued handler.
///
/// Dropping the token cancels the handler (best-effort eviction from the
/// pending queue); [`detach`](Self::detach) disarms that so the handler
/// survives until the future completes.
pub struct Subscription<T: Clone + Send + 'static> {
    shared: Weak<Shared<T>>,
    id: u64,
    armed: bool,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Cancels the handler now. Equivalent to dropping the token.
    pub fn cancel(mut self) {
        self.release();
    }

    /// Disarms cancel-on-drop; the handler stays queued until the future
    /// completes.
    pub fn detach(mut self) {
        self.armed = false;
    }

    fn release(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Some(shared) = self.shared.upgrade() {
            shared.evict(self.id);
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}

impl<T: Clone + Send + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.release();
    }
}
