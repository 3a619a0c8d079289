//! Combinators over futures, built only on the completion core's public
//! contract.
//!
//! Every derived future here is driven by a handler queued on its
//! upstream: the upstream's handler queue owns the callback, the callback
//! owns the derived promise, so an intermediate in a chain like
//! `a.map(..).on_success(..)` stays alive until `a` fires. If the
//! upstream is abandoned, the chain observes the abandonment failure the
//! same way it observes any other.
//!
//! Context-scoped variants register on the immediate executor, resolve
//! the weak context reference at fire time, and only then hop to the
//! chosen executor. Value-producing variants (`map_in`) complete with
//! [`ConcurrencyError::ContextDeallocated`] when the context died first;
//! side-effect variants (`on_success_in`, `on_failure_in`) simply never
//! fire. A value-producing chain must resolve to something; a
//! side-effect subscription has nothing to resolve.

use super::{Future, Promise};
use crate::context::ExecutionContext;
use crate::error::ConcurrencyError;
use crate::executor::Executor;
use crate::fallible::{Failure, Fallible};
use std::sync::{Arc, Mutex};

impl<T: Clone + Send + 'static> Future<T> {
    /// Derives a future by transforming the completion on `executor`.
    ///
    /// The transform receives the full [`Fallible`], so it can map either
    /// branch; failures it produces become the derived future's failure.
    pub fn map<U: Clone + Send + 'static>(
        &self,
        executor: Executor,
        transform: impl FnOnce(Fallible<T>) -> Fallible<U> + Send + 'static,
    ) -> Future<U> {
        let promise = Promise::new();
        let mapped = promise.future();
        self.on_complete(executor, move |value| {
            promise.complete(transform(value));
        });
        mapped
    }

    /// Transforms the success branch on `executor`, passing failures
    /// through unchanged.
    ///
    /// # Errors
    ///
    /// A transform error becomes the derived future's failure.
    pub fn lift_success<U: Clone + Send + 'static>(
        &self,
        executor: Executor,
        transform: impl FnOnce(T) -> Result<U, Failure> + Send + 'static,
    ) -> Future<U> {
        self.map(executor, move |value| match value {
            Fallible::Success(value) => transform(value).into(),
            Fallible::Failure(failure) => Fallible::Failure(failure),
        })
    }

    /// Transforms the failure branch on `executor`, passing successes
    /// through unchanged.
    ///
    /// # Errors
    ///
    /// A transform error becomes the derived future's failure.
    pub fn lift_failure(
        &self,
        executor: Executor,
        transform: impl FnOnce(Failure) -> Result<T, Failure> + Send + 'static,
    ) -> Future<T> {
        self.map(executor, move |value| match value {
            Fallible::Success(value) => Fallible::Success(value),
            Fallible::Failure(failure) => transform(failure).into(),
        })
    }

    /// Runs `block` on `executor` only if the future succeeds.
    pub fn on_success(&self, executor: Executor, block: impl FnOnce(T) + Send + 'static) {
        self.on_complete(executor, move |value| {
            if let Fallible::Success(value) = value {
                block(value);
            }
        });
    }

    /// Runs `block` on `executor` only if the future fails.
    pub fn on_failure(&self, executor: Executor, block: impl FnOnce(Failure) + Send + 'static) {
        self.on_complete(executor, move |value| {
            if let Fallible::Failure(failure) = value {
                block(failure);
            }
        });
    }

    /// Context-scoped completion handler.
    ///
    /// Captures `context` weakly; the continuation runs on `executor`, or
    /// on the context's own executor when omitted. The subscription is
    /// parked in the context's release pool, so tearing the context down
    /// before completion evicts the handler and it never fires. A context
    /// found dead at fire time drops the callback silently.
    pub fn on_complete_in<C: ExecutionContext>(
        &self,
        context: &Arc<C>,
        executor: Option<Executor>,
        callback: impl FnOnce(&C, Fallible<T>) + Send + 'static,
    ) {
        let weak = Arc::downgrade(context);
        let chosen = executor.unwrap_or_else(|| context.executor());
        let subscription = self.subscribe(Executor::immediate(), move |value| {
            if let Some(context) = weak.upgrade() {
                chosen.execute(move || callback(&context, value));
            }
        });
        if let Some(subscription) = subscription {
            context.release_pool().insert(subscription);
        }
    }

    /// Context-scoped [`on_success`](Self::on_success).
    pub fn on_success_in<C: ExecutionContext>(
        &self,
        context: &Arc<C>,
        executor: Option<Executor>,
        block: impl FnOnce(&C, T) + Send + 'static,
    ) {
        self.on_complete_in(context, executor, move |context, value| {
            if let Fallible::Success(value) = value {
                block(context, value);
            }
        });
    }

    /// Context-scoped [`on_failure`](Self::on_failure).
    pub fn on_failure_in<C: ExecutionContext>(
        &self,
        context: &Arc<C>,
        executor: Option<Executor>,
        block: impl FnOnce(&C, Failure) + Send + 'static,
    ) {
        self.on_complete_in(context, executor, move |context, value| {
            if let Fallible::Failure(failure) = value {
                block(context, failure);
            }
        });
    }

    /// Context-scoped [`map`](Self::map).
    ///
    /// Unlike the side-effect registrations, the handler here is retained
    /// by the upstream queue rather than the release pool: a
    /// value-producing chain must resolve, so a context found dead at
    /// fire time completes the derived future with
    /// [`ConcurrencyError::ContextDeallocated`] instead of hanging it.
    pub fn map_in<C, U>(
        &self,
        context: &Arc<C>,
        executor: Option<Executor>,
        transform: impl FnOnce(&C, Fallible<T>) -> Fallible<U> + Send + 'static,
    ) -> Future<U>
    where
        C: ExecutionContext,
        U: Clone + Send + 'static,
    {
        let weak = Arc::downgrade(context);
        let chosen = executor.unwrap_or_else(|| context.executor());
        let promise = Promise::new();
        let mapped = promise.future();
        self.on_complete(Executor::immediate(), move |value| match weak.upgrade() {
            Some(context) => chosen.execute(move || {
                promise.complete(transform(&context, value));
            }),
            None => {
                promise.fail(ConcurrencyError::ContextDeallocated);
            }
        });
        mapped
    }
}

/// Completes with both values once both upstreams succeed; fails with
/// whichever failure occurs first.
///
/// The tuple field order is always `(A, B)` regardless of which upstream
/// completes first. After a failure wins, the other upstream's eventual
/// value is discarded.
pub fn combine<A, B>(a: &Future<A>, b: &Future<B>) -> Future<(A, B)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let promise = Arc::new(Promise::new());
    let combined = promise.future();
    let pending = Arc::new(Mutex::new((None::<A>, None::<B>)));

    let first_promise = Arc::clone(&promise);
    let first_pending = Arc::clone(&pending);
    a.on_complete(Executor::immediate(), move |value| match value {
        Fallible::Success(value) => {
            let pair = {
                let mut guard = first_pending.lock().expect("combine state lock poisoned");
                guard.0 = Some(value);
                if guard.1.is_some() {
                    guard.0.take().zip(guard.1.take())
                } else {
                    None
                }
            };
            if let Some(pair) = pair {
                first_promise.succeed(pair);
            }
        }
        Fallible::Failure(failure) => {
            first_promise.fail_with(failure);
        }
    });

    b.on_complete(Executor::immediate(), move |value| match value {
        Fallible::Success(value) => {
            let pair = {
                let mut guard = pending.lock().expect("combine state lock poisoned");
                guard.1 = Some(value);
                if guard.0.is_some() {
                    guard.0.take().zip(guard.1.take())
                } else {
                    None
                }
            };
            if let Some(pair) = pair {
                promise.succeed(pair);
            }
        }
        Fallible::Failure(failure) => {
            promise.fail_with(failure);
        }
    });

    combined
}
