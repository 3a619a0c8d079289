//! Constructors producing already-completed or producer-driven futures.

use super::{Future, Promise};
use crate::context::ExecutionContext;
use crate::error::ConcurrencyError;
use crate::executor::Executor;
use crate::fallible::Failure;
use std::error::Error as StdError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Returns a future already completed with a success value.
#[must_use]
pub fn succeeded<T: Clone + Send + 'static>(value: T) -> Future<T> {
    let promise = Promise::new();
    promise.succeed(value);
    promise.future()
}

/// Returns a future already completed with a failure.
#[must_use]
pub fn failed<T, E>(error: E) -> Future<T>
where
    T: Clone + Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    let promise = Promise::new();
    promise.fail(error);
    promise.future()
}

/// Runs `block` on `executor` and completes the returned future with its
/// outcome.
pub fn run<T>(
    executor: &Executor,
    block: impl FnOnce() -> Result<T, Failure> + Send + 'static,
) -> Future<T>
where
    T: Clone + Send + 'static,
{
    let promise = Promise::new();
    let future = promise.future();
    executor.execute(move || {
        promise.complete(block().into());
    });
    future
}

/// Runs `block` on the context's executor and completes the returned
/// future with its outcome.
///
/// The context is captured weakly: if it is gone by the time the block
/// would run, the future completes with
/// [`ConcurrencyError::ContextDeallocated`].
pub fn run_in<C, T>(
    context: &Arc<C>,
    block: impl FnOnce(&C) -> Result<T, Failure> + Send + 'static,
) -> Future<T>
where
    C: ExecutionContext,
    T: Clone + Send + 'static,
{
    let weak = Arc::downgrade(context);
    let promise = Promise::new();
    let future = promise.future();
    context.executor().execute(move || match weak.upgrade() {
        Some(context) => {
            promise.complete(block(&context).into());
        }
        None => {
            promise.fail(ConcurrencyError::ContextDeallocated);
        }
    });
    future
}

/// Like [`run`], delayed by `delay`.
///
/// The delay elapses on a dedicated thread; the block itself still runs
/// on `executor`.
pub fn run_after<T>(
    executor: &Executor,
    delay: Duration,
    block: impl FnOnce() -> Result<T, Failure> + Send + 'static,
) -> Future<T>
where
    T: Clone + Send + 'static,
{
    let promise = Promise::new();
    let future = promise.future();
    let executor = executor.clone();
    spawn_delay(delay, move || {
        executor.execute(move || {
            promise.complete(block().into());
        });
    });
    future
}

/// Like [`run_in`], delayed by `delay`.
///
/// The context is re-checked after the delay, so a context torn down
/// while the delay is still running fails the future with
/// [`ConcurrencyError::ContextDeallocated`] without running the block.
pub fn run_in_after<C, T>(
    context: &Arc<C>,
    delay: Duration,
    block: impl FnOnce(&C) -> Result<T, Failure> + Send + 'static,
) -> Future<T>
where
    C: ExecutionContext,
    T: Clone + Send + 'static,
{
    let weak = Arc::downgrade(context);
    let executor = context.executor();
    let promise = Promise::new();
    let future = promise.future();
    spawn_delay(delay, move || match weak.upgrade() {
        Some(context) => executor.execute(move || {
            promise.complete(block(&context).into());
        }),
        None => {
            promise.fail(ConcurrencyError::ContextDeallocated);
        }
    });
    future
}

fn spawn_delay(delay: Duration, then: impl FnOnce() + Send + 'static) {
    thread::Builder::new()
        .name("troth-delay".to_string())
        .spawn(move || {
            thread::sleep(delay);
            then();
        })
        .expect("failed to spawn delay thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ReleasePool;
    use crate::error::failure_is;
    use crate::executor::{PoolConfig, ThreadPool};
    use crate::fallible::Fallible;

    struct TestOwner {
        pool: ReleasePool,
    }

    impl TestOwner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                pool: ReleasePool::new(),
            })
        }
    }

    impl ExecutionContext for TestOwner {
        fn executor(&self) -> Executor {
            Executor::immediate()
        }

        fn release_pool(&self) -> &ReleasePool {
            &self.pool
        }
    }

    #[test]
    fn succeeded_is_complete_immediately() {
        let future = succeeded(21);
        assert_eq!(future.success(), Some(21));
    }

    #[test]
    fn failed_is_complete_immediately() {
        let future: Future<i32> = failed(ConcurrencyError::Timeout);
        let failure = future.failure().expect("failed maker");
        assert!(failure_is(&failure, ConcurrencyError::Timeout));
    }

    #[test]
    fn run_completes_with_block_outcome() {
        let pool = ThreadPool::new(PoolConfig::new().with_threads(1));
        let future = run(&pool.executor(), || Ok(6 * 7));
        assert_eq!(future.wait().into_success(), Some(42));
        pool.shutdown();
    }

    #[test]
    fn run_captures_block_failure() {
        let future: Future<i32> = run(&Executor::immediate(), || {
            Err(ConcurrencyError::Timeout.into_failure())
        });
        let failure = future.failure().expect("block failure captured");
        assert!(failure_is(&failure, ConcurrencyError::Timeout));
    }

    #[test]
    fn run_in_with_live_context() {
        let owner = TestOwner::new();
        let future = run_in(&owner, |_| Ok(3));
        assert_eq!(future.success(), Some(3));
    }

    #[test]
    fn run_in_after_with_dead_context_fails() {
        let owner = TestOwner::new();
        let future = run_in_after(&owner, Duration::from_millis(30), |_| Ok(3));
        drop(owner);
        let failure = future
            .wait_timeout(Duration::from_secs(5))
            .expect("completes after the delay")
            .into_failure()
            .expect("dead context fails the maker");
        assert!(failure_is(&failure, ConcurrencyError::ContextDeallocated));
    }

    #[test]
    fn run_after_delays_completion() {
        let future = run_after(&Executor::immediate(), Duration::from_millis(50), || Ok(1));
        assert!(!future.is_complete());
        assert_eq!(
            future
                .wait_timeout(Duration::from_secs(5))
                .and_then(Fallible::into_success),
            Some(1)
        );
    }
}
