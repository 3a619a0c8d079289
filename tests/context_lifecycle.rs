//! Context-scoped handler lifecycle: delivery on the owner's executor
//! while it lives, prompt eviction when it is torn down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use troth::future::makers;
use troth::{
    ConcurrencyError, ExecutionContext, Executor, Fallible, PoolConfig, Promise, ReleasePool,
    ThreadPool,
};

/// An actor-style owner: a private single-threaded executor plus the
/// release pool that scopes its subscriptions.
struct Actor {
    pool: ThreadPool,
    release_pool: ReleasePool,
    log: Mutex<Vec<i32>>,
}

impl Actor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            pool: ThreadPool::new(
                PoolConfig::new()
                    .with_threads(1)
                    .with_thread_name_prefix("actor"),
            ),
            release_pool: ReleasePool::new(),
            log: Mutex::new(Vec::new()),
        })
    }
}

impl ExecutionContext for Actor {
    fn executor(&self) -> Executor {
        self.pool.executor()
    }

    fn release_pool(&self) -> &ReleasePool {
        &self.release_pool
    }
}

#[test]
fn handler_runs_on_the_context_executor_while_alive() {
    let actor = Actor::new();
    let promise = Promise::new();
    let on_actor_thread = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&on_actor_thread);
    promise
        .future()
        .on_success_in(&actor, None, move |actor, value| {
            let named = thread::current()
                .name()
                .is_some_and(|name| name.starts_with("actor"));
            flag.store(named, Ordering::Release);
            actor.log.lock().unwrap().push(value);
        });

    promise.succeed(5);
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while actor.log.lock().unwrap().is_empty() {
        assert!(std::time::Instant::now() < deadline, "handler never ran");
        thread::yield_now();
    }
    assert_eq!(*actor.log.lock().unwrap(), vec![5]);
    assert!(on_actor_thread.load(Ordering::Acquire));
}

#[test]
fn teardown_before_completion_prevents_delivery() {
    let actor = Actor::new();
    let promise = Promise::new();
    let fired = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&fired);
    promise
        .future()
        .on_complete_in(&actor, None, move |_, _: Fallible<i32>| {
            flag.store(true, Ordering::Release);
        });
    assert_eq!(actor.release_pool().len(), 1);

    drop(actor);
    promise.succeed(1);
    thread::sleep(Duration::from_millis(50));
    assert!(!fired.load(Ordering::Acquire));
}

#[test]
fn completion_before_teardown_delivers_exactly_once() {
    let actor = Actor::new();
    let promise = Promise::new();

    promise
        .future()
        .on_success_in(&actor, None, |actor, value| {
            actor.log.lock().unwrap().push(value);
        });
    promise.succeed(7);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while actor.log.lock().unwrap().is_empty() {
        assert!(std::time::Instant::now() < deadline, "handler never ran");
        thread::yield_now();
    }
    drop(promise);
    assert_eq!(*actor.log.lock().unwrap(), vec![7]);
}

#[test]
fn manual_drain_evicts_pending_handlers() {
    let actor = Actor::new();
    let promise = Promise::new();
    let fired = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&fired);
    promise
        .future()
        .on_complete_in(&actor, None, move |_, _: Fallible<i32>| {
            flag.store(true, Ordering::Release);
        });

    // The teardown path: the owner empties its pool while still alive.
    actor.release_pool().drain();
    assert!(actor.release_pool().is_empty());

    promise.succeed(1);
    thread::sleep(Duration::from_millis(50));
    assert!(!fired.load(Ordering::Acquire));
}

#[test]
fn map_in_fails_distinctly_when_context_died_first() {
    let actor = Actor::new();
    let promise = Promise::new();
    let mapped = promise
        .future()
        .map_in(&actor, None, |_, value| value.map_success(|v: i32| v + 1));

    drop(actor);
    promise.succeed(1);

    let failure = mapped.wait().into_failure().expect("chain must resolve");
    assert_eq!(
        failure.downcast_ref::<ConcurrencyError>(),
        Some(&ConcurrencyError::ContextDeallocated)
    );
}

#[test]
fn run_in_produces_value_with_live_context() {
    let actor = Actor::new();
    let future = makers::run_in(&actor, |_| Ok(11));
    assert_eq!(
        future.wait_timeout(Duration::from_secs(5)).and_then(Fallible::into_success),
        Some(11)
    );
}

#[test]
fn delayed_run_in_fails_when_context_dies_during_the_delay() {
    let actor = Actor::new();
    let future = makers::run_in_after(&actor, Duration::from_millis(40), |_| Ok(11));
    drop(actor);

    let failure = future
        .wait_timeout(Duration::from_secs(5))
        .expect("completes after the delay")
        .into_failure()
        .expect("dead context fails the maker");
    assert_eq!(
        failure.downcast_ref::<ConcurrencyError>(),
        Some(&ConcurrencyError::ContextDeallocated)
    );
}

#[test]
fn channel_subscription_is_context_scoped_too() {
    let actor = Actor::new();
    let (source, consumer) = troth::channel();

    consumer.on_value_in(&actor, None, |actor, value| {
        actor.log.lock().unwrap().push(value);
    });
    source.send(1);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while actor.log.lock().unwrap().is_empty() {
        assert!(std::time::Instant::now() < deadline, "value never arrived");
        thread::yield_now();
    }

    drop(actor);
    source.send(2);
    thread::sleep(Duration::from_millis(50));
    // Only the pre-teardown value was delivered; nothing observes the
    // second one.
}
