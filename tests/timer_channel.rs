//! End-to-end timer channel lifetime: timer -> map on a pool executor ->
//! buffered -> synchronous wait, with cadence and stop-on-release checks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use troth::{timer, Executor, PoolConfig, ThreadPool};

#[test]
fn buffered_timer_ticks_land_inside_their_windows() {
    let interval = Duration::from_millis(80);
    let start = Instant::now();
    let pool = ThreadPool::new(PoolConfig::new().with_threads(2));

    let times = {
        let ticks = timer(interval);
        let stamped = ticks.map(pool.executor(), |()| Instant::now());
        let buffered = stamped.buffered(5);
        // Only the pending future keeps the chain (and the timer) alive
        // from here on.
        drop(ticks);
        drop(stamped);
        buffered.wait().into_success().expect("five ticks")
    };

    assert_eq!(times.len(), 5);
    for (index, time) in times.iter().enumerate() {
        let k = u32::try_from(index).unwrap() + 1;
        let window_start = start + interval * k;
        let window_end = start + interval * (k + 1) + Duration::from_millis(60);
        assert!(
            *time >= window_start,
            "tick {k} fired early: {:?} < {:?}",
            time.duration_since(start),
            window_start.duration_since(start)
        );
        assert!(
            *time <= window_end,
            "tick {k} fired late: {:?} > {:?}",
            time.duration_since(start),
            window_end.duration_since(start)
        );
    }
    pool.shutdown();
}

#[test]
fn timer_stops_once_the_last_derived_reference_is_released() {
    let interval = Duration::from_millis(30);
    let count = Arc::new(AtomicU32::new(0));

    {
        let ticks = timer(interval);
        let counter = Arc::clone(&count);
        let subscription = ticks.on_value(Executor::immediate(), move |()| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        subscription.detach();
        thread::sleep(interval * 3);
    }

    // One in-flight tick may still land while the producer notices the
    // channel is gone.
    thread::sleep(interval * 2);
    let frozen = count.load(Ordering::Relaxed);
    assert!(frozen >= 1, "timer never ticked");
    thread::sleep(interval * 5);
    assert_eq!(count.load(Ordering::Relaxed), frozen);
}

#[test]
fn mapped_timer_preserves_tick_count() {
    let interval = Duration::from_millis(40);
    let ticks = timer(interval);
    let numbered = {
        let mut next = 0u32;
        ticks.map(Executor::immediate(), move |()| {
            next += 1;
            next
        })
    };
    let buffered = numbered.buffered(3);
    drop(ticks);
    drop(numbered);

    let values = buffered.wait().into_success().expect("three ticks");
    assert_eq!(values, vec![1, 2, 3]);
}
