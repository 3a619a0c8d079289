//! Multi-value channels: the streaming analogue of [`Future`].
//!
//! A [`Channel`] delivers an unbounded sequence of values over time
//! through the same executor-dispatch mechanism futures use, with no
//! terminal completion. [`ChannelSource`] is the producer half; the
//! [`timer`] constructor produces a channel fed by a periodic source.
//!
//! # Lifetime
//!
//! A derived channel (from [`Channel::map`]) holds its upstream alive
//! through an erased keep-alive guard, while upstream dispatch reaches
//! derived state only through `Weak`. Dropping the last external
//! reference, direct or derived, therefore releases the producer; a
//! timer whose consumers are all gone stops ticking.
//!
//! # Ordering
//!
//! Per-subscriber delivery preserves emission order: values are scheduled
//! in the order they were sent, each on the subscriber's executor. On the
//! immediate executor this is a strict guarantee; on a pool executor it
//! holds when emission spacing exceeds handler latency (the common case
//! for timer-driven channels). No ordering is guaranteed across
//! subscribers.

mod buffered;
mod timer;

pub use timer::timer;

use crate::context::ExecutionContext;
use crate::executor::Executor;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[cfg(doc)]
use crate::future::Future;

type ValueCallback<T> = Arc<Mutex<Box<dyn FnMut(T) + Send + 'static>>>;
type KeepAlive = Arc<dyn std::any::Any + Send + Sync>;

struct Subscriber<T> {
    id: u64,
    executor: Executor,
    callback: ValueCallback<T>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            executor: self.executor.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

pub(crate) struct ChannelCore<T> {
    subscribers: Mutex<Vec<Subscriber<T>>>,
    next_subscriber_id: AtomicU64,
}

impl<T: Clone + Send + 'static> ChannelCore<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
        })
    }

    /// Delivers `value` to every current subscriber, each on its own
    /// executor, outside the subscriber lock.
    pub(crate) fn send(&self, value: T) {
        let snapshot = self
            .subscribers
            .lock()
            .expect("channel subscriber lock poisoned")
            .clone();
        for subscriber in snapshot {
            let callback = Arc::clone(&subscriber.callback);
            let value = value.clone();
            subscriber.executor.execute(move || {
                let mut callback = callback.lock().expect("channel callback lock poisoned");
                (*callback)(value);
            });
        }
    }

    fn subscribe(
        self: &Arc<Self>,
        executor: Executor,
        callback: Box<dyn FnMut(T) + Send + 'static>,
    ) -> ChannelSubscription<T> {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("channel subscriber lock poisoned")
            .push(Subscriber {
                id,
                executor,
                callback: Arc::new(Mutex::new(callback)),
            });
        ChannelSubscription {
            core: Arc::downgrade(self),
            id,
            armed: true,
        }
    }
}

impl<T> ChannelCore<T> {
    fn evict(&self, id: u64) {
        self.subscribers
            .lock()
            .expect("channel subscriber lock poisoned")
            .retain(|subscriber| subscriber.id != id);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("channel subscriber lock poisoned")
            .len()
    }
}

/// Creates a channel, returning the producer and consumer halves.
#[must_use]
pub fn channel<T: Clone + Send + 'static>() -> (ChannelSource<T>, Channel<T>) {
    let core = ChannelCore::new();
    (
        ChannelSource {
            core: Arc::clone(&core),
        },
        Channel { core, guard: None },
    )
}

/// The producing half of a channel.
pub struct ChannelSource<T> {
    core: Arc<ChannelCore<T>>,
}

impl<T: Clone + Send + 'static> ChannelSource<T> {
    /// Delivers `value` to all current subscribers.
    pub fn send(&self, value: T) {
        self.core.send(value);
    }

    /// Delivers every value of `values` in order.
    pub fn send_all(&self, values: impl IntoIterator<Item = T>) {
        for value in values {
            self.send(value);
        }
    }
}

impl<T> fmt::Debug for ChannelSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChannelSource")
    }
}

/// The consuming half of a channel: a multi-value analogue of a future.
pub struct Channel<T> {
    core: Arc<ChannelCore<T>>,
    /// Keeps a derived channel's upstream (and its forwarding
    /// subscription) alive for as long as any clone of this view exists.
    guard: Option<KeepAlive>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            guard: self.guard.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Channel<T> {
    pub(crate) fn from_core(core: Arc<ChannelCore<T>>) -> Self {
        Self { core, guard: None }
    }

    pub(crate) fn core(&self) -> &Arc<ChannelCore<T>> {
        &self.core
    }

    /// Registers `callback` to run on `executor` for every value.
    ///
    /// The returned token evicts the subscriber when dropped; call
    /// [`ChannelSubscription::detach`] for fire-and-forget delivery.
    pub fn on_value(
        &self,
        executor: Executor,
        callback: impl FnMut(T) + Send + 'static,
    ) -> ChannelSubscription<T> {
        self.core.subscribe(executor, Box::new(callback))
    }

    /// Context-scoped [`on_value`](Self::on_value).
    ///
    /// The context is captured weakly and the subscription parked in its
    /// release pool: values stop being delivered the moment the context
    /// is torn down, and a context found dead at dispatch time drops the
    /// value silently.
    pub fn on_value_in<C: ExecutionContext>(
        &self,
        context: &Arc<C>,
        executor: Option<Executor>,
        callback: impl FnMut(&C, T) + Send + 'static,
    ) {
        let weak = Arc::downgrade(context);
        let chosen = executor.unwrap_or_else(|| context.executor());
        let callback = Arc::new(Mutex::new(callback));
        let subscription = self.on_value(Executor::immediate(), move |value| {
            if let Some(context) = weak.upgrade() {
                let callback = Arc::clone(&callback);
                chosen.execute(move || {
                    let mut callback =
                        callback.lock().expect("channel callback lock poisoned");
                    (*callback)(&context, value);
                });
            }
        });
        context.release_pool().insert(subscription);
    }

    /// Derives a channel by transforming every value on `executor`.
    ///
    /// Values are forwarded downstream in emission order (see the module
    /// docs for the pool-executor caveat). The derived channel keeps this
    /// one alive.
    pub fn map<U: Clone + Send + 'static>(
        &self,
        executor: Executor,
        mut transform: impl FnMut(T) -> U + Send + 'static,
    ) -> Channel<U> {
        let derived = ChannelCore::new();
        let weak = Arc::downgrade(&derived);
        let forward = self.on_value(executor, move |value| {
            if let Some(core) = weak.upgrade() {
                core.send(transform(value));
            }
        });
        Channel {
            core: derived,
            guard: Some(Arc::new((self.clone(), forward))),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("derived", &self.guard.is_some())
            .finish()
    }
}

/// Token controlling the lifetime of one channel subscriber.
pub struct ChannelSubscription<T> {
    core: Weak<ChannelCore<T>>,
    id: u64,
    armed: bool,
}

impl<T> ChannelSubscription<T> {
    /// Evicts the subscriber now. Equivalent to dropping the token.
    pub fn cancel(mut self) {
        self.release();
    }

    /// Disarms cancel-on-drop; the subscriber lives as long as the
    /// channel does.
    pub fn detach(mut self) {
        self.armed = false;
    }

    fn release(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Some(core) = self.core.upgrade() {
            core.evict(self.id);
        }
    }
}

impl<T> fmt::Debug for ChannelSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSubscription")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}

impl<T> Drop for ChannelSubscription<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_arrive_in_emission_order() {
        let (source, consumer) = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = consumer.on_value(Executor::immediate(), move |value: i32| {
            sink.lock().unwrap().push(value);
        });
        source.send_all([1, 2, 3, 4, 5]);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        subscription.cancel();
    }

    #[test]
    fn every_subscriber_sees_every_value() {
        let (source, consumer) = channel();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&first);
        let sub_a = consumer.on_value(Executor::immediate(), move |value: i32| {
            sink.lock().unwrap().push(value);
        });
        let sink = Arc::clone(&second);
        let sub_b = consumer.on_value(Executor::immediate(), move |value: i32| {
            sink.lock().unwrap().push(value);
        });
        source.send_all([7, 8]);
        assert_eq!(*first.lock().unwrap(), vec![7, 8]);
        assert_eq!(*second.lock().unwrap(), vec![7, 8]);
        drop((sub_a, sub_b));
    }

    #[test]
    fn cancelled_subscriber_stops_receiving() {
        let (source, consumer) = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = consumer.on_value(Executor::immediate(), move |value: i32| {
            sink.lock().unwrap().push(value);
        });
        source.send(1);
        subscription.cancel();
        source.send(2);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(consumer.core().subscriber_count(), 0);
    }

    #[test]
    fn map_transforms_in_order() {
        let (source, consumer) = channel();
        let doubled = consumer.map(Executor::immediate(), |value: i32| value * 2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = doubled.on_value(Executor::immediate(), move |value| {
            sink.lock().unwrap().push(value);
        });
        source.send_all([1, 2, 3]);
        assert_eq!(*seen.lock().unwrap(), vec![2, 4, 6]);
        subscription.cancel();
    }

    #[test]
    fn derived_channel_keeps_upstream_reachable() {
        let (source, consumer) = channel();
        let mapped = consumer.map(Executor::immediate(), |value: i32| value + 1);
        // Drop the direct consumer view; the derived channel's guard must
        // keep the forwarding path alive.
        drop(consumer);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = mapped.on_value(Executor::immediate(), move |value| {
            sink.lock().unwrap().push(value);
        });
        source.send(41);
        assert_eq!(*seen.lock().unwrap(), vec![42]);
        subscription.cancel();
    }

    #[test]
    fn dropping_derived_channel_evicts_forwarding() {
        let (source, consumer) = channel::<i32>();
        {
            let _mapped = consumer.map(Executor::immediate(), |value| value + 1);
            assert_eq!(consumer.core().subscriber_count(), 1);
        }
        assert_eq!(consumer.core().subscriber_count(), 0);
        source.send(1);
    }

    #[test]
    fn context_scoped_delivery_stops_on_teardown() {
        use crate::context::ReleasePool;

        struct Owner {
            pool: ReleasePool,
            seen: Mutex<Vec<i32>>,
        }

        impl ExecutionContext for Owner {
            fn executor(&self) -> Executor {
                Executor::immediate()
            }
            fn release_pool(&self) -> &ReleasePool {
                &self.pool
            }
        }

        let (source, consumer) = channel();
        let owner = Arc::new(Owner {
            pool: ReleasePool::new(),
            seen: Mutex::new(Vec::new()),
        });
        consumer.on_value_in(&owner, None, |owner, value| {
            owner.seen.lock().unwrap().push(value);
        });
        source.send(1);
        assert_eq!(*owner.seen.lock().unwrap(), vec![1]);

        drop(owner);
        source.send(2);
        assert_eq!(consumer.core().subscriber_count(), 0);
    }
}
