//! Blocking bridge from the async completion protocol to a calling
//! thread.
//!
//! The bridge registers an immediate-executor handler that stores the
//! completion into a one-shot cell and signals a condition variable, then
//! blocks the calling thread on that signal. On timeout the subscription
//! is dropped, evicting the handler so a later completion finds nobody
//! listening.
//!
//! # Deadlock hazard
//!
//! Because the handler runs on the immediate executor (the completer's
//! thread), waiting from the same single-threaded execution resource the
//! future depends on in order to complete will deadlock. This is a
//! documented caller responsibility; the library does not detect it.

use super::Future;
use crate::executor::Executor;
use crate::fallible::Fallible;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

struct WaitCell<T> {
    slot: Mutex<Option<Fallible<T>>>,
    signal: Condvar,
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Blocks until the future completes, then returns the completion.
    ///
    /// Returns immediately without blocking if already complete. See the
    /// module docs for the single-threaded-executor deadlock hazard.
    #[must_use]
    pub fn wait(&self) -> Fallible<T> {
        self.wait_internal(None)
            .expect("deadline-less wait always yields a completion")
    }

    /// Blocks until the future completes or `timeout` elapses.
    ///
    /// Returns `None` on timeout; "timed out" is distinct from "failed".
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Fallible<T>> {
        self.wait_internal(Some(Instant::now() + timeout))
    }

    /// Blocks until the future completes or `deadline` passes.
    #[must_use]
    pub fn wait_deadline(&self, deadline: Instant) -> Option<Fallible<T>> {
        self.wait_internal(Some(deadline))
    }

    fn wait_internal(&self, deadline: Option<Instant>) -> Option<Fallible<T>> {
        if let Some(completion) = self.completion() {
            return Some(completion);
        }

        let cell = Arc::new(WaitCell {
            slot: Mutex::new(None),
            signal: Condvar::new(),
        });
        let stored = Arc::clone(&cell);
        let subscription = self.subscribe(Executor::immediate(), move |value| {
            let mut slot = stored.slot.lock().expect("wait cell lock poisoned");
            *slot = Some(value);
            stored.signal.notify_all();
        });

        let mut slot = cell.slot.lock().expect("wait cell lock poisoned");
        loop {
            if let Some(value) = slot.take() {
                // Completed; the subscription (if any) fired already and
                // dropping it is a no-op.
                return Some(value);
            }
            match deadline {
                None => {
                    slot = cell
                        .signal
                        .wait(slot)
                        .expect("wait cell lock poisoned");
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        drop(slot);
                        // Evict the handler so it becomes a no-op if the
                        // future later completes.
                        drop(subscription);
                        return None;
                    }
                    let (guard, _) = cell
                        .signal
                        .wait_timeout(slot, deadline - now)
                        .expect("wait cell lock poisoned");
                    slot = guard;
                }
            }
        }
    }
}
