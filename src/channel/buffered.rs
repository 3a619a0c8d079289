//! One-shot bridge from a channel back to a future.

use super::Channel;
use crate::executor::Executor;
use crate::fallible::Fallible;
use crate::future::Future;
use std::sync::Arc;

impl<T: Clone + Send + 'static> Channel<T> {
    /// Accumulates the first `capacity` values in emission order and
    /// completes the returned future with them; later values are ignored.
    ///
    /// The pending future keeps this channel (and therefore its producer)
    /// alive; completion, or dropping the future, releases it. The
    /// accumulator itself only holds the future weakly, so no reference
    /// cycle forms.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn buffered(&self, capacity: usize) -> Future<Vec<T>> {
        assert!(capacity > 0, "buffered capacity must be positive");

        let future = Future::new_pending();
        let weak = future.downgrade();
        let mut buffer = Some(Vec::with_capacity(capacity));
        let subscription = self.on_value(Executor::immediate(), move |value| {
            let full = if let Some(buffer) = buffer.as_mut() {
                buffer.push(value);
                buffer.len() == capacity
            } else {
                false
            };
            if full {
                if let Some(values) = buffer.take() {
                    weak.complete(Fallible::Success(values));
                }
            }
        });
        future.set_keep_alive(Arc::new((self.clone(), subscription)));
        future
    }
}
