//! Periodic timer channels.

use super::{Channel, ChannelCore};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Creates a channel that delivers one unit value per `interval`, with
/// the first tick one interval after creation.
///
/// The producing thread holds only a weak reference to the channel:
/// releasing the last external reference (direct, or derived through
/// [`Channel::map`] and [`Channel::buffered`]) stops the timer within
/// one interval. Tick targets are computed from the
/// creation instant (`start + k * interval`), so scheduling error does
/// not accumulate across ticks.
///
/// # Panics
///
/// Panics if `interval` is zero.
#[must_use]
pub fn timer(interval: Duration) -> Channel<()> {
    assert!(interval > Duration::ZERO, "timer interval must be non-zero");

    let core = ChannelCore::new();
    let weak = Arc::downgrade(&core);
    thread::Builder::new()
        .name("troth-timer".to_string())
        .spawn(move || {
            let start = Instant::now();
            for tick in 1u32.. {
                let target = start + interval * tick;
                let now = Instant::now();
                if target > now {
                    thread::sleep(target - now);
                }
                match weak.upgrade() {
                    Some(core) => core.send(()),
                    None => break,
                }
            }
            tracing::debug!("timer channel released; producer stopped");
        })
        .expect("failed to spawn timer thread");
    tracing::debug!(?interval, "timer channel started");
    Channel::from_core(core)
}
