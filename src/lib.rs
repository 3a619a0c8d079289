//! Troth: single-assignment futures, context-scoped completion handlers,
//! and channels built on them.
//!
//! # Overview
//!
//! Producer code completes a [`Promise`] exactly once from any thread;
//! consumer code subscribes to the matching [`Future`] with explicit
//! control over which [`Executor`] runs the continuation and over the
//! subscription's lifetime relative to an owning object.
//!
//! # Core Guarantees
//!
//! - **Exactly-once completion**: concurrent completers serialize; one
//!   wins, the rest are no-ops, every query observes the same value
//! - **No missed notification**: subscribing after completion fires
//!   immediately; subscribing before queues and fires on completion
//! - **Owner-controlled lifetime**: context-scoped handlers hold their
//!   owner weakly and are evicted the moment the owner is torn down
//! - **No silent hangs**: a promise dropped while pending fails its
//!   dependents with a distinguished [`ConcurrencyError::Abandoned`]
//! - **No orphaned producers**: a timer channel stops ticking once the
//!   last direct or derived reference is released
//!
//! # Module Structure
//!
//! - [`fallible`]: the success-or-failure sum type carried by completions
//! - [`error`]: distinguished failures produced by the core
//! - [`executor`]: immediate and worker-pool execution resources
//! - [`context`]: execution contexts and the release pool
//! - [`future`]: the completion state machine, wait, combinators, makers
//! - [`channel`]: multi-value channels, timer source, buffering bridge
//!
//! # Example
//!
//! ```
//! use troth::{PoolConfig, Promise, ThreadPool};
//!
//! let pool = ThreadPool::new(PoolConfig::new().with_threads(2));
//! let promise = Promise::new();
//! let doubled = promise
//!     .future()
//!     .lift_success(pool.executor(), |value: i32| Ok(value * 2));
//! promise.succeed(21);
//! assert_eq!(doubled.wait().into_success(), Some(42));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod channel;
pub mod context;
pub mod error;
pub mod executor;
pub mod fallible;
pub mod future;

pub use channel::{channel, timer, Channel, ChannelSource, ChannelSubscription};
pub use context::{ExecutionContext, ReleasePool};
pub use error::ConcurrencyError;
pub use executor::{Executor, PoolConfig, ThreadPool};
pub use fallible::{Failure, Fallible};
pub use future::combinator::combine;
pub use future::{Future, Promise, Subscription};
