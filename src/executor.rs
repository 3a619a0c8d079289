//! Execution resources for running completion handlers.
//!
//! An [`Executor`] is the "run this closure" abstraction consumed by the
//! completion core. Two modes exist:
//!
//! - **Immediate**: runs the closure synchronously on the calling thread.
//!   This is what makes the synchronous-wait bridge possible, and also what
//!   makes it hazardous (see [`Future::wait`](crate::future::Future::wait)).
//! - **Pool**: enqueues the closure onto a shared worker [`ThreadPool`]
//!   and runs it on an arbitrary worker thread at an unspecified but
//!   eventual time.
//!
//! There is no process-wide default executor. Callers either pass an
//! executor explicitly or register through an
//! [`ExecutionContext`](crate::context::ExecutionContext), whose own
//! executor fills the gap.
//!
//! # Shutdown
//!
//! Dropping the [`ThreadPool`] drains the queue, then joins every worker.
//! Jobs submitted through surviving [`Executor`] clones after shutdown are
//! discarded with a warning event rather than an error; a discarded
//! handler behaves like one whose subscription was cancelled.

use crossbeam_queue::SegQueue;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How long an idle worker parks before re-checking the queue.
const PARK_TIMEOUT: Duration = Duration::from_millis(100);

/// An execution resource: run-inline or on a worker pool.
#[derive(Clone)]
pub struct Executor {
    kind: ExecutorKind,
}

#[derive(Clone)]
enum ExecutorKind {
    Immediate,
    Pool(Arc<PoolInner>),
}

impl Executor {
    /// Returns the executor that runs closures synchronously on the
    /// calling thread.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            kind: ExecutorKind::Immediate,
        }
    }

    /// Returns true if this is the immediate executor.
    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        matches!(self.kind, ExecutorKind::Immediate)
    }

    /// Runs `job` on this execution resource.
    ///
    /// On the immediate executor the job runs before this call returns,
    /// including any panic it raises. On a pool executor the job runs on
    /// a worker thread; panics there are caught and reported so a failing
    /// handler cannot take a worker down with it.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        match &self.kind {
            ExecutorKind::Immediate => job(),
            ExecutorKind::Pool(inner) => inner.submit(Box::new(job)),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExecutorKind::Immediate => f.write_str("Executor::Immediate"),
            ExecutorKind::Pool(inner) => f
                .debug_struct("Executor::Pool")
                .field("pending", &inner.pending.load(Ordering::Relaxed))
                .field("shutdown", &inner.shutdown.load(Ordering::Relaxed))
                .finish(),
        }
    }
}

/// Configuration for a [`ThreadPool`], resolved at construction.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    threads: usize,
    thread_name_prefix: String,
}

impl PoolConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        let threads = thread::available_parallelism().map_or(2, usize::from);
        Self {
            threads,
            thread_name_prefix: "troth-worker".to_string(),
        }
    }

    /// Sets the number of worker threads. Clamped to at least one.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct PoolInner {
    /// Work queue.
    queue: SegQueue<Job>,
    /// Shutdown flag; once set, new submissions are discarded.
    shutdown: AtomicBool,
    /// Number of jobs queued but not yet started.
    pending: AtomicUsize,
    /// Mutex for the parking condition variable.
    mutex: Mutex<()>,
    /// Condition variable workers park on when the queue is empty.
    condvar: Condvar,
}

impl PoolInner {
    fn submit(&self, job: Job) {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("job submitted after pool shutdown; discarding");
            return;
        }
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.queue.push(job);
        let _guard = self.mutex.lock().expect("pool lock poisoned");
        self.condvar.notify_one();
    }

    fn worker_loop(&self) {
        loop {
            if let Some(job) = self.queue.pop() {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("handler panicked on pool executor");
                }
                continue;
            }
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            let guard = self.mutex.lock().expect("pool lock poisoned");
            if self.queue.is_empty() && !self.shutdown.load(Ordering::Acquire) {
                let _ = self
                    .condvar
                    .wait_timeout(guard, PARK_TIMEOUT)
                    .expect("pool lock poisoned");
            }
        }
    }
}

/// A fixed-size worker thread pool backing pool-mode [`Executor`]s.
///
/// Tear pools down from an owning thread: dropping the pool from one of
/// its own workers would make that worker join itself.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Spawns the configured number of worker threads.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let inner = Arc::new(PoolInner {
            queue: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        });
        let mut workers = Vec::with_capacity(config.threads);
        for index in 0..config.threads {
            let worker_inner = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name_prefix))
                .spawn(move || worker_inner.worker_loop())
                .expect("failed to spawn pool worker");
            workers.push(handle);
        }
        tracing::debug!(threads = config.threads, "thread pool started");
        Self {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// Returns an executor that submits to this pool.
    ///
    /// Executors are cheap to clone and may outlive the pool; submissions
    /// after shutdown are discarded.
    #[must_use]
    pub fn executor(&self) -> Executor {
        Executor {
            kind: ExecutorKind::Pool(Arc::clone(&self.inner)),
        }
    }

    /// Shuts the pool down, draining queued jobs and joining workers.
    pub fn shutdown(self) {
        drop(self);
    }

    fn shutdown_internal(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        {
            let _guard = self.inner.mutex.lock().expect("pool lock poisoned");
            self.inner.condvar.notify_all();
        }
        let workers = {
            let mut guard = self.workers.lock().expect("pool lock poisoned");
            std::mem::take(&mut *guard)
        };
        for handle in workers {
            let _ = handle.join();
        }
        tracing::debug!("thread pool stopped");
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let workers = self.workers.lock().map_or(0, |w| w.len());
        f.debug_struct("ThreadPool")
            .field("workers", &workers)
            .field("pending", &self.inner.pending.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown_internal();
    }
}
