//! Executor service (spec §4.A): runs scheduled work units on worker threads and
//! supplies the clock the rest of the runtime schedules against.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::trace;

use crate::error::{Error, Result};

/// A unit of work submitted to an [`Executor`].
pub type Task = BoxFuture<'static, ()>;

/// The executor contract: submit a unit of work to run on a worker thread, and read
/// the clock used for relative timing elsewhere in the runtime.
///
/// An injectable collaborator — the default is [`TokioExecutor`], a shared pool sized
/// to available parallelism, but any implementation (a test executor that runs tasks
/// inline, a single-threaded one, etc.) can be substituted.
pub trait Executor: Send + Sync {
    /// Schedule `task` to run on a worker thread. Returns once the task is accepted;
    /// the task itself completes asynchronously.
    fn spawn(&self, task: Task);

    /// The executor's notion of "now", used for relative timing (e.g. demo timeouts
    /// expressed as a companion coroutine with a delay step). Cancellation of an
    /// already-scheduled unit is best-effort and not modeled here.
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Convenience: run an async body on `executor` and await its result through a oneshot,
/// used internally by steps and suspensions that need to "schedule, then wait."
pub(crate) fn spawn_and_await<T, F>(
    executor: &Arc<dyn Executor>,
    fut: F,
) -> Pin<Box<dyn Future<Output = Result<T>> + Send>>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    executor.spawn(Box::pin(async move {
        let value = fut.await;
        let _ = tx.send(value);
    }));
    Box::pin(async move {
        rx.await
            .map_err(|_| Error::internal("executor dropped task before completion"))
    })
}

/// Default executor: a thin wrapper over a `tokio::runtime::Handle`.
///
/// When constructed via [`TokioExecutor::current`] it reuses the ambient Tokio
/// runtime (the common case inside `#[tokio::main]`/`#[tokio::test]`); when
/// constructed via [`TokioExecutor::new_multi_thread`] it owns a fresh runtime sized
/// to `std::thread::available_parallelism()`.
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
    // Keeps an owned runtime alive for the lifetime of this executor, if we built one.
    _owned: Option<Arc<tokio::runtime::Runtime>>,
}

impl TokioExecutor {
    /// Wrap the currently-running Tokio runtime. Panics outside of a Tokio context,
    /// matching `tokio::runtime::Handle::current`'s contract.
    pub fn current() -> Arc<dyn Executor> {
        Arc::new(Self {
            handle: tokio::runtime::Handle::current(),
            _owned: None,
        })
    }

    /// Build and own a fresh multi-threaded runtime, sized to available parallelism.
    pub fn new_multi_thread() -> Result<Arc<dyn Executor>> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .enable_all()
            .build()
            .map_err(|e| Error::internal(format!("failed to build runtime: {e}")))?;
        let handle = runtime.handle().clone();
        Ok(Arc::new(Self {
            handle,
            _owned: Some(Arc::new(runtime)),
        }))
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, task: Task) {
        trace!("scheduling task on tokio executor");
        self.handle.spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn current_executor_runs_spawned_work() {
        let executor = TokioExecutor::current();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        let result = spawn_and_await(&executor, async move {
            ran_clone.store(true, Ordering::SeqCst);
            7
        })
        .await
        .unwrap();
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(result, 7);
    }
}
