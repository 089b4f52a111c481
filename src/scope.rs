//! CoroutineScope (spec §4.H): a structured-concurrency bracket. Coroutines launched
//! into a scope are tracked by a running count; `join()` waits for that count to drain
//! to zero, and `cancel()` propagates to every continuation still running under it.
//!
//! Grounded on `aagt-core::agent::scheduler`'s task-group bookkeeping, generalized from
//! a fixed agent-task accounting scheme to the spec's counter-plus-latch rearm pattern
//! (spec Design Notes §9), which this implementation preserves literally rather than
//! substituting `tokio::sync::Notify`'s own (non-rearm-needing) wakeup semantics.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::attributes::AttributeStore;
use crate::continuation::{Continuation, ContinuationInner};
use crate::context::CoroutineContext;
use crate::coroutine::Coroutine;
use crate::error::Result;

/// Shared state behind a [`CoroutineScope`] (spec §4.H). Kept as a separate `Inner`
/// type (rather than folding into `CoroutineScope` itself) so a [`ContinuationInner`]
/// can hold a `Weak<ScopeInner>` back-reference without creating a reference cycle
/// through the public handle.
pub struct ScopeInner {
    context: Arc<CoroutineContext>,
    running: AtomicUsize,
    /// Re-armed (replaced with a fresh `Notify`) exactly on the 0 -> 1 transition of
    /// `running`, per spec Design Notes §9. `join()` snapshots the current `Notify`
    /// before re-checking `running`, so a completion that races the check is never
    /// missed: either `running` is already 0 when checked, or the snapshotted `Notify`
    /// is still the one that will be woken by the decrement that takes it to 0.
    latch: Mutex<Arc<Notify>>,
    cancelled: AtomicBool,
    attributes: AttributeStore,
}

impl ScopeInner {
    pub(crate) fn context(&self) -> Arc<CoroutineContext> {
        Arc::clone(&self.context)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn running_count(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    fn enter(&self) {
        if self.running.fetch_add(1, Ordering::AcqRel) == 0 {
            let mut latch = self.latch.lock();
            *latch = Arc::new(Notify::new());
        }
    }

    fn leave(&self) {
        if self.running.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.latch.lock().notify_waiters();
        }
    }

    /// Wait until no coroutine launched into this scope is still running.
    pub async fn join(&self) {
        loop {
            if self.running_count() == 0 {
                return;
            }
            let current = Arc::clone(&self.latch.lock());
            if self.running_count() == 0 {
                return;
            }
            current.notified().await;
        }
    }

    /// Request cancellation of every coroutine running under this scope. Cooperative:
    /// takes effect the next time each continuation's chain checks `should_cancel`
    /// (spec §4.C/§6 — cancellation is checked at step boundaries, not preemptive).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        trace!("scope cancelled");
    }
}

/// A structured-concurrency bracket (spec §4.H). Every coroutine launched through a
/// scope is tracked, and the scope's `join`/`cancel` operate over the whole group —
/// a child never outlives the scope that launched it.
pub struct CoroutineScope {
    inner: Arc<ScopeInner>,
    handle: u64,
}

impl CoroutineScope {
    /// Open a new scope against `context`.
    pub fn new(context: Arc<CoroutineContext>) -> Self {
        let inner = Arc::new(ScopeInner {
            context: Arc::clone(&context),
            running: AtomicUsize::new(0),
            latch: Mutex::new(Arc::new(Notify::new())),
            cancelled: AtomicBool::new(false),
            attributes: AttributeStore::new(),
        });
        let handle = context.register_scope(Arc::clone(&inner));
        Self { inner, handle }
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.inner.attributes
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn running_count(&self) -> usize {
        self.inner.running_count()
    }

    pub(crate) fn inner(&self) -> &Arc<ScopeInner> {
        &self.inner
    }

    /// Launch `coroutine` with `input`, returning immediately with a [`Continuation`]
    /// the caller can await independently (spec's `scope.async`; renamed because
    /// `async` is a reserved word in Rust).
    pub fn spawn<I, O>(&self, coroutine: Arc<Coroutine<I, O>>, input: I) -> Continuation<O>
    where
        I: Send + 'static,
        O: Send + Sync + 'static,
    {
        let executor = self.inner.context.executor();
        let cont_inner = ContinuationInner::new(Arc::clone(&executor), Arc::downgrade(&self.inner));
        let continuation = Continuation::new(Arc::clone(&cont_inner));

        self.inner.enter();
        let scope_inner = Arc::clone(&self.inner);
        let run_fut = drive_coroutine(coroutine, input, Arc::clone(&cont_inner));
        executor.spawn(Box::pin(async move {
            run_fut.await;
            scope_inner.leave();
        }));

        continuation
    }

    /// Launch `coroutine` with `input` and block (asynchronously) until it completes,
    /// returning its result directly (spec's `scope.blocking`).
    pub async fn blocking<I, O>(&self, coroutine: Arc<Coroutine<I, O>>, input: I) -> Result<O>
    where
        I: Send + 'static,
        O: Send + Sync + 'static,
    {
        let continuation = self.spawn(coroutine, input);
        continuation.get_result().await
    }

    /// Wait for every coroutine launched into this scope to finish.
    pub async fn join(&self) {
        self.inner.join().await;
    }

    /// Cancel every coroutine running under this scope.
    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl Drop for CoroutineScope {
    fn drop(&mut self) {
        self.inner.context.unregister_scope(self.handle);
    }
}

async fn drive_coroutine<I, O>(coroutine: Arc<Coroutine<I, O>>, input: I, cont: Arc<ContinuationInner>)
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    coroutine.drive(input, &cont).await;
}
