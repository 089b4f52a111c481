//! Continuation (spec §4.I / §3): per-run state carrier and result sink.
//!
//! `ContinuationInner` is untyped (results are boxed behind `dyn Any`) so that `Step`
//! implementations never need to thread the coroutine's *final* output type through
//! every intermediate step's own generics — see the note in `SPEC_FULL.md` §3. The
//! public, typed [`Continuation<O>`] is a thin wrapper applied at the boundary where a
//! caller actually wants a concrete `O` back (`scope.async`/`scope.blocking`'s return
//! value, `get_result`).

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::attributes::AttributeStore;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::scope::ScopeInner;

/// The continuation's finalization state (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// Still executing.
    Running = 0,
    /// Completed normally; a result is available.
    Finished = 1,
    /// Completed with a step failure; an error is available.
    Failed = 2,
    /// Cancelled before completion; result is absent.
    Cancelled = 3,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => State::Running,
            1 => State::Finished,
            2 => State::Failed,
            _ => State::Cancelled,
        }
    }
}

type FinishListener = Box<dyn FnOnce(&ContinuationInner) + Send>;

/// Untyped per-run state, shared (via `Arc`) between the chain driver, suspensions,
/// and both the typed [`Continuation<O>`] handles and any `onFinish` listeners.
pub struct ContinuationInner {
    run_id: Uuid,
    state: AtomicU8,
    result: Mutex<Option<Box<dyn Any + Send + Sync>>>,
    error: Mutex<Option<Error>>,
    done: Notify,
    listeners: Mutex<Vec<FinishListener>>,
    pub(crate) attributes: AttributeStore,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) scope: Weak<ScopeInner>,
}

impl ContinuationInner {
    pub(crate) fn new(executor: Arc<dyn Executor>, scope: Weak<ScopeInner>) -> Arc<Self> {
        Arc::new(Self {
            run_id: Uuid::new_v4(),
            state: AtomicU8::new(State::Running as u8),
            result: Mutex::new(None),
            error: Mutex::new(None),
            done: Notify::new(),
            listeners: Mutex::new(Vec::new()),
            attributes: AttributeStore::new(),
            executor,
            scope,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_done(&self) -> bool {
        self.state() != State::Running
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == State::Cancelled
    }

    /// True if this continuation should short-circuit at the next step boundary:
    /// either it was cancelled directly, or the scope containing it was cancelled.
    pub fn should_cancel(&self) -> bool {
        if self.is_cancelled() {
            return true;
        }
        self.scope
            .upgrade()
            .map(|s| s.is_cancelled())
            .unwrap_or(false)
    }

    /// Finalize with a successful result. A no-op if already finalized (P7).
    pub(crate) fn finish(self: &Arc<Self>, value: Box<dyn Any + Send + Sync>) {
        if self
            .state
            .compare_exchange(
                State::Running as u8,
                State::Finished as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            *self.result.lock() = Some(value);
            trace!(run_id = %self.run_id, "continuation finished");
            self.release();
        }
    }

    /// Finalize with a failure. A no-op if already finalized (P7).
    pub(crate) fn fail(self: &Arc<Self>, error: Error) {
        if self
            .state
            .compare_exchange(
                State::Running as u8,
                State::Failed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            debug!(run_id = %self.run_id, %error, "continuation failed");
            *self.error.lock() = Some(error);
            self.release();
        }
    }

    /// Cancel this continuation. A no-op if already finalized (P5/P7).
    pub fn cancel(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(
                State::Running as u8,
                State::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            trace!(run_id = %self.run_id, "continuation cancelled");
            *self.error.lock() = Some(Error::Cancelled);
            self.release();
        }
    }

    fn release(self: &Arc<Self>) {
        self.done.notify_waiters();
        let listeners = std::mem::take(&mut *self.listeners.lock());
        let this = Arc::clone(self);
        self.executor.spawn(Box::pin(async move {
            for listener in listeners {
                listener(&this);
            }
        }));
    }

    /// Register a callback invoked (on the continuation's executor) once finalized.
    /// If already done, the callback is scheduled immediately.
    pub fn on_finish<F>(self: &Arc<Self>, callback: F)
    where
        F: FnOnce(&ContinuationInner) + Send + 'static,
    {
        if self.is_done() {
            let this = Arc::clone(self);
            self.executor
                .spawn(Box::pin(async move { callback(&this) }));
        } else {
            self.listeners.lock().push(Box::new(callback));
        }
    }

    /// Extract the typed result of an already-finalized continuation. Panics (via
    /// `unreachable!`) if called before finalization — callers are expected to have
    /// awaited [`await_done`] or otherwise know the run has already completed.
    ///
    /// [`await_done`]: ContinuationInner::await_done
    pub(crate) fn extract_result<O: Send + Sync + 'static>(&self) -> Result<O> {
        match self.state() {
            State::Finished => {
                let mut guard = self.result.lock();
                let boxed = match guard.take() {
                    Some(boxed) => boxed,
                    None => return Err(Error::internal("finished continuation missing result")),
                };
                match boxed.downcast::<O>() {
                    Ok(value) => Ok(*value),
                    Err(boxed) => {
                        *guard = Some(boxed);
                        Err(Error::internal("continuation result type mismatch"))
                    }
                }
            }
            State::Failed => Err(self
                .error
                .lock()
                .take()
                .unwrap_or_else(|| Error::internal("failed continuation missing error"))),
            State::Cancelled => Err(Error::Cancelled),
            State::Running => unreachable!("extract_result called before finalization"),
        }
    }

    /// The context of the scope this continuation belongs to, if the scope is still
    /// alive. Steps use this to resolve channel ids without threading a `Context`
    /// parameter through every `Step::execute_*` signature.
    pub(crate) fn context(&self) -> Option<Arc<crate::context::CoroutineContext>> {
        self.scope.upgrade().map(|s| s.context())
    }

    /// Block the calling thread until finalized.
    pub async fn await_done(self: &Arc<Self>) {
        loop {
            if self.is_done() {
                return;
            }
            let notified = self.done.notified();
            if self.is_done() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for ContinuationInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationInner")
            .field("run_id", &self.run_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Per-run state carrier and result sink for a [`crate::coroutine::Coroutine`] run,
/// typed by the coroutine's output `O` (spec §3/§4.I).
pub struct Continuation<O> {
    pub(crate) inner: Arc<ContinuationInner>,
    _marker: PhantomData<fn() -> O>,
}

impl<O> Clone for Continuation<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<O: Send + Sync + 'static> Continuation<O> {
    pub(crate) fn new(inner: Arc<ContinuationInner>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Internal handle, used by the step/chain machinery to avoid threading `O`.
    pub(crate) fn inner(&self) -> &Arc<ContinuationInner> {
        &self.inner
    }

    pub fn run_id(&self) -> Uuid {
        self.inner.run_id()
    }

    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn state(&self) -> State {
        self.inner.state()
    }

    /// Block (asynchronously) until done, then return the result or the stored error.
    /// A cancelled continuation returns [`Error::Cancelled`].
    pub async fn get_result(&self) -> Result<O> {
        self.inner.await_done().await;
        self.inner.extract_result::<O>()
    }

    /// The stored error, if this continuation failed or was cancelled.
    pub fn get_error(&self) -> Option<Error> {
        match self.inner.state() {
            State::Failed => self.inner.error.lock().clone(),
            State::Cancelled => Some(Error::Cancelled),
            _ => None,
        }
    }

    /// Request cancellation. Idempotent; only the first call (direct or via the
    /// owning scope) takes effect (P7).
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Attribute-store accessor.
    pub fn attributes(&self) -> &AttributeStore {
        &self.inner.attributes
    }

    /// The context this run's scope belongs to, if that scope is still alive (spec
    /// §4.I `getContext`).
    pub fn get_context(&self) -> Option<Arc<crate::context::CoroutineContext>> {
        self.inner.context()
    }

    /// The scope this run was launched into, if it is still alive (spec §4.I
    /// `getScope`).
    pub fn get_scope(&self) -> Option<Arc<ScopeInner>> {
        self.inner.scope.upgrade()
    }

    /// Register a listener invoked once this continuation finalizes.
    pub fn on_finish<F>(&self, callback: F)
    where
        F: FnOnce(State) + Send + 'static,
    {
        self.inner
            .on_finish(move |inner| callback(inner.state()));
    }
}
