//! Step (spec §4.C): a typed, immutable unit of work `I -> O`.
//!
//! Grounded on `aagt-core::pipeline::Step` (a boxed-trait-object step executed by a
//! linear runner), generalized from one fixed `Context` type to a right-associative,
//! type-indexed chain over arbitrary `I`/`O`, and from a `Vec<Box<dyn Step>>` runner to
//! recursive `StepChain` composition (spec §3's "a chain is itself a step").

pub mod chain;
pub mod combinators;

use std::sync::Arc;

use async_trait::async_trait;

use crate::continuation::ContinuationInner;
use crate::error::Result;
use crate::suspension::Suspension;

/// An immutable description of a computation mapping `I` to `O`. Steps are values:
/// they may be shared (via `Arc`) across coroutines and reused.
#[async_trait]
pub trait Step<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// An optional label, surfaced in traces and by `then(label, step)`.
    fn label(&self) -> Option<&str> {
        None
    }

    /// Execute synchronously on the calling thread. Per spec: "throws only if
    /// `execute` throws" — the cancellation short-circuit lives in the chain driver,
    /// not here.
    fn execute_blocking(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<O>;

    /// Execute asynchronously. The default forwards to [`execute_blocking`]
    /// (appropriate for pure/code steps); channel steps override this to suspend
    /// instead of completing synchronously (spec: "subclasses override `runAsync`
    /// only when they must suspend before calling the next step").
    ///
    /// [`execute_blocking`]: Step::execute_blocking
    async fn execute_async(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<O> {
        self.execute_blocking(input, cont)
    }

    /// Snapshot `input` and `continuation` into a resumable [`Suspension`] (spec
    /// §4.C/§4.E). The default produces a terminal suspension (`step == ⟂`): resuming
    /// it is a no-op on the pipeline, which is all a step that never suspends on its
    /// own needs. A step that must re-enter the pipeline on resumption (a channel
    /// receive delivering its value once one arrives) builds its `Suspension` directly
    /// via [`Suspension::reentering`] instead of going through this default.
    fn suspend(&self, input: Option<I>, cont: &Arc<ContinuationInner>) -> Suspension<I, O> {
        Suspension::terminal(self.label().map(str::to_string), input, Arc::clone(cont))
    }
}

/// Run `step` synchronously, honoring the cancellation short-circuit that must happen
/// "before scheduling or entering any step" (spec §4.C). Centralizing this here means
/// every step entry — whether reached directly or through nested `StepChain`
/// recursion — observes it exactly once.
pub(crate) fn run_blocking_checked<I, O>(
    step: &(impl Step<I, O> + ?Sized),
    input: I,
    cont: &Arc<ContinuationInner>,
) -> Result<O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    if cont.should_cancel() {
        cont.cancel();
        return Err(crate::error::Error::Cancelled);
    }
    step.execute_blocking(input, cont)
}

/// Async counterpart of [`run_blocking_checked`].
pub(crate) async fn run_async_checked<I, O>(
    step: &(impl Step<I, O> + ?Sized),
    input: I,
    cont: &Arc<ContinuationInner>,
) -> Result<O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    if cont.should_cancel() {
        cont.cancel();
        return Err(crate::error::Error::Cancelled);
    }
    step.execute_async(input, cont).await
}
