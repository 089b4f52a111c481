//! Coroutine (spec §3): a named, typed step chain plus an attribute bag, runnable
//! standalone or launched into a [`crate::scope::CoroutineScope`].
//!
//! Grounded on `aagt-core::pipeline::Pipeline`, generalized from a fixed linear `Vec`
//! of boxed steps to the right-nested `StepChain` built up by [`Coroutine::then`].

use std::sync::{Arc, Weak};

use tracing::{instrument, trace};

use crate::attributes::AttributeStore;
use crate::continuation::ContinuationInner;
use crate::error::Result;
use crate::executor::Executor;
use crate::step::chain::{FinishStep, Labeled, StepChain};
use crate::step::{run_async_checked, run_blocking_checked, Step};

/// A named chain of steps from `I` to `O`, with its own attribute bag (spec §3 — a
/// `Coroutine` is "a `Step` plus a name and attributes").
pub struct Coroutine<I, O> {
    name: Option<String>,
    body: Arc<dyn Step<I, O>>,
    attributes: Arc<AttributeStore>,
}

impl<I, O> Coroutine<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    /// Start a new coroutine whose sole step is `step`.
    pub fn first<S>(step: S) -> Self
    where
        S: Step<I, O> + 'static,
    {
        Self {
            name: None,
            body: Arc::new(step),
            attributes: Arc::new(AttributeStore::new()),
        }
    }

    /// Attach a human-readable name, surfaced in traces.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Append `step`, producing a coroutine from `I` to the new step's output `T`
    /// (spec §3's chain composition — the previous body becomes the chain's `first`).
    pub fn then<T, S>(self, step: S) -> Coroutine<I, T>
    where
        T: Send + Sync + 'static,
        S: Step<O, T> + 'static,
    {
        Coroutine {
            name: self.name,
            body: Arc::new(StepChain::new(self.body, Arc::new(step))),
            attributes: self.attributes,
        }
    }

    /// Like [`then`], but the appended step carries `label` (surfaced by its
    /// [`Step::label`]).
    ///
    /// [`then`]: Coroutine::then
    pub fn then_labeled<T, S>(self, label: impl Into<String>, step: S) -> Coroutine<I, T>
    where
        T: Send + Sync + 'static,
        S: Step<O, T> + 'static,
    {
        self.then(Labeled::new(label, step))
    }

    /// Run this coroutine synchronously on the calling thread, outside of any scope.
    /// Cancellation can still be observed if `ContinuationInner::cancel` is called
    /// concurrently from elsewhere (e.g. by a holder of the returned `Continuation`
    /// before this call even starts), but there is no scope to cascade a cancellation
    /// from.
    #[instrument(level = "debug", skip_all, fields(name = self.name.as_deref()))]
    pub fn run_blocking(&self, input: I, executor: Arc<dyn Executor>) -> Result<O> {
        let cont = ContinuationInner::new(executor, Weak::new());
        let terminated = StepChain::new(Arc::clone(&self.body), Arc::new(FinishStep::<O>::new()));
        if let Err(e) = run_blocking_checked(&terminated, input, &cont) {
            if e.is_cancelled() {
                cont.cancel();
            } else {
                cont.fail(e.into_propagated());
            }
        }
        cont.extract_result::<O>()
    }

    /// Run this coroutine asynchronously, outside of any scope, waiting for completion
    /// and returning its result (or error) directly. Produces identical results to
    /// [`run_blocking`] for the same input on a chain of pure steps (spec §8 P1).
    ///
    /// [`run_blocking`]: Coroutine::run_blocking
    pub async fn run_async(&self, input: I, executor: Arc<dyn Executor>) -> Result<O> {
        let cont = ContinuationInner::new(executor, Weak::new());
        self.drive(input, &cont).await;
        cont.extract_result::<O>()
    }

    /// Drive this coroutine to completion against an existing continuation (used by
    /// [`crate::scope::CoroutineScope::spawn`], which has already created the
    /// continuation so it can hand a handle back to the caller before the run starts).
    pub(crate) async fn drive(&self, input: I, cont: &Arc<ContinuationInner>) {
        trace!(name = ?self.name, "coroutine starting");
        let terminated = StepChain::new(Arc::clone(&self.body), Arc::new(FinishStep::<O>::new()));
        if let Err(e) = run_async_checked(&terminated, input, cont).await {
            if e.is_cancelled() {
                cont.cancel();
            } else {
                cont.fail(e.into_propagated());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TokioExecutor;
    use crate::step::combinators::apply;

    #[tokio::test]
    async fn single_step_coroutine_runs_to_completion() {
        let coroutine = Coroutine::first(apply(|x: i32| x + 1)).named("increment");
        let executor = TokioExecutor::current();
        let result = coroutine.run_blocking(41, executor).unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn chained_steps_run_in_order() {
        let coroutine = Coroutine::first(apply(|x: i32| x * 2)).then(apply(|x: i32| x + 1));
        let executor = TokioExecutor::current();
        let result = coroutine.run_blocking(10, executor).unwrap();
        assert_eq!(result, 21);
    }

    #[tokio::test]
    async fn blocking_and_async_agree_for_pure_chains() {
        let coroutine = Coroutine::first(apply(|x: i32| x * 2)).then(apply(|x: i32| x + 1));
        let blocking = coroutine.run_blocking(10, TokioExecutor::current()).unwrap();
        let asynced = coroutine.run_async(10, TokioExecutor::current()).await.unwrap();
        assert_eq!(blocking, asynced);
    }
}
