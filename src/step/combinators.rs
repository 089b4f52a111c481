//! Step combinators (spec §4.D): sequencing is `Coroutine::then` (see `coroutine.rs`);
//! this module provides conditional branching, iteration, and code-execution steps.
//!
//! Grounded on `aagt-core::pipeline::LambdaStep`, the teacher's closure-wrapping step.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::continuation::ContinuationInner;
use crate::error::{Error, Result};

use super::Step;

// ---------------------------------------------------------------------------
// Code execution: apply / supply / consume / run
// ---------------------------------------------------------------------------

/// Wraps `I -> O`, infallible. See [`apply`].
pub struct Apply<I, O, F> {
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<I, O, F> Step<I, O> for Apply<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync,
{
    fn execute_blocking(&self, input: I, _cont: &Arc<ContinuationInner>) -> Result<O> {
        Ok((self.f)(input))
    }
}

/// A pure function `I -> O`, always succeeding.
pub fn apply<I, O, F>(f: F) -> Apply<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync,
{
    Apply {
        f,
        _marker: PhantomData,
    }
}

/// Wraps a fallible `I -> Result<O>`. See [`try_apply`].
pub struct TryApply<I, O, F> {
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<I, O, F, E> Step<I, O> for TryApply<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> std::result::Result<O, E> + Send + Sync,
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    fn execute_blocking(&self, input: I, _cont: &Arc<ContinuationInner>) -> Result<O> {
        (self.f)(input).map_err(Error::step_failed)
    }
}

/// A function `I -> Result<O, E>`; failures become [`Error::StepFailed`] (spec §7).
pub fn try_apply<I, O, F, E>(f: F) -> TryApply<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> std::result::Result<O, E> + Send + Sync,
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    TryApply {
        f,
        _marker: PhantomData,
    }
}

/// Wraps a thunk `() -> O`, ignoring whatever input flows in. See [`supply`].
pub struct Supply<I, O, F> {
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<I, O, F> Step<I, O> for Supply<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn() -> O + Send + Sync,
{
    fn execute_blocking(&self, _input: I, _cont: &Arc<ContinuationInner>) -> Result<O> {
        Ok((self.f)())
    }
}

/// A thunk `() -> O` that ignores its input. Used for conditional branches whose
/// value does not depend on the incoming value (spec scenario 3).
pub fn supply<I, O, F>(f: F) -> Supply<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn() -> O + Send + Sync,
{
    Supply {
        f,
        _marker: PhantomData,
    }
}

/// Wraps a side-effecting `I -> ()`. See [`consume`].
pub struct Consume<I, F> {
    f: F,
    _marker: PhantomData<fn(I)>,
}

#[async_trait]
impl<I, F> Step<I, ()> for Consume<I, F>
where
    I: Send + 'static,
    F: Fn(&I) + Send + Sync,
{
    fn execute_blocking(&self, input: I, _cont: &Arc<ContinuationInner>) -> Result<()> {
        (self.f)(&input);
        Ok(())
    }
}

/// A side-effecting sink `I -> ()`.
pub fn consume<I, F>(f: F) -> Consume<I, F>
where
    I: Send + 'static,
    F: Fn(&I) + Send + Sync,
{
    Consume {
        f,
        _marker: PhantomData,
    }
}

/// Wraps a side-effecting `() -> ()` action that passes its input through unchanged.
/// See [`run`].
pub struct Run<I, F> {
    f: F,
    _marker: PhantomData<fn(I)>,
}

#[async_trait]
impl<I, F> Step<I, I> for Run<I, F>
where
    I: Send + 'static,
    F: Fn() + Send + Sync,
{
    fn execute_blocking(&self, input: I, _cont: &Arc<ContinuationInner>) -> Result<I> {
        (self.f)();
        Ok(input)
    }
}

/// A side-effecting action run purely for effect; the input passes through unchanged.
pub fn run<I, F>(f: F) -> Run<I, F>
where
    I: Send + 'static,
    F: Fn() + Send + Sync,
{
    Run {
        f,
        _marker: PhantomData,
    }
}

// ---------------------------------------------------------------------------
// Conditional: doIf / doIfElse / orElse
// ---------------------------------------------------------------------------

/// `doIf` with no false branch: the child runs when `predicate` is true, otherwise
/// the step (and, if this is the coroutine's last step, the whole chain) yields
/// `None` — the Rust rendition of "the coroutine terminates cleanly, result ⟂"
/// (spec §4.D).
pub struct DoIf<I, O, P> {
    predicate: P,
    then_step: Arc<dyn Step<I, O>>,
}

#[async_trait]
impl<I, O, P> Step<I, Option<O>> for DoIf<I, O, P>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    P: Fn(&I) -> bool + Send + Sync,
{
    fn execute_blocking(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<Option<O>> {
        if (self.predicate)(&input) {
            Ok(Some(self.then_step.execute_blocking(input, cont)?))
        } else {
            trace!("doIf predicate false, no else branch: terminating cleanly");
            Ok(None)
        }
    }

    async fn execute_async(
        &self,
        input: I,
        cont: &Arc<ContinuationInner>,
    ) -> Result<Option<O>> {
        if (self.predicate)(&input) {
            Ok(Some(self.then_step.execute_async(input, cont).await?))
        } else {
            trace!("doIf predicate false, no else branch: terminating cleanly");
            Ok(None)
        }
    }
}

impl<I, O, P> DoIf<I, O, P>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    P: Fn(&I) -> bool + Send + Sync,
{
    /// Attach a false-branch, turning this into the `doIfElse` form where exactly one
    /// child always runs and the result is never absent.
    pub fn or_else(self, else_step: Arc<dyn Step<I, O>>) -> DoIfElse<I, O, P> {
        DoIfElse {
            predicate: self.predicate,
            then_step: self.then_step,
            else_step,
        }
    }
}

/// Exactly one of two children executes (spec §4.D).
pub struct DoIfElse<I, O, P> {
    predicate: P,
    then_step: Arc<dyn Step<I, O>>,
    else_step: Arc<dyn Step<I, O>>,
}

#[async_trait]
impl<I, O, P> Step<I, O> for DoIfElse<I, O, P>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    P: Fn(&I) -> bool + Send + Sync,
{
    fn execute_blocking(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<O> {
        if (self.predicate)(&input) {
            self.then_step.execute_blocking(input, cont)
        } else {
            self.else_step.execute_blocking(input, cont)
        }
    }

    async fn execute_async(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<O> {
        if (self.predicate)(&input) {
            self.then_step.execute_async(input, cont).await
        } else {
            self.else_step.execute_async(input, cont).await
        }
    }
}

/// Run `then_step` only when `predicate(&input)` is true.
pub fn do_if<I, O, P>(predicate: P, then_step: Arc<dyn Step<I, O>>) -> DoIf<I, O, P>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    P: Fn(&I) -> bool + Send + Sync,
{
    DoIf {
        predicate,
        then_step,
    }
}

/// Run `then_step` when `predicate(&input)` is true, else `else_step`.
pub fn do_if_else<I, O, P>(
    predicate: P,
    then_step: Arc<dyn Step<I, O>>,
    else_step: Arc<dyn Step<I, O>>,
) -> DoIfElse<I, O, P>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    P: Fn(&I) -> bool + Send + Sync,
{
    DoIfElse {
        predicate,
        then_step,
        else_step,
    }
}

// ---------------------------------------------------------------------------
// Iteration: forEach
// ---------------------------------------------------------------------------

/// Applies `child` to each element of an incoming `Vec<T>` sequentially. In async
/// mode each element is its own suspension boundary (a `yield_now` between elements)
/// so other coroutines may interleave, but elements of a single invocation are never
/// run in parallel — ordering is preserved (spec §4.D, §9 Open Question resolved
/// toward the implementation, not the source text's suggestion).
pub struct ForEach<T, R> {
    child: Arc<dyn Step<T, R>>,
    collect: bool,
}

#[async_trait]
impl<T, R> Step<Vec<T>, Vec<R>> for ForEach<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn execute_blocking(&self, input: Vec<T>, cont: &Arc<ContinuationInner>) -> Result<Vec<R>> {
        let mut out = Vec::with_capacity(if self.collect { input.len() } else { 0 });
        for item in input {
            let r = self.child.execute_blocking(item, cont)?;
            if self.collect {
                out.push(r);
            }
        }
        Ok(out)
    }

    async fn execute_async(
        &self,
        input: Vec<T>,
        cont: &Arc<ContinuationInner>,
    ) -> Result<Vec<R>> {
        let mut out = Vec::with_capacity(if self.collect { input.len() } else { 0 });
        for item in input {
            if cont.should_cancel() {
                cont.cancel();
                return Err(Error::Cancelled);
            }
            let r = self.child.execute_async(item, cont).await?;
            if self.collect {
                out.push(r);
            }
            // Per-element suspension boundary: let other coroutines interleave.
            tokio::task::yield_now().await;
        }
        Ok(out)
    }
}

/// Apply `child` to each element, discarding outputs (iteration's output is unit,
/// realized here as an always-empty `Vec<()>` to keep one `ForEach` type for both
/// modes — see [`for_each`] vs [`for_each_collecting`]).
pub fn for_each<T, R>(child: Arc<dyn Step<T, R>>) -> ForEach<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    ForEach {
        child,
        collect: false,
    }
}

/// Apply `child` to each element, collecting outputs into a `Vec<R>` in order.
pub fn for_each_collecting<T, R>(child: Arc<dyn Step<T, R>>) -> ForEach<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    ForEach {
        child,
        collect: true,
    }
}
