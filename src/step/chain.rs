//! `StepChain` and `FinishStep` (spec §3): the composite and terminal step kinds.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::continuation::ContinuationInner;
use crate::error::Result;

use super::{run_async_checked, run_blocking_checked, Step};

/// A step composed of `first: Step<I,T>` and `next: Step<T,O>` (spec §3). A chain is
/// itself a [`Step`] and may be nested — `Coroutine::then` builds new chains by
/// wrapping the previous one as `first` and the appended step as `next`, so appending
/// never touches (or copies) the existing head.
pub struct StepChain<I, T, O> {
    pub(crate) first: Arc<dyn Step<I, T>>,
    pub(crate) next: Arc<dyn Step<T, O>>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, T, O> StepChain<I, T, O>
where
    I: Send + 'static,
    T: Send + 'static,
    O: Send + 'static,
{
    pub fn new(first: Arc<dyn Step<I, T>>, next: Arc<dyn Step<T, O>>) -> Self {
        Self {
            first,
            next,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<I, T, O> Step<I, O> for StepChain<I, T, O>
where
    I: Send + 'static,
    T: Send + 'static,
    O: Send + 'static,
{
    fn execute_blocking(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<O> {
        let mid = run_blocking_checked(&*self.first, input, cont)?;
        run_blocking_checked(&*self.next, mid, cont)
    }

    async fn execute_async(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<O> {
        let mid = run_async_checked(&*self.first, input, cont).await?;
        run_async_checked(&*self.next, mid, cont).await
    }
}

/// Terminal identity step: its sole effect is to install the incoming value as the
/// continuation's result (spec §3). Modeled as `Step<T, ()>` rather than `Step<T, T>`:
/// installing the result moves `T` into the continuation, and nothing is ever chained
/// after a finish step, so there is no caller left to observe a returned `T`.
pub struct FinishStep<T> {
    _marker: PhantomData<fn(T)>,
}

impl<T> Default for FinishStep<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> FinishStep<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Step<T, ()> for FinishStep<T> {
    fn execute_blocking(&self, input: T, cont: &Arc<ContinuationInner>) -> Result<()> {
        cont.finish(Box::new(input));
        Ok(())
    }
}

/// Wraps a step to override its `label()`, backing `Coroutine::then(label, step)`.
pub(crate) struct Labeled<S> {
    inner: S,
    label: String,
}

impl<S> Labeled<S> {
    pub(crate) fn new(label: impl Into<String>, inner: S) -> Self {
        Self {
            inner,
            label: label.into(),
        }
    }
}

#[async_trait]
impl<I, O, S> Step<I, O> for Labeled<S>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Step<I, O>,
{
    fn label(&self) -> Option<&str> {
        Some(&self.label)
    }

    fn execute_blocking(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<O> {
        self.inner.execute_blocking(input, cont)
    }

    async fn execute_async(&self, input: I, cont: &Arc<ContinuationInner>) -> Result<O> {
        self.inner.execute_async(input, cont).await
    }
}
