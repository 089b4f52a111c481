//! Suspension (spec §4.E): a captured, resumable step invocation. A step that must
//! wait for an external event (a channel rendezvous) returns a `Suspension<I, O>`
//! instead of completing inline; it carries the input known at suspension time (if
//! any), the step to re-enter on resumption (or `⟂`, in which case resuming is a
//! pipeline no-op), and the continuation the run belongs to.
//!
//! Grounded on `aagt-core::bus::message_bus`'s oneshot-backed reply slots, generalized
//! from a fixed reply envelope to an arbitrary, re-enterable `Step<I, O>`.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::continuation::ContinuationInner;
use crate::error::{Error, Result};
use crate::step::{run_async_checked, Step};

/// A parked step invocation (spec §4.E). `step == None` (⟂) marks a suspension that
/// exists purely for an external observer to finalize work against — resuming it is a
/// no-op on the pipeline (spec's own example: a "message sent" notification). A
/// suspension carrying `step == Some(..)` re-enters that step on resumption, scheduled
/// as a fresh async stage on the continuation's executor.
pub struct Suspension<I, O> {
    label: Option<String>,
    captured_input: Option<I>,
    step: Option<Arc<dyn Step<I, O>>>,
    cont: Arc<ContinuationInner>,
}

impl<I, O> fmt::Debug for Suspension<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("label", &self.label)
            .field("has_input", &self.captured_input.is_some())
            .field("has_step", &self.step.is_some())
            .finish()
    }
}

impl<I: Send + 'static, O: Send + 'static> Suspension<I, O> {
    /// A terminal suspension (`step == ⟂`): resuming it only validates that an input
    /// was captured (when one was) and otherwise has no further effect on the pipeline.
    pub(crate) fn terminal(label: Option<String>, input: Option<I>, cont: Arc<ContinuationInner>) -> Self {
        Self {
            label,
            captured_input: input,
            step: None,
            cont,
        }
    }

    /// A re-entering suspension: resuming it schedules a fresh async stage that runs
    /// `step` against the resolved value and reports failure back onto `cont` (spec
    /// §4.E: "schedules a fresh async stage ... then invokes `step.runAsync`").
    pub(crate) fn reentering(
        label: Option<String>,
        input: Option<I>,
        step: Arc<dyn Step<I, O>>,
        cont: Arc<ContinuationInner>,
    ) -> Self {
        Self {
            label,
            captured_input: input,
            step: Some(step),
            cont,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The step this suspension re-enters on resumption, or `None` if it is terminal
    /// (`step == ⟂`).
    pub fn step(&self) -> Option<&Arc<dyn Step<I, O>>> {
        self.step.as_ref()
    }

    pub fn continuation(&self) -> &Arc<ContinuationInner> {
        &self.cont
    }

    /// Resume using the input captured at suspension time. Errors if this suspension
    /// carries a pipeline step but no captured input — such a suspension can only be
    /// resumed via [`resume_with`](Self::resume_with).
    pub fn resume(self) -> Result<()> {
        if self.step.is_none() {
            trace!(run_id = %self.cont.run_id(), label = ?self.label, "suspension resumed (step is \u{27c2}, pipeline no-op)");
            return Ok(());
        }
        let Suspension {
            label,
            captured_input,
            step,
            cont,
        } = self;
        let value = captured_input.ok_or_else(|| {
            Error::internal("suspension has a pipeline step but no captured input; use resume_with")
        })?;
        Self::reenter(label, value, step.expect("checked above"), cont);
        Ok(())
    }

    /// Resume substituting `value` for whatever input was captured — the common case
    /// for a suspended channel receive, whose value is unknown until resumption.
    pub fn resume_with(self, value: I) -> Result<()> {
        let Suspension { label, step, cont, .. } = self;
        match step {
            None => {
                trace!(run_id = %cont.run_id(), label = ?label, "suspension resumed (step is \u{27c2}, pipeline no-op)");
            }
            Some(step) => Self::reenter(label, value, step, cont),
        }
        Ok(())
    }

    fn reenter(label: Option<String>, value: I, step: Arc<dyn Step<I, O>>, cont: Arc<ContinuationInner>) {
        trace!(run_id = %cont.run_id(), label = ?label, "suspension resumed, scheduling re-entry");
        let cont2 = Arc::clone(&cont);
        cont.executor.spawn(Box::pin(async move {
            if let Err(e) = run_async_checked(&*step, value, &cont2).await {
                if e.is_cancelled() {
                    cont2.cancel();
                } else {
                    cont2.fail(e);
                }
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as StepResult;
    use crate::executor::TokioExecutor;
    use std::sync::Mutex as StdMutex;

    struct RecordStep {
        seen: Arc<StdMutex<Option<i32>>>,
    }

    #[async_trait::async_trait]
    impl Step<i32, ()> for RecordStep {
        fn execute_blocking(&self, input: i32, _cont: &Arc<ContinuationInner>) -> StepResult<()> {
            *self.seen.lock().unwrap() = Some(input);
            Ok(())
        }
    }

    fn test_continuation() -> Arc<ContinuationInner> {
        ContinuationInner::new(TokioExecutor::current(), std::sync::Weak::new())
    }

    #[tokio::test]
    async fn terminal_suspension_resume_is_a_pipeline_noop() {
        let cont = test_continuation();
        let suspension: Suspension<(), ()> = Suspension::terminal(Some("sent".into()), Some(()), cont);
        suspension.resume().unwrap();
    }

    #[tokio::test]
    async fn resuming_without_captured_input_requires_resume_with() {
        let cont = test_continuation();
        let seen = Arc::new(StdMutex::new(None));
        let step: Arc<dyn Step<i32, ()>> = Arc::new(RecordStep { seen: Arc::clone(&seen) });
        let suspension = Suspension::reentering(None, None, step, cont);
        assert!(suspension.resume().is_err());
    }

    #[tokio::test]
    async fn resuming_schedules_reentry_into_the_captured_step() {
        let cont = test_continuation();
        let seen = Arc::new(StdMutex::new(None));
        let step: Arc<dyn Step<i32, ()>> = Arc::new(RecordStep { seen: Arc::clone(&seen) });
        let suspension = Suspension::reentering(Some("recv".into()), None, step, cont);
        suspension.resume_with(9).unwrap();

        let mut ran = false;
        for _ in 0..20 {
            if seen.lock().unwrap().is_some() {
                ran = true;
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(ran);
        assert_eq!(*seen.lock().unwrap(), Some(9));
    }
}
