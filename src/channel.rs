//! Channel (spec §4.F): a bounded FIFO used for rendezvous between coroutines.
//!
//! Grounded on `aagt-core::bus::message_bus::MessageBus`, generalized from a topic-keyed
//! broadcast bus to a point-to-point bounded queue identified by [`ChannelId`], with
//! `parking_lot::Mutex`-guarded state in place of the bus's `DashMap` of topics (a
//! channel's buffer and waiter queues are always touched together, so one lock per
//! channel is the right grain rather than one entry per field).

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::continuation::ContinuationInner;
use crate::error::{Error, Result};
use crate::step::Step;
use crate::suspension::Suspension;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// An identity-equality handle to a channel slot in a [`crate::context::CoroutineContext`]
/// (spec §4.G — channels are looked up by identity, not by name or type, mirroring
/// [`crate::attributes::AttributeKey`]).
pub struct ChannelId<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ChannelId<T> {
    pub fn new() -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> u64 {
        self.id
    }
}

impl<T> Default for ChannelId<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ChannelId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ChannelId<T> {}

impl<T> fmt::Debug for ChannelId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChannelId").field(&self.id).finish()
    }
}

impl<T> PartialEq for ChannelId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for ChannelId<T> {}

impl<T> std::hash::Hash for ChannelId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A step whose sole effect is delivering a `Result<T>` to a parked Rust future via an
/// embedded oneshot — the step a channel's [`Suspension`] re-enters to hand a parked
/// `send`/`receive` its outcome (spec §4.E: resuming "produces the value, then invokes
/// `step.runAsync`"). `execute_blocking` is only ever called once per instance, since
/// each `DeliverStep` backs exactly one parked waiter.
struct DeliverStep<T> {
    tx: Mutex<Option<oneshot::Sender<Result<T>>>>,
}

impl<T: Send + 'static> DeliverStep<T> {
    fn new(tx: oneshot::Sender<Result<T>>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Step<Result<T>, ()> for DeliverStep<T> {
    fn execute_blocking(&self, input: Result<T>, _cont: &Arc<ContinuationInner>) -> Result<()> {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(input);
        }
        Ok(())
    }
}

struct Inner<T> {
    buffer: VecDeque<T>,
    capacity: usize,
    closed: bool,
    recv_waiters: VecDeque<Suspension<Result<T>, ()>>,
    send_waiters: VecDeque<(Option<T>, Suspension<Result<()>, ()>)>,
}

/// A bounded, in-process FIFO channel (spec §4.F). `capacity` bounds how many values
/// may sit in the buffer with no receiver yet waiting; a direct hand-off between a
/// waiting receiver and an incoming send bypasses the buffer entirely.
pub struct Channel<T> {
    label: String,
    inner: Mutex<Inner<T>>,
}

impl<T: Send + 'static> Channel<T> {
    pub fn new(capacity: usize) -> Self {
        Self::labeled(format!("channel-{capacity}"), capacity)
    }

    pub fn labeled(label: impl Into<String>, capacity: usize) -> Self {
        Self {
            label: label.into(),
            inner: Mutex::new(Inner {
                buffer: VecDeque::new(),
                capacity,
                closed: false,
                recv_waiters: VecDeque::new(),
                send_waiters: VecDeque::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Close the channel. Any parked sends/receives wake with [`Error::ChannelClosed`];
    /// values already buffered remain available to future receives.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        trace!(label = %self.label, "channel closed");
        for suspension in inner.recv_waiters.drain(..) {
            let _ = suspension.resume_with(Err(Error::channel_closed(self.label.clone())));
        }
        for (_, suspension) in inner.send_waiters.drain(..) {
            let _ = suspension.resume_with(Err(Error::channel_closed(self.label.clone())));
        }
    }

    /// Suspending send, for standalone use outside any coroutine/continuation (a
    /// channel is a freestanding value per spec §4.F; nothing requires one to be
    /// reached through a running [`crate::coroutine::Coroutine`]). Builds a throwaway
    /// continuation to back the [`Suspension`] machinery in [`send_suspending_with`].
    pub async fn send_suspending(&self, value: T) -> Result<()> {
        let cont = standalone_continuation();
        self.send_suspending_with(value, &cont).await
    }

    /// Suspending send: completes immediately if a receiver is already parked or the
    /// buffer has room, otherwise parks until a receiver drains space (spec: "send
    /// suspends the caller until the value is accepted"). A parked send is represented
    /// as a [`Suspension`] whose resumption delivers the outcome to this call via an
    /// internal [`DeliverStep`]. `cont` is the run a send step executes under, so a
    /// parked send re-enters on that run's own executor rather than a throwaway one.
    pub(crate) async fn send_suspending_with(&self, value: T, cont: &Arc<ContinuationInner>) -> Result<()> {
        let rx = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(Error::channel_closed(self.label.clone()));
            }
            if let Some(recv_suspension) = inner.recv_waiters.pop_front() {
                let _ = recv_suspension.resume_with(Ok(value));
                return Ok(());
            }
            if inner.buffer.len() < inner.capacity {
                inner.buffer.push_back(value);
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            let deliver: Arc<dyn Step<Result<()>, ()>> = Arc::new(DeliverStep::new(tx));
            let suspension = Suspension::reentering(Some(self.label.clone()), None, deliver, Arc::clone(cont));
            inner.send_waiters.push_back((Some(value), suspension));
            rx
        };
        rx.await
            .map_err(|_| Error::internal("send suspension dropped"))??;
        Ok(())
    }

    /// Suspending receive, for standalone use outside any coroutine/continuation; see
    /// [`send_suspending`](Self::send_suspending).
    pub async fn receive_suspending(&self) -> Result<T> {
        let cont = standalone_continuation();
        self.receive_suspending_with(&cont).await
    }

    /// Suspending receive: completes immediately if the buffer is non-empty, otherwise
    /// parks until a send arrives or the channel closes. A parked receive is
    /// represented as a [`Suspension`] that re-enters a [`DeliverStep`] on resumption,
    /// handing the arriving value (or a close error) back to this call.
    pub(crate) async fn receive_suspending_with(&self, cont: &Arc<ContinuationInner>) -> Result<T> {
        let rx = {
            let mut inner = self.inner.lock();
            if let Some(value) = inner.buffer.pop_front() {
                Self::admit_one_waiting_sender(&mut inner);
                return Ok(value);
            }
            if inner.closed {
                return Err(Error::channel_closed(self.label.clone()));
            }
            let (tx, rx) = oneshot::channel();
            let deliver: Arc<dyn Step<Result<T>, ()>> = Arc::new(DeliverStep::new(tx));
            let suspension = Suspension::reentering(Some(self.label.clone()), None, deliver, Arc::clone(cont));
            inner.recv_waiters.push_back(suspension);
            rx
        };
        rx.await
            .map_err(|_| Error::internal("receive suspension dropped"))?
    }

    /// Move one buffer slot's worth of capacity to the next parked sender, if any.
    fn admit_one_waiting_sender(inner: &mut Inner<T>) {
        if let Some((value, suspension)) = inner.send_waiters.pop_front() {
            if let Some(value) = value {
                inner.buffer.push_back(value);
            }
            let _ = suspension.resume_with(Ok(()));
        }
    }

    /// Thread-blocking send, for use outside the async executor (spec's synchronous
    /// `execute` path). Built on [`send_suspending_with`] via `futures::executor::block_on`.
    pub(crate) fn send_blocking_with(&self, value: T, cont: &Arc<ContinuationInner>) -> Result<()> {
        futures::executor::block_on(self.send_suspending_with(value, cont))
    }

    /// Thread-blocking receive; see [`send_blocking_with`].
    pub(crate) fn receive_blocking_with(&self, cont: &Arc<ContinuationInner>) -> Result<T> {
        futures::executor::block_on(self.receive_suspending_with(cont))
    }

    /// Thread-blocking send, for standalone use; see [`send_suspending`](Self::send_suspending).
    pub fn send_blocking(&self, value: T) -> Result<()> {
        futures::executor::block_on(self.send_suspending(value))
    }

    /// Thread-blocking receive, for standalone use; see [`send_suspending`](Self::send_suspending).
    pub fn receive_blocking(&self) -> Result<T> {
        futures::executor::block_on(self.receive_suspending())
    }
}

/// Build a throwaway continuation to back a standalone [`Channel`] call's `Suspension`
/// machinery when the caller has no [`ContinuationInner`] of its own (spec §4.F:
/// a channel is a freestanding value, not something only reachable through a running
/// coroutine).
fn standalone_continuation() -> Arc<ContinuationInner> {
    ContinuationInner::new(crate::executor::TokioExecutor::current(), std::sync::Weak::new())
}

// ---------------------------------------------------------------------------
// Step factories
// ---------------------------------------------------------------------------

/// `send(id)`: a step that hands its input to the channel identified by `id`,
/// suspending the coroutine until the value is accepted (spec §4.F/§5).
pub struct SendStep<T> {
    id: ChannelId<T>,
}

#[async_trait]
impl<T: Send + Sync + 'static> Step<T, ()> for SendStep<T> {
    fn execute_blocking(&self, input: T, cont: &Arc<ContinuationInner>) -> Result<()> {
        let channel = resolve_channel(cont, self.id)?;
        channel.send_blocking_with(input, cont)
    }

    async fn execute_async(&self, input: T, cont: &Arc<ContinuationInner>) -> Result<()> {
        let channel = resolve_channel(cont, self.id)?;
        channel.send_suspending_with(input, cont).await?;
        // A completed send has no further pipeline step to resume into (spec §4.E's
        // own "message sent" example): `step == ⟂`, resuming is a no-op.
        self.suspend(None, cont).resume()
    }
}

/// Build a [`SendStep`] targeting `id`.
pub fn send<T: Send + Sync + 'static>(id: ChannelId<T>) -> SendStep<T> {
    SendStep { id }
}

/// `receive(id)`: a step that ignores its input and yields the next value taken off
/// the channel identified by `id`, suspending until one is available.
pub struct ReceiveStep<T> {
    id: ChannelId<T>,
}

#[async_trait]
impl<I, T> Step<I, T> for ReceiveStep<T>
where
    I: Send + 'static,
    T: Send + Sync + 'static,
{
    fn execute_blocking(&self, _input: I, cont: &Arc<ContinuationInner>) -> Result<T> {
        let channel = resolve_channel(cont, self.id)?;
        channel.receive_blocking_with(cont)
    }

    async fn execute_async(&self, _input: I, cont: &Arc<ContinuationInner>) -> Result<T> {
        let channel = resolve_channel(cont, self.id)?;
        channel.receive_suspending_with(cont).await
    }
}

/// Build a [`ReceiveStep`] targeting `id`. The step implements `Step<I, T>` for any
/// `I`, since a receive ignores its input entirely.
pub fn receive<T: Send + Sync + 'static>(id: ChannelId<T>) -> ReceiveStep<T> {
    ReceiveStep { id }
}

fn resolve_channel<T: Send + Sync + 'static>(
    cont: &Arc<ContinuationInner>,
    id: ChannelId<T>,
) -> Result<Arc<Channel<T>>> {
    let context = cont
        .context()
        .ok_or_else(|| Error::internal("continuation's scope no longer exists"))?;
    context.get_channel(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TokioExecutor;

    fn test_continuation() -> Arc<ContinuationInner> {
        ContinuationInner::new(TokioExecutor::current(), std::sync::Weak::new())
    }

    #[tokio::test]
    async fn send_then_receive_round_trips() {
        let ch: Channel<i32> = Channel::new(4);
        let cont = test_continuation();
        ch.send_suspending_with(7, &cont).await.unwrap();
        assert_eq!(ch.receive_suspending_with(&cont).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn receive_parks_until_send_arrives() {
        let ch = Arc::new(Channel::<i32>::new(1));
        let cont = test_continuation();
        let reader = {
            let ch = Arc::clone(&ch);
            let cont = Arc::clone(&cont);
            tokio::spawn(async move { ch.receive_suspending_with(&cont).await })
        };
        tokio::task::yield_now().await;
        ch.send_suspending_with(42, &cont).await.unwrap();
        assert_eq!(reader.await.unwrap().unwrap(), 42);
    }

    #[tokio::test]
    async fn closed_channel_errors_parked_receiver() {
        let ch = Arc::new(Channel::<i32>::new(1));
        let cont = test_continuation();
        let reader = {
            let ch = Arc::clone(&ch);
            let cont = Arc::clone(&cont);
            tokio::spawn(async move { ch.receive_suspending_with(&cont).await })
        };
        tokio::task::yield_now().await;
        ch.close();
        assert!(reader.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn bounded_capacity_parks_extra_sender() {
        let ch = Arc::new(Channel::<i32>::new(1));
        let cont = test_continuation();
        ch.send_suspending_with(1, &cont).await.unwrap();
        let ch2 = Arc::clone(&ch);
        let cont2 = Arc::clone(&cont);
        let second_send = tokio::spawn(async move { ch2.send_suspending_with(2, &cont2).await });
        tokio::task::yield_now().await;
        assert_eq!(ch.receive_suspending_with(&cont).await.unwrap(), 1);
        second_send.await.unwrap().unwrap();
        assert_eq!(ch.receive_suspending_with(&cont).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn standalone_send_and_receive_need_no_continuation() {
        let ch: Channel<i32> = Channel::new(1);
        ch.send_suspending(5).await.unwrap();
        assert_eq!(ch.receive_suspending().await.unwrap(), 5);
    }
}
