//! CoroutineContext (spec §4.G): the shared environment a coroutine run executes in —
//! an executor, a channel registry, and the set of scopes currently live under it.
//!
//! Grounded on `aagt-core::context` (the teacher's per-agent execution context bundling
//! a scheduler handle with shared registries), generalized from agent-specific registries
//! to the channel/scope registries this runtime needs.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::attributes::AttributeStore;
use crate::channel::{Channel, ChannelId};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::scope::ScopeInner;

/// The default channel capacity used when a channel is auto-created by a sending or
/// receiving step that never specified one (spec §4.F: "defaults to 1").
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Shared environment for a tree of coroutine runs: one executor, one channel registry,
/// and the scopes launched against it (spec §4.G).
pub struct CoroutineContext {
    executor: Arc<dyn Executor>,
    channels: DashMap<u64, Arc<dyn Any + Send + Sync>>,
    scopes: DashMap<u64, Arc<ScopeInner>>,
    pub(crate) attributes: AttributeStore,
}

impl CoroutineContext {
    pub fn new(executor: Arc<dyn Executor>) -> Arc<Self> {
        Arc::new(Self {
            executor,
            channels: DashMap::new(),
            scopes: DashMap::new(),
            attributes: AttributeStore::new(),
        })
    }

    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.executor)
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Resolve `id` to its channel, creating one with the default capacity the first
    /// time it is referenced. Subsequent lookups with the same id (even from a
    /// differently-typed caller, which cannot happen since `ChannelId<T>` is
    /// monomorphized per `T`) return the same instance.
    pub fn get_channel<T: Send + Sync + 'static>(
        self: &Arc<Self>,
        id: ChannelId<T>,
    ) -> Result<Arc<Channel<T>>> {
        self.get_channel_with_capacity(id, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Like [`get_channel`], but controls the capacity used if this is the first
    /// reference to `id`. Has no effect on an already-created channel's capacity.
    pub fn get_channel_with_capacity<T: Send + Sync + 'static>(
        self: &Arc<Self>,
        id: ChannelId<T>,
        capacity: usize,
    ) -> Result<Arc<Channel<T>>> {
        let erased: Arc<dyn Any + Send + Sync> = Arc::clone(
            &self
                .channels
                .entry(id.raw())
                .or_insert_with(|| Arc::new(Channel::<T>::new(capacity)) as Arc<dyn Any + Send + Sync>),
        );
        erased
            .downcast::<Channel<T>>()
            .map_err(|_| Error::internal("channel id reused with a mismatched type"))
    }

    pub(crate) fn register_scope(self: &Arc<Self>, scope: Arc<ScopeInner>) -> u64 {
        let handle = Arc::as_ptr(&scope) as usize as u64;
        trace!(handle, "scope registered");
        self.scopes.insert(handle, scope);
        handle
    }

    pub(crate) fn unregister_scope(&self, handle: u64) {
        self.scopes.remove(&handle);
    }

    /// Await completion of every scope currently registered against this context.
    pub async fn await_all(&self) {
        let live: Vec<Arc<ScopeInner>> = self.scopes.iter().map(|e| Arc::clone(e.value())).collect();
        for scope in live {
            scope.join().await;
        }
    }
}
