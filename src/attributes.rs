//! Typed, identity-keyed attribute store (spec §4.B).
//!
//! Attached by value to coroutines, contexts, scopes and continuations so steps can
//! share per-execution data without reaching for static/global state. Keys compare by
//! identity (an allocation-order counter), not by type or name, so two keys minted for
//! the same `T` are distinct entries — mirroring the teacher's `DashMap`-backed
//! registries (`agent/scheduler.rs`) but keyed on an opaque handle instead of a `Uuid`.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque, identity-compared key for a value of type `T` in an [`AttributeStore`].
pub struct AttributeKey<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    /// Mint a fresh key. Every call allocates a new identity, even for the same `T`.
    pub fn new() -> Self {
        Self {
            id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for AttributeKey<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for AttributeKey<T> {}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeKey").field("id", &self.id).finish()
    }
}

impl<T> PartialEq for AttributeKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for AttributeKey<T> {}

impl<T> std::hash::Hash for AttributeKey<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A typed mapping attached to coroutines, contexts, scopes and continuations.
#[derive(Default)]
pub struct AttributeStore {
    values: DashMap<u64, Box<dyn Any + Send + Sync>>,
}

impl AttributeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the value for `key`, cloning it out. Returns `None` if unset.
    pub fn get<T>(&self, key: &AttributeKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values
            .get(&key.id)
            .and_then(|entry| entry.downcast_ref::<T>().cloned())
    }

    /// Fetch the value for `key`, or `default` if unset.
    pub fn get_or<T>(&self, key: &AttributeKey<T>, default: T) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get(key).unwrap_or(default)
    }

    /// Set the value for `key`, overwriting any previous value.
    pub fn set<T>(&self, key: &AttributeKey<T>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(key.id, Box::new(value));
    }

    /// Remove and return the value for `key`, if present.
    pub fn remove<T>(&self, key: &AttributeKey<T>) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .remove(&key.id)
            .and_then(|(_, v)| v.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// True if a value is currently set for `key`.
    pub fn contains<T>(&self, key: &AttributeKey<T>) -> bool {
        self.values.contains_key(&key.id)
    }
}

impl fmt::Debug for AttributeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeStore")
            .field("len", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_round_trips() {
        let store = AttributeStore::new();
        let key: AttributeKey<i32> = AttributeKey::new();
        assert_eq!(store.get(&key), None);
        store.set(&key, 42);
        assert_eq!(store.get(&key), Some(42));
    }

    #[test]
    fn keys_are_identity_not_type() {
        let store = AttributeStore::new();
        let a: AttributeKey<i32> = AttributeKey::new();
        let b: AttributeKey<i32> = AttributeKey::new();
        store.set(&a, 1);
        store.set(&b, 2);
        assert_eq!(store.get(&a), Some(1));
        assert_eq!(store.get(&b), Some(2));
    }

    #[test]
    fn get_or_falls_back_to_default() {
        let store = AttributeStore::new();
        let key: AttributeKey<String> = AttributeKey::new();
        assert_eq!(store.get_or(&key, "default".to_string()), "default");
    }

    #[test]
    fn remove_clears_the_slot() {
        let store = AttributeStore::new();
        let key: AttributeKey<u8> = AttributeKey::new();
        store.set(&key, 9);
        assert_eq!(store.remove(&key), Some(9));
        assert_eq!(store.get(&key), None);
    }
}
