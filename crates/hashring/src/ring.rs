//! The public ring facade and its reader/writer synchronization.

use std::hash::BuildHasher;
use std::sync::{Arc, Mutex, RwLock};

use crate::bucket::Bucket;
use crate::engine::RingState;
use crate::error::{RingError, RingResult};
use crate::hash::{digest, DefaultHashBuilder};
use crate::item::Item;
use crate::tree::RingTree;

/// The default maximum number of points placed on the ring for a single
/// item: the bucket with the highest weight receives this many.
///
/// The higher the factor, the more even the distribution this ring
/// produces and the longer a mutation takes. Classic ketama uses 160 on a
/// 32-bit ring; a 64-bit ring needs more virtual points to spread as
/// evenly, and for most applications this default is fine.
pub const DEFAULT_MAGIC_FACTOR: usize = 1020;

/// A weighted consistent-hashing ring.
///
/// All operations take `&self`; mutations are serialized internally and
/// lookups run concurrently against the last published ring snapshot. A
/// reader observes some committed state from the serial history of
/// mutations, never a partially rebuilt mixture.
///
/// `Ring::default()` (or [`Ring::new`]) is an empty ring ready to use.
#[derive(Debug)]
pub struct Ring<T, S = DefaultHashBuilder> {
    magic_factor: usize,
    hasher: S,
    /// Write lock: serializes mutations and guards buckets, collisions,
    /// the fix queue and the weight bounds.
    state: Mutex<RingState<T>>,
    /// Ring lock: guards the published tree root. Readers hold it in
    /// shared mode for one successor lookup; the writer takes it
    /// exclusively only to swap in a finished root.
    tree: RwLock<RingTree<T>>,
}

impl<T: Item> Ring<T> {
    /// Create an empty ring with the default hash and magic factor.
    pub fn new() -> Self {
        Self::with_config(0, DefaultHashBuilder)
    }

    /// Create an empty ring with the given magic factor (0 means the
    /// default) and the default hash.
    pub fn with_magic_factor(magic_factor: usize) -> Self {
        Self::with_config(magic_factor, DefaultHashBuilder)
    }
}

impl<T: Item> Default for Ring<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Item, S: BuildHasher> Ring<T, S> {
    /// Create an empty ring that derives all of its 64-bit values from the
    /// given hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config(0, hasher)
    }

    /// Create an empty ring with explicit magic factor (0 means the
    /// default) and hasher.
    pub fn with_config(magic_factor: usize, hasher: S) -> Self {
        Self {
            magic_factor,
            hasher,
            state: Mutex::new(RingState::new()),
            tree: RwLock::new(RingTree::new()),
        }
    }

    /// Put `item` with weight `weight` onto the ring.
    ///
    /// Returns [`RingError::AlreadyExists`] when an item with the same
    /// identity is already present.
    ///
    /// # Panics
    ///
    /// Panics when `weight` is not greater than zero.
    pub fn insert(&self, item: T, weight: f64) -> RingResult<()> {
        assert_weight(weight);
        let item = Arc::new(item);
        let id = digest(&self.hasher, &*item, &[]);

        let mut state = self.state.lock().unwrap();
        if state.buckets.contains_key(&id) {
            return Err(RingError::AlreadyExists);
        }
        tracing::debug!(bucket = id, weight, "inserting item");

        state.buckets.insert(id, Bucket::new(item, weight));
        state.bounds.extend(weight);
        self.rebuild(&mut state);
        Ok(())
    }

    /// Change the weight of `item`.
    ///
    /// Returns [`RingError::NotFound`] when the item is not on the ring.
    ///
    /// # Panics
    ///
    /// Panics when `weight` is not greater than zero.
    pub fn update(&self, item: &T, weight: f64) -> RingResult<()> {
        assert_weight(weight);
        self.reweigh(item, weight)
    }

    /// Remove `item` from the ring.
    ///
    /// Returns [`RingError::NotFound`] when the item is not on the ring.
    pub fn remove(&self, item: &T) -> RingResult<()> {
        self.reweigh(item, 0.0)
    }

    /// Map `key` to the item owning it.
    ///
    /// The owner is the item whose point is the successor of the key's
    /// digest, wrapping past the ring maximum back to the minimum. Returns
    /// `None` only when the ring is empty.
    pub fn get<K>(&self, key: &K) -> Option<Arc<T>>
    where
        K: Item + ?Sized,
    {
        let d = digest(&self.hasher, key, &[]);
        let tree = self.tree.read().unwrap();
        tree.successor(d)
            .or_else(|| tree.min())
            .map(|entry| entry.item.clone())
    }

    /// True when `item` is on the ring.
    pub fn contains(&self, item: &T) -> bool {
        let id = digest(&self.hasher, item, &[]);
        self.state.lock().unwrap().buckets.contains_key(&id)
    }

    /// Number of items on the ring.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().buckets.len()
    }

    /// True when the ring holds no items.
    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().buckets.is_empty()
    }

    fn reweigh(&self, item: &T, weight: f64) -> RingResult<()> {
        let id = digest(&self.hasher, item, &[]);

        let mut state = self.state.lock().unwrap();
        let state = &mut *state;
        let Some(bucket) = state.buckets.get_mut(&id) else {
            return Err(RingError::NotFound);
        };
        let prev = bucket.weight;
        bucket.weight = weight;
        tracing::debug!(bucket = id, prev, weight, "changing item weight");

        state
            .bounds
            .change(prev, weight, state.buckets.values().map(|b| b.weight));
        self.rebuild(state);
        Ok(())
    }

    /// Run the rebuild on a private snapshot of the published tree and
    /// swap the finished root in.
    fn rebuild(&self, state: &mut RingState<T>) {
        let factor = match self.magic_factor {
            0 => DEFAULT_MAGIC_FACTOR,
            f => f,
        };
        let mut root = self.tree.read().unwrap().clone();
        state.rebuild(&mut root, &self.hasher, factor);
        tracing::trace!(points = root.len(), "publishing ring");
        *self.tree.write().unwrap() = root;
    }
}

fn assert_weight(weight: f64) {
    if !(weight > 0.0) {
        panic!("hashring: weight must be greater than zero");
    }
}
