//! Typed adapters over the persistent ordered map.
//!
//! Both the ring itself and the per-value collision sets are persistent
//! ordered maps ([`im::OrdMap`]): structurally shared, copied on write.
//! Cloning the ring tree is O(1), which is what lets a rebuild work on a
//! private snapshot while readers keep traversing the previously published
//! root.

use std::ops::Bound;
use std::sync::Arc;

use im::OrdMap;

use crate::point::{PointId, PointKey};

/// What the ring tree stores per value: the live point's handle and the
/// owning item, so a reader can resolve a lookup without touching any
/// write-side state.
#[derive(Debug)]
pub(crate) struct RingEntry<T> {
    pub point: PointId,
    pub item: Arc<T>,
}

impl<T> RingEntry<T> {
    pub(crate) fn new(point: PointId, item: Arc<T>) -> Self {
        Self { point, item }
    }
}

impl<T> Clone for RingEntry<T> {
    fn clone(&self) -> Self {
        Self {
            point: self.point,
            item: self.item.clone(),
        }
    }
}

/// The ordered set of live points, keyed by current value.
#[derive(Debug)]
pub(crate) struct RingTree<T> {
    map: OrdMap<u64, RingEntry<T>>,
}

impl<T> Clone for RingTree<T> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<T> RingTree<T> {
    pub(crate) fn new() -> Self {
        Self { map: OrdMap::new() }
    }

    /// Insert an entry, returning the entry previously occupying the value
    /// if there was one. The caller decides what a displacement means.
    pub(crate) fn insert(&mut self, value: u64, entry: RingEntry<T>) -> Option<RingEntry<T>> {
        self.map.insert(value, entry)
    }

    pub(crate) fn remove(&mut self, value: u64) -> Option<RingEntry<T>> {
        self.map.remove(&value)
    }

    /// True when `value` is occupied by exactly the given point.
    pub(crate) fn points_to(&self, value: u64, id: PointId) -> bool {
        self.map.get(&value).map(|e| e.point == id).unwrap_or(false)
    }

    /// The entry with the smallest value strictly greater than `value`.
    pub(crate) fn successor(&self, value: u64) -> Option<&RingEntry<T>> {
        self.map
            .range((Bound::Excluded(value), Bound::Unbounded))
            .next()
            .map(|(_, entry)| entry)
    }

    /// The entry with the smallest value on the ring.
    pub(crate) fn min(&self) -> Option<&RingEntry<T>> {
        self.map.iter().next().map(|(_, entry)| entry)
    }

    /// In-order traversal of `(value, entry)` pairs.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &RingEntry<T>)> {
        self.map.iter().map(|(value, entry)| (*value, entry))
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

/// Points sharing one value at some generation, ordered by their stable
/// `(bucket id, index)` identity.
#[derive(Debug, Clone, Default)]
pub(crate) struct CollisionSet {
    map: OrdMap<PointKey, PointId>,
}

impl CollisionSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a member. Double insertion of the same identity means the state
    /// machine lost track of a point, which is unrecoverable.
    pub(crate) fn insert(&mut self, key: PointKey, id: PointId) {
        if self.map.insert(key, id).is_some() {
            panic!("hashring: internal error: duplicate collision set member");
        }
    }

    pub(crate) fn remove(&mut self, key: &PointKey) -> Option<PointId> {
        self.map.remove(key)
    }

    /// The member with the smallest `(bucket id, index)` identity.
    pub(crate) fn min(&self) -> Option<(PointKey, PointId)> {
        self.map.iter().next().map(|(key, id)| (*key, *id))
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}
