//! The write-side rebuild engine.
//!
//! Everything here runs under the ring's write lock and mutates a private
//! snapshot of the ring tree; nothing is visible to readers until the
//! facade publishes the finished root.
//!
//! The hard part is collisions. When two points produce the same 64-bit
//! value, neither may stay live at it: the value is handed to a collision
//! set, both points queue for a re-hash at their next generation, and the
//! set keeps the value reserved so that later arrivals at the same value
//! join the same clique instead of racing it. Deleting a point rolls every
//! generation it climbed back down, and any twin whose collision thereby
//! disappears is rolled back too and re-inserted from scratch. The outcome
//! depends only on the surviving `(bucket, index)` identities, never on the
//! mutation order that got us here.

use std::collections::{HashMap, VecDeque};
use std::hash::BuildHasher;

use crate::bucket::Bucket;
use crate::hash::{digest, point_suffix};
use crate::item::Item;
use crate::point::{Point, PointId, Points};
use crate::tree::{CollisionSet, RingEntry, RingTree};
use crate::weight::{PointTarget, WeightBounds};

/// All state owned by the write path.
#[derive(Debug)]
pub(crate) struct RingState<T> {
    /// Bucket records keyed by item digest.
    pub buckets: HashMap<u64, Bucket<T>>,
    /// The point arena.
    pub points: Points<T>,
    /// For every value claimed by two or more points at some generation,
    /// the set of those points. A non-empty set reserves its value.
    pub collisions: HashMap<u64, CollisionSet>,
    /// Points awaiting a next-generation re-hash.
    pub fix: VecDeque<PointId>,
    pub bounds: WeightBounds,
}

impl<T: Item> RingState<T> {
    pub(crate) fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            points: Points::new(),
            collisions: HashMap::new(),
            fix: VecDeque::new(),
            bounds: WeightBounds::default(),
        }
    }

    /// Reconcile every bucket's point count with its target and drive the
    /// collision machinery to fixpoint.
    pub(crate) fn rebuild<S: BuildHasher>(
        &mut self,
        root: &mut RingTree<T>,
        hasher: &S,
        factor: usize,
    ) {
        let target = PointTarget::new(self.bounds, factor);
        loop {
            let ids: Vec<u64> = self.buckets.keys().copied().collect();
            for id in ids {
                let (weight, item) = {
                    let bucket = &self.buckets[&id];
                    (bucket.weight, bucket.item.clone())
                };
                let size = if weight != 0.0 { target.get(weight) } else { 0 };

                // Shrink from the tail: highest index first.
                loop {
                    let bucket = self
                        .buckets
                        .get_mut(&id)
                        .expect("hashring: internal error: bucket vanished");
                    if bucket.points.len() <= size {
                        break;
                    }
                    let point = bucket.points.pop().expect("len checked above");
                    self.delete_point(root, point);
                }

                // Grow with ascending indexes, all at generation zero.
                loop {
                    let index = self.buckets[&id].points.len();
                    if index >= size {
                        break;
                    }
                    let value = digest(hasher, &*item, &point_suffix(0, index));
                    let point = self.points.insert(Point::new(id, index, item.clone(), value));
                    self.buckets
                        .get_mut(&id)
                        .expect("hashring: internal error: bucket vanished")
                        .points
                        .push(point);
                    self.insert_point(root, point);
                }

                if weight == 0.0 {
                    self.buckets.remove(&id);
                }
            }

            self.fix_points(root, hasher);
            if self.fix.is_empty() {
                break;
            }
        }
    }

    /// Make a point live, or hand it to the collision machinery.
    ///
    /// Returns true when the point ended up live on the tree.
    pub(crate) fn insert_point(&mut self, root: &mut RingTree<T>, id: PointId) -> bool {
        let (value, key, item) = {
            let point = self.points.get(id);
            (point.value, point.key(), point.item.clone())
        };

        if let Some(set) = self.collisions.get_mut(&value) {
            // An earlier pass reserved this value for a known clique; the
            // point joins it and waits for a fresh generation.
            set.insert(key, id);
            self.fix.push_back(id);
            tracing::trace!(
                bucket = key.bucket,
                index = key.index,
                value,
                "value reserved, point queued for fix"
            );
            return false;
        }

        let Some(displaced) = root.insert(value, RingEntry::new(id, item)) else {
            return true;
        };

        // Collision: the value was held by another live point. Neither
        // stays live; both join a fresh collision set and queue for the
        // next generation, incumbent first.
        let incumbent = displaced.point;
        root.remove(value);
        let incumbent_key = self.points.get(incumbent).key();
        tracing::debug!(
            value,
            bucket = key.bucket,
            index = key.index,
            prev_bucket = incumbent_key.bucket,
            prev_index = incumbent_key.index,
            "point collision"
        );

        let mut set = CollisionSet::new();
        set.insert(key, id);
        set.insert(incumbent_key, incumbent);
        self.collisions.insert(value, set);

        debug_assert!(!root.points_to(value, incumbent));
        debug_assert!(!root.points_to(value, id));
        self.fix.push_back(incumbent);
        self.fix.push_back(id);
        false
    }

    /// Remove a point from the ring, undoing every collision it took part
    /// in so that an equivalent mutation history converges to the same
    /// tree.
    ///
    /// Returns false when the point was not live (it is waiting in the fix
    /// queue or a collision set) and there was nothing to unlink.
    pub(crate) fn delete_point(&mut self, root: &mut RingTree<T>, id: PointId) -> bool {
        let value = self.points.get(id).value;
        if !root.points_to(value, id) {
            tracing::trace!(value, "delete of a point that is not live, skipping");
            return false;
        }
        root.remove(value);

        // Twins displaced while unwinding. Each gets its own unwind pass
        // (the chain is processed iteratively, so arbitrarily long
        // collision chains use bounded stack) and is re-inserted at the
        // end, in discovery order.
        let mut to_delete: VecDeque<PointId> = VecDeque::new();
        let mut to_insert: VecDeque<PointId> = VecDeque::new();

        let mut current = id;
        loop {
            self.unwind(root, current, &mut to_delete, &mut to_insert);
            match to_delete.pop_front() {
                Some(twin) => current = twin,
                None => break,
            }
        }

        // The deleted point is back at generation zero and belongs to no
        // collision set; it can leave the arena.
        self.points.remove(id);

        for twin in to_insert {
            tracing::trace!(point = twin, "restoring twin");
            self.insert_point(root, twin);
        }
        true
    }

    /// Roll one point back to generation zero, dropping its collision-set
    /// memberships and dislodging twins left alone in their set.
    fn unwind(
        &mut self,
        root: &mut RingTree<T>,
        id: PointId,
        to_delete: &mut VecDeque<PointId>,
        to_insert: &mut VecDeque<PointId>,
    ) {
        while self.points.get(id).generation() > 0 {
            let (value, key) = {
                let point = self.points.get_mut(id);
                point.rewind();
                (point.value, point.key())
            };

            let Some(set) = self.collisions.get_mut(&value) else {
                // We are unwinding a twin whose collision bookkeeping was
                // already cleaned up.
                continue;
            };
            if set.remove(&key).is_none() {
                panic!("hashring: internal error: point missing from its collision set");
            }
            if set.len() > 1 {
                // Other twins still share this value; the set stays.
                continue;
            }

            // Exactly one point left: the twin that once collided with us
            // here. The set dissolves and the twin rolls back too.
            let set = self
                .collisions
                .remove(&value)
                .expect("hashring: internal error: collision set vanished");
            let (twin_key, twin) = set
                .min()
                .expect("hashring: internal error: twin missing from collision set");
            tracing::trace!(
                value,
                bucket = twin_key.bucket,
                index = twin_key.index,
                "dislodging twin"
            );

            let twin_value = self.points.get(twin).value;
            if root.points_to(twin_value, twin) {
                // The twin is live; take it off the ring and defer both
                // its unwind and its re-insertion. If it is not live it is
                // already queued for a fix and needs no help.
                root.remove(twin_value);
                to_delete.push_back(twin);
                to_insert.push_back(twin);
            }
        }
    }

    /// Drain the fix queue: every queued point moves to its next
    /// generation and tries the ring again. A re-insert may collide and
    /// re-queue, but each generation draws from an independent hash
    /// bucket, so the expected number of retries per point is constant.
    fn fix_points<S: BuildHasher>(&mut self, root: &mut RingTree<T>, hasher: &S) {
        while let Some(id) = self.fix.pop_front() {
            let (value, generation, index, item) = {
                let point = self.points.get(id);
                (
                    point.value,
                    point.generation(),
                    point.index,
                    point.item.clone(),
                )
            };
            debug_assert!(!root.points_to(value, id));

            let next = digest(hasher, &*item, &point_suffix(generation + 1, index));
            tracing::trace!(index, from = value, to = next, "fixing point");
            self.points.get_mut(id).proceed(next);
            self.insert_point(root, id);
        }
    }
}
