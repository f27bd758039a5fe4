#![deny(missing_docs)]
//! A weighted consistent-hashing ring.
//!
//! Consistent hashing maps objects from a very large set of values (for
//! example request ids) onto a small, dynamic set of items (for example
//! server addresses) such that inserting or removing an item only relocates
//! a fraction of the objects proportional to that item's share of the ring.
//! Because the mapping is a pure function of the item identities, their
//! weights and a fixed hash function, separate processes agree on it without
//! any coordination.
//!
//! There are two goals this implementation cares about beyond the textbook
//! algorithm:
//!
//! 1. Reads should block for the least possible time in highly concurrent
//!    applications. The ring keeps its points in a persistent
//!    (structurally-shared) ordered map; a rebuild works on a private
//!    snapshot and publishes the finished root under a lock held only for
//!    the swap itself. A reader always observes one committed version of the
//!    ring in its entirety.
//! 2. 64-bit hash collisions are rare but not impossible, and an ignored
//!    collision silently breaks the consistency the whole structure exists
//!    to provide. Colliding points are re-hashed through numbered
//!    generations in a way that depends only on the final set of items and
//!    weights, never on the order of mutations that produced it.
//!
//! # Example
//!
//! ```rust
//! use hashring::Ring;
//!
//! let ring: Ring<String> = Ring::new();
//! ring.insert("server01".to_string(), 1.0).unwrap();
//! ring.insert("server02".to_string(), 2.0).unwrap();
//!
//! // "server02" owns roughly two thirds of the key space.
//! let owner = ring.get("some request id").unwrap();
//! assert!(owner.starts_with("server"));
//! ```

mod bucket;
mod engine;
mod error;
mod hash;
mod item;
mod point;
mod ring;
mod tree;
mod weight;

pub use error::{RingError, RingResult};
pub use hash::DefaultHashBuilder;
pub use item::Item;
pub use ring::{Ring, DEFAULT_MAGIC_FACTOR};
