//! The hash gateway.
//!
//! Every 64-bit value on the ring comes from here: bucket ids are digests
//! of an item's bare identity stream, point values are digests of the
//! identity stream followed by a `(generation, index)` suffix. Varying the
//! suffix derives many independent values from one item, which is what the
//! rebuild relies on both for placing virtual points and for escaping
//! collisions one generation at a time.
//!
//! The hash function is pluggable through [`std::hash::BuildHasher`]; the
//! default is xxhash64 with seed 0, a fast non-cryptographic stream hash.

use std::hash::{BuildHasher, Hasher};
use std::mem;

use twox_hash::XxHash64;

use crate::item::Item;

/// Builds the default ring hasher: xxhash64 with seed 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHashBuilder;

impl BuildHasher for DefaultHashBuilder {
    type Hasher = XxHash64;

    fn build_hasher(&self) -> Self::Hasher {
        XxHash64::with_seed(0)
    }
}

pub(crate) const WORD: usize = mem::size_of::<usize>();

/// Encode a point's `(generation, index)` pair as two platform-word-sized
/// little-endian integers, generation first.
pub(crate) fn point_suffix(generation: usize, index: usize) -> [u8; 2 * WORD] {
    let mut suffix = [0u8; 2 * WORD];
    suffix[..WORD].copy_from_slice(&generation.to_le_bytes());
    suffix[WORD..].copy_from_slice(&index.to_le_bytes());
    suffix
}

/// Digest an item's identity stream followed by a raw suffix.
///
/// An empty suffix digests the bare identity, which is how bucket ids and
/// lookup keys are formed.
pub(crate) fn digest<S, K>(hasher: &S, item: &K, suffix: &[u8]) -> u64
where
    S: BuildHasher,
    K: Item + ?Sized,
{
    let mut h = hasher.build_hasher();
    item.write_to(&mut h);
    if !suffix.is_empty() {
        h.write(suffix);
    }
    h.finish()
}
