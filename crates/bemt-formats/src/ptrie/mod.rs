//! Compact PATRICIA (crit-bit) trie over byte-string keys
//!
//! The trie is the build-time model of the name dictionaries stored in
//! relocatable binaries (see [`crate::nn::NnDic`]). Each internal node tests a
//! single bit of the key and leaves hold the full key, so the node count is
//! linear in the number of keys regardless of their length.
//!
//! # Bit addressing
//!
//! Bits are numbered from the *end* of the key:
//!
//! ```text
//! bit b of key k = (k[len - 1 - (b >> 3)] >> (b & 7)) & 1
//! ```
//!
//! Positions at or beyond the key length read as zero. Keys of different
//! lengths therefore share a suffix-based radix without a fixed field width.
//! Keys containing a NUL byte cannot be told apart from shorter keys under this
//! scheme and are rejected on insertion.
//!
//! # Node layout
//!
//! [`Ptrie`] stores its nodes in an arena. Slot 0 is the sentinel root whose
//! `left` link points at the real root (or at itself while the trie is empty).
//! Leaves carry [`NPOS`] as their bit position and link to themselves; a
//! descent stops as soon as it reaches a node whose bit position does not
//! exceed the one it came from.
//!
//! [`FlatPtrie`] is the array form matching the on-disk dictionary: index 0 is
//! the sentinel and every link is an index into the same array.
//!
//! ```rust
//! use bemt_formats::ptrie::Ptrie;
//!
//! let mut trie = Ptrie::new();
//! trie.insert("map/stage01.bfres");
//! trie.insert("map/stage02.bfres");
//!
//! assert!(trie.search("map/stage02.bfres").is_some());
//! assert!(trie.search("stage02.bfres").is_none());
//!
//! let flat = trie.flatten();
//! assert_eq!(flat.node_count(), 3);
//! assert!(flat.search("map/stage01.bfres").is_some());
//! ```

mod flat;
mod trie;

pub use flat::{FlatNode, FlatPtrie};
pub use trie::{NodeId, Ptrie, PtrieNode};

/// Bit position carried by leaves and by the sentinel root
pub const NPOS: u64 = u64::MAX;

/// Byte `inv` positions before the end of `key`, zero past the start
#[inline]
fn tail_byte(key: &[u8], inv: usize) -> u8 {
    if inv < key.len() {
        key[key.len() - 1 - inv]
    } else {
        0
    }
}

/// Extract bit `bit` of `key` using tail-anchored addressing
#[inline]
pub fn key_bit(key: &[u8], bit: u64) -> bool {
    match usize::try_from(bit >> 3) {
        Ok(inv) if inv < key.len() => (tail_byte(key, inv) >> (bit & 7)) & 1 != 0,
        _ => false,
    }
}

/// First bit position where `a` and `b` differ, scanning upward from bit 0
///
/// When one key is a zero-extended form of the other the result is the
/// shorter key's bit length. Returns `None` for identical keys.
pub fn first_differing_bit(a: &[u8], b: &[u8]) -> Option<u64> {
    let longest = a.len().max(b.len());
    for inv in 0..longest {
        let diff = tail_byte(a, inv) ^ tail_byte(b, inv);
        if diff != 0 {
            return Some(inv as u64 * 8 + u64::from(diff.trailing_zeros()));
        }
    }

    if a.len() == b.len() {
        None
    } else {
        Some(a.len().min(b.len()) as u64 * 8)
    }
}
