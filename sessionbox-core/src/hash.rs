//! Non-cryptographic 32-bit hash functions used for shard placement.
//!
//! Both functions are bit-exact ports of the reference MurmurHash algorithms
//! and read input as little-endian 4-byte blocks. Routing correctness across
//! processes depends on that: two workers must agree on which shard owns a
//! session, so the output for a given `(bytes, seed)` pair never changes.
//!
//! ```
//! use sessionbox_core::hash::{HashFunction, murmur2, murmur3};
//!
//! assert_eq!(murmur2(b"asdf", 0), 2864375483);
//! assert_eq!(murmur3(b"asdf", 0), 455139366);
//! assert_eq!(HashFunction::Murmur3.hash(b"hello world!"), 774705101);
//! ```

use serde::{Deserialize, Serialize};

const M2_MUL: u32 = 0x5bd1_e995;
const M2_SHIFT: u32 = 24;

const M3_C1: u32 = 0xcc9e_2d51;
const M3_C2: u32 = 0x1b87_3593;

#[inline]
fn block(chunk: &[u8]) -> u32 {
    u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
}

/// MurmurHash2, 32-bit.
///
/// An empty input always hashes to `0`, regardless of the seed.
pub fn murmur2(data: &[u8], seed: u32) -> u32 {
    if data.is_empty() {
        return 0;
    }

    let mut h = seed ^ data.len() as u32;

    let mut blocks = data.chunks_exact(4);
    for chunk in &mut blocks {
        let mut k = block(chunk);
        k = k.wrapping_mul(M2_MUL);
        k ^= k >> M2_SHIFT;
        k = k.wrapping_mul(M2_MUL);

        h = h.wrapping_mul(M2_MUL);
        h ^= k;
    }

    let tail = blocks.remainder();
    if tail.len() == 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M2_MUL);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M2_MUL);
    h ^= h >> 15;
    h
}

#[inline]
fn murmur3_scramble(k: u32) -> u32 {
    k.wrapping_mul(M3_C1).rotate_left(15).wrapping_mul(M3_C2)
}

#[inline]
fn murmur3_fmix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// MurmurHash3, x86 32-bit variant.
pub fn murmur3(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;

    let mut blocks = data.chunks_exact(4);
    for chunk in &mut blocks {
        h ^= murmur3_scramble(block(chunk));
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k = tail
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, byte)| acc | (u32::from(*byte) << (8 * i)));
        h ^= murmur3_scramble(k);
    }

    h ^= data.len() as u32;
    murmur3_fmix(h)
}

/// Hash function selection for ring placement and key routing.
///
/// The same function must be used for building a ring and routing keys
/// through it, and every process sharing a backend must use the same choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashFunction {
    /// MurmurHash2 with seed 0.
    #[default]
    Murmur2,
    /// MurmurHash3 (x86, 32-bit) with seed 0.
    Murmur3,
}

impl HashFunction {
    /// Hashes `data` with the default seed.
    #[inline]
    pub fn hash(&self, data: &[u8]) -> u32 {
        self.hash_with_seed(data, 0)
    }

    /// Hashes `data` with an explicit seed.
    #[inline]
    pub fn hash_with_seed(&self, data: &[u8], seed: u32) -> u32 {
        match self {
            Self::Murmur2 => murmur2(data, seed),
            Self::Murmur3 => murmur3(data, seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn murmur2_reference_vectors() {
        assert_eq!(murmur2(b"asdf", 0), 2864375483);
        assert_eq!(murmur2(b"abcde", 0), 1594468574);
        assert_eq!(murmur2(b"abcdef", 0), 1271458169);
        assert_eq!(murmur2(b"abcdefg", 0), 4188131059);
        assert_eq!(murmur2(b"hello world!", 0), 1685739664);
    }

    #[test]
    fn murmur3_reference_vectors() {
        assert_eq!(murmur3(b"asdf", 0), 455139366);
        assert_eq!(murmur3(b"abcde", 0), 3902511862);
        assert_eq!(murmur3(b"abcdef", 0), 1635893381);
        assert_eq!(murmur3(b"abcdefg", 0), 2285673222);
        assert_eq!(murmur3(b"hello world!", 0), 774705101);
    }

    #[test]
    fn empty_input() {
        assert_eq!(murmur2(b"", 0), 0);
        assert_eq!(murmur2(b"", 0xdead_beef), 0);
        assert_eq!(murmur3(b"", 0), 0);
    }

    #[test]
    fn seed_changes_output() {
        assert_ne!(murmur2(b"asdf", 0), murmur2(b"asdf", 1));
        assert_ne!(murmur3(b"asdf", 0), murmur3(b"asdf", 1));
    }

    #[test]
    fn selection_dispatches() {
        assert_eq!(HashFunction::default(), HashFunction::Murmur2);
        assert_eq!(HashFunction::Murmur2.hash(b"asdf"), 2864375483);
        assert_eq!(HashFunction::Murmur3.hash(b"asdf"), 455139366);
    }
}
