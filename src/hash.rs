// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The pluggable hash abstraction (component C1) and the `Digest` value type
//! that flows through the rest of the crate.

use bitcoin_hashes::{Hash as _, sha256};
use std::fmt;

/// Domain separator prepended to a leaf's preimage.
pub const LEAF_DOMAIN: u8 = 0x00;
/// Domain separator prepended to an internal node's preimage.
pub const INTERNAL_DOMAIN: u8 = 0x01;

/// A fixed-length digest produced by a [`Hasher`]. Two digests only compare
/// equal if they came from hashers with the same output size.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The bit at `index`, MSB-first over the underlying bytes.
    pub fn bit(&self, index: usize) -> bool {
        let byte = self.0[index / 8];
        (byte >> (7 - (index % 8))) & 1 == 1
    }

    /// Number of leading bits shared between `self` and `other`.
    pub fn common_prefix_bits_len(&self, other: &Digest) -> usize {
        let bits = self.len() * 8;
        for i in 0..bits {
            if self.bit(i) != other.bit(i) {
                return i;
            }
        }
        bits
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest(0x{})", hex::encode(&self.0))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A cryptographic hash function, identified by a stable name, used to derive
/// key-hashes, node hashes and the zero-hash table. Implementations are pure
/// and synchronous; there are no failure modes.
pub trait TreeHasher: Send + Sync {
    /// A stable identifier embedded in serialized metadata, e.g. `"sha256"`.
    fn name(&self) -> &'static str;

    /// Output length in bytes of every digest this hasher produces.
    fn output_size(&self) -> usize;

    /// Hashes an arbitrary byte string.
    fn digest(&self, bytes: &[u8]) -> Digest;

    /// `H(LEAF)`, the hash of an empty leaf. Forms `Z[0]` in the zero-hash table.
    fn leaf_domain_hash(&self) -> Digest {
        self.digest(&[LEAF_DOMAIN])
    }

    /// `H(LEAF || key_hash || value)`.
    fn hash_leaf(&self, key_hash: &Digest, value: &[u8]) -> Digest {
        let mut buf = Vec::with_capacity(1 + key_hash.len() + value.len());
        buf.push(LEAF_DOMAIN);
        buf.extend_from_slice(key_hash.as_bytes());
        buf.extend_from_slice(value);
        self.digest(&buf)
    }

    /// `H(INTERNAL || left || right)`.
    fn hash_internal(&self, left: &Digest, right: &Digest) -> Digest {
        let mut buf = Vec::with_capacity(1 + left.len() + right.len());
        buf.push(INTERNAL_DOMAIN);
        buf.extend_from_slice(left.as_bytes());
        buf.extend_from_slice(right.as_bytes());
        self.digest(&buf)
    }
}

/// The shipped hasher: plain SHA-256, 32-byte digests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl TreeHasher for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn output_size(&self) -> usize {
        32
    }

    fn digest(&self, bytes: &[u8]) -> Digest {
        let hash = sha256::Hash::hash(bytes);
        Digest::from_bytes(hash.to_byte_array().to_vec())
    }
}

#[cfg(test)]
mod hash_test {
    use super::*;

    #[test]
    fn zero_byte_sha256_matches_known_vector() {
        let hasher = Sha256Hasher;
        let digest = hasher.leaf_domain_hash();
        assert_eq!(
            hex::encode(digest.as_bytes()),
            "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
        );
    }

    #[test]
    fn common_prefix_bits_len_is_symmetric_and_bounded() {
        let hasher = Sha256Hasher;
        let a = hasher.digest(b"alice");
        let b = hasher.digest(b"alice");
        assert_eq!(a.common_prefix_bits_len(&b), a.len() * 8);
        let c = hasher.digest(b"bob");
        assert!(a.common_prefix_bits_len(&c) < a.len() * 8);
    }
}
