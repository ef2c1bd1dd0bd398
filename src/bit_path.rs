// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Bit-path utilities (component C2): turning a byte string into the MSB-first
//! bit sequence that drives traversal of the tree.

use crate::hash::Digest;

/// `false` means "go left", `true` means "go right".
pub fn bit_path(buf: &[u8], n_bits: usize) -> Vec<bool> {
    (0..n_bits)
        .map(|i| (buf[i / 8] >> (7 - (i % 8))) & 1 == 1)
        .collect()
}

/// Convenience wrapper over a key-hash digest: the full bit-path, MSB-first,
/// for the digest's complete length.
pub fn full_bit_path(digest: &Digest) -> Vec<bool> {
    bit_path(digest.as_bytes(), digest.len() * 8)
}
