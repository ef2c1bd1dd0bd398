// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Proof engine (component C9): inclusion and non-inclusion Merkle proofs,
//! verification, and bitmask-based compression that omits canonical zero
//! siblings.

use crate::cancel::{self, CancellationToken};
use crate::error::{Error, Result};
use crate::hash::{Digest, TreeHasher};
use crate::node::Node;
use crate::storage::TreeReader;
use crate::zero_hash::ZeroHashTable;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProofKind {
    Inclusion,
    NonInclusionEmptyPath,
    NonInclusionLeafMismatch {
        leaf_key_hash: Digest,
        leaf_value: Vec<u8>,
    },
}

/// A proof authenticating the presence or absence of a key under a claimed
/// root. `siblings` is in verification order: index 0 is the sibling closest
/// to the leaf (or to the empty slot), the last entry is closest to the root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Proof {
    pub key_hash: Digest,
    pub value: Vec<u8>,
    pub depth_reached: u32,
    pub algorithm_id: String,
    pub siblings: Vec<Digest>,
    pub bitmask: Vec<u8>,
    pub compressed: bool,
    pub kind: ProofKind,
}

impl Proof {
    fn bitmask_len_bytes(num_levels: usize) -> usize {
        num_levels.div_ceil(8)
    }

    fn bit_set(bitmask: &mut [u8], index: usize) {
        bitmask[index / 8] |= 1 << (7 - (index % 8));
    }

    fn bit_get(bitmask: &[u8], index: usize) -> bool {
        (bitmask[index / 8] >> (7 - (index % 8))) & 1 == 1
    }

    /// Compresses the proof in place: siblings equal to the canonical zero
    /// for their verification level are dropped, with `bitmask` recording
    /// which positions were kept.
    pub fn compress(mut self, zero: &ZeroHashTable) -> Self {
        if self.compressed {
            return self;
        }
        let mut bitmask = vec![0u8; Self::bitmask_len_bytes(self.siblings.len())];
        let mut kept = Vec::new();
        for (i, sibling) in self.siblings.iter().enumerate() {
            let traversal_level = self.depth_reached - 1 - i as u32;
            let canonical_zero = zero.empty_at(traversal_level + 1);
            if *sibling != canonical_zero {
                Self::bit_set(&mut bitmask, i);
                kept.push(sibling.clone());
            }
        }
        self.siblings = kept;
        self.bitmask = bitmask;
        self.compressed = true;
        self
    }

    /// Reconstructs the full, uncompressed sibling list.
    pub fn decompress(mut self, zero: &ZeroHashTable) -> Self {
        if !self.compressed {
            return self;
        }
        let mut full = Vec::with_capacity(self.depth_reached as usize);
        let mut next_kept = self.siblings.into_iter();
        for i in 0..self.depth_reached as usize {
            if Self::bit_get(&self.bitmask, i) {
                full.push(next_kept.next().expect("bitmask/sibling count mismatch"));
            } else {
                let traversal_level = self.depth_reached - 1 - i as u32;
                full.push(zero.empty_at(traversal_level + 1));
            }
        }
        self.siblings = full;
        self.bitmask = Vec::new();
        self.compressed = false;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.key_hash.as_bytes());
        buf.write_u32::<LittleEndian>(self.value.len() as u32).unwrap();
        buf.extend_from_slice(&self.value);
        buf.write_u32::<LittleEndian>(self.depth_reached).unwrap();
        buf.write_u32::<LittleEndian>(self.algorithm_id.len() as u32)
            .unwrap();
        buf.extend_from_slice(self.algorithm_id.as_bytes());
        buf.write_u8(self.compressed as u8).unwrap();
        buf.write_u32::<LittleEndian>(self.bitmask.len() as u32).unwrap();
        buf.extend_from_slice(&self.bitmask);
        buf.write_u32::<LittleEndian>(self.siblings.len() as u32)
            .unwrap();
        for sibling in &self.siblings {
            buf.write_u32::<LittleEndian>(sibling.len() as u32).unwrap();
            buf.extend_from_slice(sibling.as_bytes());
        }
        match &self.kind {
            ProofKind::Inclusion => buf.write_u8(0).unwrap(),
            ProofKind::NonInclusionEmptyPath => buf.write_u8(1).unwrap(),
            ProofKind::NonInclusionLeafMismatch {
                leaf_key_hash,
                leaf_value,
            } => {
                buf.write_u8(2).unwrap();
                buf.write_u32::<LittleEndian>(leaf_key_hash.len() as u32)
                    .unwrap();
                buf.extend_from_slice(leaf_key_hash.as_bytes());
                buf.write_u32::<LittleEndian>(leaf_value.len() as u32)
                    .unwrap();
                buf.extend_from_slice(leaf_value);
            }
        }
        buf
    }

    pub fn decode(bytes: &[u8], hash_size: usize) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let key_hash = read_digest(&mut cursor, hash_size, "proof key_hash")?;
        let value_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("proof value_len: {e}")))? as usize;
        let mut value = vec![0u8; value_len];
        cursor
            .read_exact(&mut value)
            .map_err(|e| Error::corrupt_node(format!("proof value: {e}")))?;
        let depth_reached = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("proof depth_reached: {e}")))?;
        let id_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("proof algorithm_id len: {e}")))? as usize;
        let mut id_buf = vec![0u8; id_len];
        cursor
            .read_exact(&mut id_buf)
            .map_err(|e| Error::corrupt_node(format!("proof algorithm_id: {e}")))?;
        let algorithm_id = String::from_utf8(id_buf)
            .map_err(|e| Error::corrupt_node(format!("proof algorithm_id utf8: {e}")))?;
        let compressed = cursor
            .read_u8()
            .map_err(|e| Error::corrupt_node(format!("proof compressed flag: {e}")))?
            != 0;
        let bitmask_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("proof bitmask len: {e}")))? as usize;
        let mut bitmask = vec![0u8; bitmask_len];
        cursor
            .read_exact(&mut bitmask)
            .map_err(|e| Error::corrupt_node(format!("proof bitmask: {e}")))?;
        let sibling_count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("proof sibling count: {e}")))? as usize;
        let mut siblings = Vec::with_capacity(sibling_count);
        for _ in 0..sibling_count {
            let len = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| Error::corrupt_node(format!("proof sibling len: {e}")))? as usize;
            siblings.push(read_digest(&mut cursor, len, "proof sibling")?);
        }
        let kind_tag = cursor
            .read_u8()
            .map_err(|e| Error::corrupt_node(format!("proof kind tag: {e}")))?;
        let kind = match kind_tag {
            0 => ProofKind::Inclusion,
            1 => ProofKind::NonInclusionEmptyPath,
            2 => {
                let key_len = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| Error::corrupt_node(format!("proof leaf_key_hash len: {e}")))?
                    as usize;
                let leaf_key_hash = read_digest(&mut cursor, key_len, "proof leaf_key_hash")?;
                let value_len = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| Error::corrupt_node(format!("proof leaf_value len: {e}")))?
                    as usize;
                let mut leaf_value = vec![0u8; value_len];
                cursor
                    .read_exact(&mut leaf_value)
                    .map_err(|e| Error::corrupt_node(format!("proof leaf_value: {e}")))?;
                ProofKind::NonInclusionLeafMismatch {
                    leaf_key_hash,
                    leaf_value,
                }
            }
            other => {
                return Err(Error::corrupt_node(format!("unknown proof kind tag {other}")));
            }
        };
        Ok(Proof {
            key_hash,
            value,
            depth_reached,
            algorithm_id,
            siblings,
            bitmask,
            compressed,
            kind,
        })
    }
}

fn read_digest(cursor: &mut Cursor<&[u8]>, len: usize, field: &str) -> Result<Digest> {
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|e| Error::corrupt_node(format!("{field}: {e}")))?;
    Ok(Digest::from_bytes(buf))
}

/// Traverses from `root` toward `full_key_hash`, collecting siblings in
/// traversal (top-down) order, stopping at a leaf or padding out to the full
/// depth when the path runs into a canonically empty subtree early — a
/// proof always spans the full depth, the same invariant the write engine
/// now holds for stored nodes.
fn collect_path(
    zero: &ZeroHashTable,
    depth: u32,
    root: &Digest,
    full_key_hash: &Digest,
    bit_path: &[bool],
    reader: &dyn TreeReader,
    cancel: &dyn CancellationToken,
) -> Result<(Vec<Digest>, PathEnd)> {
    let mut siblings_top_down = Vec::new();
    let mut current = root.clone();
    let mut level = 0u32;

    loop {
        cancel::check(cancel)?;
        if current == zero.empty_at(level) {
            return Ok(pad_empty(zero, depth, level, siblings_top_down));
        }
        let node = match reader.read_node(&current).map_err(Error::StorageFailure)? {
            Some(blob) => blob.node,
            None => return Ok(pad_empty(zero, depth, level, siblings_top_down)),
        };
        match node {
            Node::Leaf(leaf) => {
                let matches = leaf.key_hash == *full_key_hash;
                return Ok((
                    siblings_top_down,
                    PathEnd::Leaf {
                        level,
                        matches,
                        leaf,
                    },
                ));
            }
            Node::Internal(internal) => {
                let go_right = bit_path[level as usize];
                let (sibling, child) = if go_right {
                    (internal.left_hash, internal.right_hash)
                } else {
                    (internal.right_hash, internal.left_hash)
                };
                siblings_top_down.push(sibling);
                current = child;
                level += 1;
            }
            Node::Empty(_) => return Ok(pad_empty(zero, depth, level, siblings_top_down)),
        }
    }
}

/// Fills the remaining bounded levels `[level, depth)` with the canonical
/// zero sibling for each, mirroring the write engine's own padding so an
/// early empty-subtree hit still yields a full-depth proof.
fn pad_empty(
    zero: &ZeroHashTable,
    depth: u32,
    level: u32,
    mut siblings_top_down: Vec<Digest>,
) -> (Vec<Digest>, PathEnd) {
    let pad_to = depth.max(level);
    for l in level..pad_to {
        siblings_top_down.push(zero.empty_at(l + 1));
    }
    (siblings_top_down, PathEnd::Empty { level: pad_to })
}

enum PathEnd {
    Empty {
        level: u32,
    },
    Leaf {
        level: u32,
        matches: bool,
        leaf: crate::node::LeafNode,
    },
}

pub(crate) fn inclusion_proof(
    zero: &ZeroHashTable,
    depth: u32,
    algorithm_id: &str,
    root: &Digest,
    full_key_hash: &Digest,
    bit_path: &[bool],
    reader: &dyn TreeReader,
    cancel: &dyn CancellationToken,
) -> Result<Option<Proof>> {
    let (siblings_top_down, end) =
        collect_path(zero, depth, root, full_key_hash, bit_path, reader, cancel)?;
    match end {
        PathEnd::Leaf {
            level,
            matches: true,
            leaf,
        } => Ok(Some(Proof {
            key_hash: full_key_hash.clone(),
            value: leaf.value,
            depth_reached: level,
            algorithm_id: algorithm_id.to_string(),
            siblings: siblings_top_down.into_iter().rev().collect(),
            bitmask: Vec::new(),
            compressed: false,
            kind: ProofKind::Inclusion,
        })),
        _ => Ok(None),
    }
}

pub(crate) fn non_inclusion_proof(
    zero: &ZeroHashTable,
    depth: u32,
    algorithm_id: &str,
    root: &Digest,
    full_key_hash: &Digest,
    bit_path: &[bool],
    reader: &dyn TreeReader,
    cancel: &dyn CancellationToken,
) -> Result<Option<Proof>> {
    let (siblings_top_down, end) =
        collect_path(zero, depth, root, full_key_hash, bit_path, reader, cancel)?;
    match end {
        PathEnd::Empty { level } => Ok(Some(Proof {
            key_hash: full_key_hash.clone(),
            value: Vec::new(),
            depth_reached: level,
            algorithm_id: algorithm_id.to_string(),
            siblings: siblings_top_down.into_iter().rev().collect(),
            bitmask: Vec::new(),
            compressed: false,
            kind: ProofKind::NonInclusionEmptyPath,
        })),
        PathEnd::Leaf {
            level,
            matches: false,
            leaf,
        } => Ok(Some(Proof {
            key_hash: full_key_hash.clone(),
            value: Vec::new(),
            depth_reached: level,
            algorithm_id: algorithm_id.to_string(),
            siblings: siblings_top_down.into_iter().rev().collect(),
            bitmask: Vec::new(),
            compressed: false,
            kind: ProofKind::NonInclusionLeafMismatch {
                leaf_key_hash: leaf.key_hash,
                leaf_value: leaf.value,
            },
        })),
        PathEnd::Leaf { matches: true, .. } => Ok(None),
    }
}

/// Recomputes the root implied by `proof` and returns it for comparison.
fn recompute_root(hasher: &dyn TreeHasher, proof: &Proof, leaf_hash: Digest) -> Digest {
    let mut current = leaf_hash;
    for (i, sibling) in proof.siblings.iter().enumerate() {
        let traversal_level = proof.depth_reached - 1 - i as u32;
        let bit = proof.key_hash.bit(traversal_level as usize);
        current = if bit {
            hasher.hash_internal(sibling, &current)
        } else {
            hasher.hash_internal(&current, sibling)
        };
    }
    current
}

pub fn verify_inclusion(hasher: &dyn TreeHasher, depth: u32, root: &Digest, proof: &Proof) -> bool {
    if proof.kind != ProofKind::Inclusion {
        return false;
    }
    if proof.siblings.len() != proof.depth_reached as usize {
        return false;
    }
    if proof.depth_reached < depth {
        return false;
    }
    let leaf_hash = hasher.hash_leaf(&proof.key_hash, &proof.value);
    recompute_root(hasher, proof, leaf_hash) == *root
}

pub fn verify_non_inclusion(hasher: &dyn TreeHasher, depth: u32, root: &Digest, proof: &Proof) -> bool {
    if proof.siblings.len() != proof.depth_reached as usize {
        return false;
    }
    if proof.depth_reached < depth {
        return false;
    }
    match &proof.kind {
        ProofKind::NonInclusionEmptyPath => {
            let empty_leaf_hash = hasher.leaf_domain_hash();
            recompute_root(hasher, proof, empty_leaf_hash) == *root
        }
        ProofKind::NonInclusionLeafMismatch {
            leaf_key_hash,
            leaf_value,
        } => {
            if leaf_key_hash == &proof.key_hash {
                return false;
            }
            let d = depth.min(proof.key_hash.len() as u32 * 8);
            if leaf_key_hash.common_prefix_bits_len(&proof.key_hash) as u32 >= d
                && proof.depth_reached < d
            {
                return false;
            }
            let leaf_hash = hasher.hash_leaf(leaf_key_hash, leaf_value);
            recompute_root(hasher, proof, leaf_hash) == *root
        }
        ProofKind::Inclusion => false,
    }
}

#[cfg(test)]
mod proof_test {
    use super::*;
    use crate::hash::Sha256Hasher;

    #[test]
    fn bitmask_round_trips_compression() {
        let hasher = Sha256Hasher;
        let zero = ZeroHashTable::build(&hasher, 8);
        let proof = Proof {
            key_hash: hasher.digest(b"alice"),
            value: b"100".to_vec(),
            depth_reached: 8,
            algorithm_id: "sha256".to_string(),
            siblings: (0..8u32).map(|i| zero.empty_at(i + 1)).collect(),
            bitmask: Vec::new(),
            compressed: false,
            kind: ProofKind::Inclusion,
        };
        let compressed = proof.clone().compress(&zero);
        assert!(compressed.siblings.is_empty());
        let decompressed = compressed.decompress(&zero);
        assert_eq!(decompressed.siblings, proof.siblings);
    }

    #[test]
    fn proof_encode_decode_round_trip() {
        let hasher = Sha256Hasher;
        let zero = ZeroHashTable::build(&hasher, 8);
        let proof = Proof {
            key_hash: hasher.digest(b"alice"),
            value: b"100".to_vec(),
            depth_reached: 8,
            algorithm_id: "sha256".to_string(),
            siblings: (0..8u32).map(|i| zero.empty_at(i + 1)).collect(),
            bitmask: Vec::new(),
            compressed: false,
            kind: ProofKind::Inclusion,
        };
        let encoded = proof.encode();
        let decoded = Proof::decode(&encoded, hasher.output_size()).unwrap();
        assert_eq!(proof, decoded);
    }
}
