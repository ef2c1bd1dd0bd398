// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The zero-hash table (component C3): precomputed digests for empty
//! subtrees at every level `0..=D`.

use crate::error::{Error, Result};
use crate::hash::{Digest, TreeHasher};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

/// `Z[0] = H(LEAF)`, `Z[L] = H(INTERNAL || Z[L-1] || Z[L-1])`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZeroHashTable {
    algorithm_id: String,
    table: Vec<Digest>,
}

impl ZeroHashTable {
    /// Builds the table for a hasher and a tree depth.
    pub fn build(hasher: &dyn TreeHasher, depth: u32) -> Self {
        let mut table = Vec::with_capacity(depth as usize + 1);
        table.push(hasher.leaf_domain_hash());
        for level in 1..=depth as usize {
            let prev = &table[level - 1];
            table.push(hasher.hash_internal(prev, prev));
        }
        ZeroHashTable {
            algorithm_id: hasher.name().to_string(),
            table,
        }
    }

    pub fn depth(&self) -> u32 {
        (self.table.len() - 1) as u32
    }

    pub fn algorithm_id(&self) -> &str {
        &self.algorithm_id
    }

    /// `Z[level]`. Panics if `level` exceeds the configured depth; callers
    /// within this crate never exceed it.
    pub fn get(&self, level: u32) -> &Digest {
        &self.table[level as usize]
    }

    /// The canonical hash of an empty subtree rooted `level` bits below the
    /// root. For `level <= depth()` this is `Z[depth() - level]`. Beyond the
    /// configured depth (inside an extension chain) there is no further
    /// notion of subtree height, so the placeholder is always `Z[0]`, the
    /// leaf-level zero.
    pub fn empty_at(&self, level: u32) -> Digest {
        if level <= self.depth() {
            self.get(self.depth() - level).clone()
        } else {
            self.get(0).clone()
        }
    }

    /// Recomputes the table from scratch and checks it is byte-identical to
    /// `self`, catching corruption after deserialization.
    pub fn verify(&self, hasher: &dyn TreeHasher) -> Result<()> {
        let recomputed = ZeroHashTable::build(hasher, self.depth());
        if recomputed != *self {
            return Err(Error::integrity_failure(
                "zero-hash table does not match recomputation for the active hasher",
            ));
        }
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(self.depth()).unwrap();
        let hash_size = self.table.first().map(|d| d.len()).unwrap_or(0);
        buf.write_u32::<LittleEndian>(hash_size as u32).unwrap();
        buf.write_u32::<LittleEndian>(self.algorithm_id.len() as u32)
            .unwrap();
        buf.extend_from_slice(self.algorithm_id.as_bytes());
        for digest in &self.table {
            buf.extend_from_slice(digest.as_bytes());
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let depth = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("zero-hash table depth: {e}")))?;
        let hash_size = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("zero-hash table hash size: {e}")))?
            as usize;
        let id_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("zero-hash table algorithm id len: {e}")))?
            as usize;
        let mut id_buf = vec![0u8; id_len];
        cursor
            .read_exact(&mut id_buf)
            .map_err(|e| Error::corrupt_node(format!("zero-hash table algorithm id: {e}")))?;
        let algorithm_id = String::from_utf8(id_buf)
            .map_err(|e| Error::corrupt_node(format!("zero-hash table algorithm id utf8: {e}")))?;

        let mut table = Vec::with_capacity(depth as usize + 1);
        for _ in 0..=depth {
            let mut digest_buf = vec![0u8; hash_size];
            cursor
                .read_exact(&mut digest_buf)
                .map_err(|e| Error::corrupt_node(format!("zero-hash table entry: {e}")))?;
            table.push(Digest::from_bytes(digest_buf));
        }
        Ok(ZeroHashTable {
            algorithm_id,
            table,
        })
    }
}

#[cfg(test)]
mod zero_hash_test {
    use super::*;
    use crate::hash::Sha256Hasher;

    #[test]
    fn deterministic_for_same_hasher_and_depth() {
        let a = ZeroHashTable::build(&Sha256Hasher, 8);
        let b = ZeroHashTable::build(&Sha256Hasher, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn z0_matches_known_vector() {
        let table = ZeroHashTable::build(&Sha256Hasher, 8);
        assert_eq!(
            hex::encode(table.get(0).as_bytes()),
            "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
        );
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let table = ZeroHashTable::build(&Sha256Hasher, 8);
        let encoded = table.encode();
        let decoded = ZeroHashTable::decode(&encoded).unwrap();
        assert_eq!(table, decoded);
    }

    #[test]
    fn verify_detects_mismatched_hasher_depth() {
        let table = ZeroHashTable::build(&Sha256Hasher, 8);
        let other = ZeroHashTable::build(&Sha256Hasher, 4);
        assert!(other.verify(&Sha256Hasher).is_ok());
        assert_ne!(table, other);
    }
}
