// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Tree metadata (component C5): the algorithm identifier, depth, versions
//! and zero-hash table that together describe how a root hash must be
//! interpreted.

use crate::error::{Error, Result};
use crate::hash::TreeHasher;
use crate::zero_hash::ZeroHashTable;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

pub const SERIALIZATION_FORMAT_VERSION: u32 = 1;
pub const SMT_CORE_VERSION: u32 = 1;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Metadata {
    pub serialization_format_version: u32,
    pub smt_core_version: u32,
    pub tree_depth: u32,
    pub algorithm_id: String,
    pub zero_hashes: ZeroHashTable,
}

impl Metadata {
    /// Builds metadata for a hasher and the requested depth, validating the
    /// invariants from the data model (depth bounds, non-empty algorithm id).
    pub fn new(hasher: &dyn TreeHasher, depth: u32) -> Result<Self> {
        if depth == 0 || depth as usize > 8 * hasher.output_size() {
            return Err(Error::invalid_input(format!(
                "tree depth {depth} out of range for hasher with {}-byte output",
                hasher.output_size()
            )));
        }
        let zero_hashes = ZeroHashTable::build(hasher, depth);
        Ok(Metadata {
            serialization_format_version: SERIALIZATION_FORMAT_VERSION,
            smt_core_version: SMT_CORE_VERSION,
            tree_depth: depth,
            algorithm_id: hasher.name().to_string(),
            zero_hashes,
        })
    }

    /// Validates this metadata is consistent with `hasher` (matching
    /// algorithm id, matching zero-hash table, supported format version).
    pub fn validate_against(&self, hasher: &dyn TreeHasher) -> Result<()> {
        if self.serialization_format_version != SERIALIZATION_FORMAT_VERSION {
            return Err(Error::VersionUnsupported(self.serialization_format_version));
        }
        if self.algorithm_id != hasher.name() {
            return Err(Error::invalid_input(format!(
                "metadata algorithm id {:?} does not match active hasher {:?}",
                self.algorithm_id,
                hasher.name()
            )));
        }
        if self.zero_hashes.depth() != self.tree_depth {
            return Err(Error::invalid_input(
                "zero-hash table depth does not match declared tree depth",
            ));
        }
        if self.zero_hashes.algorithm_id() != hasher.name() {
            return Err(Error::invalid_input(
                "zero-hash table algorithm id does not match active hasher",
            ));
        }
        self.zero_hashes.verify(hasher)?;
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(self.serialization_format_version)
            .unwrap();
        buf.write_u32::<LittleEndian>(self.smt_core_version)
            .unwrap();
        buf.write_u32::<LittleEndian>(self.tree_depth).unwrap();
        buf.write_u32::<LittleEndian>(self.algorithm_id.len() as u32)
            .unwrap();
        buf.extend_from_slice(self.algorithm_id.as_bytes());
        buf.extend_from_slice(&self.zero_hashes.encode());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let serialization_format_version = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("metadata format version: {e}")))?;
        if serialization_format_version != SERIALIZATION_FORMAT_VERSION {
            return Err(Error::VersionUnsupported(serialization_format_version));
        }
        let smt_core_version = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("metadata core version: {e}")))?;
        let tree_depth = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("metadata tree depth: {e}")))?;
        let id_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::corrupt_node(format!("metadata algorithm id len: {e}")))?
            as usize;
        let mut id_buf = vec![0u8; id_len];
        cursor
            .read_exact(&mut id_buf)
            .map_err(|e| Error::corrupt_node(format!("metadata algorithm id: {e}")))?;
        let algorithm_id = String::from_utf8(id_buf)
            .map_err(|e| Error::corrupt_node(format!("metadata algorithm id utf8: {e}")))?;
        let rest = &bytes[cursor.position() as usize..];
        let zero_hashes = ZeroHashTable::decode(rest)?;
        Ok(Metadata {
            serialization_format_version,
            smt_core_version,
            tree_depth,
            algorithm_id,
            zero_hashes,
        })
    }
}
