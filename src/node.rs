// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Node model and codec (component C4): the three node variants and their
//! canonical, length-prefixed, little-endian binary encoding.

use crate::error::{Error, Result};
use crate::hash::{Digest, TreeHasher};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::cast::FromPrimitive;
use std::io::{Cursor, Read};

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum NodeTag {
    Empty = 0x00,
    Leaf = 0x01,
    Internal = 0x02,
}

/// An empty subtree. Never required in storage; adapters may persist it for
/// their own indexing convenience.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmptyNode {
    pub level: u32,
    pub hash: Digest,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeafNode {
    pub key_hash: Digest,
    pub value: Vec<u8>,
    pub node_hash: Digest,
    pub original_key: Option<Vec<u8>>,
}

impl LeafNode {
    pub fn new(hasher: &dyn TreeHasher, key_hash: Digest, value: Vec<u8>) -> Self {
        Self::new_keeping_key(hasher, key_hash, value, None)
    }

    pub fn new_keeping_key(
        hasher: &dyn TreeHasher,
        key_hash: Digest,
        value: Vec<u8>,
        original_key: Option<Vec<u8>>,
    ) -> Self {
        let node_hash = hasher.hash_leaf(&key_hash, &value);
        LeafNode {
            key_hash,
            value,
            node_hash,
            original_key,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InternalNode {
    pub left_hash: Digest,
    pub right_hash: Digest,
    pub node_hash: Digest,
}

impl InternalNode {
    pub fn new(hasher: &dyn TreeHasher, left_hash: Digest, right_hash: Digest) -> Self {
        let node_hash = hasher.hash_internal(&left_hash, &right_hash);
        InternalNode {
            left_hash,
            right_hash,
            node_hash,
        }
    }
}

/// Tagged union over the three node kinds. See the module docs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    Empty(EmptyNode),
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    pub fn hash(&self) -> &Digest {
        match self {
            Node::Empty(n) => &n.hash,
            Node::Leaf(n) => &n.node_hash,
            Node::Internal(n) => &n.node_hash,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Node::Internal(_))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Node::Empty(n) => {
                buf.write_u8(NodeTag::Empty as u8).unwrap();
                buf.write_u32::<LittleEndian>(n.level).unwrap();
                buf.extend_from_slice(n.hash.as_bytes());
            }
            Node::Leaf(n) => {
                buf.write_u8(NodeTag::Leaf as u8).unwrap();
                buf.write_u32::<LittleEndian>(n.key_hash.len() as u32)
                    .unwrap();
                buf.extend_from_slice(n.key_hash.as_bytes());
                buf.write_u32::<LittleEndian>(n.value.len() as u32)
                    .unwrap();
                buf.extend_from_slice(&n.value);
                buf.extend_from_slice(n.node_hash.as_bytes());
                let original_key = n.original_key.as_deref().unwrap_or(&[]);
                buf.write_u32::<LittleEndian>(original_key.len() as u32)
                    .unwrap();
                buf.extend_from_slice(original_key);
            }
            Node::Internal(n) => {
                buf.write_u8(NodeTag::Internal as u8).unwrap();
                buf.write_u32::<LittleEndian>(n.left_hash.len() as u32)
                    .unwrap();
                buf.extend_from_slice(n.left_hash.as_bytes());
                buf.write_u32::<LittleEndian>(n.right_hash.len() as u32)
                    .unwrap();
                buf.extend_from_slice(n.right_hash.as_bytes());
                buf.extend_from_slice(n.node_hash.as_bytes());
            }
        }
        buf
    }

    /// `hash_size` is the active hasher's output length, needed to locate the
    /// fixed-length `node_hash` trailer unambiguously.
    pub fn decode(bytes: &[u8], hash_size: usize) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let tag_byte = cursor
            .read_u8()
            .map_err(|e| Error::corrupt_node(format!("node tag: {e}")))?;
        let tag = NodeTag::from_u8(tag_byte)
            .ok_or_else(|| Error::corrupt_node(format!("unknown node tag byte {tag_byte}")))?;
        match tag {
            NodeTag::Empty => {
                let level = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| Error::corrupt_node(format!("empty node level: {e}")))?;
                let hash = read_digest(&mut cursor, hash_size, "empty node hash")?;
                Ok(Node::Empty(EmptyNode { level, hash }))
            }
            NodeTag::Leaf => {
                let key_hash_len = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| Error::corrupt_node(format!("leaf key_hash_len: {e}")))?
                    as usize;
                let key_hash = read_digest(&mut cursor, key_hash_len, "leaf key_hash")?;
                let value_len = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| Error::corrupt_node(format!("leaf value_len: {e}")))?
                    as usize;
                let mut value = vec![0u8; value_len];
                cursor
                    .read_exact(&mut value)
                    .map_err(|e| Error::corrupt_node(format!("leaf value: {e}")))?;
                let node_hash = read_digest(&mut cursor, hash_size, "leaf node_hash")?;
                let original_key_len = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| Error::corrupt_node(format!("leaf original_key_len: {e}")))?
                    as usize;
                let original_key = if original_key_len == 0 {
                    None
                } else {
                    let mut buf = vec![0u8; original_key_len];
                    cursor
                        .read_exact(&mut buf)
                        .map_err(|e| Error::corrupt_node(format!("leaf original_key: {e}")))?;
                    Some(buf)
                };
                Ok(Node::Leaf(LeafNode {
                    key_hash,
                    value,
                    node_hash,
                    original_key,
                }))
            }
            NodeTag::Internal => {
                let left_len = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| Error::corrupt_node(format!("internal left_len: {e}")))?
                    as usize;
                let left_hash = read_digest(&mut cursor, left_len, "internal left_hash")?;
                let right_len = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| Error::corrupt_node(format!("internal right_len: {e}")))?
                    as usize;
                let right_hash = read_digest(&mut cursor, right_len, "internal right_hash")?;
                let node_hash = read_digest(&mut cursor, hash_size, "internal node_hash")?;
                Ok(Node::Internal(InternalNode {
                    left_hash,
                    right_hash,
                    node_hash,
                }))
            }
        }
    }

    /// Recomputes this node's hash from its fields and checks it matches the
    /// decoded `node_hash`, catching storage-layer corruption.
    pub fn verify_hash(&self, hasher: &dyn TreeHasher) -> Result<()> {
        let recomputed = match self {
            Node::Empty(_) => return Ok(()),
            Node::Leaf(n) => hasher.hash_leaf(&n.key_hash, &n.value),
            Node::Internal(n) => hasher.hash_internal(&n.left_hash, &n.right_hash),
        };
        if recomputed != *self.hash() {
            return Err(Error::integrity_failure(
                "decoded node hash does not match recomputed hash",
            ));
        }
        Ok(())
    }
}

fn read_digest(cursor: &mut Cursor<&[u8]>, len: usize, field: &str) -> Result<Digest> {
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|e| Error::corrupt_node(format!("{field}: {e}")))?;
    Ok(Digest::from_bytes(buf))
}

#[cfg(test)]
mod node_test {
    use super::*;
    use crate::hash::Sha256Hasher;

    #[test]
    fn leaf_round_trips() {
        let hasher = Sha256Hasher;
        let key_hash = hasher.digest(b"alice");
        let leaf = LeafNode::new(&hasher, key_hash, b"100".to_vec());
        let node = Node::Leaf(leaf);
        let encoded = node.encode();
        let decoded = Node::decode(&encoded, hasher.output_size()).unwrap();
        assert_eq!(node, decoded);
        decoded.verify_hash(&hasher).unwrap();
    }

    #[test]
    fn leaf_round_trips_with_original_key() {
        let hasher = Sha256Hasher;
        let key_hash = hasher.digest(b"alice");
        let leaf =
            LeafNode::new_keeping_key(&hasher, key_hash, b"100".to_vec(), Some(b"alice".to_vec()));
        let node = Node::Leaf(leaf);
        let encoded = node.encode();
        let decoded = Node::decode(&encoded, hasher.output_size()).unwrap();
        assert_eq!(node, decoded);
    }

    #[test]
    fn internal_round_trips() {
        let hasher = Sha256Hasher;
        let left = hasher.digest(b"left");
        let right = hasher.digest(b"right");
        let node = Node::Internal(InternalNode::new(&hasher, left, right));
        let encoded = node.encode();
        let decoded = Node::decode(&encoded, hasher.output_size()).unwrap();
        assert_eq!(node, decoded);
        decoded.verify_hash(&hasher).unwrap();
    }

    #[test]
    fn corrupted_tag_byte_is_rejected() {
        let bytes = vec![0xFFu8, 0, 0, 0, 0];
        assert!(Node::decode(&bytes, 32).is_err());
    }

    #[test]
    fn tampered_leaf_value_fails_hash_verification() {
        let hasher = Sha256Hasher;
        let key_hash = hasher.digest(b"alice");
        let mut leaf = LeafNode::new(&hasher, key_hash, b"100".to_vec());
        leaf.value = b"999".to_vec();
        let node = Node::Leaf(leaf);
        assert!(node.verify_hash(&hasher).is_err());
    }
}
