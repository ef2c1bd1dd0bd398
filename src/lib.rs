// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! A storage-agnostic, deterministic sparse Merkle tree.
//!
//! The tree is organized around the components laid out in its design
//! document: a pluggable [`hash::TreeHasher`], bit-path utilities over key
//! hashes, a precomputed [`zero_hash::ZeroHashTable`] for empty subtrees, a
//! canonical [`node::Node`] codec, [`metadata::Metadata`] describing how a
//! root hash must be interpreted, a minimal [`storage::TreeReader`] /
//! [`storage::TreeWriter`] capability pair, and the write/read/proof engines
//! wired together behind [`tree::SparseMerkleTree`].
//!
//! Callers only ever interact with [`tree::SparseMerkleTree`]; everything
//! else is exported for adapters that need to persist or inspect the wire
//! formats directly.

pub mod bit_path;
pub mod cancel;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod metrics;
pub mod node;
pub mod proof;
pub mod storage;
pub mod tree;
pub mod update_set;
mod zero_hash;

pub use cancel::{CancellationToken, NeverCancelled};
pub use error::{Error, Result};
pub use hash::{Digest, Sha256Hasher, TreeHasher};
pub use metadata::Metadata;
pub use node::{EmptyNode, InternalNode, LeafNode, Node};
pub use proof::{Proof, ProofKind};
pub use storage::{MemoryTreeStore, NodeBlob, TreeReader, TreeWriter};
pub use tree::{SparseMerkleTree, TreeStore, UpdateResult};
pub use update_set::{BatchOp, UpdateSet};
pub use zero_hash::ZeroHashTable;
