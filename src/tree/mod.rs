// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The tree construction surface: ties the write engine (C7), read engine
//! (C8) and proof engine (C9) together behind the operations a caller
//! actually invokes.

mod read;
mod write;

use crate::bit_path::full_bit_path;
use crate::cancel::{CancellationToken, NeverCancelled};
use crate::error::{Error, Result};
use crate::hash::{Digest, TreeHasher};
use crate::metadata::Metadata;
use crate::metrics;
use crate::node::{EmptyNode, InternalNode, LeafNode, Node};
use crate::proof::{self, Proof};
use crate::storage::{NodeBlob, TreeReader, TreeWriter};
use crate::update_set::{BatchOp, UpdateSet};
use function_name::named;
use write::{Placement, WriteCtx};

/// The result of a write operation: the new root and every node the caller
/// must persist for that root to be readable.
#[derive(Clone, Debug)]
pub struct UpdateResult {
    pub new_root: Digest,
    pub nodes_to_persist: Vec<NodeBlob>,
}

/// Any storage that can both satisfy reads and accept a write batch. Only
/// `batch_update` requires both capabilities at once, since it persists each
/// step before applying the next.
pub trait TreeStore: TreeReader + TreeWriter {}
impl<T: TreeReader + TreeWriter> TreeStore for T {}

pub struct SparseMerkleTree<H: TreeHasher> {
    hasher: H,
    metadata: Metadata,
}

impl<H: TreeHasher> SparseMerkleTree<H> {
    /// Constructs a tree with depth `8 * hasher.output_size()` bits, i.e. the
    /// entire key-hash space is addressable without ever needing an
    /// extension chain.
    pub fn new(hasher: H) -> Result<Self> {
        let depth = (8 * hasher.output_size()) as u32;
        Self::new_with_depth(hasher, depth)
    }

    pub fn new_with_depth(hasher: H, depth: u32) -> Result<Self> {
        let metadata = Metadata::new(&hasher, depth)?;
        Ok(SparseMerkleTree { hasher, metadata })
    }

    pub fn new_from_metadata(hasher: H, metadata: Metadata) -> Result<Self> {
        metadata.validate_against(&hasher)?;
        Ok(SparseMerkleTree { hasher, metadata })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn depth(&self) -> u32 {
        self.metadata.tree_depth
    }

    /// The root hash of a tree holding no leaves: `Z[D]`.
    pub fn empty_root(&self) -> Digest {
        self.metadata.zero_hashes.get(self.metadata.tree_depth).clone()
    }

    pub fn hash_key(&self, key: &[u8]) -> Digest {
        self.hasher.digest(key)
    }

    pub fn get_bit_path(&self, key: &[u8]) -> Vec<bool> {
        full_bit_path(&self.hash_key(key))
    }

    pub fn create_empty_node(&self, level: u32) -> Node {
        Node::Empty(EmptyNode {
            level,
            hash: self.metadata.zero_hashes.empty_at(level),
        })
    }

    pub fn create_leaf_node(&self, key: &[u8], value: Vec<u8>) -> Result<LeafNode> {
        self.create_leaf_node_inner(key, value, false)
    }

    pub fn create_leaf_node_keeping_key(&self, key: &[u8], value: Vec<u8>) -> Result<LeafNode> {
        self.create_leaf_node_inner(key, value, true)
    }

    fn create_leaf_node_inner(&self, key: &[u8], value: Vec<u8>, keep_key: bool) -> Result<LeafNode> {
        if key.is_empty() {
            return Err(Error::invalid_input("key must not be empty"));
        }
        if value.is_empty() {
            return Err(Error::invalid_input("value must not be empty"));
        }
        let key_hash = self.hash_key(key);
        Ok(if keep_key {
            LeafNode::new_keeping_key(&self.hasher, key_hash, value, Some(key.to_vec()))
        } else {
            LeafNode::new(&self.hasher, key_hash, value)
        })
    }

    pub fn create_internal_node(&self, left_hash: Digest, right_hash: Digest) -> InternalNode {
        InternalNode::new(&self.hasher, left_hash, right_hash)
    }

    fn check_root(&self, root: &Digest) -> Result<()> {
        if root.len() != self.hasher.output_size() {
            return Err(Error::invalid_input(format!(
                "root hash has {} bytes, expected {}",
                root.len(),
                self.hasher.output_size()
            )));
        }
        Ok(())
    }

    pub fn get(&self, key: &[u8], root: &Digest, storage: &dyn TreeReader) -> Result<Option<Vec<u8>>> {
        self.get_cancellable(key, root, storage, &NeverCancelled)
    }

    #[named]
    pub fn get_cancellable(
        &self,
        key: &[u8],
        root: &Digest,
        storage: &dyn TreeReader,
        cancel: &dyn CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        if key.is_empty() {
            return Err(Error::invalid_input("key must not be empty"));
        }
        self.check_root(root)?;
        let timer = metrics::get()
            .operation_latency_seconds
            .with_label_values(&[function_name!()])
            .start_timer();
        let key_hash = self.hash_key(key);
        let bit_path = full_bit_path(&key_hash);
        let result = read::get(
            self.hasher.output_size(),
            &self.metadata.zero_hashes,
            root,
            &key_hash,
            &bit_path,
            storage,
            cancel,
        );
        timer.observe_duration();
        result
    }

    pub fn update(
        &self,
        key: &[u8],
        value: Vec<u8>,
        root: &Digest,
        storage: &dyn TreeReader,
    ) -> Result<UpdateResult> {
        self.update_cancellable(key, value, root, storage, &NeverCancelled)
    }

    #[named]
    pub fn update_cancellable(
        &self,
        key: &[u8],
        value: Vec<u8>,
        root: &Digest,
        storage: &dyn TreeReader,
        cancel: &dyn CancellationToken,
    ) -> Result<UpdateResult> {
        self.check_root(root)?;
        let timer = metrics::get()
            .operation_latency_seconds
            .with_label_values(&[function_name!()])
            .start_timer();
        let leaf = self.create_leaf_node(key, value)?;
        let key_hash = leaf.key_hash.clone();
        let bit_path = full_bit_path(&key_hash);
        let placement = Placement::Insert { leaf, key_bytes: key };
        let result = self.apply(root, &key_hash, &bit_path, &placement, storage, cancel);
        timer.observe_duration();
        let result = result?;
        metrics::get()
            .nodes_written
            .with_label_values(&[function_name!()])
            .inc_by(result.nodes_to_persist.len() as u64);
        Ok(result)
    }

    pub fn delete(&self, key: &[u8], root: &Digest, storage: &dyn TreeReader) -> Result<UpdateResult> {
        self.delete_cancellable(key, root, storage, &NeverCancelled)
    }

    #[named]
    pub fn delete_cancellable(
        &self,
        key: &[u8],
        root: &Digest,
        storage: &dyn TreeReader,
        cancel: &dyn CancellationToken,
    ) -> Result<UpdateResult> {
        if key.is_empty() {
            return Err(Error::invalid_input("key must not be empty"));
        }
        self.check_root(root)?;
        let timer = metrics::get()
            .operation_latency_seconds
            .with_label_values(&[function_name!()])
            .start_timer();
        let key_hash = self.hash_key(key);
        let bit_path = full_bit_path(&key_hash);
        let result = self.apply(root, &key_hash, &bit_path, &Placement::Delete, storage, cancel);
        timer.observe_duration();
        result
    }

    fn apply(
        &self,
        root: &Digest,
        key_hash: &Digest,
        bit_path: &[bool],
        placement: &Placement,
        storage: &dyn TreeReader,
        cancel: &dyn CancellationToken,
    ) -> Result<UpdateResult> {
        let ctx = WriteCtx {
            hasher: &self.hasher,
            zero: &self.metadata.zero_hashes,
            reader: storage,
            cancel,
        };
        let mut emitted = Vec::new();
        let outcome = write::apply_at(&ctx, 0, root, key_hash, bit_path, placement, &mut emitted)?;
        let new_root = outcome.into_hash(0, &self.metadata.zero_hashes);
        Ok(UpdateResult {
            new_root,
            nodes_to_persist: emitted,
        })
    }

    pub fn batch_update(
        &self,
        updates: UpdateSet,
        root: &Digest,
        store: &impl TreeStore,
    ) -> Result<UpdateResult> {
        self.batch_update_cancellable(updates, root, store, &NeverCancelled)
    }

    /// Applies a batch deterministically: entries are sorted by key-hash
    /// ascending and applied in sequence, persisting each step's nodes before
    /// the next is computed so later steps can read earlier ones.
    #[named]
    pub fn batch_update_cancellable(
        &self,
        updates: UpdateSet,
        root: &Digest,
        store: &impl TreeStore,
        cancel: &dyn CancellationToken,
    ) -> Result<UpdateResult> {
        self.check_root(root)?;
        let timer = metrics::get()
            .operation_latency_seconds
            .with_label_values(&[function_name!()])
            .start_timer();

        let mut entries: Vec<(Digest, Vec<u8>, BatchOp)> = updates
            .into_updates()
            .into_iter()
            .map(|(key, op)| (self.hash_key(&key), key, op))
            .collect();
        entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let mut current_root = root.clone();
        let mut all_emitted = Vec::new();
        for (key_hash, key_bytes, op) in &entries {
            let bit_path = full_bit_path(key_hash);
            let placement = match op {
                BatchOp::Update(value) => {
                    if value.is_empty() {
                        return Err(Error::invalid_input("value must not be empty"));
                    }
                    let leaf = LeafNode::new(&self.hasher, key_hash.clone(), value.clone());
                    Placement::Insert {
                        leaf,
                        key_bytes,
                    }
                }
                BatchOp::Delete => Placement::Delete,
            };
            let result = self.apply(&current_root, key_hash, &bit_path, &placement, store, cancel)?;
            store
                .write_batch(result.nodes_to_persist.clone())
                .map_err(Error::StorageFailure)?;
            current_root = result.new_root;
            all_emitted.extend(result.nodes_to_persist);
        }

        timer.observe_duration();
        metrics::get()
            .nodes_written
            .with_label_values(&[function_name!()])
            .inc_by(all_emitted.len() as u64);
        Ok(UpdateResult {
            new_root: current_root,
            nodes_to_persist: all_emitted,
        })
    }

    pub fn inclusion_proof(
        &self,
        key: &[u8],
        root: &Digest,
        storage: &dyn TreeReader,
        compress: bool,
    ) -> Result<Option<Proof>> {
        self.check_root(root)?;
        let key_hash = self.hash_key(key);
        let bit_path = full_bit_path(&key_hash);
        let built = proof::inclusion_proof(
            &self.metadata.zero_hashes,
            self.metadata.tree_depth,
            &self.metadata.algorithm_id,
            root,
            &key_hash,
            &bit_path,
            storage,
            &NeverCancelled,
        )?;
        Ok(built.map(|p| {
            if compress {
                p.compress(&self.metadata.zero_hashes)
            } else {
                p
            }
        }))
    }

    pub fn non_inclusion_proof(
        &self,
        key: &[u8],
        root: &Digest,
        storage: &dyn TreeReader,
        compress: bool,
    ) -> Result<Option<Proof>> {
        self.check_root(root)?;
        let key_hash = self.hash_key(key);
        let bit_path = full_bit_path(&key_hash);
        let built = proof::non_inclusion_proof(
            &self.metadata.zero_hashes,
            self.metadata.tree_depth,
            &self.metadata.algorithm_id,
            root,
            &key_hash,
            &bit_path,
            storage,
            &NeverCancelled,
        )?;
        Ok(built.map(|p| {
            if compress {
                p.compress(&self.metadata.zero_hashes)
            } else {
                p
            }
        }))
    }

    pub fn verify_inclusion(&self, root: &Digest, proof: &Proof) -> bool {
        let proof = if proof.compressed {
            proof.clone().decompress(&self.metadata.zero_hashes)
        } else {
            proof.clone()
        };
        let ok = proof::verify_inclusion(&self.hasher, self.metadata.tree_depth, root, &proof);
        metrics::get()
            .proof_verifications
            .with_label_values(&["inclusion", if ok { "valid" } else { "invalid" }])
            .inc();
        ok
    }

    pub fn verify_non_inclusion(&self, root: &Digest, proof: &Proof) -> bool {
        let proof = if proof.compressed {
            proof.clone().decompress(&self.metadata.zero_hashes)
        } else {
            proof.clone()
        };
        let ok = proof::verify_non_inclusion(&self.hasher, self.metadata.tree_depth, root, &proof);
        metrics::get()
            .proof_verifications
            .with_label_values(&["non_inclusion", if ok { "valid" } else { "invalid" }])
            .inc();
        ok
    }
}
