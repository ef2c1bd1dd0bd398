// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The storage interface (component C6): the minimal capability set the core
//! consumes, plus an in-memory reference adapter used by tests and by
//! embedding callers that do not need durability.

use crate::hash::Digest;
use crate::node::Node;
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A node together with the storage-facing bits an adapter may want to index
/// on. `path` is informational only; the core never reads it back.
#[derive(Clone, Debug)]
pub struct NodeBlob {
    pub hash: Digest,
    pub path: Option<Vec<bool>>,
    pub node: Node,
}

impl NodeBlob {
    pub fn new(node: Node) -> Self {
        NodeBlob {
            hash: node.hash().clone(),
            path: None,
            node,
        }
    }

    pub fn with_path(node: Node, path: Vec<bool>) -> Self {
        NodeBlob {
            hash: node.hash().clone(),
            path: Some(path),
            node,
        }
    }
}

/// Read-side storage capability. Must return the most recently written blob
/// for a hash, or `None` if it has never been written.
pub trait TreeReader {
    fn read_node(&self, hash: &Digest) -> Result<Option<NodeBlob>>;

    fn node_exists(&self, hash: &Digest) -> Result<bool> {
        Ok(self.read_node(hash)?.is_some())
    }
}

/// Write-side storage capability. A batch must be fully readable by any
/// subsequent `read_node` call once `write_batch` returns.
pub trait TreeWriter {
    fn write_batch(&self, blobs: Vec<NodeBlob>) -> Result<()>;
}

/// An in-memory reference storage adapter, grounded on the teacher's
/// `MockTreeStore`. Not part of the correctness-critical core: callers that
/// need durability must supply their own adapter.
#[derive(Default)]
pub struct MemoryTreeStore {
    nodes: RwLock<HashMap<Digest, NodeBlob>>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.read().len()
    }

    #[cfg(test)]
    pub fn put_node_for_test(&self, node: Node) {
        let blob = NodeBlob::new(node.clone());
        self.nodes.write().insert(node.hash().clone(), blob);
    }
}

impl TreeReader for MemoryTreeStore {
    fn read_node(&self, hash: &Digest) -> Result<Option<NodeBlob>> {
        Ok(self.nodes.read().get(hash).cloned())
    }
}

impl TreeWriter for MemoryTreeStore {
    fn write_batch(&self, blobs: Vec<NodeBlob>) -> Result<()> {
        let mut guard = self.nodes.write();
        for blob in blobs {
            guard.insert(blob.hash.clone(), blob);
        }
        Ok(())
    }
}
