// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Read engine (component C8): deterministic root-to-leaf traversal for
//! point lookup, honoring extension chains beyond the configured depth.

use crate::cancel::{self, CancellationToken};
use crate::error::{Error, Result};
use crate::hash::Digest;
use crate::node::Node;
use crate::storage::TreeReader;
use crate::zero_hash::ZeroHashTable;

pub(crate) fn get(
    hasher_output_size: usize,
    zero: &ZeroHashTable,
    root: &Digest,
    full_key_hash: &Digest,
    bit_path: &[bool],
    reader: &dyn TreeReader,
    cancel: &dyn CancellationToken,
) -> Result<Option<Vec<u8>>> {
    let max_level = (hasher_output_size * 8) as u32;
    let mut current = root.clone();
    let mut level: u32 = 0;

    loop {
        cancel::check(cancel)?;

        if current == zero.empty_at(level) {
            return Ok(None);
        }

        let node = match reader.read_node(&current).map_err(Error::StorageFailure)? {
            Some(blob) => blob.node,
            None => return Ok(None),
        };

        match node {
            Node::Leaf(leaf) => {
                return if leaf.key_hash == *full_key_hash {
                    Ok(Some(leaf.value))
                } else {
                    Ok(None)
                };
            }
            Node::Internal(internal) => {
                if level >= max_level {
                    return Err(Error::corrupt_node(
                        "traversal exceeded the hash's bit length without reaching a leaf",
                    ));
                }
                current = if bit_path[level as usize] {
                    internal.right_hash
                } else {
                    internal.left_hash
                };
                level += 1;
            }
            Node::Empty(_) => return Ok(None),
        }
    }
}
