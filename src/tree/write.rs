// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Write engine (component C7): insert / update / delete / batch, built as a
//! single recursive copy-on-write descent that handles both the bounded
//! region (levels `0..depth`) and extension chains (levels `>= depth`)
//! uniformly. See [`apply_at`] for the two-phase descend/rebuild algorithm.

use crate::cancel::{self, CancellationToken};
use crate::error::{Error, Result};
use crate::hash::{Digest, TreeHasher};
use crate::node::{InternalNode, LeafNode, Node};
use crate::storage::{NodeBlob, TreeReader};
use crate::zero_hash::ZeroHashTable;

/// The outcome of applying a placement to a subtree, before the caller at
/// the level above wraps it into a real internal node: the subtree is
/// canonically empty, a bare leaf not yet wrapped at this position, or
/// already a genuine internal node hash.
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    Empty,
    Leaf(LeafNode),
    Internal(Digest),
}

impl Outcome {
    /// Resolves this outcome to the hash it contributes at `level`. An
    /// `Empty` outcome is exactly the canonical `Z` value at that level, by
    /// construction of the zero-hash table.
    pub(crate) fn into_hash(self, level: u32, zero: &ZeroHashTable) -> Digest {
        match self {
            Outcome::Empty => zero.empty_at(level),
            Outcome::Leaf(leaf) => leaf.node_hash,
            Outcome::Internal(hash) => hash,
        }
    }
}

pub(crate) enum Placement<'a> {
    Insert { leaf: LeafNode, key_bytes: &'a [u8] },
    Delete,
}

pub(crate) struct WriteCtx<'a> {
    pub hasher: &'a dyn TreeHasher,
    pub zero: &'a ZeroHashTable,
    pub reader: &'a dyn TreeReader,
    pub cancel: &'a dyn CancellationToken,
}

/// Phase A (descend, collect context) and Phase B (rebuild) combined into one
/// recursive pass: we read one node per level on the way down and, on the
/// way back up, every level calls [`combine`], which always wraps into a
/// real internal node — there is no shortcut that lets a lone leaf or an
/// empty sibling skip a level's `H(INTERNAL || left || right)`.
pub(crate) fn apply_at(
    ctx: &WriteCtx,
    level: u32,
    current_hash: &Digest,
    full_key_hash: &Digest,
    bit_path: &[bool],
    placement: &Placement,
    emitted: &mut Vec<NodeBlob>,
) -> Result<Outcome> {
    cancel::check(ctx.cancel)?;

    let here_empty = ctx.zero.empty_at(level);
    if *current_hash == here_empty {
        return place_in_empty(ctx, level, placement, bit_path, emitted);
    }

    let node = match ctx.reader.read_node(current_hash).map_err(Error::StorageFailure)? {
        Some(blob) => blob.node,
        None => return place_in_empty(ctx, level, placement, bit_path, emitted),
    };

    match node {
        Node::Leaf(existing) => {
            if existing.key_hash == *full_key_hash {
                if let (Some(original), Placement::Insert { key_bytes, .. }) =
                    (&existing.original_key, placement)
                {
                    if original.as_slice() != *key_bytes {
                        return Err(Error::DuplicateKey(full_key_hash.as_bytes().to_vec()));
                    }
                }
                place_in_empty(ctx, level, placement, bit_path, emitted)
            } else {
                match placement {
                    Placement::Delete => Ok(Outcome::Leaf(existing)),
                    Placement::Insert { leaf, .. } => {
                        branch_two_leaves(ctx, level, &existing, leaf, bit_path, emitted)
                    }
                }
            }
        }
        Node::Internal(internal) => {
            let go_right = bit_path[level as usize];
            let (sibling_hash, child_hash) = if go_right {
                (internal.left_hash.clone(), internal.right_hash.clone())
            } else {
                (internal.right_hash.clone(), internal.left_hash.clone())
            };
            let child_outcome = apply_at(
                ctx,
                level + 1,
                &child_hash,
                full_key_hash,
                bit_path,
                placement,
                emitted,
            )?;
            combine(ctx, level, go_right, sibling_hash, child_outcome, emitted)
        }
    }
}

/// Places (or removes) a leaf at a position discovered to be canonically
/// empty at `level`. For an insert, this is where the unconditional Phase B
/// wrap happens for every bounded level the recursion never actually visited
/// (because the whole subtree below `level` was already known to be empty):
/// the new leaf is padded all the way up to `max(level, depth)` with real
/// internal nodes against `Z` siblings, exactly as if the recursion had
/// walked down to an all-zero subtree and back up one level at a time. Past
/// the configured depth (inside an extension chain, or when this is called
/// one recursion level at a time from [`combine`]) `level >= depth` already,
/// so the pad range is empty and the single level above finishes the wrap.
fn place_in_empty(
    ctx: &WriteCtx,
    level: u32,
    placement: &Placement,
    bit_path: &[bool],
    emitted: &mut Vec<NodeBlob>,
) -> Result<Outcome> {
    match placement {
        Placement::Delete => Ok(Outcome::Empty),
        Placement::Insert { leaf, .. } => {
            emitted.push(NodeBlob::new(Node::Leaf(leaf.clone())));
            let mut current_hash = leaf.node_hash.clone();
            let pad_to = ctx.zero.depth().max(level);
            for d in (level..pad_to).rev() {
                let sibling = ctx.zero.empty_at(d + 1);
                let bit = bit_path[d as usize];
                let (l, r) = if bit {
                    (sibling, current_hash.clone())
                } else {
                    (current_hash.clone(), sibling)
                };
                let node = InternalNode::new(ctx.hasher, l, r);
                current_hash = node.node_hash.clone();
                emitted.push(NodeBlob::new(Node::Internal(node)));
            }
            Ok(Outcome::Internal(current_hash))
        }
    }
}

/// Builds the minimal branch (and, if the divergence lies beyond the
/// configured depth, the extension chain) separating two leaves whose
/// key-hashes agree on the bits `[0, level)` already traversed.
fn branch_two_leaves(
    ctx: &WriteCtx,
    level: u32,
    existing: &LeafNode,
    new_leaf: &LeafNode,
    bit_path: &[bool],
    emitted: &mut Vec<NodeBlob>,
) -> Result<Outcome> {
    let k = existing.key_hash.common_prefix_bits_len(&new_leaf.key_hash) as u32;
    debug_assert!(k >= level);

    emitted.push(NodeBlob::new(Node::Leaf(existing.clone())));
    emitted.push(NodeBlob::new(Node::Leaf(new_leaf.clone())));

    let existing_bit = existing.key_hash.bit(k as usize);
    let new_bit = new_leaf.key_hash.bit(k as usize);
    debug_assert_ne!(existing_bit, new_bit);
    let (l, r) = if new_bit {
        (existing.node_hash.clone(), new_leaf.node_hash.clone())
    } else {
        (new_leaf.node_hash.clone(), existing.node_hash.clone())
    };
    let branch = InternalNode::new(ctx.hasher, l, r);
    let mut current_hash = branch.node_hash.clone();
    emitted.push(NodeBlob::new(Node::Internal(branch)));

    for d in (level..k).rev() {
        let sibling = ctx.zero.empty_at(d + 1);
        let bit = bit_path[d as usize];
        let (l, r) = if bit {
            (sibling, current_hash.clone())
        } else {
            (current_hash.clone(), sibling)
        };
        let node = InternalNode::new(ctx.hasher, l, r);
        current_hash = node.node_hash.clone();
        emitted.push(NodeBlob::new(Node::Internal(node)));
    }

    Ok(Outcome::Internal(current_hash))
}

/// Rebuilds the parent at `level` from the untouched `sibling_hash` and the
/// outcome of recursing into the traversed child. Phase B is unconditional:
/// the only case that does not emit a real internal node is both sides
/// being canonically empty, which is simply `Z[level]` itself by the
/// zero-hash table's own recursive definition, not a stored node.
fn combine(
    ctx: &WriteCtx,
    level: u32,
    go_right: bool,
    sibling_hash: Digest,
    child_outcome: Outcome,
    emitted: &mut Vec<NodeBlob>,
) -> Result<Outcome> {
    let empty_at_child_level = ctx.zero.empty_at(level + 1);
    let child_hash = child_outcome.into_hash(level + 1, ctx.zero);

    if sibling_hash == empty_at_child_level && child_hash == empty_at_child_level {
        return Ok(Outcome::Empty);
    }
    wrap(ctx, go_right, sibling_hash, child_hash, emitted)
}

fn wrap(
    ctx: &WriteCtx,
    go_right: bool,
    sibling_hash: Digest,
    child_hash: Digest,
    emitted: &mut Vec<NodeBlob>,
) -> Result<Outcome> {
    let (l, r) = if go_right {
        (sibling_hash, child_hash)
    } else {
        (child_hash, sibling_hash)
    };
    let node = InternalNode::new(ctx.hasher, l, r);
    let hash = node.node_hash.clone();
    emitted.push(NodeBlob::new(Node::Internal(node)));
    Ok(Outcome::Internal(hash))
}
