// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the quantified invariants, gated behind the
//! `fuzzing` feature like the teacher's own proptest suites.
#![cfg(feature = "fuzzing")]

use proptest::prelude::*;
use smt::{MemoryTreeStore, Sha256Hasher, SparseMerkleTree, TreeWriter, UpdateSet};

fn tree_d8() -> SparseMerkleTree<Sha256Hasher> {
    SparseMerkleTree::new_with_depth(Sha256Hasher, 8).unwrap()
}

fn nonempty_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 1..32)
}

proptest! {
    /// P1: the empty root is always exactly Z[D], independent of what keys
    /// happen to have been hashed in other trees.
    #[test]
    fn p1_empty_tree_root_is_deterministic(_seed in any::<u8>()) {
        let _ = tracing_subscriber::fmt::try_init();
        let a = tree_d8();
        let b = tree_d8();
        prop_assert_eq!(a.empty_root(), b.empty_root());
    }

    /// P2: inserting a key and reading it back returns exactly the value
    /// that was written.
    #[test]
    fn p2_insert_then_get_round_trips(key in nonempty_bytes(), value in nonempty_bytes()) {
        let _ = tracing_subscriber::fmt::try_init();
        let tree = tree_d8();
        let store = MemoryTreeStore::new();
        let root = tree.empty_root();
        let result = tree.update(&key, value.clone(), &root, &store).unwrap();
        store.write_batch(result.nodes_to_persist.clone()).unwrap();
        prop_assert_eq!(tree.get(&key, &result.new_root, &store).unwrap(), Some(value));
    }

    /// P3: deleting an already-absent key is a no-op on the root.
    #[test]
    fn p3_delete_is_idempotent(key in nonempty_bytes(), value in nonempty_bytes()) {
        let _ = tracing_subscriber::fmt::try_init();
        let tree = tree_d8();
        let store = MemoryTreeStore::new();
        let root = tree.empty_root();
        let inserted = tree.update(&key, value, &root, &store).unwrap();
        store.write_batch(inserted.nodes_to_persist.clone()).unwrap();

        let once = tree.delete(&key, &inserted.new_root, &store).unwrap();
        store.write_batch(once.nodes_to_persist.clone()).unwrap();
        let twice = tree.delete(&key, &once.new_root, &store).unwrap();
        store.write_batch(twice.nodes_to_persist.clone()).unwrap();

        prop_assert_eq!(once.new_root, twice.new_root);
    }

    /// P4: insert-then-delete returns exactly to the starting root.
    #[test]
    fn p4_insert_then_delete_is_identity(key in nonempty_bytes(), value in nonempty_bytes()) {
        let _ = tracing_subscriber::fmt::try_init();
        let tree = tree_d8();
        let store = MemoryTreeStore::new();
        let root = tree.empty_root();

        let inserted = tree.update(&key, value, &root, &store).unwrap();
        store.write_batch(inserted.nodes_to_persist.clone()).unwrap();
        let deleted = tree.delete(&key, &inserted.new_root, &store).unwrap();

        prop_assert_eq!(deleted.new_root, root);
    }

    /// P5: batch order does not affect the resulting root for disjoint keys.
    #[test]
    fn p5_batch_order_independence(
        mut pairs in proptest::collection::vec((nonempty_bytes(), nonempty_bytes()), 1..8)
    ) {
        let _ = tracing_subscriber::fmt::try_init();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup_by(|a, b| a.0 == b.0);

        let tree = tree_d8();
        let root = tree.empty_root();

        let store_forward = MemoryTreeStore::new();
        let mut forward = UpdateSet::new();
        for (k, v) in &pairs {
            forward.put(k.clone(), v.clone());
        }
        let result_forward = tree.batch_update(forward, &root, &store_forward).unwrap();

        let store_reverse = MemoryTreeStore::new();
        let mut reverse = UpdateSet::new();
        for (k, v) in pairs.iter().rev() {
            reverse.put(k.clone(), v.clone());
        }
        let result_reverse = tree.batch_update(reverse, &root, &store_reverse).unwrap();

        prop_assert_eq!(result_forward.new_root, result_reverse.new_root);
    }

    /// P7: a freshly generated inclusion proof for an inserted key verifies.
    #[test]
    fn p7_inclusion_proof_verifies(key in nonempty_bytes(), value in nonempty_bytes()) {
        let _ = tracing_subscriber::fmt::try_init();
        let tree = tree_d8();
        let store = MemoryTreeStore::new();
        let root = tree.empty_root();
        let result = tree.update(&key, value, &root, &store).unwrap();
        store.write_batch(result.nodes_to_persist.clone()).unwrap();

        let proof = tree.inclusion_proof(&key, &result.new_root, &store, false).unwrap().unwrap();
        prop_assert!(tree.verify_inclusion(&result.new_root, &proof));
    }

    /// P8: a non-inclusion proof for a key that was never inserted verifies.
    #[test]
    fn p8_non_inclusion_proof_verifies_for_absent_key(
        present in nonempty_bytes(), value in nonempty_bytes(), absent in nonempty_bytes()
    ) {
        prop_assume!(present != absent);
        let _ = tracing_subscriber::fmt::try_init();
        let tree = tree_d8();
        let store = MemoryTreeStore::new();
        let root = tree.empty_root();
        let result = tree.update(&present, value, &root, &store).unwrap();
        store.write_batch(result.nodes_to_persist.clone()).unwrap();

        let proof = tree.non_inclusion_proof(&absent, &result.new_root, &store, false).unwrap().unwrap();
        prop_assert!(tree.verify_non_inclusion(&result.new_root, &proof));
    }

    /// P10: compressing and decompressing a proof never changes what it
    /// verifies against.
    #[test]
    fn p10_compression_preserves_verification(key in nonempty_bytes(), value in nonempty_bytes()) {
        let _ = tracing_subscriber::fmt::try_init();
        let tree = tree_d8();
        let store = MemoryTreeStore::new();
        let root = tree.empty_root();
        let result = tree.update(&key, value, &root, &store).unwrap();
        store.write_batch(result.nodes_to_persist.clone()).unwrap();

        let plain = tree.inclusion_proof(&key, &result.new_root, &store, false).unwrap().unwrap();
        let compressed = tree.inclusion_proof(&key, &result.new_root, &store, true).unwrap().unwrap();
        prop_assert!(compressed.compressed);
        prop_assert!(tree.verify_inclusion(&result.new_root, &plain));
        prop_assert!(tree.verify_inclusion(&result.new_root, &compressed));
    }

    /// P11: an update against a root never mutates reads against that root.
    #[test]
    fn p11_copy_on_write_persistence(
        key_a in nonempty_bytes(), value_a in nonempty_bytes(),
        key_b in nonempty_bytes(), value_b in nonempty_bytes(),
    ) {
        prop_assume!(key_a != key_b);
        let _ = tracing_subscriber::fmt::try_init();
        let tree = tree_d8();
        let store = MemoryTreeStore::new();
        let root = tree.empty_root();

        let after_a = tree.update(&key_a, value_a.clone(), &root, &store).unwrap();
        store.write_batch(after_a.nodes_to_persist.clone()).unwrap();

        let after_b = tree.update(&key_b, value_b, &after_a.new_root, &store).unwrap();
        store.write_batch(after_b.nodes_to_persist.clone()).unwrap();

        prop_assert_eq!(tree.get(&key_a, &after_a.new_root, &store).unwrap(), Some(value_a.clone()));
        prop_assert_eq!(tree.get(&key_b, &after_a.new_root, &store).unwrap(), None);
        prop_assert_eq!(tree.get(&key_a, &after_b.new_root, &store).unwrap(), Some(value_a));
    }
}
