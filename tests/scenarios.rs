// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenario tests run against the in-memory storage adapter.

use smt::{MemoryTreeStore, Sha256Hasher, SparseMerkleTree, TreeWriter, UpdateSet};

fn tree_d8() -> SparseMerkleTree<Sha256Hasher> {
    SparseMerkleTree::new_with_depth(Sha256Hasher, 8).unwrap()
}

/// S1: the zero-hash table's bytes are an exact SHA-256 test vector, not an
/// implementation-defined placeholder.
#[test]
fn s1_empty_tree_root_bytes() {
    let _ = tracing_subscriber::fmt::try_init();
    let tree = tree_d8();
    assert_eq!(
        hex::encode(tree.empty_root().as_bytes()),
        "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
    );
    assert_eq!(
        hex::encode(tree.metadata().zero_hashes.get(0).as_bytes()),
        "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
    );
}

#[test]
fn s2_single_insert_then_get() {
    let _ = tracing_subscriber::fmt::try_init();
    let tree = tree_d8();
    let store = MemoryTreeStore::new();
    let root = tree.empty_root();

    let result = tree.update(b"test", b"value".to_vec(), &root, &store).unwrap();
    store.write_batch(result.nodes_to_persist.clone()).unwrap();

    assert_eq!(
        tree.get(b"test", &result.new_root, &store).unwrap(),
        Some(b"value".to_vec())
    );
    assert_eq!(tree.get(b"other", &result.new_root, &store).unwrap(), None);
}

#[test]
fn s3_insert_then_delete_returns_to_empty() {
    let _ = tracing_subscriber::fmt::try_init();
    let tree = tree_d8();
    let store = MemoryTreeStore::new();
    let root = tree.empty_root();

    let inserted = tree
        .update(b"temporary", b"will_be_deleted".to_vec(), &root, &store)
        .unwrap();
    store.write_batch(inserted.nodes_to_persist.clone()).unwrap();

    let deleted = tree.delete(b"temporary", &inserted.new_root, &store).unwrap();
    store.write_batch(deleted.nodes_to_persist.clone()).unwrap();

    assert_eq!(deleted.new_root, root);
}

#[test]
fn s4_batch_order_independence() {
    let _ = tracing_subscriber::fmt::try_init();
    let tree = tree_d8();
    let root = tree.empty_root();

    let pairs: Vec<(&[u8], &[u8])> = vec![(b"alice", b"100"), (b"bob", b"200"), (b"charlie", b"300")];

    let store_a = MemoryTreeStore::new();
    let mut forward = UpdateSet::new();
    for (k, v) in &pairs {
        forward.put(k.to_vec(), v.to_vec());
    }
    let result_a = tree.batch_update(forward, &root, &store_a).unwrap();

    let store_b = MemoryTreeStore::new();
    let mut reversed = UpdateSet::new();
    for (k, v) in pairs.iter().rev() {
        reversed.put(k.to_vec(), v.to_vec());
    }
    let result_b = tree.batch_update(reversed, &root, &store_b).unwrap();

    assert_eq!(result_a.new_root, result_b.new_root);
}

/// S5: two keys whose SHA-256 hashes agree on the first 8 bits (both begin
/// with byte `0xa1`) and first diverge at bit 8, ground-truthed offline —
/// see DESIGN.md for how these were found.
#[test]
fn s5_d_bit_prefix_collision_extension_chain() {
    let _ = tracing_subscriber::fmt::try_init();
    let tree = tree_d8();
    let store = MemoryTreeStore::new();
    let root = tree.empty_root();

    let key_a: &[u8] = b"key-61";
    let key_b: &[u8] = b"key-696";
    assert_eq!(&hex::encode(tree.hash_key(key_a).as_bytes())[..2], "a1");
    assert_eq!(&hex::encode(tree.hash_key(key_b).as_bytes())[..2], "a1");

    let after_a = tree.update(key_a, b"value-a".to_vec(), &root, &store).unwrap();
    store.write_batch(after_a.nodes_to_persist.clone()).unwrap();
    let after_b = tree
        .update(key_b, b"value-b".to_vec(), &after_a.new_root, &store)
        .unwrap();
    store.write_batch(after_b.nodes_to_persist.clone()).unwrap();

    let common_root = after_b.new_root;
    assert_eq!(
        tree.get(key_a, &common_root, &store).unwrap(),
        Some(b"value-a".to_vec())
    );
    assert_eq!(
        tree.get(key_b, &common_root, &store).unwrap(),
        Some(b"value-b".to_vec())
    );

    let proof_a = tree.inclusion_proof(key_a, &common_root, &store, false).unwrap().unwrap();
    let proof_b = tree.inclusion_proof(key_b, &common_root, &store, false).unwrap().unwrap();
    assert!(tree.verify_inclusion(&common_root, &proof_a));
    assert!(tree.verify_inclusion(&common_root, &proof_b));
}

#[test]
fn s6_proof_tamper_rejection() {
    let _ = tracing_subscriber::fmt::try_init();
    let tree = tree_d8();
    let store = MemoryTreeStore::new();
    let root = tree.empty_root();

    let first = tree.update(b"test", b"value".to_vec(), &root, &store).unwrap();
    store.write_batch(first.nodes_to_persist.clone()).unwrap();

    let mut proof = tree
        .inclusion_proof(b"test", &first.new_root, &store, false)
        .unwrap()
        .unwrap();
    assert_eq!(proof.siblings.len(), 8);
    assert!(tree.verify_inclusion(&first.new_root, &proof));

    let first_sibling = proof.siblings[0].as_bytes().to_vec();
    let mut tampered = first_sibling.clone();
    tampered[0] ^= 0x01;
    proof.siblings[0] = smt::Digest::from_bytes(tampered);

    assert!(!tree.verify_inclusion(&first.new_root, &proof));
}
