//! Merkle trees backing the AVM world state.
//!
//! This crate provides the tree primitives the simulator state is built on:
//! - Fixed-depth append-only trees with sibling paths for any index
//! - Indexed (linked-list ordered) trees with sequential insertion witnesses
//! - A pluggable hasher, Keccak-256 by default
//!
//! Leaves are addressed by index, the next free index is tracked per tree and
//! an empty leaf always hashes to zero, so padding a tree never moves its root.

mod error;
mod hasher;
mod indexed;
mod leaf;
mod proof;
mod tree;

pub use error::TreeError;
pub use hasher::{Keccak256Hasher, TreeHasher};
pub use indexed::{
    IndexedMemoryTree, LeafUpdateWitness, LowLeafResponse, SequentialInsertionResult,
};
pub use leaf::{IndexedLeaf, LeafValue, NullifierLeafValue, PublicDataLeafValue};
pub use proof::{SiblingPath, compute_root_from_path, verify_membership};
pub use tree::{AppendOnlyTreeSnapshot, MAX_TREE_DEPTH, MemoryMerkleTree};

/// Field element used for keys, leaf values, hashes and roots.
pub type Fr = alloy_primitives::U256;

/// Leaf index within a tree.
pub type LeafIndex = u64;

/// Short hex rendering of a field element for log lines.
pub fn short_hex(value: &Fr) -> String {
    let bytes = value.to_be_bytes::<32>();
    format!("0x{}..", hex::encode(&bytes[..6]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree_root_matches_zero_subtree() {
        let tree = MemoryMerkleTree::<Keccak256Hasher>::new(4).unwrap();
        let mut expected = Fr::ZERO;
        for _ in 0..4 {
            expected = Keccak256Hasher::hash_pair(expected, expected);
        }
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_insert_and_prove() {
        let mut tree = IndexedMemoryTree::<NullifierLeafValue>::new(8).unwrap();
        let result = tree.insert(NullifierLeafValue::new(Fr::from(42u64))).unwrap();

        let witness = &result.insertion_witness;
        assert!(verify_membership::<Keccak256Hasher>(
            tree.root(),
            witness.leaf.hash::<Keccak256Hasher>(),
            witness.index,
            &witness.path,
        ));
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(short_hex(&Fr::from(0xabu64)), "0x000000000000..");
        assert_eq!(short_hex(&(Fr::from(0xabcdu64) << 240usize)), "0xabcd00000000..");
    }
}
