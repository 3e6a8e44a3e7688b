//! Sibling path verification

use crate::{Fr, LeafIndex, TreeHasher};

/// Sibling hashes from the leaf level up to (excluding) the root.
pub type SiblingPath = Vec<Fr>;

/// Recompute a root from a leaf hash, its index and its sibling path.
pub fn compute_root_from_path<H: TreeHasher>(leaf_hash: Fr, index: LeafIndex, path: &[Fr]) -> Fr {
    let mut current_hash = leaf_hash;
    let mut current = index;

    for sibling in path {
        current_hash = if current & 1 == 0 {
            H::hash_pair(current_hash, *sibling)
        } else {
            H::hash_pair(*sibling, current_hash)
        };
        current >>= 1;
    }

    current_hash
}

/// Check that `leaf_hash` sits at `index` under `root`.
pub fn verify_membership<H: TreeHasher>(root: Fr, leaf_hash: Fr, index: LeafIndex, path: &[Fr]) -> bool {
    compute_root_from_path::<H>(leaf_hash, index, path) == root
}
