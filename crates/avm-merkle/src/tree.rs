//! Fixed-depth append-only Merkle tree

use std::marker::PhantomData;

use alloy_primitives::map::HashMap;
use serde::{Deserialize, Serialize};

use crate::{Fr, Keccak256Hasher, LeafIndex, SiblingPath, TreeError, TreeHasher};

/// Root and size of a tree at one point in time.
///
/// Snapshots are plain values and are used as lookup keys for recorded hints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOnlyTreeSnapshot {
    /// Tree root.
    pub root: Fr,
    /// Index the next appended leaf will take.
    pub next_available_leaf_index: LeafIndex,
}

/// Dense, fixed-depth binary Merkle tree with leaves appended left to right.
///
/// Only non-default nodes are stored. Unwritten subtrees resolve to the
/// precomputed zero hash of their level.
#[derive(Clone, Debug)]
pub struct MemoryMerkleTree<H = Keccak256Hasher> {
    depth: usize,
    size: LeafIndex,
    /// Written nodes: (level, index) -> hash. Level 0 holds the leaves.
    nodes: HashMap<(usize, LeafIndex), Fr>,
    /// Hash of an empty subtree per level, `zero_hashes[depth]` is the empty root.
    zero_hashes: Vec<Fr>,
    _hasher: PhantomData<H>,
}

/// Deepest supported tree. Capacity must fit a `u64` leaf index.
pub const MAX_TREE_DEPTH: usize = 63;

impl<H: TreeHasher> MemoryMerkleTree<H> {
    /// Create an empty tree of the given depth.
    pub fn new(depth: usize) -> Result<Self, TreeError> {
        if !(1..=MAX_TREE_DEPTH).contains(&depth) {
            return Err(TreeError::UnsupportedDepth { depth });
        }
        let mut zero_hashes = Vec::with_capacity(depth + 1);
        let mut current = Fr::ZERO;
        zero_hashes.push(current);
        for _ in 0..depth {
            current = H::hash_pair(current, current);
            zero_hashes.push(current);
        }

        Ok(Self { depth, size: 0, nodes: HashMap::default(), zero_hashes, _hasher: PhantomData })
    }

    /// Tree depth.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Maximum number of leaves.
    pub const fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Next available leaf index.
    pub const fn size(&self) -> LeafIndex {
        self.size
    }

    /// Current root hash.
    pub fn root(&self) -> Fr {
        self.node(self.depth, 0)
    }

    /// Current root and size.
    pub fn snapshot(&self) -> AppendOnlyTreeSnapshot {
        AppendOnlyTreeSnapshot { root: self.root(), next_available_leaf_index: self.size }
    }

    /// Leaf hash at `index`, which must be below the tree size.
    pub fn leaf(&self, index: LeafIndex) -> Result<Fr, TreeError> {
        if index >= self.size {
            return Err(TreeError::LeafNotFound { index, size: self.size });
        }
        Ok(self.node(0, index))
    }

    /// Append one leaf hash, returning its index.
    pub fn append(&mut self, leaf_hash: Fr) -> Result<LeafIndex, TreeError> {
        self.ensure_capacity(1)?;
        let index = self.size;
        self.size += 1;
        self.write_leaf(index, leaf_hash);
        Ok(index)
    }

    /// Overwrite an already appended leaf.
    pub fn update(&mut self, index: LeafIndex, leaf_hash: Fr) -> Result<(), TreeError> {
        if index >= self.size {
            return Err(TreeError::LeafNotFound { index, size: self.size });
        }
        self.write_leaf(index, leaf_hash);
        Ok(())
    }

    /// Advance the size by `count` zero leaves. The root is unchanged.
    pub fn pad(&mut self, count: u64) -> Result<(), TreeError> {
        self.ensure_capacity(count)?;
        self.size += count;
        Ok(())
    }

    /// Sibling path of `index`, leaf level first.
    ///
    /// Any index within capacity is accepted, including ones not appended yet.
    pub fn sibling_path(&self, index: LeafIndex) -> Result<SiblingPath, TreeError> {
        if index >= self.capacity() {
            return Err(TreeError::IndexOutOfRange { index, depth: self.depth });
        }
        let mut path = Vec::with_capacity(self.depth);
        let mut current = index;
        for level in 0..self.depth {
            path.push(self.node(level, current ^ 1));
            current >>= 1;
        }
        Ok(path)
    }

    /// Fail unless `count` more leaves fit.
    pub fn ensure_capacity(&self, count: u64) -> Result<(), TreeError> {
        match self.size.checked_add(count) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(TreeError::TreeFull { depth: self.depth, size: self.size, requested: count }),
        }
    }

    /// Write a leaf and rehash its path up to the root.
    fn write_leaf(&mut self, index: LeafIndex, leaf_hash: Fr) {
        let mut current_hash = leaf_hash;
        let mut current = index;
        self.nodes.insert((0, current), current_hash);

        for level in 0..self.depth {
            let sibling = self.node(level, current ^ 1);
            current_hash = if current & 1 == 0 {
                H::hash_pair(current_hash, sibling)
            } else {
                H::hash_pair(sibling, current_hash)
            };
            current >>= 1;
            self.nodes.insert((level + 1, current), current_hash);
        }
    }

    fn node(&self, level: usize, index: LeafIndex) -> Fr {
        self.nodes.get(&(level, index)).copied().unwrap_or(self.zero_hashes[level])
    }
}
