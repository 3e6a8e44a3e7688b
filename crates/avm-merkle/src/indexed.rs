//! Indexed Merkle tree with sequential insertion
//!
//! Leaves form a linked list sorted by key on top of an append-only tree.
//! Index 0 holds a zero-key sentinel that heads the list. Inserting a key
//! touches exactly two leaves: the low leaf is re-pointed at the new key, then
//! the new leaf is appended carrying the low leaf's old pointers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    AppendOnlyTreeSnapshot, Fr, IndexedLeaf, Keccak256Hasher, LeafIndex, LeafValue,
    MemoryMerkleTree, SiblingPath, TreeError, TreeHasher,
};

/// Result of a low-leaf search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowLeafResponse {
    /// The searched key is stored at `index`.
    pub is_already_present: bool,
    /// Index of the key itself or of its low leaf.
    pub index: LeafIndex,
}

/// A leaf preimage with its position and sibling path at the time of capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafUpdateWitness<V> {
    /// Leaf preimage.
    pub leaf: IndexedLeaf<V>,
    /// Leaf index.
    pub index: LeafIndex,
    /// Sibling path of `index`.
    pub path: SiblingPath,
}

/// Witnesses produced by one sequential insertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequentialInsertionResult<V> {
    /// Low leaf before the update, with its path.
    ///
    /// The path is the same before and after the update, since a leaf is not
    /// part of its own sibling path.
    pub low_leaf_witness: LeafUpdateWitness<V>,
    /// Low leaf after the update.
    pub updated_low_leaf: IndexedLeaf<V>,
    /// New leaf, with its path taken after the low leaf update and before the
    /// append. When the key was already present nothing is appended and this
    /// holds the empty leaf at the next free index.
    pub insertion_witness: LeafUpdateWitness<V>,
    /// The key was already in the tree.
    pub is_already_present: bool,
}

/// In-memory indexed tree.
#[derive(Clone, Debug)]
pub struct IndexedMemoryTree<V, H = Keccak256Hasher> {
    tree: MemoryMerkleTree<H>,
    /// Preimages by index, padding included.
    leaves: Vec<IndexedLeaf<V>>,
    /// Key -> index for every linked leaf, sentinel included.
    keys: BTreeMap<Fr, LeafIndex>,
}

impl<V: LeafValue, H: TreeHasher> IndexedMemoryTree<V, H> {
    /// Create a tree holding only the sentinel leaf.
    pub fn new(depth: usize) -> Result<Self, TreeError> {
        let mut tree = MemoryMerkleTree::new(depth)?;
        let sentinel = IndexedLeaf::<V>::empty();
        tree.append(sentinel.hash::<H>())?;

        let mut keys = BTreeMap::new();
        keys.insert(Fr::ZERO, 0);

        Ok(Self { tree, leaves: vec![sentinel], keys })
    }

    /// Current root.
    pub fn root(&self) -> Fr {
        self.tree.root()
    }

    /// Next available leaf index.
    pub const fn size(&self) -> LeafIndex {
        self.tree.size()
    }

    /// Tree depth.
    pub const fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// Current root and size.
    pub fn snapshot(&self) -> AppendOnlyTreeSnapshot {
        self.tree.snapshot()
    }

    /// Sibling path of any index within capacity.
    pub fn sibling_path(&self, index: LeafIndex) -> Result<SiblingPath, TreeError> {
        self.tree.sibling_path(index)
    }

    /// Leaf preimage at `index`.
    pub fn preimage(&self, index: LeafIndex) -> Result<&IndexedLeaf<V>, TreeError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.leaves.get(i))
            .ok_or(TreeError::LeafNotFound { index, size: self.size() })
    }

    /// Leaf hash at `index`.
    pub fn leaf_hash(&self, index: LeafIndex) -> Result<Fr, TreeError> {
        self.tree.leaf(index)
    }

    /// Find `key` or, when absent, its low leaf.
    ///
    /// The low leaf is the one with the largest key not above `key`. When
    /// `key` is beyond every stored key this is the list tail, whose
    /// `next_key` of zero makes it a valid low leaf.
    pub fn low_leaf(&self, key: Fr) -> LowLeafResponse {
        let (&low_key, &index) = self.keys.range(..=key).next_back().unwrap_or((&Fr::ZERO, &0));
        debug_assert!(self.leaves[index as usize].is_low_leaf_for(key));
        LowLeafResponse { is_already_present: low_key == key, index }
    }

    /// Insert `value`, returning the low leaf and new leaf witnesses.
    ///
    /// If the key is already present the list is left as is. The stored
    /// payload is replaced when it differs, which is how a public data
    /// write overwrites an existing slot.
    pub fn insert(&mut self, value: V) -> Result<SequentialInsertionResult<V>, TreeError> {
        let key = value.key();
        let LowLeafResponse { is_already_present, index: low_index } = self.low_leaf(key);

        let low_leaf = self.preimage(low_index)?.clone();
        let low_leaf_witness = LeafUpdateWitness {
            leaf: low_leaf.clone(),
            index: low_index,
            path: self.tree.sibling_path(low_index)?,
        };

        if is_already_present {
            let updated_low_leaf = IndexedLeaf { leaf: value, ..low_leaf.clone() };
            if updated_low_leaf != low_leaf {
                self.write(low_index, updated_low_leaf.clone())?;
            }
            let next_index = self.size();
            let insertion_witness = LeafUpdateWitness {
                leaf: IndexedLeaf::empty(),
                index: next_index,
                path: self.tree.sibling_path(next_index)?,
            };
            return Ok(SequentialInsertionResult {
                low_leaf_witness,
                updated_low_leaf,
                insertion_witness,
                is_already_present,
            });
        }

        self.tree.ensure_capacity(1)?;
        let new_index = self.size();

        let updated_low_leaf = IndexedLeaf::new(low_leaf.leaf.clone(), new_index, key);
        self.write(low_index, updated_low_leaf.clone())?;

        let new_leaf = IndexedLeaf::new(value, low_leaf.next_index, low_leaf.next_key);
        let new_path = self.tree.sibling_path(new_index)?;
        self.tree.append(new_leaf.hash::<H>())?;
        self.leaves.push(new_leaf.clone());
        self.keys.insert(key, new_index);

        Ok(SequentialInsertionResult {
            low_leaf_witness,
            updated_low_leaf,
            insertion_witness: LeafUpdateWitness { leaf: new_leaf, index: new_index, path: new_path },
            is_already_present,
        })
    }

    /// Append `count` empty leaves outside the linked list.
    pub fn pad(&mut self, count: u64) -> Result<(), TreeError> {
        let padding = usize::try_from(count).map_err(|_| TreeError::TreeFull {
            depth: self.depth(),
            size: self.size(),
            requested: count,
        })?;
        self.tree.pad(count)?;
        self.leaves.resize(self.leaves.len() + padding, IndexedLeaf::empty());
        Ok(())
    }

    /// Walk the linked list from the sentinel, yielding `(index, leaf)` in key order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (LeafIndex, &IndexedLeaf<V>)> + '_ {
        let mut next = Some(0);
        std::iter::from_fn(move || {
            let index = next?;
            let leaf = self.leaves.get(index as usize)?;
            next = (!leaf.next_key.is_zero()).then_some(leaf.next_index);
            Some((index, leaf))
        })
    }

    fn write(&mut self, index: LeafIndex, leaf: IndexedLeaf<V>) -> Result<(), TreeError> {
        self.tree.update(index, leaf.hash::<H>())?;
        self.leaves[index as usize] = leaf;
        Ok(())
    }
}
