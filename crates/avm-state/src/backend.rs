//! Raw tree backend interface
//!
//! Everything above the trees talks to them through [`MerkleBackend`]: the
//! in-memory live store, the hint recorder wrapping it and the hint replayer
//! all implement it, so they compose by wrapping.

use avm_merkle::{
    Fr, IndexedLeaf, LeafIndex, LowLeafResponse, NullifierLeafValue, PublicDataLeafValue,
    SequentialInsertionResult, SiblingPath,
};

use crate::{AppendLeafResult, MerkleTreeId, StateError, TreeSnapshots};

/// Low-level access to the world state trees.
///
/// Queries take `&mut self` because wrappers record them. Implementations
/// must leave their state untouched when returning an error.
pub trait MerkleBackend {
    /// Snapshots of every tree.
    fn get_tree_roots(&self) -> TreeSnapshots;

    /// Sibling path of `index`.
    fn get_sibling_path(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<SiblingPath, StateError>;

    /// Position of `key` or of its low leaf in an indexed tree.
    fn get_low_indexed_leaf(
        &mut self,
        tree_id: MerkleTreeId,
        key: Fr,
    ) -> Result<LowLeafResponse, StateError>;

    /// Leaf at `index`. For indexed trees this is the leaf hash.
    fn get_leaf_value(&mut self, tree_id: MerkleTreeId, index: LeafIndex)
    -> Result<Fr, StateError>;

    /// Public data leaf preimage at `index`.
    fn get_leaf_preimage_public_data_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<PublicDataLeafValue>, StateError>;

    /// Nullifier leaf preimage at `index`.
    fn get_leaf_preimage_nullifier_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<NullifierLeafValue>, StateError>;

    /// Sequentially insert (or overwrite) a public data leaf.
    fn insert_indexed_leaf_public_data_tree(
        &mut self,
        leaf: PublicDataLeafValue,
    ) -> Result<SequentialInsertionResult<PublicDataLeafValue>, StateError>;

    /// Sequentially insert a nullifier leaf.
    fn insert_indexed_leaf_nullifier_tree(
        &mut self,
        leaf: NullifierLeafValue,
    ) -> Result<SequentialInsertionResult<NullifierLeafValue>, StateError>;

    /// Append leaves to an append-only tree, one result per leaf.
    fn append_leaves(
        &mut self,
        tree_id: MerkleTreeId,
        leaves: &[Fr],
    ) -> Result<Vec<AppendLeafResult>, StateError>;

    /// Append `count` empty leaves.
    fn pad_tree(&mut self, tree_id: MerkleTreeId, count: u64) -> Result<(), StateError>;

    /// Open a checkpoint.
    fn create_checkpoint(&mut self) -> Result<(), StateError>;

    /// Close the innermost checkpoint keeping its changes.
    fn commit_checkpoint(&mut self) -> Result<(), StateError>;

    /// Close the innermost checkpoint discarding its changes.
    fn revert_checkpoint(&mut self) -> Result<(), StateError>;

    /// Id of the innermost open checkpoint, 0 at the base.
    fn get_checkpoint_id(&self) -> u32;
}
