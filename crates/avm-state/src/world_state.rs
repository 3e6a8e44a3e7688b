//! In-memory world state

use avm_merkle::{
    Fr, IndexedLeaf, IndexedMemoryTree, Keccak256Hasher, LeafIndex, LowLeafResponse,
    MemoryMerkleTree, NullifierLeafValue, PublicDataLeafValue, SequentialInsertionResult,
    SiblingPath, TreeHasher, short_hex,
};

use crate::{
    AppendLeafResult, CheckpointStack, MerkleBackend, MerkleTreeId, StateError, TreeHeights,
    TreeSnapshots,
};

/// The four world state trees.
#[derive(Clone, Debug)]
struct Trees<H> {
    nullifier: IndexedMemoryTree<NullifierLeafValue, H>,
    public_data: IndexedMemoryTree<PublicDataLeafValue, H>,
    note_hash: MemoryMerkleTree<H>,
    l1_to_l2_message: MemoryMerkleTree<H>,
}

/// Live tree store for one simulation.
///
/// Each checkpoint saves a copy of the trees; a revert swaps the copy back in.
#[derive(Clone, Debug)]
pub struct InMemoryWorldState<H = Keccak256Hasher> {
    trees: CheckpointStack<Trees<H>>,
}

impl<H: TreeHasher> InMemoryWorldState<H> {
    /// Create empty trees of the given heights.
    pub fn new(heights: &TreeHeights) -> Result<Self, StateError> {
        let trees = Trees {
            nullifier: IndexedMemoryTree::new(heights.nullifier)?,
            public_data: IndexedMemoryTree::new(heights.public_data)?,
            note_hash: MemoryMerkleTree::new(heights.note_hash)?,
            l1_to_l2_message: MemoryMerkleTree::new(heights.l1_to_l2_message)?,
        };
        Ok(Self { trees: CheckpointStack::new(trees) })
    }

    /// Number of open checkpoints above the base.
    pub const fn checkpoint_depth(&self) -> usize {
        self.trees.depth()
    }

    const fn current(&self) -> &Trees<H> {
        self.trees.current()
    }

    const fn current_mut(&mut self) -> &mut Trees<H> {
        self.trees.current_mut()
    }

    fn append_only_tree_mut(
        &mut self,
        tree_id: MerkleTreeId,
        operation: &'static str,
    ) -> Result<&mut MemoryMerkleTree<H>, StateError> {
        match tree_id {
            MerkleTreeId::NoteHashTree => Ok(&mut self.current_mut().note_hash),
            MerkleTreeId::L1ToL2MessageTree => Ok(&mut self.current_mut().l1_to_l2_message),
            _ => Err(StateError::UnsupportedTree { operation, tree: tree_id }),
        }
    }
}

impl<H: TreeHasher> MerkleBackend for InMemoryWorldState<H> {
    fn get_tree_roots(&self) -> TreeSnapshots {
        let trees = self.current();
        TreeSnapshots {
            l1_to_l2_message_tree: trees.l1_to_l2_message.snapshot(),
            note_hash_tree: trees.note_hash.snapshot(),
            nullifier_tree: trees.nullifier.snapshot(),
            public_data_tree: trees.public_data.snapshot(),
        }
    }

    fn get_sibling_path(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<SiblingPath, StateError> {
        let trees = self.current();
        let path = match tree_id {
            MerkleTreeId::NullifierTree => trees.nullifier.sibling_path(index),
            MerkleTreeId::PublicDataTree => trees.public_data.sibling_path(index),
            MerkleTreeId::NoteHashTree => trees.note_hash.sibling_path(index),
            MerkleTreeId::L1ToL2MessageTree => trees.l1_to_l2_message.sibling_path(index),
            MerkleTreeId::Archive => {
                return Err(StateError::UnsupportedTree {
                    operation: "get_sibling_path",
                    tree: tree_id,
                });
            }
        };
        Ok(path?)
    }

    fn get_low_indexed_leaf(
        &mut self,
        tree_id: MerkleTreeId,
        key: Fr,
    ) -> Result<LowLeafResponse, StateError> {
        match tree_id {
            MerkleTreeId::NullifierTree => Ok(self.current().nullifier.low_leaf(key)),
            MerkleTreeId::PublicDataTree => Ok(self.current().public_data.low_leaf(key)),
            _ => Err(StateError::UnsupportedTree { operation: "get_low_indexed_leaf", tree: tree_id }),
        }
    }

    fn get_leaf_value(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<Fr, StateError> {
        let trees = self.current();
        let value = match tree_id {
            MerkleTreeId::NullifierTree => trees.nullifier.leaf_hash(index),
            MerkleTreeId::PublicDataTree => trees.public_data.leaf_hash(index),
            MerkleTreeId::NoteHashTree => trees.note_hash.leaf(index),
            MerkleTreeId::L1ToL2MessageTree => trees.l1_to_l2_message.leaf(index),
            MerkleTreeId::Archive => {
                return Err(StateError::UnsupportedTree { operation: "get_leaf_value", tree: tree_id });
            }
        };
        Ok(value?)
    }

    fn get_leaf_preimage_public_data_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<PublicDataLeafValue>, StateError> {
        Ok(self.current().public_data.preimage(index)?.clone())
    }

    fn get_leaf_preimage_nullifier_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<NullifierLeafValue>, StateError> {
        Ok(self.current().nullifier.preimage(index)?.clone())
    }

    fn insert_indexed_leaf_public_data_tree(
        &mut self,
        leaf: PublicDataLeafValue,
    ) -> Result<SequentialInsertionResult<PublicDataLeafValue>, StateError> {
        let result = self.current_mut().public_data.insert(leaf)?;
        tracing::debug!(
            target: "avm_state::merkle",
            tree = %MerkleTreeId::PublicDataTree,
            slot = %short_hex(&leaf.slot),
            index = result.insertion_witness.index,
            update = result.is_already_present,
            "Inserted public data leaf"
        );
        Ok(result)
    }

    fn insert_indexed_leaf_nullifier_tree(
        &mut self,
        leaf: NullifierLeafValue,
    ) -> Result<SequentialInsertionResult<NullifierLeafValue>, StateError> {
        let result = self.current_mut().nullifier.insert(leaf)?;
        tracing::debug!(
            target: "avm_state::merkle",
            tree = %MerkleTreeId::NullifierTree,
            nullifier = %short_hex(&leaf.nullifier),
            index = result.insertion_witness.index,
            "Inserted nullifier leaf"
        );
        Ok(result)
    }

    fn append_leaves(
        &mut self,
        tree_id: MerkleTreeId,
        leaves: &[Fr],
    ) -> Result<Vec<AppendLeafResult>, StateError> {
        let tree = self.append_only_tree_mut(tree_id, "append_leaves")?;
        tree.ensure_capacity(leaves.len() as u64)?;

        let mut results = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let index = tree.append(*leaf)?;
            results.push(AppendLeafResult { root: tree.root(), path: tree.sibling_path(index)? });
        }

        tracing::debug!(
            target: "avm_state::merkle",
            tree = %tree_id,
            count = leaves.len(),
            size = tree.size(),
            "Appended leaves"
        );
        Ok(results)
    }

    fn pad_tree(&mut self, tree_id: MerkleTreeId, count: u64) -> Result<(), StateError> {
        let trees = self.current_mut();
        match tree_id {
            MerkleTreeId::NullifierTree => trees.nullifier.pad(count)?,
            MerkleTreeId::NoteHashTree => trees.note_hash.pad(count)?,
            _ => return Err(StateError::UnsupportedTree { operation: "pad_tree", tree: tree_id }),
        }
        tracing::debug!(target: "avm_state::merkle", tree = %tree_id, count, "Padded tree");
        Ok(())
    }

    fn create_checkpoint(&mut self) -> Result<(), StateError> {
        self.trees.create();
        Ok(())
    }

    fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        self.trees.commit().map(|_| ())
    }

    fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        self.trees.revert().map(|_| ())
    }

    fn get_checkpoint_id(&self) -> u32 {
        self.trees.checkpoint_id()
    }
}
