//! Hint recording over a raw backend
//!
//! [`HintingMerkleDb`] forwards every call to the wrapped backend unchanged
//! and records what the prover will need to replay it. Hints are keyed by the
//! snapshot of the queried tree before the call, so asking the same question
//! of the same state twice yields one hint. Some queries also record
//! follow-up facts the caller did not ask for: a low-leaf lookup records the
//! low leaf's path and preimage, and every read by index records the path of
//! that index.
//!
//! Errors from the backend are passed through and leave no hint behind.

use std::collections::BTreeMap;

use avm_merkle::{
    AppendOnlyTreeSnapshot, Fr, IndexedLeaf, LeafIndex, LowLeafResponse, NullifierLeafValue,
    PublicDataLeafValue, SequentialInsertionResult, SiblingPath,
};

use crate::{
    AppendLeafResult, MerkleBackend, MerkleTreeId, StateError, TreeSnapshots,
    hints::{
        AppendLeavesHint, CheckpointActionNoStateChangeHint, ExecutionHints, GetLeafPreimageHint,
        GetLeafValueHint, GetPreviousValueIndexHint, GetSiblingPathHint, RevertCheckpointHint,
        SequentialInsertHint,
    },
};

type SnapshotKey = AppendOnlyTreeSnapshot;

/// Recorded merkle hints, one per distinct key.
#[derive(Clone, Debug, Default)]
struct MerkleHints {
    sibling_paths: BTreeMap<(SnapshotKey, MerkleTreeId, LeafIndex), GetSiblingPathHint>,
    previous_value_indices: BTreeMap<(SnapshotKey, MerkleTreeId, Fr), GetPreviousValueIndexHint>,
    public_data_preimages:
        BTreeMap<(SnapshotKey, LeafIndex), GetLeafPreimageHint<PublicDataLeafValue>>,
    nullifier_preimages: BTreeMap<(SnapshotKey, LeafIndex), GetLeafPreimageHint<NullifierLeafValue>>,
    leaf_values: BTreeMap<(SnapshotKey, MerkleTreeId, LeafIndex), GetLeafValueHint>,
    public_data_inserts: BTreeMap<
        (SnapshotKey, MerkleTreeId, PublicDataLeafValue),
        SequentialInsertHint<PublicDataLeafValue>,
    >,
    nullifier_inserts: BTreeMap<
        (SnapshotKey, MerkleTreeId, NullifierLeafValue),
        SequentialInsertHint<NullifierLeafValue>,
    >,
    appends: BTreeMap<(SnapshotKey, MerkleTreeId, Vec<Fr>), AppendLeavesHint>,
    create_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    commit_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    revert_checkpoints: BTreeMap<u32, RevertCheckpointHint>,
}

/// Backend wrapper that records execution hints.
#[derive(Debug)]
pub struct HintingMerkleDb<B> {
    backend: B,
    hints: MerkleHints,
    starting_tree_roots: TreeSnapshots,
    checkpoint_action_counter: u32,
}

impl<B: MerkleBackend> HintingMerkleDb<B> {
    /// Wrap `backend`, taking its current roots as the starting roots.
    pub fn new(backend: B) -> Self {
        let starting_tree_roots = backend.get_tree_roots();
        tracing::info!(
            target: "avm_state::hints",
            nullifier_root = %starting_tree_roots.nullifier_tree.root,
            public_data_root = %starting_tree_roots.public_data_tree.root,
            "Recording merkle hints"
        );
        Self {
            backend,
            hints: MerkleHints::default(),
            starting_tree_roots,
            checkpoint_action_counter: 0,
        }
    }

    /// Wrapped backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Unwrap, dropping the recorded hints.
    pub fn into_inner(self) -> B {
        self.backend
    }

    /// Number of checkpoint actions recorded so far.
    pub const fn checkpoint_action_counter(&self) -> u32 {
        self.checkpoint_action_counter
    }

    /// Copy every recorded hint into `hints`, in key order.
    pub fn dump_hints(&self, hints: &mut ExecutionHints) {
        let recorded = &self.hints;
        hints.starting_tree_roots = self.starting_tree_roots;
        hints.get_sibling_path_hints.extend(recorded.sibling_paths.values().cloned());
        hints
            .get_previous_value_index_hints
            .extend(recorded.previous_value_indices.values().cloned());
        hints
            .get_leaf_preimage_hints_public_data_tree
            .extend(recorded.public_data_preimages.values().cloned());
        hints
            .get_leaf_preimage_hints_nullifier_tree
            .extend(recorded.nullifier_preimages.values().cloned());
        hints.get_leaf_value_hints.extend(recorded.leaf_values.values().cloned());
        hints
            .sequential_insert_hints_public_data_tree
            .extend(recorded.public_data_inserts.values().cloned());
        hints
            .sequential_insert_hints_nullifier_tree
            .extend(recorded.nullifier_inserts.values().cloned());
        hints.append_leaves_hints.extend(recorded.appends.values().cloned());
        hints.create_checkpoint_hints.extend(recorded.create_checkpoints.values().copied());
        hints.commit_checkpoint_hints.extend(recorded.commit_checkpoints.values().copied());
        hints.revert_checkpoint_hints.extend(recorded.revert_checkpoints.values().copied());

        tracing::info!(
            target: "avm_state::hints",
            sibling_paths = recorded.sibling_paths.len(),
            low_leaves = recorded.previous_value_indices.len(),
            inserts = recorded.public_data_inserts.len() + recorded.nullifier_inserts.len(),
            appends = recorded.appends.len(),
            checkpoint_actions = self.checkpoint_action_counter,
            "Dumped merkle hints"
        );
    }

    fn snapshot(&self, tree_id: MerkleTreeId) -> Result<AppendOnlyTreeSnapshot, StateError> {
        self.backend.get_tree_roots().get(tree_id)
    }
}

impl<B: MerkleBackend> MerkleBackend for HintingMerkleDb<B> {
    fn get_tree_roots(&self) -> TreeSnapshots {
        self.backend.get_tree_roots()
    }

    fn get_sibling_path(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<SiblingPath, StateError> {
        let hint_key = self.snapshot(tree_id)?;
        let path = self.backend.get_sibling_path(tree_id, index)?;
        self.hints.sibling_paths.insert(
            (hint_key, tree_id, index),
            GetSiblingPathHint { hint_key, tree_id, index, path: path.clone() },
        );
        Ok(path)
    }

    fn get_low_indexed_leaf(
        &mut self,
        tree_id: MerkleTreeId,
        key: Fr,
    ) -> Result<LowLeafResponse, StateError> {
        let hint_key = self.snapshot(tree_id)?;
        let response = self.backend.get_low_indexed_leaf(tree_id, key)?;
        self.hints.previous_value_indices.insert(
            (hint_key, tree_id, key),
            GetPreviousValueIndexHint {
                hint_key,
                tree_id,
                value: key,
                index: response.index,
                already_present: response.is_already_present,
            },
        );

        // The circuit opens the low leaf, so its path and preimage are needed too.
        self.get_sibling_path(tree_id, response.index)?;
        match tree_id {
            MerkleTreeId::NullifierTree => {
                self.get_leaf_preimage_nullifier_tree(response.index)?;
            }
            MerkleTreeId::PublicDataTree if !response.is_already_present => {
                self.get_leaf_preimage_public_data_tree(response.index)?;
            }
            _ => {}
        }

        Ok(response)
    }

    fn get_leaf_value(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<Fr, StateError> {
        let hint_key = self.snapshot(tree_id)?;
        let value = self.backend.get_leaf_value(tree_id, index)?;
        self.hints.leaf_values.insert(
            (hint_key, tree_id, index),
            GetLeafValueHint { hint_key, tree_id, index, value },
        );
        self.get_sibling_path(tree_id, index)?;
        Ok(value)
    }

    fn get_leaf_preimage_public_data_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<PublicDataLeafValue>, StateError> {
        let tree_id = MerkleTreeId::PublicDataTree;
        let hint_key = self.snapshot(tree_id)?;
        let leaf_preimage = self.backend.get_leaf_preimage_public_data_tree(index)?;
        self.hints.public_data_preimages.insert(
            (hint_key, index),
            GetLeafPreimageHint { hint_key, index, leaf_preimage: leaf_preimage.clone() },
        );
        self.get_sibling_path(tree_id, index)?;
        Ok(leaf_preimage)
    }

    fn get_leaf_preimage_nullifier_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<NullifierLeafValue>, StateError> {
        let tree_id = MerkleTreeId::NullifierTree;
        let hint_key = self.snapshot(tree_id)?;
        let leaf_preimage = self.backend.get_leaf_preimage_nullifier_tree(index)?;
        self.hints.nullifier_preimages.insert(
            (hint_key, index),
            GetLeafPreimageHint { hint_key, index, leaf_preimage: leaf_preimage.clone() },
        );
        self.get_sibling_path(tree_id, index)?;
        Ok(leaf_preimage)
    }

    fn insert_indexed_leaf_public_data_tree(
        &mut self,
        leaf: PublicDataLeafValue,
    ) -> Result<SequentialInsertionResult<PublicDataLeafValue>, StateError> {
        let tree_id = MerkleTreeId::PublicDataTree;
        let hint_key = self.snapshot(tree_id)?;
        let result = self.backend.insert_indexed_leaf_public_data_tree(leaf)?;
        let state_after = self.snapshot(tree_id)?;
        self.hints.public_data_inserts.insert(
            (hint_key, tree_id, leaf),
            SequentialInsertHint {
                hint_key,
                tree_id,
                leaf,
                low_leaves_witness_data: result.low_leaf_witness.clone(),
                insertion_witness_data: result.insertion_witness.clone(),
                state_after,
            },
        );
        Ok(result)
    }

    fn insert_indexed_leaf_nullifier_tree(
        &mut self,
        leaf: NullifierLeafValue,
    ) -> Result<SequentialInsertionResult<NullifierLeafValue>, StateError> {
        let tree_id = MerkleTreeId::NullifierTree;
        let hint_key = self.snapshot(tree_id)?;
        let result = self.backend.insert_indexed_leaf_nullifier_tree(leaf)?;
        let state_after = self.snapshot(tree_id)?;
        self.hints.nullifier_inserts.insert(
            (hint_key, tree_id, leaf),
            SequentialInsertHint {
                hint_key,
                tree_id,
                leaf,
                low_leaves_witness_data: result.low_leaf_witness.clone(),
                insertion_witness_data: result.insertion_witness.clone(),
                state_after,
            },
        );
        Ok(result)
    }

    fn append_leaves(
        &mut self,
        tree_id: MerkleTreeId,
        leaves: &[Fr],
    ) -> Result<Vec<AppendLeafResult>, StateError> {
        let mut state_before = self.snapshot(tree_id)?;
        let results = self.backend.append_leaves(tree_id, leaves)?;

        for (leaf, result) in leaves.iter().zip(&results) {
            let index = state_before.next_available_leaf_index;
            let state_after =
                AppendOnlyTreeSnapshot { root: result.root, next_available_leaf_index: index + 1 };
            self.hints.appends.insert(
                (state_before, tree_id, vec![*leaf]),
                AppendLeavesHint { hint_key: state_before, state_after, tree_id, leaves: vec![*leaf] },
            );
            self.hints.sibling_paths.insert(
                (state_after, tree_id, index),
                GetSiblingPathHint { hint_key: state_after, tree_id, index, path: result.path.clone() },
            );
            state_before = state_after;
        }

        Ok(results)
    }

    fn pad_tree(&mut self, tree_id: MerkleTreeId, count: u64) -> Result<(), StateError> {
        self.backend.pad_tree(tree_id, count)
    }

    fn create_checkpoint(&mut self) -> Result<(), StateError> {
        let old_checkpoint_id = self.backend.get_checkpoint_id();
        self.backend.create_checkpoint()?;
        let new_checkpoint_id = self.backend.get_checkpoint_id();

        let action_counter = self.checkpoint_action_counter;
        self.hints.create_checkpoints.insert(
            action_counter,
            CheckpointActionNoStateChangeHint { action_counter, old_checkpoint_id, new_checkpoint_id },
        );
        self.checkpoint_action_counter += 1;
        Ok(())
    }

    fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        let old_checkpoint_id = self.backend.get_checkpoint_id();
        self.backend.commit_checkpoint()?;
        let new_checkpoint_id = self.backend.get_checkpoint_id();

        let action_counter = self.checkpoint_action_counter;
        self.hints.commit_checkpoints.insert(
            action_counter,
            CheckpointActionNoStateChangeHint { action_counter, old_checkpoint_id, new_checkpoint_id },
        );
        self.checkpoint_action_counter += 1;
        Ok(())
    }

    fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        let state_before = self.backend.get_tree_roots();
        let old_checkpoint_id = self.backend.get_checkpoint_id();
        self.backend.revert_checkpoint()?;
        let state_after = self.backend.get_tree_roots();
        let new_checkpoint_id = self.backend.get_checkpoint_id();

        let action_counter = self.checkpoint_action_counter;
        self.hints.revert_checkpoints.insert(
            action_counter,
            RevertCheckpointHint {
                action_counter,
                old_checkpoint_id,
                new_checkpoint_id,
                state_before,
                state_after,
            },
        );
        self.checkpoint_action_counter += 1;
        Ok(())
    }

    fn get_checkpoint_id(&self) -> u32 {
        self.backend.get_checkpoint_id()
    }
}

#[cfg(test)]
mod tests {
    use avm_merkle::{Keccak256Hasher, compute_root_from_path};

    use super::*;
    use crate::{InMemoryWorldState, TreeHeights};

    fn hinting_db() -> HintingMerkleDb<InMemoryWorldState> {
        HintingMerkleDb::new(InMemoryWorldState::new(&TreeHeights {
            nullifier: 6,
            note_hash: 6,
            public_data: 6,
            l1_to_l2_message: 6,
        })
        .unwrap())
    }

    fn dump(db: &HintingMerkleDb<InMemoryWorldState>) -> ExecutionHints {
        let mut hints = ExecutionHints::default();
        db.dump_hints(&mut hints);
        hints
    }

    #[test]
    fn test_repeated_query_records_once() {
        let mut db = hinting_db();
        let key = Fr::from(9u64);
        let first = db.get_low_indexed_leaf(MerkleTreeId::NullifierTree, key).unwrap();
        let second = db.get_low_indexed_leaf(MerkleTreeId::NullifierTree, key).unwrap();
        assert_eq!(first, second);

        let hints = dump(&db);
        assert_eq!(hints.get_previous_value_index_hints.len(), 1);
        assert_eq!(hints.get_sibling_path_hints.len(), 1);
        assert_eq!(hints.get_leaf_preimage_hints_nullifier_tree.len(), 1);
    }

    #[test]
    fn test_low_leaf_lookup_captures_secondary_hints() {
        let mut db = hinting_db();
        db.insert_indexed_leaf_public_data_tree(PublicDataLeafValue::new(
            Fr::from(4u64),
            Fr::from(40u64),
        ))
        .unwrap();

        // Absent slot: low leaf preimage is recorded.
        db.get_low_indexed_leaf(MerkleTreeId::PublicDataTree, Fr::from(5u64)).unwrap();
        // Present slot: the caller fetches the preimage itself.
        db.get_low_indexed_leaf(MerkleTreeId::PublicDataTree, Fr::from(4u64)).unwrap();

        let hints = dump(&db);
        assert_eq!(hints.get_previous_value_index_hints.len(), 2);
        assert_eq!(hints.get_leaf_preimage_hints_public_data_tree.len(), 1);
        let preimage = &hints.get_leaf_preimage_hints_public_data_tree[0];
        assert_eq!(preimage.leaf_preimage.leaf.slot, Fr::from(4u64));
    }

    #[test]
    fn test_append_hints_are_per_leaf() {
        let mut db = hinting_db();
        let before = db.get_tree_roots().note_hash_tree;
        let leaves = [Fr::from(1u64), Fr::from(2u64)];
        let results = db.append_leaves(MerkleTreeId::NoteHashTree, &leaves).unwrap();

        let hints = dump(&db);
        assert_eq!(hints.append_leaves_hints.len(), 2);
        let first = hints.append_leaves_hints.iter().find(|h| h.hint_key == before).unwrap();
        assert_eq!(first.leaves, vec![leaves[0]]);
        assert_eq!(first.state_after.root, results[0].root);
        assert_eq!(first.state_after.next_available_leaf_index, 1);

        // Each leaf's path is keyed by the state right after that leaf.
        for path_hint in &hints.get_sibling_path_hints {
            let leaf = leaves[path_hint.index as usize];
            assert_eq!(
                compute_root_from_path::<Keccak256Hasher>(leaf, path_hint.index, &path_hint.path),
                path_hint.hint_key.root
            );
        }
    }

    #[test]
    fn test_failed_call_records_nothing() {
        let mut db = hinting_db();
        assert!(db.get_leaf_value(MerkleTreeId::NoteHashTree, 3).is_err());
        assert!(db.revert_checkpoint().is_err());
        let hints = dump(&db);
        assert_eq!(hints.merkle_hint_count(), 0);
        assert_eq!(db.checkpoint_action_counter(), 0);
    }

    #[test]
    fn test_checkpoint_hints_follow_action_counter() {
        let mut db = hinting_db();
        db.create_checkpoint().unwrap();
        db.insert_indexed_leaf_nullifier_tree(NullifierLeafValue::new(Fr::from(3u64))).unwrap();
        let inside = db.get_tree_roots();
        db.revert_checkpoint().unwrap();
        db.create_checkpoint().unwrap();
        db.commit_checkpoint().unwrap();

        let hints = dump(&db);
        assert_eq!(
            hints.create_checkpoint_hints,
            vec![
                CheckpointActionNoStateChangeHint {
                    action_counter: 0,
                    old_checkpoint_id: 0,
                    new_checkpoint_id: 1
                },
                CheckpointActionNoStateChangeHint {
                    action_counter: 2,
                    old_checkpoint_id: 0,
                    new_checkpoint_id: 2
                },
            ]
        );
        assert_eq!(hints.commit_checkpoint_hints[0].action_counter, 3);
        let revert = &hints.revert_checkpoint_hints[0];
        assert_eq!(revert.state_before, inside);
        assert_eq!(revert.state_after, hints.starting_tree_roots);
    }
}
