//! Replay of a simulation from its execution hints
//!
//! [`HintedMerkleDb`] answers every backend call by looking up the hint
//! recorded for the current tree snapshot. Mutations move the snapshot to the
//! hinted post-state, so a replay that follows the recorded call order walks
//! exactly the same sequence of roots. Anything the hints cannot answer is a
//! fatal error.

use std::collections::BTreeMap;

use avm_merkle::{
    AppendOnlyTreeSnapshot, Fr, IndexedLeaf, LeafIndex, LowLeafResponse, NullifierLeafValue,
    PublicDataLeafValue, SequentialInsertionResult, SiblingPath, short_hex,
};

use crate::{
    AppendLeafResult, AztecAddress, ContractBackend, ContractClass, ContractClassId,
    ContractDeploymentData, ContractInstance, FunctionSelector, MerkleBackend, MerkleTreeId,
    StateError, TreeSnapshots,
    contract_db::contract_key,
    hints::{
        AppendLeavesHint, CheckpointActionNoStateChangeHint, ExecutionHints, RevertCheckpointHint,
        SequentialInsertHint,
    },
};

fn missing(kind: &'static str, snapshot: &AppendOnlyTreeSnapshot, detail: String) -> StateError {
    StateError::MissingHint {
        kind,
        key: format!(
            "root {}, size {}, {detail}",
            short_hex(&snapshot.root),
            snapshot.next_available_leaf_index
        ),
    }
}

/// Raw backend served from recorded hints.
#[derive(Clone, Debug)]
pub struct HintedMerkleDb {
    tree_roots: TreeSnapshots,
    checkpoint_stack: Vec<u32>,
    checkpoint_action_counter: u32,
    sibling_paths: BTreeMap<(AppendOnlyTreeSnapshot, MerkleTreeId, LeafIndex), SiblingPath>,
    previous_value_indices:
        BTreeMap<(AppendOnlyTreeSnapshot, MerkleTreeId, Fr), LowLeafResponse>,
    public_data_preimages:
        BTreeMap<(AppendOnlyTreeSnapshot, LeafIndex), IndexedLeaf<PublicDataLeafValue>>,
    nullifier_preimages:
        BTreeMap<(AppendOnlyTreeSnapshot, LeafIndex), IndexedLeaf<NullifierLeafValue>>,
    leaf_values: BTreeMap<(AppendOnlyTreeSnapshot, MerkleTreeId, LeafIndex), Fr>,
    public_data_inserts: BTreeMap<
        (AppendOnlyTreeSnapshot, PublicDataLeafValue),
        SequentialInsertHint<PublicDataLeafValue>,
    >,
    nullifier_inserts: BTreeMap<
        (AppendOnlyTreeSnapshot, NullifierLeafValue),
        SequentialInsertHint<NullifierLeafValue>,
    >,
    appends: BTreeMap<(AppendOnlyTreeSnapshot, MerkleTreeId, Fr), AppendLeavesHint>,
    create_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    commit_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    revert_checkpoints: BTreeMap<u32, RevertCheckpointHint>,
}

impl HintedMerkleDb {
    /// Index the merkle hints of `hints`, starting from its starting roots.
    pub fn new(hints: &ExecutionHints) -> Self {
        let db = Self {
            tree_roots: hints.starting_tree_roots,
            checkpoint_stack: vec![0],
            checkpoint_action_counter: 0,
            sibling_paths: hints
                .get_sibling_path_hints
                .iter()
                .map(|h| ((h.hint_key, h.tree_id, h.index), h.path.clone()))
                .collect(),
            previous_value_indices: hints
                .get_previous_value_index_hints
                .iter()
                .map(|h| {
                    let response =
                        LowLeafResponse { is_already_present: h.already_present, index: h.index };
                    ((h.hint_key, h.tree_id, h.value), response)
                })
                .collect(),
            public_data_preimages: hints
                .get_leaf_preimage_hints_public_data_tree
                .iter()
                .map(|h| ((h.hint_key, h.index), h.leaf_preimage.clone()))
                .collect(),
            nullifier_preimages: hints
                .get_leaf_preimage_hints_nullifier_tree
                .iter()
                .map(|h| ((h.hint_key, h.index), h.leaf_preimage.clone()))
                .collect(),
            leaf_values: hints
                .get_leaf_value_hints
                .iter()
                .map(|h| ((h.hint_key, h.tree_id, h.index), h.value))
                .collect(),
            public_data_inserts: hints
                .sequential_insert_hints_public_data_tree
                .iter()
                .map(|h| ((h.hint_key, h.leaf), h.clone()))
                .collect(),
            nullifier_inserts: hints
                .sequential_insert_hints_nullifier_tree
                .iter()
                .map(|h| ((h.hint_key, h.leaf), h.clone()))
                .collect(),
            appends: hints
                .append_leaves_hints
                .iter()
                .filter_map(|h| match h.leaves.as_slice() {
                    [leaf] => Some(((h.hint_key, h.tree_id, *leaf), h.clone())),
                    _ => None,
                })
                .collect(),
            create_checkpoints: hints
                .create_checkpoint_hints
                .iter()
                .map(|h| (h.action_counter, *h))
                .collect(),
            commit_checkpoints: hints
                .commit_checkpoint_hints
                .iter()
                .map(|h| (h.action_counter, *h))
                .collect(),
            revert_checkpoints: hints
                .revert_checkpoint_hints
                .iter()
                .map(|h| (h.action_counter, *h))
                .collect(),
        };

        tracing::info!(
            target: "avm_state::replay",
            sibling_paths = db.sibling_paths.len(),
            low_leaves = db.previous_value_indices.len(),
            inserts = db.public_data_inserts.len() + db.nullifier_inserts.len(),
            appends = db.appends.len(),
            checkpoint_actions =
                db.create_checkpoints.len() + db.commit_checkpoints.len() + db.revert_checkpoints.len(),
            "Loaded merkle hints"
        );
        db
    }

    /// Number of checkpoint actions replayed so far.
    pub const fn checkpoint_action_counter(&self) -> u32 {
        self.checkpoint_action_counter
    }

    fn top_checkpoint_id(&self) -> u32 {
        self.checkpoint_stack.last().copied().unwrap_or(0)
    }

    fn mismatch(&self, operation: &'static str, detail: String) -> StateError {
        StateError::ReplayMismatch {
            operation,
            action_counter: self.checkpoint_action_counter,
            detail,
        }
    }

    fn check_old_id(&self, operation: &'static str, old_checkpoint_id: u32) -> Result<(), StateError> {
        let current = self.top_checkpoint_id();
        if old_checkpoint_id != current {
            return Err(self.mismatch(
                operation,
                format!("old checkpoint id {old_checkpoint_id} != current {current}"),
            ));
        }
        Ok(())
    }

    /// Pop the current checkpoint and check the id that becomes current.
    fn pop_checkpoint(
        &mut self,
        operation: &'static str,
        new_checkpoint_id: u32,
    ) -> Result<(), StateError> {
        if self.checkpoint_stack.len() <= 1 {
            return Err(StateError::StackDiscipline { operation });
        }
        let below = self.checkpoint_stack[self.checkpoint_stack.len() - 2];
        if new_checkpoint_id != below {
            return Err(self.mismatch(
                operation,
                format!("new checkpoint id {new_checkpoint_id} != current {below}"),
            ));
        }
        self.checkpoint_stack.pop();
        Ok(())
    }

    fn evolve(&mut self, tree_id: MerkleTreeId, state_after: AppendOnlyTreeSnapshot) -> Result<(), StateError> {
        *self.tree_roots.get_mut(tree_id)? = state_after;
        tracing::debug!(
            target: "avm_state::replay",
            tree = %tree_id,
            root = %short_hex(&state_after.root),
            size = state_after.next_available_leaf_index,
            "Tree evolved"
        );
        Ok(())
    }
}

impl MerkleBackend for HintedMerkleDb {
    fn get_tree_roots(&self) -> TreeSnapshots {
        self.tree_roots
    }

    fn get_sibling_path(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<SiblingPath, StateError> {
        let snapshot = self.tree_roots.get(tree_id)?;
        self.sibling_paths
            .get(&(snapshot, tree_id, index))
            .cloned()
            .ok_or_else(|| missing("sibling path", &snapshot, format!("tree {tree_id}, leaf {index}")))
    }

    fn get_low_indexed_leaf(
        &mut self,
        tree_id: MerkleTreeId,
        key: Fr,
    ) -> Result<LowLeafResponse, StateError> {
        let snapshot = self.tree_roots.get(tree_id)?;
        self.previous_value_indices.get(&(snapshot, tree_id, key)).copied().ok_or_else(|| {
            missing("previous value index", &snapshot, format!("tree {tree_id}, key {}", short_hex(&key)))
        })
    }

    fn get_leaf_value(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<Fr, StateError> {
        let snapshot = self.tree_roots.get(tree_id)?;
        self.leaf_values
            .get(&(snapshot, tree_id, index))
            .copied()
            .ok_or_else(|| missing("leaf value", &snapshot, format!("tree {tree_id}, leaf {index}")))
    }

    fn get_leaf_preimage_public_data_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<PublicDataLeafValue>, StateError> {
        let snapshot = self.tree_roots.public_data_tree;
        self.public_data_preimages
            .get(&(snapshot, index))
            .cloned()
            .ok_or_else(|| missing("public data leaf preimage", &snapshot, format!("leaf {index}")))
    }

    fn get_leaf_preimage_nullifier_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<NullifierLeafValue>, StateError> {
        let snapshot = self.tree_roots.nullifier_tree;
        self.nullifier_preimages
            .get(&(snapshot, index))
            .cloned()
            .ok_or_else(|| missing("nullifier leaf preimage", &snapshot, format!("leaf {index}")))
    }

    fn insert_indexed_leaf_public_data_tree(
        &mut self,
        leaf: PublicDataLeafValue,
    ) -> Result<SequentialInsertionResult<PublicDataLeafValue>, StateError> {
        let snapshot = self.tree_roots.public_data_tree;
        let hint = self.public_data_inserts.get(&(snapshot, leaf)).ok_or_else(|| {
            missing(
                "public data sequential insert",
                &snapshot,
                format!("slot {}, value {}", short_hex(&leaf.slot), short_hex(&leaf.value)),
            )
        })?;
        let (result, state_after) = (hint.to_result(), hint.state_after);
        self.evolve(MerkleTreeId::PublicDataTree, state_after)?;
        Ok(result)
    }

    fn insert_indexed_leaf_nullifier_tree(
        &mut self,
        leaf: NullifierLeafValue,
    ) -> Result<SequentialInsertionResult<NullifierLeafValue>, StateError> {
        let snapshot = self.tree_roots.nullifier_tree;
        let hint = self.nullifier_inserts.get(&(snapshot, leaf)).ok_or_else(|| {
            missing(
                "nullifier sequential insert",
                &snapshot,
                format!("nullifier {}", short_hex(&leaf.nullifier)),
            )
        })?;
        let (result, state_after) = (hint.to_result(), hint.state_after);
        self.evolve(MerkleTreeId::NullifierTree, state_after)?;
        Ok(result)
    }

    fn append_leaves(
        &mut self,
        tree_id: MerkleTreeId,
        leaves: &[Fr],
    ) -> Result<Vec<AppendLeafResult>, StateError> {
        // Resolve every leaf before evolving so a miss leaves the roots untouched.
        let mut snapshot = self.tree_roots.get(tree_id)?;
        let mut results = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let hint = self.appends.get(&(snapshot, tree_id, *leaf)).ok_or_else(|| {
                missing("append leaves", &snapshot, format!("tree {tree_id}, leaf {}", short_hex(leaf)))
            })?;
            let state_after = hint.state_after;
            let index = snapshot.next_available_leaf_index;
            let path = self.sibling_paths.get(&(state_after, tree_id, index)).cloned().ok_or_else(
                || missing("sibling path", &state_after, format!("tree {tree_id}, leaf {index}")),
            )?;
            results.push(AppendLeafResult { root: state_after.root, path });
            snapshot = state_after;
        }
        self.evolve(tree_id, snapshot)?;
        Ok(results)
    }

    fn pad_tree(&mut self, tree_id: MerkleTreeId, count: u64) -> Result<(), StateError> {
        match tree_id {
            MerkleTreeId::NullifierTree | MerkleTreeId::NoteHashTree => {
                let size = self.tree_roots.get(tree_id)?.next_available_leaf_index;
                let padded = size.checked_add(count).ok_or_else(|| {
                    self.mismatch("pad_tree", format!("tree {tree_id} of size {size} padded by {count}"))
                })?;
                self.tree_roots.get_mut(tree_id)?.next_available_leaf_index = padded;
                Ok(())
            }
            _ => Err(StateError::UnsupportedTree { operation: "pad_tree", tree: tree_id }),
        }
    }

    fn create_checkpoint(&mut self) -> Result<(), StateError> {
        let operation = "create_checkpoint";
        let hint = *self.create_checkpoints.get(&self.checkpoint_action_counter).ok_or_else(|| {
            StateError::MissingHint {
                kind: "create checkpoint",
                key: format!("action counter {}", self.checkpoint_action_counter),
            }
        })?;
        self.check_old_id(operation, hint.old_checkpoint_id)?;
        self.checkpoint_stack.push(hint.new_checkpoint_id);

        tracing::debug!(
            target: "avm_state::checkpoint",
            action_counter = self.checkpoint_action_counter,
            from = hint.old_checkpoint_id,
            to = hint.new_checkpoint_id,
            "Replayed checkpoint creation"
        );
        self.checkpoint_action_counter += 1;
        Ok(())
    }

    fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        let operation = "commit_checkpoint";
        let hint = *self.commit_checkpoints.get(&self.checkpoint_action_counter).ok_or_else(|| {
            StateError::MissingHint {
                kind: "commit checkpoint",
                key: format!("action counter {}", self.checkpoint_action_counter),
            }
        })?;
        self.check_old_id(operation, hint.old_checkpoint_id)?;
        self.pop_checkpoint(operation, hint.new_checkpoint_id)?;

        tracing::debug!(
            target: "avm_state::checkpoint",
            action_counter = self.checkpoint_action_counter,
            from = hint.old_checkpoint_id,
            to = hint.new_checkpoint_id,
            "Replayed checkpoint commit"
        );
        self.checkpoint_action_counter += 1;
        Ok(())
    }

    fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        let operation = "revert_checkpoint";
        let hint = *self.revert_checkpoints.get(&self.checkpoint_action_counter).ok_or_else(|| {
            StateError::MissingHint {
                kind: "revert checkpoint",
                key: format!("action counter {}", self.checkpoint_action_counter),
            }
        })?;
        self.check_old_id(operation, hint.old_checkpoint_id)?;
        if hint.state_before != self.tree_roots {
            return Err(self.mismatch(
                operation,
                "hinted tree snapshots do not match the current tree roots".to_string(),
            ));
        }
        self.pop_checkpoint(operation, hint.new_checkpoint_id)?;
        self.tree_roots = hint.state_after;

        tracing::debug!(
            target: "avm_state::checkpoint",
            action_counter = self.checkpoint_action_counter,
            from = hint.old_checkpoint_id,
            to = hint.new_checkpoint_id,
            "Replayed checkpoint revert"
        );
        self.checkpoint_action_counter += 1;
        Ok(())
    }

    fn get_checkpoint_id(&self) -> u32 {
        self.top_checkpoint_id()
    }
}

/// Contract backend served from recorded hints.
///
/// Contracts never recorded resolve to `None`, matching a live lookup that
/// found nothing.
#[derive(Clone, Debug)]
pub struct HintedContractDb {
    instances: BTreeMap<(u32, AztecAddress), ContractInstance>,
    classes: BTreeMap<(u32, ContractClassId), ContractClass>,
    bytecode_commitments: BTreeMap<(u32, ContractClassId), Fr>,
    debug_function_names: BTreeMap<(AztecAddress, FunctionSelector), String>,
    create_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    commit_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    revert_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    checkpoint_stack: Vec<u32>,
    checkpoint_action_counter: u32,
}

impl HintedContractDb {
    /// Index the contract hints of `hints`.
    pub fn new(hints: &ExecutionHints) -> Self {
        let by_counter = |list: &[CheckpointActionNoStateChangeHint]| {
            list.iter().map(|h| (h.action_counter, *h)).collect()
        };
        Self {
            instances: hints
                .contract_instances
                .iter()
                .map(|h| ((h.hint_key, h.address), h.contract_instance.clone()))
                .collect(),
            classes: hints
                .contract_classes
                .iter()
                .map(|h| ((h.hint_key, h.class_id), h.contract_class.clone()))
                .collect(),
            bytecode_commitments: hints
                .bytecode_commitments
                .iter()
                .map(|h| ((h.hint_key, h.class_id), h.commitment))
                .collect(),
            debug_function_names: hints
                .debug_function_names
                .iter()
                .map(|h| ((h.address, h.selector), h.name.clone()))
                .collect(),
            create_checkpoints: by_counter(&hints.contract_db_create_checkpoint_hints),
            commit_checkpoints: by_counter(&hints.contract_db_commit_checkpoint_hints),
            revert_checkpoints: by_counter(&hints.contract_db_revert_checkpoint_hints),
            checkpoint_stack: vec![0],
            checkpoint_action_counter: 0,
        }
    }

    fn replay_checkpoint(
        &mut self,
        operation: &'static str,
        hint: Option<CheckpointActionNoStateChangeHint>,
        push: bool,
    ) -> Result<(), StateError> {
        let action_counter = self.checkpoint_action_counter;
        let hint = hint.ok_or_else(|| StateError::MissingHint {
            kind: "contract db checkpoint",
            key: format!("{operation} at action counter {action_counter}"),
        })?;
        let mismatch = |detail: String| StateError::ReplayMismatch { operation, action_counter, detail };

        let current = self.checkpoint_stack.last().copied().unwrap_or(0);
        if hint.old_checkpoint_id != current {
            return Err(mismatch(format!(
                "old checkpoint id {} != current {current}",
                hint.old_checkpoint_id
            )));
        }
        if push {
            self.checkpoint_stack.push(hint.new_checkpoint_id);
        } else {
            if self.checkpoint_stack.len() <= 1 {
                return Err(StateError::StackDiscipline { operation });
            }
            self.checkpoint_stack.pop();
            let below = self.checkpoint_stack.last().copied().unwrap_or(0);
            if hint.new_checkpoint_id != below {
                return Err(mismatch(format!(
                    "new checkpoint id {} != current {below}",
                    hint.new_checkpoint_id
                )));
            }
        }
        self.checkpoint_action_counter += 1;
        Ok(())
    }
}

impl ContractBackend for HintedContractDb {
    fn get_contract_instance(&mut self, address: AztecAddress) -> Option<ContractInstance> {
        let key = (self.checkpoint_action_counter, address);
        let found = self.instances.get(&key).cloned();
        if found.is_none() {
            tracing::debug!(
                target: "avm_state::replay",
                key = %contract_key(key.0, &address),
                "Contract instance not hinted"
            );
        }
        found
    }

    fn get_contract_class(&mut self, class_id: ContractClassId) -> Option<ContractClass> {
        let key = (self.checkpoint_action_counter, class_id);
        let found = self.classes.get(&key).cloned();
        if found.is_none() {
            tracing::debug!(
                target: "avm_state::replay",
                key = %contract_key(key.0, &class_id),
                "Contract class not hinted"
            );
        }
        found
    }

    fn get_bytecode_commitment(&mut self, class_id: ContractClassId) -> Option<Fr> {
        self.bytecode_commitments.get(&(self.checkpoint_action_counter, class_id)).copied()
    }

    fn get_debug_function_name(
        &mut self,
        address: AztecAddress,
        selector: FunctionSelector,
    ) -> Option<String> {
        self.debug_function_names.get(&(address, selector)).cloned()
    }

    fn add_contracts(&mut self, data: &ContractDeploymentData) {
        // Lookups after this point are already covered by hints.
        tracing::debug!(
            target: "avm_state::replay",
            classes = data.classes.len(),
            instances = data.instances.len(),
            "Ignoring added contracts during replay"
        );
    }

    fn create_checkpoint(&mut self) -> Result<(), StateError> {
        let hint = self.create_checkpoints.get(&self.checkpoint_action_counter).copied();
        self.replay_checkpoint("create_checkpoint", hint, true)
    }

    fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        let hint = self.commit_checkpoints.get(&self.checkpoint_action_counter).copied();
        self.replay_checkpoint("commit_checkpoint", hint, false)
    }

    fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        let hint = self.revert_checkpoints.get(&self.checkpoint_action_counter).copied();
        self.replay_checkpoint("revert_checkpoint", hint, false)
    }

    fn get_checkpoint_id(&self) -> u32 {
        self.checkpoint_stack.last().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HintingMerkleDb, InMemoryWorldState, TreeHeights};

    fn heights() -> TreeHeights {
        TreeHeights { nullifier: 6, note_hash: 6, public_data: 6, l1_to_l2_message: 6 }
    }

    fn record(ops: impl FnOnce(&mut HintingMerkleDb<InMemoryWorldState>)) -> (ExecutionHints, TreeSnapshots) {
        let mut db = HintingMerkleDb::new(InMemoryWorldState::new(&heights()).unwrap());
        ops(&mut db);
        let mut hints = ExecutionHints::default();
        db.dump_hints(&mut hints);
        (hints, db.get_tree_roots())
    }

    #[test]
    fn test_replay_reaches_same_roots() {
        let nullifier = NullifierLeafValue::new(Fr::from(17u64));
        let write = PublicDataLeafValue::new(Fr::from(3u64), Fr::from(30u64));
        let notes = [Fr::from(1u64), Fr::from(2u64)];

        let (hints, final_roots) = record(|db| {
            db.insert_indexed_leaf_nullifier_tree(nullifier).unwrap();
            db.create_checkpoint().unwrap();
            db.insert_indexed_leaf_public_data_tree(write).unwrap();
            db.append_leaves(MerkleTreeId::NoteHashTree, &notes).unwrap();
            db.commit_checkpoint().unwrap();
        });

        let mut replay = HintedMerkleDb::new(&hints);
        let live = {
            let mut db: InMemoryWorldState = InMemoryWorldState::new(&heights()).unwrap();
            (
                db.insert_indexed_leaf_nullifier_tree(nullifier).unwrap(),
                db.insert_indexed_leaf_public_data_tree(write).unwrap(),
                db.append_leaves(MerkleTreeId::NoteHashTree, &notes).unwrap(),
            )
        };

        assert_eq!(replay.insert_indexed_leaf_nullifier_tree(nullifier).unwrap(), live.0);
        replay.create_checkpoint().unwrap();
        assert_eq!(replay.get_checkpoint_id(), 1);
        assert_eq!(replay.insert_indexed_leaf_public_data_tree(write).unwrap(), live.1);
        assert_eq!(replay.append_leaves(MerkleTreeId::NoteHashTree, &notes).unwrap(), live.2);
        replay.commit_checkpoint().unwrap();
        assert_eq!(replay.get_tree_roots(), final_roots);
        assert_eq!(replay.checkpoint_action_counter(), 2);
    }

    #[test]
    fn test_replay_revert_restores_roots() {
        let (hints, final_roots) = record(|db| {
            db.create_checkpoint().unwrap();
            db.insert_indexed_leaf_nullifier_tree(NullifierLeafValue::new(Fr::from(5u64))).unwrap();
            db.revert_checkpoint().unwrap();
        });

        let mut replay = HintedMerkleDb::new(&hints);
        replay.create_checkpoint().unwrap();
        replay.insert_indexed_leaf_nullifier_tree(NullifierLeafValue::new(Fr::from(5u64))).unwrap();
        replay.revert_checkpoint().unwrap();
        assert_eq!(replay.get_tree_roots(), final_roots);
        assert_eq!(replay.get_checkpoint_id(), 0);
    }

    #[test]
    fn test_missing_hint_is_fatal() {
        let (hints, _) = record(|_| {});
        let mut replay = HintedMerkleDb::new(&hints);
        let err = replay
            .get_low_indexed_leaf(MerkleTreeId::NullifierTree, Fr::from(1u64))
            .unwrap_err();
        assert!(matches!(err, StateError::MissingHint { kind: "previous value index", .. }));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("NULLIFIER_TREE"));
        assert!(replay.create_checkpoint().unwrap_err().is_fatal());
    }

    #[test]
    fn test_revert_with_diverged_roots_is_mismatch() {
        let (hints, _) = record(|db| {
            db.create_checkpoint().unwrap();
            db.revert_checkpoint().unwrap();
        });

        let mut replay = HintedMerkleDb::new(&hints);
        replay.create_checkpoint().unwrap();
        replay.pad_tree(MerkleTreeId::NoteHashTree, 2).unwrap();
        assert!(matches!(
            replay.revert_checkpoint(),
            Err(StateError::ReplayMismatch { operation: "revert_checkpoint", action_counter: 1, .. })
        ));
    }

    #[test]
    fn test_pad_only_moves_size() {
        let (hints, start) = record(|_| {});
        let mut replay = HintedMerkleDb::new(&hints);
        replay.pad_tree(MerkleTreeId::NullifierTree, 63).unwrap();
        let roots = replay.get_tree_roots();
        assert_eq!(roots.nullifier_tree.root, start.nullifier_tree.root);
        assert_eq!(roots.nullifier_tree.next_available_leaf_index, 64);
        assert!(replay.pad_tree(MerkleTreeId::PublicDataTree, 1).is_err());
    }

    #[test]
    fn test_contract_replay_follows_action_counter() {
        use crate::{ContractBackend, HintingContractDb, InMemoryContractDb};

        let address = Fr::from(12u64);
        let data = ContractDeploymentData {
            classes: vec![],
            instances: vec![(address, ContractInstance::default())],
        };
        let mut db = HintingContractDb::new(InMemoryContractDb::<avm_merkle::Keccak256Hasher>::new());
        db.create_checkpoint().unwrap();
        db.add_contracts(&data);
        assert!(db.get_contract_instance(address).is_some());
        db.revert_checkpoint().unwrap();
        assert!(db.get_contract_instance(address).is_none());

        let mut hints = ExecutionHints::default();
        db.dump_hints(&mut hints);

        let mut replay = HintedContractDb::new(&hints);
        assert!(replay.get_contract_instance(address).is_none());
        replay.create_checkpoint().unwrap();
        replay.add_contracts(&data);
        assert_eq!(replay.get_contract_instance(address), Some(ContractInstance::default()));
        replay.revert_checkpoint().unwrap();
        assert!(replay.get_contract_instance(address).is_none());
        assert!(replay.commit_checkpoint().is_err());
    }

    #[test]
    fn test_pad_overflow_is_a_mismatch() {
        let (hints, _) = record(|db| {
            db.append_leaves(MerkleTreeId::NoteHashTree, &[Fr::from(1u64)]).unwrap();
        });
        let mut replay = HintedMerkleDb::new(&hints);
        let before = replay.get_tree_roots();

        let err = replay.pad_tree(MerkleTreeId::NoteHashTree, u64::MAX).unwrap_err();
        assert!(matches!(err, StateError::ReplayMismatch { operation: "pad_tree", .. }));
        assert!(err.is_fatal());
        assert_eq!(replay.get_tree_roots(), before);

        replay.pad_tree(MerkleTreeId::NoteHashTree, 3).unwrap();
        assert_eq!(replay.get_tree_roots().note_hash_tree.next_available_leaf_index, 4);
    }
}
