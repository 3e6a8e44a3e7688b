//! Execution hints bundle
//!
//! Every hint is keyed by the state it was taken in: a tree snapshot for
//! merkle queries, a checkpoint action counter for contract lookups and
//! checkpoint transitions. The bundle layout is consumed by the prover as is,
//! so field names and order must not change.

use avm_merkle::{
    AppendOnlyTreeSnapshot, Fr, IndexedLeaf, LeafIndex, LeafUpdateWitness, LeafValue,
    NullifierLeafValue, PublicDataLeafValue, SequentialInsertionResult, SiblingPath,
};
use serde::{Deserialize, Serialize};

use crate::{
    AztecAddress, ContractClass, ContractClassId, ContractInstance, FunctionSelector,
    MerkleTreeId, ProtocolContracts, TreeSnapshots,
};

/// Sibling path of one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSiblingPathHint {
    /// Tree snapshot the path was taken against.
    pub hint_key: AppendOnlyTreeSnapshot,
    /// Tree queried.
    pub tree_id: MerkleTreeId,
    /// Leaf index.
    pub index: LeafIndex,
    /// Sibling path, leaf level first.
    pub path: SiblingPath,
}

/// Low-leaf lookup of one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPreviousValueIndexHint {
    /// Tree snapshot at lookup time.
    pub hint_key: AppendOnlyTreeSnapshot,
    /// Tree queried.
    pub tree_id: MerkleTreeId,
    /// Key searched.
    pub value: Fr,
    /// Index of the key or of its low leaf.
    pub index: LeafIndex,
    /// The key itself is stored at `index`.
    pub already_present: bool,
}

/// Indexed leaf preimage at one index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLeafPreimageHint<V> {
    /// Tree snapshot at lookup time.
    pub hint_key: AppendOnlyTreeSnapshot,
    /// Leaf index.
    pub index: LeafIndex,
    /// Leaf preimage.
    pub leaf_preimage: IndexedLeaf<V>,
}

/// Raw leaf value at one index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLeafValueHint {
    /// Tree snapshot at lookup time.
    pub hint_key: AppendOnlyTreeSnapshot,
    /// Tree queried.
    pub tree_id: MerkleTreeId,
    /// Leaf index.
    pub index: LeafIndex,
    /// Leaf value, or the leaf hash for indexed trees.
    pub value: Fr,
}

/// One sequential insertion into an indexed tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialInsertHint<V> {
    /// Tree snapshot before the insertion.
    pub hint_key: AppendOnlyTreeSnapshot,
    /// Tree written.
    pub tree_id: MerkleTreeId,
    /// Inserted payload.
    pub leaf: V,
    /// Low leaf before the update, with its path.
    pub low_leaves_witness_data: LeafUpdateWitness<V>,
    /// New leaf with its path, or the empty leaf when the key was present.
    pub insertion_witness_data: LeafUpdateWitness<V>,
    /// Tree snapshot after the insertion.
    pub state_after: AppendOnlyTreeSnapshot,
}

impl<V: LeafValue> SequentialInsertHint<V> {
    /// Rebuild the insertion result this hint was recorded from.
    ///
    /// A present key leaves an empty insertion witness. The updated low leaf
    /// is derived from the low leaf and the inserted payload.
    pub fn to_result(&self) -> SequentialInsertionResult<V> {
        let low_leaf = &self.low_leaves_witness_data.leaf;
        let is_already_present = self.insertion_witness_data.leaf.is_empty();
        let updated_low_leaf = if is_already_present {
            IndexedLeaf { leaf: self.leaf.clone(), ..low_leaf.clone() }
        } else {
            IndexedLeaf::new(
                low_leaf.leaf.clone(),
                self.insertion_witness_data.index,
                self.leaf.key(),
            )
        };

        SequentialInsertionResult {
            low_leaf_witness: self.low_leaves_witness_data.clone(),
            updated_low_leaf,
            insertion_witness: self.insertion_witness_data.clone(),
            is_already_present,
        }
    }
}

/// Append of leaves to an append-only tree.
///
/// Recorded one leaf at a time so every intermediate root is keyed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendLeavesHint {
    /// Tree snapshot before the append.
    pub hint_key: AppendOnlyTreeSnapshot,
    /// Tree snapshot after the append.
    pub state_after: AppendOnlyTreeSnapshot,
    /// Tree written.
    pub tree_id: MerkleTreeId,
    /// Appended leaves.
    pub leaves: Vec<Fr>,
}

/// Create or commit transition. Tree state is unchanged by either.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointActionNoStateChangeHint {
    /// Position in the checkpoint action sequence.
    pub action_counter: u32,
    /// Checkpoint id before the action.
    pub old_checkpoint_id: u32,
    /// Checkpoint id after the action.
    pub new_checkpoint_id: u32,
}

/// Revert transition with the tree snapshots on both sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertCheckpointHint {
    /// Position in the checkpoint action sequence.
    pub action_counter: u32,
    /// Checkpoint id before the revert.
    pub old_checkpoint_id: u32,
    /// Checkpoint id after the revert.
    pub new_checkpoint_id: u32,
    /// Tree snapshots before the revert.
    pub state_before: TreeSnapshots,
    /// Tree snapshots after the revert.
    pub state_after: TreeSnapshots,
}

/// Contract instance served at one checkpoint action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInstanceHint {
    /// Checkpoint action counter at lookup time.
    pub hint_key: u32,
    /// Instance address.
    pub address: AztecAddress,
    /// Instance data.
    pub contract_instance: ContractInstance,
}

/// Contract class served at one checkpoint action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractClassHint {
    /// Checkpoint action counter at lookup time.
    pub hint_key: u32,
    /// Class id.
    pub class_id: ContractClassId,
    /// Class data.
    pub contract_class: ContractClass,
}

/// Bytecode commitment served at one checkpoint action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BytecodeCommitmentHint {
    /// Checkpoint action counter at lookup time.
    pub hint_key: u32,
    /// Class id.
    pub class_id: ContractClassId,
    /// Commitment to the class bytecode.
    pub commitment: Fr,
}

/// Debug name of a public function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugFunctionNameHint {
    /// Contract address.
    pub address: AztecAddress,
    /// Function selector.
    pub selector: FunctionSelector,
    /// Function name.
    pub name: String,
}

/// Everything the prover needs to replay one simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHints {
    /// Derived addresses of the protocol contracts.
    pub protocol_contracts: ProtocolContracts,
    /// Contract instance lookups.
    pub contract_instances: Vec<ContractInstanceHint>,
    /// Contract class lookups.
    pub contract_classes: Vec<ContractClassHint>,
    /// Bytecode commitment lookups.
    pub bytecode_commitments: Vec<BytecodeCommitmentHint>,
    /// Debug names of called functions.
    pub debug_function_names: Vec<DebugFunctionNameHint>,
    /// Contract db checkpoint creations.
    pub contract_db_create_checkpoint_hints: Vec<CheckpointActionNoStateChangeHint>,
    /// Contract db checkpoint commits.
    pub contract_db_commit_checkpoint_hints: Vec<CheckpointActionNoStateChangeHint>,
    /// Contract db checkpoint reverts.
    pub contract_db_revert_checkpoint_hints: Vec<CheckpointActionNoStateChangeHint>,
    /// Tree snapshots at simulation start.
    pub starting_tree_roots: TreeSnapshots,
    /// Sibling paths.
    pub get_sibling_path_hints: Vec<GetSiblingPathHint>,
    /// Low-leaf lookups.
    pub get_previous_value_index_hints: Vec<GetPreviousValueIndexHint>,
    /// Public data leaf preimages.
    pub get_leaf_preimage_hints_public_data_tree: Vec<GetLeafPreimageHint<PublicDataLeafValue>>,
    /// Nullifier leaf preimages.
    pub get_leaf_preimage_hints_nullifier_tree: Vec<GetLeafPreimageHint<NullifierLeafValue>>,
    /// Leaf values.
    pub get_leaf_value_hints: Vec<GetLeafValueHint>,
    /// Public data writes.
    pub sequential_insert_hints_public_data_tree: Vec<SequentialInsertHint<PublicDataLeafValue>>,
    /// Nullifier inserts.
    pub sequential_insert_hints_nullifier_tree: Vec<SequentialInsertHint<NullifierLeafValue>>,
    /// Appends, one per leaf.
    pub append_leaves_hints: Vec<AppendLeavesHint>,
    /// Tree checkpoint creations.
    pub create_checkpoint_hints: Vec<CheckpointActionNoStateChangeHint>,
    /// Tree checkpoint commits.
    pub commit_checkpoint_hints: Vec<CheckpointActionNoStateChangeHint>,
    /// Tree checkpoint reverts.
    pub revert_checkpoint_hints: Vec<RevertCheckpointHint>,
}

/// Failure to encode or decode a hints bundle.
#[derive(Debug, thiserror::Error)]
pub enum HintsCodecError {
    /// JSON encoding failed.
    #[error("hints json: {0}")]
    Json(#[from] serde_json::Error),
    /// Binary encoding failed.
    #[error("hints binary: {0}")]
    Binary(#[from] bincode::Error),
}

impl ExecutionHints {
    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, HintsCodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self, HintsCodecError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, HintsCodecError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HintsCodecError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Total number of merkle hints, starting roots excluded.
    pub fn merkle_hint_count(&self) -> usize {
        self.get_sibling_path_hints.len()
            + self.get_previous_value_index_hints.len()
            + self.get_leaf_preimage_hints_public_data_tree.len()
            + self.get_leaf_preimage_hints_nullifier_tree.len()
            + self.get_leaf_value_hints.len()
            + self.sequential_insert_hints_public_data_tree.len()
            + self.sequential_insert_hints_nullifier_tree.len()
            + self.append_leaves_hints.len()
            + self.create_checkpoint_hints.len()
            + self.commit_checkpoint_hints.len()
            + self.revert_checkpoint_hints.len()
    }
}
