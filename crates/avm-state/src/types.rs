//! Common types

use std::fmt;

use avm_merkle::{AppendOnlyTreeSnapshot, Fr, SiblingPath};
use serde::{Deserialize, Serialize};

use crate::{StateError, constants::MAX_PROTOCOL_CONTRACTS};

/// Contract address.
pub type AztecAddress = Fr;

/// Contract class identifier.
pub type ContractClassId = Fr;

/// Public function selector.
pub type FunctionSelector = Fr;

/// Trees held by the world state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MerkleTreeId {
    /// Indexed tree of siloed nullifiers.
    NullifierTree,
    /// Append-only tree of unique note hashes.
    NoteHashTree,
    /// Indexed tree of public storage slots.
    PublicDataTree,
    /// Append-only tree of L1 to L2 messages.
    L1ToL2MessageTree,
    /// Archive of block headers, not served by this layer.
    Archive,
}

impl MerkleTreeId {
    /// Returns the tree name as used in log lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NullifierTree => "NULLIFIER_TREE",
            Self::NoteHashTree => "NOTE_HASH_TREE",
            Self::PublicDataTree => "PUBLIC_DATA_TREE",
            Self::L1ToL2MessageTree => "L1_TO_L2_MESSAGE_TREE",
            Self::Archive => "ARCHIVE",
        }
    }
}

impl fmt::Display for MerkleTreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every tree served by this layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSnapshots {
    /// L1 to L2 message tree.
    pub l1_to_l2_message_tree: AppendOnlyTreeSnapshot,
    /// Note hash tree.
    pub note_hash_tree: AppendOnlyTreeSnapshot,
    /// Nullifier tree.
    pub nullifier_tree: AppendOnlyTreeSnapshot,
    /// Public data tree.
    pub public_data_tree: AppendOnlyTreeSnapshot,
}

impl TreeSnapshots {
    /// Snapshot of one tree.
    pub fn get(&self, tree_id: MerkleTreeId) -> Result<AppendOnlyTreeSnapshot, StateError> {
        match tree_id {
            MerkleTreeId::NullifierTree => Ok(self.nullifier_tree),
            MerkleTreeId::NoteHashTree => Ok(self.note_hash_tree),
            MerkleTreeId::PublicDataTree => Ok(self.public_data_tree),
            MerkleTreeId::L1ToL2MessageTree => Ok(self.l1_to_l2_message_tree),
            MerkleTreeId::Archive => {
                Err(StateError::UnsupportedTree { operation: "snapshot", tree: tree_id })
            }
        }
    }

    /// Mutable snapshot of one tree.
    pub fn get_mut(
        &mut self,
        tree_id: MerkleTreeId,
    ) -> Result<&mut AppendOnlyTreeSnapshot, StateError> {
        match tree_id {
            MerkleTreeId::NullifierTree => Ok(&mut self.nullifier_tree),
            MerkleTreeId::NoteHashTree => Ok(&mut self.note_hash_tree),
            MerkleTreeId::PublicDataTree => Ok(&mut self.public_data_tree),
            MerkleTreeId::L1ToL2MessageTree => Ok(&mut self.l1_to_l2_message_tree),
            MerkleTreeId::Archive => {
                Err(StateError::UnsupportedTree { operation: "snapshot", tree: tree_id })
            }
        }
    }
}

/// Side-effect counters that follow checkpoints but are not committed in any root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeCounters {
    /// Note hashes emitted so far.
    pub note_hash_counter: u32,
    /// Nullifiers emitted so far.
    pub nullifier_counter: u32,
    /// L2 to L1 messages emitted so far.
    pub l2_to_l1_msg_counter: u32,
}

/// A tree snapshot with its side-effect counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeState {
    /// Tree snapshot.
    pub tree: AppendOnlyTreeSnapshot,
    /// Side effects counted against this tree.
    pub counter: u32,
}

/// Per-tree state view handed to the simulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStates {
    /// Note hash tree and note hash counter.
    pub note_hash_tree: TreeState,
    /// Nullifier tree and nullifier counter.
    pub nullifier_tree: TreeState,
    /// L1 to L2 message tree and L2 to L1 message counter.
    pub l1_to_l2_message_tree: TreeState,
    /// Public data tree and number of written slots.
    pub public_data_tree: TreeState,
}

/// Result of appending one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendLeafResult {
    /// Root after the leaf was appended.
    pub root: Fr,
    /// Sibling path of the appended leaf.
    pub path: SiblingPath,
}

/// A point on the Grumpkin curve, used for contract public keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinePoint {
    /// X coordinate.
    pub x: Fr,
    /// Y coordinate.
    pub y: Fr,
    /// Point at infinity.
    pub is_infinite: bool,
}

/// Public keys bound into a contract address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeys {
    /// Nullifier key.
    #[serde(rename = "masterNullifierPublicKey")]
    pub nullifier_key: AffinePoint,
    /// Incoming viewing key.
    #[serde(rename = "masterIncomingViewingPublicKey")]
    pub incoming_viewing_key: AffinePoint,
    /// Outgoing viewing key.
    #[serde(rename = "masterOutgoingViewingPublicKey")]
    pub outgoing_viewing_key: AffinePoint,
    /// Tagging key.
    #[serde(rename = "masterTaggingPublicKey")]
    pub tagging_key: AffinePoint,
}

/// A deployed contract instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInstance {
    /// Deployment salt.
    pub salt: Fr,
    /// Deployer address.
    pub deployer: AztecAddress,
    /// Class the instance currently runs.
    pub current_contract_class_id: ContractClassId,
    /// Class the instance was deployed with.
    pub original_contract_class_id: ContractClassId,
    /// Initializer commitment.
    pub initialization_hash: Fr,
    /// Public keys.
    pub public_keys: PublicKeys,
}

/// A registered contract class.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractClass {
    /// Artifact commitment.
    pub artifact_hash: Fr,
    /// Root of the private functions tree.
    pub private_functions_root: Fr,
    /// Packed public bytecode.
    pub packed_bytecode: Vec<u8>,
}

/// Contracts published by a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractDeploymentData {
    /// Registered classes.
    pub classes: Vec<(ContractClassId, ContractClass)>,
    /// Deployed instances.
    pub instances: Vec<(AztecAddress, ContractInstance)>,
}

/// Derived addresses of the protocol contracts, indexed by canonical address minus one.
///
/// A zero entry means no contract is registered at that canonical address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolContracts {
    /// Derived address per canonical address.
    pub derived_addresses: [AztecAddress; MAX_PROTOCOL_CONTRACTS],
}

/// Whether `address` is in the canonical protocol contract range.
pub fn is_protocol_contract_address(address: &AztecAddress) -> bool {
    !address.is_zero() && *address <= Fr::from(MAX_PROTOCOL_CONTRACTS)
}
