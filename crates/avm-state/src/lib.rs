//! World state and witness layer of the AVM simulator.
//!
//! The simulator reads and writes public state through [`PureMerkleDb`],
//! which speaks in contracts, storage slots, nullifiers and note hashes and
//! translates them into operations on a raw [`MerkleBackend`]. Backends
//! compose by wrapping:
//!
//! - [`InMemoryWorldState`] holds the live trees behind a checkpoint stack
//! - [`HintingMerkleDb`] records every call it forwards as an execution hint
//! - [`HintedMerkleDb`] answers the same calls from recorded hints only
//!
//! Contracts follow the same split with [`ContractBackend`], and
//! [`SimulationState`] wires one transaction's databases together. The
//! recorded [`hints::ExecutionHints`] are what a prover replays.

mod backend;
mod checkpoint;
mod config;
pub mod constants;
mod contract_db;
pub mod crypto;
mod error;
mod hinting;
pub mod hints;
mod merkle_db;
mod protocol_contracts;
mod replay;
mod simulation;
mod types;
mod world_state;

pub use avm_merkle::{
    AppendOnlyTreeSnapshot, Fr, IndexedLeaf, LeafIndex, LowLeafResponse, NullifierLeafValue,
    PublicDataLeafValue, SequentialInsertionResult, SiblingPath,
};
pub use backend::MerkleBackend;
pub use checkpoint::CheckpointStack;
pub use config::{SimulatorConfig, TreeHeights};
pub use contract_db::{ContractBackend, HintingContractDb, InMemoryContractDb};
pub use error::StateError;
pub use hinting::HintingMerkleDb;
pub use merkle_db::{CheckpointListener, PureMerkleDb, TxSideEffects};
pub use protocol_contracts::{ProtocolContractRegistry, ProtocolContractWitness};
pub use replay::{HintedContractDb, HintedMerkleDb};
pub use simulation::{ContractStack, MerkleStack, SimulationState};
pub use types::{
    AffinePoint, AppendLeafResult, AztecAddress, ContractClass, ContractClassId,
    ContractDeploymentData, ContractInstance, FunctionSelector, MerkleTreeId, ProtocolContracts,
    PublicKeys, TreeCounters, TreeSnapshots, TreeState, TreeStates, is_protocol_contract_address,
};
pub use world_state::InMemoryWorldState;
