//! Per-simulation state
//!
//! [`SimulationState`] owns everything one transaction simulation touches:
//! the semantic database over the world state trees, the contract database
//! and the protocol contract registry. When hint collection is on, both
//! databases are wrapped by their hint recorders.

use avm_merkle::{
    Fr, IndexedLeaf, Keccak256Hasher, LeafIndex, LowLeafResponse, NullifierLeafValue,
    PublicDataLeafValue, SequentialInsertionResult, SiblingPath, TreeHasher,
};

use crate::{
    AppendLeafResult, AztecAddress, ContractBackend, ContractClass, ContractClassId,
    ContractDeploymentData, ContractInstance, FunctionSelector, HintingContractDb,
    HintingMerkleDb, InMemoryContractDb, InMemoryWorldState, MerkleBackend, MerkleTreeId,
    ProtocolContractRegistry, ProtocolContracts, PureMerkleDb, SimulatorConfig, StateError,
    TreeSnapshots, TreeStates, hints::ExecutionHints,
};

macro_rules! dispatch {
    ($self:ident, $db:ident => $call:expr) => {
        match $self {
            Self::Direct($db) => $call,
            Self::Hinting($db) => $call,
        }
    };
}

/// Live world state, optionally wrapped by the hint recorder.
#[derive(Debug)]
pub enum MerkleStack<H = Keccak256Hasher> {
    /// No hints are recorded.
    Direct(InMemoryWorldState<H>),
    /// Every call is recorded.
    Hinting(HintingMerkleDb<InMemoryWorldState<H>>),
}

impl<H: TreeHasher> MerkleBackend for MerkleStack<H> {
    fn get_tree_roots(&self) -> TreeSnapshots {
        dispatch!(self, db => db.get_tree_roots())
    }

    fn get_sibling_path(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<SiblingPath, StateError> {
        dispatch!(self, db => db.get_sibling_path(tree_id, index))
    }

    fn get_low_indexed_leaf(
        &mut self,
        tree_id: MerkleTreeId,
        key: Fr,
    ) -> Result<LowLeafResponse, StateError> {
        dispatch!(self, db => db.get_low_indexed_leaf(tree_id, key))
    }

    fn get_leaf_value(
        &mut self,
        tree_id: MerkleTreeId,
        index: LeafIndex,
    ) -> Result<Fr, StateError> {
        dispatch!(self, db => db.get_leaf_value(tree_id, index))
    }

    fn get_leaf_preimage_public_data_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<PublicDataLeafValue>, StateError> {
        dispatch!(self, db => db.get_leaf_preimage_public_data_tree(index))
    }

    fn get_leaf_preimage_nullifier_tree(
        &mut self,
        index: LeafIndex,
    ) -> Result<IndexedLeaf<NullifierLeafValue>, StateError> {
        dispatch!(self, db => db.get_leaf_preimage_nullifier_tree(index))
    }

    fn insert_indexed_leaf_public_data_tree(
        &mut self,
        leaf: PublicDataLeafValue,
    ) -> Result<SequentialInsertionResult<PublicDataLeafValue>, StateError> {
        dispatch!(self, db => db.insert_indexed_leaf_public_data_tree(leaf))
    }

    fn insert_indexed_leaf_nullifier_tree(
        &mut self,
        leaf: NullifierLeafValue,
    ) -> Result<SequentialInsertionResult<NullifierLeafValue>, StateError> {
        dispatch!(self, db => db.insert_indexed_leaf_nullifier_tree(leaf))
    }

    fn append_leaves(
        &mut self,
        tree_id: MerkleTreeId,
        leaves: &[Fr],
    ) -> Result<Vec<AppendLeafResult>, StateError> {
        dispatch!(self, db => db.append_leaves(tree_id, leaves))
    }

    fn pad_tree(&mut self, tree_id: MerkleTreeId, count: u64) -> Result<(), StateError> {
        dispatch!(self, db => db.pad_tree(tree_id, count))
    }

    fn create_checkpoint(&mut self) -> Result<(), StateError> {
        dispatch!(self, db => db.create_checkpoint())
    }

    fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        dispatch!(self, db => db.commit_checkpoint())
    }

    fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        dispatch!(self, db => db.revert_checkpoint())
    }

    fn get_checkpoint_id(&self) -> u32 {
        dispatch!(self, db => db.get_checkpoint_id())
    }
}

/// Live contract store, optionally wrapped by the hint recorder.
#[derive(Debug)]
pub enum ContractStack<H = Keccak256Hasher> {
    /// No hints are recorded.
    Direct(InMemoryContractDb<H>),
    /// Found contracts are recorded.
    Hinting(HintingContractDb<InMemoryContractDb<H>>),
}

impl<H: TreeHasher> ContractBackend for ContractStack<H> {
    fn get_contract_instance(&mut self, address: AztecAddress) -> Option<ContractInstance> {
        dispatch!(self, db => db.get_contract_instance(address))
    }

    fn get_contract_class(&mut self, class_id: ContractClassId) -> Option<ContractClass> {
        dispatch!(self, db => db.get_contract_class(class_id))
    }

    fn get_bytecode_commitment(&mut self, class_id: ContractClassId) -> Option<Fr> {
        dispatch!(self, db => db.get_bytecode_commitment(class_id))
    }

    fn get_debug_function_name(
        &mut self,
        address: AztecAddress,
        selector: FunctionSelector,
    ) -> Option<String> {
        dispatch!(self, db => db.get_debug_function_name(address, selector))
    }

    fn add_contracts(&mut self, data: &ContractDeploymentData) {
        dispatch!(self, db => db.add_contracts(data))
    }

    fn create_checkpoint(&mut self) -> Result<(), StateError> {
        dispatch!(self, db => db.create_checkpoint())
    }

    fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        dispatch!(self, db => db.commit_checkpoint())
    }

    fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        dispatch!(self, db => db.revert_checkpoint())
    }

    fn get_checkpoint_id(&self) -> u32 {
        dispatch!(self, db => db.get_checkpoint_id())
    }
}

/// State owned by one transaction simulation.
#[derive(Debug)]
pub struct SimulationState<H = Keccak256Hasher> {
    merkle_db: PureMerkleDb<MerkleStack<H>, H>,
    contract_db: ContractStack<H>,
    protocol_contracts: ProtocolContractRegistry<H>,
}

impl<H: TreeHasher> SimulationState<H> {
    /// Compose the state stack for one simulation.
    ///
    /// `world_state` and `contracts` hold the state the transaction starts
    /// from. With `config.collect_hints` both are wrapped by hint recorders
    /// and the current roots become the starting roots.
    pub fn new(
        config: &SimulatorConfig,
        world_state: InMemoryWorldState<H>,
        contracts: InMemoryContractDb<H>,
        protocol_contracts: ProtocolContracts,
        first_nullifier: Fr,
    ) -> Self {
        let (merkle_stack, contract_db) = if config.collect_hints {
            (
                MerkleStack::Hinting(HintingMerkleDb::new(world_state)),
                ContractStack::Hinting(HintingContractDb::new(contracts)),
            )
        } else {
            (MerkleStack::Direct(world_state), ContractStack::Direct(contracts))
        };

        tracing::info!(
            target: "avm_state::merkle",
            collect_hints = config.collect_hints,
            first_nullifier = %first_nullifier,
            "Created simulation state"
        );

        Self {
            merkle_db: PureMerkleDb::new(merkle_stack, first_nullifier, config),
            contract_db,
            protocol_contracts: ProtocolContractRegistry::new(
                protocol_contracts,
                config.protocol_contract_tree_height,
            ),
        }
    }

    /// Semantic database over the world state trees.
    pub const fn merkle_db(&mut self) -> &mut PureMerkleDb<MerkleStack<H>, H> {
        &mut self.merkle_db
    }

    /// Contract database.
    pub const fn contract_db(&mut self) -> &mut ContractStack<H> {
        &mut self.contract_db
    }

    /// Protocol contract registry.
    pub const fn protocol_contracts(&mut self) -> &mut ProtocolContractRegistry<H> {
        &mut self.protocol_contracts
    }

    /// Tree snapshots and side-effect counters.
    pub fn get_tree_state(&self) -> TreeStates {
        self.merkle_db.get_tree_state()
    }

    /// Open a checkpoint on both databases.
    pub fn create_checkpoint(&mut self) -> Result<(), StateError> {
        self.merkle_db.create_checkpoint()?;
        self.contract_db.create_checkpoint()
    }

    /// Commit the innermost checkpoint on both databases.
    pub fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        self.merkle_db.commit_checkpoint()?;
        self.contract_db.commit_checkpoint()
    }

    /// Revert the innermost checkpoint on both databases.
    ///
    /// The protocol contract registry is not affected.
    pub fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        self.merkle_db.revert_checkpoint()?;
        self.contract_db.revert_checkpoint()
    }

    /// Id of the innermost open checkpoint.
    pub fn get_checkpoint_id(&self) -> u32 {
        self.merkle_db.get_checkpoint_id()
    }

    /// Everything recorded so far, or `None` when hints are not collected.
    pub fn dump_hints(&self) -> Option<ExecutionHints> {
        let (MerkleStack::Hinting(merkle), ContractStack::Hinting(contracts)) =
            (self.merkle_db.backend(), &self.contract_db)
        else {
            return None;
        };

        let mut hints = ExecutionHints {
            protocol_contracts: self.protocol_contracts.contracts().clone(),
            ..ExecutionHints::default()
        };
        contracts.dump_hints(&mut hints);
        merkle.dump_hints(&mut hints);
        Some(hints)
    }
}
