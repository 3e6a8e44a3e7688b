//! Contract instance and class lookups
//!
//! Contracts published during a transaction become visible to later calls
//! and disappear again when the checkpoint they were added in is reverted.
//! Debug function names are diagnostics only and are not checkpointed.

use std::{collections::BTreeMap, marker::PhantomData};

use avm_merkle::{Fr, Keccak256Hasher, TreeHasher, short_hex};

use crate::{
    AztecAddress, CheckpointStack, ContractClass, ContractClassId, ContractDeploymentData,
    ContractInstance, FunctionSelector, StateError,
    crypto::compute_public_bytecode_commitment,
    hints::{
        BytecodeCommitmentHint, CheckpointActionNoStateChangeHint, ContractClassHint,
        ContractInstanceHint, DebugFunctionNameHint, ExecutionHints,
    },
};

/// Source of contract data.
///
/// Lookups return `None` for unknown contracts. They take `&mut self`
/// because wrappers record them.
pub trait ContractBackend {
    /// Instance deployed at `address`.
    fn get_contract_instance(&mut self, address: AztecAddress) -> Option<ContractInstance>;

    /// Class registered under `class_id`.
    fn get_contract_class(&mut self, class_id: ContractClassId) -> Option<ContractClass>;

    /// Commitment to the public bytecode of `class_id`.
    fn get_bytecode_commitment(&mut self, class_id: ContractClassId) -> Option<Fr>;

    /// Name of the function `selector` in the contract at `address`.
    fn get_debug_function_name(
        &mut self,
        address: AztecAddress,
        selector: FunctionSelector,
    ) -> Option<String>;

    /// Register contracts published by the transaction.
    fn add_contracts(&mut self, data: &ContractDeploymentData);

    /// Open a checkpoint.
    fn create_checkpoint(&mut self) -> Result<(), StateError>;

    /// Close the innermost checkpoint keeping added contracts.
    fn commit_checkpoint(&mut self) -> Result<(), StateError>;

    /// Close the innermost checkpoint forgetting contracts added inside it.
    fn revert_checkpoint(&mut self) -> Result<(), StateError>;

    /// Id of the innermost open checkpoint.
    fn get_checkpoint_id(&self) -> u32;
}

#[derive(Clone, Debug, Default)]
struct ContractStore {
    instances: BTreeMap<AztecAddress, ContractInstance>,
    classes: BTreeMap<ContractClassId, ContractClass>,
    bytecode_commitments: BTreeMap<ContractClassId, Fr>,
}

/// In-memory contract store.
#[derive(Clone, Debug)]
pub struct InMemoryContractDb<H = Keccak256Hasher> {
    store: CheckpointStack<ContractStore>,
    debug_function_names: BTreeMap<(AztecAddress, FunctionSelector), String>,
    _hasher: PhantomData<H>,
}

impl<H: TreeHasher> InMemoryContractDb<H> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            store: CheckpointStack::default(),
            debug_function_names: BTreeMap::new(),
            _hasher: PhantomData,
        }
    }

    /// Create a store pre-populated with already deployed contracts.
    pub fn with_contracts(data: &ContractDeploymentData) -> Self {
        let mut db = Self::new();
        db.add_contracts(data);
        db
    }

    /// Attach a debug name to a function.
    pub fn add_debug_function_name(
        &mut self,
        address: AztecAddress,
        selector: FunctionSelector,
        name: impl Into<String>,
    ) {
        self.debug_function_names.insert((address, selector), name.into());
    }
}

impl<H: TreeHasher> Default for InMemoryContractDb<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: TreeHasher> ContractBackend for InMemoryContractDb<H> {
    fn get_contract_instance(&mut self, address: AztecAddress) -> Option<ContractInstance> {
        self.store.current().instances.get(&address).cloned()
    }

    fn get_contract_class(&mut self, class_id: ContractClassId) -> Option<ContractClass> {
        self.store.current().classes.get(&class_id).cloned()
    }

    fn get_bytecode_commitment(&mut self, class_id: ContractClassId) -> Option<Fr> {
        self.store.current().bytecode_commitments.get(&class_id).copied()
    }

    fn get_debug_function_name(
        &mut self,
        address: AztecAddress,
        selector: FunctionSelector,
    ) -> Option<String> {
        self.debug_function_names.get(&(address, selector)).cloned()
    }

    fn add_contracts(&mut self, data: &ContractDeploymentData) {
        let store = self.store.current_mut();
        for (class_id, class) in &data.classes {
            let commitment = compute_public_bytecode_commitment::<H>(&class.packed_bytecode);
            store.bytecode_commitments.insert(*class_id, commitment);
            store.classes.insert(*class_id, class.clone());
        }
        for (address, instance) in &data.instances {
            store.instances.insert(*address, instance.clone());
        }
        tracing::debug!(
            target: "avm_state::contracts",
            classes = data.classes.len(),
            instances = data.instances.len(),
            "Added contracts"
        );
    }

    fn create_checkpoint(&mut self) -> Result<(), StateError> {
        self.store.create();
        Ok(())
    }

    fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        self.store.commit().map(|_| ())
    }

    fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        self.store.revert().map(|_| ())
    }

    fn get_checkpoint_id(&self) -> u32 {
        self.store.checkpoint_id()
    }
}

#[derive(Clone, Debug, Default)]
struct ContractHints {
    instances: BTreeMap<(u32, AztecAddress), ContractInstanceHint>,
    classes: BTreeMap<(u32, ContractClassId), ContractClassHint>,
    bytecode_commitments: BTreeMap<(u32, ContractClassId), BytecodeCommitmentHint>,
    debug_function_names: BTreeMap<(AztecAddress, FunctionSelector), DebugFunctionNameHint>,
    create_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    commit_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
    revert_checkpoints: BTreeMap<u32, CheckpointActionNoStateChangeHint>,
}

/// Contract backend wrapper that records found contracts as hints.
///
/// Lookups are keyed by the checkpoint action counter, since the same
/// address can resolve differently on either side of a revert.
#[derive(Debug)]
pub struct HintingContractDb<C> {
    backend: C,
    hints: ContractHints,
    checkpoint_action_counter: u32,
}

impl<C: ContractBackend> HintingContractDb<C> {
    /// Wrap `backend`.
    pub fn new(backend: C) -> Self {
        Self { backend, hints: ContractHints::default(), checkpoint_action_counter: 0 }
    }

    /// Wrapped backend.
    pub const fn backend(&self) -> &C {
        &self.backend
    }

    /// Copy every recorded hint into `hints`, in key order.
    pub fn dump_hints(&self, hints: &mut ExecutionHints) {
        let recorded = &self.hints;
        hints.contract_instances.extend(recorded.instances.values().cloned());
        hints.contract_classes.extend(recorded.classes.values().cloned());
        hints.bytecode_commitments.extend(recorded.bytecode_commitments.values().cloned());
        hints.debug_function_names.extend(recorded.debug_function_names.values().cloned());
        hints
            .contract_db_create_checkpoint_hints
            .extend(recorded.create_checkpoints.values().copied());
        hints
            .contract_db_commit_checkpoint_hints
            .extend(recorded.commit_checkpoints.values().copied());
        hints
            .contract_db_revert_checkpoint_hints
            .extend(recorded.revert_checkpoints.values().copied());

        tracing::info!(
            target: "avm_state::hints",
            instances = recorded.instances.len(),
            classes = recorded.classes.len(),
            commitments = recorded.bytecode_commitments.len(),
            "Dumped contract hints"
        );
    }

    fn record_checkpoint_action(
        &mut self,
        old_checkpoint_id: u32,
    ) -> CheckpointActionNoStateChangeHint {
        let hint = CheckpointActionNoStateChangeHint {
            action_counter: self.checkpoint_action_counter,
            old_checkpoint_id,
            new_checkpoint_id: self.backend.get_checkpoint_id(),
        };
        self.checkpoint_action_counter += 1;
        hint
    }
}

impl<C: ContractBackend> ContractBackend for HintingContractDb<C> {
    fn get_contract_instance(&mut self, address: AztecAddress) -> Option<ContractInstance> {
        let instance = self.backend.get_contract_instance(address)?;
        let hint_key = self.checkpoint_action_counter;
        self.hints.instances.insert(
            (hint_key, address),
            ContractInstanceHint { hint_key, address, contract_instance: instance.clone() },
        );
        Some(instance)
    }

    fn get_contract_class(&mut self, class_id: ContractClassId) -> Option<ContractClass> {
        let class = self.backend.get_contract_class(class_id)?;
        let hint_key = self.checkpoint_action_counter;
        self.hints.classes.insert(
            (hint_key, class_id),
            ContractClassHint { hint_key, class_id, contract_class: class.clone() },
        );
        Some(class)
    }

    fn get_bytecode_commitment(&mut self, class_id: ContractClassId) -> Option<Fr> {
        let commitment = self.backend.get_bytecode_commitment(class_id)?;
        let hint_key = self.checkpoint_action_counter;
        self.hints.bytecode_commitments.insert(
            (hint_key, class_id),
            BytecodeCommitmentHint { hint_key, class_id, commitment },
        );
        Some(commitment)
    }

    fn get_debug_function_name(
        &mut self,
        address: AztecAddress,
        selector: FunctionSelector,
    ) -> Option<String> {
        let name = self.backend.get_debug_function_name(address, selector)?;
        self.hints.debug_function_names.insert(
            (address, selector),
            DebugFunctionNameHint { address, selector, name: name.clone() },
        );
        Some(name)
    }

    fn add_contracts(&mut self, data: &ContractDeploymentData) {
        self.backend.add_contracts(data);
    }

    fn create_checkpoint(&mut self) -> Result<(), StateError> {
        let old_checkpoint_id = self.backend.get_checkpoint_id();
        self.backend.create_checkpoint()?;
        let hint = self.record_checkpoint_action(old_checkpoint_id);
        self.hints.create_checkpoints.insert(hint.action_counter, hint);
        Ok(())
    }

    fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        let old_checkpoint_id = self.backend.get_checkpoint_id();
        self.backend.commit_checkpoint()?;
        let hint = self.record_checkpoint_action(old_checkpoint_id);
        self.hints.commit_checkpoints.insert(hint.action_counter, hint);
        Ok(())
    }

    fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        let old_checkpoint_id = self.backend.get_checkpoint_id();
        self.backend.revert_checkpoint()?;
        let hint = self.record_checkpoint_action(old_checkpoint_id);
        self.hints.revert_checkpoints.insert(hint.action_counter, hint);
        tracing::debug!(
            target: "avm_state::contracts",
            action_counter = hint.action_counter,
            checkpoint = hint.new_checkpoint_id,
            "Reverted contract db checkpoint"
        );
        Ok(())
    }

    fn get_checkpoint_id(&self) -> u32 {
        self.backend.get_checkpoint_id()
    }
}

/// Render a contract lookup key for log lines.
pub(crate) fn contract_key(action_counter: u32, id: &Fr) -> String {
    format!("{action_counter}, {}", short_hex(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(address: u64, class_id: u64, bytecode: &[u8]) -> ContractDeploymentData {
        ContractDeploymentData {
            classes: vec![(
                Fr::from(class_id),
                ContractClass { packed_bytecode: bytecode.to_vec(), ..Default::default() },
            )],
            instances: vec![(
                Fr::from(address),
                ContractInstance {
                    current_contract_class_id: Fr::from(class_id),
                    original_contract_class_id: Fr::from(class_id),
                    ..Default::default()
                },
            )],
        }
    }

    #[test]
    fn test_added_contracts_are_served() {
        let mut db = InMemoryContractDb::<Keccak256Hasher>::new();
        assert_eq!(db.get_contract_instance(Fr::from(1u64)), None);

        db.add_contracts(&deployment(1, 100, &[1, 2, 3]));
        let instance = db.get_contract_instance(Fr::from(1u64)).unwrap();
        assert_eq!(instance.current_contract_class_id, Fr::from(100u64));
        assert_eq!(
            db.get_bytecode_commitment(Fr::from(100u64)),
            Some(compute_public_bytecode_commitment::<Keccak256Hasher>(&[1, 2, 3]))
        );
    }

    #[test]
    fn test_revert_forgets_contracts() {
        let mut db = InMemoryContractDb::<Keccak256Hasher>::with_contracts(&deployment(1, 100, &[]));
        db.create_checkpoint().unwrap();
        db.add_contracts(&deployment(2, 200, &[9]));
        assert!(db.get_contract_class(Fr::from(200u64)).is_some());

        db.revert_checkpoint().unwrap();
        assert!(db.get_contract_class(Fr::from(200u64)).is_none());
        assert!(db.get_contract_instance(Fr::from(2u64)).is_none());
        assert!(db.get_contract_instance(Fr::from(1u64)).is_some());
        assert!(db.commit_checkpoint().unwrap_err().is_fatal());
    }

    #[test]
    fn test_hints_only_for_found_contracts() {
        let mut inner = InMemoryContractDb::<Keccak256Hasher>::with_contracts(&deployment(1, 100, &[7]));
        inner.add_debug_function_name(Fr::from(1u64), Fr::from(0xaau64), "mint");
        let mut db = HintingContractDb::new(inner);

        assert!(db.get_contract_instance(Fr::from(1u64)).is_some());
        assert!(db.get_contract_instance(Fr::from(5u64)).is_none());
        db.create_checkpoint().unwrap();
        // Same address after a checkpoint action is a new key.
        assert!(db.get_contract_instance(Fr::from(1u64)).is_some());
        assert!(db.get_bytecode_commitment(Fr::from(100u64)).is_some());
        assert_eq!(db.get_debug_function_name(Fr::from(1u64), Fr::from(0xaau64)).as_deref(), Some("mint"));
        assert!(db.get_debug_function_name(Fr::from(1u64), Fr::from(0xbbu64)).is_none());
        db.revert_checkpoint().unwrap();

        let mut hints = ExecutionHints::default();
        db.dump_hints(&mut hints);
        let keys: Vec<u32> = hints.contract_instances.iter().map(|h| h.hint_key).collect();
        assert_eq!(keys, vec![0, 1]);
        assert_eq!(hints.bytecode_commitments.len(), 1);
        assert_eq!(hints.debug_function_names.len(), 1);
        assert_eq!(
            hints.contract_db_revert_checkpoint_hints,
            vec![CheckpointActionNoStateChangeHint {
                action_counter: 1,
                old_checkpoint_id: 1,
                new_checkpoint_id: 0
            }]
        );
    }
}
