//! Domain operations over the world state trees
//!
//! [`PureMerkleDb`] turns storage, nullifier, note hash and message
//! operations into sequential insertions and appends on a raw backend. Keys
//! are siloed to the emitting contract before they reach a tree, and note
//! hashes are salted with the transaction's first nullifier and a running
//! counter.
//!
//! Side-effect counters and the set of written storage slots live beside the
//! trees and follow the same checkpoints.

use std::{collections::BTreeSet, fmt::Debug, marker::PhantomData};

use avm_merkle::{Fr, Keccak256Hasher, LeafIndex, NullifierLeafValue, PublicDataLeafValue, TreeHasher, short_hex};

use crate::{
    AztecAddress, CheckpointStack, MerkleBackend, MerkleTreeId, SimulatorConfig, StateError,
    TreeCounters, TreeState, TreeStates,
    crypto::{compute_leaf_slot, make_unique_note_hash, silo_note_hash, silo_nullifier},
};

/// Notified after every checkpoint transition of a [`PureMerkleDb`].
pub trait CheckpointListener: Debug {
    /// A checkpoint was opened.
    fn on_checkpoint_created(&mut self);

    /// The innermost checkpoint was committed.
    fn on_checkpoint_committed(&mut self);

    /// The innermost checkpoint was reverted.
    fn on_checkpoint_reverted(&mut self);
}

/// Transaction state tracked beside the trees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxSideEffects {
    /// Side-effect counters.
    pub counters: TreeCounters,
    /// (contract, slot) pairs written by user code.
    pub written_public_data_slots: BTreeSet<(AztecAddress, Fr)>,
    /// Number of distinct entries in `written_public_data_slots`.
    pub written_slot_count: u32,
}

/// Semantic database over a raw tree backend.
#[derive(Debug)]
pub struct PureMerkleDb<B, H = Keccak256Hasher> {
    backend: B,
    first_nullifier: Fr,
    max_note_hashes_per_tx: u32,
    max_nullifiers_per_tx: u32,
    side_effects: CheckpointStack<TxSideEffects>,
    checkpoint_listeners: Vec<Box<dyn CheckpointListener>>,
    _hasher: PhantomData<H>,
}

impl<B: MerkleBackend, H: TreeHasher> PureMerkleDb<B, H> {
    /// Wrap `backend` for a transaction whose first nullifier is `first_nullifier`.
    pub fn new(backend: B, first_nullifier: Fr, config: &SimulatorConfig) -> Self {
        Self {
            backend,
            first_nullifier,
            max_note_hashes_per_tx: config.max_note_hashes_per_tx,
            max_nullifiers_per_tx: config.max_nullifiers_per_tx,
            side_effects: CheckpointStack::default(),
            checkpoint_listeners: Vec::new(),
            _hasher: PhantomData,
        }
    }

    /// Underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Consume the database, returning the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Current side-effect counters.
    pub const fn counters(&self) -> TreeCounters {
        self.side_effects.current().counters
    }

    /// Register a listener for checkpoint transitions.
    pub fn add_checkpoint_listener(&mut self, listener: Box<dyn CheckpointListener>) {
        self.checkpoint_listeners.push(listener);
    }

    /// Every tree snapshot paired with the counter of side effects against it.
    pub fn get_tree_state(&self) -> TreeStates {
        let roots = self.backend.get_tree_roots();
        let side_effects = self.side_effects.current();
        let counters = side_effects.counters;

        TreeStates {
            note_hash_tree: TreeState { tree: roots.note_hash_tree, counter: counters.note_hash_counter },
            nullifier_tree: TreeState { tree: roots.nullifier_tree, counter: counters.nullifier_counter },
            l1_to_l2_message_tree: TreeState {
                tree: roots.l1_to_l2_message_tree,
                counter: counters.l2_to_l1_msg_counter,
            },
            public_data_tree: TreeState {
                tree: roots.public_data_tree,
                counter: side_effects.written_slot_count,
            },
        }
    }

    /// Value of `slot` in `contract`'s storage, zero if never written.
    pub fn storage_read(&mut self, contract: AztecAddress, slot: Fr) -> Result<Fr, StateError> {
        let leaf_slot = compute_leaf_slot::<H>(contract, slot);
        let low_leaf = self.backend.get_low_indexed_leaf(MerkleTreeId::PublicDataTree, leaf_slot)?;
        if !low_leaf.is_already_present {
            return Ok(Fr::ZERO);
        }
        let preimage = self.backend.get_leaf_preimage_public_data_tree(low_leaf.index)?;
        Ok(preimage.leaf.value)
    }

    /// Write `value` to `slot` in `contract`'s storage.
    ///
    /// Protocol writes are not tracked as written slots.
    pub fn storage_write(
        &mut self,
        contract: AztecAddress,
        slot: Fr,
        value: Fr,
        is_protocol_write: bool,
    ) -> Result<(), StateError> {
        let leaf_slot = compute_leaf_slot::<H>(contract, slot);
        self.backend.insert_indexed_leaf_public_data_tree(PublicDataLeafValue::new(leaf_slot, value))?;
        if !is_protocol_write {
            let side_effects = self.side_effects.current_mut();
            if side_effects.written_public_data_slots.insert((contract, slot)) {
                side_effects.written_slot_count += 1;
            }
        }
        Ok(())
    }

    /// Whether user code wrote `slot` of `contract` in this transaction.
    pub fn was_storage_written(&self, contract: AztecAddress, slot: Fr) -> bool {
        self.side_effects.current().written_public_data_slots.contains(&(contract, slot))
    }

    /// Whether `nullifier`, siloed to `contract`, is in the nullifier tree.
    pub fn nullifier_exists(&mut self, contract: AztecAddress, nullifier: Fr) -> Result<bool, StateError> {
        self.siloed_nullifier_exists(silo_nullifier::<H>(contract, nullifier))
    }

    /// Whether an already siloed nullifier is in the nullifier tree.
    pub fn siloed_nullifier_exists(&mut self, siloed_nullifier: Fr) -> Result<bool, StateError> {
        let low_leaf = self.backend.get_low_indexed_leaf(MerkleTreeId::NullifierTree, siloed_nullifier)?;
        Ok(low_leaf.is_already_present)
    }

    /// Silo `nullifier` to `contract` and insert it.
    ///
    /// Fails with [`StateError::NullifierCollision`] if it already exists,
    /// leaving the tree and counters as they were.
    pub fn nullifier_write(&mut self, contract: AztecAddress, nullifier: Fr) -> Result<(), StateError> {
        self.write_nullifier(nullifier, silo_nullifier::<H>(contract, nullifier))
    }

    /// Insert an already siloed nullifier.
    pub fn siloed_nullifier_write(&mut self, siloed_nullifier: Fr) -> Result<(), StateError> {
        self.write_nullifier(siloed_nullifier, siloed_nullifier)
    }

    fn write_nullifier(&mut self, nullifier: Fr, siloed_nullifier: Fr) -> Result<(), StateError> {
        let low_leaf = self.backend.get_low_indexed_leaf(MerkleTreeId::NullifierTree, siloed_nullifier)?;
        if low_leaf.is_already_present {
            tracing::warn!(
                target: "avm_state::merkle",
                nullifier = %short_hex(&nullifier),
                siloed = %short_hex(&siloed_nullifier),
                "Nullifier collision"
            );
            return Err(StateError::NullifierCollision { nullifier, siloed_nullifier });
        }

        self.backend.insert_indexed_leaf_nullifier_tree(NullifierLeafValue::new(siloed_nullifier))?;
        self.side_effects.current_mut().counters.nullifier_counter += 1;
        Ok(())
    }

    /// Whether the note hash tree holds `unique_note_hash` at `leaf_index`.
    pub fn note_hash_exists(&mut self, leaf_index: LeafIndex, unique_note_hash: Fr) -> Result<bool, StateError> {
        self.leaf_equals(MerkleTreeId::NoteHashTree, leaf_index, unique_note_hash)
    }

    /// Silo `note_hash` to `contract`, make it unique and append it.
    pub fn note_hash_write(&mut self, contract: AztecAddress, note_hash: Fr) -> Result<(), StateError> {
        self.siloed_note_hash_write(silo_note_hash::<H>(contract, note_hash))
    }

    /// Make an already siloed note hash unique and append it.
    pub fn siloed_note_hash_write(&mut self, siloed_note_hash: Fr) -> Result<(), StateError> {
        let counter = self.side_effects.current().counters.note_hash_counter;
        let unique_note_hash = make_unique_note_hash::<H>(siloed_note_hash, self.first_nullifier, counter);
        self.unique_note_hash_write(unique_note_hash)
    }

    /// Append an already unique note hash.
    pub fn unique_note_hash_write(&mut self, unique_note_hash: Fr) -> Result<(), StateError> {
        self.backend.append_leaves(MerkleTreeId::NoteHashTree, &[unique_note_hash])?;
        self.side_effects.current_mut().counters.note_hash_counter += 1;
        Ok(())
    }

    /// Whether the L1 to L2 message tree holds `msg_hash` at `leaf_index`.
    pub fn l1_to_l2_msg_exists(&mut self, leaf_index: LeafIndex, msg_hash: Fr) -> Result<bool, StateError> {
        self.leaf_equals(MerkleTreeId::L1ToL2MessageTree, leaf_index, msg_hash)
    }

    /// An index past the tree size holds nothing and needs no lookup.
    fn leaf_equals(&mut self, tree_id: MerkleTreeId, leaf_index: LeafIndex, expected: Fr) -> Result<bool, StateError> {
        if leaf_index >= self.backend.get_tree_roots().get(tree_id)?.next_available_leaf_index {
            return Ok(false);
        }
        Ok(self.backend.get_leaf_value(tree_id, leaf_index)? == expected)
    }

    /// Pad the note hash and nullifier trees to their per-transaction maximum.
    ///
    /// The public data tree is not padded.
    pub fn pad_trees(&mut self) -> Result<(), StateError> {
        let counters = self.counters();
        let note_hashes = self.max_note_hashes_per_tx.saturating_sub(counters.note_hash_counter);
        let nullifiers = self.max_nullifiers_per_tx.saturating_sub(counters.nullifier_counter);
        self.backend.pad_tree(MerkleTreeId::NoteHashTree, u64::from(note_hashes))?;
        self.backend.pad_tree(MerkleTreeId::NullifierTree, u64::from(nullifiers))?;
        tracing::debug!(target: "avm_state::merkle", note_hashes, nullifiers, "Padded trees");
        Ok(())
    }

    /// Open a checkpoint over the trees, counters and written slots.
    pub fn create_checkpoint(&mut self) -> Result<(), StateError> {
        self.backend.create_checkpoint()?;
        self.side_effects.create();
        tracing::debug!(
            target: "avm_state::checkpoint",
            checkpoint = self.backend.get_checkpoint_id(),
            "Created checkpoint"
        );
        for listener in &mut self.checkpoint_listeners {
            listener.on_checkpoint_created();
        }
        Ok(())
    }

    /// Commit the innermost checkpoint.
    pub fn commit_checkpoint(&mut self) -> Result<(), StateError> {
        self.side_effects.ensure_open("commit_checkpoint")?;
        let committed = self.backend.get_checkpoint_id();
        self.backend.commit_checkpoint()?;
        self.side_effects.commit()?;
        tracing::debug!(
            target: "avm_state::checkpoint",
            committed,
            checkpoint = self.backend.get_checkpoint_id(),
            "Committed checkpoint"
        );
        for listener in &mut self.checkpoint_listeners {
            listener.on_checkpoint_committed();
        }
        Ok(())
    }

    /// Revert the innermost checkpoint, restoring trees, counters and written slots.
    pub fn revert_checkpoint(&mut self) -> Result<(), StateError> {
        self.side_effects.ensure_open("revert_checkpoint")?;
        let reverted = self.backend.get_checkpoint_id();
        self.backend.revert_checkpoint()?;
        self.side_effects.revert()?;
        tracing::debug!(
            target: "avm_state::checkpoint",
            reverted,
            checkpoint = self.backend.get_checkpoint_id(),
            "Reverted checkpoint"
        );
        for listener in &mut self.checkpoint_listeners {
            listener.on_checkpoint_reverted();
        }
        Ok(())
    }

    /// Id of the innermost open checkpoint.
    pub fn get_checkpoint_id(&self) -> u32 {
        self.backend.get_checkpoint_id()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{InMemoryWorldState, TreeHeights};

    type Db = PureMerkleDb<InMemoryWorldState, Keccak256Hasher>;

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            max_note_hashes_per_tx: 4,
            max_nullifiers_per_tx: 4,
            tree_heights: TreeHeights { nullifier: 6, note_hash: 6, public_data: 6, l1_to_l2_message: 6 },
            ..SimulatorConfig::default()
        }
    }

    fn db() -> Db {
        let config = config();
        PureMerkleDb::new(InMemoryWorldState::new(&config.tree_heights).unwrap(), Fr::from(1000u64), &config)
    }

    #[derive(Debug, Default)]
    struct Recorder(Rc<RefCell<Vec<&'static str>>>);

    impl CheckpointListener for Recorder {
        fn on_checkpoint_created(&mut self) {
            self.0.borrow_mut().push("created");
        }

        fn on_checkpoint_committed(&mut self) {
            self.0.borrow_mut().push("committed");
        }

        fn on_checkpoint_reverted(&mut self) {
            self.0.borrow_mut().push("reverted");
        }
    }

    #[test]
    fn test_storage_roundtrip_and_written_slots() {
        let mut db = db();
        let (contract, slot) = (Fr::from(7u64), Fr::from(1u64));
        assert_eq!(db.storage_read(contract, slot).unwrap(), Fr::ZERO);

        db.storage_write(contract, slot, Fr::from(42u64), false).unwrap();
        db.storage_write(contract, Fr::from(2u64), Fr::from(43u64), true).unwrap();
        assert_eq!(db.storage_read(contract, slot).unwrap(), Fr::from(42u64));
        assert_eq!(db.storage_read(Fr::from(8u64), slot).unwrap(), Fr::ZERO);
        assert!(db.was_storage_written(contract, slot));
        assert!(!db.was_storage_written(contract, Fr::from(2u64)));
        assert_eq!(db.get_tree_state().public_data_tree.counter, 1);

        db.storage_write(contract, slot, Fr::from(44u64), false).unwrap();
        assert_eq!(db.storage_read(contract, slot).unwrap(), Fr::from(44u64));
    }

    #[test]
    fn test_written_slot_count_follows_checkpoints() {
        let mut db = db();
        let contract = Fr::from(7u64);
        let written = |db: &Db| db.get_tree_state().public_data_tree.counter;

        db.storage_write(contract, Fr::from(1u64), Fr::from(1u64), false).unwrap();
        db.storage_write(contract, Fr::from(1u64), Fr::from(2u64), false).unwrap();
        assert_eq!(written(&db), 1);

        db.create_checkpoint().unwrap();
        db.storage_write(contract, Fr::from(2u64), Fr::from(3u64), false).unwrap();
        db.storage_write(contract, Fr::from(1u64), Fr::from(4u64), false).unwrap();
        assert_eq!(written(&db), 2);
        db.revert_checkpoint().unwrap();
        assert_eq!(written(&db), 1);

        db.create_checkpoint().unwrap();
        db.storage_write(contract, Fr::from(3u64), Fr::from(5u64), false).unwrap();
        db.commit_checkpoint().unwrap();
        assert_eq!(written(&db), 2);
        assert_eq!(db.side_effects.current().written_public_data_slots.len(), 2);
    }

    #[test]
    fn test_nullifier_collision_leaves_state() {
        let mut db = db();
        let contract = Fr::from(3u64);
        db.nullifier_write(contract, Fr::from(5u64)).unwrap();
        let state = db.get_tree_state();

        let err = db.nullifier_write(contract, Fr::from(5u64)).unwrap_err();
        assert!(matches!(err, StateError::NullifierCollision { nullifier, .. } if nullifier == Fr::from(5u64)));
        assert!(!err.is_fatal());
        assert_eq!(db.get_tree_state(), state);
        assert!(db.nullifier_exists(contract, Fr::from(5u64)).unwrap());
        // Same nullifier from another contract is a different key.
        assert!(!db.nullifier_exists(Fr::from(4u64), Fr::from(5u64)).unwrap());
    }

    #[test]
    fn test_note_hash_uniqueness_and_existence() {
        let mut db = db();
        let contract = Fr::from(9u64);
        db.note_hash_write(contract, Fr::from(1u64)).unwrap();
        db.note_hash_write(contract, Fr::from(1u64)).unwrap();
        assert_eq!(db.counters().note_hash_counter, 2);

        let siloed = silo_note_hash::<Keccak256Hasher>(contract, Fr::from(1u64));
        let first = make_unique_note_hash::<Keccak256Hasher>(siloed, Fr::from(1000u64), 0);
        let second = make_unique_note_hash::<Keccak256Hasher>(siloed, Fr::from(1000u64), 1);
        assert_ne!(first, second);
        assert!(db.note_hash_exists(0, first).unwrap());
        assert!(db.note_hash_exists(1, second).unwrap());
        assert!(!db.note_hash_exists(1, first).unwrap());
        assert!(!db.note_hash_exists(5, first).unwrap());
    }

    #[test]
    fn test_revert_restores_everything() {
        let mut db = db();
        let contract = Fr::from(2u64);
        db.storage_write(contract, Fr::from(1u64), Fr::from(10u64), false).unwrap();
        let state = db.get_tree_state();

        db.create_checkpoint().unwrap();
        db.storage_write(contract, Fr::from(2u64), Fr::from(20u64), false).unwrap();
        db.nullifier_write(contract, Fr::from(3u64)).unwrap();
        db.unique_note_hash_write(Fr::from(4u64)).unwrap();
        db.revert_checkpoint().unwrap();

        assert_eq!(db.get_tree_state(), state);
        assert_eq!(db.counters(), TreeCounters::default());
        assert!(!db.was_storage_written(contract, Fr::from(2u64)));
        assert!(db.was_storage_written(contract, Fr::from(1u64)));
    }

    #[test]
    fn test_commit_matches_direct_execution() {
        let mut checkpointed = db();
        checkpointed.create_checkpoint().unwrap();
        checkpointed.create_checkpoint().unwrap();
        checkpointed.siloed_nullifier_write(Fr::from(11u64)).unwrap();
        checkpointed.siloed_note_hash_write(Fr::from(12u64)).unwrap();
        checkpointed.commit_checkpoint().unwrap();
        checkpointed.commit_checkpoint().unwrap();

        let mut direct = db();
        direct.siloed_nullifier_write(Fr::from(11u64)).unwrap();
        direct.siloed_note_hash_write(Fr::from(12u64)).unwrap();

        assert_eq!(checkpointed.get_tree_state(), direct.get_tree_state());
    }

    #[test]
    fn test_listeners_and_stack_discipline() {
        let mut db = db();
        let events = Rc::new(RefCell::new(Vec::new()));
        db.add_checkpoint_listener(Box::new(Recorder(events.clone())));

        db.create_checkpoint().unwrap();
        db.commit_checkpoint().unwrap();
        db.create_checkpoint().unwrap();
        db.revert_checkpoint().unwrap();
        let err = db.revert_checkpoint().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(*events.borrow(), vec!["created", "committed", "created", "reverted"]);
        assert_eq!(db.get_checkpoint_id(), 0);
    }

    #[test]
    fn test_pad_trees_fills_to_limits() {
        let mut db = db();
        db.siloed_nullifier_write(Fr::from(1u64)).unwrap();
        db.unique_note_hash_write(Fr::from(2u64)).unwrap();
        let before = db.get_tree_state();
        db.pad_trees().unwrap();

        let after = db.get_tree_state();
        assert_eq!(after.note_hash_tree.tree.next_available_leaf_index, 1 + 3);
        assert_eq!(after.nullifier_tree.tree.next_available_leaf_index, 2 + 3);
        assert_eq!(after.note_hash_tree.tree.root, before.note_hash_tree.tree.root);
        assert_eq!(after.public_data_tree, before.public_data_tree);
    }
}
