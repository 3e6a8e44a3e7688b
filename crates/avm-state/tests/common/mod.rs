//! Shared fixtures for the state layer integration tests.

#![allow(dead_code, unreachable_pub)]

use avm_merkle::Keccak256Hasher;
use avm_state::{
    Fr, InMemoryWorldState, MerkleBackend, MerkleTreeId, NullifierLeafValue, PureMerkleDb,
    SimulatorConfig, StateError, TreeHeights,
    crypto::{make_unique_note_hash, silo_note_hash},
};

pub const CONTRACT: u64 = 0x1234;
pub const FIRST_NULLIFIER: u64 = 0xf1;
pub const SEEDED_NULLIFIER: u64 = 0x5eed;
pub const SEEDED_MESSAGE: u64 = 0x3e55;

/// Route `avm_state` logs to the test harness, once per binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("avm_state=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn config(collect_hints: bool) -> SimulatorConfig {
    SimulatorConfig {
        collect_hints,
        max_note_hashes_per_tx: 8,
        max_nullifiers_per_tx: 8,
        tree_heights: TreeHeights { nullifier: 8, note_hash: 8, public_data: 8, l1_to_l2_message: 8 },
        ..SimulatorConfig::default()
    }
}

/// World state holding one earlier nullifier and one L1 to L2 message.
pub fn seeded_world_state(config: &SimulatorConfig) -> InMemoryWorldState {
    let mut world_state = InMemoryWorldState::new(&config.tree_heights).unwrap();
    world_state
        .insert_indexed_leaf_nullifier_tree(NullifierLeafValue::new(Fr::from(SEEDED_NULLIFIER)))
        .unwrap();
    world_state
        .append_leaves(MerkleTreeId::L1ToL2MessageTree, &[Fr::from(SEEDED_MESSAGE)])
        .unwrap();
    world_state
}

/// Unique hash of the `counter`-th note hash emitted by [`CONTRACT`].
pub fn unique_note_hash(note_hash: u64, counter: u32) -> Fr {
    let siloed = silo_note_hash::<Keccak256Hasher>(Fr::from(CONTRACT), Fr::from(note_hash));
    make_unique_note_hash::<Keccak256Hasher>(siloed, Fr::from(FIRST_NULLIFIER), counter)
}

/// Observable outcome of each step of [`run_transaction`].
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Read(Fr),
    Exists(bool),
    Written,
    Collision,
}

fn outcome(result: Result<(), StateError>) -> Result<Outcome, StateError> {
    match result {
        Ok(()) => Ok(Outcome::Written),
        Err(StateError::NullifierCollision { .. }) => Ok(Outcome::Collision),
        Err(err) => Err(err),
    }
}

/// A transaction with a reverted nested call, a committed one, a collision
/// and every kind of lookup, ending with tree padding.
pub fn run_transaction<B: MerkleBackend>(
    db: &mut PureMerkleDb<B>,
) -> Result<Vec<Outcome>, StateError> {
    let contract = Fr::from(CONTRACT);
    let slot = Fr::from(7u64);
    let mut outcomes = Vec::new();

    outcomes.push(Outcome::Read(db.storage_read(contract, slot)?));
    outcomes.push(outcome(db.storage_write(contract, slot, Fr::from(100u64), false))?);
    outcomes.push(outcome(db.nullifier_write(contract, Fr::from(1u64)))?);
    outcomes.push(outcome(db.note_hash_write(contract, Fr::from(10u64)))?);

    db.create_checkpoint()?;
    outcomes.push(outcome(db.storage_write(contract, slot, Fr::from(200u64), false))?);
    outcomes.push(outcome(db.nullifier_write(contract, Fr::from(2u64)))?);
    outcomes.push(Outcome::Read(db.storage_read(contract, slot)?));
    db.revert_checkpoint()?;

    db.create_checkpoint()?;
    outcomes.push(outcome(db.note_hash_write(contract, Fr::from(11u64)))?);
    outcomes.push(outcome(db.storage_write(contract, Fr::from(8u64), Fr::from(300u64), false))?);
    db.commit_checkpoint()?;

    outcomes.push(Outcome::Read(db.storage_read(contract, slot)?));
    outcomes.push(Outcome::Exists(db.nullifier_exists(contract, Fr::from(1u64))?));
    outcomes.push(Outcome::Exists(db.nullifier_exists(contract, Fr::from(2u64))?));
    outcomes.push(Outcome::Exists(db.siloed_nullifier_exists(Fr::from(SEEDED_NULLIFIER))?));
    outcomes.push(outcome(db.siloed_nullifier_write(Fr::from(SEEDED_NULLIFIER)))?);
    outcomes.push(Outcome::Exists(db.note_hash_exists(0, unique_note_hash(10, 0))?));
    outcomes.push(Outcome::Exists(db.note_hash_exists(1, unique_note_hash(11, 1))?));
    outcomes.push(Outcome::Exists(db.note_hash_exists(5, unique_note_hash(11, 1))?));
    outcomes.push(Outcome::Exists(db.l1_to_l2_msg_exists(0, Fr::from(SEEDED_MESSAGE))?));
    db.pad_trees()?;

    Ok(outcomes)
}

/// What [`run_transaction`] must observe against the seeded world state.
pub fn expected_outcomes() -> Vec<Outcome> {
    vec![
        Outcome::Read(Fr::ZERO),
        Outcome::Written,
        Outcome::Written,
        Outcome::Written,
        Outcome::Written,
        Outcome::Written,
        Outcome::Read(Fr::from(200u64)),
        Outcome::Written,
        Outcome::Written,
        Outcome::Read(Fr::from(100u64)),
        Outcome::Exists(true),
        Outcome::Exists(false),
        Outcome::Exists(true),
        Outcome::Collision,
        Outcome::Exists(true),
        Outcome::Exists(true),
        Outcome::Exists(false),
        Outcome::Exists(true),
    ]
}
