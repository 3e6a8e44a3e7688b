//! Checkpoint algebra and hint recording through a full simulation state.

mod common;

use avm_state::{
    Fr, InMemoryContractDb, ProtocolContracts, SimulationState, StateError,
    hints::CheckpointActionNoStateChangeHint,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::common::{CONTRACT, FIRST_NULLIFIER, config, init_tracing, seeded_world_state};

fn state() -> SimulationState {
    let config = config(true);
    SimulationState::new(
        &config,
        seeded_world_state(&config),
        InMemoryContractDb::new(),
        ProtocolContracts::default(),
        Fr::from(FIRST_NULLIFIER),
    )
}

#[test]
fn test_checkpoint_ids_are_never_reused() {
    init_tracing();
    let mut state = state();
    let mut ids = vec![state.get_checkpoint_id()];

    state.create_checkpoint().unwrap();
    ids.push(state.get_checkpoint_id());
    state.create_checkpoint().unwrap();
    ids.push(state.get_checkpoint_id());
    state.revert_checkpoint().unwrap();
    ids.push(state.get_checkpoint_id());
    state.create_checkpoint().unwrap();
    ids.push(state.get_checkpoint_id());
    state.commit_checkpoint().unwrap();
    ids.push(state.get_checkpoint_id());
    state.commit_checkpoint().unwrap();
    ids.push(state.get_checkpoint_id());

    assert_eq!(ids, [0, 1, 2, 1, 3, 1, 0]);

    let hints = state.dump_hints().unwrap();
    let create_ids: Vec<_> =
        hints.create_checkpoint_hints.iter().map(|h| (h.old_checkpoint_id, h.new_checkpoint_id)).collect();
    assert_eq!(create_ids, [(0, 1), (1, 2), (1, 3)]);
    assert_eq!(
        hints.commit_checkpoint_hints,
        [
            CheckpointActionNoStateChangeHint { action_counter: 4, old_checkpoint_id: 3, new_checkpoint_id: 1 },
            CheckpointActionNoStateChangeHint { action_counter: 5, old_checkpoint_id: 1, new_checkpoint_id: 0 },
        ]
    );
    assert_eq!(hints.contract_db_create_checkpoint_hints, hints.create_checkpoint_hints);
}

#[test]
fn test_nested_revert_inside_commit() {
    init_tracing();
    let mut state = state();
    let contract = Fr::from(CONTRACT);
    let before = state.get_tree_state();

    state.create_checkpoint().unwrap();
    state.merkle_db().nullifier_write(contract, Fr::from(1u64)).unwrap();
    let after_outer_write = state.get_tree_state();

    state.create_checkpoint().unwrap();
    state.merkle_db().nullifier_write(contract, Fr::from(2u64)).unwrap();
    state.merkle_db().note_hash_write(contract, Fr::from(3u64)).unwrap();
    state.revert_checkpoint().unwrap();
    assert_eq!(state.get_tree_state(), after_outer_write);

    state.commit_checkpoint().unwrap();
    assert_eq!(state.get_tree_state(), after_outer_write);
    assert_ne!(state.get_tree_state(), before);
    assert!(state.merkle_db().nullifier_exists(contract, Fr::from(1u64)).unwrap());
    assert!(!state.merkle_db().nullifier_exists(contract, Fr::from(2u64)).unwrap());
}

#[test]
fn test_unbalanced_commit_is_fatal_and_harmless() {
    init_tracing();
    let mut state = state();
    state.merkle_db().storage_write(Fr::from(CONTRACT), Fr::from(1u64), Fr::from(5u64), false).unwrap();
    let before = state.get_tree_state();

    for err in [state.commit_checkpoint().unwrap_err(), state.revert_checkpoint().unwrap_err()] {
        assert!(matches!(err, StateError::StackDiscipline { .. }));
        assert!(err.is_fatal());
    }

    assert_eq!(state.get_tree_state(), before);
    assert_eq!(state.get_checkpoint_id(), 0);
    let hints = state.dump_hints().unwrap();
    assert!(hints.commit_checkpoint_hints.is_empty());
    assert!(hints.revert_checkpoint_hints.is_empty());
}

#[test]
fn test_repeated_lookups_record_once() {
    init_tracing();
    let mut state = state();
    let contract = Fr::from(CONTRACT);

    state.merkle_db().storage_read(contract, Fr::from(1u64)).unwrap();
    state.merkle_db().nullifier_exists(contract, Fr::from(1u64)).unwrap();
    state.merkle_db().l1_to_l2_msg_exists(0, Fr::from(1u64)).unwrap();
    let first = state.dump_hints().unwrap();

    state.merkle_db().storage_read(contract, Fr::from(1u64)).unwrap();
    state.merkle_db().nullifier_exists(contract, Fr::from(1u64)).unwrap();
    state.merkle_db().l1_to_l2_msg_exists(0, Fr::from(1u64)).unwrap();
    let second = state.dump_hints().unwrap();

    assert!(first.merkle_hint_count() > 0);
    assert_eq!(first, second);
}

#[test]
fn test_collision_records_lookup_only() {
    init_tracing();
    let mut state = state();
    let contract = Fr::from(CONTRACT);
    state.merkle_db().nullifier_write(contract, Fr::from(9u64)).unwrap();
    let before = state.get_tree_state();
    let inserts = state.dump_hints().unwrap().sequential_insert_hints_nullifier_tree.len();

    let err = state.merkle_db().nullifier_write(contract, Fr::from(9u64)).unwrap_err();

    assert!(matches!(err, StateError::NullifierCollision { nullifier, .. } if nullifier == Fr::from(9u64)));
    assert!(!err.is_fatal());
    assert_eq!(state.get_tree_state(), before);
    assert_eq!(state.dump_hints().unwrap().sequential_insert_hints_nullifier_tree.len(), inserts);
}

fn random_ops(state: &mut SimulationState, rng: &mut StdRng, count: usize) {
    let contract = Fr::from(CONTRACT);
    for _ in 0..count {
        let value = Fr::from(rng.gen_range(1u64..16));
        let db = state.merkle_db();
        let result = match rng.gen_range(0..3) {
            0 => db.storage_write(contract, value, value, false),
            1 => db.nullifier_write(contract, value),
            _ => db.note_hash_write(contract, value),
        };
        match result {
            Ok(()) | Err(StateError::NullifierCollision { .. }) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}

#[test]
fn test_random_ops_revert_and_commit() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(42);

    for round in 0..8 {
        let mut reverted = state();
        let mut committed = state();
        let mut direct = state();
        let seed = rng.r#gen::<u64>();

        random_ops(&mut reverted, &mut rng, 4);
        let before = reverted.get_tree_state();
        reverted.create_checkpoint().unwrap();
        random_ops(&mut reverted, &mut StdRng::seed_from_u64(seed), 12);
        reverted.revert_checkpoint().unwrap();
        assert_eq!(reverted.get_tree_state(), before, "round {round}");

        committed.create_checkpoint().unwrap();
        random_ops(&mut committed, &mut StdRng::seed_from_u64(seed), 12);
        committed.commit_checkpoint().unwrap();
        random_ops(&mut direct, &mut StdRng::seed_from_u64(seed), 12);
        assert_eq!(committed.get_tree_state(), direct.get_tree_state(), "round {round}");
    }
}
