//! Siloing and uniqueness hashes
//!
//! Every value that lands in a shared tree is first scoped to the contract
//! that emitted it. Each hash carries its own domain separator as the first
//! input.

use avm_merkle::{Fr, TreeHasher};

use crate::{AztecAddress, constants::separator};

/// Public data tree key of `slot` in `contract`'s storage.
pub fn compute_leaf_slot<H: TreeHasher>(contract: AztecAddress, slot: Fr) -> Fr {
    H::hash(&[separator::PUBLIC_LEAF_INDEX, contract, slot])
}

/// Scope a nullifier to the emitting contract.
pub fn silo_nullifier<H: TreeHasher>(contract: AztecAddress, nullifier: Fr) -> Fr {
    H::hash(&[separator::OUTER_NULLIFIER, contract, nullifier])
}

/// Scope a note hash to the emitting contract.
pub fn silo_note_hash<H: TreeHasher>(contract: AztecAddress, note_hash: Fr) -> Fr {
    H::hash(&[separator::SILOED_NOTE_HASH, contract, note_hash])
}

/// Nonce of the `counter`-th note hash of a transaction.
pub fn compute_note_hash_nonce<H: TreeHasher>(first_nullifier: Fr, counter: u32) -> Fr {
    H::hash(&[separator::NOTE_HASH_NONCE, first_nullifier, Fr::from(counter)])
}

/// Salt a siloed note hash so it is unique across transactions.
pub fn make_unique_note_hash<H: TreeHasher>(
    siloed_note_hash: Fr,
    first_nullifier: Fr,
    counter: u32,
) -> Fr {
    let nonce = compute_note_hash_nonce::<H>(first_nullifier, counter);
    H::hash(&[separator::UNIQUE_NOTE_HASH, nonce, siloed_note_hash])
}

/// Commitment to packed public bytecode.
///
/// Bytes are packed into 31-byte big-endian field elements, prefixed by the
/// byte length.
pub fn compute_public_bytecode_commitment<H: TreeHasher>(bytecode: &[u8]) -> Fr {
    let mut inputs = Vec::with_capacity(bytecode.len() / 31 + 3);
    inputs.push(separator::PUBLIC_BYTECODE);
    inputs.push(Fr::from(bytecode.len()));
    for chunk in bytecode.chunks(31) {
        let mut bytes = [0u8; 32];
        bytes[1..1 + chunk.len()].copy_from_slice(chunk);
        inputs.push(Fr::from_be_bytes(bytes));
    }
    H::hash(&inputs)
}
