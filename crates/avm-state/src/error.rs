//! State layer errors

use avm_merkle::{Fr, TreeError};

use crate::{AztecAddress, MerkleTreeId};

/// Errors surfaced by the state layer.
///
/// Collision and membership errors are domain failures the transaction
/// runner may recover from by reverting. Stack discipline and replay errors
/// mean the caller broke the protocol; see [`StateError::is_fatal`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The nullifier is already in the nullifier tree.
    #[error("nullifier {nullifier} already exists (siloed {siloed_nullifier})")]
    NullifierCollision {
        /// Nullifier as written by the caller.
        nullifier: Fr,
        /// Siloed nullifier looked up in the tree.
        siloed_nullifier: Fr,
    },
    /// A protocol contract leaf does not open to the expected registry root.
    #[error(
        "protocol contract {canonical_address} membership mismatch: expected root {expected_root}, computed {computed_root}"
    )]
    MembershipMismatch {
        /// Canonical address being resolved.
        canonical_address: AztecAddress,
        /// Root the registry must match.
        expected_root: Fr,
        /// Root recomputed from the leaf and its path.
        computed_root: Fr,
    },
    /// The address is outside the canonical protocol contract range.
    #[error("{address} is not a protocol contract address")]
    NotProtocolContract {
        /// Rejected address.
        address: AztecAddress,
    },
    /// Commit or revert without an open checkpoint.
    #[error("cannot {operation}: no checkpoint open above the base")]
    StackDiscipline {
        /// Attempted operation.
        operation: &'static str,
    },
    /// Replay asked for a hint that was never recorded.
    #[error("{kind} hint not found for key ({key})")]
    MissingHint {
        /// Hint collection searched.
        kind: &'static str,
        /// Rendered lookup key.
        key: String,
    },
    /// Replay reached a state that contradicts the recorded hints.
    #[error("[{operation}@{action_counter}] {detail}")]
    ReplayMismatch {
        /// Checkpoint operation being replayed.
        operation: &'static str,
        /// Checkpoint action counter at the failure.
        action_counter: u32,
        /// What did not match.
        detail: String,
    },
    /// The operation is not defined for this tree.
    #[error("{operation} is not supported for {tree}")]
    UnsupportedTree {
        /// Attempted operation.
        operation: &'static str,
        /// Tree addressed.
        tree: MerkleTreeId,
    },
    /// Underlying tree failure.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl StateError {
    /// Whether the error reports caller misuse rather than a transaction-level failure.
    ///
    /// A simulation must not continue after a fatal error.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StackDiscipline { .. } | Self::MissingHint { .. } | Self::ReplayMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(StateError::StackDiscipline { operation: "revert_checkpoint" }.is_fatal());
        assert!(
            StateError::MissingHint { kind: "sibling path", key: String::new() }.is_fatal()
        );
        assert!(
            !StateError::NullifierCollision { nullifier: Fr::ZERO, siloed_nullifier: Fr::ZERO }
                .is_fatal()
        );
        assert!(!StateError::NotProtocolContract { address: Fr::from(99u64) }.is_fatal());
    }

    #[test]
    fn test_display_names_tree() {
        let err = StateError::UnsupportedTree {
            operation: "pad_tree",
            tree: MerkleTreeId::PublicDataTree,
        };
        assert_eq!(err.to_string(), "pad_tree is not supported for PUBLIC_DATA_TREE");
    }
}
