//! Protocol contract registry
//!
//! Protocol contracts live at the fixed canonical addresses
//! `1..=MAX_PROTOCOL_CONTRACTS` and run under a derived address. The registry
//! tree commits to the mapping: the leaf at index `canonical` holds the
//! derived address and the next larger registered derived address, so the
//! leaves also form a sorted list over derived addresses.
//!
//! The tree is built on first use and every resolution is proven against its
//! root once per derived address. Nothing here follows checkpoints.

use std::collections::BTreeMap;

use avm_merkle::{
    Fr, Keccak256Hasher, LeafIndex, MemoryMerkleTree, SiblingPath, TreeHasher,
    compute_root_from_path, short_hex,
};
use serde::{Deserialize, Serialize};

use crate::{
    AztecAddress, ProtocolContracts, StateError, constants::MAX_PROTOCOL_CONTRACTS,
    types::is_protocol_contract_address,
};

/// Membership proof of one protocol contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolContractWitness {
    /// Canonical address, also the leaf index.
    pub canonical_address: AztecAddress,
    /// Resolved derived address.
    pub derived_address: AztecAddress,
    /// Next larger registered derived address, zero for none.
    pub next_derived_address: AztecAddress,
    /// Leaf hash.
    pub leaf_hash: Fr,
    /// Sibling path of the leaf.
    pub path: SiblingPath,
    /// Root the leaf was proven against.
    pub root: Fr,
}

#[derive(Clone, Debug)]
struct BuiltRegistry<H> {
    tree: MemoryMerkleTree<H>,
    next_derived_addresses: [AztecAddress; MAX_PROTOCOL_CONTRACTS],
}

/// Registry tree, built on first use.
#[derive(Clone, Debug)]
enum RegistryTree<H> {
    Unbuilt,
    Built(BuiltRegistry<H>),
}

/// Resolves canonical protocol contract addresses to derived addresses.
#[derive(Clone, Debug)]
pub struct ProtocolContractRegistry<H = Keccak256Hasher> {
    contracts: ProtocolContracts,
    tree_height: usize,
    expected_root: Option<Fr>,
    tree: RegistryTree<H>,
    /// Proven resolutions by derived address.
    witnesses: BTreeMap<AztecAddress, ProtocolContractWitness>,
}

impl<H: TreeHasher> ProtocolContractRegistry<H> {
    /// Registry over `contracts` with a tree of depth `tree_height`.
    pub const fn new(contracts: ProtocolContracts, tree_height: usize) -> Self {
        Self {
            contracts,
            tree_height,
            expected_root: None,
            tree: RegistryTree::Unbuilt,
            witnesses: BTreeMap::new(),
        }
    }

    /// Require resolutions to prove against `root` instead of the rebuilt root.
    pub const fn with_expected_root(mut self, root: Fr) -> Self {
        self.expected_root = Some(root);
        self
    }

    /// Registered derived addresses.
    pub const fn contracts(&self) -> &ProtocolContracts {
        &self.contracts
    }

    /// Root of the registry tree.
    pub fn root(&mut self) -> Result<Fr, StateError> {
        Ok(self.ensure_built()?.tree.root())
    }

    /// Proven resolutions, ordered by derived address.
    pub fn witnesses(&self) -> impl Iterator<Item = &ProtocolContractWitness> + '_ {
        self.witnesses.values()
    }

    /// Derived address registered at `canonical_address`.
    ///
    /// Addresses outside the canonical range are rejected. An unregistered
    /// canonical address resolves to `None`. A resolution whose leaf does not
    /// open to the registry root fails with
    /// [`StateError::MembershipMismatch`].
    pub fn get_derived_address(
        &mut self,
        canonical_address: AztecAddress,
    ) -> Result<Option<AztecAddress>, StateError> {
        if !is_protocol_contract_address(&canonical_address) {
            return Err(StateError::NotProtocolContract { address: canonical_address });
        }
        let index: LeafIndex = canonical_address.as_limbs()[0];
        let slot = (index - 1) as usize;

        let derived_address = self.contracts.derived_addresses[slot];
        if derived_address.is_zero() {
            return Ok(None);
        }
        if self.witnesses.contains_key(&derived_address) {
            return Ok(Some(derived_address));
        }

        let expected_root = self.expected_root;
        let built = self.ensure_built()?;
        let next_derived_address = built.next_derived_addresses[slot];
        let leaf_hash = H::hash(&[derived_address, next_derived_address, Fr::ZERO]);
        let path = built.tree.sibling_path(index)?;
        let computed_root = compute_root_from_path::<H>(leaf_hash, index, &path);
        let root = expected_root.unwrap_or_else(|| built.tree.root());

        if computed_root != root {
            return Err(StateError::MembershipMismatch {
                canonical_address,
                expected_root: root,
                computed_root,
            });
        }

        tracing::debug!(
            target: "avm_state::contracts",
            canonical = index,
            derived = %short_hex(&derived_address),
            "Proved protocol contract"
        );
        self.witnesses.insert(
            derived_address,
            ProtocolContractWitness {
                canonical_address,
                derived_address,
                next_derived_address,
                leaf_hash,
                path,
                root,
            },
        );
        Ok(Some(derived_address))
    }

    fn ensure_built(&mut self) -> Result<&BuiltRegistry<H>, StateError> {
        if let RegistryTree::Unbuilt = self.tree {
            self.tree = RegistryTree::Built(self.build()?);
        }
        match &self.tree {
            RegistryTree::Built(built) => Ok(built),
            RegistryTree::Unbuilt => unreachable!("registry tree built above"),
        }
    }

    fn build(&self) -> Result<BuiltRegistry<H>, StateError> {
        let derived = &self.contracts.derived_addresses;
        let mut sorted: Vec<AztecAddress> = derived.iter().copied().filter(|d| !d.is_zero()).collect();
        sorted.sort_unstable();

        let mut next_derived_addresses = [Fr::ZERO; MAX_PROTOCOL_CONTRACTS];
        let mut tree = MemoryMerkleTree::<H>::new(self.tree_height)?;
        tree.pad(MAX_PROTOCOL_CONTRACTS as u64 + 1)?;

        for (slot, derived_address) in derived.iter().enumerate() {
            if derived_address.is_zero() {
                continue;
            }
            let next = sorted.iter().copied().find(|d| d > derived_address).unwrap_or(Fr::ZERO);
            next_derived_addresses[slot] = next;
            tree.update(slot as LeafIndex + 1, H::hash(&[*derived_address, next, Fr::ZERO]))?;
        }

        tracing::info!(
            target: "avm_state::contracts",
            registered = sorted.len(),
            root = %short_hex(&tree.root()),
            "Built protocol contract tree"
        );
        Ok(BuiltRegistry { tree, next_derived_addresses })
    }
}
