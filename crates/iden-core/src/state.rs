//! Identity State: the single hash that commits to all three trees.

use iden_crypto::hash_hashes;
use iden_types::{Hash, IdenResult};
use serde::{Deserialize, Serialize};

/// `H(claims_root, revocations_root, roots_root)`.
pub fn iden_state(claims_root: &Hash, revocations_root: &Hash, roots_root: &Hash) -> IdenResult<Hash> {
    hash_hashes(&[*claims_root, *revocations_root, *roots_root])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdenStateTreeRoots {
    pub claims_root: Hash,
    pub revocations_root: Hash,
    pub roots_root: Hash,
}

impl IdenStateTreeRoots {
    pub fn state(&self) -> IdenResult<Hash> {
        iden_state(&self.claims_root, &self.revocations_root, &self.roots_root)
    }
}

/// A state as published: the block that carried it and its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdenStateData {
    pub block_n: u64,
    pub block_ts: i64,
    pub iden_state: Hash,
}
