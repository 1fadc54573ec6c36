//! Credentials and claim version proofs.

use crate::claims::{version_of, with_version};
use crate::state::IdenStateData;
use iden_merkletree::{verify_proof, Entry, MerkleTree, Proof};
use iden_types::{Hash, Id, IdenError, IdenResult};
use serde::{Deserialize, Serialize};

/// A claim is in the claims tree of a published identity state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialExistence {
    pub id: Id,
    pub iden_state_data: IdenStateData,
    pub mtp_claim: Proof,
    pub claim: Entry,
    pub revocations_root: Hash,
    pub roots_root: Hash,
}

/// A claim exists and its revocation nonce is absent from the
/// revocations tree of a published state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialValidity {
    pub credential_existence: CredentialExistence,
    pub iden_state_data: IdenStateData,
    pub mtp_not_nonce: Proof,
    pub claims_root: Hash,
    pub roots_root: Hash,
}

pub fn next_version_entry(entry: &Entry) -> IdenResult<Entry> {
    let version = version_of(entry)
        .checked_add(1)
        .ok_or_else(|| IdenError::Internal("claim version overflow".into()))?;
    Ok(with_version(entry, version))
}

pub fn previous_version_entry(entry: &Entry) -> IdenResult<Entry> {
    match version_of(entry) {
        0 => Err(IdenError::NotFound),
        v => Ok(with_version(entry, v - 1)),
    }
}

/// First version of `entry`'s claim that is not in `tree`. Only the
/// version field of `entry` is ignored; everything else must match.
pub fn get_next_version(tree: &MerkleTree, entry: &Entry) -> IdenResult<u32> {
    let mut version = 0u32;
    loop {
        let hi = with_version(entry, version).h_index()?;
        match tree.get_data_by_index(&hi) {
            Ok(_) => {
                version = version
                    .checked_add(1)
                    .ok_or_else(|| IdenError::Internal("claim version overflow".into()))?;
            }
            Err(IdenError::NotFound) => return Ok(version),
            Err(e) => return Err(e),
        }
    }
}

/// Proof that the version after `entry` has not been added, i.e. the
/// claim has not been superseded.
pub fn non_revocation_proof(tree: &MerkleTree, entry: &Entry, root: Option<&Hash>) -> IdenResult<Proof> {
    let next = next_version_entry(entry)?;
    let proof = tree.generate_proof(&next.h_index()?, root)?;
    if proof.existence {
        return Err(IdenError::MtpExistence("next claim version exists".into()));
    }
    Ok(proof)
}

/// Shows that `leaf` was added between `old_root` and `root`, is the
/// latest version at `root`, and (for versions above 0) directly follows
/// a version present at `old_root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateProof {
    pub leaf: Entry,
    pub mtp_non_exist_in_old_root: Proof,
    pub mtp_exist: Proof,
    pub mtp_non_exist_next_version: Proof,
    pub mtp_exist_previous_version: Option<Proof>,
    /// Value hash of the previous version, which may differ from `leaf`'s.
    pub previous_value_hash: Option<Hash>,
    pub old_root: Hash,
    pub root: Hash,
}

pub fn predicate_proof(tree: &MerkleTree, old_root: &Hash, hi: &Hash) -> IdenResult<PredicateProof> {
    let mtp_non_exist_in_old_root = tree.generate_proof(hi, Some(old_root))?;
    let mtp_exist = tree.generate_proof(hi, None)?;
    let leaf = tree.get_data_by_index(hi)?;
    let mtp_non_exist_next_version = non_revocation_proof(tree, &leaf, None)?;

    let (mtp_exist_previous_version, previous_value_hash) = if version_of(&leaf) == 0 {
        (None, None)
    } else {
        let prev_hi = previous_version_entry(&leaf)?.h_index()?;
        let old = tree.snapshot(old_root)?;
        let prev = old.get_data_by_index(&prev_hi)?;
        (
            Some(old.generate_proof(&prev_hi, None)?),
            Some(prev.h_value()?),
        )
    };

    Ok(PredicateProof {
        leaf,
        mtp_non_exist_in_old_root,
        mtp_exist,
        mtp_non_exist_next_version,
        mtp_exist_previous_version,
        previous_value_hash,
        old_root: *old_root,
        root: tree.root(),
    })
}

pub fn verify_predicate_proof(p: &PredicateProof) -> IdenResult<bool> {
    if p.root == p.old_root {
        return Ok(false);
    }
    let (hi, hv) = p.leaf.hi_hv()?;

    if p.mtp_non_exist_in_old_root.existence
        || !verify_proof(&p.old_root, &p.mtp_non_exist_in_old_root, &hi, &hv)
    {
        return Ok(false);
    }
    if !p.mtp_exist.existence || !verify_proof(&p.root, &p.mtp_exist, &hi, &hv) {
        return Ok(false);
    }

    let next = next_version_entry(&p.leaf)?;
    if p.mtp_non_exist_next_version.existence
        || !verify_proof(&p.root, &p.mtp_non_exist_next_version, &next.h_index()?, &Hash::zero())
    {
        return Ok(false);
    }

    if version_of(&p.leaf) == 0 {
        return Ok(true);
    }
    let (Some(prev_proof), Some(prev_hv)) = (&p.mtp_exist_previous_version, &p.previous_value_hash) else {
        return Ok(false);
    };
    let prev_hi = previous_version_entry(&p.leaf)?.h_index()?;
    Ok(prev_proof.existence && verify_proof(&p.old_root, prev_proof, &prev_hi, prev_hv))
}
