//! Genesis identifiers.
//!
//! An identity's ID is derived from its first state: the operational key
//! claim plus any extra genesis claims in the claims tree, that tree's root
//! in the roots tree, and an empty revocations tree.

use crate::claims::Claim;
use crate::leafs::RootLeaf;
use crate::state::IdenStateTreeRoots;
use iden_merkletree::{verify_proof, Entry, MemoryStorage, MerkleTree, Proof};
use iden_types::{Hash, Id, IdenError, IdenResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub id: Id,
    pub iden_state: Hash,
    pub roots: IdenStateTreeRoots,
    pub proof_kop: ProofClaimGenesis,
}

/// Shows that a claim was part of the genesis state of `id`, with no
/// on-chain lookup needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofClaimGenesis {
    pub id: Id,
    pub claim: Entry,
    pub mtp_claim: Proof,
    pub roots_root: Hash,
    pub mtp_root: Proof,
}

impl ProofClaimGenesis {
    pub fn verify(&self) -> IdenResult<()> {
        if !self.mtp_claim.existence || !self.mtp_root.existence {
            return Err(IdenError::MtpNonExistence("genesis proof of non-existence".into()));
        }
        let (hi, hv) = self.claim.hi_hv()?;
        let claims_root = iden_merkletree::root_from_proof(&self.mtp_claim, &hi, &hv)?;

        let (root_hi, root_hv) = RootLeaf::new(claims_root).entry().hi_hv()?;
        if !verify_proof(&self.roots_root, &self.mtp_root, &root_hi, &root_hv) {
            return Err(IdenError::InvalidProof("claims root not in genesis roots tree".into()));
        }

        let roots = IdenStateTreeRoots {
            claims_root,
            revocations_root: Hash::zero(),
            roots_root: self.roots_root,
        };
        let id = Id::from_genesis_state(&roots.state()?);
        if id != self.id {
            return Err(IdenError::StateMismatch(format!(
                "genesis state gives {}, expected {}",
                id, self.id
            )));
        }
        Ok(())
    }
}

/// Builds the genesis trees in memory and derives the ID.
pub fn calculate_genesis(claim_kop: &Claim, extra_claims: &[Claim], levels: usize) -> IdenResult<Genesis> {
    let claims_tree = MerkleTree::new(Arc::new(MemoryStorage::new()), levels)?;
    let roots_tree = MerkleTree::new(Arc::new(MemoryStorage::new()), levels)?;
    calculate_genesis_in(&claims_tree, &roots_tree, claim_kop, extra_claims)
}

/// Same as [`calculate_genesis`] but fills trees owned by the caller,
/// which must be empty.
pub fn calculate_genesis_in(
    claims_tree: &MerkleTree,
    roots_tree: &MerkleTree,
    claim_kop: &Claim,
    extra_claims: &[Claim],
) -> IdenResult<Genesis> {
    if !claims_tree.root().is_zero() || !roots_tree.root().is_zero() {
        return Err(IdenError::Internal("genesis trees must start empty".into()));
    }

    let kop = claim_kop.entry();
    claims_tree.add(&kop)?;
    for claim in extra_claims {
        claims_tree.add(&claim.entry())?;
    }

    let claims_root = claims_tree.root();
    let root_leaf = RootLeaf::new(claims_root).entry();
    roots_tree.add(&root_leaf)?;

    let roots = IdenStateTreeRoots {
        claims_root,
        revocations_root: Hash::zero(),
        roots_root: roots_tree.root(),
    };
    let iden_state = roots.state()?;
    let id = Id::from_genesis_state(&iden_state);

    let proof_kop = ProofClaimGenesis {
        id,
        mtp_claim: claims_tree.generate_proof(&kop.h_index()?, None)?,
        claim: kop,
        roots_root: roots.roots_root,
        mtp_root: roots_tree.generate_proof(&root_leaf.h_index()?, None)?,
    };

    debug!(id = %id, state = %iden_state.short(), extra = extra_claims.len(), "Calculated genesis");
    Ok(Genesis {
        id,
        iden_state,
        roots,
        proof_kop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimAssignName, ClaimAuthorizeKSignSecp256k1, ClaimBasic};
    use iden_crypto::{derive_public_key, Secp256k1SecretKey};
    use iden_types::DEFAULT_TREE_LEVELS;

    fn kop() -> Claim {
        let sk = Secp256k1SecretKey::from_bytes([0x21; 32]).unwrap();
        ClaimAuthorizeKSignSecp256k1::new(derive_public_key(&sk).unwrap())
            .unwrap()
            .into()
    }

    #[test]
    fn test_genesis_deterministic() {
        let a = calculate_genesis(&kop(), &[], DEFAULT_TREE_LEVELS).unwrap();
        let b = calculate_genesis(&kop(), &[], DEFAULT_TREE_LEVELS).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.iden_state, b.iden_state);
        assert!(a.id.checksum_valid());
        assert_eq!(a.id, Id::from_genesis_state(&a.iden_state));
    }

    #[test]
    fn test_genesis_extra_claims_order_independent() {
        let other = Id::new(iden_types::ID_TYPE_BJP0, [1u8; 27]);
        let x: Claim = ClaimBasic::new(b"x", b"1").unwrap().into();
        let y: Claim = ClaimAssignName::new("bob", other).into();

        let a = calculate_genesis(&kop(), &[x.clone(), y.clone()], DEFAULT_TREE_LEVELS).unwrap();
        let b = calculate_genesis(&kop(), &[y, x], DEFAULT_TREE_LEVELS).unwrap();
        assert_eq!(a.id, b.id);

        let plain = calculate_genesis(&kop(), &[], DEFAULT_TREE_LEVELS).unwrap();
        assert_ne!(a.id, plain.id);
    }

    #[test]
    fn test_genesis_proof_verifies() {
        let genesis = calculate_genesis(&kop(), &[], DEFAULT_TREE_LEVELS).unwrap();
        genesis.proof_kop.verify().unwrap();

        let mut forged = genesis.proof_kop.clone();
        forged.id = Id::new(iden_types::ID_TYPE_BJP0, [9u8; 27]);
        assert!(matches!(forged.verify(), Err(IdenError::StateMismatch(_))));
    }

    #[test]
    fn test_genesis_duplicate_extra_claim() {
        let err = calculate_genesis(&kop(), &[kop()], DEFAULT_TREE_LEVELS).unwrap_err();
        assert!(matches!(err, IdenError::DuplicateIndex));
    }
}
