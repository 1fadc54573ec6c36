//! Identity issuer.
//!
//! Owns the claims, revocations and roots trees of one identity, hands out
//! revocation nonces, and publishes new identity states through an injected
//! [`IdenStateWriter`]. Every mutation runs under the issuer's write lock so
//! nonce assignment and tree updates stay in step.

use crate::claims::{
    rev_nonce_of, version_of, with_version, Claim, ClaimAuthorizeKSignSecp256k1, ClaimVariant,
};
use crate::config::TreesConfig;
use crate::genesis::{calculate_genesis_in, Genesis, ProofClaimGenesis};
use crate::leafs::{RevocationLeaf, RootLeaf};
use crate::proof::{get_next_version, CredentialExistence, CredentialValidity};
use crate::publisher::IdenStateWriter;
use crate::signer::{state_transition_message, Signature, Signer};
use crate::state::{IdenStateData, IdenStateTreeRoots};
use iden_merkletree::{Entry, MerkleTree, Storage};
use iden_types::{Hash, Id, IdenError, IdenResult};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PREFIX_CLAIMS: &[u8] = b"treeclaims:";
pub const PREFIX_REVOCATIONS: &[u8] = b"treerevocation:";
pub const PREFIX_ROOTS: &[u8] = b"treeroots:";
pub const PREFIX_ISSUER: &[u8] = b"issuer:";

const KEY_GENESIS: &[u8] = b"genesis";
const KEY_STATE: &[u8] = b"state";

/// One computed identity state. `published` is set once the writer has
/// accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iden_state: Hash,
    pub roots: IdenStateTreeRoots,
    pub published: Option<IdenStateData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IssuerState {
    history: Vec<HistoryEntry>,
    next_nonce: u64,
    on_chain: Option<IdenStateData>,
}

#[derive(Serialize, Deserialize)]
struct StoredGenesis {
    id: Id,
    proof_kop: ProofClaimGenesis,
}

pub struct Issuer {
    id: Id,
    proof_kop: ProofClaimGenesis,
    claims: MerkleTree,
    revocations: MerkleTree,
    roots: MerkleTree,
    meta: Arc<dyn Storage>,
    signer: Arc<dyn Signer>,
    writer: Arc<dyn IdenStateWriter>,
    state: RwLock<IssuerState>,
}

struct Trees {
    claims: MerkleTree,
    revocations: MerkleTree,
    roots: MerkleTree,
}

fn open_trees(cfg: &TreesConfig, storage: &Arc<dyn Storage>) -> IdenResult<Trees> {
    Ok(Trees {
        claims: MerkleTree::new(storage.with_prefix(PREFIX_CLAIMS), cfg.claims_levels)?,
        revocations: MerkleTree::new(storage.with_prefix(PREFIX_REVOCATIONS), cfg.revocations_levels)?,
        roots: MerkleTree::new(storage.with_prefix(PREFIX_ROOTS), cfg.roots_levels)?,
    })
}

fn encode<T: Serialize>(value: &T) -> IdenResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| IdenError::Serialization(format!("bincode encode: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> IdenResult<T> {
    bincode::deserialize(bytes).map_err(|e| IdenError::Serialization(format!("bincode decode: {}", e)))
}

fn index_taken(tree: &MerkleTree, hi: &Hash) -> IdenResult<bool> {
    match tree.get_data_by_index(hi) {
        Ok(_) => Ok(true),
        Err(IdenError::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

impl Issuer {
    /// Creates a new identity in empty `storage`. The operational key claim
    /// for `signer` gets revocation nonce 0, `extra_genesis_claims` get the
    /// following nonces.
    pub fn new(
        cfg: &TreesConfig,
        storage: Arc<dyn Storage>,
        signer: Arc<dyn Signer>,
        writer: Arc<dyn IdenStateWriter>,
        extra_genesis_claims: Vec<Claim>,
    ) -> IdenResult<Self> {
        let meta = storage.with_prefix(PREFIX_ISSUER);
        if meta.get(KEY_GENESIS)?.is_some() {
            return Err(IdenError::Config("storage already holds an issuer".into()));
        }
        let trees = open_trees(cfg, &storage)?;

        let kop: Claim = ClaimAuthorizeKSignSecp256k1::new(signer.public_key())?.into();
        let mut next_nonce = 1u64;
        let extras: Vec<Claim> = extra_genesis_claims
            .into_iter()
            .map(|mut claim| {
                claim.metadata_mut().rev_nonce = next_nonce;
                next_nonce += 1;
                claim
            })
            .collect();

        let Genesis {
            id,
            iden_state,
            roots,
            proof_kop,
        } = calculate_genesis_in(&trees.claims, &trees.roots, &kop, &extras)?;

        let issuer = Self {
            id,
            proof_kop,
            claims: trees.claims,
            revocations: trees.revocations,
            roots: trees.roots,
            meta,
            signer,
            writer,
            state: RwLock::new(IssuerState {
                history: vec![HistoryEntry {
                    iden_state,
                    roots,
                    published: None,
                }],
                next_nonce,
                on_chain: None,
            }),
        };

        let mut tx = issuer.meta.new_tx()?;
        tx.put(
            KEY_GENESIS,
            &encode(&StoredGenesis {
                id,
                proof_kop: issuer.proof_kop.clone(),
            })?,
        );
        tx.put(KEY_STATE, &encode(&*issuer.state.read())?);
        tx.commit()?;

        info!(id = %id, state = %iden_state.short(), "Created issuer");
        Ok(issuer)
    }

    /// Reopens an issuer created earlier in `storage`.
    pub fn load(
        cfg: &TreesConfig,
        storage: Arc<dyn Storage>,
        signer: Arc<dyn Signer>,
        writer: Arc<dyn IdenStateWriter>,
    ) -> IdenResult<Self> {
        let meta = storage.with_prefix(PREFIX_ISSUER);
        let stored: StoredGenesis = decode(
            &meta
                .get(KEY_GENESIS)?
                .ok_or_else(|| IdenError::Config("no issuer in storage".into()))?,
        )?;
        let state: IssuerState = decode(
            &meta
                .get(KEY_STATE)?
                .ok_or_else(|| IdenError::Storage("issuer state missing".into()))?,
        )?;

        let kop = ClaimAuthorizeKSignSecp256k1::from_entry(&stored.proof_kop.claim)?;
        if *kop.pub_key() != signer.public_key() {
            return Err(IdenError::Crypto("signer does not hold the operational key".into()));
        }

        let trees = open_trees(cfg, &storage)?;
        if !trees.claims.entry_exists(&stored.proof_kop.claim)? {
            return Err(IdenError::Storage("operational key claim missing from claims tree".into()));
        }

        info!(id = %stored.id, states = state.history.len(), "Loaded issuer");
        Ok(Self {
            id: stored.id,
            proof_kop: stored.proof_kop,
            claims: trees.claims,
            revocations: trees.revocations,
            roots: trees.roots,
            meta,
            signer,
            writer,
            state: RwLock::new(state),
        })
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn proof_kop(&self) -> &ProofClaimGenesis {
        &self.proof_kop
    }

    pub fn claims_tree(&self) -> &MerkleTree {
        &self.claims
    }

    /// Roots of the three trees as they are now, published or not.
    pub fn roots(&self) -> IdenStateTreeRoots {
        IdenStateTreeRoots {
            claims_root: self.claims.root(),
            revocations_root: self.revocations.root(),
            roots_root: self.roots.root(),
        }
    }

    /// Identity state of the latest history entry.
    pub fn state(&self) -> Hash {
        let state = self.state.read();
        state
            .history
            .last()
            .map(|h| h.iden_state)
            .unwrap_or_default()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().history.clone()
    }

    pub fn state_on_chain(&self) -> Option<IdenStateData> {
        self.state.read().on_chain
    }

    fn persist(&self, state: &IssuerState) -> IdenResult<()> {
        let mut tx = self.meta.new_tx()?;
        tx.put(KEY_STATE, &encode(state)?);
        tx.commit()
    }

    /// Hands out the next revocation nonce. The counter is persisted before
    /// the nonce is used, so a later failure can only skip a nonce, never
    /// reuse one after a reload.
    fn reserve_nonce(&self, state: &mut IssuerState) -> IdenResult<u64> {
        let nonce = state.next_nonce;
        state.next_nonce += 1;
        if let Err(e) = self.persist(state) {
            state.next_nonce = nonce;
            return Err(e);
        }
        Ok(nonce)
    }

    /// Adds `claim` as version 0 with a fresh revocation nonce. Returns the
    /// claim as stored.
    pub fn issue_claim(&self, mut claim: Claim) -> IdenResult<Claim> {
        let mut state = self.state.write();
        claim.metadata_mut().version = 0;
        if index_taken(&self.claims, &claim.entry().h_index()?)? {
            return Err(IdenError::DuplicateIndex);
        }

        claim.metadata_mut().rev_nonce = self.reserve_nonce(&mut state)?;
        self.claims.add(&claim.entry())?;
        debug!(id = %self.id, claim_type = %claim.claim_type(), nonce = claim.metadata().rev_nonce, "Issued claim");
        Ok(claim)
    }

    /// Adds the next version of an updatable claim. The index of `claim`
    /// (apart from the version) must match a claim already issued; the
    /// value may differ. The superseded version's nonce is recorded in the
    /// revocations tree. A claim whose latest version is revoked cannot be
    /// updated.
    pub fn update_claim(&self, mut claim: Claim) -> IdenResult<Claim> {
        if !claim.metadata().header().updatable {
            return Err(IdenError::HeaderMismatch(format!(
                "{} claims are not updatable",
                claim.claim_type()
            )));
        }

        let mut state = self.state.write();
        let version = get_next_version(&self.claims, &claim.entry())?;
        if version == 0 {
            return Err(IdenError::NotFound);
        }
        let previous = self
            .claims
            .get_data_by_index(&with_version(&claim.entry(), version - 1).h_index()?)?;
        let superseded = RevocationLeaf::new(rev_nonce_of(&previous), version_of(&previous)).entry();
        if index_taken(&self.revocations, &superseded.h_index()?)? {
            return Err(IdenError::MtpExistence(format!(
                "version {} is already revoked",
                version - 1
            )));
        }

        let metadata = claim.metadata_mut();
        metadata.version = version;
        metadata.rev_nonce = self.reserve_nonce(&mut state)?;

        self.claims.add(&claim.entry())?;
        self.revocations.add(&superseded)?;
        debug!(id = %self.id, claim_type = %claim.claim_type(), version, "Updated claim");
        Ok(claim)
    }

    /// Revokes the latest version of `claim`.
    pub fn revoke_claim(&self, claim: &Claim) -> IdenResult<()> {
        let _state = self.state.write();
        let entry = claim.entry();
        let version = get_next_version(&self.claims, &entry)?;
        if version == 0 {
            return Err(IdenError::NotFound);
        }
        let latest = self
            .claims
            .get_data_by_index(&with_version(&entry, version - 1).h_index()?)?;
        let nonce = rev_nonce_of(&latest);
        self.revocations.add(&RevocationLeaf::revoked(nonce).entry())?;
        debug!(id = %self.id, nonce, "Revoked claim");
        Ok(())
    }

    pub fn sign_state(&self, old: &Hash, new: &Hash) -> IdenResult<Signature> {
        self.signer.sign(&state_transition_message(old, new))
    }

    /// Commits the current claims root to the roots tree, records the new
    /// identity state and hands it to the writer. Returns `None` if there is
    /// nothing new to publish. A state the writer rejected stays pending and
    /// is retried by the next call.
    pub fn publish_state(&self) -> IdenResult<Option<IdenStateData>> {
        let mut state = self.state.write();

        let root_leaf = RootLeaf::new(self.claims.root()).entry();
        if !index_taken(&self.roots, &root_leaf.h_index()?)? {
            self.roots.add(&root_leaf)?;
        }

        let roots = self.roots();
        let iden_state = roots.state()?;
        let last = state
            .history
            .last()
            .copied()
            .ok_or_else(|| IdenError::Internal("issuer history is empty".into()))?;
        if last.iden_state != iden_state {
            state.history.push(HistoryEntry {
                iden_state,
                roots,
                published: None,
            });
            self.persist(&state)?;
        } else if last.published.is_some() || state.history.len() == 1 {
            return Ok(None);
        }

        let genesis_state = state.history[0].iden_state;
        let old = state.on_chain.map(|d| d.iden_state).unwrap_or(genesis_state);
        let signature = self.sign_state(&old, &iden_state)?;
        let result = match state.on_chain {
            None => self
                .writer
                .init_state(&self.id, &genesis_state, &iden_state, &self.proof_kop, &signature),
            Some(_) => self.writer.set_state(&self.id, &iden_state, &signature),
        };
        let data = match result {
            Ok(data) => data,
            Err(e) => {
                warn!(id = %self.id, state = %iden_state.short(), error = %e, "State publication failed");
                return Err(e);
            }
        };

        if let Some(last) = state.history.last_mut() {
            last.published = Some(data);
        }
        state.on_chain = Some(data);
        self.persist(&state)?;
        info!(id = %self.id, block = data.block_n, state = %iden_state.short(), "Published identity state");
        Ok(Some(data))
    }

    /// History entry of the latest published state.
    fn published_entry(state: &IssuerState) -> IdenResult<(IdenStateData, IdenStateTreeRoots)> {
        let on_chain = state
            .on_chain
            .ok_or_else(|| IdenError::NotOnChain("identity has no published state".into()))?;
        state
            .history
            .iter()
            .rev()
            .find(|h| h.published == Some(on_chain))
            .map(|h| (on_chain, h.roots))
            .ok_or_else(|| IdenError::Internal("published state missing from history".into()))
    }

    pub fn gen_credential_existence(&self, claim: &Entry) -> IdenResult<CredentialExistence> {
        let state = self.state.read();
        let (data, roots) = Self::published_entry(&state)?;
        self.credential_existence_at(claim, data, &roots)
    }

    fn credential_existence_at(
        &self,
        claim: &Entry,
        data: IdenStateData,
        roots: &IdenStateTreeRoots,
    ) -> IdenResult<CredentialExistence> {
        let hi = claim.h_index()?;
        let published = self.claims.snapshot(&roots.claims_root)?;
        match published.get_data_by_index(&hi) {
            Ok(found) if found == *claim => {}
            Ok(_) => return Err(IdenError::NotFound),
            Err(IdenError::NotFound) => {
                return if self.claims.entry_exists(claim)? {
                    Err(IdenError::NotOnChain("claim not yet in a published state".into()))
                } else {
                    Err(IdenError::NotFound)
                };
            }
            Err(e) => return Err(e),
        }

        Ok(CredentialExistence {
            id: self.id,
            iden_state_data: data,
            mtp_claim: published.generate_proof(&hi, None)?,
            claim: claim.clone(),
            revocations_root: roots.revocations_root,
            roots_root: roots.roots_root,
        })
    }

    pub fn gen_credential_validity(&self, claim: &Entry) -> IdenResult<CredentialValidity> {
        let state = self.state.read();
        let (data, roots) = Self::published_entry(&state)?;
        let credential_existence = self.credential_existence_at(claim, data, &roots)?;

        let nonce_hi = RevocationLeaf::revoked(rev_nonce_of(claim)).entry().h_index()?;
        let mtp_not_nonce = self
            .revocations
            .generate_proof(&nonce_hi, Some(&roots.revocations_root))?;
        if mtp_not_nonce.existence {
            return Err(IdenError::MtpExistence("claim is revoked".into()));
        }

        Ok(CredentialValidity {
            credential_existence,
            iden_state_data: data,
            mtp_not_nonce,
            claims_root: roots.claims_root,
            roots_root: roots.roots_root,
        })
    }
}
