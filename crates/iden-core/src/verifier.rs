//! Credential verification against the published state registry.

use crate::claims::{rev_nonce_of, Metadata};
use crate::clock::{Clock, SystemClock};
use crate::config::VerifierConfig;
use crate::leafs::RevocationLeaf;
use crate::proof::{CredentialExistence, CredentialValidity};
use crate::publisher::IdenStateReader;
use crate::state::{iden_state, IdenStateData};
use iden_crypto::constant_time_eq;
use iden_merkletree::root_from_proof;
use iden_types::{Hash, Id, IdenError, IdenResult};
use std::sync::Arc;
use tracing::warn;

pub struct Verifier {
    reader: Arc<dyn IdenStateReader>,
    clock: Arc<dyn Clock>,
    freshness_secs: i64,
}

impl Verifier {
    pub fn new(reader: Arc<dyn IdenStateReader>) -> Self {
        Self::with_clock(reader, Arc::new(SystemClock))
    }

    pub fn with_clock(reader: Arc<dyn IdenStateReader>, clock: Arc<dyn Clock>) -> Self {
        Self::from_config(&VerifierConfig::default(), reader, clock)
    }

    pub fn from_config(
        cfg: &VerifierConfig,
        reader: Arc<dyn IdenStateReader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reader,
            clock,
            freshness_secs: cfg.freshness_secs,
        }
    }

    pub fn freshness_secs(&self) -> i64 {
        self.freshness_secs
    }

    /// [`Self::verify_credential_validity`] with the configured freshness.
    pub fn verify_credential(&self, c: &CredentialValidity) -> IdenResult<()> {
        self.verify_credential_validity(c, self.freshness_secs)
    }

    pub fn verify_credential_existence(&self, c: &CredentialExistence) -> IdenResult<()> {
        self.check_existence(c).map_err(|e| {
            warn!(id = %c.id, error = %e, "Rejected credential existence");
            e
        })
    }

    /// `freshness_secs` is how old the credential's state may be before
    /// the current on-chain state must still be the same one.
    pub fn verify_credential_validity(&self, c: &CredentialValidity, freshness_secs: i64) -> IdenResult<()> {
        self.check_validity(c, freshness_secs).map_err(|e| {
            warn!(id = %c.credential_existence.id, error = %e, "Rejected credential validity");
            e
        })
    }

    fn check_existence(&self, c: &CredentialExistence) -> IdenResult<()> {
        let (hi, hv) = c.claim.hi_hv()?;
        let claims_root = root_from_proof(&c.mtp_claim, &hi, &hv)?;
        let state = iden_state(&claims_root, &c.revocations_root, &c.roots_root)?;
        if !same_state(&state, &c.iden_state_data.iden_state) {
            return Err(IdenError::StateMismatch(format!(
                "claim proof gives {}, credential says {}",
                state.short(),
                c.iden_state_data.iden_state.short()
            )));
        }
        if !c.mtp_claim.existence {
            return Err(IdenError::MtpNonExistence("claim proof shows non-existence".into()));
        }
        self.check_on_chain(&c.id, &c.iden_state_data)
    }

    fn check_validity(&self, c: &CredentialValidity, freshness_secs: i64) -> IdenResult<()> {
        let now = self.clock.now();
        let metadata = Metadata::unmarshal(&c.credential_existence.claim)?;
        if let Some(expiration) = metadata.expiration {
            if expiration < now {
                return Err(IdenError::ClaimExpired(expiration));
            }
        }

        self.check_existence(&c.credential_existence)?;

        if c.mtp_not_nonce.existence {
            return Err(IdenError::MtpExistence("claim nonce is in the revocations tree".into()));
        }

        let id = &c.credential_existence.id;
        if c.iden_state_data.block_ts <= now.saturating_sub(freshness_secs) {
            let current = self.reader.get_state(id)?;
            if current != c.iden_state_data {
                return Err(IdenError::OutdatedState(format!(
                    "credential state from block {} but chain is at block {}",
                    c.iden_state_data.block_n, current.block_n
                )));
            }
        }

        let nonce_leaf = RevocationLeaf::revoked(rev_nonce_of(&c.credential_existence.claim)).entry();
        let revocations_root = root_from_proof(&c.mtp_not_nonce, &nonce_leaf.h_index()?, &Hash::zero())?;
        let state = iden_state(&c.claims_root, &revocations_root, &c.roots_root)?;
        if !same_state(&state, &c.iden_state_data.iden_state) {
            return Err(IdenError::StateMismatch(format!(
                "non-revocation proof gives {}, credential says {}",
                state.short(),
                c.iden_state_data.iden_state.short()
            )));
        }

        self.check_on_chain(id, &c.iden_state_data)
    }

    fn check_on_chain(&self, id: &Id, data: &IdenStateData) -> IdenResult<()> {
        let on_chain = self.reader.get_state_by_block(id, data.block_n)?;
        if on_chain.block_n != data.block_n
            || on_chain.block_ts != data.block_ts
            || !same_state(&on_chain.iden_state, &data.iden_state)
        {
            return Err(IdenError::NotOnChain(format!(
                "{} state at block {} differs from credential",
                id, data.block_n
            )));
        }
        Ok(())
    }
}

fn same_state(a: &Hash, b: &Hash) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}
