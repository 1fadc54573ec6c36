//! On-chain identity state registry.
//!
//! The chain itself is out of reach of this crate: readers and writers are
//! traits the caller injects. [`MemoryStatePublisher`] keeps the registry in
//! memory and mints one block per accepted write.

use crate::claims::{ClaimAuthorizeKSignSecp256k1, ClaimVariant};
use crate::clock::Clock;
use crate::genesis::ProofClaimGenesis;
use crate::signer::{state_transition_message, verify_signature, PublicKey, Signature};
use crate::state::IdenStateData;
use iden_types::{Hash, Id, IdenError, IdenResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub trait IdenStateReader: Send + Sync {
    /// Latest published state of `id`.
    fn get_state(&self, id: &Id) -> IdenResult<IdenStateData>;

    /// State of `id` as of block `block_n`.
    fn get_state_by_block(&self, id: &Id, block_n: u64) -> IdenResult<IdenStateData>;

    /// State of `id` as of unix time `ts`.
    fn get_state_by_time(&self, id: &Id, ts: i64) -> IdenResult<IdenStateData>;
}

pub trait IdenStateWriter: Send + Sync {
    /// First transition away from the genesis state. The operational key
    /// proven by `proof_kop` signs this and every later transition.
    fn init_state(
        &self,
        id: &Id,
        genesis_state: &Hash,
        new_state: &Hash,
        proof_kop: &ProofClaimGenesis,
        signature: &Signature,
    ) -> IdenResult<IdenStateData>;

    fn set_state(&self, id: &Id, new_state: &Hash, signature: &Signature) -> IdenResult<IdenStateData>;
}

struct Registered {
    kop: PublicKey,
    states: Vec<IdenStateData>,
}

pub struct MemoryStatePublisher {
    identities: RwLock<HashMap<Id, Registered>>,
    block: Mutex<(u64, i64)>,
    clock: Arc<dyn Clock>,
}

impl MemoryStatePublisher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
            block: Mutex::new((1, i64::MIN)),
            clock,
        }
    }

    /// Block number and timestamp for the next write. Timestamps never go
    /// backwards even if the clock does.
    fn next_block(&self) -> (u64, i64) {
        let mut block = self.block.lock();
        let n = block.0;
        let ts = self.clock.now().max(block.1);
        *block = (n + 1, ts);
        (n, ts)
    }

    fn last_matching<F>(&self, id: &Id, pred: F) -> IdenResult<IdenStateData>
    where
        F: Fn(&IdenStateData) -> bool,
    {
        let identities = self.identities.read();
        let registered = identities
            .get(id)
            .ok_or_else(|| IdenError::NotOnChain(id.to_string()))?;
        registered
            .states
            .iter()
            .rev()
            .find(|s| pred(s))
            .copied()
            .ok_or_else(|| IdenError::NotOnChain(format!("{} has no state that early", id)))
    }
}

impl IdenStateReader for MemoryStatePublisher {
    fn get_state(&self, id: &Id) -> IdenResult<IdenStateData> {
        self.last_matching(id, |_| true)
    }

    fn get_state_by_block(&self, id: &Id, block_n: u64) -> IdenResult<IdenStateData> {
        self.last_matching(id, |s| s.block_n <= block_n)
    }

    fn get_state_by_time(&self, id: &Id, ts: i64) -> IdenResult<IdenStateData> {
        self.last_matching(id, |s| s.block_ts <= ts)
    }
}

impl IdenStateWriter for MemoryStatePublisher {
    fn init_state(
        &self,
        id: &Id,
        genesis_state: &Hash,
        new_state: &Hash,
        proof_kop: &ProofClaimGenesis,
        signature: &Signature,
    ) -> IdenResult<IdenStateData> {
        if Id::from_genesis_state(genesis_state) != *id || proof_kop.id != *id {
            return Err(IdenError::StateMismatch(format!("genesis state does not belong to {}", id)));
        }
        proof_kop.verify()?;
        let kop = *ClaimAuthorizeKSignSecp256k1::from_entry(&proof_kop.claim)?.pub_key();
        if !verify_signature(&kop, &state_transition_message(genesis_state, new_state), signature) {
            warn!(id = %id, "Rejected init_state with bad signature");
            return Err(IdenError::Crypto("state transition signature does not verify".into()));
        }

        let mut identities = self.identities.write();
        if identities.contains_key(id) {
            return Err(IdenError::StateMismatch(format!("{} is already initialised", id)));
        }
        let (block_n, block_ts) = self.next_block();
        let data = IdenStateData {
            block_n,
            block_ts,
            iden_state: *new_state,
        };
        identities.insert(
            *id,
            Registered {
                kop,
                states: vec![data],
            },
        );
        debug!(id = %id, block = block_n, state = %new_state.short(), "Initialised state");
        Ok(data)
    }

    fn set_state(&self, id: &Id, new_state: &Hash, signature: &Signature) -> IdenResult<IdenStateData> {
        let mut identities = self.identities.write();
        let registered = identities
            .get_mut(id)
            .ok_or_else(|| IdenError::NotOnChain(id.to_string()))?;
        let old = registered
            .states
            .last()
            .map(|s| s.iden_state)
            .ok_or_else(|| IdenError::Internal("registered identity without states".into()))?;

        if !verify_signature(&registered.kop, &state_transition_message(&old, new_state), signature) {
            warn!(id = %id, "Rejected set_state with bad signature");
            return Err(IdenError::Crypto("state transition signature does not verify".into()));
        }

        let (block_n, block_ts) = self.next_block();
        let data = IdenStateData {
            block_n,
            block_ts,
            iden_state: *new_state,
        };
        registered.states.push(data);
        debug!(id = %id, block = block_n, state = %new_state.short(), "Set state");
        Ok(data)
    }
}
