//! Identities built on sparse Merkle trees.
//!
//! An identity owns three trees: claims, revocations and roots. Their roots
//! hash into the Identity State, which an issuer publishes through an
//! [`IdenStateWriter`] and a verifier checks through an
//! [`IdenStateReader`]. The identifier itself is derived from the first
//! (genesis) state.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod claims;
pub mod clock;
pub mod config;
pub mod genesis;
pub mod issuer;
pub mod leafs;
pub mod logging;
pub mod nonce_db;
pub mod proof;
pub mod publisher;
pub mod signer;
pub mod state;
pub mod verifier;

pub use claims::{Claim, ClaimHeader, ClaimType, ClaimVariant, Metadata, Subject, SubjectKind};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    IdenConfig, LogLevel, LoggingConfig, NonceConfig, StorageBackend, TreesConfig, VerifierConfig,
};
pub use genesis::{calculate_genesis, calculate_genesis_in, Genesis, ProofClaimGenesis};
pub use issuer::{HistoryEntry, Issuer};
pub use leafs::{RevocationLeaf, RootLeaf, MAX_VERSION};
pub use logging::init_logging;
pub use nonce_db::{NonceDb, NonceObj};
pub use proof::{
    get_next_version, non_revocation_proof, predicate_proof, verify_predicate_proof,
    CredentialExistence, CredentialValidity, PredicateProof,
};
pub use publisher::{IdenStateReader, IdenStateWriter, MemoryStatePublisher};
pub use signer::{verify_signature, Secp256k1Signer, Signer};
pub use state::{iden_state, IdenStateData, IdenStateTreeRoots};
pub use verifier::Verifier;
