use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdenError {
    #[error("Field overflow: {0}")]
    FieldOverflow(String),

    #[error("Entry index already exists in the tree")]
    DuplicateIndex,

    #[error("Key not found in the tree")]
    NotFound,

    #[error("Claim header mismatch: {0}")]
    HeaderMismatch(String),

    #[error("Invalid claim type: {0}")]
    InvalidClaimType(String),

    #[error("Calculated identity state does not match: {0}")]
    StateMismatch(String),

    #[error("Identity state not found on chain: {0}")]
    NotOnChain(String),

    #[error("Merkle tree proof shows existence: {0}")]
    MtpExistence(String),

    #[error("Merkle tree proof shows non-existence: {0}")]
    MtpNonExistence(String),

    #[error("Claim expired at {0}")]
    ClaimExpired(i64),

    #[error("Identity state is outdated: {0}")]
    OutdatedState(String),

    #[error("Reached maximum level of the merkle tree")]
    ReachedMaxLevel,

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Merkle tree is not writable")]
    NotWritable,

    #[error("Nonce already registered: {0}")]
    DuplicateNonce(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type IdenResult<T> = Result<T, IdenError>;
