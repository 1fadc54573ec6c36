//! Operational key signing.

use iden_crypto::{
    blake3_hash, derive_public_key, sign_digest, verify_digest, Secp256k1SecretKey,
    SECP256K1_PUBLIC_KEY_SIZE, SECP256K1_SIGNATURE_SIZE,
};
use iden_types::{Hash, IdenResult};

pub type PublicKey = [u8; SECP256K1_PUBLIC_KEY_SIZE];
pub type Signature = [u8; SECP256K1_SIGNATURE_SIZE];

const SET_STATE_DOMAIN: &[u8] = b"setstate:";

/// Holder of the operational key an identity publishes states with.
pub trait Signer: Send + Sync {
    fn public_key(&self) -> PublicKey;

    /// Signs the blake3 digest of `msg`.
    fn sign(&self, msg: &[u8]) -> IdenResult<Signature>;
}

pub struct Secp256k1Signer {
    secret: Secp256k1SecretKey,
    public: PublicKey,
}

impl Secp256k1Signer {
    pub fn new(secret: Secp256k1SecretKey) -> IdenResult<Self> {
        let public = derive_public_key(&secret)?;
        Ok(Self { secret, public })
    }

    pub fn generate() -> IdenResult<Self> {
        Self::new(Secp256k1SecretKey::generate())
    }
}

impl std::fmt::Debug for Secp256k1Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1Signer")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

impl Signer for Secp256k1Signer {
    fn public_key(&self) -> PublicKey {
        self.public
    }

    fn sign(&self, msg: &[u8]) -> IdenResult<Signature> {
        sign_digest(&self.secret, &blake3_hash(msg))
    }
}

pub fn verify_signature(public_key: &PublicKey, msg: &[u8], signature: &Signature) -> bool {
    verify_digest(public_key, &blake3_hash(msg), signature)
}

/// Bytes signed to authorize moving from `old` to `new`.
pub fn state_transition_message(old: &Hash, new: &Hash) -> Vec<u8> {
    let mut msg = Vec::with_capacity(SET_STATE_DOMAIN.len() + 64);
    msg.extend_from_slice(SET_STATE_DOMAIN);
    msg.extend_from_slice(old.as_bytes());
    msg.extend_from_slice(new.as_bytes());
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = Secp256k1Signer::new(Secp256k1SecretKey::from_bytes([3u8; 32]).unwrap()).unwrap();
        let msg = state_transition_message(&Hash::from_u64(1), &Hash::from_u64(2));
        let sig = signer.sign(&msg).unwrap();
        assert!(verify_signature(&signer.public_key(), &msg, &sig));

        let other = state_transition_message(&Hash::from_u64(1), &Hash::from_u64(3));
        assert!(!verify_signature(&signer.public_key(), &other, &sig));
    }

    #[test]
    fn test_debug_hides_secret() {
        let signer = Secp256k1Signer::generate().unwrap();
        let out = format!("{:?}", signer);
        assert!(out.contains(&hex::encode(signer.public_key())));
        assert!(!out.contains("secret"));
    }
}
