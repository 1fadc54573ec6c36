use iden_types::{IdenError, IdenResult};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const SECP256K1_SECRET_KEY_SIZE: usize = 32;

pub const SECP256K1_PUBLIC_KEY_SIZE: usize = 33;

pub const SECP256K1_SIGNATURE_SIZE: usize = 64;

thread_local! {
    static SECP256K1_CTX: Secp256k1<secp256k1::All> = Secp256k1::new();
}

/// Raw secp256k1 secret key, wiped when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secp256k1SecretKey([u8; SECP256K1_SECRET_KEY_SIZE]);

impl Secp256k1SecretKey {
    pub fn from_bytes(bytes: [u8; SECP256K1_SECRET_KEY_SIZE]) -> IdenResult<Self> {
        SecretKey::from_slice(&bytes).map_err(|e| IdenError::Crypto(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn generate() -> Self {
        loop {
            let bytes = crate::random_bytes::<SECP256K1_SECRET_KEY_SIZE>();
            if SecretKey::from_slice(&bytes).is_ok() {
                return Self(bytes);
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8; SECP256K1_SECRET_KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for Secp256k1SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secp256k1SecretKey(..)")
    }
}

/// Checks that `bytes` is a valid compressed secp256k1 point.
pub fn validate_compressed_public_key(bytes: &[u8; SECP256K1_PUBLIC_KEY_SIZE]) -> IdenResult<()> {
    PublicKey::from_slice(bytes)
        .map(|_| ())
        .map_err(|e| IdenError::Crypto(format!("invalid secp256k1 public key: {}", e)))
}

pub fn derive_public_key(secret: &Secp256k1SecretKey) -> IdenResult<[u8; SECP256K1_PUBLIC_KEY_SIZE]> {
    SECP256K1_CTX.with(|ctx| {
        let sk = SecretKey::from_slice(&secret.0).map_err(|e| IdenError::Crypto(e.to_string()))?;
        Ok(PublicKey::from_secret_key(ctx, &sk).serialize())
    })
}

/// ECDSA over a 32-byte digest, compact `r || s` encoding.
pub fn sign_digest(
    secret: &Secp256k1SecretKey,
    digest: &[u8; 32],
) -> IdenResult<[u8; SECP256K1_SIGNATURE_SIZE]> {
    SECP256K1_CTX.with(|ctx| {
        let sk = SecretKey::from_slice(&secret.0).map_err(|e| IdenError::Crypto(e.to_string()))?;
        let msg = Message::from_digest_slice(digest).map_err(|e| IdenError::Crypto(e.to_string()))?;
        Ok(ctx.sign_ecdsa(&msg, &sk).serialize_compact())
    })
}

pub fn verify_digest(
    public_key: &[u8; SECP256K1_PUBLIC_KEY_SIZE],
    digest: &[u8; 32],
    signature: &[u8; SECP256K1_SIGNATURE_SIZE],
) -> bool {
    SECP256K1_CTX.with(|ctx| {
        let Ok(pk) = PublicKey::from_slice(public_key) else {
            return false;
        };
        let Ok(msg) = Message::from_digest_slice(digest) else {
            return false;
        };
        let Ok(sig) = Signature::from_compact(signature) else {
            return false;
        };
        ctx.verify_ecdsa(&msg, &sig, &pk).is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let sk = Secp256k1SecretKey::generate();
        let pk = derive_public_key(&sk).unwrap();
        let digest = crate::blake3_hash(b"identity state");

        let sig = sign_digest(&sk, &digest).unwrap();
        assert!(verify_digest(&pk, &digest, &sig));

        let other = crate::blake3_hash(b"other state");
        assert!(!verify_digest(&pk, &other, &sig));
    }

    #[test]
    fn test_compressed_key_validation() {
        let sk = Secp256k1SecretKey::from_bytes([0x11; 32]).unwrap();
        let pk = derive_public_key(&sk).unwrap();
        assert!(validate_compressed_public_key(&pk).is_ok());

        let mut bad = pk;
        bad[0] = 0x05;
        assert!(validate_compressed_public_key(&bad).is_err());
    }

    #[test]
    fn test_zero_secret_rejected() {
        assert!(Secp256k1SecretKey::from_bytes([0u8; 32]).is_err());
    }
}
