//! Cryptographic primitives for identity trees.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod blake3_ops;
pub mod poseidon;
pub mod secp256k1_ops;

pub use blake3_ops::*;
pub use poseidon::{bytes_to_fr, fr_to_hash, hash_elems, hash_hashes, poseidon_hash_fields};
pub use secp256k1_ops::*;

pub fn random_bytes<const N: usize>() -> [u8; N] {
    use rand::RngCore;
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
