//! Canonical Poseidon hash used for every tree node, entry half and identity
//! state.
//!
//! ## Parameters (BN254 scalar field)
//! - Width: 3 (rate=2, capacity=1)
//! - Full rounds: 8
//! - Partial rounds: 57
//! - S-box: x^5
//! - Round constants: Grain LFSR (arkworks standard)
//!
//! Inputs of any length are absorbed in order and the first squeezed element
//! is the output. Field elements cross the byte boundary as 32-byte
//! big-endian integers, and inputs at or above the modulus are rejected.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use ark_ff::{BigInteger, PrimeField};
use iden_types::{check_in_field, ElemBytes, Hash, IdenError, IdenResult, HASH_LEN};
use std::sync::OnceLock;

static CANONICAL_CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

pub fn canonical_config() -> &'static PoseidonConfig<Fr> {
    CANONICAL_CONFIG.get_or_init(|| {
        let rate = 2;
        let alpha = 5u64;
        let full_rounds = 8;
        let partial_rounds = 57;
        let field_bits = 254;

        let (ark, mds) =
            find_poseidon_ark_and_mds::<Fr>(field_bits, rate, full_rounds, partial_rounds, 0);

        PoseidonConfig {
            full_rounds: full_rounds as usize,
            partial_rounds: partial_rounds as usize,
            alpha,
            ark,
            mds,
            rate,
            capacity: 1,
        }
    })
}

pub fn poseidon_hash_fields(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(canonical_config());
    for input in inputs {
        sponge.absorb(input);
    }
    let output: Vec<Fr> = sponge.squeeze_field_elements(1);
    output[0]
}

/// Checked conversion from a big-endian 32-byte integer.
pub fn bytes_to_fr(bytes: &[u8; HASH_LEN]) -> IdenResult<Fr> {
    if !check_in_field(bytes) {
        return Err(IdenError::FieldOverflow(hex::encode(bytes)));
    }
    Ok(Fr::from_be_bytes_mod_order(bytes))
}

pub fn fr_to_hash(f: &Fr) -> Hash {
    let be = f.into_bigint().to_bytes_be();
    let mut bytes = [0u8; HASH_LEN];
    bytes[HASH_LEN - be.len()..].copy_from_slice(&be);
    Hash(bytes)
}

pub fn hash_hashes(inputs: &[Hash]) -> IdenResult<Hash> {
    let fields = inputs
        .iter()
        .map(|h| bytes_to_fr(&h.0))
        .collect::<IdenResult<Vec<_>>>()?;
    Ok(fr_to_hash(&poseidon_hash_fields(&fields)))
}

pub fn hash_elems(inputs: &[ElemBytes]) -> IdenResult<Hash> {
    let fields = inputs
        .iter()
        .map(|e| bytes_to_fr(&e.0))
        .collect::<IdenResult<Vec<_>>>()?;
    Ok(fr_to_hash(&poseidon_hash_fields(&fields)))
}
