use crate::constants::*;
use crate::error::{IdenError, IdenResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Returns true if the big-endian integer in `bytes` is below the field modulus.
pub fn check_in_field(bytes: &[u8; ELEM_BYTES_LEN]) -> bool {
    bytes.as_slice() < FIELD_MODULUS_BE.as_slice()
}

fn decode_hex_32(s: &str) -> IdenResult<[u8; 32]> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| IdenError::Serialization(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(IdenError::Serialization(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// A 32-byte big-endian field element used as tree key, tree value or state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Build a hash, rejecting values outside the field.
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> IdenResult<Self> {
        if !check_in_field(&bytes) {
            return Err(IdenError::FieldOverflow(hex::encode(bytes)));
        }
        Ok(Self(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> IdenResult<Self> {
        let arr: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| IdenError::Serialization(format!("invalid hash length {}", bytes.len())))?;
        Self::from_bytes(arr)
    }

    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; HASH_LEN];
        bytes[HASH_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> IdenResult<Self> {
        Self::from_bytes(decode_hex_32(s)?)
    }

    pub fn zero() -> Self {
        Self([0u8; HASH_LEN])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// First bytes in hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// One 32-byte slot of a claim entry.
///
/// Byte 0 is the most significant byte and is kept at zero by every
/// constructor except [`ElemBytes::from_bytes`], which instead checks the
/// full value against the field modulus.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ElemBytes(pub [u8; ELEM_BYTES_LEN]);

impl ElemBytes {
    pub fn from_bytes(bytes: [u8; ELEM_BYTES_LEN]) -> IdenResult<Self> {
        if !check_in_field(&bytes) {
            return Err(IdenError::FieldOverflow(hex::encode(bytes)));
        }
        Ok(Self(bytes))
    }

    /// Right-aligns up to 31 bytes of payload, leaving the reserved byte clear.
    pub fn from_payload(payload: &[u8]) -> IdenResult<Self> {
        if payload.len() > ELEM_PAYLOAD_LEN {
            return Err(IdenError::FieldOverflow(format!(
                "payload of {} bytes does not fit a slot",
                payload.len()
            )));
        }
        let mut bytes = [0u8; ELEM_BYTES_LEN];
        bytes[ELEM_BYTES_LEN - payload.len()..].copy_from_slice(payload);
        Ok(Self(bytes))
    }

    pub fn from_u64(n: u64) -> Self {
        Self(Hash::from_u64(n).0)
    }

    pub fn zero() -> Self {
        Self([0u8; ELEM_BYTES_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; ELEM_BYTES_LEN] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; ELEM_BYTES_LEN] {
        &mut self.0
    }

    /// The 31 bytes after the reserved byte.
    pub fn payload(&self) -> &[u8] {
        &self.0[1..]
    }

    pub fn in_field(&self) -> bool {
        check_in_field(&self.0)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> IdenResult<Self> {
        Self::from_bytes(decode_hex_32(s)?)
    }

    pub fn to_hash(&self) -> IdenResult<Hash> {
        Hash::from_bytes(self.0)
    }
}

impl From<Hash> for ElemBytes {
    fn from(h: Hash) -> Self {
        Self(h.0)
    }
}

impl fmt::Debug for ElemBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElemBytes({})", self.to_hex())
    }
}

impl fmt::Display for ElemBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ElemBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ElemBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_modulus_is_out_of_field() {
        assert!(!check_in_field(&FIELD_MODULUS_BE));

        let mut below = FIELD_MODULUS_BE;
        below[31] -= 1;
        assert!(check_in_field(&below));
    }

    #[test]
    fn test_hash_rejects_overflow() {
        let err = Hash::from_bytes([0xff; 32]).unwrap_err();
        assert!(matches!(err, IdenError::FieldOverflow(_)));
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = Hash::from_u64(0xdead_beef);
        let hex = h.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(Hash::from_hex(&hex).unwrap(), h);
        assert_eq!(Hash::from_hex(hex.trim_start_matches("0x")).unwrap(), h);
    }

    #[test]
    fn test_hash_serde_as_hex() {
        let h = Hash::from_u64(7);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_payload_too_long() {
        assert!(ElemBytes::from_payload(&[1u8; 31]).is_ok());
        assert!(matches!(
            ElemBytes::from_payload(&[1u8; 32]),
            Err(IdenError::FieldOverflow(_))
        ));
    }

    #[test]
    fn test_payload_right_aligned() {
        let e = ElemBytes::from_payload(b"c1").unwrap();
        assert_eq!(&e.0[30..], b"c1");
        assert_eq!(e.0[0], 0);
    }

    proptest! {
        #[test]
        fn prop_reserved_byte_zero_is_in_field(rest in proptest::collection::vec(any::<u8>(), 31)) {
            let mut bytes = [0u8; 32];
            bytes[1..].copy_from_slice(&rest);
            prop_assert!(ElemBytes::from_bytes(bytes).is_ok());
        }

        #[test]
        fn prop_top_byte_over_modulus_rejected(top in 0x31u8..=0xff, rest in proptest::collection::vec(any::<u8>(), 31)) {
            let mut bytes = [0u8; 32];
            bytes[0] = top;
            bytes[1..].copy_from_slice(&rest);
            prop_assert!(ElemBytes::from_bytes(bytes).is_err());
        }
    }
}
