use crate::constants::*;
use crate::error::{IdenError, IdenResult};
use crate::hash::{ElemBytes, Hash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier type for identities whose genesis is a BabyJubJub/Poseidon state.
pub const ID_TYPE_BJP0: [u8; ID_TYPE_LEN] = [0x00, 0x00];

/// Identity identifier: `type (2) | genesis (27) | checksum (2)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(pub [u8; ID_LEN]);

impl Id {
    /// Build an identifier from its type and genesis, appending the checksum.
    pub fn new(id_type: [u8; ID_TYPE_LEN], genesis: [u8; ID_GENESIS_LEN]) -> Self {
        let checksum = checksum(&id_type, &genesis);
        let mut bytes = [0u8; ID_LEN];
        bytes[..ID_TYPE_LEN].copy_from_slice(&id_type);
        bytes[ID_TYPE_LEN..ID_TYPE_LEN + ID_GENESIS_LEN].copy_from_slice(&genesis);
        bytes[ID_LEN - ID_CHECKSUM_LEN..].copy_from_slice(&checksum);
        Self(bytes)
    }

    /// Derive the genesis identifier from an initial identity state.
    ///
    /// The genesis part is the least significant bytes of the state.
    pub fn from_genesis_state(state: &Hash) -> Self {
        let mut genesis = [0u8; ID_GENESIS_LEN];
        genesis.copy_from_slice(&state.0[HASH_LEN - ID_GENESIS_LEN..]);
        Self::new(ID_TYPE_BJP0, genesis)
    }

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> IdenResult<Self> {
        let id = Self(bytes);
        if !id.checksum_valid() {
            return Err(IdenError::InvalidId("checksum mismatch".into()));
        }
        Ok(id)
    }

    pub fn from_slice(bytes: &[u8]) -> IdenResult<Self> {
        let arr: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| IdenError::InvalidId(format!("invalid length {}", bytes.len())))?;
        Self::from_bytes(arr)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn id_type(&self) -> [u8; ID_TYPE_LEN] {
        [self.0[0], self.0[1]]
    }

    pub fn genesis(&self) -> [u8; ID_GENESIS_LEN] {
        let mut genesis = [0u8; ID_GENESIS_LEN];
        genesis.copy_from_slice(&self.0[ID_TYPE_LEN..ID_TYPE_LEN + ID_GENESIS_LEN]);
        genesis
    }

    pub fn checksum_valid(&self) -> bool {
        let expected = checksum(&self.id_type(), &self.genesis());
        self.0[ID_LEN - ID_CHECKSUM_LEN..] == expected
    }

    /// Identifier packed into a claim slot.
    pub fn to_elem(&self) -> ElemBytes {
        let mut bytes = [0u8; ELEM_BYTES_LEN];
        bytes[1..].copy_from_slice(&self.0);
        ElemBytes(bytes)
    }

    pub fn from_elem(elem: &ElemBytes) -> IdenResult<Self> {
        Self::from_slice(elem.payload())
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn from_base58(s: &str) -> IdenResult<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| IdenError::InvalidId(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

fn checksum(id_type: &[u8; ID_TYPE_LEN], genesis: &[u8; ID_GENESIS_LEN]) -> [u8; ID_CHECKSUM_LEN] {
    let sum = id_type
        .iter()
        .chain(genesis.iter())
        .fold(0u16, |acc, b| acc.wrapping_add(*b as u16));
    sum.to_le_bytes()
}

impl FromStr for Id {
    type Err = IdenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_base58())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_id() -> Id {
        let mut genesis = [0u8; ID_GENESIS_LEN];
        for (i, b) in genesis.iter_mut().enumerate() {
            *b = i as u8 * 7;
        }
        Id::new(ID_TYPE_BJP0, genesis)
    }

    #[test]
    fn test_base58_roundtrip() {
        let id = sample_id();
        let s = id.to_string();
        let parsed: Id = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut bytes = sample_id().0;
        bytes[5] ^= 0x01;
        assert!(matches!(Id::from_bytes(bytes), Err(IdenError::InvalidId(_))));
    }

    #[test]
    fn test_genesis_from_state_takes_low_bytes() {
        let state = Hash::from_u64(0x0102_0304);
        let id = Id::from_genesis_state(&state);
        let genesis = id.genesis();
        assert_eq!(&genesis[ID_GENESIS_LEN - 4..], &[1, 2, 3, 4]);
        assert_eq!(id.id_type(), ID_TYPE_BJP0);
        assert!(id.checksum_valid());
    }

    #[test]
    fn test_elem_roundtrip() {
        let id = sample_id();
        let elem = id.to_elem();
        assert!(elem.in_field());
        assert_eq!(Id::from_elem(&elem).unwrap(), id);
    }

    #[test]
    fn test_serde_uses_base58() {
        let id = sample_id();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_base58()));
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
