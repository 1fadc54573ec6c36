use iden_crypto::hash_elems;
use iden_types::{
    ElemBytes, Hash, IdenError, IdenResult, DATA_LEN, ELEM_BYTES_LEN, ENTRY_BYTES_LEN, INDEX_SLOTS,
    VALUE_SLOTS,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// On-tree representation of a claim: four index slots then four value slots.
///
/// `h_index` and `h_value` are computed on first use and cached.
#[derive(Clone, Default)]
pub struct Entry {
    data: [ElemBytes; DATA_LEN],
    h_index: OnceLock<Hash>,
    h_value: OnceLock<Hash>,
}

impl Entry {
    pub fn new(index: [ElemBytes; INDEX_SLOTS], value: [ElemBytes; VALUE_SLOTS]) -> Self {
        let mut data = [ElemBytes::zero(); DATA_LEN];
        data[..INDEX_SLOTS].copy_from_slice(&index);
        data[INDEX_SLOTS..].copy_from_slice(&value);
        Self::from_data(data)
    }

    pub fn from_data(data: [ElemBytes; DATA_LEN]) -> Self {
        Self {
            data,
            h_index: OnceLock::new(),
            h_value: OnceLock::new(),
        }
    }

    pub fn data(&self) -> &[ElemBytes; DATA_LEN] {
        &self.data
    }

    pub fn index(&self) -> &[ElemBytes] {
        &self.data[..INDEX_SLOTS]
    }

    pub fn value(&self) -> &[ElemBytes] {
        &self.data[INDEX_SLOTS..]
    }

    pub fn in_field(&self) -> bool {
        self.data.iter().all(ElemBytes::in_field)
    }

    pub fn h_index(&self) -> IdenResult<Hash> {
        if let Some(h) = self.h_index.get() {
            return Ok(*h);
        }
        let h = hash_elems(self.index())?;
        let _ = self.h_index.set(h);
        Ok(h)
    }

    pub fn h_value(&self) -> IdenResult<Hash> {
        if let Some(h) = self.h_value.get() {
            return Ok(*h);
        }
        let h = hash_elems(self.value())?;
        let _ = self.h_value.set(h);
        Ok(h)
    }

    pub fn hi_hv(&self) -> IdenResult<(Hash, Hash)> {
        Ok((self.h_index()?, self.h_value()?))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENTRY_BYTES_LEN);
        for elem in &self.data {
            out.extend_from_slice(elem.as_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> IdenResult<Self> {
        if bytes.len() != ENTRY_BYTES_LEN {
            return Err(IdenError::Serialization(format!(
                "entry must be {} bytes, got {}",
                ENTRY_BYTES_LEN,
                bytes.len()
            )));
        }
        let mut data = [ElemBytes::zero(); DATA_LEN];
        for (slot, chunk) in data.iter_mut().zip(bytes.chunks_exact(ELEM_BYTES_LEN)) {
            let mut arr = [0u8; ELEM_BYTES_LEN];
            arr.copy_from_slice(chunk);
            *slot = ElemBytes::from_bytes(arr)?;
        }
        Ok(Self::from_data(data))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn from_hex(s: &str) -> IdenResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| IdenError::Serialization(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Entry {}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("index", &self.index())
            .field("value", &self.value())
            .finish()
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
