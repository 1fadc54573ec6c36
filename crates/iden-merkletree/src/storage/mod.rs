//! Key/value backends for tree nodes.
//!
//! Writes always go through a [`Tx`]: they are buffered in a transaction-local
//! cache and reach the backend only on [`Tx::commit`]. Dropping a transaction
//! without committing discards its writes.

mod memory;
mod metrics;
mod sled_store;

pub use memory::MemoryStorage;
pub use metrics::{StorageMetrics, StorageMetricsSnapshot};
pub use sled_store::SledStorage;

use iden_types::IdenResult;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type KV = (Vec<u8>, Vec<u8>);

pub trait Storage: Send + Sync {
    fn new_tx(&self) -> IdenResult<Box<dyn Tx + '_>>;

    /// A view of the same backend with `prefix` appended to this view's prefix.
    fn with_prefix(&self, prefix: &[u8]) -> Arc<dyn Storage>;

    fn get(&self, key: &[u8]) -> IdenResult<Option<Vec<u8>>>;

    /// Visits every key under this view's prefix, in key order, with the
    /// prefix stripped. Stops early when `f` returns `false`.
    fn iterate(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> IdenResult<bool>) -> IdenResult<()>;

    fn list(&self, limit: usize) -> IdenResult<Vec<KV>> {
        let mut out = Vec::new();
        self.iterate(&mut |k, v| {
            if out.len() >= limit {
                return Ok(false);
            }
            out.push((k.to_vec(), v.to_vec()));
            Ok(true)
        })?;
        Ok(out)
    }

    fn info(&self) -> String;

    fn close(&self) -> IdenResult<()>;
}

pub trait Tx {
    /// Reads the transaction's own writes first, then the backend.
    fn get(&self, key: &[u8]) -> IdenResult<Option<Vec<u8>>>;

    fn put(&mut self, key: &[u8], value: &[u8]);

    fn commit(self: Box<Self>) -> IdenResult<()>;

    /// Discards every buffered write.
    fn close(self: Box<Self>) {}
}

pub(crate) fn prefixed(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(prefix.len() + key.len());
    full.extend_from_slice(prefix);
    full.extend_from_slice(key);
    full
}

/// Write cache shared by the backend transactions.
#[derive(Default)]
pub(crate) struct TxCache {
    pub(crate) writes: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TxCache {
    pub(crate) fn get(&self, full_key: &[u8]) -> Option<Vec<u8>> {
        self.writes.get(full_key).cloned()
    }

    pub(crate) fn put(&mut self, full_key: Vec<u8>, value: &[u8]) {
        self.writes.insert(full_key, value.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(storage: Arc<dyn Storage>) {
        let mut tx = storage.new_tx().unwrap();
        tx.put(b"a", b"1");
        assert_eq!(tx.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(storage.get(b"a").unwrap(), None);
        tx.commit().unwrap();
        assert_eq!(storage.get(b"a").unwrap(), Some(b"1".to_vec()));

        {
            let mut tx = storage.new_tx().unwrap();
            tx.put(b"b", b"2");
        }
        assert_eq!(storage.get(b"b").unwrap(), None);

        let mut tx = storage.new_tx().unwrap();
        tx.put(b"c", b"3");
        tx.close();
        assert_eq!(storage.get(b"c").unwrap(), None);
    }

    fn exercise_prefix(storage: Arc<dyn Storage>) {
        let left = storage.with_prefix(b"left:");
        let right = storage.with_prefix(b"right:");

        let mut tx = left.new_tx().unwrap();
        tx.put(b"k", b"L");
        tx.commit().unwrap();
        let mut tx = right.new_tx().unwrap();
        tx.put(b"k", b"R");
        tx.put(b"z", b"R2");
        tx.commit().unwrap();

        assert_eq!(left.get(b"k").unwrap(), Some(b"L".to_vec()));
        assert_eq!(right.get(b"k").unwrap(), Some(b"R".to_vec()));
        assert_eq!(storage.get(b"left:k").unwrap(), Some(b"L".to_vec()));

        let listed = right.list(10).unwrap();
        assert_eq!(listed, vec![(b"k".to_vec(), b"R".to_vec()), (b"z".to_vec(), b"R2".to_vec())]);
        assert_eq!(right.list(1).unwrap().len(), 1);

        let nested = left.with_prefix(b"inner:");
        let mut tx = nested.new_tx().unwrap();
        tx.put(b"x", b"N");
        tx.commit().unwrap();
        assert_eq!(storage.get(b"left:inner:x").unwrap(), Some(b"N".to_vec()));
    }

    #[test]
    fn test_memory_tx_semantics() {
        exercise(Arc::new(MemoryStorage::new()));
    }

    #[test]
    fn test_memory_prefixes() {
        exercise_prefix(Arc::new(MemoryStorage::new()));
    }

    #[test]
    fn test_sled_tx_semantics() {
        exercise(Arc::new(SledStorage::temporary().unwrap()));
    }

    #[test]
    fn test_sled_prefixes() {
        exercise_prefix(Arc::new(SledStorage::temporary().unwrap()));
    }
}
