use super::{prefixed, Storage, StorageMetrics, Tx, TxCache};
use iden_types::IdenResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// In-memory backend. Clones and prefixed views share the same map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    kv: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    prefix: Vec<u8>,
    metrics: Arc<StorageMetrics>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.kv.read().keys().filter(|k| k.starts_with(&self.prefix)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> Arc<StorageMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Storage for MemoryStorage {
    fn new_tx(&self) -> IdenResult<Box<dyn Tx + '_>> {
        Ok(Box::new(MemoryTx {
            storage: self,
            cache: TxCache::default(),
        }))
    }

    fn with_prefix(&self, prefix: &[u8]) -> Arc<dyn Storage> {
        Arc::new(Self {
            kv: Arc::clone(&self.kv),
            prefix: prefixed(&self.prefix, prefix),
            metrics: Arc::clone(&self.metrics),
        })
    }

    fn get(&self, key: &[u8]) -> IdenResult<Option<Vec<u8>>> {
        self.metrics.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.kv.read().get(&prefixed(&self.prefix, key)).cloned())
    }

    fn iterate(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> IdenResult<bool>) -> IdenResult<()> {
        // Copy out first so the callback may use the storage.
        let items: Vec<(Vec<u8>, Vec<u8>)> = {
            let kv = self.kv.read();
            kv.range(self.prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&self.prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        for (k, v) in items {
            if !f(&k[self.prefix.len()..], &v)? {
                break;
            }
        }
        Ok(())
    }

    fn info(&self) -> String {
        format!("in-memory storage, {} keys", self.len())
    }

    fn close(&self) -> IdenResult<()> {
        Ok(())
    }
}

struct MemoryTx<'a> {
    storage: &'a MemoryStorage,
    cache: TxCache,
}

impl Tx for MemoryTx<'_> {
    fn get(&self, key: &[u8]) -> IdenResult<Option<Vec<u8>>> {
        let full = prefixed(&self.storage.prefix, key);
        if let Some(v) = self.cache.get(&full) {
            return Ok(Some(v));
        }
        self.storage.metrics.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.storage.kv.read().get(&full).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.cache.put(prefixed(&self.storage.prefix, key), value);
    }

    fn commit(self: Box<Self>) -> IdenResult<()> {
        let MemoryTx { storage, cache } = *self;
        let writes = cache.writes.len() as u64;
        let mut kv = storage.kv.write();
        for (k, v) in cache.writes {
            kv.insert(k, v);
        }
        storage.metrics.writes.fetch_add(writes, Ordering::Relaxed);
        storage.metrics.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
