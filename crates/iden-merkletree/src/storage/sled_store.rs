use super::{prefixed, Storage, StorageMetrics, Tx, TxCache};
use iden_types::{IdenError, IdenResult};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// Persistent backend on top of sled. Commits are applied as one atomic batch.
#[derive(Clone)]
pub struct SledStorage {
    db: sled::Db,
    prefix: Vec<u8>,
    metrics: Arc<StorageMetrics>,
}

impl SledStorage {
    pub fn open(path: impl AsRef<Path>) -> IdenResult<Self> {
        let path = path.as_ref();
        info!("Opening tree storage at {:?}", path);

        let db = sled::Config::new()
            .path(path)
            .mode(sled::Mode::HighThroughput)
            .open()
            .map_err(|e| IdenError::Storage(format!("Failed to open database: {}", e)))?;

        Ok(Self::from_db(db))
    }

    pub fn temporary() -> IdenResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| IdenError::Storage(format!("Failed to open temporary database: {}", e)))?;

        Ok(Self::from_db(db))
    }

    fn from_db(db: sled::Db) -> Self {
        Self {
            db,
            prefix: Vec::new(),
            metrics: Arc::new(StorageMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<StorageMetrics> {
        Arc::clone(&self.metrics)
    }

    fn read(&self, full_key: &[u8]) -> IdenResult<Option<Vec<u8>>> {
        self.metrics.reads.fetch_add(1, Ordering::Relaxed);
        self.db
            .get(full_key)
            .map(|v| v.map(|ivec| ivec.to_vec()))
            .map_err(|e| {
                self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                IdenError::Storage(format!("Read error: {}", e))
            })
    }
}

impl Storage for SledStorage {
    fn new_tx(&self) -> IdenResult<Box<dyn Tx + '_>> {
        Ok(Box::new(SledTx {
            storage: self,
            cache: TxCache::default(),
        }))
    }

    fn with_prefix(&self, prefix: &[u8]) -> Arc<dyn Storage> {
        Arc::new(Self {
            db: self.db.clone(),
            prefix: prefixed(&self.prefix, prefix),
            metrics: Arc::clone(&self.metrics),
        })
    }

    fn get(&self, key: &[u8]) -> IdenResult<Option<Vec<u8>>> {
        self.read(&prefixed(&self.prefix, key))
    }

    fn iterate(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> IdenResult<bool>) -> IdenResult<()> {
        for item in self.db.scan_prefix(&self.prefix) {
            let (k, v) = item.map_err(|e| {
                self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                IdenError::Storage(format!("Iteration error: {}", e))
            })?;
            if !f(&k[self.prefix.len()..], &v)? {
                break;
            }
        }
        Ok(())
    }

    fn info(&self) -> String {
        let m = self.metrics.snapshot();
        format!(
            "sled storage, {} keys total, {} reads, {} writes, {} commits",
            self.db.len(),
            m.reads,
            m.writes,
            m.commits
        )
    }

    fn close(&self) -> IdenResult<()> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| IdenError::Storage(format!("Flush error: {}", e)))
    }
}

struct SledTx<'a> {
    storage: &'a SledStorage,
    cache: TxCache,
}

impl Tx for SledTx<'_> {
    fn get(&self, key: &[u8]) -> IdenResult<Option<Vec<u8>>> {
        let full = prefixed(&self.storage.prefix, key);
        if let Some(v) = self.cache.get(&full) {
            return Ok(Some(v));
        }
        self.storage.read(&full)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.cache.put(prefixed(&self.storage.prefix, key), value);
    }

    fn commit(self: Box<Self>) -> IdenResult<()> {
        let SledTx { storage, cache } = *self;
        let writes = cache.writes.len() as u64;
        let mut batch = sled::Batch::default();
        for (k, v) in cache.writes {
            batch.insert(k, v);
        }

        storage.db.apply_batch(batch).map_err(|e| {
            storage.metrics.errors.fetch_add(1, Ordering::Relaxed);
            IdenError::Storage(format!("Commit error: {}", e))
        })?;

        storage.metrics.writes.fetch_add(writes, Ordering::Relaxed);
        storage.metrics.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
