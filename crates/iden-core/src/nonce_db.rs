//! Single-use nonces with expiry.
//!
//! Nonces live in a map for lookup and in a min-heap on expiration for
//! eviction. The heap tracks each nonce's slot so removal by nonce is
//! `O(log n)` and the two views never diverge.

use crate::clock::Clock;
use crate::config::NonceConfig;
use iden_crypto::random_bytes;
use iden_types::{IdenError, IdenResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SWEEP_INTERVAL: u64 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceObj<A> {
    pub nonce: String,
    /// Unix seconds. The nonce is usable up to and including this second.
    pub expiration: i64,
    pub aux: Option<A>,
}

struct ExpiryHeap<A> {
    items: Vec<NonceObj<A>>,
    slots: HashMap<String, usize>,
}

impl<A> ExpiryHeap<A> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            slots: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, nonce: &str) -> Option<&NonceObj<A>> {
        self.slots.get(nonce).map(|&i| &self.items[i])
    }

    fn get_mut(&mut self, nonce: &str) -> Option<&mut NonceObj<A>> {
        match self.slots.get(nonce) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    fn peek(&self) -> Option<&NonceObj<A>> {
        self.items.first()
    }

    fn push(&mut self, obj: NonceObj<A>) {
        let i = self.items.len();
        self.slots.insert(obj.nonce.clone(), i);
        self.items.push(obj);
        self.sift_up(i);
    }

    fn remove(&mut self, nonce: &str) -> Option<NonceObj<A>> {
        let i = *self.slots.get(nonce)?;
        let last = self.items.len() - 1;
        self.swap(i, last);
        let obj = self.items.pop()?;
        self.slots.remove(&obj.nonce);
        if i < self.items.len() {
            self.sift_down(i);
            self.sift_up(i);
        }
        Some(obj)
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.items.swap(a, b);
        self.slots.insert(self.items[a].nonce.clone(), a);
        self.slots.insert(self.items[b].nonce.clone(), b);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.items[i].expiration >= self.items[parent].expiration {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.items.len();
        loop {
            let (l, r) = (2 * i + 1, 2 * i + 2);
            let mut min = i;
            if l < n && self.items[l].expiration < self.items[min].expiration {
                min = l;
            }
            if r < n && self.items[r].expiration < self.items[min].expiration {
                min = r;
            }
            if min == i {
                break;
            }
            self.swap(i, min);
            i = min;
        }
    }
}

/// Registry of nonces handed out in challenge/response flows.
///
/// Lookups run an expired-nonce sweep every `sweep_interval` calls. The
/// counter has its own lock so lookups never wait on a sweep they do not
/// trigger.
pub struct NonceDb<A = ()> {
    heap: RwLock<ExpiryHeap<A>>,
    lookups: Mutex<u64>,
    sweep_interval: u64,
    default_ttl: i64,
    clock: Arc<dyn Clock>,
}

impl<A: Clone> NonceDb<A> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::from_config(&NonceConfig::default(), clock)
    }

    pub fn from_config(cfg: &NonceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            heap: RwLock::new(ExpiryHeap::new()),
            lookups: Mutex::new(0),
            sweep_interval: cfg.sweep_interval.max(1),
            default_ttl: cfg.default_ttl_secs,
            clock,
        }
    }

    /// Registers `nonce`, valid for `delta` seconds from now.
    pub fn add(&self, nonce: &str, delta: i64, aux: Option<A>) -> IdenResult<NonceObj<A>> {
        let obj = NonceObj {
            nonce: nonce.to_string(),
            expiration: self.clock.now().saturating_add(delta),
            aux,
        };
        let mut heap = self.heap.write();
        if heap.get(nonce).is_some() {
            return Err(IdenError::DuplicateNonce(nonce.to_string()));
        }
        heap.push(obj.clone());
        Ok(obj)
    }

    /// Registers a fresh random nonce with the default lifetime.
    pub fn generate(&self, aux: Option<A>) -> IdenResult<NonceObj<A>> {
        let nonce = hex::encode(random_bytes::<32>());
        self.add(&nonce, self.default_ttl, aux)
    }

    /// Attaches `aux` to a nonce that has none yet. Returns false if the
    /// nonce is unknown or already carries aux data.
    pub fn add_aux(&self, nonce: &str, aux: A) -> bool {
        let mut heap = self.heap.write();
        match heap.get_mut(nonce) {
            Some(obj) if obj.aux.is_none() => {
                obj.aux = Some(aux);
                true
            }
            _ => false,
        }
    }

    /// The nonce if it is registered and not expired.
    pub fn search(&self, nonce: &str) -> Option<NonceObj<A>> {
        self.delete_old_opportunistic();
        let now = self.clock.now();
        let heap = self.heap.read();
        heap.get(nonce).filter(|obj| obj.expiration >= now).cloned()
    }

    /// Like [`search`](Self::search) but also consumes the nonce. An expired
    /// nonce is removed too, and `None` is returned.
    pub fn search_and_delete(&self, nonce: &str) -> Option<NonceObj<A>> {
        self.delete_old_opportunistic();
        let obj = self.heap.write().remove(nonce)?;
        (obj.expiration >= self.clock.now()).then_some(obj)
    }

    /// Drops every expired nonce. Returns how many were dropped.
    pub fn delete_old(&self) -> usize {
        let now = self.clock.now();
        let mut heap = self.heap.write();
        let mut removed = 0;
        while let Some(obj) = heap.peek() {
            if obj.expiration >= now {
                break;
            }
            let nonce = obj.nonce.clone();
            heap.remove(&nonce);
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, remaining = heap.len(), "Swept expired nonces");
        }
        removed
    }

    /// Runs [`delete_old`](Self::delete_old) once every `sweep_interval` calls.
    pub fn delete_old_opportunistic(&self) {
        let must_sweep = {
            let mut lookups = self.lookups.lock();
            *lookups += 1;
            if *lookups >= self.sweep_interval {
                *lookups = 0;
                true
            } else {
                false
            }
        };
        if must_sweep {
            self.delete_old();
        }
    }

    /// Registered nonces, expired ones not yet swept included.
    pub fn len(&self) -> usize {
        self.heap.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use proptest::prelude::*;

    fn db() -> NonceDb<u32> {
        NonceDb::new(Arc::new(FixedClock::new(1_000)))
    }

    #[test]
    fn test_add_search_delete() {
        let ndb = db();
        for i in 0..256 {
            ndb.add(&format!("nonce-a-{}", i), 10, None).unwrap();
        }
        let err = ndb.add("nonce-a-0", 10, None).unwrap_err();
        assert!(matches!(err, IdenError::DuplicateNonce(_)));

        assert!(ndb.add_aux("nonce-a-0", 42));
        assert!(!ndb.add_aux("nonce-a-0", 64));
        assert!(!ndb.add_aux("missing", 1));
        assert_eq!(ndb.search("nonce-a-0").unwrap().aux, Some(42));

        for i in 0..256 {
            assert!(ndb.search(&format!("nonce-a-{}", i)).is_some());
        }
        for i in 0..256 {
            assert!(ndb.search_and_delete(&format!("nonce-a-{}", i)).is_some());
        }
        assert!(ndb.search("nonce-a-0").is_none());
        assert!(ndb.is_empty());
    }

    #[test]
    fn test_expired_not_found() {
        let ndb = db();
        ndb.add("nonce-b-0", -1, None).unwrap();
        assert!(ndb.search("nonce-b-0").is_none());
        assert!(ndb.search_and_delete("nonce-b-0").is_none());
        assert_eq!(ndb.len(), 0);
    }

    #[test]
    fn test_expiry_is_inclusive() {
        let clock = Arc::new(FixedClock::new(1_000));
        let ndb: NonceDb = NonceDb::new(clock.clone());
        ndb.add("n", 5, None).unwrap();
        clock.advance(5);
        assert!(ndb.search("n").is_some());
        clock.advance(1);
        assert!(ndb.search("n").is_none());
    }

    #[test]
    fn test_delete_old_removes_only_expired() {
        let ndb = db();
        for i in 0..8 {
            ndb.add(&format!("nonce-c-{}", i), -60, None).unwrap();
            ndb.add(&format!("nonce-d-{}", i), 60, None).unwrap();
        }
        assert_eq!(ndb.len(), 16);
        assert_eq!(ndb.delete_old(), 8);
        assert_eq!(ndb.len(), 8);
        for i in 0..8 {
            assert!(ndb.search(&format!("nonce-d-{}", i)).is_some());
        }
    }

    #[test]
    fn test_opportunistic_sweep() {
        let ndb = db();
        for i in 0..8 {
            ndb.add(&format!("nonce-e-{}", i), -60, None).unwrap();
            ndb.add(&format!("nonce-f-{}", i), 60, None).unwrap();
        }
        for _ in 0..DEFAULT_SWEEP_INTERVAL - 1 {
            ndb.search("nonce-f-0");
        }
        assert_eq!(ndb.len(), 16);
        ndb.search("nonce-f-0");
        assert_eq!(ndb.len(), 8);
    }

    #[test]
    fn test_generate_unique() {
        let ndb = db();
        let a = ndb.generate(None).unwrap();
        let b = ndb.generate(Some(7)).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.nonce.len(), 64);
        assert_eq!(a.expiration, 1_000 + NonceConfig::default().default_ttl_secs);
        assert_eq!(ndb.search_and_delete(&b.nonce).unwrap().aux, Some(7));
    }

    proptest! {
        #[test]
        fn prop_sweep_matches_expirations(deltas in proptest::collection::vec(-100i64..100, 1..64)) {
            let ndb = db();
            for (i, d) in deltas.iter().enumerate() {
                ndb.add(&i.to_string(), *d, None).unwrap();
            }
            // Remove a few from the middle of the heap first.
            for i in (0..deltas.len()).step_by(3) {
                ndb.search_and_delete(&i.to_string());
            }
            let survivors = deltas
                .iter()
                .enumerate()
                .filter(|(i, d)| i % 3 != 0 && **d >= 0)
                .count();
            ndb.delete_old();
            prop_assert_eq!(ndb.len(), survivors);
        }
    }
}
