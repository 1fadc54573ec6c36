use crate::entry::Entry;
use crate::node::Node;
use crate::path::get_path;
use crate::proof::{NodeAux, Proof, MAX_PROOF_DEPTH};
use crate::storage::{Storage, Tx};
use iden_types::{Hash, IdenError, IdenResult};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::Arc;
use tracing::debug;

/// Storage key holding the current root.
pub const ROOT_KEY: &[u8] = b"currentroot";

/// Sparse Merkle tree over claim entries.
///
/// `add` holds the root lock exclusively for the whole insertion, reads hold
/// it shared, so readers never observe a half-applied insertion.
pub struct MerkleTree {
    storage: Arc<dyn Storage>,
    root: RwLock<Hash>,
    max_levels: usize,
    writable: bool,
}

impl MerkleTree {
    /// Opens the tree persisted in `storage`, creating an empty one if none.
    pub fn new(storage: Arc<dyn Storage>, max_levels: usize) -> IdenResult<Self> {
        if !(2..=MAX_PROOF_DEPTH).contains(&max_levels) {
            return Err(IdenError::Config(format!(
                "tree levels must be within 2..={}, got {}",
                MAX_PROOF_DEPTH, max_levels
            )));
        }

        let root = match storage.get(ROOT_KEY)? {
            Some(bytes) => Hash::from_slice(&bytes)?,
            None => {
                let mut tx = storage.new_tx()?;
                tx.put(ROOT_KEY, Hash::zero().as_bytes());
                tx.commit()?;
                Hash::zero()
            }
        };

        Ok(Self {
            storage,
            root: RwLock::new(root),
            max_levels,
            writable: true,
        })
    }

    pub fn root(&self) -> Hash {
        *self.root.read()
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub(crate) fn lock_root(&self) -> RwLockWriteGuard<'_, Hash> {
        self.root.write()
    }

    /// Read-only view of the tree pinned at a historical root.
    pub fn snapshot(&self, root: &Hash) -> IdenResult<MerkleTree> {
        self.get_node(root)?;
        Ok(Self {
            storage: Arc::clone(&self.storage),
            root: RwLock::new(*root),
            max_levels: self.max_levels,
            writable: false,
        })
    }

    pub(crate) fn get_node(&self, key: &Hash) -> IdenResult<Node> {
        if key.is_zero() {
            return Ok(Node::Empty);
        }
        match self.storage.get(key.as_bytes())? {
            Some(bytes) => Node::from_value(&bytes),
            None => Err(IdenError::NotFound),
        }
    }

    fn get_node_tx(&self, tx: &dyn Tx, key: &Hash) -> IdenResult<Node> {
        if key.is_zero() {
            return Ok(Node::Empty);
        }
        match tx.get(key.as_bytes())? {
            Some(bytes) => Node::from_value(&bytes),
            None => Err(IdenError::NotFound),
        }
    }

    /// Inserts `entry`. Fails with `DuplicateIndex` if its index is taken.
    pub fn add(&self, entry: &Entry) -> IdenResult<()> {
        if !self.writable {
            return Err(IdenError::NotWritable);
        }
        if !entry.in_field() {
            return Err(IdenError::FieldOverflow("entry element out of field".into()));
        }
        let (hi, _) = entry.hi_hv()?;

        let mut root = self.root.write();
        let mut tx = self.storage.new_tx()?;

        let path = get_path(self.max_levels, hi.as_bytes());
        let new_root = self.add_leaf(tx.as_mut(), entry, &hi, &root, 0, &path)?;
        tx.put(ROOT_KEY, new_root.as_bytes());
        tx.commit()?;

        debug!(hi = %hi.short(), root = %new_root.short(), "Added leaf");
        *root = new_root;
        Ok(())
    }

    fn add_leaf(
        &self,
        tx: &mut dyn Tx,
        entry: &Entry,
        hi: &Hash,
        key: &Hash,
        lvl: usize,
        path: &[bool],
    ) -> IdenResult<Hash> {
        if lvl > self.max_levels - 1 {
            return Err(IdenError::ReachedMaxLevel);
        }

        match self.get_node_tx(tx, key)? {
            Node::Empty => self.add_node(tx, &Node::Leaf(entry.clone())),
            Node::Leaf(old) => {
                let old_hi = old.h_index()?;
                if old_hi == *hi {
                    return Err(IdenError::DuplicateIndex);
                }
                let old_path = get_path(self.max_levels, old_hi.as_bytes());
                self.push_leaf(tx, entry, &old, lvl, path, &old_path)
            }
            Node::Middle { left, right } => {
                let middle = if path[lvl] {
                    let right = self.add_leaf(tx, entry, hi, &right, lvl + 1, path)?;
                    Node::Middle { left, right }
                } else {
                    let left = self.add_leaf(tx, entry, hi, &left, lvl + 1, path)?;
                    Node::Middle { left, right }
                };
                self.add_node(tx, &middle)
            }
        }
    }

    /// Pushes an existing leaf down until its path diverges from the new one.
    fn push_leaf(
        &self,
        tx: &mut dyn Tx,
        entry: &Entry,
        old: &Entry,
        lvl: usize,
        path_new: &[bool],
        path_old: &[bool],
    ) -> IdenResult<Hash> {
        if lvl > self.max_levels - 2 {
            return Err(IdenError::ReachedMaxLevel);
        }

        if path_new[lvl] == path_old[lvl] {
            let next = self.push_leaf(tx, entry, old, lvl + 1, path_new, path_old)?;
            let middle = if path_new[lvl] {
                Node::Middle {
                    left: Hash::zero(),
                    right: next,
                }
            } else {
                Node::Middle {
                    left: next,
                    right: Hash::zero(),
                }
            };
            return self.add_node(tx, &middle);
        }

        let old_key = Node::Leaf(old.clone()).key()?;
        let new_key = self.add_node(tx, &Node::Leaf(entry.clone()))?;
        let middle = if path_new[lvl] {
            Node::Middle {
                left: old_key,
                right: new_key,
            }
        } else {
            Node::Middle {
                left: new_key,
                right: old_key,
            }
        };
        self.add_node(tx, &middle)
    }

    fn add_node(&self, tx: &mut dyn Tx, node: &Node) -> IdenResult<Hash> {
        let key = node.key()?;
        if matches!(node, Node::Empty) {
            return Ok(key);
        }
        if tx.get(key.as_bytes())?.is_none() {
            tx.put(key.as_bytes(), &node.to_value());
        }
        Ok(key)
    }

    /// Walks `hi`'s path from `root` (or the current root) down to the first
    /// leaf or empty node, returning the leaf found and the proof recorded on
    /// the way.
    fn walk_path(&self, hi: &Hash, root: Option<&Hash>) -> IdenResult<(Option<Entry>, Proof)> {
        let guard = self.root.read();
        let mut next = root.copied().unwrap_or(*guard);
        let path = get_path(self.max_levels, hi.as_bytes());
        let mut builder = Proof::builder();

        for go_right in path {
            match self.get_node(&next)? {
                Node::Empty => return Ok((None, builder.finish(false, None))),
                Node::Leaf(entry) => {
                    let (leaf_hi, leaf_hv) = entry.hi_hv()?;
                    if leaf_hi == *hi {
                        return Ok((Some(entry), builder.finish(true, None)));
                    }
                    let aux = NodeAux {
                        h_index: leaf_hi,
                        h_value: leaf_hv,
                    };
                    return Ok((Some(entry), builder.finish(false, Some(aux))));
                }
                Node::Middle { left, right } => {
                    let (child, sibling) = if go_right { (right, left) } else { (left, right) };
                    builder.descend(sibling);
                    next = child;
                }
            }
        }

        Err(IdenError::ReachedMaxLevel)
    }

    /// Proof of existence or non-existence of `hi` under `root`.
    pub fn generate_proof(&self, hi: &Hash, root: Option<&Hash>) -> IdenResult<Proof> {
        self.walk_path(hi, root).map(|(_, proof)| proof)
    }

    pub fn get_data_by_index(&self, hi: &Hash) -> IdenResult<Entry> {
        match self.walk_path(hi, None)? {
            (Some(entry), proof) if proof.existence => Ok(entry),
            _ => Err(IdenError::NotFound),
        }
    }

    /// True if this exact entry (index and value) is in the tree.
    pub fn entry_exists(&self, entry: &Entry) -> IdenResult<bool> {
        let hi = entry.h_index()?;
        match self.get_data_by_index(&hi) {
            Ok(found) => Ok(found == *entry),
            Err(IdenError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::verify_proof;
    use crate::storage::{MemoryStorage, SledStorage};
    use iden_types::ElemBytes;
    use proptest::prelude::*;

    fn entry(i: u64, v: u64) -> Entry {
        let mut index = [ElemBytes::zero(); 4];
        index[0] = ElemBytes::from_u64(i);
        let mut value = [ElemBytes::zero(); 4];
        value[0] = ElemBytes::from_u64(v);
        Entry::new(index, value)
    }

    fn memory_tree(levels: usize) -> MerkleTree {
        MerkleTree::new(Arc::new(MemoryStorage::new()), levels).unwrap()
    }

    #[test]
    fn test_new_tree_is_empty() {
        let tree = memory_tree(140);
        assert!(tree.root().is_zero());
        assert_eq!(tree.max_levels(), 140);
    }

    #[test]
    fn test_invalid_levels_rejected() {
        assert!(MerkleTree::new(Arc::new(MemoryStorage::new()), 1).is_err());
        assert!(MerkleTree::new(Arc::new(MemoryStorage::new()), 241).is_err());
    }

    #[test]
    fn test_single_leaf_root_is_leaf_key() {
        let tree = memory_tree(140);
        let e = entry(1, 2);
        tree.add(&e).unwrap();
        assert_eq!(tree.root(), Node::Leaf(e).key().unwrap());
    }

    #[test]
    fn test_add_and_get() {
        let tree = memory_tree(140);
        for i in 0..16 {
            tree.add(&entry(i, i * 10)).unwrap();
        }
        for i in 0..16 {
            let e = entry(i, i * 10);
            let found = tree.get_data_by_index(&e.h_index().unwrap()).unwrap();
            assert_eq!(found, e);
            assert!(tree.entry_exists(&e).unwrap());
        }
        assert!(!tree.entry_exists(&entry(3, 31)).unwrap());
        assert_eq!(
            tree.get_data_by_index(&entry(99, 0).h_index().unwrap()),
            Err(IdenError::NotFound)
        );
    }

    #[test]
    fn test_duplicate_index_keeps_root() {
        let tree = memory_tree(140);
        tree.add(&entry(7, 1)).unwrap();
        let root = tree.root();

        assert_eq!(tree.add(&entry(7, 1)), Err(IdenError::DuplicateIndex));
        assert_eq!(tree.add(&entry(7, 2)), Err(IdenError::DuplicateIndex));
        assert_eq!(tree.root(), root);
    }

    #[test]
    fn test_failed_add_writes_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let tree = MerkleTree::new(storage.clone(), 140).unwrap();
        tree.add(&entry(1, 1)).unwrap();
        let keys_before = storage.len();

        assert!(tree.add(&entry(1, 5)).is_err());
        assert_eq!(storage.len(), keys_before);
    }

    #[test]
    fn test_max_level_reached_on_shallow_tree() {
        let tree = memory_tree(2);
        let mut results = Vec::new();
        for i in 0..16 {
            results.push(tree.add(&entry(i, 0)));
        }
        assert!(results.iter().any(|r| *r == Err(IdenError::ReachedMaxLevel)));
    }

    #[test]
    fn test_root_persisted_across_reopen() {
        let storage = Arc::new(SledStorage::temporary().unwrap());
        let root = {
            let tree = MerkleTree::new(storage.clone(), 140).unwrap();
            tree.add(&entry(1, 1)).unwrap();
            tree.add(&entry(2, 2)).unwrap();
            tree.root()
        };
        let reopened = MerkleTree::new(storage, 140).unwrap();
        assert_eq!(reopened.root(), root);
        assert!(reopened.entry_exists(&entry(2, 2)).unwrap());
    }

    #[test]
    fn test_existence_and_non_existence_proofs() {
        let tree = memory_tree(140);
        for i in 0..10 {
            tree.add(&entry(i, i + 100)).unwrap();
        }
        let root = tree.root();

        for i in 0..10 {
            let (hi, hv) = entry(i, i + 100).hi_hv().unwrap();
            let proof = tree.generate_proof(&hi, None).unwrap();
            assert!(proof.existence);
            assert!(verify_proof(&root, &proof, &hi, &hv));
        }

        for i in 50..60 {
            let hi = entry(i, 0).h_index().unwrap();
            let proof = tree.generate_proof(&hi, None).unwrap();
            assert!(!proof.existence);
            assert!(verify_proof(&root, &proof, &hi, &Hash::zero()));
        }
    }

    #[test]
    fn test_proof_rejects_wrong_value() {
        let tree = memory_tree(140);
        tree.add(&entry(1, 1)).unwrap();
        tree.add(&entry(2, 2)).unwrap();
        let (hi, _) = entry(1, 1).hi_hv().unwrap();
        let wrong_hv = entry(1, 2).h_value().unwrap();
        let proof = tree.generate_proof(&hi, None).unwrap();
        assert!(!verify_proof(&tree.root(), &proof, &hi, &wrong_hv));
    }

    #[test]
    fn test_proof_against_historical_root() {
        let tree = memory_tree(140);
        tree.add(&entry(1, 1)).unwrap();
        let old_root = tree.root();
        tree.add(&entry(2, 2)).unwrap();

        let hi = entry(2, 2).h_index().unwrap();
        let old = tree.generate_proof(&hi, Some(&old_root)).unwrap();
        assert!(!old.existence);
        assert!(verify_proof(&old_root, &old, &hi, &Hash::zero()));

        let new = tree.generate_proof(&hi, None).unwrap();
        assert!(new.existence);
    }

    #[test]
    fn test_snapshot_is_read_only() {
        let tree = memory_tree(140);
        tree.add(&entry(1, 1)).unwrap();
        let old_root = tree.root();
        tree.add(&entry(2, 2)).unwrap();

        let snap = tree.snapshot(&old_root).unwrap();
        assert!(!snap.is_writable());
        assert_eq!(snap.root(), old_root);
        assert!(snap.entry_exists(&entry(1, 1)).unwrap());
        assert!(!snap.entry_exists(&entry(2, 2)).unwrap());
        assert_eq!(snap.add(&entry(3, 3)), Err(IdenError::NotWritable));
    }

    #[test]
    fn test_snapshot_unknown_root() {
        let tree = memory_tree(140);
        assert_eq!(
            tree.snapshot(&Hash::from_u64(12345)).err(),
            Some(IdenError::NotFound)
        );
    }

    #[test]
    fn test_overflowing_entry_rejected() {
        let tree = memory_tree(140);
        let mut data = *entry(1, 1).data();
        data[2] = ElemBytes([0xff; 32]);
        let bad = Entry::from_data(data);
        assert!(matches!(tree.add(&bad), Err(IdenError::FieldOverflow(_))));
        assert!(tree.root().is_zero());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_and_reads() {
        let tree = Arc::new(memory_tree(140));
        let mut handles = Vec::new();

        for t in 0..4u64 {
            let tree = Arc::clone(&tree);
            handles.push(tokio::task::spawn_blocking(move || {
                for i in 0..10u64 {
                    tree.add(&entry(t * 100 + i, i)).unwrap();
                    let hi = entry(t * 100 + i, i).h_index().unwrap();
                    tree.generate_proof(&hi, None).unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let sequential = memory_tree(140);
        for t in 0..4u64 {
            for i in 0..10u64 {
                sequential.add(&entry(t * 100 + i, i)).unwrap();
            }
        }
        assert_eq!(tree.root(), sequential.root());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_root_is_insertion_order_independent(
            keys in proptest::collection::hash_set(any::<u64>(), 1..24),
            seed in any::<u64>(),
        ) {
            let keys: Vec<u64> = keys.into_iter().collect();
            let mut shuffled = keys.clone();
            // Deterministic permutation driven by the seed.
            let mut s = seed;
            for i in (1..shuffled.len()).rev() {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (s >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }

            let a = memory_tree(140);
            for k in &keys {
                a.add(&entry(*k, k.wrapping_mul(3))).unwrap();
            }
            let b = memory_tree(140);
            for k in &shuffled {
                b.add(&entry(*k, k.wrapping_mul(3))).unwrap();
            }
            prop_assert_eq!(a.root(), b.root());
        }

        #[test]
        fn prop_tampered_proof_fails(
            keys in proptest::collection::hash_set(any::<u64>(), 2..16),
            byte in any::<usize>(),
            flip in 1u8..=255,
        ) {
            let keys: Vec<u64> = keys.into_iter().collect();
            let tree = memory_tree(140);
            for k in &keys {
                tree.add(&entry(*k, *k)).unwrap();
            }
            let (hi, hv) = entry(keys[0], keys[0]).hi_hv().unwrap();
            let proof = tree.generate_proof(&hi, None).unwrap();
            prop_assert!(verify_proof(&tree.root(), &proof, &hi, &hv));

            let mut bytes = proof.to_bytes();
            let pos = byte % bytes.len();
            bytes[pos] ^= flip;
            let still_valid = match Proof::from_bytes(&bytes) {
                Ok(tampered) => verify_proof(&tree.root(), &tampered, &hi, &hv),
                Err(_) => false,
            };
            prop_assert!(!still_valid);
        }
    }
}
