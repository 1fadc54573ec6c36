use crate::entry::Entry;
use crate::node::Node;
use crate::tree::{MerkleTree, ROOT_KEY};
use iden_types::{Hash, IdenError, IdenResult};
use std::fmt::Write as _;
use tracing::info;

impl MerkleTree {
    /// Visits every node reachable from `root` (or the current root),
    /// parents before children, left before right.
    pub fn walk(&self, root: Option<&Hash>, f: &mut dyn FnMut(&Hash, &Node)) -> IdenResult<()> {
        let root = root.copied().unwrap_or_else(|| self.root());
        self.walk_from(&root, f)
    }

    fn walk_from(&self, key: &Hash, f: &mut dyn FnMut(&Hash, &Node)) -> IdenResult<()> {
        let node = self.get_node(key)?;
        f(key, &node);
        if let Node::Middle { left, right } = node {
            self.walk_from(&left, f)?;
            self.walk_from(&right, f)?;
        }
        Ok(())
    }

    /// Hex encoding of every leaf entry under `root`.
    pub fn dump_claims(&self, root: Option<&Hash>) -> IdenResult<Vec<String>> {
        let mut out = Vec::new();
        self.walk(root, &mut |_, node| {
            if let Node::Leaf(entry) = node {
                out.push(entry.to_hex());
            }
        })?;
        Ok(out)
    }

    pub fn import_dumped_claims(&self, dump: &[String]) -> IdenResult<()> {
        for hex_entry in dump {
            let entry = Entry::from_hex(hex_entry)?;
            self.add(&entry)?;
        }
        info!("Imported {} claims", dump.len());
        Ok(())
    }

    /// Raw node stream under `root`, ending with the root pointer.
    ///
    /// Each record is `key_len (u8) | key | value_len (u16 BE) | value`.
    pub fn dump_tree(&self, root: Option<&Hash>) -> IdenResult<Vec<u8>> {
        let root = root.copied().unwrap_or_else(|| self.root());
        let mut out = Vec::new();
        let mut result = Ok(());

        self.walk(Some(&root), &mut |key, node| {
            if matches!(node, Node::Empty) || result.is_err() {
                return;
            }
            result = write_record(&mut out, key.as_bytes(), &node.to_value());
        })?;
        result?;

        write_record(&mut out, ROOT_KEY, root.as_bytes())?;
        Ok(out)
    }

    /// Loads a stream produced by [`MerkleTree::dump_tree`] and moves the
    /// current root to the dumped one. Every node key is checked against its
    /// content, and the dumped root must be complete, before anything is
    /// written.
    pub fn import_tree(&self, bytes: &[u8]) -> IdenResult<()> {
        if !self.is_writable() {
            return Err(IdenError::NotWritable);
        }

        let mut current = self.lock_root();
        let mut tx = self.storage().new_tx()?;
        let mut new_root = None;
        let mut rest = bytes;

        while !rest.is_empty() {
            let (key, value, tail) = read_record(rest)?;
            rest = tail;

            if key == ROOT_KEY {
                new_root = Some(Hash::from_slice(value)?);
                continue;
            }

            let node = Node::from_value(value)?;
            let expected = node.key()?;
            if expected.as_bytes().as_slice() != key {
                return Err(IdenError::Serialization(format!(
                    "node key mismatch for {}",
                    hex::encode(key)
                )));
            }
            tx.put(key, value);
        }

        let root = new_root.ok_or_else(|| IdenError::Serialization("dump has no root".into()))?;

        // Every node under the new root must resolve, from the dump or from
        // what is already stored.
        let mut pending = vec![root];
        while let Some(key) = pending.pop() {
            if key.is_zero() {
                continue;
            }
            let value = tx.get(key.as_bytes())?.ok_or_else(|| {
                IdenError::Serialization(format!("dump is missing node {}", key.short()))
            })?;
            if let Node::Middle { left, right } = Node::from_value(&value)? {
                pending.push(left);
                pending.push(right);
            }
        }

        tx.put(ROOT_KEY, root.as_bytes());
        tx.commit()?;
        *current = root;

        info!(root = %root.short(), "Imported tree");
        Ok(())
    }

    /// Graphviz rendering of the tree under `root`, for debugging.
    pub fn graph_viz(&self, root: Option<&Hash>) -> IdenResult<String> {
        let mut out = String::from(
            "digraph hierarchy {\nnode [fontname=Monospace,fontsize=10,shape=box]\n",
        );
        let mut empties = 0usize;

        self.walk(root, &mut |key, node| match node {
            Node::Middle { left, right } => {
                let mut child = |h: &Hash| {
                    if h.is_zero() {
                        empties += 1;
                        let _ = writeln!(out, "\"empty{}\" [style=dashed,label=0];", empties);
                        format!("empty{}", empties)
                    } else {
                        h.short()
                    }
                };
                let l = child(left);
                let r = child(right);
                let _ = writeln!(out, "\"{}\" -> {{\"{}\" \"{}\"}}", key.short(), l, r);
            }
            Node::Leaf(_) => {
                let _ = writeln!(out, "\"{}\" [style=filled];", key.short());
            }
            Node::Empty => {}
        })?;

        out.push_str("}\n");
        Ok(out)
    }
}

fn write_record(out: &mut Vec<u8>, key: &[u8], value: &[u8]) -> IdenResult<()> {
    let key_len = u8::try_from(key.len())
        .map_err(|_| IdenError::Serialization("key too long for dump".into()))?;
    let value_len = u16::try_from(value.len())
        .map_err(|_| IdenError::Serialization("value too long for dump".into()))?;
    out.push(key_len);
    out.extend_from_slice(key);
    out.extend_from_slice(&value_len.to_be_bytes());
    out.extend_from_slice(value);
    Ok(())
}

fn read_record(bytes: &[u8]) -> IdenResult<(&[u8], &[u8], &[u8])> {
    let truncated = || IdenError::Serialization("truncated tree dump".into());

    let key_len = *bytes.first().ok_or_else(truncated)? as usize;
    let rest = &bytes[1..];
    if rest.len() < key_len + 2 {
        return Err(truncated());
    }
    let (key, rest) = rest.split_at(key_len);
    let value_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
    let rest = &rest[2..];
    if rest.len() < value_len {
        return Err(truncated());
    }
    let (value, rest) = rest.split_at(value_len);
    Ok((key, value, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use iden_types::ElemBytes;
    use std::sync::Arc;

    fn entry(i: u64) -> Entry {
        let mut index = [ElemBytes::zero(); 4];
        index[1] = ElemBytes::from_u64(i);
        Entry::new(index, [ElemBytes::from_u64(i * 2); 4])
    }

    fn filled_tree() -> MerkleTree {
        let tree = MerkleTree::new(Arc::new(MemoryStorage::new()), 140).unwrap();
        for i in 0..8 {
            tree.add(&entry(i)).unwrap();
        }
        tree
    }

    #[test]
    fn test_walk_counts_leaves() {
        let tree = filled_tree();
        let mut leaves = 0;
        tree.walk(None, &mut |_, node| {
            if matches!(node, Node::Leaf(_)) {
                leaves += 1;
            }
        })
        .unwrap();
        assert_eq!(leaves, 8);
    }

    #[test]
    fn test_dump_and_import_claims() {
        let tree = filled_tree();
        let dump = tree.dump_claims(None).unwrap();
        assert_eq!(dump.len(), 8);
        assert!(dump.iter().all(|d| d.len() == 2 + 2 * 256));

        let other = MerkleTree::new(Arc::new(MemoryStorage::new()), 140).unwrap();
        other.import_dumped_claims(&dump).unwrap();
        assert_eq!(other.root(), tree.root());
    }

    #[test]
    fn test_dump_and_import_tree() {
        let tree = filled_tree();
        let dump = tree.dump_tree(None).unwrap();

        let other = MerkleTree::new(Arc::new(MemoryStorage::new()), 140).unwrap();
        other.import_tree(&dump).unwrap();
        assert_eq!(other.root(), tree.root());
        for i in 0..8 {
            assert!(other.entry_exists(&entry(i)).unwrap());
        }
        other.add(&entry(100)).unwrap();
    }

    #[test]
    fn test_import_tree_rejects_corruption() {
        let tree = filled_tree();
        let mut dump = tree.dump_tree(None).unwrap();
        let mid = dump.len() / 2;
        dump[mid] ^= 0x01;

        let other = MerkleTree::new(Arc::new(MemoryStorage::new()), 140).unwrap();
        assert!(other.import_tree(&dump).is_err());
        assert!(other.root().is_zero());
    }

    #[test]
    fn test_import_tree_rejects_missing_nodes() {
        let tree = filled_tree();
        let dump = tree.dump_tree(None).unwrap();

        let mut records = Vec::new();
        let mut rest = dump.as_slice();
        while !rest.is_empty() {
            let (key, value, tail) = read_record(rest).unwrap();
            records.push((key.to_vec(), value.to_vec()));
            rest = tail;
        }
        // Drop the last node before the root pointer, a leaf deep in the tree.
        let root_record = records.pop().unwrap();
        assert_eq!(root_record.0, ROOT_KEY);
        records.pop().unwrap();
        records.push(root_record);

        let mut truncated = Vec::new();
        for (key, value) in &records {
            write_record(&mut truncated, key, value).unwrap();
        }

        let other = MerkleTree::new(Arc::new(MemoryStorage::new()), 140).unwrap();
        assert!(matches!(
            other.import_tree(&truncated),
            Err(IdenError::Serialization(_))
        ));
        assert!(other.root().is_zero());
        other.add(&entry(100)).unwrap();
    }

    #[test]
    fn test_graph_viz_mentions_root() {
        let tree = filled_tree();
        let dot = tree.graph_viz(None).unwrap();
        assert!(dot.starts_with("digraph hierarchy {"));
        assert!(dot.contains(&tree.root().short()));
        assert!(dot.trim_end().ends_with('}'));
    }
}
