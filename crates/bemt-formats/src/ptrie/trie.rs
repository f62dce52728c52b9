//! Arena-backed PATRICIA trie

use super::flat::{FlatNode, FlatPtrie};
use super::{NPOS, first_differing_bit, key_bit};

/// Handle to a node stored in a [`Ptrie`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The sentinel root node
    pub const ROOT: Self = Self(0);

    /// Arena slot of this node
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node of the live trie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrieNode {
    key: Option<Box<[u8]>>,
    ref_bit: u64,
    left: NodeId,
    right: NodeId,
}

impl PtrieNode {
    /// Key stored in a leaf; `None` for the root and internal nodes
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Tested bit position, [`NPOS`] for leaves and the root
    pub fn ref_bit(&self) -> u64 {
        self.ref_bit
    }

    /// Child followed when the tested bit is clear
    pub fn left(&self) -> NodeId {
        self.left
    }

    /// Child followed when the tested bit is set
    pub fn right(&self) -> NodeId {
        self.right
    }
}

/// PATRICIA trie mapping byte-string keys to unique leaves
#[derive(Debug, Clone)]
pub struct Ptrie {
    nodes: Vec<PtrieNode>,
    leaf_count: usize,
}

impl Default for Ptrie {
    fn default() -> Self {
        Self::new()
    }
}

impl Ptrie {
    /// Create an empty trie holding only the sentinel root
    pub fn new() -> Self {
        Self {
            nodes: vec![PtrieNode {
                key: None,
                ref_bit: NPOS,
                left: NodeId::ROOT,
                right: NodeId::ROOT,
            }],
            leaf_count: 0,
        }
    }

    /// Number of keys stored
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    /// Whether no key has been inserted
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Number of nodes, leaves and internal nodes, excluding the root
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Look up a node by handle
    pub fn node(&self, id: NodeId) -> Option<&PtrieNode> {
        self.nodes.get(id.0)
    }

    /// The sentinel root node
    pub fn root(&self) -> &PtrieNode {
        &self.nodes[NodeId::ROOT.0]
    }

    /// Iterate over the stored keys in arena order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.nodes.iter().filter_map(PtrieNode::key)
    }

    fn ref_bit(&self, id: NodeId) -> u64 {
        self.nodes[id.0].ref_bit
    }

    fn child(&self, id: NodeId, key: &[u8]) -> NodeId {
        let node = &self.nodes[id.0];
        if key_bit(key, node.ref_bit) {
            node.right
        } else {
            node.left
        }
    }

    fn push_leaf(&mut self, key: &[u8]) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(PtrieNode {
            key: Some(key.into()),
            ref_bit: NPOS,
            left: id,
            right: id,
        });
        self.leaf_count += 1;
        id
    }

    /// Find the leaf holding `key`
    pub fn search(&self, key: impl AsRef<[u8]>) -> Option<NodeId> {
        let key = key.as_ref();
        let mut node = self.root().left;

        loop {
            let prev = node;
            node = self.child(prev, key);

            if node == NodeId::ROOT {
                return None;
            }
            if self.ref_bit(node) <= self.ref_bit(prev) {
                break;
            }
        }

        (self.nodes[node.0].key.as_deref() == Some(key)).then_some(node)
    }

    /// Insert `key`, returning its leaf
    ///
    /// Inserting a key that is already present returns the existing leaf.
    /// Keys containing a NUL byte are rejected with `None`.
    pub fn insert(&mut self, key: impl AsRef<[u8]>) -> Option<NodeId> {
        let key = key.as_ref();
        if key.contains(&0) {
            return None;
        }

        if self.root().left == NodeId::ROOT {
            let leaf = self.push_leaf(key);
            self.nodes[NodeId::ROOT.0].left = leaf;
            return Some(leaf);
        }

        // Nearest existing leaf
        let mut node = self.root().left;
        loop {
            let parent = node;
            node = self.child(parent, key);
            if self.ref_bit(node) <= self.ref_bit(parent) {
                break;
            }
        }

        let existing = self.nodes[node.0].key.as_deref().unwrap_or_default();
        let Some(diff_bit) = first_differing_bit(key, existing) else {
            return Some(node);
        };

        // Insertion point: first node testing a bit at or past `diff_bit`
        let mut prev: Option<NodeId> = None;
        let mut node = self.root().left;
        while self.ref_bit(node) < diff_bit
            && prev.is_none_or(|p| self.ref_bit(node) > self.ref_bit(p))
        {
            prev = Some(node);
            node = self.child(node, key);
        }

        let leaf = self.push_leaf(key);
        let (left, right) = if key_bit(key, diff_bit) {
            (node, leaf)
        } else {
            (leaf, node)
        };
        let branch = NodeId(self.nodes.len());
        self.nodes.push(PtrieNode {
            key: None,
            ref_bit: diff_bit,
            left,
            right,
        });

        match prev {
            None => self.nodes[NodeId::ROOT.0].left = branch,
            Some(parent) => {
                let parent_bit = self.ref_bit(parent);
                let parent = &mut self.nodes[parent.0];
                if key_bit(key, parent_bit) {
                    parent.right = branch;
                } else {
                    parent.left = branch;
                }
            }
        }

        Some(leaf)
    }

    /// Flatten into an index-addressed array
    ///
    /// Nodes are numbered in depth-first pre-order starting at slot 1; slot 0
    /// is the sentinel whose left index names the root's slot.
    pub fn flatten(&self) -> FlatPtrie {
        let mut slots: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len() - 1);
        let mut stack = Vec::new();

        let first = self.root().left;
        if first != NodeId::ROOT {
            stack.push(first);
        }

        while let Some(id) = stack.pop() {
            if slots[id.0].is_some() {
                continue;
            }
            slots[id.0] = Some(order.len() + 1);
            order.push(id);

            let node = &self.nodes[id.0];
            for child in [node.right, node.left] {
                if child != id && child != NodeId::ROOT && slots[child.0].is_none() {
                    stack.push(child);
                }
            }
        }

        let slot_of = |id: NodeId| slots[id.0].unwrap_or(0);

        let mut flat = Vec::with_capacity(order.len() + 1);
        flat.push(FlatNode {
            key: None,
            ref_bit: NPOS,
            left_index: slot_of(first),
            right_index: 0,
        });
        flat.extend(order.iter().map(|&id| {
            let node = &self.nodes[id.0];
            FlatNode {
                key: node.key.clone(),
                ref_bit: node.ref_bit,
                left_index: slot_of(node.left),
                right_index: slot_of(node.right),
            }
        }));

        FlatPtrie::from_nodes(flat)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trie() {
        let trie = Ptrie::new();
        assert!(trie.is_empty());
        assert_eq!(trie.node_count(), 0);
        assert_eq!(trie.search("anything"), None);
        assert_eq!(trie.search(""), None);
        assert_eq!(trie.root().left(), NodeId::ROOT);
    }

    #[test]
    fn test_single_key_becomes_root() {
        let mut trie = Ptrie::new();
        let leaf = trie.insert("only").expect("insert should succeed");

        assert_eq!(trie.root().left(), leaf);
        assert_eq!(trie.node_count(), 1);
        assert_eq!(trie.search("only"), Some(leaf));
        assert_eq!(trie.search("nly"), None);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut trie = Ptrie::new();
        let first = trie.insert("a.bin").expect("insert should succeed");
        trie.insert("b.bin");
        let again = trie.insert("a.bin").expect("insert should succeed");

        assert_eq!(first, again);
        assert_eq!(trie.len(), 2);
        assert_eq!(trie.node_count(), 3);
    }

    #[test]
    fn test_internal_nodes_test_differing_bit() {
        let mut trie = Ptrie::new();
        trie.insert("a");
        trie.insert("c");

        let branch = trie.node(trie.root().left()).expect("root exists");
        assert_eq!(branch.key(), None);
        assert_eq!(branch.ref_bit(), 1);

        // 'a' has bit 1 clear, 'c' has it set
        let left = trie.node(branch.left()).expect("left exists");
        let right = trie.node(branch.right()).expect("right exists");
        assert_eq!(left.key(), Some(&b"a"[..]));
        assert_eq!(right.key(), Some(&b"c"[..]));
    }

    #[test]
    fn test_keys_in_insertion_order() {
        let mut trie = Ptrie::new();
        for key in ["stage", "a", "stage", "zz"] {
            trie.insert(key);
        }

        let keys: Vec<&[u8]> = trie.keys().collect();
        assert_eq!(keys, vec![&b"stage"[..], &b"a"[..], &b"zz"[..]]);
        assert_eq!(Ptrie::new().keys().count(), 0);
    }

    #[test]
    fn test_rejects_nul_keys() {
        let mut trie = Ptrie::new();
        assert_eq!(trie.insert(b"a\0"), None);
        assert!(trie.is_empty());
    }

    #[test]
    fn test_tail_sharing_keys() {
        let mut trie = Ptrie::new();
        for key in ["b", "ab", "bab", "abab", ""] {
            trie.insert(key).expect("insert should succeed");
        }

        for key in ["b", "ab", "bab", "abab", ""] {
            let id = trie.search(key).expect("key should be found");
            assert_eq!(trie.node(id).and_then(PtrieNode::key), Some(key.as_bytes()));
        }
        assert_eq!(trie.search("cab"), None);
        assert_eq!(trie.search("babab"), None);
    }

    #[test]
    fn test_flatten_layout() {
        let mut trie = Ptrie::new();
        trie.insert("a");
        trie.insert("c");
        let flat = trie.flatten();

        assert_eq!(flat.node_count(), 3);
        let root = flat.get(0).expect("sentinel exists");
        assert_eq!(root.ref_bit, NPOS);
        assert_eq!(root.left_index, 1);
        assert_eq!(root.right_index, 0);

        // Pre-order: branch, then left leaf, then right leaf
        let branch = flat.get(1).expect("branch exists");
        assert_eq!(branch.ref_bit, 1);
        assert_eq!((branch.left_index, branch.right_index), (2, 3));

        let leaf = flat.get(2).expect("leaf exists");
        assert_eq!(leaf.key(), Some(&b"a"[..]));
        assert_eq!((leaf.left_index, leaf.right_index), (2, 2));
    }

    #[test]
    fn test_flatten_empty() {
        let flat = Ptrie::new().flatten();
        assert_eq!(flat.node_count(), 0);
        assert_eq!(flat.get(0).map(|n| n.left_index), Some(0));
        assert_eq!(flat.search(""), None);
    }
}
