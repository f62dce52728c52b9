//! Flattened, index-addressed trie

use super::{NPOS, key_bit};

/// A node of a [`FlatPtrie`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatNode {
    pub(crate) key: Option<Box<[u8]>>,
    /// Tested bit position, [`NPOS`] for leaves and the sentinel
    pub ref_bit: u64,
    /// Slot followed when the tested bit is clear
    pub left_index: usize,
    /// Slot followed when the tested bit is set
    pub right_index: usize,
}

impl FlatNode {
    /// Key stored in a leaf; `None` for the sentinel and internal nodes
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Whether this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.key.is_some()
    }
}

/// Trie stored as a single array; slot 0 is the sentinel root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatPtrie {
    nodes: Vec<FlatNode>,
}

impl FlatPtrie {
    pub(crate) fn from_nodes(nodes: Vec<FlatNode>) -> Self {
        debug_assert!(!nodes.is_empty());
        Self { nodes }
    }

    /// Number of nodes excluding the sentinel
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// All slots, sentinel first
    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    /// Node at `index`
    pub fn get(&self, index: usize) -> Option<&FlatNode> {
        self.nodes.get(index)
    }

    /// Find the slot holding `key`
    pub fn search(&self, key: impl AsRef<[u8]>) -> Option<usize> {
        let key = key.as_ref();
        let mut index = self.nodes[0].left_index;

        loop {
            let prev = self.nodes.get(index)?;
            index = if key_bit(key, prev.ref_bit) {
                prev.right_index
            } else {
                prev.left_index
            };

            if index == 0 {
                return None;
            }
            if self.nodes.get(index)?.ref_bit <= prev.ref_bit {
                break;
            }
        }

        (self.nodes[index].key.as_deref() == Some(key)).then_some(index)
    }

    /// Exchange slots `a` and `b`, rewriting every link that names either
    ///
    /// The sentinel cannot be moved; requests involving slot 0 or an
    /// out-of-range slot are ignored.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a == b || a == 0 || b == 0 || a >= self.nodes.len() || b >= self.nodes.len() {
            return;
        }

        let remap = |index: usize| {
            if index == a {
                b
            } else if index == b {
                a
            } else {
                index
            }
        };
        for node in &mut self.nodes {
            node.left_index = remap(node.left_index);
            node.right_index = remap(node.right_index);
        }
        self.nodes.swap(a, b);
    }

    /// Reorder slots so that slot `i + 1` holds `keys[i]`
    ///
    /// Returns the position of the first key that is not present.
    pub fn arrange<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<(), usize> {
        for (position, key) in keys.iter().enumerate() {
            let slot = self.search(key).ok_or(position)?;
            self.swap(slot, position + 1);
        }
        Ok(())
    }

    /// Whether the sentinel still carries its fixed values
    pub fn has_valid_sentinel(&self) -> bool {
        let root = &self.nodes[0];
        root.key.is_none() && root.ref_bit == NPOS && root.right_index == 0
    }
}
