//! Immutable shape of a built component tree.
//!
//! The layout records, for every node, its path and the contiguous range of
//! the flat state array it covers. Group ranges are the union of their
//! children's ranges; nothing is copied.

use std::ops::Range;

use hs_core::NodeId;

/// Whether a node is an aggregate or a state-owning leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Leaf,
}

/// One node of the built tree.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    /// Slash-separated path from the root, e.g. `vehicle/engine`.
    pub path: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    /// Sub-range of the flat state array owned by this node.
    pub range: Range<usize>,
}

/// Tree shape and flat-state partition, fixed for the System's lifetime.
#[derive(Debug, Clone)]
pub struct Layout {
    pub(crate) nodes: Vec<NodeInfo>,
    /// Node slot -> position in depth-first leaf order.
    pub(crate) leaf_of_node: Vec<Option<usize>>,
    /// Depth-first leaf order -> node.
    pub(crate) leaf_nodes: Vec<NodeId>,
    pub(crate) total_len: usize,
}

impl Layout {
    pub fn root(&self) -> NodeId {
        NodeId::from_index(0)
    }

    /// Total length of the flat continuous-state array.
    pub fn len(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
        self.nodes.get(id.slot())
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    /// Look up a node by its full path.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.path == path)
            .map(|i| NodeId::from_index(i as u32))
    }

    pub fn range_of(&self, path: &str) -> Option<Range<usize>> {
        self.find(path)
            .and_then(|id| self.node(id))
            .map(|n| n.range.clone())
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_nodes.len()
    }

    /// Leaves in depth-first order with their state ranges.
    pub fn leaves(&self) -> impl Iterator<Item = &NodeInfo> {
        self.leaf_nodes.iter().map(|id| &self.nodes[id.slot()])
    }

    pub(crate) fn leaf_index(&self, node: NodeId) -> Option<usize> {
        self.leaf_of_node.get(node.slot()).copied().flatten()
    }

    /// One label per flat-state entry, `path[i]`, in storage order.
    pub fn state_labels(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.total_len);
        for leaf in self.leaves() {
            for i in 0..leaf.range.len() {
                labels.push(format!("{}[{}]", leaf.path, i));
            }
        }
        labels
    }
}
