//! Incremental construction of a component tree.

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use hs_core::NodeId;

use crate::component::{Component, Ports};
use crate::error::{SystemError, SystemResult};
use crate::layout::{Layout, NodeInfo, NodeKind};
use crate::leaf::{ErasedLeaf, Leaf};
use crate::system::{LeafSlot, System, Wire, WireFn};
use crate::validate;

/// Handle to a group node inside a [`SystemBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHandle(pub(crate) NodeId);

impl GroupHandle {
    pub fn id(&self) -> NodeId {
        self.0
    }
}

/// Typed handle to a leaf component.
///
/// Valid for the builder that produced it and for the System it builds.
pub struct LeafHandle<K> {
    pub(crate) node: NodeId,
    _marker: PhantomData<fn() -> K>,
}

impl<K> LeafHandle<K> {
    pub(crate) fn new(node: NodeId) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }
}

impl<K> Clone for LeafHandle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for LeafHandle<K> {}

impl<K> fmt::Debug for LeafHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeafHandle({})", self.node)
    }
}

enum Draft<C> {
    Group {
        children: Vec<NodeId>,
        declared_len: Option<usize>,
    },
    Leaf {
        leaf: Option<Box<dyn ErasedLeaf<C>>>,
        state_len: usize,
        initial: Vec<f64>,
    },
}

struct DraftNode<C> {
    name: String,
    parent: Option<NodeId>,
    draft: Draft<C>,
}

struct DraftWire {
    from: NodeId,
    to: NodeId,
    map: WireFn,
}

/// Builder for a [`System`].
///
/// Add groups and leaves under a parent group, optionally declare the
/// expected state length of a group, and wire earlier leaves' outputs into
/// later leaves' inputs. `build()` validates the tree and freezes it.
pub struct SystemBuilder<C> {
    nodes: Vec<DraftNode<C>>,
    wires: Vec<DraftWire>,
}

impl<C: 'static> SystemBuilder<C> {
    /// Create a builder whose root group has the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            nodes: vec![DraftNode {
                name: name.into(),
                parent: None,
                draft: Draft::Group {
                    children: Vec::new(),
                    declared_len: None,
                },
            }],
            wires: Vec::new(),
        }
    }

    pub fn root(&self) -> GroupHandle {
        GroupHandle(NodeId::from_index(0))
    }

    /// Add an empty group under `parent`.
    pub fn add_group(
        &mut self,
        parent: GroupHandle,
        name: impl Into<String>,
    ) -> SystemResult<GroupHandle> {
        let id = self.push_node(
            parent,
            name.into(),
            Draft::Group {
                children: Vec::new(),
                declared_len: None,
            },
        )?;
        Ok(GroupHandle(id))
    }

    /// Add a group whose children must provide exactly `declared_len` states.
    pub fn add_group_with_len(
        &mut self,
        parent: GroupHandle,
        name: impl Into<String>,
        declared_len: usize,
    ) -> SystemResult<GroupHandle> {
        let group = self.add_group(parent, name)?;
        self.declare_len(group, declared_len)?;
        Ok(group)
    }

    /// Declare the total state length a group's children must partition.
    pub fn declare_len(&mut self, group: GroupHandle, len: usize) -> SystemResult<()> {
        let path = self.draft_path(group.0);
        match self.nodes.get_mut(group.0.slot()).map(|n| &mut n.draft) {
            Some(Draft::Group { declared_len, .. }) => {
                *declared_len = Some(len);
                Ok(())
            }
            Some(Draft::Leaf { .. }) => Err(SystemError::NotAGroup { path }),
            None => Err(SystemError::UnknownNode { id: group.0 }),
        }
    }

    /// Add a leaf component under `parent`.
    pub fn add_leaf<K>(
        &mut self,
        parent: GroupHandle,
        name: impl Into<String>,
        component: K,
    ) -> SystemResult<LeafHandle<K>>
    where
        K: Component<C>,
    {
        let state_len = component.state_len();
        let initial = component.initial_state();
        let leaf: Box<dyn ErasedLeaf<C>> = Box::new(Leaf::new(component));
        let id = self.push_node(
            parent,
            name.into(),
            Draft::Leaf {
                leaf: Some(leaf),
                state_len,
                initial,
            },
        )?;
        Ok(LeafHandle::new(id))
    }

    /// Feed `from`'s output into `to`'s input on every continuous update.
    ///
    /// `from` must be evaluated before `to`, i.e. it must come earlier in
    /// declaration order; backward wiring would make siblings cyclic. Both
    /// handles must name leaves of this builder carrying the mapped records.
    pub fn connect<A, B, F>(
        &mut self,
        from: &LeafHandle<A>,
        to: &LeafHandle<B>,
        map: F,
    ) -> SystemResult<()>
    where
        A: Ports,
        B: Ports,
        F: Fn(&A::Output, &mut B::Input) + Send + 'static,
    {
        for id in [from.node, to.node] {
            if id.slot() >= self.nodes.len() {
                return Err(SystemError::UnknownNode { id });
            }
        }
        if from.node == to.node {
            let path = self.draft_path(from.node);
            return Err(SystemError::CyclicWiring {
                from: path.clone(),
                to: path,
            });
        }
        self.check_endpoint(from.node, type_name::<A::Output>(), |leaf| {
            leaf.output_any().is::<A::Output>()
        })?;
        self.check_endpoint(to.node, type_name::<B::Input>(), |leaf| {
            leaf.input_any().is::<B::Input>()
        })?;
        let map: WireFn = Box::new(move |src: &dyn Any, dst: &mut dyn Any| {
            let source = src.downcast_ref::<A::Output>();
            let target = dst.downcast_mut::<B::Input>();
            if let (Some(y), Some(u)) = (source, target) {
                map(y, u);
            }
        });
        self.wires.push(DraftWire {
            from: from.node,
            to: to.node,
            map,
        });
        Ok(())
    }

    /// Validate the tree, assign flat-state ranges and allocate storage.
    pub fn build(mut self) -> SystemResult<System<C>> {
        validate::validate_name(&self.nodes[0].name)?;

        let count = self.nodes.len();
        let mut infos: Vec<NodeInfo> = Vec::with_capacity(count);
        for (i, node) in self.nodes.iter().enumerate() {
            let (kind, children) = match &node.draft {
                Draft::Group { children, .. } => (NodeKind::Group, children.clone()),
                Draft::Leaf { .. } => (NodeKind::Leaf, Vec::new()),
            };
            infos.push(NodeInfo {
                name: node.name.clone(),
                path: self.draft_path(NodeId::from_index(i as u32)),
                parent: node.parent,
                kind,
                children,
                range: 0..0,
            });
        }

        let mut leaf_of_node = vec![None; count];
        let mut leaf_nodes = Vec::new();
        let mut leaves = Vec::new();
        let mut x0 = Vec::new();
        let root = NodeId::from_index(0);
        self.assign(
            root,
            &mut infos,
            &mut leaf_of_node,
            &mut leaf_nodes,
            &mut leaves,
            &mut x0,
        )?;

        let leaf_ranges: Vec<_> = leaves.iter().map(|l: &LeafSlot<C>| l.range.clone()).collect();
        validate::validate_partition(&infos[0].path, &leaf_ranges, x0.len())?;

        let layout = Layout {
            nodes: infos,
            leaf_of_node,
            leaf_nodes,
            total_len: x0.len(),
        };

        let mut wires: Vec<Vec<Wire>> = (0..count).map(|_| Vec::new()).collect();
        for draft in self.wires.drain(..) {
            let (group, wire) = resolve_wire(&layout, draft)?;
            wires[group.slot()].push(wire);
        }

        tracing::debug!(
            system = %layout.nodes[0].path,
            leaves = layout.leaf_count(),
            states = layout.len(),
            "built component tree"
        );

        Ok(System::from_parts(Arc::new(layout), leaves, wires, x0))
    }

    fn assign(
        &mut self,
        node: NodeId,
        infos: &mut [NodeInfo],
        leaf_of_node: &mut [Option<usize>],
        leaf_nodes: &mut Vec<NodeId>,
        leaves: &mut Vec<LeafSlot<C>>,
        x0: &mut Vec<f64>,
    ) -> SystemResult<()> {
        let start = x0.len();
        let path = infos[node.slot()].path.clone();
        match &mut self.nodes[node.slot()].draft {
            Draft::Leaf {
                leaf,
                state_len,
                initial,
            } => {
                if initial.len() != *state_len {
                    return Err(SystemError::StateLengthMismatch {
                        path,
                        declared: *state_len,
                        actual: initial.len(),
                    });
                }
                x0.extend_from_slice(initial);
                let range = start..x0.len();
                let leaf = leaf.take().ok_or(SystemError::UnknownNode { id: node })?;
                leaf_of_node[node.slot()] = Some(leaves.len());
                leaf_nodes.push(node);
                leaves.push(LeafSlot {
                    range: range.clone(),
                    leaf,
                });
                infos[node.slot()].range = range;
            }
            Draft::Group {
                children,
                declared_len,
            } => {
                let children = children.clone();
                let declared = *declared_len;
                for child in children {
                    self.assign(child, infos, leaf_of_node, leaf_nodes, leaves, x0)?;
                }
                let actual = x0.len() - start;
                match declared {
                    Some(declared) if declared != actual => {
                        return Err(SystemError::PartitionMismatch {
                            path,
                            declared,
                            actual,
                        });
                    }
                    _ => {}
                }
                infos[node.slot()].range = start..x0.len();
            }
        }
        Ok(())
    }

    fn push_node(
        &mut self,
        parent: GroupHandle,
        name: String,
        draft: Draft<C>,
    ) -> SystemResult<NodeId> {
        validate::validate_name(&name)?;
        let parent_path = self.draft_path(parent.0);
        let id = NodeId::from_index(self.nodes.len() as u32);
        let siblings = match self.nodes.get(parent.0.slot()).map(|n| &n.draft) {
            Some(Draft::Group { children, .. }) => children.clone(),
            Some(Draft::Leaf { .. }) => return Err(SystemError::NotAGroup { path: parent_path }),
            None => return Err(SystemError::UnknownNode { id: parent.0 }),
        };
        validate::validate_unique(
            siblings.iter().map(|c| self.nodes[c.slot()].name.as_str()),
            &name,
            &parent_path,
        )?;
        if let Draft::Group { children, .. } = &mut self.nodes[parent.0.slot()].draft {
            children.push(id);
        }
        self.nodes.push(DraftNode {
            name,
            parent: Some(parent.0),
            draft,
        });
        Ok(id)
    }

    fn check_endpoint(
        &self,
        id: NodeId,
        expected: &'static str,
        carries: impl Fn(&dyn ErasedLeaf<C>) -> bool,
    ) -> SystemResult<()> {
        match &self.nodes[id.slot()].draft {
            Draft::Leaf {
                leaf: Some(leaf), ..
            } if carries(leaf.as_ref()) => Ok(()),
            _ => Err(SystemError::WireTypeMismatch {
                path: self.draft_path(id),
                expected,
            }),
        }
    }

    fn draft_path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(node) = cursor.and_then(|c| self.nodes.get(c.slot())) {
            parts.push(node.name.as_str());
            cursor = node.parent;
        }
        parts.reverse();
        parts.join("/")
    }
}

/// Place a wire on the lowest common ancestor group of its endpoints.
fn resolve_wire(layout: &Layout, draft: DraftWire) -> SystemResult<(NodeId, Wire)> {
    let from_path = layout.nodes[draft.from.slot()].path.clone();
    let to_path = layout.nodes[draft.to.slot()].path.clone();
    let cyclic = || SystemError::CyclicWiring {
        from: from_path.clone(),
        to: to_path.clone(),
    };

    let source = layout.leaf_index(draft.from).ok_or_else(cyclic)?;
    let target = layout.leaf_index(draft.to).ok_or_else(cyclic)?;
    if source >= target {
        return Err(cyclic());
    }

    let from_chain = ancestors(layout, draft.from);
    let to_chain = ancestors(layout, draft.to);
    let mut depth = 0;
    while depth < from_chain.len()
        && depth < to_chain.len()
        && from_chain[depth] == to_chain[depth]
    {
        depth += 1;
    }
    // depth >= 1 (shared root) and both chains extend past the ancestor,
    // since the endpoints are distinct leaves.
    let group = from_chain[depth - 1];
    let target_child_id = to_chain[depth];
    let target_child = layout.nodes[group.slot()]
        .children
        .iter()
        .position(|c| *c == target_child_id)
        .ok_or_else(cyclic)?;

    Ok((
        group,
        Wire {
            source,
            target,
            target_child,
            map: draft.map,
        },
    ))
}

/// Root-first chain of node ids ending at `node`.
fn ancestors(layout: &Layout, node: NodeId) -> Vec<NodeId> {
    let mut chain = Vec::new();
    let mut cursor = Some(node);
    while let Some(id) = cursor {
        chain.push(id);
        cursor = layout.nodes[id.slot()].parent;
    }
    chain.reverse();
    chain
}
