//! The instantiated component tree with its shared flat state.

use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use hs_core::{CoreError, NodeId, ensure_all_finite};

use crate::builder::LeafHandle;
use crate::component::Component;
use crate::error::{SystemError, SystemResult};
use crate::layout::{Layout, NodeInfo, NodeKind};
use crate::leaf::{ErasedLeaf, Leaf};
use crate::snapshot::SystemSnapshot;

pub(crate) type WireFn = Box<dyn Fn(&dyn Any, &mut dyn Any) + Send>;

/// Output-to-input connection, stored on the lowest common ancestor group.
pub(crate) struct Wire {
    pub(crate) source: usize,
    pub(crate) target: usize,
    /// Position, among the group's children, of the child containing `target`.
    pub(crate) target_child: usize,
    pub(crate) map: WireFn,
}

pub(crate) struct LeafSlot<C> {
    pub(crate) range: Range<usize>,
    pub(crate) leaf: Box<dyn ErasedLeaf<C>>,
}

/// A built component tree: one flat state array, one derivative array,
/// per-leaf input/discrete/output records and the current time.
///
/// The System is the single owner of all storage. Leaves see their state as
/// a borrowed sub-slice for the duration of one update call.
pub struct System<C> {
    layout: Arc<Layout>,
    leaves: Vec<LeafSlot<C>>,
    wires: Vec<Vec<Wire>>,
    x: Vec<f64>,
    xdot: Vec<f64>,
    x0: Vec<f64>,
    t: f64,
}

impl<C: 'static> fmt::Debug for System<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name())
            .field("t", &self.t)
            .field("len", &self.x.len())
            .field("leaves", &self.leaves.len())
            .finish()
    }
}

impl<C: 'static> System<C> {
    pub(crate) fn from_parts(
        layout: Arc<Layout>,
        leaves: Vec<LeafSlot<C>>,
        wires: Vec<Vec<Wire>>,
        x0: Vec<f64>,
    ) -> Self {
        let len = x0.len();
        Self {
            layout,
            leaves,
            wires,
            x: x0.clone(),
            xdot: vec![0.0; len],
            x0,
            t: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.layout.nodes[0].name
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// Total flat-state length.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn set_time(&mut self, t: f64) {
        self.t = t;
    }

    pub fn state(&self) -> &[f64] {
        &self.x
    }

    pub fn state_mut(&mut self) -> &mut [f64] {
        &mut self.x
    }

    pub fn derivative(&self) -> &[f64] {
        &self.xdot
    }

    /// Concatenation of every leaf's `initial_state()`.
    pub fn initial_state(&self) -> &[f64] {
        &self.x0
    }

    /// Overwrite the whole flat state.
    pub fn load_state(&mut self, x: &[f64]) -> SystemResult<()> {
        if x.len() != self.x.len() {
            return Err(SystemError::LengthMismatch {
                expected: self.x.len(),
                actual: x.len(),
            });
        }
        self.x.copy_from_slice(x);
        Ok(())
    }

    pub fn range_of(&self, path: &str) -> Option<Range<usize>> {
        self.layout.range_of(path)
    }

    /// Leaf paths in depth-first (evaluation) order.
    pub fn leaf_paths(&self) -> Vec<&str> {
        self.layout.leaves().map(|n| n.path.as_str()).collect()
    }

    /// Borrow a leaf's state view.
    pub fn leaf_view<K>(&self, handle: &LeafHandle<K>) -> Option<&[f64]> {
        let idx = self.layout.leaf_index(handle.node)?;
        Some(&self.x[self.leaves[idx].range.clone()])
    }

    /// Mutably borrow a leaf's state view; writes land in the flat array.
    pub fn leaf_view_mut<K>(&mut self, handle: &LeafHandle<K>) -> Option<&mut [f64]> {
        let idx = self.layout.leaf_index(handle.node)?;
        let range = self.leaves[idx].range.clone();
        Some(&mut self.x[range])
    }

    pub fn input<K: Component<C>>(&self, handle: &LeafHandle<K>) -> Option<&K::Input> {
        self.typed_leaf(handle).map(|l| &l.input)
    }

    pub fn input_mut<K: Component<C>>(&mut self, handle: &LeafHandle<K>) -> Option<&mut K::Input> {
        self.typed_leaf_mut(handle).map(|l| &mut l.input)
    }

    /// Output record from the most recent continuous update.
    pub fn output<K: Component<C>>(&self, handle: &LeafHandle<K>) -> Option<&K::Output> {
        self.typed_leaf(handle).map(|l| &l.output)
    }

    pub fn discrete<K: Component<C>>(&self, handle: &LeafHandle<K>) -> Option<&K::Discrete> {
        self.typed_leaf(handle).map(|l| &l.discrete)
    }

    pub fn discrete_mut<K: Component<C>>(
        &mut self,
        handle: &LeafHandle<K>,
    ) -> Option<&mut K::Discrete> {
        self.typed_leaf_mut(handle).map(|l| &mut l.discrete)
    }

    pub fn component<K: Component<C>>(&self, handle: &LeafHandle<K>) -> Option<&K> {
        self.typed_leaf(handle).map(|l| &l.component)
    }

    /// Evaluate every leaf's derivative and output, in declaration order.
    pub fn continuous_update(&mut self, ctx: &C) -> SystemResult<()> {
        let root = self.layout.root();
        let Self {
            layout,
            leaves,
            wires,
            x,
            xdot,
            t,
            ..
        } = self;
        continuous_node(layout, wires, leaves, x, xdot, *t, ctx, root)
    }

    /// Run every leaf's discrete update.
    ///
    /// Returns `true` if any leaf modified the continuous state.
    pub fn discrete_update(&mut self, ctx: &C) -> SystemResult<bool> {
        let t = self.t;
        self.visit_leaves(|slot, x, info| {
            let modified = slot
                .leaf
                .discrete_update(x, t, ctx)
                .map_err(|source| SystemError::Component {
                    path: info.path.clone(),
                    t,
                    source,
                })?;
            if modified {
                tracing::debug!(path = %info.path, t, "discrete update modified state");
            }
            Ok(modified)
        })
    }

    /// Apply every leaf's post-step correction.
    ///
    /// Returns `true` if any leaf modified the continuous state.
    pub fn step_correction(&mut self, ctx: &C) -> SystemResult<bool> {
        let t = self.t;
        self.visit_leaves(|slot, x, info| {
            slot.leaf
                .post_step(x, t, ctx)
                .map_err(|source| SystemError::Component {
                    path: info.path.clone(),
                    t,
                    source,
                })
        })
    }

    /// Restore every leaf's discrete state to its initial value.
    pub fn reset_discrete(&mut self) {
        for slot in &mut self.leaves {
            slot.leaf.reset_discrete();
        }
    }

    /// Immutable copy of time, state and every leaf's latest output.
    pub fn snapshot(&self) -> SystemSnapshot {
        let outputs = self.leaves.iter().map(|l| l.leaf.shared_output()).collect();
        SystemSnapshot::new(self.t, self.x.as_slice().into(), outputs, self.layout.clone())
    }

    fn visit_leaves<F>(&mut self, mut f: F) -> SystemResult<bool>
    where
        F: FnMut(&mut LeafSlot<C>, &mut [f64], &NodeInfo) -> SystemResult<bool>,
    {
        let root = self.layout.root();
        let Self {
            layout, leaves, x, ..
        } = self;
        visit_node(layout, leaves, x, root, &mut f)
    }

    fn typed_leaf<K: Component<C>>(&self, handle: &LeafHandle<K>) -> Option<&Leaf<K, C>> {
        let idx = self.layout.leaf_index(handle.node)?;
        self.leaves[idx].leaf.as_any().downcast_ref::<Leaf<K, C>>()
    }

    fn typed_leaf_mut<K: Component<C>>(
        &mut self,
        handle: &LeafHandle<K>,
    ) -> Option<&mut Leaf<K, C>> {
        let idx = self.layout.leaf_index(handle.node)?;
        self.leaves[idx]
            .leaf
            .as_any_mut()
            .downcast_mut::<Leaf<K, C>>()
    }
}

#[allow(clippy::too_many_arguments)]
fn continuous_node<C>(
    layout: &Layout,
    wires: &[Vec<Wire>],
    leaves: &mut [LeafSlot<C>],
    x: &[f64],
    xdot: &mut [f64],
    t: f64,
    ctx: &C,
    node: NodeId,
) -> SystemResult<()> {
    let info = &layout.nodes[node.slot()];
    match info.kind {
        NodeKind::Leaf => {
            let Some(idx) = layout.leaf_index(node) else {
                return Ok(());
            };
            let slot = &mut leaves[idx];
            let range = slot.range.clone();
            let out = &mut xdot[range.clone()];
            out.fill(0.0);
            slot.leaf
                .continuous_update(&x[range], t, ctx, out)
                .map_err(|source| SystemError::Component {
                    path: info.path.clone(),
                    t,
                    source,
                })?;
            if let Err(CoreError::NonFinite { value, .. }) = ensure_all_finite(out, "derivative")
            {
                return Err(SystemError::NonFinite {
                    path: info.path.clone(),
                    t,
                    value,
                });
            }
        }
        NodeKind::Group => {
            let group_wires = &wires[node.slot()];
            for (pos, child) in info.children.iter().enumerate() {
                for wire in group_wires.iter().filter(|w| w.target_child == pos) {
                    apply_wire(leaves, wire);
                }
                continuous_node(layout, wires, leaves, x, xdot, t, ctx, *child)?;
            }
        }
    }
    Ok(())
}

fn apply_wire<C>(leaves: &mut [LeafSlot<C>], wire: &Wire) {
    let (head, tail) = leaves.split_at_mut(wire.target);
    let source = head[wire.source].leaf.output_any();
    let target = tail[0].leaf.input_any_mut();
    (wire.map)(source, target);
}

/// Depth-first visit of every leaf, OR-ing the returned flags.
///
/// Every leaf is visited even after one reports a modification.
fn visit_node<C, F>(
    layout: &Layout,
    leaves: &mut [LeafSlot<C>],
    x: &mut [f64],
    node: NodeId,
    f: &mut F,
) -> SystemResult<bool>
where
    F: FnMut(&mut LeafSlot<C>, &mut [f64], &NodeInfo) -> SystemResult<bool>,
{
    let info = &layout.nodes[node.slot()];
    match info.kind {
        NodeKind::Leaf => {
            let Some(idx) = layout.leaf_index(node) else {
                return Ok(false);
            };
            let slot = &mut leaves[idx];
            let range = slot.range.clone();
            f(slot, &mut x[range], info)
        }
        NodeKind::Group => {
            let mut modified = false;
            for child in &info.children {
                modified |= visit_node(layout, leaves, x, *child, f)?;
            }
            Ok(modified)
        }
    }
}
