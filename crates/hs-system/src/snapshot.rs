//! Immutable output snapshots.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::builder::LeafHandle;
use crate::component::Ports;
use crate::layout::Layout;

/// Time, flat state and every leaf's output at one instant.
///
/// Cloning is cheap: all payloads are reference counted, so snapshots can be
/// handed to other threads without copying the records.
#[derive(Clone)]
pub struct SystemSnapshot {
    t: f64,
    state: Arc<[f64]>,
    outputs: Arc<[Arc<dyn Any + Send + Sync>]>,
    layout: Arc<Layout>,
}

impl SystemSnapshot {
    pub(crate) fn new(
        t: f64,
        state: Arc<[f64]>,
        outputs: Vec<Arc<dyn Any + Send + Sync>>,
        layout: Arc<Layout>,
    ) -> Self {
        Self {
            t,
            state,
            outputs: outputs.into(),
            layout,
        }
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn state(&self) -> &[f64] {
        &self.state
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Typed output of a leaf.
    pub fn output<K: Ports>(&self, handle: &LeafHandle<K>) -> Option<&K::Output> {
        let idx = self.layout.leaf_index(handle.node)?;
        self.outputs.get(idx)?.downcast_ref::<K::Output>()
    }

    /// Output of the leaf at `path`, if it has type `T`.
    pub fn output_at<T: 'static>(&self, path: &str) -> Option<&T> {
        let id = self.layout.find(path)?;
        let idx = self.layout.leaf_index(id)?;
        self.outputs.get(idx)?.downcast_ref::<T>()
    }

    /// State slice of the node at `path`.
    pub fn state_at(&self, path: &str) -> Option<&[f64]> {
        let range = self.layout.range_of(path)?;
        self.state.get(range)
    }
}

impl fmt::Debug for SystemSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemSnapshot")
            .field("t", &self.t)
            .field("state", &self.state)
            .finish()
    }
}
