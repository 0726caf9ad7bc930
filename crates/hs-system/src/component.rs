//! The state-space component contract.
//!
//! A component is a pure description of dynamics over its own records:
//!
//! ```text
//! continuous_update(x, u, d, t, ctx) -> (xdot, y)
//! discrete_update(x, u, d, t, ctx)   -> modified?   (may rewrite x and d)
//! post_step(x, u, d, t, ctx)         -> modified?   (fixed-point correction)
//! ```
//!
//! `x` and `xdot` are borrowed views into the owning System's flat arrays;
//! their length is always [`Component::state_len`].

use crate::error::ComponentResult;

/// Records a component exchanges with the rest of the tree.
///
/// Kept separate from [`Component`] so that the record types do not depend
/// on the context type, which lets typed handles and snapshots name them.
pub trait Ports: Send + 'static {
    /// Input record, written by wiring or by I/O devices.
    type Input: Clone + Default + Send + 'static;
    /// Output record, recomputed on every continuous update.
    type Output: Clone + Default + Send + Sync + 'static;
    /// Discrete state, changed only by discrete updates.
    type Discrete: Clone + Default + Send + 'static;
}

/// Dynamics of one leaf of the component tree, evaluated under context `C`.
pub trait Component<C>: Ports {
    /// Number of continuous states this component owns.
    fn state_len(&self) -> usize;

    /// Initial continuous state; must have exactly `state_len()` entries.
    fn initial_state(&self) -> Vec<f64>;

    /// Initial discrete state.
    fn initial_discrete(&self) -> Self::Discrete {
        Self::Discrete::default()
    }

    /// Write the state derivative into `xdot` and return the output record.
    fn continuous_update(
        &self,
        x: &[f64],
        u: &Self::Input,
        d: &Self::Discrete,
        t: f64,
        ctx: &C,
        xdot: &mut [f64],
    ) -> ComponentResult<Self::Output>;

    /// Apply a discrete transition after an accepted step.
    ///
    /// Returns `true` if `x` was changed.
    fn discrete_update(
        &self,
        _x: &mut [f64],
        _u: &Self::Input,
        _d: &mut Self::Discrete,
        _t: f64,
        _ctx: &C,
    ) -> ComponentResult<bool> {
        Ok(false)
    }

    /// Project the state back onto its valid set (e.g. unit norm).
    ///
    /// Returns `true` if `x` was changed.
    fn post_step(
        &self,
        _x: &mut [f64],
        _u: &Self::Input,
        _d: &Self::Discrete,
        _t: f64,
        _ctx: &C,
    ) -> ComponentResult<bool> {
        Ok(false)
    }
}
