//! Component tree and flat-state System for hybrid dynamical models.
//!
//! A [`System`] is built once from a tree of named groups and leaf
//! components. Construction assigns every leaf a contiguous range of one
//! flat continuous-state array (depth-first, in declaration order). The
//! System owns that array; components only ever see borrowed sub-slices
//! for the duration of a single update call.
//!
//! # Example
//!
//! ```
//! use hs_system::{Component, ComponentResult, Ports, SystemBuilder};
//!
//! struct Decay;
//!
//! impl Ports for Decay {
//!     type Input = ();
//!     type Output = f64;
//!     type Discrete = ();
//! }
//!
//! impl Component<()> for Decay {
//!     fn state_len(&self) -> usize {
//!         1
//!     }
//!     fn initial_state(&self) -> Vec<f64> {
//!         vec![1.0]
//!     }
//!     fn continuous_update(
//!         &self,
//!         x: &[f64],
//!         _u: &(),
//!         _d: &(),
//!         _t: f64,
//!         _ctx: &(),
//!         xdot: &mut [f64],
//!     ) -> ComponentResult<f64> {
//!         xdot[0] = -x[0];
//!         Ok(x[0])
//!     }
//! }
//!
//! let mut builder = SystemBuilder::<()>::new("plant");
//! let root = builder.root();
//! let decay = builder.add_leaf(root, "decay", Decay).unwrap();
//! let mut system = builder.build().unwrap();
//!
//! system.continuous_update(&()).unwrap();
//! assert_eq!(system.derivative(), &[-1.0]);
//! assert_eq!(system.output(&decay), Some(&1.0));
//! ```

pub mod builder;
pub mod component;
pub mod error;
pub mod layout;
pub mod snapshot;
pub mod system;

mod leaf;
pub(crate) mod validate;

pub use builder::{GroupHandle, LeafHandle, SystemBuilder};
pub use component::{Component, Ports};
pub use error::{ComponentError, ComponentResult, SystemError, SystemResult};
pub use layout::{Layout, NodeKind};
pub use snapshot::SystemSnapshot;
pub use system::System;
