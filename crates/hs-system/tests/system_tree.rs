//! Integration tests for tree construction, flat-state views and dispatch.

use hs_system::{
    Component, ComponentError, ComponentResult, Ports, SystemBuilder, SystemError,
};
use proptest::prelude::*;

/// First-order lag: xdot = (u - x) / tau, y = x.
struct Lag {
    tau: f64,
    x0: f64,
}

impl Ports for Lag {
    type Input = f64;
    type Output = f64;
    type Discrete = ();
}

impl Component<()> for Lag {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.x0]
    }

    fn continuous_update(
        &self,
        x: &[f64],
        u: &f64,
        _d: &(),
        _t: f64,
        _ctx: &(),
        xdot: &mut [f64],
    ) -> ComponentResult<f64> {
        xdot[0] = (u - x[0]) / self.tau;
        Ok(x[0])
    }
}

/// Block of `n` states with unit derivative; output is the state sum.
struct Block {
    n: usize,
    offset: f64,
}

impl Ports for Block {
    type Input = ();
    type Output = f64;
    type Discrete = u32;
}

impl Component<()> for Block {
    fn state_len(&self) -> usize {
        self.n
    }

    fn initial_state(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.offset + i as f64).collect()
    }

    fn continuous_update(
        &self,
        x: &[f64],
        _u: &(),
        _d: &u32,
        _t: f64,
        _ctx: &(),
        xdot: &mut [f64],
    ) -> ComponentResult<f64> {
        xdot.fill(1.0);
        Ok(x.iter().sum())
    }

    fn discrete_update(
        &self,
        x: &mut [f64],
        _u: &(),
        d: &mut u32,
        _t: f64,
        _ctx: &(),
    ) -> ComponentResult<bool> {
        *d += 1;
        if x.first().is_some_and(|v| *v >= 10.0) {
            x.fill(0.0);
            return Ok(true);
        }
        Ok(false)
    }
}

/// Declares one state but supplies two.
struct Liar;

impl Ports for Liar {
    type Input = ();
    type Output = ();
    type Discrete = ();
}

impl Component<()> for Liar {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![0.0, 0.0]
    }

    fn continuous_update(
        &self,
        _x: &[f64],
        _u: &(),
        _d: &(),
        _t: f64,
        _ctx: &(),
        _xdot: &mut [f64],
    ) -> ComponentResult<()> {
        Ok(())
    }
}

/// Fails once time reaches `fail_at`, or emits NaN when `nan` is set.
struct Fragile {
    fail_at: f64,
    nan: bool,
}

impl Ports for Fragile {
    type Input = ();
    type Output = ();
    type Discrete = ();
}

impl Component<()> for Fragile {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![0.0]
    }

    fn continuous_update(
        &self,
        _x: &[f64],
        _u: &(),
        _d: &(),
        t: f64,
        _ctx: &(),
        xdot: &mut [f64],
    ) -> ComponentResult<()> {
        if t >= self.fail_at {
            return Err(ComponentError::non_physical("negative pressure"));
        }
        xdot[0] = if self.nan { f64::NAN } else { 1.0 };
        Ok(())
    }
}

#[test]
fn ranges_follow_depth_first_declaration_order() {
    let mut builder = SystemBuilder::<()>::new("vehicle");
    let root = builder.root();
    let airframe = builder.add_group(root, "airframe").unwrap();
    let engine = builder.add_leaf(root, "engine", Block { n: 2, offset: 0.0 }).unwrap();
    // Added after `engine`, but lives under the earlier `airframe` group.
    let body = builder
        .add_leaf(airframe, "body", Block { n: 3, offset: 10.0 })
        .unwrap();
    let system = builder.build().unwrap();

    assert_eq!(system.len(), 5);
    assert_eq!(system.range_of("vehicle/airframe"), Some(0..3));
    assert_eq!(system.range_of("vehicle/airframe/body"), Some(0..3));
    assert_eq!(system.range_of("vehicle/engine"), Some(3..5));
    assert_eq!(system.range_of("vehicle"), Some(0..5));
    assert_eq!(system.leaf_paths(), vec!["vehicle/airframe/body", "vehicle/engine"]);
    assert_eq!(system.leaf_view(&body).unwrap(), &[10.0, 11.0, 12.0]);
    assert_eq!(system.leaf_view(&engine).unwrap(), &[0.0, 1.0]);
    assert_eq!(
        system.layout().state_labels(),
        vec![
            "vehicle/airframe/body[0]",
            "vehicle/airframe/body[1]",
            "vehicle/airframe/body[2]",
            "vehicle/engine[0]",
            "vehicle/engine[1]",
        ]
    );
}

#[test]
fn leaf_view_aliases_flat_state() {
    let mut builder = SystemBuilder::<()>::new("sys");
    let root = builder.root();
    let a = builder.add_leaf(root, "a", Block { n: 2, offset: 0.0 }).unwrap();
    let b = builder.add_leaf(root, "b", Block { n: 2, offset: 5.0 }).unwrap();
    let mut system = builder.build().unwrap();

    system.leaf_view_mut(&b).unwrap()[1] = 42.0;
    assert_eq!(system.state()[3], 42.0);

    system.state_mut()[0] = -1.0;
    assert_eq!(system.leaf_view(&a).unwrap()[0], -1.0);
}

#[test]
fn wiring_feeds_later_sibling_in_same_pass() {
    let mut builder = SystemBuilder::<()>::new("chain");
    let root = builder.root();
    let first = builder.add_leaf(root, "first", Lag { tau: 1.0, x0: 3.0 }).unwrap();
    let second = builder.add_leaf(root, "second", Lag { tau: 2.0, x0: 1.0 }).unwrap();
    builder.connect(&first, &second, |y: &f64, u: &mut f64| *u = *y).unwrap();
    let mut system = builder.build().unwrap();

    *system.input_mut(&first).unwrap() = 5.0;
    system.continuous_update(&()).unwrap();

    // second sees first's output (3.0) computed in this same evaluation
    assert_eq!(system.input(&second), Some(&3.0));
    assert_eq!(system.derivative(), &[2.0, 1.0]);
    assert_eq!(system.output(&second), Some(&1.0));
}

#[test]
fn wiring_into_nested_group_is_applied_before_the_group() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    let source = builder.add_leaf(root, "source", Lag { tau: 1.0, x0: 7.0 }).unwrap();
    let inner = builder.add_group(root, "inner").unwrap();
    let sink = builder.add_leaf(inner, "sink", Lag { tau: 1.0, x0: 0.0 }).unwrap();
    builder.connect(&source, &sink, |y: &f64, u: &mut f64| *u = 2.0 * y).unwrap();
    let mut system = builder.build().unwrap();

    system.continuous_update(&()).unwrap();
    assert_eq!(system.input(&sink), Some(&14.0));
    assert_eq!(system.derivative()[1], 14.0);
}

#[test]
fn backward_wiring_is_rejected() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    let a = builder.add_leaf(root, "a", Lag { tau: 1.0, x0: 0.0 }).unwrap();
    let b = builder.add_leaf(root, "b", Lag { tau: 1.0, x0: 0.0 }).unwrap();
    builder.connect(&b, &a, |y: &f64, u: &mut f64| *u = *y).unwrap();
    let err = builder.build().unwrap_err();
    assert!(matches!(err, SystemError::CyclicWiring { .. }));
    assert!(err.is_configuration());
}

#[test]
fn self_wiring_is_rejected_immediately() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    let a = builder.add_leaf(root, "a", Lag { tau: 1.0, x0: 0.0 }).unwrap();
    let err = builder
        .connect(&a, &a, |y: &f64, u: &mut f64| *u = *y)
        .unwrap_err();
    assert!(matches!(err, SystemError::CyclicWiring { .. }));
}

#[test]
fn foreign_handle_with_wrong_records_is_rejected() {
    let mut other = SystemBuilder::<()>::new("other");
    let other_root = other.root();
    other.add_leaf(other_root, "p", Block { n: 1, offset: 0.0 }).unwrap();
    let foreign = other.add_leaf(other_root, "q", Lag { tau: 1.0, x0: 0.0 }).unwrap();

    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    let a = builder.add_leaf(root, "a", Lag { tau: 1.0, x0: 0.0 }).unwrap();
    builder.add_leaf(root, "b", Block { n: 1, offset: 0.0 }).unwrap();

    // `foreign` indexes "root/b", whose input is not an f64
    let err = builder
        .connect(&a, &foreign, |y: &f64, u: &mut f64| *u = *y)
        .unwrap_err();
    match err {
        SystemError::WireTypeMismatch { path, .. } => assert_eq!(path, "root/b"),
        unexpected => panic!("unexpected error {unexpected:?}"),
    }
    assert!(builder.build().is_ok());
}

#[test]
fn declared_group_length_must_partition() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    let group = builder.add_group_with_len(root, "engine", 4).unwrap();
    builder.add_leaf(group, "spool", Block { n: 1, offset: 0.0 }).unwrap();
    builder.add_leaf(group, "fuel", Block { n: 2, offset: 0.0 }).unwrap();

    match builder.build().unwrap_err() {
        SystemError::PartitionMismatch {
            path,
            declared,
            actual,
        } => {
            assert_eq!(path, "root/engine");
            assert_eq!(declared, 4);
            assert_eq!(actual, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn initial_state_length_mismatch_is_fatal() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    builder.add_leaf(root, "liar", Liar).unwrap();
    let err = builder.build().unwrap_err();
    assert!(matches!(err, SystemError::StateLengthMismatch { declared: 1, actual: 2, .. }));
}

#[test]
fn duplicate_and_invalid_names_are_rejected() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    builder.add_leaf(root, "a", Lag { tau: 1.0, x0: 0.0 }).unwrap();
    assert!(matches!(
        builder.add_group(root, "a"),
        Err(SystemError::DuplicateName { .. })
    ));
    assert!(matches!(
        builder.add_group(root, "x/y"),
        Err(SystemError::InvalidName { .. })
    ));
}

#[test]
fn component_failure_reports_path_and_time() {
    let mut builder = SystemBuilder::<()>::new("rig");
    let root = builder.root();
    let tank = builder.add_group(root, "tank").unwrap();
    builder
        .add_leaf(tank, "wall", Fragile { fail_at: 2.0, nan: false })
        .unwrap();
    let mut system = builder.build().unwrap();

    system.continuous_update(&()).unwrap();
    system.set_time(2.5);
    match system.continuous_update(&()).unwrap_err() {
        SystemError::Component { path, t, source } => {
            assert_eq!(path, "rig/tank/wall");
            assert_eq!(t, 2.5);
            assert!(matches!(source, ComponentError::NonPhysical { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn non_finite_derivative_is_an_error() {
    let mut builder = SystemBuilder::<()>::new("rig");
    let root = builder.root();
    builder
        .add_leaf(root, "bad", Fragile { fail_at: f64::INFINITY, nan: true })
        .unwrap();
    let mut system = builder.build().unwrap();
    let err = system.continuous_update(&()).unwrap_err();
    assert!(matches!(err, SystemError::NonFinite { .. }));
    assert!(!err.is_configuration());
}

#[test]
fn discrete_update_ors_flags_and_visits_every_leaf() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    let hot = builder.add_leaf(root, "hot", Block { n: 1, offset: 12.0 }).unwrap();
    let cold = builder.add_leaf(root, "cold", Block { n: 1, offset: 1.0 }).unwrap();
    let mut system = builder.build().unwrap();

    assert!(system.discrete_update(&()).unwrap());
    assert_eq!(system.state(), &[0.0, 1.0]);
    // both leaves ran, even though the first reported a modification
    assert_eq!(system.discrete(&hot), Some(&1));
    assert_eq!(system.discrete(&cold), Some(&1));

    assert!(!system.discrete_update(&()).unwrap());
    assert!(!system.step_correction(&()).unwrap());

    system.reset_discrete();
    assert_eq!(system.discrete(&hot), Some(&0));
}

#[test]
fn snapshot_is_detached_from_later_updates() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    let lag = builder.add_leaf(root, "lag", Lag { tau: 1.0, x0: 2.0 }).unwrap();
    let mut system = builder.build().unwrap();

    system.continuous_update(&()).unwrap();
    system.set_time(1.0);
    let snap = system.snapshot();

    system.state_mut()[0] = 9.0;
    system.continuous_update(&()).unwrap();

    assert_eq!(snap.time(), 1.0);
    assert_eq!(snap.state(), &[2.0]);
    assert_eq!(snap.output(&lag), Some(&2.0));
    assert_eq!(snap.output_at::<f64>("root/lag"), Some(&2.0));
    assert_eq!(snap.state_at("root/lag"), Some(&[2.0][..]));
    assert_eq!(system.output(&lag), Some(&9.0));
}

#[test]
fn load_state_checks_length() {
    let mut builder = SystemBuilder::<()>::new("root");
    let root = builder.root();
    builder.add_leaf(root, "lag", Lag { tau: 1.0, x0: 0.0 }).unwrap();
    let mut system = builder.build().unwrap();
    assert!(system.load_state(&[1.0]).is_ok());
    assert!(matches!(
        system.load_state(&[1.0, 2.0]),
        Err(SystemError::LengthMismatch { expected: 1, actual: 2 })
    ));
}

/// Random tree shape: each entry is (group index to attach to, state length).
fn tree_shape() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0_usize..4, 0_usize..5), 1..12)
}

proptest! {
    #[test]
    fn leaf_ranges_partition_the_flat_state(shape in tree_shape()) {
        let mut builder = SystemBuilder::<()>::new("root");
        let root = builder.root();
        let groups = [
            root,
            builder.add_group(root, "g1").unwrap(),
            builder.add_group(root, "g2").unwrap(),
            builder.add_group(root, "g3").unwrap(),
        ];
        let mut expected_total = 0;
        for (i, (g, n)) in shape.iter().enumerate() {
            builder
                .add_leaf(groups[*g], format!("leaf{i}"), Block { n: *n, offset: i as f64 })
                .unwrap();
            expected_total += n;
        }
        let system = builder.build().unwrap();

        prop_assert_eq!(system.len(), expected_total);
        let mut cursor = 0;
        for leaf in system.layout().leaves() {
            prop_assert_eq!(leaf.range.start, cursor);
            cursor = leaf.range.end;
        }
        prop_assert_eq!(cursor, expected_total);
    }

    #[test]
    fn writes_through_views_are_visible_in_flat_state(
        lens in prop::collection::vec(1_usize..4, 1..6),
        value in -1e6_f64..1e6,
    ) {
        let mut builder = SystemBuilder::<()>::new("root");
        let root = builder.root();
        let handles: Vec<_> = lens
            .iter()
            .enumerate()
            .map(|(i, n)| builder.add_leaf(root, format!("b{i}"), Block { n: *n, offset: 0.0 }).unwrap())
            .collect();
        let mut system = builder.build().unwrap();

        for (i, handle) in handles.iter().enumerate() {
            let start: usize = lens[..i].iter().sum();
            let last = lens[i] - 1;
            system.leaf_view_mut(handle).unwrap()[last] = value + i as f64;
            prop_assert_eq!(system.state()[start + last], value + i as f64);

            system.state_mut()[start] = -value;
            prop_assert_eq!(system.leaf_view(handle).unwrap()[0], -value);
        }
    }
}
