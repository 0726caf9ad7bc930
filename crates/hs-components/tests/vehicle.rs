//! Component behavior when driven through the hybrid model.

use hs_components::{
    AttitudeKinematics, EngineSpool, Environment, FirstOrderLag, GroundContact, SpoolOutput, VerticalBody,
};
use hs_sim::{HybridModel, ModelOptions, Rk4};
use hs_system::{Component, SystemBuilder};
use nalgebra::{Quaternion, UnitQuaternion};

fn options(sample_period: f64) -> ModelOptions {
    ModelOptions {
        sample_period,
        ..ModelOptions::default()
    }
}

#[test]
fn dropped_body_bounces_and_settles() {
    let mut builder = SystemBuilder::<Environment>::new("drop");
    let root = builder.root();
    let body = VerticalBody::new(10.0, 0.0, 0.5).unwrap().starting_at(10.0, 0.0);
    let body = builder.add_leaf(root, "body", body).unwrap();
    let system = builder.build().unwrap();
    let mut model = HybridModel::new(
        system,
        Rk4::new(1e-3).unwrap(),
        Environment::default(),
        options(0.01),
    )
    .unwrap();

    model.advance_to(2.0).unwrap();
    assert_eq!(model.system().discrete(&body).unwrap().bounces, 1);
    for snap in model.history() {
        assert!(snap.state_at("drop/body").unwrap()[0] >= 0.0, "t = {}", snap.time());
    }

    model.advance_to(3.0).unwrap();
    let apex = model
        .history()
        .iter()
        .filter(|s| s.time() > 1.6 && s.time() < 2.8)
        .map(|s| s.state_at("drop/body").unwrap()[0])
        .fold(f64::NEG_INFINITY, f64::max);
    // v_impact = sqrt(2 g h), rebound at half speed reaches h / 4
    assert!((apex - 2.5).abs() < 0.05, "apex {apex}");
    assert_eq!(model.system().discrete(&body).unwrap().bounces, 2);

    model.advance_to(8.0).unwrap();
    let contact: &GroundContact = model.system().discrete(&body).unwrap();
    assert!(contact.resting);
    assert!(contact.bounces >= 5);
    assert_eq!(model.state(), &[0.0, 0.0]);
    assert!(model.stats().discrete_modifications >= 6);
}

#[test]
fn spool_thrust_lifts_body_through_wiring() {
    let mut builder = SystemBuilder::<Environment>::new("vehicle");
    let root = builder.root();
    let spool = EngineSpool::new(0.05, 0.1, 50.0, 1e-3).unwrap();
    let steady = spool.steady_omega(1.0).unwrap();
    let spool = builder.add_leaf(root, "spool", spool).unwrap();
    let body = builder
        .add_leaf(root, "body", VerticalBody::new(10.0, 0.5, 0.3).unwrap())
        .unwrap();
    builder
        .connect(&spool, &body, |y: &SpoolOutput, thrust: &mut f64| *thrust = y.thrust_n)
        .unwrap();
    let system = builder.build().unwrap();
    let mut model = HybridModel::new(
        system,
        Rk4::new(1e-3).unwrap(),
        Environment::default(),
        options(0.1),
    )
    .unwrap();

    // idle: the body stays on the ground
    model.advance_to(0.5).unwrap();
    assert_eq!(model.system().leaf_view(&body).unwrap(), &[0.0, 0.0]);

    *model.system_mut().input_mut(&spool).unwrap() = 1.0;
    model.advance_to(5.5).unwrap();

    let omega = model.system().leaf_view(&spool).unwrap()[0];
    assert!((omega - steady).abs() / steady < 1e-3, "omega {omega}");
    let climb = model.system().leaf_view(&body).unwrap();
    assert!(climb[0] > 1.0, "altitude {}", climb[0]);
    assert!(climb[1] > 0.0);
    assert!(!model.system().discrete(&body).unwrap().resting);
}

#[test]
fn attitude_keeps_unit_norm_under_constant_rate() {
    let mut builder = SystemBuilder::<Environment>::new("craft");
    let root = builder.root();
    let att = builder.add_leaf(root, "attitude", AttitudeKinematics::default()).unwrap();
    let system = builder.build().unwrap();
    let mut model = HybridModel::new(
        system,
        Rk4::new(0.01).unwrap(),
        Environment::default(),
        options(0.1),
    )
    .unwrap();

    *model.system_mut().input_mut(&att).unwrap() = [0.0, 0.0, 0.1];
    model.advance_to(2.0).unwrap();

    let x = model.system().leaf_view(&att).unwrap();
    let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
    assert!((norm - 1.0).abs() < 1e-11);
    for snap in model.history() {
        let q = snap.state_at("craft/attitude").unwrap();
        let n = q.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((n - 1.0).abs() < 1e-9, "t = {} norm {n}", snap.time());
    }

    let q = UnitQuaternion::from_quaternion(Quaternion::new(x[0], x[1], x[2], x[3]));
    let (roll, pitch, yaw) = q.euler_angles();
    assert!(roll.abs() < 1e-9 && pitch.abs() < 1e-9);
    assert!((yaw - 0.2).abs() < 1e-6, "yaw {yaw}");
}

#[test]
fn saturated_lag_is_corrected_after_each_step() {
    let mut builder = SystemBuilder::<Environment>::new("servo");
    let root = builder.root();
    let lag = FirstOrderLag::new(0.1).unwrap().with_bounds(0.0, 1.0).unwrap();
    assert_eq!(Component::<Environment>::initial_state(&lag), vec![0.0]);
    let lag = builder.add_leaf(root, "lag", lag).unwrap();
    let system = builder.build().unwrap();
    let mut model = HybridModel::new(
        system,
        Rk4::new(0.01).unwrap(),
        Environment::default(),
        options(0.1),
    )
    .unwrap();

    *model.system_mut().input_mut(&lag).unwrap() = 5.0;
    model.advance_to(1.0).unwrap();
    assert_eq!(model.system().leaf_view(&lag).unwrap(), &[1.0]);
    assert!(model.stats().discrete_modifications > 0);
}
