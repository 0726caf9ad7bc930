//! Scenario to component-tree compilation.
//!
//! The vehicle tree is fixed:
//!
//! ```text
//! vehicle
//! ├── propulsion
//! │   ├── actuator   FirstOrderLag   throttle command → throttle
//! │   └── spool      EngineSpool     throttle → thrust
//! └── airframe
//!     ├── body       VerticalBody    thrust → altitude, climb rate
//!     └── attitude   AttitudeKinematics
//! ```

use hs_components::{
    AttitudeKinematics, EngineSpool, Environment, FirstOrderLag, SpoolOutput, VerticalBody,
};
use hs_scenario::{IntegratorDef, ScenarioDef, SimDef};
use hs_sim::{AdaptiveConfig, Integrator, IntegratorKind};
use hs_system::{LeafHandle, System, SystemBuilder};

use crate::error::AppResult;

/// Typed handles to every leaf of the compiled vehicle.
#[derive(Debug, Clone, Copy)]
pub struct VehicleHandles {
    pub actuator: LeafHandle<FirstOrderLag>,
    pub spool: LeafHandle<EngineSpool>,
    pub body: LeafHandle<VerticalBody>,
    pub attitude: LeafHandle<AttitudeKinematics>,
}

pub struct CompiledVehicle {
    pub system: System<Environment>,
    pub handles: VehicleHandles,
}

/// Build the vehicle tree described by `scenario`, positioned at `sim.t0`
/// with the initial throttle command and body rates applied.
pub fn compile_vehicle(scenario: &ScenarioDef) -> AppResult<CompiledVehicle> {
    let v = &scenario.vehicle;
    let mut builder = SystemBuilder::<Environment>::new("vehicle");
    let root = builder.root();

    let propulsion = builder.add_group(root, "propulsion")?;
    let actuator = FirstOrderLag::new(v.throttle_tau)?.with_bounds(0.0, 1.0)?;
    let actuator = builder.add_leaf(propulsion, "actuator", actuator)?;
    let spool = EngineSpool::new(
        v.spool.inertia,
        v.spool.loss_coeff,
        v.spool.max_torque,
        v.spool.thrust_coeff,
    )?;
    let spool = builder.add_leaf(propulsion, "spool", spool)?;

    let airframe = builder.add_group(root, "airframe")?;
    let body = VerticalBody::new(v.mass, v.drag_area, v.restitution)?
        .starting_at(v.initial_altitude, 0.0);
    let body = builder.add_leaf(airframe, "body", body)?;
    let attitude = builder.add_leaf(airframe, "attitude", AttitudeKinematics::default())?;

    builder.connect(&actuator, &spool, |y: &f64, throttle: &mut f64| {
        *throttle = *y;
    })?;
    builder.connect(&spool, &body, |y: &SpoolOutput, thrust: &mut f64| {
        *thrust = y.thrust_n;
    })?;

    let mut system = builder.build()?;
    system.set_time(scenario.sim.t0);
    if let Some(command) = system.input_mut(&actuator) {
        *command = scenario.throttle_at(scenario.sim.t0);
    }
    if let Some(rates) = system.input_mut(&attitude) {
        *rates = v.body_rates;
    }

    tracing::debug!(
        scenario = %scenario.name,
        states = system.len(),
        leaves = system.layout().leaf_count(),
        "vehicle compiled"
    );

    Ok(CompiledVehicle {
        system,
        handles: VehicleHandles {
            actuator,
            spool,
            body,
            attitude,
        },
    })
}

/// Integrator selected by the scenario. An adaptive integrator without an
/// explicit `h_max` is capped at the sample period.
pub fn build_integrator(sim: &SimDef) -> AppResult<Box<dyn Integrator>> {
    let kind = match &sim.integrator {
        IntegratorDef::ForwardEuler { dt } => IntegratorKind::ForwardEuler { dt: *dt },
        IntegratorDef::Rk4 { dt } => IntegratorKind::Rk4 { dt: *dt },
        IntegratorDef::DormandPrince45 { rtol, atol, h_max } => {
            IntegratorKind::DormandPrince45(AdaptiveConfig {
                rtol: *rtol,
                atol: *atol,
                h_max: h_max.unwrap_or(sim.sample_period),
                ..AdaptiveConfig::default()
            })
        }
    };
    Ok(kind.build()?)
}
