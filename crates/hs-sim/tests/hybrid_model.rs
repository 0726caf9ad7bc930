//! End-to-end behavior of the hybrid model driver.

use std::thread;
use std::time::Duration;

use hs_io::{DeviceConfig, LoopbackReceiver, LoopbackSender, loopback};
use hs_sim::{
    AdaptiveConfig, DormandPrince45, ForwardEuler, HybridModel, Integrator, IntegratorKind,
    ModelOptions, OdeSystem, Reinit, Rk4, SimError, SimResult, StepReport,
};
use hs_system::{
    Component, ComponentError, ComponentResult, Ports, System, SystemBuilder, SystemSnapshot,
};
use proptest::prelude::*;

/// xdot = (u - x) / tau, y = x.
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

/// Falls at unit speed; jumps back to `top` on reaching zero.
struct Sawtooth {
    top: f64,
}

impl Ports for Sawtooth {
    type Input = ();
    type Output = f64;
    type Discrete = u32;
}

impl Component<()> for Sawtooth {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.top]
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
        xdot[0] = -1.0;
        Ok(x[0])
    }

    fn discrete_update(
        &self,
        x: &mut [f64],
        _u: &(),
        resets: &mut u32,
        _t: f64,
        _ctx: &(),
    ) -> ComponentResult<bool> {
        if x[0] <= 0.0 {
            x[0] = self.top;
            *resets += 1;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Fails once its state exceeds `limit`.
struct Brittle {
    limit: f64,
}

impl Ports for Brittle {
    type Input = ();
    type Output = ();
    type Discrete = ();
}

impl Component<()> for Brittle {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![0.0]
    }

    fn continuous_update(
        &self,
        x: &[f64],
        _u: &(),
        _d: &(),
        _t: f64,
        _ctx: &(),
        xdot: &mut [f64],
    ) -> ComponentResult<()> {
        if x[0] > self.limit {
            return Err(ComponentError::failed("beam buckled"));
        }
        xdot[0] = 1.0;
        Ok(())
    }
}

/// Records what the wrapped integrator does across model callbacks.
struct Spy<I> {
    inner: I,
    after_step: Vec<f64>,
    first_eval: Vec<Vec<f64>>,
    overwrites: usize,
}

impl<I> Spy<I> {
    fn new(inner: I) -> Self {
        Self {
            inner,
            after_step: Vec::new(),
            first_eval: Vec::new(),
            overwrites: 0,
        }
    }
}

struct FirstEval<'a> {
    inner: &'a mut dyn OdeSystem,
    first: Option<Vec<f64>>,
}

impl OdeSystem for FirstEval<'_> {
    fn derivative(&mut self, t: f64, x: &[f64], xdot: &mut [f64]) -> SimResult<()> {
        if self.first.is_none() {
            self.first = Some(x.to_vec());
        }
        self.inner.derivative(t, x, xdot)
    }
}

impl<I: Integrator> Integrator for Spy<I> {
    fn name(&self) -> &'static str {
        "spy"
    }

    fn reinit(&mut self, t0: f64, x0: &[f64]) {
        self.inner.reinit(t0, x0)
    }

    fn time(&self) -> f64 {
        self.inner.time()
    }

    fn state(&self) -> &[f64] {
        self.inner.state()
    }

    fn overwrite_state(&mut self, x: &[f64]) -> SimResult<()> {
        self.overwrites += 1;
        self.inner.overwrite_state(x)
    }

    fn mark_modified(&mut self) {
        self.inner.mark_modified()
    }

    fn step(&mut self, f: &mut dyn OdeSystem, t_limit: f64) -> SimResult<StepReport> {
        let mut rec = FirstEval {
            inner: f,
            first: None,
        };
        let report = self.inner.step(&mut rec, t_limit)?;
        self.first_eval.push(rec.first.unwrap_or_default());
        self.after_step = self.inner.state().to_vec();
        Ok(report)
    }

    fn interpolate(&self, t: f64, out: &mut [f64]) -> SimResult<()> {
        self.inner.interpolate(t, out)
    }
}

fn lag_system(u: f64) -> (System<()>, hs_system::LeafHandle<Lag>) {
    let mut builder = SystemBuilder::<()>::new("plant");
    let root = builder.root();
    let lag = builder.add_leaf(root, "lag", Lag { tau: 1.0, x0: 0.0 }).unwrap();
    let mut system = builder.build().unwrap();
    *system.input_mut(&lag).unwrap() = u;
    (system, lag)
}

fn options(sample_period: f64) -> ModelOptions {
    ModelOptions {
        sample_period,
        ..ModelOptions::default()
    }
}

#[test]
fn first_order_lag_tracks_exponential() {
    let kinds = [
        IntegratorKind::Rk4 { dt: 0.01 },
        IntegratorKind::DormandPrince45(AdaptiveConfig {
            rtol: 1e-8,
            atol: 1e-10,
            ..AdaptiveConfig::default()
        }),
    ];
    for kind in kinds {
        let (system, lag) = lag_system(1.0);
        let mut model = HybridModel::new(system, kind.build().unwrap(), (), options(1.0)).unwrap();
        model.advance_to(5.0).unwrap();

        let history = model.history();
        assert_eq!(history.len(), 6);
        for snap in history {
            let t = snap.time();
            let y = *snap.output(&lag).unwrap();
            assert!(
                (y - (1.0 - (-t).exp())).abs() < 1e-4,
                "{kind:?}: y({t}) = {y}"
            );
        }
        assert_eq!(history.times(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}

#[test]
fn reinit_truncates_log_and_resets_time() {
    let (system, lag) = lag_system(1.0);
    let mut model =
        HybridModel::new(system, Rk4::new(0.05).unwrap(), (), options(0.5)).unwrap();
    model.advance_to(3.0).unwrap();
    assert_eq!(model.history().len(), 7);

    model.reinit(Reinit::default()).unwrap();
    assert_eq!(model.time(), 0.0);
    assert_eq!(model.history().len(), 1);
    assert_eq!(model.history().times(), vec![0.0]);
    assert_eq!(model.state(), &[0.0]);

    model.reinit(Reinit::at(2.0).with_state(vec![0.5])).unwrap();
    assert_eq!(model.time(), 2.0);
    assert_eq!(model.history().len(), 1);
    assert_eq!(model.history().last().unwrap().output(&lag), Some(&0.5));

    // sampling restarts from the new origin
    model.advance_by(1.0).unwrap();
    assert_eq!(model.history().times(), vec![2.0, 2.5, 3.0]);

    assert!(matches!(
        model.reinit(Reinit::default().with_state(vec![1.0, 2.0])),
        Err(SimError::LengthMismatch { .. })
    ));
}

#[test]
fn unmodified_discrete_step_leaves_integrator_bit_identical() {
    let (system, _lag) = lag_system(1.0);
    let mut model =
        HybridModel::new(system, Spy::new(Rk4::new(0.013).unwrap()), (), options(0.1)).unwrap();
    for _ in 0..50 {
        let outcome = model.step(10.0).unwrap();
        assert!(!outcome.modified);
        let spy = model.integrator();
        let before: Vec<u64> = spy.after_step.iter().map(|v| v.to_bits()).collect();
        let after: Vec<u64> = spy.state().iter().map(|v| v.to_bits()).collect();
        assert_eq!(before, after);
    }
    assert_eq!(model.integrator().overwrites, 0);
}

#[test]
fn reset_is_seen_by_the_next_derivative_evaluation() {
    let mut builder = SystemBuilder::<()>::new("saw");
    let root = builder.root();
    let saw = builder.add_leaf(root, "tooth", Sawtooth { top: 10.0 }).unwrap();
    let system = builder.build().unwrap();
    let mut model =
        HybridModel::new(system, Spy::new(Rk4::new(0.25).unwrap()), (), options(1.0)).unwrap();

    // 40 steps of 0.25 bring the state from 10 to 0
    let mut reset_step = None;
    for i in 0..60 {
        let outcome = model.step(100.0).unwrap();
        if outcome.modified {
            reset_step = Some(i);
            break;
        }
    }
    let reset_step = reset_step.expect("sawtooth never reset");
    assert_eq!(reset_step, 39);
    assert_eq!(model.state(), &[10.0]);
    assert_eq!(model.system().discrete(&saw), Some(&1));
    assert_eq!(model.integrator().overwrites, 1);

    model.step(100.0).unwrap();
    let first = model.integrator().first_eval.last().unwrap();
    assert_eq!(first, &vec![10.0]);
}

#[test]
fn coincident_sample_observes_post_discrete_state() {
    let mut builder = SystemBuilder::<()>::new("saw");
    let root = builder.root();
    let saw = builder.add_leaf(root, "tooth", Sawtooth { top: 1.0 }).unwrap();
    let system = builder.build().unwrap();
    let mut model = HybridModel::new(system, Rk4::new(0.25).unwrap(), (), options(1.0)).unwrap();

    model.advance_to(1.0).unwrap();
    let last = model.history().last().unwrap();
    assert_eq!(last.time(), 1.0);
    assert_eq!(last.output(&saw), Some(&1.0));
}

#[test]
fn component_failure_aborts_until_reinit() {
    let mut builder = SystemBuilder::<()>::new("rig");
    let root = builder.root();
    builder.add_leaf(root, "beam", Brittle { limit: 0.55 }).unwrap();
    let system = builder.build().unwrap();
    let mut model =
        HybridModel::new(system, ForwardEuler::new(0.1).unwrap(), (), options(0.1)).unwrap();

    let err = model.advance_to(2.0).unwrap_err();
    match &err {
        SimError::System(hs_system::SystemError::Component { path, t, .. }) => {
            assert_eq!(path, "rig/beam");
            assert!(*t > 0.5 && *t < 0.7);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(model.is_aborted());
    assert!(matches!(model.step(2.0), Err(SimError::Aborted { .. })));

    model.reinit(Reinit::default()).unwrap();
    assert!(!model.is_aborted());
    model.advance_to(0.3).unwrap();
}

#[test]
fn failed_reinit_still_restarts_the_log() {
    let mut builder = SystemBuilder::<()>::new("rig");
    let root = builder.root();
    builder.add_leaf(root, "beam", Brittle { limit: 0.55 }).unwrap();
    let system = builder.build().unwrap();
    let mut model =
        HybridModel::new(system, ForwardEuler::new(0.1).unwrap(), (), options(0.1)).unwrap();
    model.advance_to(0.5).unwrap();
    assert_eq!(model.history().len(), 6);

    let err = model
        .reinit(Reinit::at(0.0).with_state(vec![1.0]))
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(model.is_aborted());
    assert_eq!(model.time(), 0.0);
    assert_eq!(model.history().times(), vec![0.0]);
    assert_eq!(model.history().first().unwrap().state(), &[1.0]);

    model.reinit(Reinit::at(0.0)).unwrap();
    model.advance_to(0.2).unwrap();
    assert_eq!(model.history().len(), 3);
}

#[test]
fn adaptive_model_counts_rejections() {
    let (system, _lag) = lag_system(1.0);
    let dp = DormandPrince45::new(AdaptiveConfig {
        h_init: Some(5.0),
        ..AdaptiveConfig::default()
    })
    .unwrap();
    let mut model = HybridModel::new(system, dp, (), options(0.5)).unwrap();
    model.advance_to(5.0).unwrap();
    let stats = model.stats();
    assert!(stats.rejected_steps > 0);
    assert!(stats.accepted_steps > 0);
    assert_eq!(stats.samples, 10);
    assert!(stats.summary().contains("Rejected steps"));
}

#[test]
fn loopback_devices_share_a_channel_without_deadlock() {
    let mut builder = SystemBuilder::<()>::new("loop");
    let root = builder.root();
    let source = builder.add_leaf(root, "source", Lag { tau: 0.2, x0: 0.0 }).unwrap();
    let sink = builder.add_leaf(root, "sink", Lag { tau: 0.2, x0: 0.0 }).unwrap();
    let mut system = builder.build().unwrap();
    *system.input_mut(&source).unwrap() = 1.0;

    let mut model =
        HybridModel::new(system, Rk4::new(0.01).unwrap(), (), options(0.01)).unwrap();

    let (a_end, b_end) = loopback::pair::<f64>();
    let (a_tx, _a_rx) = a_end.split();
    let (_b_tx, b_rx) = b_end.split();
    let device_a = LoopbackSender::new("a", a_tx, move |snap: &SystemSnapshot| {
        snap.output(&source).copied()
    });
    let device_b = LoopbackReceiver::new("b", b_rx);
    let sent = device_a.last_sent();
    let received = device_b.last_received();
    let period = DeviceConfig::with_period(Duration::from_millis(2));
    model.io_mut().attach_output(device_a, period.clone()).unwrap();
    model
        .io_mut()
        .attach_input(device_b, &sink, period, |s: f64, u: &mut f64| *u = s)
        .unwrap();

    for _ in 0..100 {
        model.advance_by(0.01).unwrap();
        thread::sleep(Duration::from_millis(10));
    }
    model.shutdown_io();

    assert!((model.time() - 1.0).abs() < 1e-9);
    let last = sent.get();
    assert!(last.is_some());
    assert_eq!(last, received.get());
    assert_eq!(model.system().input(&sink).copied(), last);
    assert!(!model.io().is_running());
}

fn fixed_ratio() -> impl Strategy<Value = (f64, f64)> {
    (prop::sample::select(vec![0.1, 0.25, 0.5, 1.0]), 0.05_f64..5.0).prop_filter(
        "keep away from exact multiples",
        |(ds, t1)| {
            let r = t1 / ds;
            (r - r.round()).abs() > 1e-6
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn log_length_matches_sample_count((ds, t1) in fixed_ratio(), dt in 0.01_f64..0.2) {
        let (system, _lag) = lag_system(1.0);
        let mut model = HybridModel::new(
            system,
            Rk4::new(dt).unwrap(),
            (),
            options(ds),
        ).unwrap();
        model.advance_to(t1).unwrap();

        let times = model.history().times();
        prop_assert_eq!(times.len(), (t1 / ds).floor() as usize + 1);
        prop_assert!(times.windows(2).all(|w| w[0] < w[1]));
    }
}
