use hs_scenario::*;

#[test]
fn roundtrip_yaml_default_scenario() {
    let scenario = ScenarioDef::new("Defaults");
    let path = std::env::temp_dir().join("hs_scenario_roundtrip_default.yaml");

    save_yaml(&path, &scenario).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(scenario, loaded);
}

#[test]
fn roundtrip_json_full_scenario() {
    let mut scenario = ScenarioDef::new("Full");
    scenario.sim.integrator = IntegratorDef::DormandPrince45 {
        rtol: 1e-7,
        atol: 1e-9,
        h_max: Some(0.01),
    };
    scenario.pacing = PacingDef {
        realtime: true,
        rate: 2.0,
    };
    scenario.vehicle.body_rates = [0.1, -0.2, 0.3];
    scenario.throttle_schedule = vec![
        SchedulePoint { t: 0.0, value: 0.5 },
        SchedulePoint { t: 2.0, value: 1.0 },
    ];
    scenario.devices.telemetry_period_s = Some(0.25);

    let path = std::env::temp_dir().join("hs_scenario_roundtrip_full.json");
    save_json(&path, &scenario).unwrap();
    let loaded = load_json(&path).unwrap();

    assert_eq!(scenario, loaded);
}

#[test]
fn omitted_sections_take_defaults() {
    let scenario = from_yaml_str("version: 1\nname: minimal\n").unwrap();
    assert_eq!(scenario.sim, SimDef::default());
    assert_eq!(scenario.vehicle, VehicleDef::default());
    assert_eq!(scenario.sim.integrator, IntegratorDef::Rk4 { dt: 1e-3 });
    assert!(scenario.throttle_schedule.is_empty());
    assert!(!scenario.pacing.realtime);
}

#[test]
fn partial_vehicle_section_keeps_other_defaults() {
    let yaml = "version: 1\nname: heavy\nvehicle:\n  mass: 42.0\n  spool:\n    inertia: 0.2\n";
    let scenario = from_yaml_str(yaml).unwrap();
    assert_eq!(scenario.vehicle.mass, 42.0);
    assert_eq!(scenario.vehicle.spool.inertia, 0.2);
    assert_eq!(scenario.vehicle.spool.loss_coeff, SpoolDef::default().loss_coeff);
    assert_eq!(scenario.vehicle.drag_area, VehicleDef::default().drag_area);
}

#[test]
fn invalid_file_is_rejected_on_load() {
    let err = from_yaml_str("version: 1\nname: bad\nsim:\n  sample_period: -1.0\n").unwrap_err();
    assert!(matches!(err, ScenarioError::Validation(_)), "{err}");

    let err = from_yaml_str("version: 1\nname: bad\nsim:\n  integrator:\n    type: Magic\n")
        .unwrap_err();
    assert!(matches!(err, ScenarioError::Yaml(_)), "{err}");
}

#[test]
fn invalid_scenario_is_not_saved() {
    let mut scenario = ScenarioDef::new("Unsaved");
    scenario.pacing.rate = 0.0;
    let path = std::env::temp_dir().join("hs_scenario_never_written.yaml");
    let _ = std::fs::remove_file(&path);

    assert!(save_yaml(&path, &scenario).is_err());
    assert!(!path.exists());
}

#[test]
fn throttle_is_held_between_schedule_points() {
    let mut scenario = ScenarioDef::new("Schedule");
    scenario.throttle_schedule = vec![
        SchedulePoint { t: 1.0, value: 0.5 },
        SchedulePoint { t: 2.0, value: 0.8 },
    ];
    assert_eq!(scenario.throttle_at(0.5), 0.0);
    assert_eq!(scenario.throttle_at(1.0), 0.5);
    assert_eq!(scenario.throttle_at(1.99), 0.5);
    assert_eq!(scenario.throttle_at(10.0), 0.8);
}
