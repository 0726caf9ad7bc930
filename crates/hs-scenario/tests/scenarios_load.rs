use std::path::Path;

#[test]
fn bundled_scenarios_load_and_validate() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
    let scenarios = ["hop.yaml", "drop_adaptive.yaml"];

    for name in scenarios {
        let path = root.join(name);
        let scenario = hs_scenario::load_yaml(&path)
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
        hs_scenario::validate_scenario(&scenario)
            .unwrap_or_else(|e| panic!("Failed to validate {}: {}", name, e));
    }
}
