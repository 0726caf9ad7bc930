//! Content-based hashing for run IDs.

use hs_scenario::ScenarioDef;
use sha2::{Digest, Sha256};

use crate::types::RunMode;

/// Hash of everything that determines a run's result.
pub fn compute_run_id(scenario: &ScenarioDef, mode: &RunMode, engine_version: &str) -> String {
    let mut hasher = Sha256::new();

    let scenario_json = serde_json::to_string(scenario).unwrap_or_default();
    hasher.update(scenario_json.as_bytes());

    let mode_json = serde_json::to_string(mode).unwrap_or_default();
    hasher.update(mode_json.as_bytes());

    hasher.update(engine_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
