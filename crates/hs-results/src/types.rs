//! Result data types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    pub scenario: String,
    /// RFC 3339, UTC
    pub timestamp: String,
    pub mode: RunMode,
    pub integrator: String,
    pub t0: f64,
    pub t_end: f64,
    pub sample_period: f64,
    pub samples: usize,
    /// Label of each entry of [`TimeseriesRecord::state`].
    pub state_labels: Vec<String>,
    #[serde(default)]
    pub stats: RunStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RunMode {
    Batch,
    Paced { rate: f64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunStats {
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub derivative_evals: u64,
    pub discrete_modifications: u64,
    pub pacing_overruns: u64,
    pub wall_time_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeseriesRecord {
    pub time_s: f64,
    pub state: Vec<f64>,
    /// Named output channels, e.g. `altitude_m`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<String, f64>,
}

impl TimeseriesRecord {
    pub fn new(time_s: f64, state: Vec<f64>) -> Self {
        Self {
            time_s,
            state,
            channels: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, value: f64) -> Self {
        self.channels.insert(name.into(), value);
        self
    }

    pub fn channel(&self, name: &str) -> Option<f64> {
        self.channels.get(name).copied()
    }
}
