//! Query helpers for loaded runs.

use hs_results::{RunManifest, TimeseriesRecord};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub scenario: String,
    pub time_range: (f64, f64),
    pub record_count: usize,
    pub max_altitude_m: Option<f64>,
    pub final_altitude_m: Option<f64>,
}

pub fn get_run_summary(
    manifest: &RunManifest,
    records: &[TimeseriesRecord],
) -> AppResult<RunSummary> {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return Err(AppError::InvalidInput(format!(
            "run {} has no records",
            manifest.run_id
        )));
    };

    let max_altitude_m = extract_channel(records, "altitude_m")
        .into_iter()
        .map(|(_, h)| h)
        .reduce(f64::max);

    Ok(RunSummary {
        run_id: manifest.run_id.clone(),
        scenario: manifest.scenario.clone(),
        time_range: (first.time_s, last.time_s),
        record_count: records.len(),
        max_altitude_m,
        final_altitude_m: last.channel("altitude_m"),
    })
}

/// `(t, value)` pairs for every record carrying `channel`.
pub fn extract_channel(records: &[TimeseriesRecord], channel: &str) -> Vec<(f64, f64)> {
    records
        .iter()
        .filter_map(|r| r.channel(channel).map(|v| (r.time_s, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_results::{RunMode, RunStats};

    fn manifest() -> RunManifest {
        RunManifest {
            run_id: "abc".to_string(),
            scenario: "hop".to_string(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            mode: RunMode::Batch,
            integrator: "rk4".to_string(),
            t0: 0.0,
            t_end: 2.0,
            sample_period: 1.0,
            samples: 3,
            state_labels: vec![],
            stats: RunStats::default(),
        }
    }

    #[test]
    fn summary_over_altitude_channel() {
        let records = vec![
            TimeseriesRecord::new(0.0, vec![]).with_channel("altitude_m", 0.0),
            TimeseriesRecord::new(1.0, vec![]).with_channel("altitude_m", 4.0),
            TimeseriesRecord::new(2.0, vec![]).with_channel("altitude_m", 1.5),
        ];
        let summary = get_run_summary(&manifest(), &records).unwrap();
        assert_eq!(summary.time_range, (0.0, 2.0));
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.max_altitude_m, Some(4.0));
        assert_eq!(summary.final_altitude_m, Some(1.5));
    }

    #[test]
    fn empty_run_has_no_summary() {
        assert!(get_run_summary(&manifest(), &[]).is_err());
    }

    #[test]
    fn missing_channel_is_skipped() {
        let records = vec![
            TimeseriesRecord::new(0.0, vec![]).with_channel("thrust_n", 1.0),
            TimeseriesRecord::new(1.0, vec![]),
        ];
        assert_eq!(extract_channel(&records, "thrust_n"), vec![(0.0, 1.0)]);
        assert!(extract_channel(&records, "altitude_m").is_empty());
    }
}
