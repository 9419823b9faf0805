// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use epi_core::{diff, fill_missing, forward_fill, rolling, Agg, Dataset, EpiError};
use serde::Serialize;
use std::collections::BTreeMap;

const DEFAULT_HISTORY_DAYS: usize = 44;
const WEEKLY_WINDOW: usize = 7;

/// Variable the map reads for absolute counts.
pub const CASES_VARIABLE: &str = "cases";
/// Variable the map reads for per-capita counts.
pub const CASES_NORM_VARIABLE: &str = "cases_norm";
/// Variable read from the positivity dataset.
pub const POSITIVITY_VARIABLE: &str = "positivity";
/// Variables read from the vaccination dataset, as uptake fractions.
pub const FIRST_DOSE_VARIABLE: &str = "first_dose";
pub const SECOND_DOSE_VARIABLE: &str = "second_dose";

/// Fixed configuration threaded through from the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapConfig {
    /// Length of the per-region daily history array.
    pub history_days: usize,
    /// Provisional-max policy window; `None` disables the policy.
    pub provisional_days: Option<usize>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            history_days: DEFAULT_HISTORY_DAYS,
            provisional_days: Some(4),
        }
    }
}

impl MapConfig {
    fn validate(&self, n_dates: usize) -> Result<(), EpiError> {
        if self.history_days < 1 {
            return Err(EpiError::invalid_input(format!(
                "MapConfig.history_days must be >= 1; got {}",
                self.history_days
            )));
        }
        let lookback = match self.provisional_days {
            Some(p) if p < 1 => {
                return Err(EpiError::invalid_input(
                    "MapConfig.provisional_days must be >= 1 when set",
                ));
            }
            Some(p) => p + WEEKLY_WINDOW,
            None => WEEKLY_WINDOW,
        };
        if n_dates <= lookback {
            return Err(EpiError::invalid_input(format!(
                "map snapshot needs more than {lookback} dates; got {n_dates}"
            )));
        }
        Ok(())
    }
}

/// Per-region snapshot for the choropleth map, serialized as-is.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapEntry {
    /// Weekly per-capita case rate.
    pub prevalence: f64,
    /// Week-over-week change of the weekly per-capita rate.
    pub change: f64,
    /// Absolute weekly case count.
    pub cases: i64,
    /// Trailing daily increments, clipped non-negative.
    pub history: Vec<i64>,
    pub positivity: Option<f64>,
    pub provisional_days: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_dose: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_dose: Option<f64>,
}

/// Daily increments the way the map view wants them: gaps forward-filled,
/// remaining missing entries treated as zero, negatives clipped to zero.
fn map_daily(levels: &[f64]) -> Vec<f64> {
    diff(&fill_missing(&forward_fill(levels), 0.0))
        .iter()
        .map(|&x| if x > 0.0 { x } else { 0.0 })
        .collect()
}

/// Trailing weekly sum of the daily series, missing entries as zero.
fn weekly_sum(daily: &[f64]) -> Result<Vec<f64>, EpiError> {
    let rolled = rolling(daily, WEEKLY_WINDOW, false, Agg::Sum)?;
    Ok(rolled
        .iter()
        .map(|&x| if x > 0.0 { x } else { 0.0 })
        .collect())
}

/// Last defined value of one region's series in `data`, if the region and
/// variable are present at all. Best-effort join for secondary datasets.
fn last_defined(data: Option<&Dataset>, variable: &str, region: &str) -> Option<f64> {
    let data = data?;
    data.region_position(region)?;
    let row = data.select(variable, region).ok()?;
    row.iter().rev().copied().find(|v| !v.is_nan())
}

/// Builds the per-region map snapshot.
///
/// `data` must carry cumulative `cases` and `cases_norm` variables on the
/// same axes (see the rate engine's per-capita enrichment). Positivity and
/// vaccination are joined best-effort per region; regions missing there
/// simply get `None`.
pub fn build_map_data(
    data: &Dataset,
    positivity: Option<&Dataset>,
    vaccination: Option<&Dataset>,
    config: &MapConfig,
) -> Result<BTreeMap<String, MapEntry>, EpiError> {
    let n = data.n_dates();
    config.validate(n)?;

    let mut result = BTreeMap::new();
    for region in data.regions() {
        let daily_cases = map_daily(data.select(CASES_VARIABLE, region)?);
        let daily_norm = map_daily(data.select(CASES_NORM_VARIABLE, region)?);
        let weekly_cases = weekly_sum(&daily_cases)?;
        let weekly_norm = weekly_sum(&daily_norm)?;

        let mut cases = weekly_cases[n - 1];
        let mut prevalence = weekly_norm[n - 1];
        let mut change = weekly_norm[n - 1] - weekly_norm[n - 1 - WEEKLY_WINDOW];

        if let Some(p) = config.provisional_days {
            // The trailing p days are incomplete; prefer the value from
            // just before the provisional window when it is larger.
            cases = cases.max(weekly_cases[n - p]);
            prevalence = prevalence.max(weekly_norm[n - p]);
            change = change.max(weekly_norm[n - p] - weekly_norm[n - p - WEEKLY_WINDOW]);
        }

        let history = daily_cases
            [n.saturating_sub(config.history_days)..]
            .iter()
            .map(|&x| x as i64)
            .collect();

        result.insert(
            region.clone(),
            MapEntry {
                prevalence,
                change,
                cases: cases as i64,
                history,
                positivity: last_defined(positivity, POSITIVITY_VARIABLE, region),
                provisional_days: config.provisional_days,
                first_dose: last_defined(vaccination, FIRST_DOSE_VARIABLE, region),
                second_dose: last_defined(vaccination, SECOND_DOSE_VARIABLE, region),
            },
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::{build_map_data, MapConfig};
    use chrono::NaiveDate;
    use epi_core::Dataset;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    /// Cumulative cases growing +10/day for 60 days, one region with
    /// population 100,000.
    fn snapshot_dataset() -> Dataset {
        let mut data =
            Dataset::new(vec!["E06000001".into()], date(2020, 4, 1), 60).expect("valid axes");
        let levels: Vec<f64> = (0..60).map(|t| 10.0 * t as f64).collect();
        let norm: Vec<f64> = levels.iter().map(|v| v / 100_000.0).collect();
        data.insert_variable("cases", levels).expect("valid shape");
        data.insert_variable("cases_norm", norm).expect("valid shape");
        data
    }

    #[test]
    fn snapshot_has_weekly_counts_and_history() {
        let data = snapshot_dataset();
        let map = build_map_data(&data, None, None, &MapConfig::default())
            .expect("snapshot succeeds");
        let entry = map.get("E06000001").expect("region present");

        // Steady +10/day: the weekly sum is 70 everywhere it is defined.
        assert_eq!(entry.cases, 70);
        assert!((entry.prevalence - 70.0 / 100_000.0).abs() < 1e-12);
        // Steady growth: no week-over-week movement.
        assert!(entry.change.abs() < 1e-12);

        assert_eq!(entry.history.len(), 44);
        assert!(entry.history.iter().all(|&x| x == 10));
        assert_eq!(entry.positivity, None);
        assert_eq!(entry.provisional_days, Some(4));
    }

    #[test]
    fn provisional_policy_prefers_the_larger_value() {
        let mut data = snapshot_dataset();
        // Reporting collapse over the last 4 days: level series goes flat,
        // so the trailing weekly sum under-counts.
        let mut levels: Vec<f64> = (0..60).map(|t| 10.0 * t as f64).collect();
        for t in 56..60 {
            levels[t] = levels[55];
        }
        let norm: Vec<f64> = levels.iter().map(|v| v / 100_000.0).collect();
        data.insert_variable("cases", levels).expect("valid shape");
        data.insert_variable("cases_norm", norm).expect("valid shape");

        let with_policy = build_map_data(&data, None, None, &MapConfig::default())
            .expect("snapshot succeeds");
        let without_policy = build_map_data(
            &data,
            None,
            None,
            &MapConfig {
                provisional_days: None,
                ..MapConfig::default()
            },
        )
        .expect("snapshot succeeds");

        let with_policy = with_policy.get("E06000001").expect("region present");
        let without_policy = without_policy.get("E06000001").expect("region present");
        assert!(with_policy.cases > without_policy.cases);
        // Weekly sum just before the provisional window still carries six
        // real reporting days.
        assert_eq!(with_policy.cases, 60);
        assert_eq!(without_policy.cases, 30);
    }

    #[test]
    fn positivity_is_joined_best_effort() {
        let data = snapshot_dataset();
        let mut positivity = Dataset::new(
            vec!["E06000001".into(), "E06000002".into()],
            date(2020, 4, 1),
            60,
        )
        .expect("valid axes");
        let mut values = vec![f64::NAN; 120];
        values[58] = 0.031; // last defined value for E06000001
        positivity
            .insert_variable("positivity", values)
            .expect("valid shape");

        let map = build_map_data(&data, Some(&positivity), None, &MapConfig::default())
            .expect("snapshot succeeds");
        assert_eq!(
            map.get("E06000001").expect("region present").positivity,
            Some(0.031)
        );
    }

    #[test]
    fn snapshot_serializes_doses_only_when_present() {
        let data = snapshot_dataset();
        let map = build_map_data(&data, None, None, &MapConfig::default())
            .expect("snapshot succeeds");
        let entry = map.get("E06000001").expect("region present");

        let encoded = serde_json::to_value(entry).expect("serializable");
        let object = encoded.as_object().expect("object");
        // Absent vaccination data drops the dose keys entirely; absent
        // positivity stays as an explicit null.
        assert!(!object.contains_key("first_dose"));
        assert!(!object.contains_key("second_dose"));
        assert!(object["positivity"].is_null());
        assert_eq!(object["cases"], 70);
        assert_eq!(object["provisional_days"], 4);
        assert_eq!(object["history"].as_array().expect("array").len(), 44);
    }

    #[test]
    fn short_series_is_rejected() {
        let mut data =
            Dataset::new(vec!["E06000001".into()], date(2020, 4, 1), 8).expect("valid axes");
        data.insert_variable("cases", vec![0.0; 8]).expect("valid shape");
        data.insert_variable("cases_norm", vec![0.0; 8]).expect("valid shape");

        let err = build_map_data(&data, None, None, &MapConfig::default())
            .expect_err("too short for the provisional lookback");
        assert!(err.to_string().contains("map snapshot"));
    }
}
