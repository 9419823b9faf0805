// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use epi_core::{Dataset, EpiError};
use epi_rates::{
    rolling_name, rolling_provisional_name, week_over_week, ProvisionalPair, RATE_FLOOR,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// One metric dataset feeding the score summary, already aggregated to the
/// coarse region scheme. `variable` is the raw variable name; the summary
/// reads its `_rolling` (and, if present, `_rolling_provisional`) series.
#[derive(Clone, Copy, Debug)]
pub struct MetricInput<'a> {
    pub data: &'a Dataset,
    pub variable: &'a str,
}

impl<'a> MetricInput<'a> {
    pub fn new(data: &'a Dataset, variable: &'a str) -> Self {
        Self { data, variable }
    }
}

/// Metric inputs; any source that failed to fetch is `None` and its scores
/// and as-of date come out `None` for every region.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreInputs<'a> {
    pub cases: Option<MetricInput<'a>>,
    pub deaths: Option<MetricInput<'a>>,
    pub triage_online: Option<MetricInput<'a>>,
    pub triage_pathways: Option<MetricInput<'a>>,
    pub admissions: Option<MetricInput<'a>>,
}

/// Per-metric switch for the provisional-max policy.
///
/// Historical variants of this pipeline disagreed on which metrics take
/// the max of the stable and provisional rolling values; it is a policy
/// flag here rather than a universal law.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreConfig {
    pub cases_provisional_max: bool,
    pub deaths_provisional_max: bool,
    pub triage_provisional_max: bool,
    pub admissions_provisional_max: bool,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            cases_provisional_max: true,
            deaths_provisional_max: false,
            triage_provisional_max: false,
            admissions_provisional_max: true,
        }
    }
}

/// Week-over-week percentage changes for one region, by metric.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RegionScores {
    pub cases: Option<f64>,
    pub deaths: Option<f64>,
    pub triage_online: Option<f64>,
    pub triage_pathways: Option<f64>,
    pub admissions: Option<f64>,
}

/// As-of date per metric; metrics update asynchronously and lag differs.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScoreDates {
    pub cases: Option<NaiveDate>,
    pub deaths: Option<NaiveDate>,
    pub triage_online: Option<NaiveDate>,
    pub triage_pathways: Option<NaiveDate>,
    pub admissions: Option<NaiveDate>,
}

/// Headline summary: one percentage change per metric per region.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub scores: BTreeMap<String, RegionScores>,
    pub dates: ScoreDates,
}

/// Week-over-week percentage change per region for one metric, plus the
/// shared as-of date (the last date where the change is defined for every
/// region of the metric's dataset).
struct MetricScores {
    by_region: BTreeMap<String, f64>,
    as_of: Option<NaiveDate>,
}

fn score_metric(
    input: &MetricInput<'_>,
    provisional_max: bool,
) -> Result<MetricScores, EpiError> {
    let data = input.data;
    let rolling_var = rolling_name(input.variable);
    let provisional_var = rolling_provisional_name(input.variable);
    let use_provisional = provisional_max && data.has_variable(&provisional_var);

    let mut changes: Vec<Vec<f64>> = Vec::with_capacity(data.n_regions());
    for region in data.regions() {
        let mut change = week_over_week(data.select(&rolling_var, region)?, RATE_FLOOR);
        if use_provisional {
            let pair = ProvisionalPair {
                stable: change,
                provisional: week_over_week(
                    data.select(&provisional_var, region)?,
                    RATE_FLOOR,
                ),
            };
            // The provisional change only upgrades positions where the
            // stable change exists; it never extends the defined range.
            change = pair
                .stable
                .iter()
                .enumerate()
                .map(|(t, &s)| if s.is_nan() { f64::NAN } else { pair.preferred(t) })
                .collect();
        }
        changes.push(change);
    }

    // Last date where every region has a defined change.
    let as_of_index = (0..data.n_dates())
        .rev()
        .find(|&t| changes.iter().all(|c| !c[t].is_nan()));

    let mut by_region = BTreeMap::new();
    let as_of = match as_of_index {
        Some(t) => {
            for (region, change) in data.regions().iter().zip(&changes) {
                by_region.insert(region.clone(), change[t] * 100.0);
            }
            Some(data.date_at(t)?)
        }
        None => None,
    };

    Ok(MetricScores { by_region, as_of })
}

/// Produces the headline score summary.
///
/// Region shapes must already be aligned to one coarse scheme; no
/// remapping happens here. Absent metric inputs produce `None` scores and
/// a `None` as-of date, never a failure.
pub fn summarize(inputs: &ScoreInputs<'_>, config: &ScoreConfig) -> Result<ScoreSummary, EpiError> {
    let cases = opt_metric(inputs.cases.as_ref(), config.cases_provisional_max)?;
    let deaths = opt_metric(inputs.deaths.as_ref(), config.deaths_provisional_max)?;
    let triage_online = opt_metric(inputs.triage_online.as_ref(), config.triage_provisional_max)?;
    let triage_pathways =
        opt_metric(inputs.triage_pathways.as_ref(), config.triage_provisional_max)?;
    let admissions = opt_metric(inputs.admissions.as_ref(), config.admissions_provisional_max)?;

    let mut regions: Vec<&String> = Vec::new();
    for metric in [&cases, &deaths, &triage_online, &triage_pathways, &admissions]
        .into_iter()
        .flatten()
    {
        for region in metric.by_region.keys() {
            if !regions.contains(&region) {
                regions.push(region);
            }
        }
    }

    let mut scores = BTreeMap::new();
    for region in regions {
        let entry = RegionScores {
            cases: metric_value(&cases, region),
            deaths: metric_value(&deaths, region),
            triage_online: metric_value(&triage_online, region),
            triage_pathways: metric_value(&triage_pathways, region),
            admissions: metric_value(&admissions, region),
        };
        scores.insert(region.clone(), entry);
    }

    let dates = ScoreDates {
        cases: cases.as_ref().and_then(|m| m.as_of),
        deaths: deaths.as_ref().and_then(|m| m.as_of),
        triage_online: triage_online.as_ref().and_then(|m| m.as_of),
        triage_pathways: triage_pathways.as_ref().and_then(|m| m.as_of),
        admissions: admissions.as_ref().and_then(|m| m.as_of),
    };

    Ok(ScoreSummary { scores, dates })
}

fn opt_metric(
    input: Option<&MetricInput<'_>>,
    provisional_max: bool,
) -> Result<Option<MetricScores>, EpiError> {
    input.map(|i| score_metric(i, provisional_max)).transpose()
}

fn metric_value(metric: &Option<MetricScores>, region: &str) -> Option<f64> {
    metric.as_ref().and_then(|m| m.by_region.get(region).copied())
}
