// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::sources::SourceProvider;
use epi_aggregate::{aggregate, NATION_LABELS};
use epi_core::{Agg, Dataset, EpiError};
use epi_correct::{correct_pillar2, CorrectionSpec, CORRECTED_VARIABLE};
use epi_rates::{
    enrich_per_capita, enrich_rolling, rolling_name, RateConfig, SeriesKind,
};
use epi_summary::{
    build_map_data, summarize, summarize_lineages, LineageConfig, MapConfig, MapEntry,
    MetricInput, ScoreConfig, ScoreInputs, ScoreSummary,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// All knobs of one batch run, constructed once and passed down.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub rate: RateConfig,
    pub score: ScoreConfig,
    pub map: MapConfig,
    pub correction: CorrectionSpec,
    pub lineage: LineageConfig,
}

/// Serializable result of one batch run. Secondary stages that were
/// skipped leave their field `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub map: BTreeMap<String, MapEntry>,
    pub scores: ScoreSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scottish_rolling: Option<BTreeMap<String, Vec<Option<f64>>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineages: Option<BTreeMap<String, u64>>,
}

/// Runs a secondary stage, degrading to `None` on failure.
fn secondary<T>(source: &str, f: impl FnOnce() -> Result<T, EpiError>) -> Option<T> {
    match f() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(source, error = %err, "skipping unavailable source");
            None
        }
    }
}

/// Runs the whole batch pipeline against one source provider.
///
/// Primary sources (mapping, populations, local-authority cases, deaths)
/// abort the run on failure; every other source degrades to an absent
/// output.
pub fn run_pipeline(
    provider: &impl SourceProvider,
    config: &PipelineConfig,
) -> Result<PipelineOutput, EpiError> {
    let mapping = provider.region_mapping()?;
    let populations = provider.populations()?;
    let mut la_cases = provider.local_authority_cases()?;
    let mut deaths = provider.deaths()?;
    info!(
        regions = la_cases.n_regions(),
        dates = la_cases.n_dates(),
        "loaded primary case data"
    );

    // Headline scores work on the coarse NHS-region scheme.
    let mut nhs_cases = aggregate(&la_cases, &mapping, &NATION_LABELS)?;
    enrich_rolling(
        &mut nhs_cases,
        "cases",
        SeriesKind::Cumulative,
        &config.rate,
        Agg::Mean,
    )?;
    enrich_rolling(
        &mut deaths,
        "deaths",
        SeriesKind::Incremental,
        &config.rate,
        Agg::Mean,
    )?;

    let admissions = secondary("admissions", || {
        let mut data = provider.admissions()?;
        enrich_rolling(
            &mut data,
            "admissions",
            SeriesKind::Incremental,
            &config.rate,
            Agg::Mean,
        )?;
        Ok(data)
    });
    let triage_online = secondary("triage_online", || {
        let mut data = provider.triage_online()?;
        enrich_rolling(
            &mut data,
            "count",
            SeriesKind::Incremental,
            &config.rate,
            Agg::Mean,
        )?;
        Ok(data)
    });
    let triage_pathways = secondary("triage_pathways", || {
        let mut data = provider.triage_pathways()?;
        enrich_rolling(
            &mut data,
            "count",
            SeriesKind::Incremental,
            &config.rate,
            Agg::Mean,
        )?;
        Ok(data)
    });

    let inputs = ScoreInputs {
        cases: Some(MetricInput::new(&nhs_cases, "cases")),
        deaths: Some(MetricInput::new(&deaths, "deaths")),
        triage_online: triage_online.as_ref().map(|d| MetricInput::new(d, "count")),
        triage_pathways: triage_pathways
            .as_ref()
            .map(|d| MetricInput::new(d, "count")),
        admissions: admissions
            .as_ref()
            .map(|d| MetricInput::new(d, "admissions")),
    };
    let scores = summarize(&inputs, &config.score)?;

    // The map view stays at local-authority resolution; population-less
    // pseudo-regions get a missing per-capita row instead of failing.
    enrich_per_capita(&mut la_cases, "cases", &populations, false)?;
    let positivity = secondary("positivity", || provider.positivity());
    let vaccination = secondary("vaccination", || provider.vaccination());
    let map = build_map_data(
        &la_cases,
        positivity.as_ref(),
        vaccination.as_ref(),
        &config.map,
    )?;

    let scottish_rolling = secondary("scottish_cases", || {
        let mut data = provider.scottish_cases()?;
        correct_pillar2(&mut data, &config.correction)?;
        enrich_rolling(
            &mut data,
            CORRECTED_VARIABLE,
            SeriesKind::Cumulative,
            &config.rate,
            Agg::Mean,
        )?;
        export_rolling(&data, CORRECTED_VARIABLE)
    });

    let lineages = secondary("lineages", || {
        let input = provider.lineages()?;
        summarize_lineages(&input.counts, &input.aliases, &config.lineage)
    });

    Ok(PipelineOutput {
        map,
        scores,
        scottish_rolling,
        lineages,
    })
}

/// JSON-safe per-region rolling series (missing becomes `null`).
fn export_rolling(
    data: &Dataset,
    var: &str,
) -> Result<BTreeMap<String, Vec<Option<f64>>>, EpiError> {
    let name = rolling_name(var);
    let mut out = BTreeMap::new();
    for region in data.regions() {
        let row = data
            .select(&name, region)?
            .iter()
            .map(|&v| if v.is_nan() { None } else { Some(v) })
            .collect();
        out.insert(region.clone(), row);
    }
    Ok(out)
}
