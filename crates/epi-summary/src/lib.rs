// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod lineage;
pub mod map;
pub mod score;

pub use lineage::{summarize_lineages, LineageConfig};
pub use map::{
    build_map_data, MapConfig, MapEntry, CASES_NORM_VARIABLE, CASES_VARIABLE,
    FIRST_DOSE_VARIABLE, POSITIVITY_VARIABLE, SECOND_DOSE_VARIABLE,
};
pub use score::{
    summarize, MetricInput, RegionScores, ScoreConfig, ScoreDates, ScoreInputs, ScoreSummary,
};

/// Summary namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = (epi_core::crate_name(), epi_rates::crate_name());
    "epi-summary"
}
