// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod pipeline;
pub mod sources;

pub use pipeline::{run_pipeline, PipelineConfig, PipelineOutput};
pub use sources::{dataset_from_rows, DatasetWire, FileSources, LineageCounts, SourceProvider};

/// CLI namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = (
        epi_core::crate_name(),
        epi_summary::crate_name(),
        epi_rates::crate_name(),
    );
    "epi-cli"
}
