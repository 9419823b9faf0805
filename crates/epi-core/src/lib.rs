// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod dataset;
pub mod error;
pub mod ops;
pub mod regions;

pub use dataset::Dataset;
pub use error::EpiError;
pub use ops::{clip_non_negative, diff, fill_missing, forward_fill, rolling, Agg};
pub use regions::{nation_for_gss, PopulationTable, RegionMapping, RENAMED_AUTHORITIES};

/// Core namespace placeholder.
pub fn crate_name() -> &'static str {
    "epi-core"
}
