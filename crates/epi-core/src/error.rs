// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;

/// Workspace-wide error type.
///
/// Primary-dataset failures (`InvalidInput`, `Mapping`, `MissingBoundaryData`)
/// are unrecoverable and should terminate the run; `SourceUnavailable` is
/// recoverable and is caught at the pipeline call site.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EpiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no entry for region {key:?} in {table} table")]
    Mapping { key: String, table: String },

    #[error("region {region:?} has no level data for {date} required by the pillar-2 correction")]
    MissingBoundaryData { region: String, date: NaiveDate },

    #[error("source {name:?} unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    #[error("numerical issue: {0}")]
    NumericalIssue(String),
}

impl EpiError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn mapping(key: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Mapping {
            key: key.into(),
            table: table.into(),
        }
    }

    pub fn missing_boundary_data(region: impl Into<String>, date: NaiveDate) -> Self {
        Self::MissingBoundaryData {
            region: region.into(),
            date,
        }
    }

    pub fn source_unavailable(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            name: source.into(),
            reason: reason.into(),
        }
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    /// True for errors the pipeline may degrade on instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
