// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use epi_core::{Dataset, EpiError};

const DEFAULT_SPREAD_DAYS: usize = 50;

/// Name of the variable the corrector reads.
pub const CASES_VARIABLE: &str = "cases";
/// Name of the corrected variable the corrector writes.
pub const CORRECTED_VARIABLE: &str = "corrected_cases";

/// Parameters of the pillar-2 spread correction.
///
/// Scotland started adding UK pillar-2 tests to its figures on 2020-06-15,
/// producing a one-time step in every regional cumulative case series. The
/// correction spreads that step linearly over the `spread_days` days before
/// the boundary so the level series looks smooth instead of having a cliff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorrectionSpec {
    pub boundary: NaiveDate,
    pub spread_days: usize,
}

impl Default for CorrectionSpec {
    fn default() -> Self {
        let boundary = NaiveDate::from_ymd_opt(2020, 6, 15).expect("fixed calendar date");
        Self {
            boundary,
            spread_days: DEFAULT_SPREAD_DAYS,
        }
    }
}

impl CorrectionSpec {
    fn validate(&self) -> Result<(), EpiError> {
        if self.spread_days < 1 {
            return Err(EpiError::invalid_input(format!(
                "CorrectionSpec.spread_days must be >= 1; got {}",
                self.spread_days
            )));
        }
        Ok(())
    }
}

/// Applies the pillar-2 spread correction to every region of `data`.
///
/// Reads the cumulative `cases` variable and writes `corrected_cases`;
/// `cases` is preserved unmodified so callers can choose either.
///
/// Precondition: the date axis must cover the full window from
/// `boundary - spread_days` through `boundary`, with level data present at
/// the boundary and the two days before it for every region. A region that
/// misses any of those three values fails with a boundary-data error
/// naming it, rather than corrupting the output silently.
pub fn correct_pillar2(data: &mut Dataset, spec: &CorrectionSpec) -> Result<(), EpiError> {
    spec.validate()?;

    let end = data.date_index(spec.boundary).ok_or_else(|| {
        EpiError::invalid_input(format!(
            "dataset does not cover the correction boundary {}",
            spec.boundary
        ))
    })?;
    if end < spec.spread_days || end < 2 {
        return Err(EpiError::invalid_input(format!(
            "dataset starts too late for a {}-day spread ending {}",
            spec.spread_days, spec.boundary
        )));
    }
    let start = end - spec.spread_days;

    let spread = spec.spread_days as f64;
    let boundary = spec.boundary;
    data.map_variable(CASES_VARIABLE, CORRECTED_VARIABLE, move |row| {
        for back in 0..=2 {
            if row[end - back].is_nan() {
                // The region id is not visible inside the per-row closure;
                // re-checked below to name the offender.
                return Err(EpiError::invalid_input("missing boundary level"));
            }
        }

        let step_jump = (row[end] - row[end - 1]) - (row[end - 1] - row[end - 2]);
        // The original pipeline truncated the step toward zero.
        let per_day = step_jump.trunc() / spread;

        let mut corrected = row.to_vec();
        for (i, value) in corrected[start..end].iter_mut().enumerate() {
            *value += i as f64 * per_day;
        }
        Ok(corrected)
    })
    .map_err(|err| match err {
        EpiError::InvalidInput(msg) if msg == "missing boundary level" => {
            named_boundary_error(data, end, boundary)
        }
        other => other,
    })
}

/// Correction namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = epi_core::crate_name();
    "epi-correct"
}

/// Finds which region is missing boundary data, for the error message.
fn named_boundary_error(data: &Dataset, end: usize, boundary: NaiveDate) -> EpiError {
    for region in data.regions() {
        let Ok(row) = data.select(CASES_VARIABLE, region) else {
            continue;
        };
        for back in 0..=2 {
            if row[end - back].is_nan() {
                let date = data
                    .date_at(end - back)
                    .unwrap_or(boundary);
                return EpiError::missing_boundary_data(region.clone(), date);
            }
        }
    }
    EpiError::invalid_input("missing boundary level")
}
