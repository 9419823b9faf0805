// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use epi_core::{
    clip_non_negative, diff, fill_missing, forward_fill, rolling, Agg, Dataset, EpiError,
    PopulationTable,
};

/// Scale factor for per-capita rates: cases per 100,000 population.
pub const PER_CAPITA_SCALE: f64 = 100_000.0;

/// Denominator floor for week-over-week ratios, in cases per 100,000.
///
/// Substituted when the prior-week value is below it, so that a region
/// going from zero cases to a handful shows a large finite change instead
/// of a division blow-up.
pub const RATE_FLOOR: f64 = 0.01;

const DEFAULT_ROLLING_WINDOW: usize = 7;
const DEFAULT_PROVISIONAL_DAYS: usize = 4;

/// Whether a raw variable is a running total or already daily counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesKind {
    Cumulative,
    Incremental,
}

/// Smoothing and reporting-lag parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateConfig {
    pub rolling_window: usize,
    /// Trailing days considered incomplete because of reporting lag.
    pub provisional_days: usize,
    /// Centered windows remove weekday artifacts symmetrically; trailing
    /// windows are used for rate-per-week sums.
    pub center: bool,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            rolling_window: DEFAULT_ROLLING_WINDOW,
            provisional_days: DEFAULT_PROVISIONAL_DAYS,
            center: true,
        }
    }
}

impl RateConfig {
    pub fn validate(&self) -> Result<(), EpiError> {
        if self.rolling_window < 1 {
            return Err(EpiError::invalid_input(format!(
                "RateConfig.rolling_window must be >= 1; got {}",
                self.rolling_window
            )));
        }
        Ok(())
    }
}

/// Converts a cumulative (running-total) series to daily new counts.
///
/// Forward-fill covers unreported days, the first difference produces the
/// increments, and negatives from backward revisions are clipped to zero.
/// The first position stays missing.
pub fn daily_increments(levels: &[f64]) -> Vec<f64> {
    clip_non_negative(&diff(&forward_fill(levels)))
}

/// Parallel rolling series computed with and without the provisional tail.
///
/// `stable` excludes the trailing `provisional_days` samples from the
/// window entirely; `provisional` includes them. Both have the input's
/// length, with missing entries where the window cannot be filled.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionalPair {
    pub stable: Vec<f64>,
    pub provisional: Vec<f64>,
}

impl ProvisionalPair {
    pub fn len(&self) -> usize {
        self.provisional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provisional.is_empty()
    }

    /// Decision value at `t`: the maximum of the two series, biasing toward
    /// not under-stating recent activity while preferring the stabilized
    /// value when it is larger. Falls back to whichever side is defined.
    pub fn preferred(&self, t: usize) -> f64 {
        let s = self.stable.get(t).copied().unwrap_or(f64::NAN);
        let p = self.provisional.get(t).copied().unwrap_or(f64::NAN);
        match (s.is_nan(), p.is_nan()) {
            (false, false) => s.max(p),
            (false, true) => s,
            (true, false) => p,
            (true, true) => f64::NAN,
        }
    }
}

/// Applies the rolling aggregate to a daily series both with and without
/// the provisional tail.
pub fn rolling_split(
    daily: &[f64],
    config: &RateConfig,
    agg: Agg,
) -> Result<ProvisionalPair, EpiError> {
    config.validate()?;
    let n = daily.len();
    let cut = n.saturating_sub(config.provisional_days);

    let mut stable = rolling(&daily[..cut], config.rolling_window, config.center, agg)?;
    stable.resize(n, f64::NAN);
    let provisional = rolling(daily, config.rolling_window, config.center, agg)?;

    Ok(ProvisionalPair {
        stable,
        provisional,
    })
}

/// Scales a count series to a per-`scale`-population rate.
pub fn per_capita(values: &[f64], population: u64, scale: f64) -> Result<Vec<f64>, EpiError> {
    if population == 0 {
        return Err(EpiError::numerical_issue(
            "population denominator must be > 0",
        ));
    }
    let pop = population as f64;
    Ok(values.iter().map(|&v| v * scale / pop).collect())
}

/// Week-over-week fractional change: `series[t] / series[t-7] - 1`.
///
/// Denominators below `floor` are replaced by `floor`. The first seven
/// positions are missing.
pub fn week_over_week(values: &[f64], floor: f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for t in 7..values.len() {
        let denom = values[t - 7];
        if denom.is_nan() {
            continue;
        }
        let denom = if denom < floor { floor } else { denom };
        out[t] = values[t] / denom - 1.0;
    }
    out
}

/// Derived-variable name for the stable rolling series of `var`.
pub fn rolling_name(var: &str) -> String {
    format!("{var}_rolling")
}

/// Derived-variable name for the provisional rolling series of `var`.
pub fn rolling_provisional_name(var: &str) -> String {
    format!("{var}_rolling_provisional")
}

/// Derived-variable name for the per-capita series of `var`.
pub fn norm_name(var: &str) -> String {
    format!("{var}_norm")
}

/// Attaches `{var}_rolling` and `{var}_rolling_provisional` to `data`.
///
/// Cumulative variables are converted to daily increments first;
/// incremental variables only have their gaps zero-filled, matching the
/// treatment of death and triage counts in the source data.
pub fn enrich_rolling(
    data: &mut Dataset,
    var: &str,
    kind: SeriesKind,
    config: &RateConfig,
    agg: Agg,
) -> Result<(), EpiError> {
    config.validate()?;

    let cfg = *config;
    data.map_variable(var, &rolling_name(var), move |row| {
        Ok(rolling_split(&as_daily(row, kind), &cfg, agg)?.stable)
    })?;
    data.map_variable(var, &rolling_provisional_name(var), move |row| {
        Ok(rolling_split(&as_daily(row, kind), &cfg, agg)?.provisional)
    })
}

/// Rate-engine namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = epi_core::crate_name();
    "epi-rates"
}

fn as_daily(row: &[f64], kind: SeriesKind) -> Vec<f64> {
    match kind {
        SeriesKind::Cumulative => daily_increments(row),
        SeriesKind::Incremental => fill_missing(row, 0.0),
    }
}

/// Attaches `{src}_norm`, the per-100k rate of `src`, to `data`.
///
/// With `strict` set, a region without a population entry fails loudly;
/// otherwise its derived row is left missing (population-less
/// pseudo-regions at some call sites).
pub fn enrich_per_capita(
    data: &mut Dataset,
    src: &str,
    populations: &PopulationTable,
    strict: bool,
) -> Result<(), EpiError> {
    let values = data.variable(src)?;
    let n_dates = data.n_dates();
    let mut out = Vec::with_capacity(values.len());
    for (r, region) in data.regions().iter().enumerate() {
        let row = &values[r * n_dates..(r + 1) * n_dates];
        let population = if strict {
            Some(populations.get(region)?)
        } else {
            populations.get_opt(region)
        };
        match population {
            Some(population) => out.extend(per_capita(row, population, PER_CAPITA_SCALE)?),
            None => out.extend(std::iter::repeat(f64::NAN).take(n_dates)),
        }
    }
    data.insert_variable(&norm_name(src), out)
}
