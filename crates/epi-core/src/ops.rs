// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::EpiError;

/// Aggregate applied over a rolling window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Agg {
    Mean,
    Sum,
}

/// Propagates the last seen value forward over missing entries.
///
/// Leading missing entries stay missing.
pub fn forward_fill(xs: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(xs.len());
    let mut last = f64::NAN;
    for &x in xs {
        if !x.is_nan() {
            last = x;
        }
        out.push(last);
    }
    out
}

/// Replaces missing entries with `value`.
pub fn fill_missing(xs: &[f64], value: f64) -> Vec<f64> {
    xs.iter()
        .map(|&x| if x.is_nan() { value } else { x })
        .collect()
}

/// First difference along the series; the first element becomes missing.
pub fn diff(xs: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(xs.len());
    out.push(f64::NAN);
    for t in 1..xs.len() {
        out.push(xs[t] - xs[t - 1]);
    }
    out
}

/// Replaces negative values with zero; missing entries pass through.
///
/// Backward data revisions can make a daily delta spuriously negative.
pub fn clip_non_negative(xs: &[f64]) -> Vec<f64> {
    xs.iter()
        .map(|&x| if x < 0.0 { 0.0 } else { x })
        .collect()
}

/// Sliding-window aggregate.
///
/// For `center == false` the window trails: position `t` covers
/// `[t + 1 - window, t]` and the first `window - 1` positions are missing.
/// For `center == true` the window spans symmetrically (odd windows
/// exactly; even windows take one extra trailing sample), and `window / 2`
/// positions at each end of the series become missing. A missing value
/// anywhere in the window makes the output missing.
pub fn rolling(xs: &[f64], window: usize, center: bool, agg: Agg) -> Result<Vec<f64>, EpiError> {
    if window < 1 {
        return Err(EpiError::invalid_input(format!(
            "rolling window must be >= 1; got {window}"
        )));
    }

    let n = xs.len();
    let mut trailing = vec![f64::NAN; n];
    for t in 0..n {
        if t + 1 < window {
            continue;
        }
        let segment = &xs[t + 1 - window..=t];
        let sum: f64 = segment.iter().sum();
        trailing[t] = match agg {
            Agg::Sum => sum,
            Agg::Mean => sum / window as f64,
        };
    }

    if !center {
        return Ok(trailing);
    }

    let shift = window / 2;
    let mut centered = vec![f64::NAN; n];
    for t in 0..n {
        if let Some(&v) = trailing.get(t + shift) {
            centered[t] = v;
        }
    }
    Ok(centered)
}

#[cfg(test)]
mod tests {
    use super::{clip_non_negative, diff, fill_missing, forward_fill, rolling, Agg};

    const NAN: f64 = f64::NAN;

    fn assert_series_eq(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            if e.is_nan() {
                assert!(a.is_nan(), "position {i}: expected NaN, got {a}");
            } else {
                assert!((a - e).abs() < 1e-9, "position {i}: expected {e}, got {a}");
            }
        }
    }

    #[test]
    fn forward_fill_covers_gaps_but_not_leading_missing() {
        let filled = forward_fill(&[NAN, 1.0, NAN, NAN, 4.0]);
        assert_series_eq(&filled, &[NAN, 1.0, 1.0, 1.0, 4.0]);
    }

    #[test]
    fn diff_first_element_is_missing() {
        let d = diff(&[3.0, 5.0, 4.0]);
        assert_series_eq(&d, &[NAN, 2.0, -1.0]);
    }

    #[test]
    fn clip_replaces_negatives_only() {
        let clipped = clip_non_negative(&[-1.0, 0.0, 2.5, NAN]);
        assert_series_eq(&clipped, &[0.0, 0.0, 2.5, NAN]);
    }

    #[test]
    fn fill_missing_replaces_nan() {
        let filled = fill_missing(&[NAN, 2.0], 0.0);
        assert_series_eq(&filled, &[0.0, 2.0]);
    }

    #[test]
    fn trailing_rolling_sum_loses_leading_positions() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let rolled = rolling(&xs, 2, false, Agg::Sum).expect("valid window");
        assert_series_eq(&rolled, &[NAN, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn centered_rolling_mean_loses_both_ends() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let rolled = rolling(&xs, 3, true, Agg::Mean).expect("valid window");
        assert_series_eq(&rolled, &[NAN, 2.0, 3.0, 4.0, NAN]);
    }

    #[test]
    fn missing_value_in_window_makes_output_missing() {
        let xs = [1.0, NAN, 3.0];
        let rolled = rolling(&xs, 2, false, Agg::Sum).expect("valid window");
        assert_series_eq(&rolled, &[NAN, NAN, NAN]);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = rolling(&[1.0], 0, false, Agg::Mean).expect_err("window 0 must fail");
        assert!(err.to_string().contains("rolling window"));
    }
}
