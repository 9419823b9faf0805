// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use epi_core::{clip_non_negative, forward_fill, rolling, Agg};
use epi_rates::{daily_increments, rolling_split, week_over_week, RateConfig, RATE_FLOOR};
use proptest::prelude::*;

const ABS_TOL: f64 = 1e-9;

fn increments_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0_f64..1000.0, 1..80)
}

fn cumulate(increments: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    increments
        .iter()
        .map(|x| {
            total += x;
            total
        })
        .collect()
}

proptest! {
    /// Forward-fill and clip are idempotent; a second pass changes nothing.
    #[test]
    fn forward_fill_and_clip_stabilize(xs in prop::collection::vec(
        prop_oneof![Just(f64::NAN), -100.0_f64..100.0],
        1..60,
    )) {
        let filled = forward_fill(&xs);
        let refilled = forward_fill(&filled);
        for (a, b) in filled.iter().zip(&refilled) {
            prop_assert!((a.is_nan() && b.is_nan()) || a == b);
        }

        let clipped = clip_non_negative(&xs);
        let reclipped = clip_non_negative(&clipped);
        for (a, b) in clipped.iter().zip(&reclipped) {
            prop_assert!((a.is_nan() && b.is_nan()) || a == b);
        }
    }

    /// Incrementation recovers non-negative daily counts from their own
    /// running total (the first position is lost to the difference).
    #[test]
    fn incrementation_inverts_cumulation(increments in increments_strategy()) {
        let levels = cumulate(&increments);
        let recovered = daily_increments(&levels);
        prop_assert!(recovered[0].is_nan());
        for (a, b) in recovered[1..].iter().zip(&increments[1..]) {
            prop_assert!((a - b).abs() <= ABS_TOL.max(b.abs() * 1e-12));
        }
    }

    /// The provisional-policy value is never below either input.
    #[test]
    fn provisional_max_monotonicity(
        daily in increments_strategy(),
        provisional_days in 0_usize..10,
    ) {
        let config = RateConfig { provisional_days, ..RateConfig::default() };
        let pair = rolling_split(&daily, &config, Agg::Mean).expect("valid config");
        for t in 0..pair.len() {
            let preferred = pair.preferred(t);
            let stable = pair.stable[t];
            let provisional = pair.provisional[t];
            if !stable.is_nan() {
                prop_assert!(preferred >= stable - ABS_TOL);
            }
            if !provisional.is_nan() {
                prop_assert!(preferred >= provisional - ABS_TOL);
            }
        }
    }

    /// With a positive floor, a non-negative series never produces an
    /// infinite or spuriously-missing change once the lookback is defined.
    #[test]
    fn week_over_week_is_finite_on_non_negative_series(daily in increments_strategy()) {
        let change = week_over_week(&daily, RATE_FLOOR);
        for (t, c) in change.iter().enumerate() {
            if t < 7 {
                prop_assert!(c.is_nan());
            } else {
                prop_assert!(c.is_finite(), "position {}: {}", t, c);
            }
        }
    }

    /// A rolling mean stays within the bounds of its window's values.
    #[test]
    fn rolling_mean_is_bounded_by_the_window(daily in increments_strategy(), window in 1_usize..10) {
        let rolled = rolling(&daily, window, false, Agg::Mean).expect("valid window");
        for t in 0..daily.len() {
            if rolled[t].is_nan() {
                continue;
            }
            let lo = daily[t + 1 - window..=t]
                .iter()
                .fold(f64::INFINITY, |a, &b| a.min(b));
            let hi = daily[t + 1 - window..=t]
                .iter()
                .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            prop_assert!(rolled[t] >= lo - ABS_TOL && rolled[t] <= hi + ABS_TOL);
        }
    }
}
