// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use epi_core::{Dataset, EpiError, RegionMapping};
use std::collections::BTreeMap;

/// Whole-nation pseudo-regions produced when non-English local authorities
/// short-circuit past the England-only NHS-region table. Callers that only
/// want English NHS regions pass these as the drop list.
pub const NATION_LABELS: [&str; 3] = ["Wales", "Scotland", "Northern Ireland"];

/// Reprojects every variable of `data` onto the coarse region scheme given
/// by `mapping` and sums elementwise over the date axis.
///
/// The lookup must be total over the input's region set; an unmapped region
/// fails naming the key rather than being dropped silently. Missing values
/// are skipped during summation, and a cell where every contributing region
/// is missing stays missing. Coarse regions named in `drop` are removed
/// from the output after aggregation.
pub fn aggregate(
    data: &Dataset,
    mapping: &RegionMapping,
    drop: &[&str],
) -> Result<Dataset, EpiError> {
    let mut coarse_of = Vec::with_capacity(data.n_regions());
    for region in data.regions() {
        coarse_of.push(mapping.resolve(region)?);
    }

    let mut coarse_index: BTreeMap<&str, usize> = BTreeMap::new();
    for label in &coarse_of {
        if drop.contains(&label.as_str()) {
            continue;
        }
        let next = coarse_index.len();
        coarse_index.entry(label.as_str()).or_insert(next);
    }
    if coarse_index.is_empty() {
        return Err(EpiError::invalid_input(
            "aggregation dropped every coarse region",
        ));
    }
    // BTreeMap iteration order is the output region order; re-number to match.
    let coarse_regions: Vec<String> = coarse_index.keys().map(|s| s.to_string()).collect();
    for (i, slot) in coarse_index.values_mut().enumerate() {
        *slot = i;
    }

    let n_dates = data.n_dates();
    let mut out = Dataset::new(coarse_regions, data.start_date(), n_dates)?;

    let variables: Vec<String> = data.variable_names().map(str::to_string).collect();
    for name in &variables {
        let fine = data.variable(name)?;
        let mut summed = vec![f64::NAN; out.n_regions() * n_dates];
        for (r, label) in coarse_of.iter().enumerate() {
            let Some(&target) = coarse_index.get(label.as_str()) else {
                continue; // dropped nation
            };
            for t in 0..n_dates {
                let v = fine[r * n_dates + t];
                if v.is_nan() {
                    continue;
                }
                let cell = &mut summed[target * n_dates + t];
                if cell.is_nan() {
                    *cell = v;
                } else {
                    *cell += v;
                }
            }
        }
        out.insert_variable(name, summed)?;
    }

    Ok(out)
}

/// Aggregation namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = epi_core::crate_name();
    "epi-aggregate"
}

#[cfg(test)]
mod tests {
    use super::{aggregate, NATION_LABELS};
    use chrono::NaiveDate;
    use epi_core::{Dataset, EpiError, RegionMapping};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn mapping() -> RegionMapping {
        RegionMapping::new(
            "nhs_region",
            [
                ("Hartlepool".to_string(), "North East and Yorkshire".to_string()),
                ("Leeds".to_string(), "North East and Yorkshire".to_string()),
                ("Cornwall".to_string(), "South West".to_string()),
            ],
        )
    }

    fn fine_dataset() -> Dataset {
        let mut data = Dataset::new(
            vec![
                "Hartlepool".into(),
                "Leeds".into(),
                "Cornwall and Isles of Scilly".into(),
                "W06000001".into(),
            ],
            date(2020, 3, 1),
            3,
        )
        .expect("valid axes");
        data.insert_variable(
            "cases",
            vec![
                1.0, 2.0, 3.0, // Hartlepool
                10.0, 20.0, 30.0, // Leeds
                5.0, 5.0, 5.0, // Cornwall (renamed before lookup)
                7.0, 7.0, f64::NAN, // Wales via GSS shortcut
            ],
        )
        .expect("valid shape");
        data
    }

    #[test]
    fn groups_and_sums_by_coarse_label() {
        let coarse = aggregate(&fine_dataset(), &mapping(), &[]).expect("total mapping");
        assert_eq!(
            coarse.regions(),
            &["North East and Yorkshire", "South West", "Wales"]
        );
        assert_eq!(
            coarse.select("cases", "North East and Yorkshire").expect("grouped"),
            &[11.0, 22.0, 33.0]
        );
        assert_eq!(coarse.select("cases", "South West").expect("renamed"), &[5.0, 5.0, 5.0]);

        let wales = coarse.select("cases", "Wales").expect("nation shortcut");
        assert_eq!(&wales[..2], &[7.0, 7.0]);
        assert!(wales[2].is_nan(), "all-missing cell must stay missing");
    }

    #[test]
    fn nation_pseudo_regions_can_be_dropped() {
        let coarse = aggregate(&fine_dataset(), &mapping(), &NATION_LABELS).expect("total mapping");
        assert_eq!(coarse.regions(), &["North East and Yorkshire", "South West"]);
    }

    #[test]
    fn unmapped_region_is_never_dropped_silently() {
        let mut data = fine_dataset();
        data = {
            let mut with_unknown = Dataset::new(
                vec!["Hartlepool".into(), "Narnia".into()],
                data.start_date(),
                3,
            )
            .expect("valid axes");
            with_unknown
                .insert_variable("cases", vec![1.0; 6])
                .expect("valid shape");
            with_unknown
        };

        let err = aggregate(&data, &mapping(), &[]).expect_err("unmapped region");
        match err {
            EpiError::Mapping { key, table } => {
                assert_eq!(key, "Narnia");
                assert_eq!(table, "nhs_region");
            }
            other => panic!("expected Mapping error, got {other:?}"),
        }
    }

    #[test]
    fn aggregates_every_variable_in_the_dataset() {
        let mut data = fine_dataset();
        data.insert_variable("deaths", vec![0.5; 12]).expect("valid shape");
        let coarse = aggregate(&data, &mapping(), &NATION_LABELS).expect("total mapping");
        assert_eq!(
            coarse.select("deaths", "North East and Yorkshire").expect("grouped"),
            &[1.0, 1.0, 1.0]
        );
    }
}
