// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use epi_core::EpiError;
use std::collections::{BTreeMap, HashMap};

const DEFAULT_THRESHOLD: f64 = 0.005;
const DEFAULT_OTHER_LABEL: &str = "other";

/// Collapse parameters for genomic lineage labels.
#[derive(Clone, Debug, PartialEq)]
pub struct LineageConfig {
    /// Minimum share of the total a label needs to stand on its own.
    pub threshold: f64,
    /// Bucket for roots that never reach the threshold.
    pub other_label: String,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            other_label: DEFAULT_OTHER_LABEL.to_string(),
        }
    }
}

impl LineageConfig {
    fn validate(&self) -> Result<(), EpiError> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(EpiError::invalid_input(format!(
                "LineageConfig.threshold must be in (0, 1); got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Parent label of a lineage: the alias map wins (e.g. `AY` is a child of
/// `B.1.617.2`), otherwise the label is truncated at its last dot. Roots
/// have no parent.
fn parent_of<'a>(label: &'a str, aliases: &'a HashMap<String, String>) -> Option<&'a str> {
    let root = label.split('.').next().unwrap_or(label);
    if let Some(parent) = aliases.get(root) {
        if parent != label {
            // Aliased roots expand into the named hierarchy; deeper labels
            // still climb their own dotted path first.
            if label == root {
                return Some(parent);
            }
        }
    }
    label.rfind('.').map(|dot| &label[..dot])
}

/// Hierarchically collapses lineage counts.
///
/// Labels whose share of the total count is below the threshold are folded
/// into their parent, repeatedly, until every surviving label is at or
/// above the threshold; sub-threshold roots end up in the catch-all
/// bucket. Labels at or above the threshold keep their own counts plus
/// whatever their collapsed descendants contributed.
pub fn summarize_lineages(
    counts: &BTreeMap<String, u64>,
    aliases: &HashMap<String, String>,
    config: &LineageConfig,
) -> Result<BTreeMap<String, u64>, EpiError> {
    config.validate()?;

    let total: u64 = counts.values().sum();
    if total == 0 {
        return Ok(BTreeMap::new());
    }
    let cutoff = config.threshold * total as f64;

    let mut work: BTreeMap<String, u64> = counts.clone();
    let mut folds = 0usize;
    let max_folds = counts.len().saturating_mul(64).max(64);
    loop {
        if folds > max_folds {
            return Err(EpiError::invalid_input(
                "lineage collapse did not converge; alias map may contain a cycle",
            ));
        }
        folds += 1;
        // Deepest label first so descendants merge before their parents
        // are judged.
        let candidate = work
            .iter()
            .filter(|(label, &count)| {
                *label != &config.other_label && (count as f64) < cutoff
            })
            .max_by_key(|(label, _)| (label.matches('.').count(), label.to_string()));

        let Some((label, _)) = candidate else {
            break;
        };
        let label = label.clone();
        let count = work.remove(&label).unwrap_or(0);

        let target = parent_of(&label, aliases)
            .map(str::to_string)
            .unwrap_or_else(|| config.other_label.clone());
        *work.entry(target).or_insert(0) += count;
    }

    Ok(work)
}

#[cfg(test)]
mod tests {
    use super::{summarize_lineages, LineageConfig};
    use std::collections::{BTreeMap, HashMap};

    fn counts(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn sub_threshold_children_fold_into_parents() {
        let input = counts(&[("B.1.1.7", 800), ("B.1.1.7.1", 3), ("B.1.177", 190), ("B.1.177.4", 7)]);
        let config = LineageConfig {
            threshold: 0.02,
            ..LineageConfig::default()
        };
        let out = summarize_lineages(&input, &HashMap::new(), &config).expect("valid config");

        assert_eq!(out.get("B.1.1.7"), Some(&803));
        assert_eq!(out.get("B.1.177"), Some(&197));
        assert!(!out.contains_key("B.1.1.7.1"));
    }

    #[test]
    fn counts_are_conserved() {
        let input = counts(&[("B.1", 50), ("B.1.2", 2), ("C.3", 1), ("A", 47)]);
        let out = summarize_lineages(&input, &HashMap::new(), &LineageConfig::default())
            .expect("valid config");
        let total: u64 = out.values().sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn sub_threshold_roots_land_in_the_other_bucket() {
        let input = counts(&[("B.1.1.7", 990), ("XA", 4), ("C.1", 6)]);
        let config = LineageConfig {
            threshold: 0.01,
            ..LineageConfig::default()
        };
        let out = summarize_lineages(&input, &HashMap::new(), &config).expect("valid config");

        assert_eq!(out.get("B.1.1.7"), Some(&990));
        // XA has no parent; C.1 climbs to C which is still sub-threshold.
        assert_eq!(out.get("other"), Some(&10));
    }

    #[test]
    fn alias_map_expands_shorthand_roots() {
        let input = counts(&[("B.1.617.2", 900), ("AY", 5), ("B.1.1.7", 95)]);
        let aliases: HashMap<String, String> =
            [("AY".to_string(), "B.1.617.2".to_string())].into();
        let config = LineageConfig {
            threshold: 0.02,
            ..LineageConfig::default()
        };
        let out = summarize_lineages(&input, &aliases, &config).expect("valid config");

        assert_eq!(out.get("B.1.617.2"), Some(&905));
        assert!(!out.contains_key("AY"));
    }

    #[test]
    fn empty_and_invalid_inputs() {
        let out = summarize_lineages(
            &BTreeMap::new(),
            &HashMap::new(),
            &LineageConfig::default(),
        )
        .expect("empty input is fine");
        assert!(out.is_empty());

        let bad = LineageConfig {
            threshold: 1.5,
            ..LineageConfig::default()
        };
        assert!(summarize_lineages(&BTreeMap::new(), &HashMap::new(), &bad).is_err());
    }
}
