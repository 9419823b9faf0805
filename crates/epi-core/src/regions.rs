// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::EpiError;
use std::collections::HashMap;

/// Local authorities published under a different name than the mapping
/// table uses. Applied before any lookup.
pub const RENAMED_AUTHORITIES: [(&str, &str); 2] = [
    ("Cornwall and Isles of Scilly", "Cornwall"),
    ("Hackney and City of London", "Hackney"),
];

/// Whole-nation label for a non-English GSS code, decided by the code's
/// namespace letter. England (`E...`) returns `None` and must go through
/// the NHS-region table instead.
pub fn nation_for_gss(code: &str) -> Option<&'static str> {
    match code.chars().next()? {
        'W' => Some("Wales"),
        'S' => Some("Scotland"),
        'N' => Some("Northern Ireland"),
        _ => None,
    }
}

/// Static lookup from fine-grained region id to coarse region name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionMapping {
    table_name: String,
    entries: HashMap<String, String>,
}

impl RegionMapping {
    pub fn new(
        table_name: impl Into<String>,
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a fine-grained region id to its coarse region name.
    ///
    /// Renamed authorities are canonicalized first and non-English GSS
    /// codes short-circuit to their nation label; everything else must be
    /// present in the table or the lookup fails naming the key.
    pub fn resolve(&self, key: &str) -> Result<String, EpiError> {
        let key = RENAMED_AUTHORITIES
            .iter()
            .find(|(from, _)| *from == key)
            .map(|(_, to)| *to)
            .unwrap_or(key);

        if let Some(nation) = nation_for_gss(key) {
            return Ok(nation.to_string());
        }

        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| EpiError::mapping(key, self.table_name.clone()))
    }
}

/// Region id to population count, used as a normalization denominator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PopulationTable {
    entries: HashMap<String, u64>,
}

impl PopulationTable {
    pub fn new(entries: impl IntoIterator<Item = (String, u64)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Strict lookup; fails loudly naming the region.
    pub fn get(&self, region: &str) -> Result<u64, EpiError> {
        self.entries
            .get(region)
            .copied()
            .ok_or_else(|| EpiError::mapping(region, "population"))
    }

    /// Best-effort lookup for call sites that tolerate population-less
    /// pseudo-regions.
    pub fn get_opt(&self, region: &str) -> Option<u64> {
        self.entries.get(region).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
