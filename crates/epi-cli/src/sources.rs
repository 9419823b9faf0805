// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use epi_core::{Dataset, EpiError, PopulationTable, RegionMapping};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Seam between the core pipeline and whatever fetched the data.
///
/// The first four sources are primary: a failure there aborts the run.
/// The rest are secondary and the pipeline degrades gracefully when any
/// of them fails.
pub trait SourceProvider {
    fn region_mapping(&self) -> Result<RegionMapping, EpiError>;
    fn populations(&self) -> Result<PopulationTable, EpiError>;
    /// Cumulative `cases` per local authority.
    fn local_authority_cases(&self) -> Result<Dataset, EpiError>;
    /// Daily `deaths` per coarse region.
    fn deaths(&self) -> Result<Dataset, EpiError>;

    /// Daily `admissions` per coarse region.
    fn admissions(&self) -> Result<Dataset, EpiError>;
    /// Daily online-triage `count` per coarse region.
    fn triage_online(&self) -> Result<Dataset, EpiError>;
    /// Daily pathways-triage `count` per coarse region.
    fn triage_pathways(&self) -> Result<Dataset, EpiError>;
    /// Test `positivity` per local authority.
    fn positivity(&self) -> Result<Dataset, EpiError>;
    /// Vaccine uptake fractions (`first_dose`, `second_dose`) per local authority.
    fn vaccination(&self) -> Result<Dataset, EpiError>;
    /// Cumulative `cases` per Scottish health board.
    fn scottish_cases(&self) -> Result<Dataset, EpiError>;
    /// Genomic lineage counts and alias map.
    fn lineages(&self) -> Result<LineageCounts, EpiError>;
}

/// Lineage counts plus the shorthand-root alias map.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LineageCounts {
    pub counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

/// Wire shape for a dataset bundle file: per-region rows of optional
/// values (`null` marks unreported days).
#[derive(Clone, Debug, Deserialize)]
pub struct DatasetWire {
    pub regions: Vec<String>,
    pub start: NaiveDate,
    pub variables: BTreeMap<String, Vec<Vec<Option<f64>>>>,
}

impl DatasetWire {
    pub fn into_dataset(self) -> Result<Dataset, EpiError> {
        let n_dates = self
            .variables
            .values()
            .next()
            .and_then(|rows| rows.first())
            .map(Vec::len)
            .ok_or_else(|| EpiError::invalid_input("dataset bundle has no variables"))?;

        let mut data = Dataset::new(self.regions, self.start, n_dates)?;
        for (name, rows) in self.variables {
            if rows.len() != data.n_regions() {
                return Err(EpiError::invalid_input(format!(
                    "variable {name:?} has {} rows; expected {}",
                    rows.len(),
                    data.n_regions()
                )));
            }
            let mut flat = Vec::with_capacity(data.n_regions() * n_dates);
            for row in rows {
                if row.len() != n_dates {
                    return Err(EpiError::invalid_input(format!(
                        "variable {name:?} has a row of {} values; expected {n_dates}",
                        row.len()
                    )));
                }
                flat.extend(row.into_iter().map(|v| v.unwrap_or(f64::NAN)));
            }
            data.insert_variable(&name, flat)?;
        }
        Ok(data)
    }
}

#[derive(Clone, Debug, Deserialize)]
struct MappingWire {
    table: String,
    entries: HashMap<String, String>,
}

/// Source bundle on disk: one JSON file per source under one directory.
///
/// File names are fixed: `mapping.json`, `populations.json`, `cases.json`,
/// `deaths.json`, `admissions.json`, `triage_online.json`,
/// `triage_pathways.json`, `positivity.json`, `vaccination.json`,
/// `scottish_cases.json`, `lineages.json`.
#[derive(Clone, Debug)]
pub struct FileSources {
    dir: PathBuf,
}

impl FileSources {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, EpiError> {
        let path = self.dir.join(name);
        let raw = std::fs::read_to_string(&path)
            .map_err(|err| EpiError::source_unavailable(name, err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| {
            EpiError::invalid_input(format!("{}: {err}", path.display()))
        })
    }

    fn read_dataset(&self, name: &str) -> Result<Dataset, EpiError> {
        self.read::<DatasetWire>(name)?.into_dataset()
    }
}

impl SourceProvider for FileSources {
    fn region_mapping(&self) -> Result<RegionMapping, EpiError> {
        let wire: MappingWire = self.read("mapping.json")?;
        Ok(RegionMapping::new(wire.table, wire.entries))
    }

    fn populations(&self) -> Result<PopulationTable, EpiError> {
        let entries: HashMap<String, u64> = self.read("populations.json")?;
        Ok(PopulationTable::new(entries))
    }

    fn local_authority_cases(&self) -> Result<Dataset, EpiError> {
        self.read_dataset("cases.json")
    }

    fn deaths(&self) -> Result<Dataset, EpiError> {
        self.read_dataset("deaths.json")
    }

    fn admissions(&self) -> Result<Dataset, EpiError> {
        self.read_dataset("admissions.json")
    }

    fn triage_online(&self) -> Result<Dataset, EpiError> {
        self.read_dataset("triage_online.json")
    }

    fn triage_pathways(&self) -> Result<Dataset, EpiError> {
        self.read_dataset("triage_pathways.json")
    }

    fn positivity(&self) -> Result<Dataset, EpiError> {
        self.read_dataset("positivity.json")
    }

    fn vaccination(&self) -> Result<Dataset, EpiError> {
        self.read_dataset("vaccination.json")
    }

    fn scottish_cases(&self) -> Result<Dataset, EpiError> {
        self.read_dataset("scottish_cases.json")
    }

    fn lineages(&self) -> Result<LineageCounts, EpiError> {
        self.read("lineages.json")
    }
}

/// Convenience for tests and callers with data already in memory.
pub fn dataset_from_rows(
    regions: &[&str],
    start: NaiveDate,
    variables: &[(&str, Vec<Vec<f64>>)],
) -> Result<Dataset, EpiError> {
    let n_dates = variables
        .first()
        .and_then(|(_, rows)| rows.first())
        .map(Vec::len)
        .ok_or_else(|| EpiError::invalid_input("no variables given"))?;
    let mut data = Dataset::new(
        regions.iter().map(|r| r.to_string()).collect(),
        start,
        n_dates,
    )?;
    for (name, rows) in variables {
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        data.insert_variable(name, flat)?;
    }
    Ok(data)
}
