// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::EpiError;
use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, HashMap};

/// In-memory labeled array keyed by (region, date) with named variables.
///
/// Dates form a contiguous daily sequence starting at `start`; each variable
/// is stored region-major as one flat buffer of `n_regions * n_dates`
/// values with `NaN` marking missing entries. Enrichment works by inserting
/// a new derived variable that shares the axes (for example
/// `cases_rolling` next to `cases`).
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    regions: Vec<String>,
    region_index: HashMap<String, usize>,
    start: NaiveDate,
    n_dates: usize,
    variables: BTreeMap<String, Vec<f64>>,
}

impl Dataset {
    /// Creates an empty dataset with the given region and date axes.
    pub fn new(regions: Vec<String>, start: NaiveDate, n_dates: usize) -> Result<Self, EpiError> {
        if regions.is_empty() {
            return Err(EpiError::invalid_input("dataset needs at least one region"));
        }
        if n_dates < 1 {
            return Err(EpiError::invalid_input(format!(
                "dataset needs at least one date; got {n_dates}"
            )));
        }

        let mut region_index = HashMap::with_capacity(regions.len());
        for (i, region) in regions.iter().enumerate() {
            if region.is_empty() {
                return Err(EpiError::invalid_input("empty region id"));
            }
            if region_index.insert(region.clone(), i).is_some() {
                return Err(EpiError::invalid_input(format!(
                    "duplicate region id {region:?}"
                )));
            }
        }

        Ok(Self {
            regions,
            region_index,
            start,
            n_dates,
            variables: BTreeMap::new(),
        })
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn n_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn n_dates(&self) -> usize {
        self.n_dates
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// Calendar date of position `t` on the date axis.
    pub fn date_at(&self, t: usize) -> Result<NaiveDate, EpiError> {
        if t >= self.n_dates {
            return Err(EpiError::invalid_input(format!(
                "date position {t} out of range; dataset has {} dates",
                self.n_dates
            )));
        }
        self.start
            .checked_add_days(Days::new(t as u64))
            .ok_or_else(|| EpiError::invalid_input("date axis overflow"))
    }

    pub fn end_date(&self) -> Result<NaiveDate, EpiError> {
        self.date_at(self.n_dates - 1)
    }

    /// Position of `date` on the date axis, if covered.
    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        let offset = date.signed_duration_since(self.start).num_days();
        if offset < 0 {
            return None;
        }
        let offset = offset as usize;
        (offset < self.n_dates).then_some(offset)
    }

    pub fn region_position(&self, region: &str) -> Option<usize> {
        self.region_index.get(region).copied()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Inserts a variable, replacing any existing variable of the same name.
    pub fn insert_variable(&mut self, name: &str, values: Vec<f64>) -> Result<(), EpiError> {
        if name.is_empty() {
            return Err(EpiError::invalid_input("empty variable name"));
        }
        let expected = self.regions.len() * self.n_dates;
        if values.len() != expected {
            return Err(EpiError::invalid_input(format!(
                "variable {name:?} has {} values; expected {expected} \
                 ({} regions x {} dates)",
                values.len(),
                self.regions.len(),
                self.n_dates
            )));
        }
        self.variables.insert(name.to_string(), values);
        Ok(())
    }

    /// Full region-major buffer for one variable.
    pub fn variable(&self, name: &str) -> Result<&[f64], EpiError> {
        self.variables
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EpiError::invalid_input(format!("unknown variable {name:?}")))
    }

    /// One region's series for one variable, over the full date axis.
    pub fn select(&self, name: &str, region: &str) -> Result<&[f64], EpiError> {
        let values = self.variable(name)?;
        let r = self
            .region_position(region)
            .ok_or_else(|| EpiError::invalid_input(format!("region {region:?} not in dataset")))?;
        Ok(&values[r * self.n_dates..(r + 1) * self.n_dates])
    }

    /// Derives a new variable by applying `f` to each region's series of
    /// `src`. The output of `f` must have the same length as the date axis.
    pub fn map_variable<F>(&mut self, src: &str, dst: &str, f: F) -> Result<(), EpiError>
    where
        F: Fn(&[f64]) -> Result<Vec<f64>, EpiError>,
    {
        let src_values = self.variable(src)?;
        let mut out = Vec::with_capacity(src_values.len());
        for r in 0..self.regions.len() {
            let row = &src_values[r * self.n_dates..(r + 1) * self.n_dates];
            let derived = f(row)?;
            if derived.len() != self.n_dates {
                return Err(EpiError::invalid_input(format!(
                    "derived series for {dst:?} has {} values; expected {}",
                    derived.len(),
                    self.n_dates
                )));
            }
            out.extend(derived);
        }
        self.insert_variable(dst, out)
    }

    /// Collapses the region axis by summation, skipping missing values.
    ///
    /// A date where every region is missing stays missing.
    pub fn sum_over_regions(&self, name: &str) -> Result<Vec<f64>, EpiError> {
        let values = self.variable(name)?;
        let mut out = vec![f64::NAN; self.n_dates];
        for r in 0..self.regions.len() {
            for t in 0..self.n_dates {
                let v = values[r * self.n_dates + t];
                if v.is_nan() {
                    continue;
                }
                if out[t].is_nan() {
                    out[t] = v;
                } else {
                    out[t] += v;
                }
            }
        }
        Ok(out)
    }
}
