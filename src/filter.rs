// Row filtering along categorical dimensions and a date range.
use crate::types::{DateRange, Dimension, TripRecord};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Chosen values per dimension plus the always-applied date range.
///
/// An empty (or absent) selection for a dimension passes every row.
#[derive(Debug, Clone)]
pub struct FilterSelection {
    pub range: DateRange,
    selections: BTreeMap<Dimension, BTreeSet<String>>,
}

impl FilterSelection {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            selections: BTreeMap::new(),
        }
    }

    pub fn with<I, S>(mut self, dim: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select(dim, values);
        self
    }

    pub fn select<I, S>(&mut self, dim: Dimension, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections
            .entry(dim)
            .or_default()
            .extend(values.into_iter().map(Into::<String>::into));
    }

    pub fn matches(&self, r: &TripRecord) -> bool {
        self.range.contains(r.date)
            && self
                .selections
                .iter()
                .filter(|(_, chosen)| !chosen.is_empty())
                .all(|(dim, chosen)| chosen.contains(dim.value(r)))
    }
}

/// Keep the rows that satisfy every predicate of `selection`. The input is
/// left untouched.
pub fn apply(records: &[TripRecord], selection: &FilterSelection) -> Vec<TripRecord> {
    let kept: Vec<TripRecord> = records
        .iter()
        .filter(|r| selection.matches(r))
        .cloned()
        .collect();
    debug!(before = records.len(), after = kept.len(), "applied filters");
    kept
}

/// Distinct values of a dimension in first-seen order, the option list a
/// multi-select control offers.
pub fn unique_values(records: &[TripRecord], dim: Dimension) -> Vec<String> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .map(|r| dim.value(r))
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// Earliest and latest date in the table, the default range of the pickers.
pub fn date_bounds(records: &[TripRecord]) -> Option<DateRange> {
    let start = records.iter().map(|r| r.date).min()?;
    let end = records.iter().map(|r| r.date).max()?;
    DateRange::new(start, end).ok()
}
