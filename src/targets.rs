// Target maps, their on-disk store, and period-based decomposition.
use crate::error::{ReportError, Result};
use crate::types::{Dimension, TargetBreakdownRow, TripRecord};
use crate::util::{days_inclusive, round2};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Period target tonnage per category key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetMap(BTreeMap<String, f64>);

impl TargetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value.max(0.0));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Target for the row's category; unmatched categories get zero.
    pub fn target_for(&self, dim: Dimension, r: &TripRecord) -> f64 {
        self.get(dim.value(r)).unwrap_or(0.0)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for TargetMap {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut map = TargetMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

/// Value a key falls back to when the store has none for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum TargetDefault {
    ObservedActual,
    Fixed(f64),
}

/// Sum of tonnage per value of `dim`.
pub fn observed_totals(records: &[TripRecord], dim: Dimension) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for r in records {
        *totals.entry(dim.value(r).to_string()).or_insert(0.0) += r.tonnage;
    }
    totals
}

/// Build the working map for `keys`: stored values win, anything unset takes
/// `default`. Stored keys outside `keys` are dropped, matching a save that
/// only writes the keys currently offered for editing.
pub fn resolve_targets(
    stored: &TargetMap,
    keys: &[String],
    default: TargetDefault,
    observed: &BTreeMap<String, f64>,
) -> TargetMap {
    keys.iter()
        .map(|k| {
            let value = stored.get(k).unwrap_or_else(|| match default {
                TargetDefault::ObservedActual => observed.get(k).copied().unwrap_or(0.0),
                TargetDefault::Fixed(v) => v,
            });
            (k.clone(), value)
        })
        .collect()
}

/// JSON key-value file holding one target map. Loading a missing file gives
/// an empty map; saving overwrites the whole file. No locking: the last
/// writer wins.
#[derive(Debug, Clone)]
pub struct TargetStore {
    path: PathBuf,
}

impl TargetStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<TargetMap> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no stored targets");
            return Ok(TargetMap::new());
        }
        let s = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&s)?)
    }

    pub fn save(&self, targets: &TargetMap) -> Result<()> {
        let s = serde_json::to_string_pretty(targets)?;
        std::fs::write(&self.path, s)?;
        info!(path = %self.path.display(), keys = targets.len(), "saved targets");
        Ok(())
    }
}

/// Start/end dates over which a period target is spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        days_inclusive(self.start, self.end)
    }
}

/// Splits period targets into daily and weekly shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocator {
    days: i64,
}

/// Monthly, daily and weekly target carried by one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowTarget {
    pub monthly: f64,
    pub daily: f64,
    pub weekly: f64,
}

impl Allocator {
    pub fn new(days: i64) -> Result<Self> {
        if days <= 0 {
            return Err(ReportError::InvalidPeriod { days });
        }
        Ok(Self { days })
    }

    pub fn for_period(period: &Period) -> Result<Self> {
        Self::new(period.days())
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn daily(&self, target: f64) -> f64 {
        target / self.days as f64
    }

    pub fn weekly(&self, target: f64) -> f64 {
        self.daily(target) * 7.0
    }

    pub fn split(&self, target: f64) -> RowTarget {
        RowTarget {
            monthly: target,
            daily: self.daily(target),
            weekly: self.weekly(target),
        }
    }

    /// Per-row targets, index-aligned with `records`.
    pub fn assign(&self, records: &[TripRecord], dim: Dimension, targets: &TargetMap) -> Vec<RowTarget> {
        records
            .iter()
            .map(|r| self.split(targets.target_for(dim, r)))
            .collect()
    }

    pub fn breakdown(&self, dim: Dimension, targets: &TargetMap) -> Vec<TargetBreakdownRow> {
        targets
            .iter()
            .map(|(key, monthly)| TargetBreakdownRow {
                dimension: dim.to_string(),
                key: key.to_string(),
                daily: round2(self.daily(monthly)),
                weekly: round2(self.weekly(monthly)),
                monthly: round2(monthly),
            })
            .collect()
    }
}
