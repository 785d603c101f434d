// Dump-time (jam dumping) analysis: trips and tonnage per hour of day.
use crate::error::ParseWarning;
use crate::reports::MergedGroup;
use crate::types::{DateRange, HourBucketRow, TripRecord};
use crate::util::{parse_time_safe, round2};
use chrono::{Datelike, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl FromStr for PeriodUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "harian" => Ok(PeriodUnit::Daily),
            "weekly" | "mingguan" => Ok(PeriodUnit::Weekly),
            "monthly" | "bulanan" => Ok(PeriodUnit::Monthly),
            other => Err(format!("unknown period '{}' (daily, weekly, monthly)", other)),
        }
    }
}

/// Bucket a trip falls into for the chosen unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Day(NaiveDate),
    Week(u32),
    Month(i32, u32),
}

impl PeriodKey {
    pub fn of(date: NaiveDate, unit: PeriodUnit) -> Self {
        match unit {
            PeriodUnit::Daily => PeriodKey::Day(date),
            PeriodUnit::Weekly => PeriodKey::Week(date.iso_week().week()),
            PeriodUnit::Monthly => PeriodKey::Month(date.year(), date.month()),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            PeriodKey::Week(w) => write!(f, "{}", w),
            PeriodKey::Month(y, m) => write!(f, "{:04}-{:02}", y, m),
        }
    }
}

/// Narrowing applied before bucketing: partner codes (the merged group's
/// label, with or without spaces, expands to its members) and an optional
/// single truck.
#[derive(Debug, Clone, Default)]
pub struct HourlySelection {
    pub partners: BTreeSet<String>,
    pub merged: Option<MergedGroup>,
    pub truck: Option<String>,
}

impl HourlySelection {
    fn partner_set(&self) -> BTreeSet<String> {
        let compact = |s: &str| s.split_whitespace().collect::<String>();
        let mut set = BTreeSet::new();
        for p in &self.partners {
            match &self.merged {
                Some(m) if compact(p) == compact(&m.label) => set.extend(m.members.iter().cloned()),
                _ => {
                    set.insert(p.clone());
                }
            }
        }
        set
    }

    pub fn apply(&self, records: &[TripRecord]) -> Vec<TripRecord> {
        let partners = self.partner_set();
        records
            .iter()
            .filter(|r| partners.is_empty() || partners.contains(&r.partner))
            .filter(|r| self.truck.as_deref().map_or(true, |t| r.dump_truck == t))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyReport {
    pub rows: Vec<HourBucketRow>,
    pub missing_time: usize,
    pub warning: ParseWarning,
}

/// Group trips inside `range` by (`unit`, hour of dump time).
///
/// Rows without a dump time are dropped. Rows whose date + time does not form
/// a valid timestamp are dropped too and counted in `warning`; they never
/// land in hour 0. `avg_ritase` divides the trip count by the number of days
/// in `range`.
pub fn bucket_by_hour(records: &[TripRecord], unit: PeriodUnit, range: DateRange) -> HourlyReport {
    #[derive(Default)]
    struct Acc {
        tonnage: f64,
        trips: usize,
    }

    let mut missing_time = 0usize;
    let mut rejected = 0usize;
    let mut buckets: BTreeMap<(PeriodKey, u32), Acc> = BTreeMap::new();
    for r in records.iter().filter(|r| range.contains(r.date)) {
        let Some(raw) = r.dump_time.as_deref() else {
            missing_time += 1;
            continue;
        };
        let Some(time) = parse_time_safe(raw) else {
            rejected += 1;
            continue;
        };
        let stamp = r.date.and_time(time);
        let e = buckets
            .entry((PeriodKey::of(stamp.date(), unit), stamp.hour()))
            .or_default();
        e.tonnage += r.tonnage;
        e.trips += 1;
    }

    let warning = ParseWarning {
        field: "jam dumping",
        rejected,
    };
    if !warning.is_empty() {
        warn!(%warning, "dropped rows from hourly analysis");
    }

    let days = range.days().max(1) as f64;
    let rows: Vec<HourBucketRow> = buckets
        .into_iter()
        .map(|((key, hour), acc)| HourBucketRow {
            period: key.to_string(),
            hour,
            total_tonase: round2(acc.tonnage),
            total_ritase: acc.trips,
            avg_ritase: round2(acc.trips as f64 / days),
        })
        .collect();
    debug!(buckets = rows.len(), missing_time, "bucketed dump times");

    HourlyReport {
        rows,
        missing_time,
        warning,
    }
}
