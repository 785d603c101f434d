use crate::error::{ReportError, Result};
use crate::util::display_2dp;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tabled::Tabled;

/// One parsed sheet row keyed by normalized (trimmed, lowercased) column label.
pub type RawRow = HashMap<String, String>;

/// One haulage event after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripRecord {
    #[serde(rename = "date")]
    pub date: NaiveDate,
    #[serde(rename = "shift")]
    pub shift: String,
    #[serde(rename = "dump truck")]
    pub dump_truck: String,
    #[serde(rename = "exca")]
    pub excavator: String,
    #[serde(rename = "loading point")]
    pub loading_point: String,
    #[serde(rename = "dumping point")]
    pub dumping_point: String,
    #[serde(rename = "status")]
    pub status: String,
    #[serde(rename = "spph")]
    pub partner: String,
    #[serde(rename = "nama operator")]
    pub operator: String,
    #[serde(rename = "tonase")]
    pub tonnage: f64,
    #[serde(rename = "jam dumping")]
    pub dump_time: Option<String>,
}

/// Categorical columns a table can be filtered or grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Shift,
    DumpTruck,
    Excavator,
    LoadingPoint,
    DumpingPoint,
    Status,
    Partner,
    Operator,
}

impl Dimension {
    pub fn value<'a>(&self, r: &'a TripRecord) -> &'a str {
        match self {
            Dimension::Shift => &r.shift,
            Dimension::DumpTruck => &r.dump_truck,
            Dimension::Excavator => &r.excavator,
            Dimension::LoadingPoint => &r.loading_point,
            Dimension::DumpingPoint => &r.dumping_point,
            Dimension::Status => &r.status,
            Dimension::Partner => &r.partner,
            Dimension::Operator => &r.operator,
        }
    }

    /// Normalized column label this dimension is read from.
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Shift => "shift",
            Dimension::DumpTruck => "dump truck",
            Dimension::Excavator => "exca",
            Dimension::LoadingPoint => "loading point",
            Dimension::DumpingPoint => "dumping point",
            Dimension::Status => "status",
            Dimension::Partner => "spph",
            Dimension::Operator => "nama operator",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Inclusive calendar range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ReportError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        self.start <= d && d <= self.end
    }

    pub fn days(&self) -> i64 {
        crate::util::days_inclusive(self.start, self.end)
    }

    /// Overlap of two ranges, `None` when they share no day.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        DateRange::new(self.start.max(other.start), self.end.min(other.end)).ok()
    }
}

/// Target-vs-actual row, one per group plus the synthetic summary rows.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct AggregateRow {
    #[serde(skip)]
    #[tabled(rename = "No")]
    pub no: usize,
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub key: String,
    #[serde(rename = "Tonase")]
    #[tabled(rename = "Tonase", display_with = "display_2dp")]
    pub actual: f64,
    #[serde(rename = "Target")]
    #[tabled(rename = "Target", display_with = "display_2dp")]
    pub target: f64,
    #[serde(rename = "TargetHarian")]
    #[tabled(rename = "TargetHarian", display_with = "display_2dp")]
    pub daily_target: f64,
    #[serde(rename = "TargetMingguan")]
    #[tabled(rename = "TargetMingguan", display_with = "display_2dp")]
    pub weekly_target: f64,
    #[serde(rename = "Difference")]
    #[tabled(rename = "Difference", display_with = "display_2dp")]
    pub difference: f64,
    #[serde(rename = "PercentAchievement")]
    #[tabled(rename = "PercentAchievement", display_with = "display_2dp")]
    pub percent_achievement: f64,
    #[serde(skip)]
    #[tabled(skip)]
    pub synthetic: bool,
}

/// Daily/weekly/monthly decomposition of one target key.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TargetBreakdownRow {
    #[serde(rename = "Dimension")]
    #[tabled(rename = "Dimension")]
    pub dimension: String,
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub key: String,
    #[serde(rename = "TargetHarian")]
    #[tabled(rename = "TargetHarian", display_with = "display_2dp")]
    pub daily: f64,
    #[serde(rename = "TargetMingguan")]
    #[tabled(rename = "TargetMingguan", display_with = "display_2dp")]
    pub weekly: f64,
    #[serde(rename = "TargetBulanan")]
    #[tabled(rename = "TargetBulanan", display_with = "display_2dp")]
    pub monthly: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct HourBucketRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "Hour")]
    #[tabled(rename = "Hour")]
    pub hour: u32,
    #[serde(rename = "TotalTonase")]
    #[tabled(rename = "TotalTonase", display_with = "display_2dp")]
    pub total_tonase: f64,
    #[serde(rename = "TotalRitase")]
    #[tabled(rename = "TotalRitase")]
    pub total_ritase: usize,
    #[serde(rename = "AvgRitase")]
    #[tabled(rename = "AvgRitase", display_with = "display_2dp")]
    pub avg_ritase: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RankCategory {
    #[serde(rename = "Top Highest")]
    TopHighest,
    #[serde(rename = "Top Lowest")]
    TopLowest,
    #[serde(rename = "Outside Top")]
    OutsideTop,
}

impl fmt::Display for RankCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RankCategory::TopHighest => "Top Highest",
            RankCategory::TopLowest => "Top Lowest",
            RankCategory::OutsideTop => "Outside Top",
        };
        f.write_str(s)
    }
}

/// Row of the full operator listing.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct OperatorRankRow {
    #[serde(skip)]
    #[tabled(rename = "No")]
    pub no: usize,
    #[serde(rename = "OperatorMitra")]
    #[tabled(rename = "OperatorMitra")]
    pub operator_mitra: String,
    #[serde(rename = "TotalRitase")]
    #[tabled(rename = "TotalRitase")]
    pub total_ritase: usize,
    #[serde(rename = "Kategori")]
    #[tabled(rename = "Kategori")]
    pub category: RankCategory,
}

/// Entry of a top or bottom leaderboard, labelled with its podium tier.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TierEntry {
    #[serde(rename = "OperatorMitra")]
    #[tabled(rename = "OperatorMitra")]
    pub operator_mitra: String,
    #[serde(rename = "TotalRitase")]
    #[tabled(rename = "TotalRitase")]
    pub total_ritase: usize,
    #[serde(rename = "Tier")]
    #[tabled(rename = "Tier")]
    pub tier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub total_trips: usize,
    pub total_tonase: f64,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub target_period_days: i64,
    pub rakor_total_target: f64,
    pub rakor_total_actual: f64,
    pub rakor_achievement_pct: f64,
    pub rejected_dump_times: usize,
}
