// Target-vs-actual aggregation and the operator leaderboard.
use crate::targets::{Allocator, RowTarget, TargetMap};
use crate::types::{AggregateRow, Dimension, OperatorRankRow, RankCategory, TierEntry, TripRecord};
use crate::util::{average, round2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Several category keys reported together as one extra row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedGroup {
    pub label: String,
    pub members: Vec<String>,
}

impl MergedGroup {
    pub fn contains(&self, key: &str) -> bool {
        self.members.iter().any(|m| m == key)
    }
}

/// Synthetic rows appended to an aggregate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryRows {
    pub merged: Option<MergedGroup>,
    pub total_label: String,
    pub excluded_from_total: Vec<String>,
}

impl Default for SummaryRows {
    fn default() -> Self {
        Self {
            merged: None,
            total_label: "Total".to_string(),
            excluded_from_total: Vec::new(),
        }
    }
}

impl SummaryRows {
    /// Number of rows `aggregate` appends after the group rows.
    pub fn synthetic_count(&self) -> usize {
        1 + usize::from(self.merged.is_some())
    }
}

fn achievement_row(key: String, actual: f64, target: RowTarget, synthetic: bool) -> AggregateRow {
    let (difference, percent_achievement) = if target.monthly > 0.0 {
        (
            round2((target.monthly - actual).max(0.0)),
            round2(actual / target.monthly * 100.0),
        )
    } else {
        (0.0, 0.0)
    };
    AggregateRow {
        no: 0,
        key,
        actual: round2(actual),
        target: round2(target.monthly),
        daily_target: round2(target.daily),
        weekly_target: round2(target.weekly),
        difference,
        percent_achievement,
        synthetic,
    }
}

/// Group `records` by `dim`, sum tonnage, and compare against the per-row
/// targets (index-aligned with `records`).
///
/// Each group takes the target of its first row rather than a sum: targets
/// are assigned per category, so rows of one group normally agree. When they
/// do not, the first row still decides.
///
/// Groups come out in key order, followed by the merged row (if configured)
/// and the total row. The total excludes `excluded_from_total`, sums actual,
/// target and difference, and averages the percent achievement.
pub fn aggregate(
    records: &[TripRecord],
    row_targets: &[RowTarget],
    dim: Dimension,
    alloc: &Allocator,
    summary: &SummaryRows,
) -> Vec<AggregateRow> {
    #[derive(Clone, Copy)]
    struct Acc {
        actual: f64,
        target: RowTarget,
        mixed: bool,
    }

    if records.len() != row_targets.len() {
        warn!(
            records = records.len(),
            targets = row_targets.len(),
            "row targets do not line up with records; extra rows ignored"
        );
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for (r, t) in records.iter().zip(row_targets) {
        let acc = groups.entry(dim.value(r)).or_insert(Acc {
            actual: 0.0,
            target: *t,
            mixed: false,
        });
        acc.actual += r.tonnage;
        acc.mixed |= acc.target.monthly != t.monthly;
    }

    let mut rows: Vec<AggregateRow> = groups
        .iter()
        .map(|(key, acc)| {
            if acc.mixed {
                debug!(group = %key, dimension = %dim, "rows disagree on target; keeping the first");
            }
            achievement_row(key.to_string(), acc.actual, acc.target, false)
        })
        .collect();

    if let Some(merged) = &summary.merged {
        let (actual, target) = groups
            .iter()
            .filter(|(key, _)| merged.contains(key))
            .fold((0.0, 0.0), |(a, t), (_, acc)| (a + acc.actual, t + acc.target.monthly));
        rows.push(achievement_row(merged.label.clone(), actual, alloc.split(target), true));
    }

    let counted: Vec<&AggregateRow> = rows
        .iter()
        .filter(|r| !r.synthetic && !summary.excluded_from_total.contains(&r.key))
        .collect();
    let pct: Vec<f64> = counted.iter().map(|r| r.percent_achievement).collect();
    let total = AggregateRow {
        no: 0,
        key: summary.total_label.clone(),
        actual: round2(counted.iter().map(|r| r.actual).sum()),
        target: round2(counted.iter().map(|r| r.target).sum()),
        daily_target: round2(counted.iter().map(|r| r.daily_target).sum()),
        weekly_target: round2(counted.iter().map(|r| r.weekly_target).sum()),
        difference: round2(counted.iter().map(|r| r.difference).sum()),
        percent_achievement: round2(average(&pct)),
        synthetic: true,
    };
    rows.push(total);

    for (idx, row) in rows.iter_mut().enumerate() {
        row.no = idx + 1;
    }
    rows
}

/// Allocate targets from `targets` onto `records` and aggregate in one step.
pub fn compare_to_targets(
    records: &[TripRecord],
    dim: Dimension,
    targets: &TargetMap,
    alloc: &Allocator,
    summary: &SummaryRows,
) -> Vec<AggregateRow> {
    let row_targets = alloc.assign(records, dim, targets);
    aggregate(records, &row_targets, dim, alloc, summary)
}

/// Leaderboard settings: size of the top/bottom lists and partner codes
/// folded into one canonical code before counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    pub size: usize,
    pub partner_aliases: BTreeMap<String, String>,
}

impl LeaderboardConfig {
    pub fn canonical_partner<'a>(&'a self, partner: &'a str) -> &'a str {
        self.partner_aliases
            .get(partner)
            .map(String::as_str)
            .unwrap_or(partner)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leaderboard {
    pub top: Vec<TierEntry>,
    pub bottom: Vec<TierEntry>,
    pub listing: Vec<OperatorRankRow>,
}

fn tier_label(pos: usize, size: usize) -> String {
    match pos {
        0..=2 => format!("Top {}", pos + 1),
        _ => format!("Top 4-{}", size),
    }
}

/// Rank operators by trip count (ritase).
///
/// Trips are counted per (operator, canonical partner). `partners`, when
/// non-empty, keeps only those canonical partner codes. The top list is the
/// first `size` entries by descending count; the bottom list is the last
/// `size` non-zero entries that are not already in the top list, shown in
/// ascending order. Every entry of the listing is classified exactly once.
pub fn rank_operators(
    records: &[TripRecord],
    partners: &BTreeSet<String>,
    cfg: &LeaderboardConfig,
) -> Leaderboard {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for r in records {
        if r.operator.is_empty() {
            continue;
        }
        let partner = cfg.canonical_partner(&r.partner);
        if !partners.is_empty() && !partners.contains(partner) {
            continue;
        }
        *counts.entry((r.operator.as_str(), partner)).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|((op, partner), n)| (format!("{} ({})", op, partner), n))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let k = cfg.size;
    let top_end = k.min(ranked.len());
    let rest: Vec<usize> = (top_end..ranked.len()).filter(|&i| ranked[i].1 > 0).collect();
    let bottom_idx: Vec<usize> = rest[rest.len().saturating_sub(k)..].to_vec();
    let bottom_set: HashSet<usize> = bottom_idx.iter().copied().collect();

    let top = ranked[..top_end]
        .iter()
        .enumerate()
        .map(|(pos, (label, n))| TierEntry {
            operator_mitra: label.clone(),
            total_ritase: *n,
            tier: tier_label(pos, k),
        })
        .collect();
    let bottom = bottom_idx
        .iter()
        .rev()
        .enumerate()
        .map(|(pos, &i)| TierEntry {
            operator_mitra: ranked[i].0.clone(),
            total_ritase: ranked[i].1,
            tier: tier_label(pos, k),
        })
        .collect();
    let listing = ranked
        .iter()
        .enumerate()
        .map(|(i, (label, n))| OperatorRankRow {
            no: i + 1,
            operator_mitra: label.clone(),
            total_ritase: *n,
            category: if i < top_end {
                RankCategory::TopHighest
            } else if bottom_set.contains(&i) {
                RankCategory::TopLowest
            } else {
                RankCategory::OutsideTop
            },
        })
        .collect();

    Leaderboard { top, bottom, listing }
}
