// One full recomputation: filter, resolve and persist targets, aggregate,
// bucket dump times, rank operators, and export every table.
use crate::config::ReportConfig;
use crate::error::Result;
use crate::filter::{self, FilterSelection};
use crate::hourly::{bucket_by_hour, HourlyReport, HourlySelection, PeriodUnit};
use crate::output::{write_csv, write_json};
use crate::reports::{compare_to_targets, rank_operators, Leaderboard};
use crate::targets::{
    observed_totals, resolve_targets, Allocator, Period, TargetDefault, TargetMap, TargetStore,
};
use crate::types::{AggregateRow, DateRange, Dimension, SummaryStats, TargetBreakdownRow, TripRecord};
use crate::util::round2;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DATA_FILE: &str = "rehandling_batubara_data.csv";
pub const RAKOR_FILE: &str = "target_rakor_comparison.csv";
pub const PARTNER_FILE: &str = "target_spph_mitra_comparison.csv";
pub const SHIFT_FILE: &str = "target_shift_comparison.csv";
pub const BREAKDOWN_FILE: &str = "target_breakdown.csv";
pub const HOURLY_FILE: &str = "jam_dumping_analysis.csv";
pub const OPERATOR_FILE: &str = "operator_dump_truck.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// User inputs for one recomputation.
#[derive(Debug, Clone)]
pub struct DashboardRequest {
    pub selection: FilterSelection,
    pub period: Period,
    pub rakor_edits: Vec<(String, f64)>,
    pub partner_edits: Vec<(String, f64)>,
    pub shift_edits: Vec<(String, f64)>,
    pub hourly_unit: PeriodUnit,
    pub hourly_partners: BTreeSet<String>,
    pub hourly_truck: Option<String>,
    /// Narrows the filter's date range for the dump-hour table.
    pub hourly_range: Option<DateRange>,
    pub leaderboard_partners: BTreeSet<String>,
}

impl DashboardRequest {
    /// Everything unselected, target period equal to the filter range.
    pub fn new(range: DateRange) -> Self {
        Self {
            selection: FilterSelection::new(range),
            period: Period::new(range.start(), range.end()),
            rakor_edits: Vec::new(),
            partner_edits: Vec::new(),
            shift_edits: Vec::new(),
            hourly_unit: PeriodUnit::Daily,
            hourly_partners: BTreeSet::new(),
            hourly_truck: None,
            hourly_range: None,
            leaderboard_partners: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub filtered: Vec<TripRecord>,
    pub rakor_targets: TargetMap,
    pub partner_targets: TargetMap,
    pub shift_targets: TargetMap,
    pub breakdown: Vec<TargetBreakdownRow>,
    pub rakor: Vec<AggregateRow>,
    pub partner: Vec<AggregateRow>,
    pub shift: Vec<AggregateRow>,
    pub hourly: HourlyReport,
    pub leaderboard: Leaderboard,
    pub summary: SummaryStats,
}

fn resolve_and_store(
    store: &TargetStore,
    keys: &[String],
    default: TargetDefault,
    observed_from: &[TripRecord],
    dim: Dimension,
    edits: &[(String, f64)],
) -> Result<TargetMap> {
    let stored = store.load()?;
    let observed = observed_totals(observed_from, dim);
    let mut targets = resolve_targets(&stored, keys, default, &observed);
    for (key, value) in edits {
        targets.set(key.clone(), *value);
    }
    store.save(&targets)?;
    Ok(targets)
}

/// Run the whole pipeline over an already-normalized table.
///
/// The target period is validated first, so a rejected request leaves every
/// target store untouched. Target defaults that fall back to observed
/// tonnage use the date-filtered table, before the categorical filters.
pub fn build(records: &[TripRecord], request: &DashboardRequest, cfg: &ReportConfig) -> Result<Dashboard> {
    let alloc = Allocator::for_period(&request.period)?;
    let in_range = filter::apply(records, &FilterSelection::new(request.selection.range));
    let filtered = filter::apply(&in_range, &request.selection);
    info!(total = records.len(), in_range = in_range.len(), filtered = filtered.len(), "filtered trips");

    let rakor_targets = resolve_and_store(
        &TargetStore::new(&cfg.rakor_targets_file),
        &cfg.rakor_categories,
        cfg.rakor_default,
        &in_range,
        Dimension::Status,
        &request.rakor_edits,
    )?;
    let partner_targets = resolve_and_store(
        &TargetStore::new(&cfg.partner_targets_file),
        &filter::unique_values(&filtered, Dimension::Partner),
        cfg.partner_default,
        &in_range,
        Dimension::Partner,
        &request.partner_edits,
    )?;
    let shift_targets = resolve_and_store(
        &TargetStore::new(&cfg.shift_targets_file),
        &filter::unique_values(&in_range, Dimension::Shift),
        cfg.shift_default,
        &in_range,
        Dimension::Shift,
        &request.shift_edits,
    )?;

    let mut breakdown = alloc.breakdown(Dimension::Status, &rakor_targets);
    breakdown.extend(alloc.breakdown(Dimension::Partner, &partner_targets));
    breakdown.extend(alloc.breakdown(Dimension::Shift, &shift_targets));

    let rakor = compare_to_targets(&filtered, Dimension::Status, &rakor_targets, &alloc, &cfg.rakor_summary());
    let partner = compare_to_targets(&filtered, Dimension::Partner, &partner_targets, &alloc, &cfg.partner_summary());
    let shift = compare_to_targets(&filtered, Dimension::Shift, &shift_targets, &alloc, &cfg.shift_summary());

    let hourly_selection = HourlySelection {
        partners: request.hourly_partners.clone(),
        merged: Some(cfg.partner_merge.clone()),
        truck: request.hourly_truck.clone(),
    };
    // Trips are already cut to the filter range, so the hourly range can only narrow it.
    let filter_range = request.selection.range;
    let hourly = match request.hourly_range.map(|r| r.intersect(&filter_range)) {
        None => bucket_by_hour(&hourly_selection.apply(&filtered), request.hourly_unit, filter_range),
        Some(Some(range)) => bucket_by_hour(&hourly_selection.apply(&filtered), request.hourly_unit, range),
        Some(None) => {
            warn!("hourly range lies outside the filter range; no dump-hour rows");
            bucket_by_hour(&[], request.hourly_unit, filter_range)
        }
    };

    let leaderboard = rank_operators(&filtered, &request.leaderboard_partners, &cfg.leaderboard());

    let summary = summarize(&filtered, &rakor, alloc.days(), &hourly);
    Ok(Dashboard {
        filtered,
        rakor_targets,
        partner_targets,
        shift_targets,
        breakdown,
        rakor,
        partner,
        shift,
        hourly,
        leaderboard,
        summary,
    })
}

/// Overall rakor figures sum every status group, including the ones the
/// table's own total row leaves out.
fn summarize(filtered: &[TripRecord], rakor: &[AggregateRow], period_days: i64, hourly: &HourlyReport) -> SummaryStats {
    let groups = rakor.iter().filter(|r| !r.synthetic);
    let (total_target, total_actual) = groups.fold((0.0, 0.0), |(t, a), r| (t + r.target, a + r.actual));
    let (total_target, total_actual) = (round2(total_target), round2(total_actual));
    SummaryStats {
        total_trips: filtered.len(),
        total_tonase: round2(filtered.iter().map(|r| r.tonnage).sum()),
        date_start: filtered.iter().map(|r| r.date).min(),
        date_end: filtered.iter().map(|r| r.date).max(),
        target_period_days: period_days,
        rakor_total_target: total_target,
        rakor_total_actual: total_actual,
        rakor_achievement_pct: if total_target > 0.0 {
            round2(total_actual / total_target * 100.0)
        } else {
            0.0
        },
        rejected_dump_times: hourly.warning.rejected,
    }
}

/// Write every table of `dash` into `dir`; returns the written paths.
pub fn export(dash: &Dashboard, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let path = |name: &str| dir.join(name);

    write_csv(path(DATA_FILE), &dash.filtered)?;
    write_csv(path(RAKOR_FILE), &dash.rakor)?;
    write_csv(path(PARTNER_FILE), &dash.partner)?;
    write_csv(path(SHIFT_FILE), &dash.shift)?;
    write_csv(path(BREAKDOWN_FILE), &dash.breakdown)?;
    write_csv(path(HOURLY_FILE), &dash.hourly.rows)?;
    write_csv(path(OPERATOR_FILE), &dash.leaderboard.listing)?;
    write_json(path(SUMMARY_FILE), &dash.summary)?;

    let written: Vec<PathBuf> = [
        DATA_FILE,
        RAKOR_FILE,
        PARTNER_FILE,
        SHIFT_FILE,
        BREAKDOWN_FILE,
        HOURLY_FILE,
        OPERATOR_FILE,
        SUMMARY_FILE,
    ]
    .iter()
    .map(|&n| path(n))
    .collect();
    info!(dir = %dir.display(), files = written.len(), "exported reports");
    Ok(written)
}
