// Report configuration: category lists, summary-row rules, leaderboard size
// and where target maps are stored. Every field has a default, so a config
// file only needs the keys it changes.
use crate::error::Result;
use crate::reports::{LeaderboardConfig, MergedGroup, SummaryRows};
use crate::targets::TargetDefault;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

const RAKOR_CATEGORIES: [&str; 7] = [
    "FOB MV",
    "Rehandling Blok Timur",
    "Rehandling Antar Stock Blok Barat",
    "Rehandling Antar Stock Blok Timur",
    "Rehandling Blok Barat",
    "Housekeeping",
    "Rehandling Pengiriman Konsumen",
];
const SGJ_MEMBERS: [&str; 4] = ["SGJ1", "SGJ2", "SGJ3", "SPARE"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Status categories offered for monthly (rakor) targets.
    pub rakor_categories: Vec<String>,
    pub rakor_default: TargetDefault,
    pub rakor_excluded_from_total: Vec<String>,
    pub partner_default: TargetDefault,
    pub partner_merge: MergedGroup,
    pub shift_default: TargetDefault,
    pub partner_aliases: BTreeMap<String, String>,
    pub leaderboard_size: usize,
    pub rakor_targets_file: PathBuf,
    pub partner_targets_file: PathBuf,
    pub shift_targets_file: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            rakor_categories: RAKOR_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            rakor_default: TargetDefault::ObservedActual,
            rakor_excluded_from_total: vec!["Housekeeping".to_string()],
            partner_default: TargetDefault::Fixed(0.0),
            partner_merge: MergedGroup {
                label: "SGJ Total".to_string(),
                members: SGJ_MEMBERS.iter().map(|s| s.to_string()).collect(),
            },
            shift_default: TargetDefault::ObservedActual,
            partner_aliases: SGJ_MEMBERS
                .iter()
                .map(|s| (s.to_string(), "SGJ".to_string()))
                .collect(),
            leaderboard_size: 10,
            rakor_targets_file: PathBuf::from("rakor_targets.json"),
            partner_targets_file: PathBuf::from("spph_mitra_targets.json"),
            shift_targets_file: PathBuf::from("shift_targets.json"),
            output_dir: PathBuf::from("."),
        }
    }
}

impl ReportConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)?;
        let cfg: ReportConfig = serde_json::from_str(&s)?;
        info!(path = %path.display(), "loaded report config");
        Ok(cfg)
    }

    pub fn rakor_summary(&self) -> SummaryRows {
        SummaryRows {
            merged: None,
            total_label: "Total".to_string(),
            excluded_from_total: self.rakor_excluded_from_total.clone(),
        }
    }

    pub fn partner_summary(&self) -> SummaryRows {
        SummaryRows {
            merged: Some(self.partner_merge.clone()),
            total_label: "Total".to_string(),
            excluded_from_total: Vec::new(),
        }
    }

    pub fn shift_summary(&self) -> SummaryRows {
        SummaryRows::default()
    }

    pub fn leaderboard(&self) -> LeaderboardConfig {
        LeaderboardConfig {
            size: self.leaderboard_size,
            partner_aliases: self.partner_aliases.clone(),
        }
    }
}
