// End-to-end: upload file -> normalize -> filter -> targets -> tables -> export.

use chrono::NaiveDate;
use rehandling_report::config::ReportConfig;
use rehandling_report::dashboard::{self, DashboardRequest};
use rehandling_report::loader;
use rehandling_report::logging;
use rehandling_report::targets::{Period, TargetStore};
use rehandling_report::types::{DateRange, Dimension, RankCategory};
use rehandling_report::ReportError;
use std::io::Write;
use std::path::Path;
use tempfile::{tempdir, Builder};

const TRIPS: &str = "\
Date,Shift,Dump Truck,Exca,Loading Point,Dumping Point,Status,SPPH,Nama Operator,Tonase,Jam Dumping
2024-09-01,1,DT01,EX01,ROM 1,Jetty,FOB MV,SGJ1,Andi,100,07:10
2024-09-01,1,DT02,EX01,ROM 1,Jetty,FOB MV,SGJ2,Budi,50,07:40
2024-09-01,2,DT03,EX02,ROM 2,Stock Barat,Housekeeping,MBS,Citra,30,25:99
2024-09-02,2,DT01,EX02,ROM 2,Stock Barat,Rehandling Blok Barat,SPARE,Andi,40,19:05
2024-09-03,1,DT02,EX01,ROM 1,Jetty,FOB MV,MBS,Dedi,60,
";

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
}

fn write_upload(dir: &Path, suffix: &str, body: &str) -> std::path::PathBuf {
    let mut file = Builder::new().suffix(suffix).tempfile_in(dir).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    let (_, path) = file.keep().unwrap();
    path
}

fn config_in(dir: &Path) -> ReportConfig {
    ReportConfig {
        rakor_targets_file: dir.join("rakor_targets.json"),
        partner_targets_file: dir.join("spph_mitra_targets.json"),
        shift_targets_file: dir.join("shift_targets.json"),
        output_dir: dir.join("out"),
        ..ReportConfig::default()
    }
}

#[test]
fn full_pipeline_exports_every_table() {
    logging::init_test();
    let dir = tempdir().unwrap();
    let upload = write_upload(dir.path(), ".csv", TRIPS);
    let cfg = config_in(dir.path());

    let (records, load_report) = loader::load_and_clean(&upload).unwrap();
    assert_eq!(load_report.loaded_rows, 5);

    let range = DateRange::new(d(1), d(3)).unwrap();
    let mut request = DashboardRequest::new(range);
    request.period = Period::new(d(1), d(30));
    request.rakor_edits = vec![("FOB MV".to_string(), 300.0), ("Housekeeping".to_string(), 10.0)];
    request.partner_edits = vec![("SGJ1".to_string(), 120.0), ("SGJ2".to_string(), 80.0)];

    let dash = dashboard::build(&records, &request, &cfg).unwrap();

    // 7 configured rakor categories observed: FOB MV, Housekeeping, Rehandling Blok Barat
    let fob = dash.rakor.iter().find(|r| r.key == "FOB MV").unwrap();
    assert_eq!((fob.actual, fob.target, fob.difference), (210.0, 300.0, 90.0));
    assert_eq!(fob.percent_achievement, 70.0);
    assert_eq!(fob.daily_target, 10.0);
    assert_eq!(fob.weekly_target, 70.0);
    let barat = dash.rakor.iter().find(|r| r.key == "Rehandling Blok Barat").unwrap();
    // unset target defaults to the observed actual
    assert_eq!((barat.actual, barat.target, barat.percent_achievement), (40.0, 40.0, 100.0));
    let total = dash.rakor.last().unwrap();
    assert_eq!(total.key, "Total");
    assert_eq!((total.actual, total.target), (250.0, 340.0));

    let sgj = dash.partner.iter().find(|r| r.key == "SGJ Total").unwrap();
    assert_eq!((sgj.actual, sgj.target), (190.0, 200.0));
    assert_eq!(dash.partner.len(), 4 + 2);

    assert_eq!(dash.hourly.warning.rejected, 1);
    assert_eq!(dash.hourly.missing_time, 1);
    assert_eq!(dash.hourly.rows.len(), 2);
    assert_eq!(dash.summary.rejected_dump_times, 1);

    // overall figures cover every status group, Housekeeping included
    assert_eq!(dash.summary.rakor_total_target, 350.0);
    assert_eq!(dash.summary.rakor_total_actual, 280.0);
    assert_eq!(dash.summary.rakor_achievement_pct, 80.0);

    let andi = dash
        .leaderboard
        .listing
        .iter()
        .find(|r| r.operator_mitra == "Andi (SGJ)")
        .unwrap();
    assert_eq!(andi.total_ritase, 2);
    assert_eq!(andi.category, RankCategory::TopHighest);

    let written = dashboard::export(&dash, &cfg.output_dir).unwrap();
    assert_eq!(written.len(), 8);
    assert!(written.iter().all(|p| p.exists()));

    let data_csv = std::fs::read_to_string(cfg.output_dir.join(dashboard::DATA_FILE)).unwrap();
    assert!(data_csv.starts_with("date,shift,dump truck,exca"));
    assert_eq!(data_csv.lines().count(), 6);
}

#[test]
fn targets_persist_between_runs() {
    let dir = tempdir().unwrap();
    let upload = write_upload(dir.path(), ".csv", TRIPS);
    let cfg = config_in(dir.path());
    let (records, _) = loader::load_and_clean(&upload).unwrap();
    let range = DateRange::new(d(1), d(3)).unwrap();

    let mut first = DashboardRequest::new(range);
    first.rakor_edits = vec![("FOB MV".to_string(), 420.0)];
    dashboard::build(&records, &first, &cfg).unwrap();

    let second = DashboardRequest::new(range);
    let dash = dashboard::build(&records, &second, &cfg).unwrap();
    assert_eq!(dash.rakor_targets.get("FOB MV"), Some(420.0));

    let stored = TargetStore::new(&cfg.rakor_targets_file).load().unwrap();
    assert_eq!(stored.len(), cfg.rakor_categories.len());
}

#[test]
fn categorical_filters_narrow_the_tables() {
    let dir = tempdir().unwrap();
    let upload = write_upload(dir.path(), ".csv", TRIPS);
    let cfg = config_in(dir.path());
    let (records, _) = loader::load_and_clean(&upload).unwrap();

    let mut request = DashboardRequest::new(DateRange::new(d(1), d(3)).unwrap());
    request.selection.select(Dimension::Shift, ["1"]);
    let dash = dashboard::build(&records, &request, &cfg).unwrap();
    assert_eq!(dash.filtered.len(), 3);
    assert!(dash.shift.iter().filter(|r| !r.synthetic).all(|r| r.key == "1"));
}

#[test]
fn fatal_errors_stop_the_pipeline() {
    let dir = tempdir().unwrap();
    let cfg = config_in(dir.path());

    let no_date = write_upload(dir.path(), ".csv", "shift,tonase\n1,10\n");
    assert!(matches!(
        loader::load_and_clean(&no_date),
        Err(ReportError::Schema { .. })
    ));

    let pdf = write_upload(dir.path(), ".pdf", "%PDF");
    assert!(matches!(
        loader::load_and_clean(&pdf),
        Err(ReportError::UnsupportedFormat(_))
    ));

    let upload = write_upload(dir.path(), ".csv", TRIPS);
    let (records, _) = loader::load_and_clean(&upload).unwrap();
    let mut request = DashboardRequest::new(DateRange::new(d(1), d(3)).unwrap());
    request.period = Period::new(d(10), d(1));
    request.rakor_edits = vec![("FOB MV".to_string(), 999.0)];
    request.shift_edits = vec![("1".to_string(), 500.0)];
    assert!(matches!(
        dashboard::build(&records, &request, &cfg),
        Err(ReportError::InvalidPeriod { days: -8 })
    ));

    // nothing was persisted for the rejected request
    assert!(!cfg.rakor_targets_file.exists());
    assert!(!cfg.partner_targets_file.exists());
    assert!(!cfg.shift_targets_file.exists());
    assert!(TargetStore::new(&cfg.rakor_targets_file).load().unwrap().is_empty());
}

#[test]
fn hourly_range_cannot_widen_the_filter_range() {
    let dir = tempdir().unwrap();
    let upload = write_upload(dir.path(), ".csv", TRIPS);
    let cfg = config_in(dir.path());
    let (records, _) = loader::load_and_clean(&upload).unwrap();

    let mut request = DashboardRequest::new(DateRange::new(d(1), d(3)).unwrap());
    request.hourly_range = Some(DateRange::new(d(1), d(30)).unwrap());
    let dash = dashboard::build(&records, &request, &cfg).unwrap();
    let morning = dash.hourly.rows.iter().find(|r| r.hour == 7).unwrap();
    // two trips over the three filtered days, not thirty
    assert_eq!(morning.total_ritase, 2);
    assert_eq!(morning.avg_ritase, 0.67);

    request.hourly_range = Some(DateRange::new(d(2), d(2)).unwrap());
    let dash = dashboard::build(&records, &request, &cfg).unwrap();
    assert_eq!(dash.hourly.rows.len(), 1);
    assert_eq!(dash.hourly.rows[0].hour, 19);
    assert_eq!(dash.hourly.rows[0].avg_ritase, 1.0);

    request.hourly_range = Some(DateRange::new(d(20), d(25)).unwrap());
    let dash = dashboard::build(&records, &request, &cfg).unwrap();
    assert!(dash.hourly.rows.is_empty());
}

#[test]
fn latin1_upload_is_decoded() {
    let dir = tempdir().unwrap();
    let mut bytes = b"date,status,tonase,nama operator\n2024-09-01,FOB MV,10,Jos".to_vec();
    bytes.push(0xe9);
    bytes.push(b'\n');
    let mut file = Builder::new().suffix(".csv").tempfile_in(dir.path()).unwrap();
    file.write_all(&bytes).unwrap();

    let (records, _) = loader::load_and_clean(file.path()).unwrap();
    assert_eq!(records[0].operator, "José");
}
