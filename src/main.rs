// Entry point and high-level CLI flow.
//
// - Option [1] loads and normalizes the trip table, printing diagnostics.
// - Option [2] filters, compares against targets, exports every table and
//   prints previews.
// - `--batch` runs both once and exits.
use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use once_cell::sync::Lazy;
use rehandling_report::config::ReportConfig;
use rehandling_report::dashboard::{self, DashboardRequest};
use rehandling_report::filter;
use rehandling_report::hourly::PeriodUnit;
use rehandling_report::loader::{self, LoadReport};
use rehandling_report::targets::Period;
use rehandling_report::types::{DateRange, Dimension, TripRecord};
use rehandling_report::{logging, output, util};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::info;

// Loaded table kept between menu choices so reports can be regenerated
// without re-reading the upload.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { data: None }));

struct AppState {
    data: Option<Vec<TripRecord>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "rehandling-report",
    version,
    about = "Coal rehandling haulage dashboard: targets vs actual, dump-hour and operator reports"
)]
struct Cli {
    /// Trip table to load (.csv, .txt, .xlsx, .xls)
    #[arg(short, long)]
    input: PathBuf,

    /// JSON report configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First day to include (defaults to earliest date in the data)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day to include (defaults to latest date in the data)
    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long = "shift")]
    shifts: Vec<String>,

    #[arg(long = "truck")]
    trucks: Vec<String>,

    #[arg(long = "exca")]
    excavators: Vec<String>,

    #[arg(long = "loading-point")]
    loading_points: Vec<String>,

    #[arg(long = "dumping-point")]
    dumping_points: Vec<String>,

    #[arg(long = "status")]
    statuses: Vec<String>,

    #[arg(long = "spph")]
    partners: Vec<String>,

    /// Monthly target for a status category, as KEY=TONNES
    #[arg(long = "target", value_parser = parse_target_edit)]
    rakor_targets: Vec<(String, f64)>,

    /// Target for a SPPH/mitra code, as KEY=TONNES
    #[arg(long = "spph-target", value_parser = parse_target_edit)]
    partner_targets: Vec<(String, f64)>,

    /// Target for a shift, as KEY=TONNES
    #[arg(long = "shift-target", value_parser = parse_target_edit)]
    shift_targets: Vec<(String, f64)>,

    /// Target period start (defaults to the filter start)
    #[arg(long)]
    period_start: Option<NaiveDate>,

    /// Target period end (defaults to the filter end)
    #[arg(long)]
    period_end: Option<NaiveDate>,

    /// Dump-hour bucketing: daily, weekly or monthly
    #[arg(long, default_value = "daily")]
    granularity: PeriodUnit,

    /// SPPH codes for the dump-hour analysis; the merged label selects its members
    #[arg(long = "hourly-spph")]
    hourly_partners: Vec<String>,

    #[arg(long = "hourly-truck")]
    hourly_truck: Option<String>,

    /// Canonical SPPH codes for the operator leaderboard
    #[arg(long = "operator-spph")]
    leaderboard_partners: Vec<String>,

    /// Directory for exported files (overrides the config)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Load and generate once, without the menu
    #[arg(long)]
    batch: bool,
}

fn parse_target_edit(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected KEY=TONNES, got '{}'", s))?;
    let value = util::parse_f64_safe(Some(value))
        .ok_or_else(|| format!("'{}' is not a number", value))?;
    if value < 0.0 {
        return Err(format!("target for '{}' must not be negative", key.trim()));
    }
    Ok((key.trim().to_string(), value))
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
///
/// Returns `None` once stdin is closed.
fn read_choice() -> Option<String> {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        if io::stdin().read_line(&mut buf).unwrap_or(0) == 0 {
            return false;
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn print_load_report(report: &LoadReport) {
    println!(
        "Processing dataset... ({} rows read, {} kept)",
        util::format_int(report.total_rows),
        util::format_int(report.loaded_rows)
    );
    if report.invalid_dates > 0 || report.negative_tonnage > 0 {
        println!(
            "Note: {} rows skipped for unparseable dates, {} for negative tonnage.",
            util::format_int(report.invalid_dates),
            util::format_int(report.negative_tonnage)
        );
    }
    if report.missing_tonnage > 0 {
        println!(
            "Info: {} rows had no tonnage and count as zero.",
            util::format_int(report.missing_tonnage)
        );
    }
    println!();
}

/// Handle option [1]: load and normalize the upload into `APP_STATE`.
fn handle_load(cli: &Cli) -> anyhow::Result<()> {
    let (data, report) = loader::load_and_clean(&cli.input)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;
    print_load_report(&report);
    let mut state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    state.data = Some(data);
    Ok(())
}

fn build_request(cli: &Cli, data: &[TripRecord]) -> anyhow::Result<DashboardRequest> {
    let Some(bounds) = filter::date_bounds(data) else {
        bail!("the loaded table has no rows");
    };
    let range = DateRange::new(
        cli.start.unwrap_or(bounds.start()),
        cli.end.unwrap_or(bounds.end()),
    )?;

    let mut request = DashboardRequest::new(range);
    let selections = [
        (Dimension::Shift, &cli.shifts),
        (Dimension::DumpTruck, &cli.trucks),
        (Dimension::Excavator, &cli.excavators),
        (Dimension::LoadingPoint, &cli.loading_points),
        (Dimension::DumpingPoint, &cli.dumping_points),
        (Dimension::Status, &cli.statuses),
        (Dimension::Partner, &cli.partners),
    ];
    for (dim, values) in selections {
        request.selection.select(dim, values.iter().cloned());
    }
    request.period = Period::new(
        cli.period_start.unwrap_or(range.start()),
        cli.period_end.unwrap_or(range.end()),
    );
    request.rakor_edits = cli.rakor_targets.clone();
    request.partner_edits = cli.partner_targets.clone();
    request.shift_edits = cli.shift_targets.clone();
    request.hourly_unit = cli.granularity;
    request.hourly_partners = cli.hourly_partners.iter().cloned().collect();
    request.hourly_truck = cli.hourly_truck.clone();
    request.leaderboard_partners = cli.leaderboard_partners.iter().cloned().collect();
    Ok(request)
}

/// Handle option [2]: build every table, export it and print previews.
fn handle_generate_reports(cli: &Cli, cfg: &ReportConfig) -> anyhow::Result<()> {
    let data = {
        let state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        state.data.clone()
    };
    let Some(data) = data else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return Ok(());
    };

    let request = build_request(cli, &data)?;
    let dash = dashboard::build(&data, &request, cfg)?;
    let out_dir = cli.out_dir.clone().unwrap_or_else(|| cfg.output_dir.clone());
    let written = dashboard::export(&dash, &out_dir)?;
    info!(files = written.len(), "reports generated");

    println!("Generating reports...");
    println!(
        "Target period: {} day(s), {} to {}\n",
        dash.summary.target_period_days, request.period.start, request.period.end
    );

    output::preview_table("Target Breakdown (daily / weekly / period)", None, &dash.breakdown, 30);
    output::preview_table("Target Rakor vs Actual Comparison", None, &dash.rakor, 20);
    output::preview_table("Target SPPH/Mitra vs Actual Comparison", None, &dash.partner, 20);
    output::preview_table("Target Shift vs Actual Comparison", None, &dash.shift, 10);

    if !dash.hourly.warning.is_empty() {
        println!("Warning: {}.", dash.hourly.warning);
    }
    output::preview_table(
        "Jam Dumping Analysis",
        Some("total tonase, ritase and average ritase per day"),
        &dash.hourly.rows,
        24,
    );

    output::preview_table("Top Operators by Ritase (highest)", None, &dash.leaderboard.top, cfg.leaderboard_size);
    output::preview_table("Top Operators by Ritase (lowest)", None, &dash.leaderboard.bottom, cfg.leaderboard_size);
    output::preview_table("Operator Categories", None, &dash.leaderboard.listing, 20);

    println!("Summary Stats ({}):", dashboard::SUMMARY_FILE);
    println!(
        "{{\"total_tonase\": {}, \"rakor_achievement_pct\": {}}}",
        util::format_number(dash.summary.total_tonase, 2),
        util::format_number(dash.summary.rakor_achievement_pct, 2)
    );
    println!("(Full tables exported to {})\n", out_dir.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => ReportConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => ReportConfig::default(),
    };

    if cli.batch {
        handle_load(&cli)?;
        return handle_generate_reports(&cli, &cfg);
    }

    loop {
        println!("Rehandling Batubara Dashboard");
        println!("[1] Load the file");
        println!("[2] Generate Reports\n");
        let Some(choice) = read_choice() else {
            break;
        };
        match choice.as_str() {
            "1" => {
                if let Err(e) = handle_load(&cli) {
                    eprintln!("{:#}\n", e);
                }
            }
            "2" => {
                println!();
                if let Err(e) = handle_generate_reports(&cli, &cfg) {
                    eprintln!("{:#}\n", e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
    Ok(())
}
