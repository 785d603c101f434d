// Upload parsing and row normalization.
//
// Files are first read into label-keyed raw rows (CSV as ISO-8859-1, every
// sheet of a workbook concatenated), then normalized into `TripRecord`s.
use crate::error::{ReportError, Result};
use crate::types::{RawRow, TripRecord};
use crate::util::{decode_latin1, parse_date_safe, parse_f64_safe};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DATE_COLUMN: &str = "date";

/// Label variants seen across uploads, mapped onto one canonical label.
const COLUMN_ALIASES: [(&str, &str); 3] = [
    ("dump_truck", "dump truck"),
    ("nama_operator", "nama operator"),
    ("jam_dumping", "jam dumping"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Spreadsheet,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Ok(FileKind::Csv),
            "xlsx" | "xls" => Ok(FileKind::Spreadsheet),
            _ => Err(ReportError::UnsupportedFormat(ext)),
        }
    }
}

/// Parsed upload before typing: normalized header labels (across every
/// sheet) and the non-blank data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn has_column(&self, label: &str) -> bool {
        self.headers.iter().any(|h| h == label)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub invalid_dates: usize,
    pub negative_tonnage: usize,
    pub missing_tonnage: usize,
}

/// Trim and lowercase a column label, then fold known aliases.
pub fn normalize_label(label: &str) -> String {
    let label = label.trim().to_lowercase();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == label)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(label)
}

pub fn load_and_clean<P: AsRef<Path>>(path: P) -> Result<(Vec<TripRecord>, LoadReport)> {
    let path = path.as_ref();
    let kind = FileKind::from_path(path)?;
    if !path.exists() {
        return Err(ReportError::FileNotFound(path.display().to_string()));
    }
    let raw = match kind {
        FileKind::Csv => read_csv_latin1(std::fs::File::open(path)?)?,
        FileKind::Spreadsheet => read_workbook(path)?,
    };
    info!(path = %path.display(), rows = raw.rows.len(), "parsed upload");
    normalize_rows(raw)
}

/// Read a headed CSV, decoding every field as ISO-8859-1.
pub fn read_csv_latin1<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| normalize_label(&decode_latin1(h)))
        .collect();

    let mut rows = Vec::new();
    for result in rdr.byte_records() {
        let record = result?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), decode_latin1(v).trim().to_string()))
            .collect();
        if row.values().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

/// Read every sheet of a workbook; each sheet carries its own header row.
pub fn read_workbook(path: &Path) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ReportError::Excel(e.to_string()))?;
    let sheet_names = workbook.sheet_names().to_owned();
    if sheet_names.is_empty() {
        return Err(ReportError::Excel("workbook has no sheets".to_string()));
    }

    let mut table = RawTable::default();
    for sheet in &sheet_names {
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| ReportError::Excel(e.to_string()))?;
        let mut sheet_rows = range.rows();
        let Some(header_row) = sheet_rows.next() else {
            debug!(sheet = %sheet, "skipping empty sheet");
            continue;
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| normalize_label(&cell.to_string()))
            .collect();
        for h in &headers {
            if !h.is_empty() && !table.has_column(h) {
                table.headers.push(h.clone());
            }
        }
        let before = table.rows.len();
        for data_row in sheet_rows {
            let row: RawRow = headers
                .iter()
                .zip(data_row.iter())
                .map(|(h, cell)| (h.clone(), cell.to_string().trim().to_string()))
                .collect();
            if row.values().all(|v| v.is_empty()) {
                continue;
            }
            table.rows.push(row);
        }
        debug!(sheet = %sheet, rows = table.rows.len() - before, "read sheet");
    }
    Ok(table)
}

/// Validate the schema and turn raw rows into typed trip records.
///
/// Fails with `ReportError::Schema` when the header has no `date` column.
/// A header without data rows gives an empty table. Rows with an
/// unparseable date or a negative tonnage are skipped and counted; a
/// missing tonnage counts as zero.
pub fn normalize_rows(raw: RawTable) -> Result<(Vec<TripRecord>, LoadReport)> {
    if !raw.has_column(DATE_COLUMN) {
        return Err(ReportError::Schema {
            column: DATE_COLUMN.to_string(),
        });
    }

    let mut report = LoadReport {
        total_rows: raw.rows.len(),
        ..LoadReport::default()
    };
    let mut records = Vec::with_capacity(raw.rows.len());
    for row in raw.rows {
        let Some(date) = parse_date_safe(row.get(DATE_COLUMN).map(String::as_str)) else {
            report.invalid_dates += 1;
            continue;
        };
        let tonnage = match parse_f64_safe(row.get("tonase").map(String::as_str)) {
            Some(v) if v < 0.0 => {
                report.negative_tonnage += 1;
                continue;
            }
            Some(v) => v,
            None => {
                report.missing_tonnage += 1;
                0.0
            }
        };
        let dump_time = row
            .get("jam dumping")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        records.push(TripRecord {
            date,
            shift: text(&row, "shift"),
            dump_truck: text(&row, "dump truck"),
            excavator: text(&row, "exca"),
            loading_point: text(&row, "loading point"),
            dumping_point: text(&row, "dumping point"),
            status: text(&row, "status"),
            partner: text(&row, "spph"),
            operator: text(&row, "nama operator"),
            tonnage,
            dump_time,
        });
    }

    report.loaded_rows = records.len();
    if report.invalid_dates > 0 || report.negative_tonnage > 0 {
        warn!(
            invalid_dates = report.invalid_dates,
            negative_tonnage = report.negative_tonnage,
            "skipped rows during normalization"
        );
    }
    Ok((records, report))
}

fn text(row: &HashMap<String, String>, column: &str) -> String {
    row.get(column).map(|s| s.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn csv_rows(input: &[u8]) -> RawTable {
        read_csv_latin1(input).unwrap()
    }

    #[test]
    fn labels_are_trimmed_lowercased_and_aliased() {
        assert_eq!(normalize_label("  Date "), "date");
        assert_eq!(normalize_label("Dump_Truck"), "dump truck");
        assert_eq!(normalize_label("Jam Dumping"), "jam dumping");
    }

    #[test]
    fn normalizes_csv_with_messy_headers() {
        let rows = csv_rows(
            b" Date ,SHIFT,Dump Truck,Status,SPPH,Tonase,Jam Dumping\n\
              2024-09-01,1,DT01,FOB MV,SGJ1,31.5,07:15\n\
              2024-09-01,2,DT02,Housekeeping,MBS,\"1,020.25\",\n",
        );
        let (records, report) = normalize_rows(rows).unwrap();
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.loaded_rows, 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        assert_eq!(records[0].dump_truck, "DT01");
        assert_eq!(records[0].dump_time.as_deref(), Some("07:15"));
        assert_eq!(records[1].tonnage, 1020.25);
        assert_eq!(records[1].dump_time, None);
    }

    #[test]
    fn missing_date_column_is_a_schema_error() {
        let rows = csv_rows(b"shift,tonase\n1,10\n");
        match normalize_rows(rows) {
            Err(ReportError::Schema { column }) => assert_eq!(column, "date"),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn header_only_table_is_empty_not_a_schema_error() {
        let table = csv_rows(b"Date,Status,Tonase\n");
        assert!(table.has_column("date"));
        let (records, report) = normalize_rows(table).unwrap();
        assert!(records.is_empty());
        assert_eq!(report, LoadReport::default());
    }

    #[test]
    fn bad_dates_and_negative_tonnage_are_skipped() {
        let rows = csv_rows(b"date,tonase\nnope,10\n2024-09-02,-4\n2024-09-03,\n");
        let (records, report) = normalize_rows(rows).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(report.invalid_dates, 1);
        assert_eq!(report.negative_tonnage, 1);
        assert_eq!(report.missing_tonnage, 1);
        assert_eq!(records[0].tonnage, 0.0);
    }

    #[test]
    fn workbook_sheets_are_concatenated_by_column_name() {
        use rust_xlsxwriter::Workbook;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ritase.xlsx");
        let mut workbook = Workbook::new();

        // serial dates and day-fraction times, as Excel stores them
        let first = workbook.add_worksheet();
        first.set_name("Shift 1").unwrap();
        for (col, label) in ["Date", "Dump Truck", "SPPH", "Tonase", "Jam Dumping"].iter().enumerate() {
            first.write_string(0, col as u16, *label).unwrap();
        }
        first.write_number(1, 0, 45536.0).unwrap();
        first.write_string(1, 1, "DT01").unwrap();
        first.write_string(1, 2, "SGJ1").unwrap();
        first.write_number(1, 3, 30.5).unwrap();
        first.write_number(1, 4, 0.3125).unwrap();

        // different column order and an aliased label
        let second = workbook.add_worksheet();
        second.set_name("Shift 2").unwrap();
        for (col, label) in ["SPPH", "Tonase", "Dump_Truck", "Date"].iter().enumerate() {
            second.write_string(0, col as u16, *label).unwrap();
        }
        second.write_string(1, 0, "MBS").unwrap();
        second.write_number(1, 1, 28.0).unwrap();
        second.write_string(1, 2, "DT02").unwrap();
        second.write_string(1, 3, "2024-09-02").unwrap();
        workbook.save(&path).unwrap();

        let table = read_workbook(&path).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!(table.has_column("dump truck"));
        assert!(table.has_column("jam dumping"));

        let (records, report) = load_and_clean(&path).unwrap();
        assert_eq!(report.loaded_rows, 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        assert_eq!(records[0].dump_truck, "DT01");
        assert_eq!(records[0].tonnage, 30.5);
        let time = crate::util::parse_time_safe(records[0].dump_time.as_deref().unwrap());
        assert_eq!(time, chrono::NaiveTime::from_hms_opt(7, 30, 0));

        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 9, 2).unwrap());
        assert_eq!(records[1].dump_truck, "DT02");
        assert_eq!(records[1].partner, "MBS");
        assert_eq!(records[1].dump_time, None);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = FileKind::from_path(Path::new("trips.pdf")).unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedFormat(ext) if ext == "pdf"));
        assert_eq!(FileKind::from_path(Path::new("a.TXT")).unwrap(), FileKind::Csv);
        assert_eq!(
            FileKind::from_path(Path::new("a.xlsx")).unwrap(),
            FileKind::Spreadsheet
        );
    }
}
