// Utility helpers for parsing and basic statistics.
//
// This module centralizes all the "dirty" cell/number/date handling so the
// rest of the code can assume clean, typed values.
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use num_format::{Locale, ToFormattedString};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const TIME_FORMATS: [&str; 3] = ["%H:%M:%S", "%H:%M", "%H:%M:%S%.f"];

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in exported sheets (commas, spaces, text).
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a calendar date from the handful of layouts seen in uploads, a
/// timestamp (the time part is dropped) or a spreadsheet serial number.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    excel_serial_date(s)
}

/// Parse a time-of-day string (`HH:MM` or `HH:MM:SS`). Spreadsheet cells
/// holding a day fraction in `[0, 1)` are accepted as well.
pub fn parse_time_safe(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    let fraction = s.parse::<f64>().ok()?;
    if !(0.0..1.0).contains(&fraction) {
        return None;
    }
    let secs = (fraction * 86_400.0).round() as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs.min(86_399), 0)
}

fn excel_serial_date(s: &str) -> Option<NaiveDate> {
    let serial = s.parse::<f64>().ok()?;
    // Serial 1 is 1900-01-01; 60 is the phantom 1900-02-29.
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Inclusive number of days between two dates: `(end - start).days + 1`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Round half away from zero to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Decode ISO-8859-1 bytes. Every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// `tabled` display hook for money-like columns.
pub fn display_2dp(v: &f64) -> String {
    format_number(*v, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_with_separators() {
        assert_eq!(parse_f64_safe(Some(" 1,234.5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("12 ton")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn parses_dates_in_several_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 9, 25);
        assert_eq!(parse_date_safe(Some("2024-09-25")), expected);
        assert_eq!(parse_date_safe(Some("2024-09-25 00:00:00")), expected);
        assert_eq!(parse_date_safe(Some("09/25/2024")), expected);
        assert_eq!(parse_date_safe(Some("45560")), expected);
        assert_eq!(parse_date_safe(Some("not a date")), None);
    }

    #[test]
    fn parses_times_and_rejects_out_of_range() {
        assert_eq!(parse_time_safe("07:45"), NaiveTime::from_hms_opt(7, 45, 0));
        assert_eq!(parse_time_safe("23:10:05"), NaiveTime::from_hms_opt(23, 10, 5));
        assert_eq!(parse_time_safe("0.5"), NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(parse_time_safe("25:99"), None);
        assert_eq!(parse_time_safe("1.5"), None);
        assert_eq!(parse_time_safe(""), None);
    }

    #[test]
    fn inclusive_day_count() {
        let start = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();
        assert_eq!(days_inclusive(start, end), 30);
        assert_eq!(days_inclusive(start, start), 1);
        assert_eq!(days_inclusive(end, start), -28);
    }

    #[test]
    fn formats_numbers() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-50.0, 2), "-50.00");
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(round2(75.005_1), 75.01);
    }

    #[test]
    fn latin1_maps_high_bytes() {
        assert_eq!(decode_latin1(b"Jalan \xe9"), "Jalan é");
    }
}
