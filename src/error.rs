// Error taxonomy for the report pipeline.
//
// Schema, range, period and format errors are terminal: the caller stops
// before producing any table. Unparseable time-of-day values are not errors,
// see `ParseWarning`.
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("required column '{column}' not found in dataset")]
    Schema { column: String },

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("target period must span at least one day (got {days})")]
    InvalidPeriod { days: i64 },

    #[error("unsupported file type '{0}' (expected .csv, .txt, .xlsx or .xls)")]
    UnsupportedFormat(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("spreadsheet parse failed: {0}")]
    Excel(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Non-fatal report of values that were dropped instead of defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseWarning {
    pub field: &'static str,
    pub rejected: usize,
}

impl ParseWarning {
    pub fn is_empty(&self) -> bool {
        self.rejected == 0
    }
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}' values could not be parsed", self.rejected, self.field)
    }
}
