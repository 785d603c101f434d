//! Coal rehandling haulage reporting: load trip tables, filter them, compare
//! tonnage against period targets, bucket dump times by hour, and rank
//! dump-truck operators.
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod hourly;
pub mod loader;
pub mod logging;
pub mod output;
pub mod reports;
pub mod targets;
pub mod types;
pub mod util;

pub use error::{ParseWarning, ReportError, Result};
