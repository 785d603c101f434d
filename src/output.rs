use crate::error::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Serialize rows as UTF-8 CSV with a header row.
pub fn write_csv_to<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv_to(file, rows)
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AggregateRow;

    #[test]
    fn csv_has_header_and_no_index_column() {
        let rows = vec![AggregateRow {
            no: 1,
            key: "FOB MV".to_string(),
            actual: 150.0,
            target: 200.0,
            daily_target: 6.67,
            weekly_target: 46.67,
            difference: 50.0,
            percent_achievement: 75.0,
            synthetic: false,
        }];
        let mut buf = Vec::new();
        write_csv_to(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Group,Tonase,Target,TargetHarian,TargetMingguan,Difference,PercentAchievement")
        );
        assert_eq!(lines.next(), Some("FOB MV,150.0,200.0,6.67,46.67,50.0,75.0"));
    }
}
