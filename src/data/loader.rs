// ============================================================
// Layer 4 — CSV Loader
// ============================================================
// Loads a headerless delimited file into a Table using the
// csv crate. The caller supplies the ordered column names.
//
// Reading rules:
//   - column names have '-' replaced with '_'
//   - every field is whitespace-trimmed (" State-gov" → "State-gov")
//   - lines starting with '|' are comments
//   - blank lines are skipped
//   - a record with the wrong number of fields is an error
//
// Column typing happens after all rows are read: a column is
// Numeric when every value parses as f64, otherwise Text.
//
// Reference: csv crate documentation (ReaderBuilder)

use anyhow::{Context, Result};
use std::{io::Read, path::PathBuf};

use crate::domain::error::PipelineError;
use crate::domain::table::{Column, Table};
use crate::domain::traits::TableSource;

/// Column names as the rest of the pipeline refers to them.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().replace('-', "_")
}

/// Loads a headerless CSV file with a fixed, ordered column list.
/// Implements the TableSource trait from Layer 3.
pub struct CsvLoader {
    path:      PathBuf,
    columns:   Vec<String>,
    delimiter: u8,
}

impl CsvLoader {
    pub fn new(path: impl Into<PathBuf>, columns: &[String]) -> Self {
        Self {
            path:      path.into(),
            columns:   columns.to_vec(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl TableSource for CsvLoader {
    fn load(&self) -> Result<Table> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Cannot open data file '{}'", self.path.display()))?;

        let table = read_table(file, &self.columns, self.delimiter)
            .with_context(|| format!("Cannot parse '{}'", self.path.display()))?;

        tracing::info!(
            "Loaded {} rows x {} columns from '{}'",
            table.n_rows(),
            table.n_columns(),
            self.path.display()
        );
        Ok(table)
    }
}

/// Parse delimited records from any reader into a typed Table.
pub fn read_table<R: Read>(reader: R, columns: &[String], delimiter: u8) -> Result<Table> {
    let names: Vec<String> = columns.iter().map(|c| normalize_column_name(c)).collect();
    let expected = names.len();

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .comment(Some(b'|'))
        .flexible(true)
        .from_reader(reader);

    // One Vec<String> per column, filled row by row
    let mut raw: Vec<Vec<String>> = vec![Vec::new(); expected];

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() != expected {
            let line = record.position().map(|p| p.line()).unwrap_or(i as u64 + 1);
            return Err(PipelineError::MalformedRow { line, expected, found: record.len() }.into());
        }
        for (col, field) in raw.iter_mut().zip(record.iter()) {
            col.push(field.to_string());
        }
    }

    let typed: Vec<Column> = names
        .into_iter()
        .zip(raw)
        .map(|(name, values)| infer_column(name, values))
        .collect();

    Ok(Table::new(typed)?)
}

fn infer_column(name: String, values: Vec<String>) -> Column {
    if values.is_empty() {
        return Column::text(name, values);
    }
    let parsed: Option<Vec<f64>> = values.iter().map(|v| v.parse::<f64>().ok()).collect();
    match parsed {
        Some(nums) => Column::numeric(name, nums),
        None       => Column::text(name, values),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_types_and_names() {
        let data = "39, State-gov, 40, <=50K\n50, Private, 13, >50K\n";
        let t = read_table(data.as_bytes(), &names(&["age", "workclass", "hours-per-week", "income"]), b',')
            .unwrap();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.column_names(), vec!["age", "workclass", "hours_per_week", "income"]);
        assert_eq!(t.numeric("age").unwrap(), &[39.0, 50.0]);
        assert_eq!(t.categorical("workclass").unwrap(), vec!["State-gov", "Private"]);
        assert!(!t.column("income").unwrap().is_numeric());
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let data = "|1x3 Cross validator\n25, a\n\n30, b\n";
        let t = read_table(data.as_bytes(), &names(&["age", "x"]), b',').unwrap();
        assert_eq!(t.n_rows(), 2);
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let data = "1,a\n2\n";
        let err = read_table(data.as_bytes(), &names(&["n", "s"]), b',').unwrap_err();
        let pe = err.downcast_ref::<PipelineError>().expect("pipeline error");
        assert_eq!(*pe, PipelineError::MalformedRow { line: 2, expected: 2, found: 1 });
    }

    #[test]
    fn test_loader_reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "1;x").unwrap();
        writeln!(f, "2;y").unwrap();
        let t = CsvLoader::new(f.path(), &names(&["n", "s"]))
            .with_delimiter(b';')
            .load()
            .unwrap();
        assert_eq!(t.numeric("n").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = CsvLoader::new("/definitely/not/here.csv", &names(&["a"]));
        assert!(loader.load().is_err());
    }
}
