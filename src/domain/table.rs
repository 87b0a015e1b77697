// ============================================================
// Layer 3 — Table Domain Type
// ============================================================
// A column-oriented table: an ordered list of named columns,
// each holding either text or numbers, all of equal length.
//
//   Table
//     └── columns: Vec<Column>
//           ├── name: "age"        data: Numeric([39.0, 50.0, ...])
//           └── name: "workclass"  data: Text(["State-gov", ...])
//
// The loader decides each column's type once; the feature
// engineer adds and drops columns; the preprocessors read them.

use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult};

/// The values of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Text(Vec<String>),
    Numeric(Vec<f64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v)    => v.len(),
            ColumnData::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Text(v)    => ColumnData::Text(indices.iter().map(|&i| v[i].clone()).collect()),
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self { name: name.into(), data: ColumnData::Text(values) }
    }

    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self { name: name.into(), data: ColumnData::Numeric(values) }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }
}

/// Render a number the way a category label should read:
/// integral values lose their fractional part ("39" not "39.0").
pub fn format_category(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// An ordered set of equal-length named columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, rejecting duplicate names and ragged columns.
    pub fn new(columns: Vec<Column>) -> PipelineResult<Self> {
        let mut table = Table::default();
        for col in columns {
            table.add_column(col)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> PipelineResult<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| PipelineError::MissingColumn { name: name.to_string() })
    }

    /// Append a column. Its length must match the existing rows.
    pub fn add_column(&mut self, column: Column) -> PipelineResult<()> {
        if self.has_column(&column.name) {
            return Err(PipelineError::DuplicateColumn { name: column.name });
        }
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(PipelineError::LengthMismatch {
                what:     format!("column '{}'", column.name),
                expected: self.n_rows(),
                found:    column.len(),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Remove a column and hand it back to the caller.
    pub fn drop_column(&mut self, name: &str) -> PipelineResult<Column> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| PipelineError::MissingColumn { name: name.to_string() })?;
        Ok(self.columns.remove(pos))
    }

    /// Values of a column as category labels. Numeric columns are
    /// rendered with `format_category`.
    pub fn categorical(&self, name: &str) -> PipelineResult<Vec<String>> {
        Ok(match &self.column(name)?.data {
            ColumnData::Text(v)    => v.clone(),
            ColumnData::Numeric(v) => v.iter().map(|&x| format_category(x)).collect(),
        })
    }

    pub fn numeric(&self, name: &str) -> PipelineResult<&[f64]> {
        match &self.column(name)?.data {
            ColumnData::Numeric(v) => Ok(v),
            ColumnData::Text(_)    => Err(PipelineError::NonNumericColumn { name: name.to_string() }),
        }
    }

    /// A new table holding only the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column { name: c.name.clone(), data: c.data.take(indices) })
                .collect(),
        }
    }
}
