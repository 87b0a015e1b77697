// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Every failure the data and model layers can report on their
// own. The application layer wraps these in anyhow::Error and
// adds file/step context on the way up.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A column named by the caller is not in the table
    #[error("column '{name}' not found in table")]
    MissingColumn { name: String },

    /// Two columns share the same name
    #[error("duplicate column name '{name}'")]
    DuplicateColumn { name: String },

    /// A numeric operation was requested on a text column
    #[error("column '{name}' is not numeric")]
    NonNumericColumn { name: String },

    /// A CSV record with the wrong number of fields
    #[error("line {line}: expected {expected} fields, found {found}")]
    MalformedRow { line: u64, expected: usize, found: usize },

    /// transform() called before fit()
    #[error("{component} must be fit before transform")]
    NotFitted { component: &'static str },

    /// Feature matrices and labels disagree on row count
    #[error("length mismatch: {what} has {found} rows, expected {expected}")]
    LengthMismatch { what: String, expected: usize, found: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("dataset is empty")]
    EmptyDataset,
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
