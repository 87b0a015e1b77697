// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so the
// concrete loader or artifact format can change without the
// use cases noticing.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::table::Table;

// ─── TableSource ──────────────────────────────────────────────────────────────
/// Any component that can produce a table of records.
///
/// Implementations:
///   - CsvLoader → headerless delimited file with caller-supplied names
pub trait TableSource {
    /// Load every record from this source.
    fn load(&self) -> Result<Table>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose fitted state can be saved and restored from disk.
///
/// Implementations:
///   - WidePreprocessor
///   - DensePreprocessor
pub trait Persistable: Sized {
    /// Save this component's state to the given path
    fn save(&self, path: &str) -> Result<()>;

    /// Load a component's state from the given path.
    fn load(path: &str) -> Result<Self>;
}
