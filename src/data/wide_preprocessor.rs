// ============================================================
// Layer 4 — Wide Preprocessor
// ============================================================
// Encodes the categorical columns that feed the linear "wide"
// component.
//
// fit():
//   For every wide column, and every declared cross of two
//   columns, collect the sorted distinct values. Each
//   (column, value) pair gets a global index:
//
//     age_buckets:  "0" → 1, "1" → 2, ... "8" → 9
//     education:    "Bachelors" → 10, "HS-grad" → 11, ...
//     education-occupation: "Bachelors-Sales" → ...
//
//   Index 0 is never assigned.
//
// transform():
//   One index per column per row. A value not seen during fit
//   maps to 0, which sets no bit in the one-hot view, so the
//   category is dropped from the wide logit.
//
// The one-hot view has width wide_dim = sum of the per-column
// vocabulary sizes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::table::Table;
use crate::domain::traits::Persistable;

/// Index emitted for values outside the fitted vocabulary.
pub const UNKNOWN_INDEX: u32 = 0;

/// Name of the synthetic column built from a cross.
pub fn cross_name(a: &str, b: &str) -> String {
    format!("{a}-{b}")
}

/// Learned encoding for one wide column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideColumnVocab {
    pub column: String,
    pub index:  BTreeMap<String, u32>,
}

impl WideColumnVocab {
    pub fn size(&self) -> usize {
        self.index.len()
    }
}

/// Per-row encoded wide features.
#[derive(Debug, Clone, PartialEq)]
pub struct WideMatrix {
    pub indices:  Vec<Vec<u32>>,
    pub wide_dim: usize,
}

impl WideMatrix {
    pub fn n_rows(&self) -> usize {
        self.indices.len()
    }

    /// Dense {0,1} row of width wide_dim; all zeros past the last row.
    pub fn one_hot_row(&self, row: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; self.wide_dim];
        if let Some(indices) = self.indices.get(row) {
            let skipped = write_one_hot(indices, &mut out);
            if skipped > 0 {
                tracing::warn!("Row {row}: {skipped} wide indices exceed wide_dim {}", self.wide_dim);
            }
        }
        out
    }
}

/// Set out[idx - 1] for every known index. Indices past the end of
/// `out` are skipped and counted.
pub fn write_one_hot(indices: &[u32], out: &mut [f32]) -> usize {
    let mut skipped = 0;
    for &idx in indices.iter().filter(|&&i| i != UNKNOWN_INDEX) {
        match out.get_mut(idx as usize - 1) {
            Some(slot) => *slot = 1.0,
            None       => skipped += 1,
        }
    }
    skipped
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidePreprocessor {
    wide_cols:    Vec<String>,
    crossed_cols: Vec<(String, String)>,
    vocab:        Option<Vec<WideColumnVocab>>,
}

impl WidePreprocessor {
    pub fn new(wide_cols: Vec<String>, crossed_cols: Vec<(String, String)>) -> Self {
        Self { wide_cols, crossed_cols, vocab: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.vocab.is_some()
    }

    /// Encoded column names: wide columns first, then crosses.
    pub fn column_names(&self) -> Vec<String> {
        self.wide_cols
            .iter()
            .cloned()
            .chain(self.crossed_cols.iter().map(|(a, b)| cross_name(a, b)))
            .collect()
    }

    fn vocab(&self) -> PipelineResult<&[WideColumnVocab]> {
        self.vocab
            .as_deref()
            .ok_or(PipelineError::NotFitted { component: "WidePreprocessor" })
    }

    /// Total one-hot width learned at fit time.
    pub fn wide_dim(&self) -> PipelineResult<usize> {
        Ok(self.vocab()?.iter().map(WideColumnVocab::size).sum())
    }

    /// Values of every encoded column, regular then crossed.
    fn column_values(&self, table: &Table) -> PipelineResult<Vec<Vec<String>>> {
        let mut out = Vec::with_capacity(self.wide_cols.len() + self.crossed_cols.len());
        for col in &self.wide_cols {
            out.push(table.categorical(col)?);
        }
        for (a, b) in &self.crossed_cols {
            let left  = table.categorical(a)?;
            let right = table.categorical(b)?;
            out.push(left.iter().zip(&right).map(|(x, y)| format!("{x}-{y}")).collect());
        }
        Ok(out)
    }

    pub fn fit(&mut self, table: &Table) -> PipelineResult<&mut Self> {
        if self.wide_cols.is_empty() && self.crossed_cols.is_empty() {
            return Err(PipelineError::InvalidConfig("no wide columns configured".to_string()));
        }

        let mut next = 1u32;
        let mut vocab = Vec::new();
        for (name, values) in self.column_names().into_iter().zip(self.column_values(table)?) {
            let mut distinct: Vec<String> = values;
            distinct.sort();
            distinct.dedup();

            let index: BTreeMap<String, u32> = distinct
                .into_iter()
                .map(|v| {
                    let i = next;
                    next += 1;
                    (v, i)
                })
                .collect();
            vocab.push(WideColumnVocab { column: name, index });
        }

        tracing::info!(
            "Wide preprocessor fit: {} columns, wide_dim={}",
            vocab.len(),
            next - 1
        );
        self.vocab = Some(vocab);
        Ok(self)
    }

    pub fn transform(&self, table: &Table) -> PipelineResult<WideMatrix> {
        let vocab  = self.vocab()?;
        let values = self.column_values(table)?;
        let n_rows = table.n_rows();

        let mut unseen  = 0usize;
        let mut indices = vec![Vec::with_capacity(vocab.len()); n_rows];
        for (col_vocab, col_values) in vocab.iter().zip(&values) {
            for (row, value) in indices.iter_mut().zip(col_values) {
                let idx = col_vocab.index.get(value).copied().unwrap_or(UNKNOWN_INDEX);
                if idx == UNKNOWN_INDEX {
                    unseen += 1;
                }
                row.push(idx);
            }
        }

        if unseen > 0 {
            tracing::warn!("Wide transform: {} unseen category values dropped", unseen);
        }

        Ok(WideMatrix { indices, wide_dim: self.wide_dim()? })
    }

    pub fn fit_transform(&mut self, table: &Table) -> PipelineResult<WideMatrix> {
        self.fit(table)?;
        self.transform(table)
    }

    /// Decode index rows back into values; unknown indices give None.
    pub fn inverse_transform(&self, matrix: &WideMatrix) -> PipelineResult<Vec<Vec<Option<String>>>> {
        let vocab = self.vocab()?;
        let reverse: BTreeMap<u32, &str> = vocab
            .iter()
            .flat_map(|c| c.index.iter().map(|(v, &i)| (i, v.as_str())))
            .collect();

        Ok(matrix
            .indices
            .iter()
            .map(|row| row.iter().map(|i| reverse.get(i).map(|v| v.to_string())).collect())
            .collect())
    }
}

impl Persistable for WidePreprocessor {
    fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Cannot write wide preprocessor to '{path}'"))
    }

    fn load(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read wide preprocessor from '{path}'"))?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Column;

    fn table(edu: &[&str], occ: &[&str]) -> Table {
        Table::new(vec![
            Column::text("education",  edu.iter().map(|s| s.to_string()).collect()),
            Column::text("occupation", occ.iter().map(|s| s.to_string()).collect()),
        ])
        .unwrap()
    }

    fn prep() -> WidePreprocessor {
        WidePreprocessor::new(
            vec!["education".into(), "occupation".into()],
            vec![("education".into(), "occupation".into())],
        )
    }

    #[test]
    fn test_width_is_sum_of_vocab_sizes() {
        let t = table(&["BSc", "HS", "BSc"], &["Sales", "Sales", "Tech"]);
        let mut p = prep();
        let m = p.fit_transform(&t).unwrap();
        // education: 2, occupation: 2, cross: BSc-Sales, HS-Sales, BSc-Tech = 3
        assert_eq!(m.wide_dim, 7);
        assert_eq!(p.wide_dim().unwrap(), 7);
        assert_eq!(m.n_rows(), 3);
        for r in 0..3 {
            let row = m.one_hot_row(r);
            assert_eq!(row.len(), 7);
            assert_eq!(row.iter().sum::<f32>(), 3.0);
        }
    }

    #[test]
    fn test_indices_are_unique_and_start_at_one() {
        let t = table(&["BSc", "HS"], &["Sales", "Tech"]);
        let mut p = prep();
        let m = p.fit_transform(&t).unwrap();
        let mut all: Vec<u32> = m.indices.iter().flatten().copied().collect();
        all.sort();
        all.dedup();
        assert_eq!(all.first(), Some(&1));
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let t = table(&["BSc"], &["Sales"]);
        let err = prep().transform(&t).unwrap_err();
        assert_eq!(err, PipelineError::NotFitted { component: "WidePreprocessor" });
    }

    #[test]
    fn test_unseen_values_are_dropped() {
        let mut p = prep();
        p.fit(&table(&["BSc"], &["Sales"])).unwrap();
        let m = p.transform(&table(&["PhD"], &["Sales"])).unwrap();
        assert_eq!(m.indices[0][0], UNKNOWN_INDEX);
        assert_eq!(m.indices[0][2], UNKNOWN_INDEX);
        // only the known occupation bit is set
        assert_eq!(m.one_hot_row(0).iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn test_one_hot_row_tolerates_foreign_indices() {
        // Indices from a larger vocabulary than this matrix declares
        let m = WideMatrix { indices: vec![vec![1, 0, 6]], wide_dim: 3 };
        assert_eq!(m.one_hot_row(0), vec![1.0, 0.0, 0.0]);
        assert_eq!(m.one_hot_row(5), vec![0.0; 3]);

        let mut out = [0.0f32; 2];
        assert_eq!(write_one_hot(&[2, 3, 0], &mut out), 1);
        assert_eq!(out, [0.0, 1.0]);
    }

    #[test]
    fn test_inverse_transform() {
        let t = table(&["BSc", "HS"], &["Sales", "Tech"]);
        let mut p = prep();
        let m = p.fit_transform(&t).unwrap();
        let back = p.inverse_transform(&m).unwrap();
        assert_eq!(back[1][0].as_deref(), Some("HS"));
        assert_eq!(back[1][2].as_deref(), Some("HS-Tech"));
    }

    #[test]
    fn test_missing_column_fails_fit() {
        let t = Table::new(vec![Column::text("education", vec!["BSc".into()])]).unwrap();
        assert!(matches!(prep().fit(&t), Err(PipelineError::MissingColumn { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.json");
        let path = path.to_str().unwrap();

        let mut p = prep();
        p.fit(&table(&["BSc", "HS"], &["Sales", "Tech"])).unwrap();
        p.save(path).unwrap();

        let loaded = WidePreprocessor::load(path).unwrap();
        assert_eq!(loaded.wide_dim().unwrap(), p.wide_dim().unwrap());
        assert!(loaded.is_fitted());
    }
}
