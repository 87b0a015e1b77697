// ============================================================
// Layer 4 — Dense Preprocessor
// ============================================================
// Prepares the input of the deep component. Each output row is
//
//   [ idx(education), idx(relationship), ..., age, hours_per_week ]
//     └──── embedding indices ────┘          └─ continuous ─┘
//
// Embedding indices start at 1; 0 is the row reserved for values
// that were not seen during fit, so each embedding table has
// vocab + 1 rows.
//
// deep_column_idx records where every column sits in the row so
// the batcher can split indices from continuous values again.
//
// Continuous values pass through unchanged unless standardise is
// switched on, in which case mean/std are learned during fit.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::table::Table;
use crate::domain::traits::Persistable;

/// One embedding table the deep component must allocate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingInput {
    pub column:       String,
    /// Rows in the table, including the reserved unknown row
    pub n_categories: usize,
    pub dim:          usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseFitState {
    vocab:           Vec<BTreeMap<String, u32>>,
    means:           Vec<f64>,
    stds:            Vec<f64>,
    deep_column_idx: BTreeMap<String, usize>,
}

/// Per-row concatenated embedding indices and continuous values.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    pub rows: Vec<Vec<f32>>,
}

impl DenseMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensePreprocessor {
    embed_cols:      Vec<(String, usize)>,
    continuous_cols: Vec<String>,
    standardize:     bool,
    state:           Option<DenseFitState>,
}

impl DensePreprocessor {
    pub fn new(embed_cols: Vec<(String, usize)>, continuous_cols: Vec<String>) -> Self {
        Self { embed_cols, continuous_cols, standardize: false, state: None }
    }

    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn continuous_cols(&self) -> &[String] {
        &self.continuous_cols
    }

    fn state(&self) -> PipelineResult<&DenseFitState> {
        self.state
            .as_ref()
            .ok_or(PipelineError::NotFitted { component: "DensePreprocessor" })
    }

    /// Column → position in each transformed row.
    pub fn deep_column_idx(&self) -> PipelineResult<&BTreeMap<String, usize>> {
        Ok(&self.state()?.deep_column_idx)
    }

    /// Embedding tables to allocate, in column order.
    pub fn embeddings_input(&self) -> PipelineResult<Vec<EmbeddingInput>> {
        let state = self.state()?;
        Ok(self
            .embed_cols
            .iter()
            .zip(&state.vocab)
            .map(|((column, dim), vocab)| EmbeddingInput {
                column:       column.clone(),
                n_categories: vocab.len() + 1,
                dim:          *dim,
            })
            .collect())
    }

    pub fn fit(&mut self, table: &Table) -> PipelineResult<&mut Self> {
        if self.embed_cols.is_empty() && self.continuous_cols.is_empty() {
            return Err(PipelineError::InvalidConfig("no deep columns configured".to_string()));
        }

        let mut vocab = Vec::with_capacity(self.embed_cols.len());
        for (col, _) in &self.embed_cols {
            let mut distinct = table.categorical(col)?;
            distinct.sort();
            distinct.dedup();
            vocab.push(
                distinct
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (v, i as u32 + 1))
                    .collect::<BTreeMap<_, _>>(),
            );
        }

        let mut means = Vec::with_capacity(self.continuous_cols.len());
        let mut stds  = Vec::with_capacity(self.continuous_cols.len());
        for col in &self.continuous_cols {
            let values = table.numeric(col)?;
            let (mean, std) = mean_std(values);
            means.push(mean);
            stds.push(if std > 0.0 { std } else { 1.0 });
        }

        let deep_column_idx: BTreeMap<String, usize> = self
            .embed_cols
            .iter()
            .map(|(c, _)| c.clone())
            .chain(self.continuous_cols.iter().cloned())
            .enumerate()
            .map(|(i, c)| (c, i))
            .collect();

        tracing::info!(
            "Dense preprocessor fit: {} embedding columns, {} continuous columns",
            self.embed_cols.len(),
            self.continuous_cols.len()
        );
        self.state = Some(DenseFitState { vocab, means, stds, deep_column_idx });
        Ok(self)
    }

    pub fn transform(&self, table: &Table) -> PipelineResult<DenseMatrix> {
        let state  = self.state()?;
        let n_rows = table.n_rows();
        let width  = self.embed_cols.len() + self.continuous_cols.len();
        let mut rows = vec![Vec::with_capacity(width); n_rows];

        for ((col, _), vocab) in self.embed_cols.iter().zip(&state.vocab) {
            for (row, value) in rows.iter_mut().zip(table.categorical(col)?) {
                row.push(vocab.get(&value).copied().unwrap_or(0) as f32);
            }
        }

        for (i, col) in self.continuous_cols.iter().enumerate() {
            for (row, &value) in rows.iter_mut().zip(table.numeric(col)?) {
                let v = if self.standardize {
                    (value - state.means[i]) / state.stds[i]
                } else {
                    value
                };
                row.push(v as f32);
            }
        }

        Ok(DenseMatrix { rows })
    }

    pub fn fit_transform(&mut self, table: &Table) -> PipelineResult<DenseMatrix> {
        self.fit(table)?;
        self.transform(table)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n    = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var  = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

impl Persistable for DensePreprocessor {
    fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Cannot write dense preprocessor to '{path}'"))
    }

    fn load(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read dense preprocessor from '{path}'"))?;
        Ok(serde_json::from_str(&json)?)
    }
}
