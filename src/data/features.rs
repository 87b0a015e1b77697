// ============================================================
// Layer 4 — Feature Engineer
// ============================================================
// Turns the raw table into the derived table the preprocessors
// consume:
//
//   age            → age_buckets   (categorical bucket label "0".."8")
//   income (text)  → income_label  (1 if it contains ">50K", else 0)
//   income         → dropped
//
// Buckets are right-closed intervals (e[i], e[i+1]], so with the
// default edges an age of 25 falls in bucket 0 and 26 in bucket 1.
// Values outside (e[0], e[last]] have no bucket and become "nan".

use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::table::{Column, Table};

/// Category label used for values that fall outside every bucket.
pub const MISSING_BUCKET: &str = "nan";

/// Index of the right-closed bucket containing `value`, if any.
pub fn bucketize(value: f64, edges: &[f64]) -> Option<usize> {
    if edges.len() < 2 || value.is_nan() {
        return None;
    }
    if value <= edges[0] || value > edges[edges.len() - 1] {
        return None;
    }
    // First edge that is >= value closes the bucket
    let upper = edges.partition_point(|&e| e < value);
    Some(upper - 1)
}

/// 1 when the label text contains the positive marker, else 0.
pub fn binary_label(text: &str, positive: &str) -> u8 {
    u8::from(text.contains(positive))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEngineer {
    pub bucket_source:  String,
    pub bucket_column:  String,
    pub bucket_edges:   Vec<f64>,
    pub label_source:   String,
    pub label_column:   String,
    pub positive_label: String,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self {
            bucket_source:  "age".to_string(),
            bucket_column:  "age_buckets".to_string(),
            bucket_edges:   vec![16.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 91.0],
            label_source:   "income".to_string(),
            label_column:   "income_label".to_string(),
            positive_label: ">50K".to_string(),
        }
    }
}

impl FeatureEngineer {
    pub fn n_buckets(&self) -> usize {
        self.bucket_edges.len().saturating_sub(1)
    }

    /// Derive the bucket and label columns. When the label source
    /// column is absent (unlabelled prediction input) only the bucket
    /// column is added.
    pub fn apply(&self, mut table: Table) -> PipelineResult<Table> {
        if self.bucket_edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::InvalidConfig(
                "bucket edges must be strictly increasing".to_string(),
            ));
        }

        let buckets: Vec<String> = table
            .numeric(&self.bucket_source)?
            .iter()
            .map(|&v| match bucketize(v, &self.bucket_edges) {
                Some(b) => b.to_string(),
                None    => MISSING_BUCKET.to_string(),
            })
            .collect();
        table.add_column(Column::text(&self.bucket_column, buckets))?;

        if table.has_column(&self.label_source) {
            let labels: Vec<f64> = table
                .categorical(&self.label_source)?
                .iter()
                .map(|t| binary_label(t, &self.positive_label) as f64)
                .collect();
            table.add_column(Column::numeric(&self.label_column, labels))?;
            table.drop_column(&self.label_source)?;
        } else {
            tracing::debug!("No '{}' column; skipping label derivation", self.label_source);
        }

        Ok(table)
    }

    /// The derived label column as 0/1 bytes.
    pub fn labels(&self, table: &Table) -> PipelineResult<Vec<u8>> {
        Ok(table
            .numeric(&self.label_column)?
            .iter()
            .map(|&v| u8::from(v > 0.5))
            .collect())
    }
}
