use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::dense_preprocessor::DenseMatrix;
use crate::data::wide_preprocessor::WideMatrix;
use crate::domain::error::{PipelineError, PipelineResult};

/// One encoded record: wide indices, dense row, 0/1 target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WideDeepSample {
    pub wide:   Vec<u32>,
    pub dense:  Vec<f32>,
    pub target: u8,
}

/// Zip the two feature matrices with their labels. Every matrix must
/// have exactly one row per label.
pub fn build_samples(
    wide:    WideMatrix,
    dense:   DenseMatrix,
    targets: &[u8],
) -> PipelineResult<Vec<WideDeepSample>> {
    let expected = targets.len();
    if wide.n_rows() != expected {
        return Err(PipelineError::LengthMismatch {
            what: "wide matrix".to_string(), expected, found: wide.n_rows(),
        });
    }
    if dense.n_rows() != expected {
        return Err(PipelineError::LengthMismatch {
            what: "dense matrix".to_string(), expected, found: dense.n_rows(),
        });
    }

    Ok(wide
        .indices
        .into_iter()
        .zip(dense.rows)
        .zip(targets)
        .map(|((wide, dense), &target)| WideDeepSample { wide, dense, target })
        .collect())
}

pub struct WideDeepDataset {
    samples: Vec<WideDeepSample>,
}

impl WideDeepDataset {
    pub fn new(samples: Vec<WideDeepSample>) -> Self { Self { samples } }

    pub fn targets(&self) -> Vec<u8> {
        self.samples.iter().map(|s| s.target).collect()
    }
}

impl Dataset<WideDeepSample> for WideDeepDataset {
    fn get(&self, index: usize) -> Option<WideDeepSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_length_must_match() {
        let wide  = WideMatrix { indices: vec![vec![1], vec![2]], wide_dim: 2 };
        let dense = DenseMatrix { rows: vec![vec![1.0], vec![2.0]] };
        let err = build_samples(wide, dense, &[1]).unwrap_err();
        assert!(matches!(err, PipelineError::LengthMismatch { expected: 1, found: 2, .. }));
    }

    #[test]
    fn test_dataset_access() {
        let wide  = WideMatrix { indices: vec![vec![1], vec![2]], wide_dim: 2 };
        let dense = DenseMatrix { rows: vec![vec![1.0], vec![2.0]] };
        let ds = WideDeepDataset::new(build_samples(wide, dense, &[0, 1]).unwrap());
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(1).unwrap().dense, vec![2.0]);
        assert!(ds.get(2).is_none());
        assert_eq!(ds.targets(), vec![0, 1]);
    }
}
