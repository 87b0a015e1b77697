// ============================================================
// Layer 4 — Wide & Deep Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<WideDeepSample>
// into the tensors the model consumes.
//
//   Input:  N samples
//   Output: WideDeepBatch
//             wide         [N, wide_dim]   one-hot, built here from
//                                          the sparse wide indices
//             categorical  [N, n_embed]    embedding indices
//             continuous   [N, n_cont]     raw (or standardised) values
//             targets      [N]             0 / 1
//
// The dense row of each sample is split back into indices and
// continuous values with the positions in FeatureLayout.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};
use serde::{Deserialize, Serialize};

use crate::data::dataset::WideDeepSample;
use crate::data::dense_preprocessor::DensePreprocessor;
use crate::data::wide_preprocessor::{write_one_hot, WidePreprocessor};
use crate::domain::error::PipelineResult;

// ─── FeatureLayout ────────────────────────────────────────────────────────────
/// Where each feature group lives in an encoded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub wide_dim:        usize,
    pub categorical_idx: Vec<usize>,
    pub continuous_idx:  Vec<usize>,
}

impl FeatureLayout {
    /// Read the layout off a pair of fitted preprocessors.
    pub fn from_preprocessors(
        wide:  &WidePreprocessor,
        dense: &DensePreprocessor,
    ) -> PipelineResult<Self> {
        let column_idx = dense.deep_column_idx()?;
        let categorical_idx = dense
            .embeddings_input()?
            .iter()
            .map(|e| column_idx[&e.column])
            .collect();
        let continuous_idx = dense
            .continuous_cols()
            .iter()
            .map(|c| column_idx[c])
            .collect();

        Ok(Self { wide_dim: wide.wide_dim()?, categorical_idx, continuous_idx })
    }
}

// ─── WideDeepBatch ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct WideDeepBatch<B: Backend> {
    pub wide:        Tensor<B, 2>,
    /// None when no embedding columns are configured
    pub categorical: Option<Tensor<B, 2, Int>>,
    /// None when no continuous columns are configured
    pub continuous:  Option<Tensor<B, 2>>,
    pub targets:     Tensor<B, 1, Int>,
    /// Host-side copy of the targets for metric bookkeeping
    pub labels:      Vec<u8>,
}

// ─── WideDeepBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct WideDeepBatcher<B: Backend> {
    pub device: B::Device,
    layout:     FeatureLayout,
}

impl<B: Backend> WideDeepBatcher<B> {
    pub fn new(device: B::Device, layout: FeatureLayout) -> Self {
        Self { device, layout }
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }
}

impl<B: Backend> Batcher<WideDeepSample, WideDeepBatch<B>> for WideDeepBatcher<B> {
    fn batch(&self, items: Vec<WideDeepSample>) -> WideDeepBatch<B> {
        let batch_size = items.len();
        let wide_dim   = self.layout.wide_dim;

        // ── Expand sparse wide indices to one-hot rows ────────────────────────
        let mut wide_flat = vec![0.0f32; batch_size * wide_dim];
        let mut skipped   = 0;
        if wide_dim > 0 {
            for (row, s) in wide_flat.chunks_mut(wide_dim).zip(&items) {
                skipped += write_one_hot(&s.wide, row);
            }
        }
        if skipped > 0 {
            tracing::warn!("Skipped {skipped} wide indices beyond wide_dim {wide_dim}");
        }
        let wide = Tensor::<B, 2>::from_data(
            TensorData::new(wide_flat, [batch_size, wide_dim]),
            &self.device,
        );

        // ── Embedding indices ─────────────────────────────────────────────────
        let n_cat = self.layout.categorical_idx.len();
        let categorical = (n_cat > 0).then(|| {
            let flat: Vec<i64> = items
                .iter()
                .flat_map(|s| self.layout.categorical_idx.iter().map(move |&i| s.dense[i] as i64))
                .collect();
            Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [batch_size, n_cat]), &self.device)
        });

        // ── Continuous values ─────────────────────────────────────────────────
        let n_cont = self.layout.continuous_idx.len();
        let continuous = (n_cont > 0).then(|| {
            let flat: Vec<f32> = items
                .iter()
                .flat_map(|s| self.layout.continuous_idx.iter().map(move |&i| s.dense[i]))
                .collect();
            Tensor::<B, 2>::from_data(TensorData::new(flat, [batch_size, n_cont]), &self.device)
        });

        let labels: Vec<u8> = items.iter().map(|s| s.target).collect();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels.iter().map(|&t| t as i64).collect::<Vec<_>>(), [batch_size]),
            &self.device,
        );

        WideDeepBatch { wide, categorical, continuous, targets, labels }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn layout() -> FeatureLayout {
        FeatureLayout { wide_dim: 4, categorical_idx: vec![0], continuous_idx: vec![1] }
    }

    #[test]
    fn test_batch_shapes_and_one_hot() {
        let batcher = WideDeepBatcher::<TestBackend>::new(Default::default(), layout());
        let items = vec![
            WideDeepSample { wide: vec![1, 3], dense: vec![2.0, 0.5], target: 1 },
            WideDeepSample { wide: vec![2, 0], dense: vec![1.0, 1.5], target: 0 },
        ];
        let batch = batcher.batch(items);

        assert_eq!(batch.wide.dims(), [2, 4]);
        let wide: Vec<f32> = batch.wide.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(wide, vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

        assert_eq!(batch.categorical.unwrap().dims(), [2, 1]);
        let cont: Vec<f32> = batch.continuous.unwrap().into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(cont, vec![0.5, 1.5]);
        assert_eq!(batch.labels, vec![1, 0]);
        assert_eq!(batch.targets.dims(), [2]);
    }

    #[test]
    fn test_out_of_range_wide_index_is_skipped() {
        let batcher = WideDeepBatcher::<TestBackend>::new(Default::default(), layout());
        let batch = batcher.batch(vec![
            WideDeepSample { wide: vec![2, 9], dense: vec![0.0, 0.0], target: 0 },
            WideDeepSample { wide: vec![4], dense: vec![0.0, 0.0], target: 1 },
        ]);
        let wide: Vec<f32> = batch.wide.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(wide, vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_no_continuous_columns() {
        let layout = FeatureLayout { wide_dim: 1, categorical_idx: vec![0], continuous_idx: vec![] };
        let batcher = WideDeepBatcher::<TestBackend>::new(Default::default(), layout);
        let batch = batcher.batch(vec![WideDeepSample { wide: vec![1], dense: vec![1.0], target: 0 }]);
        assert!(batch.continuous.is_none());
        assert!(batch.categorical.is_some());
    }
}
