// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Runs a trained Wide & Deep model over encoded rows in batches
// and turns its logits into probabilities and 0/1 predictions.
//
//   WideMatrix + DenseMatrix ─┐
//                             ├─► WideDeepBatcher ─► model ─► sigmoid
//   Vec<WideDeepSample> ──────┘                                 │
//                                                  p >= 0.5 ─► 1 else 0
//
// The model is either handed over straight from the trainer
// (already on the inner backend via model.valid()) or rebuilt
// from model_config.json and wide_deep.mpk on disk.

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::{
    batcher::{FeatureLayout, WideDeepBatcher},
    dataset::WideDeepSample,
    dense_preprocessor::DenseMatrix,
    wide_preprocessor::WideMatrix,
};
use crate::domain::error::{PipelineError, PipelineResult};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::WideDeep;
use crate::ml::scoring::THRESHOLD;
use crate::ml::trainer::probabilities;
use crate::ml::InferBackend;

const DEFAULT_BATCH_SIZE: usize = 256;

pub struct Inferencer<B: Backend> {
    model:      WideDeep<B>,
    batcher:    WideDeepBatcher<B>,
    batch_size: usize,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: WideDeep<B>, layout: FeatureLayout, device: B::Device) -> Self {
        Self {
            model,
            batcher: WideDeepBatcher::new(device, layout),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Probability of the positive class for every sample, in order.
    pub fn predict_proba_samples(&self, samples: &[WideDeepSample]) -> Result<Vec<f32>> {
        let mut probs = Vec::with_capacity(samples.len());
        for chunk in samples.chunks(self.batch_size) {
            let batch  = self.batcher.batch(chunk.to_vec());
            let logits = self.model.forward_batch(batch);
            probs.extend(probabilities(logits)?);
        }
        Ok(probs)
    }

    /// Probability of the positive class for every row of the two matrices.
    pub fn predict_proba(&self, wide: &WideMatrix, dense: &DenseMatrix) -> Result<Vec<f32>> {
        if wide.n_rows() != dense.n_rows() {
            return Err(PipelineError::LengthMismatch {
                what:     "dense matrix".to_string(),
                expected: wide.n_rows(),
                found:    dense.n_rows(),
            }
            .into());
        }
        // Targets are not looked at by the forward pass
        let samples: Vec<WideDeepSample> = wide
            .indices
            .iter()
            .zip(&dense.rows)
            .map(|(w, d)| WideDeepSample { wide: w.clone(), dense: d.clone(), target: 0 })
            .collect();
        self.predict_proba_samples(&samples)
    }

    /// 0/1 prediction for every row, thresholded at 0.5.
    pub fn predict(&self, wide: &WideMatrix, dense: &DenseMatrix) -> Result<Vec<u8>> {
        Ok(to_labels(&self.predict_proba(wide, dense)?))
    }
}

impl Inferencer<InferBackend> {
    /// Rebuild the model from its saved config and load the final weights.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, layout: FeatureLayout) -> Result<Self> {
        let device    = Default::default();
        let model_cfg = ckpt_manager.load_model_config()?;

        if model_cfg.wide.wide_dim != layout.wide_dim {
            return Err(PipelineError::LengthMismatch {
                what:     "wide_dim of the stored model".to_string(),
                expected: layout.wide_dim,
                found:    model_cfg.wide.wide_dim,
            }
            .into());
        }

        let model: WideDeep<InferBackend> = model_cfg.init(&device);
        let model = ckpt_manager.load_final(model, &device)?;
        tracing::info!("Model loaded from '{}'", ckpt_manager.dir().display());
        Ok(Self::new(model, layout, device))
    }
}

pub fn to_labels(probs: &[f32]) -> Vec<u8> {
    probs.iter().map(|&p| u8::from(p >= THRESHOLD)).collect()
}

/// Fraction of positions where `preds` agrees with `truth`.
pub fn accuracy_score(truth: &[u8], preds: &[u8]) -> PipelineResult<f64> {
    if truth.len() != preds.len() {
        return Err(PipelineError::LengthMismatch {
            what:     "predictions".to_string(),
            expected: truth.len(),
            found:    preds.len(),
        });
    }
    if truth.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }
    let hits = truth.iter().zip(preds).filter(|(t, p)| t == p).count();
    Ok(hits as f64 / truth.len() as f64)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::AutodiffModule;
    use burn::optim::{AdamConfig, AdamWConfig};

    use crate::data::{
        dataset::build_samples,
        dense_preprocessor::DensePreprocessor,
        splitter::split_indices,
        wide_preprocessor::WidePreprocessor,
    };
    use crate::domain::table::{Column, Table};
    use crate::ml::model::{DeepDense, DeepDenseConfig, Wide, WideConfig, WideDeepConfig};
    use crate::ml::schedule::Schedule;
    use crate::ml::trainer::{ComponentBinding, FitSettings, Trainer};

    type TrainB = Autodiff<NdArray>;

    #[test]
    fn test_accuracy_score() {
        assert_eq!(accuracy_score(&[1, 0, 1, 1], &[1, 1, 1, 0]).unwrap(), 0.5);
        assert_eq!(accuracy_score(&[0, 0], &[0, 0]).unwrap(), 1.0);
        assert!(accuracy_score(&[1], &[1, 0]).is_err());
        assert_eq!(accuracy_score(&[], &[]).unwrap_err(), PipelineError::EmptyDataset);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(to_labels(&[0.49, 0.5, 0.9]), vec![0, 1, 1]);
    }

    #[test]
    fn test_end_to_end_four_rows() {
        let table = Table::new(vec![
            Column::text("color", vec!["red".into(), "blue".into(), "red".into(), "green".into()]),
            Column::text("shape", vec!["box".into(), "ball".into(), "ball".into(), "box".into()]),
            Column::numeric("size", vec![1.0, 2.5, 3.0, 0.5]),
        ])
        .unwrap();
        let labels = [1u8, 0, 1, 0];

        let (train_idx, test_idx) = split_indices(4, 0.5, 3);
        let train = table.take_rows(&train_idx);
        let test  = table.take_rows(&test_idx);
        let train_labels: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();
        let test_labels:  Vec<u8> = test_idx.iter().map(|&i| labels[i]).collect();

        let mut wide = WidePreprocessor::new(
            vec!["color".into(), "shape".into()],
            vec![("color".into(), "shape".into())],
        );
        let mut dense = DensePreprocessor::new(
            vec![("color".into(), 2), ("shape".into(), 2)],
            vec!["size".into()],
        );
        let x_wide  = wide.fit_transform(&train).unwrap();
        let x_dense = dense.fit_transform(&train).unwrap();
        let layout  = FeatureLayout::from_preprocessors(&wide, &dense).unwrap();

        let model_cfg = WideDeepConfig::new(
            WideConfig::new(layout.wide_dim),
            DeepDenseConfig::new(dense.embeddings_input().unwrap(), 1, vec![4], vec![0.0]),
        );
        let device = Default::default();
        let settings = FitSettings { epochs: 1, batch_size: 2, val_split: 0.0, seed: 1, num_workers: 1 };
        let mut trainer = Trainer::<TrainB, _, _>::new(
            settings,
            ComponentBinding::new(AdamConfig::new().init::<TrainB, Wide<TrainB>>(), Schedule::constant(0.01)),
            ComponentBinding::new(AdamWConfig::new().init::<TrainB, DeepDense<TrainB>>(), Schedule::constant(1e-3)),
        );
        let samples = build_samples(x_wide, x_dense, &train_labels).unwrap();
        let outcome = trainer.fit(model_cfg.init::<TrainB>(&device), samples, layout.clone(), &device).unwrap();
        assert_eq!(outcome.history.len(), 1);

        let inferencer = Inferencer::new(outcome.model.valid(), layout, device).with_batch_size(1);
        let preds = inferencer
            .predict(&wide.transform(&test).unwrap(), &dense.transform(&test).unwrap())
            .unwrap();

        assert_eq!(preds.len(), test_idx.len());
        assert!(preds.iter().all(|&p| p == 0 || p == 1));
        let acc = accuracy_score(&test_labels, &preds).unwrap();
        assert!((0.0..=1.0).contains(&acc));
    }

    #[test]
    fn test_from_checkpoint_rebuilds_the_model() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();
        let cfg = WideDeepConfig::new(WideConfig::new(3), DeepDenseConfig::new(vec![], 1, vec![2], vec![]));
        let model: WideDeep<InferBackend> = cfg.init(&device);
        ckpt.save_model_config(&cfg).unwrap();
        ckpt.save_final(&model).unwrap();

        let layout = FeatureLayout { wide_dim: 3, categorical_idx: vec![], continuous_idx: vec![0] };
        let inferencer = Inferencer::from_checkpoint(&ckpt, layout.clone()).unwrap();
        let samples = vec![WideDeepSample { wide: vec![2], dense: vec![0.3], target: 0 }];
        let restored = inferencer.predict_proba_samples(&samples).unwrap();
        let original = Inferencer::new(model, layout, device).predict_proba_samples(&samples).unwrap();
        // CompactRecorder stores half precision weights
        assert!((restored[0] - original[0]).abs() < 1e-2);

        let wrong = FeatureLayout { wide_dim: 5, categorical_idx: vec![], continuous_idx: vec![0] };
        assert!(Inferencer::from_checkpoint(&ckpt, wrong).is_err());
    }
}
