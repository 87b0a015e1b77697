// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop over a Wide & Deep model where every
// component has its own optimiser and learning-rate schedule.
//
// Per epoch:
//   1. schedules step    — once, at the start of the epoch; the
//                          returned rate is used for every batch
//   2. training phase    — forward, BCE-with-logits loss, backward;
//                          the gradients are split per component
//                          with GradientsParams::from_module and
//                          each optimiser steps only its component
//   3. validation phase  — model.valid() on the inner backend, so
//                          dropout is off and no graph is recorded
//   4. metrics           — train_loss, val_loss, train_<m>, val_<m>,
//                          learning rate of each component
//   5. callbacks         — any callback may ask to stop; the loop
//                          leaves only after the epoch is complete
//
// Key Burn insight:
//   - Training runs on B (Autodiff<NdArray>) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - The validation batcher must use B::InnerBackend as well
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam,
//            Loshchilov & Hutter (2019) AdamW

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation::sigmoid, backend::AutodiffBackend},
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{FeatureLayout, WideDeepBatcher},
    dataset::{WideDeepDataset, WideDeepSample},
    splitter::train_test_split,
};
use crate::domain::error::PipelineError;
use crate::infra::metrics::EpochMetrics;
use crate::ml::callbacks::{Callback, CallbackSignal};
use crate::ml::model::{DeepDense, Wide, WideDeep};
use crate::ml::schedule::Schedule;
use crate::ml::scoring::{Metric, MetricKind};

/// An optimiser together with the schedule that drives its lr.
pub struct ComponentBinding<O> {
    pub optimizer: O,
    pub schedule:  Schedule,
}

impl<O> ComponentBinding<O> {
    pub fn new(optimizer: O, schedule: Schedule) -> Self {
        Self { optimizer, schedule }
    }
}

/// Loop-level settings of a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSettings {
    pub epochs:      usize,
    pub batch_size:  usize,
    /// Fraction of the training samples held out for validation
    pub val_split:   f64,
    pub seed:        u64,
    pub num_workers: usize,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self { epochs: 4, batch_size: 64, val_split: 0.2, seed: 42, num_workers: 1 }
    }
}

/// What fit hands back: the final model and one record per epoch run.
pub struct FitOutcome<B: Backend> {
    pub model:         WideDeep<B>,
    pub history:       Vec<EpochMetrics>,
    pub stopped_early: bool,
}

pub struct Trainer<B, OW, OD>
where
    B:  AutodiffBackend,
    OW: Optimizer<Wide<B>, B>,
    OD: Optimizer<DeepDense<B>, B>,
{
    settings:  FitSettings,
    wide:      ComponentBinding<OW>,
    deep:      ComponentBinding<OD>,
    callbacks: Vec<Box<dyn Callback<B>>>,
    metrics:   Vec<MetricKind>,
}

impl<B, OW, OD> Trainer<B, OW, OD>
where
    B:  AutodiffBackend,
    OW: Optimizer<Wide<B>, B>,
    OD: Optimizer<DeepDense<B>, B>,
{
    pub fn new(settings: FitSettings, wide: ComponentBinding<OW>, deep: ComponentBinding<OD>) -> Self {
        Self { settings, wide, deep, callbacks: Vec::new(), metrics: Vec::new() }
    }

    pub fn with_callback(mut self, callback: Box<dyn Callback<B>>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<MetricKind>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn fit(
        &mut self,
        mut model: WideDeep<B>,
        samples:   Vec<WideDeepSample>,
        layout:    FeatureLayout,
        device:    &B::Device,
    ) -> Result<FitOutcome<B>> {
        if samples.is_empty() {
            return Err(PipelineError::EmptyDataset.into());
        }
        if self.settings.batch_size == 0 {
            return Err(PipelineError::InvalidConfig("batch_size must be at least 1".into()).into());
        }

        // ── Internal validation split ─────────────────────────────────────────
        let (train_samples, val_samples) =
            train_test_split(samples, self.settings.val_split, self.settings.seed);
        if train_samples.is_empty() {
            return Err(PipelineError::EmptyDataset.into());
        }
        tracing::info!(
            "Fitting on {} samples, validating on {}",
            train_samples.len(),
            val_samples.len()
        );

        // ── Training data loader (AutodiffBackend) ────────────────────────────
        let train_batcher = WideDeepBatcher::<B>::new(device.clone(), layout.clone());
        let train_loader  = DataLoaderBuilder::new(train_batcher)
            .batch_size(self.settings.batch_size)
            .shuffle(self.settings.seed)
            .num_workers(self.settings.num_workers.max(1))
            .build(WideDeepDataset::new(train_samples));

        // ── Validation data loader (InnerBackend — no autodiff overhead) ──────
        let val_loader = (!val_samples.is_empty()).then(|| {
            let val_batcher = WideDeepBatcher::<B::InnerBackend>::new(device.clone(), layout.clone());
            DataLoaderBuilder::new(val_batcher)
                .batch_size(self.settings.batch_size)
                .num_workers(self.settings.num_workers.max(1))
                .build(WideDeepDataset::new(val_samples))
        });

        let mut train_scores: Vec<Box<dyn Metric>> = self.metrics.iter().map(MetricKind::build).collect();
        let mut val_scores:   Vec<Box<dyn Metric>> = self.metrics.iter().map(MetricKind::build).collect();

        for callback in self.callbacks.iter_mut() {
            callback.on_train_begin()?;
        }

        let mut history       = Vec::with_capacity(self.settings.epochs);
        let mut stopped_early = false;

        // ── Epoch loop ────────────────────────────────────────────────────────
        for epoch in 1..=self.settings.epochs {
            let wide_lr = self.wide.schedule.step();
            let deep_lr = self.deep.schedule.step();

            // ── Training phase ────────────────────────────────────────────────
            train_scores.iter_mut().for_each(|m| m.reset());
            let mut train_loss_sum = 0.0f64;
            let mut train_batches  = 0usize;

            for batch in train_loader.iter() {
                let labels = batch.labels.clone();
                let (loss, logits) = model.forward_loss(batch);

                train_loss_sum += loss.clone().into_scalar().elem::<f64>();
                train_batches  += 1;

                let probs = probabilities(logits.detach())?;
                train_scores.iter_mut().for_each(|m| m.update(&probs, &labels));

                // Backward pass, then one step per component
                let mut grads   = loss.backward();
                let wide_grads  = GradientsParams::from_module(&mut grads, &model.wide);
                let deep_grads  = GradientsParams::from_module(&mut grads, &model.deep);
                model.wide = self.wide.optimizer.step(wide_lr, model.wide, wide_grads);
                model.deep = self.deep.optimizer.step(deep_lr, model.deep, deep_grads);
            }

            let avg_train_loss = if train_batches > 0 {
                train_loss_sum / train_batches as f64
            } else { f64::NAN };

            // ── Validation phase ──────────────────────────────────────────────
            // model.valid() → WideDeep<B::InnerBackend>, dropout disabled
            let avg_val_loss = match &val_loader {
                Some(loader) => {
                    let model_valid = model.valid();
                    val_scores.iter_mut().for_each(|m| m.reset());
                    let mut val_loss_sum = 0.0f64;
                    let mut val_batches  = 0usize;

                    for batch in loader.iter() {
                        let labels = batch.labels.clone();
                        let (loss, logits) = model_valid.forward_loss(batch);
                        val_loss_sum += loss.into_scalar().elem::<f64>();
                        val_batches  += 1;

                        let probs = probabilities(logits)?;
                        val_scores.iter_mut().for_each(|m| m.update(&probs, &labels));
                    }
                    (val_batches > 0).then(|| val_loss_sum / val_batches as f64)
                }
                None => None,
            };

            // ── Epoch record ──────────────────────────────────────────────────
            let mut record = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss);
            for m in &train_scores {
                record.scores.insert(format!("train_{}", m.name()), m.compute());
            }
            if avg_val_loss.is_some() {
                for m in &val_scores {
                    record.scores.insert(format!("val_{}", m.name()), m.compute());
                }
            }
            record.learning_rates.insert("wide".to_string(), wide_lr);
            record.learning_rates.insert("deep".to_string(), deep_lr);

            println!("{}", epoch_summary(&record, self.settings.epochs));

            // ── Callbacks ─────────────────────────────────────────────────────
            let mut stop = false;
            for callback in self.callbacks.iter_mut() {
                if callback.on_epoch_end(&record, &model)? == CallbackSignal::Stop {
                    tracing::debug!("{} requested stop after epoch {}", callback.name(), epoch);
                    stop = true;
                }
            }
            history.push(record);

            if stop {
                stopped_early = true;
                break;
            }
        }

        for callback in self.callbacks.iter_mut() {
            model = callback.on_train_end(model)?;
        }

        tracing::info!("Training complete after {} epochs", history.len());
        Ok(FitOutcome { model, history, stopped_early })
    }
}

/// Sigmoid over logits, copied to the host.
pub fn probabilities<B: Backend>(logits: Tensor<B, 1>) -> Result<Vec<f32>> {
    sigmoid(logits)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))
}

fn epoch_summary(m: &EpochMetrics, epochs: usize) -> String {
    let mut line = format!("Epoch {:>3}/{} | train_loss={:.4}", m.epoch, epochs, m.train_loss);
    if let Some(v) = m.val_loss {
        line.push_str(&format!(" | val_loss={v:.4}"));
    }
    for (name, value) in &m.scores {
        line.push_str(&format!(" | {name}={value:.4}"));
    }
    line
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::{AdamConfig, AdamWConfig};

    use crate::ml::model::{DeepDenseConfig, WideConfig, WideDeepConfig};
    use crate::ml::schedule::ScheduleKind;

    type TestBackend = Autodiff<NdArray>;

    fn layout() -> FeatureLayout {
        FeatureLayout { wide_dim: 3, categorical_idx: vec![], continuous_idx: vec![0] }
    }

    fn samples(n: usize) -> Vec<WideDeepSample> {
        (0..n)
            .map(|i| WideDeepSample {
                wide:   vec![(i % 3) as u32 + 1],
                dense:  vec![i as f32 / n as f32],
                target: (i % 2) as u8,
            })
            .collect()
    }

    fn model() -> WideDeep<TestBackend> {
        WideDeepConfig::new(WideConfig::new(3), DeepDenseConfig::new(vec![], 1, vec![4], vec![0.1]))
            .init(&Default::default())
    }

    fn trainer(
        epochs: usize,
        wide_schedule: Schedule,
    ) -> Trainer<TestBackend, impl Optimizer<Wide<TestBackend>, TestBackend>, impl Optimizer<DeepDense<TestBackend>, TestBackend>> {
        let settings = FitSettings { epochs, batch_size: 4, val_split: 0.25, seed: 7, num_workers: 1 };
        Trainer::<TestBackend, _, _>::new(
            settings,
            ComponentBinding::new(AdamConfig::new().init::<TestBackend, Wide<TestBackend>>(), wide_schedule),
            ComponentBinding::new(
                AdamWConfig::new().init::<TestBackend, DeepDense<TestBackend>>(),
                Schedule::constant(1e-3),
            ),
        )
        .with_metrics(vec![MetricKind::Accuracy, MetricKind::Precision])
    }

    struct StopAtOnce;

    impl Callback<TestBackend> for StopAtOnce {
        fn name(&self) -> &'static str { "StopAtOnce" }
        fn on_epoch_end(&mut self, _: &EpochMetrics, _: &WideDeep<TestBackend>) -> Result<CallbackSignal> {
            Ok(CallbackSignal::Stop)
        }
    }

    #[test]
    fn test_fit_records_every_epoch() {
        let mut t = trainer(3, ScheduleKind::Step { step_size: 2, gamma: 0.1 }.build(0.01).unwrap());
        let outcome = t.fit(model(), samples(16), layout(), &Default::default()).unwrap();

        assert_eq!(outcome.history.len(), 3);
        assert!(!outcome.stopped_early);
        let first = &outcome.history[0];
        assert!(first.train_loss.is_finite());
        assert!(first.val_loss.is_some());
        assert!(first.scores.contains_key("train_acc"));
        assert!(first.scores.contains_key("val_prec"));
        // One scheduler step per epoch: decays after two epochs, not two batches
        let wide_lrs: Vec<f64> = outcome.history.iter().map(|r| r.learning_rates["wide"]).collect();
        assert!((wide_lrs[0] - 0.01).abs() < 1e-12);
        assert!((wide_lrs[1] - 0.01).abs() < 1e-12);
        assert!((wide_lrs[2] - 0.001).abs() < 1e-12);
        assert!((first.learning_rates["deep"] - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn test_stop_takes_effect_after_the_epoch() {
        let mut t = trainer(5, Schedule::constant(0.01)).with_callback(Box::new(StopAtOnce));
        let outcome = t.fit(model(), samples(8), layout(), &Default::default()).unwrap();
        assert!(outcome.stopped_early);
        assert_eq!(outcome.history.len(), 1);
    }

    #[test]
    fn test_no_validation_split() {
        let mut t = trainer(1, Schedule::constant(0.01));
        t.settings.val_split = 0.0;
        let outcome = t.fit(model(), samples(6), layout(), &Default::default()).unwrap();
        assert_eq!(outcome.history[0].val_loss, None);
        assert!(!outcome.history[0].scores.contains_key("val_acc"));
    }

    #[test]
    fn test_empty_samples_rejected() {
        let mut t = trainer(1, Schedule::constant(0.01));
        assert!(t.fit(model(), vec![], layout(), &Default::default()).is_err());
    }
}
