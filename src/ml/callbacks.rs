// ============================================================
// Layer 5 — Training Callbacks
// ============================================================
// Hooks the trainer calls around the epoch loop:
//
//   on_train_begin()               once, before epoch 1
//   on_epoch_end(metrics, model)   after validation of every epoch;
//                                  may return CallbackSignal::Stop
//   on_train_end(model)            once, may hand back a different
//                                  model (restored best weights)
//
// A Stop signal only takes effect at the epoch boundary: the
// trainer finishes the current epoch, runs the remaining
// callbacks for it, then leaves the loop.
//
// Provided callbacks:
//   LrHistory        — learning rate per component per epoch
//   EarlyStopping    — stop after `patience` epochs without improvement
//   ModelCheckpoint  — write weights every epoch or on improvement
//   CsvLogger        — append every epoch to metrics.csv

use anyhow::Result;
use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
};
use burn::prelude::*;

use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::WideDeep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackSignal {
    Continue,
    Stop,
}

pub trait Callback<B: Backend>: Send {
    fn name(&self) -> &'static str;

    fn on_train_begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics, model: &WideDeep<B>) -> Result<CallbackSignal>;

    fn on_train_end(&mut self, model: WideDeep<B>) -> Result<WideDeep<B>> {
        Ok(model)
    }
}

// ─── Monitor ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Min,
    Max,
    /// Min for names ending in "loss", Max otherwise
    Auto,
}

/// Tracks the best value of one logged quantity.
#[derive(Debug, Clone)]
pub struct Monitor {
    pub key:   String,
    minimize:  bool,
    min_delta: f64,
    best:      Option<f64>,
}

impl Monitor {
    pub fn new(key: impl Into<String>, mode: MonitorMode, min_delta: f64) -> Self {
        let key = key.into();
        let minimize = match mode {
            MonitorMode::Min  => true,
            MonitorMode::Max  => false,
            MonitorMode::Auto => key.ends_with("loss"),
        };
        Self { key, minimize, min_delta: min_delta.abs(), best: None }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Record `value`; true if it beats the best so far by min_delta.
    pub fn improved(&mut self, value: f64) -> bool {
        let better = match self.best {
            None => true,
            Some(best) if self.minimize => value < best - self.min_delta,
            Some(best)                  => value > best + self.min_delta,
        };
        if better {
            self.best = Some(value);
        }
        better
    }
}

// ─── LrHistory ────────────────────────────────────────────────────────────────
pub type LrRecords = Arc<Mutex<BTreeMap<String, Vec<f64>>>>;

#[derive(Debug, Default)]
pub struct LrHistory {
    records: LrRecords,
}

impl LrHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle the caller keeps to read the history after fit.
    pub fn records(&self) -> LrRecords {
        Arc::clone(&self.records)
    }
}

impl<B: Backend> Callback<B> for LrHistory {
    fn name(&self) -> &'static str {
        "LrHistory"
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics, _model: &WideDeep<B>) -> Result<CallbackSignal> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("lr history lock poisoned"))?;
        for (component, &lr) in &metrics.learning_rates {
            records.entry(component.clone()).or_default().push(lr);
        }
        Ok(CallbackSignal::Continue)
    }
}

// ─── EarlyStopping ────────────────────────────────────────────────────────────
pub struct EarlyStopping<B: Backend> {
    monitor:              Monitor,
    patience:             usize,
    wait:                 usize,
    stopped_epoch:        Option<usize>,
    restore_best_weights: bool,
    best_model:           Option<WideDeep<B>>,
}

impl<B: Backend> EarlyStopping<B> {
    pub fn new(patience: usize) -> Self {
        Self {
            monitor:              Monitor::new("val_loss", MonitorMode::Auto, 0.0),
            patience,
            wait:                 0,
            stopped_epoch:        None,
            restore_best_weights: false,
            best_model:           None,
        }
    }

    pub fn with_monitor(mut self, key: &str, mode: MonitorMode, min_delta: f64) -> Self {
        self.monitor = Monitor::new(key, mode, min_delta);
        self
    }

    pub fn with_restore_best_weights(mut self, restore: bool) -> Self {
        self.restore_best_weights = restore;
        self
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }
}

impl<B: Backend> Callback<B> for EarlyStopping<B> {
    fn name(&self) -> &'static str {
        "EarlyStopping"
    }

    fn on_train_begin(&mut self) -> Result<()> {
        self.wait = 0;
        self.stopped_epoch = None;
        Ok(())
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics, model: &WideDeep<B>) -> Result<CallbackSignal> {
        let Some(value) = metrics.get(&self.monitor.key) else {
            tracing::warn!("EarlyStopping: '{}' not logged; ignoring", self.monitor.key);
            return Ok(CallbackSignal::Continue);
        };

        if self.monitor.improved(value) {
            self.wait = 0;
            if self.restore_best_weights {
                self.best_model = Some(model.clone());
            }
            return Ok(CallbackSignal::Continue);
        }

        self.wait += 1;
        if self.wait >= self.patience {
            self.stopped_epoch = Some(metrics.epoch);
            tracing::info!(
                "Early stopping at epoch {}: '{}' has not improved for {} epochs (best {:?})",
                metrics.epoch,
                self.monitor.key,
                self.wait,
                self.monitor.best()
            );
            return Ok(CallbackSignal::Stop);
        }
        Ok(CallbackSignal::Continue)
    }

    fn on_train_end(&mut self, model: WideDeep<B>) -> Result<WideDeep<B>> {
        match self.best_model.take() {
            Some(best) if self.restore_best_weights => {
                tracing::info!("Restoring weights with best '{}'", self.monitor.key);
                Ok(best)
            }
            _ => Ok(model),
        }
    }
}

// ─── ModelCheckpoint ──────────────────────────────────────────────────────────
pub struct ModelCheckpoint {
    manager:        CheckpointManager,
    monitor:        Monitor,
    save_best_only: bool,
    max_save:       Option<usize>,
    saved:          VecDeque<usize>,
    best_epoch:     Option<usize>,
}

impl ModelCheckpoint {
    pub fn new(manager: CheckpointManager) -> Self {
        Self {
            manager,
            monitor:        Monitor::new("val_loss", MonitorMode::Auto, 0.0),
            save_best_only: false,
            max_save:       None,
            saved:          VecDeque::new(),
            best_epoch:     None,
        }
    }

    pub fn with_monitor(mut self, key: &str, mode: MonitorMode) -> Self {
        self.monitor = Monitor::new(key, mode, 0.0);
        self
    }

    pub fn with_save_best_only(mut self, save_best_only: bool) -> Self {
        self.save_best_only = save_best_only;
        self
    }

    /// Keep at most `n` epoch files, deleting the oldest.
    pub fn with_max_save(mut self, n: usize) -> Self {
        self.max_save = Some(n.max(1));
        self
    }
}

impl<B: Backend> Callback<B> for ModelCheckpoint {
    fn name(&self) -> &'static str {
        "ModelCheckpoint"
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics, model: &WideDeep<B>) -> Result<CallbackSignal> {
        let improved = match metrics.get(&self.monitor.key) {
            Some(value) => self.monitor.improved(value),
            None        => false,
        };
        if improved {
            self.best_epoch = Some(metrics.epoch);
        }

        if self.save_best_only && !improved {
            return Ok(CallbackSignal::Continue);
        }

        self.manager.save_epoch(model, metrics.epoch)?;
        self.saved.push_back(metrics.epoch);

        if let Some(max) = self.max_save {
            while self.saved.len() > max {
                if let Some(old) = self.saved.pop_front() {
                    self.manager.remove_epoch(old)?;
                }
            }
        }
        Ok(CallbackSignal::Continue)
    }

    fn on_train_end(&mut self, model: WideDeep<B>) -> Result<WideDeep<B>> {
        if let Some(epoch) = self.best_epoch {
            tracing::info!(
                "Best '{}' = {:?} at epoch {}",
                self.monitor.key,
                self.monitor.best(),
                epoch
            );
        }
        Ok(model)
    }
}

// ─── CsvLogger ────────────────────────────────────────────────────────────────
pub struct CsvLogger {
    logger: MetricsLogger,
}

impl CsvLogger {
    pub fn new(logger: MetricsLogger) -> Self {
        Self { logger }
    }
}

impl<B: Backend> Callback<B> for CsvLogger {
    fn name(&self) -> &'static str {
        "CsvLogger"
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics, _model: &WideDeep<B>) -> Result<CallbackSignal> {
        self.logger.log(metrics)?;
        Ok(CallbackSignal::Continue)
    }
}
