// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// File layout in the checkpoint directory:
//   wd_out_1.mpk           ← weights after epoch 1 (ModelCheckpoint)
//   wd_out_2.mpk
//   latest_epoch.json      ← number of the latest epoch file
//   wide_deep.mpk          ← final weights after training
//   model_config.json      ← WideDeepConfig, to rebuild the model
//   train_config.json      ← the run's TrainConfig
//
// CompactRecorder writes named MessagePack at half precision and
// appends its own extension, which epoch_file() and final_file()
// take from the recorder. Loading fails if the architecture does
// not match the record.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};
use serde_json;

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{WideDeep, WideDeepConfig};
use crate::ml::InferBackend;

const FINAL_MODEL: &str = "wide_deep";

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    /// Path to the directory where checkpoints are stored
    dir:    PathBuf,
    /// File stem for per-epoch weights
    prefix: String,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, prefix: "wd_out".to_string() })
    }

    /// Extension CompactRecorder appends to every weights file.
    pub fn record_extension() -> &'static str {
        <CompactRecorder as FileRecorder<InferBackend>>::file_extension()
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn epoch_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{}_{epoch}", self.prefix))
    }

    /// Weights file written for `epoch`, e.g. wd_out_3.mpk
    pub fn epoch_file(&self, epoch: usize) -> PathBuf {
        self.epoch_path(epoch).with_extension(Self::record_extension())
    }

    pub fn final_file(&self) -> PathBuf {
        self.dir.join(FINAL_MODEL).with_extension(Self::record_extension())
    }

    fn save_record<B: Backend>(&self, model: &WideDeep<B>, path: PathBuf) -> Result<()> {
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))
    }

    fn load_record<B: Backend>(
        &self,
        model:  WideDeep<B>,
        path:   PathBuf,
        device: &B::Device,
    ) -> Result<WideDeep<B>> {
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;
        Ok(model.load_record(record))
    }

    /// Save model weights for a given epoch and update latest_epoch.json.
    pub fn save_epoch<B: Backend>(&self, model: &WideDeep<B>, epoch: usize) -> Result<()> {
        self.save_record(model, self.epoch_path(epoch))?;

        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Delete the weights file of an epoch.
    pub fn remove_epoch(&self, epoch: usize) -> Result<()> {
        let path = self.epoch_file(epoch);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Cannot remove '{}'", path.display()))?;
            tracing::debug!("Removed checkpoint: epoch {}", epoch);
        }
        Ok(())
    }

    pub fn load_epoch<B: Backend>(
        &self,
        model:  WideDeep<B>,
        epoch:  usize,
        device: &B::Device,
    ) -> Result<WideDeep<B>> {
        self.load_record(model, self.epoch_path(epoch), device)
    }

    /// Load weights from the latest per-epoch checkpoint.
    pub fn load_latest<B: Backend>(&self, model: WideDeep<B>, device: &B::Device) -> Result<WideDeep<B>> {
        let epoch = self.latest_epoch()?;
        tracing::info!("Loading checkpoint from epoch {}", epoch);
        self.load_epoch(model, epoch, device)
    }

    /// Save the weights the run finished with.
    pub fn save_final<B: Backend>(&self, model: &WideDeep<B>) -> Result<()> {
        self.save_record(model, self.dir.join(FINAL_MODEL))?;
        tracing::info!("Saved final model to '{}'", self.final_file().display());
        Ok(())
    }

    pub fn load_final<B: Backend>(&self, model: WideDeep<B>, device: &B::Device) -> Result<WideDeep<B>> {
        self.load_record(model, self.dir.join(FINAL_MODEL), device)
    }

    /// Save the model hyperparameters so prediction can rebuild the
    /// exact architecture before loading weights into it.
    pub fn save_model_config(&self, cfg: &WideDeepConfig) -> Result<()> {
        let path = self.dir.join("model_config.json");
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<WideDeepConfig> {
        let path = self.dir.join("model_config.json");
        WideDeepConfig::load(&path).map_err(|e| {
            anyhow::anyhow!(
                "Cannot read model config from '{}': {e:?}. Make sure you have run 'train' before 'predict'.",
                path.display()
            )
        })
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration from JSON.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'predict'.",
                    path.display()
                )
            })?;

        Ok(serde_json::from_str(&json)?)
    }

    /// Read latest_epoch.json and return the epoch number.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");

        let s = fs::read_to_string(&path)
            .with_context(|| {
                "Cannot find 'latest_epoch.json'. \
                 Have you run 'train' first?"
            })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
