// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Applies a trained model to a new CSV file:
//
//   Step 1: Read train_config.json           (Layer 6 - infra)
//   Step 2: Load the fitted preprocessors    (Layer 6 - infra)
//   Step 3: Load + feature-engineer the CSV  (Layer 4 - data)
//   Step 4: Encode with the stored vocabs    (Layer 4 - data)
//   Step 5: Rebuild model, predict           (Layer 5 - ml)
//   Step 6: Write row,probability,prediction (csv crate)
//
// When the file carries the raw label column the accuracy of the
// predictions is reported as well.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::{batcher::FeatureLayout, loader::CsvLoader};
use crate::domain::{error::PipelineError, traits::TableSource};
use crate::infra::{checkpoint::CheckpointManager, preprocessor_store::PreprocessorStore};
use crate::ml::inferencer::{accuracy_score, to_labels, Inferencer};

#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub data_path:      String,
    pub checkpoint_dir: String,
    pub output:         PathBuf,
    /// Whether the input still has the label column at the end
    pub has_labels:     bool,
}

#[derive(Debug, Clone)]
pub struct PredictReport {
    pub n_rows:   usize,
    pub output:   PathBuf,
    pub accuracy: Option<f64>,
}

pub struct PredictUseCase {
    config: PredictConfig,
}

impl PredictUseCase {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PredictReport> {
        let cfg = &self.config;

        // ── Step 1 + 2: Restore training-time artifacts ───────────────────────
        let ckpt_manager  = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let train_cfg     = ckpt_manager.load_config()?;
        let schema        = &train_cfg.schema;
        let (wide, dense) = PreprocessorStore::new(&cfg.checkpoint_dir).load()?;

        // ── Step 3: Load and derive features ──────────────────────────────────
        let columns = if cfg.has_labels { schema.columns.clone() } else { schema.unlabelled_columns() };
        tracing::info!("Loading data from '{}'", cfg.data_path);
        let raw = CsvLoader::new(&cfg.data_path, &columns)
            .with_delimiter(schema.delimiter)
            .load()?;
        if raw.n_rows() == 0 {
            return Err(PipelineError::EmptyDataset.into());
        }
        let table = schema.features.apply(raw)?;

        // ── Step 4: Encode ────────────────────────────────────────────────────
        let x_wide  = wide.transform(&table)?;
        let x_dense = dense.transform(&table)?;
        let layout  = FeatureLayout::from_preprocessors(&wide, &dense)?;

        // ── Step 5: Predict ───────────────────────────────────────────────────
        let inferencer = Inferencer::from_checkpoint(&ckpt_manager, layout)?
            .with_batch_size(train_cfg.batch_size);
        let probs = inferencer.predict_proba(&x_wide, &x_dense)?;
        let preds = to_labels(&probs);

        // ── Step 6: Write predictions ─────────────────────────────────────────
        write_predictions(&cfg.output, &probs, &preds)?;
        tracing::info!("Wrote {} predictions to '{}'", preds.len(), cfg.output.display());

        let accuracy = if table.has_column(&schema.features.label_column) {
            let truth = schema.features.labels(&table)?;
            Some(accuracy_score(&truth, &preds)?)
        } else {
            None
        };

        Ok(PredictReport { n_rows: preds.len(), output: cfg.output.clone(), accuracy })
    }
}

fn write_predictions(path: &PathBuf, probs: &[f32], preds: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot write predictions to '{}'", path.display()))?;
    writer.write_record(["row", "probability", "prediction"])?;
    for (row, (p, y)) in probs.iter().zip(preds).enumerate() {
        writer.write_record([row.to_string(), format!("{p:.6}"), y.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{
        tests::{small_config, write_adult_csv},
        TrainUseCase,
    };

    #[test]
    fn test_predict_after_train() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = dir.path().join("ckpt");
        let data = write_adult_csv(dir.path(), 30, true);
        TrainUseCase::new(small_config(data.clone(), &ckpt)).execute().unwrap();

        let output = dir.path().join("out").join("preds.csv");
        let report = PredictUseCase::new(PredictConfig {
            data_path:      data,
            checkpoint_dir: ckpt.to_str().unwrap().to_string(),
            output:         output.clone(),
            has_labels:     true,
        })
        .execute()
        .unwrap();

        assert_eq!(report.n_rows, 30);
        assert!(report.accuracy.is_some());

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "row,probability,prediction");
        assert_eq!(lines.len(), 31);
        assert!(lines[1].starts_with("0,"));
        assert!(lines[1].ends_with(",0") || lines[1].ends_with(",1"));
    }

    #[test]
    fn test_predict_unlabelled_file() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = dir.path().join("ckpt");
        let data = write_adult_csv(dir.path(), 20, true);
        TrainUseCase::new(small_config(data, &ckpt)).execute().unwrap();

        let unlabelled = write_adult_csv(dir.path(), 5, false);
        let report = PredictUseCase::new(PredictConfig {
            data_path:      unlabelled,
            checkpoint_dir: ckpt.to_str().unwrap().to_string(),
            output:         dir.path().join("preds.csv"),
            has_labels:     false,
        })
        .execute()
        .unwrap();

        assert_eq!(report.n_rows, 5);
        assert_eq!(report.accuracy, None);
    }

    #[test]
    fn test_predict_file_without_rows_is_empty_dataset() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = dir.path().join("ckpt");
        let data = write_adult_csv(dir.path(), 20, true);
        TrainUseCase::new(small_config(data, &ckpt)).execute().unwrap();

        let empty = dir.path().join("empty.data");
        std::fs::write(&empty, "| only a comment\n").unwrap();
        let err = PredictUseCase::new(PredictConfig {
            data_path:      empty.to_str().unwrap().to_string(),
            checkpoint_dir: ckpt.to_str().unwrap().to_string(),
            output:         dir.path().join("preds.csv"),
            has_labels:     true,
        })
        .execute()
        .unwrap_err();
        assert_eq!(err.downcast_ref::<PipelineError>(), Some(&PipelineError::EmptyDataset));
    }

    #[test]
    fn test_predict_without_training_fails() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_adult_csv(dir.path(), 3, true);
        let result = PredictUseCase::new(PredictConfig {
            data_path:      data,
            checkpoint_dir: dir.path().join("empty").to_str().unwrap().to_string(),
            output:         dir.path().join("preds.csv"),
            has_labels:     true,
        })
        .execute();
        assert!(result.is_err());
    }
}
