// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the headerless CSV        (Layer 4 - data)
//   Step 2: Derive age buckets + label     (Layer 4 - data)
//   Step 3: Split train / test rows        (Layer 4 - data)
//   Step 4: Fit preprocessors on train     (Layer 4 - data)
//   Step 5: Encode both splits             (Layer 4 - data)
//   Step 6: Save configs + preprocessors   (Layer 6 - infra)
//   Step 7: Assemble the model             (Layer 5 - ml)
//   Step 8: Run the training loop          (Layer 5 - ml)
//   Step 9: Save final weights, evaluate   (Layers 5 + 6)
//
// The preprocessors only ever see the training rows, so the
// test accuracy is measured on categories the vocabularies may
// not contain.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use std::collections::BTreeMap;
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, AdamWConfig},
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::FeatureLayout,
    dataset::build_samples,
    dense_preprocessor::DensePreprocessor,
    features::FeatureEngineer,
    loader::{normalize_column_name, CsvLoader},
    splitter::split_indices,
    wide_preprocessor::WidePreprocessor,
};
use crate::domain::{error::PipelineError, table::Table, traits::TableSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    preprocessor_store::PreprocessorStore,
};
use crate::ml::{
    callbacks::{CsvLogger, EarlyStopping, LrHistory, ModelCheckpoint},
    inferencer::{accuracy_score, Inferencer},
    model::{DeepArchitecture, DeepDense, DeepDenseConfig, Wide, WideConfig, WideDeepConfig},
    schedule::ScheduleKind,
    scoring::MetricKind,
    trainer::{ComponentBinding, FitSettings, Trainer},
    TrainBackend,
};

// ─── Dataset Schema ──────────────────────────────────────────────────────────
// Which columns exist in the file and what each preprocessor takes.
// Defaults describe the UCI adult census income data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Column names in file order, as written in the header docs
    pub columns:         Vec<String>,
    pub delimiter:       u8,
    pub features:        FeatureEngineer,
    pub wide_cols:       Vec<String>,
    pub crossed_cols:    Vec<(String, String)>,
    /// (column, embedding dimension)
    pub embed_cols:      Vec<(String, usize)>,
    pub continuous_cols: Vec<String>,
}

impl DatasetSchema {
    pub fn adult() -> Self {
        let s = |v: &str| v.to_string();
        let owned = |v: &[&str]| v.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            columns: owned(&[
                "age", "workclass", "fnlwgt", "education", "education-num",
                "marital-status", "occupation", "relationship", "race", "gender",
                "capital-gain", "capital-loss", "hours-per-week", "native-country",
                "income",
            ]),
            delimiter: b',',
            features:  FeatureEngineer::default(),
            wide_cols: owned(&[
                "age_buckets", "education", "relationship", "workclass",
                "occupation", "native_country", "gender",
            ]),
            crossed_cols: vec![
                (s("education"), s("occupation")),
                (s("native_country"), s("occupation")),
            ],
            embed_cols: vec![
                (s("education"), 10),
                (s("relationship"), 8),
                (s("workclass"), 10),
                (s("occupation"), 10),
                (s("native_country"), 10),
            ],
            continuous_cols: vec![s("age"), s("hours_per_week")],
        }
    }

    /// File columns without the raw label, for unlabelled input.
    pub fn unlabelled_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| normalize_column_name(c) != self.features.label_source)
            .cloned()
            .collect()
    }

    pub fn wide_preprocessor(&self) -> WidePreprocessor {
        WidePreprocessor::new(self.wide_cols.clone(), self.crossed_cols.clone())
    }

    pub fn dense_preprocessor(&self, standardize: bool) -> DensePreprocessor {
        DensePreprocessor::new(self.embed_cols.clone(), self.continuous_cols.clone())
            .with_standardize(standardize)
    }
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self::adult()
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved to disk and reloaded for prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:      String,
    pub checkpoint_dir: String,
    /// Fraction of rows held out as the test split
    pub test_size:      f64,
    /// Fraction of the training rows used for per-epoch validation
    pub val_split:      f64,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub seed:           u64,
    pub wide_lr:        f64,
    pub deep_lr:        f64,
    pub wide_step_size: usize,
    pub deep_step_size: usize,
    pub lr_gamma:       f64,
    pub hidden_layers:  Vec<usize>,
    pub dropout:        Vec<f64>,
    pub architecture:   DeepArchitecture,
    pub patience:       usize,
    /// Checkpoint files kept on disk (oldest removed first)
    pub max_checkpoints: usize,
    pub standardize:    bool,
    pub schema:         DatasetSchema,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:       "data/adult.data".to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
            test_size:       0.2,
            val_split:       0.2,
            batch_size:      64,
            epochs:          4,
            seed:            1,
            wide_lr:         0.01,
            deep_lr:         1e-3,
            wide_step_size:  3,
            deep_step_size:  5,
            lr_gamma:        0.1,
            hidden_layers:   vec![64, 32],
            dropout:         vec![0.2, 0.2],
            architecture:    DeepArchitecture::Dense,
            patience:        5,
            max_checkpoints: 3,
            standardize:     false,
            schema:          DatasetSchema::adult(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if !(0.0..1.0).contains(&self.test_size) {
            return invalid(format!("test_size must be in [0, 1), got {}", self.test_size));
        }
        if !(0.0..1.0).contains(&self.val_split) {
            return invalid(format!("val_split must be in [0, 1), got {}", self.val_split));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return invalid("epochs and batch_size must be at least 1".to_string());
        }
        if self.dropout.iter().any(|p| !(0.0..1.0).contains(p)) {
            return invalid(format!("dropout values must be in [0, 1), got {:?}", self.dropout));
        }
        if self.hidden_layers.iter().any(|&h| h == 0) {
            return invalid("hidden layer sizes must be positive".to_string());
        }
        Ok(())
    }
}

/// What a finished run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub n_train:       usize,
    pub n_test:        usize,
    pub history:       Vec<EpochMetrics>,
    pub lr_history:    BTreeMap<String, Vec<f64>>,
    pub stopped_early: bool,
    /// None when the test split is empty
    pub test_accuracy: Option<f64>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    /// Create a new TrainUseCase with the given configuration
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainReport> {
        let cfg    = &self.config;
        let schema = &cfg.schema;
        cfg.validate()?;

        // ── Step 1: Load the CSV ──────────────────────────────────────────────
        tracing::info!("Loading data from '{}'", cfg.data_path);
        let raw = CsvLoader::new(&cfg.data_path, &schema.columns)
            .with_delimiter(schema.delimiter)
            .load()?;
        // An empty file types every column as text, so this must run
        // before feature engineering looks for numeric columns
        if raw.n_rows() == 0 {
            return Err(PipelineError::EmptyDataset.into());
        }

        // ── Step 2: Feature engineering ───────────────────────────────────────
        let table = schema.features.apply(raw)?;

        // ── Step 3: Train / test split ────────────────────────────────────────
        let (train_idx, test_idx) = split_indices(table.n_rows(), cfg.test_size, cfg.seed);
        let train = table.take_rows(&train_idx);
        let test  = table.take_rows(&test_idx);
        tracing::info!("Split: {} train, {} test", train.n_rows(), test.n_rows());

        // ── Step 4: Fit preprocessors on the training rows ────────────────────
        let mut wide  = schema.wide_preprocessor();
        let mut dense = schema.dense_preprocessor(cfg.standardize);
        wide.fit(&train)?;
        dense.fit(&train)?;
        let layout = FeatureLayout::from_preprocessors(&wide, &dense)?;
        tracing::info!(
            "Wide dim {}, {} embeddings, {} continuous",
            layout.wide_dim,
            layout.categorical_idx.len(),
            layout.continuous_idx.len()
        );

        // ── Step 5: Encode ────────────────────────────────────────────────────
        let train_samples = encode(&train, &wide, &dense, &schema.features)?;

        // ── Step 6: Save configs + preprocessors for prediction ───────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        PreprocessorStore::new(&cfg.checkpoint_dir).save(&wide, &dense)?;

        // ── Step 7: Assemble the model ────────────────────────────────────────
        let model_cfg = WideDeepConfig::new(
            WideConfig::new(layout.wide_dim),
            DeepDenseConfig::new(
                dense.embeddings_input()?,
                dense.continuous_cols().len(),
                cfg.hidden_layers.clone(),
                cfg.dropout.clone(),
            )
            .with_architecture(cfg.architecture),
        );
        ckpt_manager.save_model_config(&model_cfg)?;

        let device = Default::default();
        let model  = model_cfg.init::<TrainBackend>(&device);
        tracing::info!("Model ready: hidden={:?}, {:?}", cfg.hidden_layers, cfg.architecture);

        // ── Step 8: Train ─────────────────────────────────────────────────────
        // Adam on the wide part, AdamW on the deep part; both step-decayed
        let wide_binding = ComponentBinding::new(
            AdamConfig::new().init::<TrainBackend, Wide<TrainBackend>>(),
            ScheduleKind::Step { step_size: cfg.wide_step_size, gamma: cfg.lr_gamma }.build(cfg.wide_lr)?,
        );
        let deep_binding = ComponentBinding::new(
            AdamWConfig::new().init::<TrainBackend, DeepDense<TrainBackend>>(),
            ScheduleKind::Step { step_size: cfg.deep_step_size, gamma: cfg.lr_gamma }.build(cfg.deep_lr)?,
        );

        let lr_history = LrHistory::new();
        let lr_records = lr_history.records();
        let settings = FitSettings {
            epochs:      cfg.epochs,
            batch_size:  cfg.batch_size,
            val_split:   cfg.val_split,
            seed:        cfg.seed,
            num_workers: 1,
        };

        let mut trainer = Trainer::<TrainBackend, _, _>::new(settings, wide_binding, deep_binding)
            .with_metrics(vec![MetricKind::Accuracy, MetricKind::Precision])
            .with_callback(Box::new(lr_history))
            .with_callback(Box::new(EarlyStopping::new(cfg.patience)))
            .with_callback(Box::new(
                ModelCheckpoint::new(ckpt_manager.clone()).with_max_save(cfg.max_checkpoints),
            ))
            .with_callback(Box::new(CsvLogger::new(MetricsLogger::new(&cfg.checkpoint_dir)?)));

        let n_train = train_samples.len();
        let outcome = trainer.fit(model, train_samples, layout.clone(), &device)?;

        // ── Step 9: Save final weights and evaluate on the test rows ──────────
        ckpt_manager.save_final(&outcome.model)?;

        let test_accuracy = if test.n_rows() > 0 {
            let inferencer = Inferencer::new(outcome.model.valid(), layout, device);
            let preds = inferencer.predict(&wide.transform(&test)?, &dense.transform(&test)?)?;
            let acc = accuracy_score(&schema.features.labels(&test)?, &preds)?;
            tracing::info!("Test accuracy: {:.4}", acc);
            Some(acc)
        } else {
            tracing::warn!("Empty test split; skipping evaluation");
            None
        };

        let lr_history = lr_records
            .lock()
            .map_err(|_| anyhow::anyhow!("lr history lock poisoned"))?
            .clone();

        Ok(TrainReport {
            n_train,
            n_test: test.n_rows(),
            history: outcome.history,
            lr_history,
            stopped_early: outcome.stopped_early,
            test_accuracy,
        })
    }
}

fn encode(
    table:    &Table,
    wide:     &WidePreprocessor,
    dense:    &DensePreprocessor,
    features: &FeatureEngineer,
) -> Result<Vec<crate::data::dataset::WideDeepSample>> {
    let labels = features.labels(table)?;
    Ok(build_samples(wide.transform(table)?, dense.transform(table)?, &labels)?)
}
