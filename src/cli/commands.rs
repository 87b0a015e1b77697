// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, lists, enums)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::predict_use_case::PredictConfig;
use crate::application::train_use_case::TrainConfig;
use crate::ml::model::DeepArchitecture;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the Wide & Deep model on a headerless CSV file
    Train(TrainArgs),

    /// Predict with a trained checkpoint and write a predictions CSV
    Predict(PredictArgs),
}

/// Network behind the embeddings in the deep component
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ArchitectureArg {
    Dense,
    Resnet,
}

impl From<ArchitectureArg> for DeepArchitecture {
    fn from(a: ArchitectureArg) -> Self {
        match a {
            ArchitectureArg::Dense  => DeepArchitecture::Dense,
            ArchitectureArg::Resnet => DeepArchitecture::Resnet,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Headerless CSV in the adult column order
    #[arg(long)]
    pub data: String,

    /// Directory for weights, configs, preprocessors and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Number of full passes through the training rows
    #[arg(long, default_value_t = 4)]
    pub epochs: usize,

    /// Rows per mini-batch
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Fraction of rows held out for the final accuracy
    #[arg(long, default_value_t = 0.2)]
    pub test_size: f64,

    /// Fraction of the training rows used for per-epoch validation
    #[arg(long, default_value_t = 0.2)]
    pub val_split: f64,

    /// Seed for the splits and batch shuffling
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Hidden layer sizes of the deep component, e.g. 64,32
    #[arg(long, value_delimiter = ',', default_value = "64,32")]
    pub hidden_layers: Vec<usize>,

    /// Dropout per hidden layer, e.g. 0.2,0.2
    #[arg(long, value_delimiter = ',', default_value = "0.2,0.2")]
    pub dropout: Vec<f64>,

    #[arg(long, value_enum, default_value_t = ArchitectureArg::Dense)]
    pub architecture: ArchitectureArg,

    /// Epochs without val_loss improvement before stopping
    #[arg(long, default_value_t = 5)]
    pub patience: usize,

    /// Standardise continuous columns with training mean/std
    #[arg(long)]
    pub standardize: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:      a.data,
            checkpoint_dir: a.checkpoint_dir,
            epochs:         a.epochs,
            batch_size:     a.batch_size,
            test_size:      a.test_size,
            val_split:      a.val_split,
            seed:           a.seed,
            hidden_layers:  a.hidden_layers,
            dropout:        a.dropout,
            architecture:   a.architecture.into(),
            patience:       a.patience,
            standardize:    a.standardize,
            ..TrainConfig::default()
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Headerless CSV in the same column order used for training
    #[arg(long)]
    pub data: String,

    /// Directory where `train` saved its artifacts
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Where to write row,probability,prediction
    #[arg(long, default_value = "preds.csv")]
    pub output: PathBuf,

    /// The file has no label column
    #[arg(long)]
    pub no_labels: bool,
}

impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            data_path:      a.data,
            checkpoint_dir: a.checkpoint_dir,
            output:         a.output,
            has_labels:     !a.no_labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::Cli;
    use crate::cli::commands::Commands;
    use crate::application::train_use_case::TrainConfig;
    use crate::ml::model::DeepArchitecture;
    use clap::Parser;

    #[test]
    fn test_train_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "wide-deep-tabular", "train", "--data", "adult.data",
            "--hidden-layers", "16,8", "--dropout", "0.1",
            "--architecture", "resnet", "--standardize",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.hidden_layers, vec![16, 8]);
        assert_eq!(cfg.dropout, vec![0.1]);
        assert_eq!(cfg.architecture, DeepArchitecture::Resnet);
        assert!(cfg.standardize);
        assert_eq!(cfg.epochs, 4);
    }

    #[test]
    fn test_predict_requires_data() {
        assert!(Cli::try_parse_from(["wide-deep-tabular", "predict"]).is_err());
    }
}
