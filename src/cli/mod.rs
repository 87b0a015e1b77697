// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — fits the Wide & Deep model on a CSV file
//   2. `predict` — loads a checkpoint and scores a CSV file
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "wide-deep-tabular",
    version = "0.1.0",
    about = "Train a Wide & Deep classifier on tabular CSV data, then predict."
)]
pub struct Cli {
    /// The subcommand to run (train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

/// Handles the `train` subcommand.
/// Converts CLI args into a TrainConfig and hands off to Layer 2.
fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on: {}", args.data);
    let report = TrainUseCase::new(args.into()).execute()?;

    if report.stopped_early {
        println!("Stopped early after {} epochs.", report.history.len());
    }
    match report.test_accuracy {
        Some(acc) => println!("Accuracy: {acc:.4}  ({} train rows, {} test rows)", report.n_train, report.n_test),
        None      => println!("Training complete. No test rows to evaluate."),
    }
    Ok(())
}

/// Handles the `predict` subcommand.
fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let report = PredictUseCase::new(args.into()).execute()?;

    println!("Wrote {} predictions to {}", report.n_rows, report.output.display());
    if let Some(acc) = report.accuracy {
        println!("Accuracy: {acc:.4}");
    }
    Ok(())
}
