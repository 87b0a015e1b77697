// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a CSV file on disk to tensor batches.
//
//   adult.csv
//       │
//       ▼
//   CsvLoader          → typed Table with named columns
//       │
//       ▼
//   FeatureEngineer    → age_buckets, income_label
//       │
//       ├──────────────────────┐
//       ▼                      ▼
//   WidePreprocessor     DensePreprocessor
//   (one-hot + crosses)  (embedding indices + continuous)
//       │                      │
//       └──────────┬───────────┘
//                  ▼
//   WideDeepDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   WideDeepBatcher    → stacks samples into tensor batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads headerless CSV files into a Table
pub mod loader;

/// Derived columns: age buckets and the binary label
pub mod features;

/// One-hot / crossed encoding for the wide component
pub mod wide_preprocessor;

/// Embedding indices and continuous values for the deep component
pub mod dense_preprocessor;

/// Implements Burn's Dataset trait for encoded samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train/test and train/validation splits
pub mod splitter;
