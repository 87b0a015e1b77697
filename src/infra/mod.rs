// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem concerns shared by training and prediction:
//
//   checkpoint.rs         — model weights (Burn CompactRecorder),
//                           model and training configs as JSON
//
//   preprocessor_store.rs — fitted wide/dense preprocessors, so
//                           prediction encodes rows with the same
//                           vocabularies as training
//
//   metrics.rs            — per-epoch metrics and the CSV logger
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Fitted preprocessor persistence
pub mod preprocessor_store;

/// Epoch metrics and CSV logger
pub mod metrics;
