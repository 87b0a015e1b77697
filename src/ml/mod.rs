// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The model, the fit loop and everything the loop plugs in.
// Tensors only show up here and in the data layer's batcher;
// preprocessing and the use cases work on plain Rust values.
//
// What's in this layer:
//
//   model.rs      — Wide & Deep architecture
//                   • Wide: linear layer over the one-hot matrix
//                   • DeepDense: per-column embeddings + continuous
//                     values through dense layers or residual blocks
//                   • WideDeep: sum of both logits, BCE-with-logits loss
//
//   trainer.rs    — The training loop
//                   One optimiser and lr schedule per component,
//                   internal validation split, per-epoch metrics
//
//   callbacks.rs  — LrHistory, EarlyStopping, ModelCheckpoint, CsvLogger
//
//   schedule.rs   — Constant, step and exponential lr schedules
//
//   scoring.rs    — Accuracy, precision, recall, F1 at a 0.5 threshold
//
//   inferencer.rs — Batched probabilities, 0/1 predictions, accuracy
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Cheng et al. (2016) Wide & Deep Learning for Recommender Systems

use burn::backend::{Autodiff, NdArray};

/// Backend used while fitting (gradients recorded)
pub type TrainBackend = Autodiff<NdArray>;

/// Backend used for validation and prediction
pub type InferBackend = NdArray;

/// Wide, deep and composed model architecture
pub mod model;

/// Full training loop with validation and callbacks
pub mod trainer;

/// Epoch-end hooks: lr history, early stopping, checkpoints, CSV log
pub mod callbacks;

/// Learning-rate schedules stepped once per epoch
pub mod schedule;

/// Binary classification metrics
pub mod scoring;

/// Inference engine — batched predictions and accuracy
pub mod inferencer;
