// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe the tabular data the rest of
// the system passes around:
//
//   table.rs  — named, typed columns loaded from a CSV file
//   error.rs  — the PipelineError taxonomy
//   traits.rs — seams other layers implement
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A column-oriented table of raw or derived records
pub mod table;

// Errors raised by the data and model layers
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
