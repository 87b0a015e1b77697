// ============================================================
// Layer 6 — Preprocessor Store
// ============================================================
// Persists the fitted wide and dense preprocessors next to the
// model weights. Prediction must encode new rows with exactly
// the vocabularies learned during training, otherwise the
// one-hot positions and embedding rows would not line up with
// the trained parameters.
//
//   <checkpoint_dir>/wide_preprocessor.json
//   <checkpoint_dir>/dense_preprocessor.json

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::dense_preprocessor::DensePreprocessor;
use crate::data::wide_preprocessor::WidePreprocessor;
use crate::domain::traits::Persistable;

pub struct PreprocessorStore {
    dir: PathBuf,
}

impl PreprocessorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        path.to_str()
            .map(str::to_string)
            .with_context(|| format!("Non UTF-8 path '{}'", path.display()))
    }

    pub fn save(&self, wide: &WidePreprocessor, dense: &DensePreprocessor) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        wide.save(&self.path("wide_preprocessor.json")?)?;
        dense.save(&self.path("dense_preprocessor.json")?)?;
        tracing::debug!("Saved fitted preprocessors to '{}'", self.dir.display());
        Ok(())
    }

    /// Load both preprocessors; fails if either was saved unfitted.
    pub fn load(&self) -> Result<(WidePreprocessor, DensePreprocessor)> {
        let wide  = WidePreprocessor::load(&self.path("wide_preprocessor.json")?)?;
        let dense = DensePreprocessor::load(&self.path("dense_preprocessor.json")?)?;
        if !wide.is_fitted() || !dense.is_fitted() {
            anyhow::bail!("Stored preprocessors in '{}' were never fit", self.dir.display());
        }
        tracing::info!("Loaded fitted preprocessors from '{}'", self.dir.display());
        Ok((wide, dense))
    }
}
