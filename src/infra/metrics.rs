// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: average binary cross-entropy on the training batches
//   - val_loss:   the same on the validation split (empty if none)
//   - train_<m> / val_<m> for every scoring metric (acc, prec, ...)
//   - lr_<component> for every model component (wide, deep)
//
// Output file: <checkpoint_dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_loss,train_acc,val_acc,lr_deep,lr_wide
//   1,0.412300,0.398100,0.812000,0.820000,0.001000,0.010000
//   2,0.371200,0.365400,0.831000,0.834000,0.001000,0.010000
//
// The header is taken from the first row written, so every row
// of a run must carry the same metric names.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

/// Everything observed during one training epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Average loss over all training batches
    pub train_loss: f64,

    /// Average loss over the validation batches, if a split exists
    pub val_loss: Option<f64>,

    /// "train_acc", "val_prec", ... → value
    pub scores: BTreeMap<String, f64>,

    /// component name → learning rate used this epoch
    pub learning_rates: BTreeMap<String, f64>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: Option<f64>) -> Self {
        Self { epoch, train_loss, val_loss, ..Default::default() }
    }

    /// Look up a monitored quantity by its log name.
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "train_loss" => Some(self.train_loss),
            "val_loss"   => self.val_loss,
            _ => self
                .scores
                .get(key)
                .copied()
                .or_else(|| key.strip_prefix("lr_").and_then(|c| self.learning_rates.get(c).copied())),
        }
    }

    fn columns(&self) -> Vec<String> {
        let mut cols = vec!["epoch".to_string(), "train_loss".to_string(), "val_loss".to_string()];
        cols.extend(self.scores.keys().cloned());
        cols.extend(self.learning_rates.keys().map(|k| format!("lr_{k}")));
        cols
    }

    fn csv_row(&self) -> String {
        let mut fields = vec![
            self.epoch.to_string(),
            format!("{:.6}", self.train_loss),
            self.val_loss.map(|v| format!("{v:.6}")).unwrap_or_default(),
        ];
        fields.extend(self.scores.values().map(|v| format!("{v:.6}")));
        fields.extend(self.learning_rates.values().map(|v| format!("{v:.6}")));
        fields.join(",")
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger in `dir`. Any metrics.csv left over
    /// from an earlier run is replaced on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let csv_path = dir.join("metrics.csv");
        if csv_path.exists() {
            fs::remove_file(&csv_path)?;
        }
        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        if !self.csv_path.exists() {
            let mut f = fs::File::create(&self.csv_path)?;
            writeln!(f, "{}", m.columns().join(","))?;
            tracing::debug!("Created metrics CSV: '{}'", self.csv_path.display());
        }

        // Open in append mode — adds to end of file
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:?}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn sample(epoch: usize) -> EpochMetrics {
        let mut m = EpochMetrics::new(epoch, 0.5, Some(0.4));
        m.scores.insert("train_acc".into(), 0.8);
        m.scores.insert("val_acc".into(), 0.75);
        m.learning_rates.insert("wide".into(), 0.01);
        m
    }

    #[test]
    fn test_get_by_log_name() {
        let m = sample(1);
        assert_eq!(m.get("val_loss"), Some(0.4));
        assert_eq!(m.get("val_acc"), Some(0.75));
        assert_eq!(m.get("lr_wide"), Some(0.01));
        assert_eq!(m.get("val_f1"), None);
    }

    #[test]
    fn test_writes_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&sample(1)).unwrap();
        logger.log(&sample(2)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,val_loss,train_acc,val_acc,lr_wide");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("2,0.500000,0.400000"));
    }
}
