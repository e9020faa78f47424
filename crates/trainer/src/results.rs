//! Result types for training runs.

use cnn::training::metrics::EpochMetrics;
use cnn::training::optimizer::OptimizerKind;
use serde::{Deserialize, Serialize};

/// Summary of one `train` run, written as JSON with `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    /// Model name from the summary, e.g. `concat_cnn`.
    pub model: String,
    /// Trainable parameter count.
    pub params: usize,
    pub optimizer: OptimizerKind,
    pub batch_size: usize,
    /// Training images used.
    pub train_samples: usize,
    pub test_samples: usize,
    /// Whether the data was generated rather than read from disk.
    pub synthetic: bool,
    /// Per-epoch training metrics.
    pub epochs: Vec<EpochMetrics>,
    /// Accuracy of the last epoch, in percent.
    pub final_accuracy: f64,
    /// Metrics on the test split after training.
    pub test: Option<EpochMetrics>,
    /// Accuracy the run had to reach, in percent.
    pub baseline: f64,
    /// `None` when verification was disabled.
    pub verified: Option<bool>,
    pub stopped_early: bool,
    /// Median wall-clock time per epoch in seconds.
    pub median_epoch_secs: f64,
    pub elapsed_secs: f64,
    /// Directory the final checkpoint was written to.
    pub checkpoint: String,
}

/// Compute the median of a slice of f64 values.
///
/// Returns 0.0 for empty slices.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

impl TrainReport {
    pub fn write_json(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow::anyhow!("Failed to write report {}: {e}", path.display()))?;
        tracing::info!(path = %path.display(), "Training report written");
        Ok(())
    }

    pub fn read_json(path: &std::path::Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open report {}: {e}", path.display()))?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(epoch: usize, accuracy: f64, secs: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            loss: 2.0,
            accuracy,
            sparse_categorical_crossentropy: 2.0,
            samples: 9984,
            elapsed_secs: secs,
        }
    }

    #[test]
    fn test_train_report_serde_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reports/train.json");
        let report = TrainReport {
            model: "concat_cnn".to_string(),
            params: 2_196_938,
            optimizer: OptimizerKind::sgd(0.001),
            batch_size: 64,
            train_samples: 10_000,
            test_samples: 10_000,
            synthetic: false,
            epochs: vec![epoch(0, 23.5, 61.0)],
            final_accuracy: 23.5,
            test: Some(epoch(0, 25.0, 5.0)),
            baseline: 90.0,
            verified: None,
            stopped_early: false,
            median_epoch_secs: 61.0,
            elapsed_secs: 66.2,
            checkpoint: "checkpoints/cifar_concat/final".to_string(),
        };

        report.write_json(&path).unwrap();
        let loaded = TrainReport::read_json(&path).unwrap();
        assert_eq!(loaded.params, 2_196_938);
        assert_eq!(loaded.epochs.len(), 1);
        assert_eq!(loaded.optimizer, OptimizerKind::sgd(0.001));
        assert!(loaded.verified.is_none());
        assert_eq!(loaded.test.map(|t| t.accuracy), Some(25.0));
    }

    #[test]
    fn test_median_helper() {
        assert!((median(&mut []) - 0.0).abs() < 1e-9);
        assert!((median(&mut [5.0]) - 5.0).abs() < 1e-9);
        assert!((median(&mut [1.0, 3.0]) - 2.0).abs() < 1e-9);
        assert!((median(&mut [3.0, 1.0, 2.0]) - 2.0).abs() < 1e-9);
        assert!((median(&mut [4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < 1e-9);
    }
}
