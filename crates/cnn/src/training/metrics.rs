//! Per-epoch training metrics and their history.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CnnError;

/// Metrics that can be requested for a fit, by Keras name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Accuracy,
    SparseCategoricalCrossentropy,
}

impl MetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Accuracy => "accuracy",
            MetricKind::SparseCategoricalCrossentropy => "sparse_categorical_crossentropy",
        }
    }

    /// Parse a list of metric names, rejecting unknown ones.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<MetricKind>, CnnError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl FromStr for MetricKind {
    type Err = CnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accuracy" | "acc" => Ok(MetricKind::Accuracy),
            "sparse_categorical_crossentropy" => Ok(MetricKind::SparseCategoricalCrossentropy),
            other => Err(CnnError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running sums over the batches of one epoch.
///
/// Losses are summed weighted by batch size so the epoch mean is per sample.
#[derive(Debug, Clone, Default)]
pub struct PerfMetrics {
    pub train_loss: f64,
    pub train_correct: usize,
    pub train_all: usize,
    pub sparse_cce: f64,
    pub batches: usize,
}

impl PerfMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch: mean `loss` and `sparse_cce` over `total` samples, `correct` hits.
    pub fn update(&mut self, loss: f64, sparse_cce: f64, correct: usize, total: usize) {
        self.train_loss += loss * total as f64;
        self.sparse_cce += sparse_cce * total as f64;
        self.train_correct += correct;
        self.train_all += total;
        self.batches += 1;
    }

    /// Mean loss per sample, or 0 with no samples.
    pub fn loss(&self) -> f64 {
        if self.train_all == 0 {
            return 0.0;
        }
        self.train_loss / self.train_all as f64
    }

    /// Mean sparse categorical cross-entropy per sample.
    pub fn sparse_categorical_crossentropy(&self) -> f64 {
        if self.train_all == 0 {
            return 0.0;
        }
        self.sparse_cce / self.train_all as f64
    }

    /// Accuracy as a percentage in `[0, 100]`.
    pub fn accuracy(&self) -> f64 {
        if self.train_all == 0 {
            return 0.0;
        }
        self.train_correct as f64 * 100.0 / self.train_all as f64
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Freeze into an epoch record.
    pub fn finish(&self, epoch: usize, elapsed_secs: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            loss: self.loss(),
            accuracy: self.accuracy(),
            sparse_categorical_crossentropy: self.sparse_categorical_crossentropy(),
            samples: self.train_all,
            elapsed_secs,
        }
    }

    /// One-line progress display restricted to the requested metrics.
    pub fn display(&self, metrics: &[MetricKind]) -> String {
        let mut parts = vec![format!("loss={:.4}", self.loss())];
        for metric in metrics {
            match metric {
                MetricKind::Accuracy => parts.push(format!("accuracy={:.2}%", self.accuracy())),
                MetricKind::SparseCategoricalCrossentropy => parts.push(format!(
                    "sparse_cce={:.4}",
                    self.sparse_categorical_crossentropy()
                )),
            }
        }
        parts.join(" ")
    }
}

/// Metrics for one completed epoch (or one evaluation pass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    /// Percentage.
    pub accuracy: f64,
    pub sparse_categorical_crossentropy: f64,
    pub samples: usize,
    pub elapsed_secs: f64,
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {}: loss={:.4} accuracy={:.2}% sparse_cce={:.4} ({} samples, {:.1}s)",
            self.epoch,
            self.loss,
            self.accuracy,
            self.sparse_categorical_crossentropy,
            self.samples,
            self.elapsed_secs
        )
    }
}

/// Epoch metrics in the order they were recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsHistory {
    pub epochs: Vec<EpochMetrics>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Highest accuracy seen so far.
    pub fn best_accuracy(&self) -> Option<f64> {
        self.epochs.iter().map(|m| m.accuracy).reduce(f64::max)
    }

    /// Whether loss dropped from the first recorded epoch to the last.
    pub fn loss_improved(&self) -> bool {
        match (self.epochs.first(), self.epochs.last()) {
            (Some(first), Some(last)) if self.epochs.len() > 1 => last.loss < first.loss,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_kind_parse() {
        assert_eq!("accuracy".parse::<MetricKind>().unwrap(), MetricKind::Accuracy);
        assert_eq!(
            "sparse_categorical_crossentropy".parse::<MetricKind>().unwrap(),
            MetricKind::SparseCategoricalCrossentropy
        );
        assert!(matches!(
            "mse".parse::<MetricKind>(),
            Err(CnnError::UnknownMetric(name)) if name == "mse"
        ));

        let all = MetricKind::parse_all(&["accuracy", "sparse_categorical_crossentropy"]).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].to_string(), "sparse_categorical_crossentropy");
    }

    #[test]
    fn test_perf_metrics_weighted_means() {
        let mut perf = PerfMetrics::new();
        perf.update(2.0, 2.5, 1, 2);
        perf.update(1.0, 1.0, 6, 8);

        assert_eq!(perf.train_all, 10);
        assert_eq!(perf.train_correct, 7);
        assert_eq!(perf.batches, 2);
        assert!((perf.loss() - 1.2).abs() < 1e-12);
        assert!((perf.sparse_categorical_crossentropy() - 1.3).abs() < 1e-12);
        assert!((perf.accuracy() - 70.0).abs() < 1e-12);

        let epoch = perf.finish(0, 1.5);
        assert_eq!(epoch.samples, 10);
        assert!(epoch.to_string().contains("accuracy=70.00%"));

        perf.reset();
        assert_eq!(perf.accuracy(), 0.0);
        assert_eq!(perf.loss(), 0.0);
    }

    #[test]
    fn test_display_respects_requested_metrics() {
        let mut perf = PerfMetrics::new();
        perf.update(0.5, 0.5, 3, 4);
        let text = perf.display(&[MetricKind::Accuracy]);
        assert!(text.contains("accuracy=75.00%"));
        assert!(!text.contains("sparse_cce"));
    }

    #[test]
    fn test_history() {
        let mut history = MetricsHistory::new();
        assert!(history.best_accuracy().is_none());
        assert!(!history.loss_improved());

        let mut perf = PerfMetrics::new();
        perf.update(2.0, 2.0, 2, 10);
        history.push(perf.finish(0, 0.0));
        perf.reset();
        perf.update(1.0, 1.0, 5, 10);
        history.push(perf.finish(1, 0.0));

        assert_eq!(history.len(), 2);
        assert_eq!(history.best_accuracy(), Some(50.0));
        assert!(history.loss_improved());
        assert_eq!(history.last().map(|m| m.epoch), Some(1));

        let json = serde_json::to_string(&history).unwrap();
        let back: MetricsHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.epochs, history.epochs);
    }
}
