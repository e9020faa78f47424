//! Keras-style training callbacks.
//!
//! The fit loop calls every registered [`Callback`] at fixed points and
//! shares a mutable [`TrainingState`] with them. A callback can adjust the
//! learning rate, request an early stop, or fail the run.

use serde::{Deserialize, Serialize};

use crate::error::CnnError;
use crate::training::metrics::{MetricsHistory, PerfMetrics};

/// State shared between the fit loop and callbacks.
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Current epoch, 0-based.
    pub epoch: usize,
    /// Total epochs requested.
    pub epochs: usize,
    /// Learning rate used for the next optimizer step.
    pub learning_rate: f64,
    /// Set by a callback to end training after the current epoch.
    pub stop_training: bool,
    pub history: MetricsHistory,
}

impl TrainingState {
    pub fn new(epochs: usize, learning_rate: f64) -> Self {
        Self {
            epoch: 0,
            epochs,
            learning_rate,
            stop_training: false,
            history: MetricsHistory::new(),
        }
    }
}

/// Hooks invoked by the fit loop. All default to no-ops.
pub trait Callback {
    fn on_train_begin(&mut self, _state: &mut TrainingState) -> Result<(), CnnError> {
        Ok(())
    }

    fn on_epoch_begin(&mut self, _state: &mut TrainingState) -> Result<(), CnnError> {
        Ok(())
    }

    /// Called after every optimizer step with the running epoch metrics.
    fn on_batch_end(
        &mut self,
        _state: &mut TrainingState,
        _batch: usize,
        _metrics: &PerfMetrics,
    ) -> Result<(), CnnError> {
        Ok(())
    }

    /// Called once the epoch's metrics have been pushed to `state.history`.
    fn on_epoch_end(&mut self, _state: &mut TrainingState) -> Result<(), CnnError> {
        Ok(())
    }

    fn on_train_end(&mut self, _state: &mut TrainingState) -> Result<(), CnnError> {
        Ok(())
    }
}

/// Reference accuracies (percent) that example models must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelAccuracy {
    MnistMlp,
    MnistCnn,
    ReutersMlp,
    Cifar10Cnn,
    Cifar10Alexnet,
}

impl ModelAccuracy {
    /// Required accuracy in percent.
    pub fn value(&self) -> f64 {
        match self {
            ModelAccuracy::MnistMlp => 90.0,
            ModelAccuracy::MnistCnn => 90.0,
            ModelAccuracy::ReutersMlp => 90.0,
            ModelAccuracy::Cifar10Cnn => 90.0,
            ModelAccuracy::Cifar10Alexnet => 90.0,
        }
    }
}

impl From<ModelAccuracy> for f64 {
    fn from(accuracy: ModelAccuracy) -> Self {
        accuracy.value()
    }
}

/// Fails training if the final epoch accuracy is below a baseline.
#[derive(Debug, Clone)]
pub struct VerifyMetrics {
    required: f64,
}

impl VerifyMetrics {
    /// Accepts a [`ModelAccuracy`] or a raw percentage.
    pub fn new(required: impl Into<f64>) -> Self {
        Self {
            required: required.into(),
        }
    }

    pub fn required(&self) -> f64 {
        self.required
    }

    /// Check an accuracy against the baseline.
    pub fn verify(&self, accuracy: f64) -> Result<(), CnnError> {
        if accuracy < self.required {
            return Err(CnnError::AccuracyBelowBaseline {
                accuracy,
                required: self.required,
            });
        }
        Ok(())
    }
}

impl Callback for VerifyMetrics {
    fn on_train_end(&mut self, state: &mut TrainingState) -> Result<(), CnnError> {
        let last = state.history.last().ok_or(CnnError::NoMetrics)?;
        self.verify(last.accuracy)?;
        tracing::info!(
            accuracy = format!("{:.2}", last.accuracy),
            required = format!("{:.2}", self.required),
            "Accuracy verified"
        );
        Ok(())
    }
}

/// Stops training early once an epoch reaches the baseline accuracy.
#[derive(Debug, Clone)]
pub struct EpochVerifyMetrics {
    required: f64,
}

impl EpochVerifyMetrics {
    pub fn new(required: impl Into<f64>) -> Self {
        Self {
            required: required.into(),
        }
    }
}

impl Callback for EpochVerifyMetrics {
    fn on_epoch_end(&mut self, state: &mut TrainingState) -> Result<(), CnnError> {
        if let Some(last) = state.history.last() {
            if last.accuracy >= self.required {
                tracing::info!(
                    epoch = state.epoch,
                    accuracy = format!("{:.2}", last.accuracy),
                    required = format!("{:.2}", self.required),
                    "Baseline reached, stopping early"
                );
                state.stop_training = true;
            }
        }
        Ok(())
    }
}

/// Per-epoch learning rate schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LrSchedule {
    #[default]
    Constant,
    /// Linear warmup over `warmup_epochs`, then half a cosine period over the
    /// remaining epochs.
    Cosine {
        #[serde(default)]
        warmup_epochs: usize,
    },
}

impl LrSchedule {
    /// Learning rate for `epoch` (0-based) of a run of `epochs` epochs.
    ///
    /// Warmup epochs climb in equal steps toward `base_lr`; the first epoch
    /// after warmup runs at `base_lr`. No epoch runs at a rate of 0.
    pub fn rate(&self, base_lr: f64, epoch: usize, epochs: usize) -> f64 {
        match *self {
            LrSchedule::Constant => base_lr,
            LrSchedule::Cosine { warmup_epochs } if epoch < warmup_epochs => {
                base_lr * (epoch + 1) as f64 / (warmup_epochs + 1) as f64
            }
            LrSchedule::Cosine { warmup_epochs } => {
                let decay_epochs = epochs.saturating_sub(warmup_epochs).max(1);
                let done = (epoch - warmup_epochs).min(decay_epochs - 1);
                let phase = std::f64::consts::PI * done as f64 / decay_epochs as f64;
                base_lr * 0.5 * (1.0 + phase.cos())
            }
        }
    }
}

/// Sets `state.learning_rate` at the start of every epoch.
#[derive(Debug, Clone)]
pub struct LearningRateScheduler {
    base_lr: f64,
    schedule: LrSchedule,
}

impl LearningRateScheduler {
    pub fn new(base_lr: f64, schedule: LrSchedule) -> Self {
        Self { base_lr, schedule }
    }
}

impl Callback for LearningRateScheduler {
    fn on_epoch_begin(&mut self, state: &mut TrainingState) -> Result<(), CnnError> {
        let lr = self.schedule.rate(self.base_lr, state.epoch, state.epochs);
        if (lr - state.learning_rate).abs() > f64::EPSILON {
            tracing::debug!(epoch = state.epoch, lr = format!("{lr:.2e}"), "Learning rate updated");
        }
        state.learning_rate = lr;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_accuracy(accuracy: f64) -> TrainingState {
        let mut state = TrainingState::new(3, 0.001);
        let mut perf = PerfMetrics::new();
        let correct = accuracy.round() as usize;
        perf.update(1.0, 1.0, correct, 100);
        state.history.push(perf.finish(0, 0.0));
        state
    }

    #[test]
    fn test_model_accuracy_baselines() {
        assert_eq!(ModelAccuracy::Cifar10Cnn.value(), 90.0);
        assert_eq!(f64::from(ModelAccuracy::MnistMlp), 90.0);
        assert_eq!(VerifyMetrics::new(ModelAccuracy::Cifar10Alexnet).required(), 90.0);
        assert_eq!(VerifyMetrics::new(12.5).required(), 12.5);
    }

    #[test]
    fn test_verify_metrics_pass_and_fail() {
        let mut verify = VerifyMetrics::new(ModelAccuracy::Cifar10Cnn);

        let mut good = state_with_accuracy(95.0);
        assert!(verify.on_train_end(&mut good).is_ok());

        let mut bad = state_with_accuracy(40.0);
        match verify.on_train_end(&mut bad) {
            Err(CnnError::AccuracyBelowBaseline { accuracy, required }) => {
                assert!((accuracy - 40.0).abs() < 1e-9);
                assert_eq!(required, 90.0);
            }
            other => panic!("Expected AccuracyBelowBaseline, got {other:?}"),
        }

        // Exactly at the baseline passes.
        assert!(verify.verify(90.0).is_ok());
    }

    #[test]
    fn test_verify_metrics_without_history() {
        let mut verify = VerifyMetrics::new(50.0);
        let mut state = TrainingState::new(1, 0.001);
        assert!(matches!(verify.on_train_end(&mut state), Err(CnnError::NoMetrics)));
    }

    #[test]
    fn test_epoch_verify_sets_stop() {
        let mut early = EpochVerifyMetrics::new(80.0);

        let mut low = state_with_accuracy(50.0);
        early.on_epoch_end(&mut low).unwrap();
        assert!(!low.stop_training);

        let mut high = state_with_accuracy(85.0);
        early.on_epoch_end(&mut high).unwrap();
        assert!(high.stop_training);
    }

    fn rates(schedule: LrSchedule, base_lr: f64, epochs: usize) -> Vec<f64> {
        (0..epochs).map(|e| schedule.rate(base_lr, e, epochs)).collect()
    }

    fn assert_rates(got: &[f64], expected: &[f64]) {
        assert_eq!(got.len(), expected.len());
        for (epoch, (g, e)) in got.iter().zip(expected).enumerate() {
            assert!((g - e).abs() < 1e-12, "epoch {epoch}: got {g}, expected {e}");
        }
    }

    #[test]
    fn test_constant_schedule() {
        assert_rates(&rates(LrSchedule::Constant, 0.001, 3), &[0.001; 3]);
    }

    #[test]
    fn test_cosine_without_warmup() {
        let half_root = std::f64::consts::FRAC_1_SQRT_2 / 2.0;
        assert_rates(
            &rates(LrSchedule::Cosine { warmup_epochs: 0 }, 1.0, 4),
            &[1.0, 0.5 + half_root, 0.5, 0.5 - half_root],
        );
        // A single epoch keeps the base rate
        assert_rates(&rates(LrSchedule::Cosine { warmup_epochs: 0 }, 0.001, 1), &[0.001]);
    }

    #[test]
    fn test_cosine_with_warmup() {
        let got = rates(LrSchedule::Cosine { warmup_epochs: 2 }, 0.3, 6);
        assert_rates(&got[..3], &[0.1, 0.2, 0.3]);
        assert!((got[4] - 0.15).abs() < 1e-12, "got {}", got[4]);
        assert!(got.iter().all(|&lr| lr > 0.0));
    }

    #[test]
    fn test_cosine_past_last_epoch_and_long_warmup() {
        let schedule = LrSchedule::Cosine { warmup_epochs: 0 };
        assert_eq!(schedule.rate(1.0, 10, 4), schedule.rate(1.0, 3, 4));

        // Warmup longer than the run never reaches the base rate
        assert_rates(&rates(LrSchedule::Cosine { warmup_epochs: 3 }, 0.4, 2), &[0.1, 0.2]);
    }

    #[test]
    fn test_scheduler_updates_state_per_epoch() {
        let mut scheduler =
            LearningRateScheduler::new(0.1, LrSchedule::Cosine { warmup_epochs: 1 });
        let mut state = TrainingState::new(5, 0.1);

        state.epoch = 0;
        scheduler.on_epoch_begin(&mut state).unwrap();
        assert!((state.learning_rate - 0.05).abs() < 1e-12);

        state.epoch = 1;
        scheduler.on_epoch_begin(&mut state).unwrap();
        assert!((state.learning_rate - 0.1).abs() < 1e-12);

        state.epoch = 3;
        scheduler.on_epoch_begin(&mut state).unwrap();
        // two of four decay epochs done
        assert!((state.learning_rate - 0.05).abs() < 1e-12);

        let mut constant = LearningRateScheduler::new(0.01, LrSchedule::Constant);
        constant.on_epoch_begin(&mut state).unwrap();
        assert_eq!(state.learning_rate, 0.01);
    }

    #[test]
    fn test_lr_schedule_serde() {
        let schedule: LrSchedule = toml::from_str("type = \"cosine\"\nwarmup_epochs = 2").unwrap();
        assert_eq!(schedule, LrSchedule::Cosine { warmup_epochs: 2 });
        let schedule: LrSchedule = toml::from_str("type = \"constant\"").unwrap();
        assert_eq!(schedule, LrSchedule::Constant);
    }
}
