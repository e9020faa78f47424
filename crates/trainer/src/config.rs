//! TOML config loading for the training CLI.
//!
//! Deserializes `configs/train.toml`, which has optional `[data]`, `[model]`,
//! `[training]` and `[optimizer]` sections, then merges it with CLI overrides.

use std::path::{Path, PathBuf};

use cnn::model::ConcatCnnConfig;
use cnn::training::callbacks::{LrSchedule, ModelAccuracy};
use cnn::training::optimizer::OptimizerKind;
use cnn::training::trainer::FitConfig;
use serde::Deserialize;

/// Directory the extracted CIFAR-10 binary batches are expected in.
pub const DEFAULT_DATA_DIR: &str = "data/cifar-10-batches-bin";
/// Training images used by the example.
pub const DEFAULT_NUM_SAMPLES: usize = 10_000;
pub const DEFAULT_OUTPUT_DIR: &str = "checkpoints/cifar_concat";

/// Top-level structure matching `configs/train.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainToml {
    #[serde(default)]
    pub data: DataOverrides,
    #[serde(default)]
    pub model: ModelOverrides,
    #[serde(default)]
    pub training: TrainingOverrides,
    /// Full optimizer description; replaces the default SGD when present.
    pub optimizer: Option<OptimizerKind>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataOverrides {
    pub data_dir: Option<PathBuf>,
    pub num_samples: Option<usize>,
    /// Train on generated data instead of reading `data_dir`.
    pub synthetic: Option<bool>,
}

/// Optional overrides for `ConcatCnnConfig` fields.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOverrides {
    pub num_classes: Option<usize>,
    pub branch_filters: Option<usize>,
    pub trunk_filters: Option<usize>,
    pub kernel_size: Option<usize>,
    pub dense_units: Option<usize>,
}

/// Optional overrides for `FitConfig` fields and callbacks.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingOverrides {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub shuffle: Option<bool>,
    pub seed: Option<u64>,
    pub log_interval: Option<usize>,
    pub metrics: Option<Vec<String>>,
    /// Accuracy (percent) the final epoch must reach.
    pub min_accuracy: Option<f64>,
    /// Run the accuracy check at the end of training.
    pub verify: Option<bool>,
    /// Stop as soon as an epoch reaches `min_accuracy`.
    pub early_stop: Option<bool>,
    pub lr_schedule: Option<LrSchedule>,
}

/// CLI flags that override config values. `None` keeps the config value.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub data_dir: Option<PathBuf>,
    pub synthetic: bool,
    pub num_samples: Option<usize>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub lr: Option<f64>,
    pub min_accuracy: Option<f64>,
    pub no_verify: bool,
    pub output_dir: Option<PathBuf>,
}

/// Fully resolved training settings.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub data_dir: PathBuf,
    pub synthetic: bool,
    pub num_samples: Option<usize>,
    pub model: ConcatCnnConfig,
    pub fit: FitConfig,
    /// Required accuracy in percent.
    pub min_accuracy: f64,
    pub verify: bool,
    pub early_stop: bool,
    pub lr_schedule: LrSchedule,
    pub output_dir: PathBuf,
}

/// Load and deserialize a `TrainToml` from a TOML file.
pub fn load_train_toml(path: &Path) -> anyhow::Result<TrainToml> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
    let config: TrainToml = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded training config");
    Ok(config)
}

/// Load the config at `path`, or defaults when no path is given.
pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<TrainToml> {
    match path {
        Some(p) => load_train_toml(p),
        None => Ok(TrainToml::default()),
    }
}

/// Build a model config from defaults and TOML overrides.
pub fn build_model_config(overrides: &ModelOverrides) -> ConcatCnnConfig {
    let mut config = ConcatCnnConfig::new();
    if let Some(n) = overrides.num_classes {
        config.num_classes = n;
    }
    if let Some(n) = overrides.branch_filters {
        config.branch_filters = n;
    }
    if let Some(n) = overrides.trunk_filters {
        config.trunk_filters = n;
    }
    if let Some(n) = overrides.kernel_size {
        config.kernel_size = n;
    }
    if let Some(n) = overrides.dense_units {
        config.dense_units = n;
    }
    config
}

/// Resolve training settings.
///
/// Priority chain: built-in defaults < TOML values < CLI flags. Fails when the
/// resulting model cannot be built for CIFAR-10 images.
pub fn build_train_settings(toml: &TrainToml, cli: &CliOverrides) -> anyhow::Result<TrainSettings> {
    let model = build_model_config(&toml.model);
    model
        .check()
        .map_err(|e| anyhow::anyhow!("Invalid [model] section: {e}"))?;
    let t = &toml.training;

    let mut optimizer = toml.optimizer.clone().unwrap_or_default();
    if let Some(lr) = cli.lr {
        optimizer = optimizer.with_learning_rate(lr);
    }

    let mut fit = FitConfig::new()
        .with_optimizer(optimizer)
        .with_model(model.clone());
    if let Some(n) = t.epochs {
        fit.epochs = n;
    }
    if let Some(n) = t.batch_size {
        fit.batch_size = n;
    }
    if let Some(b) = t.shuffle {
        fit.shuffle = b;
    }
    if let Some(s) = t.seed {
        fit.seed = s;
    }
    if let Some(n) = t.log_interval {
        fit.log_interval = n;
    }
    if let Some(m) = &t.metrics {
        fit.metrics = m.clone();
    }

    // CLI overrides take highest priority
    if let Some(n) = cli.epochs {
        fit.epochs = n;
    }
    if let Some(n) = cli.batch_size {
        fit.batch_size = n;
    }

    let num_samples = cli
        .num_samples
        .or(toml.data.num_samples)
        .or(Some(DEFAULT_NUM_SAMPLES));

    Ok(TrainSettings {
        data_dir: cli
            .data_dir
            .clone()
            .or_else(|| toml.data.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        synthetic: cli.synthetic || toml.data.synthetic.unwrap_or(false),
        num_samples,
        model,
        fit,
        min_accuracy: cli
            .min_accuracy
            .or(t.min_accuracy)
            .unwrap_or_else(|| ModelAccuracy::Cifar10Cnn.value()),
        verify: !cli.no_verify && t.verify.unwrap_or(true),
        early_stop: t.early_stop.unwrap_or(false),
        lr_schedule: t.lr_schedule.unwrap_or_default(),
        output_dir: cli
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
    })
}
