//! Fit loop, evaluation, and checkpoints for the concat CNN.
//!
//! Ties together the batch sampler, tensor bridge, losses, metrics, and
//! callbacks. Every step feeds the same image batch to both network inputs.

use std::path::Path;
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use cifar::{sequential_batches, BatchSampler, ImageSet, IMAGE_SIZE};
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::CnnError;
use crate::model::bridge::{images_to_tensor, labels_to_tensor};
use crate::model::concat_cnn::{ConcatCnn, ConcatCnnConfig};
use crate::training::callbacks::{Callback, TrainingState};
use crate::training::loss::{accuracy, cross_entropy_from_logits, sparse_categorical_crossentropy};
use crate::training::metrics::{EpochMetrics, MetricKind, MetricsHistory, PerfMetrics};
use crate::training::optimizer::OptimizerKind;

const MODEL_FILE: &str = "model";
const META_FILE: &str = "meta.json";

/// Metadata saved alongside each checkpoint.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct CheckpointMeta {
    /// Epochs completed when the checkpoint was written.
    pub epochs: usize,
    /// Optimizer steps taken.
    pub steps: u64,
    /// Last recorded training accuracy, in percent.
    pub accuracy: Option<f64>,
    pub optimizer: OptimizerKind,
    /// Architecture needed to rebuild the model before loading weights.
    pub model: ConcatCnnConfig,
}

/// Configuration for a fit run.
#[derive(Config, Debug)]
pub struct FitConfig {
    #[config(default = 1)]
    pub epochs: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    /// Reshuffle sample order every epoch.
    #[config(default = true)]
    pub shuffle: bool,
    #[config(default = 42)]
    pub seed: u64,
    /// Steps between progress log lines. 0 disables them.
    #[config(default = 50)]
    pub log_interval: usize,
    /// Directory for per-epoch checkpoints. None disables them.
    pub checkpoint_dir: Option<String>,
    /// Keras metric names to report.
    #[config(
        default = "vec![String::from(\"accuracy\"), String::from(\"sparse_categorical_crossentropy\")]"
    )]
    pub metrics: Vec<String>,
    /// Optimizer and starting learning rate.
    #[config(default = "OptimizerKind::default()")]
    pub optimizer: OptimizerKind,
    /// Architecture recorded in checkpoint metadata.
    #[config(default = "ConcatCnnConfig::new()")]
    pub model: ConcatCnnConfig,
}

/// Result of [`fit`]: the trained model plus what happened on the way.
#[derive(Debug)]
pub struct FitOutcome<M> {
    pub model: M,
    pub history: MetricsHistory,
    pub steps: u64,
    /// A callback requested `stop_training` before the last epoch.
    pub stopped_early: bool,
    pub elapsed_secs: f64,
}

fn check_batch_size(batch_size: usize, samples: usize) -> Result<(), CnnError> {
    if samples == 0 {
        return Err(CnnError::EmptyDataset);
    }
    if batch_size == 0 || batch_size > samples {
        return Err(CnnError::InvalidBatchSize {
            batch_size,
            samples,
        });
    }
    Ok(())
}

fn progress_bar(len: usize, epoch: usize, epochs: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_prefix(format!("epoch {}/{}", epoch + 1, epochs));
    pb
}

/// Train `model` on `train`, feeding each batch to both inputs.
///
/// Minimises cross-entropy on logits with `optimizer`, starting at the
/// learning rate of `config.optimizer`. Callbacks may change the rate per
/// epoch, stop early, or fail the run (e.g.
/// [`VerifyMetrics`](crate::training::callbacks::VerifyMetrics)).
///
/// The trailing partial batch of each epoch is dropped.
///
/// # Errors
/// [`CnnError::InvalidModelConfig`], [`CnnError::EmptyDataset`], [`CnnError::InvalidBatchSize`],
/// [`CnnError::UnknownMetric`], any callback error, and checkpoint I/O errors.
pub fn fit<B, O>(
    config: &FitConfig,
    mut model: ConcatCnn<B>,
    optimizer: &mut O,
    train: &ImageSet,
    callbacks: &mut [Box<dyn Callback>],
    device: &B::Device,
) -> anyhow::Result<FitOutcome<ConcatCnn<B>>>
where
    B: AutodiffBackend,
    O: Optimizer<ConcatCnn<B>, B>,
{
    config.model.check()?;
    check_batch_size(config.batch_size, train.len())?;
    let metrics = MetricKind::parse_all(&config.metrics)?;
    let learning_rate = config.optimizer.learning_rate();

    let mut sampler =
        BatchSampler::new(train.len(), config.batch_size, config.seed).with_shuffle(config.shuffle);
    let iterations = sampler.iterations();

    tracing::info!(
        samples = train.len(),
        batch_size = config.batch_size,
        iterations,
        epochs = config.epochs,
        lr = format!("{learning_rate:.2e}"),
        "Starting training"
    );
    if train.len() % config.batch_size != 0 {
        tracing::debug!(
            dropped = train.len() % config.batch_size,
            "Trailing partial batch dropped each epoch"
        );
    }

    let mut state = TrainingState::new(config.epochs, learning_rate);
    for cb in callbacks.iter_mut() {
        cb.on_train_begin(&mut state)?;
    }

    let train_start = Instant::now();
    let mut steps: u64 = 0;
    let mut stopped_early = false;

    for epoch in 0..config.epochs {
        state.epoch = epoch;
        for cb in callbacks.iter_mut() {
            cb.on_epoch_begin(&mut state)?;
        }

        let epoch_start = Instant::now();
        let mut perf = PerfMetrics::new();
        let pb = progress_bar(iterations, epoch, config.epochs);

        for (batch, indices) in sampler.epoch_batches().iter().enumerate() {
            let (images, labels) = train.gather(indices);
            let x = images_to_tensor::<B>(&images, indices.len(), device);
            let y = labels_to_tensor::<B>(&labels, device);

            let logits = model.forward_logits(x.clone(), x);
            let loss = cross_entropy_from_logits(logits.clone(), y.clone());
            let loss_val: f64 = loss.clone().into_scalar().elem();

            // Metrics on detached logits, before backward consumes the graph
            let logits = logits.detach();
            let sparse_cce: f64 = sparse_categorical_crossentropy(softmax(logits.clone(), 1), y.clone())
                .into_scalar()
                .elem();
            let (correct, total) = accuracy(logits, y);

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(state.learning_rate, model, grads);
            steps += 1;

            perf.update(loss_val, sparse_cce, correct, total);
            for cb in callbacks.iter_mut() {
                cb.on_batch_end(&mut state, batch, &perf)?;
            }

            if config.log_interval > 0 && (batch + 1) % config.log_interval == 0 {
                tracing::info!(epoch, step = batch + 1, "{}", perf.display(&metrics));
            }
            pb.set_message(perf.display(&metrics));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let epoch_metrics = perf.finish(epoch, epoch_start.elapsed().as_secs_f64());
        tracing::info!(
            epoch,
            lr = format!("{:.2e}", state.learning_rate),
            elapsed_secs = format!("{:.1}", epoch_metrics.elapsed_secs),
            "{}",
            perf.display(&metrics)
        );
        state.history.push(epoch_metrics);

        for cb in callbacks.iter_mut() {
            cb.on_epoch_end(&mut state)?;
        }

        if let Some(dir) = &config.checkpoint_dir {
            let epoch_dir = Path::new(dir).join(format!("epoch_{}", epoch + 1));
            let meta = CheckpointMeta {
                epochs: epoch + 1,
                steps,
                accuracy: state.history.last().map(|m| m.accuracy),
                optimizer: config.optimizer.clone().with_learning_rate(state.learning_rate),
                model: config.model.clone(),
            };
            save_checkpoint(&epoch_dir, &model, &meta)?;
        }

        if state.stop_training {
            stopped_early = epoch + 1 < config.epochs;
            break;
        }
    }

    for cb in callbacks.iter_mut() {
        cb.on_train_end(&mut state)?;
    }

    let elapsed_secs = train_start.elapsed().as_secs_f64();
    tracing::info!(
        steps,
        epochs = state.history.len(),
        stopped_early,
        elapsed_secs = format!("{elapsed_secs:.1}"),
        "Training finished"
    );

    Ok(FitOutcome {
        model,
        history: state.history,
        steps,
        stopped_early,
        elapsed_secs,
    })
}

/// Build the optimizer described by `config.optimizer` and run [`fit`] with it.
pub fn fit_with<B: AutodiffBackend>(
    config: &FitConfig,
    model: ConcatCnn<B>,
    train: &ImageSet,
    callbacks: &mut [Box<dyn Callback>],
    device: &B::Device,
) -> anyhow::Result<FitOutcome<ConcatCnn<B>>> {
    let kind = &config.optimizer;
    tracing::info!(optimizer = kind.name(), lr = kind.learning_rate(), "Compiling model");
    match kind {
        OptimizerKind::Sgd { .. } => {
            let sgd = kind
                .sgd_config()
                .ok_or_else(|| anyhow::anyhow!("SGD optimizer without SGD config"))?;
            let mut optimizer = sgd.init::<B, ConcatCnn<B>>();
            fit(config, model, &mut optimizer, train, callbacks, device)
        }
        OptimizerKind::Adam { .. } => {
            let adam = kind
                .adam_config()
                .ok_or_else(|| anyhow::anyhow!("Adam optimizer without Adam config"))?;
            let mut optimizer = adam.init::<B, ConcatCnn<B>>();
            fit(config, model, &mut optimizer, train, callbacks, device)
        }
    }
}

/// Evaluate `model` on every image of `set` (no gradients, partial final batch kept).
pub fn evaluate<B: Backend>(
    model: &ConcatCnn<B>,
    set: &ImageSet,
    batch_size: usize,
    device: &B::Device,
) -> Result<EpochMetrics, CnnError> {
    if set.is_empty() {
        return Err(CnnError::EmptyDataset);
    }
    if batch_size == 0 {
        return Err(CnnError::InvalidBatchSize {
            batch_size,
            samples: set.len(),
        });
    }

    let start = Instant::now();
    let mut perf = PerfMetrics::new();
    for range in sequential_batches(set.len(), batch_size) {
        let n = range.len();
        let images = &set.images[range.start * IMAGE_SIZE..range.end * IMAGE_SIZE];
        let x = images_to_tensor::<B>(images, n, device);
        let y = labels_to_tensor::<B>(&set.labels[range], device);

        let logits = model.forward_logits(x.clone(), x);
        let loss: f64 = cross_entropy_from_logits(logits.clone(), y.clone())
            .into_scalar()
            .elem();
        let sparse_cce: f64 = sparse_categorical_crossentropy(softmax(logits.clone(), 1), y.clone())
            .into_scalar()
            .elem();
        let (correct, total) = accuracy(logits, y);
        perf.update(loss, sparse_cce, correct, total);
    }

    let metrics = perf.finish(0, start.elapsed().as_secs_f64());
    tracing::info!(
        samples = metrics.samples,
        loss = format!("{:.4}", metrics.loss),
        accuracy = format!("{:.2}", metrics.accuracy),
        "Evaluation complete"
    );
    Ok(metrics)
}

/// Evaluate an autodiff model through its inner backend.
pub fn evaluate_valid<B: AutodiffBackend>(
    model: &ConcatCnn<B>,
    set: &ImageSet,
    batch_size: usize,
    device: &B::Device,
) -> Result<EpochMetrics, CnnError> {
    evaluate::<B::InnerBackend>(&model.valid(), set, batch_size, device)
}

/// Write `model.mpk` and `meta.json` into `dir`, creating it if needed.
pub fn save_checkpoint<B: Backend>(
    dir: &Path,
    model: &ConcatCnn<B>,
    meta: &CheckpointMeta,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();

    model
        .clone()
        .save_file(dir.join(MODEL_FILE), &recorder)
        .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {e}", dir.display()))?;

    let meta_path = dir.join(META_FILE);
    serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, meta)?;

    tracing::info!(dir = %dir.display(), epochs = meta.epochs, "Checkpoint saved (model + meta)");
    Ok(())
}

/// Read the metadata of a checkpoint directory.
pub fn read_checkpoint_meta(dir: &Path) -> anyhow::Result<CheckpointMeta> {
    let meta_path = dir.join(META_FILE);
    let meta: CheckpointMeta = serde_json::from_reader(
        std::fs::File::open(&meta_path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", meta_path.display()))?,
    )
    .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", meta_path.display()))?;
    Ok(meta)
}

/// Load a ConcatCnn from a checkpoint directory.
///
/// Creates a fresh model from config, then loads saved weights on top.
pub fn load_checkpoint<B: Backend>(
    dir: &Path,
    config: &ConcatCnnConfig,
    device: &B::Device,
) -> anyhow::Result<ConcatCnn<B>> {
    config.check()?;
    let model = config
        .init::<B>(device)
        .load_file(
            dir.join(MODEL_FILE),
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint from {}: {e}", dir.display()))?;
    Ok(model)
}
