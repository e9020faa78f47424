//! Train, summary, evaluate and synthetic-data pipelines behind the CLI.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::module::{AutodiffModule, Module};
use cifar::{Cifar10Reader, Cifar10Writer, DatasetSplit, SyntheticConfig};
use cnn::inference::Classifier;
use cnn::model::ConcatCnnConfig;
use cnn::training::callbacks::{
    Callback, EpochVerifyMetrics, LearningRateScheduler, VerifyMetrics,
};
use cnn::training::metrics::EpochMetrics;
use cnn::training::trainer::{
    evaluate_valid, fit_with, read_checkpoint_meta, save_checkpoint, CheckpointMeta,
};

use crate::config::{build_train_settings, load_or_default, CliOverrides, TrainSettings};
use crate::results::{median, TrainReport};

/// Backend used for training: CPU ndarray with autodiff.
pub type TrainBackend = Autodiff<NdArray<f32>>;
/// Backend used for evaluation and inference.
pub type EvalBackend = NdArray<f32>;

pub const MODEL_BANNER: &str = "Functional API, cifar10 cnn concat model";

const EVAL_BATCH_SIZE: usize = 256;

/// Arguments for the `train` subcommand.
#[derive(Debug, Default)]
pub struct TrainArgs {
    /// Optional TOML config; defaults apply when absent.
    pub config: Option<PathBuf>,
    pub overrides: CliOverrides,
    /// Path to write the JSON training report.
    pub report: Option<PathBuf>,
}

/// Arguments for the `summary` subcommand.
#[derive(Debug, Default)]
pub struct SummaryArgs {
    pub config: Option<PathBuf>,
    /// Also print split sizes and class histograms of this dataset directory.
    pub data_dir: Option<PathBuf>,
    pub json: bool,
}

/// Arguments for the `evaluate` subcommand.
#[derive(Debug)]
pub struct EvaluateArgs {
    /// Checkpoint directory holding `model.mpk` and `meta.json`.
    pub checkpoint: PathBuf,
    pub data_dir: PathBuf,
    pub synthetic: bool,
    pub batch_size: usize,
}

/// Arguments for the `gen-synthetic` subcommand.
#[derive(Debug)]
pub struct GenSyntheticArgs {
    pub output: PathBuf,
    pub train: usize,
    pub test: usize,
    pub seed: u64,
    pub noise: u8,
}

/// Banner plus the two branch summaries and the full model summary.
pub fn render_summaries(model: &ConcatCnnConfig) -> String {
    let hw = [model.image_size, model.image_size];
    let branch1 = model.branch_config(1).summary("input1", hw);
    let branch2 = model.branch_config(2).summary("input2", hw);
    format!("{MODEL_BANNER}\n{branch1}\n\n{branch2}\n\n{}", model.summary())
}

/// Load the train/test split, from disk or generated.
fn load_split(
    data_dir: &Path,
    synthetic: bool,
    num_samples: Option<usize>,
    seed: u64,
) -> anyhow::Result<DatasetSplit> {
    if synthetic {
        let defaults = SyntheticConfig::default();
        let config = SyntheticConfig {
            train_samples: num_samples.unwrap_or(defaults.train_samples),
            seed,
            ..defaults
        };
        tracing::info!(
            train = config.train_samples,
            test = config.test_samples,
            seed,
            "Generating synthetic dataset"
        );
        return Ok(config.generate());
    }

    Cifar10Reader::load_data(data_dir, num_samples).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load CIFAR-10 from {}: {e} (extract the binary version there, or pass --synthetic)",
            data_dir.display()
        )
    })
}

fn build_callbacks(settings: &TrainSettings) -> Vec<Box<dyn Callback>> {
    let mut callbacks: Vec<Box<dyn Callback>> = vec![Box::new(LearningRateScheduler::new(
        settings.fit.optimizer.learning_rate(),
        settings.lr_schedule,
    ))];
    if settings.early_stop {
        callbacks.push(Box::new(EpochVerifyMetrics::new(settings.min_accuracy)));
    }
    if settings.verify {
        callbacks.push(Box::new(VerifyMetrics::new(settings.min_accuracy)));
    }
    callbacks
}

/// Build, train and verify the model, then save a checkpoint and report.
pub fn run_train(args: TrainArgs) -> anyhow::Result<TrainReport> {
    let start = Instant::now();

    // 1. Resolve config
    let toml = load_or_default(args.config.as_deref())?;
    let settings = build_train_settings(&toml, &args.overrides)?;
    println!("{}", render_summaries(&settings.model));

    // 2. Load data
    let split = load_split(
        &settings.data_dir,
        settings.synthetic,
        settings.num_samples,
        settings.fit.seed,
    )?;
    tracing::info!(
        train = split.train.len(),
        test = split.test.len(),
        "Dataset ready"
    );

    // 3. Build model and callbacks
    let device = Default::default();
    let model = settings.model.init::<TrainBackend>(&device);
    let params = model.num_params();
    tracing::info!(params, "Model initialized");
    let mut callbacks = build_callbacks(&settings);

    let mut fit_config = settings.fit.clone();
    fit_config.checkpoint_dir = Some(settings.output_dir.display().to_string());

    // 4. Fit
    let outcome = fit_with::<TrainBackend>(
        &fit_config,
        model,
        &split.train,
        &mut callbacks,
        &device,
    )?;

    // 5. Test split + final checkpoint
    let test = if split.test.is_empty() {
        None
    } else {
        Some(evaluate_valid(&outcome.model, &split.test, EVAL_BATCH_SIZE, &device)?)
    };

    let final_accuracy = outcome.history.last().map(|m| m.accuracy).unwrap_or(0.0);
    let final_dir = settings.output_dir.join("final");
    let meta = CheckpointMeta {
        epochs: outcome.history.len(),
        steps: outcome.steps,
        accuracy: Some(final_accuracy),
        optimizer: settings.fit.optimizer.clone(),
        model: settings.model.clone(),
    };
    save_checkpoint(&final_dir, &outcome.model.valid(), &meta)?;

    let mut epoch_secs: Vec<f64> = outcome.history.epochs.iter().map(|m| m.elapsed_secs).collect();
    let report = TrainReport {
        model: settings.model.summary().name,
        params,
        optimizer: settings.fit.optimizer.clone(),
        batch_size: settings.fit.batch_size,
        train_samples: split.train.len(),
        test_samples: split.test.len(),
        synthetic: settings.synthetic,
        epochs: outcome.history.epochs.clone(),
        final_accuracy,
        test,
        baseline: settings.min_accuracy,
        verified: settings.verify.then_some(true),
        stopped_early: outcome.stopped_early,
        median_epoch_secs: median(&mut epoch_secs),
        elapsed_secs: start.elapsed().as_secs_f64(),
        checkpoint: final_dir.display().to_string(),
    };
    if let Some(path) = &args.report {
        report.write_json(path)?;
    }

    println!("\n--- Training Summary ---");
    println!("Epochs: {}", report.epochs.len());
    println!("Train accuracy: {:.2}%", report.final_accuracy);
    if let Some(t) = &report.test {
        println!("Test accuracy: {:.2}% (loss {:.4})", t.accuracy, t.loss);
    }
    println!("Baseline: {:.2}%", report.baseline);
    println!("Checkpoint: {}", report.checkpoint);
    println!("Elapsed: {:.1}s", report.elapsed_secs);

    Ok(report)
}

/// Print model summaries, and dataset statistics when a data directory is given.
pub fn run_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let toml = load_or_default(args.config.as_deref())?;
    let settings = build_train_settings(&toml, &CliOverrides::default())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&settings.model.summary())?);
    } else {
        println!("{}", render_summaries(&settings.model));
    }

    if let Some(dir) = &args.data_dir {
        let summary = Cifar10Reader::read_summary(dir)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("\n--- Dataset Summary ---");
            println!("Directory: {}", dir.display());
            println!("{summary}");
        }
    }
    Ok(())
}

/// Evaluate a checkpoint on the test split.
pub fn run_evaluate(args: EvaluateArgs) -> anyhow::Result<EpochMetrics> {
    let meta = read_checkpoint_meta(&args.checkpoint)?;
    tracing::info!(
        checkpoint = %args.checkpoint.display(),
        epochs = meta.epochs,
        steps = meta.steps,
        "Loading checkpoint"
    );

    let device = Default::default();
    let classifier = Classifier::<EvalBackend>::load(&args.checkpoint, &meta.model, device)?
        .with_batch_size(args.batch_size);

    // Only the test split matters; keep the train read to a single image.
    let split = load_split(&args.data_dir, args.synthetic, Some(1), SyntheticConfig::default().seed)?;
    let metrics = classifier.evaluate(&split.test)?;

    println!("--- Evaluation ---");
    println!("Checkpoint: {}", args.checkpoint.display());
    println!("Test images: {}", metrics.samples);
    println!("Loss: {:.4}", metrics.loss);
    println!("Accuracy: {:.2}%", metrics.accuracy);
    println!(
        "sparse_categorical_crossentropy: {:.4}",
        metrics.sparse_categorical_crossentropy
    );
    Ok(metrics)
}

/// Write a synthetic dataset in the CIFAR-10 binary layout.
pub fn run_gen_synthetic(args: GenSyntheticArgs) -> anyhow::Result<Vec<PathBuf>> {
    let config = SyntheticConfig {
        train_samples: args.train,
        test_samples: args.test,
        seed: args.seed,
        noise: args.noise,
    };
    let (train, test) = config.generate_raw();
    let files = Cifar10Writer::write_dataset(&args.output, &train, &test)?;

    println!("Wrote {} train and {} test images:", train.len(), test.len());
    for file in &files {
        println!("  {}", file.display());
    }
    Ok(files)
}
