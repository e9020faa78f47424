use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trainer::config::{CliOverrides, DEFAULT_DATA_DIR};
use trainer::pipeline::{
    self, EvaluateArgs, GenSyntheticArgs, SummaryArgs, TrainArgs,
};

/// cifar-concat: two-branch concatenated CNN trained on CIFAR-10.
#[derive(Parser)]
#[command(name = "cifar-concat", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for training, inspection, evaluation, and test data.
#[derive(Subcommand)]
enum Command {
    /// Build the model, train it, verify accuracy, and save a checkpoint.
    Train {
        /// Path to training config TOML file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory with the extracted CIFAR-10 binary batches.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Train on generated data instead of CIFAR-10.
        #[arg(long)]
        synthetic: bool,
        /// Number of training images to load.
        #[arg(long)]
        num_samples: Option<usize>,
        /// Override the number of epochs.
        #[arg(long)]
        epochs: Option<usize>,
        /// Override the batch size.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Override the optimizer learning rate.
        #[arg(long)]
        lr: Option<f64>,
        /// Override the accuracy (percent) the run must reach.
        #[arg(long)]
        min_accuracy: Option<f64>,
        /// Skip the final accuracy check.
        #[arg(long)]
        no_verify: bool,
        /// Directory for checkpoints.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Path to write a JSON training report.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the branch and full model summaries.
    Summary {
        /// Path to training config TOML file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Also summarize the dataset in this directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Output as JSON instead of tables.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a checkpoint on the test split.
    Evaluate {
        /// Checkpoint directory (contains model.mpk and meta.json).
        #[arg(long)]
        checkpoint: PathBuf,
        /// Directory with the extracted CIFAR-10 binary batches.
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
        /// Evaluate on generated data instead of CIFAR-10.
        #[arg(long)]
        synthetic: bool,
        /// Images per forward pass.
        #[arg(long, default_value_t = 256)]
        batch_size: usize,
    },
    /// Write a synthetic dataset in the CIFAR-10 binary layout.
    GenSynthetic {
        /// Output directory.
        #[arg(long)]
        output: PathBuf,
        /// Number of training images.
        #[arg(long, default_value_t = 1000)]
        train: usize,
        /// Number of test images.
        #[arg(long, default_value_t = 200)]
        test: usize,
        /// RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Maximum per-pixel noise (0-255 scale).
        #[arg(long, default_value_t = 24)]
        noise: u8,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            config,
            data_dir,
            synthetic,
            num_samples,
            epochs,
            batch_size,
            lr,
            min_accuracy,
            no_verify,
            output_dir,
            report,
        } => pipeline::run_train(TrainArgs {
            config,
            overrides: CliOverrides {
                data_dir,
                synthetic,
                num_samples,
                epochs,
                batch_size,
                lr,
                min_accuracy,
                no_verify,
                output_dir,
            },
            report,
        })
        .map(|_| ()),
        Command::Summary {
            config,
            data_dir,
            json,
        } => pipeline::run_summary(SummaryArgs {
            config,
            data_dir,
            json,
        }),
        Command::Evaluate {
            checkpoint,
            data_dir,
            synthetic,
            batch_size,
        } => pipeline::run_evaluate(EvaluateArgs {
            checkpoint,
            data_dir,
            synthetic,
            batch_size,
        })
        .map(|_| ()),
        Command::GenSynthetic {
            output,
            train,
            test,
            seed,
            noise,
        } => pipeline::run_gen_synthetic(GenSyntheticArgs {
            output,
            train,
            test,
            seed,
            noise,
        })
        .map(|_| ()),
    }
}
