//! Integration tests for the trainer CLI pipeline.
//!
//! Each test runs a pipeline end to end on synthetic data in a temp directory,
//! with a narrow model from a TOML config so training stays fast.

use std::path::{Path, PathBuf};

use cifar::Cifar10Reader;
use cnn::CnnError;
use tempfile::TempDir;
use trainer::config::CliOverrides;
use trainer::pipeline::{
    run_evaluate, run_gen_synthetic, run_summary, run_train, EvaluateArgs, GenSyntheticArgs,
    SummaryArgs, TrainArgs,
};
use trainer::results::TrainReport;

fn write_small_config(dir: &Path) -> PathBuf {
    let path = dir.join("train.toml");
    std::fs::write(
        &path,
        r#"
[model]
branch_filters = 4
trunk_filters = 8
dense_units = 16

[training]
batch_size = 10
log_interval = 0
"#,
    )
    .unwrap();
    path
}

fn gen_data(dir: &Path) {
    run_gen_synthetic(GenSyntheticArgs {
        output: dir.to_path_buf(),
        train: 40,
        test: 20,
        seed: 9,
        noise: 8,
    })
    .unwrap();
}

#[test]
fn test_gen_synthetic_writes_readable_layout() {
    let tmp = TempDir::new().unwrap();
    gen_data(tmp.path());

    let summary = Cifar10Reader::read_summary(tmp.path()).unwrap();
    assert_eq!(summary.train_count, 40);
    assert_eq!(summary.test_count, 20);

    run_summary(SummaryArgs {
        config: None,
        data_dir: Some(tmp.path().to_path_buf()),
        json: true,
    })
    .unwrap();
}

#[test]
fn test_train_then_evaluate_from_disk() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let out_dir = tmp.path().join("ckpt");
    let report_path = tmp.path().join("report.json");
    gen_data(&data_dir);
    let config = write_small_config(tmp.path());

    let report = run_train(TrainArgs {
        config: Some(config),
        overrides: CliOverrides {
            data_dir: Some(data_dir.clone()),
            num_samples: Some(30),
            epochs: Some(2),
            no_verify: true,
            output_dir: Some(out_dir.clone()),
            ..Default::default()
        },
        report: Some(report_path.clone()),
    })
    .unwrap();

    assert_eq!(report.train_samples, 30);
    assert_eq!(report.test_samples, 20);
    assert_eq!(report.epochs.len(), 2);
    assert!(report.verified.is_none());
    assert_eq!(report.test.as_ref().map(|t| t.samples), Some(20));
    assert!(out_dir.join("epoch_1").join("model.mpk").exists());
    assert!(out_dir.join("final").join("meta.json").exists());

    let loaded = TrainReport::read_json(&report_path).unwrap();
    assert_eq!(loaded.params, report.params);

    let metrics = run_evaluate(EvaluateArgs {
        checkpoint: out_dir.join("final"),
        data_dir,
        synthetic: false,
        batch_size: 7,
    })
    .unwrap();
    assert_eq!(metrics.samples, 20);
    let test = report.test.unwrap();
    assert!((metrics.loss - test.loss).abs() < 1e-4);
    assert_eq!(metrics.accuracy, test.accuracy);
}

#[test]
fn test_train_fails_verification() {
    let tmp = TempDir::new().unwrap();
    let config = write_small_config(tmp.path());

    let err = run_train(TrainArgs {
        config: Some(config),
        overrides: CliOverrides {
            synthetic: true,
            num_samples: Some(20),
            min_accuracy: Some(100.5),
            output_dir: Some(tmp.path().join("ckpt")),
            ..Default::default()
        },
        report: None,
    })
    .unwrap_err();

    match err.downcast_ref::<CnnError>() {
        Some(CnnError::AccuracyBelowBaseline { required, .. }) => assert_eq!(*required, 100.5),
        other => panic!("Expected AccuracyBelowBaseline, got {other:?}"),
    }
}

#[test]
fn test_train_missing_data_dir_errors() {
    let tmp = TempDir::new().unwrap();
    let result = run_train(TrainArgs {
        config: Some(write_small_config(tmp.path())),
        overrides: CliOverrides {
            data_dir: Some(tmp.path().join("nope")),
            output_dir: Some(tmp.path().join("ckpt")),
            ..Default::default()
        },
        report: None,
    });
    assert!(result.is_err());
}

#[test]
fn test_train_invalid_model_section_errors_before_training() {
    let tmp = TempDir::new().unwrap();
    for section in ["num_classes = 5", "kernel_size = 9"] {
        let config = tmp.path().join("bad.toml");
        std::fs::write(&config, format!("[model]\n{section}\n")).unwrap();

        let err = run_train(TrainArgs {
            config: Some(config),
            overrides: CliOverrides {
                synthetic: true,
                num_samples: Some(20),
                no_verify: true,
                output_dir: Some(tmp.path().join("ckpt")),
                ..Default::default()
            },
            report: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("Invalid [model] section"), "{section}: {err}");
    }
    assert!(!tmp.path().join("ckpt").exists());
}
