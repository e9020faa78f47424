//! Integration tests for the cifar crate.
//!
//! These exercise full pipelines: synthetic generation → binary writing →
//! reading → normalization → batch sampling. No real CIFAR-10 download needed.

use cifar::{
    BatchSampler, Cifar10Reader, Cifar10Writer, DatasetError, SyntheticConfig, IMAGE_SIZE,
    NUM_CLASSES, RECORD_SIZE,
};
use tempfile::TempDir;

fn write_synthetic(dir: &std::path::Path, train: usize, test: usize) {
    let (train_set, test_set) = SyntheticConfig {
        train_samples: train,
        test_samples: test,
        seed: 5,
        noise: 8,
    }
    .generate_raw();
    Cifar10Writer::write_dataset(dir, &train_set, &test_set).unwrap();
}

#[test]
fn test_load_data_roundtrip() {
    let tmp = TempDir::new().unwrap();
    write_synthetic(tmp.path(), 120, 30);

    let split = Cifar10Reader::load_data(tmp.path(), None).unwrap();
    assert_eq!(split.train.len(), 120);
    assert_eq!(split.test.len(), 30);
    assert_eq!(split.train.shape(), [120, 3, 32, 32]);
    assert!(split.train.images.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert!(split.train.labels.iter().all(|&l| (0..NUM_CLASSES as i32).contains(&l)));
}

#[test]
fn test_num_samples_truncates_train_only() {
    let tmp = TempDir::new().unwrap();
    write_synthetic(tmp.path(), 50, 20);

    let split = Cifar10Reader::load_data(tmp.path(), Some(17)).unwrap();
    assert_eq!(split.train.len(), 17);
    assert_eq!(split.test.len(), 20);

    // Asking for more than exists returns everything.
    let split = Cifar10Reader::load_data(tmp.path(), Some(10_000)).unwrap();
    assert_eq!(split.train.len(), 50);
}

#[test]
fn test_train_split_spans_multiple_batch_files() {
    let tmp = TempDir::new().unwrap();
    write_synthetic(tmp.path(), 10_005, 1);

    assert!(tmp.path().join("data_batch_1.bin").exists());
    assert!(tmp.path().join("data_batch_2.bin").exists());
    assert!(!tmp.path().join("data_batch_3.bin").exists());

    let len = std::fs::metadata(tmp.path().join("data_batch_2.bin")).unwrap().len() as usize;
    assert_eq!(len, 5 * RECORD_SIZE);

    let train = Cifar10Reader::read_train(tmp.path(), None).unwrap();
    assert_eq!(train.len(), 10_005);

    // A limit inside the first file never touches the second.
    let train = Cifar10Reader::read_train(tmp.path(), Some(10)).unwrap();
    assert_eq!(train.len(), 10);
    assert_eq!(train.pixels.len(), 10 * IMAGE_SIZE);
}

#[test]
fn test_missing_test_batch() {
    let tmp = TempDir::new().unwrap();
    write_synthetic(tmp.path(), 10, 5);
    std::fs::remove_file(tmp.path().join("test_batch.bin")).unwrap();

    let err = Cifar10Reader::load_data(tmp.path(), None).unwrap_err();
    assert!(matches!(err, DatasetError::MissingFile(_)));
}

#[test]
fn test_missing_first_train_batch() {
    let tmp = TempDir::new().unwrap();
    let err = Cifar10Reader::load_data(tmp.path(), None).unwrap_err();
    assert!(matches!(err, DatasetError::MissingFile(_)));
}

#[test]
fn test_read_summary_histograms() {
    let tmp = TempDir::new().unwrap();
    write_synthetic(tmp.path(), 40, 20);

    let summary = Cifar10Reader::read_summary(tmp.path()).unwrap();
    assert_eq!(summary.train_count, 40);
    assert_eq!(summary.test_count, 20);
    assert_eq!(summary.train_histogram, vec![4; NUM_CLASSES]);
    assert_eq!(summary.test_histogram, vec![2; NUM_CLASSES]);

    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains("\"train_count\":40"));

    let text = summary.to_string();
    assert!(text.contains("airplane"));
    assert!(text.contains("truck"));
}

#[test]
fn test_sampler_over_loaded_split() {
    let tmp = TempDir::new().unwrap();
    write_synthetic(tmp.path(), 100, 10);
    let split = Cifar10Reader::load_data(tmp.path(), None).unwrap();

    let mut sampler = BatchSampler::new(split.train.len(), 32, 1);
    let batches = sampler.epoch_batches();
    assert_eq!(batches.len(), 3);

    let (images, labels) = split.train.gather(&batches[0]);
    assert_eq!(images.len(), 32 * IMAGE_SIZE);
    assert_eq!(labels.len(), 32);
    for (k, &idx) in batches[0].iter().enumerate() {
        assert_eq!(labels[k], split.train.labels[idx]);
    }
}
