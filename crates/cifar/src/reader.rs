//! Reads CIFAR-10 binary batch files.
//!
//! The binary distribution stores each split as a sequence of 3073-byte
//! records: one label byte followed by a 32x32 RGB image in channel-major
//! order. The training split is spread over `data_batch_1.bin` through
//! `data_batch_5.bin`; the test split lives in `test_batch.bin`.

use crate::types::{
    DatasetError, DatasetSplit, DatasetSummary, RawImageSet, IMAGE_SIZE, NUM_CLASSES, RECORD_SIZE,
};
use std::path::{Path, PathBuf};

/// Number of training batch files in the binary distribution.
pub const TRAIN_BATCH_COUNT: usize = 5;
/// File name of the test batch.
pub const TEST_BATCH_FILE: &str = "test_batch.bin";

/// File name of training batch `n` (1-based).
pub fn train_batch_file(n: usize) -> String {
    format!("data_batch_{n}.bin")
}

/// Static methods for reading CIFAR-10 data from disk.
pub struct Cifar10Reader;

impl Cifar10Reader {
    /// Read every record of a single binary batch file.
    pub fn read_batch(path: &Path) -> Result<RawImageSet, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::MissingFile(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let raw = Self::parse_records(path, &bytes)?;

        tracing::debug!(
            count = raw.len(),
            path = %path.display(),
            "Read CIFAR-10 batch"
        );

        Ok(raw)
    }

    /// Parse binary records, validating length and labels.
    fn parse_records(path: &Path, bytes: &[u8]) -> Result<RawImageSet, DatasetError> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(DatasetError::Truncated {
                path: path.to_path_buf(),
                len: bytes.len(),
            });
        }

        let count = bytes.len() / RECORD_SIZE;
        let mut raw = RawImageSet::with_capacity(count);
        for (index, record) in bytes.chunks_exact(RECORD_SIZE).enumerate() {
            let label = record[0];
            if label as usize >= NUM_CLASSES {
                return Err(DatasetError::InvalidLabel {
                    path: path.to_path_buf(),
                    index,
                    label,
                });
            }
            raw.push(label, &record[1..]);
        }
        Ok(raw)
    }

    /// Read the raw training split, stopping once `limit` images are collected.
    ///
    /// Batch files are read in order; missing files after the first are
    /// tolerated so that partial or synthetic datasets with fewer batches load.
    pub fn read_train(root: &Path, limit: Option<usize>) -> Result<RawImageSet, DatasetError> {
        let mut train = RawImageSet::default();
        for n in 1..=TRAIN_BATCH_COUNT {
            if limit.is_some_and(|l| train.len() >= l) {
                break;
            }
            let path = root.join(train_batch_file(n));
            if n > 1 && !path.exists() {
                tracing::debug!(path = %path.display(), "No more training batches");
                break;
            }
            train.extend(Self::read_batch(&path)?);
        }
        if let Some(l) = limit {
            train.truncate(l);
        }
        if train.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(train)
    }

    /// Read the raw test split.
    pub fn read_test(root: &Path) -> Result<RawImageSet, DatasetError> {
        Self::read_batch(&root.join(TEST_BATCH_FILE))
    }

    /// Load and normalize both splits.
    ///
    /// `num_samples` caps the training split (the test split is always read
    /// in full). Images come back as float32 in `[0, 1]`, labels as int32.
    pub fn load_data(root: &Path, num_samples: Option<usize>) -> Result<DatasetSplit, DatasetError> {
        let train = Self::read_train(root, num_samples)?.normalize();
        let test = Self::read_test(root)?.normalize();

        let [n, c, h, w] = train.shape();
        tracing::info!(
            root = %root.display(),
            test = test.len(),
            "shape: ({n}, {c}, {h}, {w})"
        );

        Ok(DatasetSplit { train, test })
    }

    /// Count images per split and per class without normalizing.
    pub fn read_summary(root: &Path) -> Result<DatasetSummary, DatasetError> {
        let train = Self::read_train(root, None)?;
        let test = Self::read_test(root)?;

        Ok(DatasetSummary {
            train_count: train.len(),
            test_count: test.len(),
            train_histogram: histogram(&train.labels),
            test_histogram: histogram(&test.labels),
        })
    }

    /// Paths of all batch files expected under `root`.
    pub fn expected_files(root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = (1..=TRAIN_BATCH_COUNT)
            .map(|n| root.join(train_batch_file(n)))
            .collect();
        files.push(root.join(TEST_BATCH_FILE));
        files
    }
}

fn histogram(labels: &[u8]) -> Vec<usize> {
    let mut counts = vec![0usize; NUM_CLASSES];
    for &l in labels {
        counts[l as usize] += 1;
    }
    counts
}

/// Number of whole images in a byte buffer of pixel data.
pub fn image_count(pixel_bytes: usize) -> usize {
    pixel_bytes / IMAGE_SIZE
}
