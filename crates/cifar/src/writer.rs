//! Writes images to CIFAR-10 binary batch files.

use crate::reader::{train_batch_file, TEST_BATCH_FILE, TRAIN_BATCH_COUNT};
use crate::types::{DatasetError, RawImageSet, IMAGE_SIZE, RECORD_SIZE};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Records per training batch file in the binary distribution.
pub const RECORDS_PER_BATCH: usize = 10_000;

/// Buffers labelled images and writes them as one binary batch file.
pub struct Cifar10Writer {
    images: RawImageSet,
    output_path: PathBuf,
}

impl Cifar10Writer {
    /// Create a new writer that will write to the given path.
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            images: RawImageSet::default(),
            output_path,
        }
    }

    /// Buffer a single image.
    pub fn record(&mut self, label: u8, pixels: &[u8]) {
        self.images.push(label, pixels);
    }

    /// Buffer every image of a raw set.
    pub fn record_all(&mut self, images: RawImageSet) {
        self.images.extend(images);
    }

    /// Number of buffered images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Write all buffered images and return the output path.
    pub fn finish(self) -> Result<PathBuf, DatasetError> {
        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut bytes = Vec::with_capacity(self.images.len() * RECORD_SIZE);
        for (label, pixels) in self
            .images
            .labels
            .iter()
            .zip(self.images.pixels.chunks_exact(IMAGE_SIZE))
        {
            bytes.push(*label);
            bytes.extend_from_slice(pixels);
        }

        let mut file = std::fs::File::create(&self.output_path)?;
        file.write_all(&bytes)?;
        file.flush()?;

        tracing::info!(
            count = self.images.len(),
            path = %self.output_path.display(),
            "Wrote CIFAR-10 batch"
        );

        Ok(self.output_path)
    }

    /// Write a full dataset directory: training images split into
    /// `data_batch_N.bin` files of up to `RECORDS_PER_BATCH` images, plus
    /// `test_batch.bin`.
    ///
    /// Training images beyond `TRAIN_BATCH_COUNT * RECORDS_PER_BATCH` are
    /// dropped with a warning.
    pub fn write_dataset(
        root: &Path,
        train: &RawImageSet,
        test: &RawImageSet,
    ) -> Result<Vec<PathBuf>, DatasetError> {
        if train.is_empty() {
            return Err(DatasetError::Empty);
        }
        std::fs::create_dir_all(root)?;

        let capacity = TRAIN_BATCH_COUNT * RECORDS_PER_BATCH;
        if train.len() > capacity {
            tracing::warn!(
                images = train.len(),
                capacity,
                "Training set exceeds batch file capacity, extra images dropped"
            );
        }

        let mut written = Vec::new();
        let used = train.len().min(capacity);
        for (batch_idx, start) in (0..used).step_by(RECORDS_PER_BATCH).enumerate() {
            let end = (start + RECORDS_PER_BATCH).min(used);
            let mut writer = Cifar10Writer::new(root.join(train_batch_file(batch_idx + 1)));
            for i in start..end {
                writer.record(train.labels[i], train.image(i));
            }
            written.push(writer.finish()?);
        }

        let mut writer = Cifar10Writer::new(root.join(TEST_BATCH_FILE));
        writer.record_all(test.clone());
        written.push(writer.finish()?);

        Ok(written)
    }
}
