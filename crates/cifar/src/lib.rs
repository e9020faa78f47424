//! CIFAR-10 dataset I/O for the concat CNN example.
//!
//! Reads and writes the CIFAR-10 binary batch format, normalizes images for
//! training, samples shuffled mini-batches, and generates synthetic datasets
//! with the same layout for tests and dry runs.

pub mod batcher;
pub mod reader;
pub mod synthetic;
pub mod types;
pub mod writer;

pub use batcher::{sequential_batches, BatchSampler};
pub use reader::Cifar10Reader;
pub use synthetic::SyntheticConfig;
pub use types::{
    DatasetError, DatasetSplit, DatasetSummary, ImageSet, RawImageSet, CLASS_NAMES,
    IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_SIZE, IMAGE_WIDTH, NUM_CLASSES, RECORD_SIZE,
};
pub use writer::Cifar10Writer;
