//! Data types for CIFAR-10 images, labels, and dataset splits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Number of colour channels per image.
pub const IMAGE_CHANNELS: usize = 3;
/// Image height in pixels.
pub const IMAGE_HEIGHT: usize = 32;
/// Image width in pixels.
pub const IMAGE_WIDTH: usize = 32;
/// Number of pixel bytes per image (CHW layout).
pub const IMAGE_SIZE: usize = IMAGE_CHANNELS * IMAGE_HEIGHT * IMAGE_WIDTH;
/// Size of one binary record: 1 label byte followed by the image.
pub const RECORD_SIZE: usize = 1 + IMAGE_SIZE;
/// Number of CIFAR-10 classes.
pub const NUM_CLASSES: usize = 10;

/// Human-readable class names, indexed by label.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Errors that can occur while reading or writing CIFAR-10 data.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// A required batch file does not exist.
    #[error("Missing dataset file: {}", .0.display())]
    MissingFile(PathBuf),

    /// File length is not a whole number of records.
    #[error("Truncated batch file {}: {} bytes is not a multiple of {}", .path.display(), .len, RECORD_SIZE)]
    Truncated { path: PathBuf, len: usize },

    /// A record carries a label outside `0..NUM_CLASSES`.
    #[error("Invalid label {} at record {} in {}", .label, .index, .path.display())]
    InvalidLabel {
        path: PathBuf,
        index: usize,
        label: u8,
    },

    /// Pixel and label buffers disagree on the number of images.
    #[error("Inconsistent image set: {pixels} pixel bytes for {labels} labels")]
    Inconsistent { pixels: usize, labels: usize },

    /// The dataset contains no images.
    #[error("Dataset is empty")]
    Empty,

    /// IO error while reading or writing batch files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Images as stored on disk: uint8 pixels in CHW order plus uint8 labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawImageSet {
    /// Concatenated images, `IMAGE_SIZE` bytes each.
    pub pixels: Vec<u8>,
    /// One label per image.
    pub labels: Vec<u8>,
}

impl RawImageSet {
    /// Create an empty set with room for `capacity` images.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pixels: Vec::with_capacity(capacity * IMAGE_SIZE),
            labels: Vec::with_capacity(capacity),
        }
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set holds no images.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append one image.
    pub fn push(&mut self, label: u8, pixels: &[u8]) {
        debug_assert_eq!(pixels.len(), IMAGE_SIZE);
        self.labels.push(label);
        self.pixels.extend_from_slice(pixels);
    }

    /// Append all images of `other`.
    pub fn extend(&mut self, other: RawImageSet) {
        self.pixels.extend(other.pixels);
        self.labels.extend(other.labels);
    }

    /// Keep only the first `n` images. No-op when `n >= len`.
    pub fn truncate(&mut self, n: usize) {
        if n < self.len() {
            self.labels.truncate(n);
            self.pixels.truncate(n * IMAGE_SIZE);
        }
    }

    /// Pixel bytes of image `index`.
    pub fn image(&self, index: usize) -> &[u8] {
        &self.pixels[index * IMAGE_SIZE..(index + 1) * IMAGE_SIZE]
    }

    /// Convert to float32 in `[0, 1]` with int32 labels.
    pub fn normalize(&self) -> ImageSet {
        ImageSet {
            images: self.pixels.iter().map(|&p| p as f32 / 255.0).collect(),
            labels: self.labels.iter().map(|&l| l as i32).collect(),
        }
    }
}

/// Training-ready images: float32 pixels scaled by `1/255`, int32 labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSet {
    /// Concatenated CHW images, `IMAGE_SIZE` floats each.
    pub images: Vec<f32>,
    /// One label per image, in `0..NUM_CLASSES`.
    pub labels: Vec<i32>,
}

impl ImageSet {
    /// Build a set from flat buffers, checking that they agree.
    pub fn new(images: Vec<f32>, labels: Vec<i32>) -> Result<Self, DatasetError> {
        if images.len() != labels.len() * IMAGE_SIZE {
            return Err(DatasetError::Inconsistent {
                pixels: images.len(),
                labels: labels.len(),
            });
        }
        Ok(Self { images, labels })
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set holds no images.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Tensor shape of the whole set: `[n, channels, height, width]`.
    pub fn shape(&self) -> [usize; 4] {
        [self.len(), IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_WIDTH]
    }

    /// Float pixels of image `index`.
    pub fn image(&self, index: usize) -> &[f32] {
        &self.images[index * IMAGE_SIZE..(index + 1) * IMAGE_SIZE]
    }

    /// Keep only the first `n` images. No-op when `n >= len`.
    pub fn truncate(&mut self, n: usize) {
        if n < self.len() {
            self.labels.truncate(n);
            self.images.truncate(n * IMAGE_SIZE);
        }
    }

    /// Collect the images and labels at `indices` into contiguous buffers.
    pub fn gather(&self, indices: &[usize]) -> (Vec<f32>, Vec<i32>) {
        let mut images = Vec::with_capacity(indices.len() * IMAGE_SIZE);
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            images.extend_from_slice(self.image(i));
            labels.push(self.labels[i]);
        }
        (images, labels)
    }

    /// Number of images per class.
    pub fn class_histogram(&self) -> [usize; NUM_CLASSES] {
        let mut counts = [0usize; NUM_CLASSES];
        for &label in &self.labels {
            if let Some(slot) = usize::try_from(label).ok().and_then(|l| counts.get_mut(l)) {
                *slot += 1;
            }
        }
        counts
    }
}

/// Training and test splits as returned by `load_data`.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: ImageSet,
    pub test: ImageSet,
}

/// Summary statistics of a dataset directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Number of training images.
    pub train_count: usize,
    /// Number of test images.
    pub test_count: usize,
    /// Training images per class.
    pub train_histogram: Vec<usize>,
    /// Test images per class.
    pub test_histogram: Vec<usize>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Train images: {}", self.train_count)?;
        writeln!(f, "Test images:  {}", self.test_count)?;
        for (i, name) in CLASS_NAMES.iter().enumerate() {
            let train = self.train_histogram.get(i).copied().unwrap_or(0);
            let test = self.test_histogram.get(i).copied().unwrap_or(0);
            writeln!(f, "  {name:<12} train={train:<6} test={test}")?;
        }
        Ok(())
    }
}
