//! Synthetic CIFAR-shaped datasets.
//!
//! Each class is drawn as a flat colour with class-specific horizontal
//! stripes, plus uniform pixel noise. The patterns are easy enough for a small
//! convolutional network to separate within a few dozen steps, which makes the
//! data useful for tests and for dry runs when the real dataset is absent.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::types::{
    DatasetSplit, RawImageSet, IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_SIZE, IMAGE_WIDTH, NUM_CLASSES,
};

/// Parameters for synthetic dataset generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Number of training images.
    #[serde(default = "default_train_samples")]
    pub train_samples: usize,
    /// Number of test images.
    #[serde(default = "default_test_samples")]
    pub test_samples: usize,
    /// RNG seed; the same seed always yields the same pixels.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Maximum absolute noise added to each pixel (0-255 scale).
    #[serde(default = "default_noise")]
    pub noise: u8,
}

fn default_train_samples() -> usize {
    1_000
}
fn default_test_samples() -> usize {
    200
}
fn default_seed() -> u64 {
    42
}
fn default_noise() -> u8 {
    24
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            train_samples: default_train_samples(),
            test_samples: default_test_samples(),
            seed: default_seed(),
            noise: default_noise(),
        }
    }
}

impl SyntheticConfig {
    /// Generate raw `(train, test)` image sets.
    pub fn generate_raw(&self) -> (RawImageSet, RawImageSet) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let train = generate_set(self.train_samples, self.noise, &mut rng);
        let test = generate_set(self.test_samples, self.noise, &mut rng);
        (train, test)
    }

    /// Generate normalized splits, ready for training.
    pub fn generate(&self) -> DatasetSplit {
        let (train, test) = self.generate_raw();
        DatasetSplit {
            train: train.normalize(),
            test: test.normalize(),
        }
    }
}

/// Base colour of a class, one value per channel.
fn class_colour(class: usize) -> [u8; IMAGE_CHANNELS] {
    [
        ((class * 67 + 20) % 256) as u8,
        ((class * 139 + 90) % 256) as u8,
        ((class * 29 + 160) % 256) as u8,
    ]
}

fn generate_set(count: usize, noise: u8, rng: &mut StdRng) -> RawImageSet {
    let mut set = RawImageSet::with_capacity(count);
    let mut pixels = vec![0u8; IMAGE_SIZE];

    for i in 0..count {
        let class = i % NUM_CLASSES;
        let colour = class_colour(class);
        let stripe = class % 4 + 1;

        for (ch, &base) in colour.iter().enumerate() {
            for y in 0..IMAGE_HEIGHT {
                let bright = if (y / stripe) % 2 == 0 { 48 } else { 0 };
                for x in 0..IMAGE_WIDTH {
                    let jitter = if noise > 0 {
                        rng.gen_range(-(noise as i16)..=noise as i16)
                    } else {
                        0
                    };
                    let value = base as i16 + bright + jitter;
                    pixels[(ch * IMAGE_HEIGHT + y) * IMAGE_WIDTH + x] = value.clamp(0, 255) as u8;
                }
            }
        }
        set.push(class as u8, &pixels);
    }
    set
}
