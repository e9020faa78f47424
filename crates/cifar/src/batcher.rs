//! Mini-batch index sampling for one pass over a dataset.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Produces the mini-batch index lists for each epoch.
///
/// Every epoch visits each index at most once. The trailing partial batch is
/// dropped, so an epoch runs `len / batch_size` iterations.
pub struct BatchSampler {
    len: usize,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl BatchSampler {
    /// Create a sampler over `len` items. Shuffling is on by default.
    pub fn new(len: usize, batch_size: usize, seed: u64) -> Self {
        Self {
            len,
            batch_size,
            shuffle: true,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Enable or disable per-epoch shuffling.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of full batches per epoch.
    pub fn iterations(&self) -> usize {
        if self.batch_size == 0 {
            0
        } else {
            self.len / self.batch_size
        }
    }

    /// Index batches for the next epoch.
    pub fn epoch_batches(&mut self) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.len).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        let iterations = self.iterations();
        order
            .chunks_exact(self.batch_size.max(1))
            .take(iterations)
            .map(|c| c.to_vec())
            .collect()
    }
}

/// Sequential batches covering every index, including a final partial batch.
///
/// Used for evaluation, where every image must be scored.
pub fn sequential_batches(len: usize, batch_size: usize) -> Vec<std::ops::Range<usize>> {
    let step = batch_size.max(1);
    (0..len)
        .step_by(step)
        .map(|start| start..(start + step).min(len))
        .collect()
}
