//! Batch classification of CIFAR-10 images with a trained model.
//!
//! `Classifier<B>` wraps a `ConcatCnn` and feeds every image to both inputs,
//! the same way the model was trained.

use std::path::Path;

use burn::prelude::*;
use cifar::{sequential_batches, ImageSet, CLASS_NAMES, IMAGE_SIZE};
use serde::Serialize;

use crate::error::CnnError;
use crate::model::bridge::{images_to_tensor, tensor_to_rows};
use crate::model::concat_cnn::{ConcatCnn, ConcatCnnConfig};
use crate::training::metrics::EpochMetrics;
use crate::training::trainer::{evaluate, load_checkpoint, read_checkpoint_meta};

const DEFAULT_BATCH_SIZE: usize = 256;

/// Predicted class for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class: usize,
    /// Softmax probability of `class`.
    pub confidence: f32,
}

impl Prediction {
    fn from_probs(probs: &[f32]) -> Self {
        let (class, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });
        Self { class, confidence }
    }

    /// Human-readable class name, if `class` is a CIFAR-10 label.
    pub fn class_name(&self) -> Option<&'static str> {
        CLASS_NAMES.get(self.class).copied()
    }
}

/// Classifier over a trained two-branch model.
pub struct Classifier<B: Backend> {
    model: ConcatCnn<B>,
    device: B::Device,
    batch_size: usize,
}

impl<B: Backend> Classifier<B> {
    pub fn new(model: ConcatCnn<B>, device: B::Device) -> Self {
        Self {
            model,
            device,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Images per forward pass (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Load a classifier from a checkpoint directory with an explicit config.
    pub fn load(dir: &Path, config: &ConcatCnnConfig, device: B::Device) -> anyhow::Result<Self> {
        let model = load_checkpoint::<B>(dir, config, &device)?;
        Ok(Self::new(model, device))
    }

    /// Load a classifier using the architecture recorded in the checkpoint.
    pub fn load_from_meta(dir: &Path, device: B::Device) -> anyhow::Result<Self> {
        let meta = read_checkpoint_meta(dir)?;
        Self::load(dir, &meta.model, device)
    }

    pub fn model(&self) -> &ConcatCnn<B> {
        &self.model
    }

    /// Class probabilities for `count` flat CHW images, one row per image.
    ///
    /// `images` must hold exactly `count` images.
    pub fn predict_proba(&self, images: &[f32], count: usize) -> Result<Vec<Vec<f32>>, CnnError> {
        if images.len() != count * IMAGE_SIZE {
            return Err(CnnError::ImageBuffer {
                len: images.len(),
                count,
                image_size: IMAGE_SIZE,
            });
        }
        let mut rows = Vec::with_capacity(count);
        for range in sequential_batches(count, self.batch_size) {
            let chunk = &images[range.start * IMAGE_SIZE..range.end * IMAGE_SIZE];
            let x = images_to_tensor::<B>(chunk, range.len(), &self.device);
            rows.extend(tensor_to_rows(self.model.forward(x.clone(), x))?);
        }
        Ok(rows)
    }

    /// Predict every image of `set`.
    pub fn predict(&self, set: &ImageSet) -> Result<Vec<Prediction>, CnnError> {
        let rows = self.predict_proba(&set.images, set.len())?;
        Ok(rows.iter().map(|row| Prediction::from_probs(row)).collect())
    }

    /// Predict a single `3x32x32` image, or `None` for a wrong-length buffer.
    pub fn predict_one(&self, image: &[f32]) -> Option<Prediction> {
        self.predict_proba(image, 1)
            .ok()?
            .first()
            .map(|row| Prediction::from_probs(row))
    }

    /// Loss and accuracy over every image of `set`.
    pub fn evaluate(&self, set: &ImageSet) -> Result<EpochMetrics, CnnError> {
        evaluate(&self.model, set, self.batch_size, &self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use cifar::SyntheticConfig;

    type TestBackend = NdArray<f32>;

    fn make_classifier() -> Classifier<TestBackend> {
        let device = Default::default();
        let model = ConcatCnnConfig::new()
            .with_branch_filters(2)
            .with_trunk_filters(4)
            .with_dense_units(8)
            .init::<TestBackend>(&device);
        Classifier::new(model, device).with_batch_size(3)
    }

    fn make_set(n: usize) -> ImageSet {
        SyntheticConfig {
            train_samples: n,
            test_samples: 1,
            seed: 11,
            noise: 8,
        }
        .generate()
        .train
    }

    #[test]
    fn test_prediction_from_probs() {
        let p = Prediction::from_probs(&[0.1, 0.7, 0.2]);
        assert_eq!(p.class, 1);
        assert!((p.confidence - 0.7).abs() < 1e-6);
        assert_eq!(p.class_name(), Some("automobile"));
        assert_eq!(Prediction { class: 42, confidence: 1.0 }.class_name(), None);
    }

    #[test]
    fn test_predict_covers_partial_batches() {
        let classifier = make_classifier();
        let set = make_set(7);
        let predictions = classifier.predict(&set).unwrap();
        assert_eq!(predictions.len(), 7);
        for p in &predictions {
            assert!(p.class < 10);
            assert!(p.confidence > 0.0 && p.confidence <= 1.0);
        }

        let probs = classifier.predict_proba(&set.images, set.len()).unwrap();
        for row in probs {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_predict_is_deterministic_and_batch_independent() {
        let classifier = make_classifier();
        let set = make_set(5);
        let batched = classifier.predict(&set).unwrap();
        let single = classifier.predict_one(set.image(4)).unwrap();
        assert_eq!(batched[4].class, single.class);
        assert!((batched[4].confidence - single.confidence).abs() < 1e-5);
    }

    #[test]
    fn test_predict_edge_cases() {
        let classifier = make_classifier();
        assert!(classifier.predict(&ImageSet::default()).unwrap().is_empty());
        assert!(classifier.predict_one(&[0.0; 10]).is_none());
    }

    #[test]
    fn test_predict_proba_rejects_short_buffer() {
        let classifier = make_classifier();
        let set = make_set(2);
        // claims three images but only two are present
        match classifier.predict_proba(&set.images, 3) {
            Err(CnnError::ImageBuffer { len, count: 3, .. }) => assert_eq!(len, 2 * IMAGE_SIZE),
            other => panic!("Expected ImageBuffer, got {other:?}"),
        }
        assert!(classifier.predict_proba(&set.images[..IMAGE_SIZE + 5], 1).is_err());
        assert!(classifier.predict_proba(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_evaluate_matches_set_size() {
        let classifier = make_classifier();
        let metrics = classifier.evaluate(&make_set(4)).unwrap();
        assert_eq!(metrics.samples, 4);
    }
}
