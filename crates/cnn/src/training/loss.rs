//! Sparse categorical cross-entropy and accuracy for integer class labels.
//!
//! All functions are generic over `B: Backend` and take labels as
//! `Tensor<B, 1, Int>` holding class indices, as Keras' sparse losses do.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;

/// Lower clamp applied to probabilities before the log, as Keras' epsilon.
pub const PROB_EPSILON: f64 = 1e-7;

/// Sparse categorical cross-entropy on softmax probabilities.
///
/// `mean_i( -ln(clamp(probs[i, labels[i]], eps, 1)) )`
///
/// # Arguments
/// - `probs`: shape `(batch, num_classes)`, rows summing to 1
/// - `labels`: shape `(batch,)`, class indices
///
/// # Returns
/// Scalar loss tensor of shape `(1,)`.
pub fn sparse_categorical_crossentropy<B: Backend>(
    probs: Tensor<B, 2>,
    labels: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let [batch_size, _] = probs.dims();
    let picked = probs
        .clamp(PROB_EPSILON, 1.0)
        .log()
        .gather(1, labels.reshape([batch_size, 1])); // (batch, 1)
    picked.neg().mean()
}

/// Cross-entropy computed from raw logits (log-softmax is fused).
///
/// This is the training objective. On `softmax(logits)` it agrees with
/// [`sparse_categorical_crossentropy`] except where the clamp kicks in.
pub fn cross_entropy_from_logits<B: Backend>(
    logits: Tensor<B, 2>,
    labels: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let device = logits.device();
    CrossEntropyLossConfig::new()
        .init(&device)
        .forward(logits, labels)
}

/// Count of rows whose argmax equals the label.
///
/// Works on probabilities or logits alike. Returns `(correct, total)`.
pub fn accuracy<B: Backend>(scores: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> (usize, usize) {
    let [batch_size, _] = scores.dims();
    if batch_size == 0 {
        return (0, 0);
    }
    let predicted = scores.argmax(1).reshape([batch_size]);
    let correct: i64 = predicted.equal(labels).int().sum().into_scalar().elem();
    (correct.max(0) as usize, batch_size)
}
