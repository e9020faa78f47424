//! Two-branch concatenated convolutional network for CIFAR-10.
//!
//! Two identical convolutional branches read the same-shaped inputs, their
//! feature maps are concatenated along the channel axis, and a conv/pool/dense
//! trunk produces softmax class probabilities. Training uses SGD or Adam on
//! sparse categorical cross-entropy with Keras-style callbacks.

pub mod error;
pub mod inference;
pub mod model;
pub mod training;

pub use error::CnnError;
