//! Training pipeline: losses, metrics, callbacks, optimizer selection, and
//! the fit/evaluate loop.

pub mod callbacks;
pub mod loss;
pub mod metrics;
pub mod optimizer;
pub mod trainer;
