//! Model components: the convolutional branch, the concatenated network,
//! Keras-style summaries, and the bridge from image buffers to burn tensors.

pub mod branch;
pub mod bridge;
pub mod concat_cnn;
pub mod summary;

pub use branch::{ConvBranch, ConvBranchConfig};
pub use concat_cnn::{ConcatCnn, ConcatCnnConfig};
pub use summary::{LayerSummary, ModelSummary};
