//! Tensor bridge: converts flat image/label buffers from the `cifar` crate
//! into burn tensors, and burn outputs back into plain vectors.

use burn::prelude::*;
use burn::tensor::TensorData;
use cifar::{IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_SIZE, IMAGE_WIDTH};

use crate::error::CnnError;

/// Convert a flat buffer of `batch` CHW images into a 4D tensor.
///
/// # Panics
/// Panics if `images.len() != batch * IMAGE_SIZE` or `batch == 0`.
pub fn images_to_tensor<B: Backend>(
    images: &[f32],
    batch: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    assert!(batch > 0, "batch must not be empty");
    assert_eq!(
        images.len(),
        batch * IMAGE_SIZE,
        "image buffer has {} floats, expected {batch} x {IMAGE_SIZE}",
        images.len()
    );
    Tensor::from_data(
        TensorData::new(
            images.to_vec(),
            [batch, IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_WIDTH],
        ),
        device,
    )
}

/// Convert int32 class labels into a 1D integer tensor.
pub fn labels_to_tensor<B: Backend>(labels: &[i32], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = labels.iter().map(|&l| l as i64).collect();
    Tensor::from_data(TensorData::new(data, [labels.len()]), device)
}

/// Extract row-major rows from a 2D tensor, e.g. per-image class probabilities.
pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<Vec<f32>>, CnnError> {
    let [_, cols] = tensor.dims();
    let flat: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| CnnError::TensorData(format!("{e:?}")))?;
    Ok(flat.chunks(cols.max(1)).map(|c| c.to_vec()).collect())
}

/// Extract a single f64 scalar from a one-element tensor.
pub fn tensor_to_f64<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}
