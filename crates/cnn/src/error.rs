/// Errors raised by the model, training loop, and callbacks.
#[derive(Debug, thiserror::Error)]
pub enum CnnError {
    /// The two network inputs have different shapes.
    #[error("Input shape mismatch: input1 {left:?} vs input2 {right:?}")]
    InputMismatch { left: [usize; 4], right: [usize; 4] },

    /// Final training accuracy fell short of the required baseline.
    #[error("Accuracy {accuracy:.2}% is below the required baseline {required:.2}%")]
    AccuracyBelowBaseline { accuracy: f64, required: f64 },

    /// No metrics were recorded before a check that needs them.
    #[error("No epoch metrics recorded")]
    NoMetrics,

    /// Training or evaluation was asked to run on an empty dataset.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Batch size is zero or larger than the dataset.
    #[error("Invalid batch size {batch_size} for {samples} samples")]
    InvalidBatchSize { batch_size: usize, samples: usize },

    /// Model hyperparameters that cannot be built or cannot label CIFAR-10.
    #[error("Invalid model config: {0}")]
    InvalidModelConfig(String),

    /// A flat image buffer that does not hold `count` whole images.
    #[error("Image buffer has {len} floats, expected {count} images of {image_size}")]
    ImageBuffer {
        len: usize,
        count: usize,
        image_size: usize,
    },

    /// Reading values back out of a tensor failed.
    #[error("Tensor data conversion failed: {0}")]
    TensorData(String),

    /// A metric name that is not supported.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
}
