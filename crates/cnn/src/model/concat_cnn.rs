use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};

use cifar::NUM_CLASSES;

use crate::error::CnnError;
use crate::model::branch::{ConvBranch, ConvBranchConfig};
use crate::model::summary::{
    conv2d_output, conv2d_params, dense_params, pool_output, LayerSummary, ModelSummary,
};

/// Configuration for the two-branch concatenated CNN.
///
/// ```text
/// input1 (batch, 3, 32, 32) → ConvBranch 1 → (batch, 32, 32, 32) ┐
///                                                                 ├→ concat(axis=1) → (batch, 64, 32, 32)
/// input2 (batch, 3, 32, 32) → ConvBranch 2 → (batch, 32, 32, 32) ┘
///   → MaxPool2d(2x2, stride 2)                       → (batch, 64, 16, 16)
///   → Conv2d(64→64, 3x3, pad 1) → ReLU   conv2d_0_4  → (batch, 64, 16, 16)
///   → Conv2d(64→64, 3x3, pad 1) → ReLU               → (batch, 64, 16, 16)
///   → MaxPool2d(2x2, stride 2)                       → (batch, 64, 8, 8)
///   → flatten                                        → (batch, 4096)
///   → Dense(4096→512) → ReLU
///   → Dense(512→10) → softmax                        → (batch, 10)
/// ```
#[derive(Config, Debug)]
pub struct ConcatCnnConfig {
    /// Number of output classes.
    #[config(default = 10)]
    pub num_classes: usize,
    /// Input channels of each branch.
    #[config(default = 3)]
    pub in_channels: usize,
    /// Square input image size.
    #[config(default = 32)]
    pub image_size: usize,
    /// Filters in each branch convolution.
    #[config(default = 32)]
    pub branch_filters: usize,
    /// Filters in the trunk convolutions after concatenation.
    #[config(default = 64)]
    pub trunk_filters: usize,
    /// Square kernel size of every convolution.
    #[config(default = 3)]
    pub kernel_size: usize,
    /// Units of the hidden dense layer.
    #[config(default = 512)]
    pub dense_units: usize,
}

/// Two-input network: parallel conv branches, channel concat, conv/pool/dense trunk.
#[derive(Module, Debug)]
pub struct ConcatCnn<B: Backend> {
    branch1: ConvBranch<B>,
    branch2: ConvBranch<B>,
    pool1: MaxPool2d,
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    dense1: Linear<B>,
    dense2: Linear<B>,
}

const POOL: usize = 2;
const PADDING: usize = 1;

impl ConcatCnnConfig {
    /// Branch configuration for input `postfix` (1 or 2).
    pub fn branch_config(&self, postfix: usize) -> ConvBranchConfig {
        ConvBranchConfig::new()
            .with_in_channels(self.in_channels)
            .with_filters(self.branch_filters)
            .with_kernel_size(self.kernel_size)
            .with_padding(PADDING)
            .with_name_postfix(postfix)
    }

    /// Channels after concatenating both branches.
    pub fn concat_channels(&self) -> usize {
        2 * self.branch_filters
    }

    /// Spatial size after each stage: `[branch, pool1, trunk, pool2]`.
    fn spatial_sizes(&self) -> [usize; 4] {
        let branch = self.branch_config(1).output_shape([self.image_size, self.image_size])[1];
        let pool1 = pool_output(branch, POOL, POOL);
        let conv = |d| conv2d_output(d, self.kernel_size, 1, PADDING);
        let trunk = conv(conv(pool1));
        let pool2 = pool_output(trunk, POOL, POOL);
        [branch, pool1, trunk, pool2]
    }

    /// Number of features entering the first dense layer.
    pub fn flatten_features(&self) -> usize {
        let [_, _, _, side] = self.spatial_sizes();
        self.trunk_filters * side * side
    }

    /// Reject hyperparameters that burn cannot build or that cannot label CIFAR-10.
    ///
    /// Every convolution and pooling window must fit inside its (padded) input,
    /// and the output layer needs a unit per dataset class.
    pub fn check(&self) -> Result<(), CnnError> {
        let invalid = |msg: String| Err(CnnError::InvalidModelConfig(msg));

        if self.num_classes < NUM_CLASSES {
            return invalid(format!(
                "num_classes = {} is below the {NUM_CLASSES} CIFAR-10 classes",
                self.num_classes
            ));
        }
        for (field, value) in [
            ("in_channels", self.in_channels),
            ("image_size", self.image_size),
            ("branch_filters", self.branch_filters),
            ("trunk_filters", self.trunk_filters),
            ("kernel_size", self.kernel_size),
            ("dense_units", self.dense_units),
        ] {
            if value == 0 {
                return invalid(format!("{field} must be at least 1"));
            }
        }

        let k = self.kernel_size;
        let stride = self.branch_config(1).stride;
        let [name0, name1] = self.branch_config(1).layer_names();
        let stages = [
            (name0.as_str(), k, stride, PADDING),
            (name1.as_str(), k, stride, PADDING),
            ("max_pooling2d_1", POOL, POOL, 0),
            ("conv2d_0_4", k, 1, PADDING),
            ("conv2d", k, 1, PADDING),
            ("max_pooling2d_2", POOL, POOL, 0),
        ];
        let mut side = self.image_size;
        for (layer, window, stride, padding) in stages {
            if side + 2 * padding < window {
                return invalid(format!(
                    "{layer}: window {window} does not fit a {side}x{side} input (padding {padding})"
                ));
            }
            side = conv2d_output(side, window, stride, padding);
        }
        Ok(())
    }

    /// Initialize a ConcatCnn with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConcatCnn<B> {
        let conv = |in_channels: usize| {
            Conv2dConfig::new(
                [in_channels, self.trunk_filters],
                [self.kernel_size, self.kernel_size],
            )
            .with_padding(PaddingConfig2d::Explicit(PADDING, PADDING))
            .init(device)
        };
        let pool = || {
            MaxPool2dConfig::new([POOL, POOL])
                .with_strides([POOL, POOL])
                .init()
        };

        ConcatCnn {
            branch1: self.branch_config(1).init(device),
            branch2: self.branch_config(2).init(device),
            pool1: pool(),
            conv1: conv(self.concat_channels()),
            conv2: conv(self.trunk_filters),
            pool2: pool(),
            dense1: LinearConfig::new(self.flatten_features(), self.dense_units).init(device),
            dense2: LinearConfig::new(self.dense_units, self.num_classes).init(device),
        }
    }

    /// Keras-style layer table for the full model.
    pub fn summary(&self) -> ModelSummary {
        let hw = [self.image_size, self.image_size];
        let [branch, pool1, trunk, pool2] = self.spatial_sizes();
        let concat = self.concat_channels();
        let f = self.trunk_filters;

        let mut summary = ModelSummary::new("concat_cnn");
        let input_shape = vec![self.in_channels, self.image_size, self.image_size];
        summary.push(LayerSummary::new("input1", "InputLayer", input_shape.clone()));
        summary.push(LayerSummary::new("input2", "InputLayer", input_shape));
        let out1 = self.branch_config(1).append_summary(&mut summary, "input1", hw);
        let out2 = self.branch_config(2).append_summary(&mut summary, "input2", hw);

        summary.push(
            LayerSummary::new("concatenate", "Concatenate", vec![concat, branch, branch])
                .with_inputs(&[out1.as_str(), out2.as_str()]),
        );
        summary.push(
            LayerSummary::new("max_pooling2d_1", "MaxPooling2D", vec![concat, pool1, pool1])
                .with_inputs(&["concatenate"]),
        );
        summary.push(
            LayerSummary::new("conv2d_0_4", "Conv2D", vec![f, trunk, trunk])
                .with_params(conv2d_params(concat, f, self.kernel_size))
                .with_inputs(&["max_pooling2d_1"]),
        );
        summary.push(
            LayerSummary::new("conv2d_5", "Conv2D", vec![f, trunk, trunk])
                .with_params(conv2d_params(f, f, self.kernel_size))
                .with_inputs(&["conv2d_0_4"]),
        );
        summary.push(
            LayerSummary::new("max_pooling2d_2", "MaxPooling2D", vec![f, pool2, pool2])
                .with_inputs(&["conv2d_5"]),
        );
        summary.push(
            LayerSummary::new("flatten", "Flatten", vec![self.flatten_features()])
                .with_inputs(&["max_pooling2d_2"]),
        );
        summary.push(
            LayerSummary::new("dense_1", "Dense", vec![self.dense_units])
                .with_params(dense_params(self.flatten_features(), self.dense_units))
                .with_inputs(&["flatten"]),
        );
        summary.push(
            LayerSummary::new("dense_2", "Dense", vec![self.num_classes])
                .with_params(dense_params(self.dense_units, self.num_classes))
                .with_inputs(&["dense_1"]),
        );
        summary.push(
            LayerSummary::new("activation", "Activation", vec![self.num_classes])
                .with_inputs(&["dense_2"]),
        );
        summary
    }
}

impl<B: Backend> ConcatCnn<B> {
    /// Reject input pairs whose shapes differ.
    pub fn check_inputs(x1: &Tensor<B, 4>, x2: &Tensor<B, 4>) -> Result<(), CnnError> {
        let (left, right) = (x1.dims(), x2.dims());
        if left != right {
            return Err(CnnError::InputMismatch { left, right });
        }
        Ok(())
    }

    /// Concatenated branch features.
    ///
    /// Output shape: `(batch, 2 * branch_filters, height, width)`
    pub fn features(&self, x1: Tensor<B, 4>, x2: Tensor<B, 4>) -> Tensor<B, 4> {
        let a = self.branch1.forward(x1);
        let b = self.branch2.forward(x2);
        Tensor::cat(vec![a, b], 1)
    }

    /// Forward pass up to the final dense layer (pre-softmax logits).
    ///
    /// Both inputs: `(batch, in_channels, image_size, image_size)`
    /// Output shape: `(batch, num_classes)`
    pub fn forward_logits(&self, x1: Tensor<B, 4>, x2: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.features(x1, x2);
        let x = self.pool1.forward(x);

        let x = relu(self.conv1.forward(x));
        let x = relu(self.conv2.forward(x));
        let x = self.pool2.forward(x);

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = relu(self.dense1.forward(x));
        self.dense2.forward(x)
    }

    /// Forward pass returning softmax class probabilities.
    ///
    /// Output shape: `(batch, num_classes)`, each row sums to 1.
    pub fn forward(&self, x1: Tensor<B, 4>, x2: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward_logits(x1, x2), 1)
    }

    /// Checked forward pass: fails if the two inputs differ in shape.
    pub fn try_forward(&self, x1: Tensor<B, 4>, x2: Tensor<B, 4>) -> Result<Tensor<B, 2>, CnnError> {
        Self::check_inputs(&x1, &x2)?;
        Ok(self.forward(x1, x2))
    }
}
