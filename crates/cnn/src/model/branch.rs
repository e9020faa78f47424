use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::prelude::*;

use crate::model::summary::{conv2d_output, conv2d_params, LayerSummary, ModelSummary};

/// Configuration for one convolutional branch.
///
/// Two stacked 3x3 convolutions with ReLU. With the defaults the spatial size
/// is preserved:
///
/// ```text
/// (batch, 3, 32, 32)
///   → Conv2d(3→32, 3x3, stride 1, pad 1) → ReLU     conv2d_0_<postfix>
///   → Conv2d(32→32, 3x3, stride 1, pad 1) → ReLU    conv2d_1_<postfix>
///   → (batch, 32, 32, 32)
/// ```
#[derive(Config, Debug)]
pub struct ConvBranchConfig {
    /// Input channels (3 for RGB).
    #[config(default = 3)]
    pub in_channels: usize,
    /// Filters in both convolutions.
    #[config(default = 32)]
    pub filters: usize,
    /// Square kernel size.
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 1)]
    pub stride: usize,
    /// Zero padding on every side.
    #[config(default = 1)]
    pub padding: usize,
    /// Suffix used in layer names, so two branches stay distinguishable.
    #[config(default = 1)]
    pub name_postfix: usize,
}

/// Two-convolution feature extractor applied to one network input.
#[derive(Module, Debug)]
pub struct ConvBranch<B: Backend> {
    conv0: Conv2d<B>,
    conv1: Conv2d<B>,
}

impl ConvBranchConfig {
    /// Initialize a ConvBranch with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBranch<B> {
        ConvBranch {
            conv0: self.conv_config(self.in_channels).init(device),
            conv1: self.conv_config(self.filters).init(device),
        }
    }

    fn conv_config(&self, in_channels: usize) -> Conv2dConfig {
        Conv2dConfig::new(
            [in_channels, self.filters],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
    }

    /// Layer names, in forward order.
    pub fn layer_names(&self) -> [String; 2] {
        [
            format!("conv2d_0_{}", self.name_postfix),
            format!("conv2d_1_{}", self.name_postfix),
        ]
    }

    /// Output `[channels, height, width]` for an input of `[height, width]`.
    pub fn output_shape(&self, input_hw: [usize; 2]) -> [usize; 3] {
        let step = |d: usize| conv2d_output(d, self.kernel_size, self.stride, self.padding);
        let [h, w] = input_hw;
        [self.filters, step(step(h)), step(step(w))]
    }

    /// Append this branch's layers to `summary`, fed by `input`.
    ///
    /// Returns the name of the branch's last layer.
    pub fn append_summary(
        &self,
        summary: &mut ModelSummary,
        input: &str,
        input_hw: [usize; 2],
    ) -> String {
        let [name0, name1] = self.layer_names();
        let step = |d: usize| conv2d_output(d, self.kernel_size, self.stride, self.padding);
        let hw0 = [step(input_hw[0]), step(input_hw[1])];
        let hw1 = [step(hw0[0]), step(hw0[1])];

        summary.push(
            LayerSummary::new(&name0, "Conv2D", vec![self.filters, hw0[0], hw0[1]])
                .with_params(conv2d_params(self.in_channels, self.filters, self.kernel_size))
                .with_inputs(&[input]),
        );
        summary.push(
            LayerSummary::new(&name1, "Conv2D", vec![self.filters, hw1[0], hw1[1]])
                .with_params(conv2d_params(self.filters, self.filters, self.kernel_size))
                .with_inputs(&[name0.as_str()]),
        );
        name1
    }

    /// Summary of the branch as a standalone model on input `input_name`.
    pub fn summary(&self, input_name: &str, input_hw: [usize; 2]) -> ModelSummary {
        let mut summary = ModelSummary::new(format!("branch_{}", self.name_postfix));
        summary.push(LayerSummary::new(
            input_name,
            "InputLayer",
            vec![self.in_channels, input_hw[0], input_hw[1]],
        ));
        self.append_summary(&mut summary, input_name, input_hw);
        summary
    }
}

impl<B: Backend> ConvBranch<B> {
    /// Forward pass.
    ///
    /// Input shape: `(batch, in_channels, height, width)`
    /// Output shape: `(batch, filters, height', width')`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv0.forward(x);
        let x = burn::tensor::activation::relu(x);
        let x = self.conv1.forward(x);
        burn::tensor::activation::relu(x)
    }

    #[cfg(test)]
    pub(crate) fn conv0_weight_id(&self) -> burn::module::ParamId {
        self.conv0.weight.id
    }
}
