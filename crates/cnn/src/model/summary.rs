//! Keras-style model summaries computed from layer configurations.
//!
//! Output shapes are inferred with the standard convolution and pooling
//! formulas, so a summary can be printed without allocating any weights.

use std::fmt;

use serde::Serialize;

/// Spatial output size of a convolution.
///
/// `(input + 2 * padding - kernel) / stride + 1`
pub fn conv2d_output(input: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (input + 2 * padding).saturating_sub(kernel) / stride.max(1) + 1
}

/// Spatial output size of a valid (unpadded) pooling window.
///
/// `(input - pool) / stride + 1`
pub fn pool_output(input: usize, pool: usize, stride: usize) -> usize {
    input.saturating_sub(pool) / stride.max(1) + 1
}

/// Trainable parameters of a 2D convolution with bias.
pub fn conv2d_params(in_channels: usize, out_channels: usize, kernel: usize) -> usize {
    out_channels * in_channels * kernel * kernel + out_channels
}

/// Trainable parameters of a dense layer with bias.
pub fn dense_params(inputs: usize, units: usize) -> usize {
    inputs * units + units
}

/// One row of a model summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerSummary {
    /// Layer name, e.g. `conv2d_0_1`.
    pub name: String,
    /// Layer type, e.g. `Conv2D`.
    pub kind: String,
    /// Output shape without the batch dimension.
    pub output_shape: Vec<usize>,
    /// Number of trainable parameters.
    pub params: usize,
    /// Names of the layers feeding this one.
    pub inputs: Vec<String>,
}

impl LayerSummary {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, output_shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            output_shape,
            params: 0,
            inputs: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: usize) -> Self {
        self.params = params;
        self
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    fn shape_string(&self) -> String {
        let dims: Vec<String> = self.output_shape.iter().map(|d| d.to_string()).collect();
        format!("(None, {})", dims.join(", "))
    }
}

/// Layer table for a model, in topological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub layers: Vec<LayerSummary>,
}

impl ModelSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    pub fn push(&mut self, layer: LayerSummary) {
        self.layers.push(layer);
    }

    /// Sum of trainable parameters over all layers.
    pub fn total_params(&self) -> usize {
        self.layers.iter().map(|l| l.params).sum()
    }

    /// Output shape of the last layer.
    pub fn output_shape(&self) -> Option<&[usize]> {
        self.layers.last().map(|l| l.output_shape.as_slice())
    }

    /// Find a layer by name.
    pub fn layer(&self, name: &str) -> Option<&LayerSummary> {
        self.layers.iter().find(|l| l.name == name)
    }
}

/// Format an integer with thousands separators.
fn group_digits(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "_".repeat(96);
        let double = "=".repeat(96);
        writeln!(f, "Model: \"{}\"", self.name)?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "{:<32}{:<24}{:>12}  {}",
            "Layer (type)", "Output Shape", "Param #", "Connected to"
        )?;
        writeln!(f, "{double}")?;
        for layer in &self.layers {
            writeln!(
                f,
                "{:<32}{:<24}{:>12}  {}",
                format!("{} ({})", layer.name, layer.kind),
                layer.shape_string(),
                group_digits(layer.params),
                layer.inputs.join(", ")
            )?;
        }
        writeln!(f, "{double}")?;
        writeln!(f, "Total params: {}", group_digits(self.total_params()))?;
        writeln!(f, "Trainable params: {}", group_digits(self.total_params()))?;
        write!(f, "Non-trainable params: 0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv2d_output_same_padding() {
        assert_eq!(conv2d_output(32, 3, 1, 1), 32);
        assert_eq!(conv2d_output(16, 3, 1, 1), 16);
    }

    #[test]
    fn test_conv2d_output_valid_and_strided() {
        assert_eq!(conv2d_output(32, 3, 1, 0), 30);
        assert_eq!(conv2d_output(32, 3, 2, 1), 16);
        assert_eq!(conv2d_output(224, 11, 4, 2), 55);
    }

    #[test]
    fn test_pool_output() {
        assert_eq!(pool_output(32, 2, 2), 16);
        assert_eq!(pool_output(16, 2, 2), 8);
        assert_eq!(pool_output(15, 2, 2), 7);
        assert_eq!(pool_output(55, 3, 2), 27);
    }

    #[test]
    fn test_param_formulas() {
        assert_eq!(conv2d_params(3, 32, 3), 896);
        assert_eq!(conv2d_params(32, 32, 3), 9_248);
        assert_eq!(conv2d_params(64, 64, 3), 36_928);
        assert_eq!(dense_params(4096, 512), 2_097_664);
        assert_eq!(dense_params(512, 10), 5_130);
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(2_196_938), "2,196,938");
    }

    #[test]
    fn test_display_contains_rows_and_total() {
        let mut summary = ModelSummary::new("tiny");
        summary.push(LayerSummary::new("input1", "InputLayer", vec![3, 32, 32]));
        summary.push(
            LayerSummary::new("conv2d_0_1", "Conv2D", vec![32, 32, 32])
                .with_params(896)
                .with_inputs(&["input1"]),
        );

        let text = summary.to_string();
        assert!(text.contains("Model: \"tiny\""));
        assert!(text.contains("conv2d_0_1 (Conv2D)"));
        assert!(text.contains("(None, 32, 32, 32)"));
        assert!(text.contains("Total params: 896"));
        assert_eq!(summary.output_shape(), Some(&[32usize, 32, 32][..]));
        assert_eq!(summary.layer("input1").map(|l| l.params), Some(0));
    }
}
