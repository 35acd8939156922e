//! Fully convolutional classifier for time series.
//!
//! Three convolutional blocks followed by global average pooling and a
//! linear classifier, the layout CAM was defined for.

use burn::nn::{
    conv::{Conv1d, Conv1dConfig},
    pool::{AdaptiveAvgPool1d, AdaptiveAvgPool1dConfig},
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, Relu,
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use camrs_core::ModelMode;

/// Configuration for [`ConvNet1d`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvNet1dConfig {
    /// Number of input variables/channels.
    pub n_vars: usize,
    /// Sequence length.
    pub seq_len: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Filters per convolutional block.
    pub filters: [usize; 3],
    /// Kernel size per convolutional block (odd).
    pub kernel_sizes: [usize; 3],
    /// Dropout probability before the classifier.
    pub dropout: f64,
}

impl Default for ConvNet1dConfig {
    fn default() -> Self {
        Self {
            n_vars: 1,
            seq_len: 100,
            n_classes: 2,
            filters: [128, 256, 128],
            kernel_sizes: [7, 5, 3],
            dropout: 0.0,
        }
    }
}

impl ConvNet1dConfig {
    /// Create a new config with specified dimensions.
    pub fn new(n_vars: usize, seq_len: usize, n_classes: usize) -> Self {
        Self {
            n_vars,
            seq_len,
            n_classes,
            ..Default::default()
        }
    }

    /// Set the number of filters for all blocks.
    #[must_use]
    pub fn with_filters(mut self, f1: usize, f2: usize, f3: usize) -> Self {
        self.filters = [f1, f2, f3];
        self
    }

    /// Set the kernel sizes for all blocks.
    #[must_use]
    pub fn with_kernel_sizes(mut self, k1: usize, k2: usize, k3: usize) -> Self {
        self.kernel_sizes = [k1, k2, k3];
        self
    }

    /// Set the dropout probability.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvNet1d<B> {
        ConvNet1d::new(self.clone(), device)
    }
}

/// A single convolutional block: Conv1d -> BatchNorm -> ReLU
#[derive(Module, Debug)]
pub struct ConvBlock1d<B: Backend> {
    conv: Conv1d<B>,
    bn: BatchNorm<B, 1>,
}

impl<B: Backend> ConvBlock1d<B> {
    /// Create a new convolutional block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv1dConfig::new(in_channels, out_channels, kernel_size)
            .with_padding(burn::nn::PaddingConfig1d::Same)
            .with_bias(false)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }

    /// Forward pass through the block.
    pub fn forward(&self, x: Tensor<B, 3>, mode: ModelMode) -> Tensor<B, 3> {
        let out = self.conv.forward(x);
        let out = super::batch_norm(&self.bn, out, mode);
        Relu::new().forward(out)
    }
}

/// Fully convolutional time series classifier.
///
/// Architecture:
/// - `block1`: Conv1d(n_vars, f1) -> BatchNorm -> ReLU
/// - `block2`: Conv1d(f1, f2) -> BatchNorm -> ReLU
/// - `block3`: Conv1d(f2, f3) -> BatchNorm -> ReLU
/// - `gap`: Global Average Pooling
/// - Dropout (train mode only)
/// - `fc`: Linear(f3, n_classes)
///
/// # Example
///
/// ```rust,ignore
/// use camrs_core::CamModel;
/// use camrs_models::ConvNet1dConfig;
///
/// let model = ConvNet1dConfig::new(3, 100, 5).init::<NdArray>(&device);
/// let logits = model.forward(x); // [batch, 5]
/// ```
#[derive(Debug, Clone)]
pub struct ConvNet1d<B: Backend> {
    pub(crate) block1: ConvBlock1d<B>,
    pub(crate) block2: ConvBlock1d<B>,
    pub(crate) block3: ConvBlock1d<B>,
    pub(crate) gap: AdaptiveAvgPool1d,
    pub(crate) dropout: Dropout,
    pub(crate) fc: Linear<B>,
    pub(crate) mode: ModelMode,
    config: ConvNet1dConfig,
}

impl<B: Backend> ConvNet1d<B> {
    /// Create a new model.
    pub fn new(config: ConvNet1dConfig, device: &B::Device) -> Self {
        let [f1, f2, f3] = config.filters;
        let [k1, k2, k3] = config.kernel_sizes;

        Self {
            block1: ConvBlock1d::new(config.n_vars, f1, k1, device),
            block2: ConvBlock1d::new(f1, f2, k2, device),
            block3: ConvBlock1d::new(f2, f3, k3, device),
            gap: AdaptiveAvgPool1dConfig::new(1).init(),
            dropout: DropoutConfig::new(config.dropout).init(),
            fc: LinearConfig::new(f3, config.n_classes).init(device),
            mode: ModelMode::default(),
            config,
        }
    }

    /// Get the model configuration.
    pub fn config(&self) -> &ConvNet1dConfig {
        &self.config
    }

    /// Input shape excluding the batch dimension.
    pub fn input_shape(&self) -> Vec<usize> {
        vec![self.config.n_vars, self.config.seq_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ConvNet1dConfig::default();
        assert_eq!(config.n_vars, 1);
        assert_eq!(config.filters, [128, 256, 128]);
        assert_eq!(config.kernel_sizes, [7, 5, 3]);
    }

    #[test]
    fn test_config_builder() {
        let config = ConvNet1dConfig::new(3, 64, 4)
            .with_filters(8, 16, 8)
            .with_kernel_sizes(5, 3, 3)
            .with_dropout(0.2);

        assert_eq!(config.n_vars, 3);
        assert_eq!(config.seq_len, 64);
        assert_eq!(config.n_classes, 4);
        assert_eq!(config.filters, [8, 16, 8]);
        assert_eq!(config.kernel_sizes, [5, 3, 3]);
        assert!((config.dropout - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_config_serde() {
        let config = ConvNet1dConfig::new(2, 32, 3);
        let json = serde_json::to_string(&config).unwrap();
        let restored: ConvNet1dConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.n_classes, 3);
        assert_eq!(restored.filters, config.filters);
    }
}
