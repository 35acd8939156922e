//! Convolutional image classifier with a global-pooling head.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
    Relu,
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use camrs_core::ModelMode;

/// Configuration for [`ConvNet2d`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvNet2dConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Input height.
    pub height: usize,
    /// Input width.
    pub width: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Filters per convolutional block.
    pub filters: [usize; 3],
    /// Kernel size per convolutional block (odd).
    pub kernel_size: usize,
    /// Stride of the second and third blocks.
    pub stride: usize,
    /// Dropout probability before the classifier.
    pub dropout: f64,
}

impl Default for ConvNet2dConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            height: 224,
            width: 224,
            n_classes: 1000,
            filters: [32, 64, 128],
            kernel_size: 3,
            stride: 2,
            dropout: 0.0,
        }
    }
}

impl ConvNet2dConfig {
    /// Create a new config with specified dimensions.
    pub fn new(in_channels: usize, height: usize, width: usize, n_classes: usize) -> Self {
        Self {
            in_channels,
            height,
            width,
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

    /// Set the downsampling stride of blocks 2 and 3.
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Set the dropout probability.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvNet2d<B> {
        ConvNet2d::new(self.clone(), device)
    }
}

/// A single convolutional block: Conv2d -> BatchNorm -> ReLU
#[derive(Module, Debug)]
pub struct ConvBlock2d<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBlock2d<B> {
    /// Create a new convolutional block.
    ///
    /// A stride above 1 shrinks the feature map, which is what makes the
    /// later maps need upsampling before they can mask the input.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let padding = kernel_size / 2;
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }

    /// Forward pass through the block.
    pub fn forward(&self, x: Tensor<B, 4>, mode: ModelMode) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let out = super::batch_norm(&self.bn, out, mode);
        Relu::new().forward(out)
    }
}

/// Convolutional image classifier.
///
/// Architecture:
/// - `block1`: Conv2d(in, f1, stride 1) -> BatchNorm -> ReLU
/// - `block2`: Conv2d(f1, f2, stride s) -> BatchNorm -> ReLU
/// - `block3`: Conv2d(f2, f3, stride s) -> BatchNorm -> ReLU
/// - `gap`: Global Average Pooling
/// - Dropout (train mode only)
/// - `fc`: Linear(f3, n_classes)
#[derive(Debug, Clone)]
pub struct ConvNet2d<B: Backend> {
    pub(crate) block1: ConvBlock2d<B>,
    pub(crate) block2: ConvBlock2d<B>,
    pub(crate) block3: ConvBlock2d<B>,
    pub(crate) gap: AdaptiveAvgPool2d,
    pub(crate) dropout: Dropout,
    pub(crate) fc: Linear<B>,
    pub(crate) mode: ModelMode,
    config: ConvNet2dConfig,
}

impl<B: Backend> ConvNet2d<B> {
    /// Create a new model.
    pub fn new(config: ConvNet2dConfig, device: &B::Device) -> Self {
        let [f1, f2, f3] = config.filters;
        let k = config.kernel_size;
        let s = config.stride;

        Self {
            block1: ConvBlock2d::new(config.in_channels, f1, k, 1, device),
            block2: ConvBlock2d::new(f1, f2, k, s, device),
            block3: ConvBlock2d::new(f2, f3, k, s, device),
            gap: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(config.dropout).init(),
            fc: LinearConfig::new(f3, config.n_classes).init(device),
            mode: ModelMode::default(),
            config,
        }
    }

    /// Get the model configuration.
    pub fn config(&self) -> &ConvNet2dConfig {
        &self.config
    }

    /// Input shape excluding the batch dimension.
    pub fn input_shape(&self) -> Vec<usize> {
        vec![self.config.in_channels, self.config.height, self.config.width]
    }
}
