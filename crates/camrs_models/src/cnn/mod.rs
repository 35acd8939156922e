//! Convolutional classifiers.

use burn::nn::BatchNorm;
use burn::prelude::*;

use camrs_core::ModelMode;

mod convnet1d;
mod convnet2d;

pub use convnet1d::{ConvBlock1d, ConvNet1d, ConvNet1dConfig};
pub use convnet2d::{ConvBlock2d, ConvNet2d, ConvNet2dConfig};

/// Names of the hooked layers, in forward order.
pub const FEATURE_LAYERS: [&str; 3] = ["block1", "block2", "block3"];

/// Name of the global pooling layer.
pub const POOL_LAYER: &str = "gap";

/// Name of the linear classifier.
pub const CLASSIFIER_LAYER: &str = "fc";

/// Batch normalization that honours the model mode.
///
/// `BatchNorm::forward` normalizes with batch statistics whenever the
/// backend tracks gradients, whatever the caller intends. In
/// [`ModelMode::Eval`] the running statistics are applied directly, so a
/// sample's output never depends on the rest of its batch and the running
/// statistics are left untouched.
pub(crate) fn batch_norm<B: Backend, const D: usize, const DI: usize>(
    bn: &BatchNorm<B, D>,
    x: Tensor<B, DI>,
    mode: ModelMode,
) -> Tensor<B, DI> {
    if mode.is_train() {
        return bn.forward(x);
    }

    let device = x.device();
    let mut shape = [1; DI];
    shape[1] = x.dims()[1];

    let mean = bn.running_mean.value().to_device(&device).reshape(shape);
    let std = bn
        .running_var
        .value()
        .to_device(&device)
        .add_scalar(bn.epsilon)
        .sqrt()
        .reshape(shape);

    x.sub(mean)
        .div(std)
        .mul(bn.gamma.val().reshape(shape))
        .add(bn.beta.val().reshape(shape))
}
