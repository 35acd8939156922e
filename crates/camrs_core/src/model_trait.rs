//! The contract a classifier implements to be explained.
//!
//! Burn modules have no hook mechanism of their own, so a model reports its
//! input and named intermediate outputs to a [`ForwardHooks`] observer while
//! it runs. Extractors register interest in layers on their observer, never
//! on the model itself.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::mode::ModelMode;

/// Kind of a named layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Convolutional block producing spatial feature maps.
    Conv,
    /// Pooling layer.
    Pool,
    /// Fully connected layer.
    Linear,
    /// Anything else.
    Other,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerKind::Conv => write!(f, "conv"),
            LayerKind::Pool => write!(f, "pool"),
            LayerKind::Linear => write!(f, "linear"),
            LayerKind::Other => write!(f, "other"),
        }
    }
}

/// A named layer of a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerInfo {
    /// Layer name, unique within the model.
    pub name: String,
    /// Layer kind.
    pub kind: LayerKind,
}

impl LayerInfo {
    /// Create a new layer description.
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Observer of a forward pass.
///
/// `D` is the rank of the model input. Only intermediate outputs of the
/// same rank (spatial feature maps) are reported.
pub trait ForwardHooks<B: Backend, const D: usize> {
    /// Called once with the model input before any layer runs.
    fn pre_forward(&mut self, _input: &Tensor<B, D>) {}

    /// Called with the output of a named layer.
    fn forward(&mut self, _layer: &str, _output: &Tensor<B, D>) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<B: Backend, const D: usize> ForwardHooks<B, D> for NoHooks {}

/// Trait for classifiers whose activations can be explained.
///
/// # Example
///
/// ```rust,ignore
/// use camrs_core::{CamModel, NoHooks};
///
/// let logits = model.forward(input.clone());
/// let same = model.forward_hooked(input, &mut NoHooks);
/// ```
pub trait CamModel<B: Backend, const D: usize> {
    /// Forward pass reporting the input and named layer outputs to `hooks`.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, channels, spatial...)
    /// * `hooks` - Observer of the pass
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (batch, n_classes)
    fn forward_hooked(&self, x: Tensor<B, D>, hooks: &mut dyn ForwardHooks<B, D>) -> Tensor<B, 2>;

    /// Forward pass without observation.
    fn forward(&self, x: Tensor<B, D>) -> Tensor<B, 2> {
        self.forward_hooked(x, &mut NoHooks)
    }

    /// Named layers in forward order.
    fn layers(&self) -> Vec<LayerInfo>;

    /// Weight of a linear layer in `(out_features, in_features)` layout.
    ///
    /// Returns `None` if `name` is not a linear layer of this model.
    fn linear_weight(&self, name: &str) -> Option<Tensor<B, 2>>;

    /// Current execution mode.
    fn mode(&self) -> ModelMode;

    /// Switch execution mode.
    ///
    /// Implementations must honour [`ModelMode::Eval`] in every layer that
    /// behaves differently during training, not only in dropout.
    fn set_mode(&mut self, mode: ModelMode);

    /// Device holding the model parameters.
    fn device(&self) -> B::Device;

    /// Look up a layer by name.
    fn layer(&self, name: &str) -> Option<LayerInfo> {
        self.layers().into_iter().find(|layer| layer.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_info() {
        let layer = LayerInfo::new("fc", LayerKind::Linear);
        assert_eq!(layer.name, "fc");
        assert_eq!(layer.kind.to_string(), "linear");
    }
}
