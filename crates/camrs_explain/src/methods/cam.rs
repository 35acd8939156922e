//! Class weights read from the final linear layer.

use burn::prelude::*;

use camrs_core::{CamError, CamModel, ClassIndex, LayerKind, Result};

use crate::attribution::AttributionMethod;
use crate::extractor::{CamCore, CamMethod};
use crate::locate::locate_linear_layer;

/// Class activation mapping for networks ending in global pooling and a
/// linear classifier.
///
/// The weight of channel `k` for class `c` is `fc.weight[c, k]`. Maps are
/// not rectified.
#[derive(Debug)]
pub struct Cam<B: Backend, M: CamModel<B, D>, const D: usize> {
    core: CamCore<B, M, D>,
    fc_layer: String,
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> Cam<B, M, D> {
    /// Create a CAM extractor.
    ///
    /// `fc_layer` names the classifier; `None` picks the first linear layer.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::InvalidConfig`] for more than one target layer,
    /// [`CamError::UnknownLayer`] or [`CamError::InvalidLayerType`] for a bad
    /// `fc_layer`, and [`CamError::LayerResolution`] if no linear layer can
    /// be found.
    pub fn new(
        model: M,
        target_layers: &[&str],
        fc_layer: Option<&str>,
        input_shape: &[usize],
    ) -> Result<Self> {
        if target_layers.len() > 1 {
            return Err(CamError::InvalidConfig(format!(
                "CAM supports a single target layer, got {}",
                target_layers.len()
            )));
        }

        let fc_layer = match fc_layer {
            Some(name) => {
                let info = model
                    .layer(name)
                    .ok_or_else(|| CamError::UnknownLayer(name.to_string()))?;
                if info.kind != LayerKind::Linear {
                    return Err(CamError::InvalidLayerType {
                        layer: name.to_string(),
                        expected: LayerKind::Linear.to_string(),
                        got: info.kind.to_string(),
                    });
                }
                info.name
            }
            None => {
                let name = locate_linear_layer(&model).ok_or_else(|| {
                    CamError::LayerResolution(
                        "unable to resolve the fully connected layer automatically".to_string(),
                    )
                })?;
                tracing::warn!("no value was provided for `fc_layer`, using '{}'", name);
                name
            }
        };

        let core = CamCore::new(model, target_layers, input_shape, false)?;

        Ok(Self { core, fc_layer })
    }

    /// Name of the classifier layer.
    pub fn fc_layer(&self) -> &str {
        &self.fc_layer
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> CamMethod<B, M, D> for Cam<B, M, D> {
    fn core(&self) -> &CamCore<B, M, D> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CamCore<B, M, D> {
        &mut self.core
    }

    fn method(&self) -> AttributionMethod {
        AttributionMethod::Cam
    }

    fn class_weights(&mut self, layer: &str, class_idx: &ClassIndex) -> Result<Tensor<B, 2>> {
        let batch = self.core.activation(layer)?.dims()[0];
        let weight = self
            .core
            .model()
            .linear_weight(&self.fc_layer)
            .ok_or_else(|| CamError::UnknownLayer(self.fc_layer.clone()))?;

        let [n_classes, in_features] = weight.dims();
        let rows = class_idx
            .resolve(batch, n_classes)?
            .into_iter()
            .map(|class| weight.clone().slice([class..class + 1, 0..in_features]))
            .collect::<Vec<_>>();

        Ok(Tensor::cat(rows, 0))
    }

    fn apply_relu(&self) -> bool {
        false
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> std::fmt::Display for Cam<B, M, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CAM(fc_layer='{}')", self.fc_layer)
    }
}
