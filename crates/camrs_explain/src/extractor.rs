//! Extractor core shared by every method, and map synthesis.

use burn::prelude::*;
use burn::tensor::activation::relu;

use camrs_core::{CamError, CamModel, ClassIndex, LayerKind, ModelMode, Result};

use crate::activation::{HookHandle, HookRegistry};
use crate::attribution::{fuse_maps, normalize_spatial, AttributionMap, AttributionMethod};
use crate::locate::locate_candidate_layer;

/// A model together with the hooks capturing its target layers.
///
/// `D` is the rank of the model input, including the batch dimension.
#[derive(Debug)]
pub struct CamCore<B: Backend, M: CamModel<B, D>, const D: usize> {
    model: M,
    hooks: HookRegistry<B, D>,
    target_layers: Vec<String>,
    handles: Vec<HookHandle>,
    store_input: bool,
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> CamCore<B, M, D> {
    /// Wrap a model and hook its target layers.
    ///
    /// An empty `target_layers` picks the deepest layer with spatial output,
    /// found by a dry run on an input of shape `(1, input_shape...)`.
    /// With `store_input`, the model input is captured as well.
    ///
    /// # Errors
    ///
    /// Returns an error if `input_shape` does not match the model rank, a
    /// target layer is unknown or fully connected, or no layer can be
    /// located automatically.
    pub fn new(
        model: M,
        target_layers: &[&str],
        input_shape: &[usize],
        store_input: bool,
    ) -> Result<Self> {
        if input_shape.len() + 1 != D {
            return Err(CamError::DimensionError {
                expected: D - 1,
                got: input_shape.len(),
            });
        }

        let target_layers = if target_layers.is_empty() {
            let layer = locate_candidate_layer(&model, input_shape).ok_or_else(|| {
                CamError::LayerResolution(
                    "unable to locate a layer with spatial output automatically".to_string(),
                )
            })?;
            tracing::warn!("no target layer specified, using '{}'", layer);
            vec![layer]
        } else {
            let mut resolved = Vec::with_capacity(target_layers.len());
            for &name in target_layers {
                let info = model
                    .layer(name)
                    .ok_or_else(|| CamError::UnknownLayer(name.to_string()))?;
                if info.kind == LayerKind::Linear {
                    return Err(CamError::InvalidLayerType {
                        layer: name.to_string(),
                        expected: "a layer with spatial output".to_string(),
                        got: info.kind.to_string(),
                    });
                }
                resolved.push(info.name);
            }
            resolved
        };

        let mut core = Self {
            model,
            hooks: HookRegistry::new(),
            target_layers,
            handles: Vec::new(),
            store_input,
        };
        core.reset_hooks();

        Ok(core)
    }

    /// Run the model, capturing the target activations.
    pub fn forward(&mut self, x: Tensor<B, D>) -> Tensor<B, 2> {
        let logits = self.model.forward_hooked(x, &mut self.hooks);
        tracing::trace!(layers = ?self.hooks.captured_layers(), "Captured activations");
        logits
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The wrapped model, mutably.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Give the model back.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Names of the hooked layers.
    pub fn target_layers(&self) -> &[String] {
        &self.target_layers
    }

    /// Whether forward passes update the captured activations.
    pub fn hooks_enabled(&self) -> bool {
        self.hooks.is_enabled()
    }

    /// Enable or disable capture, returning the previous state.
    pub fn set_hooks_enabled(&mut self, enabled: bool) -> bool {
        self.hooks.set_enabled(enabled)
    }

    /// Number of hooks currently registered.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Remove every hook and drop captured state.
    pub fn remove_hooks(&mut self) {
        for handle in self.handles.drain(..) {
            self.hooks.remove(handle);
        }
        self.hooks.clear();
    }

    /// Drop captured state and register the hooks again.
    pub fn reset_hooks(&mut self) {
        self.remove_hooks();
        for layer in &self.target_layers {
            self.handles.push(self.hooks.register_forward_hook(layer));
        }
        if self.store_input {
            self.handles.push(self.hooks.register_input_hook());
        }
    }

    /// The last captured activation of `layer`.
    pub fn activation(&self, layer: &str) -> Result<Tensor<B, D>> {
        self.hooks
            .activation(layer)
            .cloned()
            .ok_or_else(|| CamError::MissingActivation(layer.to_string()))
    }

    /// The last captured model input.
    pub fn stored_input(&self) -> Result<Tensor<B, D>> {
        self.hooks.input().cloned().ok_or(CamError::MissingInput)
    }

    /// Enter a scope for scoring forward passes.
    pub fn scoring_scope(&mut self) -> ScoringScope<'_, B, M, D> {
        ScoringScope::new(self)
    }
}

/// Guard for the forward passes that score masked inputs.
///
/// While alive, hook updates are disabled and the model runs in
/// [`ModelMode::Eval`]. Both prior states come back when the guard is
/// dropped, whether scoring finished, returned an error, or panicked.
pub struct ScoringScope<'a, B: Backend, M: CamModel<B, D>, const D: usize> {
    core: &'a mut CamCore<B, M, D>,
    hooks_were_enabled: bool,
    prior_mode: ModelMode,
}

impl<'a, B: Backend, M: CamModel<B, D>, const D: usize> ScoringScope<'a, B, M, D> {
    fn new(core: &'a mut CamCore<B, M, D>) -> Self {
        let hooks_were_enabled = core.hooks.set_enabled(false);
        let prior_mode = core.model.mode();
        core.model.set_mode(ModelMode::Eval);

        Self {
            core,
            hooks_were_enabled,
            prior_mode,
        }
    }

    /// Run the model without touching the captured activations.
    pub fn forward(&mut self, x: Tensor<B, D>) -> Tensor<B, 2> {
        self.core.model.forward_hooked(x, &mut self.core.hooks)
    }

    /// Device of the model parameters.
    pub fn device(&self) -> B::Device {
        self.core.model.device()
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> Drop for ScoringScope<'_, B, M, D> {
    fn drop(&mut self) {
        self.core.hooks.set_enabled(self.hooks_were_enabled);
        self.core.model.set_mode(self.prior_mode);
    }
}

/// A class activation map extractor.
///
/// Implementors supply the per-channel class weights; map synthesis is
/// shared.
///
/// # Example
///
/// ```rust,ignore
/// use camrs_explain::{CamMethod, ScoreCam, ScoreCamConfig};
///
/// let mut extractor = ScoreCam::new(model, &["block3"], ScoreCamConfig::default())?;
/// let _logits = extractor.forward(input);
/// let map = extractor.explain(&3.into())?;
/// ```
pub trait CamMethod<B: Backend, M: CamModel<B, D>, const D: usize> {
    /// The shared extractor core.
    fn core(&self) -> &CamCore<B, M, D>;

    /// The shared extractor core, mutably.
    fn core_mut(&mut self) -> &mut CamCore<B, M, D>;

    /// Which method this is.
    fn method(&self) -> AttributionMethod;

    /// Weights of shape `(batch, channels)` for the activation of `layer`.
    fn class_weights(&mut self, layer: &str, class_idx: &ClassIndex) -> Result<Tensor<B, 2>>;

    /// Whether negative map values are clipped before normalization.
    fn apply_relu(&self) -> bool {
        true
    }

    /// Run the model, capturing what the method needs.
    fn forward(&mut self, x: Tensor<B, D>) -> Tensor<B, 2> {
        self.core_mut().forward(x)
    }

    /// One map of shape `(batch, 1, spatial...)` per target layer.
    ///
    /// # Errors
    ///
    /// Returns an error if no forward pass has been captured, the class
    /// index is invalid, or the weights do not match the activation.
    fn compute_cams(&mut self, class_idx: &ClassIndex, normalized: bool) -> Result<Vec<Tensor<B, D>>> {
        let layers = self.core().target_layers().to_vec();
        let mut cams = Vec::with_capacity(layers.len());

        for layer in &layers {
            let weights = self.class_weights(layer, class_idx)?;
            let activation = self.core().activation(layer)?;

            let [batch, channels] = weights.dims();
            let act_dims = activation.dims();
            if act_dims[0] != batch || act_dims[1] != channels {
                return Err(CamError::ShapeMismatch(format!(
                    "weights of shape {:?} do not match activation {:?} of '{}'",
                    [batch, channels],
                    act_dims,
                    layer
                )));
            }

            let mut weight_dims = [1usize; D];
            weight_dims[0] = batch;
            weight_dims[1] = channels;

            let cam = (activation * weights.reshape(weight_dims)).sum_dim(1);
            let cam = if self.apply_relu() { relu(cam) } else { cam };
            let cam = if normalized { normalize_spatial(cam) } else { cam };

            cams.push(cam);
        }

        Ok(cams)
    }

    /// Normalized map for `class_idx`, fused over all target layers.
    fn explain(&mut self, class_idx: &ClassIndex) -> Result<AttributionMap<B, D>> {
        let cams = self.compute_cams(class_idx, true)?;
        let fused = fuse_maps(cams)?;

        Ok(AttributionMap::new(fused, self.method()).with_target(class_idx.clone()))
    }
}
