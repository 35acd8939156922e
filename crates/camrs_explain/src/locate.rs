//! Automatic layer resolution.

use burn::prelude::*;

use camrs_core::{CamModel, ForwardHooks, LayerKind};

/// Records the shape of every reported layer output.
#[derive(Debug, Default)]
struct ShapeRecorder {
    shapes: Vec<(String, Vec<usize>)>,
}

impl<B: Backend, const D: usize> ForwardHooks<B, D> for ShapeRecorder {
    fn forward(&mut self, layer: &str, output: &Tensor<B, D>) {
        self.shapes.push((layer.to_string(), output.dims().to_vec()));
    }
}

/// Find the deepest layer whose output still has spatial extent.
///
/// Runs the model once on zeros shaped `(1, input_shape...)` and returns the
/// last reported layer with a spatial dimension other than 1. Outputs of
/// global pooling layers are therefore skipped.
pub fn locate_candidate_layer<B, M, const D: usize>(model: &M, input_shape: &[usize]) -> Option<String>
where
    B: Backend,
    M: CamModel<B, D>,
{
    if input_shape.len() + 1 != D {
        return None;
    }

    let mut dims = [1usize; D];
    dims[1..].copy_from_slice(input_shape);

    let mut recorder = ShapeRecorder::default();
    let device = model.device();
    let _ = model.forward_hooked(Tensor::zeros(dims, &device), &mut recorder);

    recorder
        .shapes
        .into_iter()
        .rev()
        .find(|(_, shape)| shape[2..].iter().any(|&s| s != 1))
        .map(|(name, _)| name)
}

/// Find the first fully connected layer of a model.
pub fn locate_linear_layer<B, M, const D: usize>(model: &M) -> Option<String>
where
    B: Backend,
    M: CamModel<B, D>,
{
    model
        .layers()
        .into_iter()
        .find(|layer| layer.kind == LayerKind::Linear)
        .map(|layer| layer.name)
}
