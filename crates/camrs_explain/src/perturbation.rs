//! Scoring of masked inputs for the Score-CAM family.
//!
//! Every (sample, channel) pair of a captured activation becomes a mask:
//! the channel is normalized to `[0, 1]`, resized to the input's spatial
//! size and multiplied into the stored input. The masked inputs are
//! forwarded in chunks of at most `batch_size`, and each pair is scored by
//! how much it moves the target logit away from the unmasked baseline.

use burn::prelude::*;
use burn::tensor::activation::softmax;

use camrs_core::{from_host, to_host, CamError, CamModel, ClassIndex, MapShape, Result};

use crate::attribution::normalize_spatial;
use crate::extractor::CamCore;
use crate::upsample;

/// How the masked inputs are scored.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScoringPlan {
    /// Maximum number of masked inputs per forward pass.
    pub batch_size: usize,
    /// Number of times every mask is scored.
    pub passes: usize,
}

/// Per-channel weights of shape `(batch, channels)` for `layer`.
///
/// `perturb(pass, mask)` may rewrite a normalized, upsampled mask before it
/// is applied. It sees the masks of a pass in (sample, channel) order,
/// independent of `batch_size`.
pub(crate) fn score_weights<B, M, const D: usize, F>(
    core: &mut CamCore<B, M, D>,
    layer: &str,
    class_idx: &ClassIndex,
    plan: ScoringPlan,
    mut perturb: F,
) -> Result<Tensor<B, 2>>
where
    B: Backend,
    M: CamModel<B, D>,
    F: FnMut(usize, &mut [f32]),
{
    let activation = core.activation(layer)?;
    let input = core.stored_input()?;

    let act_dims = activation.dims();
    let in_dims = input.dims();
    let act_shape = MapShape::from_dims(&act_dims)?;
    let in_shape = MapShape::from_dims(&in_dims)?;
    let (batch, channels) = (act_shape.batch(), act_shape.channels());
    if in_shape.batch() != batch {
        return Err(CamError::ShapeMismatch(format!(
            "activation of '{}' is {}, stored input is {}",
            layer, act_shape, in_shape
        )));
    }

    let in_channels = in_shape.channels();
    let positions = in_shape.spatial_numel();
    let n_pairs = batch * channels;

    let mode = in_shape.interpolation_mode();
    let masks = upsample::resize(
        &to_host(normalize_spatial(activation))?,
        n_pairs,
        act_shape.spatial(),
        in_shape.spatial(),
        mode,
    );
    let input_values = to_host(input.clone())?;

    let chunk_size = plan.batch_size.max(1);
    tracing::debug!(
        layer,
        pairs = n_pairs,
        chunks = n_pairs.div_ceil(chunk_size),
        passes = plan.passes,
        ?mode,
        "scoring masked inputs"
    );

    let mut scope = core.scoring_scope();
    let device = scope.device();

    let baseline = scope.forward(input);
    let n_classes = baseline.dims()[1];
    let targets = class_idx.resolve(batch, n_classes)?;
    let baseline = to_host(baseline)?;

    let mut scores = vec![0.0f32; n_pairs];
    let mut mask = vec![0.0f32; positions];

    for pass in 0..plan.passes {
        for start in (0..n_pairs).step_by(chunk_size) {
            let end = (start + chunk_size).min(n_pairs);

            let mut masked = Vec::with_capacity((end - start) * in_channels * positions);
            for pair in start..end {
                let sample = pair / channels;
                mask.copy_from_slice(&masks[pair * positions..(pair + 1) * positions]);
                perturb(pass, &mut mask);

                let sample_input = &input_values[sample * in_channels * positions..][..in_channels * positions];
                for channel_input in sample_input.chunks_exact(positions) {
                    masked.extend(channel_input.iter().zip(&mask).map(|(x, m)| x * m));
                }
            }

            let mut dims = in_dims;
            dims[0] = end - start;
            let logits = to_host(scope.forward(from_host(masked, dims, &device)))?;

            for pair in start..end {
                let sample = pair / channels;
                let class = targets[sample];
                let row = pair - start;
                scores[pair] += logits[row * n_classes + class] - baseline[sample * n_classes + class];
            }
        }
    }

    drop(scope);

    Ok(finalize_weights(scores, [batch, channels], plan.passes, &device))
}

/// Average accumulated scores, zero out NaN and softmax over channels.
pub(crate) fn finalize_weights<B: Backend>(
    mut scores: Vec<f32>,
    dims: [usize; 2],
    passes: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let passes = passes.max(1) as f32;
    for score in scores.iter_mut() {
        *score = if score.is_nan() { 0.0 } else { *score / passes };
    }

    softmax(from_host(scores, dims, device), 1)
}

/// Cumulative mask coefficients for integrated scoring.
///
/// Pass `i` scales every mask by `sum_{j <= i} (j + 1) / n`, so the last
/// coefficient is `(n + 1) / 2`.
pub fn integration_coefficients(n: usize) -> Vec<f32> {
    let mut total = 0.0f32;
    (0..n)
        .map(|i| {
            total += (i + 1) as f32 / n as f32;
            total
        })
        .collect()
}
