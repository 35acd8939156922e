//! Score-weighted class activation mapping.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use camrs_core::{CamModel, ClassIndex, Result};

use super::{check_positive, default_input_shape};
use crate::attribution::AttributionMethod;
use crate::extractor::{CamCore, CamMethod};
use crate::perturbation::{score_weights, ScoringPlan};

/// Configuration for [`ScoreCam`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreCamConfig {
    /// Maximum number of masked inputs per forward pass.
    pub batch_size: usize,
    /// Input shape without the batch dimension.
    pub input_shape: Vec<usize>,
}

impl Default for ScoreCamConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            input_shape: default_input_shape(),
        }
    }
}

impl ScoreCamConfig {
    /// Set the chunk size for masked forward passes.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the expected input shape.
    #[must_use]
    pub fn with_input_shape(mut self, input_shape: &[usize]) -> Self {
        self.input_shape = input_shape.to_vec();
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        check_positive("batch_size", self.batch_size)
    }
}

/// Score-CAM: each channel is weighted by how much masking the input with
/// it raises the class score over the unmasked input.
///
/// Weights are a softmax over channels of `Y_c(input * mask_k) - Y_c(input)`,
/// where `mask_k` is channel `k` normalized to `[0, 1]` and resized to the
/// input.
#[derive(Debug)]
pub struct ScoreCam<B: Backend, M: CamModel<B, D>, const D: usize> {
    core: CamCore<B, M, D>,
    config: ScoreCamConfig,
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> ScoreCam<B, M, D> {
    /// Create a Score-CAM extractor.
    pub fn new(model: M, target_layers: &[&str], config: ScoreCamConfig) -> Result<Self> {
        config.validate()?;
        let core = CamCore::new(model, target_layers, &config.input_shape, true)?;
        Ok(Self { core, config })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ScoreCamConfig {
        &self.config
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> CamMethod<B, M, D> for ScoreCam<B, M, D> {
    fn core(&self) -> &CamCore<B, M, D> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CamCore<B, M, D> {
        &mut self.core
    }

    fn method(&self) -> AttributionMethod {
        AttributionMethod::ScoreCam
    }

    fn class_weights(&mut self, layer: &str, class_idx: &ClassIndex) -> Result<Tensor<B, 2>> {
        let plan = ScoringPlan {
            batch_size: self.config.batch_size,
            passes: 1,
        };
        score_weights(&mut self.core, layer, class_idx, plan, |_, _| {})
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> std::fmt::Display for ScoreCam<B, M, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScoreCAM(batch_size={})", self.config.batch_size)
    }
}
