//! Integrated Score-CAM.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use camrs_core::{CamModel, ClassIndex, Result};

use super::{check_positive, default_input_shape};
use crate::attribution::AttributionMethod;
use crate::extractor::{CamCore, CamMethod};
use crate::perturbation::{integration_coefficients, score_weights, ScoringPlan};

/// Configuration for [`IsCam`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsCamConfig {
    /// Maximum number of masked inputs per forward pass.
    pub batch_size: usize,
    /// Number of integration steps.
    pub num_samples: usize,
    /// Input shape without the batch dimension.
    pub input_shape: Vec<usize>,
}

impl Default for IsCamConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            num_samples: 10,
            input_shape: default_input_shape(),
        }
    }
}

impl IsCamConfig {
    /// Set the chunk size for masked forward passes.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of integration steps.
    #[must_use]
    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
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
        check_positive("batch_size", self.batch_size)?;
        check_positive("num_samples", self.num_samples)
    }
}

/// IS-CAM: Score-CAM integrated along the masking intensity.
///
/// Step `i` scales every mask by the cumulative coefficient
/// `sum_{j <= i} (j + 1) / num_samples`; the scores of all steps are
/// averaged before the softmax.
#[derive(Debug)]
pub struct IsCam<B: Backend, M: CamModel<B, D>, const D: usize> {
    core: CamCore<B, M, D>,
    config: IsCamConfig,
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> IsCam<B, M, D> {
    /// Create an IS-CAM extractor.
    pub fn new(model: M, target_layers: &[&str], config: IsCamConfig) -> Result<Self> {
        config.validate()?;
        let core = CamCore::new(model, target_layers, &config.input_shape, true)?;
        Ok(Self { core, config })
    }

    /// The configuration in use.
    pub fn config(&self) -> &IsCamConfig {
        &self.config
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> CamMethod<B, M, D> for IsCam<B, M, D> {
    fn core(&self) -> &CamCore<B, M, D> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CamCore<B, M, D> {
        &mut self.core
    }

    fn method(&self) -> AttributionMethod {
        AttributionMethod::IsCam
    }

    fn class_weights(&mut self, layer: &str, class_idx: &ClassIndex) -> Result<Tensor<B, 2>> {
        let plan = ScoringPlan {
            batch_size: self.config.batch_size,
            passes: self.config.num_samples,
        };
        let coefficients = integration_coefficients(self.config.num_samples);

        score_weights(&mut self.core, layer, class_idx, plan, |pass, mask| {
            let coefficient = coefficients[pass];
            for value in mask.iter_mut() {
                *value *= coefficient;
            }
        })
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> std::fmt::Display for IsCam<B, M, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ISCAM(batch_size={}, num_samples={})",
            self.config.batch_size, self.config.num_samples
        )
    }
}
