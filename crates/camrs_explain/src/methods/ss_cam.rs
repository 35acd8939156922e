//! Smoothed Score-CAM.

use burn::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use camrs_core::{CamError, CamModel, ClassIndex, Result, Seed};

use super::{check_positive, default_input_shape};
use crate::attribution::AttributionMethod;
use crate::extractor::{CamCore, CamMethod};
use crate::perturbation::{score_weights, ScoringPlan};

/// Configuration for [`SsCam`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsCamConfig {
    /// Maximum number of masked inputs per forward pass.
    pub batch_size: usize,
    /// Number of noisy passes averaged.
    pub num_samples: usize,
    /// Standard deviation of the noise added to every mask.
    pub std: f32,
    /// Seed of the noise stream.
    pub seed: Seed,
    /// Input shape without the batch dimension.
    pub input_shape: Vec<usize>,
}

impl Default for SsCamConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            num_samples: 35,
            std: 2.0,
            seed: Seed::default(),
            input_shape: default_input_shape(),
        }
    }
}

impl SsCamConfig {
    /// Set the chunk size for masked forward passes.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of noisy passes.
    #[must_use]
    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Set the noise standard deviation.
    #[must_use]
    pub fn with_std(mut self, std: f32) -> Self {
        self.std = std;
        self
    }

    /// Set the noise seed.
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<Seed>) -> Self {
        self.seed = seed.into();
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
        check_positive("num_samples", self.num_samples)?;
        if !self.std.is_finite() || self.std < 0.0 {
            return Err(CamError::InvalidConfig(format!(
                "std must be finite and non-negative, got {}",
                self.std
            )));
        }
        Ok(())
    }
}

/// SS-CAM: Score-CAM averaged over `num_samples` passes, each adding
/// Gaussian noise to the masks before they are applied.
#[derive(Debug)]
pub struct SsCam<B: Backend, M: CamModel<B, D>, const D: usize> {
    core: CamCore<B, M, D>,
    config: SsCamConfig,
    noise: Normal<f32>,
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> SsCam<B, M, D> {
    /// Create an SS-CAM extractor.
    pub fn new(model: M, target_layers: &[&str], config: SsCamConfig) -> Result<Self> {
        config.validate()?;
        let noise = Normal::new(0.0, config.std)
            .map_err(|e| CamError::InvalidConfig(format!("invalid noise distribution: {e}")))?;
        let core = CamCore::new(model, target_layers, &config.input_shape, true)?;

        Ok(Self {
            core,
            config,
            noise,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &SsCamConfig {
        &self.config
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> CamMethod<B, M, D> for SsCam<B, M, D> {
    fn core(&self) -> &CamCore<B, M, D> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CamCore<B, M, D> {
        &mut self.core
    }

    fn method(&self) -> AttributionMethod {
        AttributionMethod::SsCam
    }

    fn class_weights(&mut self, layer: &str, class_idx: &ClassIndex) -> Result<Tensor<B, 2>> {
        let plan = ScoringPlan {
            batch_size: self.config.batch_size,
            passes: self.config.num_samples,
        };
        // Every call replays the same noise
        let mut rng = self.config.seed.to_rng();
        let noise = self.noise;

        score_weights(&mut self.core, layer, class_idx, plan, |_, mask| {
            for value in mask.iter_mut() {
                *value += noise.sample(&mut rng);
            }
        })
    }
}

impl<B: Backend, M: CamModel<B, D>, const D: usize> std::fmt::Display for SsCam<B, M, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SSCAM(batch_size={}, num_samples={}, std={})",
            self.config.batch_size, self.config.num_samples, self.config.std
        )
    }
}
