//! # camrs_explain
//!
//! Class activation maps for burn classifiers.
//!
//! This crate provides:
//! - Forward hooks capturing the model input and target layer activations
//! - CAM, weighting channels by the final linear layer
//! - Score-CAM, SS-CAM and IS-CAM, weighting channels by scoring masked inputs
//! - Map synthesis, normalization and multi-layer fusion
//!
//! # Example
//!
//! ```rust,ignore
//! use camrs_explain::{CamMethod, ScoreCam, ScoreCamConfig};
//!
//! let config = ScoreCamConfig::default().with_input_shape(&[3, 64, 64]);
//! let mut extractor = ScoreCam::new(model, &["block3"], config)?;
//! let _logits = extractor.forward(images);
//! let map = extractor.explain(&ClassIndex::Single(7))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod attribution;
mod extractor;
mod locate;
pub mod methods;
mod perturbation;
pub mod upsample;

#[cfg(test)]
mod testing;

pub use activation::{ActivationCapture, HookHandle, HookRegistry};
pub use attribution::{fuse_maps, normalize_spatial, AttributionMap, AttributionMethod, NORM_EPS};
pub use extractor::{CamCore, CamMethod, ScoringScope};
pub use locate::{locate_candidate_layer, locate_linear_layer};
pub use methods::{Cam, IsCam, IsCamConfig, ScoreCam, ScoreCamConfig, SsCam, SsCamConfig};
pub use perturbation::integration_coefficients;
