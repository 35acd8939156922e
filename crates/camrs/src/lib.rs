//! # camrs
//!
//! Class activation maps for convolutional classifiers written with burn.
//!
//! camrs explains a trained classifier's prediction with a heatmap over the
//! input, built from the activations of an intermediate layer:
//!
//! - **CAM**: channels weighted by the final linear layer
//! - **Score-CAM**: channels weighted by the class score of the input masked
//!   with each channel
//! - **SS-CAM**: Score-CAM averaged over noisy masks
//! - **IS-CAM**: Score-CAM integrated over the mask intensity
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use camrs::prelude::*;
//!
//! let model = ConvNet2dConfig::new(3, 64, 64, 10).init(&device);
//! let config = ScoreCamConfig::default().with_input_shape(&model.input_shape());
//!
//! let mut extractor = ScoreCam::new(model, &["block3"], config)?;
//! let _logits = extractor.forward(images);
//! let map = extractor.explain(&ClassIndex::Single(3))?;
//! assert_eq!(map.shape(), [batch, 1, 64, 64]);
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use camrs_core as core;
pub use camrs_explain as explain;
pub use camrs_models as models;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use camrs::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use camrs_core::{
        CamError, CamModel, ClassIndex, ForwardHooks, LayerInfo, LayerKind, MapShape, ModelMode,
        Result, Seed,
    };

    // Models
    pub use camrs_models::{ConvNet1d, ConvNet1dConfig, ConvNet2d, ConvNet2dConfig};

    // Explain
    pub use camrs_explain::{
        AttributionMap, AttributionMethod, Cam, CamMethod, IsCam, IsCamConfig, ScoreCam,
        ScoreCamConfig, SsCam, SsCamConfig,
    };
}
