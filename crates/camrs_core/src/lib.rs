//! # camrs_core
//!
//! Core types and traits for camrs class activation maps.
//!
//! This crate provides:
//! - [`CamModel`] and [`ForwardHooks`], the contract a classifier implements so
//!   its intermediate activations can be observed during a forward pass
//! - [`ClassIndex`] for single or per-sample target classes
//! - [`MapShape`] and [`InterpolationMode`] for activation/map shape metadata
//! - [`ModelMode`] for train/eval switching
//! - [`Seed`] for reproducible perturbation noise
//! - Error types and host tensor helpers
//!
//! ## Shape Convention
//!
//! Inputs, activations and maps follow `(B, C, S...)`:
//! - `B`: Batch size
//! - `C`: Channels (input channels, feature maps, or `1` for a map)
//! - `S...`: One or more spatial dimensions
//!
//! ## Example
//!
//! ```rust
//! use camrs_core::{ClassIndex, MapShape};
//!
//! let shape = MapShape::from_dims(&[2, 64, 7, 7]).unwrap();
//! assert_eq!(shape.spatial_numel(), 49);
//!
//! let targets = ClassIndex::from(vec![3, 5]).resolve(2, 10).unwrap();
//! assert_eq!(targets, vec![3, 5]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod class_index;
mod error;
mod mode;
mod model_trait;
mod seed;
mod shape;
mod tensor;

pub use class_index::ClassIndex;
pub use error::{CamError, Result};
pub use mode::ModelMode;
pub use model_trait::{CamModel, ForwardHooks, LayerInfo, LayerKind, NoHooks};
pub use seed::Seed;
pub use shape::{InterpolationMode, MapShape};
pub use tensor::{from_host, to_host};

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;
}
