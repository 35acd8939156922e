//! # camrs_models
//!
//! Reference classifiers for camrs.
//!
//! Both models follow the classic CAM-compatible layout: convolutional
//! feature blocks, global average pooling and a single linear classifier.
//!
//! - [`ConvNet1d`] - time series input `(B, V, L)`
//! - [`ConvNet2d`] - image input `(B, C, H, W)`
//!
//! Each reports its input and the outputs of `block1`, `block2`, `block3`
//! and `gap` to [`camrs_core::ForwardHooks`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cnn;
mod traits;

pub use cnn::*;
