//! Moving tensor data between device and host.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::error::{CamError, Result};

/// Read a tensor back to the host as `f32` values in row-major order.
///
/// # Errors
///
/// Returns [`CamError::TensorData`] if the data cannot be converted.
pub fn to_host<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| CamError::TensorData(format!("{e:?}")))
}

/// Build a tensor from row-major host values.
pub fn from_host<B: Backend, const D: usize>(
    values: Vec<f32>,
    dims: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(TensorData::new(values, dims), device)
}
