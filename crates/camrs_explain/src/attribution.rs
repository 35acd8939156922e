//! Attribution maps and their post-processing.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use camrs_core::{from_host, to_host, CamError, ClassIndex, InterpolationMode, Result};

use crate::upsample;

/// Added to the per-map maximum before dividing, so flat maps stay finite.
pub const NORM_EPS: f32 = 1e-8;

/// Method used to weight the activation channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributionMethod {
    /// Class weights of the final linear layer.
    Cam,
    /// Score-weighted CAM.
    ScoreCam,
    /// Smoothed Score-CAM.
    SsCam,
    /// Integrated Score-CAM.
    IsCam,
}

impl AttributionMethod {
    /// All methods, in the order they were introduced.
    pub const ALL: [AttributionMethod; 4] = [
        AttributionMethod::Cam,
        AttributionMethod::ScoreCam,
        AttributionMethod::SsCam,
        AttributionMethod::IsCam,
    ];

    /// Short name as used in the literature.
    pub const fn name(&self) -> &'static str {
        match self {
            AttributionMethod::Cam => "CAM",
            AttributionMethod::ScoreCam => "ScoreCAM",
            AttributionMethod::SsCam => "SSCAM",
            AttributionMethod::IsCam => "ISCAM",
        }
    }

    /// Whether the method scores masked inputs with extra forward passes.
    pub const fn is_perturbation_based(&self) -> bool {
        !matches!(self, AttributionMethod::Cam)
    }
}

impl std::fmt::Display for AttributionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for AttributionMethod {
    type Err = CamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "cam" => Ok(AttributionMethod::Cam),
            "scorecam" => Ok(AttributionMethod::ScoreCam),
            "sscam" => Ok(AttributionMethod::SsCam),
            "iscam" => Ok(AttributionMethod::IsCam),
            other => Err(CamError::InvalidConfig(format!(
                "unknown method '{other}', expected one of cam, scorecam, sscam, iscam"
            ))),
        }
    }
}

/// A class activation map.
///
/// `values` has shape `(batch, 1, spatial...)`.
#[derive(Debug, Clone)]
pub struct AttributionMap<B: Backend, const D: usize> {
    /// The attribution values.
    pub values: Tensor<B, D>,
    /// The method used.
    pub method: AttributionMethod,
    /// Class(es) the map explains.
    pub target: Option<ClassIndex>,
}

impl<B: Backend, const D: usize> AttributionMap<B, D> {
    /// Create a new attribution map.
    pub fn new(values: Tensor<B, D>, method: AttributionMethod) -> Self {
        Self {
            values,
            method,
            target: None,
        }
    }

    /// Set the explained class.
    pub fn with_target(mut self, target: ClassIndex) -> Self {
        self.target = Some(target);
        self
    }

    /// Get the shape of the map.
    pub fn shape(&self) -> [usize; D] {
        self.values.dims()
    }

    /// Scale each sample's map to `[0, 1]`.
    pub fn normalize(&self) -> Self {
        Self {
            values: normalize_spatial(self.values.clone()),
            method: self.method,
            target: self.target.clone(),
        }
    }

    /// Map values on the host, row-major.
    pub fn to_host(&self) -> Result<Vec<f32>> {
        to_host(self.values.clone())
    }
}

/// Min-max normalize every `(batch, channel)` slice over its spatial dims.
///
/// Computes `(x - min) / (max(x - min) + NORM_EPS)`.
pub fn normalize_spatial<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, D> {
    let dims = tensor.dims();
    let spatial: usize = dims[2..].iter().product();

    let flat = tensor.reshape([dims[0], dims[1], spatial]);
    let flat = flat.clone() - flat.min_dim(2);
    let flat = flat.clone() / (flat.max_dim(2) + NORM_EPS);

    flat.reshape(dims)
}

/// Combine maps from several layers into one.
///
/// A single map is returned unchanged. Otherwise every map is resized to the
/// largest extent seen along each spatial axis and the element-wise maximum
/// is taken.
///
/// # Errors
///
/// Returns an error if `maps` is empty or the maps disagree on batch size or
/// channel count.
pub fn fuse_maps<B: Backend, const D: usize>(mut maps: Vec<Tensor<B, D>>) -> Result<Tensor<B, D>> {
    match maps.len() {
        0 => Err(CamError::InvalidConfig("no maps to fuse".to_string())),
        1 => Ok(maps.remove(0)),
        _ => {
            let first = maps[0].dims();
            let device = maps[0].device();

            let mut target = first;
            for map in &maps[1..] {
                let dims = map.dims();
                if dims[0] != first[0] || dims[1] != first[1] {
                    return Err(CamError::ShapeMismatch(format!(
                        "cannot fuse maps of shape {:?} and {:?}",
                        first, dims
                    )));
                }
                for axis in 2..D {
                    target[axis] = target[axis].max(dims[axis]);
                }
            }

            let n_maps = first[0] * first[1];
            let mode = InterpolationMode::for_spatial_rank(D - 2);
            let mut fused: Option<Vec<f32>> = None;

            for map in maps {
                let src = map.dims();
                let values = to_host(map)?;
                let resized = upsample::resize(&values, n_maps, &src[2..], &target[2..], mode);
                fused = Some(match fused {
                    None => resized,
                    Some(acc) => acc.iter().zip(&resized).map(|(a, b)| a.max(*b)).collect(),
                });
            }

            Ok(from_host(fused.unwrap_or_default(), target, &device))
        }
    }
}
