//! Activation and map shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};

/// Shape metadata for activations, inputs and maps.
///
/// Follows the convention `(B, C, S...)`:
/// - `B`: Batch size
/// - `C`: Channels
/// - `S...`: Spatial dimensions (at least one)
///
/// # Example
///
/// ```rust
/// use camrs_core::{InterpolationMode, MapShape};
///
/// let shape = MapShape::from_dims(&[8, 3, 224, 224]).unwrap();
/// assert_eq!(shape.batch(), 8);
/// assert_eq!(shape.channels(), 3);
/// assert_eq!(shape.spatial(), &[224, 224]);
/// assert_eq!(shape.interpolation_mode(), InterpolationMode::Bilinear);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapShape {
    batch: usize,
    channels: usize,
    spatial: Vec<usize>,
}

impl MapShape {
    /// Create a new shape.
    #[must_use]
    pub fn new(batch: usize, channels: usize, spatial: Vec<usize>) -> Self {
        Self {
            batch,
            channels,
            spatial,
        }
    }

    /// Create a shape from tensor dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 3 dimensions are given.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() < 3 {
            return Err(CamError::DimensionError {
                expected: 3,
                got: dims.len(),
            });
        }
        Ok(Self::new(dims[0], dims[1], dims[2..].to_vec()))
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Get the spatial dimensions.
    #[must_use]
    pub fn spatial(&self) -> &[usize] {
        &self.spatial
    }

    /// Number of spatial dimensions.
    #[must_use]
    pub fn spatial_rank(&self) -> usize {
        self.spatial.len()
    }

    /// Number of positions in one spatial map.
    #[must_use]
    pub fn spatial_numel(&self) -> usize {
        self.spatial.iter().product()
    }

    /// Get the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.batch * self.channels * self.spatial_numel()
    }

    /// Full dimensions, batch first.
    #[must_use]
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.spatial.len() + 2);
        dims.push(self.batch);
        dims.push(self.channels);
        dims.extend_from_slice(&self.spatial);
        dims
    }

    /// Interpolation mode used to upsample maps of this shape.
    #[must_use]
    pub fn interpolation_mode(&self) -> InterpolationMode {
        InterpolationMode::for_spatial_rank(self.spatial_rank())
    }
}

impl std::fmt::Display for MapShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(B={}, C={}, S={:?})",
            self.batch, self.channels, self.spatial
        )
    }
}

/// Interpolation used to bring activation maps to the input resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Nearest neighbour.
    Nearest,
    /// Linear along two spatial axes.
    Bilinear,
    /// Linear along three spatial axes.
    Trilinear,
}

impl InterpolationMode {
    /// Pick the mode for a given number of spatial dimensions.
    ///
    /// Two dimensions use bilinear, three use trilinear, anything else
    /// falls back to nearest neighbour.
    #[must_use]
    pub const fn for_spatial_rank(rank: usize) -> Self {
        match rank {
            2 => InterpolationMode::Bilinear,
            3 => InterpolationMode::Trilinear,
            _ => InterpolationMode::Nearest,
        }
    }
}
