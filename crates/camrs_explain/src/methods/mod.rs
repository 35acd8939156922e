//! Class weight estimators.

mod cam;
mod is_cam;
mod score_cam;
mod ss_cam;

pub use cam::Cam;
pub use is_cam::{IsCam, IsCamConfig};
pub use score_cam::{ScoreCam, ScoreCamConfig};
pub use ss_cam::{SsCam, SsCamConfig};

use camrs_core::{CamError, Result};

/// Input shape assumed when none is configured, `(channels, height, width)`.
pub const DEFAULT_INPUT_SHAPE: [usize; 3] = [3, 224, 224];

fn default_input_shape() -> Vec<usize> {
    DEFAULT_INPUT_SHAPE.to_vec()
}

fn check_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(CamError::InvalidConfig(format!("{name} must be positive")));
    }
    Ok(())
}
