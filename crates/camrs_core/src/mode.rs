//! Train/eval mode of a model.

use serde::{Deserialize, Serialize};

/// Execution mode of a model.
///
/// Perturbation scoring always runs in [`ModelMode::Eval`] and puts the
/// model back in its previous mode afterwards.
///
/// # Example
///
/// ```rust
/// use camrs_core::ModelMode;
///
/// let mode = ModelMode::Train;
/// assert!(mode.is_train());
/// assert!(!mode.is_eval());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelMode {
    /// Training mode - stochastic layers such as dropout are active.
    #[default]
    Train,
    /// Evaluation mode - deterministic inference. Each sample's output is
    /// independent of the rest of its batch on every backend, including
    /// autodiff backends, and normalization statistics are not updated.
    Eval,
}

impl ModelMode {
    /// Check if this is training mode.
    #[must_use]
    pub const fn is_train(&self) -> bool {
        matches!(self, ModelMode::Train)
    }

    /// Check if this is evaluation mode.
    #[must_use]
    pub const fn is_eval(&self) -> bool {
        matches!(self, ModelMode::Eval)
    }
}

impl std::fmt::Display for ModelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelMode::Train => write!(f, "train"),
            ModelMode::Eval => write!(f, "eval"),
        }
    }
}
