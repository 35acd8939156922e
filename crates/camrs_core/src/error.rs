//! Error types for camrs.

use thiserror::Error;

/// Result type alias using [`CamError`].
pub type Result<T> = std::result::Result<T, CamError>;

/// Errors that can occur while extracting class activation maps.
#[derive(Error, Debug)]
pub enum CamError {
    /// Shape mismatch between tensors.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Dimension error.
    #[error("Dimension error: expected {expected} dimensions, got {got}")]
    DimensionError {
        /// Expected number of dimensions.
        expected: usize,
        /// Actual number of dimensions.
        got: usize,
    },

    /// The model has no layer with this name.
    #[error("Unknown layer: '{0}'")]
    UnknownLayer(String),

    /// A layer was given where a different kind of layer is required.
    #[error("Invalid layer type for '{layer}': expected {expected}, got {got}")]
    InvalidLayerType {
        /// Layer name.
        layer: String,
        /// Required layer kind.
        expected: String,
        /// Actual layer kind.
        got: String,
    },

    /// Automatic layer location failed.
    #[error("Layer resolution failed: {0}")]
    LayerResolution(String),

    /// Invalid extractor configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Class index outside the model's output range.
    #[error("Class index {index} out of range for {n_classes} classes")]
    ClassIndexOutOfRange {
        /// The requested class.
        index: usize,
        /// Number of classes produced by the model.
        n_classes: usize,
    },

    /// Per-sample class list does not match the batch.
    #[error("Class count mismatch: expected {expected} class indices, got {got}")]
    ClassCountMismatch {
        /// Batch size.
        expected: usize,
        /// Number of class indices supplied.
        got: usize,
    },

    /// No activation has been captured for a target layer.
    #[error("No activation captured for layer '{0}', run a forward pass first")]
    MissingActivation(String),

    /// No model input has been captured.
    #[error("No model input captured, run a forward pass first")]
    MissingInput,

    /// Tensor data could not be read back from the device.
    #[error("Tensor data error: {0}")]
    TensorData(String),
}
