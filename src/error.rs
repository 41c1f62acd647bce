//! # error
//!
//! Error type shared by the evaluation pipeline and the annotation readers.

use thiserror::Error;

/// Errors raised while loading annotations or evaluating detections.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Ground truth and prediction collections hold a different number of samples.
    #[error("the number of GT must match predictions ({ground_truth} vs {predictions})")]
    SampleCountMismatch {
        /// Number of ground-truth samples.
        ground_truth: usize,
        /// Number of prediction samples.
        predictions: usize,
    },
    /// Difficulty mode string could not be parsed.
    #[error("difficulty mode `{0}` is not supported")]
    UnsupportedDifficultyMode(String),
    /// Some, but not all, of the vehicle superclass members were requested.
    #[error("Car/Bus/Truck must all exist for vehicle detection")]
    IncompleteSuperclass,
    /// A requested class has no IoU threshold.
    #[error("no IoU threshold configured for class `{0}`")]
    MissingIouThreshold(String),
    /// Parallel per-box sequences disagree in length or box width.
    #[error("malformed annotation: {0}")]
    ShapeMismatch(String),
    /// Configuration value outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Annotation file with an extension we cannot read.
    #[error("unsupported annotation file `{0}`")]
    UnsupportedFormat(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Arrow IPC / dataframe failure.
    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}

/// Result alias with [`EvalError`].
pub type Result<T> = std::result::Result<T, EvalError>;
