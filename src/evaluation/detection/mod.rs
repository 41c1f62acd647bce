//! # detection
//!
//! Average precision of 3D cuboid detections, reported per class and difficulty level.

/// Thresholds, class groupings and difficulty modes.
pub mod constants;
/// Evaluation entry points and configuration.
pub mod eval;
/// Curves, average precision and reporting.
pub mod summary;
/// Filtering, matching and threshold selection.
pub mod utils;

pub use eval::{evaluate, evaluate_curves, DetectionCfg};
