//! # det3d_eval
//!
//! Average-precision evaluation for 3D object detection.
//!
//! Ground truth and predictions are paired per sample, matched greedily on rotated
//! 3D IoU, and scored per class and difficulty level.

#![warn(missing_docs)]

#[macro_use]
extern crate log;

pub mod constants;
pub mod error;
pub mod evaluation;
pub mod geometry;
pub mod io;
pub mod path;
pub mod structures;

pub use error::{EvalError, Result};
pub use evaluation::detection::{evaluate, evaluate_curves, DetectionCfg};
