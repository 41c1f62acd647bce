//! # evaluation
//!
//! Evaluation routines for perception tasks.

/// 3D object detection evaluation.
pub mod detection;
