//! # geometry
//!
//! Geometric operations for cuboid scoring.

/// Rotated 3D intersection-over-union.
pub mod iou;
/// Convex polygon algorithms.
pub mod polygon;
/// Geometric utility functions.
pub mod utils;
