//! # structures
//!
//! Per-sample annotation containers.

/// Ground-truth and prediction annotations.
pub mod annotation;
