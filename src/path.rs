//! # path
//!
//! File path utilities.

use std::path::Path;

use crate::error::{EvalError, Result};

/// On-disk layout of an annotation collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationFormat {
    /// JSON array of per-sample records.
    Json,
    /// Arrow IPC (feather) table with one row per box.
    Ipc,
}

/// Infer the annotation format from the file extension.
pub fn annotation_format(path: &Path) -> Result<AnnotationFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => Ok(AnnotationFormat::Json),
        Some("feather" | "arrow" | "ipc") => Ok(AnnotationFormat::Ipc),
        _ => Err(EvalError::UnsupportedFormat(path.display().to_string())),
    }
}
