//! # constants
//!
//! Common constants used throughout the library.

/// Cuboid columns, in the order they are stored in an `(N,7)` box array.
pub const BOX_COLUMNS: [&str; 7] = ["x", "y", "z", "width", "length", "height", "yaw"];

/// Annotation table columns.
/// One row per box; `score` is only present for predictions.
pub const ANNOTATION_COLUMNS: [&str; 10] = [
    "sample_id",
    "name",
    "x",
    "y",
    "z",
    "width",
    "length",
    "height",
    "yaw",
    "score",
];

/// Sample identifier column.
pub const SAMPLE_ID_COLUMN: &str = "sample_id";
/// Class name column.
pub const NAME_COLUMN: &str = "name";
/// Confidence column.
pub const SCORE_COLUMN: &str = "score";

/// Number of scalars describing a single cuboid.
pub const BOX_DIM: usize = 7;
