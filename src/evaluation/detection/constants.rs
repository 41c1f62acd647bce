//! Constants used in the detection evaluation.

use std::{collections::HashMap, str::FromStr};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{EvalError, Result};

/// Name of the superclass grouping the vehicle categories.
pub const VEHICLE_SUPERCLASS: &str = "Vehicle";
/// Categories merged into [`VEHICLE_SUPERCLASS`].
pub const VEHICLE_CLASSES: [&str; 3] = ["Car", "Bus", "Truck"];
/// Categories rejected when scoring [`VEHICLE_SUPERCLASS`].
pub const NON_VEHICLE_CLASSES: [&str; 2] = ["Pedestrian", "Cyclist"];

/// Default number of recall sampling points.
pub const NUM_PR_POINTS: usize = 50;
/// Default number of memory-bounded parts for IoU computation.
pub const NUM_PARTS: usize = 100;
/// Slack used when stepping recall levels during threshold selection.
pub const RECALL_EPS: f64 = 1e-6;

/// Upper bound of the near distance bucket (m).
pub const NEAR_RANGE_M: f32 = 30.0;
/// Upper bound of the middle distance bucket (m).
pub const MID_RANGE_M: f32 = 50.0;

/// Per-class IoU thresholds.
pub static IOU_THRESHOLDS: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    [
        ("Car", 0.7),
        ("Bus", 0.7),
        ("Truck", 0.7),
        ("Pedestrian", 0.3),
        ("Cyclist", 0.5),
    ]
    .into_iter()
    .map(|(name, threshold)| (name.to_string(), threshold))
    .collect()
});

/// IoU thresholds when vehicle categories are merged.
pub static SUPERCLASS_IOU_THRESHOLDS: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    [
        (VEHICLE_SUPERCLASS, 0.7),
        ("Pedestrian", 0.3),
        ("Cyclist", 0.5),
    ]
    .into_iter()
    .map(|(name, threshold)| (name.to_string(), threshold))
    .collect()
});

/// How boxes are bucketed by difficulty.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
pub enum DifficultyMode {
    /// A single bucket with every box.
    #[strum(serialize = "Overall")]
    #[serde(rename = "Overall")]
    Overall,
    /// Range buckets `0-30m`, `30-50m`, `50m-inf`.
    #[strum(serialize = "Distance")]
    #[serde(rename = "Distance")]
    Distance,
    /// The overall bucket followed by the range buckets.
    #[default]
    #[strum(serialize = "Overall&Distance")]
    #[serde(rename = "Overall&Distance")]
    OverallDistance,
}

impl DifficultyMode {
    /// Parse a mode name such as `Overall&Distance`.
    pub fn parse(mode: &str) -> Result<Self> {
        Self::from_str(mode).map_err(|_| EvalError::UnsupportedDifficultyMode(mode.to_string()))
    }

    /// Names of the difficulty levels, in report order.
    pub fn difficulty_types(&self) -> &'static [&'static str] {
        match self {
            DifficultyMode::Overall => &["overall"],
            DifficultyMode::Distance => &["0-30m", "30-50m", "50m-inf"],
            DifficultyMode::OverallDistance => &["overall", "0-30m", "30-50m", "50m-inf"],
        }
    }

    /// Number of difficulty levels.
    pub fn num_difficulties(&self) -> usize {
        self.difficulty_types().len()
    }
}

/// Classification of a box for one (class, difficulty) evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i8)]
pub enum Flag {
    /// Same class and inside the difficulty bucket.
    Accepted = 0,
    /// Outside the difficulty bucket, of any class. May be matched, never counted.
    Ignored = 1,
    /// Different class inside the bucket. Takes no part in matching.
    Rejected = -1,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::{DifficultyMode, IOU_THRESHOLDS, SUPERCLASS_IOU_THRESHOLDS};
    use crate::error::EvalError;

    #[test]
    fn test_difficulty_mode_names_round_trip() {
        for mode in DifficultyMode::iter() {
            assert_eq!(DifficultyMode::from_str(&mode.to_string()).unwrap(), mode);
        }
        assert_eq!(
            DifficultyMode::from_str("Overall&Distance").unwrap(),
            DifficultyMode::OverallDistance
        );
        assert!(matches!(
            DifficultyMode::parse("Hard"),
            Err(EvalError::UnsupportedDifficultyMode(mode)) if mode == "Hard"
        ));
        assert_eq!(DifficultyMode::default().num_difficulties(), 4);
    }

    #[test]
    fn test_default_thresholds() {
        assert_eq!(IOU_THRESHOLDS["Truck"], 0.7);
        assert_eq!(SUPERCLASS_IOU_THRESHOLDS["Vehicle"], 0.7);
        assert_eq!(SUPERCLASS_IOU_THRESHOLDS["Pedestrian"], 0.3);
        assert!(!SUPERCLASS_IOU_THRESHOLDS.contains_key("Car"));
    }
}
