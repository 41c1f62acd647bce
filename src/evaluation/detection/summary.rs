//! # summary
//!
//! Precision/recall curves and average precision tables.

use std::{collections::HashMap, fmt::Write};

use ndarray::{s, Array1, Array2, Array3, ArrayView1, Axis};
use serde::Serialize;

use super::utils::Confusion;

/// Monotone precision/recall curve sampled at `num_pr_points + 1` score thresholds.
#[derive(Clone, Debug, PartialEq)]
pub struct PrCurve {
    /// Precision per threshold, non-increasing.
    pub precision: Array1<f64>,
    /// Recall per threshold, non-increasing.
    pub recall: Array1<f64>,
}

/// Ratio with an empty denominator defined as zero.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    match denominator {
        0 => 0.0,
        _ => numerator as f64 / denominator as f64,
    }
}

/// Replace each value with the maximum at or after it.
fn suffix_max(values: &mut Array1<f64>) {
    for k in (0..values.len().saturating_sub(1)).rev() {
        values[k] = values[k].max(values[k + 1]);
    }
}

impl PrCurve {
    /// Build the curve from the confusion counts of each selected threshold.
    /// Slots past the last threshold stay at zero.
    pub fn from_confusion(confusion_matrix: &[Confusion], num_pr_points: usize) -> Self {
        let mut precision = Array1::<f64>::zeros(num_pr_points + 1);
        let mut recall = Array1::<f64>::zeros(num_pr_points + 1);
        for (k, c) in confusion_matrix.iter().take(num_pr_points + 1).enumerate() {
            recall[k] = ratio(c.tp, c.tp + c.fn_);
            precision[k] = ratio(c.tp, c.tp + c.fp);
        }
        suffix_max(&mut precision);
        suffix_max(&mut recall);
        Self { precision, recall }
    }

    /// Curve of a class/difficulty without accepted ground truth.
    pub fn undefined(num_pr_points: usize) -> Self {
        Self {
            precision: Array1::from_elem(num_pr_points + 1, f64::NAN),
            recall: Array1::from_elem(num_pr_points + 1, f64::NAN),
        }
    }

    /// Average precision in [0, 100], NaN when the curve is undefined.
    pub fn average_precision(&self) -> f64 {
        average_precision(&self.precision.view())
    }
}

/// Mean of the precision samples after the first, scaled to [0, 100].
pub fn average_precision(precision: &ArrayView1<f64>) -> f64 {
    let num_pr_points = precision.len().saturating_sub(1);
    if num_pr_points == 0 {
        return f64::NAN;
    }
    precision.slice(s![1..]).sum() / num_pr_points as f64 * 100.0
}

/// Mean over the defined (non-NaN) entries, NaN when there are none.
fn nan_mean(values: ArrayView1<f64>) -> f64 {
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    match defined.len() {
        0 => f64::NAN,
        n => defined.iter().sum::<f64>() / n as f64,
    }
}

/// Evaluation output for every class and difficulty level.
#[derive(Clone, Debug, Serialize)]
pub struct EvaluationSummary {
    /// Evaluated classes, in report order.
    pub classes: Vec<String>,
    /// Difficulty level names, in report order.
    pub difficulty_types: Vec<String>,
    /// Number of recall sampling points.
    pub num_pr_points: usize,
    /// (classes, difficulties, num_pr_points + 1) precision.
    pub precision: Array3<f64>,
    /// (classes, difficulties, num_pr_points + 1) recall.
    pub recall: Array3<f64>,
    /// (classes, difficulties) average precision.
    pub ap: Array2<f64>,
    /// (difficulties,) mean average precision over the defined classes.
    pub mean_ap: Array1<f64>,
}

impl EvaluationSummary {
    /// Assemble the summary from curves laid out class-major.
    pub fn from_curves(
        classes: Vec<String>,
        difficulty_types: Vec<String>,
        num_pr_points: usize,
        curves: &[PrCurve],
    ) -> Self {
        let shape = (classes.len(), difficulty_types.len(), num_pr_points + 1);
        let mut precision = Array3::<f64>::zeros(shape);
        let mut recall = Array3::<f64>::zeros(shape);
        let mut ap = Array2::<f64>::zeros((shape.0, shape.1));
        for (k, curve) in curves.iter().enumerate() {
            let (i, j) = (k / shape.1, k % shape.1);
            precision.slice_mut(s![i, j, ..]).assign(&curve.precision);
            recall.slice_mut(s![i, j, ..]).assign(&curve.recall);
            ap[[i, j]] = curve.average_precision();
        }
        let mean_ap = ap.map_axis(Axis(0), nan_mean);
        Self {
            classes,
            difficulty_types,
            num_pr_points,
            precision,
            recall,
            ap,
            mean_ap,
        }
    }

    /// Flat `AP_<class>/<difficulty>` and `AP_mean/<difficulty>` map.
    pub fn metrics(&self) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();
        for (i, class_name) in self.classes.iter().enumerate() {
            for (j, difficulty) in self.difficulty_types.iter().enumerate() {
                metrics.insert(format!("AP_{class_name}/{difficulty}"), self.ap[[i, j]]);
            }
        }
        for (j, difficulty) in self.difficulty_types.iter().enumerate() {
            metrics.insert(format!("AP_mean/{difficulty}"), self.mean_ap[j]);
        }
        metrics
    }

    /// Fixed-width text table with one row per class and a final mAP row.
    pub fn report(&self) -> String {
        let mut table = String::new();
        // Writing into a `String` cannot fail.
        let _ = write!(table, "\n|AP@{:<9}|", self.num_pr_points);
        for difficulty in &self.difficulty_types {
            let _ = write!(table, "{difficulty:<12}|");
        }
        table.push('\n');
        for (class_name, ap) in self.classes.iter().zip(self.ap.rows()) {
            let _ = write!(table, "|{class_name:<12}|");
            for value in ap {
                let _ = write!(table, "{value:<12.2}|");
            }
            table.push('\n');
        }
        let _ = write!(table, "|{:<12}|", "mAP");
        for value in &self.mean_ap {
            let _ = write!(table, "{value:<12.2}|");
        }
        table.push('\n');
        table
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::{average_precision, EvaluationSummary, PrCurve};
    use crate::evaluation::detection::utils::Confusion;

    fn confusion(tp: usize, fp: usize, fn_: usize) -> Confusion {
        Confusion { tp, fp, fn_ }
    }

    #[test]
    fn test_curve_envelope_is_non_increasing() {
        let matrix = [
            confusion(1, 1, 3),
            confusion(2, 0, 2),
            confusion(3, 3, 1),
            confusion(4, 4, 0),
        ];
        let curve = PrCurve::from_confusion(&matrix, 4);
        assert_eq!(curve.precision, array![1.0, 1.0, 0.5, 0.5, 0.0]);
        assert_eq!(curve.recall, array![1.0, 1.0, 1.0, 1.0, 0.0]);
        assert!(curve.precision.windows(2).into_iter().all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_average_precision() {
        assert_eq!(average_precision(&array![1.0, 1.0, 1.0].view()), 100.0);
        assert_eq!(average_precision(&array![1.0, 0.5, 0.0].view()), 25.0);
        assert!(PrCurve::undefined(3).average_precision().is_nan());
    }

    #[test]
    fn test_mean_ap_skips_undefined_classes() {
        let perfect = PrCurve::from_confusion(&[confusion(1, 0, 0); 3], 2);
        let empty = PrCurve::from_confusion(&[], 2);
        let summary = EvaluationSummary::from_curves(
            vec!["Vehicle".into(), "Cyclist".into()],
            vec!["overall".into(), "0-30m".into()],
            2,
            &[perfect.clone(), empty, PrCurve::undefined(2), perfect],
        );
        assert_eq!(summary.ap[[0, 0]], 100.0);
        assert_eq!(summary.ap[[0, 1]], 0.0);
        assert!(summary.ap[[1, 0]].is_nan());
        assert_eq!(summary.ap[[1, 1]], 100.0);
        assert_eq!(summary.mean_ap[0], 100.0);
        assert_eq!(summary.mean_ap[1], 50.0);

        let metrics = summary.metrics();
        assert_eq!(metrics.len(), 6);
        assert_eq!(metrics["AP_Vehicle/overall"], 100.0);
        assert_eq!(metrics["AP_Vehicle/0-30m"], 0.0);
        assert!(metrics["AP_Cyclist/overall"].is_nan());
        assert_eq!(metrics["AP_mean/0-30m"], 50.0);
    }

    #[test]
    fn test_report_layout() {
        let perfect = PrCurve::from_confusion(&[confusion(1, 0, 0); 3], 2);
        let summary = EvaluationSummary::from_curves(
            vec!["Car".into()],
            vec!["overall".into()],
            2,
            &[perfect],
        );
        let expected = "\n|AP@2        |overall     |\n|Car         |100.00      |\n|mAP         |100.00      |\n";
        assert_eq!(summary.report(), expected);
    }
}
