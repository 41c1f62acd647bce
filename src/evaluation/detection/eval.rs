use std::collections::HashMap;

use itertools::{izip, Itertools};
use ndarray::Array2;
use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::{
    error::{EvalError, Result},
    structures::annotation::{Detections, GroundTruth},
};

use super::{
    constants::{
        DifficultyMode, Flag, IOU_THRESHOLDS, NUM_PARTS, NUM_PR_POINTS, SUPERCLASS_IOU_THRESHOLDS,
        VEHICLE_CLASSES, VEHICLE_SUPERCLASS,
    },
    summary::{EvaluationSummary, PrCurve},
    utils::{
        accumulate_scores, compute_iou3d, compute_split_parts, compute_statistics, filter_data,
        get_thresholds, Confusion,
    },
};

/// Detection evaluation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionCfg {
    /// Categories to evaluate.
    pub classes: Vec<String>,
    /// Merge Car, Bus and Truck into a single Vehicle class.
    pub use_superclass: bool,
    /// Per-class IoU thresholds. Defaults depend on `use_superclass`.
    pub iou_thresholds: Option<HashMap<String, f64>>,
    /// Number of recall samples.
    pub num_pr_points: usize,
    /// Difficulty bucketing.
    pub difficulty_mode: DifficultyMode,
    /// Zero the IoU of pairs facing more than 90 degrees apart.
    pub ap_with_heading: bool,
    /// Number of parts the IoU computation is split into.
    pub num_parts: usize,
    /// Print the report table once evaluation completes.
    pub print_ok: bool,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            classes: ["Car", "Bus", "Truck", "Pedestrian", "Cyclist"]
                .into_iter()
                .map(String::from)
                .collect(),
            use_superclass: true,
            iou_thresholds: None,
            num_pr_points: NUM_PR_POINTS,
            difficulty_mode: DifficultyMode::default(),
            ap_with_heading: true,
            num_parts: NUM_PARTS,
            print_ok: false,
        }
    }
}

impl DetectionCfg {
    /// Classes in report order, with vehicle categories merged when requested.
    pub fn evaluated_classes(&self) -> Result<Vec<String>> {
        if !self.use_superclass {
            return Ok(self.classes.clone());
        }
        let num_vehicle_classes = VEHICLE_CLASSES
            .iter()
            .filter(|&&name| self.classes.iter().any(|c| c == name))
            .count();
        if num_vehicle_classes != 0 && num_vehicle_classes != VEHICLE_CLASSES.len() {
            return Err(EvalError::IncompleteSuperclass);
        }
        let classes = std::iter::once(VEHICLE_SUPERCLASS.to_string())
            .chain(
                self.classes
                    .iter()
                    .filter(|c| !VEHICLE_CLASSES.contains(&c.as_str()))
                    .cloned(),
            )
            .collect();
        Ok(classes)
    }

    /// IoU threshold of each class, in the order given.
    pub fn class_iou_thresholds(&self, classes: &[String]) -> Result<Vec<f64>> {
        let thresholds = match &self.iou_thresholds {
            Some(thresholds) => thresholds,
            None if self.use_superclass => &*SUPERCLASS_IOU_THRESHOLDS,
            None => &*IOU_THRESHOLDS,
        };
        classes
            .iter()
            .map(|class_name| {
                thresholds
                    .get(class_name)
                    .copied()
                    .ok_or_else(|| EvalError::MissingIouThreshold(class_name.clone()))
            })
            .collect()
    }
}

/// Score one class at one difficulty level across every sample.
fn evaluate_class_difficulty(
    gt_annos: &[GroundTruth],
    pred_annos: &[Detections],
    ious: &[Array2<f64>],
    cfg: &DetectionCfg,
    class_name: &str,
    difficulty_level: usize,
    iou_threshold: f64,
) -> Result<PrCurve> {
    let mut accum_all_scores = vec![];
    let mut flags = Vec::with_capacity(gt_annos.len());
    let mut num_valid_gt = 0;
    for (gt_anno, pred_anno, iou) in izip!(gt_annos, pred_annos, ious) {
        let (gt_flag, pred_flag) = filter_data(
            gt_anno,
            pred_anno,
            cfg.difficulty_mode,
            difficulty_level,
            class_name,
            cfg.use_superclass,
        )?;
        num_valid_gt += gt_flag.iter().filter(|&&f| f == Flag::Accepted).count();
        accum_all_scores.extend(accumulate_scores(
            &iou.view(),
            &pred_anno.score.view(),
            &gt_flag,
            &pred_flag,
            iou_threshold,
        ));
        flags.push((gt_flag, pred_flag));
    }

    let difficulty = cfg.difficulty_mode.difficulty_types()[difficulty_level];
    if num_valid_gt == 0 {
        warn!("No ground truth for `{class_name}` at `{difficulty}`; AP is undefined.");
        return Ok(PrCurve::undefined(cfg.num_pr_points));
    }

    let thresholds = get_thresholds(accum_all_scores, num_valid_gt, cfg.num_pr_points);
    let mut confusion_matrix = vec![Confusion::default(); thresholds.len()];
    for (pred_anno, iou, (gt_flag, pred_flag)) in izip!(pred_annos, ious, &flags) {
        for (confusion, &score_threshold) in confusion_matrix.iter_mut().zip(&thresholds) {
            *confusion += compute_statistics(
                &iou.view(),
                &pred_anno.score.view(),
                gt_flag,
                pred_flag,
                score_threshold,
                iou_threshold,
            );
        }
    }
    debug!(
        "{class_name}/{difficulty}: {num_valid_gt} ground truth, {} thresholds.",
        thresholds.len()
    );
    Ok(PrCurve::from_confusion(&confusion_matrix, cfg.num_pr_points))
}

/// Evaluate a set of detections against the ground truth annotations.
///
/// Samples are paired by index. Returns the precision/recall curves and the average
/// precision of every evaluated class and difficulty level.
pub fn evaluate_curves(
    gt_annos: &[GroundTruth],
    pred_annos: &[Detections],
    cfg: &DetectionCfg,
) -> Result<EvaluationSummary> {
    if gt_annos.len() != pred_annos.len() {
        return Err(EvalError::SampleCountMismatch {
            ground_truth: gt_annos.len(),
            predictions: pred_annos.len(),
        });
    }
    if cfg.num_pr_points == 0 {
        return Err(EvalError::InvalidConfig("num_pr_points must be positive".into()));
    }
    let classes = cfg.evaluated_classes()?;
    let iou_thresholds = cfg.class_iou_thresholds(&classes)?;
    let split_parts = compute_split_parts(gt_annos.len(), cfg.num_parts)?;
    let difficulty_types = cfg.difficulty_mode.difficulty_types();

    info!(
        "Evaluating {} samples: classes {:?}, difficulty mode `{}`.",
        gt_annos.len(),
        classes,
        cfg.difficulty_mode
    );
    let ious = compute_iou3d(gt_annos, pred_annos, &split_parts, cfg.ap_with_heading);

    let curves = (0..classes.len())
        .cartesian_product(0..difficulty_types.len())
        .collect_vec()
        .into_par_iter()
        .map(|(cls_idx, diff_idx)| {
            evaluate_class_difficulty(
                gt_annos,
                pred_annos,
                &ious,
                cfg,
                &classes[cls_idx],
                diff_idx,
                iou_thresholds[cls_idx],
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let summary = EvaluationSummary::from_curves(
        classes,
        difficulty_types.iter().map(|d| d.to_string()).collect(),
        cfg.num_pr_points,
        &curves,
    );
    if cfg.print_ok {
        println!("{}", summary.report());
    }
    info!("Evaluation complete.");
    Ok(summary)
}

/// Evaluate a set of detections and return the report table with the flat metrics map.
pub fn evaluate(
    gt_annos: &[GroundTruth],
    pred_annos: &[Detections],
    cfg: &DetectionCfg,
) -> Result<(String, HashMap<String, f64>)> {
    let summary = evaluate_curves(gt_annos, pred_annos, cfg)?;
    Ok((summary.report(), summary.metrics()))
}
