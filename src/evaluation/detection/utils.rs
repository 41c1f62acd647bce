use indicatif::ProgressBar;
use itertools::Itertools;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::{IntoParallelIterator, ParallelIterator};

use crate::{
    error::{EvalError, Result},
    geometry::iou::iou3d_matrix,
    structures::annotation::{Box3D, Detections, GroundTruth},
};

use super::constants::{
    DifficultyMode, Flag, MID_RANGE_M, NEAR_RANGE_M, NON_VEHICLE_CLASSES, RECALL_EPS,
    VEHICLE_SUPERCLASS,
};

/// True positive, false positive and false negative counts at one score threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Confusion {
    /// True positives.
    pub tp: usize,
    /// False positives.
    pub fp: usize,
    /// False negatives.
    pub fn_: usize,
}

impl std::ops::AddAssign for Confusion {
    fn add_assign(&mut self, rhs: Self) {
        self.tp += rhs.tp;
        self.fp += rhs.fp;
        self.fn_ += rhs.fn_;
    }
}

/// Split `num_samples` into chunks of `num_samples / num_parts`, plus a trailing remainder chunk.
/// A single chunk is returned when there are fewer samples than parts.
pub fn compute_split_parts(num_samples: usize, num_parts: usize) -> Result<Vec<usize>> {
    if num_parts == 0 {
        return Err(EvalError::InvalidConfig("num_parts must be positive".into()));
    }
    let part_samples = num_samples / num_parts;
    let remain_samples = num_samples % num_parts;
    if part_samples == 0 {
        return Ok(vec![num_samples]);
    }
    let mut parts = vec![part_samples; num_parts];
    if remain_samples > 0 {
        parts.push(remain_samples);
    }
    Ok(parts)
}

/// Compute the `(N,M)` IoU matrix of every sample, one part at a time.
pub fn compute_iou3d(
    gt_annos: &[GroundTruth],
    pred_annos: &[Detections],
    split_parts: &[usize],
    with_heading: bool,
) -> Vec<Array2<f64>> {
    let bar = ProgressBar::new(split_parts.len() as u64);
    let mut ious = Vec::with_capacity(gt_annos.len());
    let mut sample_idx = 0;
    for &num_part_samples in split_parts {
        let end = sample_idx + num_part_samples;
        let part: Vec<_> = (sample_idx..end)
            .into_par_iter()
            .map(|i| {
                iou3d_matrix(
                    &gt_annos[i].boxes_3d.view(),
                    &pred_annos[i].boxes_3d.view(),
                    with_heading,
                )
            })
            .collect();
        debug!(
            "Computed IoU for samples {sample_idx}..{end} ({} pairs).",
            part.iter().map(|iou| iou.len()).sum::<usize>()
        );
        ious.extend(part);
        sample_idx = end;
        bar.inc(1);
    }
    bar.finish_and_clear();
    ious
}

/// Range interval `[lower, upper)` selected by a difficulty level, or `None` for the overall level.
pub fn distance_bucket(mode: DifficultyMode, level: usize) -> Result<Option<(f32, f32)>> {
    let distance_level = match (mode, level) {
        (DifficultyMode::Overall | DifficultyMode::OverallDistance, 0) => return Ok(None),
        (DifficultyMode::Overall, _) => None,
        (DifficultyMode::Distance, level) => Some(level),
        (DifficultyMode::OverallDistance, level) => Some(level - 1),
    };
    match distance_level {
        Some(0) => Ok(Some((0.0, NEAR_RANGE_M))),
        Some(1) => Ok(Some((NEAR_RANGE_M, MID_RANGE_M))),
        Some(2) => Ok(Some((MID_RANGE_M, f32::INFINITY))),
        _ => Err(EvalError::InvalidConfig(format!(
            "difficulty level {level} is out of range for `{mode}`"
        ))),
    }
}

/// Whether a box falls outside the distance bucket.
fn is_ignored(cuboid: &Box3D, bucket: Option<(f32, f32)>) -> bool {
    match bucket {
        None => false,
        Some((lower, upper)) => {
            let range_m = cuboid.range_m();
            !(lower <= range_m && range_m < upper)
        }
    }
}

/// Whether a box labeled `name` belongs to another class than `class_name`.
fn is_rejected(name: &str, class_name: &str, use_superclass: bool) -> bool {
    if use_superclass && class_name == VEHICLE_SUPERCLASS {
        NON_VEHICLE_CLASSES.contains(&name)
    } else {
        name != class_name
    }
}

fn flag_boxes(
    names: &[String],
    boxes: impl Iterator<Item = Box3D>,
    bucket: Option<(f32, f32)>,
    class_name: &str,
    use_superclass: bool,
) -> Vec<Flag> {
    names
        .iter()
        .zip(boxes)
        .map(|(name, cuboid)| {
            // Out-of-bucket boxes are ignored whatever their class.
            if is_ignored(&cuboid, bucket) {
                Flag::Ignored
            } else if is_rejected(name, class_name, use_superclass) {
                Flag::Rejected
            } else {
                Flag::Accepted
            }
        })
        .collect_vec()
}

/// Flag the ground truth and predictions of a sample by class and difficulty.
pub fn filter_data(
    gt_anno: &GroundTruth,
    pred_anno: &Detections,
    difficulty_mode: DifficultyMode,
    difficulty_level: usize,
    class_name: &str,
    use_superclass: bool,
) -> Result<(Vec<Flag>, Vec<Flag>)> {
    let bucket = distance_bucket(difficulty_mode, difficulty_level)?;
    let gt_flag = flag_boxes(
        &gt_anno.name,
        gt_anno.boxes(),
        bucket,
        class_name,
        use_superclass,
    );
    let pred_flag = flag_boxes(
        &pred_anno.name,
        pred_anno.boxes(),
        bucket,
        class_name,
        use_superclass,
    );
    Ok((gt_flag, pred_flag))
}

/// Collect the scores of the true-positive matches of one sample.
///
/// Each ground truth takes the highest-scoring unassigned prediction above the IoU
/// threshold (first found on ties). Matches involving an ignored box are consumed but
/// their scores are not reported.
pub fn accumulate_scores(
    iou: &ArrayView2<f64>,
    pred_scores: &ArrayView1<f32>,
    gt_flag: &[Flag],
    pred_flag: &[Flag],
    iou_threshold: f64,
) -> Vec<f32> {
    let mut assigned = vec![false; pred_flag.len()];
    let mut accum_scores = vec![];
    for (i, &gt_flag_i) in gt_flag.iter().enumerate() {
        if gt_flag_i == Flag::Rejected {
            continue;
        }
        let mut detected: Option<(usize, f32)> = None;
        for (j, &pred_flag_j) in pred_flag.iter().enumerate() {
            if pred_flag_j == Flag::Rejected || assigned[j] {
                continue;
            }
            let score = pred_scores[j];
            if iou[[i, j]] > iou_threshold && detected.map_or(true, |(_, best)| score > best) {
                detected = Some((j, score));
            }
        }

        match detected {
            None => {}
            Some((j, _)) if gt_flag_i == Flag::Ignored || pred_flag[j] == Flag::Ignored => {
                assigned[j] = true;
            }
            Some((j, score)) => {
                accum_scores.push(score);
                assigned[j] = true;
            }
        }
    }
    accum_scores
}

/// Select score thresholds whose recalls are evenly spaced over [0, 1].
///
/// `scores` are the true-positive scores of every sample and `num_gt` the number of
/// accepted ground truths, which must be positive. At most `num_pr_points + 1`
/// thresholds are returned, in descending order; a score repeats when a single match
/// advances recall by more than one step.
pub fn get_thresholds(mut scores: Vec<f32>, num_gt: usize, num_pr_points: usize) -> Vec<f32> {
    scores.sort_by(|a, b| b.total_cmp(a));
    let num_gt = num_gt as f64;
    let step = 1.0 / num_pr_points as f64;
    let last = scores.len().saturating_sub(1);

    let mut recall_level = 0.0;
    let mut thresholds = vec![];
    for (i, &score) in scores.iter().enumerate() {
        let l_recall = (i + 1) as f64 / num_gt;
        let r_recall = if i < last {
            (i + 2) as f64 / num_gt
        } else {
            l_recall
        };
        if r_recall + l_recall < 2.0 * recall_level && i < last {
            continue;
        }
        thresholds.push(score);
        recall_level += step;
        // Slack keeps float drift in `recall_level` from skipping a level.
        while r_recall + l_recall + RECALL_EPS > 2.0 * recall_level {
            thresholds.push(score);
            recall_level += step;
        }
    }
    thresholds
}

/// Count true positives, false positives and false negatives of one sample at a score threshold.
///
/// Predictions scoring below `score_threshold` are not considered. Each ground truth
/// prefers the accepted prediction with the highest IoU; an ignored prediction is only
/// taken while nothing else matched, and is replaced by any later accepted match.
/// Matches involving an ignored box count as neither true nor false positives.
pub fn compute_statistics(
    iou: &ArrayView2<f64>,
    pred_scores: &ArrayView1<f32>,
    gt_flag: &[Flag],
    pred_flag: &[Flag],
    score_threshold: f32,
    iou_threshold: f64,
) -> Confusion {
    let under_threshold = pred_scores.mapv(|score| score < score_threshold);
    let mut assigned = vec![false; pred_flag.len()];
    let mut confusion = Confusion::default();

    for (i, &gt_flag_i) in gt_flag.iter().enumerate() {
        if gt_flag_i == Flag::Rejected {
            continue;
        }
        let mut det_idx: Option<usize> = None;
        let mut best_matched_iou = 0.0;
        let mut gt_assigned_to_ignore = false;

        for (j, &pred_flag_j) in pred_flag.iter().enumerate() {
            if pred_flag_j == Flag::Rejected || assigned[j] || under_threshold[j] {
                continue;
            }
            let iou_ij = iou[[i, j]];
            if iou_ij <= iou_threshold {
                continue;
            }
            match pred_flag_j {
                Flag::Accepted if iou_ij > best_matched_iou || gt_assigned_to_ignore => {
                    best_matched_iou = iou_ij;
                    det_idx = Some(j);
                    gt_assigned_to_ignore = false;
                }
                Flag::Ignored if det_idx.is_none() => {
                    det_idx = Some(j);
                    gt_assigned_to_ignore = true;
                }
                _ => {}
            }
        }

        match det_idx {
            None if gt_flag_i == Flag::Accepted => confusion.fn_ += 1,
            None => {}
            Some(j) if gt_flag_i == Flag::Ignored || pred_flag[j] == Flag::Ignored => {
                assigned[j] = true;
            }
            Some(j) => {
                confusion.tp += 1;
                assigned[j] = true;
            }
        }
    }

    confusion.fp = pred_flag
        .iter()
        .enumerate()
        .filter(|&(j, &flag)| flag == Flag::Accepted && !assigned[j] && !under_threshold[j])
        .count();
    confusion
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use super::{
        accumulate_scores, compute_split_parts, compute_statistics, distance_bucket, filter_data,
        get_thresholds, Confusion,
    };
    use crate::{
        evaluation::detection::constants::{
            DifficultyMode,
            Flag::{Accepted as A, Ignored as I, Rejected as R},
        },
        structures::annotation::{Detections, GroundTruth},
    };

    fn boxes_at(xs: &[f32]) -> Array2<f32> {
        let mut boxes = Array2::<f32>::zeros((xs.len(), 7));
        for (mut row, &x) in boxes.rows_mut().into_iter().zip(xs) {
            row.assign(&array![x, 0., 0., 2., 4., 1.5, 0.]);
        }
        boxes
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compute_split_parts() {
        assert_eq!(compute_split_parts(10, 100).unwrap(), vec![10]);
        assert_eq!(compute_split_parts(300, 100).unwrap(), vec![3; 100]);
        let parts = compute_split_parts(205, 100).unwrap();
        assert_eq!(parts.len(), 101);
        assert_eq!(parts[100], 5);
        assert_eq!(parts.iter().sum::<usize>(), 205);
        assert!(compute_split_parts(10, 0).is_err());
    }

    #[test]
    fn test_distance_buckets() {
        assert_eq!(distance_bucket(DifficultyMode::Overall, 0).unwrap(), None);
        assert_eq!(
            distance_bucket(DifficultyMode::Distance, 1).unwrap(),
            Some((30.0, 50.0))
        );
        assert_eq!(
            distance_bucket(DifficultyMode::OverallDistance, 1).unwrap(),
            Some((0.0, 30.0))
        );
        assert!(distance_bucket(DifficultyMode::Distance, 3).is_err());
        assert!(distance_bucket(DifficultyMode::Overall, 1).is_err());
    }

    #[test]
    fn test_filter_data_flags() {
        let gt = GroundTruth::new(
            names(&["Car", "Pedestrian", "Truck", "Car"]),
            boxes_at(&[10., 10., 40., 60.]),
        )
        .unwrap();
        let pred = Detections::new(
            names(&["Bus", "Cyclist"]),
            boxes_at(&[35., 5.]),
            array![0.9, 0.8],
        )
        .unwrap();

        let (gt_flag, pred_flag) =
            filter_data(&gt, &pred, DifficultyMode::Overall, 0, "Car", false).unwrap();
        assert_eq!(gt_flag, vec![A, R, R, A]);
        assert_eq!(pred_flag, vec![R, R]);

        let (gt_flag, pred_flag) =
            filter_data(&gt, &pred, DifficultyMode::OverallDistance, 2, "Vehicle", true).unwrap();
        assert_eq!(gt_flag, vec![I, I, A, I]);
        assert_eq!(pred_flag, vec![A, I]);

        let (gt_flag, _) =
            filter_data(&gt, &pred, DifficultyMode::Distance, 2, "Car", false).unwrap();
        assert_eq!(gt_flag, vec![I, I, I, A]);
    }

    #[test]
    fn test_accumulate_scores_prefers_highest_score() {
        let iou = array![[0.8, 0.9, 0.1], [0.0, 0.75, 0.0]];
        let scores = array![0.9f32, 0.6, 0.99];
        let tp_scores = accumulate_scores(&iou.view(), &scores.view(), &[A, A], &[A, A, A], 0.7);
        // GT 0 takes prediction 0 (0.9 beats 0.6); GT 1 then takes prediction 1.
        assert_eq!(tp_scores, vec![0.9, 0.6]);
    }

    #[test]
    fn test_accumulate_scores_skips_ignored_matches() {
        let iou = array![[0.8, 0.0], [0.0, 0.9]];
        let scores = array![0.9f32, 0.8];
        let tp_scores = accumulate_scores(&iou.view(), &scores.view(), &[I, A], &[A, I], 0.7);
        assert!(tp_scores.is_empty());
        let tp_scores = accumulate_scores(&iou.view(), &scores.view(), &[R, A], &[A, A], 0.7);
        assert_eq!(tp_scores, vec![0.8]);
    }

    #[test]
    fn test_get_thresholds_single_match() {
        let thresholds = get_thresholds(vec![0.9], 1, 50);
        assert_eq!(thresholds.len(), 51);
        assert!(thresholds.iter().all(|&t| t == 0.9));
    }

    #[test]
    fn test_get_thresholds_even_recall() {
        let scores = vec![0.1, 0.4, 0.3, 0.2];
        let thresholds = get_thresholds(scores, 4, 4);
        assert_eq!(thresholds, vec![0.4, 0.4, 0.3, 0.2, 0.1]);
        assert!(thresholds.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_get_thresholds_partial_recall() {
        // Two of four ground truths matched: recall never passes 0.5.
        let thresholds = get_thresholds(vec![0.8, 0.5], 4, 4);
        assert_eq!(thresholds, vec![0.8, 0.8, 0.5]);
        assert!(get_thresholds(vec![], 4, 4).is_empty());
    }

    #[test]
    fn test_compute_statistics_counts() {
        let iou = array![[0.9, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let scores = array![0.9f32, 0.8, 0.2];
        let confusion =
            compute_statistics(&iou.view(), &scores.view(), &[A, A], &[A, A, A], 0.5, 0.7);
        assert_eq!(
            confusion,
            Confusion {
                tp: 1,
                fp: 1,
                fn_: 1
            }
        );
        // Ignored and rejected predictions are never false positives.
        let confusion =
            compute_statistics(&iou.view(), &scores.view(), &[A, A], &[A, I, R], 0.0, 0.7);
        assert_eq!(confusion.fp, 0);
    }

    #[test]
    fn test_compute_statistics_replaces_ignored_match() {
        // Prediction 0 is ignored and matched first; accepted prediction 1 with lower IoU replaces it.
        let iou = array![[0.95, 0.8]];
        let scores = array![0.9f32, 0.9];
        let confusion = compute_statistics(&iou.view(), &scores.view(), &[A], &[I, A], 0.0, 0.7);
        assert_eq!(
            confusion,
            Confusion {
                tp: 1,
                fp: 0,
                fn_: 0
            }
        );
    }

    #[test]
    fn test_compute_statistics_ignored_gt() {
        let iou = array![[0.9]];
        let scores = array![0.9f32];
        let confusion = compute_statistics(&iou.view(), &scores.view(), &[I], &[A], 0.0, 0.7);
        assert_eq!(confusion, Confusion::default());
    }
}
