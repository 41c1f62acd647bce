//! # iou
//!
//! Rotated 3D intersection-over-union.

use std::f64::consts::FRAC_PI_2;

use ndarray::{par_azip, Array2, ArrayView2};

use super::{
    polygon::bev_intersection_area,
    utils::{interval_overlap, wrapped_angle_diff},
};
use crate::structures::annotation::Box3D;

/// Volume of the intersection of two cuboids rotated about +z.
pub fn intersection_volume(a: &Box3D, b: &Box3D) -> f64 {
    let (a_z, a_h) = (a.z as f64, a.height as f64 * 0.5);
    let (b_z, b_h) = (b.z as f64, b.height as f64 * 0.5);
    let overlap_h = interval_overlap(a_z - a_h, a_z + a_h, b_z - b_h, b_z + b_h);
    if overlap_h == 0.0 {
        return 0.0;
    }
    bev_intersection_area(a, b) * overlap_h
}

/// 3D IoU of two cuboids.
///
/// When `with_heading` is set, pairs whose wrapped yaw difference exceeds pi/2 score zero.
/// Pairs with an empty union also score zero.
pub fn iou3d(a: &Box3D, b: &Box3D, with_heading: bool) -> f64 {
    if with_heading && wrapped_angle_diff(a.yaw as f64, b.yaw as f64) > FRAC_PI_2 {
        return 0.0;
    }
    let intersection = intersection_volume(a, b);
    let union = a.volume() + b.volume() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
}

/// Pairwise 3D IoU between `(N,7)` ground-truth and `(M,7)` predicted cuboids.
/// Parallelized over ground-truth rows.
pub fn iou3d_matrix(
    gt_boxes: &ArrayView2<f32>,
    pred_boxes: &ArrayView2<f32>,
    with_heading: bool,
) -> Array2<f64> {
    let preds: Vec<Box3D> = pred_boxes
        .rows()
        .into_iter()
        .map(|row| Box3D::from_row(&row))
        .collect();
    let mut ious = Array2::<f64>::zeros((gt_boxes.nrows(), preds.len()));
    par_azip!((mut iou_i in ious.rows_mut(), gt_i in gt_boxes.rows()) {
        let gt = Box3D::from_row(&gt_i);
        for (iou_ij, pred) in iou_i.iter_mut().zip(&preds) {
            *iou_ij = iou3d(&gt, pred, with_heading);
        }
    });
    ious
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use ndarray::array;

    use super::{iou3d, iou3d_matrix};
    use crate::structures::annotation::Box3D;

    fn car(x: f32, yaw: f32) -> Box3D {
        Box3D {
            x,
            y: 0.,
            z: 0.,
            width: 2.,
            length: 4.,
            height: 1.5,
            yaw,
        }
    }

    #[test]
    fn test_self_iou_is_one() {
        let b = car(3., 0.4);
        assert!((iou3d(&b, &b, true) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_half_shift_iou() {
        // Shift by half the width: intersection 1x4x1.5 = 6, union 24 - 6 = 18.
        let iou = iou3d(&car(0., 0.), &car(1., 0.), false);
        assert!((iou - 1. / 3.).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_offset() {
        let a = car(0., 0.);
        let mut b = a;
        b.z = 0.75;
        // Height overlap 0.75: intersection 6, union 24 - 6 = 18.
        assert!((iou3d(&a, &b, false) - 1. / 3.).abs() < 1e-9);
        b.z = 2.0;
        assert_eq!(iou3d(&a, &b, false), 0.0);
    }

    #[test]
    fn test_heading_cutoff() {
        let a = car(0., 0.);
        let flipped = car(0., PI);
        assert!(iou3d(&a, &flipped, false) > 0.99);
        assert_eq!(iou3d(&a, &flipped, true), 0.0);
        let turned = car(0., 1.2);
        assert!(iou3d(&a, &turned, true) > 0.0);
    }

    #[test]
    fn test_matrix_shape_and_values() {
        let gts = array![[0., 0., 0., 2., 4., 1.5, 0.], [20., 0., 0., 2., 4., 1.5, 0.]];
        let preds = array![
            [0., 0., 0., 2., 4., 1.5, 0.],
            [1., 0., 0., 2., 4., 1.5, 0.],
            [50., 0., 0., 2., 4., 1.5, 0.]
        ];
        let ious = iou3d_matrix(&gts.view(), &preds.view(), true);
        assert_eq!(ious.shape(), &[2, 3]);
        assert!((ious[[0, 0]] - 1.0).abs() < 1e-9);
        assert!((ious[[0, 1]] - 1. / 3.).abs() < 1e-9);
        assert_eq!(ious[[1, 2]], 0.0);
        assert_eq!(ious.row(1).sum(), 0.0);
    }
}
