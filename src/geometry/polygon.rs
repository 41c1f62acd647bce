//! # polygon
//!
//! Convex polygon algorithms for rotated bird's-eye-view rectangles.

use crate::structures::annotation::Box3D;

/// Planar point.
pub type Point = [f64; 2];

/// Unit rectangle corners in counter-clockwise order, scaled by the half extents.
const UNIT_CORNERS: [Point; 4] = [[-1., -1.], [1., -1.], [1., 1.], [-1., 1.]];

/// Signed area threshold below which a polygon is treated as empty.
const AREA_EPS: f64 = 1e-12;

/// Bird's-eye-view corners of a box, counter-clockwise.
///
/// `width` spans the local x axis and `length` the local y axis. The local frame is
/// rotated by `yaw` with `x' = cos * x + sin * y`, `y' = -sin * x + cos * y`, which
/// preserves the winding order.
pub fn bev_corners(cuboid: &Box3D) -> [Point; 4] {
    let (half_w, half_l) = (cuboid.width as f64 * 0.5, cuboid.length as f64 * 0.5);
    let (sin, cos) = (cuboid.yaw as f64).sin_cos();
    let (cx, cy) = (cuboid.x as f64, cuboid.y as f64);
    UNIT_CORNERS.map(|[u, v]| {
        let (x, y) = (u * half_w, v * half_l);
        [cos * x + sin * y + cx, -sin * x + cos * y + cy]
    })
}

/// Shoelace area of a simple polygon. Positive for counter-clockwise winding.
pub fn signed_area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let twice_area: f64 = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(p, q)| p[0] * q[1] - q[0] * p[1])
        .sum();
    0.5 * twice_area
}

/// Cross product of `b - a` and `p - a`.
fn cross(a: &Point, b: &Point, p: &Point) -> f64 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Intersection of segment `p -> q` with the infinite line through `a` and `b`.
fn line_intersection(p: &Point, q: &Point, a: &Point, b: &Point) -> Point {
    let cp = cross(a, b, p);
    let cq = cross(a, b, q);
    let t = cp / (cp - cq);
    [p[0] + t * (q[0] - p[0]), p[1] + t * (q[1] - p[1])]
}

/// Clip `subject` against the convex, counter-clockwise `clip` polygon (Sutherland-Hodgman).
pub fn clip_convex(subject: &[Point], clip: &[Point]) -> Vec<Point> {
    let mut output = subject.to_vec();
    for (a, b) in clip.iter().zip(clip.iter().cycle().skip(1)) {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        for (p, q) in input.iter().zip(input.iter().cycle().skip(1)) {
            let p_inside = cross(a, b, p) >= 0.0;
            let q_inside = cross(a, b, q) >= 0.0;
            match (p_inside, q_inside) {
                (true, true) => output.push(*q),
                (true, false) => output.push(line_intersection(p, q, a, b)),
                (false, true) => {
                    output.push(line_intersection(p, q, a, b));
                    output.push(*q);
                }
                (false, false) => {}
            }
        }
    }
    output
}

/// Area of the intersection of two rotated bird's-eye-view rectangles.
pub fn bev_intersection_area(a: &Box3D, b: &Box3D) -> f64 {
    let corners_a = bev_corners(a);
    let corners_b = bev_corners(b);
    if signed_area(&corners_a) < AREA_EPS || signed_area(&corners_b) < AREA_EPS {
        return 0.0;
    }
    let intersection = clip_convex(&corners_a, &corners_b);
    signed_area(&intersection).max(0.0)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_4;

    use super::{bev_corners, bev_intersection_area, clip_convex, signed_area};
    use crate::structures::annotation::Box3D;

    fn cuboid(x: f32, y: f32, width: f32, length: f32, yaw: f32) -> Box3D {
        Box3D {
            x,
            y,
            z: 0.,
            width,
            length,
            height: 1.,
            yaw,
        }
    }

    #[test]
    fn test_corners_are_counter_clockwise() {
        for yaw in [0.0, 0.7, -2.1, 3.0] {
            let corners = bev_corners(&cuboid(3., -1., 2., 4., yaw));
            assert!((signed_area(&corners) - 8.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_clip_disjoint_is_empty() {
        let a = bev_corners(&cuboid(0., 0., 1., 1., 0.));
        let b = bev_corners(&cuboid(5., 5., 1., 1., 0.));
        assert!(clip_convex(&a, &b).is_empty());
    }

    #[test]
    fn test_axis_aligned_overlap() {
        let a = cuboid(0., 0., 2., 2., 0.);
        let b = cuboid(1., 1., 2., 2., 0.);
        assert!((bev_intersection_area(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotated_square_inside_square() {
        // Diamond of side sqrt(2) centered in a 2x2 square.
        let outer = cuboid(0., 0., 2., 2., 0.);
        let inner = cuboid(0., 0., 2f32.sqrt(), 2f32.sqrt(), FRAC_PI_4);
        let area = bev_intersection_area(&outer, &inner);
        assert!((area - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_box_has_no_area() {
        let a = cuboid(0., 0., 0., 2., 0.);
        let b = cuboid(0., 0., 2., 2., 0.);
        assert_eq!(bev_intersection_area(&a, &b), 0.0);
    }
}
