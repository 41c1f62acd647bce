use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::{
    constants::BOX_DIM,
    error::{EvalError, Result},
};

/// Cuboid parameterized by its center, extents and rotation about +z.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Box3D {
    /// Center x (m).
    pub x: f32,
    /// Center y (m).
    pub y: f32,
    /// Center z (m).
    pub z: f32,
    /// Extent along the box's local x axis (m).
    pub width: f32,
    /// Extent along the box's local y axis (m).
    pub length: f32,
    /// Extent along z (m).
    pub height: f32,
    /// Rotation about +z (rad).
    pub yaw: f32,
}

impl Box3D {
    /// Build a box from a row of an `(N,7)` array.
    pub fn from_row(row: &ArrayView1<f32>) -> Self {
        Self {
            x: row[0],
            y: row[1],
            z: row[2],
            width: row[3],
            length: row[4],
            height: row[5],
            yaw: row[6],
        }
    }

    /// Row representation, in `BOX_COLUMNS` order.
    pub fn to_row(&self) -> [f32; BOX_DIM] {
        [
            self.x,
            self.y,
            self.z,
            self.width,
            self.length,
            self.height,
            self.yaw,
        ]
    }

    /// Euclidean distance of the center from the origin.
    pub fn range_m(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Box volume.
    pub fn volume(&self) -> f64 {
        self.width as f64 * self.length as f64 * self.height as f64
    }
}

/// Stack boxes into an `(N,7)` array.
pub fn boxes_to_array(boxes: &[Box3D]) -> Array2<f32> {
    let mut arr = Array2::<f32>::zeros((boxes.len(), BOX_DIM));
    for (mut row, b) in arr.rows_mut().into_iter().zip(boxes) {
        row.assign(&ArrayView1::from(&b.to_row()[..]));
    }
    arr
}

fn check_boxes(boxes_3d: &Array2<f32>, num_names: usize) -> Result<()> {
    if boxes_3d.ncols() != BOX_DIM {
        return Err(EvalError::ShapeMismatch(format!(
            "boxes_3d must have {BOX_DIM} columns, found {}",
            boxes_3d.ncols()
        )));
    }
    if boxes_3d.nrows() != num_names {
        return Err(EvalError::ShapeMismatch(format!(
            "{} names for {} boxes",
            num_names,
            boxes_3d.nrows()
        )));
    }
    Ok(())
}

/// Ground-truth boxes of a single sample.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundTruth {
    /// (N,) class names.
    pub name: Vec<String>,
    /// (N,7) cuboids.
    pub boxes_3d: Array2<f32>,
}

impl GroundTruth {
    /// Construct and validate a ground-truth annotation.
    pub fn new(name: Vec<String>, boxes_3d: Array2<f32>) -> Result<Self> {
        check_boxes(&boxes_3d, name.len())?;
        Ok(Self { name, boxes_3d })
    }

    /// Annotation without any boxes.
    pub fn empty() -> Self {
        Self {
            name: vec![],
            boxes_3d: Array2::zeros((0, BOX_DIM)),
        }
    }

    /// Number of boxes.
    pub fn len(&self) -> usize {
        self.name.len()
    }

    /// Whether the sample has no boxes.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Iterate over the boxes.
    pub fn boxes(&self) -> impl Iterator<Item = Box3D> + '_ {
        self.boxes_3d.axis_iter(Axis(0)).map(|r| Box3D::from_row(&r))
    }
}

/// Scored predictions of a single sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Detections {
    /// (M,) class names.
    pub name: Vec<String>,
    /// (M,7) cuboids.
    pub boxes_3d: Array2<f32>,
    /// (M,) confidences.
    pub score: Array1<f32>,
}

impl Detections {
    /// Construct and validate a prediction annotation.
    pub fn new(name: Vec<String>, boxes_3d: Array2<f32>, score: Array1<f32>) -> Result<Self> {
        check_boxes(&boxes_3d, name.len())?;
        if score.len() != name.len() {
            return Err(EvalError::ShapeMismatch(format!(
                "{} scores for {} predictions",
                score.len(),
                name.len()
            )));
        }
        Ok(Self {
            name,
            boxes_3d,
            score,
        })
    }

    /// Annotation without any boxes.
    pub fn empty() -> Self {
        Self {
            name: vec![],
            boxes_3d: Array2::zeros((0, BOX_DIM)),
            score: Array1::zeros(0),
        }
    }

    /// Number of boxes.
    pub fn len(&self) -> usize {
        self.name.len()
    }

    /// Whether the sample has no boxes.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Iterate over the boxes.
    pub fn boxes(&self) -> impl Iterator<Item = Box3D> + '_ {
        self.boxes_3d.axis_iter(Axis(0)).map(|r| Box3D::from_row(&r))
    }
}
