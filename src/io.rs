//! # io
//!
//! Reading annotation collections and writing evaluation outputs.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use itertools::izip;
use ndarray::{Array1, Array2};
use polars::prelude::{DataFrame, DataType, IpcReader, SerReader};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{BOX_COLUMNS, BOX_DIM, NAME_COLUMN, SAMPLE_ID_COLUMN, SCORE_COLUMN},
    error::{EvalError, Result},
    path::{annotation_format, AnnotationFormat},
    structures::annotation::{Detections, GroundTruth},
};

/// Boxes of a single sample as stored on disk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Sample identifier used to pair ground truth with predictions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<String>,
    /// (N,) class names.
    pub name: Vec<String>,
    /// (N,) cuboids as `x, y, z, width, length, height, yaw`.
    pub boxes_3d: Vec<[f32; BOX_DIM]>,
    /// (N,) confidences; empty for ground truth.
    #[serde(default)]
    pub score: Vec<f32>,
}

impl AnnotationRecord {
    fn boxes_array(&self) -> Result<Array2<f32>> {
        let flat = self.boxes_3d.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.boxes_3d.len(), BOX_DIM), flat)
            .map_err(|err| EvalError::ShapeMismatch(err.to_string()))
    }

    /// Convert into a ground-truth annotation. Scores are ignored.
    pub fn into_ground_truth(self) -> Result<GroundTruth> {
        let boxes_3d = self.boxes_array()?;
        GroundTruth::new(self.name, boxes_3d)
    }

    /// Convert into a prediction annotation.
    pub fn into_detections(self) -> Result<Detections> {
        let boxes_3d = self.boxes_array()?;
        Detections::new(self.name, boxes_3d, Array1::from_vec(self.score))
    }
}

/// Read a feather file and load into a `polars` dataframe.
pub fn read_feather(path: &Path, memory_mapped: bool) -> Result<DataFrame> {
    let file = File::open(path)?;
    let frame = IpcReader::new(file)
        .memory_mapped(memory_mapped)
        .finish()?;
    Ok(frame)
}

fn f32_column(frame: &DataFrame, name: &str) -> Result<Vec<f32>> {
    let series = frame.column(name)?.cast(&DataType::Float32)?;
    let values = series
        .f32()?
        .into_iter()
        .map(|value| {
            value.ok_or_else(|| EvalError::ShapeMismatch(format!("null value in `{name}`")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(values)
}

fn str_column(frame: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = frame.column(name)?.cast(&DataType::Utf8)?;
    let values = series
        .utf8()?
        .into_iter()
        .map(|value| {
            value
                .map(str::to_string)
                .ok_or_else(|| EvalError::ShapeMismatch(format!("null value in `{name}`")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(values)
}

/// Group a box-per-row annotation table into per-sample records, ordered by `sample_id`.
pub fn frame_to_records(frame: &DataFrame) -> Result<Vec<AnnotationRecord>> {
    let sample_ids = str_column(frame, SAMPLE_ID_COLUMN)?;
    let names = str_column(frame, NAME_COLUMN)?;
    let columns = BOX_COLUMNS
        .iter()
        .map(|column| f32_column(frame, column))
        .collect::<Result<Vec<_>>>()?;
    let scores = match frame.column(SCORE_COLUMN) {
        Ok(_) => Some(f32_column(frame, SCORE_COLUMN)?),
        Err(_) => None,
    };

    let mut records: BTreeMap<String, AnnotationRecord> = BTreeMap::new();
    for (row, (sample_id, name)) in izip!(sample_ids, names).enumerate() {
        let mut cuboid = [0f32; BOX_DIM];
        for (value, column) in cuboid.iter_mut().zip(&columns) {
            *value = column[row];
        }
        let record = records
            .entry(sample_id.clone())
            .or_insert_with(|| AnnotationRecord {
                sample_id: Some(sample_id),
                ..Default::default()
            });
        record.name.push(name);
        record.boxes_3d.push(cuboid);
        if let Some(scores) = &scores {
            record.score.push(scores[row]);
        }
    }
    Ok(records.into_values().collect())
}

/// Read per-sample annotation records from a JSON or Arrow IPC file.
pub fn read_records(path: &Path) -> Result<Vec<AnnotationRecord>> {
    let records = match annotation_format(path)? {
        AnnotationFormat::Json => {
            let reader = BufReader::new(File::open(path)?);
            serde_json::from_reader(reader)?
        }
        AnnotationFormat::Ipc => frame_to_records(&read_feather(path, false)?)?,
    };
    debug!("Read {} samples from {}.", records.len(), path.display());
    Ok(records)
}

/// Align ground truth with predictions.
///
/// When every record carries a `sample_id`, samples are matched by identifier in
/// lexicographic order and a sample missing on either side becomes an empty annotation.
/// Otherwise records are paired by position.
pub fn pair_samples(
    gt_records: Vec<AnnotationRecord>,
    pred_records: Vec<AnnotationRecord>,
) -> Result<(Vec<GroundTruth>, Vec<Detections>)> {
    let keyed = gt_records
        .iter()
        .chain(&pred_records)
        .all(|record| record.sample_id.is_some());
    if !keyed {
        if gt_records.len() != pred_records.len() {
            return Err(EvalError::SampleCountMismatch {
                ground_truth: gt_records.len(),
                predictions: pred_records.len(),
            });
        }
        let gt_annos = gt_records
            .into_iter()
            .map(AnnotationRecord::into_ground_truth)
            .collect::<Result<Vec<_>>>()?;
        let pred_annos = pred_records
            .into_iter()
            .map(AnnotationRecord::into_detections)
            .collect::<Result<Vec<_>>>()?;
        return Ok((gt_annos, pred_annos));
    }

    let mut samples: BTreeMap<String, (Option<AnnotationRecord>, Option<AnnotationRecord>)> =
        BTreeMap::new();
    for record in gt_records {
        let sample_id = record.sample_id.clone().unwrap_or_default();
        samples.entry(sample_id).or_default().0 = Some(record);
    }
    for record in pred_records {
        let sample_id = record.sample_id.clone().unwrap_or_default();
        samples.entry(sample_id).or_default().1 = Some(record);
    }

    let mut gt_annos = Vec::with_capacity(samples.len());
    let mut pred_annos = Vec::with_capacity(samples.len());
    for (sample_id, (gt_record, pred_record)) in samples {
        if gt_record.is_none() {
            warn!("Sample `{sample_id}` has predictions but no ground truth.");
        }
        gt_annos.push(match gt_record {
            Some(record) => record.into_ground_truth()?,
            None => GroundTruth::empty(),
        });
        pred_annos.push(match pred_record {
            Some(record) => record.into_detections()?,
            None => Detections::empty(),
        });
    }
    Ok((gt_annos, pred_annos))
}

/// Write a value as pretty-printed JSON. Non-finite floats are written as `null`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}
