//! Dataset assembly: reduce per-segment feature matrices to fixed-length
//! statistical summaries and label them against reference scores.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::features::{FeatureMatrix, SegmentFeatures};

/// Per-file, per-extractor segment features, keyed deterministically.
pub type FileFeatures = BTreeMap<String, BTreeMap<String, Vec<SegmentFeatures>>>;

/// A labeled training dataset: one row per (file, extractor, segment).
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
    /// Files present in the feature data but absent from the score map
    pub skipped_files: usize,
}

/// Reduce a per-frame feature matrix to `mean ‖ std` across the frame axis.
///
/// Length is `2 × n_dims`; the standard deviation is the population form.
pub fn summarize(matrix: &FeatureMatrix) -> Array1<f64> {
    let n_dims = matrix.len_of(Axis(1));
    let n_frames = matrix.len_of(Axis(0));
    let mut summary = Array1::zeros(2 * n_dims);
    if n_frames == 0 {
        return summary;
    }
    for dim in 0..n_dims {
        let column = matrix.index_axis(Axis(1), dim);
        let mean = column.sum() / n_frames as f64;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_frames as f64;
        summary[dim] = mean;
        summary[n_dims + dim] = variance.sqrt();
    }
    summary
}

/// Assemble `(X, y, feature_names)` from per-file segment features and a
/// `file_id -> score` map.
///
/// Files missing a reference score are skipped and counted. Every segment of
/// every extractor contributes one row carrying the file's single score.
/// Feature names are derived once, from the first encountered matrix; any
/// later summary of a different length fails with a data-mismatch error
/// instead of silently misaligning columns.
pub fn build_dataset(features: &FileFeatures, scores: &BTreeMap<String, f64>) -> Result<Dataset> {
    let mut rows: Vec<Array1<f64>> = Vec::new();
    let mut labels: Vec<f64> = Vec::new();
    let mut feature_names: Vec<String> = Vec::new();
    let mut skipped_files = 0;

    for (file_id, extractors) in features {
        let score = match scores.get(file_id) {
            Some(score) => *score,
            None => {
                skipped_files += 1;
                debug!(file_id = %file_id, "no reference score; skipping file");
                continue;
            }
        };

        for (extractor_name, segments) in extractors {
            for segment in segments {
                let summary = summarize(&segment.matrix);
                if feature_names.is_empty() {
                    let width = summary.len() / 2;
                    for i in 0..width {
                        feature_names.push(format!("{}_mean_{}", extractor_name, i));
                    }
                    for i in 0..width {
                        feature_names.push(format!("{}_std_{}", extractor_name, i));
                    }
                } else if summary.len() != feature_names.len() {
                    return Err(Error::DataMismatch {
                        file_id: file_id.clone(),
                        expected: feature_names.len(),
                        actual: summary.len(),
                    });
                }
                rows.push(summary);
                labels.push(score);
            }
        }
    }

    let width = feature_names.len();
    let mut flat = Vec::with_capacity(rows.len() * width);
    for row in &rows {
        flat.extend(row.iter().copied());
    }
    let x = Array2::from_shape_vec((rows.len(), width), flat).expect("uniform row width");
    Ok(Dataset {
        x,
        y: Array1::from_vec(labels),
        feature_names,
        skipped_files,
    })
}

/// Seeded shuffled holdout split. Returns `(x_train, x_test, y_train,
/// y_test)`; the test partition holds `round(n × test_size)` rows.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> (Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>) {
    let n = x.len_of(Axis(0));
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_size).round() as usize).min(n);
    let (test_idx, train_idx) = indices.split_at(n_test);

    (
        x.select(Axis(0), train_idx),
        x.select(Axis(0), test_idx),
        y.select(Axis(0), train_idx),
        y.select(Axis(0), test_idx),
    )
}
