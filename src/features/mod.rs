//! Acoustic feature extraction over voice-active segments.

mod delta;
mod mfcc;
mod spectral;

use ndarray::Array2;

pub use mfcc::MfccExtractor;
pub use spectral::SpectralExtractor;

use crate::types::Interval;

/// One row per analysis frame, one column per feature dimension.
pub type FeatureMatrix = Array2<f64>;

/// Features for a single voice-active segment plus its duration in seconds.
#[derive(Debug, Clone)]
pub struct SegmentFeatures {
    pub matrix: FeatureMatrix,
    pub duration: f64,
}

/// Per-frame acoustic feature computation over a waveform span.
///
/// Implementations are constructed (and validated) once per stack through the
/// component registry and hold no per-call state.
pub trait FeatureExtractor {
    /// Registry key, also used to derive dataset feature names.
    fn name(&self) -> &str;

    /// Output width: base width times (1 + delta + delta-delta).
    fn feature_dimension(&self) -> usize;

    /// Shortest sample span the extractor can analyze (one window).
    fn min_samples(&self) -> usize;

    /// Sample rate the extractor was configured for.
    fn sample_rate(&self) -> u32;

    /// Compute the per-frame feature matrix for one contiguous span.
    fn extract(&self, samples: &[f32]) -> FeatureMatrix;

    /// Extract features for each interval of a waveform.
    ///
    /// Intervals whose sample span is shorter than one analysis window are
    /// silently skipped; callers observe the skip through the shorter output.
    fn extract_from_segments(
        &self,
        samples: &[f32],
        intervals: &[Interval],
    ) -> Vec<SegmentFeatures> {
        let sr = self.sample_rate() as f64;
        let mut features = Vec::new();
        for interval in intervals {
            let start = ((interval.start * sr) as usize).min(samples.len());
            let end = ((interval.end * sr) as usize).min(samples.len());
            let span = &samples[start..end];
            if span.len() < self.min_samples() {
                continue;
            }
            features.push(SegmentFeatures {
                matrix: self.extract(span),
                duration: interval.duration(),
            });
        }
        features
    }
}

pub(crate) fn matrix_from_rows(rows: &[Vec<f64>]) -> FeatureMatrix {
    if rows.is_empty() {
        return Array2::zeros((0, 0));
    }
    let n_rows = rows.len();
    let n_cols = rows[0].len();
    let mut flat = Vec::with_capacity(n_rows * n_cols);
    for row in rows {
        flat.extend(row.iter().copied());
    }
    Array2::from_shape_vec((n_rows, n_cols), flat).expect("rectangular spectrogram")
}

/// Pre-emphasis filter `y[t] = x[t] - k * x[t-1]`, `y[0] = x[0]`.
pub(crate) fn preemphasis(samples: &[f32], k: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    let mut previous = 0.0_f64;
    for (i, sample) in samples.iter().enumerate() {
        let current = *sample as f64;
        if i == 0 {
            out.push(current);
        } else {
            out.push(current - k * previous);
        }
        previous = current;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn preemphasis_keeps_first_sample() {
        let out = preemphasis(&[1.0, 1.0, 1.0], 0.97);
        assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1], 0.03, epsilon = 1e-9);
        assert_abs_diff_eq!(out[2], 0.03, epsilon = 1e-9);
    }

    #[test]
    fn matrix_from_rows_preserves_shape() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let matrix = matrix_from_rows(&rows);
        assert_eq!(matrix.shape(), &[3, 2]);
        assert_eq!(matrix[[2, 1]], 6.0);
    }
}
