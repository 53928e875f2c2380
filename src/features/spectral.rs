use aus::analysis;
use aus::spectrum;
use aus::WindowType;
use ndarray::{concatenate, Axis};

use super::delta::delta_matrix;
use super::{preemphasis, FeatureExtractor, FeatureMatrix};
use crate::error::{Error, Result};
use crate::types::FeatureParams;

const DELTA_WINDOW: usize = 2;
/// Per-frame energy and spectral flux
const SPECTRAL_BASE: usize = 2;

/// Broadband spectral-shape features: per-frame energy and spectral flux.
///
/// A cheap complement to [`super::MfccExtractor`] when a stack wants a second
/// feature view of the same segments.
pub struct SpectralExtractor {
    sample_rate: u32,
    params: FeatureParams,
    fft_size: usize,
    hop_size: usize,
}

impl SpectralExtractor {
    pub fn new(sample_rate: u32, params: FeatureParams) -> Result<Self> {
        params.validate()?;
        if sample_rate == 0 {
            return Err(Error::configuration("sample_rate", "must be non-zero"));
        }
        let fft_size = ((sample_rate as f64 * params.window_secs) as usize).max(1);
        let hop_size = ((sample_rate as f64 * params.hop_secs) as usize).max(1);
        Ok(Self {
            sample_rate,
            params,
            fft_size,
            hop_size,
        })
    }
}

impl FeatureExtractor for SpectralExtractor {
    fn name(&self) -> &str {
        "spectral"
    }

    fn feature_dimension(&self) -> usize {
        let channels =
            1 + self.params.include_delta as usize + self.params.include_delta_delta as usize;
        SPECTRAL_BASE * channels
    }

    fn min_samples(&self) -> usize {
        self.fft_size
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn extract(&self, samples: &[f32]) -> FeatureMatrix {
        if samples.len() < self.fft_size {
            return FeatureMatrix::zeros((0, self.feature_dimension()));
        }

        let audio_f64 = if self.params.preemphasis > 0.0 {
            preemphasis(samples, self.params.preemphasis)
        } else {
            samples.iter().map(|&s| s as f64).collect()
        };

        let stft = spectrum::rstft(&audio_f64, self.fft_size, self.hop_size, WindowType::Hanning);
        let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
        let power = analysis::make_power_spectrogram(&magnitude);

        let mut base = FeatureMatrix::zeros((magnitude.len(), SPECTRAL_BASE));
        for (t, frame) in power.iter().enumerate() {
            base[[t, 0]] = frame.iter().sum::<f64>().sqrt();
        }
        for t in 1..magnitude.len() {
            let mut sum = 0.0;
            for (curr, prev) in magnitude[t].iter().zip(magnitude[t - 1].iter()) {
                let diff = (curr - prev).max(0.0);
                sum += diff * diff;
            }
            base[[t, 1]] = sum.sqrt();
        }

        let mut channels = vec![base];
        if self.params.include_delta || self.params.include_delta_delta {
            let delta = delta_matrix(&channels[0], DELTA_WINDOW);
            if self.params.include_delta_delta {
                let delta_delta = delta_matrix(&delta, DELTA_WINDOW);
                if self.params.include_delta {
                    channels.push(delta);
                }
                channels.push(delta_delta);
            } else {
                channels.push(delta);
            }
        }

        let views: Vec<_> = channels.iter().map(|c| c.view()).collect();
        concatenate(Axis(1), &views).expect("channels share the frame axis")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;
    use ndarray::Axis;

    fn extractor() -> SpectralExtractor {
        SpectralExtractor::new(16_000, FeatureParams::default()).unwrap()
    }

    #[test]
    fn dimension_follows_channel_count() {
        let ex = extractor();
        assert_eq!(ex.feature_dimension(), 6);

        let narrow = SpectralExtractor::new(
            16_000,
            FeatureParams {
                include_delta: false,
                include_delta_delta: false,
                ..FeatureParams::default()
            },
        )
        .unwrap();
        assert_eq!(narrow.feature_dimension(), 2);
    }

    #[test]
    fn short_segments_are_skipped() {
        let ex = extractor();
        let samples = vec![0.3_f32; 16_000];
        // second interval spans ~8 ms, below the 25 ms analysis window
        let intervals = vec![Interval::new(0.0, 0.5), Interval::new(0.6, 0.608)];
        let features = ex.extract_from_segments(&samples, &intervals);
        assert_eq!(features.len(), 1);
        assert!(features[0].matrix.len_of(Axis(0)) > 0);
        assert!((features[0].duration - 0.5).abs() < 1e-9);
    }
}
