use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use aus::WindowType;
use ndarray::{concatenate, Axis};

use super::delta::delta_matrix;
use super::{matrix_from_rows, preemphasis, FeatureExtractor, FeatureMatrix};
use crate::error::{Error, Result};
use crate::types::FeatureParams;

const MEL_BANDS: usize = 40;
const MIN_FREQ: f64 = 20.0;
const DELTA_WINDOW: usize = 2;

/// MFCC feature extraction over overlapping analysis windows.
///
/// Output columns are ordered `[base, delta, delta-delta]`; the enabled
/// derivative channels each contribute `n_base` extra columns.
pub struct MfccExtractor {
    sample_rate: u32,
    params: FeatureParams,
    fft_size: usize,
    hop_size: usize,
}

impl MfccExtractor {
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

impl FeatureExtractor for MfccExtractor {
    fn name(&self) -> &str {
        "mfcc"
    }

    fn feature_dimension(&self) -> usize {
        let channels =
            1 + self.params.include_delta as usize + self.params.include_delta_delta as usize;
        self.params.n_base * channels
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

        let freqs = spectrum::rfftfreq(self.fft_size, self.sample_rate);
        let filterbank = MelFilterbank::new(
            MIN_FREQ,
            (self.sample_rate as f64) / 2.0,
            MEL_BANDS,
            &freqs,
            true,
        );
        let mel = analysis::mel::make_mel_spectrogram(&power, &filterbank);
        let mfcc_raw = analysis::mel::mfcc_spectrogram(&mel, self.params.n_base, None);

        let base = matrix_from_rows(&mfcc_raw);
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
    use ndarray::Axis;

    fn extractor(include_delta: bool, include_delta_delta: bool) -> MfccExtractor {
        let params = FeatureParams {
            include_delta,
            include_delta_delta,
            ..FeatureParams::default()
        };
        MfccExtractor::new(16_000, params).unwrap()
    }

    #[test]
    fn dimension_scales_with_derivative_channels() {
        assert_eq!(extractor(false, false).feature_dimension(), 13);
        assert_eq!(extractor(true, false).feature_dimension(), 26);
        assert_eq!(extractor(true, true).feature_dimension(), 39);
    }

    #[test]
    fn extract_yields_configured_width() {
        let ex = extractor(true, true);
        let samples: Vec<f32> = (0..8_000)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let matrix = ex.extract(&samples);
        assert!(matrix.len_of(Axis(0)) > 0);
        assert_eq!(matrix.len_of(Axis(1)), 39);
    }

    #[test]
    fn input_shorter_than_window_yields_empty_matrix() {
        let ex = extractor(true, true);
        let matrix = ex.extract(&[0.1; 100]);
        assert_eq!(matrix.len_of(Axis(0)), 0);
        assert_eq!(matrix.len_of(Axis(1)), 39);
    }

    #[test]
    fn invalid_window_is_rejected_at_construction() {
        let params = FeatureParams {
            window_secs: -1.0,
            ..FeatureParams::default()
        };
        assert!(MfccExtractor::new(16_000, params).is_err());
    }
}
