use tracing::debug;

use super::classifier::FrameClassifier;
use super::frames::frames;
use crate::error::Result;
use crate::types::{AudioData, Interval};

/// Converts a waveform into voice-active intervals.
///
/// Frames of `frame_duration_ms` are classified one at a time by the
/// configured [`FrameClassifier`], then a two-state machine turns the boolean
/// sequence into intervals and a final pass merges near-adjacent ones.
pub struct FrameSegmenter {
    classifier: Box<dyn FrameClassifier>,
    frame_duration_ms: u32,
    merge_gap_secs: f64,
}

impl FrameSegmenter {
    pub fn new(
        classifier: Box<dyn FrameClassifier>,
        frame_duration_ms: u32,
        merge_gap_secs: f64,
    ) -> Self {
        Self {
            classifier,
            frame_duration_ms,
            merge_gap_secs,
        }
    }

    /// Detect voice-active spans in `audio`, ordered by start time.
    ///
    /// An unsupported sample rate or frame length fails with a configuration
    /// error before any frame is classified.
    pub fn segment(&mut self, audio: &AudioData) -> Result<Vec<Interval>> {
        self.classifier
            .validate(audio.sample_rate, self.frame_duration_ms)?;

        let mut intervals = Vec::new();
        let mut open: Option<f64> = None;
        let mut last_end = 0.0;

        for frame in frames(&audio.samples, audio.sample_rate, self.frame_duration_ms) {
            let speech = self.classifier.is_speech(frame.samples, audio.sample_rate);
            match (speech, open) {
                (true, None) => open = Some(frame.timestamp),
                (false, Some(start)) => {
                    // close at the end of the previous frame
                    intervals.push(Interval::new(start, last_end));
                    open = None;
                }
                _ => {}
            }
            last_end = frame.end();
        }
        if let Some(start) = open {
            intervals.push(Interval::new(start, last_end));
        }

        let merged = merge_intervals(intervals, self.merge_gap_secs);
        debug!(
            classifier = self.classifier.name(),
            intervals = merged.len(),
            "segmentation complete"
        );
        Ok(merged)
    }
}

/// Merge temporally adjacent intervals whose gap is strictly below
/// `gap_secs`, left to right in a single pass. Chains of near-adjacent
/// intervals collapse into one.
pub fn merge_intervals(intervals: Vec<Interval>, gap_secs: f64) -> Vec<Interval> {
    let mut iter = intervals.into_iter();
    let mut current = match iter.next() {
        Some(first) => first,
        None => return Vec::new(),
    };

    let mut merged = Vec::new();
    for next in iter {
        if next.start - current.end < gap_secs {
            current = Interval::new(current.start, next.end);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vad::classifier::EnergyClassifier;

    fn energy_segmenter(merge_gap: f64) -> FrameSegmenter {
        let classifier = EnergyClassifier::new(0.05).unwrap();
        FrameSegmenter::new(Box::new(classifier), 30, merge_gap)
    }

    fn make_audio(samples: Vec<f32>) -> AudioData {
        AudioData {
            samples,
            sample_rate: 16_000,
        }
    }

    #[test]
    fn empty_waveform_yields_no_intervals() {
        let mut segmenter = energy_segmenter(0.2);
        let intervals = segmenter.segment(&make_audio(Vec::new())).unwrap();
        assert!(intervals.is_empty());
    }

    #[test]
    fn silence_only_yields_no_intervals() {
        let mut segmenter = energy_segmenter(0.2);
        let intervals = segmenter.segment(&make_audio(vec![0.0; 16_000])).unwrap();
        assert!(intervals.is_empty());
    }

    #[test]
    fn speech_only_yields_single_full_interval() {
        let mut segmenter = energy_segmenter(0.2);
        let intervals = segmenter.segment(&make_audio(vec![0.5; 16_000])).unwrap();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, 0.0);
        // 33 whole 30 ms frames cover 0.99 s of the 1 s input
        assert!((intervals[0].end - 0.99).abs() < 1e-9);
    }

    #[test]
    fn interval_closes_at_end_of_last_speech_frame() {
        // 0.3 s speech, 0.7 s silence
        let mut samples = vec![0.5; 4_800];
        samples.extend(vec![0.0; 11_200]);
        let mut segmenter = energy_segmenter(0.2);
        let intervals = segmenter.segment(&make_audio(samples)).unwrap();
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].end - 0.3).abs() < 1e-9);
    }

    #[test]
    fn merge_joins_gaps_below_threshold() {
        let input = vec![Interval::new(0.5, 1.0), Interval::new(1.15, 1.6)];
        let merged = merge_intervals(input.clone(), 0.2);
        assert_eq!(merged, vec![Interval::new(0.5, 1.6)]);

        let kept = merge_intervals(input.clone(), 0.1);
        assert_eq!(kept, input);
    }

    #[test]
    fn merge_is_transitive_across_chains() {
        let input = vec![
            Interval::new(0.0, 0.5),
            Interval::new(0.6, 1.0),
            Interval::new(1.1, 1.5),
        ];
        let merged = merge_intervals(input, 0.2);
        assert_eq!(merged, vec![Interval::new(0.0, 1.5)]);
    }

    #[test]
    fn merge_is_idempotent() {
        let input = vec![
            Interval::new(0.0, 0.5),
            Interval::new(0.65, 1.0),
            Interval::new(1.5, 2.0),
        ];
        let once = merge_intervals(input, 0.2);
        let twice = merge_intervals(once.clone(), 0.2);
        assert_eq!(once, twice);
    }

    #[test]
    fn unsupported_rate_is_a_configuration_error() {
        let classifier = crate::vad::classifier::EarshotClassifier::new(2).unwrap();
        let mut segmenter = FrameSegmenter::new(Box::new(classifier), 30, 0.2);
        let audio = AudioData {
            samples: vec![0.0; 44_100],
            sample_rate: 44_100,
        };
        let err = segmenter.segment(&audio).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Configuration { parameter, .. } if parameter == "sample_rate"
        ));
    }
}
