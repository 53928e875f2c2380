/// A fixed-duration slice of the source waveform.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub samples: &'a [f32],
    /// Start of the frame on the waveform timeline, in seconds
    pub timestamp: f64,
    /// Frame length in seconds
    pub duration: f64,
}

impl Frame<'_> {
    pub fn end(&self) -> f64 {
        self.timestamp + self.duration
    }
}

/// Lazy iterator over non-overlapping fixed-duration frames.
///
/// A trailing partial frame shorter than the configured length is dropped,
/// never yielded.
pub struct FrameIter<'a> {
    samples: &'a [f32],
    frame_len: usize,
    duration: f64,
    offset: usize,
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Frame<'a>> {
        if self.offset + self.frame_len > self.samples.len() || self.frame_len == 0 {
            return None;
        }
        let index = self.offset / self.frame_len;
        let frame = Frame {
            samples: &self.samples[self.offset..self.offset + self.frame_len],
            timestamp: index as f64 * self.duration,
            duration: self.duration,
        };
        self.offset += self.frame_len;
        Some(frame)
    }
}

/// Slice a waveform into frames of `frame_duration_ms`.
pub fn frames(samples: &[f32], sample_rate: u32, frame_duration_ms: u32) -> FrameIter<'_> {
    let frame_len = (sample_rate as usize * frame_duration_ms as usize) / 1000;
    let duration = frame_len as f64 / sample_rate as f64;
    FrameIter {
        samples,
        frame_len,
        duration,
        offset: 0,
    }
}
