//! Voice-activity segmentation: fixed-duration framing, per-frame
//! classification, and the temporal state logic that turns boolean frame
//! decisions into merged voice-active intervals.

mod classifier;
mod frames;
mod segmenter;

pub use classifier::{EarshotClassifier, EnergyClassifier, FrameClassifier};
pub use frames::{frames, Frame, FrameIter};
pub use segmenter::{merge_intervals, FrameSegmenter};
