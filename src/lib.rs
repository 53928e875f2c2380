//! scorebench - pronunciation-scoring experiment pipeline
//!
//! Segments recorded speech into voice-active spans, extracts acoustic
//! features per span, trains a random-forest regression model against
//! reference scores, and reports results. Audio decoding, report rendering,
//! and the cloud scoring API live in external collaborators; this crate owns
//! the segmentation-to-scoring core.

pub mod dataset;
pub mod error;
pub mod experiment;
pub mod features;
pub mod scoring;
pub mod types;
pub mod vad;

pub use error::{Error, Result};
