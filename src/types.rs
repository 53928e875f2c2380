//! Core types for the scorebench experiment pipeline

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Raw audio data representation (mono, f32 samples)
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 16000)
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A voice-active span on the source waveform's timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(self) -> f64 {
        self.end - self.start
    }
}

/// Experiment configuration parsed from JSON: a set of named stacks.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    pub stacks: BTreeMap<String, StackConfig>,
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stacks.is_empty() {
            return Err(Error::configuration(
                "stacks",
                "experiment must define at least one stack",
            ));
        }
        for stack in self.stacks.values() {
            stack.validate()?;
        }
        Ok(())
    }
}

/// One experiment stack: a segmenter, one or more feature extractors, and a
/// scoring model, each resolved by name through the component registry.
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    #[serde(alias = "vad")]
    pub vad_method: String,
    #[serde(default)]
    pub vad_params: VadParams,
    #[serde(alias = "features")]
    pub feature_methods: Vec<FeatureMethod>,
    #[serde(alias = "scoring")]
    pub scoring_method: String,
    #[serde(default)]
    pub scoring_params: ScoringParams,
}

impl StackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.feature_methods.is_empty() {
            return Err(Error::configuration(
                "feature_methods",
                "stack must configure at least one feature extractor",
            ));
        }
        self.vad_params.validate()?;
        for method in &self.feature_methods {
            method.params.validate()?;
        }
        self.scoring_params.validate()?;
        Ok(())
    }
}

/// A feature extractor selection with its parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureMethod {
    pub name: String,
    #[serde(default)]
    pub params: FeatureParams,
}

/// Segmenter tuning shared by all frame classifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct VadParams {
    /// Frame length in milliseconds (classifier frames, not analysis frames)
    #[serde(default = "default_frame_duration_ms", alias = "frame_size")]
    pub frame_duration_ms: u32,
    /// 0 = most permissive, 3 = most restrictive
    #[serde(default = "default_aggressiveness", alias = "aggressive_level")]
    pub aggressiveness: u8,
    /// Intervals closer than this gap (seconds) are merged
    #[serde(default = "default_merge_gap")]
    pub merge_gap_secs: f64,
    /// Amplitude threshold for the energy classifier
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: f32,
}

impl VadParams {
    pub fn validate(&self) -> Result<()> {
        if self.frame_duration_ms == 0 {
            return Err(Error::configuration(
                "frame_duration_ms",
                "must be greater than zero",
            ));
        }
        if self.aggressiveness > 3 {
            return Err(Error::configuration(
                "aggressiveness",
                format!("must be 0-3, got {}", self.aggressiveness),
            ));
        }
        if self.merge_gap_secs < 0.0 {
            return Err(Error::configuration(
                "merge_gap_secs",
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

impl Default for VadParams {
    fn default() -> Self {
        Self {
            frame_duration_ms: default_frame_duration_ms(),
            aggressiveness: default_aggressiveness(),
            merge_gap_secs: default_merge_gap(),
            energy_threshold: default_energy_threshold(),
        }
    }
}

/// Feature extractor tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureParams {
    /// Base feature width (e.g., number of MFCC coefficients)
    #[serde(default = "default_n_base", alias = "n_mfcc")]
    pub n_base: usize,
    /// Analysis window length in seconds
    #[serde(default = "default_window_secs", alias = "window_size")]
    pub window_secs: f64,
    /// Hop between analysis windows in seconds
    #[serde(default = "default_hop_secs", alias = "hop_length")]
    pub hop_secs: f64,
    #[serde(default = "default_true")]
    pub include_delta: bool,
    #[serde(default = "default_true")]
    pub include_delta_delta: bool,
    /// Pre-emphasis coefficient; 0 disables the filter
    #[serde(default = "default_preemphasis")]
    pub preemphasis: f64,
}

impl FeatureParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_base == 0 {
            return Err(Error::configuration("n_base", "must be greater than zero"));
        }
        if self.window_secs <= 0.0 {
            return Err(Error::configuration(
                "window_secs",
                format!("must be positive, got {}", self.window_secs),
            ));
        }
        if self.hop_secs <= 0.0 {
            return Err(Error::configuration(
                "hop_secs",
                format!("must be positive, got {}", self.hop_secs),
            ));
        }
        Ok(())
    }
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            n_base: default_n_base(),
            window_secs: default_window_secs(),
            hop_secs: default_hop_secs(),
            include_delta: true,
            include_delta_delta: true,
            preemphasis: default_preemphasis(),
        }
    }
}

/// Scoring model tuning. Serializes into the persisted model metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringParams {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// None means unbounded tree depth
    #[serde(default = "default_max_depth")]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default)]
    pub feature_selection: bool,
    #[serde(default)]
    pub n_features_to_select: Option<usize>,
    #[serde(default = "default_cv_folds", alias = "cv")]
    pub cv_folds: usize,
}

impl ScoringParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::configuration(
                "n_estimators",
                "must be greater than zero",
            ));
        }
        if self.min_samples_split < 2 {
            return Err(Error::configuration(
                "min_samples_split",
                "must be at least 2",
            ));
        }
        if self.cv_folds < 2 {
            return Err(Error::configuration("cv_folds", "must be at least 2"));
        }
        if let Some(n) = self.n_features_to_select {
            if n == 0 {
                return Err(Error::configuration(
                    "n_features_to_select",
                    "must be greater than zero when set",
                ));
            }
        }
        Ok(())
    }
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            feature_selection: false,
            n_features_to_select: None,
            cv_folds: default_cv_folds(),
        }
    }
}

fn default_frame_duration_ms() -> u32 {
    30
}

fn default_aggressiveness() -> u8 {
    2
}

fn default_merge_gap() -> f64 {
    0.2
}

fn default_energy_threshold() -> f32 {
    0.05
}

fn default_n_base() -> usize {
    13
}

fn default_window_secs() -> f64 {
    0.025
}

fn default_hop_secs() -> f64 {
    0.010
}

fn default_preemphasis() -> f64 {
    0.97
}

fn default_true() -> bool {
    true
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_depth() -> Option<usize> {
    Some(10)
}

fn default_min_samples_split() -> usize {
    5
}

fn default_cv_folds() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stack_config_with_aliases() {
        let json = r#"{
            "vad": "earshot",
            "vad_params": {"frame_size": 20, "aggressive_level": 3},
            "features": [
                {"name": "mfcc", "params": {"n_mfcc": 13, "include_delta": false}}
            ],
            "scoring": "rf_regressor",
            "scoring_params": {"n_estimators": 50, "cv": 3}
        }"#;
        let stack: StackConfig = serde_json::from_str(json).unwrap();
        stack.validate().unwrap();
        assert_eq!(stack.vad_params.frame_duration_ms, 20);
        assert_eq!(stack.vad_params.aggressiveness, 3);
        assert_eq!(stack.feature_methods.len(), 1);
        assert!(!stack.feature_methods[0].params.include_delta);
        assert_eq!(stack.scoring_params.cv_folds, 3);
    }

    #[test]
    fn rejects_out_of_range_aggressiveness() {
        let params = VadParams {
            aggressiveness: 4,
            ..VadParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_window() {
        let params = FeatureParams {
            window_secs: 0.0,
            ..FeatureParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_empty_feature_list() {
        let json = r#"{
            "vad_method": "energy",
            "feature_methods": [],
            "scoring_method": "rf_regressor"
        }"#;
        let stack: StackConfig = serde_json::from_str(json).unwrap();
        assert!(stack.validate().is_err());
    }
}
