//! Experiment orchestration: explicit component registry, per-run context,
//! and the end-to-end stack runner.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{info, warn};

use crate::dataset::{self, FileFeatures};
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, MfccExtractor, SpectralExtractor};
use crate::scoring::{EvaluationReport, ScoringModel, TrainingReport};
use crate::types::{AudioData, FeatureParams, ScoringParams, StackConfig, VadParams};
use crate::vad::{EarshotClassifier, EnergyClassifier, FrameSegmenter};

const TEST_SPLIT: f64 = 0.2;
const SPLIT_SEED: u64 = 42;

type SegmenterFactory = fn(&VadParams) -> Result<FrameSegmenter>;
type ExtractorFactory = fn(u32, &FeatureParams) -> Result<Box<dyn FeatureExtractor>>;
type ScorerFactory = fn(&ScoringParams) -> Result<ScoringModel>;

/// Explicit mapping from configuration keys to component constructors,
/// resolved once at startup.
pub struct Registry {
    segmenters: HashMap<&'static str, SegmenterFactory>,
    extractors: HashMap<&'static str, ExtractorFactory>,
    scorers: HashMap<&'static str, ScorerFactory>,
}

impl Registry {
    pub fn builtin() -> Self {
        let mut segmenters: HashMap<&'static str, SegmenterFactory> = HashMap::new();
        segmenters.insert("earshot", build_earshot_segmenter);
        // historical configs name the WebRTC-style method directly
        segmenters.insert("webrtc", build_earshot_segmenter);
        segmenters.insert("energy", build_energy_segmenter);

        let mut extractors: HashMap<&'static str, ExtractorFactory> = HashMap::new();
        extractors.insert("mfcc", build_mfcc_extractor);
        extractors.insert("spectral", build_spectral_extractor);

        let mut scorers: HashMap<&'static str, ScorerFactory> = HashMap::new();
        scorers.insert("rf_regressor", build_rf_scorer);

        Self {
            segmenters,
            extractors,
            scorers,
        }
    }

    pub fn segmenter(&self, name: &str, params: &VadParams) -> Result<FrameSegmenter> {
        let factory = self.segmenters.get(name).ok_or_else(|| {
            Error::configuration("vad_method", format!("unknown method `{}`", name))
        })?;
        factory(params)
    }

    pub fn extractor(
        &self,
        name: &str,
        sample_rate: u32,
        params: &FeatureParams,
    ) -> Result<Box<dyn FeatureExtractor>> {
        let factory = self.extractors.get(name).ok_or_else(|| {
            Error::configuration("feature_methods", format!("unknown extractor `{}`", name))
        })?;
        factory(sample_rate, params)
    }

    pub fn scorer(&self, name: &str, params: &ScoringParams) -> Result<ScoringModel> {
        let factory = self.scorers.get(name).ok_or_else(|| {
            Error::configuration("scoring_method", format!("unknown model `{}`", name))
        })?;
        factory(params)
    }
}

fn build_earshot_segmenter(params: &VadParams) -> Result<FrameSegmenter> {
    let classifier = EarshotClassifier::new(params.aggressiveness)?;
    Ok(FrameSegmenter::new(
        Box::new(classifier),
        params.frame_duration_ms,
        params.merge_gap_secs,
    ))
}

fn build_energy_segmenter(params: &VadParams) -> Result<FrameSegmenter> {
    let classifier = EnergyClassifier::new(params.energy_threshold)?;
    Ok(FrameSegmenter::new(
        Box::new(classifier),
        params.frame_duration_ms,
        params.merge_gap_secs,
    ))
}

fn build_mfcc_extractor(
    sample_rate: u32,
    params: &FeatureParams,
) -> Result<Box<dyn FeatureExtractor>> {
    Ok(Box::new(MfccExtractor::new(sample_rate, params.clone())?))
}

fn build_spectral_extractor(
    sample_rate: u32,
    params: &FeatureParams,
) -> Result<Box<dyn FeatureExtractor>> {
    Ok(Box::new(SpectralExtractor::new(sample_rate, params.clone())?))
}

fn build_rf_scorer(params: &ScoringParams) -> Result<ScoringModel> {
    ScoringModel::new(params.clone())
}

/// Per-run state passed explicitly into each pipeline stage instead of
/// living in process-wide globals.
#[derive(Debug, Clone)]
pub struct ExperimentContext {
    experiment_id: String,
    output_dir: PathBuf,
}

impl ExperimentContext {
    pub fn new(output_dir: PathBuf) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            experiment_id: format!("exp_{}", stamp),
            output_dir,
        }
    }

    pub fn with_id(experiment_id: impl Into<String>, output_dir: PathBuf) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            output_dir,
        }
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    pub fn models_dir(&self) -> PathBuf {
        self.output_dir.join("models")
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("results_{}.json", self.experiment_id))
    }
}

/// Outcome of one stack run, handed to the report/log collaborator as plain
/// structured data.
#[derive(Debug, Clone, Serialize)]
pub struct StackReport {
    pub stack: String,
    pub training: TrainingReport,
    pub evaluation: EvaluationReport,
    pub dataset_rows: usize,
    pub skipped_files: usize,
    pub skipped_segments: usize,
    pub duration_secs: f64,
}

/// Run one stack end to end: segment every file, extract features per
/// configured extractor, assemble the labeled dataset, train on a holdout
/// split, evaluate, and persist the trained model.
pub fn run_stack(
    ctx: &ExperimentContext,
    registry: &Registry,
    stack_name: &str,
    stack: &StackConfig,
    audio: &BTreeMap<String, AudioData>,
    scores: &BTreeMap<String, f64>,
) -> Result<StackReport> {
    stack.validate()?;
    let started = Instant::now();
    info!(
        experiment = ctx.experiment_id(),
        stack = stack_name,
        files = audio.len(),
        "running stack"
    );

    let first = audio.values().next().ok_or_else(|| {
        Error::configuration("audio", "experiment received no audio files")
    })?;
    let sample_rate = first.sample_rate;

    let mut segmenter = registry.segmenter(&stack.vad_method, &stack.vad_params)?;
    let mut extractors = Vec::with_capacity(stack.feature_methods.len());
    for method in &stack.feature_methods {
        extractors.push((
            method.name.clone(),
            registry.extractor(&method.name, sample_rate, &method.params)?,
        ));
    }

    let mut features: FileFeatures = BTreeMap::new();
    let mut skipped_segments = 0;
    for (file_id, data) in audio {
        if data.sample_rate != sample_rate {
            return Err(Error::configuration(
                "sample_rate",
                format!(
                    "file `{}` is {} Hz but the stack was built for {} Hz",
                    file_id, data.sample_rate, sample_rate
                ),
            ));
        }
        let intervals = segmenter.segment(data)?;
        if intervals.is_empty() {
            warn!(file_id = %file_id, "no voice activity detected");
        }
        let mut per_extractor = BTreeMap::new();
        for (name, extractor) in &extractors {
            let segments = extractor.extract_from_segments(&data.samples, &intervals);
            skipped_segments += intervals.len() - segments.len();
            per_extractor.insert(name.clone(), segments);
        }
        features.insert(file_id.clone(), per_extractor);
    }

    let dataset = dataset::build_dataset(&features, scores)?;
    let rows = dataset.x.shape()[0];
    if rows == 0 {
        return Err(Error::configuration(
            "dataset",
            "no usable rows; check segments and reference scores",
        ));
    }
    info!(
        stack = stack_name,
        rows,
        skipped_files = dataset.skipped_files,
        skipped_segments,
        "dataset assembled"
    );

    let (x_train, x_test, y_train, y_test) =
        dataset::train_test_split(&dataset.x, &dataset.y, TEST_SPLIT, SPLIT_SEED);

    let mut model = registry.scorer(&stack.scoring_method, &stack.scoring_params)?;
    let training = model.train(
        &x_train,
        &y_train,
        Some(&dataset.feature_names),
        stack.scoring_params.cv_folds,
    )?;

    // tiny datasets may leave nothing to hold out
    let evaluation = if y_test.is_empty() {
        warn!(stack = stack_name, "holdout split is empty; evaluating on training data");
        model.evaluate(&x_train, &y_train)?
    } else {
        model.evaluate(&x_test, &y_test)?
    };

    model.save(&ctx.models_dir(), stack_name)?;

    let report = StackReport {
        stack: stack_name.to_string(),
        training,
        evaluation,
        dataset_rows: rows,
        skipped_files: dataset.skipped_files,
        skipped_segments,
        duration_secs: started.elapsed().as_secs_f64(),
    };
    info!(
        stack = stack_name,
        mae = report.evaluation.mae,
        r2 = report.evaluation.r2,
        secs = report.duration_secs,
        "stack complete"
    );
    Ok(report)
}
