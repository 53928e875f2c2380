use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scorebench::experiment::{run_stack, ExperimentContext, Registry, StackReport};
use scorebench::types::{AudioData, ExperimentConfig};

/// scorebench - pronunciation scoring experiment runner
///
/// Segments WAV recordings into voice-active spans, extracts acoustic
/// features, trains a scoring model against reference scores, and writes a
/// JSON results report per experiment.
#[derive(Parser, Debug)]
#[command(name = "scorebench")]
#[command(version = "0.1.0")]
#[command(about = "Pronunciation scoring experiment runner", long_about = None)]
struct Args {
    /// Experiment configuration (JSON with a top-level "stacks" object)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Directory of mono WAV recordings; file stems become file ids
    #[arg(long, value_name = "DIR")]
    audio_dir: PathBuf,

    /// JSON mapping of file id to reference score
    #[arg(long, value_name = "PATH")]
    scores: PathBuf,

    /// Output directory for models and result reports
    #[arg(long, value_name = "DIR", default_value = "results")]
    output_dir: PathBuf,

    /// Run only the named stack instead of all configured stacks
    #[arg(long, value_name = "NAME")]
    stack: Option<String>,
}

impl Args {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.config.is_file(),
            "Config file does not exist: {:?}",
            self.config
        );
        ensure!(
            self.audio_dir.is_dir(),
            "Audio path is not a directory: {:?}",
            self.audio_dir
        );
        ensure!(
            self.scores.is_file(),
            "Scores file does not exist: {:?}",
            self.scores
        );
        if self.output_dir.exists() {
            ensure!(
                self.output_dir.is_dir(),
                "Output path must be a directory: {:?}",
                self.output_dir
            );
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    args.validate()
        .context("Failed to validate command-line arguments")?;

    let config_raw = fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config file {:?}", args.config))?;
    let config: ExperimentConfig =
        serde_json::from_str(&config_raw).context("Failed to parse experiment config JSON")?;
    config.validate().context("Experiment config is invalid")?;

    let audio = load_audio_dir(&args.audio_dir)
        .with_context(|| format!("Failed to load audio from {:?}", args.audio_dir))?;
    ensure!(!audio.is_empty(), "No WAV files found in {:?}", args.audio_dir);
    println!("Loaded {} audio files from {:?}", audio.len(), args.audio_dir);

    let scores = load_scores(&args.scores)
        .with_context(|| format!("Failed to load scores from {:?}", args.scores))?;
    println!("Loaded {} reference scores", scores.len());

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", args.output_dir))?;
    let ctx = ExperimentContext::new(args.output_dir.clone());
    let registry = Registry::builtin();

    let selected: Vec<(&String, _)> = match &args.stack {
        Some(name) => {
            let stack = config
                .stacks
                .get_key_value(name)
                .with_context(|| format!("Stack `{}` is not defined in the config", name))?;
            vec![stack]
        }
        None => config.stacks.iter().collect(),
    };

    println!(
        "Experiment {} - running {} stack(s)",
        ctx.experiment_id(),
        selected.len()
    );

    let mut reports: Vec<StackReport> = Vec::new();
    for (name, stack) in selected {
        println!("\nStack `{}`:", name);
        let report = run_stack(&ctx, &registry, name, stack, &audio, &scores)
            .with_context(|| format!("Stack `{}` failed", name))?;
        println!(
            "  {} rows ({} file(s) unscored, {} short segment(s) skipped)",
            report.dataset_rows, report.skipped_files, report.skipped_segments
        );
        println!(
            "  CV MAE {:.4} ± {:.4} | holdout MAE {:.4}, R² {:.4}, bias {:+.4}",
            report.training.cv_mae,
            report.training.cv_mae_std,
            report.evaluation.mae,
            report.evaluation.r2,
            report.evaluation.bias
        );
        reports.push(report);
    }

    let results_path = ctx.results_path();
    let rendered =
        serde_json::to_string_pretty(&reports).context("Failed to serialize results")?;
    fs::write(&results_path, rendered)
        .with_context(|| format!("Failed to write results to {:?}", results_path))?;
    println!("\n✓ Results written to {:?}", results_path);

    Ok(())
}

fn load_audio_dir(dir: &Path) -> Result<BTreeMap<String, AudioData>> {
    let mut audio = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if !is_wav {
            continue;
        }
        let file_id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .with_context(|| format!("Unreadable file name {:?}", path))?;
        let data =
            load_wav(&path).with_context(|| format!("Failed to decode WAV {:?}", path))?;
        audio.insert(file_id, data);
    }
    Ok(audio)
}

fn load_wav(path: &Path) -> Result<AudioData> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    ensure!(channels > 0, "WAV reports zero channels");

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
        hound::SampleFormat::Float => {
            reader.samples::<f32>().collect::<std::result::Result<_, _>>()?
        }
    };

    // mix down to mono by averaging channels
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioData {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn load_scores(path: &Path) -> Result<BTreeMap<String, f64>> {
    let raw = fs::read_to_string(path)?;
    let scores: BTreeMap<String, f64> =
        serde_json::from_str(&raw).context("Scores must be a JSON object of file id to number")?;
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_config() {
        let args = Args {
            config: PathBuf::from("/definitely/not/here.json"),
            audio_dir: PathBuf::from("."),
            scores: PathBuf::from("."),
            output_dir: PathBuf::from("results"),
            stack: None,
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn scores_parse_from_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        fs::write(&path, r#"{"clip_a": 4.5, "clip_b": 2.0}"#).unwrap();
        let scores = load_scores(&path).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["clip_a"], 4.5);
    }
}
