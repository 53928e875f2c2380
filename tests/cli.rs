use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const SAMPLE_RATE: u32 = 16_000;

fn write_wav(path: &Path, pattern: &[(f64, f32)]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &(duration, amplitude) in pattern {
        let n = (duration * SAMPLE_RATE as f64) as usize;
        for i in 0..n {
            let sample = (i as f32 * 0.3).sin() * amplitude;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

#[test]
fn help_prints_usage() {
    Command::cargo_bin("scorebench")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--audio-dir"));
}

#[test]
fn missing_config_is_reported_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("scorebench")
        .unwrap()
        .arg(dir.path().join("absent.json"))
        .arg("--audio-dir")
        .arg(dir.path())
        .arg("--scores")
        .arg(dir.path().join("scores.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file does not exist"));
}

#[test]
fn unknown_stack_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{"stacks": {}}"#).unwrap();
    let scores = dir.path().join("scores.json");
    fs::write(&scores, "{}").unwrap();
    let audio_dir = dir.path().join("audio");
    fs::create_dir(&audio_dir).unwrap();
    write_wav(&audio_dir.join("clip_0.wav"), &[(0.5, 0.5)]);

    Command::cargo_bin("scorebench")
        .unwrap()
        .arg(&config)
        .arg("--audio-dir")
        .arg(&audio_dir)
        .arg("--scores")
        .arg(&scores)
        .arg("--stack")
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not defined in the config"));
}

#[test]
fn full_run_writes_a_results_report() {
    let dir = tempfile::tempdir().unwrap();
    let audio_dir = dir.path().join("audio");
    fs::create_dir(&audio_dir).unwrap();

    let mut scores = serde_json::Map::new();
    for i in 0..6 {
        let file_id = format!("clip_{}", i);
        let lead = 0.3 + 0.05 * i as f64;
        write_wav(
            &audio_dir.join(format!("{}.wav", file_id)),
            &[(lead, 0.6), (0.4, 0.0), (0.5, 0.6)],
        );
        scores.insert(file_id, serde_json::json!(1.0 + i as f64 * 0.8));
    }
    let scores_path = dir.path().join("scores.json");
    fs::write(
        &scores_path,
        serde_json::to_string(&serde_json::Value::Object(scores)).unwrap(),
    )
    .unwrap();

    let config = dir.path().join("config.json");
    fs::write(
        &config,
        r#"{
            "stacks": {
                "baseline": {
                    "vad_method": "energy",
                    "vad_params": {"energy_threshold": 0.05},
                    "feature_methods": [
                        {"name": "spectral",
                         "params": {"include_delta": false, "include_delta_delta": false}}
                    ],
                    "scoring_method": "rf_regressor",
                    "scoring_params": {"cv": 3}
                }
            }
        }"#,
    )
    .unwrap();

    let output_dir = dir.path().join("out");
    Command::cargo_bin("scorebench")
        .unwrap()
        .arg(&config)
        .arg("--audio-dir")
        .arg(&audio_dir)
        .arg("--scores")
        .arg(&scores_path)
        .arg("--output-dir")
        .arg(&output_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Results written"));

    // a timestamped results file plus the persisted model
    let results_file = fs::read_dir(&output_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("results_"))
                .unwrap_or(false)
        })
        .expect("results report exists");
    let results: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&results_file).unwrap()).unwrap();
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["stack"], "baseline");
    assert!(output_dir.join("models").join("baseline.model.json").is_file());
}
