use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2};
use scorebench::error::Error;
use scorebench::scoring::ScoringModel;
use scorebench::types::ScoringParams;

/// Small labeled set with one informative feature and some distractors.
fn synthetic_data(n: usize) -> (Array2<f64>, Array1<f64>, Vec<String>) {
    let x = Array2::from_shape_fn((n, 4), |(i, j)| match j {
        0 => i as f64,
        1 => (i % 3) as f64,
        2 => 0.25,
        _ => ((i * 7) % 5) as f64,
    });
    let y = Array1::from_shape_fn(n, |i| i as f64 * 0.2 + 1.0);
    let names = (0..4).map(|i| format!("mfcc_mean_{}", i)).collect();
    (x, y, names)
}

#[test]
fn train_reports_grid_winner_and_importances() {
    let (x, y, names) = synthetic_data(24);
    let mut model = ScoringModel::new(ScoringParams::default()).unwrap();
    let report = model.train(&x, &y, Some(&names), 3).unwrap();

    assert!([50, 100, 200].contains(&report.best_params.n_estimators));
    assert!(report.cv_mae.is_finite());
    assert!(report.cv_mae_std >= 0.0);
    assert_eq!(report.feature_importance.len(), 4);
    assert!(report.feature_importance.contains_key("mfcc_mean_0"));

    let predictions = model.predict(&x).unwrap();
    assert_eq!(predictions.len(), 24);
}

#[test]
fn save_then_load_reproduces_predictions() {
    let (x, y, names) = synthetic_data(24);
    let mut model = ScoringModel::new(ScoringParams::default()).unwrap();
    model.train(&x, &y, Some(&names), 3).unwrap();

    let dir = tempfile::tempdir().unwrap();
    model.save(dir.path(), "rf_scoring_model").unwrap();

    let restored = ScoringModel::load(dir.path(), "rf_scoring_model").unwrap();
    assert!(restored.is_trained());

    let original = model.predict(&x).unwrap();
    let reloaded = restored.predict(&x).unwrap();
    for (a, b) in original.iter().zip(reloaded.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }

    let importance = restored.get_feature_importance().unwrap();
    assert_eq!(importance.len(), 4);
}

#[test]
fn feature_selection_keeps_named_features_in_order() {
    let (x, y, names) = synthetic_data(30);
    let params = ScoringParams {
        feature_selection: true,
        n_features_to_select: Some(3),
        ..ScoringParams::default()
    };
    let mut model = ScoringModel::new(params).unwrap();
    let report = model.train(&x, &y, Some(&names), 3).unwrap();

    assert_eq!(report.feature_importance.len(), 3);
    for name in report.feature_importance.keys() {
        assert!(names.contains(name));
    }

    // round trip preserves the selector
    let dir = tempfile::tempdir().unwrap();
    model.save(dir.path(), "selected").unwrap();
    let restored = ScoringModel::load(dir.path(), "selected").unwrap();
    let original = model.predict(&x).unwrap();
    let reloaded = restored.predict(&x).unwrap();
    for (a, b) in original.iter().zip(reloaded.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn evaluate_scores_perfect_predictions_perfectly() {
    // constant target: every tree predicts the constant exactly
    let x = Array2::from_shape_fn((12, 2), |(i, j)| (i + j) as f64);
    let y = Array1::from_elem(12, 3.5);
    let mut model = ScoringModel::new(ScoringParams::default()).unwrap();
    model.train(&x, &y, None, 3).unwrap();

    let report = model.evaluate(&x, &y).unwrap();
    assert_abs_diff_eq!(report.mae, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(report.bias, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(report.r2, 1.0, epsilon = 1e-9);
    assert_eq!(report.predictions.len(), 12);
    assert_eq!(report.ground_truth.len(), 12);
}

#[test]
fn untrained_operations_fail_with_not_trained() {
    let model = ScoringModel::new(ScoringParams::default()).unwrap();
    let x = Array2::zeros((2, 2));
    assert!(matches!(
        model.predict(&x).unwrap_err(),
        Error::NotTrained { .. }
    ));
    assert!(matches!(
        model.get_feature_importance().unwrap_err(),
        Error::NotTrained { .. }
    ));
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        model.save(dir.path(), "nothing").unwrap_err(),
        Error::NotTrained { .. }
    ));
}

#[test]
fn loading_a_missing_model_fails_with_model_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = ScoringModel::load(dir.path(), "absent").unwrap_err();
    assert!(matches!(err, Error::ModelNotFound { .. }));
}

#[test]
fn retraining_replaces_state_in_place() {
    let (x, y, names) = synthetic_data(24);
    let mut model = ScoringModel::new(ScoringParams::default()).unwrap();
    model.train(&x, &y, Some(&names), 3).unwrap();
    let first = model.predict(&x).unwrap();

    // shift the labels and retrain; predictions must follow the new fit
    let shifted = &y + 10.0;
    model.train(&x, &shifted, Some(&names), 3).unwrap();
    let second = model.predict(&x).unwrap();

    let mean_first = first.sum() / first.len() as f64;
    let mean_second = second.sum() / second.len() as f64;
    assert!(mean_second > mean_first + 5.0);
}
