//! Ensemble regression scoring: training with hyperparameter search and
//! cross-validation, evaluation, and persisted model state.

mod forest;
mod scaler;
mod search;
mod selection;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use forest::{ForestParams, RandomForestRegressor};
pub use scaler::StandardScaler;
pub use selection::RfeSelector;

use crate::error::{Error, Result};
use crate::types::ScoringParams;

/// Seed shared by every stochastic step so re-training reproduces itself
const SEED: u64 = 42;

/// Summary returned by [`ScoringModel::train`].
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub best_params: ForestParams,
    pub cv_mae: f64,
    pub cv_mae_std: f64,
    pub feature_importance: BTreeMap<String, f64>,
}

/// Summary returned by [`ScoringModel::evaluate`].
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub mae: f64,
    pub r2: f64,
    /// mean(predictions - ground truth)
    pub bias: f64,
    pub predictions: Vec<f64>,
    pub ground_truth: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrainedBlob {
    forest: RandomForestRegressor,
    scaler: StandardScaler,
    selector: Option<RfeSelector>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelMetadata {
    params: ScoringParams,
    feature_names: Vec<String>,
    selected_features: Option<Vec<String>>,
    trained: bool,
}

#[derive(Debug)]
struct TrainedState {
    forest: RandomForestRegressor,
    scaler: StandardScaler,
    selector: Option<RfeSelector>,
    feature_names: Vec<String>,
    selected_features: Option<Vec<String>>,
}

impl TrainedState {
    fn prepare(&self, x: &Array2<f64>) -> Array2<f64> {
        let scaled = self.scaler.transform(x);
        match &self.selector {
            Some(selector) => selector.transform(&scaled),
            None => scaled,
        }
    }

    fn importance_names(&self) -> &[String] {
        self.selected_features
            .as_deref()
            .unwrap_or(&self.feature_names)
    }
}

/// Random-forest pronunciation scoring model.
///
/// Starts untrained; [`train`](Self::train) fits the scaling transform, the
/// optional feature selector, and the ensemble, replacing published state
/// only once the whole fit succeeds. Re-training overwrites trained state in
/// place.
#[derive(Debug)]
pub struct ScoringModel {
    params: ScoringParams,
    state: Option<TrainedState>,
}

impl ScoringModel {
    pub fn new(params: ScoringParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            state: None,
        })
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    /// Fit scaler, optional RFE selector, grid-searched forest. Returns the
    /// best hyperparameters, cross-validated MAE, and feature importances.
    pub fn train(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: Option<&[String]>,
        cv_folds: usize,
    ) -> Result<TrainingReport> {
        let n_rows = x.len_of(Axis(0));
        let n_features = x.len_of(Axis(1));
        if n_rows == 0 || n_features == 0 {
            return Err(Error::configuration(
                "x",
                format!("training matrix is {}x{}", n_rows, n_features),
            ));
        }
        if n_rows != y.len() {
            return Err(Error::configuration(
                "y",
                format!("{} labels for {} rows", y.len(), n_rows),
            ));
        }

        let feature_names: Vec<String> = match feature_names {
            Some(names) => {
                if names.len() != n_features {
                    return Err(Error::configuration(
                        "feature_names",
                        format!("{} names for {} features", names.len(), n_features),
                    ));
                }
                names.to_vec()
            }
            None => (0..n_features).map(|i| format!("feature_{}", i)).collect(),
        };

        let scaler = StandardScaler::fit(x);
        let mut prepared = scaler.transform(x);

        let (selector, selected_features) = if self.params.feature_selection {
            let target = self
                .params
                .n_features_to_select
                .unwrap_or_else(|| (n_features / 3).max(3));
            let selector = RfeSelector::fit(&prepared, y, target, SEED);
            let selected: Vec<String> = feature_names
                .iter()
                .zip(selector.support().iter())
                .filter_map(|(name, keep)| keep.then(|| name.clone()))
                .collect();
            prepared = selector.transform(&prepared);
            (Some(selector), Some(selected))
        } else {
            (None, None)
        };

        let (best_params, cv_score) = search::grid_search(&prepared, y, cv_folds, SEED);
        info!(
            n_estimators = best_params.n_estimators,
            max_depth = ?best_params.max_depth,
            min_samples_split = best_params.min_samples_split,
            cv_mae = cv_score.mean_mae,
            "grid search complete; refitting best configuration"
        );
        let forest = RandomForestRegressor::fit(&prepared, y, best_params, SEED);

        let state = TrainedState {
            forest,
            scaler,
            selector,
            feature_names,
            selected_features,
        };
        let feature_importance = importance_map(&state);
        // atomic replace-on-success: nothing above touched self
        self.state = Some(state);

        Ok(TrainingReport {
            best_params,
            cv_mae: cv_score.mean_mae,
            cv_mae_std: cv_score.std_mae,
            feature_importance,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let state = self.state.as_ref().ok_or(Error::NotTrained {
            operation: "predict",
        })?;
        Ok(state.forest.predict(&state.prepare(x)))
    }

    pub fn evaluate(&self, x: &Array2<f64>, y_true: &Array1<f64>) -> Result<EvaluationReport> {
        let predictions = self.predict(x)?;
        Ok(regression_metrics(&predictions, y_true))
    }

    /// Importance per surviving feature name; positional names are used when
    /// none were supplied at training time.
    pub fn get_feature_importance(&self) -> Result<BTreeMap<String, f64>> {
        let state = self.state.as_ref().ok_or(Error::NotTrained {
            operation: "get_feature_importance",
        })?;
        Ok(importance_map(state))
    }

    /// Persist the fitted estimator stack as one opaque blob plus a
    /// human-readable metadata record.
    pub fn save(&self, dir: &Path, name: &str) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotTrained {
            operation: "save",
        })?;
        fs::create_dir_all(dir).map_err(|err| Error::persistence(dir, err))?;

        let blob_path = blob_path(dir, name);
        let blob = TrainedBlob {
            forest: state.forest.clone(),
            scaler: state.scaler.clone(),
            selector: state.selector.clone(),
        };
        write_json(&blob_path, &blob)?;

        let meta_path = meta_path(dir, name);
        let metadata = ModelMetadata {
            params: self.params.clone(),
            feature_names: state.feature_names.clone(),
            selected_features: state.selected_features.clone(),
            trained: true,
        };
        write_json(&meta_path, &metadata)?;
        info!(blob = %blob_path.display(), "model saved");
        Ok(())
    }

    /// Reconstruct a model whose predictions match the saved instance.
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let blob_path = blob_path(dir, name);
        let meta_path = meta_path(dir, name);
        for path in [&blob_path, &meta_path] {
            if !path.exists() {
                return Err(Error::ModelNotFound { path: path.clone() });
            }
        }

        let metadata: ModelMetadata = read_json(&meta_path)?;
        let mut model = ScoringModel::new(metadata.params)?;
        if metadata.trained {
            let blob: TrainedBlob = read_json(&blob_path)?;
            model.state = Some(TrainedState {
                forest: blob.forest,
                scaler: blob.scaler,
                selector: blob.selector,
                feature_names: metadata.feature_names,
                selected_features: metadata.selected_features,
            });
        }
        Ok(model)
    }
}

fn importance_map(state: &TrainedState) -> BTreeMap<String, f64> {
    state
        .importance_names()
        .iter()
        .cloned()
        .zip(state.forest.feature_importances().iter().copied())
        .collect()
}

/// MAE, r², and bias for a prediction vector against ground truth.
///
/// r² is 1 when a zero-variance target is predicted exactly, 0 otherwise.
pub fn regression_metrics(predictions: &Array1<f64>, y_true: &Array1<f64>) -> EvaluationReport {
    let n = y_true.len().max(1) as f64;
    let mae = predictions
        .iter()
        .zip(y_true.iter())
        .map(|(p, t)| (p - t).abs())
        .sum::<f64>()
        / n;
    let bias = predictions
        .iter()
        .zip(y_true.iter())
        .map(|(p, t)| p - t)
        .sum::<f64>()
        / n;

    let mean_true = y_true.sum() / n;
    let ss_res: f64 = predictions
        .iter()
        .zip(y_true.iter())
        .map(|(p, t)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean_true).powi(2)).sum();
    let r2 = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    EvaluationReport {
        mae,
        r2,
        bias,
        predictions: predictions.to_vec(),
        ground_truth: y_true.to_vec(),
    }
}

fn blob_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.model.json", name))
}

fn meta_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}_meta.json", name))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|err| Error::persistence(path, err))?;
    serde_json::to_writer(file, value).map_err(|err| Error::persistence(path, err))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| Error::persistence(path, err))?;
    serde_json::from_reader(file).map_err(|err| Error::persistence(path, err))
}
