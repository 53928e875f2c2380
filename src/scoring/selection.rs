use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::forest::{ForestParams, RandomForestRegressor};

/// Probe forest used to rank features during elimination
const PROBE_PARAMS: ForestParams = ForestParams {
    n_estimators: 10,
    max_depth: None,
    min_samples_split: 2,
};

/// Recursive feature elimination: repeatedly refits a small probe forest and
/// drops the least important feature until the target width is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfeSelector {
    support: Vec<bool>,
}

impl RfeSelector {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, n_to_select: usize, seed: u64) -> Self {
        let n_features = x.len_of(Axis(1));
        let mut support = vec![true; n_features];
        let mut active = n_features;

        while active > n_to_select.max(1) {
            let columns: Vec<usize> = support
                .iter()
                .enumerate()
                .filter_map(|(i, keep)| keep.then_some(i))
                .collect();
            let reduced = x.select(Axis(1), &columns);
            let probe = RandomForestRegressor::fit(&reduced, y, PROBE_PARAMS, seed);
            let importances = probe.feature_importances();

            let weakest = importances
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.partial_cmp(b.1).expect("finite importances"))
                .map(|(i, _)| columns[i])
                .expect("at least one active feature");
            support[weakest] = false;
            active -= 1;
        }

        Self { support }
    }

    /// Keep the selected columns, in their original order.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let columns: Vec<usize> = self
            .support
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        x.select(Axis(1), &columns)
    }

    pub fn support(&self) -> &[bool] {
        &self.support
    }

    pub fn n_selected(&self) -> usize {
        self.support.iter().filter(|keep| **keep).count()
    }
}
