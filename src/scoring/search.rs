use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use super::forest::{ForestParams, RandomForestRegressor};

const N_ESTIMATORS_GRID: [usize; 3] = [50, 100, 200];
const MAX_DEPTH_GRID: [Option<usize>; 3] = [None, Some(10), Some(20)];
const MIN_SPLIT_GRID: [usize; 3] = [2, 5, 10];

#[derive(Debug, Clone, Copy)]
pub struct CvScore {
    pub mean_mae: f64,
    pub std_mae: f64,
}

/// Mean absolute error of `params` under seeded k-fold cross-validation.
///
/// Folds are independent; scores combine by simple averaging, so evaluation
/// order does not matter.
pub fn k_fold_mae(
    x: &Array2<f64>,
    y: &Array1<f64>,
    params: ForestParams,
    folds: usize,
    seed: u64,
) -> CvScore {
    let n = x.len_of(Axis(0));
    let folds = folds.min(n).max(2);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut fold_scores = Vec::with_capacity(folds);
    let base = n / folds;
    let remainder = n % folds;
    let mut offset = 0;
    for fold in 0..folds {
        let size = base + usize::from(fold < remainder);
        let test_idx = &indices[offset..offset + size];
        let train_idx: Vec<usize> = indices[..offset]
            .iter()
            .chain(indices[offset + size..].iter())
            .copied()
            .collect();
        offset += size;
        if test_idx.is_empty() || train_idx.is_empty() {
            continue;
        }

        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), test_idx);
        let y_test = y.select(Axis(0), test_idx);

        let forest = RandomForestRegressor::fit(&x_train, &y_train, params, seed);
        let predictions = forest.predict(&x_test);
        let mae = predictions
            .iter()
            .zip(y_test.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / y_test.len() as f64;
        fold_scores.push(mae);
    }

    let count = fold_scores.len().max(1) as f64;
    let mean = fold_scores.iter().sum::<f64>() / count;
    let variance = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count;
    CvScore {
        mean_mae: mean,
        std_mae: variance.sqrt(),
    }
}

/// Exhaustive search over the fixed hyperparameter grid, scored by k-fold
/// MAE. Ties keep the earliest grid entry, so the result is deterministic.
pub fn grid_search(x: &Array2<f64>, y: &Array1<f64>, folds: usize, seed: u64) -> (ForestParams, CvScore) {
    let mut best: Option<(ForestParams, CvScore)> = None;

    for &n_estimators in &N_ESTIMATORS_GRID {
        for &max_depth in &MAX_DEPTH_GRID {
            for &min_samples_split in &MIN_SPLIT_GRID {
                let params = ForestParams {
                    n_estimators,
                    max_depth,
                    min_samples_split,
                };
                let score = k_fold_mae(x, y, params, folds, seed);
                debug!(
                    n_estimators,
                    ?max_depth,
                    min_samples_split,
                    mae = score.mean_mae,
                    "grid candidate evaluated"
                );
                let better = match &best {
                    Some((_, incumbent)) => score.mean_mae < incumbent.mean_mae,
                    None => true,
                };
                if better {
                    best = Some((params, score));
                }
            }
        }
    }

    best.expect("grid is non-empty")
}
