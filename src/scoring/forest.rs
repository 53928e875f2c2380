use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Hyperparameters of one random-forest configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// None grows trees until the split criteria stop them
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Bagged ensemble of CART regression trees with variance-reduction splits.
///
/// Fitting is deterministic for a given seed: tree `i` draws its bootstrap
/// sample from a generator seeded with `seed + i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    importances: Vec<f64>,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: ForestParams, seed: u64) -> Self {
        let n_rows = x.len_of(Axis(0));
        let n_features = x.len_of(Axis(1));
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for tree_idx in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
            let indices: Vec<usize> = if n_rows == 0 {
                Vec::new()
            } else {
                (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
            };
            let mut tree_importances = vec![0.0; n_features];
            let root = build_node(x, y, &indices, 0, params, &mut tree_importances);
            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, imp) in importances.iter_mut().zip(tree_importances.iter()) {
                    *acc += imp / total;
                }
            }
            trees.push(DecisionTree { root });
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in importances.iter_mut() {
                *imp /= total;
            }
        }

        Self {
            params,
            trees,
            importances,
            n_features,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let n_rows = x.len_of(Axis(0));
        let mut predictions = Array1::zeros(n_rows);
        if self.trees.is_empty() {
            return predictions;
        }
        let mut row_buffer = vec![0.0; self.n_features];
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            for (slot, value) in row_buffer.iter_mut().zip(row.iter()) {
                *slot = *value;
            }
            let sum: f64 = self
                .trees
                .iter()
                .map(|tree| tree.predict_row(&row_buffer))
                .sum();
            predictions[i] = sum / self.trees.len() as f64;
        }
        predictions
    }

    /// Mean impurity-decrease importance per feature, normalized to sum 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }
}

fn mean_of(y: &Array1<f64>, indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

fn build_node(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    depth: usize,
    params: ForestParams,
    importances: &mut [f64],
) -> Node {
    let leaf = Node::Leaf {
        value: mean_of(y, indices),
    };
    if indices.len() < params.min_samples_split {
        return leaf;
    }
    if let Some(max_depth) = params.max_depth {
        if depth >= max_depth {
            return leaf;
        }
    }
    let split = match best_split(x, y, indices) {
        Some(split) => split,
        None => return leaf,
    };

    importances[split.feature] += split.gain;

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| x[[i, split.feature]] <= split.threshold);

    let left = build_node(x, y, &left_idx, depth + 1, params, importances);
    let right = build_node(x, y, &right_idx, depth + 1, params, importances);
    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Exhaustive scan for the split minimizing the summed squared error of the
/// two children. Returns None when every feature is constant over `indices`.
fn best_split(x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<Split> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let node_sse = total_sq - total_sum * total_sum / n as f64;
    if node_sse <= f64::EPSILON {
        return None;
    }

    let n_features = x.len_of(Axis(1));
    let mut best: Option<Split> = None;
    let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(n);

    for feature in 0..n_features {
        sorted.clear();
        sorted.extend(indices.iter().map(|&i| (x[[i, feature]], y[i])));
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("finite feature values"));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for split_at in 1..n {
            let (value, label) = sorted[split_at - 1];
            left_sum += label;
            left_sq += label * label;
            // only split between distinct feature values
            if sorted[split_at].0 <= value {
                continue;
            }
            let left_n = split_at as f64;
            let right_n = (n - split_at) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n)
                + (right_sq - right_sum * right_sum / right_n);
            let gain = node_sse - sse;
            if gain > best.as_ref().map_or(0.0, |b| b.gain) {
                best = Some(Split {
                    feature,
                    threshold: (value + sorted[split_at].0) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
