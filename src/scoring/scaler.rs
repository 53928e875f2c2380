use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column z-score scaling fitted on the training matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let n_rows = x.len_of(Axis(0)).max(1) as f64;
        let n_cols = x.len_of(Axis(1));
        let mut mean = vec![0.0; n_cols];
        let mut std = vec![1.0; n_cols];
        for col in 0..n_cols {
            let column = x.index_axis(Axis(1), col);
            let m = column.sum() / n_rows;
            let variance = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n_rows;
            mean[col] = m;
            let s = variance.sqrt();
            // constant columns pass through unscaled
            std[col] = if s == 0.0 { 1.0 } else { s };
        }
        Self { mean, std }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (col, value) in row.iter_mut().enumerate() {
                *value = (*value - self.mean[col]) / self.std[col];
            }
        }
        out
    }
}
