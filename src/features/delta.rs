use ndarray::{Array1, Array2, Axis};

const EPSILON: f64 = 1e-12;

/// Regression-based temporal derivative of a per-frame feature matrix
/// (rows are frames). Edge frames reuse the nearest valid row.
pub(crate) fn delta_matrix(input: &Array2<f64>, window: usize) -> Array2<f64> {
    if input.is_empty() {
        return Array2::zeros((0, input.len_of(Axis(1))));
    }
    let frames = input.len_of(Axis(0));
    let coeffs = input.len_of(Axis(1));
    let mut output = Array2::zeros((frames, coeffs));
    let denominator = 2.0_f64
        * (1..=window)
            .map(|n| (n * n) as f64)
            .sum::<f64>()
            .max(EPSILON);

    for t in 0..frames {
        let mut numerator = Array1::zeros(coeffs);
        for n in 1..=window {
            let prev_idx = t.saturating_sub(n);
            let next_idx = (t + n).min(frames - 1);
            let prev = input.row(prev_idx);
            let next = input.row(next_idx);
            let diff = (&next - &prev).to_owned() * (n as f64);
            numerator += &diff;
        }
        output.row_mut(t).assign(&(&numerator / denominator));
    }

    output
}
