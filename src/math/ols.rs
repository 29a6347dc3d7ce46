//! Ordinary least squares.
//!
//! Regressions here are tiny (an intercept plus one or two regressors over a
//! few thousand settlement rows), so we solve the tall system directly with an
//! SVD instead of forming normal equations. Nalgebra's `QR::solve` only
//! accepts square systems.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

/// Solve `min ||y - X β||²` using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// `y = intercept + slope * x` with in-sample fit quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineFit {
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: f64,
    pub rmse: f64,
    pub n: usize,
}

impl LineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Simple linear regression of `y` on `x`.
///
/// `None` for mismatched lengths, fewer than two points, or a constant `x`.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<LineFit> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }
    if x.iter().all(|v| *v == x[0]) {
        return None;
    }

    let design = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { x[r] });
    let target = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &target)?;
    let fit = LineFit {
        intercept: beta[0],
        slope: beta[1],
        r_squared: 0.0,
        rmse: 0.0,
        n,
    };

    let y_mean = y.iter().sum::<f64>() / n as f64;
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (yi - fit.predict(*xi)).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    // A constant target is fitted exactly.
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

    Some(LineFit {
        r_squared,
        rmse: (ss_res / n as f64).sqrt(),
        ..fit
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn exact_line_has_unit_r_squared() {
        let x = [4000.0, 5000.0, 6000.0, 7000.0];
        let y: Vec<f64> = x.iter().map(|v| -50.0 + 0.04 * v).collect();
        let fit = fit_line(&x, &y).unwrap();
        assert!((fit.intercept + 50.0).abs() < 1e-6);
        assert!((fit.slope - 0.04).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
        assert!(fit.rmse < 1e-6);
    }

    #[test]
    fn noisy_line_fit_quality() {
        // Residuals +1, -1, -1, +1 around y = x.
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 0.0, 1.0, 4.0];
        let fit = fit_line(&x, &y).unwrap();
        assert!((fit.slope - 1.0).abs() < 1e-9);
        assert!(fit.intercept.abs() < 1e-9);
        assert!((fit.rmse - 1.0).abs() < 1e-9);
        // ss_tot = 9, ss_res = 4
        assert!((fit.r_squared - 5.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(fit_line(&[1.0], &[1.0]).is_none());
        assert!(fit_line(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(fit_line(&[1.0, 2.0], &[1.0]).is_none());
    }
}
