//! Linear least squares solver.
//!
//! Each Levenberg–Marquardt iteration solves a small damped linear problem
//!
//! ```text
//! minimize ‖J δ - r‖² + λ ‖S δ‖²
//! ```
//!
//! which we express as an ordinary least squares problem on the augmented
//! system `[J; √λ S] δ = [r; 0]`.
//!
//! Implementation choices:
//! - We use SVD so the tall augmented matrix is handled directly.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The parameter dimension is 4, so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Stack `j` on top of a diagonal damping block `sqrt(lambda) * diag(scale)`
/// and pad `r` with zeros to match.
pub fn augment_damped(
    j: &DMatrix<f64>,
    r: &DVector<f64>,
    lambda: f64,
    scale: &[f64],
) -> (DMatrix<f64>, DVector<f64>) {
    let (n, p) = j.shape();
    let mut x = DMatrix::<f64>::zeros(n + p, p);
    x.view_mut((0, 0), (n, p)).copy_from(j);
    let sl = lambda.sqrt();
    for k in 0..p {
        x[(n + k, k)] = sl * scale[k];
    }

    let mut y = DVector::<f64>::zeros(n + p);
    y.rows_mut(0, n).copy_from(r);
    (x, y)
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
    fn damping_shrinks_the_step() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let r = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let (x0, y0) = augment_damped(&j, &r, 0.0, &[1.0, 1.0]);
        let free = solve_least_squares(&x0, &y0).unwrap();
        let (x1, y1) = augment_damped(&j, &r, 100.0, &[1.0, 1.0]);
        let damped = solve_least_squares(&x1, &y1).unwrap();

        assert_eq!(x1.shape(), (5, 2));
        assert!((free[1] - 3.0).abs() < 1e-10);
        assert!(damped.norm() < free.norm());
    }
}
