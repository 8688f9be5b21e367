//! In-place dense Cholesky factorization for the mass matrix.
//!
//! The per-substep path needs `M⁻¹(τ − c)` and an explicit `M⁻¹` without
//! heap allocation, so the factorization runs in caller-owned buffers.

use nalgebra::{DMatrix, DVector};
use softstep_types::SimError;

/// Factor a symmetric positive-definite matrix in place: `A = L Lᵀ`.
///
/// On return the lower triangle of `a` holds `L`; the strict upper triangle
/// is left untouched and must be ignored by the solve routines.
///
/// # Errors
///
/// [`SimError::NumericalFailure`] when a pivot is non-positive or non-finite
/// (mass matrix not positive definite).
pub fn cholesky_in_place(a: &mut DMatrix<f64>) -> Result<(), SimError> {
    let n = a.nrows();
    for j in 0..n {
        let mut d = a[(j, j)];
        for k in 0..j {
            d -= a[(j, k)] * a[(j, k)];
        }
        if !(d.is_finite() && d > 0.0) {
            return Err(SimError::numerical(format!(
                "mass matrix not positive definite at pivot {j} (d = {d})"
            )));
        }
        let d = d.sqrt();
        a[(j, j)] = d;
        for i in (j + 1)..n {
            let mut s = a[(i, j)];
            for k in 0..j {
                s -= a[(i, k)] * a[(j, k)];
            }
            a[(i, j)] = s / d;
        }
    }
    Ok(())
}

/// Solve `L Lᵀ x = b` in place, with `l` from [`cholesky_in_place`].
pub fn cholesky_solve_in_place(l: &DMatrix<f64>, x: &mut DVector<f64>) {
    let n = l.nrows();
    // Forward: L y = b
    for i in 0..n {
        let mut s = x[i];
        for k in 0..i {
            s -= l[(i, k)] * x[k];
        }
        x[i] = s / l[(i, i)];
    }
    // Backward: Lᵀ x = y
    for i in (0..n).rev() {
        let mut s = x[i];
        for k in (i + 1)..n {
            s -= l[(k, i)] * x[k];
        }
        x[i] = s / l[(i, i)];
    }
}

/// Invert via the factor: write `A⁻¹` into `out` (preallocated `n × n`),
/// using `scratch` (length `n`) as the column buffer.
pub fn cholesky_inverse_into(
    l: &DMatrix<f64>,
    out: &mut DMatrix<f64>,
    scratch: &mut DVector<f64>,
) {
    let n = l.nrows();
    for col in 0..n {
        scratch.fill(0.0);
        scratch[col] = 1.0;
        cholesky_solve_in_place(l, scratch);
        for row in 0..n {
            out[(row, col)] = scratch[row];
        }
    }
}
