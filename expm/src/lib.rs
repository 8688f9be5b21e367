//! Matrix exponential and LTI trajectory integrals.
//!
//! For a linear time-invariant system `ẋ = A x + a` with initial state `x0`,
//! [`ExpIntegrator`] computes
//!
//! - `I₁ = ∫₀ʰ x(τ) dτ` — first integral of the trajectory,
//! - `I₂ = ∫₀ʰ ∫₀^τ x(s) ds dτ` — its double integral,
//!
//! both including the forced response, via the exponential of an augmented
//! block matrix (Van Loan's construction):
//!
//! ```text
//! d  [ x  ]   [ A  a  0  0 ] [ x  ]
//! ── [ u  ] = [ 0  0  0  0 ] [ u  ]       u(0) = 1, s₁(0) = s₂(0) = 0
//! dt [ s₁ ]   [ I  0  0  0 ] [ s₁ ]       s₁(h) = I₁, s₂(h) = I₂
//!    [ s₂ ]   [ 0  0  I  0 ] [ s₂ ]
//! ```
//!
//! Because the construction never inverts `A`, a singular `A` (the contact
//! system has a zero upper-left block) is handled exactly. The exponential
//! itself uses scaling-and-squaring with a truncated Taylor series run to
//! machine precision.
//!
//! All workspace is preallocated by [`ExpIntegrator::resize`]; steady-state
//! calls perform no heap allocation.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

use nalgebra::{DMatrix, DVector};
use softstep_types::SimError;

/// Maximum Taylor terms before the series is declared non-convergent.
const MAX_TAYLOR_TERMS: usize = 30;

/// Workspace for one augmented-matrix size.
#[derive(Debug, Clone)]
struct ExpmWorkspace {
    /// Augmented matrix (scaled in place).
    m: DMatrix<f64>,
    /// Current Taylor term.
    term: DMatrix<f64>,
    /// gemm scratch.
    tmp: DMatrix<f64>,
    /// Accumulated exponential.
    exp: DMatrix<f64>,
    /// Augmented initial state.
    z: DVector<f64>,
    /// Augmented propagated state.
    z_out: DVector<f64>,
}

impl ExpmWorkspace {
    fn empty() -> Self {
        Self {
            m: DMatrix::zeros(0, 0),
            term: DMatrix::zeros(0, 0),
            tmp: DMatrix::zeros(0, 0),
            exp: DMatrix::zeros(0, 0),
            z: DVector::zeros(0),
            z_out: DVector::zeros(0),
        }
    }

    fn resize(&mut self, d: usize) {
        self.m.resize_mut(d, d, 0.0);
        self.term.resize_mut(d, d, 0.0);
        self.tmp.resize_mut(d, d, 0.0);
        self.exp.resize_mut(d, d, 0.0);
        self.z.resize_vertically_mut(d, 0.0);
        self.z_out.resize_vertically_mut(d, 0.0);
    }

    /// Compute `exp` = e^`m` in place (destroys `m`, `term`, `tmp`).
    fn expm(&mut self) -> Result<(), SimError> {
        let d = self.m.nrows();

        // Scaling: bring the infinity norm under 1/2 so the Taylor series
        // converges in a handful of terms.
        let norm_inf = self
            .m
            .row_iter()
            .map(|row| row.iter().map(|x| x.abs()).sum::<f64>())
            .fold(0.0_f64, f64::max);
        if !norm_inf.is_finite() {
            return Err(SimError::numerical(
                "non-finite entries in matrix exponential input",
            ));
        }
        let s = if norm_inf > 0.5 {
            ((norm_inf / 0.5).log2().ceil() as u32).min(64)
        } else {
            0
        };
        if s > 0 {
            self.m /= f64::powi(2.0, s as i32);
        }

        // Taylor series with early exit.
        self.exp.fill(0.0);
        self.exp.fill_diagonal(1.0);
        self.term.fill(0.0);
        self.term.fill_diagonal(1.0);
        for k in 1..=MAX_TAYLOR_TERMS {
            #[allow(clippy::cast_precision_loss)]
            let inv_k = 1.0 / k as f64;
            self.tmp.gemm(inv_k, &self.term, &self.m, 0.0);
            std::mem::swap(&mut self.term, &mut self.tmp);
            self.exp += &self.term;

            let term_norm = self.term.iter().map(|x| x.abs()).fold(0.0_f64, f64::max);
            if term_norm < f64::EPSILON {
                break;
            }
        }

        // Squaring: e^M = (e^(M/2^s))^(2^s).
        for _ in 0..s {
            self.tmp.gemm(1.0, &self.exp, &self.exp, 0.0);
            std::mem::swap(&mut self.exp, &mut self.tmp);
        }

        for i in 0..d {
            for j in 0..d {
                if !self.exp[(i, j)].is_finite() {
                    return Err(SimError::numerical("non-finite matrix exponential"));
                }
            }
        }
        Ok(())
    }
}

/// Preallocated integrator for the LTI integrals `I₁` and `I₂`.
#[derive(Debug, Clone)]
pub struct ExpIntegrator {
    /// State dimension `n`.
    n: usize,
    /// Workspace for the `2n+1` single-integral system.
    w1: ExpmWorkspace,
    /// Workspace for the `3n+1` double-integral system.
    w2: ExpmWorkspace,
}

impl Default for ExpIntegrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpIntegrator {
    /// Create an integrator with no workspace; call [`resize`](Self::resize)
    /// before use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n: 0,
            w1: ExpmWorkspace::empty(),
            w2: ExpmWorkspace::empty(),
        }
    }

    /// Preallocate for state dimension `n`.
    pub fn resize(&mut self, n: usize) {
        self.n = n;
        self.w1.resize(2 * n + 1);
        self.w2.resize(3 * n + 1);
    }

    /// Current state dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.n
    }

    /// `out = ∫₀ʰ x(τ) dτ` for `ẋ = A x + a`, `x(0) = x0`.
    ///
    /// # Errors
    ///
    /// [`SimError::NumericalFailure`] when the exponential produces
    /// non-finite values.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `A`, `a`, `x0`, `out` match the configured
    /// dimension.
    pub fn integral_xt(
        &mut self,
        a_mat: &DMatrix<f64>,
        a_vec: &DVector<f64>,
        x0: &DVector<f64>,
        h: f64,
        out: &mut DVector<f64>,
    ) -> Result<(), SimError> {
        let n = self.n;
        debug_assert_eq!(a_mat.nrows(), n);
        debug_assert_eq!(a_vec.len(), n);
        debug_assert_eq!(x0.len(), n);
        debug_assert_eq!(out.len(), n);

        let w = &mut self.w1;
        w.m.fill(0.0);
        w.m.view_mut((0, 0), (n, n)).copy_from(a_mat);
        for i in 0..n {
            w.m[(i, n)] = a_vec[i];
            w.m[(n + 1 + i, i)] = 1.0;
        }
        w.m *= h;
        w.expm()?;

        w.z.fill(0.0);
        w.z.rows_mut(0, n).copy_from(x0);
        w.z[n] = 1.0;
        w.z_out.gemv(1.0, &w.exp, &w.z, 0.0);
        out.copy_from(&w.z_out.rows(n + 1, n));
        Ok(())
    }

    /// `out = ∫₀ʰ ∫₀^τ x(s) ds dτ` for `ẋ = A x + a`, `x(0) = x0`.
    ///
    /// # Errors
    ///
    /// [`SimError::NumericalFailure`] when the exponential produces
    /// non-finite values.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `A`, `a`, `x0`, `out` match the configured
    /// dimension.
    pub fn double_integral_xt(
        &mut self,
        a_mat: &DMatrix<f64>,
        a_vec: &DVector<f64>,
        x0: &DVector<f64>,
        h: f64,
        out: &mut DVector<f64>,
    ) -> Result<(), SimError> {
        let n = self.n;
        debug_assert_eq!(a_mat.nrows(), n);
        debug_assert_eq!(a_vec.len(), n);
        debug_assert_eq!(x0.len(), n);
        debug_assert_eq!(out.len(), n);

        let w = &mut self.w2;
        w.m.fill(0.0);
        w.m.view_mut((0, 0), (n, n)).copy_from(a_mat);
        for i in 0..n {
            w.m[(i, n)] = a_vec[i];
            w.m[(n + 1 + i, i)] = 1.0;
            w.m[(2 * n + 1 + i, n + 1 + i)] = 1.0;
        }
        w.m *= h;
        w.expm()?;

        w.z.fill(0.0);
        w.z.rows_mut(0, n).copy_from(x0);
        w.z[n] = 1.0;
        w.z_out.gemv(1.0, &w.exp, &w.z, 0.0);
        out.copy_from(&w.z_out.rows(2 * n + 1, n));
        Ok(())
    }
}
