//! Coulomb friction cone with tangential projection.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Isotropic Coulomb friction cone `{f : ‖f_t‖ ≤ μ f_n, f_n ≥ 0}`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrictionCone {
    /// Coulomb friction coefficient.
    pub mu: f64,
}

impl FrictionCone {
    /// Create a cone with the given coefficient.
    #[must_use]
    pub fn new(mu: f64) -> Self {
        Self { mu: mu.max(0.0) }
    }

    /// Check whether a tangential magnitude is admissible for a normal load.
    #[must_use]
    pub fn contains(&self, tangent_magnitude: f64, normal_magnitude: f64) -> bool {
        if self.mu.is_infinite() {
            return normal_magnitude >= 0.0 || tangent_magnitude == 0.0;
        }
        normal_magnitude >= 0.0 && tangent_magnitude <= self.mu * normal_magnitude + 1e-10
    }

    /// Maximum static friction for a normal load.
    #[must_use]
    pub fn max_friction(&self, normal_magnitude: f64) -> f64 {
        self.mu * normal_magnitude.max(0.0)
    }

    /// Project a local-frame force `[f_t1, f_t2, f_n]` onto the cone.
    ///
    /// A pulling force (`f_n < 0`) projects to zero; otherwise the
    /// tangential part is rescaled onto the cone boundary, normal kept.
    #[must_use]
    pub fn project(&self, f: Vector3<f64>) -> Vector3<f64> {
        let f_n = f.z;
        if f_n < 0.0 {
            return Vector3::zeros();
        }
        if self.mu.is_infinite() {
            return f;
        }
        let f_t = (f.x * f.x + f.y * f.y).sqrt();
        let max_t = self.mu * f_n;
        if f_t <= max_t || f_t < 1e-12 {
            f
        } else {
            let theta = f.y.atan2(f.x);
            Vector3::new(max_t * theta.cos(), max_t * theta.sin(), f_n)
        }
    }
}
