//! Compliance parameters for contact objects.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Physical parameters of the linear spring–damper contact law.
///
/// The contact force in the object's local tangent–tangent–normal frame is
///
/// ```text
/// f = -K (p - p0) - B ṗ,   K = diag(kt, kt, kn),  B = diag(bt, bt, bn)
/// ```
///
/// with the anchor `p0` planted where the contact first activated.
///
/// # Example
///
/// ```
/// use softstep_contact::ContactParams;
///
/// let params = ContactParams::default()
///     .with_normal_stiffness(1e5)
///     .with_friction(0.8);
/// assert!(params.friction_coefficient > 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactParams {
    /// Normal stiffness kn (N/m).
    pub normal_stiffness: f64,
    /// Tangential stiffness kt (N/m).
    pub tangential_stiffness: f64,
    /// Normal damping bn (N·s/m).
    pub normal_damping: f64,
    /// Tangential damping bt (N·s/m).
    pub tangential_damping: f64,
    /// Coulomb friction coefficient μ (dimensionless). Use `f64::INFINITY`
    /// for a contact that can never slip.
    pub friction_coefficient: f64,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            normal_stiffness: 1e5,
            tangential_stiffness: 1e5,
            normal_damping: 3e2,
            tangential_damping: 3e2,
            friction_coefficient: 0.3,
        }
    }
}

impl ContactParams {
    /// Uniform stiffness/damping in all directions.
    #[must_use]
    pub fn uniform(stiffness: f64, damping: f64, friction: f64) -> Self {
        Self {
            normal_stiffness: stiffness,
            tangential_stiffness: stiffness,
            normal_damping: damping,
            tangential_damping: damping,
            friction_coefficient: friction,
        }
    }

    /// Soft parameters, useful for debugging instabilities.
    #[must_use]
    pub fn soft() -> Self {
        Self::uniform(1e4, 1e2, 0.5)
    }

    /// Set the normal stiffness.
    #[must_use]
    pub fn with_normal_stiffness(mut self, kn: f64) -> Self {
        self.normal_stiffness = kn;
        self
    }

    /// Set the tangential stiffness.
    #[must_use]
    pub fn with_tangential_stiffness(mut self, kt: f64) -> Self {
        self.tangential_stiffness = kt;
        self
    }

    /// Set the normal damping.
    #[must_use]
    pub fn with_normal_damping(mut self, bn: f64) -> Self {
        self.normal_damping = bn;
        self
    }

    /// Set the tangential damping.
    #[must_use]
    pub fn with_tangential_damping(mut self, bt: f64) -> Self {
        self.tangential_damping = bt;
        self
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, mu: f64) -> Self {
        self.friction_coefficient = mu.max(0.0);
        self
    }
}
