//! Simulator configuration.

use crate::SimError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a simulator instance.
///
/// One outer `step()` advances time by `dt`, internally split into
/// `n_substeps` equal substeps. Contact detection and force evaluation run
/// once per substep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulatorConfig {
    /// Outer timestep (seconds).
    pub dt: f64,

    /// Number of integration substeps per outer step.
    pub n_substeps: usize,

    /// Select the sparse exponential-system backend.
    ///
    /// Not built; selecting it makes `step()` fail with `NotImplemented`
    /// rather than silently falling back to the dense path.
    pub sparse_system: bool,

    /// Select the invertible-A exponential backend.
    ///
    /// Not built; same failure contract as `sparse_system`.
    pub invertible_system: bool,

    /// Update anchor points of sliding contacts after saturated substeps.
    pub update_anchors: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            dt: 1e-3,
            n_substeps: 1,
            sparse_system: false,
            invertible_system: false,
            update_anchors: false,
        }
    }
}

impl SimulatorConfig {
    /// Create a configuration with the given outer timestep and substep count.
    #[must_use]
    pub fn new(dt: f64, n_substeps: usize) -> Self {
        Self {
            dt,
            n_substeps,
            ..Default::default()
        }
    }

    /// Substep duration `dt / n_substeps`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sub_dt(&self) -> f64 {
        self.dt / self.n_substeps as f64
    }

    /// Enable the anchor-slip update for sliding contacts.
    #[must_use]
    pub fn with_anchor_update(mut self) -> Self {
        self.update_anchors = true;
        self
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] when `dt` is not positive and
    /// finite, or when `n_substeps` is zero.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(SimError::invalid_config(format!(
                "dt must be positive and finite, got {}",
                self.dt
            )));
        }
        if self.n_substeps == 0 {
            return Err(SimError::invalid_config("n_substeps must be at least 1"));
        }
        Ok(())
    }
}
