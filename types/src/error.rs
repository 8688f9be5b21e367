//! Error types for simulator operations.

use thiserror::Error;

/// Errors that can occur while driving the simulator.
///
/// All errors bubble unchanged to the facade boundary; the core never
/// recovers internally. Variants carry the offending dimensions or a short
/// context string so the caller can diagnose without re-running.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// `step` was called before `reset_state`.
    #[error("step() called before reset_state()")]
    NotReset,

    /// A vector dimension disagrees with the model.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which quantity was mis-sized (e.g. "q", "v", "tau").
        what: &'static str,
        /// Dimension required by the model.
        expected: usize,
        /// Dimension actually supplied.
        actual: usize,
    },

    /// A feature-gated code path was selected but is not built.
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// The missing path (e.g. "sparse exponential system").
        feature: &'static str,
    },

    /// A numerical backend produced a non-finite result.
    #[error("numerical failure: {context}")]
    NumericalFailure {
        /// Description of where the failure surfaced.
        context: String,
    },

    /// Invalid configuration supplied at construction.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl SimError {
    /// Create a dimension-mismatch error.
    #[must_use]
    pub fn dim(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Create a numerical-failure error.
    #[must_use]
    pub fn numerical(context: impl Into<String>) -> Self {
        Self::NumericalFailure {
            context: context.into(),
        }
    }

    /// Create an invalid-configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Check if this is a numerical failure.
    #[must_use]
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::NumericalFailure { .. })
    }

    /// Check if this is a dimension mismatch.
    #[must_use]
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::dim("tau", 7, 6);
        assert!(err.to_string().contains("tau"));
        assert!(err.to_string().contains('7'));

        let err = SimError::numerical("NaN in exp(A h)");
        assert!(err.to_string().contains("NaN"));

        assert!(SimError::NotReset.to_string().contains("reset_state"));
    }

    #[test]
    fn test_error_predicates() {
        assert!(SimError::numerical("x").is_numerical());
        assert!(!SimError::NotReset.is_numerical());
        assert!(SimError::dim("q", 1, 2).is_dimension_mismatch());
    }
}
