use thiserror::Error;

use super::Method;

/// Configuration shared by all integration methods.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Options {
    rtol: f64,
    atol: f64,
    max_step: f64,
    first_step: Option<f64>,
    max_steps: usize,
    dense_jacobian_limit: usize,
    candidates: Vec<Method>,
}

/// Errors that can occur when validating integrator options.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptionsError {
    #[error("rtol must be finite and positive, got {0}")]
    Rtol(f64),

    #[error("atol must be finite and non-negative, got {0}")]
    Atol(f64),

    #[error("max_step must be positive, got {0}")]
    MaxStep(f64),

    #[error("first_step must be finite and positive, got {0}")]
    FirstStep(f64),

    #[error("max_steps must be at least one")]
    MaxSteps,

    #[error("candidate method list is empty")]
    NoCandidates,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            max_step: 1e-3,
            first_step: None,
            max_steps: 1_000_000,
            dense_jacobian_limit: 1024,
            candidates: vec![Method::Rosenbrock23, Method::Dopri5],
        }
    }
}

impl Options {
    /// Returns a copy with new relative and absolute tolerances.
    ///
    /// # Errors
    ///
    /// Returns an error if `rtol` is not finite and positive or `atol` is not
    /// finite and non-negative.
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Result<Self, OptionsError> {
        if !rtol.is_finite() || rtol <= 0.0 {
            return Err(OptionsError::Rtol(rtol));
        }
        if !atol.is_finite() || atol < 0.0 {
            return Err(OptionsError::Atol(atol));
        }
        self.rtol = rtol;
        self.atol = atol;
        Ok(self)
    }

    /// Returns a copy with a new maximum micro-step size.
    ///
    /// `f64::INFINITY` removes the limit.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::MaxStep`] if `max_step` is NaN or not positive.
    pub fn with_max_step(mut self, max_step: f64) -> Result<Self, OptionsError> {
        if max_step.is_nan() || max_step <= 0.0 {
            return Err(OptionsError::MaxStep(max_step));
        }
        self.max_step = max_step;
        Ok(self)
    }

    /// Returns a copy with a fixed first step instead of the automatic choice.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::FirstStep`] if `first_step` is not finite and
    /// positive.
    pub fn with_first_step(mut self, first_step: f64) -> Result<Self, OptionsError> {
        if !first_step.is_finite() || first_step <= 0.0 {
            return Err(OptionsError::FirstStep(first_step));
        }
        self.first_step = Some(first_step);
        Ok(self)
    }

    /// Returns a copy with a new micro-step budget per horizon.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::MaxSteps`] if `max_steps` is zero.
    pub fn with_max_steps(mut self, max_steps: usize) -> Result<Self, OptionsError> {
        if max_steps == 0 {
            return Err(OptionsError::MaxSteps);
        }
        self.max_steps = max_steps;
        Ok(self)
    }

    /// Returns a copy with a new dimension limit for dense-Jacobian methods.
    #[must_use]
    pub fn with_dense_jacobian_limit(mut self, limit: usize) -> Self {
        self.dense_jacobian_limit = limit;
        self
    }

    /// Returns a copy with a new ordered list of candidate methods.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::NoCandidates`] if `candidates` is empty.
    pub fn with_candidates(
        mut self,
        candidates: impl IntoIterator<Item = Method>,
    ) -> Result<Self, OptionsError> {
        let candidates: Vec<_> = candidates.into_iter().collect();
        if candidates.is_empty() {
            return Err(OptionsError::NoCandidates);
        }
        self.candidates = candidates;
        Ok(self)
    }

    /// Combines options for a shared integrator.
    ///
    /// Takes the tightest tolerances, the smallest step limits, the largest
    /// budget, and the candidate order of `self`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            rtol: self.rtol.min(other.rtol),
            atol: self.atol.min(other.atol),
            max_step: self.max_step.min(other.max_step),
            first_step: match (self.first_step, other.first_step) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
            max_steps: self.max_steps.max(other.max_steps),
            dense_jacobian_limit: self.dense_jacobian_limit.min(other.dense_jacobian_limit),
            candidates: self.candidates.clone(),
        }
    }

    #[must_use]
    pub fn rtol(&self) -> f64 {
        self.rtol
    }

    #[must_use]
    pub fn atol(&self) -> f64 {
        self.atol
    }

    #[must_use]
    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    #[must_use]
    pub fn first_step(&self) -> Option<f64> {
        self.first_step
    }

    /// Maximum number of accepted micro-steps between two calls to
    /// [`Integrator::set_bound`](super::Integrator::set_bound).
    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Largest state dimension for which dense-Jacobian methods are built.
    #[must_use]
    pub fn dense_jacobian_limit(&self) -> usize {
        self.dense_jacobian_limit
    }

    #[must_use]
    pub fn candidates(&self) -> &[Method] {
        &self.candidates
    }
}
