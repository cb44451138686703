use thiserror::Error;

use super::Method;

/// Errors that can occur while stepping an [`Integrator`](super::Integrator).
#[derive(Debug, Error)]
pub enum Error<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The system failed to produce a derivative.
    #[error("system error: {0}")]
    System(#[source] E),

    /// Step-size control drove the step below the resolvable minimum.
    #[error("required step size {h:e} at t = {t} is below the minimum")]
    StepSizeTooSmall { t: f64, h: f64 },

    /// The micro-step budget for the current horizon was exhausted.
    #[error("exceeded {steps} micro-steps before reaching t = {t_bound}")]
    StepBudget { steps: usize, t_bound: f64 },
}

/// A candidate method that could not be constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub method: Method,
    pub reason: String,
}

/// Errors that can occur when constructing an integrator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstructError {
    #[error("{method} requires a dense Jacobian; dimension {dim} exceeds the limit of {limit}")]
    TooLarge {
        method: Method,
        dim: usize,
        limit: usize,
    },

    #[error("{method} needs a finite step size; set first_step or a finite max_step")]
    NoStepSize { method: Method },

    #[error("initial state contains non-finite values")]
    NonFinite,

    #[error("every candidate method failed: {0:?}")]
    Exhausted(Vec<Rejection>),
}
