use gds_core::TimeIncrementError;
use gds_solvers::{
    convex::{self, DcpError, ProblemError},
    ode::{self, ConstructError},
};
use thiserror::Error;

/// Errors raised by systems and couplings.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// A convex step did not reach an optimal solution.
    #[error("convex step at t = {t} ended with status: {status}")]
    Solve { t: f64, status: convex::Status },

    /// The convex problem rejected its parameter or warm-start values.
    #[error("convex problem error: {0}")]
    Problem(#[from] ProblemError),

    /// No integrator candidate could be constructed.
    #[error("integrator construction failed: {0}")]
    Construct(#[from] ConstructError),

    /// The integrator gave up before reaching its horizon.
    #[error("integration failed: {0}")]
    Integration(#[source] Box<ode::Error<Error>>),

    #[error("invalid step: {0}")]
    Step(#[from] TimeIncrementError),
}

impl Error {
    /// Unwraps errors raised by the system being integrated.
    pub(crate) fn from_integration(err: ode::Error<Error>) -> Self {
        match err {
            ode::Error::System(err) => err,
            other => Self::Integration(Box::new(other)),
        }
    }
}

/// Invalid configuration, detected when a system is defined.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no evolution law was specified")]
    NoLaw,

    #[error("exactly one evolution law must be specified, got {0}")]
    MultipleLaws(usize),

    #[error("differential order must be at least one")]
    Order,

    #[error("tick interval must be finite and positive, got {0}")]
    TickInterval(f64),

    #[error("cost is not disciplined-convex: {0}")]
    Dcp(#[from] DcpError),

    #[error("Dirichlet and Neumann conditions overlap on {0:?}")]
    Overlap(Vec<String>),

    #[error("boundary condition has no value for constrained point {point} at t = {t}")]
    MissingBoundaryValue { point: String, t: f64 },

    #[error("boundary table refers to point {0} outside the domain")]
    UnknownPoint(String),

    #[error("initial values have length {got}, expected {ndim} or {full}")]
    InitialLength { ndim: usize, full: usize, got: usize },

    #[error("no sibling named {0:?} is available")]
    UnknownSibling(String),

    #[error("coupling needs at least two systems, got {0}")]
    TooFewMembers(usize),

    #[error("member name {0:?} is used more than once")]
    DuplicateMember(String),

    #[error("member {name:?} must start at t = 0, found t = {t}")]
    NotAtZero { name: String, t: f64 },
}

/// Operations called out of order.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    #[error("evolution law is not defined; call set_evolution first")]
    EvolutionUndefined,

    #[error("initial condition is not defined; call set_initial first")]
    InitialUndefined,

    #[error("evolution law is already defined")]
    EvolutionDefined,
}
