use thiserror::Error;

use super::{Curvature, ParamId};

/// Errors raised when an objective cannot be minimized as a convex problem.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DcpError {
    #[error("invalid objective expression: {0}")]
    Invalid(String),

    #[error("objective has {0} curvature and cannot be minimized")]
    NotConvex(Curvature),

    #[error("objective refers to a variable or parameter from another problem")]
    Foreign,
}

/// Errors raised when configuring or solving a problem.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProblemError {
    #[error("parameter {0:?} does not belong to this problem")]
    UnknownParameter(ParamId),

    #[error("parameter {id:?} expects {expected} values, got {got}")]
    ParameterLength {
        id: ParamId,
        expected: usize,
        got: usize,
    },

    #[error("parameter {0:?} is declared nonnegative but was given a negative value")]
    NegativeParameter(ParamId),

    #[error("parameter {0:?} has no value")]
    ParameterUnset(ParamId),

    #[error("fixed index {index} is out of range for a variable of length {len}")]
    FixedIndex { index: usize, len: usize },

    #[error("{indices} fixed indices were given {values} values")]
    FixedLength { indices: usize, values: usize },

    #[error("warm start has length {got}, expected {expected}")]
    WarmStartLength { expected: usize, got: usize },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}
