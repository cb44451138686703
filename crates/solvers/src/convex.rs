//! Disciplined convex minimization over one decision vector.
//!
//! Objectives are written as [`Expr`] trees over a problem's variable and
//! parameters. Curvature is tracked while the tree is built, so
//! [`ProblemBuilder::minimize`] rejects anything it cannot prove convex.
//!
//! A [`Problem`] is solved by damped Newton iteration. Nonsmooth atoms are
//! replaced by smooth approximations whose width shrinks stage by stage (see
//! [`Config`]); the reported objective is always the exact one. Entries of
//! the decision vector can be pinned with [`Problem::fix`], and every solve
//! starts from a caller-supplied warm start.

mod config;
mod curvature;
mod error;
mod eval;
mod expr;
mod problem;
mod solution;

#[cfg(test)]
mod tests;

pub use config::{Config, ConfigError};
pub use curvature::{Curvature, Sign};
pub use error::{DcpError, ProblemError};
pub use expr::{Expr, ParamId};
pub use problem::{Parameter, Problem, ProblemBuilder};
pub use solution::{Solution, Status};
