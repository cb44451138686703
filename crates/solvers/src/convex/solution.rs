use std::fmt;

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// The stopping criterion was met.
    Optimal,
    /// The iteration limit was reached first.
    MaxIters,
    /// The objective decreased without bound.
    Unbounded,
    /// The objective or a search direction became non-finite.
    NumericalFailure,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Optimal => "optimal",
            Self::MaxIters => "max iterations",
            Self::Unbounded => "unbounded",
            Self::NumericalFailure => "numerical failure",
        };
        f.write_str(name)
    }
}

/// Result of minimizing a problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Final status.
    pub status: Status,
    /// Minimizer, fixed entries included.
    pub x: Vec<f64>,
    /// Objective at `x`, evaluated without smoothing.
    pub objective: f64,
    /// Newton steps taken over all smoothing stages.
    pub iters: usize,
}

impl Solution {
    #[must_use]
    pub fn is_optimal(&self) -> bool {
        self.status == Status::Optimal
    }
}
