use std::fmt;

/// Supported integration methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// Linearly implicit Rosenbrock 2(3) method (Shampine–Reichelt).
    ///
    /// L-stable and robust for stiff problems. Each micro-step builds a dense
    /// finite-difference Jacobian and factors an `n × n` matrix, so
    /// construction fails when the state dimension exceeds
    /// [`Options::dense_jacobian_limit`](super::Options::dense_jacobian_limit).
    Rosenbrock23,

    /// Adaptive Dormand–Prince 5(4) Runge–Kutta method.
    ///
    /// Explicit, embedded error estimate, first-same-as-last. Efficient for
    /// non-stiff problems of any dimension.
    Dopri5,

    /// Classic fixed-step 4th-order Runge–Kutta method.
    ///
    /// Steps with [`Options::first_step`](super::Options::first_step) if set,
    /// otherwise with the maximum step. No error control.
    Rk4,
}

impl Method {
    /// Order of the embedded error estimator, used for step-size control.
    pub(crate) fn error_order(self) -> Option<u32> {
        match self {
            Self::Rosenbrock23 => Some(2),
            Self::Dopri5 => Some(4),
            Self::Rk4 => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rosenbrock23 => "Rosenbrock23",
            Self::Dopri5 => "Dopri5",
            Self::Rk4 => "Rk4",
        };
        f.write_str(name)
    }
}
