use std::fmt;

/// Curvature of an expression under the disciplined-convex rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curvature {
    /// Does not depend on the decision variable.
    Constant,
    Affine,
    Convex,
    Concave,
    /// Not provably convex or concave by the composition rules.
    Unknown,
}

/// Known sign of an expression's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Nonneg,
    Nonpos,
    Unknown,
}

/// Monotonicity of a scalar atom over the sign of its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Monotonicity {
    Increasing,
    Decreasing,
    Neither,
}

impl Curvature {
    /// Returns `true` if the expression may be minimized.
    #[must_use]
    pub fn is_convex(self) -> bool {
        matches!(self, Self::Constant | Self::Affine | Self::Convex)
    }

    /// Returns `true` if the expression may be maximized.
    #[must_use]
    pub fn is_concave(self) -> bool {
        matches!(self, Self::Constant | Self::Affine | Self::Concave)
    }

    pub(super) fn add(self, other: Self) -> Self {
        use Curvature::{Affine, Concave, Constant, Convex, Unknown};
        match (self, other) {
            (Unknown, _) | (_, Unknown) | (Convex, Concave) | (Concave, Convex) => Unknown,
            (Constant, c) | (c, Constant) => c,
            (Affine, c) | (c, Affine) => c,
            (Convex, Convex) => Convex,
            (Concave, Concave) => Concave,
        }
    }

    pub(super) fn negate(self) -> Self {
        match self {
            Self::Convex => Self::Concave,
            Self::Concave => Self::Convex,
            c => c,
        }
    }

    /// Curvature of `c * self` for a constant `c` with the given sign.
    pub(super) fn scale(self, sign: Sign) -> Self {
        match (self, sign) {
            (Self::Constant | Self::Affine | Self::Unknown, _) => self,
            (c, Sign::Nonneg) => c,
            (c, Sign::Nonpos) => c.negate(),
            (_, Sign::Unknown) => Self::Unknown,
        }
    }

    /// Curvature of a convex atom applied to an argument of this curvature.
    pub(super) fn compose_convex(self, monotonicity: Monotonicity) -> Self {
        match (self, monotonicity) {
            (Self::Constant, _) => Self::Constant,
            (Self::Affine, _)
            | (Self::Convex, Monotonicity::Increasing)
            | (Self::Concave, Monotonicity::Decreasing) => Self::Convex,
            _ => Self::Unknown,
        }
    }
}

impl Sign {
    pub(super) fn of(values: &[f64]) -> Self {
        if values.iter().all(|v| *v >= 0.0) {
            Self::Nonneg
        } else if values.iter().all(|v| *v <= 0.0) {
            Self::Nonpos
        } else {
            Self::Unknown
        }
    }

    pub(super) fn add(self, other: Self) -> Self {
        if self == other { self } else { Self::Unknown }
    }

    pub(super) fn negate(self) -> Self {
        match self {
            Self::Nonneg => Self::Nonpos,
            Self::Nonpos => Self::Nonneg,
            Self::Unknown => Self::Unknown,
        }
    }

    pub(super) fn mul(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (a, b) if a == b => Self::Nonneg,
            _ => Self::Nonpos,
        }
    }

    /// Monotonicity of `|x|` or `x²` over arguments of this sign.
    pub(super) fn even_monotonicity(self) -> Monotonicity {
        match self {
            Self::Nonneg => Monotonicity::Increasing,
            Self::Nonpos => Monotonicity::Decreasing,
            Self::Unknown => Monotonicity::Neither,
        }
    }
}

impl fmt::Display for Curvature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constant => "constant",
            Self::Affine => "affine",
            Self::Convex => "convex",
            Self::Concave => "concave",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_follows_dcp_rules() {
        use Curvature::{Affine, Concave, Constant, Convex, Unknown};

        assert_eq!(Constant.add(Affine), Affine);
        assert_eq!(Affine.add(Convex), Convex);
        assert_eq!(Convex.add(Convex), Convex);
        assert_eq!(Convex.add(Concave), Unknown);
        assert_eq!(Concave.add(Constant), Concave);
    }

    #[test]
    fn scaling_by_negative_flips_curvature() {
        assert_eq!(Curvature::Convex.scale(Sign::Nonpos), Curvature::Concave);
        assert_eq!(Curvature::Convex.scale(Sign::Unknown), Curvature::Unknown);
        assert_eq!(Curvature::Affine.scale(Sign::Unknown), Curvature::Affine);
    }

    #[test]
    fn composition_requires_matching_monotonicity() {
        assert_eq!(
            Curvature::Convex.compose_convex(Monotonicity::Increasing),
            Curvature::Convex
        );
        assert_eq!(
            Curvature::Convex.compose_convex(Monotonicity::Neither),
            Curvature::Unknown
        );
        assert_eq!(
            Curvature::Concave.compose_convex(Monotonicity::Decreasing),
            Curvature::Convex
        );
    }
}
