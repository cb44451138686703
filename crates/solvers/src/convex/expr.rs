use std::{
    ops::{Add, Mul, Neg, Sub},
    sync::Arc,
};

use nalgebra::DVector;

use super::curvature::{Curvature, Monotonicity, Sign};

/// Identifies a parameter within one problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub(super) usize);

/// Elementwise convex atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Atom {
    Abs,
    Square,
    /// `max(x, 0)`
    Pos,
}

impl Atom {
    fn monotonicity(self, sign: Sign) -> Monotonicity {
        match self {
            Self::Abs | Self::Square => sign.even_monotonicity(),
            Self::Pos => Monotonicity::Increasing,
        }
    }

    fn is_smooth(self) -> bool {
        matches!(self, Self::Square)
    }
}

#[derive(Debug)]
pub(super) enum Node {
    Variable,
    Parameter(ParamId),
    Constant(DVector<f64>),
    Add(Expr, Expr),
    Neg(Expr),
    Mul(Expr, Expr),
    Index(Expr, Vec<usize>),
    Sum(Expr),
    Elementwise(Atom, Expr),
    Norm2(Expr),
    Max(Expr),
    /// An expression that could not be built; carries the reason.
    Invalid(String),
}

/// A vector- or scalar-valued expression in one decision vector.
///
/// Expressions are built from a problem's variable and parameters with the
/// arithmetic operators and the atom methods. Each expression tracks its
/// [`Curvature`] and [`Sign`] as it is built, so a problem can reject a
/// non-convex objective before it is ever solved.
///
/// Shape errors (mismatched lengths, out-of-range indices) do not panic;
/// they produce an invalid expression that the problem rejects when it is
/// built.
#[derive(Debug, Clone)]
pub struct Expr {
    pub(super) node: Arc<Node>,
    len: usize,
    scalar: bool,
    curvature: Curvature,
    sign: Sign,
    smooth: bool,
}

impl Expr {
    pub(super) fn variable(len: usize) -> Self {
        Self {
            node: Arc::new(Node::Variable),
            len,
            scalar: false,
            curvature: Curvature::Affine,
            sign: Sign::Unknown,
            smooth: true,
        }
    }

    pub(super) fn parameter(id: ParamId, len: usize, scalar: bool, nonneg: bool) -> Self {
        Self {
            node: Arc::new(Node::Parameter(id)),
            len,
            scalar,
            curvature: Curvature::Constant,
            sign: if nonneg { Sign::Nonneg } else { Sign::Unknown },
            smooth: true,
        }
    }

    /// A constant vector.
    pub fn constant(values: impl Into<Vec<f64>>) -> Self {
        let values: Vec<f64> = values.into();
        Self {
            len: values.len(),
            scalar: false,
            curvature: Curvature::Constant,
            sign: Sign::of(&values),
            smooth: true,
            node: Arc::new(Node::Constant(DVector::from_vec(values))),
        }
    }

    /// A constant scalar, broadcast against vectors.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            scalar: true,
            ..Self::constant(vec![value])
        }
    }

    fn invalid(reason: String) -> Self {
        Self {
            node: Arc::new(Node::Invalid(reason)),
            len: 0,
            scalar: true,
            curvature: Curvature::Unknown,
            sign: Sign::Unknown,
            smooth: true,
        }
    }

    /// Number of entries (1 for scalars).
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    #[must_use]
    pub fn curvature(&self) -> Curvature {
        self.curvature
    }

    #[must_use]
    pub fn sign(&self) -> Sign {
        self.sign
    }

    /// Returns `false` if the expression contains a nonsmooth atom.
    #[must_use]
    pub fn is_smooth(&self) -> bool {
        self.smooth
    }

    /// The reason this expression is invalid, if it is.
    #[must_use]
    pub fn invalid_reason(&self) -> Option<&str> {
        self.find_invalid()
    }

    fn find_invalid(&self) -> Option<&str> {
        match self.node.as_ref() {
            Node::Invalid(reason) => Some(reason),
            Node::Variable | Node::Parameter(_) | Node::Constant(_) => None,
            Node::Add(a, b) | Node::Mul(a, b) => a.find_invalid().or_else(|| b.find_invalid()),
            Node::Neg(a)
            | Node::Index(a, _)
            | Node::Sum(a)
            | Node::Elementwise(_, a)
            | Node::Norm2(a)
            | Node::Max(a) => a.find_invalid(),
        }
    }

    fn is_invalid(&self) -> bool {
        matches!(self.node.as_ref(), Node::Invalid(_))
    }

    /// Shape of the result of an elementwise binary operation.
    fn broadcast(&self, other: &Self, op: &str) -> Result<(usize, bool), Self> {
        if self.is_invalid() {
            return Err(self.clone());
        }
        if other.is_invalid() {
            return Err(other.clone());
        }
        match (self.scalar, other.scalar) {
            (true, true) => Ok((1, true)),
            (true, false) => Ok((other.len, false)),
            (false, true) => Ok((self.len, false)),
            (false, false) if self.len == other.len => Ok((self.len, false)),
            (false, false) => Err(Self::invalid(format!(
                "cannot {op} expressions of length {} and {}",
                self.len, other.len
            ))),
        }
    }

    fn unary(&self, node: Node, len: usize, scalar: bool, curvature: Curvature, sign: Sign) -> Self {
        if self.is_invalid() {
            return self.clone();
        }
        Self {
            node: Arc::new(node),
            len,
            scalar,
            curvature,
            sign,
            smooth: self.smooth,
        }
    }

    fn elementwise(&self, atom: Atom) -> Self {
        let curvature = self.curvature.compose_convex(atom.monotonicity(self.sign));
        let mut expr = self.unary(
            Node::Elementwise(atom, self.clone()),
            self.len,
            self.scalar,
            curvature,
            Sign::Nonneg,
        );
        expr.smooth &= atom.is_smooth();
        expr
    }

    /// Elementwise absolute value.
    #[must_use]
    pub fn abs(&self) -> Self {
        self.elementwise(Atom::Abs)
    }

    /// Elementwise square.
    #[must_use]
    pub fn square(&self) -> Self {
        self.elementwise(Atom::Square)
    }

    /// Elementwise `max(x, 0)`.
    #[must_use]
    pub fn pos(&self) -> Self {
        self.elementwise(Atom::Pos)
    }

    /// Sum of entries.
    #[must_use]
    pub fn sum(&self) -> Self {
        self.unary(
            Node::Sum(self.clone()),
            1,
            true,
            self.curvature,
            self.sign,
        )
    }

    /// Sum of squared entries.
    #[must_use]
    pub fn sum_squares(&self) -> Self {
        self.square().sum()
    }

    /// Sum of absolute values of entries.
    #[must_use]
    pub fn norm1(&self) -> Self {
        self.abs().sum()
    }

    /// Euclidean norm.
    #[must_use]
    pub fn norm2(&self) -> Self {
        let curvature = self
            .curvature
            .compose_convex(self.sign.even_monotonicity());
        let mut expr = self.unary(Node::Norm2(self.clone()), 1, true, curvature, Sign::Nonneg);
        expr.smooth = false;
        expr
    }

    /// Largest entry.
    #[must_use]
    pub fn max(&self) -> Self {
        let curvature = self.curvature.compose_convex(Monotonicity::Increasing);
        let mut expr = self.unary(Node::Max(self.clone()), 1, true, curvature, self.sign);
        expr.smooth = false;
        expr
    }

    /// Selects entries by index.
    #[must_use]
    pub fn index(&self, indices: &[usize]) -> Self {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len) {
            return Self::invalid(format!(
                "index {bad} out of range for expression of length {}",
                self.len
            ));
        }
        self.unary(
            Node::Index(self.clone(), indices.to_vec()),
            indices.len(),
            false,
            self.curvature,
            self.sign,
        )
    }

    /// Elementwise product; one side must not depend on the variable.
    #[must_use]
    pub fn mul_elementwise(&self, other: &Self) -> Self {
        let (len, scalar) = match self.broadcast(other, "multiply") {
            Ok(shape) => shape,
            Err(invalid) => return invalid,
        };

        let curvature = match (self.curvature, other.curvature) {
            (Curvature::Constant, c) => c.scale(self.sign),
            (c, Curvature::Constant) => c.scale(other.sign),
            _ => Curvature::Unknown,
        };

        Self {
            node: Arc::new(Node::Mul(self.clone(), other.clone())),
            len,
            scalar,
            curvature,
            sign: self.sign.mul(other.sign),
            smooth: self.smooth && other.smooth,
        }
    }

    fn add_expr(&self, other: &Self) -> Self {
        let (len, scalar) = match self.broadcast(other, "add") {
            Ok(shape) => shape,
            Err(invalid) => return invalid,
        };

        Self {
            node: Arc::new(Node::Add(self.clone(), other.clone())),
            len,
            scalar,
            curvature: self.curvature.add(other.curvature),
            sign: self.sign.add(other.sign),
            smooth: self.smooth && other.smooth,
        }
    }

    fn negate(&self) -> Self {
        self.unary(
            Node::Neg(self.clone()),
            self.len,
            self.scalar,
            self.curvature.negate(),
            self.sign.negate(),
        )
    }
}

macro_rules! impl_binary {
    ($trait:ident, $method:ident, |$a:ident, $b:ident| $body:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                let ($a, $b) = (&self, &rhs);
                $body
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                let ($a, $b) = (&self, rhs);
                $body
            }
        }

        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                let ($a, $b) = (self, &rhs);
                $body
            }
        }

        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                let ($a, $b) = (self, rhs);
                $body
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                let rhs = Expr::scalar(rhs);
                let ($a, $b) = (&self, &rhs);
                $body
            }
        }

        impl $trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                let rhs = Expr::scalar(rhs);
                let ($a, $b) = (self, &rhs);
                $body
            }
        }
    };
}

impl_binary!(Add, add, |a, b| a.add_expr(b));
impl_binary!(Sub, sub, |a, b| a.add_expr(&b.negate()));
impl_binary!(Mul, mul, |a, b| a.mul_elementwise(b));

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        self.negate()
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        self.negate()
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::scalar(self).mul_elementwise(&rhs)
    }
}

impl Mul<&Expr> for f64 {
    type Output = Expr;
    fn mul(self, rhs: &Expr) -> Expr {
        Expr::scalar(self).mul_elementwise(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn y() -> Expr {
        Expr::variable(3)
    }

    #[test]
    fn least_squares_is_convex_and_smooth() {
        let target = Expr::constant(vec![1.0, 2.0, 3.0]);
        let cost = (y() - target).sum_squares();

        assert!(cost.is_scalar());
        assert_eq!(cost.curvature(), Curvature::Convex);
        assert_eq!(cost.sign(), Sign::Nonneg);
        assert!(cost.is_smooth());
    }

    #[test]
    fn negated_convex_is_concave() {
        let cost = -(y().norm1());
        assert_eq!(cost.curvature(), Curvature::Concave);
        assert!(!cost.curvature().is_convex());
    }

    #[test]
    fn square_of_convex_needs_nonneg_argument() {
        // abs(y) is convex and nonnegative, so its square is convex.
        assert_eq!(y().abs().square().curvature(), Curvature::Convex);
        // max(y) is convex with unknown sign, so its square is not provable.
        assert_eq!(y().max().square().curvature(), Curvature::Unknown);
    }

    #[test]
    fn product_of_variables_is_not_dcp() {
        assert_eq!((y() * y()).curvature(), Curvature::Unknown);
        assert_eq!((2.0 * y()).curvature(), Curvature::Affine);
        assert_eq!((y().abs() * -1.0).curvature(), Curvature::Concave);
    }

    #[test]
    fn shape_errors_become_invalid_expressions() {
        let bad = y() + Expr::constant(vec![1.0, 2.0]);
        assert!(bad.invalid_reason().is_some());

        let propagated = (bad * 2.0).sum();
        assert!(propagated.invalid_reason().is_some());

        assert!(y().index(&[0, 5]).invalid_reason().is_some());
        assert!(y().index(&[2, 0]).invalid_reason().is_none());
    }

    #[test]
    fn scalars_broadcast() {
        let shifted = y() + 1.0;
        assert_eq!(shifted.len(), 3);
        assert!(!shifted.is_scalar());
        assert!(shifted.invalid_reason().is_none());
    }
}
