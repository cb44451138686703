use nalgebra::{DMatrix, DVector};
use tracing::debug;

use super::{
    Config, DcpError, ProblemError, Solution, Status,
    eval::Point,
    expr::{Expr, Node, ParamId},
};

/// Objective values below this are reported as unbounded.
const UNBOUNDED: f64 = 1e20;

/// Sufficient-decrease constant for the backtracking line search.
const ARMIJO: f64 = 1e-4;

const MAX_BACKTRACKS: usize = 60;
const MAX_DAMPING_TRIES: usize = 40;

/// A parameter handle returned by [`ProblemBuilder::parameter`].
#[derive(Debug, Clone)]
pub struct Parameter {
    id: ParamId,
    expr: Expr,
}

impl Parameter {
    #[must_use]
    pub fn id(&self) -> ParamId {
        self.id
    }

    /// The expression standing for this parameter's value.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

#[derive(Debug, Clone)]
struct Slot {
    len: usize,
    nonneg: bool,
    value: Option<DVector<f64>>,
}

/// Builds a [`Problem`] over one decision vector of fixed length.
///
/// # Example
///
/// ```
/// use gds_solvers::convex::{Config, ProblemBuilder};
///
/// let mut builder = ProblemBuilder::new(2);
/// let y = builder.variable();
/// let target = builder.parameter(2, false);
/// let mut problem = builder
///     .minimize((&y - target.expr()).sum_squares())
///     .unwrap();
///
/// problem.set_parameter(target.id(), &[3.0, -1.0]).unwrap();
/// let solution = problem.solve(&[0.0, 0.0], &Config::default()).unwrap();
/// assert!(solution.is_optimal());
/// assert!((solution.x[0] - 3.0).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct ProblemBuilder {
    len: usize,
    slots: Vec<Slot>,
}

impl ProblemBuilder {
    /// Starts a problem whose decision vector has `len` entries.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            len,
            slots: Vec::new(),
        }
    }

    /// The decision vector.
    #[must_use]
    pub fn variable(&self) -> Expr {
        Expr::variable(self.len)
    }

    /// Declares a vector parameter whose value is supplied before each solve.
    ///
    /// A `nonneg` parameter is known to be nonnegative, which lets it scale
    /// convex expressions.
    pub fn parameter(&mut self, len: usize, nonneg: bool) -> Parameter {
        self.declare(len, false, nonneg)
    }

    /// Declares a scalar parameter that broadcasts against vectors.
    pub fn scalar_parameter(&mut self, nonneg: bool) -> Parameter {
        self.declare(1, true, nonneg)
    }

    fn declare(&mut self, len: usize, scalar: bool, nonneg: bool) -> Parameter {
        let id = ParamId(self.slots.len());
        self.slots.push(Slot {
            len,
            nonneg,
            value: None,
        });
        Parameter {
            id,
            expr: Expr::parameter(id, len, scalar, nonneg),
        }
    }

    /// Finishes the problem with an objective to minimize.
    ///
    /// A vector objective is reduced to the sum of its absolute values.
    ///
    /// # Errors
    ///
    /// Returns a [`DcpError`] if the objective is malformed, refers to
    /// another problem's variable or parameters, or is not provably convex.
    pub fn minimize(self, objective: Expr) -> Result<Problem, DcpError> {
        if let Some(reason) = objective.invalid_reason() {
            return Err(DcpError::Invalid(reason.to_owned()));
        }
        check_leaves(&objective, self.len, &self.slots)?;

        let objective = if objective.is_scalar() {
            objective
        } else {
            objective.norm1()
        };
        if !objective.curvature().is_convex() {
            return Err(DcpError::NotConvex(objective.curvature()));
        }

        Ok(Problem {
            len: self.len,
            fixed: vec![None; self.len],
            slots: self.slots,
            objective,
        })
    }
}

fn check_leaves(expr: &Expr, len: usize, slots: &[Slot]) -> Result<(), DcpError> {
    match expr.node.as_ref() {
        Node::Variable if expr.len() == len => Ok(()),
        Node::Parameter(id) if slots.get(id.0).is_some_and(|s| s.len == expr.len()) => Ok(()),
        Node::Variable | Node::Parameter(_) => Err(DcpError::Foreign),
        Node::Constant(_) | Node::Invalid(_) => Ok(()),
        Node::Add(a, b) | Node::Mul(a, b) => {
            check_leaves(a, len, slots)?;
            check_leaves(b, len, slots)
        }
        Node::Neg(a)
        | Node::Index(a, _)
        | Node::Sum(a)
        | Node::Elementwise(_, a)
        | Node::Norm2(a)
        | Node::Max(a) => check_leaves(a, len, slots),
    }
}

/// A convex minimization problem over one decision vector.
///
/// Entries of the vector can be fixed to given values; they are removed from
/// the search and reported unchanged in the solution.
#[derive(Debug, Clone)]
pub struct Problem {
    len: usize,
    slots: Vec<Slot>,
    fixed: Vec<Option<f64>>,
    objective: Expr,
}

impl Problem {
    /// Length of the decision vector.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The scalar objective being minimized.
    #[must_use]
    pub fn objective(&self) -> &Expr {
        &self.objective
    }

    /// Sets the value of a parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is unknown, the length is wrong, a
    /// value is not finite, or a nonnegative parameter gets a negative value.
    pub fn set_parameter(&mut self, id: ParamId, values: &[f64]) -> Result<(), ProblemError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or(ProblemError::UnknownParameter(id))?;

        if values.len() != slot.len {
            return Err(ProblemError::ParameterLength {
                id,
                expected: slot.len,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ProblemError::NonFinite("parameter value"));
        }
        if slot.nonneg && values.iter().any(|v| *v < 0.0) {
            return Err(ProblemError::NegativeParameter(id));
        }

        slot.value = Some(DVector::from_column_slice(values));
        Ok(())
    }

    /// Fixes entries of the decision vector, replacing any earlier fixings.
    ///
    /// # Errors
    ///
    /// Returns an error if the slices differ in length, an index is out of
    /// range, or a value is not finite.
    pub fn fix(&mut self, indices: &[usize], values: &[f64]) -> Result<(), ProblemError> {
        if indices.len() != values.len() {
            return Err(ProblemError::FixedLength {
                indices: indices.len(),
                values: values.len(),
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i >= self.len) {
            return Err(ProblemError::FixedIndex {
                index,
                len: self.len,
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ProblemError::NonFinite("fixed value"));
        }

        self.fixed.fill(None);
        for (&i, &v) in indices.iter().zip(values) {
            self.fixed[i] = Some(v);
        }
        Ok(())
    }

    /// Evaluates the objective at `x` without smoothing.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` has the wrong length or a parameter is unset.
    pub fn evaluate(&self, x: &[f64]) -> Result<f64, ProblemError> {
        if x.len() != self.len {
            return Err(ProblemError::WarmStartLength {
                expected: self.len,
                got: x.len(),
            });
        }
        let parameters = self.parameter_values()?;
        let x = DVector::from_column_slice(x);
        let selection = DMatrix::zeros(self.len, 0);
        let point = Point {
            x: &x,
            selection: &selection,
            parameters: &parameters,
            smoothing: 0.0,
            second_order: false,
        };
        Ok(point.evaluate(&self.objective).value[0])
    }

    /// Minimizes the objective starting from `warm`.
    ///
    /// Fixed entries of `warm` are overwritten with their fixed values.
    /// Non-optimal outcomes are reported through [`Solution::status`].
    ///
    /// # Errors
    ///
    /// Returns an error if `warm` has the wrong length or non-finite free
    /// entries, or if a parameter is unset.
    pub fn solve(&self, warm: &[f64], config: &Config) -> Result<Solution, ProblemError> {
        if warm.len() != self.len {
            return Err(ProblemError::WarmStartLength {
                expected: self.len,
                got: warm.len(),
            });
        }
        let parameters = self.parameter_values()?;

        let mut x = DVector::from_column_slice(warm);
        for (i, fixed) in self.fixed.iter().enumerate() {
            if let Some(v) = fixed {
                x[i] = *v;
            }
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ProblemError::NonFinite("warm start"));
        }

        let free: Vec<usize> = (0..self.len).filter(|&i| self.fixed[i].is_none()).collect();
        let selection = DMatrix::from_fn(self.len, free.len(), |r, c| {
            if free[c] == r { 1.0 } else { 0.0 }
        });
        let newton = Newton {
            objective: &self.objective,
            parameters: &parameters,
            selection: &selection,
            free: &free,
            config,
        };

        let widths: Vec<f64> = if self.objective.is_smooth() || free.is_empty() {
            vec![0.0]
        } else {
            config.smoothing_schedule().collect()
        };

        let mut status = Status::Optimal;
        let mut iters = 0;
        for (stage, &width) in widths.iter().enumerate() {
            let (outcome, taken) = newton.minimize(&mut x, width);
            iters += taken;
            let last = stage + 1 == widths.len();
            match outcome {
                Status::Optimal => {}
                Status::MaxIters if !last => {}
                other => {
                    status = other;
                    break;
                }
            }
        }

        let objective = newton.value(&x, 0.0);
        debug!(%status, iters, objective, "convex solve finished");

        Ok(Solution {
            status,
            x: x.as_slice().to_vec(),
            objective,
            iters,
        })
    }

    fn parameter_values(&self) -> Result<Vec<DVector<f64>>, ProblemError> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.value
                    .clone()
                    .ok_or(ProblemError::ParameterUnset(ParamId(i)))
            })
            .collect()
    }
}

/// Damped Newton iteration over the free entries.
struct Newton<'a> {
    objective: &'a Expr,
    parameters: &'a [DVector<f64>],
    selection: &'a DMatrix<f64>,
    free: &'a [usize],
    config: &'a Config,
}

impl Newton<'_> {
    fn point<'p>(&'p self, x: &'p DVector<f64>, smoothing: f64, second_order: bool) -> Point<'p> {
        Point {
            x,
            selection: self.selection,
            parameters: self.parameters,
            smoothing,
            second_order,
        }
    }

    fn value(&self, x: &DVector<f64>, smoothing: f64) -> f64 {
        self.point(x, smoothing, false).evaluate(self.objective).value[0]
    }

    /// Runs one smoothing stage, returning its outcome and step count.
    fn minimize(&self, x: &mut DVector<f64>, smoothing: f64) -> (Status, usize) {
        let n = self.free.len();
        let mut damping = 0.0;

        for iter in 0..self.config.max_iters() {
            let eval = self.point(x, smoothing, true).evaluate(self.objective);
            let f = eval.value[0];
            if f < -UNBOUNDED {
                return (Status::Unbounded, iter);
            }
            if !f.is_finite() {
                return (Status::NumericalFailure, iter);
            }

            let gradient = DVector::from_iterator(n, eval.jacobian.row(0).iter().copied());
            let hessian = eval
                .hessians
                .and_then(|mut hs| hs.pop())
                .unwrap_or_else(|| DMatrix::zeros(n, n));
            if gradient.iter().chain(hessian.iter()).any(|v| !v.is_finite()) {
                return (Status::NumericalFailure, iter);
            }

            let (direction, used) = newton_direction(&hessian, &gradient, damping);
            damping = used;
            let slope = gradient.dot(&direction);
            if !slope.is_finite() {
                return (Status::NumericalFailure, iter);
            }
            if -0.5 * slope <= self.config.tolerance() {
                return (Status::Optimal, iter);
            }

            let mut t = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let mut trial = x.clone();
                for (k, &i) in self.free.iter().enumerate() {
                    trial[i] += t * direction[k];
                }
                let f_trial = self.value(&trial, smoothing);
                if f_trial <= f + ARMIJO * t * slope {
                    accepted = Some(trial);
                    break;
                }
                t *= 0.5;
            }

            match accepted {
                Some(trial) => {
                    *x = trial;
                    if t == 1.0 {
                        damping /= 10.0;
                    }
                }
                None => {
                    // No progress possible at this precision.
                    let status = if -0.5 * slope <= self.config.tolerance().sqrt() {
                        Status::Optimal
                    } else {
                        Status::NumericalFailure
                    };
                    return (status, iter);
                }
            }
        }

        (Status::MaxIters, self.config.max_iters())
    }
}

/// Solves `(H + λI) d = -g`, raising `λ` from `damping` until `H + λI` is
/// positive definite. Falls back to steepest descent.
fn newton_direction(
    hessian: &DMatrix<f64>,
    gradient: &DVector<f64>,
    damping: f64,
) -> (DVector<f64>, f64) {
    let rhs = -gradient.clone();
    let scale = hessian.diagonal().amax().max(1.0);
    let mut lambda = damping;

    for _ in 0..MAX_DAMPING_TRIES {
        let mut shifted = hessian.clone();
        for i in 0..shifted.nrows() {
            shifted[(i, i)] += lambda;
        }
        if let Some(cholesky) = shifted.cholesky() {
            let direction = cholesky.solve(&rhs);
            if direction.iter().all(|v| v.is_finite()) {
                return (direction, lambda);
            }
        }
        lambda = if lambda == 0.0 {
            1e-10 * scale
        } else {
            lambda * 10.0
        };
    }

    (rhs, lambda)
}
