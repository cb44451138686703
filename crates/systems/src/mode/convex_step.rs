use gds_core::DomainPoint;
use gds_solvers::convex::{Expr, ParamId, Parameter, Problem, ProblemBuilder};
use tracing::trace;

use crate::{ConfigError, ConstraintSet, ConvexStep, Error, Siblings};

/// Declares the symbols a convex cost is written in.
///
/// ```
/// use gds_systems::ConvexStep;
///
/// // Track a moving target while penalizing change from the last state.
/// let law = ConvexStep::new(|ctx| {
///     let y = ctx.state();
///     let previous = ctx.previous();
///     let target = ctx.time() * 0.5;
///     (&y - target).sum_squares() + (&y - previous).sum_squares()
/// });
/// # let _ = law;
/// ```
#[derive(Debug)]
pub struct CostContext {
    builder: ProblemBuilder,
    time: Parameter,
    previous: Option<Parameter>,
    siblings: Vec<(String, Parameter)>,
}

impl CostContext {
    fn new(ndim: usize) -> Self {
        let mut builder = ProblemBuilder::new(ndim);
        let time = builder.scalar_parameter(true);
        Self {
            builder,
            time,
            previous: None,
            siblings: Vec::new(),
        }
    }

    /// The state being solved for.
    #[must_use]
    pub fn state(&self) -> Expr {
        self.builder.variable()
    }

    /// The time being stepped to, as a nonnegative scalar.
    #[must_use]
    pub fn time(&self) -> Expr {
        self.time.expr().clone()
    }

    /// The state before the step.
    pub fn previous(&mut self) -> Expr {
        let ndim = self.state().len();
        let builder = &mut self.builder;
        self.previous
            .get_or_insert_with(|| builder.parameter(ndim, false))
            .expr()
            .clone()
    }

    /// The current value of a sibling system with `len` points.
    ///
    /// The value is read from the coupling before every solve.
    pub fn sibling(&mut self, name: &str, len: usize) -> Expr {
        if let Some((_, parameter)) = self.siblings.iter().find(|(n, _)| n == name) {
            return parameter.expr().clone();
        }
        let parameter = self.builder.parameter(len, false);
        let expr = parameter.expr().clone();
        self.siblings.push((name.to_owned(), parameter));
        expr
    }
}

/// A built convex problem and the parameters rebound every step.
pub(crate) struct ConvexStepSystem {
    law: ConvexStep,
    problem: Problem,
    time: ParamId,
    previous: Option<ParamId>,
    siblings: Vec<(String, ParamId)>,
}

impl ConvexStepSystem {
    /// Runs the cost builder and checks the result is disciplined-convex.
    pub(crate) fn new(law: ConvexStep, ndim: usize) -> Result<Self, ConfigError> {
        let mut ctx = CostContext::new(ndim);
        let objective = (law.cost)(&mut ctx);
        let problem = ctx.builder.minimize(objective)?;

        Ok(Self {
            law,
            problem,
            time: ctx.time.id(),
            previous: ctx.previous.map(|p| p.id()),
            siblings: ctx
                .siblings
                .into_iter()
                .map(|(name, p)| (name, p.id()))
                .collect(),
        })
    }

    /// Rebuilds the problem from the cost builder.
    pub(crate) fn rebuild(&mut self, ndim: usize) -> Result<(), ConfigError> {
        let mut ctx = CostContext::new(ndim);
        let objective = (self.law.cost)(&mut ctx);
        self.problem = ctx.builder.minimize(objective)?;
        self.time = ctx.time.id();
        self.previous = ctx.previous.map(|p| p.id());
        self.siblings = ctx
            .siblings
            .into_iter()
            .map(|(name, p)| (name, p.id()))
            .collect();
        Ok(())
    }

    /// Solves for the state at `t_new`, warm-started from `state`.
    pub(crate) fn advance<P: DomainPoint>(
        &mut self,
        t_new: f64,
        state: &mut [f64],
        constraints: &mut ConstraintSet<P>,
        siblings: Option<&dyn Siblings>,
    ) -> Result<(), Error> {
        self.problem.set_parameter(self.time, &[t_new])?;
        if let Some(previous) = self.previous {
            self.problem.set_parameter(previous, state)?;
        }
        for (name, id) in &self.siblings {
            let value = siblings
                .and_then(|s| s.value(name))
                .ok_or_else(|| ConfigError::UnknownSibling(name.clone()))?;
            self.problem.set_parameter(*id, value)?;
        }

        constraints.refresh(t_new)?;
        let dirichlet = constraints.dirichlet();
        self.problem.fix(dirichlet.indices(), dirichlet.values())?;

        let solution = self.problem.solve(state, self.law.config())?;
        if !solution.is_optimal() {
            return Err(Error::Solve {
                t: t_new,
                status: solution.status,
            });
        }
        trace!(t = t_new, iters = solution.iters, objective = solution.objective, "convex step");

        state.copy_from_slice(&solution.x);
        constraints.inject(state, state.len());
        Ok(())
    }
}
