use std::sync::Arc;

use gds_core::{Domain, DomainPoint, TimeIncrement};
use gds_solvers::ode::{Method, Options, Rejection};
use tracing::debug;

use crate::{
    ConstraintSet, Constraints, Error, Evolution, Initial, SequenceError, Siblings,
    law::Law,
    mode::{ContinuousSystem, ConvexStepSystem, DiscreteSystem, Mode, ModeKind, evaluate},
};


/// A quantity over a domain that evolves under one law.
///
/// A system is configured in order: [`set_evolution`](Self::set_evolution)
/// fixes the law, [`set_initial`](Self::set_initial) gives the starting
/// time and values, and [`set_constraints`](Self::set_constraints)
/// optionally installs boundary conditions. After that, [`step`](Self::step)
/// advances it and [`reset`](Self::reset) returns it to its initial
/// condition.
///
/// ```
/// use std::sync::Arc;
///
/// use gds_core::Domain;
/// use gds_systems::{Continuous, EvolvingSystem};
///
/// let domain = Arc::new(Domain::new(0..3_u32).unwrap());
/// let mut decay = EvolvingSystem::new(domain);
/// decay
///     .set_evolution(Continuous::new(|_, view, dy| {
///         for (d, y) in dy.iter_mut().zip(view.value()) {
///             *d = -y;
///         }
///     }))
///     .unwrap();
/// decay.set_initial(0.0, vec![1.0, 2.0, 3.0]).unwrap();
/// decay.step(0.1).unwrap();
///
/// assert!((decay.value()[0] - (-0.1f64).exp()).abs() < 1e-3);
/// ```
pub struct EvolvingSystem<P: DomainPoint> {
    domain: Arc<Domain<P>>,
    mode: Mode<P>,
    constraints: ConstraintSet<P>,
    initial: Option<InitialCondition<P>>,
    state: Vec<f64>,
    t: f64,
}

struct InitialCondition<P> {
    t0: f64,
    source: Initial<P>,
}

/// Saved time and state of a system, for rolling back trial advances.
pub(crate) struct Snapshot {
    t: f64,
    state: Vec<f64>,
    ticks: Option<i64>,
}

impl<P: DomainPoint> EvolvingSystem<P> {
    /// Creates an undefined system on `domain`.
    pub fn new(domain: impl Into<Arc<Domain<P>>>) -> Self {
        let domain = domain.into();
        Self {
            state: vec![0.0; domain.ndim()],
            domain,
            mode: Mode::Undefined,
            constraints: ConstraintSet::empty(),
            initial: None,
            t: 0.0,
        }
    }

    /// Fixes the evolution law.
    ///
    /// The state is sized for the law (`order · ndim` for continuous laws)
    /// and zeroed. For continuous laws the integrator is selected here; for
    /// convex laws the cost is built and checked here.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::EvolutionDefined`] if a law is already set,
    /// a [`ConfigError`](crate::ConfigError) if the law is malformed or the
    /// cost is not disciplined-convex, or [`Error::Construct`] if no
    /// integrator candidate can be built.
    pub fn set_evolution(&mut self, evolution: impl Into<Evolution<P>>) -> Result<(), Error> {
        if !matches!(self.mode, Mode::Undefined) {
            return Err(SequenceError::EvolutionDefined.into());
        }

        let ndim = self.domain.ndim();
        self.mode = match evolution.into().into_law()? {
            Law::Continuous(law) => Mode::Continuous(ContinuousSystem::new(law, ndim, self.t)?),
            Law::Convex(law) => Mode::Convex(ConvexStepSystem::new(law, ndim)?),
            Law::Discrete(law) => Mode::Discrete(DiscreteSystem::new(law, self.t)),
        };
        self.state = vec![0.0; self.mode.order() * ndim];
        self.constraints.inject(&mut self.state, ndim);
        self.sync_solver();

        debug!(mode = %self.mode.kind(), ndim, "evolution defined");
        Ok(())
    }

    /// Sets the starting time and values.
    ///
    /// Dirichlet points keep their constrained values; every other point
    /// takes its initial value. Mode-specific solver state restarts at `t0`.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::EvolutionUndefined`] before
    /// [`set_evolution`](Self::set_evolution), or
    /// [`ConfigError::InitialLength`](crate::ConfigError::InitialLength) for
    /// an array of the wrong length.
    pub fn set_initial(&mut self, t0: f64, initial: impl Into<Initial<P>>) -> Result<(), Error> {
        self.require_mode()?;
        let source = initial.into();
        source.check(self.domain.ndim(), self.order())?;

        self.initial = Some(InitialCondition { t0, source });
        self.restart(false)
    }

    /// Installs boundary conditions and a projection.
    ///
    /// Membership of time-varying conditions is decided at the current
    /// time. The current state is constrained immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::EvolutionUndefined`] before
    /// [`set_evolution`](Self::set_evolution), or a
    /// [`ConfigError`](crate::ConfigError) if the Dirichlet and Neumann
    /// points overlap or a table names an unknown point.
    pub fn set_constraints(&mut self, constraints: Constraints<P>) -> Result<(), Error> {
        self.require_mode()?;
        self.constraints = ConstraintSet::new(constraints, &self.domain, self.t)?;
        self.constraints.inject(&mut self.state, self.domain.ndim());
        if let Mode::Continuous(system) = &mut self.mode {
            system.overwrite(&self.state);
        }

        debug!(
            dirichlet = self.constraints.dirichlet().len(),
            neumann = self.constraints.neumann().len(),
            "constraints set"
        );
        Ok(())
    }

    /// Advances the system by `dt`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not finite and positive, if the law or
    /// initial condition is missing, or if the step fails: an integrator
    /// giving up, a non-optimal convex solve, or a boundary condition
    /// losing its value.
    pub fn step(&mut self, dt: f64) -> Result<(), Error> {
        let dt = TimeIncrement::new(dt)?;
        self.require_ready()?;
        self.advance_to(self.t + dt.get(), None)?;
        debug!(mode = %self.mode.kind(), t = self.t, "stepped");
        Ok(())
    }

    /// Restores the initial condition with fresh solver state.
    ///
    /// Continuous systems select a new integrator, convex systems rebuild
    /// their problem, and discrete systems realign their tick counter.
    ///
    /// # Errors
    ///
    /// Returns a [`SequenceError`] if the law or initial condition is
    /// missing, or an error from rebuilding the solver.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.require_mode()?;
        self.restart(true)?;
        debug!(mode = %self.mode.kind(), t = self.t, "reset");
        Ok(())
    }

    /// Current time.
    #[must_use]
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Current value at every point, in domain order.
    #[must_use]
    pub fn value(&self) -> &[f64] {
        &self.state[..self.domain.ndim()]
    }

    /// The full state, including lower derivatives for higher-order laws.
    #[must_use]
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// Current value at `point`.
    #[must_use]
    pub fn value_at(&self, point: &P) -> Option<f64> {
        self.domain.index_of(point).map(|i| self.state[i])
    }

    /// Iterates over `(point, value)` pairs in domain order.
    pub fn iter(&self) -> impl Iterator<Item = (&P, f64)> + '_ {
        self.domain.points().zip(self.value().iter().copied())
    }

    #[must_use]
    pub fn domain(&self) -> &Arc<Domain<P>> {
        &self.domain
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.domain.ndim()
    }

    /// Number of `ndim` blocks in the state.
    #[must_use]
    pub fn order(&self) -> usize {
        self.mode.order()
    }

    #[must_use]
    pub fn mode(&self) -> ModeKind {
        self.mode.kind()
    }

    #[must_use]
    pub fn constraints(&self) -> &ConstraintSet<P> {
        &self.constraints
    }

    /// Starting time of the initial condition, once set.
    #[must_use]
    pub fn initial_time(&self) -> Option<f64> {
        self.initial.as_ref().map(|ic| ic.t0)
    }

    /// The active integration method of a continuous system.
    #[must_use]
    pub fn method(&self) -> Option<Method> {
        match &self.mode {
            Mode::Continuous(system) => Some(system.integrator().method()),
            _ => None,
        }
    }

    /// Integration methods rejected before the active one was chosen.
    #[must_use]
    pub fn rejections(&self) -> &[Rejection] {
        match &self.mode {
            Mode::Continuous(system) => system.integrator().rejections(),
            _ => &[],
        }
    }

    /// Size of the last micro-step of a continuous system, or its maximum
    /// step size before the first one.
    #[must_use]
    pub fn step_size(&self) -> Option<f64> {
        match &self.mode {
            Mode::Continuous(system) => Some(
                system
                    .integrator()
                    .last_step()
                    .unwrap_or_else(|| system.law().options().max_step()),
            ),
            _ => None,
        }
    }

    /// Whole ticks elapsed for a discrete system.
    #[must_use]
    pub fn ticks(&self) -> Option<i64> {
        match &self.mode {
            Mode::Discrete(system) => Some(system.ticks()),
            _ => None,
        }
    }

    fn require_mode(&self) -> Result<(), SequenceError> {
        match self.mode {
            Mode::Undefined => Err(SequenceError::EvolutionUndefined),
            _ => Ok(()),
        }
    }

    pub(crate) fn require_ready(&self) -> Result<(), SequenceError> {
        self.require_mode()?;
        match self.initial {
            Some(_) => Ok(()),
            None => Err(SequenceError::InitialUndefined),
        }
    }

    /// Re-derives the state from the initial condition.
    fn restart(&mut self, fresh: bool) -> Result<(), Error> {
        let ic = self
            .initial
            .as_ref()
            .ok_or(SequenceError::InitialUndefined)?;
        let ndim = self.domain.ndim();

        self.t = ic.t0;
        self.constraints.refresh(ic.t0)?;
        self.state = ic
            .source
            .state(&self.domain, self.mode.order(), self.constraints.dirichlet().points());
        self.constraints.inject(&mut self.state, ndim);

        match &mut self.mode {
            Mode::Undefined => {}
            Mode::Continuous(system) if fresh => system.rebuild(self.t, &self.state)?,
            Mode::Continuous(system) => system.restart(self.t, &self.state),
            Mode::Convex(system) if fresh => system.rebuild(ndim)?,
            Mode::Convex(_) => {}
            Mode::Discrete(system) => system.restart(self.t),
        }
        Ok(())
    }

    /// Pushes the current time and state into the mode's solver.
    fn sync_solver(&mut self) {
        match &mut self.mode {
            Mode::Continuous(system) => system.restart(self.t, &self.state),
            Mode::Discrete(system) => system.restart(self.t),
            Mode::Undefined | Mode::Convex(_) => {}
        }
    }

    /// Advances to `t_new`, letting laws read `siblings`.
    pub(crate) fn advance_to(
        &mut self,
        t_new: f64,
        siblings: Option<&dyn Siblings>,
    ) -> Result<(), Error> {
        let domain = &*self.domain;
        match &mut self.mode {
            Mode::Undefined => return Err(SequenceError::EvolutionUndefined.into()),
            Mode::Continuous(system) => {
                system.advance(t_new, domain, &mut self.constraints)?;
                self.state.copy_from_slice(system.integrator().y().as_slice());
                self.t = system.integrator().t();
                return Ok(());
            }
            Mode::Convex(system) => {
                system.advance(t_new, &mut self.state, &mut self.constraints, siblings)?;
            }
            Mode::Discrete(system) => {
                system.advance(
                    t_new,
                    domain,
                    &mut self.state,
                    &mut self.constraints,
                    siblings,
                )?;
            }
        }
        self.t = t_new;
        Ok(())
    }

    /// Integrator options of a continuous system.
    pub(crate) fn continuous_options(&self) -> Option<&Options> {
        match &self.mode {
            Mode::Continuous(system) => Some(system.law().options()),
            _ => None,
        }
    }

    /// Tick interval of a discrete system.
    pub(crate) fn tick(&self) -> Option<f64> {
        match &self.mode {
            Mode::Discrete(system) => Some(system.law().tick()),
            _ => None,
        }
    }

    /// Evaluates the derivative of a continuous system at `(t, y)`.
    pub(crate) fn derivative(
        &mut self,
        t: f64,
        y: &[f64],
        dydt: &mut [f64],
        siblings: Option<&dyn Siblings>,
    ) -> Result<(), Error> {
        match &self.mode {
            Mode::Continuous(system) => evaluate(
                system.law(),
                &self.domain,
                &mut self.constraints,
                siblings,
                t,
                y,
                dydt,
            ),
            _ => Err(SequenceError::EvolutionUndefined.into()),
        }
    }

    /// Refreshes constraints at `t` and applies them to `state`.
    pub(crate) fn constrain(&mut self, t: f64, state: &mut [f64]) -> Result<(), Error> {
        self.constraints.refresh(t)?;
        self.constraints.inject(state, self.domain.ndim());
        Ok(())
    }

    pub(crate) fn has_trivial_constraints(&self) -> bool {
        self.constraints.is_trivial()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            t: self.t,
            state: self.state.clone(),
            ticks: self.ticks(),
        }
    }

    pub(crate) fn restore(&mut self, snapshot: &Snapshot) {
        self.t = snapshot.t;
        self.state.copy_from_slice(&snapshot.state);
        if let (Mode::Discrete(system), Some(ticks)) = (&mut self.mode, snapshot.ticks) {
            system.set_ticks(ticks);
        }
    }
}

impl<P: DomainPoint> std::fmt::Debug for EvolvingSystem<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvolvingSystem")
            .field("mode", &self.mode.kind())
            .field("ndim", &self.domain.ndim())
            .field("t", &self.t)
            .field("state", &self.state)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

impl<P: DomainPoint> crate::Steppable for EvolvingSystem<P> {
    fn step(&mut self, dt: f64) -> Result<(), Error> {
        EvolvingSystem::step(self, dt)
    }

    fn reset(&mut self) -> Result<(), Error> {
        EvolvingSystem::reset(self)
    }

    fn t(&self) -> f64 {
        self.t
    }
}
