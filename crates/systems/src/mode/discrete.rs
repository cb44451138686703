use gds_core::{Domain, DomainPoint};
use tracing::trace;

use crate::{ConstraintSet, Discrete, Error, Siblings, SystemView};

/// Relative slack when testing whether a tick boundary has been reached.
const TICK_TOLERANCE: f64 = 1e-12;

/// Tick bookkeeping of a discrete system.
pub(crate) struct DiscreteSystem<P: DomainPoint> {
    law: Discrete<P>,
    ticks: i64,
}

impl<P: DomainPoint> DiscreteSystem<P> {
    pub(crate) fn new(law: Discrete<P>, t0: f64) -> Self {
        let mut system = Self { law, ticks: 0 };
        system.restart(t0);
        system
    }

    pub(crate) fn law(&self) -> &Discrete<P> {
        &self.law
    }

    /// Number of whole ticks elapsed, counted from `t = 0`.
    pub(crate) fn ticks(&self) -> i64 {
        self.ticks
    }

    pub(crate) fn set_ticks(&mut self, ticks: i64) {
        self.ticks = ticks;
    }

    /// Aligns the tick counter with `t0`.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn restart(&mut self, t0: f64) {
        self.ticks = (t0 / self.law.tick()).floor() as i64;
    }

    /// Returns `true` if time `t` has reached the next tick boundary.
    #[allow(clippy::cast_precision_loss)]
    fn is_due(&self, t: f64) -> bool {
        let boundary = (self.ticks + 1) as f64 * self.law.tick();
        t >= boundary - TICK_TOLERANCE * boundary.abs().max(1.0)
    }

    /// Applies the recurrence if advancing to `t_new` crosses a tick.
    ///
    /// At most one tick fires per call. Returns whether it fired.
    pub(crate) fn advance(
        &mut self,
        t_new: f64,
        domain: &Domain<P>,
        state: &mut [f64],
        constraints: &mut ConstraintSet<P>,
        siblings: Option<&dyn Siblings>,
    ) -> Result<bool, Error> {
        if !self.is_due(t_new) {
            return Ok(false);
        }

        constraints.refresh(t_new)?;
        let mut next = state.to_vec();
        let view = SystemView::new(t_new, state, domain, constraints, siblings);
        (self.law.map)(&view, &mut next);

        state.copy_from_slice(&next);
        constraints.inject(state, domain.ndim());
        self.ticks += 1;
        trace!(t = t_new, tick = self.ticks, "discrete tick");
        Ok(true)
    }
}
