use gds_core::{Domain, DomainPoint};

use crate::{Boundary, ConstraintSet};

/// Read access to the live state of other systems, by name.
///
/// A coupling implements this so that one member's evolution law can read
/// another member's current value without either holding a reference to the
/// other.
pub trait Siblings {
    /// Current value (first `ndim` block) of the named system.
    fn value(&self, name: &str) -> Option<&[f64]>;

    /// Time at which [`Siblings::value`] holds for the named system.
    fn time(&self, name: &str) -> Option<f64>;
}

/// What an evolution law sees of its system at one evaluation.
///
/// For continuous laws this is the integrator's trial state, which may be
/// an intermediate stage rather than an accepted step.
pub struct SystemView<'a, P: DomainPoint> {
    t: f64,
    state: &'a [f64],
    domain: &'a Domain<P>,
    constraints: &'a ConstraintSet<P>,
    siblings: Option<&'a dyn Siblings>,
}

impl<'a, P: DomainPoint> SystemView<'a, P> {
    pub(crate) fn new(
        t: f64,
        state: &'a [f64],
        domain: &'a Domain<P>,
        constraints: &'a ConstraintSet<P>,
        siblings: Option<&'a dyn Siblings>,
    ) -> Self {
        Self {
            t,
            state,
            domain,
            constraints,
            siblings,
        }
    }

    /// Time of this evaluation.
    #[must_use]
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Current value at every point, in domain order.
    #[must_use]
    pub fn value(&self) -> &'a [f64] {
        &self.state[..self.domain.ndim()]
    }

    /// The full state; for order `k` systems this is `k` blocks of `ndim`.
    #[must_use]
    pub fn state(&self) -> &'a [f64] {
        self.state
    }

    /// The `k`-th time derivative block (`0` is the value itself), if the
    /// state carries it.
    #[must_use]
    pub fn derivative(&self, k: usize) -> Option<&'a [f64]> {
        let n = self.domain.ndim();
        self.state.get(k * n..(k + 1) * n)
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.domain.ndim()
    }

    #[must_use]
    pub fn domain(&self) -> &'a Domain<P> {
        self.domain
    }

    /// Current value at `point`.
    #[must_use]
    pub fn value_at(&self, point: &P) -> Option<f64> {
        self.domain.index_of(point).map(|i| self.state[i])
    }

    /// Dirichlet points and their values at [`SystemView::t`].
    #[must_use]
    pub fn dirichlet(&self) -> &'a Boundary<P> {
        self.constraints.dirichlet()
    }

    /// Neumann points and their fluxes at [`SystemView::t`].
    #[must_use]
    pub fn neumann(&self) -> &'a Boundary<P> {
        self.constraints.neumann()
    }

    /// Current value of a sibling system in the same coupling.
    ///
    /// Returns `None` outside a coupling or for an unknown name.
    #[must_use]
    pub fn sibling(&self, name: &str) -> Option<&'a [f64]> {
        self.siblings.and_then(|s| s.value(name))
    }

    /// Time at which [`SystemView::sibling`] holds.
    #[must_use]
    pub fn sibling_time(&self, name: &str) -> Option<f64> {
        self.siblings.and_then(|s| s.time(name))
    }
}
