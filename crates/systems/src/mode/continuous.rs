use gds_core::{Domain, DomainPoint};
use gds_solvers::ode::{Integrator, OdeSystem, Status};
use nalgebra::DVector;
use tracing::trace;

use crate::{ConstraintSet, Continuous, Error, Siblings, SystemView};

/// Integrator-backed solver state of a continuous system.
pub(crate) struct ContinuousSystem<P: DomainPoint> {
    law: Continuous<P>,
    integrator: Integrator,
}

impl<P: DomainPoint> ContinuousSystem<P> {
    /// Builds the integrator for a zero state of the law's companion size.
    pub(crate) fn new(law: Continuous<P>, ndim: usize, t0: f64) -> Result<Self, Error> {
        let y0 = DVector::zeros(law.order() * ndim);
        let integrator = Integrator::new(t0, y0, law.options())?;
        Ok(Self { law, integrator })
    }

    pub(crate) fn law(&self) -> &Continuous<P> {
        &self.law
    }

    pub(crate) fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    /// Moves the existing integrator to a new starting point.
    pub(crate) fn restart(&mut self, t0: f64, state: &[f64]) {
        self.integrator.reset(t0, DVector::from_column_slice(state));
    }

    /// Replaces the integrator with a freshly selected one.
    pub(crate) fn rebuild(&mut self, t0: f64, state: &[f64]) -> Result<(), Error> {
        self.integrator = Integrator::new(t0, DVector::from_column_slice(state), self.law.options())?;
        Ok(())
    }

    /// Overwrites the state without discarding step-size history.
    pub(crate) fn overwrite(&mut self, state: &[f64]) {
        self.integrator.y_mut().copy_from_slice(state);
    }

    /// Integrates to `t_new`, constraining the state after every micro-step.
    pub(crate) fn advance(
        &mut self,
        t_new: f64,
        domain: &Domain<P>,
        constraints: &mut ConstraintSet<P>,
    ) -> Result<(), Error> {
        let ndim = domain.ndim();
        self.integrator.set_bound(t_new);

        loop {
            let status = self
                .integrator
                .step(&mut Rhs {
                    law: &self.law,
                    domain,
                    constraints: &mut *constraints,
                })
                .map_err(Error::from_integration)?;

            let t = self.integrator.t();
            constraints.refresh(t)?;
            if !constraints.is_trivial() {
                constraints.inject(self.integrator.y_mut().as_mut_slice(), ndim);
            }
            trace!(t, "continuous micro-step");

            if status == Status::Finished {
                return Ok(());
            }
        }
    }
}

/// Evaluates the companion-form derivative of a continuous law.
///
/// Lower blocks are carried from the block above, the top block comes from
/// the law, and derivatives at Dirichlet points are zeroed in every block.
pub(crate) fn evaluate<P: DomainPoint>(
    law: &Continuous<P>,
    domain: &Domain<P>,
    constraints: &mut ConstraintSet<P>,
    siblings: Option<&dyn Siblings>,
    t: f64,
    y: &[f64],
    dydt: &mut [f64],
) -> Result<(), Error> {
    constraints.refresh(t)?;

    let ndim = domain.ndim();
    let carried = (law.order() - 1) * ndim;
    let (lower, top) = dydt.split_at_mut(carried);
    lower.copy_from_slice(&y[ndim..]);
    top.fill(0.0);

    let view = SystemView::new(t, y, domain, constraints, siblings);
    (law.rhs)(t, &view, top);

    constraints.hold_fixed(dydt, ndim);
    Ok(())
}

struct Rhs<'a, P: DomainPoint> {
    law: &'a Continuous<P>,
    domain: &'a Domain<P>,
    constraints: &'a mut ConstraintSet<P>,
}

impl<P: DomainPoint> OdeSystem for Rhs<'_, P> {
    type Error = Error;

    fn derivative(&mut self, t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>) -> Result<(), Error> {
        evaluate(
            self.law,
            self.domain,
            self.constraints,
            None,
            t,
            y.as_slice(),
            dydt.as_mut_slice(),
        )
    }
}
