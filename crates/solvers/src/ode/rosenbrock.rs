//! Rosenbrock 2(3) stepper after Shampine & Reichelt, "The MATLAB ODE
//! Suite", SIAM J. Sci. Comput. 18(1), 1997.

use std::f64::consts::SQRT_2;

use nalgebra::{DMatrix, DVector};

use super::{
    OdeSystem, Options,
    integrator::{Attempt, Rhs},
    norm::scaled_rms,
};

/// Finite-difference Jacobian `∂f/∂y` and time derivative `∂f/∂t` at the
/// start of the current micro-step.
struct Linearization {
    jacobian: DMatrix<f64>,
    dfdt: DVector<f64>,
}

#[derive(Default)]
pub(super) struct Rosenbrock23 {
    linearization: Option<Linearization>,
}

impl Rosenbrock23 {
    /// Builds the linearization unless one is already held for this step.
    pub(super) fn prepare<S: OdeSystem>(
        &mut self,
        rhs: &mut Rhs<'_, S>,
        t: f64,
        y: &DVector<f64>,
        f: &DVector<f64>,
    ) -> Result<(), S::Error> {
        if self.linearization.is_some() {
            return Ok(());
        }

        let n = y.len();
        let sqrt_eps = f64::EPSILON.sqrt();

        let mut jacobian = DMatrix::zeros(n, n);
        let mut shifted = y.clone();
        for j in 0..n {
            let delta = sqrt_eps * y[j].abs().max(1.0);
            shifted[j] = y[j] + delta;
            let fj = rhs.call(t, &shifted)?;
            jacobian.set_column(j, &((fj - f) / delta));
            shifted[j] = y[j];
        }

        let dt = sqrt_eps * t.abs().max(1.0);
        let ft = rhs.call(t + dt, y)?;
        let dfdt = (ft - f) / dt;

        self.linearization = Some(Linearization { jacobian, dfdt });
        Ok(())
    }

    pub(super) fn invalidate(&mut self) {
        self.linearization = None;
    }

    /// Attempts one step from `t` to `t_new`.
    ///
    /// Returns `Ok(None)` when the iteration matrix is singular, which the
    /// integrator treats as a rejection.
    pub(super) fn attempt<S: OdeSystem>(
        &mut self,
        rhs: &mut Rhs<'_, S>,
        t: f64,
        t_new: f64,
        y: &DVector<f64>,
        f0: &DVector<f64>,
        options: &Options,
    ) -> Result<Option<Attempt>, S::Error> {
        self.prepare(rhs, t, y, f0)?;
        let Some(Linearization { jacobian, dfdt }) = self.linearization.as_ref() else {
            return Ok(None);
        };

        let d = 1.0 / (2.0 + SQRT_2);
        let e32 = 6.0 + SQRT_2;
        let h = t_new - t;
        let n = y.len();

        let w = DMatrix::identity(n, n) - jacobian * (h * d);
        let lu = w.lu();
        let hdt = dfdt * (h * d);

        let Some(k1) = lu.solve(&(f0 + &hdt)) else {
            return Ok(None);
        };

        let f1 = rhs.call(t + 0.5 * h, &(y + &k1 * (0.5 * h)))?;
        let Some(k2) = lu.solve(&(&f1 - &k1)) else {
            return Ok(None);
        };
        let k2 = k2 + &k1;

        let y_new = y + &k2 * h;
        let f2 = rhs.call(t_new, &y_new)?;

        let b = &f2 - (&k2 - &f1) * e32 - (&k1 - f0) * 2.0 + &hdt;
        let Some(k3) = lu.solve(&b) else {
            return Ok(None);
        };

        let err = (&k1 - &k2 * 2.0 + &k3) * (h / 6.0);
        let error_norm = scaled_rms(&err, y, &y_new, options.rtol(), options.atol());

        Ok(Some(Attempt {
            y_new,
            f_new: Some(f2),
            error_norm,
        }))
    }
}
