use nalgebra::DVector;

use super::{
    OdeSystem,
    integrator::{Attempt, Rhs},
};

pub(super) struct Rk4;

impl Rk4 {
    pub(super) fn attempt<S: OdeSystem>(
        &self,
        rhs: &mut Rhs<'_, S>,
        t: f64,
        t_new: f64,
        y: &DVector<f64>,
        f0: &DVector<f64>,
    ) -> Result<Attempt, S::Error> {
        let h = t_new - t;
        let half = 0.5 * h;

        let k2 = rhs.call(t + half, &(y + f0 * half))?;
        let k3 = rhs.call(t + half, &(y + &k2 * half))?;
        let k4 = rhs.call(t_new, &(y + &k3 * h))?;

        let y_new = y + (f0 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0);

        Ok(Attempt {
            y_new,
            f_new: None,
            error_norm: 0.0,
        })
    }
}
