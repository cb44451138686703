//! Dormand–Prince 5(4) stepper with the coefficients of Dormand & Prince,
//! "A family of embedded Runge-Kutta formulae", J. Comp. Appl. Math. 6, 1980.

use nalgebra::DVector;

use super::{
    OdeSystem, Options,
    integrator::{Attempt, Rhs},
    norm::scaled_rms,
};

const C: [f64; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];

const A: [&[f64]; 6] = [
    &[],
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
    ],
    &[
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];

const B: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];

/// Difference between the 5th- and 4th-order weights, last entry for the
/// first-same-as-last stage.
const E: [f64; 7] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339_200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

pub(super) struct Dopri5;

impl Dopri5 {
    pub(super) fn attempt<S: OdeSystem>(
        &self,
        rhs: &mut Rhs<'_, S>,
        t: f64,
        t_new: f64,
        y: &DVector<f64>,
        f0: &DVector<f64>,
        options: &Options,
    ) -> Result<Attempt, S::Error> {
        let h = t_new - t;
        let mut k: Vec<DVector<f64>> = Vec::with_capacity(7);
        k.push(f0.clone());

        for s in 1..6 {
            let mut dy = DVector::zeros(y.len());
            for (a, ks) in A[s].iter().zip(&k) {
                dy.axpy(*a, ks, 1.0);
            }
            let stage = rhs.call(t + C[s] * h, &(y + dy * h))?;
            k.push(stage);
        }

        let mut increment = DVector::zeros(y.len());
        for (b, ks) in B.iter().zip(&k) {
            increment.axpy(*b, ks, 1.0);
        }
        let y_new = y + increment * h;

        let f_new = rhs.call(t_new, &y_new)?;
        k.push(f_new.clone());

        let mut err = DVector::zeros(y.len());
        for (e, ks) in E.iter().zip(&k) {
            err.axpy(*e * h, ks, 1.0);
        }
        let error_norm = scaled_rms(&err, y, &y_new, options.rtol(), options.atol());

        Ok(Attempt {
            y_new,
            f_new: Some(f_new),
            error_norm,
        })
    }
}
