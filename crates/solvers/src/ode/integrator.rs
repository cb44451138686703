use nalgebra::DVector;
use tracing::{info, trace, warn};

use super::{
    ConstructError, Error, Method, OdeSystem, Options, Rejection,
    dopri5::Dopri5,
    norm::rms_scaled_by,
    rk4::Rk4,
    rosenbrock::Rosenbrock23,
};

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Whether the integrator has reached its horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `t < t_bound`; more micro-steps are needed.
    Running,

    /// `t == t_bound`.
    Finished,
}

/// An accepted-or-rejected trial step produced by a method.
pub(super) struct Attempt {
    pub(super) y_new: DVector<f64>,
    pub(super) f_new: Option<DVector<f64>>,
    pub(super) error_norm: f64,
}

/// Evaluates the system and counts calls.
pub(super) struct Rhs<'a, S: OdeSystem> {
    system: &'a mut S,
    evaluations: &'a mut usize,
}

impl<S: OdeSystem> Rhs<'_, S> {
    pub(super) fn call(&mut self, t: f64, y: &DVector<f64>) -> Result<DVector<f64>, S::Error> {
        let mut dydt = DVector::zeros(y.len());
        self.system.derivative(t, y, &mut dydt)?;
        *self.evaluations += 1;
        Ok(dydt)
    }
}

enum Stepper {
    Rosenbrock23(Rosenbrock23),
    Dopri5(Dopri5),
    Rk4(Rk4),
}

impl Stepper {
    fn prepare<S: OdeSystem>(
        &mut self,
        rhs: &mut Rhs<'_, S>,
        t: f64,
        y: &DVector<f64>,
        f: &DVector<f64>,
    ) -> Result<(), S::Error> {
        match self {
            Self::Rosenbrock23(m) => m.prepare(rhs, t, y, f),
            Self::Dopri5(_) | Self::Rk4(_) => Ok(()),
        }
    }

    fn attempt<S: OdeSystem>(
        &mut self,
        rhs: &mut Rhs<'_, S>,
        t: f64,
        t_new: f64,
        y: &DVector<f64>,
        f: &DVector<f64>,
        options: &Options,
    ) -> Result<Option<Attempt>, S::Error> {
        match self {
            Self::Rosenbrock23(m) => m.attempt(rhs, t, t_new, y, f, options),
            Self::Dopri5(m) => m.attempt(rhs, t, t_new, y, f, options).map(Some),
            Self::Rk4(m) => m.attempt(rhs, t, t_new, y, f).map(Some),
        }
    }

    fn invalidate(&mut self) {
        if let Self::Rosenbrock23(m) = self {
            m.invalidate();
        }
    }
}

/// A single-step ODE integrator advancing toward a movable horizon.
///
/// See the [module docs](super) for the stepping contract.
pub struct Integrator {
    method: Method,
    stepper: Stepper,
    options: Options,
    t: f64,
    y: DVector<f64>,
    f: Option<DVector<f64>>,
    t_bound: f64,
    status: Status,
    h_abs: Option<f64>,
    last_step: Option<f64>,
    steps: usize,
    evaluations: usize,
    rejections: Vec<Rejection>,
}

impl Integrator {
    /// Builds the first candidate method in `options` that constructs.
    ///
    /// Candidates are tried in order. Each failure is logged and kept in
    /// [`Integrator::rejections`].
    ///
    /// # Errors
    ///
    /// Returns [`ConstructError::Exhausted`] if every candidate fails.
    pub fn new(t0: f64, y0: DVector<f64>, options: &Options) -> Result<Self, ConstructError> {
        let mut rejections = Vec::new();

        for &method in options.candidates() {
            match Self::with_method(method, t0, y0.clone(), options) {
                Ok(mut integrator) => {
                    if rejections.is_empty() {
                        info!(%method, dim = y0.len(), "selected integrator");
                    } else {
                        info!(
                            %method,
                            dim = y0.len(),
                            rejected = rejections.len(),
                            "selected fallback integrator"
                        );
                    }
                    integrator.rejections = rejections;
                    return Ok(integrator);
                }
                Err(error) => {
                    warn!(%method, %error, "integrator candidate rejected");
                    rejections.push(Rejection {
                        method,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Err(ConstructError::Exhausted(rejections))
    }

    /// Builds a specific method.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstructError`] if the method cannot be used for this
    /// state and these options.
    pub fn with_method(
        method: Method,
        t0: f64,
        y0: DVector<f64>,
        options: &Options,
    ) -> Result<Self, ConstructError> {
        if y0.iter().any(|v| !v.is_finite()) || !t0.is_finite() {
            return Err(ConstructError::NonFinite);
        }

        let stepper = match method {
            Method::Rosenbrock23 => {
                let limit = options.dense_jacobian_limit();
                if y0.len() > limit {
                    return Err(ConstructError::TooLarge {
                        method,
                        dim: y0.len(),
                        limit,
                    });
                }
                Stepper::Rosenbrock23(Rosenbrock23::default())
            }
            Method::Dopri5 => Stepper::Dopri5(Dopri5),
            Method::Rk4 => {
                let h = options.first_step().unwrap_or(options.max_step());
                if !h.is_finite() {
                    return Err(ConstructError::NoStepSize { method });
                }
                Stepper::Rk4(Rk4)
            }
        };

        Ok(Self {
            method,
            stepper,
            options: options.clone(),
            t: t0,
            y: y0,
            f: None,
            t_bound: t0,
            status: Status::Finished,
            h_abs: None,
            last_step: None,
            steps: 0,
            evaluations: 0,
            rejections: Vec::new(),
        })
    }

    /// The active method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Candidates rejected before the active method was chosen.
    #[must_use]
    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current time.
    #[must_use]
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Current state.
    #[must_use]
    pub fn y(&self) -> &DVector<f64> {
        &self.y
    }

    /// Mutable access to the current state.
    ///
    /// Any cached derivative is discarded, so the next micro-step re-evaluates
    /// the system at the modified state.
    pub fn y_mut(&mut self) -> &mut DVector<f64> {
        self.f = None;
        self.stepper.invalidate();
        &mut self.y
    }

    /// The current horizon.
    #[must_use]
    pub fn t_bound(&self) -> f64 {
        self.t_bound
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Size of the last accepted micro-step, if any.
    #[must_use]
    pub fn last_step(&self) -> Option<f64> {
        self.last_step
    }

    /// Number of system evaluations since construction.
    #[must_use]
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Moves the horizon and resets the micro-step budget.
    pub fn set_bound(&mut self, t_bound: f64) {
        self.t_bound = t_bound;
        self.steps = 0;
        self.status = if self.t < t_bound {
            Status::Running
        } else {
            Status::Finished
        };
    }

    /// Replaces time and state, discarding all step-size history.
    pub fn reset(&mut self, t: f64, y: DVector<f64>) {
        self.t = t;
        self.y = y;
        self.f = None;
        self.stepper.invalidate();
        self.h_abs = None;
        self.last_step = None;
        self.set_bound(t);
    }

    /// Takes one accepted micro-step toward the horizon.
    ///
    /// Returns [`Status::Finished`] once `t` equals the horizon. Calling this
    /// after the horizon is reached is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::System`] if the system fails,
    /// [`Error::StepSizeTooSmall`] if step-size control cannot find an
    /// acceptable step, or [`Error::StepBudget`] if the horizon needs more
    /// micro-steps than [`Options::max_steps`] allows.
    pub fn step<S: OdeSystem>(&mut self, system: &mut S) -> Result<Status, Error<S::Error>> {
        if self.status == Status::Finished {
            return Ok(Status::Finished);
        }
        if self.steps >= self.options.max_steps() {
            return Err(Error::StepBudget {
                steps: self.steps,
                t_bound: self.t_bound,
            });
        }

        let mut rhs = Rhs {
            system,
            evaluations: &mut self.evaluations,
        };

        let f = match self.f.take() {
            Some(f) => f,
            None => rhs.call(self.t, &self.y).map_err(Error::System)?,
        };

        let t = self.t;
        let max_step = self.options.max_step();
        let min_step = 10.0 * (f64::EPSILON * t.abs()).max(f64::MIN_POSITIVE);

        let mut h_abs = match self.h_abs {
            Some(h) => h,
            None => match (self.method, self.options.first_step()) {
                (_, Some(h)) => h,
                (Method::Rk4, None) => max_step,
                (method, None) => initial_step(
                    &mut rhs,
                    t,
                    &self.y,
                    &f,
                    method.error_order().unwrap_or(1),
                    &self.options,
                    self.t_bound - t,
                )
                .map_err(Error::System)?,
            },
        }
        .min(max_step);

        self.stepper
            .prepare(&mut rhs, t, &self.y, &f)
            .map_err(Error::System)?;

        let mut rejected = false;
        loop {
            if h_abs < min_step {
                return Err(Error::StepSizeTooSmall { t, h: h_abs });
            }

            let clipped = t + h_abs >= self.t_bound;
            let t_new = if clipped { self.t_bound } else { t + h_abs };
            let h = t_new - t;

            let attempt = self
                .stepper
                .attempt(&mut rhs, t, t_new, &self.y, &f, &self.options)
                .map_err(Error::System)?;

            let error_norm = attempt.as_ref().map_or(f64::INFINITY, |a| {
                if a.y_new.iter().all(|v| v.is_finite()) {
                    a.error_norm
                } else {
                    f64::INFINITY
                }
            });

            match attempt {
                Some(a) if error_norm <= 1.0 => {
                    let next = match self.method.error_order() {
                        None => h_abs,
                        Some(_) if clipped => h_abs,
                        Some(order) => {
                            let mut factor = if error_norm == 0.0 {
                                MAX_FACTOR
                            } else {
                                (SAFETY * error_norm.powf(-1.0 / f64::from(order + 1)))
                                    .min(MAX_FACTOR)
                            };
                            if rejected {
                                factor = factor.min(1.0);
                            }
                            h * factor
                        }
                    };

                    self.t = t_new;
                    self.y = a.y_new;
                    self.f = a.f_new;
                    self.stepper.invalidate();
                    self.h_abs = Some(next);
                    self.last_step = Some(h);
                    self.steps += 1;
                    if t_new >= self.t_bound {
                        self.status = Status::Finished;
                    }
                    trace!(method = %self.method, t = t_new, h, "accepted micro-step");
                    return Ok(self.status);
                }
                _ => {
                    let factor = match self.method.error_order() {
                        Some(order) if error_norm.is_finite() => (SAFETY
                            * error_norm.powf(-1.0 / f64::from(order + 1)))
                        .max(MIN_FACTOR),
                        _ => MIN_FACTOR,
                    };
                    h_abs = h * factor.min(1.0);
                    rejected = true;
                }
            }
        }
    }
}

/// Chooses the first step from the local behavior of the system.
///
/// Follows Hairer, Nørsett & Wanner, *Solving ODEs I*, sec. II.4.
fn initial_step<S: OdeSystem>(
    rhs: &mut Rhs<'_, S>,
    t: f64,
    y: &DVector<f64>,
    f: &DVector<f64>,
    order: u32,
    options: &Options,
    interval: f64,
) -> Result<f64, S::Error> {
    const FALLBACK: f64 = 1e-6;

    let (rtol, atol) = (options.rtol(), options.atol());
    let limit = interval.min(options.max_step());

    let d0 = rms_scaled_by(y, y, rtol, atol);
    let d1 = rms_scaled_by(f, y, rtol, atol);

    let h0 = if d0 < 1e-5 || d1 < 1e-5 || !(d0 / d1).is_finite() {
        FALLBACK
    } else {
        0.01 * d0 / d1
    }
    .min(limit);

    let y1 = y + f * h0;
    let f1 = rhs.call(t + h0, &y1)?;
    let d2 = rms_scaled_by(&(f1 - f), y, rtol, atol) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(FALLBACK)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / f64::from(order + 1))
    };

    let h = (100.0 * h0).min(h1).min(limit);
    Ok(if h.is_finite() && h > 0.0 { h } else { FALLBACK })
}
