//! Adaptive ODE integrators driven one micro-step at a time.
//!
//! An [`Integrator`] owns the current `(t, y)` pair and a horizon `t_bound`.
//! Each call to [`Integrator::step`] takes one accepted micro-step toward the
//! horizon and reports whether the horizon has been reached. Between
//! micro-steps the caller may overwrite entries of the state through
//! [`Integrator::y_mut`]; the integrator discards any cached derivative when
//! that happens.
//!
//! # Method selection
//!
//! [`Integrator::new`] walks the ordered candidate list in [`Options`] and
//! keeps the first method whose construction succeeds. The default order is
//! [`Method::Rosenbrock23`] (linearly implicit, robust for stiff problems)
//! then [`Method::Dopri5`] (explicit, adaptive). Rejected candidates are
//! logged and recorded, and the active method is reported by
//! [`Integrator::method`].
//!
//! # Example
//!
//! ```
//! use gds_solvers::ode::{FnSystem, Integrator, Options, Status};
//! use nalgebra::DVector;
//!
//! // dy/dt = -y
//! let mut system = FnSystem::new(|_t: f64, y: &DVector<f64>, dy: &mut DVector<f64>| {
//!     dy.copy_from(&(-y));
//!     Ok::<(), std::convert::Infallible>(())
//! });
//!
//! let options = Options::default().with_max_step(0.1).unwrap();
//! let mut integrator = Integrator::new(0.0, DVector::from_element(1, 1.0), &options).unwrap();
//! integrator.set_bound(1.0);
//! while integrator.step(&mut system).unwrap() == Status::Running {}
//!
//! assert!((integrator.y()[0] - (-1.0f64).exp()).abs() < 1e-3);
//! ```

mod dopri5;
mod error;
mod integrator;
mod method;
mod norm;
mod options;
mod rk4;
mod rosenbrock;
mod system;


pub use error::{ConstructError, Error, Rejection};
pub use integrator::{Integrator, Status};
pub use method::Method;
pub use options::{Options, OptionsError};
pub use system::{FnSystem, OdeSystem};
