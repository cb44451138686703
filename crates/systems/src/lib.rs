//! Evolving and coupled systems over discrete domains.
//!
//! An [`EvolvingSystem`] carries a quantity over the points of a
//! [`Domain`](gds_core::Domain) and advances it under exactly one law:
//!
//! - [`Continuous`]: an ODE `dᵏy/dtᵏ = F(t, view)`, integrated in companion
//!   form by an adaptive integrator
//! - [`ConvexStep`]: each step minimizes a disciplined-convex cost
//! - [`Discrete`]: a recurrence applied once per tick
//!
//! Boundary conditions are installed through [`Constraints`]: Dirichlet
//! values are held exactly, Neumann values are exposed to laws, and an
//! optional projection runs after every step.
//!
//! A [`CoupledSystem`] advances several named systems on one clock. Laws
//! read each other through [`SystemView::sibling`], and the coupling
//! guarantees no member is ever observed at a time later than the one being
//! evaluated.
//!
//! ```
//! use std::sync::Arc;
//!
//! use gds_core::Domain;
//! use gds_systems::{Condition, Constraints, Continuous, EvolvingSystem};
//!
//! // Heat flow along a rod with both ends held at fixed temperatures.
//! let domain = Arc::new(Domain::new(0..5_usize).unwrap());
//! let mut rod = EvolvingSystem::new(domain);
//! rod.set_evolution(Continuous::new(|_, view, dy| {
//!     let u = view.value();
//!     for i in 1..u.len() - 1 {
//!         dy[i] = u[i - 1] - 2.0 * u[i] + u[i + 1];
//!     }
//! }))
//! .unwrap();
//! rod.set_initial(0.0, vec![0.0; 5]).unwrap();
//! rod.set_constraints(Constraints::new().dirichlet(Condition::from_fn(|&i: &usize| {
//!     match i {
//!         0 => Some(1.0),
//!         4 => Some(0.0),
//!         _ => None,
//!     }
//! })))
//! .unwrap();
//!
//! rod.step(0.5).unwrap();
//! assert_eq!(rod.value()[0], 1.0);
//! assert_eq!(rod.value()[4], 0.0);
//! assert!(rod.value()[1] > rod.value()[2]);
//! ```

mod constraint;
mod coupled;
mod error;
mod initial;
mod law;
mod mode;
mod steppable;
mod system;
mod view;

pub use constraint::{Boundary, Condition, ConstraintSet, Constraints};
pub use coupled::{CoupledSystem, MemberRef};
pub use error::{ConfigError, Error, SequenceError};
pub use initial::Initial;
pub use law::{Continuous, ConvexStep, Discrete, Evolution};
pub use mode::{CostContext, ModeKind};
pub use steppable::Steppable;
pub use system::EvolvingSystem;
pub use view::{Siblings, SystemView};
