use std::fmt;

use gds_core::{DomainPoint, TimeIncrement};
use gds_solvers::{
    convex::{self, Expr},
    ode::Options,
};

use crate::{ConfigError, CostContext, SystemView};

type RhsFn<P> = Box<dyn Fn(f64, &SystemView<'_, P>, &mut [f64])>;
type CostFn = Box<dyn Fn(&mut CostContext) -> Expr>;
type MapFn<P> = Box<dyn Fn(&SystemView<'_, P>, &mut [f64])>;

/// Continuous dynamics `d^k y / dt^k = F(t, y)`.
///
/// `F` writes the top derivative at every point into its output slice,
/// which starts zeroed. For order `k > 1` the system state is carried in
/// companion form: `k` blocks of `ndim` holding `y, y', …, y^(k-1)`.
pub struct Continuous<P: DomainPoint> {
    pub(crate) rhs: RhsFn<P>,
    order: usize,
    options: Options,
}

impl<P: DomainPoint> Continuous<P> {
    /// First-order dynamics with default integrator options.
    pub fn new(rhs: impl Fn(f64, &SystemView<'_, P>, &mut [f64]) + 'static) -> Self {
        Self {
            rhs: Box::new(rhs),
            order: 1,
            options: Options::default(),
        }
    }

    /// Sets the differential order `k`.
    #[must_use]
    pub fn with_order(self, order: usize) -> Self {
        Self { order, ..self }
    }

    /// Sets the integrator options, including the maximum step size.
    #[must_use]
    pub fn with_options(self, options: Options) -> Self {
        Self { options, ..self }
    }

    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }
}

/// Each step minimizes a disciplined-convex cost.
///
/// The builder runs when the law is installed and again on every reset. It
/// receives a [`CostContext`] providing the decision variable (the next
/// state), the step time, and any other parameters it declares. A vector
/// cost is minimized through the sum of its absolute values.
pub struct ConvexStep {
    pub(crate) cost: CostFn,
    config: convex::Config,
}

impl ConvexStep {
    pub fn new(cost: impl Fn(&mut CostContext) -> Expr + 'static) -> Self {
        Self {
            cost: Box::new(cost),
            config: convex::Config::default(),
        }
    }

    #[must_use]
    pub fn with_config(self, config: convex::Config) -> Self {
        Self { config, ..self }
    }

    #[must_use]
    pub fn config(&self) -> &convex::Config {
        &self.config
    }
}

/// A recurrence `y ← M(y)` applied once per tick.
///
/// `M` receives the current state through the view and writes the next
/// state into its output slice, which starts as a copy of the current one.
pub struct Discrete<P: DomainPoint> {
    pub(crate) map: MapFn<P>,
    tick: f64,
}

impl<P: DomainPoint> Discrete<P> {
    /// A recurrence ticking once per unit of time.
    pub fn new(map: impl Fn(&SystemView<'_, P>, &mut [f64]) + 'static) -> Self {
        Self {
            map: Box::new(map),
            tick: 1.0,
        }
    }

    /// Sets the time between ticks.
    #[must_use]
    pub fn with_tick(self, tick: f64) -> Self {
        Self { tick, ..self }
    }

    #[must_use]
    pub fn tick(&self) -> f64 {
        self.tick
    }
}

/// An evolution law for a system: exactly one of the three kinds.
///
/// ```
/// use gds_systems::{Discrete, Evolution};
///
/// let evolution = Evolution::<u32>::new()
///     .discrete(Discrete::new(|_, next| next.iter_mut().for_each(|v| *v += 1.0)));
/// # let _ = evolution;
/// ```
pub struct Evolution<P: DomainPoint> {
    continuous: Option<Continuous<P>>,
    convex: Option<ConvexStep>,
    discrete: Option<Discrete<P>>,
}

/// A validated evolution law.
pub(crate) enum Law<P: DomainPoint> {
    Continuous(Continuous<P>),
    Convex(ConvexStep),
    Discrete(Discrete<P>),
}

impl<P: DomainPoint> Default for Evolution<P> {
    fn default() -> Self {
        Self {
            continuous: None,
            convex: None,
            discrete: None,
        }
    }
}

impl<P: DomainPoint> Evolution<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn continuous(self, law: Continuous<P>) -> Self {
        Self {
            continuous: Some(law),
            ..self
        }
    }

    #[must_use]
    pub fn convex(self, law: ConvexStep) -> Self {
        Self {
            convex: Some(law),
            ..self
        }
    }

    #[must_use]
    pub fn discrete(self, law: Discrete<P>) -> Self {
        Self {
            discrete: Some(law),
            ..self
        }
    }

    /// Checks that exactly one well-formed law was given.
    pub(crate) fn into_law(self) -> Result<Law<P>, ConfigError> {
        let count = usize::from(self.continuous.is_some())
            + usize::from(self.convex.is_some())
            + usize::from(self.discrete.is_some());

        match (self.continuous, self.convex, self.discrete) {
            (None, None, None) => Err(ConfigError::NoLaw),
            (Some(law), None, None) if law.order == 0 => Err(ConfigError::Order),
            (Some(law), None, None) => Ok(Law::Continuous(law)),
            (None, Some(law), None) => Ok(Law::Convex(law)),
            (None, None, Some(law)) => match TimeIncrement::new(law.tick) {
                Ok(_) => Ok(Law::Discrete(law)),
                Err(_) => Err(ConfigError::TickInterval(law.tick)),
            },
            _ => Err(ConfigError::MultipleLaws(count)),
        }
    }
}

impl<P: DomainPoint> From<Continuous<P>> for Evolution<P> {
    fn from(law: Continuous<P>) -> Self {
        Self::new().continuous(law)
    }
}

impl<P: DomainPoint> From<ConvexStep> for Evolution<P> {
    fn from(law: ConvexStep) -> Self {
        Self::new().convex(law)
    }
}

impl<P: DomainPoint> From<Discrete<P>> for Evolution<P> {
    fn from(law: Discrete<P>) -> Self {
        Self::new().discrete(law)
    }
}

impl<P: DomainPoint> fmt::Debug for Continuous<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuous")
            .field("order", &self.order)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ConvexStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvexStep")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: DomainPoint> fmt::Debug for Discrete<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discrete")
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero() -> Continuous<u8> {
        Continuous::new(|_, _, _| {})
    }

    fn identity() -> Discrete<u8> {
        Discrete::new(|_, _| {})
    }

    #[test]
    fn exactly_one_law_is_required() {
        assert!(matches!(
            Evolution::<u8>::new().into_law(),
            Err(ConfigError::NoLaw)
        ));
        assert!(matches!(
            Evolution::new().continuous(zero()).discrete(identity()).into_law(),
            Err(ConfigError::MultipleLaws(2))
        ));
        assert!(matches!(
            Evolution::from(identity()).into_law(),
            Ok(Law::Discrete(_))
        ));
    }

    #[test]
    fn laws_are_validated() {
        assert!(matches!(
            Evolution::from(zero().with_order(0)).into_law(),
            Err(ConfigError::Order)
        ));
        assert!(matches!(
            Evolution::from(identity().with_tick(-1.0)).into_law(),
            Err(ConfigError::TickInterval(_))
        ));
    }
}
