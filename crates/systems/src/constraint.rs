use std::{collections::HashMap, fmt};

use gds_core::{Domain, DomainPoint};
use indexmap::IndexSet;

use crate::ConfigError;

type StaticFn<P> = Box<dyn Fn(&P) -> Option<f64>>;
type DynamicFn<P> = Box<dyn Fn(f64, &P) -> Option<f64>>;
type Projection = Box<dyn Fn(&mut [f64])>;

/// A boundary condition over the points of a domain.
///
/// A condition both selects the points it constrains (those for which it
/// yields a value) and supplies their values. Static conditions are
/// evaluated once; time-varying ones are re-evaluated at every step.
pub enum Condition<P> {
    /// Constrains no points.
    None,
    /// `point → value`, evaluated once.
    Static(StaticFn<P>),
    /// `(t, point) → value`, re-evaluated as time advances.
    Dynamic(DynamicFn<P>),
    /// A fixed lookup table.
    Table(HashMap<P, f64>),
}

impl<P: DomainPoint> Condition<P> {
    /// A static condition; points mapped to `None` are unconstrained.
    pub fn from_fn(f: impl Fn(&P) -> Option<f64> + 'static) -> Self {
        Self::Static(Box::new(f))
    }

    /// A time-varying condition.
    ///
    /// Which points are constrained is decided when the condition is
    /// installed; afterwards only the values change.
    pub fn time_varying(f: impl Fn(f64, &P) -> Option<f64> + 'static) -> Self {
        Self::Dynamic(Box::new(f))
    }

    /// A static lookup table.
    pub fn table(entries: impl IntoIterator<Item = (P, f64)>) -> Self {
        Self::Table(entries.into_iter().collect())
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    fn value(&self, t: f64, point: &P) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Static(f) => f(point),
            Self::Dynamic(f) => f(t, point),
            Self::Table(table) => table.get(point).copied(),
        }
    }
}

impl<P> Default for Condition<P> {
    fn default() -> Self {
        Self::None
    }
}

impl<P> fmt::Debug for Condition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Static(_) => f.write_str("Static(..)"),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
            Self::Table(table) => write!(f, "Table({} entries)", table.len()),
        }
    }
}

/// Boundary conditions and projection for one system.
///
/// ```
/// use gds_systems::{Condition, Constraints};
///
/// let constraints = Constraints::new()
///     .dirichlet(Condition::from_fn(|x: &u32| (*x == 0).then_some(1.0)))
///     .neumann(Condition::time_varying(|t, x: &u32| (*x == 9).then_some(t.sin())))
///     .projection(|y: &mut [f64]| y.iter_mut().for_each(|v| *v = v.max(0.0)));
/// # let _ = constraints;
/// ```
pub struct Constraints<P> {
    dirichlet: Condition<P>,
    neumann: Condition<P>,
    projection: Option<Projection>,
}

impl<P> Default for Constraints<P> {
    fn default() -> Self {
        Self {
            dirichlet: Condition::None,
            neumann: Condition::None,
            projection: None,
        }
    }
}

impl<P: DomainPoint> Constraints<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed values imposed on the state.
    #[must_use]
    pub fn dirichlet(mut self, condition: Condition<P>) -> Self {
        self.dirichlet = condition;
        self
    }

    /// Fluxes made available to evolution laws.
    #[must_use]
    pub fn neumann(mut self, condition: Condition<P>) -> Self {
        self.neumann = condition;
        self
    }

    /// A map applied to the full state after every step.
    #[must_use]
    pub fn projection(mut self, project: impl Fn(&mut [f64]) + 'static) -> Self {
        self.projection = Some(Box::new(project));
        self
    }
}

/// The points one boundary condition constrains and their current values.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary<P: DomainPoint> {
    points: IndexSet<P>,
    indices: Vec<usize>,
    values: Vec<f64>,
    dynamic: bool,
}

impl<P: DomainPoint> Boundary<P> {
    fn empty() -> Self {
        Self {
            points: IndexSet::new(),
            indices: Vec::new(),
            values: Vec::new(),
            dynamic: false,
        }
    }

    fn populate(condition: &Condition<P>, domain: &Domain<P>, t: f64) -> Result<Self, ConfigError> {
        if let Condition::Table(table) = condition {
            if let Some(point) = table.keys().find(|p| !domain.contains(p)) {
                return Err(ConfigError::UnknownPoint(format!("{point:?}")));
            }
        }

        let mut boundary = Self {
            dynamic: condition.is_dynamic(),
            ..Self::empty()
        };
        for (i, point) in domain.indexed() {
            if let Some(value) = condition.value(t, point) {
                boundary.points.insert(point.clone());
                boundary.indices.push(i);
                boundary.values.push(value);
            }
        }
        Ok(boundary)
    }

    fn refresh(&mut self, condition: &Condition<P>, t: f64) -> Result<(), ConfigError> {
        if !self.dynamic {
            return Ok(());
        }
        for (point, value) in self.points.iter().zip(&mut self.values) {
            *value = condition
                .value(t, point)
                .ok_or_else(|| ConfigError::MissingBoundaryValue {
                    point: format!("{point:?}"),
                    t,
                })?;
        }
        Ok(())
    }

    /// The constrained points, in domain order.
    #[must_use]
    pub fn points(&self) -> &IndexSet<P> {
        &self.points
    }

    /// Domain indices of the constrained points.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Current values, aligned with [`Boundary::indices`].
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Current value at `point`, if it is constrained.
    #[must_use]
    pub fn value_of(&self, point: &P) -> Option<f64> {
        self.points.get_index_of(point).map(|k| self.values[k])
    }

    /// Iterates over `(index, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns `true` if the values are re-evaluated over time.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

/// Installed constraints of a system, with values cached at the last refresh.
pub struct ConstraintSet<P: DomainPoint> {
    dirichlet_law: Condition<P>,
    neumann_law: Condition<P>,
    projection: Option<Projection>,
    dirichlet: Boundary<P>,
    neumann: Boundary<P>,
}

impl<P: DomainPoint> ConstraintSet<P> {
    /// A set with no boundary conditions and the identity projection.
    pub(crate) fn empty() -> Self {
        Self {
            dirichlet_law: Condition::None,
            neumann_law: Condition::None,
            projection: None,
            dirichlet: Boundary::empty(),
            neumann: Boundary::empty(),
        }
    }

    /// Resolves constraints against a domain at time `t`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Overlap`] if a point is both Dirichlet and
    /// Neumann, or [`ConfigError::UnknownPoint`] if a table names a point
    /// outside the domain.
    pub(crate) fn new(
        constraints: Constraints<P>,
        domain: &Domain<P>,
        t: f64,
    ) -> Result<Self, ConfigError> {
        let dirichlet = Boundary::populate(&constraints.dirichlet, domain, t)?;
        let neumann = Boundary::populate(&constraints.neumann, domain, t)?;

        let overlap: Vec<String> = dirichlet
            .points
            .intersection(&neumann.points)
            .map(|p| format!("{p:?}"))
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::Overlap(overlap));
        }

        Ok(Self {
            dirichlet_law: constraints.dirichlet,
            neumann_law: constraints.neumann,
            projection: constraints.projection,
            dirichlet,
            neumann,
        })
    }

    #[must_use]
    pub fn dirichlet(&self) -> &Boundary<P> {
        &self.dirichlet
    }

    #[must_use]
    pub fn neumann(&self) -> &Boundary<P> {
        &self.neumann
    }

    #[must_use]
    pub fn has_projection(&self) -> bool {
        self.projection.is_some()
    }

    /// Returns `true` if injection would never change a state.
    pub(crate) fn is_trivial(&self) -> bool {
        self.dirichlet.is_empty() && self.projection.is_none()
    }

    /// Re-evaluates time-varying values at `t`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingBoundaryValue`] if a constrained point
    /// no longer has a value.
    pub(crate) fn refresh(&mut self, t: f64) -> Result<(), ConfigError> {
        self.dirichlet.refresh(&self.dirichlet_law, t)?;
        self.neumann.refresh(&self.neumann_law, t)
    }

    /// Writes Dirichlet values into a (possibly companion-form) state and
    /// applies the projection.
    ///
    /// Dirichlet values go to the first `ndim` block; every higher block is
    /// zeroed at constrained indices. Values are written again after the
    /// projection so they hold exactly.
    pub(crate) fn inject(&self, state: &mut [f64], ndim: usize) {
        self.write_dirichlet(state, ndim);
        if let Some(project) = &self.projection {
            project(state);
            self.write_dirichlet(state, ndim);
        }
    }

    /// Zeroes the derivative of every block at constrained indices.
    pub(crate) fn hold_fixed(&self, dydt: &mut [f64], ndim: usize) {
        for &i in &self.dirichlet.indices {
            for v in dydt.iter_mut().skip(i).step_by(ndim) {
                *v = 0.0;
            }
        }
    }

    fn write_dirichlet(&self, state: &mut [f64], ndim: usize) {
        for (i, value) in self.dirichlet.iter() {
            state[i] = value;
            for v in state.iter_mut().skip(i + ndim).step_by(ndim) {
                *v = 0.0;
            }
        }
    }
}

impl<P: DomainPoint> fmt::Debug for ConstraintSet<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSet")
            .field("dirichlet", &self.dirichlet)
            .field("neumann", &self.neumann)
            .field("projection", &self.projection.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn line(n: u32) -> Domain<u32> {
        Domain::new(0..n).unwrap()
    }

    fn ends(x: &u32) -> Option<f64> {
        match x {
            0 => Some(1.0),
            4 => Some(-1.0),
            _ => None,
        }
    }

    #[test]
    fn static_condition_selects_points_in_domain_order() {
        let set = ConstraintSet::new(
            Constraints::new().dirichlet(Condition::from_fn(ends)),
            &line(5),
            0.0,
        )
        .unwrap();

        assert_eq!(set.dirichlet().indices(), &[0, 4]);
        assert_eq!(set.dirichlet().values(), &[1.0, -1.0]);
        assert_eq!(set.dirichlet().value_of(&4), Some(-1.0));
        assert!(!set.dirichlet().is_dynamic());
        assert!(set.neumann().is_empty());
    }

    #[test]
    fn overlapping_conditions_are_rejected() {
        let err = ConstraintSet::new(
            Constraints::new()
                .dirichlet(Condition::from_fn(ends))
                .neumann(Condition::table([(4, 0.5), (2, 0.0)])),
            &line(5),
            0.0,
        )
        .unwrap_err();

        assert_eq!(err, ConfigError::Overlap(vec!["4".into()]));
    }

    #[test]
    fn tables_must_stay_inside_the_domain() {
        let err = ConstraintSet::new(
            Constraints::new().dirichlet(Condition::table([(7, 0.0)])),
            &line(5),
            0.0,
        )
        .unwrap_err();

        assert_eq!(err, ConfigError::UnknownPoint("7".into()));
    }

    #[test]
    fn dynamic_values_follow_time_but_membership_is_fixed() {
        let mut set = ConstraintSet::new(
            Constraints::new().dirichlet(Condition::time_varying(|t, x: &u32| {
                (*x == 1 || t > 5.0).then_some(2.0 * t)
            })),
            &line(3),
            0.0,
        )
        .unwrap();
        assert_eq!(set.dirichlet().indices(), &[1]);

        set.refresh(10.0).unwrap();
        assert_eq!(set.dirichlet().indices(), &[1]);
        assert_relative_eq!(set.dirichlet().values()[0], 20.0);
    }

    #[test]
    fn dynamic_condition_must_keep_covering_its_points() {
        let mut set = ConstraintSet::new(
            Constraints::new().neumann(Condition::time_varying(|t, x: &u32| {
                (*x == 0 && t < 1.0).then_some(0.0)
            })),
            &line(2),
            0.0,
        )
        .unwrap();

        assert!(matches!(
            set.refresh(2.0),
            Err(ConfigError::MissingBoundaryValue { .. })
        ));
    }

    #[test]
    fn injection_holds_dirichlet_values_through_projection() {
        let set = ConstraintSet::new(
            Constraints::new()
                .dirichlet(Condition::from_fn(ends))
                .projection(|y: &mut [f64]| y.iter_mut().for_each(|v| *v *= 10.0)),
            &line(5),
            0.0,
        )
        .unwrap();

        let mut state = vec![0.5; 10];
        set.inject(&mut state, 5);

        assert_eq!(&state[..5], &[1.0, 5.0, 5.0, 5.0, -1.0]);
        // Higher companion block is held at zero at constrained indices.
        assert_eq!(&state[5..], &[0.0, 5.0, 5.0, 5.0, 0.0]);
    }

    #[test]
    fn derivatives_are_zeroed_at_fixed_points_in_every_block() {
        let set = ConstraintSet::new(
            Constraints::new().dirichlet(Condition::table([(1, 3.0)])),
            &line(3),
            0.0,
        )
        .unwrap();

        let mut dydt = vec![1.0; 6];
        set.hold_fixed(&mut dydt, 3);
        assert_eq!(dydt, vec![1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
    }
}
