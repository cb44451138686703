mod group;
mod lookup;

#[cfg(test)]
mod tests;

use gds_core::{Domain, DomainPoint, TimeIncrement};
use gds_solvers::ode::{Integrator, Method, OdeSystem, Options, Rejection, Status};
use indexmap::{IndexMap, IndexSet};
use nalgebra::DVector;
use tracing::{debug, trace};

use crate::{ConfigError, ConstraintSet, Error, EvolvingSystem, ModeKind, Steppable};

use group::DiscreteGroup;
use lookup::{Continuum, Lookup, Slot};

/// Several named systems advanced together on one clock.
///
/// Continuous members share a single integrator: their states are
/// concatenated into one vector, each member owning a contiguous slot.
/// Convex-step and discrete members form a group that is caught up to
/// every trial time of the integrator, before any continuous law is
/// evaluated there. Laws read each other through [`SystemView::sibling`], and no
/// member ever sees another at a time later than its own.
///
/// [`SystemView::sibling`]: crate::SystemView::sibling
pub struct CoupledSystem<P: DomainPoint> {
    members: IndexMap<String, EvolvingSystem<P>>,
    slots: Vec<Slot>,
    group: DiscreteGroup,
    shared: Option<Shared>,
    t: f64,
}

/// The integrator over all continuous members.
struct Shared {
    integrator: Integrator,
    options: Options,
    accepted: Vec<f64>,
}

/// Read access to one member of a [`CoupledSystem`].
#[derive(Debug)]
pub struct MemberRef<'a, P: DomainPoint> {
    name: &'a str,
    system: &'a EvolvingSystem<P>,
    t: f64,
    state: &'a [f64],
}

impl<P: DomainPoint> CoupledSystem<P> {
    /// Couples named systems.
    ///
    /// Every member needs a law and an initial condition at `t = 0`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TooFewMembers`] for fewer than two members,
    /// [`ConfigError::DuplicateMember`] if a name repeats,
    /// a [`SequenceError`](crate::SequenceError) if a member is not fully
    /// configured, [`ConfigError::NotAtZero`] if one has already advanced,
    /// or [`Error::Construct`] if the shared integrator cannot be built.
    pub fn new<S: Into<String>>(
        members: impl IntoIterator<Item = (S, EvolvingSystem<P>)>,
    ) -> Result<Self, Error> {
        let mut map = IndexMap::new();
        for (name, system) in members {
            let name = name.into();
            if map.contains_key(&name) {
                return Err(ConfigError::DuplicateMember(name).into());
            }
            map.insert(name, system);
        }
        if map.len() < 2 {
            return Err(ConfigError::TooFewMembers(map.len()).into());
        }
        for (name, system) in &map {
            system.require_ready()?;
            if system.t() != 0.0 {
                return Err(ConfigError::NotAtZero {
                    name: name.clone(),
                    t: system.t(),
                }
                .into());
            }
        }

        let mut slots = Vec::new();
        let mut discrete = Vec::new();
        let mut offset = 0;
        for (i, (name, system)) in map.iter().enumerate() {
            if system.mode() == ModeKind::Continuous {
                let len = system.state().len();
                slots.push(Slot {
                    name: name.clone(),
                    member: i,
                    range: offset..offset + len,
                    ndim: system.ndim(),
                });
                offset += len;
            } else {
                discrete.push(i);
            }
        }

        let options = slots
            .iter()
            .filter_map(|slot| map[slot.member].continuous_options())
            .fold(None, |merged: Option<Options>, options| {
                Some(merged.map_or_else(|| options.clone(), |m| m.merge(options)))
            });
        let shared = options
            .map(|options| Shared::new(&map, &slots, options))
            .transpose()?;
        let group = DiscreteGroup::new(&map, discrete);

        debug!(
            members = map.len(),
            continuous = slots.len(),
            shared_len = offset,
            "systems coupled"
        );
        Ok(Self {
            members: map,
            slots,
            group,
            shared,
            t: 0.0,
        })
    }

    /// Advances every member by `dt`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not finite and positive, or if any
    /// member's step fails.
    pub fn step(&mut self, dt: f64) -> Result<(), Error> {
        let dt = TimeIncrement::new(dt)?;
        let t_new = self.t + dt.get();

        match &mut self.shared {
            Some(shared) => {
                shared.advance(t_new, &mut self.members, &self.slots, &mut self.group)?;
                self.t = shared.integrator.t();
            }
            None => {
                self.group
                    .catch_up(&mut self.members, t_new, Continuum::empty())?;
                self.group.commit(&self.members);
                self.t = self.group.t();
            }
        }

        debug!(t = self.t, "coupled step");
        Ok(())
    }

    /// Resets every member and rebuilds the shared integrator and clock.
    ///
    /// # Errors
    ///
    /// Returns an error if a member fails to reset or the integrator cannot
    /// be rebuilt.
    pub fn reset(&mut self) -> Result<(), Error> {
        for system in self.members.values_mut() {
            system.reset()?;
        }
        if let Some(shared) = &mut self.shared {
            *shared = Shared::new(&self.members, &self.slots, shared.options.clone())?;
        }
        let discrete = self.group_indices();
        self.group = DiscreteGroup::new(&self.members, discrete);
        self.t = 0.0;

        debug!("coupled reset");
        Ok(())
    }

    /// Current time.
    #[must_use]
    pub fn t(&self) -> f64 {
        self.t
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names, in the order they were given.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.members.keys().map(String::as_str)
    }

    /// Looks up a member by name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<MemberRef<'_, P>> {
        let (i, name, system) = self.members.get_full(name)?;
        Some(self.member_ref(i, name, system))
    }

    /// Iterates over every member.
    pub fn members(&self) -> impl Iterator<Item = MemberRef<'_, P>> + '_ {
        self.members
            .iter()
            .enumerate()
            .map(|(i, (name, system))| self.member_ref(i, name, system))
    }

    /// Current value of the named member.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&[f64]> {
        self.member(name).map(|m| m.value())
    }

    /// Time at which the named member's value holds.
    #[must_use]
    pub fn time_of(&self, name: &str) -> Option<f64> {
        self.member(name).map(|m| m.t())
    }

    /// The shared integration method, if any member is continuous.
    #[must_use]
    pub fn method(&self) -> Option<Method> {
        self.shared.as_ref().map(|s| s.integrator.method())
    }

    /// Methods rejected when the shared integrator was built.
    #[must_use]
    pub fn rejections(&self) -> &[Rejection] {
        match &self.shared {
            Some(shared) => shared.integrator.rejections(),
            None => &[],
        }
    }

    /// Last micro-step of the shared integrator, or its maximum step.
    #[must_use]
    pub fn step_size(&self) -> Option<f64> {
        self.shared.as_ref().map(|s| {
            s.integrator
                .last_step()
                .unwrap_or_else(|| s.options.max_step())
        })
    }

    fn member_ref<'a>(
        &'a self,
        i: usize,
        name: &'a str,
        system: &'a EvolvingSystem<P>,
    ) -> MemberRef<'a, P> {
        let slot = self.slots.iter().find(|slot| slot.member == i);
        match (slot, &self.shared) {
            (Some(slot), Some(shared)) => MemberRef {
                name,
                system,
                t: self.t,
                state: &shared.integrator.y().as_slice()[slot.range.clone()],
            },
            _ => MemberRef {
                name,
                system,
                t: self.group.t(),
                state: system.state(),
            },
        }
    }

    fn group_indices(&self) -> Vec<usize> {
        let continuous: IndexSet<usize> = self.slots.iter().map(|slot| slot.member).collect();
        (0..self.members.len())
            .filter(|i| !continuous.contains(i))
            .collect()
    }
}

impl Shared {
    fn new<P: DomainPoint>(
        members: &IndexMap<String, EvolvingSystem<P>>,
        slots: &[Slot],
        options: Options,
    ) -> Result<Self, Error> {
        let accepted: Vec<f64> = slots
            .iter()
            .flat_map(|slot| members[slot.member].state().iter().copied())
            .collect();
        let integrator = Integrator::new(0.0, DVector::from_column_slice(&accepted), &options)?;
        Ok(Self {
            integrator,
            options,
            accepted,
        })
    }

    /// Integrates to `t_new`, settling the discrete group after every
    /// accepted micro-step.
    fn advance<P: DomainPoint>(
        &mut self,
        t_new: f64,
        members: &mut IndexMap<String, EvolvingSystem<P>>,
        slots: &[Slot],
        group: &mut DiscreteGroup,
    ) -> Result<(), Error> {
        self.integrator.set_bound(t_new);

        loop {
            let t_accepted = self.integrator.t();
            let status = self
                .integrator
                .step(&mut CoupledRhs {
                    members: &mut *members,
                    slots,
                    group: &mut *group,
                    accepted: Continuum {
                        t: t_accepted,
                        y: &self.accepted,
                        slots,
                    },
                })
                .map_err(Error::from_integration)?;

            let t = self.integrator.t();
            for slot in slots {
                let member = &mut members[slot.member];
                if !member.has_trivial_constraints() {
                    let y = self.integrator.y_mut().as_mut_slice();
                    member.constrain(t, &mut y[slot.range.clone()])?;
                }
            }

            let y = self.integrator.y().as_slice();
            group.catch_up(members, t, Continuum { t, y, slots })?;
            group.commit(members);
            self.accepted.copy_from_slice(y);
            trace!(t, "coupled micro-step");

            if status == Status::Finished {
                return Ok(());
            }
        }
    }
}

/// Combined right-hand side of the continuous members.
struct CoupledRhs<'a, P: DomainPoint> {
    members: &'a mut IndexMap<String, EvolvingSystem<P>>,
    slots: &'a [Slot],
    group: &'a mut DiscreteGroup,
    accepted: Continuum<'a>,
}

impl<P: DomainPoint> OdeSystem for CoupledRhs<'_, P> {
    type Error = Error;

    fn derivative(&mut self, t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>) -> Result<(), Error> {
        self.group.catch_up(self.members, t, self.accepted)?;

        let lookup = Lookup {
            continuum: Continuum {
                t,
                y: y.as_slice(),
                slots: self.slots,
            },
            clock: self.group.t(),
            published: self.group.published(),
        };
        let dydt = dydt.as_mut_slice();
        for slot in self.slots {
            self.members[slot.member].derivative(
                t,
                &y.as_slice()[slot.range.clone()],
                &mut dydt[slot.range.clone()],
                Some(&lookup),
            )?;
        }
        Ok(())
    }
}

impl<'a, P: DomainPoint> MemberRef<'a, P> {
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Time at which this member's value holds.
    #[must_use]
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Current value at every point, in domain order.
    #[must_use]
    pub fn value(&self) -> &'a [f64] {
        &self.state[..self.system.ndim()]
    }

    /// The full state, including lower derivatives for higher-order laws.
    #[must_use]
    pub fn state(&self) -> &'a [f64] {
        self.state
    }

    #[must_use]
    pub fn value_at(&self, point: &P) -> Option<f64> {
        self.system.domain().index_of(point).map(|i| self.state[i])
    }

    #[must_use]
    pub fn mode(&self) -> ModeKind {
        self.system.mode()
    }

    #[must_use]
    pub fn domain(&self) -> &'a Domain<P> {
        self.system.domain()
    }

    #[must_use]
    pub fn constraints(&self) -> &'a ConstraintSet<P> {
        self.system.constraints()
    }
}

impl<P: DomainPoint> Steppable for CoupledSystem<P> {
    fn step(&mut self, dt: f64) -> Result<(), Error> {
        CoupledSystem::step(self, dt)
    }

    fn reset(&mut self) -> Result<(), Error> {
        CoupledSystem::reset(self)
    }

    fn t(&self) -> f64 {
        self.t
    }
}

impl<P: DomainPoint> std::fmt::Debug for CoupledSystem<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoupledSystem")
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("continuous", &self.slots.len())
            .field("t", &self.t)
            .finish_non_exhaustive()
    }
}
