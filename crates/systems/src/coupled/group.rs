use gds_core::DomainPoint;
use indexmap::IndexMap;
use tracing::trace;

use super::lookup::{Continuum, Lookup};
use crate::{EvolvingSystem, Error, system::Snapshot};

/// Convex-step and discrete members sharing one clock.
///
/// Values are published after every member has advanced, so within one
/// catch-up chunk all members read each other's values from the end of the
/// previous chunk. A checkpoint taken at the last accepted continuous time
/// lets trial evaluations that move backwards start again from there.
pub(super) struct DiscreteGroup {
    members: Vec<usize>,
    chunk: f64,
    t: f64,
    published: IndexMap<String, Vec<f64>>,
    checkpoint: Checkpoint,
}

struct Checkpoint {
    t: f64,
    snapshots: Vec<Snapshot>,
    published: IndexMap<String, Vec<f64>>,
}

impl DiscreteGroup {
    /// Collects the non-continuous members, starting the clock at zero.
    ///
    /// Catch-up advances in chunks no longer than the smallest tick.
    pub(super) fn new<P: DomainPoint>(
        members: &IndexMap<String, EvolvingSystem<P>>,
        indices: Vec<usize>,
    ) -> Self {
        let chunk = indices
            .iter()
            .filter_map(|&i| members[i].tick())
            .fold(f64::INFINITY, f64::min);

        let mut group = Self {
            members: indices,
            chunk,
            t: 0.0,
            published: IndexMap::new(),
            checkpoint: Checkpoint {
                t: 0.0,
                snapshots: Vec::new(),
                published: IndexMap::new(),
            },
        };
        group.republish(members);
        group.commit(members);
        group
    }

    pub(super) fn t(&self) -> f64 {
        self.t
    }

    pub(super) fn published(&self) -> &IndexMap<String, Vec<f64>> {
        &self.published
    }

    /// Brings every member to `target`.
    ///
    /// If the clock is already past `target` the group first returns to its
    /// checkpoint, so no member is ever left ahead of the time being evaluated.
    pub(super) fn catch_up<P: DomainPoint>(
        &mut self,
        members: &mut IndexMap<String, EvolvingSystem<P>>,
        target: f64,
        continuum: Continuum<'_>,
    ) -> Result<(), Error> {
        if self.members.is_empty() {
            self.t = target;
            return Ok(());
        }
        if target < self.t {
            self.restore(members);
        }

        while self.t < target {
            let next = if target - self.t > self.chunk {
                self.t + self.chunk
            } else {
                target
            };

            let lookup = Lookup {
                continuum,
                clock: self.t,
                published: &self.published,
            };
            for &i in &self.members {
                members[i].advance_to(next, Some(&lookup))?;
            }

            self.t = next;
            self.republish(members);
            trace!(t = next, "discrete catch-up");
        }
        Ok(())
    }

    /// Marks the current clock and member states as accepted.
    pub(super) fn commit<P: DomainPoint>(&mut self, members: &IndexMap<String, EvolvingSystem<P>>) {
        self.checkpoint.t = self.t;
        self.checkpoint.snapshots = self.members.iter().map(|&i| members[i].snapshot()).collect();
        self.checkpoint.published.clone_from(&self.published);
    }

    fn restore<P: DomainPoint>(&mut self, members: &mut IndexMap<String, EvolvingSystem<P>>) {
        for (snapshot, &i) in self.checkpoint.snapshots.iter().zip(&self.members) {
            members[i].restore(snapshot);
        }
        self.published.clone_from(&self.checkpoint.published);
        self.t = self.checkpoint.t;
        trace!(t = self.t, "discrete members restored");
    }

    fn republish<P: DomainPoint>(&mut self, members: &IndexMap<String, EvolvingSystem<P>>) {
        for &i in &self.members {
            if let Some((name, system)) = members.get_index(i) {
                match self.published.get_mut(name) {
                    Some(value) => value.copy_from_slice(system.value()),
                    None => {
                        self.published.insert(name.clone(), system.value().to_vec());
                    }
                }
            }
        }
    }
}
