use std::{cell::RefCell, rc::Rc, sync::Arc};

use approx::assert_relative_eq;
use gds_core::Domain;
use gds_solvers::ode::Options;

use super::*;
use crate::{Condition, Constraints, Continuous, ConvexStep, Discrete, SequenceError};

// --- Test fixtures ---

fn line(n: u32) -> Arc<Domain<u32>> {
    Arc::new(Domain::new(0..n).unwrap())
}

fn tight() -> Options {
    Options::default().with_tolerances(1e-9, 1e-12).unwrap()
}

fn system(
    n: u32,
    law: impl Into<crate::Evolution<u32>>,
    initial: Vec<f64>,
) -> EvolvingSystem<u32> {
    let mut system = EvolvingSystem::new(line(n));
    system.set_evolution(law).unwrap();
    system.set_initial(0.0, initial).unwrap();
    system
}

/// dy/dt = -y
fn decay(initial: Vec<f64>) -> EvolvingSystem<u32> {
    #[allow(clippy::cast_possible_truncation)]
    let n = initial.len() as u32;
    system(
        n,
        Continuous::new(|_, view, dy| {
            for (d, y) in dy.iter_mut().zip(view.value()) {
                *d = -y;
            }
        })
        .with_options(tight()),
        initial,
    )
}

/// x ← x + 1 every `tick`.
fn counter(tick: f64) -> EvolvingSystem<u32> {
    system(
        1,
        Discrete::new(|view, next| next[0] = view.value()[0] + 1.0).with_tick(tick),
        vec![0.0],
    )
}

// --- Tests ---

#[test]
fn construction_validates_members() {
    let err = CoupledSystem::new([("a", decay(vec![1.0]))]).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::TooFewMembers(1))));

    let err = CoupledSystem::new([("a", decay(vec![1.0])), ("a", counter(1.0))]).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::DuplicateMember(name)) if name == "a"));

    let mut bare = EvolvingSystem::new(line(1));
    bare.set_evolution(Discrete::new(|_, _| {})).unwrap();
    let err = CoupledSystem::new([("a", decay(vec![1.0])), ("b", bare)]).unwrap_err();
    assert!(matches!(
        err,
        Error::Sequence(SequenceError::InitialUndefined)
    ));

    let mut late = counter(1.0);
    late.step(0.5).unwrap();
    let err = CoupledSystem::new([("a", decay(vec![1.0])), ("late", late)]).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::NotAtZero { t, .. }) if t == 0.5));
}

#[test]
fn continuous_members_share_one_integrator() {
    // a' = -a, b' = a  =>  a = e^{-t}, b = 1 - e^{-t}
    let source = decay(vec![1.0]);
    let sink = system(
        1,
        Continuous::new(|_, view, dy| dy[0] = view.sibling("source").unwrap()[0])
            .with_options(tight()),
        vec![0.0],
    );
    let mut coupled = CoupledSystem::new([("source", source), ("sink", sink)]).unwrap();

    for _ in 0..10 {
        coupled.step(0.1).unwrap();
    }

    let decayed = (-1.0f64).exp();
    assert_relative_eq!(coupled.t(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(coupled.value("source").unwrap()[0], decayed, epsilon = 1e-6);
    assert_relative_eq!(coupled.value("sink").unwrap()[0], 1.0 - decayed, epsilon = 1e-6);
    assert!(coupled.method().is_some());
}

#[test]
fn continuous_laws_never_see_discrete_members_ahead() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    let integral = system(
        1,
        Continuous::new(move |t, view, dy| {
            let count = view.sibling("count").unwrap()[0];
            let time = view.sibling_time("count").unwrap();
            record.borrow_mut().push((t, time, count));
            dy[0] = count;
        })
        .with_options(tight()),
        vec![0.0],
    );
    let mut coupled = CoupledSystem::new([("integral", integral), ("count", counter(0.1))]).unwrap();

    coupled.step(1.0).unwrap();

    let seen = seen.borrow();
    assert!(!seen.is_empty());
    for &(t, time, count) in seen.iter() {
        assert!(time <= t, "count seen at {time} while probing {t}");
        assert!(count <= (t / 0.1 + 1e-9).floor(), "count {count} ahead of t = {t}");
    }
    assert_eq!(coupled.value("count"), Some(&[10.0][..]));
    assert_relative_eq!(coupled.value("integral").unwrap()[0], 4.5, epsilon = 2e-2);
    assert_relative_eq!(coupled.time_of("count").unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn discrete_only_couplings_advance_on_a_shared_clock() {
    let follower = system(
        1,
        Discrete::new(|view, next| next[0] = view.sibling("leader").unwrap()[0]),
        vec![0.0],
    );
    let mut coupled = CoupledSystem::new([("leader", counter(1.0)), ("follower", follower)]).unwrap();

    coupled.step(1.0).unwrap();
    coupled.step(1.0).unwrap();
    coupled.step(1.0).unwrap();

    assert_eq!(coupled.t(), 3.0);
    assert_eq!(coupled.value("leader"), Some(&[3.0][..]));
    assert_eq!(coupled.value("follower"), Some(&[2.0][..]));
    assert!(coupled.method().is_none());
    assert_eq!(coupled.step_size(), None);
}

#[test]
fn catch_up_fires_every_tick_of_a_long_step() {
    let mut coupled = CoupledSystem::new([("fast", counter(0.5)), ("slow", counter(1.0))]).unwrap();

    coupled.step(3.0).unwrap();

    assert_eq!(coupled.value("fast"), Some(&[6.0][..]));
    assert_eq!(coupled.value("slow"), Some(&[3.0][..]));
}

#[test]
fn convex_members_track_continuous_siblings() {
    let tracker = system(
        2,
        ConvexStep::new(|ctx| {
            let target = ctx.sibling("heat", 2);
            (ctx.state() - target).sum_squares()
        }),
        vec![0.0, 0.0],
    );
    let mut coupled = CoupledSystem::new([("heat", decay(vec![1.0, 2.0])), ("tracker", tracker)]).unwrap();

    coupled.step(0.5).unwrap();

    let heat = coupled.value("heat").unwrap().to_vec();
    let tracked = coupled.value("tracker").unwrap();
    assert_relative_eq!(heat[0], (-0.5f64).exp(), epsilon = 1e-6);
    for (x, h) in tracked.iter().zip(&heat) {
        assert_relative_eq!(*x, *h, epsilon = 5e-3);
    }
}

#[test]
fn member_constraints_apply_to_their_own_slot() {
    let mut pinned = decay(vec![1.0, 1.0]);
    pinned
        .set_constraints(Constraints::new().dirichlet(Condition::table([(1, 3.0)])))
        .unwrap();
    let mut coupled = CoupledSystem::new([("free", decay(vec![1.0, 1.0])), ("pinned", pinned)]).unwrap();

    coupled.step(0.5).unwrap();

    let pinned = coupled.member("pinned").unwrap();
    assert_eq!(pinned.value_at(&1), Some(3.0));
    assert_relative_eq!(pinned.value()[0], (-0.5f64).exp(), epsilon = 1e-6);
    assert_relative_eq!(coupled.value("free").unwrap()[1], (-0.5f64).exp(), epsilon = 1e-6);
}

#[test]
fn time_varying_dirichlet_tracks_every_coupled_step() {
    let mut driven = decay(vec![1.0, 1.0]);
    driven
        .set_constraints(
            Constraints::new()
                .dirichlet(Condition::time_varying(|t, p: &u32| (*p == 0).then(|| t.sin()))),
        )
        .unwrap();
    let mut coupled =
        CoupledSystem::new([("driven", driven), ("count", counter(0.25))]).unwrap();

    for _ in 0..5 {
        coupled.step(0.137).unwrap();
        assert_eq!(coupled.value("driven").unwrap()[0], coupled.t().sin());
    }
    assert_relative_eq!(
        coupled.value("driven").unwrap()[1],
        (-coupled.t()).exp(),
        epsilon = 1e-6
    );
}

#[test]
fn shared_integrator_uses_the_strictest_settings() {
    let coarse = system(
        1,
        Continuous::new(|_, _, dy| dy[0] = 1.0).with_options(Options::default().with_max_step(0.01).unwrap()),
        vec![0.0],
    );
    let fine = system(
        1,
        Continuous::new(|_, _, dy| dy[0] = 1.0).with_options(Options::default().with_max_step(0.002).unwrap()),
        vec![0.0],
    );
    let coupled = CoupledSystem::new([("coarse", coarse), ("fine", fine)]).unwrap();

    assert_eq!(coupled.step_size(), Some(0.002));
}

#[test]
fn reset_rebuilds_the_coupling() {
    let mut coupled = CoupledSystem::new([("heat", decay(vec![2.0])), ("count", counter(0.25))]).unwrap();

    coupled.step(1.0).unwrap();
    let first = coupled.value("heat").unwrap()[0];
    coupled.reset().unwrap();

    assert_eq!(coupled.t(), 0.0);
    assert_eq!(coupled.value("heat"), Some(&[2.0][..]));
    assert_eq!(coupled.value("count"), Some(&[0.0][..]));

    coupled.step(1.0).unwrap();
    assert_relative_eq!(coupled.value("heat").unwrap()[0], first, epsilon = 1e-12);
    assert_eq!(coupled.value("count"), Some(&[4.0][..]));
}

#[test]
fn members_are_reported_in_order() {
    let coupled = CoupledSystem::new([("heat", decay(vec![1.0])), ("count", counter(1.0))]).unwrap();

    assert_eq!(coupled.len(), 2);
    assert_eq!(coupled.names().collect::<Vec<_>>(), ["heat", "count"]);
    let modes: Vec<_> = coupled.members().map(|m| (m.name(), m.mode())).collect();
    assert_eq!(
        modes,
        [("heat", ModeKind::Continuous), ("count", ModeKind::Discrete)]
    );
    assert!(coupled.member("missing").is_none());
}
