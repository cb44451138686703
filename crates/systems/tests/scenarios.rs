//! End-to-end behaviour of single systems in each evolution mode.

use std::sync::Arc;

use approx::assert_relative_eq;
use gds_core::Domain;
use gds_solvers::{
    convex::Expr,
    ode::{Method, Options},
};
use gds_systems::{
    Condition, ConfigError, Constraints, Continuous, ConvexStep, Discrete, Error, Evolution,
    EvolvingSystem, Initial, ModeKind, SequenceError, Steppable,
};

fn points(names: &[&'static str]) -> Arc<Domain<&'static str>> {
    Arc::new(Domain::new(names.iter().copied()).unwrap())
}

#[test]
fn fixed_point_holds_its_value_under_a_zero_law() {
    for dt in [0.01, 0.3, 1.0] {
        let mut system = EvolvingSystem::new(points(&["a", "b"]));
        system
            .set_evolution(Continuous::new(|_, _, dy| dy.fill(0.0)))
            .unwrap();
        system
            .set_constraints(
                Constraints::new().dirichlet(Condition::table([("a", 1.0)])),
            )
            .unwrap();
        system
            .set_initial(0.0, Initial::from_fn(|_| 0.0))
            .unwrap();

        while system.t() < 1.0 - 1e-9 {
            system.step(dt).unwrap();
        }

        assert_eq!(system.value(), &[1.0, 0.0], "dt = {dt}");
    }
}

#[test]
fn recurrence_waits_for_a_whole_tick() {
    let mut system = EvolvingSystem::new(points(&["x"]));
    system
        .set_evolution(Discrete::new(|view, next| next[0] = view.value()[0] + 1.0))
        .unwrap();
    system.set_initial(0.0, vec![0.0]).unwrap();

    system.step(0.5).unwrap();
    assert_eq!(system.value(), &[0.0]);
    assert_relative_eq!(system.t(), 0.5);

    system.step(0.5).unwrap();
    assert_eq!(system.value(), &[1.0]);
}

#[test]
fn accumulated_fractional_steps_reach_the_tick() {
    let mut system = EvolvingSystem::new(points(&["x"]));
    system
        .set_evolution(Discrete::new(|view, next| next[0] = view.value()[0] + 1.0))
        .unwrap();
    system.set_initial(0.0, vec![0.0]).unwrap();

    for _ in 0..10 {
        system.step(0.1).unwrap();
    }

    assert_eq!(system.value(), &[1.0]);
}

#[test]
fn convex_step_reaches_its_target_and_stays() {
    let target = vec![3.0, -1.0, 0.5];
    let mut system = EvolvingSystem::new(points(&["a", "b", "c"]));
    system
        .set_evolution(ConvexStep::new(move |ctx| {
            (ctx.state() - Expr::constant(target.clone())).sum_squares()
        }))
        .unwrap();
    system.set_initial(0.0, vec![100.0, 100.0, -100.0]).unwrap();

    system.step(1.0).unwrap();
    let first = system.value().to_vec();
    for (x, expected) in first.iter().zip([3.0, -1.0, 0.5]) {
        assert_relative_eq!(*x, expected, epsilon = 1e-8);
    }

    system.step(1.0).unwrap();
    for (x, y) in system.value().iter().zip(&first) {
        assert_relative_eq!(*x, *y, epsilon = 1e-10);
    }
}

#[test]
fn convex_step_sees_time_varying_boundary_values() {
    let mut system = EvolvingSystem::new(points(&["left", "mid", "right"]));
    system
        .set_evolution(ConvexStep::new(|ctx| {
            let y = ctx.state();
            (y.index(&[1, 2]) - y.index(&[0, 1])).sum_squares()
        }))
        .unwrap();
    system.set_initial(0.0, Initial::zeros()).unwrap();
    system
        .set_constraints(Constraints::new().dirichlet(Condition::time_varying(
            |t, p: &&str| match *p {
                "left" => Some(t),
                "right" => Some(-t),
                _ => None,
            },
        )))
        .unwrap();

    system.step(2.0).unwrap();

    assert_eq!(system.value_at(&"left"), Some(2.0));
    assert_eq!(system.value_at(&"right"), Some(-2.0));
    assert_relative_eq!(system.value_at(&"mid").unwrap(), 0.0, epsilon = 1e-8);
}

#[test]
fn zero_second_order_law_carries_velocity() {
    for dt in [0.1, 0.25, 1.0] {
        let mut system = EvolvingSystem::new(points(&["p", "q"]));
        system
            .set_evolution(Continuous::new(|_, _, acc| acc.fill(0.0)).with_order(2))
            .unwrap();
        system.set_initial(0.0, vec![1.0, -1.0, 2.0, 0.5]).unwrap();

        system.step(dt).unwrap();

        let state = system.state();
        assert_relative_eq!(state[0], 1.0 + 2.0 * dt, epsilon = 1e-9);
        assert_relative_eq!(state[1], -1.0 + 0.5 * dt, epsilon = 1e-9);
        assert_relative_eq!(state[2], 2.0, epsilon = 1e-12);
        assert_relative_eq!(state[3], 0.5, epsilon = 1e-12);
    }
}

#[test]
fn oversized_states_fall_back_to_an_explicit_method() {
    let options = Options::default()
        .with_dense_jacobian_limit(2)
        .with_candidates([Method::Rosenbrock23, Method::Dopri5])
        .unwrap();
    let mut system = EvolvingSystem::new(points(&["a", "b", "c"]));
    system
        .set_evolution(Continuous::new(|_, view, dy| {
            for (d, y) in dy.iter_mut().zip(view.value()) {
                *d = -y;
            }
        })
        .with_options(options))
        .unwrap();

    assert_eq!(system.method(), Some(Method::Dopri5));
    assert_eq!(system.rejections().len(), 1);
    assert_eq!(system.rejections()[0].method, Method::Rosenbrock23);

    system.set_initial(0.0, vec![1.0, 1.0, 1.0]).unwrap();
    system.step(1.0).unwrap();
    assert_relative_eq!(system.value()[2], (-1.0f64).exp(), epsilon = 1e-3);
}

#[test]
fn misconfiguration_is_reported_before_stepping() {
    let mut system = EvolvingSystem::new(points(&["a", "b"]));

    let both: Evolution<&str> = Evolution::new()
        .continuous(Continuous::new(|_, _, _| {}))
        .discrete(Discrete::new(|_, _| {}));
    assert!(matches!(
        system.set_evolution(both),
        Err(Error::Config(ConfigError::MultipleLaws(2)))
    ));
    assert!(matches!(
        system.set_evolution(Evolution::new()),
        Err(Error::Config(ConfigError::NoLaw))
    ));
    assert_eq!(system.mode(), ModeKind::Undefined);

    system.set_evolution(Discrete::new(|_, _| {})).unwrap();
    let overlap = Constraints::new()
        .dirichlet(Condition::table([("a", 0.0)]))
        .neumann(Condition::table([("a", 1.0)]));
    assert!(matches!(
        system.set_constraints(overlap),
        Err(Error::Config(ConfigError::Overlap(_)))
    ));
    assert!(matches!(
        system.step(1.0),
        Err(Error::Sequence(SequenceError::InitialUndefined))
    ));
}

#[test]
fn steppable_drives_a_system_with_observation() {
    let mut system = EvolvingSystem::new(points(&["x"]));
    system
        .set_evolution(Discrete::new(|view, next| next[0] = 2.0 * view.value()[0]))
        .unwrap();
    system.set_initial(0.0, vec![1.0]).unwrap();

    let mut history = Vec::new();
    system
        .run(1.0, 4, |s| history.push((s.t(), s.value()[0])))
        .unwrap();

    assert_eq!(history, [(1.0, 2.0), (2.0, 4.0), (3.0, 8.0), (4.0, 16.0)]);
}
