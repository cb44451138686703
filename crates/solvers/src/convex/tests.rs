use approx::assert_relative_eq;

use super::*;

// --- Test fixtures ---

/// `min Σ (y - target)²` with `target` as a parameter.
fn least_squares(len: usize) -> (Problem, ParamId) {
    let mut builder = ProblemBuilder::new(len);
    let y = builder.variable();
    let target = builder.parameter(len, false);
    let problem = builder.minimize((&y - target.expr()).sum_squares()).unwrap();
    (problem, target.id())
}

// --- Tests ---

#[test]
fn smooth_quadratic_converges_in_one_newton_step() {
    let (mut problem, target) = least_squares(3);
    problem.set_parameter(target, &[1.0, -2.0, 0.5]).unwrap();

    let solution = problem.solve(&[10.0, 10.0, 10.0], &Config::default()).unwrap();

    assert_eq!(solution.status, Status::Optimal);
    assert_eq!(solution.iters, 1);
    for (x, expected) in solution.x.iter().zip([1.0, -2.0, 0.5]) {
        assert_relative_eq!(*x, expected, epsilon = 1e-12);
    }
    assert_relative_eq!(solution.objective, 0.0, epsilon = 1e-18);
}

#[test]
fn absolute_deviation_is_solved_through_smoothing() {
    let builder = ProblemBuilder::new(2);
    let y = builder.variable();
    let problem = builder
        .minimize((&y - Expr::constant(vec![1.0, 2.0])).norm1())
        .unwrap();

    let solution = problem.solve(&[0.0, 0.0], &Config::default()).unwrap();

    assert!(solution.is_optimal());
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(solution.x[1], 2.0, epsilon = 1e-8);
    assert_relative_eq!(solution.objective, 0.0, epsilon = 1e-8);
}

#[test]
fn vector_objective_is_reduced_to_sum_of_absolute_values() {
    let builder = ProblemBuilder::new(2);
    let y = builder.variable();
    let problem = builder.minimize(&y - 4.0).unwrap();

    assert!(problem.objective().is_scalar());
    let solution = problem.solve(&[0.0, 0.0], &Config::default()).unwrap();
    for x in &solution.x {
        assert_relative_eq!(*x, 4.0, epsilon = 1e-8);
    }
}

#[test]
fn non_convex_objectives_are_rejected() {
    let builder = ProblemBuilder::new(2);
    let y = builder.variable();
    let err = builder.minimize(-y.norm2()).unwrap_err();
    assert_eq!(err, DcpError::NotConvex(Curvature::Concave));

    let builder = ProblemBuilder::new(2);
    let y = builder.variable();
    let err = builder.minimize((&y * &y).sum()).unwrap_err();
    assert_eq!(err, DcpError::NotConvex(Curvature::Unknown));
}

#[test]
fn malformed_and_foreign_expressions_are_rejected() {
    let builder = ProblemBuilder::new(2);
    let y = builder.variable();
    let bad = (&y + Expr::constant(vec![1.0, 2.0, 3.0])).sum();
    assert!(matches!(builder.minimize(bad), Err(DcpError::Invalid(_))));

    let other = ProblemBuilder::new(5).variable();
    let builder = ProblemBuilder::new(2);
    assert_eq!(
        builder.minimize(other.sum_squares()).unwrap_err(),
        DcpError::Foreign
    );
}

#[test]
fn fixed_entries_are_held_and_the_rest_optimized() {
    // Discrete Laplacian smoothing with pinned ends: minimizer is linear.
    let n = 5;
    let builder = ProblemBuilder::new(n);
    let y = builder.variable();
    let head: Vec<usize> = (0..n - 1).collect();
    let tail: Vec<usize> = (1..n).collect();
    let mut problem = builder
        .minimize((y.index(&tail) - y.index(&head)).sum_squares())
        .unwrap();
    problem.fix(&[0, n - 1], &[0.0, 4.0]).unwrap();

    let solution = problem.solve(&[9.0; 5], &Config::default()).unwrap();

    assert!(solution.is_optimal());
    for (i, x) in solution.x.iter().enumerate() {
        assert_relative_eq!(*x, i as f64, epsilon = 1e-9);
    }
}

#[test]
fn parameters_must_be_set_with_matching_shape() {
    let (mut problem, target) = least_squares(2);

    assert_eq!(
        problem.solve(&[0.0, 0.0], &Config::default()),
        Err(ProblemError::ParameterUnset(target))
    );
    assert!(matches!(
        problem.set_parameter(target, &[1.0]),
        Err(ProblemError::ParameterLength { expected: 2, got: 1, .. })
    ));
    assert!(problem.set_parameter(target, &[1.0, f64::NAN]).is_err());
}

#[test]
fn nonnegative_parameters_scale_convex_terms() {
    let mut builder = ProblemBuilder::new(1);
    let y = builder.variable();
    let weight = builder.scalar_parameter(true);
    let objective = weight.expr() * (&y - 2.0).square().sum() + (&y).sum_squares();
    let mut problem = builder.minimize(objective).unwrap();

    assert!(matches!(
        problem.set_parameter(weight.id(), &[-1.0]),
        Err(ProblemError::NegativeParameter(_))
    ));

    // w (y - 2)² + y² is minimized at y = 2w / (w + 1).
    problem.set_parameter(weight.id(), &[3.0]).unwrap();
    let solution = problem.solve(&[0.0], &Config::default()).unwrap();
    assert_relative_eq!(solution.x[0], 1.5, epsilon = 1e-10);
}

#[test]
fn unbounded_objective_is_reported() {
    let builder = ProblemBuilder::new(3);
    let y = builder.variable();
    let problem = builder.minimize(y.sum()).unwrap();

    let solution = problem.solve(&[0.0; 3], &Config::default()).unwrap();
    assert_eq!(solution.status, Status::Unbounded);
}

#[test]
fn warm_start_at_optimum_takes_no_steps() {
    let (mut problem, target) = least_squares(2);
    problem.set_parameter(target, &[0.5, 0.25]).unwrap();

    let solution = problem.solve(&[0.5, 0.25], &Config::default()).unwrap();
    assert_eq!(solution.iters, 0);
    assert_eq!(solution.x, vec![0.5, 0.25]);
}

#[test]
fn warm_start_shape_is_checked() {
    let (mut problem, target) = least_squares(2);
    problem.set_parameter(target, &[0.0, 0.0]).unwrap();
    assert_eq!(
        problem.solve(&[0.0], &Config::default()),
        Err(ProblemError::WarmStartLength {
            expected: 2,
            got: 1
        })
    );
    assert!(problem.fix(&[2], &[1.0]).is_err());
}

#[test]
fn max_combines_with_other_atoms() {
    // max(y) + Σ (y - 1)²  =>  symmetric optimum below 1.
    let builder = ProblemBuilder::new(2);
    let y = builder.variable();
    let problem = builder
        .minimize(y.max() + (&y - 1.0).sum_squares())
        .unwrap();

    let solution = problem.solve(&[0.0, 0.0], &Config::default()).unwrap();
    assert!(solution.is_optimal());
    // At the optimum both entries equal and 1 = 2·2·(1 - y), so y = 0.75.
    assert_relative_eq!(solution.x[0], 0.75, epsilon = 1e-6);
    assert_relative_eq!(solution.x[1], 0.75, epsilon = 1e-6);
}
