use nalgebra::{DMatrix, DVector};

use super::expr::{Atom, Expr, Node};

/// Value and derivatives of an expression with respect to the free entries.
pub(super) struct Evaluation {
    pub(super) value: DVector<f64>,
    /// `len × free` Jacobian.
    pub(super) jacobian: DMatrix<f64>,
    /// One `free × free` Hessian per entry; `None` when all are zero.
    pub(super) hessians: Option<Vec<DMatrix<f64>>>,
}

/// Inputs shared by every node of one evaluation.
pub(super) struct Point<'a> {
    /// Full decision vector, fixed entries included.
    pub(super) x: &'a DVector<f64>,
    /// Maps free entries into the full vector (`len × free`).
    pub(super) selection: &'a DMatrix<f64>,
    pub(super) parameters: &'a [DVector<f64>],
    /// Width of the smooth approximation of nonsmooth atoms; zero is exact.
    pub(super) smoothing: f64,
    pub(super) second_order: bool,
}

impl Point<'_> {
    fn free(&self) -> usize {
        self.selection.ncols()
    }

    pub(super) fn evaluate(&self, expr: &Expr) -> Evaluation {
        match expr.node.as_ref() {
            Node::Variable => Evaluation {
                value: self.x.clone(),
                jacobian: self.selection.clone(),
                hessians: None,
            },
            Node::Parameter(id) => self.constant(self.parameters[id.0].clone()),
            Node::Constant(values) => self.constant(values.clone()),
            Node::Invalid(_) => self.constant(DVector::zeros(0)),
            Node::Add(a, b) => {
                let len = expr.len();
                let a = self.evaluate(a).broadcast(len);
                let b = self.evaluate(b).broadcast(len);
                Evaluation {
                    value: a.value + b.value,
                    jacobian: a.jacobian + b.jacobian,
                    hessians: add_hessians(a.hessians, b.hessians),
                }
            }
            Node::Neg(a) => {
                let a = self.evaluate(a);
                Evaluation {
                    value: -a.value,
                    jacobian: -a.jacobian,
                    hessians: a
                        .hessians
                        .map(|hs| hs.into_iter().map(|h| -h).collect()),
                }
            }
            Node::Mul(a, b) => {
                let len = expr.len();
                let a = self.evaluate(a).broadcast(len);
                let b = self.evaluate(b).broadcast(len);
                self.product(&a, &b)
            }
            Node::Index(a, indices) => {
                let a = self.evaluate(a);
                let free = self.free();
                Evaluation {
                    value: DVector::from_iterator(indices.len(), indices.iter().map(|&i| a.value[i])),
                    jacobian: DMatrix::from_fn(indices.len(), free, |r, c| {
                        a.jacobian[(indices[r], c)]
                    }),
                    hessians: a
                        .hessians
                        .map(|hs| indices.iter().map(|&i| hs[i].clone()).collect()),
                }
            }
            Node::Sum(a) => {
                let a = self.evaluate(a);
                Evaluation {
                    value: DVector::from_element(1, a.value.sum()),
                    jacobian: DMatrix::from_fn(1, self.free(), |_, c| a.jacobian.column(c).sum()),
                    hessians: a.hessians.map(|hs| {
                        let free = self.free();
                        vec![hs.into_iter().fold(DMatrix::zeros(free, free), |acc, h| acc + h)]
                    }),
                }
            }
            Node::Elementwise(atom, a) => {
                let a = self.evaluate(a);
                self.elementwise(*atom, &a)
            }
            Node::Norm2(a) => {
                let a = self.evaluate(a);
                self.norm2(&a)
            }
            Node::Max(a) => {
                let a = self.evaluate(a);
                self.max(&a)
            }
        }
    }

    fn constant(&self, value: DVector<f64>) -> Evaluation {
        Evaluation {
            jacobian: DMatrix::zeros(value.len(), self.free()),
            value,
            hessians: None,
        }
    }

    fn product(&self, a: &Evaluation, b: &Evaluation) -> Evaluation {
        let len = a.value.len();
        let free = self.free();
        let value = a.value.component_mul(&b.value);
        let jacobian = DMatrix::from_fn(len, free, |r, c| {
            b.value[r] * a.jacobian[(r, c)] + a.value[r] * b.jacobian[(r, c)]
        });

        let a_constant = a.jacobian.iter().all(|v| *v == 0.0) && a.hessians.is_none();
        let b_constant = b.jacobian.iter().all(|v| *v == 0.0) && b.hessians.is_none();
        let hessians = if !self.second_order || (a_constant && b.hessians.is_none())
            || (b_constant && a.hessians.is_none())
        {
            None
        } else {
            Some(
                (0..len)
                    .map(|i| {
                        let ja = a.jacobian.row(i);
                        let jb = b.jacobian.row(i);
                        let outer = ja.transpose() * jb;
                        let mut h = &outer + outer.transpose();
                        if let Some(hs) = &a.hessians {
                            h += &hs[i] * b.value[i];
                        }
                        if let Some(hs) = &b.hessians {
                            h += &hs[i] * a.value[i];
                        }
                        h
                    })
                    .collect(),
            )
        };

        Evaluation {
            value,
            jacobian,
            hessians,
        }
    }

    /// Applies `φ` with first and second derivatives to each entry.
    fn chain(&self, a: &Evaluation, phi: impl Fn(f64) -> (f64, f64, f64)) -> Evaluation {
        let len = a.value.len();
        let mut value = DVector::zeros(len);
        let mut jacobian = a.jacobian.clone();
        let mut hessians = self.second_order.then(|| Vec::with_capacity(len));

        for i in 0..len {
            let (f, df, d2f) = phi(a.value[i]);
            value[i] = f;
            jacobian.row_mut(i).scale_mut(df);

            if let Some(hs) = hessians.as_mut() {
                let row = a.jacobian.row(i);
                let mut h = row.transpose() * row * d2f;
                if let Some(inner) = &a.hessians {
                    h += &inner[i] * df;
                }
                hs.push(h);
            }
        }

        Evaluation {
            value,
            jacobian,
            hessians,
        }
    }

    fn elementwise(&self, atom: Atom, a: &Evaluation) -> Evaluation {
        let mu = self.smoothing;
        match atom {
            Atom::Square => self.chain(a, |x| (x * x, 2.0 * x, 2.0)),
            Atom::Abs if mu > 0.0 => self.chain(a, |x| {
                let s = x.hypot(mu);
                (s - mu, x / s, mu * mu / (s * s * s))
            }),
            Atom::Abs => self.chain(a, |x| (x.abs(), sign(x), 0.0)),
            Atom::Pos if mu > 0.0 => self.chain(a, |x| {
                let s = x.hypot(mu);
                (
                    0.5 * (x + s - mu),
                    0.5 * (1.0 + x / s),
                    0.5 * mu * mu / (s * s * s),
                )
            }),
            Atom::Pos => self.chain(a, |x| {
                if x > 0.0 { (x, 1.0, 0.0) } else { (0.0, 0.0, 0.0) }
            }),
        }
    }

    /// Reduces a vector to a scalar through `φ(v)` with gradient `w` and
    /// Hessian `local` taken with respect to `v`.
    fn reduce(
        &self,
        a: &Evaluation,
        value: f64,
        w: &DVector<f64>,
        local: Option<DMatrix<f64>>,
    ) -> Evaluation {
        let gradient = a.jacobian.tr_mul(w);
        let hessians = self.second_order.then(|| {
            let free = self.free();
            let mut h = match &local {
                Some(local) => a.jacobian.tr_mul(&(local * &a.jacobian)),
                None => DMatrix::zeros(free, free),
            };
            if let Some(inner) = &a.hessians {
                for (i, hi) in inner.iter().enumerate() {
                    h += hi * w[i];
                }
            }
            vec![h]
        });

        Evaluation {
            value: DVector::from_element(1, value),
            jacobian: DMatrix::from_row_slice(1, gradient.len(), gradient.as_slice()),
            hessians,
        }
    }

    fn norm2(&self, a: &Evaluation) -> Evaluation {
        let mu = self.smoothing;
        let v = &a.value;
        let s = (v.norm_squared() + mu * mu).sqrt();
        if s == 0.0 {
            return self.reduce(a, 0.0, &DVector::zeros(v.len()), None);
        }

        let w = v / s;
        let local = (DMatrix::identity(v.len(), v.len()) - &w * w.transpose()) / s;
        self.reduce(a, s - mu, &w, Some(local))
    }

    fn max(&self, a: &Evaluation) -> Evaluation {
        let mu = self.smoothing;
        let v = &a.value;
        let len = v.len();
        let peak = v.max();

        if mu > 0.0 {
            let exp = v.map(|x| ((x - peak) / mu).exp());
            let total = exp.sum();
            let w = exp / total;
            let local = (DMatrix::from_diagonal(&w) - &w * w.transpose()) / mu;
            self.reduce(a, peak + mu * total.ln(), &w, Some(local))
        } else {
            let argmax = v.iter().position(|x| *x == peak).unwrap_or(0);
            let mut w = DVector::zeros(len);
            if len > 0 {
                w[argmax] = 1.0;
            }
            self.reduce(a, peak, &w, None)
        }
    }
}

impl Evaluation {
    /// Repeats a scalar evaluation to `len` entries.
    fn broadcast(self, len: usize) -> Self {
        if self.value.len() == len {
            return self;
        }
        let free = self.jacobian.ncols();
        Self {
            value: DVector::from_element(len, self.value[0]),
            jacobian: DMatrix::from_fn(len, free, |_, c| self.jacobian[(0, c)]),
            hessians: self.hessians.map(|hs| vec![hs[0].clone(); len]),
        }
    }
}

fn add_hessians(
    a: Option<Vec<DMatrix<f64>>>,
    b: Option<Vec<DMatrix<f64>>>,
) -> Option<Vec<DMatrix<f64>>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.into_iter().zip(b).map(|(a, b)| a + b).collect()),
        (Some(h), None) | (None, Some(h)) => Some(h),
        (None, None) => None,
    }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    // --- Test fixtures ---

    struct Fixture {
        x: DVector<f64>,
        selection: DMatrix<f64>,
        parameters: Vec<DVector<f64>>,
    }

    impl Fixture {
        fn new(x: &[f64]) -> Self {
            Self {
                x: DVector::from_column_slice(x),
                selection: DMatrix::identity(x.len(), x.len()),
                parameters: Vec::new(),
            }
        }

        fn at(&self, smoothing: f64) -> Point<'_> {
            Point {
                x: &self.x,
                selection: &self.selection,
                parameters: &self.parameters,
                smoothing,
                second_order: true,
            }
        }
    }

    /// Central-difference gradient of a scalar expression.
    fn numeric_gradient(fixture: &Fixture, expr: &Expr, smoothing: f64) -> Vec<f64> {
        let h = 1e-6;
        (0..fixture.x.len())
            .map(|i| {
                let mut plus = Fixture::new(fixture.x.as_slice());
                plus.x[i] += h;
                let mut minus = Fixture::new(fixture.x.as_slice());
                minus.x[i] -= h;
                let f_plus = plus.at(smoothing).evaluate(expr).value[0];
                let f_minus = minus.at(smoothing).evaluate(expr).value[0];
                (f_plus - f_minus) / (2.0 * h)
            })
            .collect()
    }

    // --- Tests ---

    #[test]
    fn sum_squares_has_exact_derivatives() {
        let fixture = Fixture::new(&[1.0, -2.0]);
        let y = Expr::variable(2);
        let cost = (&y - Expr::constant(vec![0.5, 0.5])).sum_squares();

        let eval = fixture.at(0.0).evaluate(&cost);
        assert_relative_eq!(eval.value[0], 0.25 + 6.25);
        assert_relative_eq!(eval.jacobian[(0, 0)], 1.0);
        assert_relative_eq!(eval.jacobian[(0, 1)], -5.0);

        let hessian = &eval.hessians.unwrap()[0];
        assert_relative_eq!(*hessian, DMatrix::identity(2, 2) * 2.0);
    }

    #[test]
    fn smoothed_atoms_match_finite_differences() {
        let fixture = Fixture::new(&[0.3, -0.7, 1.2]);
        let y = Expr::variable(3);
        let costs = [
            (&y - 0.1).norm1(),
            (2.0 * &y).pos().sum(),
            y.norm2(),
            y.max(),
            (y.abs() + y.square()).sum(),
        ];

        for cost in &costs {
            let eval = fixture.at(0.05).evaluate(cost);
            let numeric = numeric_gradient(&fixture, cost, 0.05);
            for (analytic, numeric) in eval.jacobian.iter().zip(&numeric) {
                assert_relative_eq!(*analytic, *numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn zero_smoothing_is_exact() {
        let fixture = Fixture::new(&[0.3, -0.7, 1.2]);
        let y = Expr::variable(3);

        assert_relative_eq!(fixture.at(0.0).evaluate(&y.norm1()).value[0], 2.2);
        assert_relative_eq!(fixture.at(0.0).evaluate(&y.max()).value[0], 1.2);
        assert_relative_eq!(fixture.at(0.0).evaluate(&y.pos().sum()).value[0], 1.5);
        assert_relative_eq!(
            fixture.at(0.0).evaluate(&y.norm2()).value[0],
            (0.09_f64 + 0.49 + 1.44).sqrt()
        );
    }

    #[test]
    fn fixed_entries_have_no_derivative() {
        let mut fixture = Fixture::new(&[1.0, 2.0, 3.0]);
        // Only the middle entry is free.
        fixture.selection = DMatrix::from_column_slice(3, 1, &[0.0, 1.0, 0.0]);

        let cost = Expr::variable(3).sum_squares();
        let eval = fixture.at(0.0).evaluate(&cost);
        assert_eq!(eval.jacobian.shape(), (1, 1));
        assert_relative_eq!(eval.jacobian[(0, 0)], 4.0);
        assert_relative_eq!(eval.value[0], 14.0);
    }
}
