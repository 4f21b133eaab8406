//! End-to-end tests of the augmented Lagrangian solver on small benchmark
//! problems with known solutions.

use super::fns::TwoVarFn;
use super::{CallCounter, DifferentiableFn, Nlco};

/// `x0^2 + x1^2`.
struct Sphere {
    calls: CallCounter,
}

impl DifferentiableFn for Sphere {
    fn value(&self, x: &[f64]) -> f64 {
        self.calls.count_value();
        x[0] * x[0] + x[1] * x[1]
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        self.calls.count_grad();
        grad.fill(0.0);
        grad[0] = 2.0 * x[0];
        grad[1] = 2.0 * x[1];
    }

    fn call_counts(&self) -> (usize, usize) {
        self.calls.counts()
    }
}

#[test]
fn simple_minimization_with_one_equality() {
    // Minimize x0^2 + x1^2 subject to x0 - x1 = 1, x in [-1, 1]^2.
    let mut nlco = Nlco::new();
    nlco.set_size(2);
    nlco.set_bounds(vec![-1.0, -1.0], vec![1.0, 1.0]);
    nlco.set_objective(Box::new(Sphere {
        calls: CallCounter::new(),
    }));
    nlco.add_linear_equality(Box::new(TwoVarFn::new(0, 1.0, 1, -1.0, -1.0)));

    let mut x = vec![2.3, 4.7];
    nlco.minimize(&mut x).unwrap();
    assert!((x[0] - 0.5).abs() < 1e-4, "x0 = {}", x[0]);
    assert!((x[1] + 0.5).abs() < 1e-4, "x1 = {}", x[1]);
}

/// Hock/Schittkowski problem 32 (the first sample problem shipped with
/// CFSQP): minimize `(x0 + 3 x1 + x2)^2 + 4 (x0 - x1)^2`.
struct Hs32Objective;

impl DifferentiableFn for Hs32Objective {
    fn value(&self, x: &[f64]) -> f64 {
        (x[0] + 3.0 * x[1] + x[2]).powi(2) + 4.0 * (x[0] - x[1]).powi(2)
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        let fa = 2.0 * (x[0] + 3.0 * x[1] + x[2]);
        let fb = 8.0 * (x[0] - x[1]);
        grad[0] = fa + fb;
        grad[1] = fa * 3.0 - fb;
        grad[2] = fa;
    }
}

/// `x0^3 - 6 x1 - 4 x2 + 3 <= 0`.
struct Hs32Inequality;

impl DifferentiableFn for Hs32Inequality {
    fn value(&self, x: &[f64]) -> f64 {
        x[0].powi(3) - 6.0 * x[1] - 4.0 * x[2] + 3.0
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        grad[0] = 3.0 * x[0] * x[0];
        grad[1] = -6.0;
        grad[2] = -4.0;
    }
}

/// `1 - x0 - x1 - x2 = 0`.
struct Hs32Equality;

impl DifferentiableFn for Hs32Equality {
    fn value(&self, x: &[f64]) -> f64 {
        1.0 - x[0] - x[1] - x[2]
    }

    fn gradient(&self, _x: &[f64], grad: &mut [f64]) {
        grad[0] = -1.0;
        grad[1] = -1.0;
        grad[2] = -1.0;
    }
}

#[test]
fn hock_schittkowski_32() {
    let mut nlco = Nlco::new();
    nlco.set_size(3);
    nlco.set_bounds(vec![0.0; 3], vec![1.0e10; 3]);
    nlco.set_objective(Box::new(Hs32Objective));
    nlco.add_nonlinear_inequality(Box::new(Hs32Inequality));
    nlco.add_linear_equality(Box::new(Hs32Equality));

    let mut x = vec![0.1, 0.7, 0.2];
    nlco.minimize(&mut x).unwrap();

    let objective = Hs32Objective.value(&x);
    assert!((objective - 1.0).abs() < 1.0e-4, "objective = {objective}");
    assert!(Hs32Equality.value(&x).abs() < 1.0e-5);
    assert!(Hs32Inequality.value(&x) < 1.0e-5);
}

/// `-x0`, the radius objective of the circle packing problem.
struct NegFirstVar;

impl DifferentiableFn for NegFirstVar {
    fn value(&self, x: &[f64]) -> f64 {
        -x[0]
    }

    fn gradient(&self, _x: &[f64], grad: &mut [f64]) {
        grad.fill(0.0);
        grad[0] = -1.0;
    }
}

/// `2 r - |c_i - c_j| <= 0` for the circle pair `(i, j)`.
struct CirclePair {
    ix: usize,
    iy: usize,
    jx: usize,
    jy: usize,
}

impl CirclePair {
    fn new(i: usize, j: usize) -> Self {
        Self {
            ix: 2 * i + 1,
            iy: 2 * i + 2,
            jx: 2 * j + 1,
            jy: 2 * j + 2,
        }
    }
}

impl DifferentiableFn for CirclePair {
    fn value(&self, x: &[f64]) -> f64 {
        let d = ((x[self.ix] - x[self.jx]).powi(2) + (x[self.iy] - x[self.jy]).powi(2)).sqrt();
        2.0 * x[0] - d
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        grad.fill(0.0);
        grad[0] = 2.0;
        let d = ((x[self.ix] - x[self.jx]).powi(2) + (x[self.iy] - x[self.jy]).powi(2)).sqrt();
        grad[self.ix] = (x[self.jx] - x[self.ix]) / d;
        grad[self.jx] = -grad[self.ix];
        grad[self.iy] = (x[self.jy] - x[self.iy]) / d;
        grad[self.jy] = -grad[self.iy];
    }
}

#[test]
fn circle_packing_ten_circles() {
    // Pack 10 circles with centers in the unit square; circle packing is the
    // degenerate case of the origami placement problem, so it exercises the
    // solver on exactly the constraint structure the tree produces.
    let num_circles = 10;
    let nn = 2 * num_circles + 1;

    let mut nlco = Nlco::new();
    nlco.set_size(nn);
    let mut bl = vec![0.0; nn];
    bl[0] = 0.001;
    nlco.set_bounds(bl, vec![1.0; nn]);
    nlco.set_objective(Box::new(NegFirstVar));

    for i in 0..num_circles {
        for j in (i + 1)..num_circles {
            nlco.add_nonlinear_inequality(Box::new(CirclePair::new(i, j)));
        }
    }

    // Deterministic scattered start, partly outside the square.
    let mut x = vec![0.0; nn];
    for (i, xi) in x.iter_mut().enumerate().skip(1) {
        *xi = (i as f64 * 1.0e9f64.sqrt()) % 1.5 - 0.25;
    }

    nlco.minimize(&mut x).unwrap();

    assert!(x[0] >= 0.148, "radius = {}", x[0]);
    for i in 0..num_circles {
        for j in (i + 1)..num_circles {
            assert!(CirclePair::new(i, j).value(&x) < 1.0e-4);
        }
    }
}

#[test]
fn progress_callback_can_cancel() {
    use crate::error::Error;

    let mut nlco = Nlco::new();
    nlco.set_size(2);
    nlco.set_bounds(vec![-1.0, -1.0], vec![1.0, 1.0]);
    nlco.set_objective(Box::new(Sphere {
        calls: CallCounter::new(),
    }));
    nlco.add_linear_equality(Box::new(TwoVarFn::new(0, 1.0, 1, -1.0, -1.0)));
    nlco.set_progress(Box::new(|| Err(Error::Cancelled)));

    let mut x = vec![2.3, 4.7];
    match nlco.minimize(&mut x) {
        Err(Error::Cancelled) => {}
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[cfg(feature = "profile")]
#[test]
fn profile_feature_counts_calls() {
    let mut nlco = Nlco::new();
    nlco.set_size(2);
    nlco.set_bounds(vec![-1.0, -1.0], vec![1.0, 1.0]);
    nlco.set_objective(Box::new(Sphere {
        calls: CallCounter::new(),
    }));
    nlco.add_linear_equality(Box::new(TwoVarFn::new(0, 1.0, 1, -1.0, -1.0)));
    let mut x = vec![2.3, 4.7];
    nlco.minimize(&mut x).unwrap();
    let (fv, _fg) = nlco.objective_call_counts();
    let (cv, cg) = nlco.constraint_call_counts();
    assert!(fv > 0);
    assert!(cv > 0);
    assert!(cg > 0);
}
