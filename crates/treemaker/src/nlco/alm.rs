//! Augmented Lagrangian solver: a penalty/multiplier outer loop around a
//! damped-BFGS inner minimization with backtracking line search.
//!
//! The bounds are folded into the multiplier vector as two extra blocks of
//! inequality slacks, so `lag_mul` has length `ne + ni + 2n`.

use nalgebra::DMatrix;

use super::Nlco;
use crate::error::{Error, Result, TOO_MANY_ITERATIONS};

const WEIGHT_START: f64 = 10.0;
const WEIGHT_RATIO: f64 = 10.0;
const WEIGHT_MAX: f64 = 1.0e8;
const TOL_FEAS: f64 = 1.0e-5;
const TOL_F: f64 = 1.0e-5;
const ITER_OUTER_MAX: usize = 50;
const ITER_INNER_MAX: usize = 200;

// Armijo sufficient-decrease constant for the line search.
const ALF: f64 = 1.0e-4;

impl<'a> Nlco<'a> {
    /// Minimize the objective subject to the registered constraints and
    /// bounds, starting from `x` and leaving the best point found in `x`.
    pub fn minimize(&mut self, x: &mut Vec<f64>) -> Result<()> {
        debug_assert!(self.size != 0);
        debug_assert_eq!(x.len(), self.size);
        debug_assert!(self.objective.is_some());

        let ne = self.num_equalities();
        let ni = self.num_inequalities();
        let nb = self.bl.len();

        self.lag_mul = vec![0.0; ne + ni + 2 * nb];

        // Cap line-search steps at the space diagonal of the bounding box.
        let mut diag2 = 0.0;
        for i in 0..nb {
            diag2 += (self.bu[i] - self.bl[i]).powi(2);
        }
        self.max_step = diag2.sqrt();
        if self.max_step == 0.0 {
            self.max_step = 1.0;
        }

        self.weight = WEIGHT_START;
        let mut fval_old = 1.0e30;
        for _iter_outer in 1..ITER_OUTER_MAX {
            self.minimize_aug_lag(x);

            // Compute worst-case feasibility; update the multipliers in the
            // same pass to be parsimonious with function calls.
            let mut feas: f64 = 0.0;
            let mut ieq = 0;
            let mut iineq = 0;
            for ci in 0..self.constraints.len() {
                let f = self.constraints[ci].f.value(x);
                if self.constraints[ci].is_equality() {
                    feas = feas.max(f.abs());
                    self.lag_mul[ieq] += 2.0 * self.weight * f;
                    ieq += 1;
                } else {
                    if f > 0.0 {
                        feas = feas.max(f);
                    }
                    let lm = &mut self.lag_mul[ne + iineq];
                    let mu = -0.5 * *lm / self.weight;
                    if f < mu {
                        *lm = 0.0;
                    } else {
                        *lm += 2.0 * self.weight * f;
                    }
                    iineq += 1;
                }
            }
            for i in 0..nb {
                let f = self.bl[i] - x[i];
                if f > 0.0 {
                    feas = feas.max(f);
                }
                let lm = &mut self.lag_mul[ne + ni + i];
                let mu = -0.5 * *lm / self.weight;
                if f < mu {
                    *lm = 0.0;
                } else {
                    *lm += 2.0 * self.weight * f;
                }
            }
            for i in 0..nb {
                let f = x[i] - self.bu[i];
                if f > 0.0 {
                    feas = feas.max(f);
                }
                let lm = &mut self.lag_mul[ne + ni + nb + i];
                let mu = -0.5 * *lm / self.weight;
                if f < mu {
                    *lm = 0.0;
                } else {
                    *lm += 2.0 * self.weight * f;
                }
            }

            let fval = self.objective.as_ref().unwrap().value(x);

            // Feasible, and the objective has stopped moving between
            // feasible iterates: converged.
            if feas < TOL_FEAS {
                if (fval - fval_old).abs() < TOL_F {
                    return Ok(());
                }
                fval_old = fval;
            }

            self.weight = (self.weight * WEIGHT_RATIO).min(WEIGHT_MAX);

            if let Some(progress) = self.progress.as_mut() {
                progress()?;
            }
        }
        Err(Error::BadConvergence(TOO_MANY_ITERATIONS))
    }

    /// Unconstrained minimization of the augmented Lagrangian by damped BFGS.
    /// Runs until step or gradient tolerance, or the iteration cap; the
    /// outer loop re-enters from wherever this leaves `x`.
    fn minimize_aug_lag(&self, x: &mut [f64]) {
        let n = self.size;
        let eps = f64::EPSILON;
        let tol_x = 4.0 * eps;
        let tol_g = 1.0e-5;

        let mut f_min = self.aug_lag_value(x);
        let mut g = vec![0.0; n];
        self.aug_lag_gradient(x, &mut g);

        let mut hess_inv = DMatrix::<f64>::identity(n, n);
        let mut srch_dir: Vec<f64> = g.iter().map(|gi| -gi).collect();

        let mut x_new = vec![0.0; n];
        let mut dg = vec![0.0; n];
        let mut hdg = vec![0.0; n];
        for _iter in 1..=ITER_INNER_MAX {
            self.line_search(x, f_min, &g, &mut srch_dir, &mut x_new, &mut f_min);

            for i in 0..n {
                srch_dir[i] = x_new[i] - x[i];
                x[i] = x_new[i];
            }

            // Relative step-size convergence test.
            let mut xtest: f64 = 0.0;
            for i in 0..n {
                xtest = xtest.max(srch_dir[i].abs() / x[i].abs().max(1.0));
            }
            if xtest < tol_x {
                return;
            }

            dg.copy_from_slice(&g);
            self.aug_lag_gradient(x, &mut g);

            // Relative gradient convergence test.
            let den = f_min.max(1.0);
            let mut gtest: f64 = 0.0;
            for i in 0..n {
                gtest = gtest.max(g[i].abs() * x[i].abs().max(1.0) / den);
            }
            if gtest < tol_g {
                return;
            }

            for i in 0..n {
                dg[i] = g[i] - dg[i];
            }
            for i in 0..n {
                hdg[i] = 0.0;
                for j in 0..n {
                    hdg[i] += hess_inv[(i, j)] * dg[j];
                }
            }

            let mut fac = 0.0;
            let mut fae = 0.0;
            let mut sumdg = 0.0;
            let mut sumxi = 0.0;
            for i in 0..n {
                fac += dg[i] * srch_dir[i];
                fae += dg[i] * hdg[i];
                sumdg += dg[i] * dg[i];
                sumxi += srch_dir[i] * srch_dir[i];
            }

            // Damped update: skip unless the curvature term is safely
            // positive.
            if fac > (eps * sumdg * sumxi).sqrt() {
                let fac = 1.0 / fac;
                let fad = 1.0 / fae;
                for i in 0..n {
                    dg[i] = fac * srch_dir[i] - fad * hdg[i];
                }
                for i in 0..n {
                    for j in i..n {
                        let upd = fac * srch_dir[i] * srch_dir[j] - fad * hdg[i] * hdg[j]
                            + fae * dg[i] * dg[j];
                        hess_inv[(i, j)] += upd;
                        hess_inv[(j, i)] = hess_inv[(i, j)];
                    }
                }
            }

            for i in 0..n {
                srch_dir[i] = 0.0;
                for j in 0..n {
                    srch_dir[i] -= hess_inv[(i, j)] * g[j];
                }
            }
        }
        // Iteration budget exhausted; the outer loop will try again.
    }

    /// Backtracking line search along `srch_dir` from `x_old`, using a
    /// quadratic model on the first backtrack and a cubic model thereafter.
    fn line_search(
        &self,
        x_old: &[f64],
        f_old: f64,
        g_old: &[f64],
        srch_dir: &mut [f64],
        x_new: &mut [f64],
        f_new: &mut f64,
    ) {
        let n = self.size;
        let tol_x = f64::EPSILON;

        // Scale back an over-long Newton step.
        let mut dir_mag = 0.0;
        for d in srch_dir.iter() {
            dir_mag += d * d;
        }
        dir_mag = dir_mag.sqrt();
        if dir_mag > self.max_step {
            for d in srch_dir.iter_mut() {
                *d *= self.max_step / dir_mag;
            }
        }

        // If the direction points uphill, give up and let the outer loop
        // restart from a better point.
        let mut slope = 0.0;
        for i in 0..n {
            slope += g_old[i] * srch_dir[i];
        }
        if slope >= 0.0 {
            x_new.copy_from_slice(x_old);
            *f_new = f_old;
            return;
        }

        let mut lmtest: f64 = 0.0;
        for i in 0..n {
            lmtest = lmtest.max(srch_dir[i].abs() / x_old[i].abs().max(1.0));
        }
        let lm_min = tol_x / lmtest;

        // lm is the fraction of the full Newton step; always try the full
        // step first for quadratic convergence near the minimum.
        let mut lm: f64 = 1.0;
        let mut lm_2 = 0.0;
        let mut f_new_2 = 0.0;
        loop {
            for i in 0..n {
                x_new[i] = x_old[i] + lm * srch_dir[i];
            }
            *f_new = self.aug_lag_value(x_new);

            if lm < lm_min {
                x_new.copy_from_slice(x_old);
                return;
            }

            let f_tobeat = f_old + ALF * lm * slope;
            if *f_new <= f_tobeat {
                return;
            }

            let lm_tmp;
            if lm == 1.0 {
                lm_tmp = -slope / (2.0 * (*f_new - f_old - slope));
            } else {
                let rhs1 = *f_new - f_old - lm * slope;
                let rhs2 = f_new_2 - f_old - lm_2 * slope;
                let lmsqr = lm * lm;
                let lmsqr2 = lm_2 * lm_2;
                let lmd = lm - lm_2;
                let a = (rhs1 / lmsqr - rhs2 / lmsqr2) / lmd;
                let b = (-lm_2 * rhs1 / lmsqr + lm * rhs2 / lmsqr2) / lmd;
                let mut t;
                if a == 0.0 {
                    t = -slope / (2.0 * b);
                } else {
                    let discr = b * b - 3.0 * a * slope;
                    if discr < 0.0 {
                        t = 0.5 * lm;
                    } else if b <= 0.0 {
                        t = (-b + discr.sqrt()) / (3.0 * a);
                    } else {
                        t = -slope / (b + discr.sqrt());
                    }
                }
                if t > 0.5 * lm {
                    t = 0.5 * lm;
                }
                lm_tmp = t;
            }
            lm_2 = lm;
            f_new_2 = *f_new;
            lm = lm_tmp.max(0.1 * lm);
        }
    }

    /// Value of the augmented Lagrangian at `x`.
    fn aug_lag_value(&self, x: &[f64]) -> f64 {
        let ne = self.num_equalities();
        let ni = self.num_inequalities();
        let nb = self.bl.len();

        let mut fret = self.objective.as_ref().unwrap().value(x);

        let mut ieq = 0;
        let mut iineq = 0;
        for c in &self.constraints {
            let f = c.f.value(x);
            if c.is_equality() {
                let lm = self.lag_mul[ieq];
                fret += (lm + f * self.weight) * f;
                ieq += 1;
            } else {
                let lm = self.lag_mul[ne + iineq];
                let mu = -0.5 * lm / self.weight;
                fret += if f < mu { mu } else { (lm + f * self.weight) * f };
                iineq += 1;
            }
        }
        for i in 0..nb {
            let lm = self.lag_mul[ne + ni + i];
            let f = self.bl[i] - x[i];
            let mu = -0.5 * lm / self.weight;
            fret += if f < mu { mu } else { (lm + f * self.weight) * f };
        }
        for i in 0..nb {
            let lm = self.lag_mul[ne + ni + nb + i];
            let f = x[i] - self.bu[i];
            let mu = -0.5 * lm / self.weight;
            fret += if f < mu { mu } else { (lm + f * self.weight) * f };
        }
        fret
    }

    /// Gradient of the augmented Lagrangian at `x`.
    fn aug_lag_gradient(&self, x: &[f64], g: &mut [f64]) {
        let ne = self.num_equalities();
        let ni = self.num_inequalities();
        let nb = self.bl.len();
        let tol_lm = 4.0 * f64::EPSILON;

        let mut gscr = vec![0.0; self.size];
        self.objective.as_ref().unwrap().gradient(x, g);

        let mut ieq = 0;
        let mut iineq = 0;
        for c in &self.constraints {
            let f = c.f.value(x);
            if c.is_equality() {
                let lm = self.lag_mul[ieq];
                ieq += 1;
                let gmul = lm + 2.0 * f * self.weight;
                if gmul.abs() > tol_lm {
                    c.f.gradient(x, &mut gscr);
                    for j in 0..self.size {
                        g[j] += gmul * gscr[j];
                    }
                }
            } else {
                let lm = self.lag_mul[ne + iineq];
                iineq += 1;
                let mu = -0.5 * lm / self.weight;
                if f >= mu {
                    let gmul = lm + 2.0 * f * self.weight;
                    if gmul.abs() > tol_lm {
                        c.f.gradient(x, &mut gscr);
                        for j in 0..self.size {
                            g[j] += gmul * gscr[j];
                        }
                    }
                }
            }
        }
        for i in 0..nb {
            let lm = self.lag_mul[ne + ni + i];
            let f = self.bl[i] - x[i];
            let mu = -0.5 * lm / self.weight;
            if f >= mu {
                let gmul = lm + 2.0 * f * self.weight;
                if gmul.abs() > tol_lm {
                    g[i] -= gmul;
                }
            }
        }
        for i in 0..nb {
            let lm = self.lag_mul[ne + ni + nb + i];
            let f = x[i] - self.bu[i];
            let mu = -0.5 * lm / self.weight;
            if f >= mu {
                let gmul = lm + 2.0 * f * self.weight;
                if gmul.abs() > tol_lm {
                    g[i] += gmul;
                }
            }
        }
    }
}
