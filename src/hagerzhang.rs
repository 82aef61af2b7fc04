//! Hager-Zhang bracketing line search.
//!
//! The method of Hager & Zhang ("Algorithm 851: CG_DESCENT", ACM TOMS 2006)
//! maintains a bracket `[a, b]` with a descending, safe lower endpoint and an
//! upper endpoint that either slopes upward or sits above a reference level
//! `phi_lim = phi(0) + epsilon * |phi(0)|`. The bracket is refined by a
//! double-secant step with bisection as a fallback, and a step is accepted
//! when it satisfies either the classical Wolfe conditions or the
//! approximate-Wolfe test. The approximate test exists because near a minimum
//! `phi(c) - phi(0)` is dominated by roundoff; comparing slopes instead keeps
//! the search from stalling there.

use log::{trace, warn};

use crate::{iterfinitemax, AcceptKind, LineObjective, LineSearch, LineSearchError, Real, Step};

/// Hager-Zhang line search.
///
/// Accepts a step satisfying the Wolfe conditions
/// (`delta * phi'(0) >= (phi(c) - phi(0)) / c` and `phi'(c) >= sigma * phi'(0)`)
/// or the approximate-Wolfe test
/// (`(2 delta - 1) * phi'(0) >= phi'(c) >= sigma * phi'(0)` with
/// `phi(c) <= phi_lim`).
#[derive(Debug, Clone)]
pub struct HagerZhang<T> {
    /// Sufficient-decrease parameter (`0 < delta < 0.5`).
    pub delta: T,
    /// Curvature parameter (`delta <= sigma < 1`).
    pub sigma: T,
    /// Largest admissible step length.
    pub alphamax: T,
    /// Bracket expansion factor.
    pub rho: T,
    /// Tolerance defining the reference level `phi_lim`.
    pub epsilon: T,
    /// Required relative width reduction per refinement step before the
    /// search falls back to bisection.
    pub gamma: T,
    /// Shrink factor for the finite-value rescue.
    pub psi3: T,
    /// Iteration budget shared by bracketing and refinement.
    pub max_iterations: usize,
}

impl<T: Real> Default for HagerZhang<T> {
    fn default() -> Self {
        Self {
            delta: T::from_f64(0.1),
            sigma: T::from_f64(0.9),
            alphamax: T::infinity(),
            rho: T::from_f64(5.0),
            epsilon: T::from_f64(1e-6),
            gamma: T::from_f64(0.66),
            psi3: T::from_f64(0.1),
            max_iterations: 50,
        }
    }
}

impl<T: Real> HagerZhang<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sufficient-decrease parameter `delta` (default: 0.1).
    pub fn with_delta(mut self, delta: T) -> Self {
        self.delta = delta;
        self
    }

    /// Sets the curvature parameter `sigma` (default: 0.9).
    pub fn with_sigma(mut self, sigma: T) -> Self {
        self.sigma = sigma;
        self
    }

    /// Caps the step length at `alphamax` (default: unbounded).
    pub fn with_alphamax(mut self, alphamax: T) -> Self {
        self.alphamax = alphamax;
        self
    }

    /// Sets the tolerance for the approximate-Wolfe reference level
    /// (default: 1e-6).
    pub fn with_epsilon(mut self, epsilon: T) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the iteration budget (default: 50).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// One probed step together with its value and slope. Index 0 of the history
/// always holds `(0, phi(0), phi'(0))`.
#[derive(Debug, Clone, Copy)]
struct Probe<T> {
    alpha: T,
    value: T,
    slope: T,
}

/// Outcome of one secant^2 pass over the bracket.
enum Refinement<T> {
    Accepted(Step<T>),
    Bracket(usize, usize),
}

/// Root of the linear interpolant of the slope through two endpoints.
#[inline]
fn secant<T: Real>(a: T, b: T, dphi_a: T, dphi_b: T) -> T {
    (a * dphi_b - b * dphi_a) / (dphi_b - dphi_a)
}

impl<T: Real> LineSearch<T> for HagerZhang<T> {
    fn search<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        alpha0: T,
        phi0: T,
        dphi0: T,
        mut mayterminate: bool,
    ) -> Result<Step<T>, LineSearchError<T>> {
        let zero = T::zero();
        let two = T::from_f64(2.0);

        if !(phi0.is_finite() && dphi0.is_finite()) {
            return Err(LineSearchError::NonFiniteInitial { phi0, dphi0 });
        }
        if dphi0 >= zero {
            return Err(LineSearchError::NotDescent {
                dphi_a: dphi0,
                dphi_b: dphi0,
            });
        }
        if !(alpha0.is_finite() && alpha0 > zero) {
            warn!(
                "[HZ] initial step length {} is not positive and finite, using step length 0",
                alpha0
            );
            return Ok(Step {
                alpha: zero,
                value: phi0,
                accept: AcceptKind::Rescue,
            });
        }

        let mut alphamax = self.alphamax;
        let phi_lim = phi0 + self.epsilon * phi0.abs();
        let ifmax = iterfinitemax::<T>();
        let mut probes: Vec<Probe<T>> = Vec::with_capacity(self.max_iterations + ifmax + 5);
        probes.push(Probe {
            alpha: zero,
            value: phi0,
            slope: dphi0,
        });

        let mut c = if alpha0 > alphamax { alphamax } else { alpha0 };
        let (mut phi_c, mut dphi_c) = obj.value_and_slope(c);
        let mut iterfinite = 1;
        while !(phi_c.is_finite() && dphi_c.is_finite()) && iterfinite < ifmax {
            // a quadratic-fit guess computed from a non-finite probe cannot
            // be trusted for early termination
            mayterminate = false;
            iterfinite += 1;
            c = self.psi3 * c;
            (phi_c, dphi_c) = obj.value_and_slope(c);
        }
        if !(phi_c.is_finite() && dphi_c.is_finite()) {
            warn!("[HZ] failed to reach a finite evaluation point, using step length 0");
            return Ok(Step {
                alpha: zero,
                value: phi0,
                accept: AcceptKind::Rescue,
            });
        }
        probes.push(Probe {
            alpha: c,
            value: phi_c,
            slope: dphi_c,
        });

        // A quadratic-fit initial guess may short-circuit bracketing entirely.
        if mayterminate {
            if let Some(kind) = self.satisfies_wolfe(c, phi_c, dphi_c, phi0, dphi0, phi_lim) {
                trace!("[HZ] initial guess {} accepted ({:?})", c, kind);
                return Ok(Step {
                    alpha: c,
                    value: phi_c,
                    accept: kind,
                });
            }
        }

        // Bracketing (HZ stages B0-B3).
        let mut ia = 0;
        let mut ib = 1;
        let mut isbracketed = false;
        let mut iter = 1;
        while !isbracketed && iter < self.max_iterations {
            trace!("[HZ bracket] c = {}, phi_c = {}, dphi_c = {}", c, phi_c, dphi_c);
            if dphi_c >= zero {
                // B1: reached the upward slope, so we have b; examine earlier
                // probes for the largest safe a.
                ib = probes.len() - 1;
                ia = 0;
                for i in (0..ib).rev() {
                    if probes[i].value <= phi_lim {
                        ia = i;
                        break;
                    }
                }
                isbracketed = true;
            } else if probes[probes.len() - 1].value > phi_lim {
                // B2: still sloping down but the value crested over the
                // reference level, so a minimum lies behind us.
                ib = probes.len() - 1;
                ia = ib - 1;
                let (na, nb) = self.bisect(obj, &mut probes, ia, ib, phi_lim);
                ia = na;
                ib = nb;
                isbracketed = true;
            } else {
                // B3: still going downhill, expand the interval.
                let cold = c;
                c = self.rho * c;
                if c > alphamax {
                    c = (alphamax + cold) / two;
                    trace!("[HZ bracket] clipped toward alphamax: c = {}", c);
                    if c == cold || c.next_above() >= alphamax {
                        // step-length resolution is exhausted at the boundary
                        return Ok(Step {
                            alpha: cold,
                            value: probes[probes.len() - 1].value,
                            accept: AcceptKind::Boundary,
                        });
                    }
                }
                (phi_c, dphi_c) = obj.value_and_slope(c);
                let mut inner = 1;
                while !(phi_c.is_finite() && dphi_c.is_finite())
                    && c > cold.next_above()
                    && inner < ifmax
                {
                    // the expansion left the domain; the feasible region ends
                    // below c
                    alphamax = c;
                    inner += 1;
                    c = (cold + c) / two;
                    (phi_c, dphi_c) = obj.value_and_slope(c);
                }
                if !(phi_c.is_finite() && dphi_c.is_finite()) {
                    warn!(
                        "[HZ bracket] failed to expand to a finite value, returning {}",
                        cold
                    );
                    return Ok(Step {
                        alpha: cold,
                        value: probes[probes.len() - 1].value,
                        accept: AcceptKind::Rescue,
                    });
                }
                if dphi_c < zero && c == alphamax {
                    // The feasible region ends here and the slope still points
                    // outward; the constraint dominates.
                    trace!("[HZ bracket] accepting boundary step {}", c);
                    return Ok(Step {
                        alpha: c,
                        value: phi_c,
                        accept: AcceptKind::Boundary,
                    });
                }
                probes.push(Probe {
                    alpha: c,
                    value: phi_c,
                    slope: dphi_c,
                });
            }
            iter += 1;
        }

        // Refinement: secant^2 with bisection fallback.
        while iter < self.max_iterations {
            let a = probes[ia].alpha;
            let b = probes[ib].alpha;
            debug_assert!(b > a);
            if b - a <= T::epsilon() * b {
                // the bracket has collapsed to floating-point resolution
                return Ok(Step {
                    alpha: a,
                    value: probes[ia].value,
                    accept: AcceptKind::Flat,
                });
            }
            trace!("[HZ] refining bracket [{}, {}]", a, b);
            match self.secant2(obj, &mut probes, ia, ib, phi_lim, phi0, dphi0)? {
                Refinement::Accepted(step) => return Ok(step),
                Refinement::Bracket(i_a, i_b) => {
                    let new_a = probes[i_a].alpha;
                    let new_b = probes[i_b].alpha;
                    debug_assert!(new_b > new_a);
                    if new_b - new_a < self.gamma * (b - a) {
                        // secant^2 made good progress; also quit early when
                        // the values are flat to within one ULP on both the
                        // old and the new bracket
                        if probes[ia].value.next_above() >= probes[ib].value
                            && probes[i_a].value.next_above() >= probes[i_b].value
                        {
                            trace!("[HZ] bracket is flat to working precision, returning {}", new_a);
                            return Ok(Step {
                                alpha: new_a,
                                value: probes[i_a].value,
                                accept: AcceptKind::Flat,
                            });
                        }
                        ia = i_a;
                        ib = i_b;
                    } else {
                        // secant^2 is converging too slowly, bisect instead
                        trace!("[HZ] secant made insufficient progress, bisecting");
                        let mid = (new_a + new_b) / two;
                        let (phi_mid, dphi_mid) = obj.value_and_slope(mid);
                        debug_assert!(phi_mid.is_finite() && dphi_mid.is_finite());
                        probes.push(Probe {
                            alpha: mid,
                            value: phi_mid,
                            slope: dphi_mid,
                        });
                        let ic = probes.len() - 1;
                        let (na, nb) = self.update(obj, &mut probes, i_a, i_b, ic, phi_lim);
                        ia = na;
                        ib = nb;
                    }
                }
            }
            iter += 1;
        }

        Err(LineSearchError::MaxIterations {
            alpha: probes[ia].alpha,
            iterations: self.max_iterations,
        })
    }
}

impl<T: Real> HagerZhang<T> {
    /// Checks the Wolfe / approximate-Wolfe disjunction at a trial step.
    fn satisfies_wolfe(
        &self,
        c: T,
        phi_c: T,
        dphi_c: T,
        phi0: T,
        dphi0: T,
        phi_lim: T,
    ) -> Option<AcceptKind> {
        let one = T::one();
        let two = T::from_f64(2.0);
        if self.delta * dphi0 >= (phi_c - phi0) / c && dphi_c >= self.sigma * dphi0 {
            return Some(AcceptKind::Wolfe);
        }
        if (two * self.delta - one) * dphi0 >= dphi_c
            && dphi_c >= self.sigma * dphi0
            && phi_c <= phi_lim
        {
            return Some(AcceptKind::ApproxWolfe);
        }
        None
    }

    /// HZ stages S1-S4: secant step, update, and (when exactly one endpoint
    /// moved) a second secant aimed at the stale endpoint.
    fn secant2<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        probes: &mut Vec<Probe<T>>,
        ia: usize,
        ib: usize,
        phi_lim: T,
        phi0: T,
        dphi0: T,
    ) -> Result<Refinement<T>, LineSearchError<T>> {
        let zero = T::zero();
        let a = probes[ia].alpha;
        let b = probes[ib].alpha;
        let dphi_a = probes[ia].slope;
        let dphi_b = probes[ib].slope;
        if !(dphi_a < zero && dphi_b >= zero) {
            return Err(LineSearchError::NotDescent { dphi_a, dphi_b });
        }
        let mut c = secant(a, b, dphi_a, dphi_b);
        trace!("[HZ secant2] a = {}, b = {}, c = {}", a, b, c);
        debug_assert!(c.is_finite());
        let (phi_c, dphi_c) = obj.value_and_slope(c);
        debug_assert!(phi_c.is_finite() && dphi_c.is_finite());
        probes.push(Probe {
            alpha: c,
            value: phi_c,
            slope: dphi_c,
        });
        let mut ic = probes.len() - 1;
        if let Some(kind) = self.satisfies_wolfe(c, phi_c, dphi_c, phi0, dphi0, phi_lim) {
            return Ok(Refinement::Accepted(Step {
                alpha: c,
                value: phi_c,
                accept: kind,
            }));
        }
        let (mut i_a, mut i_b) = self.update(obj, probes, ia, ib, ic, phi_lim);
        let a2 = probes[i_a].alpha;
        let b2 = probes[i_b].alpha;
        if i_b == ic {
            // the upper endpoint moved; aim a second secant at the stale pair
            c = secant(probes[ib].alpha, probes[i_b].alpha, probes[ib].slope, probes[i_b].slope);
        } else if i_a == ic {
            // the lower endpoint moved; same on the other side
            c = secant(probes[ia].alpha, probes[i_a].alpha, probes[ia].slope, probes[i_a].slope);
        }
        if (i_a == ic || i_b == ic) && a2 <= c && c <= b2 {
            trace!("[HZ secant2] second secant c = {}", c);
            let (phi_c, dphi_c) = obj.value_and_slope(c);
            debug_assert!(phi_c.is_finite() && dphi_c.is_finite());
            probes.push(Probe {
                alpha: c,
                value: phi_c,
                slope: dphi_c,
            });
            ic = probes.len() - 1;
            if let Some(kind) = self.satisfies_wolfe(c, phi_c, dphi_c, phi0, dphi0, phi_lim) {
                return Ok(Refinement::Accepted(Step {
                    alpha: c,
                    value: phi_c,
                    accept: kind,
                }));
            }
            let (na, nb) = self.update(obj, probes, i_a, i_b, ic, phi_lim);
            i_a = na;
            i_b = nb;
        }
        Ok(Refinement::Bracket(i_a, i_b))
    }

    /// HZ stages U0-U3: fold the candidate probe `ic` into the bracket.
    fn update<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        probes: &mut Vec<Probe<T>>,
        ia: usize,
        ib: usize,
        ic: usize,
        phi_lim: T,
    ) -> (usize, usize) {
        let zero = T::zero();
        let a = probes[ia].alpha;
        let b = probes[ib].alpha;
        debug_assert!(probes[ia].slope < zero);
        debug_assert!(probes[ia].value <= phi_lim);
        debug_assert!(probes[ib].slope >= zero || probes[ib].value > phi_lim);
        debug_assert!(b > a);
        let c = probes[ic].alpha;
        let phi_c = probes[ic].value;
        let dphi_c = probes[ic].slope;
        trace!(
            "[HZ update] a = {}, b = {}, c = {}, phi_c = {}, dphi_c = {}",
            a,
            b,
            c,
            phi_c,
            dphi_c
        );
        if c < a || c > b {
            // U0: the candidate left the bracket, keep it unchanged
            return (ia, ib);
        }
        if dphi_c >= zero {
            // U1: upward slope, c is the new upper endpoint
            return (ia, ic);
        }
        // We know dphi_c < 0. However, phi may not be monotonic between a and
        // c, so check that the value is also below the reference level.
        // Replacing a is more dangerous than replacing b, since we leave the
        // secure environment of alpha = 0.
        if phi_c <= phi_lim {
            // U2: c is the new lower endpoint
            return (ic, ib);
        }
        // U3: the value crested between a and c; locate the dip by bisection.
        self.bisect(obj, probes, ia, ic, phi_lim)
    }

    /// HZ stage U3: bisect between a safe descending endpoint and a
    /// descending endpoint above the reference level.
    fn bisect<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        probes: &mut Vec<Probe<T>>,
        mut ia: usize,
        mut ib: usize,
        phi_lim: T,
    ) -> (usize, usize) {
        let zero = T::zero();
        let two = T::from_f64(2.0);
        let mut a = probes[ia].alpha;
        let mut b = probes[ib].alpha;
        debug_assert!(probes[ia].slope < zero);
        debug_assert!(probes[ia].value <= phi_lim);
        debug_assert!(probes[ib].slope < zero);
        debug_assert!(probes[ib].value > phi_lim);
        debug_assert!(b > a);
        while b - a > T::epsilon() * b {
            trace!("[HZ bisect] a = {}, b = {}, width = {}", a, b, b - a);
            let d = (a + b) / two;
            let (phi_d, dphi_d) = obj.value_and_slope(d);
            debug_assert!(phi_d.is_finite() && dphi_d.is_finite());
            probes.push(Probe {
                alpha: d,
                value: phi_d,
                slope: dphi_d,
            });
            let id = probes.len() - 1;
            if dphi_d >= zero {
                // found the upward slope, d is the new upper endpoint
                return (ia, id);
            }
            if phi_d <= phi_lim {
                // still descending and safe
                a = d;
                ia = id;
            } else {
                b = d;
                ib = id;
            }
        }
        (ia, ib)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;
    use std::cell::Cell;

    /// Wraps a scalar objective, counting fused evaluations.
    fn counted<'a>(
        evals: &'a Cell<usize>,
        mut f: impl FnMut(f64) -> (f64, f64) + 'a,
    ) -> impl FnMut(f64) -> (f64, f64) + 'a {
        move |a| {
            evals.set(evals.get() + 1);
            f(a)
        }
    }

    #[test]
    fn unit_quadratic_is_solved_in_one_secant() {
        // phi(a) = (a - 1)^2, minimum at 1; the secant of a quadratic's slope
        // is exact.
        let mut phi = |a: f64| ((a - 1.0).powi(2), 2.0 * (a - 1.0));
        let step = HagerZhang::default()
            .search(&mut phi, 0.5, 1.0, -2.0, false)
            .unwrap();
        assert_that!(&step.alpha).is_close_to(1.0, 1e-6);
        assert_eq!(step.accept, AcceptKind::Wolfe);
    }

    #[test]
    fn convex_quadratics_hit_the_minimizer() {
        // phi(a) = a/2 * alpha^2 + b * alpha; minimizer at -b/a.
        for (a, b) in [(1.0, -1.0), (4.0, -0.5), (0.5, -3.0), (10.0, -2.0)] {
            let mut phi = |t: f64| (0.5 * a * t * t + b * t, a * t + b);
            let step = HagerZhang::default()
                .search(&mut phi, 1.0, 0.0, b, false)
                .unwrap();
            assert_that!(&step.alpha).is_close_to(-b / a, 1e-8);
        }
    }

    #[test]
    fn quartic_valley_accepts_quickly() {
        // phi(a) = 100 (a - 0.1)^4 + (a - 0.1)^2, minimum at 0.1.
        let evals = Cell::new(0);
        let mut phi = counted(&evals, |a: f64| {
            let t = a - 0.1;
            (100.0 * t.powi(4) + t * t, 400.0 * t.powi(3) + 2.0 * t)
        });
        let phi0 = 100.0 * 0.1f64.powi(4) + 0.01;
        let dphi0 = -400.0 * 0.1f64.powi(3) - 0.2;
        let step = HagerZhang::default()
            .search(&mut phi, 1.0, phi0, dphi0, false)
            .unwrap();
        assert!(step.alpha > 0.01 && step.alpha < 0.2, "alpha = {}", step.alpha);
        assert!(step.value < phi0);
        assert_that!(&evals.get()).is_less_than_or_equal_to(10);
    }

    #[test]
    fn non_descent_direction_is_rejected() {
        let mut phi = |a: f64| (1.0 / (1.0 - a), 1.0 / (1.0 - a).powi(2));
        let result = HagerZhang::default().search(&mut phi, 0.5, 1.0, 1.0, false);
        assert!(matches!(result, Err(LineSearchError::NotDescent { .. })));
    }

    #[test]
    fn non_finite_origin_is_rejected() {
        let mut phi = |a: f64| (a, 1.0);
        let result = HagerZhang::default().search(&mut phi, 0.5, f64::INFINITY, -1.0, false);
        assert!(matches!(
            result,
            Err(LineSearchError::NonFiniteInitial { .. })
        ));
    }

    #[test]
    fn barrier_with_descent_stays_in_domain() {
        // phi(a) = -a + 1/(1 - a) for a < 1, infinite beyond the barrier.
        let mut phi = |a: f64| {
            if a < 1.0 {
                let w = 1.0 - a;
                (-a + 1.0 / w, -1.0 + 1.0 / (w * w))
            } else {
                (f64::INFINITY, f64::INFINITY)
            }
        };
        let step = HagerZhang::default()
            .search(&mut phi, 0.5, 1.0, -0.5, false)
            .unwrap();
        assert!(step.alpha > 0.0 && step.alpha < 0.5, "alpha = {}", step.alpha);
        assert!(step.value.is_finite());
    }

    #[test]
    fn flat_objective_terminates_early() {
        // phi is constant on the whole ray; the search must not burn its full
        // iteration budget.
        let evals = Cell::new(0);
        let mut phi = counted(&evals, |_| (1.0, 0.0));
        let step = HagerZhang::default()
            .search(&mut phi, 1.0, 1.0, -1.0, false)
            .unwrap();
        assert!(matches!(
            step.accept,
            AcceptKind::ApproxWolfe | AcceptKind::Flat
        ));
        assert_that!(&evals.get()).is_less_than_or_equal_to(5);
    }

    #[test]
    fn boundary_step_with_negative_slope_is_accepted() {
        // Linear descent capped at alphamax = 5: the expansion lands exactly
        // on the cap with the slope still negative.
        let mut phi = |a: f64| (-a, -1.0);
        let step = HagerZhang::default()
            .with_alphamax(5.0)
            .search(&mut phi, 1.0, 0.0, -1.0, false)
            .unwrap();
        assert_eq!(step.accept, AcceptKind::Boundary);
        assert_eq!(step.alpha, 5.0);
    }

    #[test]
    fn returned_step_never_exceeds_alphamax() {
        // Interior minimum: alphamax is inactive.
        let mut phi = |a: f64| ((a - 1.0).powi(2), 2.0 * (a - 1.0));
        let step = HagerZhang::default()
            .with_alphamax(2.0)
            .search(&mut phi, 0.5, 1.0, -2.0, false)
            .unwrap();
        assert!(step.alpha <= 2.0);

        // Minimum beyond the cap: geometric approach to alphamax.
        let mut phi = |a: f64| ((a - 1.0).powi(2), 2.0 * (a - 1.0));
        let step = HagerZhang::default()
            .with_alphamax(0.4)
            .with_max_iterations(200)
            .search(&mut phi, 0.3, 0.49, -1.4, false)
            .unwrap();
        assert!(step.alpha <= 0.4, "alpha = {}", step.alpha);
        assert_eq!(step.accept, AcceptKind::Boundary);
    }

    #[test]
    fn identical_inputs_return_identical_steps() {
        let quartic = |a: f64| {
            let t = a - 0.1;
            (100.0 * t.powi(4) + t * t, 400.0 * t.powi(3) + 2.0 * t)
        };
        let phi0 = 100.0 * 0.1f64.powi(4) + 0.01;
        let dphi0 = -400.0 * 0.1f64.powi(3) - 0.2;
        let ls = HagerZhang::default();
        let first = ls.search(&mut { quartic }, 1.0, phi0, dphi0, false).unwrap();
        let second = ls.search(&mut { quartic }, 1.0, phi0, dphi0, false).unwrap();
        assert_eq!(first.alpha, second.alpha);
        assert_eq!(first.value, second.value);
    }

    #[test]
    fn exhausted_rescue_falls_back_to_zero() {
        let mut phi = |_: f64| (f64::NAN, f64::NAN);
        let step = HagerZhang::default()
            .search(&mut phi, 1.0, 1.0, -1.0, false)
            .unwrap();
        assert_eq!(step.alpha, 0.0);
        assert_eq!(step.accept, AcceptKind::Rescue);
    }

    #[test]
    fn quadratic_fit_guess_short_circuits_bracketing() {
        // With mayterminate set and the trial step already at the minimizer,
        // a single evaluation suffices.
        let evals = Cell::new(0);
        let mut phi = counted(&evals, |a: f64| ((a - 1.0).powi(2), 2.0 * (a - 1.0)));
        let step = HagerZhang::default()
            .search(&mut phi, 1.0, 1.0, -2.0, true)
            .unwrap();
        assert_eq!(step.alpha, 1.0);
        assert_eq!(evals.get(), 1);
    }

    #[test]
    fn accepted_steps_satisfy_a_wolfe_form() {
        let delta = 0.1;
        let sigma = 0.9;
        for (scale, shift) in [(1.0, 1.0), (25.0, 0.3), (0.01, 4.0)] {
            let phi = |a: f64| {
                let t = a - shift;
                (scale * t * t, 2.0 * scale * t)
            };
            let (phi0, dphi0) = phi(0.0);
            let step = HagerZhang::default()
                .search(&mut { phi }, 1.0, phi0, dphi0, false)
                .unwrap();
            let (phi_c, dphi_c) = phi(step.alpha);
            let phi_lim = phi0 + 1e-6 * phi0.abs();
            let wolfe =
                delta * dphi0 >= (phi_c - phi0) / step.alpha && dphi_c >= sigma * dphi0;
            let approx = (2.0 * delta - 1.0) * dphi0 >= dphi_c
                && dphi_c >= sigma * dphi0
                && phi_c <= phi_lim;
            assert!(wolfe || approx, "step {:?} fails both Wolfe forms", step);
        }
    }

    #[test]
    fn default_parameters_match_hager_zhang() {
        let ls = HagerZhang::<f64>::default();
        assert_eq!(ls.delta, 0.1);
        assert_eq!(ls.sigma, 0.9);
        assert_eq!(ls.rho, 5.0);
        assert_eq!(ls.gamma, 0.66);
        assert_eq!(ls.psi3, 0.1);
        assert_eq!(ls.max_iterations, 50);
        assert!(ls.alphamax.is_infinite());
    }
}
