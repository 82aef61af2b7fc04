//! Armijo backtracking with quadratic/cubic interpolation.
//!
//! Shrinks the trial step until the sufficient-decrease condition
//! `phi(alpha) <= phi(0) + c1 * alpha * phi'(0)` holds. Rather than a fixed
//! contraction, each new trial is the minimizer of a polynomial model of
//! `phi`: a quadratic through `(0, phi(0), phi'(0))` and the last probe, or a
//! cubic through the last two probes, safeguarded into
//! `[rho_lo * alpha, rho_hi * alpha]`. Only values of `phi` are used; no
//! slope evaluations are made beyond the supplied `phi'(0)`.

use log::warn;

use crate::{iterfinitemax, AcceptKind, LineObjective, LineSearch, LineSearchError, Real, Step};

/// Backtracking line search with polynomial interpolation.
#[derive(Debug, Clone)]
pub struct BackTracking<T> {
    /// Sufficient-decrease parameter.
    pub c1: T,
    /// Upper safeguard: the next trial is at most `rho_hi * alpha`.
    pub rho_hi: T,
    /// Lower safeguard: the next trial is at least `rho_lo * alpha`.
    pub rho_lo: T,
    /// Interpolation order: 2 (quadratic) or 3 (cubic).
    pub order: u8,
    /// Largest admissible step length.
    pub alphamax: T,
    /// Iteration budget.
    pub max_iterations: usize,
}

impl<T: Real> Default for BackTracking<T> {
    fn default() -> Self {
        Self {
            c1: T::from_f64(1e-4),
            rho_hi: T::from_f64(0.5),
            rho_lo: T::from_f64(0.1),
            order: 3,
            alphamax: T::infinity(),
            max_iterations: 1000,
        }
    }
}

impl<T: Real> BackTracking<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sufficient-decrease parameter `c1` (default: 1e-4).
    pub fn with_c1(mut self, c1: T) -> Self {
        self.c1 = c1;
        self
    }

    /// Selects quadratic (2) or cubic (3) interpolation (default: 3).
    pub fn with_order(mut self, order: u8) -> Self {
        debug_assert!(order == 2 || order == 3);
        self.order = order;
        self
    }

    /// Caps the step length at `alphamax` (default: unbounded).
    pub fn with_alphamax(mut self, alphamax: T) -> Self {
        self.alphamax = alphamax;
        self
    }

    /// Sets the iteration budget (default: 1000).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Minimizer of the quadratic through `(0, phi0, dphi0)` and `(alpha, phi)`.
fn quadratic_step<T: Real>(alpha: T, phi: T, phi0: T, dphi0: T) -> Option<T> {
    let two = T::from_f64(2.0);
    let denom = two * (phi - phi0 - dphi0 * alpha);
    if !denom.is_finite() || denom == T::zero() {
        return None;
    }
    let out = -(dphi0 * alpha * alpha) / denom;
    out.is_finite().then_some(out)
}

/// Minimizer of the cubic through `(0, phi0, dphi0)` and the last two probes.
fn cubic_step<T: Real>(alpha1: T, phi1: T, alpha2: T, phi2: T, phi0: T, dphi0: T) -> Option<T> {
    let zero = T::zero();
    let two = T::from_f64(2.0);
    let three = T::from_f64(3.0);
    let d1 = phi1 - phi0 - dphi0 * alpha1;
    let d2 = phi2 - phi0 - dphi0 * alpha2;
    let denom = alpha1 * alpha1 * alpha2 * alpha2 * (alpha2 - alpha1);
    if !denom.is_finite() || denom == zero {
        return None;
    }
    let a = (alpha1 * alpha1 * d2 - alpha2 * alpha2 * d1) / denom;
    let b = (-alpha1 * alpha1 * alpha1 * d2 + alpha2 * alpha2 * alpha2 * d1) / denom;
    if !a.is_finite() || !b.is_finite() {
        return None;
    }

    if a.abs() <= T::epsilon() {
        // the cubic degenerated; fall back to the quadratic root
        let denom_b = two * b;
        if denom_b == zero || !denom_b.is_finite() {
            return None;
        }
        let out = -dphi0 / denom_b;
        return out.is_finite().then_some(out);
    }

    let disc = (b * b - three * a * dphi0).max(zero);
    let out = (-b + disc.sqrt()) / (three * a);
    out.is_finite().then_some(out)
}

impl<T: Real> LineSearch<T> for BackTracking<T> {
    fn search<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        alpha0: T,
        phi0: T,
        dphi0: T,
        _mayterminate: bool,
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
                "[BT] initial step length {} is not positive and finite, using step length 0",
                alpha0
            );
            return Ok(Step {
                alpha: zero,
                value: phi0,
                accept: AcceptKind::Rescue,
            });
        }

        let mut alpha = alpha0.min(self.alphamax);

        // If phi(alpha) is not finite, keep halving until it is.
        let ifmax = iterfinitemax::<T>();
        let mut phi_alpha = obj.value(alpha);
        let mut iterfinite = 1;
        while !phi_alpha.is_finite() && iterfinite < ifmax {
            iterfinite += 1;
            alpha = alpha / two;
            phi_alpha = obj.value(alpha);
        }
        if !phi_alpha.is_finite() {
            warn!("[BT] failed to reach a finite evaluation point, using step length 0");
            return Ok(Step {
                alpha: zero,
                value: phi0,
                accept: AcceptKind::Rescue,
            });
        }

        let mut alpha_prev = alpha;
        let mut phi_prev: Option<T> = None;

        for iter in 0..self.max_iterations {
            if phi_alpha <= phi0 + self.c1 * alpha * dphi0 {
                return Ok(Step {
                    alpha,
                    value: phi_alpha,
                    accept: AcceptKind::Armijo,
                });
            }

            let proposal = if iter == 0 || self.order < 3 {
                quadratic_step(alpha, phi_alpha, phi0, dphi0)
            } else if let Some(prev) = phi_prev {
                cubic_step(alpha, phi_alpha, alpha_prev, prev, phi0, dphi0)
            } else {
                quadratic_step(alpha, phi_alpha, phi0, dphi0)
            };
            let mut next = proposal.unwrap_or(alpha * self.rho_hi);

            // safeguard the model minimizer into a sane contraction range
            let lo = self.rho_lo * alpha;
            let hi = self.rho_hi * alpha;
            if next > hi {
                next = hi;
            }
            if next < lo {
                next = lo;
            }

            alpha_prev = alpha;
            phi_prev = Some(phi_alpha);
            alpha = next;
            debug_assert!(alpha.is_finite() && alpha > zero);

            // A non-finite value simply fails the Armijo test and poisons the
            // interpolant, so the next trial falls back to plain contraction.
            phi_alpha = obj.value(alpha);
        }

        Err(LineSearchError::MaxIterations {
            alpha,
            iterations: self.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;
    use std::cell::Cell;

    #[test]
    fn sufficient_decrease_accepts_immediately() {
        let evals = Cell::new(0);
        let mut phi = |a: f64| {
            evals.set(evals.get() + 1);
            ((a - 1.0).powi(2), 2.0 * (a - 1.0))
        };
        let step = BackTracking::default()
            .search(&mut phi, 1.0, 1.0, -2.0, false)
            .unwrap();
        assert_eq!(step.alpha, 1.0);
        assert_eq!(step.accept, AcceptKind::Armijo);
        assert_eq!(evals.get(), 1);
    }

    #[test]
    fn overshoot_interpolates_back_to_the_minimizer() {
        // phi(10) = 81 fails Armijo; the quadratic model is exact for a
        // quadratic, so the next trial is the true minimizer.
        let evals = Cell::new(0);
        let mut phi = |a: f64| {
            evals.set(evals.get() + 1);
            ((a - 1.0).powi(2), 2.0 * (a - 1.0))
        };
        let step = BackTracking::default()
            .search(&mut phi, 10.0, 1.0, -2.0, false)
            .unwrap();
        assert_that!(&step.alpha).is_close_to(1.0, 1e-12);
        assert_that!(&evals.get()).is_less_than_or_equal_to(3);
    }

    #[test]
    fn accepted_step_satisfies_armijo() {
        let phi = |a: f64| ((a - 0.01).powi(2), 2.0 * (a - 0.01));
        let (phi0, dphi0) = phi(0.0);
        let step = BackTracking::default()
            .search(&mut { phi }, 10.0, phi0, dphi0, false)
            .unwrap();
        assert!(step.alpha <= 0.1);
        assert!(step.value <= phi0 + 1e-4 * step.alpha * dphi0);
    }

    #[test]
    fn quadratic_order_also_converges() {
        let phi = |a: f64| ((a - 0.01).powi(2), 2.0 * (a - 0.01));
        let (phi0, dphi0) = phi(0.0);
        let step = BackTracking::default()
            .with_order(2)
            .search(&mut { phi }, 10.0, phi0, dphi0, false)
            .unwrap();
        assert!(step.value <= phi0 + 1e-4 * step.alpha * dphi0);
    }

    #[test]
    fn barrier_is_rescued_by_halving() {
        let mut phi = |a: f64| {
            if a < 1.0 {
                let w = 1.0 - a;
                (-2.0 * a + 1.0 / w, -2.0 + 1.0 / (w * w))
            } else {
                (f64::INFINITY, f64::INFINITY)
            }
        };
        let step = BackTracking::default()
            .search(&mut phi, 2.0, 1.0, -1.0, false)
            .unwrap();
        assert!(step.alpha > 0.0 && step.alpha < 1.0, "alpha = {}", step.alpha);
        assert!(step.value.is_finite());
        assert!(step.value <= 1.0 + 1e-4 * step.alpha * -1.0);
    }

    #[test]
    fn exhausted_rescue_falls_back_to_zero() {
        let mut phi = |_: f64| (f64::NAN, f64::NAN);
        let step = BackTracking::default()
            .search(&mut phi, 1.0, 1.0, -1.0, false)
            .unwrap();
        assert_eq!(step.alpha, 0.0);
        assert_eq!(step.accept, AcceptKind::Rescue);
    }

    #[test]
    fn non_descent_direction_is_rejected() {
        let mut phi = |a: f64| (a, 1.0);
        let result = BackTracking::default().search(&mut phi, 1.0, 0.0, 0.0, false);
        assert!(matches!(result, Err(LineSearchError::NotDescent { .. })));
    }
}
