//! Classical strong-Wolfe line search (bracket, then zoom).
//!
//! Follows the structure of Algorithms 3.5 and 3.6 in Nocedal & Wright,
//! "Numerical Optimization": an expansion phase brackets an acceptable step,
//! then `zoom` refines the bracket with cubic interpolation, falling back to
//! bisection whenever the interpolant is untrustworthy.

use log::warn;

use crate::{AcceptKind, LineObjective, LineSearch, LineSearchError, Real, Step};

/// Strong-Wolfe line search.
///
/// Accepts a step with sufficient decrease
/// (`phi(alpha) <= phi(0) + c1 * alpha * phi'(0)`) and the strong curvature
/// condition (`|phi'(alpha)| <= -c2 * phi'(0)`).
#[derive(Debug, Clone)]
pub struct StrongWolfe<T> {
    /// Sufficient-decrease parameter (`0 < c1 < c2 < 1`).
    pub c1: T,
    /// Curvature parameter.
    pub c2: T,
    /// Expansion factor for the bracketing phase.
    pub rho: T,
    /// Largest admissible step length.
    pub alphamax: T,
    /// Iteration budget for each of the two phases.
    pub max_iterations: usize,
}

impl<T: Real> Default for StrongWolfe<T> {
    fn default() -> Self {
        Self {
            c1: T::from_f64(1e-4),
            c2: T::from_f64(0.9),
            rho: T::from_f64(2.0),
            alphamax: T::infinity(),
            max_iterations: 20,
        }
    }
}

impl<T: Real> StrongWolfe<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sufficient-decrease parameter `c1` (default: 1e-4).
    pub fn with_c1(mut self, c1: T) -> Self {
        self.c1 = c1;
        self
    }

    /// Sets the curvature parameter `c2` (default: 0.9).
    pub fn with_c2(mut self, c2: T) -> Self {
        self.c2 = c2;
        self
    }

    /// Caps the step length at `alphamax` (default: unbounded).
    pub fn with_alphamax(mut self, alphamax: T) -> Self {
        self.alphamax = alphamax;
        self
    }

    /// Sets the per-phase iteration budget (default: 20).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl<T: Real> LineSearch<T> for StrongWolfe<T> {
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
                "[SW] initial step length {} is not positive and finite, using step length 0",
                alpha0
            );
            return Ok(Step {
                alpha: zero,
                value: phi0,
                accept: AcceptKind::Rescue,
            });
        }

        let mut alpha = alpha0.min(self.alphamax);
        let mut alpha_prev = zero;
        let mut phi_prev = phi0;
        let mut dphi_prev = dphi0;

        // Bracketing phase.
        for i in 0..self.max_iterations {
            let (phi_i, dphi_i) = obj.value_and_slope(alpha);
            if !(phi_i.is_finite() && dphi_i.is_finite()) {
                // shrink toward the last finite point
                let shrunk = (alpha_prev + alpha) / two;
                if shrunk <= alpha_prev.next_above() {
                    warn!(
                        "[SW] could not expand past {} to a finite value",
                        alpha_prev
                    );
                    return Ok(Step {
                        alpha: alpha_prev,
                        value: phi_prev,
                        accept: AcceptKind::Rescue,
                    });
                }
                alpha = shrunk;
                continue;
            }

            if phi_i > phi0 + self.c1 * alpha * dphi0 || (i > 0 && phi_i >= phi_prev) {
                // overshot on value: the minimum is bracketed below alpha
                return self.zoom(
                    obj, alpha_prev, alpha, phi_prev, phi_i, dphi_prev, dphi_i, phi0, dphi0,
                );
            }
            if dphi_i.abs() <= -self.c2 * dphi0 {
                return Ok(Step {
                    alpha,
                    value: phi_i,
                    accept: AcceptKind::StrongWolfe,
                });
            }
            if dphi_i >= zero {
                // overshot on slope: bracketed with the roles reversed
                return self.zoom(
                    obj, alpha, alpha_prev, phi_i, phi_prev, dphi_i, dphi_prev, phi0, dphi0,
                );
            }

            alpha_prev = alpha;
            phi_prev = phi_i;
            dphi_prev = dphi_i;
            let next = (self.rho * alpha).min(self.alphamax);
            if next == alpha {
                // pinned at alphamax with the slope still negative
                return Ok(Step {
                    alpha,
                    value: phi_i,
                    accept: AcceptKind::Boundary,
                });
            }
            alpha = next;
        }

        Err(LineSearchError::MaxIterations {
            alpha: alpha_prev,
            iterations: self.max_iterations,
        })
    }
}

impl<T: Real> StrongWolfe<T> {
    /// Zoom phase: refine the bracket `[alpha_lo, alpha_hi]` where `alpha_lo`
    /// carries the lowest value found so far satisfying sufficient decrease.
    #[allow(clippy::too_many_arguments)]
    fn zoom<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        mut alpha_lo: T,
        mut alpha_hi: T,
        mut phi_lo: T,
        mut phi_hi: T,
        mut dphi_lo: T,
        mut dphi_hi: T,
        phi0: T,
        dphi0: T,
    ) -> Result<Step<T>, LineSearchError<T>> {
        let zero = T::zero();
        let two = T::from_f64(2.0);
        let three = T::from_f64(3.0);

        for _ in 0..self.max_iterations {
            let width = (alpha_hi - alpha_lo).abs();
            if width <= T::epsilon() * alpha_lo.abs().max(alpha_hi.abs()) {
                // the bracket has collapsed to floating-point resolution
                return Ok(Step {
                    alpha: alpha_lo,
                    value: phi_lo,
                    accept: AcceptKind::Flat,
                });
            }

            // Cubic interpolation on the ordered bracket; bisection whenever
            // the interpolant is unusable or leaves the interval.
            let (a_l, a_h, f_l, f_h, d_l, d_h) = if alpha_lo <= alpha_hi {
                (alpha_lo, alpha_hi, phi_lo, phi_hi, dphi_lo, dphi_hi)
            } else {
                (alpha_hi, alpha_lo, phi_hi, phi_lo, dphi_hi, dphi_lo)
            };
            let mid = (a_l + a_h) / two;
            let alpha_j = if f_l.is_finite() && f_h.is_finite() {
                let d1 = d_l + d_h - three * (f_h - f_l) / (a_h - a_l);
                let d2_sq = d1 * d1 - d_l * d_h;
                if d2_sq >= zero && d2_sq.is_finite() {
                    let d2 = d2_sq.sqrt();
                    let trial = a_h - (a_h - a_l) * (d_h + d2 - d1) / (d_h - d_l + two * d2);
                    if trial.is_finite() && trial > a_l && trial < a_h {
                        trial
                    } else {
                        mid
                    }
                } else {
                    mid
                }
            } else {
                mid
            };

            let (phi_j, dphi_j) = obj.value_and_slope(alpha_j);

            // A non-finite value means the step went too far; treat it like a
            // sufficient-decrease failure so the bracket shrinks toward lo.
            if !phi_j.is_finite()
                || phi_j > phi0 + self.c1 * alpha_j * dphi0
                || phi_j >= phi_lo
            {
                alpha_hi = alpha_j;
                phi_hi = phi_j;
                dphi_hi = dphi_j;
            } else {
                if dphi_j.abs() <= -self.c2 * dphi0 {
                    return Ok(Step {
                        alpha: alpha_j,
                        value: phi_j,
                        accept: AcceptKind::StrongWolfe,
                    });
                }
                if dphi_j * (alpha_hi - alpha_lo) >= zero {
                    alpha_hi = alpha_lo;
                    phi_hi = phi_lo;
                    dphi_hi = dphi_lo;
                }
                alpha_lo = alpha_j;
                phi_lo = phi_j;
                dphi_lo = dphi_j;
            }
        }

        Err(LineSearchError::MaxIterations {
            alpha: alpha_lo,
            iterations: self.max_iterations,
        })
    }
}
