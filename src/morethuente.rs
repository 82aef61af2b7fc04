//! More-Thuente line search.
//!
//! The interval method of More & Thuente ("Line search algorithms with
//! guaranteed sufficient decrease", ACM TOMS 1994). The search maintains an
//! interval of uncertainty `[a_l, a_u]` whose endpoints are updated by the
//! rules U1-U3 of the paper, and picks trial steps by safeguarded
//! cubic/quadratic/secant interpolation (trial-value selection, Section 4,
//! with the interpolation formulas of Sun & Yuan, "Optimization Theory and
//! Methods"). While sufficient decrease has not been achieved, the search
//! works on the auxiliary function `psi(a) = phi(a) - phi(0) - c1 phi'(0) a`
//! and switches to `phi` itself once `psi(a_t) <= 0` with `phi'(a_t) >= 0`.
//! Before a bracket exists, trial steps are extrapolated forward as in the
//! MINPACK-2 `dcsrch` routine.

use log::warn;

use crate::{iterfinitemax, AcceptKind, LineObjective, LineSearch, LineSearchError, Real, Step};

/// More-Thuente line search.
///
/// Accepts on sufficient decrease plus the strong curvature condition
/// `|phi'(alpha)| <= c2 * |phi'(0)|`.
#[derive(Debug, Clone)]
pub struct MoreThuente<T> {
    /// Sufficient-decrease parameter (`0 < c1 < c2 < 1`).
    pub c1: T,
    /// Curvature parameter.
    pub c2: T,
    /// Smallest admissible step length.
    pub alphamin: T,
    /// Largest admissible step length.
    pub alphamax: T,
    /// Iteration budget.
    pub max_iterations: usize,
}

impl<T: Real> Default for MoreThuente<T> {
    fn default() -> Self {
        Self {
            c1: T::from_f64(1e-4),
            c2: T::from_f64(0.9),
            alphamin: T::from_f64(1e-12),
            alphamax: T::infinity(),
            max_iterations: 20,
        }
    }
}

impl<T: Real> MoreThuente<T> {
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

    /// Restricts the step length to `[alphamin, alphamax]`.
    pub fn with_bounds(mut self, alphamin: T, alphamax: T) -> Self {
        self.alphamin = alphamin;
        self.alphamax = alphamax;
        self
    }

    /// Sets the iteration budget (default: 20).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Auxiliary function `psi(a) = phi(a) - phi(0) - c1 phi'(0) a`
/// (More-Thuente, eq. 1.6).
#[inline]
fn psi<T: Real>(alpha: T, phi_alpha: T, phi0: T, dphi0: T, c1: T) -> T {
    phi_alpha - phi0 - c1 * dphi0 * alpha
}

/// Derivative of the auxiliary function.
#[inline]
fn dpsi<T: Real>(dphi_alpha: T, dphi0: T, c1: T) -> T {
    dphi_alpha - c1 * dphi0
}

/// Folds the current trial `(a_t, f_t, g_t)` into the interval of
/// uncertainty and proposes the next trial step (the `dcstep` update of
/// MINPACK-2, with the interpolants of Sun & Yuan).
///
/// `extrap_hi` is the furthest admissible next trial; it is only consulted
/// while no bracket exists.
#[allow(clippy::too_many_arguments)]
fn interval_step<T: Real>(
    a_l: &mut T,
    f_l: &mut T,
    g_l: &mut T,
    a_u: &mut T,
    f_u: &mut T,
    g_u: &mut T,
    a_t: T,
    f_t: T,
    g_t: T,
    bracketed: &mut bool,
    extrap_hi: T,
) -> T {
    let zero = T::zero();
    let two = T::from_f64(2.0);
    let three = T::from_f64(3.0);
    let half = T::from_f64(0.5);
    let p66 = T::from_f64(0.66);

    // Case 1: higher value. The minimizer is bracketed between a_l and a_t.
    if f_t > *f_l {
        let next = {
            let z = three * (f_t - *f_l) / (a_t - *a_l) - g_t - *g_l;
            let w_sq = z * z - g_t * *g_l;
            if w_sq < zero {
                // cubic has no real minimizer, use the quadratic through
                // (a_l, f_l, g_l) and (a_t, f_t)
                *a_l - half * (*a_l - a_t) * *g_l / (*g_l - (*f_l - f_t) / (*a_l - a_t))
            } else {
                let w = w_sq.sqrt();
                let a_c = *a_l + (a_t - *a_l) * (w - *g_l - z) / (g_t - *g_l + two * w);
                let denom = *g_l - (*f_l - f_t) / (*a_l - a_t);
                if denom.abs() < T::epsilon() {
                    a_c
                } else {
                    let a_q = *a_l - half * (*a_l - a_t) * *g_l / denom;
                    // take the step closer to a_l, or split the difference
                    if (a_c - *a_l).abs() < (a_q - *a_l).abs() {
                        a_c
                    } else {
                        half * (a_q + a_c)
                    }
                }
            }
        };
        *bracketed = true;
        *a_u = a_t;
        *f_u = f_t;
        *g_u = g_t;
        return next;
    }

    // Case 2: lower value but the slope changed sign. The minimizer is
    // bracketed between a_t and the old a_l.
    if g_t * *g_l < zero {
        let next = {
            let z = three * (f_t - *f_l) / (a_t - *a_l) - g_t - *g_l;
            let w_sq = z * z - g_t * *g_l;
            let a_s = *a_l - (*a_l - a_t) / (*g_l - g_t) * *g_l;
            if w_sq < zero {
                a_s
            } else {
                let w = w_sq.sqrt();
                let a_c = *a_l + (a_t - *a_l) * (w - *g_l - z) / (g_t - *g_l + two * w);
                // take the step further from a_t
                if (a_c - a_t).abs() >= (a_s - a_t).abs() {
                    a_c
                } else {
                    a_s
                }
            }
        };
        *bracketed = true;
        *a_u = *a_l;
        *f_u = *f_l;
        *g_u = *g_l;
        *a_l = a_t;
        *f_l = f_t;
        *g_l = g_t;
        return next;
    }

    // Cases 3 and 4: lower value, same slope sign; a_t becomes the new lower
    // endpoint. Without a bracket the only productive move is extrapolation.
    let next = if !*bracketed {
        extrap_hi
    } else if g_t.abs() <= g_l.abs() {
        // Case 3: the slope is flattening.
        let z = three * (f_t - *f_l) / (a_t - *a_l) - g_t - *g_l;
        let w_sq = z * z - g_t * *g_l;
        let a_c = if w_sq >= zero {
            let w = w_sq.sqrt();
            *a_l + (a_t - *a_l) * (w - *g_l - z) / (g_t - *g_l + two * w)
        } else if a_t > *a_l {
            a_t + p66 * (*a_u - a_t)
        } else {
            a_t - p66 * (a_t - *a_u)
        };
        let a_s = if (*g_l - g_t).abs() > T::epsilon() {
            *a_l - (*a_l - a_t) / (*g_l - g_t) * *g_l
        } else {
            a_c
        };
        let candidate = if (a_c - a_t).abs() < (a_s - a_t).abs() {
            a_c
        } else {
            a_s
        };
        // stay within a safeguarded fraction of the interval
        if a_t > *a_l {
            (a_t + p66 * (*a_u - a_t)).min(candidate)
        } else {
            (a_t + p66 * (*a_u - a_t)).max(candidate)
        }
    } else {
        // Case 4: the slope is steepening; interpolate against the far end.
        let z = three * (f_t - *f_u) / (a_t - *a_u) - g_t - *g_u;
        let w_sq = z * z - g_t * *g_u;
        if w_sq < zero {
            half * (*a_l + *a_u)
        } else {
            let w = w_sq.sqrt();
            *a_u + (a_t - *a_u) * (w - *g_u - z) / (g_t - *g_u + two * w)
        }
    };
    *a_l = a_t;
    *f_l = f_t;
    *g_l = g_t;
    next
}

impl<T: Real> LineSearch<T> for MoreThuente<T> {
    fn search<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        alpha0: T,
        phi0: T,
        dphi0: T,
        _mayterminate: bool,
    ) -> Result<Step<T>, LineSearchError<T>> {
        let zero = T::zero();
        let one = T::one();
        let two = T::from_f64(2.0);
        let xtrapu = T::from_f64(4.0);

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
                "[MT] initial step length {} is not positive and finite, using step length 0",
                alpha0
            );
            return Ok(Step {
                alpha: zero,
                value: phi0,
                accept: AcceptKind::Rescue,
            });
        }

        let ifmax = iterfinitemax::<T>();
        let mut a_t = alpha0.max(self.alphamin).min(self.alphamax);
        let (mut phi_t, mut dphi_t) = obj.value_and_slope(a_t);
        let mut iterfinite = 1;
        while !(phi_t.is_finite() && dphi_t.is_finite()) && iterfinite < ifmax {
            iterfinite += 1;
            a_t = a_t / two;
            (phi_t, dphi_t) = obj.value_and_slope(a_t);
        }
        if !(phi_t.is_finite() && dphi_t.is_finite()) {
            warn!("[MT] failed to reach a finite evaluation point, using step length 0");
            return Ok(Step {
                alpha: zero,
                value: phi0,
                accept: AcceptKind::Rescue,
            });
        }

        // Interval of uncertainty, initially degenerate at zero and carrying
        // auxiliary-function values.
        let mut a_l = zero;
        let mut f_l = zero;
        let mut g_l = (one - self.c1) * dphi0;
        let mut a_u = zero;
        let mut f_u = f_l;
        let mut g_u = g_l;
        let mut bracketed = false;
        let mut open = true; // still working on psi rather than phi

        let mut psi_t = psi(a_t, phi_t, phi0, dphi0, self.c1);
        let mut dpsi_t = dpsi(dphi_t, dphi0, self.c1);

        for _ in 0..self.max_iterations {
            if psi_t <= zero && dphi_t.abs() <= self.c2 * dphi0.abs() {
                return Ok(Step {
                    alpha: a_t,
                    value: phi_t,
                    accept: AcceptKind::StrongWolfe,
                });
            }

            // Once the auxiliary function is nonpositive with nonnegative
            // slope, continue the refinement on phi itself (MT, Section 3).
            if open && psi_t <= zero && dpsi_t >= zero {
                open = false;
                f_l = f_l + phi0 + self.c1 * dphi0 * a_l;
                g_l = g_l + self.c1 * dphi0;
                f_u = f_u + phi0 + self.c1 * dphi0 * a_u;
                g_u = g_u + self.c1 * dphi0;
            }

            let extrap_hi = a_t + xtrapu * (a_t - a_l);
            let (f_cur, g_cur) = if open { (psi_t, dpsi_t) } else { (phi_t, dphi_t) };
            let next = interval_step(
                &mut a_l, &mut f_l, &mut g_l, &mut a_u, &mut f_u, &mut g_u, a_t, f_cur, g_cur,
                &mut bracketed, extrap_hi,
            );

            if bracketed {
                let width = (a_u - a_l).abs();
                if width <= T::epsilon() * a_l.abs().max(a_u.abs()) {
                    let value = if open {
                        f_l + phi0 + self.c1 * dphi0 * a_l
                    } else {
                        f_l
                    };
                    return Ok(Step {
                        alpha: a_l,
                        value,
                        accept: AcceptKind::Flat,
                    });
                }
            }

            let a_t_old = a_t;
            a_t = next.max(self.alphamin).min(self.alphamax);
            if a_t == a_t_old {
                if a_t == self.alphamax && dphi_t < zero {
                    // descending into the cap; the feasible region ends here
                    return Ok(Step {
                        alpha: a_t,
                        value: phi_t,
                        accept: AcceptKind::Boundary,
                    });
                }
                // no representable progress is possible
                return Ok(Step {
                    alpha: a_t,
                    value: phi_t,
                    accept: AcceptKind::Flat,
                });
            }

            (phi_t, dphi_t) = obj.value_and_slope(a_t);
            let mut iterfinite = 1;
            while !(phi_t.is_finite() && dphi_t.is_finite()) && iterfinite < ifmax {
                iterfinite += 1;
                a_t = (a_l + a_t) / two;
                (phi_t, dphi_t) = obj.value_and_slope(a_t);
            }
            if !(phi_t.is_finite() && dphi_t.is_finite()) {
                warn!("[MT] trial values stayed non-finite, returning the lower endpoint");
                let value = if open {
                    f_l + phi0 + self.c1 * dphi0 * a_l
                } else {
                    f_l
                };
                return Ok(Step {
                    alpha: a_l,
                    value,
                    accept: AcceptKind::Rescue,
                });
            }
            psi_t = psi(a_t, phi_t, phi0, dphi0, self.c1);
            dpsi_t = dpsi(dphi_t, dphi0, self.c1);
        }

        Err(LineSearchError::MaxIterations {
            alpha: a_t,
            iterations: self.max_iterations,
        })
    }
}
