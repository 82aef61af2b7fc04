//! Initial-step estimators.
//!
//! Each outer iteration of a descent method starts its line search from a
//! trial step produced by one of these estimators. They read and update the
//! caller-owned [`OuterState`] (the previous step and objective value persist
//! across iterations) and may set `mayterminate` when the guess is a
//! quadratic-fit minimum that the line search is allowed to accept without
//! bracketing.

use log::warn;
use ndarray::ArrayView1;

use crate::{iterfinitemax, LineObjective, Real};

/// Scalars the caller persists across outer iterations.
#[derive(Debug, Clone)]
pub struct OuterState<T> {
    /// Step length accepted on the previous outer iteration
    /// (`NaN` before the first).
    pub alpha: T,
    /// Objective value at the previous iterate (`NaN` before the first).
    pub f_x_previous: T,
    /// Whether the current `alpha` is a quadratic-fit minimum eligible for
    /// immediate Wolfe acceptance.
    pub mayterminate: bool,
}

impl<T: Real> OuterState<T> {
    pub fn new() -> Self {
        Self {
            alpha: T::nan(),
            f_x_previous: T::nan(),
            mayterminate: false,
        }
    }
}

impl<T: Real> Default for OuterState<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of the current outer iterate, rebuilt each iteration.
#[derive(Debug)]
pub struct Iterate<'a, T> {
    /// Current point.
    pub x: ArrayView1<'a, T>,
    /// Search direction.
    pub s: ArrayView1<'a, T>,
    /// Gradient at `x`.
    pub gradient: ArrayView1<'a, T>,
    /// `f(x)`, i.e. `phi(0)`.
    pub phi0: T,
    /// Directional slope `<grad f(x), s>`, i.e. `phi'(0)`.
    pub dphi0: T,
}

/// Produces the first trial step handed to a line search each iteration.
///
/// Implementations write `state.alpha` and `state.mayterminate` and return
/// the new `alpha`.
pub trait InitialStep<T: Real> {
    fn initial<O: LineObjective<T>>(
        &mut self,
        obj: &mut O,
        iterate: &Iterate<'_, T>,
        state: &mut OuterState<T>,
    ) -> T;
}

fn norm_inf<T: Real>(v: &ArrayView1<'_, T>) -> T {
    v.iter().fold(T::zero(), |m, &x| m.max(x.abs()))
}

fn norm_2<T: Real>(v: &ArrayView1<'_, T>) -> T {
    v.dot(v).sqrt()
}

/// Always proposes the same step length.
#[derive(Debug, Clone)]
pub struct InitialStatic<T> {
    /// The proposed step.
    pub alpha: T,
    /// When set, rescale so the actual movement `alpha * |s|` never exceeds
    /// the configured step.
    pub scaled: bool,
}

impl<T: Real> Default for InitialStatic<T> {
    fn default() -> Self {
        Self {
            alpha: T::one(),
            scaled: false,
        }
    }
}

impl<T: Real> InitialStep<T> for InitialStatic<T> {
    fn initial<O: LineObjective<T>>(
        &mut self,
        _obj: &mut O,
        iterate: &Iterate<'_, T>,
        state: &mut OuterState<T>,
    ) -> T {
        let mut alpha = self.alpha;
        if self.scaled {
            let ns = norm_2(&iterate.s);
            if ns > T::zero() {
                alpha = alpha.min(ns) / ns;
            }
        }
        state.alpha = alpha;
        state.mayterminate = false;
        alpha
    }
}

/// Reuses the previous outer step, clipped to `[alphamin, alphamax]`.
#[derive(Debug, Clone)]
pub struct InitialPrevious<T> {
    /// Fallback for the first iteration.
    pub alpha: T,
    pub alphamin: T,
    pub alphamax: T,
}

impl<T: Real> Default for InitialPrevious<T> {
    fn default() -> Self {
        Self {
            alpha: T::one(),
            alphamin: T::zero(),
            alphamax: T::infinity(),
        }
    }
}

impl<T: Real> InitialStep<T> for InitialPrevious<T> {
    fn initial<O: LineObjective<T>>(
        &mut self,
        _obj: &mut O,
        _iterate: &Iterate<'_, T>,
        state: &mut OuterState<T>,
    ) -> T {
        let mut alpha = state.alpha;
        if alpha.is_nan() {
            alpha = self.alpha;
        }
        alpha = alpha.min(self.alphamax).max(self.alphamin);
        state.alpha = alpha;
        state.mayterminate = false;
        alpha
    }
}

/// Quadratic fit through `phi(0)`, `phi'(0)`, and the previous objective
/// value.
///
/// The guess `2 (phi(0) - f_prev) / phi'(0)` is kept within a factor `rho`
/// of the previous step and clipped to `[alphamin, alphamax]`; guesses close
/// to one are snapped to exactly one so quasi-Newton outer loops can take
/// unit steps.
#[derive(Debug, Clone)]
pub struct InitialQuadratic<T> {
    /// Fallback for the first iteration.
    pub alpha0: T,
    pub alphamin: T,
    pub alphamax: T,
    /// The new guess must lie within `[rho * alpha_prev, alpha_prev / rho]`.
    pub rho: T,
    /// Guesses inside this band are snapped to one.
    pub snap2one: (T, T),
}

impl<T: Real> Default for InitialQuadratic<T> {
    fn default() -> Self {
        Self {
            alpha0: T::one(),
            alphamin: T::from_f64(1e-12),
            alphamax: T::one(),
            rho: T::from_f64(0.25),
            snap2one: (T::from_f64(0.75), T::infinity()),
        }
    }
}

impl<T: Real> InitialStep<T> for InitialQuadratic<T> {
    fn initial<O: LineObjective<T>>(
        &mut self,
        _obj: &mut O,
        iterate: &Iterate<'_, T>,
        state: &mut OuterState<T>,
    ) -> T {
        let two = T::from_f64(2.0);
        let guess = if !state.f_x_previous.is_finite()
            || state.alpha.is_nan()
            || iterate.dphi0.abs() <= T::epsilon()
        {
            self.alpha0
        } else {
            let mut g = two * (iterate.phi0 - state.f_x_previous) / iterate.dphi0;
            g = g.max(self.alphamin).max(state.alpha * self.rho);
            g = g.min(self.alphamax).min(state.alpha / self.rho);
            if self.snap2one.0 <= g && g <= self.snap2one.1 {
                T::one()
            } else {
                g
            }
        };
        state.alpha = guess;
        state.mayterminate = false;
        guess
    }
}

/// Scales the previous step so the predicted first-order change
/// `alpha * phi'(0)` stays constant across iterations.
#[derive(Debug, Clone)]
pub struct InitialConstantChange<T> {
    /// Fallback for the first iteration.
    pub alpha0: T,
    pub alphamin: T,
    pub alphamax: T,
    /// The new guess must lie within `[rho * alpha_prev, alpha_prev / rho]`.
    pub rho: T,
    delta_f: T,
}

impl<T: Real> Default for InitialConstantChange<T> {
    fn default() -> Self {
        Self {
            alpha0: T::one(),
            alphamin: T::from_f64(1e-12),
            alphamax: T::one(),
            rho: T::from_f64(0.25),
            delta_f: T::nan(),
        }
    }
}

impl<T: Real> InitialConstantChange<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Real> InitialStep<T> for InitialConstantChange<T> {
    fn initial<O: LineObjective<T>>(
        &mut self,
        _obj: &mut O,
        iterate: &Iterate<'_, T>,
        state: &mut OuterState<T>,
    ) -> T {
        let two = T::from_f64(2.0);
        // refresh the tracked change with the last observed decrease
        if state.f_x_previous.is_finite() && iterate.phi0.is_finite() {
            self.delta_f = iterate.phi0 - state.f_x_previous;
        }
        let guess = if !self.delta_f.is_finite()
            || state.alpha.is_nan()
            || iterate.dphi0.abs() <= T::epsilon()
        {
            self.alpha0
        } else {
            let mut g = two * self.delta_f / iterate.dphi0;
            g = g.max(self.alphamin).max(state.alpha * self.rho);
            g = g.min(self.alphamax).min(state.alpha / self.rho);
            g
        };
        state.alpha = guess;
        state.mayterminate = false;
        guess
    }
}

/// The companion initial-step rule of the Hager-Zhang search
/// (CG_DESCENT stages I0-I2).
#[derive(Debug, Clone)]
pub struct InitialHagerZhang<T> {
    /// Scale for the very first step (stage I0).
    pub psi0: T,
    /// Fraction of the previous step probed for the quadratic fit.
    pub psi1: T,
    /// Growth factor when the quadratic fit is rejected.
    pub psi2: T,
    /// Shrink factor for the finite-value rescue of the probe.
    pub psi3: T,
    /// Largest admissible step.
    pub alphamax: T,
    /// Step for the first iteration; set to `NaN` to derive it from the
    /// iterate via stage I0 instead.
    pub alpha0: T,
}

impl<T: Real> Default for InitialHagerZhang<T> {
    fn default() -> Self {
        Self {
            psi0: T::from_f64(0.01),
            psi1: T::from_f64(0.2),
            psi2: T::from_f64(2.0),
            psi3: T::from_f64(0.1),
            alphamax: T::infinity(),
            alpha0: T::one(),
        }
    }
}

impl<T: Real> InitialStep<T> for InitialHagerZhang<T> {
    fn initial<O: LineObjective<T>>(
        &mut self,
        obj: &mut O,
        iterate: &Iterate<'_, T>,
        state: &mut OuterState<T>,
    ) -> T {
        if state.alpha.is_nan() && self.alpha0.is_nan() {
            // first iteration without a supplied step: derive one (I0)
            state.alpha = self.i0(iterate);
            state.mayterminate = false;
        } else if state.alpha.is_nan() {
            // first iteration with an explicit step
            state.alpha = self.alpha0.min(self.alphamax);
            state.mayterminate = false;
        } else {
            let (alpha, mayterminate) = self.i12(obj, iterate, state.alpha);
            state.alpha = alpha;
            state.mayterminate = mayterminate;
        }
        state.alpha
    }
}

impl<T: Real> InitialHagerZhang<T> {
    /// Stage I0: scale the first step from the size of `x`, or from the
    /// objective value when `x` is at the origin.
    fn i0(&self, iterate: &Iterate<'_, T>) -> T {
        let zero = T::zero();
        let mut alpha = T::one();
        let gr_max = norm_inf(&iterate.gradient);
        if gr_max != zero {
            let x_max = norm_inf(&iterate.x);
            if x_max != zero {
                alpha = self.psi0 * x_max / gr_max;
            } else if iterate.phi0 != zero {
                alpha = self.psi0 * iterate.phi0.abs() / norm_2(&iterate.gradient);
            }
        }
        alpha.min(self.alphamax)
    }

    /// Stages I1-I2: probe a fraction of the previous step and propose the
    /// minimum of the quadratic fit when it is trustworthy.
    fn i12<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        iterate: &Iterate<'_, T>,
        alpha_prev: T,
    ) -> (T, bool) {
        let zero = T::zero();
        let two = T::from_f64(2.0);

        let mut alphatest = (self.psi1 * alpha_prev).min(self.alphamax);
        let mut phitest = obj.value(alphatest);
        let ifmax = iterfinitemax::<T>();
        let mut iterfinite = 1;
        while !phitest.is_finite() && iterfinite < ifmax {
            iterfinite += 1;
            alphatest = self.psi3 * alphatest;
            phitest = obj.value(alphatest);
        }
        if !phitest.is_finite() {
            warn!("[HZ initial] could not find a finite probe value, proposing step length 0");
            return (zero, true);
        }

        // quadratic fit through (0, phi(0), phi'(0)) and the probe
        let quadcoef = ((phitest - iterate.phi0) / alphatest - iterate.dphi0) / alphatest;
        if quadcoef.is_finite() && quadcoef > zero && phitest <= iterate.phi0 {
            // convex and not uphill: trust the fit minimum
            let alpha = -iterate.dphi0 / two / quadcoef;
            if alpha > self.alphamax {
                (self.alphamax, false)
            } else {
                (alpha, true)
            }
        } else if phitest > iterate.phi0 {
            (alphatest, false)
        } else {
            ((self.psi2 * alpha_prev).min(self.alphamax), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    fn iterate_with<'a>(
        x: &'a Array1<f64>,
        s: &'a Array1<f64>,
        gradient: &'a Array1<f64>,
        phi0: f64,
        dphi0: f64,
    ) -> Iterate<'a, f64> {
        Iterate {
            x: x.view(),
            s: s.view(),
            gradient: gradient.view(),
            phi0,
            dphi0,
        }
    }

    fn unused(_: f64) -> (f64, f64) {
        unreachable!("this estimator must not evaluate the objective")
    }

    #[test]
    fn hz_i0_scales_from_the_objective_value_at_the_origin() {
        let x = array![0.0, 0.0];
        let s = array![-0.5, 0.0];
        let g = array![0.5, 0.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -0.25);
        let mut est = InitialHagerZhang::<f64> {
            alpha0: f64::NAN,
            ..Default::default()
        };
        let mut state = OuterState::new();
        let alpha = est.initial(&mut unused, &iterate, &mut state);
        // psi0 * |f| / |grad|_2 = 0.01 * 1 / 0.5
        assert_relative_eq!(alpha, 0.02);
        assert!(!state.mayterminate);
    }

    #[test]
    fn hz_i0_scales_from_the_iterate_when_it_is_nonzero() {
        let x = array![2.0, 1.0];
        let s = array![-0.5, 0.0];
        let g = array![0.5, 0.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -0.25);
        let mut est = InitialHagerZhang::<f64> {
            alpha0: f64::NAN,
            ..Default::default()
        };
        let mut state = OuterState::new();
        let alpha = est.initial(&mut unused, &iterate, &mut state);
        // psi0 * |x|_inf / |grad|_inf = 0.01 * 2 / 0.5
        assert_relative_eq!(alpha, 0.04);
    }

    #[test]
    fn hz_uses_the_explicit_step_on_the_first_iteration() {
        let x = array![1.0];
        let s = array![-1.0];
        let g = array![1.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -1.0);
        let mut est = InitialHagerZhang::<f64>::default();
        let mut state = OuterState::new();
        let alpha = est.initial(&mut unused, &iterate, &mut state);
        assert_relative_eq!(alpha, 1.0);
    }

    #[test]
    fn hz_quadratic_fit_proposes_the_minimum_and_allows_termination() {
        // phi(a) = (a - 1)^2: the probe at 0.2 yields an exact convex fit
        // whose minimum is the true minimizer.
        let x = array![1.0];
        let s = array![-1.0];
        let g = array![2.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -2.0);
        let mut est = InitialHagerZhang::<f64>::default();
        let mut state = OuterState::new();
        state.alpha = 1.0; // previous step
        let mut phi = |a: f64| ((a - 1.0).powi(2), 2.0 * (a - 1.0));
        let alpha = est.initial(&mut phi, &iterate, &mut state);
        assert_relative_eq!(alpha, 1.0, epsilon = 1e-12);
        assert!(state.mayterminate);
    }

    #[test]
    fn hz_rising_probe_is_returned_as_is() {
        let x = array![1.0];
        let s = array![-1.0];
        let g = array![1.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -1.0);
        let mut est = InitialHagerZhang::<f64>::default();
        let mut state = OuterState::new();
        state.alpha = 1.0;
        let mut phi = |a: f64| (1.0 + a, 1.0);
        let alpha = est.initial(&mut phi, &iterate, &mut state);
        assert_relative_eq!(alpha, 0.2); // psi1 * alpha_prev
        assert!(!state.mayterminate);
    }

    #[test]
    fn hz_concave_fit_grows_the_previous_step() {
        let x = array![1.0];
        let s = array![-1.0];
        let g = array![1.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -0.1);
        let mut est = InitialHagerZhang::<f64>::default();
        let mut state = OuterState::new();
        state.alpha = 1.0;
        let mut phi = |a: f64| (1.0 - a * a, -2.0 * a);
        let alpha = est.initial(&mut phi, &iterate, &mut state);
        assert_relative_eq!(alpha, 2.0); // psi2 * alpha_prev
        assert!(!state.mayterminate);
    }

    #[test]
    fn hz_unrecoverable_probe_proposes_zero() {
        let x = array![1.0];
        let s = array![-1.0];
        let g = array![1.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -1.0);
        let mut est = InitialHagerZhang::<f64>::default();
        let mut state = OuterState::new();
        state.alpha = 1.0;
        let mut phi = |_: f64| (f64::NAN, f64::NAN);
        let alpha = est.initial(&mut phi, &iterate, &mut state);
        assert_eq!(alpha, 0.0);
        assert!(state.mayterminate);
    }

    #[test]
    fn static_estimator_optionally_rescales_by_the_direction_norm() {
        let x = array![0.0, 0.0];
        let s = array![3.0, 4.0];
        let g = array![-3.0, -4.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -25.0);
        let mut state = OuterState::new();

        let mut plain = InitialStatic::<f64>::default();
        assert_relative_eq!(plain.initial(&mut unused, &iterate, &mut state), 1.0);

        let mut scaled = InitialStatic {
            alpha: 1.0,
            scaled: true,
        };
        // |s| = 5, so the movement is capped at the configured step
        assert_relative_eq!(scaled.initial(&mut unused, &iterate, &mut state), 0.2);
    }

    #[test]
    fn previous_estimator_clips_into_its_bounds() {
        let x = array![0.0];
        let s = array![-1.0];
        let g = array![1.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -1.0);
        let mut est = InitialPrevious {
            alpha: 1.0,
            alphamin: 0.0,
            alphamax: 2.0,
        };

        let mut state = OuterState::new();
        assert_relative_eq!(est.initial(&mut unused, &iterate, &mut state), 1.0);

        state.alpha = 5.0;
        assert_relative_eq!(est.initial(&mut unused, &iterate, &mut state), 2.0);
    }

    #[test]
    fn quadratic_estimator_snaps_near_unit_guesses_to_one() {
        let x = array![0.0];
        let s = array![-1.0];
        let g = array![1.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -2.0);
        let mut est = InitialQuadratic::<f64>::default();
        let mut state = OuterState::new();
        state.alpha = 1.0;
        state.f_x_previous = 1.9;
        // raw guess 2 * (1 - 1.9) / -2 = 0.9, inside the snap band
        assert_relative_eq!(est.initial(&mut unused, &iterate, &mut state), 1.0);
    }

    #[test]
    fn quadratic_estimator_respects_the_trust_factor() {
        let x = array![0.0];
        let s = array![-1.0];
        let g = array![1.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -2.0);
        let mut est = InitialQuadratic::<f64>::default();
        let mut state = OuterState::new();
        state.alpha = 1.0;
        state.f_x_previous = 1.1;
        // raw guess 0.1 is pulled up to rho * alpha_prev = 0.25
        assert_relative_eq!(est.initial(&mut unused, &iterate, &mut state), 0.25);
    }

    #[test]
    fn constant_change_estimator_tracks_the_observed_decrease() {
        let x = array![0.0];
        let s = array![-1.0];
        let g = array![1.0];
        let iterate = iterate_with(&x, &s, &g, 1.0, -2.0);
        let mut est = InitialConstantChange::<f64>::new();
        let mut state = OuterState::new();

        // first iteration: no change is known yet
        assert_relative_eq!(est.initial(&mut unused, &iterate, &mut state), 1.0);

        // last iteration went from 2.0 down to 1.0
        state.alpha = 1.0;
        state.f_x_previous = 2.0;
        // guess 2 * (1 - 2) / -2 = 1.0
        assert_relative_eq!(est.initial(&mut unused, &iterate, &mut state), 1.0);
    }
}
