//! One-dimensional line-search algorithms for unconstrained optimization.
//!
//! Multivariate descent methods (gradient descent, conjugate gradient,
//! quasi-Newton, Newton) reduce each iteration to a scalar problem: given the
//! current iterate `x` and a descent direction `s`, pick a step length
//! `alpha > 0` along the ray `x + alpha * s` that makes sufficient progress on
//! `phi(alpha) = f(x + alpha * s)`. This crate provides the step-length
//! procedures, each behind the same [`LineSearch`] contract:
//!
//! - [`HagerZhang`]: bracketing and interval refinement accepting either the
//!   classical Wolfe conditions or the roundoff-robust approximate-Wolfe test.
//! - [`MoreThuente`]: safeguarded cubic/quadratic interval search for the
//!   strong Wolfe conditions.
//! - [`StrongWolfe`]: classical Nocedal & Wright bracket-then-zoom.
//! - [`BackTracking`]: Armijo backtracking with quadratic/cubic interpolation.
//! - [`Static`]: accepts the supplied step unchanged (fixed-step methods).
//!
//! The companion [`InitialStep`] estimators produce the first trial step of
//! each outer iteration; [`RayObjective`] adapts a vector objective to the
//! scalar restriction along a fixed ray.
//!
//! # Example
//!
//! Any `FnMut(T) -> (T, T)` returning `(phi(alpha), phi'(alpha))` is a valid
//! objective. Minimizing `phi(alpha) = (alpha - 1)^2` from a trial step of
//! `0.5`:
//!
//! ```
//! use linesearch::{HagerZhang, LineSearch};
//!
//! let mut phi = |a: f64| ((a - 1.0).powi(2), 2.0 * (a - 1.0));
//! let ls = HagerZhang::default();
//! // phi(0) = 1, phi'(0) = -2
//! let step = ls.search(&mut phi, 0.5, 1.0, -2.0, false).unwrap();
//! assert!((step.alpha - 1.0).abs() < 1e-6);
//! ```
//!
//! The searches are generic over the scalar type via [`Real`] (implemented
//! for `f32` and `f64`); machine epsilon, infinities, and ULP stepping all
//! come from the scalar type. Everything is single-threaded and synchronous;
//! the caller bounds runtime through `max_iterations` and `alphamax`.

use std::fmt;

use num_traits::Float;

mod backtracking;
mod hagerzhang;
mod initial;
mod morethuente;
mod objective;
mod strongwolfe;

pub use backtracking::BackTracking;
pub use hagerzhang::HagerZhang;
pub use initial::{
    InitialConstantChange, InitialHagerZhang, InitialPrevious, InitialQuadratic, InitialStatic,
    InitialStep, Iterate, OuterState,
};
pub use morethuente::MoreThuente;
pub use objective::RayObjective;
pub use strongwolfe::StrongWolfe;

/// Scalar type the line searches are generic over.
///
/// Extends [`num_traits::Float`] with the two operations the algorithms need
/// beyond ordinary arithmetic: lossy conversion of `f64` constants, and a
/// single ULP step upward (used by the flat-region guards).
pub trait Real: Float + ndarray::LinalgScalar + fmt::Debug + fmt::Display {
    /// Converts an `f64` constant into this scalar type.
    fn from_f64(v: f64) -> Self;
    /// The next representable value toward `+inf`.
    fn next_above(self) -> Self;
}

impl Real for f32 {
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn next_above(self) -> Self {
        f32::next_up(self)
    }
}

impl Real for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }
    fn next_above(self) -> Self {
        f64::next_up(self)
    }
}

/// Number of times a non-finite trial value may be shrunk before giving up.
///
/// `ceil(-log2(eps))` halvings exhaust the mantissa, so further shrinking
/// cannot produce a meaningfully different evaluation point.
pub(crate) fn iterfinitemax<T: Real>() -> usize {
    (-T::epsilon().log2()).ceil().to_usize().unwrap_or(64)
}

/// The scalar restriction `phi(alpha) = f(x + alpha * s)` of an objective.
///
/// Implementations must be deterministic in `alpha` for the lifetime of a
/// search. `value` and `slope` may return `NaN` or infinities for
/// out-of-domain steps; the searches treat those as "shrink `alpha`".
pub trait LineObjective<T: Real> {
    /// `phi(alpha)`.
    fn value(&mut self, alpha: T) -> T;
    /// `phi'(alpha)`.
    fn slope(&mut self, alpha: T) -> T;
    /// `(phi(alpha), phi'(alpha))` in one evaluation.
    fn value_and_slope(&mut self, alpha: T) -> (T, T);
}

/// Any closure returning `(phi(alpha), phi'(alpha))` is a line objective.
impl<T: Real, F> LineObjective<T> for F
where
    F: FnMut(T) -> (T, T),
{
    fn value(&mut self, alpha: T) -> T {
        self(alpha).0
    }

    fn slope(&mut self, alpha: T) -> T {
        self(alpha).1
    }

    fn value_and_slope(&mut self, alpha: T) -> (T, T) {
        self(alpha)
    }
}

/// How an accepted step satisfied the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptKind {
    /// Classical Wolfe pair: sufficient decrease and curvature.
    Wolfe,
    /// Approximate-Wolfe test, robust to roundoff in `phi(c) - phi(0)`.
    ApproxWolfe,
    /// Strong Wolfe curvature form `|phi'(alpha)| <= c2 * |phi'(0)|`.
    StrongWolfe,
    /// Armijo sufficient decrease only.
    Armijo,
    /// The step hit `alphamax` with the slope still negative; the feasible
    /// region ends here and no Wolfe condition was verified.
    Boundary,
    /// The bracket is flat to working precision; further refinement cannot
    /// improve the step.
    Flat,
    /// Finite-value recovery was exhausted; this is the best safe step
    /// (often zero).
    Rescue,
    /// The supplied step was accepted without any test.
    Fixed,
}

/// A successful line-search outcome.
#[derive(Debug, Clone, Copy)]
pub struct Step<T> {
    /// The accepted step length.
    pub alpha: T,
    /// `phi(alpha)` at the accepted step.
    pub value: T,
    /// Which acceptance test the step passed.
    pub accept: AcceptKind,
}

/// An error type for clear diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum LineSearchError<T: fmt::Debug + fmt::Display> {
    #[error(
        "search direction is not a direction of descent; this may indicate inaccurate \
         user-provided derivatives (slope at lower endpoint = {dphi_a}, upper = {dphi_b})"
    )]
    NotDescent {
        /// Slope at the lower bracket endpoint (or at zero).
        dphi_a: T,
        /// Slope at the upper bracket endpoint (or at zero).
        dphi_b: T,
    },
    #[error(
        "value and slope at step length zero must be finite (phi(0) = {phi0}, phi'(0) = {dphi0})"
    )]
    NonFiniteInitial { phi0: T, dphi0: T },
    #[error(
        "line search failed to converge, reached maximum iterations {iterations} \
         (tentative step length {alpha})"
    )]
    MaxIterations {
        /// The last bracketed step, usable by the caller as a fallback.
        alpha: T,
        /// The configured iteration limit.
        iterations: usize,
    },
}

/// Common contract of every line search in this crate.
///
/// `alpha0` is the first trial step, `phi0`/`dphi0` are the value and slope
/// at step length zero, and `mayterminate` marks `alpha0` as a quadratic-fit
/// minimum eligible for immediate acceptance (set by the [`InitialStep`]
/// estimators).
pub trait LineSearch<T: Real> {
    fn search<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        alpha0: T,
        phi0: T,
        dphi0: T,
        mayterminate: bool,
    ) -> Result<Step<T>, LineSearchError<T>>;
}

/// Fixed-step "search" that accepts the supplied step unchanged.
///
/// Useful for fixed-step gradient descent; `phi` is evaluated once so the
/// returned [`Step`] still carries the objective value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Static;

impl Static {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Real> LineSearch<T> for Static {
    fn search<O: LineObjective<T>>(
        &self,
        obj: &mut O,
        alpha0: T,
        phi0: T,
        dphi0: T,
        _mayterminate: bool,
    ) -> Result<Step<T>, LineSearchError<T>> {
        if !(phi0.is_finite() && dphi0.is_finite()) {
            return Err(LineSearchError::NonFiniteInitial { phi0, dphi0 });
        }
        let value = obj.value(alpha0);
        Ok(Step {
            alpha: alpha0,
            value,
            accept: AcceptKind::Fixed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_line_objectives() {
        let mut phi = |a: f64| (a * a, 2.0 * a);
        assert_eq!(phi.value(3.0), 9.0);
        assert_eq!(phi.slope(3.0), 6.0);
        assert_eq!(phi.value_and_slope(2.0), (4.0, 4.0));
    }

    #[test]
    fn static_search_returns_supplied_step() {
        let mut phi = |a: f64| ((a - 2.0).powi(2), 2.0 * (a - 2.0));
        let step = Static::new()
            .search(&mut phi, 0.7, 4.0, -4.0, false)
            .unwrap();
        assert_eq!(step.alpha, 0.7);
        assert_eq!(step.value, (0.7f64 - 2.0).powi(2));
        assert_eq!(step.accept, AcceptKind::Fixed);
    }

    #[test]
    fn static_search_rejects_non_finite_origin() {
        let mut phi = |a: f64| (a, 1.0);
        let result = Static::new().search(&mut phi, 1.0, f64::NAN, -1.0, false);
        assert!(matches!(
            result,
            Err(LineSearchError::NonFiniteInitial { .. })
        ));
    }

    #[test]
    fn iterfinitemax_exhausts_the_mantissa() {
        assert_eq!(iterfinitemax::<f64>(), 52);
        assert_eq!(iterfinitemax::<f32>(), 23);
    }

    #[test]
    fn next_above_steps_one_ulp() {
        assert!(1.0f64.next_above() > 1.0);
        assert_eq!(1.0f64.next_above(), 1.0 + f64::EPSILON);
    }
}
