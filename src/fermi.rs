//! # Fermi integrals
//!
//! Closed-form approximation of the Fermi-Dirac integral of order 1/2 after
//! Aymerich-Humet et al., valid across the whole real line. The same
//! expression backs both the value and the analytic derivative so the Newton
//! linearization stays consistent with the residual.
//!
//! The module also hosts the stabilization helpers shared with the charge
//! density model: a symmetric clamp, a clamped exponential and a
//! differentiable absolute value.

/// Fitting constants of the generalized Aymerich-Humet approximation for
/// order j = 1/2.
const A: f64 = 9.6;
const B: f64 = 2.13;
const C: f64 = 2.4;
/// 1 / Gamma(3/2)
const G: f64 = 2.0 / 1.7724538509055159; // sqrt(pi)

/// Raw exponential arguments are clamped to this symmetric range before
/// evaluation to avoid floating point overflow.
pub const EXP_CLAMP: f64 = 40.0;

/// Smoothing width of the differentiable absolute value.
pub const ABS_SMOOTHING: f64 = 1e-8;

const THREE_SQRT_2: f64 = 4.242640687119285;

/// Clamps `x` to `[-bound, bound]`.
pub(crate) fn clamp_symmetric(x: f64, bound: f64) -> f64 {
    x.clamp(-bound, bound)
}

/// Clamps `x` to `[-bound, bound]` and returns the derivative of the clamp,
/// which vanishes outside the range.
pub(crate) fn clamp_with_derivative(x: f64, bound: f64) -> (f64, f64) {
    if x > bound {
        (bound, 0.0)
    } else if x < -bound {
        (-bound, 0.0)
    } else {
        (x, 1.0)
    }
}

/// `exp(x)` with the argument clamped to [`EXP_CLAMP`].
pub(crate) fn safe_exp(x: f64) -> f64 {
    clamp_symmetric(x, EXP_CLAMP).exp()
}

/// [`safe_exp`] together with its derivative with respect to `x`, which is
/// zero in the clamped region.
pub(crate) fn safe_exp_with_derivative(x: f64) -> (f64, f64) {
    let (clamped, chain) = clamp_with_derivative(x, EXP_CLAMP);
    let value = clamped.exp();
    (value, value * chain)
}

/// Differentiable replacement for `|x|`: sqrt(x^2 + eps^2).
pub(crate) fn smooth_abs(x: f64) -> f64 {
    (x * x + ABS_SMOOTHING * ABS_SMOOTHING).sqrt()
}

/// The Fermi-Dirac integral of order 1/2, normalized by 1 / Gamma(3/2).
///
/// Finite and monotonically non-decreasing for every real `x`, reducing to
/// the Boltzmann limit `exp(x) / G` for strongly non-degenerate arguments.
pub fn fermi_half(x: f64) -> f64 {
    let s = smooth_abs(x - B);
    let u = (s.powf(C) + A).powf(1.0 / C);
    1.0 / (THREE_SQRT_2 * (B + x + u).powf(-1.5) + G * safe_exp(-x))
}

/// Analytic derivative of [`fermi_half`], evaluated with the identical
/// clamping so that Newton's linear model matches the residual.
pub fn fermi_half_derivative(x: f64) -> f64 {
    let s = smooth_abs(x - B);
    let ds = (x - B) / s;
    let sc = s.powf(C);
    let u = (sc + A).powf(1.0 / C);
    let du = (sc + A).powf(1.0 / C - 1.0) * s.powf(C - 1.0) * ds;

    let base = B + x + u;
    let (exponential, d_exponential) = safe_exp_with_derivative(-x);

    let denominator = THREE_SQRT_2 * base.powf(-1.5) + G * exponential;
    let d_denominator = -1.5 * THREE_SQRT_2 * base.powf(-2.5) * (1.0 + du) - G * d_exponential;

    -d_denominator / (denominator * denominator)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn central_difference(x: f64) -> f64 {
        let h = 1e-5 * x.abs().max(1.0);
        (fermi_half(x + h) - fermi_half(x - h)) / (2.0 * h)
    }

    #[test]
    fn fermi_half_reduces_to_the_boltzmann_limit() {
        for x in [-30.0, -25.0, -20.0] {
            assert_relative_eq!(fermi_half(x), x.exp() / G, max_relative = 1e-6);
        }
    }

    #[test]
    fn fermi_half_matches_the_degenerate_asymptote() {
        // F ~ (2x)^{3/2} / (3 sqrt(2)) for large arguments
        let x: f64 = 500.0;
        let asymptote = (2.0 * x).powf(1.5) / THREE_SQRT_2;
        assert_relative_eq!(fermi_half(x), asymptote, max_relative = 5e-2);
    }

    #[test]
    fn fermi_half_is_finite_at_extreme_magnitudes() {
        for x in [-1e9, -1e3, -120.0, 0.0, 120.0, 1e3, 1e9] {
            assert!(fermi_half(x).is_finite());
            assert!(fermi_half_derivative(x).is_finite());
            assert!(fermi_half(x) > 0.0);
        }
    }

    #[test]
    fn derivative_vanishes_deep_in_the_clamped_region() {
        assert_relative_eq!(fermi_half_derivative(-100.0), 0.0);
        assert_relative_eq!(fermi_half(-100.0), fermi_half(-200.0));
    }

    proptest! {
        #[test]
        fn fermi_half_is_monotonically_non_decreasing(x in -400.0..400.0f64, step in 1e-6..10.0f64) {
            prop_assert!(fermi_half(x + step) >= fermi_half(x));
        }

        #[test]
        fn derivative_matches_central_difference(x in -200.0..200.0f64) {
            let numeric = central_difference(x);
            let analytic = fermi_half_derivative(x);
            let scale = numeric.abs().max(analytic.abs());
            prop_assert!((numeric - analytic).abs() <= 1e-6 * scale + 1e-12);
        }
    }

    #[test]
    fn clamp_is_idempotent_in_range() {
        assert_eq!(clamp_symmetric(3.2, EXP_CLAMP), 3.2);
        assert_eq!(clamp_symmetric(-39.9, EXP_CLAMP), -39.9);
    }

    #[test]
    fn clamp_never_produces_non_finite_output() {
        for x in [f64::INFINITY, f64::NEG_INFINITY, 1e300, -1e300] {
            assert!(clamp_symmetric(x, EXP_CLAMP).is_finite());
            assert!(safe_exp(x).is_finite());
        }
    }

    #[test]
    fn smooth_abs_is_differentiable_at_the_origin() {
        assert_eq!(smooth_abs(0.0), ABS_SMOOTHING);
        assert_relative_eq!(smooth_abs(2.0), 2.0, max_relative = 1e-9);
    }
}
