//! Single-variable derivative warm-ups.
//!
//! The same derivative computed three ways (finite differences, dual
//! numbers, the chain rule by hand) and a gradient-descent loop to drive
//! with any of them.
//!
//! ```rust
//! use dualgrad::calculus::{derivative_dual, descend, quadratic};
//!
//! // (x + 1)^2 - 2 has its minimum at x = -1
//! let path = descend(7.5, 50, 0.1, |x| derivative_dual(quadratic, x));
//! let last = *path.last().unwrap();
//! assert!((last + 1.0).abs() < 1e-3);
//! ```

use crate::dual::DualNumber;
use crate::scalar::Scalar;

/// Steps taken by the warm-up descent loops.
pub const DEFAULT_STEPS: usize = 50;

/// Step size of the warm-up descent loops.
pub const DEFAULT_STEP_SIZE: f64 = 0.1;

/// `f(x) = (x + 1)^2 - 2`, minimum `-2` at `x = -1`.
pub fn quadratic<T: Scalar>(x: T) -> T {
    let shifted = x + 1.0;
    shifted.clone() * shifted - 2.0
}

/// Central difference `(f(x + ε) - f(x - ε)) / 2ε`.
pub fn derivative_finite_difference(f: impl Fn(f64) -> f64, x: f64, epsilon: f64) -> f64 {
    (f(x + epsilon) - f(x - epsilon)) / (2.0 * epsilon)
}

/// `f'(x)` read off `f` applied to a dual number seeded at `x`.
pub fn derivative_dual(f: impl Fn(DualNumber) -> DualNumber, x: f64) -> f64 {
    f(DualNumber::variable(x, 0)).derivative(0)
}

/// Runs `steps` iterations of `x -= step_size * f'(x)`.
///
/// Returns every visited point, starting with `x0`.
pub fn descend(x0: f64, steps: usize, step_size: f64, derivative: impl Fn(f64) -> f64) -> Vec<f64> {
    let mut path = Vec::with_capacity(steps + 1);
    let mut x = x0;
    path.push(x);
    for _ in 0..steps {
        x -= derivative(x) * step_size;
        path.push(x);
    }
    path
}

/// `F(x) = G(H(I(x)))` and its derivative by the chain rule.
pub mod chain {
    /// `G(x) = x^2`
    pub fn g(x: f64) -> f64 {
        x * x
    }

    pub fn g_derivative(x: f64) -> f64 {
        2.0 * x
    }

    /// `H(x) = 3x + 5`
    pub fn h(x: f64) -> f64 {
        3.0 * x + 5.0
    }

    pub fn h_derivative(_x: f64) -> f64 {
        3.0
    }

    /// `I(x) = 0.9x + 5`
    pub fn i(x: f64) -> f64 {
        0.9 * x + 5.0
    }

    pub fn i_derivative(_x: f64) -> f64 {
        0.9
    }

    pub fn composed(x: f64) -> f64 {
        g(h(i(x)))
    }

    /// `G'(H(I(x))) * H'(I(x)) * I'(x)`
    pub fn composed_derivative(x: f64) -> f64 {
        let inner = i(x);
        let middle = h(inner);
        g_derivative(middle) * h_derivative(inner) * i_derivative(x)
    }

    /// Where `composed` is minimal.
    pub fn minimum() -> f64 {
        // 3(0.9x + 5) + 5 = 0
        -20.0 / 2.7
    }
}
