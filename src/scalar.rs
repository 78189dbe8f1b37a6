//! Numeric element type of the generic evaluator.
//!
//! [`Scalar`] is the capability set the network evaluator needs: the four
//! arithmetic operators, negation, construction from a constant, `exp`, and
//! fused multiply-add for dot products. It is implemented for `f64` (plain
//! evaluation) and [`DualNumber`] (evaluation that also carries the
//! derivative of every intermediate with respect to every weight).
//!
//! Each implementation also owns a per-thread [`Arena`] so that repeated
//! evaluations on one worker reuse the same buffer.

use std::cell::RefCell;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::thread::LocalKey;

use crate::arena::{Arena, Span};
use crate::dual::DualNumber;
use crate::error::GradResult;

/// Element type the evaluator can run on.
///
/// ```rust
/// use dualgrad::{DualNumber, Scalar};
///
/// fn square_plus_one<T: Scalar>(x: T) -> T {
///     x.clone() * x + 1.0
/// }
///
/// assert_eq!(square_plus_one(3.0_f64), 10.0);
///
/// let y = square_plus_one(DualNumber::variable(3.0, 0));
/// assert_eq!(y.real(), 10.0);
/// assert_eq!(y.derivative(0), 6.0);
/// ```
pub trait Scalar:
    Clone
    + Default
    + Debug
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    /// A constant with no derivative.
    fn from_f64(value: f64) -> Self;

    /// The real value.
    fn real(&self) -> f64;

    /// `e^self`.
    fn exp(&self) -> Self;

    /// Logistic sigmoid `1 / (1 + e^-self)`.
    fn sigmoid(&self) -> Self {
        Self::from_f64(1.0) / ((-self.clone()).exp() + 1.0)
    }

    /// Replaces `self` with its sigmoid.
    fn sigmoid_assign(&mut self) {
        *self = self.sigmoid();
    }

    /// Overwrites `self` with a constant, reusing any owned storage.
    fn assign_constant(&mut self, value: f64);

    /// `self += a * b`.
    fn mul_add(&mut self, a: &Self, b: &Self);

    /// `self += a * b` for a plain `b`.
    fn mul_add_real(&mut self, a: &Self, b: f64);

    /// Whether [`lift_weights`](Scalar::lift_weights) stores a copy of the
    /// weights in the arena.
    const LIFTS_WEIGHTS: bool;

    /// Copies the weights into `arena` in this type's representation.
    ///
    /// Returns `None` when the raw `f64` weights can be used directly.
    /// Dual numbers seed weight `i` as free variable `i`.
    fn lift_weights(weights: &[f64], arena: &mut Arena<Self>) -> GradResult<Option<Span>>;

    /// Runs `f` with this thread's arena for `Self`, reset and holding at
    /// least `capacity` elements.
    ///
    /// A nested call on the same thread gets a temporary arena instead.
    fn with_thread_arena<R>(capacity: usize, f: impl FnOnce(&mut Arena<Self>) -> R) -> R;
}

thread_local! {
    static F64_ARENA: RefCell<Arena<f64>> = RefCell::new(Arena::new(0));
    static DUAL_ARENA: RefCell<Arena<DualNumber>> = RefCell::new(Arena::new(0));
}

fn with_arena<T: Default, R>(
    key: &'static LocalKey<RefCell<Arena<T>>>,
    capacity: usize,
    f: impl FnOnce(&mut Arena<T>) -> R,
) -> R {
    key.with(|cell| match cell.try_borrow_mut() {
        Ok(mut arena) => {
            if arena.capacity() < capacity {
                log::debug!(
                    "provisioning {} arena: {} -> {} elements",
                    std::any::type_name::<T>(),
                    arena.capacity(),
                    capacity
                );
                *arena = Arena::new(capacity);
            }
            arena.reset();
            f(&mut arena)
        }
        Err(_) => {
            log::debug!(
                "nested {} arena use, allocating {} temporary elements",
                std::any::type_name::<T>(),
                capacity
            );
            f(&mut Arena::new(capacity))
        }
    })
}

impl Scalar for f64 {
    const LIFTS_WEIGHTS: bool = false;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn real(&self) -> f64 {
        *self
    }

    #[inline]
    fn exp(&self) -> Self {
        f64::exp(*self)
    }

    #[inline]
    fn assign_constant(&mut self, value: f64) {
        *self = value;
    }

    #[inline]
    fn mul_add(&mut self, a: &Self, b: &Self) {
        *self += a * b;
    }

    #[inline]
    fn mul_add_real(&mut self, a: &Self, b: f64) {
        *self += a * b;
    }

    fn lift_weights(_weights: &[f64], _arena: &mut Arena<Self>) -> GradResult<Option<Span>> {
        Ok(None)
    }

    fn with_thread_arena<R>(capacity: usize, f: impl FnOnce(&mut Arena<Self>) -> R) -> R {
        with_arena(&F64_ARENA, capacity, f)
    }
}

impl Scalar for DualNumber {
    const LIFTS_WEIGHTS: bool = true;

    #[inline]
    fn from_f64(value: f64) -> Self {
        DualNumber::constant(value)
    }

    #[inline]
    fn real(&self) -> f64 {
        DualNumber::real(self)
    }

    fn exp(&self) -> Self {
        DualNumber::exp(self)
    }

    fn sigmoid(&self) -> Self {
        DualNumber::sigmoid(self)
    }

    fn sigmoid_assign(&mut self) {
        let s = 1.0 / (1.0 + (-self.real()).exp());
        *self *= s * (1.0 - s);
        self.set_real(s);
    }

    #[inline]
    fn assign_constant(&mut self, value: f64) {
        DualNumber::assign_constant(self, value);
    }

    #[inline]
    fn mul_add(&mut self, a: &Self, b: &Self) {
        DualNumber::mul_add(self, a, b);
    }

    #[inline]
    fn mul_add_real(&mut self, a: &Self, b: f64) {
        DualNumber::mul_add_real(self, a, b);
    }

    fn lift_weights(weights: &[f64], arena: &mut Arena<Self>) -> GradResult<Option<Span>> {
        let span = arena.allocate(weights.len(), false)?;
        for (index, (slot, &w)) in arena.get_mut(span).iter_mut().zip(weights).enumerate() {
            slot.assign_variable(w, index);
        }
        Ok(Some(span))
    }

    fn with_thread_arena<R>(capacity: usize, f: impl FnOnce(&mut Arena<Self>) -> R) -> R {
        with_arena(&DUAL_ARENA, capacity, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid_agrees_across_types() {
        for x in [-4.0, -0.5, 0.0, 0.3, 2.5] {
            let plain = Scalar::sigmoid(&x);
            let dual = Scalar::sigmoid(&DualNumber::variable(x, 0));
            assert_relative_eq!(plain, dual.real(), epsilon = 1e-15);
            assert_relative_eq!(dual.derivative(0), plain * (1.0 - plain), epsilon = 1e-15);
        }
    }

    #[test]
    fn test_sigmoid_assign_in_place() {
        let mut d = DualNumber::variable(0.8, 4);
        let expected = DualNumber::sigmoid(&d);
        d.sigmoid_assign();
        assert_relative_eq!(d.real(), expected.real(), epsilon = 1e-15);
        assert_relative_eq!(d.derivative(4), expected.derivative(4), epsilon = 1e-15);

        let mut x = 0.8_f64;
        x.sigmoid_assign();
        assert_relative_eq!(x, expected.real(), epsilon = 1e-15);
    }

    #[test]
    fn test_lift_weights() {
        let weights = [0.5, -1.0, 2.0];

        let mut plain = Arena::<f64>::new(0);
        assert!(f64::lift_weights(&weights, &mut plain).unwrap().is_none());

        let mut arena = Arena::<DualNumber>::new(3);
        let span = DualNumber::lift_weights(&weights, &mut arena).unwrap().unwrap();
        for (i, w) in arena.get(span).iter().enumerate() {
            assert_eq!(w.real(), weights[i]);
            assert_eq!(w.derivative_range(), Some(i..=i));
            assert_eq!(w.derivative(i), 1.0);
        }
    }

    #[test]
    fn test_lift_weights_exhaustion() {
        let mut arena = Arena::<DualNumber>::new(2);
        assert!(DualNumber::lift_weights(&[1.0, 2.0, 3.0], &mut arena).is_err());
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_thread_arena_grows_and_resets() {
        let used = f64::with_thread_arena(16, |arena| {
            assert!(arena.capacity() >= 16);
            assert_eq!(arena.used(), 0);
            arena.allocate(10, true).unwrap();
            arena.used()
        });
        assert_eq!(used, 10);

        f64::with_thread_arena(4, |arena| {
            assert!(arena.capacity() >= 16);
            assert_eq!(arena.used(), 0);
        });
    }

    #[test]
    fn test_nested_thread_arena() {
        let inner = f64::with_thread_arena(4, |outer| {
            outer.allocate(4, true).unwrap();
            f64::with_thread_arena(2, |inner| inner.allocate(2, true).is_ok())
        });
        assert!(inner);
    }
}
