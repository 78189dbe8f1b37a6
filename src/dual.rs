//! Sparse multivariate dual numbers for forward-mode autodiff.
//!
//! A [`DualNumber`] carries a real value together with its partial
//! derivatives with respect to any number of free variables (one per
//! network weight, tens of thousands of them). Only a contiguous index
//! range is stored:
//!
//! ```text
//! derivative index:   0 .. offset-1 | offset ........ offset+len-1 | ...
//! stored value:       implicit 0.0  | derivatives[0 .. len]          | implicit 0.0
//! ```
//!
//! Every operation produces a result whose range is the union of its
//! operands' ranges, then trims entries with `|d| <= ZERO_THRESHOLD` from
//! both ends of that range. Interior entries are never touched, and an
//! entry exceeding the threshold is never dropped.
//!
//! # Example
//!
//! ```rust
//! use dualgrad::DualNumber;
//!
//! // f(x, y) = x * y + x at (3, 4)
//! let x = DualNumber::variable(3.0, 0);
//! let y = DualNumber::variable(4.0, 1);
//! let f = &(&x * &y) + &x;
//!
//! assert_eq!(f.real(), 15.0);
//! assert_eq!(f.derivative(0), 5.0); // y + 1
//! assert_eq!(f.derivative(1), 3.0); // x
//! assert_eq!(f.derivative(7), 0.0); // outside the range
//! ```
//!
//! # Numeric Edge Cases
//!
//! Division by a zero real part is not trapped: it yields IEEE `inf`/`NaN`
//! exactly like `f64` division. Non-finite derivatives are never trimmed.

use std::fmt;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, RangeInclusive, Sub, SubAssign,
};

/// Magnitude at or below which edge derivatives are trimmed.
pub const ZERO_THRESHOLD: f64 = 1e-4;

/// A real value with a sparse, dynamically ranged vector of partials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DualNumber {
    real: f64,
    /// Derivative index of `derivatives[0]`. Meaningless when empty.
    offset: usize,
    derivatives: Vec<f64>,
}

impl DualNumber {
    /// A constant: every partial derivative is zero.
    #[inline]
    pub fn constant(real: f64) -> Self {
        Self {
            real,
            offset: 0,
            derivatives: Vec::new(),
        }
    }

    /// A free variable: `∂self/∂x[index] = 1`, all other partials zero.
    #[inline]
    pub fn variable(real: f64, index: usize) -> Self {
        Self {
            real,
            offset: index,
            derivatives: vec![1.0],
        }
    }

    /// Builds a dual number from an explicit dense range.
    ///
    /// `derivatives[k]` is the partial for index `min_index + k`. No
    /// trimming is applied.
    pub fn from_parts(real: f64, min_index: usize, derivatives: Vec<f64>) -> Self {
        Self {
            real,
            offset: min_index,
            derivatives,
        }
    }

    /// The real part.
    #[inline]
    pub fn real(&self) -> f64 {
        self.real
    }

    /// Overwrites the real part, keeping the derivatives.
    #[inline]
    pub fn set_real(&mut self, real: f64) {
        self.real = real;
    }

    /// Partial derivative for `index`; `0.0` outside the stored range.
    #[inline]
    pub fn derivative(&self, index: usize) -> f64 {
        index
            .checked_sub(self.offset)
            .and_then(|k| self.derivatives.get(k))
            .copied()
            .unwrap_or(0.0)
    }

    /// Writes one partial derivative, growing the range if needed.
    pub fn set_derivative(&mut self, index: usize, value: f64) {
        self.prepare(index, index);
        self.derivatives[index - self.offset] = value;
    }

    /// Lowest stored index, if any.
    #[inline]
    pub fn min_index(&self) -> Option<usize> {
        self.bounds().map(|(min, _)| min)
    }

    /// Highest stored index, if any.
    #[inline]
    pub fn max_index(&self) -> Option<usize> {
        self.bounds().map(|(_, max)| max)
    }

    /// The stored index range, `None` when all partials are zero.
    #[inline]
    pub fn derivative_range(&self) -> Option<RangeInclusive<usize>> {
        self.bounds().map(|(min, max)| min..=max)
    }

    /// Dense view of the stored range.
    #[inline]
    pub fn derivatives(&self) -> &[f64] {
        &self.derivatives
    }

    /// True if no partial derivative is stored.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.derivatives.is_empty()
    }

    /// Writes partials `0..out.len()` into `out`, zero outside the range.
    pub fn gradient_into(&self, out: &mut [f64]) {
        out.fill(0.0);
        if let Some((min, max)) = self.bounds() {
            if min >= out.len() {
                return;
            }
            let end = (max + 1).min(out.len());
            out[min..end].copy_from_slice(&self.derivatives[..end - min]);
        }
    }

    /// Dense partials for indices `0..len`.
    pub fn gradient(&self, len: usize) -> Vec<f64> {
        let mut out = vec![0.0; len];
        self.gradient_into(&mut out);
        out
    }

    /// Turns `self` into a constant, keeping the buffer's capacity.
    #[inline]
    pub fn assign_constant(&mut self, real: f64) {
        self.real = real;
        self.offset = 0;
        self.derivatives.clear();
    }

    /// Turns `self` into variable `index`, keeping the buffer's capacity.
    #[inline]
    pub fn assign_variable(&mut self, real: f64, index: usize) {
        self.real = real;
        self.offset = index;
        self.derivatives.clear();
        self.derivatives.push(1.0);
    }

    /// Trims edge entries with `|d| <= threshold`.
    ///
    /// Leaves the range empty if every entry is within the threshold.
    /// Values read back through [`derivative`](Self::derivative) for any
    /// entry exceeding the threshold are unchanged.
    pub fn shrink(&mut self, threshold: f64) {
        let keep = |d: &f64| !(d.abs() <= threshold);

        let Some(first) = self.derivatives.iter().position(keep) else {
            self.offset = 0;
            self.derivatives.clear();
            return;
        };
        let last = self.derivatives.iter().rposition(keep).unwrap_or(first);

        if first > 0 {
            self.derivatives.copy_within(first..=last, 0);
        }
        self.derivatives.truncate(last - first + 1);
        self.offset += first;
    }

    /// `self += a * b`, updating the derivatives in place.
    pub fn mul_add(&mut self, a: &DualNumber, b: &DualNumber) {
        self.real += a.real * b.real;

        let Some((min, max)) = union(a.bounds(), b.bounds()) else {
            return;
        };
        self.prepare(min, max);
        for i in min..=max {
            self.derivatives[i - self.offset] += a.real * b.derivative(i) + a.derivative(i) * b.real;
        }
        self.shrink(ZERO_THRESHOLD);
    }

    /// `self += a * b` for a plain scalar `b`.
    pub fn mul_add_real(&mut self, a: &DualNumber, b: f64) {
        self.real += a.real * b;

        let Some((min, max)) = a.bounds() else {
            return;
        };
        self.prepare(min, max);
        let base = min - self.offset;
        for (dst, src) in self.derivatives[base..].iter_mut().zip(&a.derivatives) {
            *dst += src * b;
        }
        self.shrink(ZERO_THRESHOLD);
    }

    /// `e^self`.
    pub fn exp(&self) -> Self {
        let e = self.real.exp();
        self.chain(e, e)
    }

    /// Natural logarithm.
    pub fn ln(&self) -> Self {
        self.chain(self.real.ln(), self.real.recip())
    }

    /// Square root.
    pub fn sqrt(&self) -> Self {
        let s = self.real.sqrt();
        self.chain(s, 0.5 / s)
    }

    /// Integer power.
    pub fn powi(&self, n: i32) -> Self {
        self.chain(self.real.powi(n), f64::from(n) * self.real.powi(n - 1))
    }

    /// Sine.
    pub fn sin(&self) -> Self {
        self.chain(self.real.sin(), self.real.cos())
    }

    /// Cosine.
    pub fn cos(&self) -> Self {
        self.chain(self.real.cos(), -self.real.sin())
    }

    /// Hyperbolic tangent.
    pub fn tanh(&self) -> Self {
        let t = self.real.tanh();
        self.chain(t, 1.0 - t * t)
    }

    /// Logistic sigmoid `1 / (1 + e^-self)`.
    pub fn sigmoid(&self) -> Self {
        let s = 1.0 / (1.0 + (-self.real).exp());
        self.chain(s, s * (1.0 - s))
    }

    /// `1 / self`.
    pub fn recip(&self) -> Self {
        1.0 / self
    }

    #[inline]
    fn bounds(&self) -> Option<(usize, usize)> {
        if self.derivatives.is_empty() {
            None
        } else {
            Some((self.offset, self.offset + self.derivatives.len() - 1))
        }
    }

    /// Grows the stored range in place so it covers `[min, max]`.
    fn prepare(&mut self, min: usize, max: usize) {
        let Some((cur_min, cur_max)) = self.bounds() else {
            self.offset = min;
            self.derivatives.clear();
            self.derivatives.resize(max - min + 1, 0.0);
            return;
        };

        if min < cur_min {
            let shift = cur_min - min;
            let old_len = self.derivatives.len();
            self.derivatives.resize(old_len + shift, 0.0);
            self.derivatives.copy_within(0..old_len, shift);
            self.derivatives[..shift].fill(0.0);
            self.offset = min;
        }
        if max > cur_max {
            self.derivatives.resize(max - self.offset + 1, 0.0);
        }
    }

    /// `f(self)` given `f(real)` and `f'(real)`.
    fn chain(&self, value: f64, slope: f64) -> Self {
        self.map(value, |d| d * slope)
    }

    fn map(&self, real: f64, f: impl Fn(f64) -> f64) -> Self {
        let mut out = Self {
            real,
            offset: self.offset,
            derivatives: self.derivatives.iter().map(|&d| f(d)).collect(),
        };
        out.shrink(ZERO_THRESHOLD);
        out
    }

    fn zip(a: &Self, b: &Self, real: f64, f: impl Fn(f64, f64) -> f64) -> Self {
        let mut out = Self::constant(real);
        if let Some((min, max)) = union(a.bounds(), b.bounds()) {
            out.offset = min;
            out.derivatives = (min..=max)
                .map(|i| f(a.derivative(i), b.derivative(i)))
                .collect();
            out.shrink(ZERO_THRESHOLD);
        }
        out
    }

    /// `self += sign * rhs` on the derivatives, in place.
    fn accumulate(&mut self, rhs: &Self, sign: f64) {
        let Some((min, max)) = rhs.bounds() else {
            return;
        };
        self.prepare(min, max);
        let base = min - self.offset;
        for (dst, src) in self.derivatives[base..].iter_mut().zip(&rhs.derivatives) {
            *dst += sign * src;
        }
        self.shrink(ZERO_THRESHOLD);
    }

    fn scale_in_place(&mut self, factor: f64) {
        for d in &mut self.derivatives {
            *d *= factor;
        }
        self.shrink(ZERO_THRESHOLD);
    }
}

fn union(a: Option<(usize, usize)>, b: Option<(usize, usize)>) -> Option<(usize, usize)> {
    match (a, b) {
        (Some((a0, a1)), Some((b0, b1))) => Some((a0.min(b0), a1.max(b1))),
        (Some(r), None) | (None, Some(r)) => Some(r),
        (None, None) => None,
    }
}

impl From<f64> for DualNumber {
    fn from(real: f64) -> Self {
        Self::constant(real)
    }
}

impl fmt::Display for DualNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.real)?;
        if let Some((min, max)) = self.bounds() {
            write!(f, " + ε[{}..={}]{:?}", min, max, self.derivatives)?;
        }
        Ok(())
    }
}

// =============================================================================
// DualNumber (op) DualNumber
// =============================================================================

impl<'b> Add<&'b DualNumber> for &DualNumber {
    type Output = DualNumber;
    fn add(self, rhs: &'b DualNumber) -> DualNumber {
        DualNumber::zip(self, rhs, self.real + rhs.real, |ad, bd| ad + bd)
    }
}

impl<'b> Sub<&'b DualNumber> for &DualNumber {
    type Output = DualNumber;
    fn sub(self, rhs: &'b DualNumber) -> DualNumber {
        DualNumber::zip(self, rhs, self.real - rhs.real, |ad, bd| ad - bd)
    }
}

impl<'b> Mul<&'b DualNumber> for &DualNumber {
    type Output = DualNumber;
    fn mul(self, rhs: &'b DualNumber) -> DualNumber {
        let (ar, br) = (self.real, rhs.real);
        DualNumber::zip(self, rhs, ar * br, |ad, bd| ar * bd + ad * br)
    }
}

impl<'b> Div<&'b DualNumber> for &DualNumber {
    type Output = DualNumber;
    fn div(self, rhs: &'b DualNumber) -> DualNumber {
        let (ar, br) = (self.real, rhs.real);
        DualNumber::zip(self, rhs, ar / br, |ad, bd| (ad * br - ar * bd) / (br * br))
    }
}

impl Neg for &DualNumber {
    type Output = DualNumber;
    fn neg(self) -> DualNumber {
        DualNumber {
            real: -self.real,
            offset: self.offset,
            derivatives: self.derivatives.iter().map(|d| -d).collect(),
        }
    }
}

impl Neg for DualNumber {
    type Output = DualNumber;
    fn neg(mut self) -> DualNumber {
        self.real = -self.real;
        for d in &mut self.derivatives {
            *d = -*d;
        }
        self
    }
}

macro_rules! forward_owned_binop {
    ($($trait:ident :: $method:ident),*) => {$(
        impl $trait<DualNumber> for DualNumber {
            type Output = DualNumber;
            #[inline]
            fn $method(self, rhs: DualNumber) -> DualNumber {
                (&self).$method(&rhs)
            }
        }

        impl<'b> $trait<&'b DualNumber> for DualNumber {
            type Output = DualNumber;
            #[inline]
            fn $method(self, rhs: &'b DualNumber) -> DualNumber {
                (&self).$method(rhs)
            }
        }

        impl $trait<DualNumber> for &DualNumber {
            type Output = DualNumber;
            #[inline]
            fn $method(self, rhs: DualNumber) -> DualNumber {
                self.$method(&rhs)
            }
        }
    )*};
}

forward_owned_binop!(Add::add, Sub::sub, Mul::mul, Div::div);

impl<'b> AddAssign<&'b DualNumber> for DualNumber {
    fn add_assign(&mut self, rhs: &'b DualNumber) {
        self.real += rhs.real;
        self.accumulate(rhs, 1.0);
    }
}

impl<'b> SubAssign<&'b DualNumber> for DualNumber {
    fn sub_assign(&mut self, rhs: &'b DualNumber) {
        self.real -= rhs.real;
        self.accumulate(rhs, -1.0);
    }
}

impl<'b> MulAssign<&'b DualNumber> for DualNumber {
    fn mul_assign(&mut self, rhs: &'b DualNumber) {
        *self = &*self * rhs;
    }
}

impl<'b> DivAssign<&'b DualNumber> for DualNumber {
    fn div_assign(&mut self, rhs: &'b DualNumber) {
        *self = &*self / rhs;
    }
}

impl AddAssign for DualNumber {
    fn add_assign(&mut self, rhs: DualNumber) {
        *self += &rhs;
    }
}

impl SubAssign for DualNumber {
    fn sub_assign(&mut self, rhs: DualNumber) {
        *self -= &rhs;
    }
}

impl MulAssign for DualNumber {
    fn mul_assign(&mut self, rhs: DualNumber) {
        *self *= &rhs;
    }
}

impl DivAssign for DualNumber {
    fn div_assign(&mut self, rhs: DualNumber) {
        *self /= &rhs;
    }
}

// =============================================================================
// DualNumber (op) f64 and f64 (op) DualNumber
// =============================================================================

impl Add<f64> for DualNumber {
    type Output = DualNumber;
    fn add(mut self, rhs: f64) -> DualNumber {
        self.real += rhs;
        self
    }
}

impl Sub<f64> for DualNumber {
    type Output = DualNumber;
    fn sub(mut self, rhs: f64) -> DualNumber {
        self.real -= rhs;
        self
    }
}

impl Mul<f64> for DualNumber {
    type Output = DualNumber;
    fn mul(mut self, rhs: f64) -> DualNumber {
        self.real *= rhs;
        self.scale_in_place(rhs);
        self
    }
}

impl Div<f64> for DualNumber {
    type Output = DualNumber;
    fn div(mut self, rhs: f64) -> DualNumber {
        self.real /= rhs;
        for d in &mut self.derivatives {
            *d /= rhs;
        }
        self.shrink(ZERO_THRESHOLD);
        self
    }
}

impl Add<f64> for &DualNumber {
    type Output = DualNumber;
    fn add(self, rhs: f64) -> DualNumber {
        self.clone() + rhs
    }
}

impl Sub<f64> for &DualNumber {
    type Output = DualNumber;
    fn sub(self, rhs: f64) -> DualNumber {
        self.clone() - rhs
    }
}

impl Mul<f64> for &DualNumber {
    type Output = DualNumber;
    fn mul(self, rhs: f64) -> DualNumber {
        self.map(self.real * rhs, |d| d * rhs)
    }
}

impl Div<f64> for &DualNumber {
    type Output = DualNumber;
    fn div(self, rhs: f64) -> DualNumber {
        self.map(self.real / rhs, |d| d / rhs)
    }
}

impl Add<DualNumber> for f64 {
    type Output = DualNumber;
    fn add(self, rhs: DualNumber) -> DualNumber {
        rhs + self
    }
}

impl Add<&DualNumber> for f64 {
    type Output = DualNumber;
    fn add(self, rhs: &DualNumber) -> DualNumber {
        rhs + self
    }
}

impl Sub<DualNumber> for f64 {
    type Output = DualNumber;
    fn sub(self, rhs: DualNumber) -> DualNumber {
        -rhs + self
    }
}

impl Sub<&DualNumber> for f64 {
    type Output = DualNumber;
    fn sub(self, rhs: &DualNumber) -> DualNumber {
        -rhs + self
    }
}

impl Mul<DualNumber> for f64 {
    type Output = DualNumber;
    fn mul(self, rhs: DualNumber) -> DualNumber {
        rhs * self
    }
}

impl Mul<&DualNumber> for f64 {
    type Output = DualNumber;
    fn mul(self, rhs: &DualNumber) -> DualNumber {
        rhs * self
    }
}

impl Div<DualNumber> for f64 {
    type Output = DualNumber;
    fn div(self, rhs: DualNumber) -> DualNumber {
        self / &rhs
    }
}

impl Div<&DualNumber> for f64 {
    type Output = DualNumber;
    fn div(self, rhs: &DualNumber) -> DualNumber {
        let br = rhs.real;
        rhs.map(self / br, |bd| (-self * bd) / (br * br))
    }
}

impl AddAssign<f64> for DualNumber {
    fn add_assign(&mut self, rhs: f64) {
        self.real += rhs;
    }
}

impl SubAssign<f64> for DualNumber {
    fn sub_assign(&mut self, rhs: f64) {
        self.real -= rhs;
    }
}

impl MulAssign<f64> for DualNumber {
    fn mul_assign(&mut self, rhs: f64) {
        self.real *= rhs;
        self.scale_in_place(rhs);
    }
}

impl DivAssign<f64> for DualNumber {
    fn div_assign(&mut self, rhs: f64) {
        self.real /= rhs;
        self.scale_in_place(rhs.recip());
    }
}
