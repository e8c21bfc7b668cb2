//! Numeric types the sparse solver can operate on.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use num_complex::Complex64;

/// A scalar field usable as the value type of the sparse solver.
///
/// The solver only needs field arithmetic, a zero test and a magnitude that
/// can be compared to rank pivot candidates.
pub trait Field:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + 'static
{
    /// The additive identity.
    fn zero() -> Self;

    /// The multiplicative identity.
    fn one() -> Self;

    /// Lift a real number into the field.
    fn from_real(value: f64) -> Self;

    /// Magnitude used for pivot selection.
    fn magnitude(&self) -> f64;

    /// Check for an exact zero.
    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl Field for f64 {
    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn from_real(value: f64) -> Self {
        value
    }

    fn magnitude(&self) -> f64 {
        self.abs()
    }
}

impl Field for Complex64 {
    fn zero() -> Self {
        Complex64::new(0.0, 0.0)
    }

    fn one() -> Self {
        Complex64::new(1.0, 0.0)
    }

    fn from_real(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }

    /// |re| + |im|, which is cheaper than the modulus and ranks pivots just as well.
    fn magnitude(&self) -> f64 {
        self.re.abs() + self.im.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_field() {
        assert!(<f64 as Field>::zero().is_zero());
        assert_eq!((-3.0f64).magnitude(), 3.0);
        assert_eq!(<f64 as Field>::from_real(2.5), 2.5);
    }

    #[test]
    fn test_complex_magnitude() {
        let z = Complex64::new(-3.0, 4.0);
        assert_eq!(z.magnitude(), 7.0);
        assert!(!z.is_zero());
        assert!(<Complex64 as Field>::zero().is_zero());
    }
}
