//! Integer scalars: machine `i64` and arbitrary-precision [`BigInt`].
//!
//! Integer instantiations compare exactly (epsilon is zero) and reject the
//! transcendental builtins at parse time; the trait methods for those return
//! zero so the uniform interface stays total.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};

use super::{Scalar, scan_digits, scan_hex};

/// Exponent cap for `BigInt` powers; beyond this the result would not fit in
/// memory for any interesting base, and the original big-integer backend
/// punts as well.
const BIGINT_POW_LIMIT: u64 = 1 << 20;

impl Scalar for i64 {
    const IS_INT: bool = true;
    const IS_COMPLEX: bool = false;

    fn zero() -> Self {
        0
    }
    fn one() -> Self {
        1
    }
    fn from_i64(v: i64) -> Self {
        v
    }
    fn from_f64(v: f64) -> Self {
        v as Self
    }
    fn from_const(v: f64) -> Option<Self> {
        if v.is_finite() && v.trunc() == v && (i64::MIN as f64..=i64::MAX as f64).contains(&v) {
            Some(v as Self)
        } else {
            None
        }
    }
    fn epsilon() -> Self {
        0
    }
    fn precision_digits() -> u32 {
        0
    }

    fn add(&self, rhs: &Self) -> Self {
        self.wrapping_add(*rhs)
    }
    fn sub(&self, rhs: &Self) -> Self {
        self.wrapping_sub(*rhs)
    }
    fn mul(&self, rhs: &Self) -> Self {
        self.wrapping_mul(*rhs)
    }
    fn div(&self, rhs: &Self) -> Self {
        // The evaluator checks for a zero divisor before dispatching here.
        self.checked_div(*rhs).unwrap_or(0)
    }
    fn rem(&self, rhs: &Self) -> Self {
        self.checked_rem(*rhs).unwrap_or(0)
    }
    fn neg(&self) -> Self {
        self.wrapping_neg()
    }
    fn abs(&self) -> Self {
        self.wrapping_abs()
    }

    fn pow(&self, rhs: &Self) -> Self {
        if *rhs < 0 {
            // Integer reciprocal: only ±1 survive.
            return match *self {
                1 => 1,
                -1 => {
                    if rhs % 2 == 0 {
                        1
                    } else {
                        -1
                    }
                }
                _ => 0,
            };
        }
        let mut result: Self = 1;
        let mut base = *self;
        let mut n = *rhs as u64;
        while n != 0 {
            if n & 1 != 0 {
                result = result.wrapping_mul(base);
                n -= 1;
            } else {
                base = base.wrapping_mul(base);
                n /= 2;
            }
        }
        result
    }

    fn sin(&self) -> Self {
        0
    }
    fn cos(&self) -> Self {
        0
    }
    fn tan(&self) -> Self {
        0
    }
    fn asin(&self) -> Self {
        0
    }
    fn acos(&self) -> Self {
        0
    }
    fn atan(&self) -> Self {
        0
    }
    fn sinh(&self) -> Self {
        0
    }
    fn cosh(&self) -> Self {
        0
    }
    fn tanh(&self) -> Self {
        0
    }
    fn asinh(&self) -> Self {
        0
    }
    fn acosh(&self) -> Self {
        0
    }
    fn atanh(&self) -> Self {
        0
    }
    fn exp(&self) -> Self {
        0
    }
    fn exp2(&self) -> Self {
        0
    }
    fn ln(&self) -> Self {
        0
    }
    fn log2(&self) -> Self {
        0
    }
    fn log10(&self) -> Self {
        0
    }
    fn sqrt(&self) -> Self {
        0
    }
    fn cbrt(&self) -> Self {
        0
    }
    fn floor(&self) -> Self {
        *self
    }
    fn ceil(&self) -> Self {
        *self
    }
    fn trunc(&self) -> Self {
        *self
    }
    fn round_half_away(&self) -> Self {
        *self
    }
    fn atan2(&self, _x: &Self) -> Self {
        0
    }
    fn hypot(&self, _other: &Self) -> Self {
        0
    }

    fn arg(&self) -> Self {
        0
    }
    fn polar(_magnitude: &Self, _angle: &Self) -> Self {
        0
    }

    fn approx_eq(&self, rhs: &Self) -> bool {
        self == rhs
    }
    fn less(&self, rhs: &Self) -> bool {
        self < rhs
    }
    fn less_eq(&self, rhs: &Self) -> bool {
        self <= rhs
    }
    fn strict_lt(&self, rhs: &Self) -> bool {
        self < rhs
    }

    fn truth(&self) -> bool {
        *self != 0
    }
    fn abs_truth(&self) -> bool {
        *self > 0
    }
    fn is_integer(&self) -> bool {
        true
    }
    fn to_long(&self) -> Option<i64> {
        Some(*self)
    }

    fn value_hash(&self) -> (u64, u64) {
        let bits = *self as u64;
        (bits, (!bits).wrapping_mul(3) ^ 0x12D6_87)
    }

    fn parse_literal(src: &str) -> Option<(Self, usize)> {
        let bytes = src.as_bytes();
        let hex = scan_hex(bytes);
        if hex > 0 {
            let value = Self::from_str_radix(&src[2..hex], 16).ok()?;
            return Some((value, hex));
        }
        let len = scan_digits(bytes);
        if len == 0 {
            return None;
        }
        let value: Self = src[..len].parse().ok()?;
        Some((value, len))
    }
}

impl Scalar for BigInt {
    const IS_INT: bool = true;
    const IS_COMPLEX: bool = false;

    fn zero() -> Self {
        Zero::zero()
    }
    fn one() -> Self {
        One::one()
    }
    fn from_i64(v: i64) -> Self {
        Self::from(v)
    }
    fn from_f64(v: f64) -> Self {
        Self::from(v as i64)
    }
    fn from_const(v: f64) -> Option<Self> {
        if v.is_finite() && v.trunc() == v && (i64::MIN as f64..=i64::MAX as f64).contains(&v) {
            Some(Self::from(v as i64))
        } else {
            None
        }
    }
    fn epsilon() -> Self {
        Zero::zero()
    }
    fn precision_digits() -> u32 {
        0
    }

    fn add(&self, rhs: &Self) -> Self {
        self + rhs
    }
    fn sub(&self, rhs: &Self) -> Self {
        self - rhs
    }
    fn mul(&self, rhs: &Self) -> Self {
        self * rhs
    }
    fn div(&self, rhs: &Self) -> Self {
        if rhs.is_zero() { Zero::zero() } else { self / rhs }
    }
    fn rem(&self, rhs: &Self) -> Self {
        if rhs.is_zero() { Zero::zero() } else { self % rhs }
    }
    fn neg(&self) -> Self {
        -self
    }
    fn abs(&self) -> Self {
        Signed::abs(self)
    }

    fn pow(&self, rhs: &Self) -> Self {
        let Some(n) = rhs.to_i64() else {
            return Zero::zero();
        };
        if n < 0 {
            return if Signed::abs(self) == One::one() {
                Scalar::pow(self, &Self::from(-n))
            } else {
                Zero::zero()
            };
        }
        let n = n as u64;
        if n > BIGINT_POW_LIMIT {
            return Zero::zero();
        }
        Pow::pow(self, n)
    }

    fn sin(&self) -> Self {
        Zero::zero()
    }
    fn cos(&self) -> Self {
        Zero::zero()
    }
    fn tan(&self) -> Self {
        Zero::zero()
    }
    fn asin(&self) -> Self {
        Zero::zero()
    }
    fn acos(&self) -> Self {
        Zero::zero()
    }
    fn atan(&self) -> Self {
        Zero::zero()
    }
    fn sinh(&self) -> Self {
        Zero::zero()
    }
    fn cosh(&self) -> Self {
        Zero::zero()
    }
    fn tanh(&self) -> Self {
        Zero::zero()
    }
    fn asinh(&self) -> Self {
        Zero::zero()
    }
    fn acosh(&self) -> Self {
        Zero::zero()
    }
    fn atanh(&self) -> Self {
        Zero::zero()
    }
    fn exp(&self) -> Self {
        Zero::zero()
    }
    fn exp2(&self) -> Self {
        Zero::zero()
    }
    fn ln(&self) -> Self {
        Zero::zero()
    }
    fn log2(&self) -> Self {
        Zero::zero()
    }
    fn log10(&self) -> Self {
        Zero::zero()
    }
    fn sqrt(&self) -> Self {
        Zero::zero()
    }
    fn cbrt(&self) -> Self {
        Zero::zero()
    }
    fn floor(&self) -> Self {
        self.clone()
    }
    fn ceil(&self) -> Self {
        self.clone()
    }
    fn trunc(&self) -> Self {
        self.clone()
    }
    fn round_half_away(&self) -> Self {
        self.clone()
    }
    fn atan2(&self, _x: &Self) -> Self {
        Zero::zero()
    }
    fn hypot(&self, _other: &Self) -> Self {
        Zero::zero()
    }

    fn arg(&self) -> Self {
        Zero::zero()
    }
    fn polar(_magnitude: &Self, _angle: &Self) -> Self {
        Zero::zero()
    }

    fn approx_eq(&self, rhs: &Self) -> bool {
        self == rhs
    }
    fn less(&self, rhs: &Self) -> bool {
        self < rhs
    }
    fn less_eq(&self, rhs: &Self) -> bool {
        self <= rhs
    }
    fn strict_lt(&self, rhs: &Self) -> bool {
        self < rhs
    }

    fn truth(&self) -> bool {
        !self.is_zero()
    }
    fn abs_truth(&self) -> bool {
        self.is_positive()
    }
    fn is_integer(&self) -> bool {
        true
    }
    fn is_even_integer(&self) -> bool {
        Integer::is_even(self)
    }
    fn is_odd_integer(&self) -> bool {
        Integer::is_odd(self)
    }
    fn to_long(&self) -> Option<i64> {
        self.to_i64()
    }

    fn value_hash(&self) -> (u64, u64) {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        let a = hasher.finish();
        (a, (!a).wrapping_mul(3) ^ 0x12D6_87)
    }

    fn parse_literal(src: &str) -> Option<(Self, usize)> {
        let bytes = src.as_bytes();
        let hex = scan_hex(bytes);
        if hex > 0 {
            let value = Self::parse_bytes(&bytes[2..hex], 16)?;
            return Some((value, hex));
        }
        let len = scan_digits(bytes);
        if len == 0 {
            return None;
        }
        let value = Self::parse_bytes(&bytes[..len], 10)?;
        Some((value, len))
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;

    #[test]
    fn i64_pow_matches_repeated_multiplication() {
        assert_eq!(Scalar::pow(&3_i64, &7), 2187);
        assert_eq!(Scalar::pow(&-2_i64, &3), -8);
        assert_eq!(Scalar::pow(&2_i64, &-1), 0);
        assert_eq!(Scalar::pow(&-1_i64, &-3), -1);
    }

    #[test]
    fn bigint_pow_is_exact() {
        let two = BigInt::from(2);
        let r = Scalar::pow(&two, &BigInt::from(100));
        assert_eq!(r.to_string(), "1267650600228229401496703205376");
    }

    #[test]
    fn bigint_literals_exceed_i64() {
        let (v, len) = BigInt::parse_literal("123456789012345678901234567890").unwrap();
        assert_eq!(len, 30);
        assert_eq!(v.to_string(), "123456789012345678901234567890");
    }

    #[test]
    fn integer_truthiness_is_nonzero() {
        assert!(1_i64.truth());
        assert!((-1_i64).truth());
        assert!(!0_i64.truth());
        assert!(!BigInt::from(0).truth());
    }
}
