//! Real floating-point scalars (`f64`, `f32`).
//!
//! The comparison epsilon is a per-type process-wide constant (1e-12 for
//! `f64`, 1e-5 for `f32`), overridable through [`set_epsilon_f64`] /
//! [`set_epsilon_f32`]. An atomic holding the bit pattern stands in for the
//! mutable static the equivalent C++ libraries use.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::{Scalar, scan_float};

static EPSILON_F64_BITS: AtomicU64 = AtomicU64::new(1e-12_f64.to_bits());
static EPSILON_F32_BITS: AtomicU32 = AtomicU32::new(1e-5_f32.to_bits());

/// Overrides the comparison epsilon used by every `Parser<f64>` in the
/// process. `Complex64` comparisons share this value.
pub fn set_epsilon_f64(epsilon: f64) {
    EPSILON_F64_BITS.store(epsilon.to_bits(), Ordering::Relaxed);
}

/// Overrides the comparison epsilon used by every `Parser<f32>`.
pub fn set_epsilon_f32(epsilon: f32) {
    EPSILON_F32_BITS.store(epsilon.to_bits(), Ordering::Relaxed);
}

pub(crate) fn epsilon_f64() -> f64 {
    f64::from_bits(EPSILON_F64_BITS.load(Ordering::Relaxed))
}

fn epsilon_f32() -> f32 {
    f32::from_bits(EPSILON_F32_BITS.load(Ordering::Relaxed))
}

/// Binary exponentiation, bit-identical to repeated multiplication.
pub(crate) fn powi_f64(mut x: f64, mut n: u64) -> f64 {
    let mut result = 1.0;
    while n != 0 {
        if n & 1 != 0 {
            result *= x;
            n -= 1;
        } else {
            x *= x;
            n /= 2;
        }
    }
    result
}

fn powi_f32(mut x: f32, mut n: u64) -> f32 {
    let mut result = 1.0;
    while n != 0 {
        if n & 1 != 0 {
            result *= x;
            n -= 1;
        } else {
            x *= x;
            n /= 2;
        }
    }
    result
}

macro_rules! impl_real_scalar {
    ($t:ty, $eps:expr, $digits:expr, $powi:ident, $pi:expr) => {
        impl Scalar for $t {
            const IS_INT: bool = false;
            const IS_COMPLEX: bool = false;

            fn zero() -> Self {
                0.0
            }
            fn one() -> Self {
                1.0
            }
            fn from_i64(v: i64) -> Self {
                v as Self
            }
            fn from_f64(v: f64) -> Self {
                v as Self
            }
            fn from_const(v: f64) -> Option<Self> {
                Some(v as Self)
            }
            fn epsilon() -> Self {
                $eps()
            }
            fn precision_digits() -> u32 {
                $digits
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
                self / rhs
            }
            fn rem(&self, rhs: &Self) -> Self {
                self % rhs
            }
            fn neg(&self) -> Self {
                -self
            }
            fn abs(&self) -> Self {
                (*self).abs()
            }

            fn pow(&self, rhs: &Self) -> Self {
                let x = *self;
                if x == 1.0 {
                    return 1.0;
                }
                // Long-integer exponents go through exact squaring so the
                // result matches repeated multiplication bit for bit.
                if let Some(n) = rhs.to_long() {
                    return if n >= 0 {
                        $powi(x, n as u64)
                    } else {
                        1.0 / $powi(x, n.unsigned_abs())
                    };
                }
                let y = *rhs;
                if y >= 0.0 {
                    if x > 0.0 {
                        return (x.ln() * y).exp();
                    }
                    if x == 0.0 {
                        return 0.0;
                    }
                    // Negative base, best effort: odd integer reciprocals
                    // (x^(1/5) and the like) yield the real negative root.
                    if !(y * 16.0).is_integer() {
                        return -((-x).ln() * y).exp();
                    }
                } else {
                    if x > 0.0 {
                        return ((1.0 / x).ln() * -y).exp();
                    }
                    if x < 0.0 && !(y * -16.0).is_integer() {
                        return -((-1.0 / x).ln() * -y).exp();
                    }
                }
                x.powf(y)
            }

            fn sin(&self) -> Self {
                (*self).sin()
            }
            fn cos(&self) -> Self {
                (*self).cos()
            }
            fn tan(&self) -> Self {
                (*self).tan()
            }
            fn asin(&self) -> Self {
                (*self).asin()
            }
            fn acos(&self) -> Self {
                (*self).acos()
            }
            fn atan(&self) -> Self {
                (*self).atan()
            }
            fn sinh(&self) -> Self {
                (*self).sinh()
            }
            fn cosh(&self) -> Self {
                (*self).cosh()
            }
            fn tanh(&self) -> Self {
                (*self).tanh()
            }
            fn asinh(&self) -> Self {
                (*self).asinh()
            }
            fn acosh(&self) -> Self {
                (*self).acosh()
            }
            fn atanh(&self) -> Self {
                (*self).atanh()
            }
            fn exp(&self) -> Self {
                (*self).exp()
            }
            fn exp2(&self) -> Self {
                (*self).exp2()
            }
            fn ln(&self) -> Self {
                (*self).ln()
            }
            fn log2(&self) -> Self {
                (*self).log2()
            }
            fn log10(&self) -> Self {
                (*self).log10()
            }
            fn sqrt(&self) -> Self {
                (*self).sqrt()
            }
            fn cbrt(&self) -> Self {
                (*self).cbrt()
            }
            fn floor(&self) -> Self {
                (*self).floor()
            }
            fn ceil(&self) -> Self {
                (*self).ceil()
            }
            fn trunc(&self) -> Self {
                (*self).trunc()
            }
            fn round_half_away(&self) -> Self {
                (*self).round()
            }
            fn atan2(&self, x: &Self) -> Self {
                (*self).atan2(*x)
            }
            fn hypot(&self, other: &Self) -> Self {
                (*self).hypot(*other)
            }

            fn arg(&self) -> Self {
                if *self < 0.0 { $pi } else { 0.0 }
            }
            fn polar(magnitude: &Self, angle: &Self) -> Self {
                magnitude * angle.cos()
            }

            fn approx_eq(&self, rhs: &Self) -> bool {
                (self - rhs).abs() <= Self::epsilon()
            }
            fn less(&self, rhs: &Self) -> bool {
                *self < rhs - Self::epsilon()
            }
            fn less_eq(&self, rhs: &Self) -> bool {
                *self <= rhs + Self::epsilon()
            }
            fn strict_lt(&self, rhs: &Self) -> bool {
                self < rhs
            }

            fn truth(&self) -> bool {
                (*self).abs() >= 0.5
            }
            fn abs_truth(&self) -> bool {
                *self >= 0.5
            }
            fn is_integer(&self) -> bool {
                self.is_finite() && (*self).trunc() == *self
            }
            fn to_long(&self) -> Option<i64> {
                if self.is_finite() && (*self).trunc() == *self {
                    let n = *self as i64;
                    if n as Self == *self { Some(n) } else { None }
                } else {
                    None
                }
            }

            fn value_hash(&self) -> (u64, u64) {
                // Normalize zero signs and NaN payloads so exactly-equal
                // values always hash alike.
                let canonical: Self = if *self == 0.0 {
                    0.0
                } else if self.is_nan() {
                    Self::NAN
                } else {
                    *self
                };
                let bits = canonical.to_bits() as u64;
                (bits, (!bits).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0x12D6_87)
            }

            fn parse_literal(src: &str) -> Option<(Self, usize)> {
                let len = scan_float(src.as_bytes())?;
                let value: Self = src[..len].parse().ok()?;
                Some((value, len))
            }
        }
    };
}

impl_real_scalar!(f64, epsilon_f64, 15, powi_f64, std::f64::consts::PI);
impl_real_scalar!(f32, epsilon_f32, 6, powi_f32, std::f32::consts::PI);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_long_exponent_matches_repeated_multiplication() {
        let mut expected = 1.0_f64;
        for _ in 0..40 {
            expected *= 1.02;
        }
        assert_eq!(Scalar::pow(&1.02_f64, &40.0), expected);
    }

    #[test]
    fn pow_negative_base_odd_root_is_real() {
        let r = Scalar::pow(&-32.0_f64, &0.2);
        assert!((r + 2.0).abs() < 1e-12);
    }

    #[test]
    fn pow_of_one_is_one() {
        assert_eq!(Scalar::pow(&1.0_f64, &f64::NAN), 1.0);
    }

    #[test]
    fn epsilon_comparisons() {
        assert!(1.0_f64.approx_eq(&(1.0 + 1e-13)));
        assert!(!1.0_f64.less(&(1.0 + 1e-13)));
        assert!(1.0_f64.less(&1.1));
    }

    #[test]
    fn truthiness_threshold() {
        assert!(0.5_f64.truth());
        assert!((-0.5_f64).truth());
        assert!(!0.49_f64.truth());
    }
}
