//! The scalar abstraction the whole pipeline is generic over.
//!
//! Every instantiation of the library (parser, evaluator, optimizer) is
//! monomorphized over one [`Scalar`] type. The trait bundles arithmetic,
//! transcendental functions, epsilon-aware comparison, and the classification
//! predicates the optimizer's rewrite guards rely on. There is deliberately
//! no runtime dispatch between scalar types.

use std::fmt;

mod complex;
mod int;
mod real;

pub use complex::Complex64;
pub use real::{set_epsilon_f32, set_epsilon_f64};

/// Numeric type pluggable into the expression pipeline.
///
/// Implementations exist for `f64`, `f32`, `i64`, [`num_bigint::BigInt`] and
/// [`Complex64`]. Integer scalars return zero from transcendental functions
/// (those functions are not reachable through the parser for integer types,
/// which reject builtins lacking the `OK_FOR_INT` flag). Complex scalars skip
/// real-domain error checks entirely.
pub trait Scalar: Clone + PartialEq + fmt::Debug + fmt::Display + 'static {
    /// True for integer scalars: exact equality, zero epsilon, no
    /// transcendentals.
    const IS_INT: bool;
    /// True for complex scalars: unrestricted domains, componentwise
    /// equality, scalarized ordering.
    const IS_COMPLEX: bool;

    fn zero() -> Self;
    fn one() -> Self;
    fn from_i64(v: i64) -> Self;
    fn from_f64(v: f64) -> Self;

    /// Converts a rewrite-rule literal into this scalar type.
    ///
    /// Returns `None` when the constant is not exactly representable (for
    /// example `0.5` as an integer), in which case any rule carrying that
    /// literal simply never matches for this instantiation.
    fn from_const(v: f64) -> Option<Self>;

    /// Comparison tolerance; zero for integer scalars.
    fn epsilon() -> Self;

    /// Significant decimal digits carried by this type (0 for integers).
    fn precision_digits() -> u32;

    // -- arithmetic ---------------------------------------------------------

    fn add(&self, rhs: &Self) -> Self;
    fn sub(&self, rhs: &Self) -> Self;
    fn mul(&self, rhs: &Self) -> Self;
    fn div(&self, rhs: &Self) -> Self;
    fn rem(&self, rhs: &Self) -> Self;
    fn neg(&self) -> Self;
    fn abs(&self) -> Self;

    /// Exponentiation with the evaluator's special paths: exact binary
    /// exponentiation for long-integer exponents, `pow(1, y) = 1`, the
    /// best-effort negated-base form for negative real bases, and the
    /// `exp(y·log x)` route for complex values.
    fn pow(&self, rhs: &Self) -> Self;

    // -- transcendentals ----------------------------------------------------

    fn sin(&self) -> Self;
    fn cos(&self) -> Self;
    fn tan(&self) -> Self;
    fn asin(&self) -> Self;
    fn acos(&self) -> Self;
    fn atan(&self) -> Self;
    fn sinh(&self) -> Self;
    fn cosh(&self) -> Self;
    fn tanh(&self) -> Self;
    fn asinh(&self) -> Self;
    fn acosh(&self) -> Self;
    fn atanh(&self) -> Self;
    fn exp(&self) -> Self;
    fn exp2(&self) -> Self;
    fn ln(&self) -> Self;
    fn log2(&self) -> Self;
    fn log10(&self) -> Self;
    fn sqrt(&self) -> Self;
    fn cbrt(&self) -> Self;
    fn floor(&self) -> Self;
    fn ceil(&self) -> Self;
    fn trunc(&self) -> Self;
    /// Rounding for the `int()` builtin: half away from zero.
    fn round_half_away(&self) -> Self;
    /// `atan2(self, x)`; self is the y coordinate.
    fn atan2(&self, x: &Self) -> Self;
    fn hypot(&self, other: &Self) -> Self;

    // -- complex views (identity / zero on real and integer scalars) --------

    fn real(&self) -> Self {
        self.clone()
    }
    fn imag(&self) -> Self {
        Self::zero()
    }
    fn conj(&self) -> Self {
        self.clone()
    }
    /// Phase angle. For real scalars: 0 for non-negative values, pi for
    /// negative ones.
    fn arg(&self) -> Self;
    /// Builds a value from polar coordinates (magnitude, angle). For real
    /// scalars this is `magnitude * cos(angle)`.
    fn polar(magnitude: &Self, angle: &Self) -> Self;

    // -- comparison ---------------------------------------------------------

    /// Epsilon equality: exact for integers, `|a−b| ≤ ε` for floats,
    /// componentwise for complex.
    fn approx_eq(&self, rhs: &Self) -> bool;
    /// Epsilon strict less-than: `a < b − ε` for floats. Complex values are
    /// ordered by the sign-preserving squared magnitude.
    fn less(&self, rhs: &Self) -> bool;
    fn less_eq(&self, rhs: &Self) -> bool;
    fn greater(&self, rhs: &Self) -> bool {
        rhs.less(self)
    }
    fn greater_eq(&self, rhs: &Self) -> bool {
        rhs.less_eq(self)
    }
    /// Engine-internal strict total order with no epsilon; used for canonical
    /// sorting and min/max selection.
    fn strict_lt(&self, rhs: &Self) -> bool;

    // -- predicates ---------------------------------------------------------

    /// Truthiness: nonzero for integers, `|x| ≥ 0.5` for reals, the real
    /// component's test for complex values.
    fn truth(&self) -> bool;
    /// Truthiness for operands the optimizer proved non-negative.
    fn abs_truth(&self) -> bool;
    /// Whether the value is a mathematical integer.
    fn is_integer(&self) -> bool;
    fn is_even_integer(&self) -> bool {
        self.to_long().is_some_and(|v| v % 2 == 0)
    }
    fn is_odd_integer(&self) -> bool {
        self.to_long().is_some_and(|v| v % 2 != 0)
    }
    /// The value as an `i64` when it is one exactly ("long integer").
    fn to_long(&self) -> Option<i64>;
    fn is_long(&self) -> bool {
        self.to_long().is_some()
    }

    // -- optimizer support --------------------------------------------------

    /// Deterministic value hash for tree hashing. Exact bit patterns, not
    /// epsilon classes: equality used for hashing is exact by design.
    fn value_hash(&self) -> (u64, u64);

    // -- lexing -------------------------------------------------------------

    /// Parses a numeric literal at the start of `src`, returning the value
    /// and the number of bytes consumed. Syntax depends on the scalar:
    /// integers accept decimal and `0x…` hex; floats accept fraction and
    /// exponent; complex additionally accepts an `i`/`I` suffix.
    fn parse_literal(src: &str) -> Option<(Self, usize)>;
}

/// Length in bytes of a decimal float literal at the start of `src`:
/// digits, optional `.digits`, optional exponent. Returns `None` when no
/// digit is present before the dot/exponent.
pub(crate) fn scan_float(src: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < src.len() && src[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i;
    if i < src.len() && src[i] == b'.' {
        let mut j = i + 1;
        while j < src.len() && src[j].is_ascii_digit() {
            j += 1;
        }
        if j > i + 1 {
            i = j;
        } else if int_digits > 0 {
            // trailing dot as in "1." is accepted
            i = j;
        }
    }
    if int_digits == 0 && i == int_digits {
        return None;
    }
    if i < src.len() && (src[i] == b'e' || src[i] == b'E') {
        let mut j = i + 1;
        if j < src.len() && (src[j] == b'+' || src[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < src.len() && src[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    Some(i)
}

/// Length of a run of decimal digits at the start of `src`.
pub(crate) fn scan_digits(src: &[u8]) -> usize {
    src.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Length of a `0x…` hex literal (0 when absent), including the prefix.
pub(crate) fn scan_hex(src: &[u8]) -> usize {
    if src.len() < 3 || src[0] != b'0' || (src[1] != b'x' && src[1] != b'X') {
        return 0;
    }
    let digits = src[2..].iter().take_while(|b| b.is_ascii_hexdigit()).count();
    if digits == 0 { 0 } else { 2 + digits }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_scan_extents() {
        assert_eq!(scan_float(b"12.5e-3+x"), Some(7));
        assert_eq!(scan_float(b"7)"), Some(1));
        assert_eq!(scan_float(b"1."), Some(2));
        assert_eq!(scan_float(b".5"), Some(2));
        assert_eq!(scan_float(b"3e"), Some(1));
        assert_eq!(scan_float(b"e3"), None);
    }

    #[test]
    fn hex_scan_extents() {
        assert_eq!(scan_hex(b"0x1f"), 4);
        assert_eq!(scan_hex(b"0xg"), 0);
        assert_eq!(scan_hex(b"12"), 0);
    }

    #[test]
    fn f64_literals() {
        assert_eq!(f64::parse_literal("2.5*x"), Some((2.5, 3)));
        assert_eq!(f64::parse_literal("1e3"), Some((1000.0, 3)));
        assert!(f64::parse_literal("x").is_none());
    }

    #[test]
    fn i64_literals() {
        assert_eq!(i64::parse_literal("0xff"), Some((255, 4)));
        assert_eq!(i64::parse_literal("42*"), Some((42, 2)));
        assert!(i64::parse_literal("-3").is_none());
    }

    #[test]
    fn complex_literals() {
        assert_eq!(Complex64::parse_literal("3i"), Some((Complex64::new(0.0, 3.0), 2)));
        assert_eq!(Complex64::parse_literal("2.5"), Some((Complex64::new(2.5, 0.0), 3)));
    }

    #[test]
    fn long_integer_detection() {
        assert_eq!(40.0_f64.to_long(), Some(40));
        assert_eq!(40.5_f64.to_long(), None);
        assert!(6.0_f64.is_even_integer());
        assert!(7.0_f64.is_odd_integer());
    }
}
