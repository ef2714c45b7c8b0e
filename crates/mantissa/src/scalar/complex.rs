//! Complex scalar built from two `f64` components.
//!
//! Ordering comparisons are defined through a sign-preserving squared
//! magnitude so that `<`/`>` stay transparent for purely real values without
//! ignoring the imaginary part; equality stays componentwise. Domains are
//! unrestricted: `sqrt`/`log` of any value are well defined, so the evaluator
//! raises no domain errors for this scalar.

use std::fmt;

use super::{Scalar, real::epsilon_f64, scan_float};

/// Complex number over `f64` components.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Complex64 {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn from_polar(rho: f64, theta: f64) -> Self {
        Self::new(rho * theta.cos(), rho * theta.sin())
    }

    fn norm_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    fn magnitude(self) -> f64 {
        self.re.hypot(self.im)
    }

    /// Sign-preserving squared magnitude, the scalar used for ordering.
    fn scalarize(self) -> f64 {
        let n = self.norm_sq();
        if self.re < 0.0 { -n } else { n }
    }

    fn mul_c(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }

    fn div_c(self, rhs: Self) -> Self {
        let d = rhs.norm_sq();
        Self::new(
            (self.re * rhs.re + self.im * rhs.im) / d,
            (self.im * rhs.re - self.re * rhs.im) / d,
        )
    }

    fn add_c(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }

    fn sub_c(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }

    fn scale(self, k: f64) -> Self {
        Self::new(self.re * k, self.im * k)
    }

    /// Multiplication by `i`.
    fn mul_i(self) -> Self {
        Self::new(-self.im, self.re)
    }

    fn is_real(self) -> bool {
        self.im == 0.0
    }
}

impl fmt::Display for Complex64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut re_buf = ryu::Buffer::new();
        if self.is_real() {
            f.write_str(re_buf.format(self.re))
        } else {
            let mut im_buf = ryu::Buffer::new();
            write!(f, "({},{})", re_buf.format(self.re), im_buf.format(self.im))
        }
    }
}

impl Scalar for Complex64 {
    const IS_INT: bool = false;
    const IS_COMPLEX: bool = true;

    fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
    fn one() -> Self {
        Self::new(1.0, 0.0)
    }
    fn from_i64(v: i64) -> Self {
        Self::new(v as f64, 0.0)
    }
    fn from_f64(v: f64) -> Self {
        Self::new(v, 0.0)
    }
    fn from_const(v: f64) -> Option<Self> {
        Some(Self::new(v, 0.0))
    }
    fn epsilon() -> Self {
        Self::new(epsilon_f64(), 0.0)
    }
    fn precision_digits() -> u32 {
        15
    }

    fn add(&self, rhs: &Self) -> Self {
        self.add_c(*rhs)
    }
    fn sub(&self, rhs: &Self) -> Self {
        self.sub_c(*rhs)
    }
    fn mul(&self, rhs: &Self) -> Self {
        self.mul_c(*rhs)
    }
    fn div(&self, rhs: &Self) -> Self {
        self.div_c(*rhs)
    }
    fn rem(&self, rhs: &Self) -> Self {
        Self::new(self.re % rhs.re, self.im % rhs.re)
    }
    fn neg(&self) -> Self {
        Self::new(-self.re, -self.im)
    }
    fn abs(&self) -> Self {
        Self::new(self.magnitude(), 0.0)
    }

    fn pow(&self, rhs: &Self) -> Self {
        // exp(y·log x) throughout, with a cheaper path when x is real: the
        // log of a real value is (ln|x|, arg(x)) with no atan2 involved.
        let t = if self.im == 0.0 {
            Self::new(self.re.abs().ln(), if self.re < 0.0 { std::f64::consts::PI } else { 0.0 })
        } else {
            Scalar::ln(self)
        };
        if rhs.im == 0.0 {
            Self::from_polar((rhs.re * t.re).exp(), rhs.re * t.im)
        } else {
            Scalar::exp(&rhs.mul_c(t))
        }
    }

    fn sin(&self) -> Self {
        Self::new(self.re.sin() * self.im.cosh(), self.re.cos() * self.im.sinh())
    }
    fn cos(&self) -> Self {
        Self::new(self.re.cos() * self.im.cosh(), -self.re.sin() * self.im.sinh())
    }
    fn tan(&self) -> Self {
        Scalar::sin(self).div_c(Scalar::cos(self))
    }
    fn asin(&self) -> Self {
        // -i·log(iz + sqrt(1 − z²))
        let z = *self;
        let root = Scalar::sqrt(&Self::one().sub_c(z.mul_c(z)));
        Scalar::ln(&z.mul_i().add_c(root)).mul_i().neg()
    }
    fn acos(&self) -> Self {
        Self::new(std::f64::consts::FRAC_PI_2, 0.0).sub_c(Scalar::asin(self))
    }
    fn atan(&self) -> Self {
        // (i/2)·(log(1 − iz) − log(1 + iz))
        let iz = self.mul_i();
        let diff = Scalar::ln(&Self::one().sub_c(iz)).sub_c(Scalar::ln(&Self::one().add_c(iz)));
        diff.mul_i().scale(0.5)
    }
    fn sinh(&self) -> Self {
        Self::new(self.re.sinh() * self.im.cos(), self.re.cosh() * self.im.sin())
    }
    fn cosh(&self) -> Self {
        Self::new(self.re.cosh() * self.im.cos(), self.re.sinh() * self.im.sin())
    }
    fn tanh(&self) -> Self {
        Scalar::sinh(self).div_c(Scalar::cosh(self))
    }
    fn asinh(&self) -> Self {
        let z = *self;
        Scalar::ln(&z.add_c(Scalar::sqrt(&z.mul_c(z).add_c(Self::one()))))
    }
    fn acosh(&self) -> Self {
        let z = *self;
        Scalar::ln(&z.add_c(Scalar::sqrt(&z.mul_c(z).sub_c(Self::one()))))
    }
    fn atanh(&self) -> Self {
        let z = *self;
        Scalar::ln(&Self::one().add_c(z).div_c(Self::one().sub_c(z))).scale(0.5)
    }
    fn exp(&self) -> Self {
        Self::from_polar(self.re.exp(), self.im)
    }
    fn exp2(&self) -> Self {
        Scalar::exp(&self.scale(std::f64::consts::LN_2))
    }
    fn ln(&self) -> Self {
        Self::new(self.norm_sq().ln() * 0.5, self.im.atan2(self.re))
    }
    fn log2(&self) -> Self {
        Scalar::ln(self).scale(std::f64::consts::LOG2_E)
    }
    fn log10(&self) -> Self {
        Scalar::ln(self).scale(std::f64::consts::LOG10_E)
    }
    fn sqrt(&self) -> Self {
        if self.re == 0.0 && self.im == 0.0 {
            return Self::zero();
        }
        let r = self.magnitude();
        let re = ((r + self.re) * 0.5).sqrt();
        let im = ((r - self.re) * 0.5).sqrt().copysign(self.im);
        Self::new(re, im)
    }
    fn cbrt(&self) -> Self {
        // Real inputs prefer the real root over the principal complex one.
        if self.is_real() {
            return Self::new(self.re.cbrt(), 0.0);
        }
        let t = Scalar::ln(self);
        Self::from_polar((t.re / 3.0).exp(), t.im / 3.0)
    }
    fn floor(&self) -> Self {
        Self::new(self.re.floor(), self.im.floor())
    }
    fn ceil(&self) -> Self {
        Self::new(self.re.ceil(), self.im.ceil())
    }
    fn trunc(&self) -> Self {
        Self::new(self.re.trunc(), self.im.trunc())
    }
    fn round_half_away(&self) -> Self {
        Self::new(self.re.round(), self.im.round())
    }
    fn atan2(&self, x: &Self) -> Self {
        if *self == Self::zero() {
            return Scalar::arg(x);
        }
        if *x == Self::zero() {
            return Self::new(-std::f64::consts::FRAC_PI_2, 0.0);
        }
        let base = Scalar::atan(&self.div_c(*x));
        if x.re < 0.0 {
            let correction = if self.re >= 0.0 {
                std::f64::consts::PI
            } else {
                -std::f64::consts::PI
            };
            base.add_c(Self::new(correction, 0.0))
        } else {
            base
        }
    }
    fn hypot(&self, other: &Self) -> Self {
        Scalar::sqrt(&self.mul_c(*self).add_c(other.mul_c(*other)))
    }

    fn real(&self) -> Self {
        Self::new(self.re, 0.0)
    }
    fn imag(&self) -> Self {
        Self::new(self.im, 0.0)
    }
    fn conj(&self) -> Self {
        Self::new(self.re, -self.im)
    }
    fn arg(&self) -> Self {
        Self::new(self.im.atan2(self.re), 0.0)
    }
    fn polar(magnitude: &Self, angle: &Self) -> Self {
        Self::from_polar(magnitude.re, angle.re)
    }

    fn approx_eq(&self, rhs: &Self) -> bool {
        let eps = epsilon_f64();
        (self.re - rhs.re).abs() <= eps && (self.im - rhs.im).abs() <= eps
    }
    fn less(&self, rhs: &Self) -> bool {
        self.scalarize() < rhs.scalarize() - epsilon_f64()
    }
    fn less_eq(&self, rhs: &Self) -> bool {
        self.scalarize() <= rhs.scalarize() + epsilon_f64()
    }
    fn strict_lt(&self, rhs: &Self) -> bool {
        let (a, b) = (self.scalarize(), rhs.scalarize());
        if a != b {
            return a < b;
        }
        let sign = |c: &Self| if c.re < 0.0 { -1.0 } else { 1.0 };
        sign(self) * self.im < sign(rhs) * rhs.im
    }

    fn truth(&self) -> bool {
        self.re.abs() >= 0.5
    }
    fn abs_truth(&self) -> bool {
        self.re >= 0.5
    }
    fn is_integer(&self) -> bool {
        self.is_real() && Scalar::is_integer(&self.re)
    }
    fn to_long(&self) -> Option<i64> {
        if self.is_real() { self.re.to_long() } else { None }
    }

    fn value_hash(&self) -> (u64, u64) {
        let (ra, rb) = self.re.value_hash();
        let (ia, ib) = self.im.value_hash();
        (ra ^ ib, rb ^ ia)
    }

    fn parse_literal(src: &str) -> Option<(Self, usize)> {
        let len = scan_float(src.as_bytes())?;
        let value: f64 = src[..len].parse().ok()?;
        let bytes = src.as_bytes();
        if len < bytes.len() && (bytes[len] == b'i' || bytes[len] == b'I') {
            Some((Self::new(0.0, value), len + 1))
        } else {
            Some((Self::new(value, 0.0), len))
        }
    }
}
