//! Value-range analysis over CodeTrees.
//!
//! Bounds are computed on demand, compositionally; each bound is optional
//! (unknown). The results feed rewrite-rule guards and the logical-certainty
//! predicates. Soundness contract: whenever a bound is reported, every
//! defined evaluation of the node lies within it. For complex scalars the
//! analysis only knows immediates that lie on the real axis.

use crate::{opcode::Opcode, optimizer::codetree::CodeTree, scalar::Scalar};

#[derive(Clone, Debug)]
pub(crate) struct ValueRange<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: Scalar> ValueRange<T> {
    pub fn unknown() -> Self {
        Self { min: None, max: None }
    }

    pub fn exact(v: T) -> Self {
        Self {
            min: Some(v.clone()),
            max: Some(v),
        }
    }

    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    fn logical() -> Self {
        Self::new(Some(T::zero()), Some(T::one()))
    }

    /// Maps the range through `|x|`.
    fn set_abs(&mut self) {
        let has_negative = self.min.as_ref().is_none_or(|m| m.strict_lt(&T::zero()));
        let has_positive = self.max.as_ref().is_none_or(|m| T::zero().strict_lt(m));
        let new_max = match (&self.min, &self.max) {
            (Some(lo), Some(hi)) => {
                let (a, b) = (lo.abs(), hi.abs());
                Some(if a.strict_lt(&b) { b } else { a })
            }
            _ => None,
        };
        let new_min = if has_negative && has_positive {
            Some(T::zero())
        } else {
            match (&self.min, &self.max) {
                (Some(lo), Some(hi)) => {
                    let (a, b) = (lo.abs(), hi.abs());
                    Some(if a.strict_lt(&b) { a } else { b })
                }
                (Some(lo), None) => Some(lo.abs()),
                (None, Some(hi)) => Some(hi.abs()),
                (None, None) => None,
            }
        };
        self.min = new_min;
        self.max = new_max;
    }

    /// Maps the range through `-x`.
    fn set_neg(&mut self) {
        let min = self.min.take();
        let max = self.max.take();
        self.min = max.map(|v| v.neg());
        self.max = min.map(|v| v.neg());
    }

    /// Maps through `1/x`; only sound when the range does not cross zero.
    fn set_inv(&mut self) {
        let crosses = match (&self.min, &self.max) {
            (Some(lo), Some(hi)) => lo.strict_lt(&T::zero()) && T::zero().strict_lt(hi),
            _ => true,
        };
        if crosses {
            *self = Self::unknown();
            return;
        }
        let (lo, hi) = (self.min.take(), self.max.take());
        self.min = hi.map(|v| T::one().div(&v));
        self.max = lo.map(|v| T::one().div(&v));
    }

    /// True when the whole range is provably non-negative.
    pub fn known_non_negative(&self) -> bool {
        self.min.as_ref().is_some_and(|m| !m.strict_lt(&T::zero()))
    }

    /// True when the whole range is provably non-positive.
    pub fn known_non_positive(&self) -> bool {
        self.max.as_ref().is_some_and(|m| !T::zero().strict_lt(m))
    }
}

fn add_ranges<T: Scalar>(a: &ValueRange<T>, b: &ValueRange<T>) -> ValueRange<T> {
    ValueRange::new(
        match (&a.min, &b.min) {
            (Some(x), Some(y)) => Some(x.add(y)),
            _ => None,
        },
        match (&a.max, &b.max) {
            (Some(x), Some(y)) => Some(x.add(y)),
            _ => None,
        },
    )
}

fn mul_ranges<T: Scalar>(a: &ValueRange<T>, b: &ValueRange<T>) -> ValueRange<T> {
    // Fully known intervals combine by endpoint products; otherwise the only
    // retained fact is non-negativity of both factors.
    if let (Some(al), Some(ah), Some(bl), Some(bh)) = (&a.min, &a.max, &b.min, &b.max) {
        let candidates = [al.mul(bl), al.mul(bh), ah.mul(bl), ah.mul(bh)];
        let mut lo = candidates[0].clone();
        let mut hi = candidates[0].clone();
        for c in &candidates[1..] {
            if c.strict_lt(&lo) {
                lo = c.clone();
            }
            if hi.strict_lt(c) {
                hi = c.clone();
            }
        }
        return ValueRange::new(Some(lo), Some(hi));
    }
    if a.known_non_negative() && b.known_non_negative() {
        let lo = match (&a.min, &b.min) {
            (Some(x), Some(y)) => Some(x.mul(y)),
            _ => Some(T::zero()),
        };
        return ValueRange::new(lo, None);
    }
    ValueRange::unknown()
}

/// Computes the value range of a subtree.
pub(crate) fn range_of<T: Scalar>(tree: &CodeTree<T>) -> ValueRange<T> {
    if T::IS_COMPLEX {
        return match tree.value() {
            Some(v) if v.imag() == T::zero() => ValueRange::exact(v.clone()),
            _ => ValueRange::unknown(),
        };
    }
    if let Some(v) = tree.value() {
        return ValueRange::exact(v.clone());
    }

    let signed_child = |i: usize| {
        let p = &tree.params[i];
        let mut r = range_of(&p.tree);
        if p.sign {
            match tree.op {
                Opcode::Add => r.set_neg(),
                Opcode::Mul => r.set_inv(),
                _ => r = ValueRange::unknown(),
            }
        }
        r
    };

    match tree.op {
        Opcode::Add => {
            let mut acc = ValueRange::exact(T::zero());
            for i in 0..tree.params.len() {
                acc = add_ranges(&acc, &signed_child(i));
            }
            acc
        }
        Opcode::Mul => {
            let mut acc = ValueRange::exact(T::one());
            for i in 0..tree.params.len() {
                acc = mul_ranges(&acc, &signed_child(i));
            }
            acc
        }
        Opcode::Abs => {
            let mut r = range_of(&tree.params[0].tree);
            r.set_abs();
            r
        }
        Opcode::Min => {
            let ranges: Vec<_> = tree.params.iter().map(|p| range_of(&p.tree)).collect();
            let max = ranges
                .iter()
                .filter_map(|r| r.max.clone())
                .reduce(|a, b| if b.strict_lt(&a) { b } else { a });
            let min = ranges
                .iter()
                .map(|r| r.min.clone())
                .collect::<Option<Vec<_>>>()
                .and_then(|mins| mins.into_iter().reduce(|a, b| if b.strict_lt(&a) { b } else { a }));
            ValueRange::new(min, max)
        }
        Opcode::Max => {
            let ranges: Vec<_> = tree.params.iter().map(|p| range_of(&p.tree)).collect();
            let min = ranges
                .iter()
                .filter_map(|r| r.min.clone())
                .reduce(|a, b| if a.strict_lt(&b) { b } else { a });
            let max = ranges
                .iter()
                .map(|r| r.max.clone())
                .collect::<Option<Vec<_>>>()
                .and_then(|maxes| maxes.into_iter().reduce(|a, b| if a.strict_lt(&b) { b } else { a }));
            ValueRange::new(min, max)
        }
        Opcode::If | Opcode::AbsIf => {
            let t = range_of(&tree.params[1].tree);
            let e = range_of(&tree.params[2].tree);
            ValueRange::new(
                match (t.min, e.min) {
                    (Some(a), Some(b)) => Some(if b.strict_lt(&a) { b } else { a }),
                    _ => None,
                },
                match (t.max, e.max) {
                    (Some(a), Some(b)) => Some(if a.strict_lt(&b) { b } else { a }),
                    _ => None,
                },
            )
        }

        Opcode::Sin | Opcode::Cos => ValueRange::new(Some(T::from_i64(-1)), Some(T::from_i64(1))),
        Opcode::Exp | Opcode::Exp2 => {
            let x = range_of(&tree.params[0].tree);
            let f = |v: &T| if tree.op == Opcode::Exp { v.exp() } else { v.exp2() };
            ValueRange::new(Some(x.min.as_ref().map(f).unwrap_or_else(T::zero)), x.max.as_ref().map(f))
        }
        Opcode::Sqrt => {
            let x = range_of(&tree.params[0].tree);
            let max = x.max.as_ref().filter(|m| !m.strict_lt(&T::zero())).map(Scalar::sqrt);
            let min = x
                .min
                .as_ref()
                .filter(|m| !m.strict_lt(&T::zero()))
                .map_or_else(T::zero, Scalar::sqrt);
            ValueRange::new(Some(min), max)
        }
        Opcode::RSqrt => ValueRange::new(Some(T::zero()), None),
        Opcode::Log | Opcode::Log2 | Opcode::Log10 => {
            let x = range_of(&tree.params[0].tree);
            let f = |v: &T| match tree.op {
                Opcode::Log => v.ln(),
                Opcode::Log2 => v.log2(),
                _ => v.log10(),
            };
            ValueRange::new(
                x.min.as_ref().filter(|m| T::zero().strict_lt(m)).map(f),
                x.max.as_ref().filter(|m| T::zero().strict_lt(m)).map(f),
            )
        }
        Opcode::Cosh => {
            let x = range_of(&tree.params[0].tree);
            let max = match (&x.min, &x.max) {
                (Some(lo), Some(hi)) => {
                    let (a, b) = (lo.cosh(), hi.cosh());
                    Some(if a.strict_lt(&b) { b } else { a })
                }
                _ => None,
            };
            ValueRange::new(Some(T::one()), max)
        }
        Opcode::Sinh => monotone(tree, Scalar::sinh),
        Opcode::Asinh => monotone(tree, Scalar::asinh),
        Opcode::Atanh => monotone(tree, Scalar::atanh),
        Opcode::Cbrt => monotone(tree, Scalar::cbrt),
        Opcode::Floor => monotone(tree, Scalar::floor),
        Opcode::Ceil => monotone(tree, Scalar::ceil),
        Opcode::Trunc => monotone(tree, Scalar::trunc),
        Opcode::Int => monotone(tree, Scalar::round_half_away),
        Opcode::Tanh => bounded_monotone(tree, Scalar::tanh, -1.0, 1.0),
        Opcode::Atan => bounded_monotone(tree, Scalar::atan, -std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2),
        Opcode::Asin => ValueRange::new(
            Some(T::from_f64(-std::f64::consts::FRAC_PI_2)),
            Some(T::from_f64(std::f64::consts::FRAC_PI_2)),
        ),
        Opcode::Acos => ValueRange::new(Some(T::zero()), Some(T::from_f64(std::f64::consts::PI))),
        Opcode::Atan2 | Opcode::Arg => ValueRange::new(
            Some(T::from_f64(-std::f64::consts::PI)),
            Some(T::from_f64(std::f64::consts::PI)),
        ),
        Opcode::Acosh => {
            let x = range_of(&tree.params[0].tree);
            ValueRange::new(
                Some(
                    x.min
                        .as_ref()
                        .filter(|m| !m.strict_lt(&T::one()))
                        .map_or_else(T::zero, Scalar::acosh),
                ),
                x.max.as_ref().filter(|m| !m.strict_lt(&T::one())).map(Scalar::acosh),
            )
        }
        Opcode::Hypot => ValueRange::new(Some(T::zero()), None),
        Opcode::Pow => {
            // Even integer exponents force a non-negative result.
            let exponent = &tree.params[1].tree;
            if exponent.value().is_some_and(Scalar::is_even_integer) {
                ValueRange::new(Some(T::zero()), None)
            } else if range_of(&tree.params[0].tree).known_non_negative() {
                ValueRange::new(Some(T::zero()), None)
            } else {
                ValueRange::unknown()
            }
        }

        op if op.is_logical() => ValueRange::logical(),

        _ => ValueRange::unknown(),
    }
}

fn monotone<T: Scalar>(tree: &CodeTree<T>, f: impl Fn(&T) -> T) -> ValueRange<T> {
    let x = range_of(&tree.params[0].tree);
    ValueRange::new(x.min.as_ref().map(&f), x.max.as_ref().map(&f))
}

fn bounded_monotone<T: Scalar>(tree: &CodeTree<T>, f: impl Fn(&T) -> T, lo: f64, hi: f64) -> ValueRange<T> {
    let x = range_of(&tree.params[0].tree);
    ValueRange::new(
        Some(x.min.as_ref().map(&f).unwrap_or_else(|| T::from_f64(lo))),
        Some(x.max.as_ref().map(&f).unwrap_or_else(|| T::from_f64(hi))),
    )
}

/// Whether every value in the range is truthy.
pub(crate) fn is_definitely_true<T: Scalar>(range: &ValueRange<T>, abs: bool) -> bool {
    if T::IS_INT {
        if range.min.as_ref().is_some_and(|m| m.greater_eq(&T::one())) {
            return true;
        }
        if !abs && range.max.as_ref().is_some_and(|m| m.less_eq(&T::from_i64(-1))) {
            return true;
        }
    } else {
        let half = T::from_f64(0.5);
        if range.min.as_ref().is_some_and(|m| m.greater_eq(&half)) {
            return true;
        }
        if !abs && range.max.as_ref().is_some_and(|m| m.less_eq(&half.neg())) {
            return true;
        }
    }
    false
}

/// Whether every value in the range is falsy.
pub(crate) fn is_definitely_false<T: Scalar>(range: &ValueRange<T>, abs: bool) -> bool {
    if T::IS_INT {
        if abs {
            return range.max.as_ref().is_some_and(|m| m.less(&T::one()));
        }
        range.min.as_ref().is_some_and(|m| m.greater(&T::from_i64(-1)))
            && range.max.as_ref().is_some_and(|m| m.less(&T::one()))
    } else {
        let half = T::from_f64(0.5);
        if abs {
            return range.max.as_ref().is_some_and(|m| m.less(&half));
        }
        range.min.as_ref().is_some_and(|m| m.greater(&half.neg()))
            && range.max.as_ref().is_some_and(|m| m.less(&half))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, program::Data};

    fn tree_of(text: &str, vars: &str) -> CodeTree<f64> {
        let mut data: Data<f64> = Data::default();
        let map = parse::parse_variable_list(vars).unwrap();
        data.variables_amount = map.len() as u32;
        let program = parse::compile(text, &map, &data, false).unwrap();
        data.program = program;
        crate::optimizer::codetree::build_tree(&data).unwrap()
    }

    #[test]
    fn sin_is_bounded() {
        let r = range_of(&tree_of("sin(x)", "x"));
        assert_eq!(r.min, Some(-1.0));
        assert_eq!(r.max, Some(1.0));
    }

    #[test]
    fn exp_is_non_negative() {
        let r = range_of(&tree_of("exp(x)", "x"));
        assert_eq!(r.min, Some(0.0));
        assert_eq!(r.max, None);
    }

    #[test]
    fn abs_crossing_zero() {
        let r = range_of(&tree_of("abs(sin(x))", "x"));
        assert_eq!(r.min, Some(0.0));
        assert_eq!(r.max, Some(1.0));
    }

    #[test]
    fn sum_of_bounded_terms() {
        let r = range_of(&tree_of("sin(x) + cos(x)", "x"));
        assert_eq!(r.min, Some(-2.0));
        assert_eq!(r.max, Some(2.0));
    }

    #[test]
    fn negated_child_flips_bounds() {
        let r = range_of(&tree_of("0 - exp(x)", "x"));
        assert_eq!(r.max, Some(0.0));
        assert_eq!(r.min, None);
    }

    #[test]
    fn certainty_predicates() {
        let two = ValueRange::exact(2.0_f64);
        assert!(is_definitely_true(&two, false));
        assert!(!is_definitely_false(&two, false));
        let tiny = ValueRange::new(Some(-0.1_f64), Some(0.2));
        assert!(is_definitely_false(&tiny, false));
    }

    #[test]
    fn even_power_is_non_negative() {
        let r = range_of(&tree_of("x^2", "x"));
        assert!(r.known_non_negative());
    }
}
