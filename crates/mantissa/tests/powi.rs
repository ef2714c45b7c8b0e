//! Exhaustive check of the integer-power synthesizer across the table range.

use mantissa::{EvalError, Parser};

/// Reference: repeated multiplication of the base (or its reciprocal).
fn naive_pow(base: f64, n: i64) -> f64 {
    let factor = if n < 0 { 1.0 / base } else { base };
    let mut result = 1.0;
    for _ in 0..n.abs() {
        result *= factor;
    }
    result
}

#[test]
fn all_table_exponents_evaluate_correctly() {
    let bases = [1.02_f64, 0.87, -1.1, 2.0];
    for n in -255_i64..=255 {
        let mut p: Parser<f64> = Parser::new();
        p.parse(&format!("x^({n})"), "x").unwrap();
        p.optimize();
        for &b in &bases {
            let got = p.eval(&[b]);
            assert_eq!(p.last_eval_error(), EvalError::None, "n={n}, b={b}");
            let expected = naive_pow(b, n);
            let tolerance = expected.abs().max(1e-300) * 1e-10;
            assert!(
                (got - expected).abs() <= tolerance,
                "n={n}, b={b}: got {got:e}, expected {expected:e}"
            );
        }
    }
}

#[test]
fn zero_exponent_is_one() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("x^0", "x").unwrap();
    p.optimize();
    assert_eq!(p.eval(&[123.0]), 1.0);
}

#[test]
fn stack_shape_survives_surrounding_expression() {
    // The sequence must leave exactly one value regardless of context.
    let mut p: Parser<f64> = Parser::new();
    p.parse("y + x^13 * 2 - y", "x,y").unwrap();
    let mut o = p.clone();
    o.optimize();
    let a = p.eval(&[1.1, 42.0]);
    let b = o.eval(&[1.1, 42.0]);
    assert!((a - b).abs() < 1e-9, "{a} vs {b}");
}

#[test]
fn deep_exponents_fall_back_to_pow() {
    // Beyond the synthesis cap the generic opcode must still be correct.
    let mut p: Parser<f64> = Parser::new();
    p.parse("x^1000", "x").unwrap();
    p.optimize();
    let got = p.eval(&[1.001]);
    let expected = 1.001_f64.powi(1000);
    assert!((got / expected - 1.0).abs() < 1e-9);
}
