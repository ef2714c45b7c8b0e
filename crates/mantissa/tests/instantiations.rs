use mantissa::{Complex64, EvalError, Parser};
use num_bigint::BigInt;

#[test]
fn f32_evaluates_with_wider_epsilon() {
    let mut p: Parser<f32> = Parser::new();
    p.parse("sin(x)^2 + cos(x)^2", "x").unwrap();
    p.optimize();
    assert!((p.eval(&[0.25_f32]) - 1.0).abs() < 1e-5);
}

#[test]
fn i64_polynomials_are_exact() {
    let mut p: Parser<i64> = Parser::new();
    p.parse("x*x*x - 2*x + 7", "x").unwrap();
    let mut o = p.clone();
    o.optimize();
    for x in [-5_i64, -1, 0, 3, 11] {
        let expected = x * x * x - 2 * x + 7;
        assert_eq!(p.eval(&[x]), expected);
        assert_eq!(o.eval(&[x]), expected);
    }
}

#[test]
fn i64_rejects_real_only_builtins_but_keeps_int_ones() {
    let mut p: Parser<i64> = Parser::new();
    assert!(p.parse("sqrt(x)", "x").is_err());
    p.parse("max(abs(x), min(x, 3))", "x").unwrap();
    assert_eq!(p.eval(&[-9]), 9);
}

#[test]
fn i64_division_by_zero() {
    let mut p: Parser<i64> = Parser::new();
    p.parse("x / y", "x,y").unwrap();
    assert_eq!(p.eval(&[10, 0]), 0);
    assert_eq!(p.last_eval_error(), EvalError::DivByZero);
    assert_eq!(p.eval(&[10, 3]), 3);
    assert_eq!(p.last_eval_error(), EvalError::None);
}

#[test]
fn bigint_arithmetic_has_no_overflow() {
    let mut p: Parser<BigInt> = Parser::new();
    p.parse("x^64 + 1", "x").unwrap();
    p.optimize();
    let value = p.eval(&[BigInt::from(2)]);
    assert_eq!(value, (BigInt::from(1) << 64_u32) + 1);
}

#[test]
fn bigint_literals_beyond_machine_range() {
    let mut p: Parser<BigInt> = Parser::new();
    p.parse("123456789012345678901234567890 * x", "x").unwrap();
    let value = p.eval(&[BigInt::from(10)]);
    assert_eq!(value.to_string(), "1234567890123456789012345678900");
}

#[test]
fn complex_exp_log_round_trip() {
    let mut p: Parser<Complex64> = Parser::new();
    p.parse("exp(log(x))", "x").unwrap();
    p.optimize();
    let z = Complex64::new(3.0, 4.0);
    let value = p.eval(&[z]);
    assert_eq!(p.last_eval_error(), EvalError::None);
    assert!((value.re - 3.0).abs() < 1e-12, "re = {}", value.re);
    assert!((value.im - 4.0).abs() < 1e-12, "im = {}", value.im);
}

#[test]
fn complex_literals_and_builtins() {
    let mut p: Parser<Complex64> = Parser::new();
    p.parse("real(x) + imag(x) * 1i", "x").unwrap();
    let z = Complex64::new(1.5, -2.5);
    let value = p.eval(&[z]);
    assert!((value.re - 1.5).abs() < 1e-12);
    assert!((value.im + 2.5).abs() < 1e-12);

    let mut p: Parser<Complex64> = Parser::new();
    p.parse("conj(x) * x", "x").unwrap();
    let value = p.eval(&[Complex64::new(3.0, 4.0)]);
    assert!((value.re - 25.0).abs() < 1e-12);
    assert!(value.im.abs() < 1e-12);
}

#[test]
fn complex_sqrt_has_no_domain_error() {
    let mut p: Parser<Complex64> = Parser::new();
    p.parse("sqrt(x)", "x").unwrap();
    let value = p.eval(&[Complex64::new(-4.0, 0.0)]);
    assert_eq!(p.last_eval_error(), EvalError::None);
    assert!(value.re.abs() < 1e-12 && (value.im - 2.0).abs() < 1e-12);
}

#[test]
fn complex_only_builtins_parse_for_complex() {
    let mut p: Parser<Complex64> = Parser::new();
    p.parse("polar(abs(x), arg(x))", "x").unwrap();
    let z = Complex64::new(1.0, 2.0);
    let value = p.eval(&[z]);
    assert!((value.re - 1.0).abs() < 1e-12);
    assert!((value.im - 2.0).abs() < 1e-12);
}

#[test]
fn complex_optimization_preserves_semantics() {
    let cases = ["x*x + x", "exp(x)*exp(x)", "sin(x)^2 + cos(x)^2", "x^3 * x^2"];
    let points = [
        Complex64::new(0.5, -1.25),
        Complex64::new(-2.0, 0.0),
        Complex64::new(0.0, 1.0),
    ];
    for text in cases {
        let mut plain: Parser<Complex64> = Parser::new();
        plain.parse(text, "x").unwrap();
        let mut opt = plain.clone();
        opt.optimize();
        for z in points {
            let a = plain.eval(&[z]);
            let b = opt.eval(&[z]);
            assert!(
                (a.re - b.re).abs() < 1e-9 && (a.im - b.im).abs() < 1e-9,
                "{text} at {z}: {a} vs {b}"
            );
        }
    }
}
