use mantissa::{EvalError, Parser};
use pretty_assertions::assert_eq;

fn parser(text: &str, vars: &str) -> Parser<f64> {
    let mut p: Parser<f64> = Parser::new();
    p.parse(text, vars).unwrap_or_else(|e| panic!("parse {text:?}: {e}"));
    p
}

#[test]
fn evaluation_is_deterministic() {
    let mut p = parser("sin(x) * exp(y) - x/y", "x,y");
    let a = p.eval(&[1.25, 0.5]);
    let b = p.eval(&[1.25, 0.5]);
    assert_eq!(a.to_bits(), b.to_bits());
}

#[test]
fn division_by_zero_latches() {
    let mut p = parser("1/0", "");
    p.eval(&[]);
    assert_eq!(p.last_eval_error(), EvalError::DivByZero);
    // The next successful evaluation clears the code.
    let mut p = parser("1/x", "x");
    p.eval(&[0.0]);
    assert_eq!(p.last_eval_error(), EvalError::DivByZero);
    p.eval(&[2.0]);
    assert_eq!(p.last_eval_error(), EvalError::None);
}

#[test]
fn untaken_branches_do_not_evaluate() {
    let mut p = parser("if(x>0, log(x), 0)", "x");
    assert_eq!(p.eval(&[0.0]), 0.0);
    assert_eq!(p.last_eval_error(), EvalError::None);
    // The then-branch still works and still errors when taken.
    assert!((p.eval(&[std::f64::consts::E]) - 1.0).abs() < 1e-12);
    p.eval(&[-1.0]);
    assert_eq!(p.last_eval_error(), EvalError::None, "else branch avoids log(-1)");
}

#[test]
fn domain_errors() {
    let cases = [
        ("sqrt(0-1)", EvalError::SqrtError),
        ("log(0)", EvalError::LogError),
        ("log(0-2)", EvalError::LogError),
        ("asin(2)", EvalError::TrigError),
        ("acos(0-2)", EvalError::TrigError),
        ("5 % 0", EvalError::DivByZero),
    ];
    for (text, expected) in cases {
        let mut p = parser(text, "");
        p.eval(&[]);
        assert_eq!(p.last_eval_error(), expected, "for {text}");
    }
}

#[test]
fn int_rounds_half_away_from_zero() {
    let mut p = parser("int(x)", "x");
    assert_eq!(p.eval(&[2.5]), 3.0);
    assert_eq!(p.eval(&[-2.5]), -3.0);
    assert_eq!(p.eval(&[2.4]), 2.0);
    assert_eq!(p.eval(&[-2.4]), -2.0);
}

#[test]
fn cbrt_of_negative_real_is_real() {
    let mut p = parser("cbrt(x)", "x");
    assert!((p.eval(&[-27.0]) + 3.0).abs() < 1e-12);
}

#[test]
fn comparison_truthiness() {
    let mut p = parser("(x > 1) + (x >= 1) + (x = 1)", "x");
    assert_eq!(p.eval(&[1.0]), 2.0);
    assert_eq!(p.eval(&[2.0]), 2.0);
    assert_eq!(p.eval(&[0.0]), 0.0);
}

#[test]
fn classical_logic_identities() {
    // Law of the excluded middle and non-contradiction on definite values.
    let mut p = parser("(x>0) | !(x>0)", "x");
    for v in [-3.0, 0.0, 7.5] {
        assert_eq!(p.eval(&[v]), 1.0);
    }
    let mut p = parser("(x>0) & !(x>0)", "x");
    for v in [-3.0, 0.0, 7.5] {
        assert_eq!(p.eval(&[v]), 0.0);
    }
}

#[test]
fn truthiness_threshold_for_reals() {
    let mut p = parser("x & 1", "x");
    assert_eq!(p.eval(&[0.49]), 0.0);
    assert_eq!(p.eval(&[0.5]), 1.0);
    assert_eq!(p.eval(&[-0.6]), 1.0);
}

#[test]
fn unary_and_modulo() {
    let mut p = parser("-x % 3", "x");
    assert_eq!(p.eval(&[7.0]), -1.0);
    let mut p = parser("!(x-x)", "x");
    assert_eq!(p.eval(&[5.0]), 1.0);
}

#[test]
fn units_and_constants_compose() {
    let mut p: Parser<f64> = Parser::new();
    p.add_constant("tau", std::f64::consts::TAU).unwrap();
    p.add_unit("percent", 0.01).unwrap();
    p.parse("50percent * tau", "").unwrap();
    assert!((p.eval(&[]) - std::f64::consts::PI).abs() < 1e-12);
}

#[test]
fn nested_sub_parsers_evaluate() {
    let mut inner: Parser<f64> = Parser::new();
    inner.parse("a * 2", "a").unwrap();
    let mut outer: Parser<f64> = Parser::new();
    outer.add_parser("double", inner).unwrap();
    outer.parse("double(double(x))", "x").unwrap();
    assert_eq!(outer.eval(&[3.0]), 12.0);
    assert_eq!(outer.last_eval_error(), EvalError::None);
}

#[test]
fn recursion_limit_reports_max_recursion() {
    // Registration clones, so each nesting level is its own instance; give
    // every level a small depth bound and stack them past it.
    let mut chain: Parser<f64> = Parser::new();
    chain.parse("x*2", "x").unwrap();
    chain.set_max_recursion_depth(4);
    for _ in 0..8 {
        let mut next: Parser<f64> = Parser::new();
        next.add_parser("f", chain).unwrap();
        next.parse("f(x)", "x").unwrap();
        next.set_max_recursion_depth(4);
        chain = next;
    }
    chain.eval(&[1.0]);
    assert_eq!(chain.last_eval_error(), EvalError::MaxRecursion);
}

#[test]
fn whitespace_and_nesting() {
    let mut p = parser("  ( x +\n\t y ) * 2 ", "x,y");
    assert_eq!(p.eval(&[1.0, 2.0]), 6.0);
}
