use mantissa::{EvalError, Parser};

fn listing(p: &Parser<f64>) -> String {
    let mut out = String::new();
    p.print_bytecode(&mut out).unwrap();
    out
}

fn count_lines(listing: &str, mnemonics: &[&str]) -> usize {
    listing
        .lines()
        .filter(|line| {
            mnemonics
                .iter()
                .any(|m| line.split(": ").nth(1).is_some_and(|rest| rest.split_whitespace().next() == Some(*m)))
        })
        .count()
}

/// Optimization must not change observable values anywhere in the domain.
#[test]
fn optimization_preserves_semantics() {
    let cases = [
        ("x + y*2 - x/4", "x,y"),
        ("sin(x)^2 + cos(x)^2 + tan(y)^2", "x,y"),
        ("((3*x^4-7*x^3+2*x*x-4*x+10) - (4*y^3+2*y^2-10*y+2))*10", "x,y"),
        ("if(x>y, sqrt(abs(x)), exp(y))", "x,y"),
        ("log(exp(x))*y", "x,y"),
        ("x^7 - y^12 + x^3*x^4", "x,y"),
        ("abs(x)^2 + abs(y^3 + 1)", "x,y"),
        ("min(x, y) * max(x, y)", "x,y"),
        ("hypot(x, y) + atan2(y, x)", "x,y"),
        ("(x+y)/(x-y+3.5)", "x,y"),
        ("cosh(x)^2 - sinh(x)^2 + y", "x,y"),
        ("sin(x)*cos(x) + sinh(y)*cosh(y)", "x,y"),
        ("x*3 + y*255", "x,y"),
        ("exp(x)*exp(y) + log2(x+4)*y", "x,y"),
        ("(x > 0) & !(y > 1) | (x = y)", "x,y"),
        ("2.5 + x % 3 - 0*y", "x,y"),
    ];
    let grid = [-2.0, -0.5, 0.25, 1.0, 3.75];
    for (text, vars) in cases {
        let mut plain: Parser<f64> = Parser::new();
        plain.parse(text, vars).unwrap_or_else(|e| panic!("parse {text:?}: {e}"));
        let mut optimized = plain.clone();
        optimized.optimize();
        for &x in &grid {
            for &y in &grid {
                let a = plain.eval(&[x, y]);
                let ae = plain.last_eval_error();
                let b = optimized.eval(&[x, y]);
                let be = optimized.last_eval_error();
                if ae != EvalError::None || be != EvalError::None {
                    continue; // outside the defined domain
                }
                let close = if a == 0.0 || b == 0.0 {
                    (a - b).abs() < 1e-9
                } else {
                    (a / b - 1.0).abs() < 1e-9
                };
                assert!(close, "{text} at ({x},{y}): plain={a}, optimized={b}");
            }
        }
    }
}

#[test]
fn optimizing_twice_changes_nothing_observable() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("sin(x)^2 + cos(x)^2 + x*x*x", "x").unwrap();
    p.optimize();
    let once = p.eval(&[1.3]);
    let listing_once = listing(&p);
    p.optimize();
    assert_eq!(p.eval(&[1.3]), once);
    assert_eq!(listing(&p), listing_once);
}

/// Scenario: the pythagorean identity collapses, the rest survives.
#[test]
fn pythagorean_scenario() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("sin(x)^2 + cos(x)^2 + tan(y)^2", "x,y").unwrap();
    let before = p.instruction_count();
    p.optimize();
    let after = p.instruction_count();
    assert!(after < before, "instruction count must shrink ({before} -> {after})");

    let out = listing(&p);
    assert_eq!(count_lines(&out, &["sin", "cos"]), 0, "no sin/cos left:\n{out}");

    let value = p.eval(&[0.25, 0.5]);
    assert_eq!(p.last_eval_error(), EvalError::None);
    assert!((value - (1.0 + 0.5_f64.tan().powi(2))).abs() < 1e-12);
}

/// Scenario: polynomial arithmetic stays exact.
#[test]
fn polynomial_scenario() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("((3*x^4-7*x^3+2*x*x-4*x+10) - (4*y^3+2*y^2-10*y+2))*10", "x,y")
        .unwrap();
    p.optimize();
    let value = p.eval(&[2.0, 1.0]);
    assert!((value - 20.0).abs() < 1e-12, "got {value}");
}

/// Scenario: x^40 lowers to a short squaring sequence.
#[test]
fn power_sequence_scenario() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("x^40", "x").unwrap();
    p.optimize();

    let out = listing(&p);
    let multiplicative = count_lines(&out, &["mul", "sqr", "dup", "fetch", "popnmov"]);
    assert!(multiplicative <= 12, "{multiplicative} multiplicative ops:\n{out}");
    assert_eq!(count_lines(&out, &["pow"]), 0, "no generic pow left:\n{out}");

    let value = p.eval(&[1.02]);
    let expected = 1.02_f64.powi(40);
    assert!((value - expected).abs() < 1e-9);
}

#[test]
fn sincos_contraction_scenario() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("sin(x)*cos(x)", "x").unwrap();
    p.optimize();
    let out = listing(&p);
    assert_eq!(count_lines(&out, &["sincos"]), 1, "{out}");
    assert_eq!(count_lines(&out, &["sin", "cos"]), 0, "{out}");
    let x = 0.9_f64;
    assert!((p.eval(&[x]) - x.sin() * x.cos()).abs() < 1e-12);
}

#[test]
fn fused_multiply_add_contraction() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("a*b + c*d - e", "a,b,c,d,e").unwrap();
    p.optimize();
    let out = listing(&p);
    assert!(count_lines(&out, &["fmma", "fms", "fma", "fmms"]) >= 1, "{out}");
    let value = p.eval(&[2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(value, 2.0 * 3.0 + 4.0 * 5.0 - 6.0);
}

#[test]
fn integer_scaling_via_add_sequence() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("3*x", "x").unwrap();
    p.optimize();
    let out = listing(&p);
    assert_eq!(count_lines(&out, &["mul"]), 0, "{out}");
    assert_eq!(p.eval(&[1.5]), 4.5);
}

#[test]
fn optimizer_survives_error_paths() {
    // A program whose domain errors must be preserved, not folded away.
    let mut p: Parser<f64> = Parser::new();
    p.parse("sqrt(0-4) + x", "x").unwrap();
    p.optimize();
    p.eval(&[1.0]);
    assert_eq!(p.last_eval_error(), EvalError::SqrtError);
}

#[test]
fn degree_mode_survives_optimization() {
    let mut p: Parser<f64> = Parser::new();
    p.parse_with_degrees("sin(x) + cos(x)", "x", true).unwrap();
    let mut o = p.clone();
    o.optimize();
    let a = p.eval(&[30.0]);
    let b = o.eval(&[30.0]);
    assert!((a - b).abs() < 1e-12);
    assert!((a - (0.5 + 0.75_f64.sqrt())).abs() < 1e-12);
}
