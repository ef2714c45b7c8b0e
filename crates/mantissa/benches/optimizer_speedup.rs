use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};
use mantissa::Parser;

/// Benchmarks evaluation of an expression, optionally optimized first.
///
/// The result is checked once up front so a miscompiled program fails the
/// benchmark rather than producing impressive nonsense numbers.
fn run_eval(bench: &mut Bencher, text: &str, vars: &str, point: &[f64], optimize: bool) {
    let mut p: Parser<f64> = Parser::new();
    p.parse(text, vars).unwrap();
    let expected = p.eval(point);
    if optimize {
        p.optimize();
        let optimized = p.eval(point);
        assert!(
            (optimized - expected).abs() <= expected.abs().max(1.0) * 1e-9,
            "optimization changed the result: {expected} vs {optimized}"
        );
    }

    bench.iter(|| {
        let value = p.eval(black_box(point));
        black_box(value);
    });
}

const POLYNOMIAL: &str = "((3*x^4-7*x^3+2*x*x-4*x+10) - (4*y^3+2*y^2-10*y+2))*10";
const TRIG: &str = "sin(x)^2 + cos(x)^2 + tan(y)^2";
const POWER: &str = "x^40 + y^255";

fn criterion_benchmark(c: &mut Criterion) {
    let point = [1.25_f64, 0.5];

    c.bench_function("polynomial__parsed", |b| {
        run_eval(b, POLYNOMIAL, "x,y", &point, false);
    });
    c.bench_function("polynomial__optimized", |b| {
        run_eval(b, POLYNOMIAL, "x,y", &point, true);
    });

    c.bench_function("trig_identity__parsed", |b| run_eval(b, TRIG, "x,y", &point, false));
    c.bench_function("trig_identity__optimized", |b| run_eval(b, TRIG, "x,y", &point, true));

    c.bench_function("integer_powers__parsed", |b| run_eval(b, POWER, "x,y", &point, false));
    c.bench_function("integer_powers__optimized", |b| {
        run_eval(b, POWER, "x,y", &point, true);
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
