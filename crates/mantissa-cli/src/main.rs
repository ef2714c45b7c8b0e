use std::{env, process::ExitCode};

use mantissa::{EvalError, Parser};

const USAGE: &str = "usage: mantissa <expression> [variables] [values...]\n\
   e.g. mantissa 'sin(x)^2 + cos(x)^2' x 0.25\n\
        mantissa 'x^40' x 1.02 1.03 1.04";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(expression) = args.first() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let vars = args.get(1).map_or("", String::as_str);

    let mut parser: Parser<f64> = Parser::new();
    if let Err(err) = parser.parse(expression, vars) {
        eprintln!("error: {err}");
        eprintln!("  {expression}");
        eprintln!("  {}^", " ".repeat(err.offset));
        return ExitCode::FAILURE;
    }

    let mut listing = String::new();
    parser.print_bytecode(&mut listing).expect("writing to a String");
    println!("parsed bytecode:\n{listing}");

    parser.optimize();
    listing.clear();
    parser.print_bytecode(&mut listing).expect("writing to a String");
    println!("optimized bytecode:\n{listing}");

    let var_count = if vars.trim().is_empty() {
        0
    } else {
        vars.split(',').count()
    };
    let values: Vec<f64> = match args[2.min(args.len())..].iter().map(|v| v.parse()).collect() {
        Ok(values) => values,
        Err(err) => {
            eprintln!("error: bad value: {err}");
            return ExitCode::FAILURE;
        }
    };

    if var_count == 0 {
        report(&mut parser, &[]);
        return ExitCode::SUCCESS;
    }
    if values.is_empty() {
        return ExitCode::SUCCESS;
    }
    if values.len() % var_count != 0 {
        eprintln!("error: expected a multiple of {var_count} values, got {}", values.len());
        return ExitCode::FAILURE;
    }
    for point in values.chunks(var_count) {
        report(&mut parser, point);
    }
    ExitCode::SUCCESS
}

fn report(parser: &mut Parser<f64>, point: &[f64]) {
    let value = parser.eval(point);
    match parser.last_eval_error() {
        EvalError::None => println!("f({point:?}) = {value}"),
        err => println!("f({point:?}) = {value} [{err}]"),
    }
}
