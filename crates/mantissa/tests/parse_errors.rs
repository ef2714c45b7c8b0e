use mantissa::{ParseErrorKind, Parser};
use pretty_assertions::assert_eq;

fn kind_of(text: &str, vars: &str) -> (ParseErrorKind, usize) {
    let mut p: Parser<f64> = Parser::new();
    let err = p.parse(text, vars).expect_err("expected a parse error");
    (err.kind, err.offset)
}

#[test]
fn premature_end() {
    assert_eq!(kind_of("1 +", ""), (ParseErrorKind::PrematureEnd, 3));
    assert_eq!(kind_of("", ""), (ParseErrorKind::PrematureEnd, 0));
    assert_eq!(kind_of("(", ""), (ParseErrorKind::PrematureEnd, 1));
}

#[test]
fn parenthesis_errors() {
    assert_eq!(kind_of("(1", "").0, ParseErrorKind::MissingParenthesis);
    assert_eq!(kind_of("1)", ""), (ParseErrorKind::MismatchedParenthesis, 1));
    assert_eq!(kind_of("()", ""), (ParseErrorKind::EmptyParenthesis, 1));
    assert_eq!(kind_of("sin x", "x").0, ParseErrorKind::ExpectedParenthesis);
    assert_eq!(kind_of("min(1, 2", "").0, ParseErrorKind::MissingParenthesis);
}

#[test]
fn operator_errors() {
    assert_eq!(kind_of("x y", "x,y").0, ParseErrorKind::ExpectedOperator);
    assert_eq!(kind_of("1 2", "").0, ParseErrorKind::ExpectedOperator);
    assert_eq!(kind_of("x + $", "x").0, ParseErrorKind::InvalidChar);
    assert_eq!(kind_of("x + , y", "x,y").0, ParseErrorKind::InvalidChar);
}

#[test]
fn parameter_count_errors() {
    assert_eq!(kind_of("min(1)", "").0, ParseErrorKind::IllegalParameterCount);
    assert_eq!(kind_of("min(1, 2, 3)", "").0, ParseErrorKind::IllegalParameterCount);
    assert_eq!(kind_of("sin(1, 2)", "").0, ParseErrorKind::IllegalParameterCount);
    assert_eq!(kind_of("if(1, 2)", "").0, ParseErrorKind::IllegalParameterCount);
}

#[test]
fn unknown_identifiers_are_syntax_errors() {
    let (kind, offset) = kind_of("2 + nosuch", "");
    assert_eq!(kind, ParseErrorKind::SyntaxError);
    assert_eq!(offset, 4);
}

#[test]
fn invalid_variable_lists() {
    assert_eq!(kind_of("x", "2x").0, ParseErrorKind::InvalidVariableName);
    assert_eq!(kind_of("x", "x,x").0, ParseErrorKind::InvalidVariableName);
    assert_eq!(kind_of("x", "x,,y").0, ParseErrorKind::InvalidVariableName);
}

#[test]
fn utf8_identifiers_parse() {
    let mut p: Parser<f64> = Parser::new();
    p.parse("säde * 2", "säde").unwrap();
    assert_eq!(p.eval(&[2.0]), 4.0);
}

#[test]
fn error_state_is_latched_until_next_parse() {
    let mut p: Parser<f64> = Parser::new();
    assert!(p.parse("1 +", "").is_err());
    let latched = p.last_parse_error().expect("latched").clone();
    assert_eq!(latched.kind, ParseErrorKind::PrematureEnd);
    p.parse("1 + 1", "").unwrap();
    assert!(p.last_parse_error().is_none());
    assert_eq!(p.eval(&[]), 2.0);
}

#[test]
fn hex_literals_for_integer_scalars() {
    let mut p: Parser<i64> = Parser::new();
    p.parse("0xff + x", "x").unwrap();
    assert_eq!(p.eval(&[1]), 256);
}

#[test]
fn complex_suffix_rejected_for_reals() {
    // `3i` lexes as `3` then identifier `i`, which is unknown.
    let (kind, _) = kind_of("3i", "");
    assert_eq!(kind, ParseErrorKind::ExpectedOperator);
}
