#![doc = include_str!("../../../README.md")]

mod eval;
mod names;
mod opcode;
mod optimizer;
mod parse;
mod parser;
mod printer;
mod program;
mod scalar;

pub use crate::{
    eval::EvalError,
    names::NameError,
    parse::{ParseError, ParseErrorKind},
    parser::Parser,
    program::{Error, NativeFunction},
    scalar::{Complex64, Scalar, set_epsilon_f32, set_epsilon_f64},
};
