//! The public `Parser<T>` handle.
//!
//! A handle owns a shared, reference-counted data block (compiled program,
//! name table, callbacks) plus its private evaluation scratch. Cloning is
//! O(1) and shares the block; every mutating call un-shares it first, so
//! clones never observe each other's changes. Evaluation is allocation-free
//! once the scratch stack has grown to the compiled program's peak depth.

use std::sync::Arc;

use crate::{
    eval::{EvalError, run},
    names::{NameData, NameError},
    opcode::Opcode,
    optimizer::optimize_program,
    parse::{ParseError, compile, parse_variable_list},
    program::{Data, NativeFunc, NativeFunction},
    scalar::Scalar,
};

/// Compiles, optimizes and evaluates one mathematical expression.
///
/// ```
/// use mantissa::Parser;
///
/// let mut p: Parser<f64> = Parser::new();
/// p.parse("x^2 + 1", "x").unwrap();
/// p.optimize();
/// assert_eq!(p.eval(&[3.0]), 10.0);
/// ```
pub struct Parser<T: Scalar> {
    data: Arc<Data<T>>,
    stack: Vec<T>,
    eval_error: EvalError,
}

impl<T: Scalar> Default for Parser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> Clone for Parser<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            stack: Vec::new(),
            eval_error: EvalError::None,
        }
    }
}

impl<T: Scalar> Parser<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Data::default()),
            stack: Vec::new(),
            eval_error: EvalError::None,
        }
    }

    fn data_mut(&mut self) -> &mut Data<T> {
        Arc::make_mut(&mut self.data)
    }

    /// Compiles `function` against the comma-separated variable list.
    ///
    /// On failure the error (with its byte offset) is latched and also
    /// returned; the previously compiled program is discarded either way.
    pub fn parse(&mut self, function: &str, vars: &str) -> Result<(), ParseError> {
        self.parse_with_degrees(function, vars, false)
    }

    /// Like [`parse`](Self::parse); `use_degrees` makes trigonometric
    /// functions take and return degrees instead of radians.
    pub fn parse_with_degrees(&mut self, function: &str, vars: &str, use_degrees: bool) -> Result<(), ParseError> {
        let data = self.data_mut();
        data.reset_program();
        data.use_degrees = use_degrees;
        let result = parse_variable_list(vars).and_then(|map| {
            let program = compile(function, &map, data, use_degrees)?;
            Ok((map.len() as u32, program))
        });
        let data = self.data_mut();
        match result {
            Ok((variables_amount, program)) => {
                data.variables_amount = variables_amount;
                data.program = program;
                Ok(())
            }
            Err(e) => {
                data.parse_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// The latched parse error, if the last parse failed.
    pub fn last_parse_error(&self) -> Option<&ParseError> {
        self.data.parse_error.as_ref()
    }

    /// Evaluates the compiled expression. A value is always returned; error
    /// conditions are latched and readable through
    /// [`last_eval_error`](Self::last_eval_error).
    pub fn eval(&mut self, vars: &[T]) -> T {
        let mut stack = std::mem::take(&mut self.stack);
        let (value, err) = run(&self.data, &mut stack, vars, 0);
        self.stack = stack;
        self.eval_error = err;
        value
    }

    /// The error code latched by the most recent [`eval`](Self::eval).
    pub fn last_eval_error(&self) -> EvalError {
        self.eval_error
    }

    /// Runs the algebraic optimizer over the compiled program. A no-op when
    /// nothing is compiled or the program is already optimized.
    pub fn optimize(&mut self) {
        if self.data.program.is_empty() || self.data.optimized {
            return;
        }
        let data = self.data_mut();
        optimize_program(data);
        data.optimized = true;
    }

    /// Registers a named constant usable in subsequent parses.
    pub fn add_constant(&mut self, name: &str, value: T) -> Result<(), NameError> {
        self.data_mut().names.insert(name, NameData::Constant(value))
    }

    /// Registers a unit: an identifier usable as a postfix multiplier.
    pub fn add_unit(&mut self, name: &str, multiplier: T) -> Result<(), NameError> {
        self.data_mut().names.insert(name, NameData::Unit(multiplier))
    }

    /// Registers a native callback of fixed arity.
    pub fn add_function(&mut self, name: &str, func: NativeFunction<T>, arity: u8) -> Result<(), NameError> {
        let data = self.data_mut();
        let index = data.funcs.len() as u32;
        data.names.insert(name, NameData::Func { index })?;
        data.funcs.push(NativeFunc { func, arity });
        Ok(())
    }

    /// Registers another parser callable by name; its variable count is its
    /// arity. Calls recurse through the evaluator, bounded by
    /// [`set_max_recursion_depth`](Self::set_max_recursion_depth).
    pub fn add_parser(&mut self, name: &str, parser: Self) -> Result<(), NameError> {
        let data = self.data_mut();
        let index = data.parsers.len() as u32;
        data.names.insert(name, NameData::SubParser { index })?;
        data.parsers.push(parser);
        Ok(())
    }

    /// Removes a user-registered identifier. Returns whether it existed.
    /// Functions and sub-parsers keep their slot so compiled programs stay
    /// valid; only the name becomes free.
    pub fn remove_identifier(&mut self, name: &str) -> bool {
        self.data_mut().names.remove(name)
    }

    /// Bounds nested sub-parser calls; exceeding it latches
    /// [`EvalError::MaxRecursion`].
    pub fn set_max_recursion_depth(&mut self, depth: usize) {
        self.data_mut().max_recursion_depth = depth;
    }

    /// Writes a human-readable listing of the compiled bytecode.
    pub fn print_bytecode(&self, sink: &mut dyn std::fmt::Write) -> std::fmt::Result {
        crate::printer::print_program(&self.data.program, sink)
    }

    /// Number of variables the compiled expression takes.
    pub(crate) fn var_count(&self) -> usize {
        self.data.variables_amount as usize
    }

    /// Nested evaluation for `PCall`; allocates its own scratch.
    pub(crate) fn eval_nested(&self, vars: &[T], depth: usize) -> (T, EvalError) {
        let mut stack = Vec::new();
        run(&self.data, &mut stack, vars, depth)
    }

    /// Instruction count of the compiled program (diagnostics and tests).
    pub fn instruction_count(&self) -> usize {
        let code = &self.data.program.code;
        let mut n = 0;
        let mut ip = 0;
        while ip < code.len() {
            ip += 1 + Opcode::decode(code[ip]).map_or(0, Opcode::operand_words);
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_then_diverges() {
        let mut a: Parser<f64> = Parser::new();
        a.parse("x + 1", "x").unwrap();
        let mut b = a.clone();
        assert_eq!(b.eval(&[1.0]), 2.0);
        b.parse("x + 2", "x").unwrap();
        assert_eq!(b.eval(&[1.0]), 3.0);
        assert_eq!(a.eval(&[1.0]), 2.0, "original untouched by clone's re-parse");
    }

    #[test]
    fn eval_without_parse_latches_sentinel() {
        let mut p: Parser<f64> = Parser::new();
        assert_eq!(p.eval(&[]), 0.0);
        assert_eq!(p.last_eval_error(), EvalError::NoProgram);
    }

    #[test]
    fn failed_parse_discards_program() {
        let mut p: Parser<f64> = Parser::new();
        p.parse("x + 1", "x").unwrap();
        assert!(p.parse("x +", "x").is_err());
        assert!(p.last_parse_error().is_some());
        assert_eq!(p.eval(&[1.0]), 0.0);
        assert_eq!(p.last_eval_error(), EvalError::NoProgram);
    }

    #[test]
    fn constants_and_units() {
        let mut p: Parser<f64> = Parser::new();
        p.add_constant("pi", std::f64::consts::PI).unwrap();
        p.add_unit("km", 1000.0).unwrap();
        p.parse("2km + pi", "").unwrap();
        assert!((p.eval(&[]) - (2000.0 + std::f64::consts::PI)).abs() < 1e-12);
    }

    #[test]
    fn native_functions_are_callable() {
        fn sum3(args: &[f64]) -> f64 {
            args.iter().sum()
        }
        let mut p: Parser<f64> = Parser::new();
        p.add_function("sum3", sum3, 3).unwrap();
        p.parse("sum3(x, 2*x, 3)", "x").unwrap();
        assert_eq!(p.eval(&[1.0]), 6.0);
    }

    #[test]
    fn sub_parsers_recurse_with_bound() {
        let mut inner: Parser<f64> = Parser::new();
        inner.parse("a * 2", "a").unwrap();
        let mut outer: Parser<f64> = Parser::new();
        outer.add_parser("double", inner).unwrap();
        outer.parse("double(x) + 1", "x").unwrap();
        assert_eq!(outer.eval(&[4.0]), 9.0);
    }

    #[test]
    fn degree_mode_converts_angles() {
        let mut p: Parser<f64> = Parser::new();
        p.parse_with_degrees("sin(x)", "x", true).unwrap();
        assert!((p.eval(&[90.0]) - 1.0).abs() < 1e-12);
        let mut q: Parser<f64> = Parser::new();
        q.parse_with_degrees("asin(1)", "", true).unwrap();
        assert!((q.eval(&[]) - 90.0).abs() < 1e-12);
    }

    #[test]
    fn optimize_is_idempotent_in_effect() {
        let mut p: Parser<f64> = Parser::new();
        p.parse("sin(x)^2 + cos(x)^2", "x").unwrap();
        p.optimize();
        let first = p.eval(&[0.3]);
        let count = p.instruction_count();
        p.optimize();
        assert_eq!(p.eval(&[0.3]), first);
        assert_eq!(p.instruction_count(), count);
    }
}
