//! Compiled program representation and the shared, copy-on-write data block.
//!
//! A [`Data`] block holds everything a compiled expression needs at run time:
//! the bytecode, the literal pool, the user name table, registered callbacks
//! and sub-parsers, and the latched parse error. `Parser` handles share one
//! block through an `Arc`; any mutating call clones a shared block first
//! (`Arc::make_mut`), so construction-by-copy stays O(1).

use crate::{eval::EvalError, names::NameTable, parse::ParseError, parser::Parser, scalar::Scalar};

/// Default bound on nested sub-parser calls before `MaxRecursion` latches.
pub(crate) const DEFAULT_MAX_RECURSION_DEPTH: usize = 256;

/// A native callback registered with `add_function`.
pub type NativeFunction<T> = fn(&[T]) -> T;

#[derive(Clone, Copy)]
pub(crate) struct NativeFunc<T: Scalar> {
    pub func: NativeFunction<T>,
    pub arity: u8,
}

/// The linear stack-machine program: instruction words plus the literal pool
/// consumed in order by `Immed`, and the peak stack depth the evaluator
/// pre-allocates.
#[derive(Clone, Debug)]
pub(crate) struct Program<T> {
    pub code: Vec<u32>,
    pub immed: Vec<T>,
    pub stack_size: usize,
}

impl<T> Default for Program<T> {
    fn default() -> Self {
        Self {
            code: Vec::new(),
            immed: Vec::new(),
            stack_size: 0,
        }
    }
}

impl<T> Program<T> {
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// Shared state behind a `Parser` handle.
#[derive(Clone)]
pub(crate) struct Data<T: Scalar> {
    pub program: Program<T>,
    /// Number of variables the compiled expression takes.
    pub variables_amount: u32,
    pub names: NameTable<T>,
    pub funcs: Vec<NativeFunc<T>>,
    pub parsers: Vec<Parser<T>>,
    pub use_degrees: bool,
    /// Latched parse failure; cleared by the next successful parse.
    pub parse_error: Option<ParseError>,
    pub max_recursion_depth: usize,
    /// Set once the optimizer has run; makes `optimize()` idempotent.
    pub optimized: bool,
}

impl<T: Scalar> Default for Data<T> {
    fn default() -> Self {
        Self {
            program: Program::default(),
            variables_amount: 0,
            names: NameTable::default(),
            funcs: Vec::new(),
            parsers: Vec::new(),
            use_degrees: false,
            parse_error: None,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            optimized: false,
        }
    }
}

impl<T: Scalar> Data<T> {
    /// Resets compiled state before a new parse; the name table survives.
    pub fn reset_program(&mut self) {
        self.program = Program::default();
        self.variables_amount = 0;
        self.parse_error = None;
        self.optimized = false;
    }
}

/// Top-level error type combining both pipeline stages, for callers that
/// funnel everything through one `Result`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Parse(ParseError),
    Eval(EvalError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Eval(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        Self::Eval(e)
    }
}
