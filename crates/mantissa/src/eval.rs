//! The stack-machine evaluator.
//!
//! Executes a compiled program against a variable vector. Evaluation never
//! fails outright: a scalar result is always produced and the error code is
//! latched for `last_eval_error()`. The scratch stack is owned by the caller
//! and pre-sized from the program's recorded peak depth, so steady-state
//! evaluation does not allocate.

use std::fmt;

use crate::{
    opcode::{Opcode, VAR_BEGIN},
    program::Data,
    scalar::Scalar,
};

/// Latched evaluation error code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvalError {
    #[default]
    None,
    DivByZero,
    SqrtError,
    LogError,
    TrigError,
    MaxRecursion,
    /// Sentinel: no compiled program (parse failed or was never run), or the
    /// variable vector does not match the compiled variable count.
    NoProgram,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::None => "no error",
            Self::DivByZero => "division by zero",
            Self::SqrtError => "sqrt of a negative value",
            Self::LogError => "log of a non-positive value",
            Self::TrigError => "inverse trig argument out of domain",
            Self::MaxRecursion => "maximum recursion depth exceeded",
            Self::NoProgram => "no compiled expression",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for EvalError {}

/// Degrees-per-radian multiplier applied by `Deg`.
pub(crate) const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;
/// Radians-per-degree multiplier applied by `Rad`.
pub(crate) const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

macro_rules! bail {
    ($err:expr) => {
        return (T::zero(), $err)
    };
}

/// Runs the program in `data` and returns the result with the error code.
/// `depth` counts nested sub-parser calls for the recursion bound.
pub(crate) fn run<T: Scalar>(data: &Data<T>, stack: &mut Vec<T>, vars: &[T], depth: usize) -> (T, EvalError) {
    let program = &data.program;
    if program.is_empty() || vars.len() != data.variables_amount as usize {
        return (T::zero(), EvalError::NoProgram);
    }
    stack.clear();
    stack.reserve(program.stack_size);

    let code = &program.code;
    let immed = &program.immed;
    let zero = T::zero;
    let one = T::one;

    let mut ip = 0_usize;
    let mut dp = 0_usize;
    while ip < code.len() {
        let word = code[ip];
        if word >= VAR_BEGIN {
            stack.push(vars[(word - VAR_BEGIN) as usize].clone());
            ip += 1;
            continue;
        }
        let Some(op) = Opcode::decode(word) else {
            ip += 1;
            continue;
        };
        let mut next_ip = ip + 1 + op.operand_words();
        match op {
            Opcode::Immed => {
                stack.push(immed[dp].clone());
                dp += 1;
            }
            Opcode::Jump => {
                next_ip = code[ip + 1] as usize;
                dp = code[ip + 2] as usize;
            }
            Opcode::If | Opcode::AbsIf => {
                let cond = pop(stack);
                let truthy = if op == Opcode::If { cond.truth() } else { cond.abs_truth() };
                if !truthy {
                    next_ip = code[ip + 1] as usize;
                    dp = code[ip + 2] as usize;
                }
            }

            // -- arithmetic -------------------------------------------------
            Opcode::Add => binary(stack, |a, b| a.add(b)),
            Opcode::Sub => binary(stack, |a, b| a.sub(b)),
            Opcode::RSub => binary(stack, |a, b| b.sub(a)),
            Opcode::Mul => binary(stack, |a, b| a.mul(b)),
            Opcode::Div => {
                if stack.last().expect("divisor on stack") == &zero() {
                    bail!(EvalError::DivByZero);
                }
                binary(stack, |a, b| a.div(b));
            }
            Opcode::RDiv => {
                let b = pop(stack);
                let a = pop(stack);
                if a == zero() {
                    bail!(EvalError::DivByZero);
                }
                stack.push(b.div(&a));
            }
            Opcode::Mod => {
                if stack.last().expect("divisor on stack") == &zero() {
                    bail!(EvalError::DivByZero);
                }
                binary(stack, |a, b| a.rem(b));
            }
            Opcode::Neg => unary(stack, Scalar::neg),
            Opcode::Inv => {
                if stack.last().expect("operand on stack") == &zero() {
                    bail!(EvalError::DivByZero);
                }
                unary(stack, |x| one().div(x));
            }
            Opcode::Sqr => unary(stack, |x| x.mul(x)),
            Opcode::Abs => unary(stack, Scalar::abs),
            Opcode::Pow => binary(stack, Scalar::pow),
            Opcode::Fma => {
                let c = pop(stack);
                let b = pop(stack);
                let a = pop(stack);
                stack.push(a.mul(&b).add(&c));
            }
            Opcode::Fms => {
                let c = pop(stack);
                let b = pop(stack);
                let a = pop(stack);
                stack.push(a.mul(&b).sub(&c));
            }
            Opcode::Fmma => {
                let d = pop(stack);
                let c = pop(stack);
                let b = pop(stack);
                let a = pop(stack);
                stack.push(a.mul(&b).add(&c.mul(&d)));
            }
            Opcode::Fmms => {
                let d = pop(stack);
                let c = pop(stack);
                let b = pop(stack);
                let a = pop(stack);
                stack.push(a.mul(&b).sub(&c.mul(&d)));
            }

            // -- functions with domain checks -------------------------------
            Opcode::Sqrt => {
                let x = top(stack);
                if !T::IS_COMPLEX && x.strict_lt(&zero()) {
                    bail!(EvalError::SqrtError);
                }
                unary(stack, Scalar::sqrt);
            }
            Opcode::RSqrt => {
                let x = top(stack);
                if x == &zero() {
                    bail!(EvalError::DivByZero);
                }
                if !T::IS_COMPLEX && x.strict_lt(&zero()) {
                    bail!(EvalError::SqrtError);
                }
                unary(stack, |x| one().div(&x.sqrt()));
            }
            Opcode::Log | Opcode::Log2 | Opcode::Log10 => {
                let x = top(stack);
                if !T::IS_COMPLEX && !zero().strict_lt(x) {
                    bail!(EvalError::LogError);
                }
                match op {
                    Opcode::Log => unary(stack, Scalar::ln),
                    Opcode::Log2 => unary(stack, Scalar::log2),
                    _ => unary(stack, Scalar::log10),
                }
            }
            Opcode::Log2By => {
                let y = pop(stack);
                let x = pop(stack);
                if !T::IS_COMPLEX && !zero().strict_lt(&x) {
                    bail!(EvalError::LogError);
                }
                stack.push(x.log2().mul(&y));
            }
            Opcode::Asin | Opcode::Acos => {
                let x = top(stack);
                if !T::IS_COMPLEX && one().strict_lt(&x.abs()) {
                    bail!(EvalError::TrigError);
                }
                if op == Opcode::Asin {
                    unary(stack, Scalar::asin);
                } else {
                    unary(stack, Scalar::acos);
                }
            }
            Opcode::Acosh => {
                if !T::IS_COMPLEX && top(stack).strict_lt(&one()) {
                    bail!(EvalError::TrigError);
                }
                unary(stack, Scalar::acosh);
            }
            Opcode::Atanh => {
                if !T::IS_COMPLEX && !top(stack).abs().strict_lt(&one()) {
                    bail!(EvalError::TrigError);
                }
                unary(stack, Scalar::atanh);
            }

            // -- plain functions --------------------------------------------
            Opcode::Sin => unary(stack, Scalar::sin),
            Opcode::Cos => unary(stack, Scalar::cos),
            Opcode::Tan => unary(stack, Scalar::tan),
            Opcode::Atan => unary(stack, Scalar::atan),
            Opcode::Sinh => unary(stack, Scalar::sinh),
            Opcode::Cosh => unary(stack, Scalar::cosh),
            Opcode::Tanh => unary(stack, Scalar::tanh),
            Opcode::Asinh => unary(stack, Scalar::asinh),
            Opcode::Cot => {
                let x = pop(stack);
                let t = x.tan();
                if t == zero() {
                    bail!(EvalError::DivByZero);
                }
                stack.push(one().div(&t));
            }
            Opcode::Csc => {
                let x = pop(stack);
                let s = x.sin();
                if s == zero() {
                    bail!(EvalError::DivByZero);
                }
                stack.push(one().div(&s));
            }
            Opcode::Sec => {
                let x = pop(stack);
                let c = x.cos();
                if c == zero() {
                    bail!(EvalError::DivByZero);
                }
                stack.push(one().div(&c));
            }
            Opcode::Exp => unary(stack, Scalar::exp),
            Opcode::Exp2 => unary(stack, Scalar::exp2),
            Opcode::Cbrt => unary(stack, Scalar::cbrt),
            Opcode::Floor => unary(stack, Scalar::floor),
            Opcode::Ceil => unary(stack, Scalar::ceil),
            Opcode::Trunc => unary(stack, Scalar::trunc),
            Opcode::Int => unary(stack, Scalar::round_half_away),
            Opcode::Atan2 => {
                let x = pop(stack);
                let y = pop(stack);
                stack.push(y.atan2(&x));
            }
            Opcode::Hypot => binary(stack, Scalar::hypot),
            Opcode::Min => binary(stack, |a, b| if b.strict_lt(a) { b.clone() } else { a.clone() }),
            Opcode::Max => binary(stack, |a, b| if a.strict_lt(b) { b.clone() } else { a.clone() }),
            Opcode::Polar => {
                let angle = pop(stack);
                let magnitude = pop(stack);
                stack.push(T::polar(&magnitude, &angle));
            }
            Opcode::Arg => unary(stack, Scalar::arg),
            Opcode::Conj => unary(stack, Scalar::conj),
            Opcode::Real => unary(stack, Scalar::real),
            Opcode::Imag => unary(stack, Scalar::imag),

            Opcode::SinCos => {
                let x = pop(stack);
                stack.push(x.sin());
                stack.push(x.cos());
            }
            Opcode::SinhCosh => {
                let x = pop(stack);
                stack.push(x.sinh());
                stack.push(x.cosh());
            }

            Opcode::Deg => unary(stack, |x| x.mul(&T::from_f64(RAD_TO_DEG))),
            Opcode::Rad => unary(stack, |x| x.mul(&T::from_f64(DEG_TO_RAD))),

            // -- comparisons and logic --------------------------------------
            Opcode::Equal => compare(stack, |a, b| a.approx_eq(b)),
            Opcode::NEqual => compare(stack, |a, b| !a.approx_eq(b)),
            Opcode::Less => compare(stack, Scalar::less),
            Opcode::LessOrEq => compare(stack, Scalar::less_eq),
            Opcode::Greater => compare(stack, Scalar::greater),
            Opcode::GreaterOrEq => compare(stack, Scalar::greater_eq),
            Opcode::Not => unary(stack, |x| bool_value::<T>(!x.truth())),
            Opcode::NotNot => unary(stack, |x| bool_value::<T>(x.truth())),
            Opcode::AbsNot => unary(stack, |x| bool_value::<T>(!x.abs_truth())),
            Opcode::AbsNotNot => unary(stack, |x| bool_value::<T>(x.abs_truth())),
            Opcode::And => compare(stack, |a, b| a.truth() && b.truth()),
            Opcode::Or => compare(stack, |a, b| a.truth() || b.truth()),
            Opcode::AbsAnd => compare(stack, |a, b| a.abs_truth() && b.abs_truth()),
            Opcode::AbsOr => compare(stack, |a, b| a.abs_truth() || b.abs_truth()),

            // -- stack manipulation -----------------------------------------
            Opcode::Dup => {
                let top = stack.last().expect("dup needs a value").clone();
                stack.push(top);
            }
            Opcode::Fetch => {
                let idx = code[ip + 1] as usize;
                let fetched = stack[idx].clone();
                stack.push(fetched);
            }
            Opcode::PopNMov => {
                let dst = code[ip + 1] as usize;
                let src = code[ip + 2] as usize;
                stack[dst] = stack[src].clone();
                stack.truncate(dst + 1);
            }
            Opcode::Nop => {}

            // -- calls ------------------------------------------------------
            Opcode::FCall => {
                let funcno = code[ip + 1] as usize;
                let entry = &data.funcs[funcno];
                let at = stack.len() - usize::from(entry.arity);
                let result = (entry.func)(&stack[at..]);
                stack.truncate(at);
                stack.push(result);
            }
            Opcode::PCall => {
                let funcno = code[ip + 1] as usize;
                if depth + 1 > data.max_recursion_depth {
                    bail!(EvalError::MaxRecursion);
                }
                let sub = &data.parsers[funcno];
                let at = stack.len() - sub.var_count();
                let (result, err) = sub.eval_nested(&stack[at..], depth + 1);
                if err != EvalError::None {
                    bail!(err);
                }
                stack.truncate(at);
                stack.push(result);
            }

            Opcode::VarBegin => {}
        }
        ip = next_ip;
    }

    let result = stack.pop().unwrap_or_else(T::zero);
    (result, EvalError::None)
}

fn pop<T: Scalar>(stack: &mut Vec<T>) -> T {
    stack.pop().expect("operand on stack")
}

fn top<T: Scalar>(stack: &[T]) -> &T {
    stack.last().expect("operand on stack")
}

fn unary<T: Scalar>(stack: &mut [T], f: impl FnOnce(&T) -> T) {
    let x = stack.last_mut().expect("operand on stack");
    *x = f(x);
}

fn binary<T: Scalar>(stack: &mut Vec<T>, f: impl FnOnce(&T, &T) -> T) {
    let b = pop(stack);
    let a = stack.last_mut().expect("operand on stack");
    *a = f(a, &b);
}

fn compare<T: Scalar>(stack: &mut Vec<T>, f: impl FnOnce(&T, &T) -> bool) {
    let b = pop(stack);
    let a = stack.last_mut().expect("operand on stack");
    *a = bool_value::<T>(f(a, &b));
}

fn bool_value<T: Scalar>(v: bool) -> T {
    if v { T::one() } else { T::zero() }
}
