//! Rewrite-rule data model and the curated rule tables.
//!
//! Rules are read-only static data: an input pattern (opcode plus matched
//! parameter list), and a replacement that either rebuilds the whole tree or
//! splices the matched parameters. Holders bind subtrees by index and match
//! later references through hash equality; `Rest` holders capture whatever
//! an `Any`-mode pattern did not consume. Constraints gate holders on value
//! class, proven sign, oneness, and constness.
//!
//! The tables are split into the three phases the fixpoint driver applies in
//! order. Rule literals are `f64` constants; scalars that cannot represent a
//! literal simply never match the rule carrying it.

use crate::opcode::Opcode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ValueClass {
    Any,
    EvenInt,
    OddInt,
    Int,
    NonInt,
    Logical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SignClass {
    Any,
    /// Range-proven non-negative.
    Positive,
    /// Range-proven non-positive.
    Negative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Oneness {
    Any,
    One,
    NotOne,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Constness {
    Any,
    Const,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Constraints {
    pub value: ValueClass,
    pub sign: SignClass,
    pub oneness: Oneness,
    pub constness: Constness,
}

pub(crate) const ANY: Constraints = Constraints {
    value: ValueClass::Any,
    sign: SignClass::Any,
    oneness: Oneness::Any,
    constness: Constness::Any,
};

const CONST: Constraints = Constraints {
    constness: Constness::Const,
    ..ANY
};

const ODD_CONST: Constraints = Constraints {
    value: ValueClass::OddInt,
    constness: Constness::Const,
    ..ANY
};

const EVEN_CONST: Constraints = Constraints {
    value: ValueClass::EvenInt,
    constness: Constness::Const,
    ..ANY
};

const INT_CONST: Constraints = Constraints {
    value: ValueClass::Int,
    constness: Constness::Const,
    ..ANY
};

const LOGICAL: Constraints = Constraints {
    value: ValueClass::Logical,
    ..ANY
};

const PROVEN_POSITIVE: Constraints = Constraints {
    sign: SignClass::Positive,
    ..ANY
};

const PROVEN_NEGATIVE: Constraints = Constraints {
    sign: SignClass::Negative,
    ..ANY
};

/// One matched-parameter specification.
#[derive(Debug)]
pub(crate) enum Spec {
    /// A specific numeric literal (epsilon-compared after conversion).
    Num(f64),
    /// A holder binding any subtree meeting the constraints.
    Hold(u8, Constraints),
    /// A nested function pattern.
    Func(&'static FnPattern),
    /// A value computed from bound holders at synthesis/match time.
    Group(Opcode, &'static [SpecParam]),
    /// Captures the remaining unmatched children (`Any` mode only).
    Rest(u8),
}

#[derive(Debug)]
pub(crate) struct SpecParam {
    pub spec: Spec,
    pub sign: bool,
}

/// Positional patterns match children exactly in order; `Any` patterns match
/// a subset in any order with backtracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Positional,
    Any,
}

#[derive(Debug)]
pub(crate) struct FnPattern {
    pub op: Opcode,
    pub mode: Mode,
    pub params: &'static [SpecParam],
}

#[derive(Debug)]
pub(crate) enum Replacement {
    /// Replace the whole matched tree.
    NewTree(&'static SpecParam),
    /// Delete the matched parameters and append these.
    Params(&'static [SpecParam]),
}

/// Scalar-type gate; the grammar of the original is likewise split into
/// per-type sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TypeReq {
    Any,
    /// Sound only where `abs`, `sqrt` and `log` have real semantics.
    NotComplex,
}

#[derive(Debug)]
pub(crate) struct Rule {
    pub input: FnPattern,
    pub repl: Replacement,
    pub req: TypeReq,
}

const fn p(spec: Spec) -> SpecParam {
    SpecParam { spec, sign: false }
}

const fn n(spec: Spec) -> SpecParam {
    SpecParam { spec, sign: true }
}

const fn hold(i: u8) -> Spec {
    Spec::Hold(i, ANY)
}

const fn rule(op: Opcode, mode: Mode, params: &'static [SpecParam], repl: Replacement) -> Rule {
    Rule {
        input: FnPattern { op, mode, params },
        repl,
        req: TypeReq::Any,
    }
}

const fn real_rule(op: Opcode, mode: Mode, params: &'static [SpecParam], repl: Replacement) -> Rule {
    Rule {
        input: FnPattern { op, mode, params },
        repl,
        req: TypeReq::NotComplex,
    }
}

// Shared sub-patterns.
static NOT_X: FnPattern = FnPattern {
    op: Opcode::Not,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static NOTNOT_X: FnPattern = FnPattern {
    op: Opcode::NotNot,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static ABSNOT_X: FnPattern = FnPattern {
    op: Opcode::AbsNot,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static ABSNOTNOT_X: FnPattern = FnPattern {
    op: Opcode::AbsNotNot,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static SIN_X: FnPattern = FnPattern {
    op: Opcode::Sin,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static COS_X: FnPattern = FnPattern {
    op: Opcode::Cos,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static SINH_X: FnPattern = FnPattern {
    op: Opcode::Sinh,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static COSH_X: FnPattern = FnPattern {
    op: Opcode::Cosh,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static SIN_SQUARED: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(Spec::Func(&SIN_X)), p(Spec::Num(2.0))],
};
static COS_SQUARED: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(Spec::Func(&COS_X)), p(Spec::Num(2.0))],
};
static SINH_SQUARED: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(Spec::Func(&SINH_X)), p(Spec::Num(2.0))],
};
static COSH_SQUARED: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(Spec::Func(&COSH_X)), p(Spec::Num(2.0))],
};
static EXP_X: FnPattern = FnPattern {
    op: Opcode::Exp,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static EXP_Y: FnPattern = FnPattern {
    op: Opcode::Exp,
    mode: Mode::Positional,
    params: &[p(hold(1))],
};
static LOG_X: FnPattern = FnPattern {
    op: Opcode::Log,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static LOG2_X: FnPattern = FnPattern {
    op: Opcode::Log2,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static SQRT_X: FnPattern = FnPattern {
    op: Opcode::Sqrt,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static ABS_X: FnPattern = FnPattern {
    op: Opcode::Abs,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static POW_X_CONST: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(Spec::Hold(1, CONST))],
};
static POW_X_ANY: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1))],
};
static POW_X_ODD: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(Spec::Hold(1, ODD_CONST))],
};
static POW_X_INT: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(Spec::Hold(1, INT_CONST))],
};
static POW_X_CONST2: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(Spec::Hold(2, CONST))],
};
static MUL_X_CONST: FnPattern = FnPattern {
    op: Opcode::Mul,
    mode: Mode::Any,
    params: &[p(hold(0)), p(Spec::Hold(1, CONST))],
};
static MUL_X_CONST2: FnPattern = FnPattern {
    op: Opcode::Mul,
    mode: Mode::Any,
    params: &[p(hold(0)), p(Spec::Hold(2, CONST))],
};
static MUL_PAIR_A: FnPattern = FnPattern {
    op: Opcode::Mul,
    mode: Mode::Any,
    params: &[p(hold(0)), p(hold(1))],
};
static MUL_PAIR_B: FnPattern = FnPattern {
    op: Opcode::Mul,
    mode: Mode::Any,
    params: &[p(hold(2)), p(hold(3))],
};
static EQUAL_XY: FnPattern = FnPattern {
    op: Opcode::Equal,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1))],
};
static NEQUAL_XY: FnPattern = FnPattern {
    op: Opcode::NEqual,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1))],
};
static GREATER_XY: FnPattern = FnPattern {
    op: Opcode::Greater,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1))],
};
static GREATER_EQ_XY: FnPattern = FnPattern {
    op: Opcode::GreaterOrEq,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1))],
};

/// Entry phase: logical lowering and double-negation cleanup.
pub(crate) static ENTRY_RULES: &[Rule] = &[
    rule(
        Opcode::Not,
        Mode::Positional,
        &[p(Spec::Func(&NOT_X))],
        Replacement::NewTree(&p(Spec::Func(&NOTNOT_X))),
    ),
    rule(
        Opcode::Not,
        Mode::Positional,
        &[p(Spec::Func(&NOTNOT_X))],
        Replacement::NewTree(&p(Spec::Func(&NOT_X))),
    ),
    rule(
        Opcode::Not,
        Mode::Positional,
        &[p(Spec::Func(&ABSNOT_X))],
        Replacement::NewTree(&p(Spec::Func(&ABSNOTNOT_X))),
    ),
    rule(
        Opcode::Not,
        Mode::Positional,
        &[p(Spec::Func(&ABSNOTNOT_X))],
        Replacement::NewTree(&p(Spec::Func(&ABSNOT_X))),
    ),
    rule(
        Opcode::NotNot,
        Mode::Positional,
        &[p(Spec::Hold(0, LOGICAL))],
        Replacement::NewTree(&p(hold(0))),
    ),
    rule(
        Opcode::AbsNotNot,
        Mode::Positional,
        &[p(Spec::Hold(0, LOGICAL))],
        Replacement::NewTree(&p(hold(0))),
    ),
    // Negated comparisons invert in place; operands swap where the canonical
    // direction demands it.
    rule(
        Opcode::Not,
        Mode::Positional,
        &[p(Spec::Func(&EQUAL_XY))],
        Replacement::NewTree(&p(Spec::Func(&NEQUAL_XY))),
    ),
    rule(
        Opcode::Not,
        Mode::Positional,
        &[p(Spec::Func(&NEQUAL_XY))],
        Replacement::NewTree(&p(Spec::Func(&EQUAL_XY))),
    ),
    rule(
        Opcode::Not,
        Mode::Positional,
        &[p(Spec::Func(&GREATER_XY))],
        Replacement::NewTree(&p(Spec::Func(&FLIPPED_GREATER_EQ))),
    ),
    rule(
        Opcode::Not,
        Mode::Positional,
        &[p(Spec::Func(&GREATER_EQ_XY))],
        Replacement::NewTree(&p(Spec::Func(&FLIPPED_GREATER))),
    ),
];

static FLIPPED_GREATER_EQ: FnPattern = FnPattern {
    op: Opcode::GreaterOrEq,
    mode: Mode::Positional,
    params: &[p(hold(1)), p(hold(0))],
};
static FLIPPED_GREATER: FnPattern = FnPattern {
    op: Opcode::Greater,
    mode: Mode::Positional,
    params: &[p(hold(1)), p(hold(0))],
};

// Replacement building blocks for the intermediate phase.
static MUL_X_2: FnPattern = FnPattern {
    op: Opcode::Mul,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(Spec::Num(2.0))],
};
static POW_X_2: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(Spec::Num(2.0))],
};
static MUL_X_GROUP_ADD_1: FnPattern = FnPattern {
    op: Opcode::Mul,
    mode: Mode::Positional,
    params: &[
        p(hold(0)),
        p(Spec::Group(Opcode::Add, &[p(hold(1)), p(Spec::Num(1.0))])),
    ],
};
static MUL_X_GROUP_ADD_12: FnPattern = FnPattern {
    op: Opcode::Mul,
    mode: Mode::Positional,
    params: &[
        p(hold(0)),
        p(Spec::Group(Opcode::Add, &[p(hold(1)), p(hold(2))])),
    ],
};
static ADD_EXPONENTS: FnPattern = FnPattern {
    op: Opcode::Add,
    mode: Mode::Positional,
    params: &[p(hold(1)), p(Spec::Num(1.0))],
};
static POW_X_EXP_PLUS_1: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(Spec::Func(&ADD_EXPONENTS))],
};
static POW_MERGED: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[
        p(hold(0)),
        p(Spec::Group(Opcode::Add, &[p(hold(1)), p(hold(2))])),
    ],
};
static POW_SCALED: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[
        p(hold(0)),
        p(Spec::Group(Opcode::Mul, &[p(hold(1)), p(Spec::Hold(2, CONST))])),
    ],
};
static ADD_XY: FnPattern = FnPattern {
    op: Opcode::Add,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1))],
};
static EXP_SUM: FnPattern = FnPattern {
    op: Opcode::Exp,
    mode: Mode::Positional,
    params: &[p(Spec::Func(&ADD_XY))],
};
static LOG_OF_BASE: FnPattern = FnPattern {
    op: Opcode::Log,
    mode: Mode::Positional,
    params: &[p(hold(0))],
};
static MUL_EXP_LOG: FnPattern = FnPattern {
    op: Opcode::Mul,
    mode: Mode::Positional,
    params: &[p(hold(1)), p(Spec::Func(&LOG_OF_BASE))],
};
static POW_POS_BASE: FnPattern = FnPattern {
    op: Opcode::Pow,
    mode: Mode::Positional,
    params: &[p(Spec::Hold(0, PROVEN_POSITIVE)), p(hold(1))],
};
static NEGATED_HOLD: FnPattern = FnPattern {
    op: Opcode::Add,
    mode: Mode::Positional,
    params: &[n(hold(0))],
};

/// Intermediate phase: the algebraic identities.
pub(crate) static INTERMEDIATE_RULES: &[Rule] = &[
    // sin(x)^2 + cos(x)^2 + rest  =>  1 + rest
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(Spec::Func(&SIN_SQUARED)), p(Spec::Func(&COS_SQUARED)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Num(1.0)), p(Spec::Rest(0))]),
    ),
    // cosh(x)^2 - sinh(x)^2 + rest  =>  1 + rest
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(Spec::Func(&COSH_SQUARED)), n(Spec::Func(&SINH_SQUARED)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Num(1.0)), p(Spec::Rest(0))]),
    ),
    // x + x + rest  =>  2x + rest
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(hold(0)), p(hold(0)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&MUL_X_2)), p(Spec::Rest(0))]),
    ),
    // a·x + x + rest  =>  (a+1)·x + rest     (a constant)
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(Spec::Func(&MUL_X_CONST)), p(hold(0)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&MUL_X_GROUP_ADD_1)), p(Spec::Rest(0))]),
    ),
    // a·x + b·x + rest  =>  (a+b)·x + rest   (a, b constants)
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(Spec::Func(&MUL_X_CONST)), p(Spec::Func(&MUL_X_CONST2)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&MUL_X_GROUP_ADD_12)), p(Spec::Rest(0))]),
    ),
    // x·x + rest  =>  x^2 + rest
    rule(
        Opcode::Mul,
        Mode::Any,
        &[p(hold(0)), p(hold(0)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&POW_X_2)), p(Spec::Rest(0))]),
    ),
    // x^a · x + rest  =>  x^(a+1) + rest     (a constant)
    rule(
        Opcode::Mul,
        Mode::Any,
        &[p(Spec::Func(&POW_X_CONST)), p(hold(0)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&POW_X_EXP_PLUS_1)), p(Spec::Rest(0))]),
    ),
    // x^a · x^b + rest  =>  x^(a+b) + rest   (a, b constants)
    rule(
        Opcode::Mul,
        Mode::Any,
        &[p(Spec::Func(&POW_X_CONST)), p(Spec::Func(&POW_X_CONST2)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&POW_MERGED)), p(Spec::Rest(0))]),
    ),
    // exp(x)·exp(y) + rest  =>  exp(x+y) + rest
    rule(
        Opcode::Mul,
        Mode::Any,
        &[p(Spec::Func(&EXP_X)), p(Spec::Func(&EXP_Y)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&EXP_SUM)), p(Spec::Rest(0))]),
    ),
    // pow identities
    rule(
        Opcode::Pow,
        Mode::Positional,
        &[p(hold(0)), p(Spec::Num(1.0))],
        Replacement::NewTree(&p(hold(0))),
    ),
    rule(
        Opcode::Pow,
        Mode::Positional,
        &[p(hold(0)), p(Spec::Num(0.0))],
        Replacement::NewTree(&p(Spec::Num(1.0))),
    ),
    rule(
        Opcode::Pow,
        Mode::Positional,
        &[p(Spec::Num(1.0)), p(hold(0))],
        Replacement::NewTree(&p(Spec::Num(1.0))),
    ),
    // (x^a)^b  =>  x^(a·b)  for odd constant a, or integer a and b
    real_rule(
        Opcode::Pow,
        Mode::Positional,
        &[p(Spec::Func(&POW_X_ODD)), p(Spec::Hold(2, CONST))],
        Replacement::NewTree(&p(Spec::Func(&POW_SCALED))),
    ),
    real_rule(
        Opcode::Pow,
        Mode::Positional,
        &[p(Spec::Func(&POW_X_INT)), p(Spec::Hold(2, INT_CONST))],
        Replacement::NewTree(&p(Spec::Func(&POW_SCALED))),
    ),
    // sqrt(x)^2  =>  x
    rule(
        Opcode::Pow,
        Mode::Positional,
        &[p(Spec::Func(&SQRT_X)), p(Spec::Num(2.0))],
        Replacement::NewTree(&p(hold(0))),
    ),
    // abs(x)^even  =>  x^even
    real_rule(
        Opcode::Pow,
        Mode::Positional,
        &[p(Spec::Func(&ABS_X)), p(Spec::Hold(1, EVEN_CONST))],
        Replacement::NewTree(&p(Spec::Func(&POW_X_ANY))),
    ),
    // log(exp(x))  =>  x
    real_rule(
        Opcode::Log,
        Mode::Positional,
        &[p(Spec::Func(&EXP_X))],
        Replacement::NewTree(&p(hold(0))),
    ),
    // log(x^y)  =>  y·log(x)  for range-proven non-negative x
    real_rule(
        Opcode::Log,
        Mode::Positional,
        &[p(Spec::Func(&POW_POS_BASE))],
        Replacement::NewTree(&p(Spec::Func(&MUL_EXP_LOG))),
    ),
    // exp(log(x))  =>  x
    rule(
        Opcode::Exp,
        Mode::Positional,
        &[p(Spec::Func(&LOG_X))],
        Replacement::NewTree(&p(hold(0))),
    ),
    // abs simplifications under range proofs
    rule(
        Opcode::Abs,
        Mode::Positional,
        &[p(Spec::Func(&ABS_X))],
        Replacement::NewTree(&p(Spec::Func(&ABS_X))),
    ),
    rule(
        Opcode::Abs,
        Mode::Positional,
        &[p(Spec::Hold(0, PROVEN_POSITIVE))],
        Replacement::NewTree(&p(hold(0))),
    ),
    rule(
        Opcode::Abs,
        Mode::Positional,
        &[p(Spec::Hold(0, PROVEN_NEGATIVE))],
        Replacement::NewTree(&p(Spec::Func(&NEGATED_HOLD))),
    ),
];

// Final-phase building blocks.
static FMA_XYZ: FnPattern = FnPattern {
    op: Opcode::Fma,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1)), p(hold(2))],
};
static FMS_XYZ: FnPattern = FnPattern {
    op: Opcode::Fms,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1)), p(hold(2))],
};
static FMMA_XYZW: FnPattern = FnPattern {
    op: Opcode::Fmma,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1)), p(hold(2)), p(hold(3))],
};
static FMMS_XYZW: FnPattern = FnPattern {
    op: Opcode::Fmms,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1)), p(hold(2)), p(hold(3))],
};
static LOG2BY_XY: FnPattern = FnPattern {
    op: Opcode::Log2By,
    mode: Mode::Positional,
    params: &[p(hold(0)), p(hold(1))],
};

/// Final phase: fused-operation contractions. These are anti-canonical and
/// would block the algebraic rules, so they run last.
pub(crate) static FINAL_RULES: &[Rule] = &[
    // a·b + c·d + rest  =>  fmma(a,b,c,d) + rest
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(Spec::Func(&MUL_PAIR_A)), p(Spec::Func(&MUL_PAIR_B)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&FMMA_XYZW)), p(Spec::Rest(0))]),
    ),
    // a·b - c·d + rest  =>  fmms(a,b,c,d) + rest
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(Spec::Func(&MUL_PAIR_A)), n(Spec::Func(&MUL_PAIR_B)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&FMMS_XYZW)), p(Spec::Rest(0))]),
    ),
    // a·b + c + rest  =>  fma(a,b,c) + rest
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(Spec::Func(&MUL_PAIR_A)), p(hold(2)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&FMA_XYZ)), p(Spec::Rest(0))]),
    ),
    // a·b - c + rest  =>  fms(a,b,c) + rest
    rule(
        Opcode::Add,
        Mode::Any,
        &[p(Spec::Func(&MUL_PAIR_A)), n(hold(2)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&FMS_XYZ)), p(Spec::Rest(0))]),
    ),
    // log2(x)·y + rest  =>  log2by(x,y) + rest
    rule(
        Opcode::Mul,
        Mode::Any,
        &[p(Spec::Func(&LOG2_X)), p(hold(1)), p(Spec::Rest(0))],
        Replacement::Params(&[p(Spec::Func(&LOG2BY_XY)), p(Spec::Rest(0))]),
    ),
];

/// The phases in application order.
pub(crate) fn phases() -> [(&'static str, &'static [Rule]); 3] {
    [
        ("entry", ENTRY_RULES),
        ("intermediate", INTERMEDIATE_RULES),
        ("final", FINAL_RULES),
    ]
}

/// Highest holder index any rule uses, plus one.
pub(crate) const MAX_HOLDERS: usize = 4;
