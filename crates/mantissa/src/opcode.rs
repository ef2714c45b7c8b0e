//! Instruction set and builtin-function metadata.
//!
//! Programs are flat `u32` word sequences. A word below `Opcode::VarBegin`
//! is an opcode (possibly followed by operand words); any word at or above
//! it pushes variable `word - VarBegin`. `Immed` consumes the next literal
//! from the parallel literal pool.

use num_enum::TryFromPrimitive;

bitflags::bitflags! {
    /// Parse-time properties of a builtin function.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct FuncFlags: u32 {
        /// Angle argument: wrapped in `Rad` when parsing in degree mode.
        const ANGLE_IN = 1 << 0;
        /// Angle result: followed by `Deg` when parsing in degree mode.
        const ANGLE_OUT = 1 << 1;
        /// Available for integer scalar types.
        const OK_FOR_INT = 1 << 2;
        /// Only available for complex scalar types.
        const COMPLEX_ONLY = 1 << 3;
    }
}

/// One instruction of the stack machine.
///
/// The leading block is the named builtin functions in alphabetical order;
/// the rest are core operators, optimizer-introduced instructions, and the
/// `VarBegin` sentinel that terminates the opcode space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u32)]
pub(crate) enum Opcode {
    Abs,
    Acos,
    Acosh,
    Arg,
    Asin,
    Asinh,
    Atan,
    Atan2,
    Atanh,
    Cbrt,
    Ceil,
    Conj,
    Cos,
    Cosh,
    Cot,
    Csc,
    Exp,
    Exp2,
    Floor,
    Hypot,
    If,
    Imag,
    Int,
    Log,
    Log10,
    Log2,
    Max,
    Min,
    Polar,
    Pow,
    Real,
    Sec,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
    Trunc,

    Immed,
    Jump,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NEqual,
    Less,
    LessOrEq,
    Greater,
    GreaterOrEq,
    Not,
    And,
    Or,
    NotNot,
    Deg,
    Rad,
    FCall,
    PCall,

    PopNMov,
    Log2By,
    Nop,
    SinCos,
    SinhCosh,
    AbsAnd,
    AbsOr,
    AbsNot,
    AbsNotNot,
    AbsIf,
    Dup,
    Fetch,
    Inv,
    Sqr,
    RDiv,
    RSub,
    RSqrt,
    Fma,
    Fms,
    Fmma,
    Fmms,

    VarBegin,
}

pub(crate) const VAR_BEGIN: u32 = Opcode::VarBegin as u32;

impl Opcode {
    /// Decodes an instruction word; `None` for variable words.
    pub(crate) fn decode(word: u32) -> Option<Self> {
        if word >= VAR_BEGIN {
            None
        } else {
            Self::try_from(word).ok()
        }
    }

    /// How many operand words follow this instruction.
    pub(crate) fn operand_words(self) -> usize {
        match self {
            Self::If | Self::AbsIf | Self::Jump | Self::PopNMov => 2,
            Self::FCall | Self::PCall | Self::Fetch => 1,
            _ => 0,
        }
    }

    /// True for the commutative n-ary opcodes whose CodeTree children carry
    /// sign flags or canonical ordering.
    pub(crate) fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Mul
                | Self::Min
                | Self::Max
                | Self::And
                | Self::Or
                | Self::AbsAnd
                | Self::AbsOr
                | Self::Equal
                | Self::NEqual
        )
    }

    /// True for opcodes whose result is always 0 or 1.
    pub(crate) fn is_logical(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NEqual
                | Self::Less
                | Self::LessOrEq
                | Self::Greater
                | Self::GreaterOrEq
                | Self::Not
                | Self::NotNot
                | Self::And
                | Self::Or
                | Self::AbsAnd
                | Self::AbsOr
                | Self::AbsNot
                | Self::AbsNotNot
        )
    }
}

/// Encodes a variable index as an instruction word.
pub(crate) fn var_word(index: u32) -> u32 {
    VAR_BEGIN + index
}

/// Builtin function table entry.
pub(crate) struct FuncDef {
    pub name: &'static str,
    pub opcode: Opcode,
    pub arity: u8,
    pub flags: FuncFlags,
}

const fn f(name: &'static str, opcode: Opcode, arity: u8, flags: FuncFlags) -> FuncDef {
    FuncDef {
        name,
        opcode,
        arity,
        flags,
    }
}

/// All named builtin functions. Sorted by name; reserved identifiers.
pub(crate) const FUNCTIONS: &[FuncDef] = &[
    f("abs", Opcode::Abs, 1, FuncFlags::OK_FOR_INT),
    f("acos", Opcode::Acos, 1, FuncFlags::ANGLE_OUT),
    f("acosh", Opcode::Acosh, 1, FuncFlags::ANGLE_OUT),
    f("arg", Opcode::Arg, 1, FuncFlags::ANGLE_OUT.union(FuncFlags::COMPLEX_ONLY)),
    f("asin", Opcode::Asin, 1, FuncFlags::ANGLE_OUT),
    f("asinh", Opcode::Asinh, 1, FuncFlags::ANGLE_OUT),
    f("atan", Opcode::Atan, 1, FuncFlags::ANGLE_OUT),
    f("atan2", Opcode::Atan2, 2, FuncFlags::ANGLE_OUT),
    f("atanh", Opcode::Atanh, 1, FuncFlags::empty()),
    f("cbrt", Opcode::Cbrt, 1, FuncFlags::empty()),
    f("ceil", Opcode::Ceil, 1, FuncFlags::empty()),
    f("conj", Opcode::Conj, 1, FuncFlags::COMPLEX_ONLY),
    f("cos", Opcode::Cos, 1, FuncFlags::ANGLE_IN),
    f("cosh", Opcode::Cosh, 1, FuncFlags::ANGLE_IN),
    f("cot", Opcode::Cot, 1, FuncFlags::ANGLE_IN),
    f("csc", Opcode::Csc, 1, FuncFlags::ANGLE_IN),
    f("exp", Opcode::Exp, 1, FuncFlags::empty()),
    f("exp2", Opcode::Exp2, 1, FuncFlags::empty()),
    f("floor", Opcode::Floor, 1, FuncFlags::empty()),
    f("hypot", Opcode::Hypot, 2, FuncFlags::empty()),
    f("if", Opcode::If, 3, FuncFlags::OK_FOR_INT),
    f("imag", Opcode::Imag, 1, FuncFlags::COMPLEX_ONLY),
    f("int", Opcode::Int, 1, FuncFlags::OK_FOR_INT),
    f("log", Opcode::Log, 1, FuncFlags::empty()),
    f("log10", Opcode::Log10, 1, FuncFlags::empty()),
    f("log2", Opcode::Log2, 1, FuncFlags::empty()),
    f("max", Opcode::Max, 2, FuncFlags::OK_FOR_INT),
    f("min", Opcode::Min, 2, FuncFlags::OK_FOR_INT),
    f(
        "polar",
        Opcode::Polar,
        2,
        FuncFlags::ANGLE_IN.union(FuncFlags::COMPLEX_ONLY),
    ),
    f("pow", Opcode::Pow, 2, FuncFlags::empty()),
    f("real", Opcode::Real, 1, FuncFlags::COMPLEX_ONLY),
    f("sec", Opcode::Sec, 1, FuncFlags::ANGLE_IN),
    f("sin", Opcode::Sin, 1, FuncFlags::ANGLE_IN),
    f("sinh", Opcode::Sinh, 1, FuncFlags::ANGLE_IN),
    f("sqrt", Opcode::Sqrt, 1, FuncFlags::empty()),
    f("tan", Opcode::Tan, 1, FuncFlags::ANGLE_IN),
    f("tanh", Opcode::Tanh, 1, FuncFlags::ANGLE_IN),
    f("trunc", Opcode::Trunc, 1, FuncFlags::empty()),
];

/// Looks up a builtin by identifier. The length bucket plus byte match
/// compiles down to the minimal discrimination tree.
pub(crate) fn lookup_function(name: &str) -> Option<&'static FuncDef> {
    let index = match name.len() {
        2 => match name {
            "if" => 20,
            _ => return None,
        },
        3 => match name {
            "abs" => 0,
            "arg" => 3,
            "cos" => 12,
            "cot" => 14,
            "csc" => 15,
            "exp" => 16,
            "int" => 22,
            "log" => 23,
            "max" => 26,
            "min" => 27,
            "pow" => 29,
            "sec" => 31,
            "sin" => 32,
            "tan" => 35,
            _ => return None,
        },
        4 => match name {
            "acos" => 1,
            "asin" => 4,
            "atan" => 6,
            "cbrt" => 9,
            "ceil" => 10,
            "conj" => 11,
            "cosh" => 13,
            "exp2" => 17,
            "imag" => 21,
            "log2" => 25,
            "real" => 30,
            "sinh" => 33,
            "sqrt" => 34,
            "tanh" => 36,
            _ => return None,
        },
        5 => match name {
            "acosh" => 2,
            "asinh" => 5,
            "atan2" => 7,
            "atanh" => 8,
            "floor" => 18,
            "hypot" => 19,
            "log10" => 24,
            "polar" => 28,
            "trunc" => 37,
            _ => return None,
        },
        _ => return None,
    };
    Some(&FUNCTIONS[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_indexes_are_consistent() {
        for def in FUNCTIONS {
            let found = lookup_function(def.name).expect("builtin must resolve");
            assert_eq!(found.opcode, def.opcode, "index mismatch for {}", def.name);
        }
        assert!(lookup_function("sinc").is_none());
        assert!(lookup_function("").is_none());
    }

    #[test]
    fn variable_words_round_trip() {
        assert!(Opcode::decode(var_word(3)).is_none());
        assert_eq!(Opcode::decode(Opcode::Sin as u32), Some(Opcode::Sin));
    }

    #[test]
    fn operand_word_counts() {
        assert_eq!(Opcode::If.operand_words(), 2);
        assert_eq!(Opcode::FCall.operand_words(), 1);
        assert_eq!(Opcode::Add.operand_words(), 0);
    }
}
