//! Diagnostic bytecode printer.
//!
//! Renders one instruction per line with its mnemonic and operands. Intended
//! for humans inspecting what the parser and optimizer produced; the format
//! is not a stable interface.

use std::fmt;

use crate::{
    opcode::{Opcode, VAR_BEGIN},
    program::Program,
    scalar::Scalar,
};

pub(crate) fn print_program<T: Scalar>(program: &Program<T>, sink: &mut dyn fmt::Write) -> fmt::Result {
    let code = &program.code;
    let mut dp = 0_usize;
    let mut ip = 0_usize;
    while ip < code.len() {
        let word = code[ip];
        if word >= VAR_BEGIN {
            writeln!(sink, "{ip:4}: push var{}", word - VAR_BEGIN)?;
            ip += 1;
            continue;
        }
        let Some(op) = Opcode::decode(word) else {
            writeln!(sink, "{ip:4}: ??? ({word})")?;
            ip += 1;
            continue;
        };
        match op {
            Opcode::Immed => {
                let value = program.immed.get(dp).map_or_else(|| "<missing>".to_owned(), T::to_string);
                writeln!(sink, "{ip:4}: push {value}")?;
                dp += 1;
            }
            Opcode::If | Opcode::AbsIf => {
                writeln!(sink, "{ip:4}: {op} else->{} ({})", code[ip + 1], code[ip + 2])?;
            }
            Opcode::Jump => {
                writeln!(sink, "{ip:4}: jump ->{} ({})", code[ip + 1], code[ip + 2])?;
            }
            Opcode::FCall | Opcode::PCall => {
                writeln!(sink, "{ip:4}: {op} #{}", code[ip + 1])?;
            }
            Opcode::Fetch => {
                writeln!(sink, "{ip:4}: fetch [{}]", code[ip + 1])?;
            }
            Opcode::PopNMov => {
                writeln!(sink, "{ip:4}: popnmov [{}] <- [{}]", code[ip + 1], code[ip + 2])?;
            }
            _ => {
                writeln!(sink, "{ip:4}: {op}")?;
            }
        }
        ip += 1 + op.operand_words();
    }
    writeln!(sink, "stack size: {}", program.stack_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::program::Data;

    #[test]
    fn listing_contains_mnemonics_and_literals() {
        let data: Data<f64> = Data::default();
        let vars = parse::parse_variable_list("x").unwrap();
        let program = parse::compile("sin(x) + 2.5", &vars, &data, false).unwrap();
        let mut out = String::new();
        print_program(&program, &mut out).unwrap();
        assert!(out.contains("sin"));
        assert!(out.contains("2.5"));
        assert!(out.contains("push var0"));
        assert!(out.contains("stack size"));
    }
}
