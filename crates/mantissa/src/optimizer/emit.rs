//! CodeTree → bytecode serialization.
//!
//! Post-order emission with contextual peepholes: `Dup`+`Mul` collapses to
//! `Sqr`; signs on commutative children prefer cumulative `Sub`/`Div` forms
//! with an unsigned operand re-sorted first; integer exponents and integer
//! factors route through the power-sequence synthesizer when the cost
//! estimate beats the generic opcode; sibling `sin(x)`/`cos(x)` operands of
//! one commutative node contract to `SinCos`. The running stack depth is
//! simulated and its maximum stored on the program for the evaluator's
//! pre-allocation.

use crate::{
    opcode::{Opcode, var_word},
    optimizer::{
        codetree::{CodeTree, Param, Payload},
        powi::{ADD_SEQUENCE, MUL_SEQUENCE, assemble_sequence, muli_cap, powi_cap},
    },
    program::Program,
    scalar::Scalar,
};

pub(crate) struct Synth<T> {
    code: Vec<u32>,
    immed: Vec<T>,
    stack_cur: usize,
    stack_max: usize,
    last_was_dup: bool,
}

pub(crate) struct Checkpoint {
    code_len: usize,
    immed_len: usize,
    stack_cur: usize,
    stack_max: usize,
}

impl<T: Scalar> Synth<T> {
    fn new() -> Self {
        Self {
            code: Vec::new(),
            immed: Vec::new(),
            stack_cur: 0,
            stack_max: 0,
            last_was_dup: false,
        }
    }

    pub fn add_op(&mut self, op: Opcode) {
        if op == Opcode::Mul && self.last_was_dup {
            *self.code.last_mut().expect("dup just emitted") = Opcode::Sqr as u32;
            self.last_was_dup = false;
            return;
        }
        self.last_was_dup = op == Opcode::Dup;
        self.code.push(op as u32);
    }

    pub fn add_word(&mut self, word: u32) {
        self.last_was_dup = false;
        self.code.push(word);
    }

    /// Emits a literal push and simulates it.
    pub fn push_const(&mut self, value: T) {
        self.last_was_dup = false;
        self.code.push(Opcode::Immed as u32);
        self.immed.push(value);
        self.simu_push(1);
    }

    fn push_var(&mut self, index: u32) {
        self.last_was_dup = false;
        self.code.push(var_word(index));
        self.simu_push(1);
    }

    pub fn stack_cur(&self) -> usize {
        self.stack_cur
    }

    pub fn simu_push(&mut self, n: usize) {
        self.stack_cur += n;
        if self.stack_cur > self.stack_max {
            self.stack_max = self.stack_cur;
        }
    }

    pub fn simu_pop(&mut self, n: usize) {
        if self.stack_cur > self.stack_max {
            self.stack_max = self.stack_cur;
        }
        self.stack_cur -= n;
    }

    /// Pushes a copy of the value at `pos`: `Dup` when it is on top,
    /// `Fetch` otherwise.
    pub fn dup_fetch(&mut self, pos: usize) {
        if pos == self.stack_cur - 1 {
            self.add_op(Opcode::Dup);
        } else {
            self.add_op(Opcode::Fetch);
            self.add_word(pos as u32);
        }
        self.simu_push(1);
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            code_len: self.code.len(),
            immed_len: self.immed.len(),
            stack_cur: self.stack_cur,
            stack_max: self.stack_max,
        }
    }

    pub fn grown_since(&self, cp: &Checkpoint) -> usize {
        self.code.len() - cp.code_len
    }

    pub fn rollback(&mut self, cp: Checkpoint) {
        self.code.truncate(cp.code_len);
        self.immed.truncate(cp.immed_len);
        self.stack_cur = cp.stack_cur;
        self.stack_max = cp.stack_max;
        self.last_was_dup = false;
    }
}

/// Serializes an optimized tree into a runnable program.
pub(crate) fn synthesize<T: Scalar>(root: &CodeTree<T>) -> Program<T> {
    let mut synth = Synth::new();
    synth_node(root, &mut synth);
    debug_assert_eq!(synth.stack_cur, 1);
    Program {
        code: synth.code,
        immed: synth.immed,
        stack_size: synth.stack_max,
    }
}

pub(crate) fn synth_node<T: Scalar>(tree: &CodeTree<T>, synth: &mut Synth<T>) {
    match tree.op {
        Opcode::VarBegin => {
            if let Payload::Var(index) = tree.payload {
                synth.push_var(index);
            }
        }
        Opcode::Immed => {
            if let Some(v) = tree.value() {
                synth.push_const(v.clone());
            }
        }
        Opcode::Add
        | Opcode::Mul
        | Opcode::Min
        | Opcode::Max
        | Opcode::And
        | Opcode::Or
        | Opcode::AbsAnd
        | Opcode::AbsOr
        | Opcode::Equal
        | Opcode::NEqual => synth_commutative(tree, synth),
        Opcode::Pow => {
            let base = &tree.params[0].tree;
            let exponent = &tree.params[1].tree;
            let as_long = if tree.params[1].sign { None } else { exponent.long_value() };
            let done = as_long
                .is_some_and(|n| assemble_sequence(synth, base, n, &MUL_SEQUENCE, powi_cap()));
            if !done {
                synth_node(base, synth);
                synth_node(exponent, synth);
                synth.add_op(Opcode::Pow);
                synth.simu_pop(1);
            }
        }
        Opcode::If | Opcode::AbsIf => {
            synth_node(&tree.params[0].tree, synth);
            synth.simu_pop(1);
            let if_at = synth.code.len();
            synth.add_op(tree.op);
            synth.add_word(0);
            synth.add_word(0);

            synth_node(&tree.params[1].tree, synth);
            synth.simu_pop(1);
            let jump_at = synth.code.len();
            synth.add_op(Opcode::Jump);
            synth.add_word(0);
            synth.add_word(0);

            synth.code[if_at + 1] = synth.code.len() as u32;
            synth.code[if_at + 2] = synth.immed.len() as u32;

            synth_node(&tree.params[2].tree, synth);
            synth.simu_pop(1);
            synth.code[jump_at + 1] = synth.code.len() as u32;
            synth.code[jump_at + 2] = synth.immed.len() as u32;
            synth.simu_push(1);
        }
        Opcode::FCall | Opcode::PCall => {
            let was = synth.stack_cur;
            for p in &tree.params {
                synth_node(&p.tree, synth);
            }
            synth.add_op(tree.op);
            synth.add_word(tree.funcno());
            synth.simu_pop(synth.stack_cur - was);
            synth.simu_push(1);
        }
        _ => {
            let was = synth.stack_cur;
            for p in &tree.params {
                synth_node(&p.tree, synth);
            }
            synth.add_op(tree.op);
            if synth.stack_cur - was > 1 {
                synth.simu_pop(synth.stack_cur - was - 1);
            }
        }
    }
}

/// Emission plan for one commutative child.
#[derive(Clone, Copy, PartialEq)]
enum ChildPlan {
    Plain,
    /// Emit the trig argument and a paired two-output opcode.
    EmitPair(Opcode),
    /// Covered by an earlier paired emission.
    Skip,
}

fn synth_commutative<T: Scalar>(tree: &CodeTree<T>, synth: &mut Synth<T>) {
    let op = tree.op;
    let mut params: Vec<Param<T>> = tree.params.to_vec();

    // If the first child carries a sign, lead with an unsigned one so the
    // cumulative Sub/Div forms apply instead of a unary prefix.
    if params.first().is_some_and(|p| p.sign)
        && let Some(pos) = params.iter().position(|p| !p.sign)
    {
        params.swap(0, pos);
    }

    // Fold signs into immediate operands.
    for p in &mut params {
        if !p.sign {
            continue;
        }
        let Some(v) = p.tree.value().cloned() else { continue };
        match op {
            Opcode::Add => {
                p.tree.set_immed(v.neg());
                p.sign = false;
            }
            Opcode::Mul if v != T::zero() => {
                p.tree.set_immed(T::one().div(&v));
                p.sign = false;
            }
            Opcode::And | Opcode::Or | Opcode::AbsAnd | Opcode::AbsOr => {
                p.tree.set_immed(if v.truth() { T::zero() } else { T::one() });
                p.sign = false;
            }
            _ => {}
        }
    }

    // A product with a long-integer factor may synthesize better as an
    // add-sequence over the remaining factors.
    if op == Opcode::Mul {
        for a in 0..params.len() {
            if params[a].sign {
                continue;
            }
            let Some(value) = params[a].tree.long_value() else { continue };
            let rest: Vec<Param<T>> = params
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != a)
                .map(|(_, p)| p.clone())
                .collect();
            if rest.is_empty() {
                continue;
            }
            let base = if rest.len() == 1 && !rest[0].sign {
                (*rest[0].tree).clone()
            } else {
                CodeTree::func(Opcode::Mul, rest)
            };
            if assemble_sequence(synth, &base, value, &ADD_SEQUENCE, muli_cap()) {
                return;
            }
        }
    }

    // Pair sibling sin(x)/cos(x) (and sinh/cosh) into the two-output forms.
    let mut plans = vec![ChildPlan::Plain; params.len()];
    for (pair_op, sin_op, cos_op) in [
        (Opcode::SinCos, Opcode::Sin, Opcode::Cos),
        (Opcode::SinhCosh, Opcode::Sinh, Opcode::Cosh),
    ] {
        for i in 0..params.len() {
            if plans[i] != ChildPlan::Plain || params[i].sign || params[i].tree.op != sin_op {
                continue;
            }
            for j in 0..params.len() {
                if i == j || plans[j] != ChildPlan::Plain || params[j].sign || params[j].tree.op != cos_op {
                    continue;
                }
                if params[i].tree.params[0].tree.same(&params[j].tree.params[0].tree) {
                    plans[i] = ChildPlan::EmitPair(pair_op);
                    plans[j] = ChildPlan::Skip;
                    break;
                }
            }
        }
    }

    let mut n_stacked = 0_usize;
    for (p, plan) in params.iter().zip(&plans) {
        match plan {
            ChildPlan::Skip => continue,
            ChildPlan::EmitPair(pair_op) => {
                synth_node(&p.tree.params[0].tree, synth);
                synth.add_op(*pair_op);
                synth.simu_pop(1);
                synth.simu_push(2);
                n_stacked += 2;
                while n_stacked > 1 {
                    synth.add_op(op);
                    synth.simu_pop(1);
                    n_stacked -= 1;
                }
            }
            ChildPlan::Plain => {
                synth_node(&p.tree, synth);
                n_stacked += 1;
                if p.sign {
                    if n_stacked == 1 {
                        // The whole group is signed; a unary prefix is the
                        // only option.
                        match op {
                            Opcode::Add => synth.add_op(Opcode::Neg),
                            Opcode::Mul => synth.add_op(Opcode::Inv),
                            _ => synth.add_op(Opcode::Not),
                        }
                    } else {
                        match op {
                            Opcode::Add => synth.add_op(Opcode::Sub),
                            Opcode::Mul => synth.add_op(Opcode::Div),
                            _ => {
                                synth.add_op(Opcode::Not);
                                synth.add_op(op);
                            }
                        }
                        synth.simu_pop(1);
                        n_stacked -= 1;
                    }
                } else if n_stacked > 1 {
                    // Cumulate at the earliest opportunity.
                    synth.add_op(op);
                    synth.simu_pop(1);
                    n_stacked -= 1;
                }
            }
        }
    }

    if n_stacked == 0 {
        // An emptied group; synthesize its identity element.
        match op {
            Opcode::Add | Opcode::Or | Opcode::AbsOr | Opcode::Min | Opcode::Max => synth.push_const(T::zero()),
            _ => synth.push_const(T::one()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{eval::EvalError, parse, program::Data};

    fn program_for(text: &str, vars: &str, optimize: bool) -> Data<f64> {
        let mut data: Data<f64> = Data::default();
        let map = parse::parse_variable_list(vars).unwrap();
        data.variables_amount = map.len() as u32;
        let program = parse::compile(text, &map, &data, false).unwrap();
        data.program = program;
        if optimize {
            let mut tree = crate::optimizer::codetree::build_tree(&data).unwrap();
            crate::optimizer::rewrite::optimize_tree(&mut tree);
            data.program = synthesize(&tree);
        }
        data
    }

    fn eval(data: &Data<f64>, vars: &[f64]) -> f64 {
        let mut stack = Vec::new();
        let (value, err) = crate::eval::run(data, &mut stack, vars, 0);
        assert_eq!(err, EvalError::None);
        value
    }

    fn count_ops(data: &Data<f64>, wanted: &[Opcode]) -> usize {
        let code = &data.program.code;
        let mut n = 0;
        let mut ip = 0;
        while ip < code.len() {
            match Opcode::decode(code[ip]) {
                Some(op) => {
                    if wanted.contains(&op) {
                        n += 1;
                    }
                    ip += 1 + op.operand_words();
                }
                None => ip += 1,
            }
        }
        n
    }

    #[test]
    fn power_sequences_match_repeated_multiplication() {
        for n in [2_i64, 3, 7, 16, 40, 255, -3, -40] {
            let data = program_for(&format!("x^{n}"), "x", true);
            let x = 1.02_f64;
            // The synthesized sequence multiplies through squarings, which
            // may differ from left-to-right multiplication in the last ulp.
            let base = if n < 0 { 1.0 / x } else { x };
            let mut expected = 1.0;
            for _ in 0..n.abs() {
                expected *= base;
            }
            let got = eval(&data, &[x]);
            assert!(
                (got / expected - 1.0).abs() < 1e-12,
                "exponent {n}: got {got}, expected {expected}"
            );
        }
    }

    #[test]
    fn x_to_40_uses_few_multiplicative_ops() {
        let data = program_for("x^40", "x", true);
        let muls = count_ops(
            &data,
            &[Opcode::Mul, Opcode::Sqr, Opcode::Dup, Opcode::Fetch, Opcode::PopNMov],
        );
        assert!(muls <= 12, "got {muls} multiplicative instructions");
        assert_eq!(count_ops(&data, &[Opcode::Pow]), 0);
    }

    #[test]
    fn sibling_sin_cos_contract_to_sincos() {
        let data = program_for("sin(x) * cos(x)", "x", true);
        assert_eq!(count_ops(&data, &[Opcode::SinCos]), 1);
        assert_eq!(count_ops(&data, &[Opcode::Sin, Opcode::Cos]), 0);
        let x = 0.7_f64;
        assert!((eval(&data, &[x]) - x.sin() * x.cos()).abs() < 1e-15);
    }

    #[test]
    fn signs_emit_cumulative_forms() {
        let data = program_for("x - y", "x,y", true);
        assert_eq!(eval(&data, &[5.0, 3.0]), 2.0);
        let data = program_for("x / y", "x,y", true);
        assert_eq!(eval(&data, &[6.0, 3.0]), 2.0);
        // Leading with an unsigned operand avoids a unary Neg.
        let data = program_for("0 - y + x", "x,y", true);
        assert_eq!(count_ops(&data, &[Opcode::Neg]), 0);
        assert_eq!(eval(&data, &[5.0, 3.0]), 2.0);
    }

    #[test]
    fn integer_scaling_uses_add_sequence() {
        let data = program_for("3 * x", "x", true);
        assert_eq!(count_ops(&data, &[Opcode::Mul]), 0);
        assert_eq!(eval(&data, &[2.5]), 7.5);
    }

    #[test]
    fn if_branches_round_trip() {
        let data = program_for("if(x>0, x+1, x-1)", "x", true);
        assert_eq!(eval(&data, &[2.0]), 3.0);
        assert_eq!(eval(&data, &[-2.0]), -3.0);
    }
}
