//! The optimizer's working tree form.
//!
//! Nodes carry an opcode, an optional payload (immediate value, variable
//! index, or function number), and an ordered list of signed children. On a
//! commutative node the sign marks a child as negated (`Add`), inverted
//! (`Mul`), or logically negated (`And`/`Or`). Every node caches a 128-bit
//! hash and its depth; equal hashes are treated as equal trees throughout
//! the optimizer.
//!
//! Children are owned. Instead of parent back-pointers, every mutation site
//! rehashes on the way back up the recursion, so hashes stay consistent
//! without shared ownership.

use smallvec::SmallVec;

use crate::{
    eval::{DEG_TO_RAD, RAD_TO_DEG},
    opcode::{Opcode, VAR_BEGIN},
    program::Data,
    scalar::Scalar,
};

#[derive(Clone, Debug)]
pub(crate) enum Payload<T> {
    None,
    Value(T),
    Var(u32),
    FuncNo(u32),
}

#[derive(Clone, Debug)]
pub(crate) struct Param<T: Scalar> {
    pub tree: Box<CodeTree<T>>,
    pub sign: bool,
}

impl<T: Scalar> Param<T> {
    pub fn new(tree: CodeTree<T>, sign: bool) -> Self {
        Self {
            tree: Box::new(tree),
            sign,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct CodeTree<T: Scalar> {
    pub op: Opcode,
    pub payload: Payload<T>,
    pub params: SmallVec<[Param<T>; 2]>,
    pub hash: u128,
    pub depth: u32,
}

impl<T: Scalar> CodeTree<T> {
    pub fn immed(value: T) -> Self {
        let mut node = Self {
            op: Opcode::Immed,
            payload: Payload::Value(value),
            params: SmallVec::new(),
            hash: 0,
            depth: 1,
        };
        node.rehash();
        node
    }

    pub fn var(index: u32) -> Self {
        let mut node = Self {
            op: Opcode::VarBegin,
            payload: Payload::Var(index),
            params: SmallVec::new(),
            hash: 0,
            depth: 1,
        };
        node.rehash();
        node
    }

    pub fn func(op: Opcode, params: impl IntoIterator<Item = Param<T>>) -> Self {
        let mut node = Self {
            op,
            payload: Payload::None,
            params: params.into_iter().collect(),
            hash: 0,
            depth: 1,
        };
        node.rehash();
        node
    }

    pub fn is_immed(&self) -> bool {
        self.op == Opcode::Immed
    }

    pub fn is_var(&self) -> bool {
        self.op == Opcode::VarBegin
    }

    pub fn value(&self) -> Option<&T> {
        match &self.payload {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The immediate as an exact `i64`, when it is one.
    pub fn long_value(&self) -> Option<i64> {
        self.value().and_then(Scalar::to_long)
    }

    pub fn funcno(&self) -> u32 {
        match self.payload {
            Payload::FuncNo(n) => n,
            _ => 0,
        }
    }

    pub fn set_immed(&mut self, value: T) {
        self.op = Opcode::Immed;
        self.payload = Payload::Value(value);
        self.params.clear();
        self.rehash();
    }

    /// Replaces this node wholesale with another tree.
    pub fn become_tree(&mut self, other: Self) {
        *self = other;
    }

    pub fn add_param(&mut self, param: Param<T>) {
        self.params.push(param);
    }

    pub fn del_param(&mut self, index: usize) {
        self.params.remove(index);
    }

    /// Structural equality through the hash (treated as collision-free).
    pub fn same(&self, other: &Self) -> bool {
        self.hash == other.hash && self.depth == other.depth
    }

    /// Restores canonical form and recomputes hash and depth of this node.
    /// Children are assumed to be canonical already.
    pub fn rehash(&mut self) {
        self.normalize_comparison();
        if self.op.is_commutative() {
            self.params
                .sort_by(|a, b| match b.tree.depth.cmp(&a.tree.depth) {
                    std::cmp::Ordering::Equal => match a.sign.cmp(&b.sign) {
                        std::cmp::Ordering::Equal => a.tree.hash.cmp(&b.tree.hash),
                        other => other,
                    },
                    other => other,
                });
        }
        self.recalc_hash();
    }

    /// Full bottom-up rehash of the subtree.
    pub fn rehash_recursive(&mut self) {
        for p in &mut self.params {
            p.tree.rehash_recursive();
        }
        self.rehash();
    }

    /// `a < b` is canonically `b > a`, exposing symmetric rules.
    fn normalize_comparison(&mut self) {
        let flipped = match self.op {
            Opcode::Less => Opcode::Greater,
            Opcode::LessOrEq => Opcode::GreaterOrEq,
            _ => return,
        };
        self.op = flipped;
        self.params.swap(0, 1);
    }

    fn recalc_hash(&mut self) {
        const K1: u64 = 0x0113_1462_E270_012B;
        const K2: u64 = 0x09AB_CD80_1357_0000;
        const K3: u64 = 0x0ECA_DB91_2345_0001;

        let mut hi: u64 = (self.op as u64) << 56;
        let mut lo: u64 = (self.op as u64).wrapping_mul(K1);
        match &self.payload {
            Payload::None => {}
            Payload::Value(v) => {
                let (a, b) = v.value_hash();
                hi |= a >> 8;
                lo = lo.wrapping_add(b);
            }
            Payload::Var(i) => {
                hi |= u64::from(*i) << 32;
                lo = lo.wrapping_add(u64::from(*i).wrapping_mul(11) ^ 0x03A8_3A83_A83A_83A0);
            }
            Payload::FuncNo(i) => {
                hi |= u64::from(*i) << 32;
                lo = lo.wrapping_add((!u64::from(*i)).wrapping_mul(7) ^ 0x0034_5678_9ABC_0001);
            }
        }
        let mut depth = 1_u32;
        for (i, p) in self.params.iter().enumerate() {
            depth = depth.max(1 + p.tree.depth);
            let child_hi = (p.tree.hash >> 64) as u64;
            let child_lo = p.tree.hash as u64;
            hi = hi.wrapping_add(child_hi.wrapping_mul(i as u64 + 1) >> 12);
            lo = lo.wrapping_add(child_hi);
            lo = lo.wrapping_add(3).wrapping_mul(K2 | 1);
            lo = lo.wrapping_add(!child_lo ^ K3);
            if p.sign {
                lo ^= 0x5151_5151_5151_5151;
                hi = hi.rotate_left(1);
            }
        }
        self.depth = depth;
        self.hash = (u128::from(hi) << 64) | u128::from(lo);
    }

    /// Total node count, used by the rewrite engine's iteration bound.
    pub fn node_count(&self) -> usize {
        1 + self.params.iter().map(|p| p.tree.node_count()).sum::<usize>()
    }

    /// True when the node's result is known to be 0 or 1.
    pub fn is_logical(&self) -> bool {
        if self.op.is_logical() {
            return true;
        }
        self.value().is_some_and(|v| *v == T::zero() || *v == T::one())
    }
}

/// Reconstructs a CodeTree from compiled bytecode, mirroring the evaluator's
/// stack discipline but building nodes instead of values. Subtractive and
/// inverse forms are lowered to signed `Add`/`Mul` children so the
/// commutative form dominates. Returns `None` when the program contains an
/// instruction the optimizer does not model (it is then left unoptimized).
pub(crate) fn build_tree<T: Scalar>(data: &Data<T>) -> Option<CodeTree<T>> {
    let code = &data.program.code;
    let immed = &data.program.immed;

    let mut stack: Vec<CodeTree<T>> = Vec::new();
    let mut labels: Vec<usize> = Vec::new();
    let mut dp = 0_usize;
    let mut ip = 0_usize;

    fn eat<T: Scalar>(stack: &mut Vec<CodeTree<T>>, n: usize, op: Opcode, signs: &[usize]) -> Option<()> {
        if stack.len() < n {
            return None;
        }
        let at = stack.len() - n;
        let children: Vec<_> = stack
            .drain(at..)
            .enumerate()
            .map(|(i, t)| Param::new(t, signs.contains(&i)))
            .collect();
        let mut node = CodeTree::func(op, children);
        crate::optimizer::fold::constant_fold(&mut node);
        stack.push(node);
        Some(())
    }

    loop {
        // Innermost branches close first: take the most recent label.
        while let Some(at) = labels.iter().rposition(|&l| l == ip) {
            labels.remove(at);
            eat(&mut stack, 3, Opcode::If, &[])?;
        }
        if ip >= code.len() {
            break;
        }
        let word = code[ip];
        if word >= VAR_BEGIN {
            stack.push(CodeTree::var(word - VAR_BEGIN));
            ip += 1;
            continue;
        }
        let op = Opcode::decode(word)?;
        let next_ip = ip + 1 + op.operand_words();
        match op {
            Opcode::Immed => {
                stack.push(CodeTree::immed(immed.get(dp)?.clone()));
                dp += 1;
            }
            Opcode::If => {
                // The branch targets are reconstructed from the Jump label.
            }
            Opcode::Jump => {
                labels.push(code[ip + 1] as usize);
            }
            Opcode::Dup => {
                let top = stack.last()?.clone();
                stack.push(top);
            }
            Opcode::Nop => {}
            Opcode::FCall => {
                let funcno = code[ip + 1];
                let arity = usize::from(data.funcs.get(funcno as usize)?.arity);
                eat(&mut stack, arity, op, &[])?;
                stack.last_mut()?.payload = Payload::FuncNo(funcno);
                stack.last_mut()?.rehash();
            }
            Opcode::PCall => {
                let funcno = code[ip + 1];
                let arity = data.parsers.get(funcno as usize)?.var_count();
                eat(&mut stack, arity, op, &[])?;
                stack.last_mut()?.payload = Payload::FuncNo(funcno);
                stack.last_mut()?.rehash();
            }

            // Unary forms that lower to signed Add/Mul.
            Opcode::Neg => eat(&mut stack, 1, Opcode::Add, &[0])?,
            Opcode::Inv => eat(&mut stack, 1, Opcode::Mul, &[0])?,
            Opcode::Sqr => {
                let top = stack.last()?.clone();
                stack.push(top);
                eat(&mut stack, 2, Opcode::Mul, &[])?;
            }
            Opcode::Deg => {
                stack.push(CodeTree::immed(T::from_f64(RAD_TO_DEG)));
                eat(&mut stack, 2, Opcode::Mul, &[])?;
            }
            Opcode::Rad => {
                stack.push(CodeTree::immed(T::from_f64(DEG_TO_RAD)));
                eat(&mut stack, 2, Opcode::Mul, &[])?;
            }
            Opcode::Cot => {
                eat(&mut stack, 1, Opcode::Tan, &[])?;
                eat(&mut stack, 1, Opcode::Mul, &[0])?;
            }
            Opcode::Csc => {
                eat(&mut stack, 1, Opcode::Sin, &[])?;
                eat(&mut stack, 1, Opcode::Mul, &[0])?;
            }
            Opcode::Sec => {
                eat(&mut stack, 1, Opcode::Cos, &[])?;
                eat(&mut stack, 1, Opcode::Mul, &[0])?;
            }

            // Binary forms that lower to signed Add/Mul.
            Opcode::Sub => eat(&mut stack, 2, Opcode::Add, &[1])?,
            Opcode::RSub => eat(&mut stack, 2, Opcode::Add, &[0])?,
            Opcode::Div => eat(&mut stack, 2, Opcode::Mul, &[1])?,
            Opcode::RDiv => eat(&mut stack, 2, Opcode::Mul, &[0])?,

            Opcode::Add
            | Opcode::Mul
            | Opcode::Mod
            | Opcode::Pow
            | Opcode::Equal
            | Opcode::NEqual
            | Opcode::Less
            | Opcode::LessOrEq
            | Opcode::Greater
            | Opcode::GreaterOrEq
            | Opcode::And
            | Opcode::Or
            | Opcode::Atan2
            | Opcode::Hypot
            | Opcode::Min
            | Opcode::Max
            | Opcode::Polar => eat(&mut stack, 2, op, &[])?,

            Opcode::Not
            | Opcode::NotNot
            | Opcode::Abs
            | Opcode::Acos
            | Opcode::Acosh
            | Opcode::Arg
            | Opcode::Asin
            | Opcode::Asinh
            | Opcode::Atan
            | Opcode::Atanh
            | Opcode::Cbrt
            | Opcode::Ceil
            | Opcode::Conj
            | Opcode::Cos
            | Opcode::Cosh
            | Opcode::Exp
            | Opcode::Exp2
            | Opcode::Floor
            | Opcode::Imag
            | Opcode::Int
            | Opcode::Log
            | Opcode::Log10
            | Opcode::Log2
            | Opcode::Real
            | Opcode::Sin
            | Opcode::Sinh
            | Opcode::Sqrt
            | Opcode::Tan
            | Opcode::Tanh
            | Opcode::Trunc => eat(&mut stack, 1, op, &[])?,

            // Anything optimizer-generated is not expected in parser output.
            _ => return None,
        }
        ip = next_ip;
    }

    while let Some(at) = labels.iter().rposition(|&l| l == ip) {
        labels.remove(at);
        eat(&mut stack, 3, Opcode::If, &[])?;
    }

    if stack.len() == 1 { stack.pop() } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(text: &str, vars: &str) -> CodeTree<f64> {
        let mut data: Data<f64> = Data::default();
        let map = crate::parse::parse_variable_list(vars).unwrap();
        data.variables_amount = map.len() as u32;
        let program = crate::parse::compile(text, &map, &data, false).unwrap();
        data.program = program;
        build_tree(&data).unwrap()
    }

    #[test]
    fn subtraction_becomes_signed_add() {
        let t = tree_of("x - y", "x,y");
        assert_eq!(t.op, Opcode::Add);
        assert_eq!(t.params.len(), 2);
        assert_eq!(t.params.iter().filter(|p| p.sign).count(), 1);
    }

    #[test]
    fn division_becomes_signed_mul() {
        let t = tree_of("x / y", "x,y");
        assert_eq!(t.op, Opcode::Mul);
        assert_eq!(t.params.iter().filter(|p| p.sign).count(), 1);
    }

    #[test]
    fn equal_trees_hash_equal() {
        let a = tree_of("x*y + sin(x)", "x,y");
        let b = tree_of("y*x + sin(x)", "x,y");
        assert!(a.same(&b), "commutative reordering must canonicalize");
        let c = tree_of("x*y - sin(x)", "x,y");
        assert!(!a.same(&c));
    }

    #[test]
    fn comparisons_normalize_to_greater() {
        let t = tree_of("x < y", "x,y");
        assert_eq!(t.op, Opcode::Greater);
        let t2 = tree_of("y > x", "x,y");
        assert!(t.same(&t2));
    }

    #[test]
    fn if_reconstructs_three_children() {
        let t = tree_of("if(x>0, x, 0-x)", "x");
        assert_eq!(t.op, Opcode::If);
        assert_eq!(t.params.len(), 3);
    }

    #[test]
    fn constants_fold_during_build() {
        let t = tree_of("2*3 + x", "x");
        assert_eq!(t.op, Opcode::Add);
        assert!(t.params.iter().any(|p| p.tree.value() == Some(&6.0)));
    }
}
