//! Constant folding on CodeTree nodes.
//!
//! Applied to every freshly formed node (during tree building and after each
//! rewrite). Folding flattens nested commutative chains, merges immediate
//! operands, cancels sign pairs, resolves certain comparisons through the
//! range analyzer, and collapses degenerate nodes. A fold never hides a
//! runtime error: evaluations with domain hazards (log of a non-positive
//! constant, division by a zero constant) are left in place.

use crate::{
    opcode::Opcode,
    optimizer::{
        codetree::{CodeTree, Param},
        range::{ValueRange, is_definitely_false, is_definitely_true, range_of},
    },
    scalar::Scalar,
};

/// Folds the given node in place. Children are assumed canonical; the node
/// is re-sorted and re-hashed before returning.
pub(crate) fn constant_fold<T: Scalar>(tree: &mut CodeTree<T>) {
    tree.rehash();
    match tree.op {
        Opcode::Add => fold_add(tree),
        Opcode::Mul => fold_mul(tree),
        Opcode::And | Opcode::Or | Opcode::AbsAnd | Opcode::AbsOr => fold_logic(tree),
        Opcode::Min | Opcode::Max => fold_minmax(tree),
        Opcode::If | Opcode::AbsIf => fold_if(tree),
        Opcode::Equal | Opcode::NEqual | Opcode::Greater | Opcode::GreaterOrEq => fold_comparison(tree),
        Opcode::Not | Opcode::NotNot | Opcode::AbsNot | Opcode::AbsNotNot => fold_not(tree),
        _ => fold_generic(tree),
    }
    tree.rehash();
}

/// Splices children of the same commutative opcode into the parent,
/// combining signs, until no nested chain remains.
fn flatten<T: Scalar>(tree: &mut CodeTree<T>, signed: bool) {
    let op = tree.op;
    let mut i = 0;
    while i < tree.params.len() {
        if tree.params[i].tree.op == op && (signed || !tree.params[i].sign) {
            let outer_sign = tree.params[i].sign;
            let inner = tree.params.remove(i);
            for mut p in inner.tree.params {
                p.sign ^= outer_sign;
                tree.params.insert(i, p);
                i += 1;
            }
        } else {
            i += 1;
        }
    }
}

fn fold_add<T: Scalar>(tree: &mut CodeTree<T>) {
    flatten(tree, true);

    // Merge immediates, applying the negation sign.
    let mut acc: Option<T> = None;
    let mut i = 0;
    while i < tree.params.len() {
        if let Some(v) = tree.params[i].tree.value() {
            let v = if tree.params[i].sign { v.neg() } else { v.clone() };
            acc = Some(match acc {
                Some(a) => a.add(&v),
                None => v,
            });
            tree.params.remove(i);
        } else {
            i += 1;
        }
    }

    cancel_sign_pairs(tree);

    if let Some(a) = acc {
        if a != T::zero() || tree.params.is_empty() {
            tree.add_param(Param::new(CodeTree::immed(a), false));
        }
    }

    match tree.params.len() {
        0 => tree.set_immed(T::zero()),
        1 if !tree.params[0].sign => {
            let child = *tree.params.pop().expect("single child").tree;
            tree.become_tree(child);
        }
        _ => {}
    }
}

fn fold_mul<T: Scalar>(tree: &mut CodeTree<T>) {
    flatten(tree, true);

    let any_signed = tree.params.iter().any(|p| p.sign);
    // An unsigned zero factor annihilates the product, provided no inverted
    // child could raise a division error at run time.
    if !any_signed
        && tree
            .params
            .iter()
            .any(|p| p.tree.value().is_some_and(|v| *v == T::zero()))
    {
        tree.set_immed(T::zero());
        return;
    }

    // Merge immediates; an inverted zero is left alone so the runtime error
    // survives.
    let mut acc: Option<T> = None;
    let mut i = 0;
    while i < tree.params.len() {
        let merged = match tree.params[i].tree.value() {
            Some(v) if !tree.params[i].sign => Some(v.clone()),
            Some(v) if *v != T::zero() => Some(T::one().div(v)),
            _ => None,
        };
        if let Some(v) = merged {
            acc = Some(match acc {
                Some(a) => a.mul(&v),
                None => v,
            });
            tree.params.remove(i);
        } else {
            i += 1;
        }
    }

    cancel_sign_pairs(tree);

    if let Some(a) = acc {
        if a != T::one() || tree.params.is_empty() {
            tree.add_param(Param::new(CodeTree::immed(a), false));
        }
    }

    match tree.params.len() {
        0 => tree.set_immed(T::one()),
        1 if !tree.params[0].sign => {
            let child = *tree.params.pop().expect("single child").tree;
            tree.become_tree(child);
        }
        _ => {}
    }
}

/// Removes pairs of equal subtrees with opposite signs (`x + (−x)`,
/// `x · (1/x)`).
fn cancel_sign_pairs<T: Scalar>(tree: &mut CodeTree<T>) {
    let mut i = 0;
    'outer: while i < tree.params.len() {
        for j in i + 1..tree.params.len() {
            if tree.params[i].sign != tree.params[j].sign && tree.params[i].tree.same(&tree.params[j].tree) {
                tree.params.remove(j);
                tree.params.remove(i);
                continue 'outer;
            }
        }
        i += 1;
    }
}

fn fold_logic<T: Scalar>(tree: &mut CodeTree<T>) {
    flatten(tree, false);
    let abs = matches!(tree.op, Opcode::AbsAnd | Opcode::AbsOr);
    let is_and = matches!(tree.op, Opcode::And | Opcode::AbsAnd);

    let mut i = 0;
    while i < tree.params.len() {
        let r = range_of(&tree.params[i].tree);
        let truth = if is_definitely_true(&r, abs) {
            Some(!tree.params[i].sign)
        } else if is_definitely_false(&r, abs) {
            Some(tree.params[i].sign)
        } else {
            None
        };
        match truth {
            Some(t) if t == is_and => {
                // Identity element: drop.
                tree.params.remove(i);
            }
            Some(_) => {
                // Absorbing element: short-circuit the whole node.
                tree.set_immed(if is_and { T::zero() } else { T::one() });
                return;
            }
            None => i += 1,
        }
    }

    match tree.params.len() {
        0 => tree.set_immed(if is_and { T::one() } else { T::zero() }),
        1 => {
            let p = tree.params.pop().expect("single child");
            let inner_abs = abs && range_of(&p.tree).known_non_negative();
            let op = match (p.sign, inner_abs) {
                (false, false) => Opcode::NotNot,
                (false, true) => Opcode::AbsNotNot,
                (true, false) => Opcode::Not,
                (true, true) => Opcode::AbsNot,
            };
            let child = *p.tree;
            tree.become_tree(CodeTree::func(op, [Param::new(child, false)]));
        }
        _ => {
            // De Morgan: an all-negated conjunction/disjunction becomes the
            // negated dual, shrinking the sign count.
            if tree.params.iter().all(|p| p.sign) {
                let non_negative = tree.params.iter().all(|p| range_of(&p.tree).known_non_negative());
                let dual = match (is_and, abs || non_negative) {
                    (true, false) => Opcode::Or,
                    (true, true) => Opcode::AbsOr,
                    (false, false) => Opcode::And,
                    (false, true) => Opcode::AbsAnd,
                };
                let not_op = if abs || non_negative { Opcode::AbsNot } else { Opcode::Not };
                let mut inner = CodeTree::func(
                    dual,
                    std::mem::take(&mut tree.params).into_iter().map(|mut p| {
                        p.sign = false;
                        p
                    }),
                );
                inner.rehash();
                tree.become_tree(CodeTree::func(not_op, [Param::new(inner, false)]));
            }
        }
    }
}

fn fold_minmax<T: Scalar>(tree: &mut CodeTree<T>) {
    flatten(tree, false);
    let is_min = tree.op == Opcode::Min;

    // Merge immediate children into the single best one.
    let mut best: Option<T> = None;
    let mut i = 0;
    while i < tree.params.len() {
        if let Some(v) = tree.params[i].tree.value() {
            let v = v.clone();
            best = Some(match best {
                Some(b) => {
                    if v.strict_lt(&b) == is_min {
                        v
                    } else {
                        b
                    }
                }
                None => v,
            });
            tree.params.remove(i);
        } else {
            i += 1;
        }
    }

    if let Some(b) = &best {
        // A constant dominated by every other child's range is dropped.
        let dominated = !tree.params.is_empty()
            && tree.params.iter().all(|p| {
                let r = range_of(&p.tree);
                if is_min {
                    r.max.as_ref().is_some_and(|m| m.less_eq(b))
                } else {
                    r.min.as_ref().is_some_and(|m| m.greater_eq(b))
                }
            });
        if !dominated {
            tree.add_param(Param::new(CodeTree::immed(b.clone()), false));
        }
    }

    // Equal children collapse into one.
    let mut i = 0;
    while i < tree.params.len() {
        let mut j = i + 1;
        while j < tree.params.len() {
            if tree.params[i].tree.same(&tree.params[j].tree) {
                tree.params.remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }

    if tree.params.len() == 1 {
        let child = *tree.params.pop().expect("single child").tree;
        tree.become_tree(child);
    }
}

fn fold_if<T: Scalar>(tree: &mut CodeTree<T>) {
    if tree.params.len() != 3 {
        return;
    }
    let abs = tree.op == Opcode::AbsIf;
    let cond_range = range_of(&tree.params[0].tree);
    let pick = if is_definitely_true(&cond_range, abs) {
        Some(1)
    } else if is_definitely_false(&cond_range, abs) {
        Some(2)
    } else if tree.params[1].tree.same(&tree.params[2].tree) {
        // Equal branches make the condition irrelevant.
        Some(1)
    } else {
        None
    };
    if let Some(i) = pick {
        let branch = *tree.params.remove(i).tree;
        tree.become_tree(branch);
    }
}

fn fold_comparison<T: Scalar>(tree: &mut CodeTree<T>) {
    if tree.params.len() != 2 {
        return;
    }
    let a = range_of(&tree.params[0].tree);
    let b = range_of(&tree.params[1].tree);
    let verdict = match tree.op {
        Opcode::Equal => compare_verdict(&a, &b).map(|ord| ord == CmpVerdict::Equal),
        Opcode::NEqual => compare_verdict(&a, &b).map(|ord| ord != CmpVerdict::Equal),
        Opcode::Greater => match (exact(&a), exact(&b)) {
            (Some(x), Some(y)) => Some(x.greater(y)),
            _ => range_greater(&a, &b, false),
        },
        Opcode::GreaterOrEq => match (exact(&a), exact(&b)) {
            (Some(x), Some(y)) => Some(x.greater_eq(y)),
            _ => range_greater(&a, &b, true),
        },
        _ => None,
    };
    if let Some(v) = verdict {
        tree.set_immed(if v { T::one() } else { T::zero() });
    }
}

#[derive(PartialEq)]
enum CmpVerdict {
    Equal,
    Distinct,
}

fn exact<'r, T: Scalar>(r: &'r ValueRange<T>) -> Option<&'r T> {
    match (&r.min, &r.max) {
        (Some(lo), Some(hi)) if lo == hi => Some(lo),
        _ => None,
    }
}

fn compare_verdict<T: Scalar>(a: &ValueRange<T>, b: &ValueRange<T>) -> Option<CmpVerdict> {
    if let (Some(x), Some(y)) = (exact(a), exact(b)) {
        return Some(if x.approx_eq(y) {
            CmpVerdict::Equal
        } else {
            CmpVerdict::Distinct
        });
    }
    // Disjoint by more than epsilon: definitely unequal.
    if let (Some(amin), Some(bmax)) = (&a.min, &b.max)
        && amin.greater(bmax)
    {
        return Some(CmpVerdict::Distinct);
    }
    if let (Some(bmin), Some(amax)) = (&b.min, &a.max)
        && bmin.greater(amax)
    {
        return Some(CmpVerdict::Distinct);
    }
    None
}

fn range_greater<T: Scalar>(a: &ValueRange<T>, b: &ValueRange<T>, or_equal: bool) -> Option<bool> {
    if let (Some(amin), Some(bmax)) = (&a.min, &b.max) {
        let holds = if or_equal { amin.greater_eq(bmax) } else { amin.greater(bmax) };
        if holds {
            return Some(true);
        }
    }
    if let (Some(amax), Some(bmin)) = (&a.max, &b.min) {
        let fails = if or_equal { amax.less(bmin) } else { amax.less_eq(bmin) };
        if fails {
            return Some(false);
        }
    }
    None
}

fn fold_not<T: Scalar>(tree: &mut CodeTree<T>) {
    let abs = matches!(tree.op, Opcode::AbsNot | Opcode::AbsNotNot);
    let negating = matches!(tree.op, Opcode::Not | Opcode::AbsNot);
    let r = range_of(&tree.params[0].tree);
    if is_definitely_true(&r, abs) {
        tree.set_immed(if negating { T::zero() } else { T::one() });
        return;
    }
    if is_definitely_false(&r, abs) {
        tree.set_immed(if negating { T::one() } else { T::zero() });
        return;
    }
    // NotNot over an already-logical operand is the operand itself.
    if !negating && tree.params[0].tree.is_logical() {
        let child = *tree.params.pop().expect("single child").tree;
        tree.become_tree(child);
    }
}

fn fold_generic<T: Scalar>(tree: &mut CodeTree<T>) {
    if tree.params.is_empty() || !tree.params.iter().all(|p| p.tree.is_immed() && !p.sign) {
        return;
    }
    if matches!(tree.op, Opcode::FCall | Opcode::PCall) {
        return;
    }
    let values: Vec<&T> = tree.params.iter().filter_map(|p| p.tree.value()).collect();
    if let Some(result) = eval_pure(tree.op, &values) {
        tree.set_immed(result);
    }
}

/// Evaluates a pure operation on constant operands. Returns `None` when the
/// operation is unknown here or when evaluating it would raise a runtime
/// error for these operands.
fn eval_pure<T: Scalar>(op: Opcode, v: &[&T]) -> Option<T> {
    let real_domain = !T::IS_COMPLEX;
    Some(match op {
        Opcode::Abs => v[0].abs(),
        Opcode::Sin => v[0].sin(),
        Opcode::Cos => v[0].cos(),
        Opcode::Tan => v[0].tan(),
        Opcode::Asin | Opcode::Acos => {
            if real_domain && T::one().strict_lt(&v[0].abs()) {
                return None;
            }
            if op == Opcode::Asin { v[0].asin() } else { v[0].acos() }
        }
        Opcode::Atan => v[0].atan(),
        Opcode::Sinh => v[0].sinh(),
        Opcode::Cosh => v[0].cosh(),
        Opcode::Tanh => v[0].tanh(),
        Opcode::Asinh => v[0].asinh(),
        Opcode::Acosh => {
            if real_domain && v[0].strict_lt(&T::one()) {
                return None;
            }
            v[0].acosh()
        }
        Opcode::Atanh => {
            if real_domain && !v[0].abs().strict_lt(&T::one()) {
                return None;
            }
            v[0].atanh()
        }
        Opcode::Exp => v[0].exp(),
        Opcode::Exp2 => v[0].exp2(),
        Opcode::Log | Opcode::Log2 | Opcode::Log10 => {
            if real_domain && !T::zero().strict_lt(v[0]) {
                return None;
            }
            match op {
                Opcode::Log => v[0].ln(),
                Opcode::Log2 => v[0].log2(),
                _ => v[0].log10(),
            }
        }
        Opcode::Log2By => {
            if real_domain && !T::zero().strict_lt(v[0]) {
                return None;
            }
            v[0].log2().mul(v[1])
        }
        Opcode::Sqrt => {
            if real_domain && v[0].strict_lt(&T::zero()) {
                return None;
            }
            v[0].sqrt()
        }
        Opcode::Cbrt => v[0].cbrt(),
        Opcode::Floor => v[0].floor(),
        Opcode::Ceil => v[0].ceil(),
        Opcode::Trunc => v[0].trunc(),
        Opcode::Int => v[0].round_half_away(),
        Opcode::Arg => v[0].arg(),
        Opcode::Conj => v[0].conj(),
        Opcode::Real => v[0].real(),
        Opcode::Imag => v[0].imag(),
        Opcode::Atan2 => v[0].atan2(v[1]),
        Opcode::Hypot => v[0].hypot(v[1]),
        Opcode::Polar => T::polar(v[0], v[1]),
        Opcode::Pow => v[0].pow(v[1]),
        Opcode::Mod => {
            if *v[1] == T::zero() {
                return None;
            }
            v[0].rem(v[1])
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, program::Data};

    fn folded(text: &str, vars: &str) -> CodeTree<f64> {
        let mut data: Data<f64> = Data::default();
        let map = parse::parse_variable_list(vars).unwrap();
        data.variables_amount = map.len() as u32;
        let program = parse::compile(text, &map, &data, false).unwrap();
        data.program = program;
        crate::optimizer::codetree::build_tree(&data).unwrap()
    }

    #[test]
    fn pure_constants_collapse() {
        assert_eq!(folded("2*3 + 4", "").value(), Some(&10.0));
        assert_eq!(folded("sin(0)", "").value(), Some(&0.0));
        assert_eq!(folded("min(3, 7)", "").value(), Some(&3.0));
    }

    #[test]
    fn additive_identity_is_dropped() {
        let t = folded("x + 0", "x");
        assert!(t.is_var());
    }

    #[test]
    fn multiplicative_identity_is_dropped() {
        let t = folded("x * 1", "x");
        assert!(t.is_var());
    }

    #[test]
    fn zero_annihilates_products() {
        let t = folded("x * 0", "x");
        assert_eq!(t.value(), Some(&0.0));
    }

    #[test]
    fn sign_pairs_cancel() {
        let t = folded("x - x", "x");
        assert_eq!(t.value(), Some(&0.0));
        let t = folded("(1/x) * x", "x");
        assert_eq!(t.value(), Some(&1.0));
    }

    #[test]
    fn nested_chains_flatten() {
        let t = folded("x + y + 1 + 2", "x,y");
        assert_eq!(t.op, Opcode::Add);
        assert_eq!(t.params.len(), 3);
    }

    #[test]
    fn if_with_certain_condition_collapses() {
        let t = folded("if(2, x, y)", "x,y");
        assert!(t.is_var());
        let t = folded("if(0, x, y)", "x,y");
        assert!(t.is_var());
    }

    #[test]
    fn comparison_of_separated_ranges_folds() {
        let t = folded("exp(x) >= -1", "x");
        assert_eq!(t.value(), Some(&1.0));
        let t = folded("sin(x) > 5", "x");
        assert_eq!(t.value(), Some(&0.0));
    }

    #[test]
    fn domain_errors_are_not_folded_away() {
        let t = folded("sqrt(0-4)", "");
        assert_eq!(t.op, Opcode::Sqrt);
        let t = folded("log(0)", "");
        assert_eq!(t.op, Opcode::Log);
    }

    #[test]
    fn logic_identities() {
        // A definitely-true operand is dropped from a conjunction.
        let t = folded("(x<1) & 2", "x");
        assert_eq!(t.op, Opcode::NotNot);
        // An absorbing operand collapses the disjunction.
        let t = folded("(x<1) | 2", "x");
        assert_eq!(t.value(), Some(&1.0));
    }
}
