//! Pattern matching and rule synthesis.
//!
//! `Any`-mode patterns are matched with backtracking: for each pattern
//! parameter in order, an unused child is sought; on failure the engine rolls
//! back to a snapshot (bindings, used-set, cursor) and tries another
//! combination. The attempt count is capped per rule; a pathological match
//! is abandoned and the rule skipped. Holder re-references compare by tree
//! hash. Bound subtrees are cloned into the match state so synthesis can
//! rebuild freely while the input tree is being mutated.

use crate::{
    opcode::Opcode,
    optimizer::{
        codetree::{CodeTree, Param},
        grammar::{
            Constness, Constraints, FnPattern, MAX_HOLDERS, Mode, Oneness, Replacement, Rule, Spec, SpecParam,
            SignClass, TypeReq, ValueClass,
        },
        range::range_of,
    },
    scalar::Scalar,
};

/// Cap on backtracking restarts for one rule application.
const MAX_BACKTRACKS: usize = 256;

#[derive(Clone)]
pub(crate) struct MatchState<T: Scalar> {
    holders: [Option<CodeTree<T>>; MAX_HOLDERS],
    rest: [Option<Vec<CodeTree<T>>>; 2],
    /// Indices of the top-level children the rule consumed.
    matched: Vec<usize>,
}

impl<T: Scalar> MatchState<T> {
    fn new() -> Self {
        Self {
            holders: std::array::from_fn(|_| None),
            rest: std::array::from_fn(|_| None),
            matched: Vec::new(),
        }
    }
}

/// Attempts to match `rule` against `tree`; on success returns the binding
/// environment.
pub(crate) fn match_rule<T: Scalar>(tree: &CodeTree<T>, rule: &Rule) -> Option<MatchState<T>> {
    if rule.input.op != tree.op {
        return None;
    }
    if rule.req == TypeReq::NotComplex && T::IS_COMPLEX {
        return None;
    }
    let mut state = MatchState::new();
    let mut backtracks = 0;
    if match_params(tree, &rule.input, &mut state, false, &mut backtracks) {
        Some(state)
    } else {
        None
    }
}

struct Snapshot<T: Scalar> {
    state: MatchState<T>,
    used: Vec<bool>,
    cursor: usize,
}

fn match_params<T: Scalar>(
    tree: &CodeTree<T>,
    pat: &FnPattern,
    state: &mut MatchState<T>,
    recursion: bool,
    backtracks: &mut usize,
) -> bool {
    let n = tree.params.len();
    match pat.mode {
        Mode::Positional => {
            if pat.params.len() != n {
                return false;
            }
            for (spec, child) in pat.params.iter().zip(&tree.params) {
                if spec.sign != child.sign {
                    return false;
                }
                if !match_spec(&child.tree, &spec.spec, state, backtracks) {
                    return false;
                }
            }
            if !recursion {
                state.matched.extend(0..n);
            }
            true
        }
        Mode::Any => {
            let has_rest = pat.params.iter().any(|s| matches!(s.spec, Spec::Rest(_)));
            let explicit = pat.params.iter().filter(|s| !matches!(s.spec, Spec::Rest(_))).count();
            if explicit > n {
                return false;
            }
            if recursion && !has_rest && explicit != n {
                return false;
            }

            let mut used = vec![false; n];
            let mut positions: Vec<Snapshot<T>> = Vec::with_capacity(pat.params.len());
            let mut a = 0;
            let mut resume_at: Option<usize> = None;
            while a < pat.params.len() {
                let spec = &pat.params[a];
                if matches!(spec.spec, Spec::Rest(_)) {
                    if positions.len() <= a {
                        positions.push(Snapshot {
                            state: state.clone(),
                            used: used.clone(),
                            cursor: 0,
                        });
                    }
                    a += 1;
                    continue;
                }
                let start = match resume_at.take() {
                    Some(b) => b,
                    None => {
                        positions.truncate(a);
                        positions.push(Snapshot {
                            state: state.clone(),
                            used: used.clone(),
                            cursor: 0,
                        });
                        0
                    }
                };
                let mut found = None;
                for b in start..n {
                    if used[b] || tree.params[b].sign != spec.sign {
                        continue;
                    }
                    if match_spec(&tree.params[b].tree, &spec.spec, state, backtracks) {
                        found = Some(b);
                        break;
                    }
                    // A failed candidate may have polluted the bindings.
                    *state = positions[a].state.clone();
                }
                match found {
                    Some(b) => {
                        used[b] = true;
                        positions[a].cursor = b + 1;
                        if !recursion {
                            state.matched.push(b);
                        }
                        a += 1;
                    }
                    None => {
                        // Backtrack to the nearest earlier choice point.
                        loop {
                            if a == 0 {
                                return false;
                            }
                            a -= 1;
                            if matches!(pat.params[a].spec, Spec::Rest(_)) {
                                continue;
                            }
                            *backtracks += 1;
                            if *backtracks > MAX_BACKTRACKS {
                                tracing::warn!("backtrack limit hit, skipping rule");
                                return false;
                            }
                            let snap = &positions[a];
                            if snap.cursor < n {
                                *state = snap.state.clone();
                                used = snap.used.clone();
                                resume_at = Some(snap.cursor);
                                break;
                            }
                        }
                    }
                }
            }

            // Feed the rest-holders the remaining children.
            for spec in pat.params {
                if let Spec::Rest(k) = &spec.spec {
                    let mut collected = Vec::new();
                    for (b, child) in tree.params.iter().enumerate() {
                        if !used[b] && child.sign == spec.sign {
                            used[b] = true;
                            if !recursion {
                                state.matched.push(b);
                            }
                            collected.push((*child.tree).clone());
                        }
                    }
                    let slot = &mut state.rest[usize::from(*k)];
                    match slot {
                        Some(existing) => {
                            // A repeated rest-holder must capture the same
                            // sequence of subtrees.
                            if existing.len() != collected.len()
                                || existing.iter().zip(&collected).any(|(x, y)| !x.same(y))
                            {
                                return false;
                            }
                        }
                        None => *slot = Some(collected),
                    }
                }
            }
            if recursion && used.iter().any(|u| !u) {
                return false;
            }
            true
        }
    }
}

fn match_spec<T: Scalar>(
    tree: &CodeTree<T>,
    spec: &Spec,
    state: &mut MatchState<T>,
    backtracks: &mut usize,
) -> bool {
    match spec {
        Spec::Num(c) => match (tree.value(), T::from_const(*c)) {
            (Some(v), Some(expected)) => v.approx_eq(&expected),
            _ => false,
        },
        Spec::Hold(i, cons) => {
            if !check_constraints(tree, cons) {
                return false;
            }
            match &state.holders[usize::from(*i)] {
                Some(bound) => bound.same(tree),
                None => {
                    state.holders[usize::from(*i)] = Some(tree.clone());
                    true
                }
            }
        }
        Spec::Func(pat) => tree.op == pat.op && match_params(tree, pat, state, true, backtracks),
        Spec::Group(op, specs) => match (tree.value(), group_value(*op, specs, state)) {
            (Some(v), Some(expected)) => v.approx_eq(&expected),
            _ => false,
        },
        Spec::Rest(_) => false,
    }
}

fn check_constraints<T: Scalar>(tree: &CodeTree<T>, cons: &Constraints) -> bool {
    if cons.constness == Constness::Const && !tree.is_immed() {
        return false;
    }
    match cons.value {
        ValueClass::Any => {}
        ValueClass::EvenInt => {
            if !tree.value().is_some_and(Scalar::is_even_integer) {
                return false;
            }
        }
        ValueClass::OddInt => {
            if !tree.value().is_some_and(Scalar::is_odd_integer) {
                return false;
            }
        }
        ValueClass::Int => {
            if !tree.value().is_some_and(Scalar::is_integer) {
                return false;
            }
        }
        ValueClass::NonInt => {
            if !tree.value().is_some_and(|v| !v.is_integer()) {
                return false;
            }
        }
        ValueClass::Logical => {
            if !tree.is_logical() {
                return false;
            }
        }
    }
    match cons.sign {
        SignClass::Any => {}
        SignClass::Positive => {
            if !range_of(tree).known_non_negative() {
                return false;
            }
        }
        SignClass::Negative => {
            if !range_of(tree).known_non_positive() {
                return false;
            }
        }
    }
    match cons.oneness {
        Oneness::Any => {}
        Oneness::One => {
            if !tree.value().is_some_and(|v| v.approx_eq(&T::one())) {
                return false;
            }
        }
        Oneness::NotOne => {
            if tree.value().is_some_and(|v| v.approx_eq(&T::one())) {
                return false;
            }
        }
    }
    true
}

/// Evaluates a `Group` spec numerically from the bound holders.
fn group_value<T: Scalar>(op: Opcode, specs: &[SpecParam], state: &MatchState<T>) -> Option<T> {
    let mut values = Vec::with_capacity(specs.len());
    for s in specs {
        let v = match &s.spec {
            Spec::Num(c) => T::from_const(*c)?,
            Spec::Hold(i, _) => state.holders[usize::from(*i)].as_ref()?.value()?.clone(),
            Spec::Group(op, inner) => group_value(*op, inner, state)?,
            _ => return None,
        };
        let v = match (op, s.sign) {
            (Opcode::Add, true) => v.neg(),
            (Opcode::Mul, true) => {
                if v == T::zero() {
                    return None;
                }
                T::one().div(&v)
            }
            _ => v,
        };
        values.push(v);
    }
    match op {
        Opcode::Add => Some(values.iter().fold(T::zero(), |a, v| a.add(v))),
        Opcode::Mul => Some(values.iter().fold(T::one(), |a, v| a.mul(v))),
        Opcode::Pow if values.len() == 2 => Some(values[0].pow(&values[1])),
        _ => None,
    }
}

/// Applies the rule's replacement to the matched tree. Returns `false` (tree
/// untouched) if synthesis referenced an unbound holder — a rule-table bug
/// that production builds skip.
pub(crate) fn apply_replacement<T: Scalar>(tree: &mut CodeTree<T>, rule: &Rule, state: &MatchState<T>) -> bool {
    match &rule.repl {
        Replacement::NewTree(spec) => {
            let Some(new_tree) = synth_spec(&spec.spec, state) else {
                return false;
            };
            tree.become_tree(new_tree);
            true
        }
        Replacement::Params(specs) => {
            // Build the new parameters first so a failed synthesis leaves
            // the tree intact.
            let mut additions: Vec<Param<T>> = Vec::new();
            for spec in *specs {
                match &spec.spec {
                    Spec::Rest(k) => {
                        let Some(trees) = &state.rest[usize::from(*k)] else {
                            return false;
                        };
                        additions.extend(trees.iter().map(|t| Param::new(t.clone(), spec.sign)));
                    }
                    other => {
                        let Some(t) = synth_spec(other, state) else {
                            return false;
                        };
                        additions.push(Param::new(t, spec.sign));
                    }
                }
            }
            let mut doomed = state.matched.clone();
            doomed.sort_unstable();
            for index in doomed.into_iter().rev() {
                tree.del_param(index);
            }
            for param in additions {
                tree.add_param(param);
            }
            true
        }
    }
}

/// Renders a spec into a fresh tree using the binding environment.
fn synth_spec<T: Scalar>(spec: &Spec, state: &MatchState<T>) -> Option<CodeTree<T>> {
    match spec {
        Spec::Num(c) => Some(CodeTree::immed(T::from_const(*c).unwrap_or_else(|| T::from_f64(*c)))),
        Spec::Hold(i, _) => state.holders[usize::from(*i)].clone(),
        Spec::Func(pat) => {
            let mut params = Vec::with_capacity(pat.params.len());
            for sp in pat.params {
                match &sp.spec {
                    Spec::Rest(k) => {
                        let trees = state.rest[usize::from(*k)].as_ref()?;
                        params.extend(trees.iter().map(|t| Param::new(t.clone(), sp.sign)));
                    }
                    other => params.push(Param::new(synth_spec(other, state)?, sp.sign)),
                }
            }
            Some(CodeTree::func(pat.op, params))
        }
        Spec::Group(op, specs) => Some(CodeTree::immed(group_value(*op, specs, state)?)),
        Spec::Rest(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::grammar::{INTERMEDIATE_RULES, Rule};

    fn find_rule(op: Opcode, index: usize) -> &'static Rule {
        INTERMEDIATE_RULES
            .iter()
            .filter(|r| r.input.op == op)
            .nth(index)
            .expect("rule present")
    }

    fn add_of(children: Vec<(CodeTree<f64>, bool)>) -> CodeTree<f64> {
        CodeTree::func(
            Opcode::Add,
            children.into_iter().map(|(t, s)| Param::new(t, s)),
        )
    }

    #[test]
    fn pythagorean_rule_matches_any_order() {
        let x = CodeTree::var(0);
        let sin2 = CodeTree::func(
            Opcode::Pow,
            [
                Param::new(CodeTree::func(Opcode::Sin, [Param::new(x.clone(), false)]), false),
                Param::new(CodeTree::immed(2.0), false),
            ],
        );
        let cos2 = CodeTree::func(
            Opcode::Pow,
            [
                Param::new(CodeTree::func(Opcode::Cos, [Param::new(x.clone(), false)]), false),
                Param::new(CodeTree::immed(2.0), false),
            ],
        );
        let extra = CodeTree::var(1);

        // Canonical sorting may put the terms in any order; the matcher must
        // still find the pair.
        let mut tree = add_of(vec![(extra.clone(), false), (cos2, false), (sin2, false)]);
        let rule = find_rule(Opcode::Add, 0);
        let state = match_rule(&tree, rule).expect("must match");
        assert_eq!(state.matched.len(), 3, "pair plus rest-captured child");
        assert!(apply_replacement(&mut tree, rule, &state));
        crate::optimizer::fold::constant_fold(&mut tree);
        assert_eq!(tree.op, Opcode::Add);
        assert_eq!(tree.params.len(), 2);
    }

    #[test]
    fn mismatched_arguments_do_not_match() {
        let sin2 = CodeTree::func(
            Opcode::Pow,
            [
                Param::new(
                    CodeTree::func(Opcode::Sin, [Param::new(CodeTree::<f64>::var(0), false)]),
                    false,
                ),
                Param::new(CodeTree::immed(2.0), false),
            ],
        );
        let cos2_other = CodeTree::func(
            Opcode::Pow,
            [
                Param::new(
                    CodeTree::func(Opcode::Cos, [Param::new(CodeTree::<f64>::var(1), false)]),
                    false,
                ),
                Param::new(CodeTree::immed(2.0), false),
            ],
        );
        let tree = add_of(vec![(sin2, false), (cos2_other, false)]);
        assert!(match_rule(&tree, find_rule(Opcode::Add, 0)).is_none());
    }

    #[test]
    fn repeated_holder_requires_equal_subtrees() {
        // x + x matches; x + y must not.
        let rule = find_rule(Opcode::Add, 2);
        let same = add_of(vec![(CodeTree::var(0), false), (CodeTree::var(0), false)]);
        assert!(match_rule(&same, rule).is_some());
        let diff = add_of(vec![(CodeTree::var(0), false), (CodeTree::var(1), false)]);
        assert!(match_rule(&diff, rule).is_none());
    }
}
