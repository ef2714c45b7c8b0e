//! Phase-ordered fixpoint driver for the rewrite engine.
//!
//! Each phase walks the tree in post-order, trying its rule bucket at every
//! node until nothing changes, then moves on. A memo of already-optimized
//! subtree hashes short-circuits repeat work. Rules are hand-curated to
//! strictly reduce the tree measure; as a safety net the total number of
//! applications is bounded by a multiple of the node count, and hitting the
//! bound is logged as an internal warning rather than surfaced as an error.

use ahash::AHashSet;

use crate::{
    optimizer::{
        codetree::CodeTree,
        fold::constant_fold,
        grammar::{Rule, phases},
        matching::{apply_replacement, match_rule},
    },
    scalar::Scalar,
};

/// Rule applications allowed per node before the safety bound trips.
const ITERATION_FACTOR: usize = 16;

pub(crate) fn optimize_tree<T: Scalar>(tree: &mut CodeTree<T>) {
    constant_fold(tree);
    for (phase, rules) in phases() {
        let budget = ITERATION_FACTOR * tree.node_count() + 64;
        let mut steps = 0_usize;
        let mut memo = AHashSet::new();
        apply_phase(tree, rules, &mut memo, &mut steps, budget);
        if steps >= budget {
            tracing::warn!(phase, steps, "rewrite iteration bound reached");
        } else {
            tracing::debug!(phase, steps, "phase complete");
        }
    }
}

fn apply_phase<T: Scalar>(
    tree: &mut CodeTree<T>,
    rules: &[Rule],
    memo: &mut AHashSet<u128>,
    steps: &mut usize,
    budget: usize,
) -> bool {
    if memo.contains(&tree.hash) {
        return false;
    }
    let mut changed_once = false;
    loop {
        if *steps >= budget {
            break;
        }
        let mut changed = false;
        for i in 0..tree.params.len() {
            if apply_phase(&mut tree.params[i].tree, rules, memo, steps, budget) {
                changed = true;
            }
        }
        if changed {
            // Children mutated underneath: restore this node's canonical
            // form before matching.
            constant_fold(tree);
        }
        let op = tree.op;
        for rule in rules.iter().filter(|r| r.input.op == op) {
            if let Some(state) = match_rule(tree, rule)
                && apply_replacement(tree, rule, &state)
            {
                constant_fold(tree);
                *steps += 1;
                changed = true;
                break;
            }
        }
        if !changed {
            break;
        }
        changed_once = true;
    }
    memo.insert(tree.hash);
    changed_once
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{opcode::Opcode, parse, program::Data};

    fn optimized(text: &str, vars: &str) -> CodeTree<f64> {
        let mut data: Data<f64> = Data::default();
        let map = parse::parse_variable_list(vars).unwrap();
        data.variables_amount = map.len() as u32;
        let program = parse::compile(text, &map, &data, false).unwrap();
        data.program = program;
        let mut tree = crate::optimizer::codetree::build_tree(&data).unwrap();
        optimize_tree(&mut tree);
        tree
    }

    #[test]
    fn pythagorean_identity_folds_to_one() {
        let t = optimized("sin(x)^2 + cos(x)^2", "x");
        assert_eq!(t.value(), Some(&1.0));
    }

    #[test]
    fn pythagorean_identity_leaves_rest_alone() {
        let t = optimized("sin(x)^2 + cos(x)^2 + tan(y)^2", "x,y");
        assert_eq!(t.op, Opcode::Add);
        // 1 + tan(y)^2 — no sin or cos anywhere in the tree.
        fn contains(tree: &CodeTree<f64>, op: Opcode) -> bool {
            tree.op == op || tree.params.iter().any(|p| contains(&p.tree, op))
        }
        assert!(!contains(&t, Opcode::Sin));
        assert!(!contains(&t, Opcode::Cos));
        assert!(contains(&t, Opcode::Tan));
    }

    #[test]
    fn log_of_exp_unwraps() {
        let t = optimized("log(exp(x))", "x");
        assert!(t.is_var());
    }

    #[test]
    fn exp_of_log_unwraps() {
        let t = optimized("exp(log(x))", "x");
        assert!(t.is_var());
    }

    #[test]
    fn double_negation_lowers() {
        let t = optimized("!(!(x<1))", "x");
        // not(not(x<1)) => notnot(x<1) => x<1 (logical operand)
        assert_eq!(t.op, Opcode::Greater);
    }

    #[test]
    fn repeated_multiplication_becomes_power() {
        let t = optimized("x*x*x*x", "x");
        assert_eq!(t.op, Opcode::Pow);
        assert_eq!(t.params[1].tree.value(), Some(&4.0));
    }

    #[test]
    fn merged_exponents() {
        let t = optimized("x^3 * x^5", "x");
        assert_eq!(t.op, Opcode::Pow);
        assert_eq!(t.params[1].tree.value(), Some(&8.0));
    }

    #[test]
    fn fma_contraction_runs_last() {
        let t = optimized("a*b + c", "a,b,c");
        assert_eq!(t.op, Opcode::Fma);
        assert_eq!(t.params.len(), 3);
    }

    #[test]
    fn abs_of_even_power_is_dropped() {
        let t = optimized("abs(x^2)", "x");
        assert_eq!(t.op, Opcode::Pow);
    }
}
