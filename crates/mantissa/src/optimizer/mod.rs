//! The algebraic optimizer.
//!
//! Pipeline: bytecode → [`codetree`] working form → constant folding and the
//! phase-ordered [`rewrite`] engine → [`emit`] back to bytecode, with integer
//! powers lowered by the [`powi`] sequence synthesizer.
//!
//! The optimizer never fails on a well-formed program: anything it cannot
//! model is left untouched, and internal anomalies merely skip the offending
//! rule.

pub(crate) mod codetree;
pub(crate) mod emit;
pub(crate) mod fold;
pub(crate) mod grammar;
pub(crate) mod matching;
pub(crate) mod powi;
pub(crate) mod range;
pub(crate) mod rewrite;

use crate::{program::Data, scalar::Scalar};

/// Optimizes the compiled program in `data` in place.
pub(crate) fn optimize_program<T: Scalar>(data: &mut Data<T>) {
    if data.program.is_empty() {
        return;
    }
    let Some(mut tree) = codetree::build_tree(data) else {
        tracing::warn!("program not representable as a code tree; left unoptimized");
        return;
    };
    let before = data.program.code.len();
    rewrite::optimize_tree(&mut tree);
    data.program = emit::synthesize(&tree);
    tracing::debug!(before, after = data.program.code.len(), "optimized program");
}
