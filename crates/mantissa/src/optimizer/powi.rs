//! Integer-power sequence synthesis.
//!
//! Emits a bytecode fragment computing `base^n` (or `base·n` through the
//! additive variant) using only cumulation, squaring, duplication and
//! pop/move, minimizing the estimated instruction cost. A 256-entry table
//! gives the best split for small exponents; larger odd exponents use
//! windowed exponentiation. A cache of reusable intermediate powers keeps
//! repeatedly-needed factors on the stack, and `PopNMov` restores the stack
//! shape afterwards. If the fragment would exceed the length cap the whole
//! synthesis is rolled back and the caller falls back to the generic opcode.

use crate::{
    opcode::Opcode,
    optimizer::{
        codetree::CodeTree,
        emit::{Synth, synth_node},
    },
    scalar::Scalar,
};

/// Longest allowed `base^n` fragment, in instruction words.
const MAX_POWI_BYTECODE_LENGTH: usize = 15;
/// Longest allowed `base·n` fragment.
const MAX_MULI_BYTECODE_LENGTH: usize = 5;

const POWI_WINDOW_SIZE: u32 = 3;
const POWI_CACHE_SIZE: usize = 256;

/// Best-split table: for each exponent below 256, the `half` such that
/// computing `base^half` and `base^(n-half)` and combining is optimal for
/// stack-machine evaluation. Negative entries denote an inverse-combined
/// half.
#[rustfmt::skip]
const POWI_TABLE: [i8; 256] = [
      0,   1,   1,   1,   2,   1,   3,   1, /*   0 -   7 */
      4,   1,   5,   1,   6,   1,  -2,   5, /*   8 -  15 */
      8,   1,   9,   1,  10,  -3,  11,   1, /*  16 -  23 */
     12,   5,  13,   9,  14,   1,  15,   1, /*  24 -  31 */
     16,   1,  17,  -5,  18,   1,  19,  13, /*  32 -  39 */
     20,   1,  21,   1,  22,   9,  -2,   1, /*  40 -  47 */
     24,   1,  25,  17,  26,   1,  27,  11, /*  48 -  55 */
     28,   1,  29,   8,  30,   1,  -2,   1, /*  56 -  63 */
     32,   1,  33,   1,  34,   1,  35,   1, /*  64 -  71 */
     36,   1,  37,  25,  38, -11,  39,   1, /*  72 -  79 */
     40,   9,  41,   1,  42,  17,   1,  29, /*  80 -  87 */
     44,   1,  45,   1,  46,  -3,  32,  19, /*  88 -  95 */
     48,   1,  49,  33,  50,   1,  51,   1, /*  96 - 103 */
     52,  35,  53,   8,  54,   1,  55,  37, /* 104 - 111 */
     56,   1,  57,  -5,  58,  13,  59, -17, /* 112 - 119 */
     60,   1,  61,  41,  62,  25,  -2,   1, /* 120 - 127 */
     64,   1,  65,   1,  66,   1,  67,  45, /* 128 - 135 */
     68,   1,  69,   1,  70,  48,  16,   8, /* 136 - 143 */
     72,   1,  73,  49,  74,   1,  75,   1, /* 144 - 151 */
     76,  17,   1,  -5,  78,   1,  32,  53, /* 152 - 159 */
     80,   1,  81,   1,  82,  33,   1,   2, /* 160 - 167 */
     84,   1,  85,  57,  86,   8,  87,  35, /* 168 - 175 */
     88,   1,  89,   1,  90,   1,  91,  61, /* 176 - 183 */
     92,  37,  93,  17,  94,  -3,  64,   2, /* 184 - 191 */
     96,   1,  97,  65,  98,   1,  99,   1, /* 192 - 199 */
    100,  67, 101,   8, 102,  41, 103,  69, /* 200 - 207 */
    104,   1, 105,  16, 106,  24, 107,   1, /* 208 - 215 */
    108,   1, 109,  73, 110,  17, 111,   1, /* 216 - 223 */
    112,  45, 113,  32, 114,   1, 115, -33, /* 224 - 231 */
    116,   1, 117,  -5, 118,  48, 119,   1, /* 232 - 239 */
    120,   1, 121,  81, 122,  49, 123,  13, /* 240 - 247 */
    124,   1, 125,   1, 126,   1,  -2,  85, /* 248 - 255 */
];

/// Opcode selection for one cumulation family.
pub(crate) struct SequenceOp {
    /// Identity value pushed for a zero count.
    base_value: i64,
    /// Unary flip applied for negative counts.
    op_flip: Opcode,
    op_normal: Opcode,
    op_normal_flip: Opcode,
    op_inverse: Opcode,
    op_inverse_flip: Opcode,
}

/// `base^n` through multiplication.
pub(crate) const MUL_SEQUENCE: SequenceOp = SequenceOp {
    base_value: 1,
    op_flip: Opcode::Inv,
    op_normal: Opcode::Mul,
    op_normal_flip: Opcode::Mul,
    op_inverse: Opcode::Div,
    op_inverse_flip: Opcode::RDiv,
};

/// `base·n` through addition (integer scaling).
pub(crate) const ADD_SEQUENCE: SequenceOp = SequenceOp {
    base_value: 0,
    op_flip: Opcode::Neg,
    op_normal: Opcode::Add,
    op_normal_flip: Opcode::Add,
    op_inverse: Opcode::Sub,
    op_inverse_flip: Opcode::RSub,
};

/// Cap selector for the two callers.
pub(crate) fn powi_cap() -> usize {
    MAX_POWI_BYTECODE_LENGTH
}

pub(crate) fn muli_cap() -> usize {
    MAX_MULI_BYTECODE_LENGTH
}

fn best_half(count: i64) -> i64 {
    if count < POWI_TABLE.len() as i64 {
        i64::from(POWI_TABLE[count as usize])
    } else if count & 1 != 0 {
        count & ((1 << POWI_WINDOW_SIZE) - 1)
    } else {
        count / 2
    }
}

struct PowiCache {
    /// Stack position of each cached power, or -1.
    position: [i32; POWI_CACHE_SIZE],
    /// How many more times each power will be needed.
    needed: [i32; POWI_CACHE_SIZE],
}

impl PowiCache {
    fn new() -> Self {
        Self {
            position: [-1; POWI_CACHE_SIZE],
            needed: [0; POWI_CACHE_SIZE],
        }
    }
}

/// Pre-pass deciding which intermediate counts will be needed repeatedly.
fn plan_cache(count: i64, generated: &mut [bool; POWI_CACHE_SIZE], needed: &mut [i32; POWI_CACHE_SIZE], need_count: i32) {
    if count < 1 {
        return;
    }
    if (count as usize) < POWI_CACHE_SIZE {
        needed[count as usize] += need_count;
        if generated[count as usize] {
            return;
        }
    }

    let mut half = best_half(count);
    let mut otherhalf = count - half;
    if half > otherhalf || half < 0 {
        std::mem::swap(&mut half, &mut otherhalf);
    }

    if half == otherhalf {
        plan_cache(half, generated, needed, 2);
    } else {
        plan_cache(half, generated, needed, 1);
        plan_cache(otherhalf.abs(), generated, needed, 1);
    }

    if (count as usize) < POWI_CACHE_SIZE {
        generated[count as usize] = true;
    }
}

/// Emits a sequence computing `base_tree ^ count` (or `· count` for the add
/// sequence). Returns false — with all emission rolled back — when the
/// fragment would exceed `max_grow` instruction words.
pub(crate) fn assemble_sequence<T: Scalar>(
    synth: &mut Synth<T>,
    base_tree: &CodeTree<T>,
    mut count: i64,
    seq: &SequenceOp,
    max_grow: usize,
) -> bool {
    // Negating i64::MIN would overflow; that exponent never benefits anyway.
    if count == i64::MIN {
        return false;
    }
    let backup = synth.checkpoint();

    if count == 0 {
        synth.push_const(T::from_i64(seq.base_value));
    } else {
        synth_node(base_tree, synth);
        if count < 0 {
            synth.add_op(seq.op_flip);
            count = -count;
        }

        if count > 1 {
            let mut generated = [false; POWI_CACHE_SIZE];
            let mut cache = PowiCache::new();
            generated[1] = true;
            plan_cache(count, &mut generated, &mut cache.needed, 1);

            cache.position[1] = synth.stack_cur() as i32 - 1;

            let stacktop_desired = synth.stack_cur();
            let result = subdivide(count, &mut cache, seq, synth);

            let n_excess = synth.stack_cur() - stacktop_desired;
            if n_excess > 0 || result.stack_pos != stacktop_desired - 1 {
                // Discard the cached intermediates below the result.
                synth.add_op(Opcode::PopNMov);
                synth.add_word((stacktop_desired - 1) as u32);
                synth.add_word(result.stack_pos as u32);
                synth.simu_pop(n_excess);
            }
        }
    }

    if synth.grown_since(&backup) > max_grow {
        synth.rollback(backup);
        return false;
    }
    true
}

#[derive(Clone, Copy)]
struct Subdivided {
    stack_pos: usize,
    /// Which cache entry this value is, or -1.
    cache_val: i64,
}

fn subdivide<T: Scalar>(count: i64, cache: &mut PowiCache, seq: &SequenceOp, synth: &mut Synth<T>) -> Subdivided {
    if (count as usize) < POWI_CACHE_SIZE && cache.position[count as usize] >= 0 {
        return Subdivided {
            stack_pos: cache.position[count as usize] as usize,
            cache_val: count,
        };
    }

    let mut half = best_half(count);
    let mut otherhalf = count - half;
    if half > otherhalf || half < 0 {
        std::mem::swap(&mut half, &mut otherhalf);
    }

    let mut result = if half == otherhalf {
        let half_res = subdivide(half, cache, seq, synth);
        // Self-cumulate the subdivision result.
        make_result(half_res, half_res, cache, seq.op_normal, seq.op_normal_flip, synth)
    } else {
        let half_res = subdivide(half, cache, seq, synth);
        let other_res = subdivide(otherhalf.abs(), cache, seq, synth);
        let (op, op_flip) = if otherhalf > 0 {
            (seq.op_normal, seq.op_normal_flip)
        } else {
            (seq.op_inverse, seq.op_inverse_flip)
        };
        make_result(half_res, other_res, cache, op, op_flip, synth)
    };

    if result.cache_val < 0 && (count as usize) < POWI_CACHE_SIZE {
        cache.position[count as usize] = result.stack_pos as i32;
        result.cache_val = count;
    }
    result
}

fn make_result<T: Scalar>(
    a: Subdivided,
    b: Subdivided,
    cache: &mut PowiCache,
    op: Opcode,
    op_flip: Opcode,
    synth: &mut Synth<T>,
) -> Subdivided {
    // Decide whether a and b may be trampled over.
    let mut a_needed = 0;
    let mut b_needed = 0;
    if a.cache_val >= 0 {
        cache.needed[a.cache_val as usize] -= 1;
        a_needed = cache.needed[a.cache_val as usize];
    }
    if b.cache_val >= 0 {
        cache.needed[b.cache_val as usize] -= 1;
        b_needed = cache.needed[b.cache_val as usize];
    }

    let mut apos = a.stack_pos;
    let mut bpos = b.stack_pos;
    let mut flipped = false;

    let dup_both = |synth: &mut Synth<T>, apos: &mut usize, bpos: &mut usize, flipped: &mut bool| {
        if *apos < *bpos {
            std::mem::swap(apos, bpos);
            *flipped = !*flipped;
        }
        // Push the higher-address value first to improve the odds of Dup.
        synth.dup_fetch(*apos);
        let second = if *apos == *bpos { synth.stack_cur() - 1 } else { *bpos };
        synth.dup_fetch(second);
    };

    let top = synth.stack_cur() - 1;
    if a_needed > 0 && b_needed > 0 {
        dup_both(synth, &mut apos, &mut bpos, &mut flipped);
    } else if a_needed > 0 {
        if bpos != top {
            dup_both(synth, &mut apos, &mut bpos, &mut flipped);
        } else {
            synth.dup_fetch(apos);
            flipped = !flipped;
        }
    } else if b_needed > 0 {
        if apos != top {
            dup_both(synth, &mut apos, &mut bpos, &mut flipped);
        } else {
            synth.dup_fetch(bpos);
        }
    } else if apos == bpos && apos == top {
        synth.dup_fetch(apos);
    } else if apos == top && bpos == synth.stack_cur() - 2 {
        flipped = !flipped;
    } else if apos == synth.stack_cur() - 2 && bpos == top {
        // Operands already in place.
    } else if apos == top {
        synth.dup_fetch(bpos);
    } else if bpos == top {
        synth.dup_fetch(apos);
        flipped = !flipped;
    } else {
        dup_both(synth, &mut apos, &mut bpos, &mut flipped);
    }

    synth.add_op(if flipped { op_flip } else { op });
    synth.simu_pop(1);
    Subdivided {
        stack_pos: synth.stack_cur() - 1,
        cache_val: -1,
    }
}
