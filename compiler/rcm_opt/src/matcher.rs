//! Identical-instruction matching for sinking.
//!
//! Two instructions in different predecessors of a block `B` are
//! interchangeable when they perform the same operation on operands that
//! are either the same value, or different values that both predecessors
//! pass to the same parameter of `B`. In the second case the sunk copy must
//! read that parameter instead of its original operand.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use rcm_ir::{BlockId, Function, Instr, Terminator, ValueId};

/// How one operand of a matched pair relates to its counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandRelation {
    /// Both instructions read the same value.
    AlwaysEqual,
    /// The operands differ but are passed to the same parameter of the
    /// common successor, so they agree once the instruction is moved there.
    EqualAfterMove,
}

/// Relation of every operand of a matched instruction, in operand order.
pub type OperandRelations = SmallVec<[OperandRelation; 4]>;

/// Maps a value passed by a predecessor's `br` to the index of the
/// successor parameter receiving it.
#[derive(Debug, Default)]
pub struct ArgIndexMap {
    map: FxHashMap<(ValueId, BlockId), usize>,
}

impl ArgIndexMap {
    /// Index the `br` arguments every block in `preds` passes to `succ`.
    /// A value passed twice maps to its first position.
    pub fn build(func: &Function, preds: &[BlockId], succ: BlockId) -> Self {
        let mut map = FxHashMap::default();
        for &pred in preds {
            if let Terminator::Br { target, args } = func.terminator(pred) {
                if *target != succ {
                    continue;
                }
                for (index, &arg) in args.iter().enumerate() {
                    map.entry((arg, pred)).or_insert(index);
                }
            }
        }
        Self { map }
    }

    /// Parameter index `value` is passed to from `pred`.
    #[inline]
    pub fn get(&self, value: ValueId, pred: BlockId) -> Option<usize> {
        self.map.get(&(value, pred)).copied()
    }
}

/// Returns `true` if both instructions produce values of the same type, or
/// neither produces a value.
fn same_result_type(func: &Function, a: &Instr, b: &Instr) -> bool {
    match (a.dst, b.dst) {
        (Some(x), Some(y)) => func.value_type(x) == func.value_type(y),
        (None, None) => true,
        _ => false,
    }
}

/// Returns `true` if `a` and `b` are the same operation on the same
/// operands with the same result type.
pub fn is_identical(func: &Function, a: &Instr, b: &Instr) -> bool {
    a.kind == b.kind && same_result_type(func, a, b)
}

/// Match `candidate` (in `candidate_block`) against `other` (in
/// `other_block`).
///
/// `required` holds the relation already chosen for each operand by
/// earlier matches of the same candidate (`None` where nothing is fixed
/// yet); the result agrees with it wherever it is set. Returns the
/// relation of every operand on success.
pub fn match_instructions(
    func: &Function,
    args: &ArgIndexMap,
    candidate: &Instr,
    candidate_block: BlockId,
    other: &Instr,
    other_block: BlockId,
    required: &[Option<OperandRelation>],
) -> Option<OperandRelations> {
    if !candidate.kind.same_shape(&other.kind) || !same_result_type(func, candidate, other) {
        return None;
    }

    let ours = candidate.kind.operands();
    let theirs = other.kind.operands();
    debug_assert_eq!(ours.len(), required.len());

    let mut relations = OperandRelations::with_capacity(ours.len());
    for ((&a, &b), &fixed) in ours.iter().zip(theirs.iter()).zip(required) {
        let equal = a == b;
        let equal_after_move = match (args.get(a, candidate_block), args.get(b, other_block)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        };
        let relation = match fixed {
            Some(OperandRelation::AlwaysEqual) if equal => OperandRelation::AlwaysEqual,
            Some(OperandRelation::EqualAfterMove) if equal_after_move => {
                OperandRelation::EqualAfterMove
            }
            Some(_) => return None,
            None if equal => OperandRelation::AlwaysEqual,
            None if equal_after_move => OperandRelation::EqualAfterMove,
            None => return None,
        };
        relations.push(relation);
    }
    Some(relations)
}
