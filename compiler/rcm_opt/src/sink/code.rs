//! Sinking duplicated instructions out of predecessors.
//!
//! # Algorithm
//!
//! Applies to a block `B` whose every predecessor has `B` as its only
//! successor. Scan the first predecessor backward from its terminator. For
//! each instruction whose result is unused, look for a matching instruction
//! (see [`match_instructions`]) near the end of every other predecessor.
//! If all predecessors have one, move the first copy to the head of `B`,
//! point operands that only agree after the move at `B`'s parameters, and
//! delete the other copies. Then restart from the terminator.
//!
//! Each scan looks back at most [`SINK_SEARCH_WINDOW`] instructions and
//! stops at the first sink barrier: an instruction with side effects or
//! one that reads memory. Instructions between a sunk copy and the end of
//! its block are therefore pure, and moving the copy past them is safe.

use smallvec::SmallVec;

use rcm_ir::{single_successor, BlockId, Cfg, Function, Instr, InstrPos, ValueId};

use crate::matcher::{match_instructions, ArgIndexMap, OperandRelation};
use crate::stats::CodeMotionStats;

/// How many instructions a backward scan may step over.
pub const SINK_SEARCH_WINDOW: usize = 6;

/// Returns `true` if `instr` may be moved to another block.
fn can_sink(func: &Function, instr: &Instr) -> bool {
    instr.dst.map_or(true, |dst| func.has_no_uses(dst))
}

/// Returns `true` if no instruction may be moved across `instr`.
fn is_sink_barrier(instr: &Instr) -> bool {
    instr.kind.may_have_side_effects() || instr.kind.may_read_memory()
}

/// Scan `block` backward from its terminator for an instruction matching
/// `candidate` from `candidate_block`.
fn find_identical_in_block(
    func: &Function,
    args: &ArgIndexMap,
    candidate: &Instr,
    candidate_block: BlockId,
    block: BlockId,
    required: &[Option<OperandRelation>],
) -> Option<(usize, SmallVec<[OperandRelation; 4]>)> {
    let body = &func.block(block).body;
    let mut cursor = body.len();
    let mut budget = SINK_SEARCH_WINDOW;

    while budget > 0 {
        if let Some(instr) = body.get(cursor) {
            if can_sink(func, instr) {
                if let Some(relations) = match_instructions(
                    func,
                    args,
                    candidate,
                    candidate_block,
                    instr,
                    block,
                    required,
                ) {
                    return Some((cursor, relations));
                }
            }
            if is_sink_barrier(instr) {
                return None;
            }
        }
        if cursor == 0 {
            return None;
        }
        budget -= 1;
        cursor -= 1;
    }
    None
}

/// Try to find a copy of the instruction at `index` in the first
/// predecessor in every other predecessor.
///
/// Returns the positions of the copies and, per operand, the parameter of
/// `block` the sunk instruction must read instead (for operands that only
/// agree after the move).
fn find_duplicates(
    func: &Function,
    args: &ArgIndexMap,
    preds: &[BlockId],
    block: BlockId,
    index: usize,
) -> Option<(SmallVec<[InstrPos; 4]>, SmallVec<[(usize, ValueId); 4]>)> {
    let first = preds[0];
    let candidate = &func.block(first).body[index];
    if !can_sink(func, candidate) {
        return None;
    }

    let mut relations: SmallVec<[Option<OperandRelation>; 4]> =
        SmallVec::from_elem(None, candidate.kind.num_operands());
    let mut dups = SmallVec::new();
    for &pred in &preds[1..] {
        let (dup, found) =
            find_identical_in_block(func, args, candidate, first, pred, &relations)?;
        for (slot, relation) in relations.iter_mut().zip(found) {
            *slot = Some(relation);
        }
        dups.push(InstrPos::new(pred, dup));
    }
    if dups.is_empty() {
        return None;
    }

    let params = &func.block(block).params;
    let mut rewrites = SmallVec::new();
    for (operand_index, (&operand, relation)) in
        candidate.kind.operands().iter().zip(&relations).enumerate()
    {
        if *relation == Some(OperandRelation::EqualAfterMove) {
            let param = args
                .get(operand, first)
                .and_then(|arg| params.get(arg).copied())?;
            rewrites.push((operand_index, param));
        }
    }
    Some((dups, rewrites))
}

/// Sink instructions duplicated in every predecessor of `block` into
/// `block`. Returns `true` if anything moved.
pub fn sink_code_from_predecessors(
    func: &mut Function,
    cfg: &Cfg,
    block: BlockId,
    stats: &mut CodeMotionStats,
) -> bool {
    let preds = cfg.preds(block);
    if block == func.entry || preds.is_empty() || preds.contains(&block) {
        return false;
    }
    if preds
        .iter()
        .any(|&pred| single_successor(func, pred) != Some(block))
    {
        return false;
    }
    let first = preds[0];
    if func.block(first).body.is_empty() {
        return false;
    }

    let args = ArgIndexMap::build(func, preds, block);
    let mut changed = false;
    let mut budget = SINK_SEARCH_WINDOW;
    let mut cursor = func.block(first).body.len();

    while budget > 0 {
        let len = func.block(first).body.len();
        if cursor < len {
            if let Some((dups, rewrites)) = find_duplicates(func, &args, preds, block, cursor) {
                let moved = func.move_instr(InstrPos::new(first, cursor), block, 0);
                for &(operand_index, param) in &rewrites {
                    func.instr_mut(moved).kind.set_operand(operand_index, param);
                }
                for &dup in &dups {
                    func.erase_instr(dup);
                }
                stats.sunk += dups.len();
                changed = true;
                tracing::debug!(
                    block = block.raw(),
                    from = first.raw(),
                    copies = dups.len() + 1,
                    "sunk duplicated instruction"
                );

                cursor = func.block(first).body.len();
                continue;
            }

            if is_sink_barrier(&func.block(first).body[cursor]) {
                tracing::trace!(block = first.raw(), index = cursor, "sink scan hit a barrier");
                return changed;
            }
        }
        if cursor == 0 {
            return changed;
        }
        budget -= 1;
        cursor -= 1;
    }
    changed
}
