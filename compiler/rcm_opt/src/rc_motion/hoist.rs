//! Hoisting releases into predecessors.
//!
//! A release at the top of a merge block is copied to the end of every
//! predecessor when a matching retain is available in some, but not all,
//! of them. Where the retain is available the pair can then be removed by
//! later RC elimination; where it is not, nothing is lost.

use smallvec::SmallVec;

use rcm_ir::{single_successor, BlockId, Cfg, Function, Instr, InstrPos, ValueId};

use crate::analysis::arc::{first_decrement_or_check_in_range, has_arc_uses_in_range};
use crate::context::PassContext;
use crate::stats::CodeMotionStats;

/// Hoist releases of values defined outside `block` into its predecessors.
/// Returns `true` if any release was hoisted.
pub fn hoist_decrements_to_predecessors(
    func: &mut Function,
    ctx: &PassContext<'_>,
    cfg: &Cfg,
    block: BlockId,
    stats: &mut CodeMotionStats,
) -> bool {
    let preds = cfg.preds(block);
    if block == func.entry
        || preds.is_empty()
        || cfg.single_predecessor(block).is_some()
        || preds.contains(&block)
    {
        return false;
    }
    if preds
        .iter()
        .any(|&pred| single_successor(func, pred).is_none())
    {
        return false;
    }

    // Index of the first release hoisted into each predecessor. A hoisted
    // release would otherwise hide the retain it is meant to pair with.
    let mut cutoffs: SmallVec<[Option<usize>; 4]> = SmallVec::from_elem(None, preds.len());
    let mut changed = false;
    let mut index = 0;

    while index < func.block(block).body.len() {
        let instr = &func.block(block).body[index];
        let Some(ptr) = instr.kind.rc_operand().filter(|_| instr.kind.is_decrement()) else {
            index += 1;
            continue;
        };
        if func.defining_block(ptr) == Some(block)
            || has_arc_uses_in_range(func, ctx.alias, ptr, block, 0, index)
            || !retain_available_in_some_but_not_all(func, ctx, preds, &cutoffs, ptr)
        {
            index += 1;
            continue;
        }

        let kind = instr.kind.clone();
        for (cutoff, &pred) in cutoffs.iter_mut().zip(preds) {
            let at = func.block(pred).body.len();
            func.insert_instr(pred, at, Instr::effect(kind.clone()));
            cutoff.get_or_insert(at);
        }
        func.erase_instr(InstrPos::new(block, index));
        stats.hoisted += 1;
        changed = true;
        tracing::debug!(
            block = block.raw(),
            value = ptr.raw(),
            preds = preds.len(),
            "hoisted release into predecessors"
        );
    }
    changed
}

/// Returns `true` if a retain of `ptr`'s RC root reaches the end of some
/// predecessors (up to their cutoff) without an intervening decrement or
/// check, but not all of them.
fn retain_available_in_some_but_not_all(
    func: &Function,
    ctx: &PassContext<'_>,
    preds: &[BlockId],
    cutoffs: &[Option<usize>],
    ptr: ValueId,
) -> bool {
    let root = ctx.rc_identity.root(func, ptr);
    let mut available_in_some = false;
    let mut missing_in_some = false;

    for (&pred, cutoff) in preds.iter().zip(cutoffs) {
        let body = &func.block(pred).body;
        let end = cutoff.unwrap_or(body.len());
        let retain = body[..end].iter().rposition(|instr| {
            instr.kind.is_increment()
                && instr
                    .kind
                    .rc_operand()
                    .is_some_and(|op| ctx.rc_identity.root(func, op) == root)
        });
        let available = retain.is_some_and(|start| {
            first_decrement_or_check_in_range(func, ctx.alias, root, pred, start, end).is_none()
        });
        if available {
            available_in_some = true;
        } else {
            missing_in_some = true;
        }
    }
    available_in_some && missing_in_some
}
