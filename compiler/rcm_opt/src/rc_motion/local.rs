//! Sinking retains within and out of a block.
//!
//! # Algorithm
//!
//! Visit the block bottom-up. For each retain:
//!
//! 1. If an instruction between it and the terminator may decrement or
//!    check the same object, move the retain down to just before it.
//! 2. Otherwise, if the terminator is a `switch_enum` or a `cond_br` on a
//!    single-case `select_enum` over the same object, replace a
//!    `retain_value` with a payload retain at the head of each successor.
//! 3. Otherwise, if the terminator is a `cond_br` or `checked_cast_br`,
//!    copy the retain to the head of each successor (skipping trap blocks
//!    that do nothing but reach `unreachable`).
//! 4. Otherwise move it to just before the terminator.
//!
//! Steps 2 and 3 require every successor to be reached only from this
//! block. Retains that end up next to each other keep their original
//! order.

use rcm_ir::{BlockId, Cfg, Function, Instr, InstrKind, InstrPos, Terminator};

use super::insert_payload_rc;
use crate::analysis::arc::{first_decrement_or_check_in_range, is_arc_inert_trap_block};
use crate::analysis::{only_other_case, single_true_case};
use crate::context::PassContext;
use crate::stats::CodeMotionStats;

/// Sink every retain in `block` as far as it can go. Returns `true` if any
/// instruction moved.
pub fn sink_ref_count_increments(
    func: &mut Function,
    ctx: &PassContext<'_>,
    cfg: &Cfg,
    block: BlockId,
    stats: &mut CodeMotionStats,
) -> bool {
    let can_sink_to_successors = func
        .terminator(block)
        .successors()
        .iter()
        .all(|&succ| succ != block && cfg.single_predecessor(succ) == Some(block));

    let mut changed = false;
    for index in (0..func.block(block).body.len()).rev() {
        changed |= try_to_sink_ref_count_instr(func, ctx, block, index, can_sink_to_successors, stats);
    }
    changed
}

/// Move the instruction at `from` down so it sits just before `target`,
/// but above any run of increments already waiting there.
///
/// Returns `true` if the instruction actually changed position.
fn move_down(func: &mut Function, block: BlockId, from: usize, target: usize) -> bool {
    let body = &func.block(block).body;
    let mut target = target;
    while target > from + 1 && body[target - 1].kind.is_increment() {
        target -= 1;
    }
    if target <= from + 1 {
        return false;
    }
    func.move_instr(InstrPos::new(block, from), block, target);
    tracing::trace!(block = block.raw(), from, to = target - 1, "moved retain down");
    true
}

fn try_to_sink_ref_count_instr(
    func: &mut Function,
    ctx: &PassContext<'_>,
    block: BlockId,
    index: usize,
    can_sink_to_successors: bool,
    stats: &mut CodeMotionStats,
) -> bool {
    if can_sink_to_successors {
        match func.terminator(block) {
            // Nothing below handles switches any better.
            Terminator::SwitchEnum { .. } => {
                return try_to_sink_across_switch(func, ctx, block, index, stats);
            }
            Terminator::CondBr { .. } => {
                if try_to_sink_across_select_enum(func, ctx, block, index, stats) {
                    return true;
                }
            }
            _ => {}
        }
    }

    let instr = &func.block(block).body[index];
    if !instr.kind.is_increment() {
        return false;
    }
    let Some(ptr) = instr.kind.rc_operand() else {
        return false;
    };
    let kind = instr.kind.clone();
    let end = func.block(block).body.len();

    if let Some(blocker) =
        first_decrement_or_check_in_range(func, ctx.alias, ptr, block, index + 1, end)
    {
        return move_down(func, block, index, blocker);
    }

    let sinkable_terminator = matches!(
        func.terminator(block),
        Terminator::CheckedCastBr { .. } | Terminator::CondBr { .. }
    );
    if !can_sink_to_successors || !sinkable_terminator {
        return move_down(func, block, index, end);
    }

    for succ in func.terminator(block).successors() {
        if is_arc_inert_trap_block(func, succ) {
            continue;
        }
        func.insert_instr(succ, 0, Instr::effect(kind.clone()));
    }
    func.erase_instr(InstrPos::new(block, index));
    stats.sunk += 1;
    tracing::debug!(
        block = block.raw(),
        value = ptr.raw(),
        "sunk retain into successors"
    );
    true
}

/// Turn a `retain_value` of the enum a case-complete `switch_enum`
/// dispatches on into payload retains in the case blocks.
fn try_to_sink_across_switch(
    func: &mut Function,
    ctx: &PassContext<'_>,
    block: BlockId,
    index: usize,
    stats: &mut CodeMotionStats,
) -> bool {
    let InstrKind::RetainValue { operand: ptr } = func.block(block).body[index].kind else {
        return false;
    };
    let Terminator::SwitchEnum {
        operand: scrutinee,
        cases,
        default,
    } = func.terminator(block).clone()
    else {
        return false;
    };

    let end = func.block(block).body.len();
    if let Some(blocker) =
        first_decrement_or_check_in_range(func, ctx.alias, ptr, block, index + 1, end)
    {
        return move_down(func, block, index, blocker);
    }

    if ctx.rc_identity.root(func, ptr) != ctx.rc_identity.root(func, scrutinee) {
        return false;
    }
    // A default arm may stand for several cases.
    if default.is_some() {
        return false;
    }

    for &(case, succ) in &cases {
        insert_payload_rc(func, ctx, succ, 0, scrutinee, case, true);
    }
    func.erase_instr(InstrPos::new(block, index));
    stats.sunk += 1;
    tracing::debug!(
        block = block.raw(),
        value = ptr.raw(),
        cases = cases.len(),
        "sunk retain_value across switch_enum"
    );
    true
}

/// Turn a `retain_value` of the enum a `cond_br` on `select_enum` tests
/// into payload retains in both successors.
fn try_to_sink_across_select_enum(
    func: &mut Function,
    ctx: &PassContext<'_>,
    block: BlockId,
    index: usize,
    stats: &mut CodeMotionStats,
) -> bool {
    let InstrKind::RetainValue { operand: ptr } = func.block(block).body[index].kind else {
        return false;
    };
    let Terminator::CondBr {
        cond,
        true_block,
        false_block,
        ..
    } = *func.terminator(block)
    else {
        return false;
    };
    let Some((enum_value, true_case)) = single_true_case(func, cond) else {
        return false;
    };

    let end = func.block(block).body.len();
    if let Some(blocker) =
        first_decrement_or_check_in_range(func, ctx.alias, ptr, block, index + 1, end)
    {
        return move_down(func, block, index, blocker);
    }

    if ctx.rc_identity.root(func, ptr) != ctx.rc_identity.root(func, enum_value) {
        return false;
    }
    let Some(false_case) = only_other_case(ctx.pool, true_case) else {
        return false;
    };

    insert_payload_rc(func, ctx, true_block, 0, enum_value, true_case, true);
    insert_payload_rc(func, ctx, false_block, 0, enum_value, false_case, true);
    func.erase_instr(InstrPos::new(block, index));
    stats.sunk += 1;
    tracing::debug!(
        block = block.raw(),
        value = ptr.raw(),
        "sunk retain_value across select_enum branch"
    );
    true
}
