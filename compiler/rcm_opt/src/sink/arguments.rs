//! Sinking the definitions of block arguments.
//!
//! When every predecessor passes parameter `i` of `B` a value computed by
//! an identical single-use instruction, compute it once at the head of `B`
//! and drop the parameter. When the instructions differ in exactly one
//! cheap operand (an integer field of a `struct`, or the operand of an
//! `unowned_to_ref`), compute it once in `B` and pass that operand through
//! the parameter instead.

use smallvec::SmallVec;

use rcm_ir::{
    single_successor, BlockId, Cfg, Function, Instr, InstrKind, Terminator, ValueId,
};

use super::erase_trivially_dead;
use crate::context::PassContext;
use crate::matcher::is_identical;
use crate::stats::CodeMotionStats;

/// Sink argument definitions for every parameter of `block`. Returns `true`
/// if any parameter's definition was sunk.
pub fn sink_arguments_from_predecessors(
    func: &mut Function,
    ctx: &PassContext<'_>,
    cfg: &Cfg,
    block: BlockId,
    stats: &mut CodeMotionStats,
) -> bool {
    // Entry parameters are the function's arguments.
    if block == func.entry {
        return false;
    }
    let preds = cfg.preds(block);
    if cfg.incoming_edge_count(block) < 2 || preds.contains(&block) {
        return false;
    }
    if preds
        .iter()
        .any(|&pred| single_successor(func, pred) != Some(block))
    {
        return false;
    }

    let mut changed = false;
    // Parameters may be removed; walk from the back.
    for index in (0..func.block(block).params.len()).rev() {
        if sink_argument(func, ctx, preds, block, index) {
            stats.sunk += 1;
            changed = true;
        }
    }
    changed
}

/// The argument `pred` passes as parameter `index` of `block`.
fn incoming_arg(func: &Function, pred: BlockId, block: BlockId, index: usize) -> Option<ValueId> {
    func.edge_args(pred, block)
        .and_then(|args| args.get(index).copied())
}

/// Returns `true` if `instr` reads a value defined in `block`.
fn reads_block_local(func: &Function, instr: &Instr, block: BlockId) -> bool {
    instr
        .kind
        .operands()
        .iter()
        .any(|&op| func.defining_block(op) == Some(block))
}

/// Operand index through which two non-identical instructions may be
/// parameterized, if passing that operand is cheaper than passing the
/// result.
fn cheaper_operand(func: &Function, ctx: &PassContext<'_>, a: &Instr, b: &Instr) -> Option<usize> {
    let (Some(a_dst), Some(b_dst)) = (a.dst, b.dst) else {
        return None;
    };
    if func.value_type(a_dst) != func.value_type(b_dst) {
        return None;
    }

    match (&a.kind, &b.kind) {
        (InstrKind::UnownedToRef { operand: x }, InstrKind::UnownedToRef { operand: y }) => {
            (func.value_type(*x) == func.value_type(*y)).then_some(0)
        }
        (InstrKind::Struct { args: xs }, InstrKind::Struct { args: ys }) => {
            if xs.len() != ys.len() {
                return None;
            }
            let mut differing = xs
                .iter()
                .zip(ys)
                .enumerate()
                .filter(|(_, (x, y))| x != y)
                .map(|(i, _)| i);
            let (Some(index), None) = (differing.next(), differing.next()) else {
                return None;
            };
            let ty = func.value_type(xs[index]);
            (ty == func.value_type(ys[index]) && ctx.pool.is_integer(ty)).then_some(index)
        }
        _ => None,
    }
}

/// One predecessor's copy of the sunk definition.
struct IncomingDef {
    pred: BlockId,
    value: ValueId,
}

/// Try to sink the definition of parameter `index` of `block`.
fn sink_argument(
    func: &mut Function,
    ctx: &PassContext<'_>,
    preds: &[BlockId],
    block: BlockId,
    index: usize,
) -> bool {
    let first = preds[0];
    let Some(first_arg) = incoming_arg(func, first, block, index) else {
        return false;
    };
    let Some(first_pos) = func.defining_instr(first_arg) else {
        return false;
    };
    if func.use_count(first_arg) != 1 || first_pos.block == block {
        return false;
    }
    let sunk = func.instr(first_pos).clone();
    if sunk.kind.may_read_memory()
        || (sunk.kind.may_have_side_effects() && !sunk.kind.is_allocation())
        || reads_block_local(func, &sunk, block)
    {
        return false;
    }

    let mut clones: SmallVec<[IncomingDef; 4]> = SmallVec::new();
    clones.push(IncomingDef {
        pred: first,
        value: first_arg,
    });
    let mut differing: Option<usize> = None;

    for &pred in &preds[1..] {
        if !matches!(
            func.terminator(pred),
            Terminator::Br { .. } | Terminator::CondBr { .. }
        ) {
            return false;
        }
        let Some(arg) = incoming_arg(func, pred, block, index) else {
            return false;
        };
        let Some(pos) = func.defining_instr(arg) else {
            return false;
        };
        if func.use_count(arg) != 1 || pos.block == block {
            return false;
        }
        let other = func.instr(pos);
        if reads_block_local(func, other, block) {
            return false;
        }
        if !is_identical(func, &sunk, other) {
            let Some(operand) = cheaper_operand(func, ctx, &sunk, other) else {
                return false;
            };
            if differing.is_some_and(|d| d != operand) {
                return false;
            }
            differing = Some(operand);
        }
        clones.push(IncomingDef { pred, value: arg });
    }

    match differing {
        Some(operand) => sink_parameterized(func, block, index, first_arg, operand, &clones),
        None => sink_identical(func, block, index, first_arg, &clones),
    }
    tracing::debug!(
        block = block.raw(),
        param = index,
        parameterized = differing.is_some(),
        "sunk block argument definition"
    );
    true
}

/// All predecessors compute the same value: compute it in `block` and drop
/// the parameter.
fn sink_identical(
    func: &mut Function,
    block: BlockId,
    index: usize,
    sunk: ValueId,
    clones: &[IncomingDef],
) {
    if let Some(pos) = func.defining_instr(sunk) {
        func.move_instr(pos, block, 0);
    }
    let param = func.block(block).params[index];
    func.replace_all_uses(param, sunk);
    func.remove_block_param(block, index);
    for clone in clones.iter().filter(|c| c.value != sunk) {
        erase_trivially_dead(func, clone.value);
    }
}

/// Predecessors compute the same operation on one differing operand: sink
/// the operation and pass that operand through the parameter.
fn sink_parameterized(
    func: &mut Function,
    block: BlockId,
    index: usize,
    sunk: ValueId,
    operand: usize,
    clones: &[IncomingDef],
) {
    let incoming: SmallVec<[(BlockId, ValueId, ValueId); 4]> = clones
        .iter()
        .filter_map(|clone| {
            let pos = func.defining_instr(clone.value)?;
            let value = func.instr(pos).kind.operands()[operand];
            Some((clone.pred, clone.value, value))
        })
        .collect();
    debug_assert_eq!(incoming.len(), clones.len());
    let Some(&(_, _, first_operand)) = incoming.first() else {
        return;
    };

    if let Some(pos) = func.defining_instr(sunk) {
        func.move_instr(pos, block, 0);
    }
    let param = func.block(block).params[index];
    func.replace_all_uses(param, sunk);
    let param_ty = func.value_type(first_operand);
    let new_param = func.replace_block_param(block, index, param_ty);

    for &(pred, clone, value) in &incoming {
        for args in func.edge_args_mut(pred, block) {
            args[index] = value;
        }
        if clone != sunk {
            erase_trivially_dead(func, clone);
        }
    }

    if let Some(pos) = func.defining_instr(sunk) {
        func.instr_mut(pos).kind.set_operand(operand, new_param);
    }
}
