//! ARC-relevant instruction queries over ranges of a block.
//!
//! All ranges are half-open `[start, end)` indices into a block body, where
//! `end == body.len()` stands for the terminator (exclusive).

use rcm_ir::{BlockId, Effects, Function, Instr, InstrKind, Terminator, ValueId};

use super::AliasAnalysis;

/// Returns `true` if `instr` may decrement the reference count of `ptr`.
pub fn may_decrement(func: &Function, aa: &dyn AliasAnalysis, instr: &Instr, ptr: ValueId) -> bool {
    if !instr.kind.effects().contains(Effects::MAY_RELEASE) {
        return false;
    }
    match &instr.kind {
        InstrKind::StrongRelease { operand } | InstrKind::ReleaseValue { operand } => {
            aa.may_alias(func, *operand, ptr)
        }
        // Calls and stores may release objects we cannot name.
        _ => true,
    }
}

/// Returns `true` if `instr` may observe the reference count of `ptr`.
pub fn may_check(func: &Function, aa: &dyn AliasAnalysis, instr: &Instr, ptr: ValueId) -> bool {
    match &instr.kind {
        InstrKind::IsUnique { operand } => aa.may_alias(func, *operand, ptr),
        InstrKind::Apply { .. } => true,
        _ => false,
    }
}

/// Returns `true` if `instr` may use `ptr` in a way that needs the object
/// alive (beyond merely computing with it).
pub fn may_use_value(func: &Function, aa: &dyn AliasAnalysis, instr: &Instr, ptr: ValueId) -> bool {
    match &instr.kind {
        InstrKind::IntLiteral { .. }
        | InstrKind::FloatLiteral { .. }
        | InstrKind::StringLiteral { .. }
        | InstrKind::Builtin { .. }
        | InstrKind::Struct { .. }
        | InstrKind::Tuple { .. }
        | InstrKind::StructExtract { .. }
        | InstrKind::TupleExtract { .. }
        | InstrKind::Enum { .. }
        | InstrKind::UncheckedEnumData { .. }
        | InstrKind::SelectEnum { .. }
        | InstrKind::Upcast { .. }
        | InstrKind::UncheckedRefCast { .. }
        | InstrKind::UnownedToRef { .. }
        | InstrKind::RefToUnowned { .. }
        | InstrKind::AllocRef { .. }
        | InstrKind::AllocStack
        | InstrKind::CondFail { .. } => false,

        InstrKind::Load { .. }
        | InstrKind::Store { .. }
        | InstrKind::StrongRetain { .. }
        | InstrKind::StrongRelease { .. }
        | InstrKind::RetainValue { .. }
        | InstrKind::ReleaseValue { .. }
        | InstrKind::IsUnique { .. } => instr
            .kind
            .operands()
            .iter()
            .any(|&op| aa.may_alias(func, op, ptr)),

        InstrKind::Apply { .. } => true,
    }
}

/// Index of the first instruction in `[start, end)` of `block` that may
/// decrement or check the reference count of `ptr`.
pub fn first_decrement_or_check_in_range(
    func: &Function,
    aa: &dyn AliasAnalysis,
    ptr: ValueId,
    block: BlockId,
    start: usize,
    end: usize,
) -> Option<usize> {
    let body = &func.block(block).body;
    let end = end.min(body.len());
    (start..end).find(|&i| {
        let instr = &body[i];
        may_decrement(func, aa, instr, ptr) || may_check(func, aa, instr, ptr)
    })
}

/// Returns `true` if any instruction in `[start, end)` of `block` may use,
/// decrement or check `ptr`.
pub fn has_arc_uses_in_range(
    func: &Function,
    aa: &dyn AliasAnalysis,
    ptr: ValueId,
    block: BlockId,
    start: usize,
    end: usize,
) -> bool {
    let body = &func.block(block).body;
    let end = end.min(body.len());
    body[start.min(end)..end].iter().any(|instr| {
        may_use_value(func, aa, instr, ptr)
            || may_decrement(func, aa, instr, ptr)
            || may_check(func, aa, instr, ptr)
    })
}

/// Returns `true` if `block` ends in `unreachable` and nothing in it touches
/// reference counts, so retains sunk into it would be dead anyway.
pub fn is_arc_inert_trap_block(func: &Function, block: BlockId) -> bool {
    let block = func.block(block);
    if !matches!(block.terminator, Terminator::Unreachable) {
        return false;
    }
    block.body.iter().all(|instr| {
        !instr.kind.effects().intersects(
            Effects::MAY_RELEASE | Effects::RC_CHECK | Effects::ALLOCATION,
        ) && !instr.kind.is_increment()
            && !matches!(instr.kind, InstrKind::Apply { .. })
    })
}
