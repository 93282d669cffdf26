//! Local retain/release motion.
//!
//! - [`sink_ref_count_increments`] pushes retains toward the end of their
//!   block and, when the CFG allows, into the successors. A `retain_value`
//!   of a switched-on enum becomes a payload retain in each case block.
//! - [`hoist_decrements_to_predecessors`] pulls a release into the
//!   predecessors when only some of them hold a matching retain, so the
//!   pair can later be removed there.

mod hoist;
mod local;

pub use hoist::hoist_decrements_to_predecessors;
pub use local::sink_ref_count_increments;

use rcm_ir::{BlockId, CaseId, Function, Instr, InstrKind, RcClass, ValueId};

use crate::context::PassContext;

/// Insert at `index` of `block` the retain (`increment`) or release of the
/// payload `enum_value` carries when it holds `case`.
///
/// Emits `unchecked_enum_data` followed by `strong_retain`/`strong_release`
/// for reference payloads or `retain_value`/`release_value` for other
/// non-trivial payloads. Cases without a payload, or with a trivial one,
/// need nothing. Returns the number of instructions inserted.
pub(crate) fn insert_payload_rc(
    func: &mut Function,
    ctx: &PassContext<'_>,
    block: BlockId,
    index: usize,
    enum_value: ValueId,
    case: CaseId,
    increment: bool,
) -> usize {
    let Some(payload_ty) = ctx.pool.case_payload(case) else {
        return 0;
    };
    let class = ctx.types.rc_class(payload_ty);
    if class == RcClass::Trivial {
        return 0;
    }

    let payload = func.fresh_value(payload_ty);
    let rc_op = match (class, increment) {
        (RcClass::Reference, true) => InstrKind::StrongRetain { operand: payload },
        (RcClass::Reference, false) => InstrKind::StrongRelease { operand: payload },
        (_, true) => InstrKind::RetainValue { operand: payload },
        (_, false) => InstrKind::ReleaseValue { operand: payload },
    };
    func.insert_instr(
        block,
        index,
        Instr::value(
            payload,
            InstrKind::UncheckedEnumData {
                operand: enum_value,
                case,
            },
        ),
    );
    func.insert_instr(block, index + 1, Instr::effect(rc_op));
    2
}
