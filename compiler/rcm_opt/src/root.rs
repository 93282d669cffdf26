//! One-hop root values for retain/release operands.
//!
//! Unlike [`RcIdentity`](crate::analysis::RcIdentity), which follows value
//! chains as deep as it can, the shallow root looks through exactly one
//! block parameter whose value is fixed by its single incoming edge. It is
//! what the canonicalizer rewrites operands to, so the result always
//! dominates the original use.

use rcm_ir::{Cfg, Function, RcClassification, Terminator, ValueId};

/// The value bound to block parameter `value` by its single incoming edge,
/// or `value` itself if it is not such a parameter.
///
/// A parameter bound by a checked cast resolves to the cast operand, but
/// only if that operand is reference counted.
pub fn shallow_root(
    func: &Function,
    cfg: &Cfg,
    types: &dyn RcClassification,
    value: ValueId,
) -> ValueId {
    let Some((block, index)) = func.block_param_position(value) else {
        return value;
    };
    let Some(pred) = cfg.single_predecessor(block) else {
        return value;
    };

    match func.terminator(pred) {
        Terminator::CheckedCastBr {
            operand, success, ..
        } => {
            debug_assert_eq!(*success, block, "checked cast failure edge binds a parameter");
            if types.is_reference_counted(func.value_type(*operand)) {
                *operand
            } else {
                value
            }
        }
        Terminator::Br { .. } | Terminator::CondBr { .. } => func
            .edge_args(pred, block)
            .and_then(|args| args.get(index).copied())
            .unwrap_or(value),
        _ => value,
    }
}
