//! Retain/release operand canonicalization.
//!
//! Rewrites the operand of every retain and release to its shallow root
//! (see [`shallow_root`]), followed until it stops changing. Two RC
//! operations on the same object then name the same value, which lets the
//! sinking engine and the enum dataflow match them.

use rustc_hash::FxHashSet;

use rcm_ir::{BlockId, Cfg, Function, RcClassification, ValueId};

use crate::root::shallow_root;

/// Canonicalize the operands of all RC operations in `block`.
///
/// Returns `true` if any operand changed. Running it twice in a row never
/// changes anything the second time.
pub fn canonicalize_ref_count_ops(
    func: &mut Function,
    cfg: &Cfg,
    types: &dyn RcClassification,
    block: BlockId,
) -> bool {
    let mut changed = false;
    for index in 0..func.block(block).body.len() {
        let Some(operand) = func.block(block).body[index].kind.rc_operand() else {
            continue;
        };
        let root = root_fixpoint(func, cfg, types, operand);
        if root == operand {
            continue;
        }
        let instr = &mut func.block_mut(block).body[index];
        if let Some(kind) = instr.kind.with_rc_operand(root) {
            tracing::trace!(
                block = block.raw(),
                from = operand.raw(),
                to = root.raw(),
                "canonicalized RC operand"
            );
            instr.kind = kind;
            changed = true;
        }
    }
    changed
}

/// Follow [`shallow_root`] until it reaches a fixed point.
///
/// Parameters that feed each other in a cycle (only possible in
/// unreachable code) are left alone.
fn root_fixpoint(
    func: &Function,
    cfg: &Cfg,
    types: &dyn RcClassification,
    value: ValueId,
) -> ValueId {
    let mut seen = FxHashSet::default();
    let mut current = value;
    loop {
        if !seen.insert(current) {
            return value;
        }
        let next = shallow_root(func, cfg, types, current);
        if next == current {
            return current;
        }
        current = next;
    }
}
