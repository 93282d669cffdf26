//! Sinking literal block arguments.
//!
//! Unlike the other sinking steps this one does not care how many
//! successors the predecessors have: the literal is cloned, not moved.

use rcm_ir::{BlockId, Cfg, Function, Instr};

/// Replace every parameter of `block` that receives the same literal on
/// every incoming edge with a copy of that literal at the head of `block`.
/// Returns `true` if any parameter was rewritten.
pub fn sink_literals_from_predecessors(func: &mut Function, cfg: &Cfg, block: BlockId) -> bool {
    if block == func.entry || cfg.incoming_edge_count(block) < 2 {
        return false;
    }
    let preds = cfg.preds(block);

    let mut changed = false;
    for index in 0..func.block(block).params.len() {
        changed |= sink_literal_argument(func, preds, block, index);
    }
    changed
}

/// The literal instruction every edge passes as parameter `index`.
fn common_literal(func: &Function, preds: &[BlockId], block: BlockId, index: usize) -> Option<Instr> {
    let mut common: Option<&Instr> = None;
    for &pred in preds {
        let lists = func.terminator(pred).arg_lists_for(block);
        if lists.is_empty() {
            return None;
        }
        for args in lists {
            let pos = func.defining_instr(*args.get(index)?)?;
            let literal = func.instr(pos);
            if !literal.kind.is_literal() {
                return None;
            }
            match common {
                None => common = Some(literal),
                Some(first) if first.kind == literal.kind => {
                    let same_type = match (first.dst, literal.dst) {
                        (Some(a), Some(b)) => func.value_type(a) == func.value_type(b),
                        _ => false,
                    };
                    if !same_type {
                        return None;
                    }
                }
                Some(_) => return None,
            }
        }
    }
    common.cloned()
}

fn sink_literal_argument(func: &mut Function, preds: &[BlockId], block: BlockId, index: usize) -> bool {
    let param = func.block(block).params[index];
    if func.has_no_uses(param) {
        return false;
    }
    let Some(literal) = common_literal(func, preds, block, index) else {
        return false;
    };
    let Some(ty) = literal.dst.map(|dst| func.value_type(dst)) else {
        return false;
    };

    let value = func.fresh_value(ty);
    func.insert_instr(block, 0, Instr::value(value, literal.kind));
    func.replace_all_uses(param, value);
    tracing::debug!(
        block = block.raw(),
        param = index,
        value = value.raw(),
        "sunk literal argument"
    );
    true
}
