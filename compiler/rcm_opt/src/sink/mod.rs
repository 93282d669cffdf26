//! Sinking from predecessors into their common successor.
//!
//! - [`sink_code_from_predecessors`]: an instruction duplicated at the tail
//!   of every predecessor becomes one copy at the head of the successor.
//! - [`sink_arguments_from_predecessors`]: a block argument computed
//!   identically (or up to one cheap operand) in every predecessor is
//!   computed once in the successor instead.
//! - [`sink_literals_from_predecessors`]: a parameter that receives the same
//!   literal on every edge reads a local copy of that literal.

mod arguments;
mod code;
mod literals;

pub use arguments::sink_arguments_from_predecessors;
pub use code::{sink_code_from_predecessors, SINK_SEARCH_WINDOW};
pub use literals::sink_literals_from_predecessors;

use rcm_ir::{Function, ValueId};

/// Delete the instruction defining `value` if nothing uses it and it has no
/// side effects other than allocating, then do the same for the operands
/// it read.
pub(crate) fn erase_trivially_dead(func: &mut Function, value: ValueId) {
    let mut worklist = vec![value];
    while let Some(value) = worklist.pop() {
        let Some(pos) = func.defining_instr(value) else {
            continue;
        };
        let kind = &func.instr(pos).kind;
        if (kind.may_have_side_effects() && !kind.is_allocation()) || !func.has_no_uses(value) {
            continue;
        }
        let operands = kind.operands();
        func.erase_instr(pos);
        worklist.extend(operands);
    }
}
