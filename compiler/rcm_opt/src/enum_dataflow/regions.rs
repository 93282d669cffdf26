//! Moving RC operations across the exit of a switch region.
//!
//! A block whose every predecessor knows the case of some enum value is
//! where the arms of a case-complete switch on that value rejoin. There a
//! `release_value` of the enum can be split into payload releases at the
//! end of each arm, and payload retains at the end of every arm can be
//! merged into one `retain_value` of the enum.

use smallvec::SmallVec;

use rcm_ir::{BlockId, Cfg, Function, Instr, InstrKind, InstrPos, ValueId};

use super::EnumTagState;
use crate::analysis::arc::{first_decrement_or_check_in_range, has_arc_uses_in_range};
use crate::context::PassContext;
use crate::rc_motion::insert_payload_rc;
use crate::stats::CodeMotionStats;

impl EnumTagState {
    /// Replace each `release_value` of a region-exit enum in `block` with
    /// payload releases at the end of the predecessors.
    ///
    /// Applies only when every predecessor supplied a case and nothing in
    /// `block` before the release may use, decrement or check the value.
    pub fn hoist_decrements_into_switch_regions(
        &self,
        func: &mut Function,
        ctx: &PassContext<'_>,
        cfg: &Cfg,
        block: BlockId,
        stats: &mut CodeMotionStats,
    ) -> bool {
        let num_preds = cfg.preds(block).len();
        let mut changed = false;
        let mut index = 0;

        while index < func.block(block).body.len() {
            let InstrKind::ReleaseValue { operand } = func.block(block).body[index].kind else {
                index += 1;
                continue;
            };
            let Some(cases) = self.region_cases(operand) else {
                index += 1;
                continue;
            };
            if cases.len() != num_preds
                || func.defining_block(operand) == Some(block)
                || has_arc_uses_in_range(func, ctx.alias, operand, block, 0, index)
            {
                tracing::trace!(
                    block = block.raw(),
                    value = operand.raw(),
                    "release stays below switch region"
                );
                index += 1;
                continue;
            }

            for &(pred, case) in cases {
                let at = func.block(pred).body.len();
                insert_payload_rc(func, ctx, pred, at, operand, case, false);
            }
            func.erase_instr(InstrPos::new(block, index));
            stats.hoisted += 1;
            changed = true;
            tracing::debug!(
                block = block.raw(),
                value = operand.raw(),
                arms = cases.len(),
                "hoisted enum release into switch region"
            );
        }
        changed
    }

    /// Replace the payload retains at the end of every arm of a switch
    /// region with one `retain_value` of the enum at the head of `block`.
    ///
    /// Every arm whose case has a payload must end with a retain of the
    /// enum's RC root that no later instruction may decrement or check.
    pub fn sink_increments_out_of_switch_regions(
        &self,
        func: &mut Function,
        ctx: &PassContext<'_>,
        cfg: &Cfg,
        block: BlockId,
        stats: &mut CodeMotionStats,
    ) -> bool {
        let num_preds = cfg.preds(block).len();
        let mut changed = false;

        for (value, cases) in self.region_cases.iter() {
            if cases.len() != num_preds {
                continue;
            }
            let enum_root = ctx.rc_identity.root(func, value);

            let mut retains: SmallVec<[InstrPos; 4]> = SmallVec::new();
            let mut complete = true;
            for &(pred, case) in cases {
                if !ctx.pool.case_has_payload(case) {
                    continue;
                }
                match last_sinkable_increment(func, ctx, enum_root, pred) {
                    Some(pos) => retains.push(pos),
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete || retains.is_empty() {
                continue;
            }

            // Each retain sits in a different predecessor, so erasing one
            // leaves the other positions valid.
            for &pos in &retains {
                func.erase_instr(pos);
            }
            func.insert_instr(
                block,
                0,
                Instr::effect(InstrKind::RetainValue { operand: enum_root }),
            );
            stats.sunk += 1;
            changed = true;
            tracing::debug!(
                block = block.raw(),
                value = enum_root.raw(),
                retains = retains.len(),
                "sank payload retains out of switch region"
            );
        }
        changed
    }
}

/// The last retain in `block` whose operand has RC root `enum_root`,
/// provided nothing after it may decrement or check that root.
fn last_sinkable_increment(
    func: &Function,
    ctx: &PassContext<'_>,
    enum_root: ValueId,
    block: BlockId,
) -> Option<InstrPos> {
    let body = &func.block(block).body;
    let index = body.iter().rposition(|instr| {
        instr.kind.is_increment()
            && instr
                .kind
                .rc_operand()
                .is_some_and(|op| ctx.rc_identity.root(func, op) == enum_root)
    })?;
    if first_decrement_or_check_in_range(func, ctx.alias, enum_root, block, index, body.len())
        .is_some()
    {
        return None;
    }
    Some(InstrPos::new(block, index))
}
