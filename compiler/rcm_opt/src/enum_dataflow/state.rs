//! Per-block enum-tag state: merge and transfer.

use smallvec::SmallVec;

use rcm_ir::{
    single_successor, BlockId, CaseId, Cfg, Function, InstrKind, InstrPos, Terminator, TypePool,
    ValueId,
};

use super::BlotMap;
use crate::analysis::{only_other_case, single_true_case};
use crate::context::PassContext;
use crate::rc_motion::insert_payload_rc;
use crate::stats::CodeMotionStats;

/// The `(predecessor, case)` pairs under which an enum value reaches a
/// block.
pub type CaseList = SmallVec<[(BlockId, CaseId); 2]>;

/// What is known about enum values in one block.
#[derive(Clone, Debug, Default)]
pub struct EnumTagState {
    /// The case each value is known to hold on every path into (and,
    /// after [`process`](Self::process), through) the block.
    pub(super) case_of: BlotMap<ValueId, CaseId>,
    /// For each value, the case it holds at the end of each predecessor
    /// that has this block as its only successor. A list with one entry per
    /// predecessor means this block is where a case-complete switch region
    /// on that value rejoins.
    pub(super) region_cases: BlotMap<ValueId, CaseList>,
}

impl EnumTagState {
    /// The case `value` is known to hold.
    pub fn case_of(&self, value: ValueId) -> Option<CaseId> {
        self.case_of.get(&value).copied()
    }

    /// The per-predecessor cases recorded for `value`.
    pub fn region_cases(&self, value: ValueId) -> Option<&[(BlockId, CaseId)]> {
        self.region_cases.get(&value).map(SmallVec::as_slice)
    }

    /// Entry state of `block` given the exit states of its predecessors, in
    /// `cfg.preds(block)` order.
    ///
    /// A fact survives only if every predecessor agrees on it. If any
    /// predecessor is `block` itself or has no state (unreachable), nothing
    /// is known.
    pub fn merge(
        func: &Function,
        pool: &TypePool,
        cfg: &Cfg,
        block: BlockId,
        pred_states: &[Option<&EnumTagState>],
    ) -> Self {
        let preds = cfg.preds(block);
        debug_assert_eq!(preds.len(), pred_states.len());

        let mut state = Self::default();
        let Some(&first) = preds.first() else {
            return state;
        };
        if preds.contains(&block) {
            tracing::trace!(block = block.raw(), "self loop, no enum facts");
            return state;
        }
        let Some(pred_states) = pred_states.iter().copied().collect::<Option<SmallVec<[&Self; 4]>>>()
        else {
            tracing::trace!(block = block.raw(), "predecessor not visited, no enum facts");
            return state;
        };

        state.case_of = pred_states[0].case_of.clone();
        if single_successor(func, first).is_some() {
            for (value, &case) in state.case_of.iter() {
                state.region_cases.get_or_default(value).push((first, case));
            }
        }

        if preds.len() == 1 {
            if cfg.incoming_edge_count(block) == 1 {
                state.record_terminator_facts(func, pool, first, block);
            }
            return state;
        }

        // Blotting is deferred so every predecessor still contributes to
        // the region lists of values that conflict.
        let mut conflicting: SmallVec<[ValueId; 4]> = SmallVec::new();
        let mut incomplete: SmallVec<[ValueId; 4]> = SmallVec::new();

        for (&pred, pred_state) in preds.iter().zip(&pred_states).skip(1) {
            let single_exit = single_successor(func, pred).is_some();
            for (value, &case) in state.case_of.iter() {
                let Some(&pred_case) = pred_state.case_of.get(&value) else {
                    conflicting.push(value);
                    incomplete.push(value);
                    continue;
                };
                if single_exit {
                    state
                        .region_cases
                        .get_or_default(value)
                        .push((pred, pred_case));
                } else {
                    // Releases cannot be hoisted into a predecessor with
                    // other successors.
                    state.region_cases.clear();
                }
                if pred_case != case {
                    conflicting.push(value);
                }
            }
        }

        for value in &conflicting {
            state.case_of.blot(value);
        }
        for value in &incomplete {
            state.region_cases.blot(value);
        }
        state
    }

    /// Learn the case implied by reaching `block` along the single edge
    /// from `pred`.
    fn record_terminator_facts(
        &mut self,
        func: &Function,
        pool: &TypePool,
        pred: BlockId,
        block: BlockId,
    ) {
        match func.terminator(pred) {
            Terminator::SwitchEnum {
                operand,
                cases,
                default,
            } => {
                if *default == Some(block) {
                    return;
                }
                match cases.iter().find(|&&(_, target)| target == block) {
                    Some(&(case, _)) => {
                        self.case_of.insert(*operand, case);
                    }
                    None => unreachable!(
                        "b{} is a successor of the switch_enum in b{} but none of its cases",
                        block.raw(),
                        pred.raw(),
                    ),
                }
            }
            Terminator::CondBr {
                cond, true_block, ..
            } => {
                let Some((enum_value, true_case)) = single_true_case(func, *cond) else {
                    return;
                };
                if *true_block == block {
                    self.case_of.insert(enum_value, true_case);
                } else if let Some(other) = only_other_case(pool, true_case) {
                    self.case_of.insert(enum_value, other);
                }
            }
            _ => {}
        }
    }

    /// Walk `block` top to bottom: record the case of every `enum` result
    /// and `unchecked_enum_data` operand, and rewrite `retain_value` /
    /// `release_value` of a value with a known case into the payload
    /// operation (or nothing, for cases without a non-trivial payload).
    ///
    /// Returns `true` if any instruction was rewritten.
    pub fn process(
        &mut self,
        func: &mut Function,
        ctx: &PassContext<'_>,
        block: BlockId,
        stats: &mut CodeMotionStats,
    ) -> bool {
        let mut changed = false;
        let mut index = 0;

        while index < func.block(block).body.len() {
            let instr = &func.block(block).body[index];
            match instr.kind {
                InstrKind::Enum { case, .. } => {
                    if let Some(dst) = instr.dst {
                        self.case_of.insert(dst, case);
                    }
                }
                InstrKind::UncheckedEnumData { operand, case } => {
                    self.case_of.insert(operand, case);
                }
                InstrKind::RetainValue { operand } | InstrKind::ReleaseValue { operand } => {
                    if let Some(case) = self.case_of(operand) {
                        let increment = instr.kind.is_increment();
                        func.erase_instr(InstrPos::new(block, index));
                        let inserted =
                            insert_payload_rc(func, ctx, block, index, operand, case, increment);
                        stats.ref_count_ops_simplified += 1;
                        changed = true;
                        tracing::debug!(
                            block = block.raw(),
                            value = operand.raw(),
                            case = case.index,
                            payload_ops = inserted,
                            "narrowed enum RC operation to its payload"
                        );
                        index += inserted;
                        continue;
                    }
                }
                _ => {}
            }
            index += 1;
        }
        changed
    }
}
