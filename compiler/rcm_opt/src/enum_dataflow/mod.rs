//! Enum-tag dataflow.
//!
//! Tracks, per block, which case each enum value is known to hold, and uses
//! that knowledge to narrow whole-enum RC operations to their payload.
//!
//! # Algorithm
//!
//! Blocks are visited once in reverse post-order. A block's entry state is
//! the intersection of its predecessors' exit states ([`EnumTagState::merge`]):
//! a value keeps its case only if every predecessor agrees. When the block
//! has a single incoming edge, the predecessor's terminator contributes the
//! case implied by the edge (`switch_enum` arm, or a `cond_br` on a
//! `select_enum` with a single true case). Then [`EnumTagState::process`]
//! walks the block, learning cases from `enum` and `unchecked_enum_data`
//! and rewriting `retain_value`/`release_value` of values whose case is
//! known.
//!
//! Alongside the case map, each state keeps the `(predecessor, case)` pairs
//! each value was seen with. A complete list marks the exit of a switch
//! region, where the transforms in `regions` apply.
//!
//! Loops are not iterated: a back edge's predecessor has no state yet when
//! its header is visited, so the header starts with nothing known.

mod blot_map;
mod regions;
mod state;

pub use blot_map::BlotMap;
pub use state::{CaseList, EnumTagState};

use smallvec::SmallVec;

use rcm_ir::{BlockId, Cfg, Function, PostOrder, TypePool};

/// Exit states of the blocks visited so far, indexed by RPO number.
pub struct EnumTagDataflow<'po> {
    po: &'po PostOrder,
    states: Vec<Option<EnumTagState>>,
}

impl<'po> EnumTagDataflow<'po> {
    pub fn new(po: &'po PostOrder) -> Self {
        let mut states = Vec::new();
        states.resize_with(po.reverse_post_order().len(), || None);
        Self { po, states }
    }

    /// The recorded exit state of `block`, if it is reachable and has been
    /// visited.
    pub fn state(&self, block: BlockId) -> Option<&EnumTagState> {
        let rpo = self.po.rpo_number(block)?;
        self.states.get(rpo as usize)?.as_ref()
    }

    /// Record the exit state of `block`. Unreachable blocks are ignored.
    pub fn record(&mut self, block: BlockId, state: EnumTagState) {
        if let Some(slot) = self
            .po
            .rpo_number(block)
            .and_then(|rpo| self.states.get_mut(rpo as usize))
        {
            *slot = Some(state);
        }
    }

    /// Entry state of `block` from the exit states recorded for its
    /// predecessors.
    pub fn merge_predecessors(
        &self,
        func: &Function,
        pool: &TypePool,
        cfg: &Cfg,
        block: BlockId,
    ) -> EnumTagState {
        let pred_states: SmallVec<[Option<&EnumTagState>; 4]> = cfg
            .preds(block)
            .iter()
            .map(|&pred| self.state(pred))
            .collect();
        EnumTagState::merge(func, pool, cfg, block, &pred_states)
    }
}
