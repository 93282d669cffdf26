//! Per-function driver.
//!
//! Visits every reachable block once in reverse post-order and runs, in
//! order:
//!
//! 1. merge of the predecessors' enum-tag states
//! 2. release hoisting into switch regions ([`Variant::Late`] only)
//! 3. retain sinking out of switch regions
//! 4. RC operand canonicalization
//! 5. sinking of identical code, arguments and literals from predecessors
//! 6. the enum-tag transfer function
//! 7. local retain sinking and release hoisting into predecessors, when
//!    enabled by [`CodeMotionConfig::rr_code_motion`]
//!
//! Blocks later in the order observe the rewrites made in earlier ones.
//!
//! [`Variant::Late`]: crate::Variant::Late

use tracing::{debug, trace};

use rcm_ir::{Cfg, Function, PostOrder, TypeClassifier, TypePool};

use crate::analysis::{BasicAliasAnalysis, RcIdentityAnalysis};
use crate::canonicalize::canonicalize_ref_count_ops;
use crate::config::CodeMotionConfig;
use crate::context::PassContext;
use crate::enum_dataflow::EnumTagDataflow;
use crate::rc_motion::{hoist_decrements_to_predecessors, sink_ref_count_increments};
use crate::sink::{
    sink_arguments_from_predecessors, sink_code_from_predecessors,
    sink_literals_from_predecessors,
};
use crate::stats::{CodeMotionOutcome, CodeMotionStats};

/// Run code motion on `func` with the default analyses over `pool`.
pub fn run_code_motion(
    func: &mut Function,
    pool: &TypePool,
    config: CodeMotionConfig,
) -> CodeMotionOutcome {
    let types = TypeClassifier::new(pool);
    let rc_identity = RcIdentityAnalysis::new(&types);
    let alias = BasicAliasAnalysis::new(&types, &rc_identity);
    let ctx = PassContext {
        pool,
        types: &types,
        alias: &alias,
        rc_identity: &rc_identity,
    };
    run_code_motion_with(func, &ctx, config)
}

/// Run code motion on `func` with caller-supplied analyses.
pub fn run_code_motion_with(
    func: &mut Function,
    ctx: &PassContext<'_>,
    config: CodeMotionConfig,
) -> CodeMotionOutcome {
    // No step adds, removes or retargets edges.
    let cfg = Cfg::build(func);
    let po = PostOrder::compute(func);
    let mut dataflow = EnumTagDataflow::new(&po);
    let mut stats = CodeMotionStats::default();
    let mut changed = false;

    for &block in po.reverse_post_order() {
        trace!(block = block.raw(), "visiting block");

        let mut state = dataflow.merge_predecessors(func, ctx.pool, &cfg, block);

        if config.hoists_releases() {
            changed |= state.hoist_decrements_into_switch_regions(func, ctx, &cfg, block, &mut stats);
        }
        changed |= state.sink_increments_out_of_switch_regions(func, ctx, &cfg, block, &mut stats);

        changed |= canonicalize_ref_count_ops(func, &cfg, ctx.types, block);
        changed |= sink_code_from_predecessors(func, &cfg, block, &mut stats);
        changed |= sink_arguments_from_predecessors(func, ctx, &cfg, block, &mut stats);
        changed |= sink_literals_from_predecessors(func, &cfg, block);

        changed |= state.process(func, ctx, block, &mut stats);

        if config.rr_code_motion {
            changed |= sink_ref_count_increments(func, ctx, &cfg, block, &mut stats);
            if config.hoists_releases() {
                changed |= hoist_decrements_to_predecessors(func, ctx, &cfg, block, &mut stats);
            }
        }

        dataflow.record(block, state);
    }

    debug!(
        function = func.name.raw(),
        changed,
        sunk = stats.sunk,
        hoisted = stats.hoisted,
        ref_count_ops_simplified = stats.ref_count_ops_simplified,
        "code motion finished"
    );
    CodeMotionOutcome::new(changed, stats)
}
