//! Structural verifier for rcm IR.
//!
//! Checks the invariants every pass relies on and every pass must preserve:
//! block IDs match their arena slots, successors exist, edge arguments match
//! parameter lists, each value is defined once, every read value has a
//! definition (earlier in the same block when defined there), and nothing
//! branches back to the entry block.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::ir::{BlockId, Terminator, ValueId};
use crate::Function;

/// A violated IR invariant.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("block at index {index} has id {found}")]
    BlockIdMismatch { index: usize, found: u32 },

    #[error("entry block {0} does not exist")]
    MissingEntry(u32),

    #[error("block {block} branches to missing block {target}")]
    MissingSuccessor { block: u32, target: u32 },

    #[error("block {block} passes {got} arguments to block {target}, which takes {expected}")]
    ArgCountMismatch {
        block: u32,
        target: u32,
        expected: usize,
        got: usize,
    },

    #[error("value v{0} is defined more than once")]
    MultipleDefinitions(u32),

    #[error("value v{value} used in block {block} is never defined")]
    UndefinedValue { block: u32, value: u32 },

    #[error("value v{value} used in block {block} before its definition")]
    UseBeforeDef { block: u32, value: u32 },

    #[error("value v{0} has no recorded type")]
    MissingType(u32),

    #[error("block {block} branches to the entry block")]
    EntryHasPredecessor { block: u32 },
}

/// Verify `func`, returning the first violation found.
pub fn verify_function(func: &Function) -> Result<(), VerifyError> {
    for (index, block) in func.blocks.iter().enumerate() {
        if block.id.index() != index {
            return Err(VerifyError::BlockIdMismatch {
                index,
                found: block.id.raw(),
            });
        }
    }
    if func.entry.index() >= func.num_blocks() {
        return Err(VerifyError::MissingEntry(func.entry.raw()));
    }

    let defs = collect_definitions(func)?;

    for block in &func.blocks {
        check_edges(func, block.id, &block.terminator)?;

        // Values defined by this block's body, in order.
        let mut local: FxHashMap<ValueId, usize> = FxHashMap::default();
        for (i, instr) in block.body.iter().enumerate() {
            if let Some(dst) = instr.dst {
                local.insert(dst, i);
            }
        }

        for (i, instr) in block.body.iter().enumerate() {
            for op in instr.kind.operands() {
                check_use(&defs, &local, block.id, op, Some(i))?;
            }
        }
        for op in block.terminator.used_values() {
            check_use(&defs, &local, block.id, op, None)?;
        }
    }

    // The entry parameters are the function's arguments.
    if let Some(pred) = func
        .blocks
        .iter()
        .find(|block| block.terminator.successors().contains(&func.entry))
    {
        return Err(VerifyError::EntryHasPredecessor {
            block: pred.id.raw(),
        });
    }

    Ok(())
}

/// Map every defined value to its defining block, rejecting duplicates.
fn collect_definitions(func: &Function) -> Result<FxHashMap<ValueId, BlockId>, VerifyError> {
    let mut defs = FxHashMap::default();
    for block in &func.blocks {
        let body_defs = block.body.iter().filter_map(|i| i.dst);
        for value in block.params.iter().copied().chain(body_defs) {
            if value.index() >= func.value_types.len() {
                return Err(VerifyError::MissingType(value.raw()));
            }
            if defs.insert(value, block.id).is_some() {
                return Err(VerifyError::MultipleDefinitions(value.raw()));
            }
        }
    }
    Ok(defs)
}

fn check_use(
    defs: &FxHashMap<ValueId, BlockId>,
    local: &FxHashMap<ValueId, usize>,
    block: BlockId,
    value: ValueId,
    at: Option<usize>,
) -> Result<(), VerifyError> {
    if !defs.contains_key(&value) {
        return Err(VerifyError::UndefinedValue {
            block: block.raw(),
            value: value.raw(),
        });
    }
    if let (Some(&def_index), Some(use_index)) = (local.get(&value), at) {
        if def_index >= use_index {
            return Err(VerifyError::UseBeforeDef {
                block: block.raw(),
                value: value.raw(),
            });
        }
    }
    Ok(())
}

fn check_edges(func: &Function, block: BlockId, term: &Terminator) -> Result<(), VerifyError> {
    let mut seen = FxHashSet::default();
    for target in term.successors() {
        if target.index() >= func.num_blocks() {
            return Err(VerifyError::MissingSuccessor {
                block: block.raw(),
                target: target.raw(),
            });
        }
        if !seen.insert(target) {
            // Both arms of a conditional branch may target the same block;
            // check each argument list once below.
            continue;
        }

        let expected = func.block(target).params.len();
        let counts: Vec<usize> = match term {
            Terminator::Br { args, .. } => vec![args.len()],
            Terminator::CondBr {
                true_block,
                true_args,
                false_block,
                false_args,
                ..
            } => {
                let mut counts = Vec::with_capacity(2);
                if *true_block == target {
                    counts.push(true_args.len());
                }
                if *false_block == target {
                    counts.push(false_args.len());
                }
                counts
            }
            Terminator::CheckedCastBr { success, .. } if *success == target => vec![1],
            Terminator::SwitchEnum { .. } | Terminator::CheckedCastBr { .. } => vec![0],
            Terminator::Return { .. } | Terminator::Unreachable => Vec::new(),
        };

        if let Some(&got) = counts.iter().find(|&&got| got != expected) {
            return Err(VerifyError::ArgCountMismatch {
                block: block.raw(),
                target: target.raw(),
                expected,
                got,
            });
        }
    }
    Ok(())
}
