//! Functions and the in-place mutation primitives used by optimizer passes.
//!
//! A [`Function`] owns its blocks in an arena indexed by [`BlockId`].
//! Predecessor edges are never stored; they are recomputed from
//! terminators by [`Cfg`](crate::graph::Cfg).
//!
//! Instruction positions ([`InstrPos`]) are plain indices. Any mutation of a
//! block invalidates positions into that block, so passes look positions up
//! again (usually by result value) after each change.

use smallvec::SmallVec;

use crate::ir::{Block, BlockId, Instr, InstrPos, Terminator, ValueId};
use crate::types::TypeId;
use crate::Name;

/// A function in rcm IR.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    /// The function's name.
    pub name: Name,
    /// Basic blocks in definition order. `blocks[id.index()].id == id`.
    pub blocks: Vec<Block>,
    /// The entry block ID.
    pub entry: BlockId,
    /// Type of each value, indexed by `ValueId::index()`.
    pub value_types: Vec<TypeId>,
}

impl Function {
    // ── Values ──────────────────────────────────────────────────

    /// Look up the type of a value.
    ///
    /// # Panics
    ///
    /// Debug-panics if `value` is out of bounds.
    #[inline]
    pub fn value_type(&self, value: ValueId) -> TypeId {
        debug_assert!(
            value.index() < self.value_types.len(),
            "ValueId {} out of bounds (have {} values)",
            value.raw(),
            self.value_types.len(),
        );
        self.value_types[value.index()]
    }

    /// Allocate a fresh value with the given type.
    ///
    /// The value has no definition until it is placed as an instruction
    /// result or a block parameter.
    pub fn fresh_value(&mut self, ty: TypeId) -> ValueId {
        let id = u32::try_from(self.value_types.len())
            .unwrap_or_else(|_| panic!("value count exceeds u32::MAX"));
        self.value_types.push(ty);
        ValueId::new(id)
    }

    // ── Blocks ──────────────────────────────────────────────────

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    #[inline]
    pub fn terminator(&self, id: BlockId) -> &Terminator {
        &self.blocks[id.index()].terminator
    }

    /// Iterate over all block IDs in definition order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.iter().map(|b| b.id)
    }

    /// Number of blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    // ── Instructions ────────────────────────────────────────────

    #[inline]
    pub fn instr(&self, pos: InstrPos) -> &Instr {
        &self.blocks[pos.block.index()].body[pos.index]
    }

    #[inline]
    pub fn instr_mut(&mut self, pos: InstrPos) -> &mut Instr {
        &mut self.blocks[pos.block.index()].body[pos.index]
    }

    /// Insert `instr` before the instruction at `index` in `block`.
    ///
    /// `index == body.len()` inserts immediately before the terminator.
    pub fn insert_instr(&mut self, block: BlockId, index: usize, instr: Instr) -> InstrPos {
        self.blocks[block.index()].body.insert(index, instr);
        InstrPos::new(block, index)
    }

    /// Move the instruction at `from` so that it ends up immediately before
    /// the instruction currently at `index` in `block` (or before the
    /// terminator when `index == body.len()`).
    ///
    /// Returns the instruction's new position.
    pub fn move_instr(&mut self, from: InstrPos, block: BlockId, index: usize) -> InstrPos {
        let instr = self.remove_instr(from);
        let index = if from.block == block && from.index < index {
            index - 1
        } else {
            index
        };
        self.insert_instr(block, index, instr)
    }

    /// Detach an instruction from its block and return it.
    ///
    /// Uses of its result are left in place; the caller either re-inserts
    /// the instruction or rewrites them.
    pub fn remove_instr(&mut self, pos: InstrPos) -> Instr {
        self.blocks[pos.block.index()].body.remove(pos.index)
    }

    /// Delete an instruction whose result (if any) has no remaining uses.
    ///
    /// # Panics
    ///
    /// Debug-panics if the result is still used.
    pub fn erase_instr(&mut self, pos: InstrPos) {
        let removed = self.remove_instr(pos);
        if let Some(dst) = removed.dst {
            debug_assert_eq!(
                self.use_count(dst),
                0,
                "erasing {removed:?} whose result v{} is still used",
                dst.raw(),
            );
        }
    }

    // ── Uses and definitions ────────────────────────────────────

    /// Rewrite every use of `old` (in instructions and terminators) to `new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        for block in &mut self.blocks {
            for instr in &mut block.body {
                instr.kind.substitute_value(old, new);
            }
            block.terminator.substitute_value(old, new);
        }
    }

    /// Number of operand slots (in instructions and terminators) reading
    /// `value`.
    pub fn use_count(&self, value: ValueId) -> usize {
        self.blocks
            .iter()
            .map(|block| {
                let in_body: usize = block
                    .body
                    .iter()
                    .map(|instr| {
                        instr
                            .kind
                            .operands()
                            .iter()
                            .filter(|&&op| op == value)
                            .count()
                    })
                    .sum();
                let in_term = block
                    .terminator
                    .used_values()
                    .iter()
                    .filter(|&&op| op == value)
                    .count();
                in_body + in_term
            })
            .sum()
    }

    /// Returns `true` if nothing reads `value`.
    pub fn has_no_uses(&self, value: ValueId) -> bool {
        self.use_count(value) == 0
    }

    /// Position of the instruction defining `value`, if it is an
    /// instruction result.
    pub fn defining_instr(&self, value: ValueId) -> Option<InstrPos> {
        self.blocks.iter().find_map(|block| {
            block
                .body
                .iter()
                .position(|instr| instr.dst == Some(value))
                .map(|index| InstrPos::new(block.id, index))
        })
    }

    /// Block and parameter index of `value`, if it is a block parameter.
    pub fn block_param_position(&self, value: ValueId) -> Option<(BlockId, usize)> {
        self.blocks.iter().find_map(|block| {
            block
                .params
                .iter()
                .position(|&p| p == value)
                .map(|index| (block.id, index))
        })
    }

    /// The block defining `value`, either as a parameter or an instruction.
    pub fn defining_block(&self, value: ValueId) -> Option<BlockId> {
        self.block_param_position(value)
            .map(|(block, _)| block)
            .or_else(|| self.defining_instr(value).map(|pos| pos.block))
    }

    // ── Block parameters and edges ──────────────────────────────

    /// The arguments `pred` passes to `succ`. See
    /// [`Terminator::args_for`].
    pub fn edge_args(&self, pred: BlockId, succ: BlockId) -> Option<&[ValueId]> {
        self.terminator(pred).args_for(succ)
    }

    /// Every explicit argument list `pred` passes to `succ`.
    pub fn edge_args_mut(
        &mut self,
        pred: BlockId,
        succ: BlockId,
    ) -> SmallVec<[&mut Vec<ValueId>; 2]> {
        self.blocks[pred.index()].terminator.args_for_mut(succ)
    }

    /// Replace parameter `index` of `block` with a fresh value of type `ty`
    /// at the same position and return it.
    ///
    /// The old parameter must have no remaining uses. Incoming arguments
    /// are left unchanged; the caller rewrites them to match `ty`.
    pub fn replace_block_param(&mut self, block: BlockId, index: usize, ty: TypeId) -> ValueId {
        let new = self.fresh_value(ty);
        let old = std::mem::replace(&mut self.blocks[block.index()].params[index], new);
        debug_assert_eq!(
            self.use_count(old),
            0,
            "replacing parameter v{} that is still used",
            old.raw(),
        );
        new
    }

    /// Remove parameter `index` of `block` together with the matching
    /// argument on every incoming edge.
    ///
    /// The parameter must have no remaining uses.
    pub fn remove_block_param(&mut self, block: BlockId, index: usize) {
        let old = self.blocks[block.index()].params.remove(index);
        debug_assert_eq!(
            self.use_count(old),
            0,
            "removing parameter v{} that is still used",
            old.raw(),
        );
        for pred in &mut self.blocks {
            for args in pred.terminator.args_for_mut(block) {
                args.remove(index);
            }
        }
    }
}
