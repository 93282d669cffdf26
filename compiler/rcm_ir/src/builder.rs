//! Function builder.
//!
//! Follows the "position at a block, emit instructions, terminate" pattern
//! of LLVM's `IRBuilder`, with block parameters instead of phi nodes.

use crate::ir::{Block, BlockId, Instr, InstrKind, Terminator, ValueId};
use crate::types::{CaseId, TypeId};
use crate::{Function, Name};

struct BlockBuilder {
    id: BlockId,
    params: Vec<ValueId>,
    body: Vec<Instr>,
    terminator: Option<Terminator>,
}

impl BlockBuilder {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            params: Vec::new(),
            body: Vec::new(),
            terminator: None,
        }
    }
}

/// Incremental constructor for a [`Function`].
pub struct FunctionBuilder {
    name: Name,
    blocks: Vec<BlockBuilder>,
    current_block: BlockId,
    value_types: Vec<TypeId>,
}

impl FunctionBuilder {
    /// Create a builder with an entry block already allocated.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            blocks: vec![BlockBuilder::new(BlockId::new(0))],
            current_block: BlockId::new(0),
            value_types: Vec::new(),
        }
    }

    // Block management

    /// Allocate a new empty block and return its ID.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(
            u32::try_from(self.blocks.len())
                .unwrap_or_else(|_| panic!("block count exceeds u32::MAX")),
        );
        self.blocks.push(BlockBuilder::new(id));
        id
    }

    /// Set the current insertion point to the given block.
    pub fn position_at(&mut self, block: BlockId) {
        debug_assert!(
            block.index() < self.blocks.len(),
            "BlockId {} out of bounds (have {} blocks)",
            block.raw(),
            self.blocks.len(),
        );
        self.current_block = block;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Check whether the current block already has a terminator.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current_block.index()].terminator.is_some()
    }

    /// The entry block (always block 0).
    #[inline]
    pub fn entry_block(&self) -> BlockId {
        BlockId::new(0)
    }

    // Values

    /// Allocate a fresh value with the given type.
    pub fn fresh_value(&mut self, ty: TypeId) -> ValueId {
        let id = u32::try_from(self.value_types.len())
            .unwrap_or_else(|_| panic!("value count exceeds u32::MAX"));
        self.value_types.push(ty);
        ValueId::new(id)
    }

    /// Add a block parameter and return the value bound to it.
    pub fn add_block_param(&mut self, block: BlockId, ty: TypeId) -> ValueId {
        let value = self.fresh_value(ty);
        self.blocks[block.index()].params.push(value);
        value
    }

    // Instruction emission

    /// Emit an instruction producing a fresh value of type `ty`.
    pub fn emit(&mut self, ty: TypeId, kind: InstrKind) -> ValueId {
        let dst = self.fresh_value(ty);
        self.blocks[self.current_block.index()]
            .body
            .push(Instr::value(dst, kind));
        dst
    }

    /// Emit an instruction without a result.
    pub fn emit_effect(&mut self, kind: InstrKind) {
        self.blocks[self.current_block.index()]
            .body
            .push(Instr::effect(kind));
    }

    pub fn int_literal(&mut self, ty: TypeId, value: i64) -> ValueId {
        self.emit(ty, InstrKind::IntLiteral { value })
    }

    pub fn enum_value(&mut self, ty: TypeId, case: CaseId, payload: Option<ValueId>) -> ValueId {
        self.emit(ty, InstrKind::Enum { case, payload })
    }

    pub fn unchecked_enum_data(&mut self, ty: TypeId, operand: ValueId, case: CaseId) -> ValueId {
        self.emit(ty, InstrKind::UncheckedEnumData { operand, case })
    }

    pub fn apply(&mut self, ty: TypeId, callee: Name, args: Vec<ValueId>) -> ValueId {
        self.emit(ty, InstrKind::Apply { callee, args })
    }

    pub fn strong_retain(&mut self, operand: ValueId) {
        self.emit_effect(InstrKind::StrongRetain { operand });
    }

    pub fn strong_release(&mut self, operand: ValueId) {
        self.emit_effect(InstrKind::StrongRelease { operand });
    }

    pub fn retain_value(&mut self, operand: ValueId) {
        self.emit_effect(InstrKind::RetainValue { operand });
    }

    pub fn release_value(&mut self, operand: ValueId) {
        self.emit_effect(InstrKind::ReleaseValue { operand });
    }

    // Terminators

    /// Terminate the current block.
    ///
    /// # Panics
    ///
    /// Debug-panics if the block is already terminated.
    pub fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current_block.index()];
        debug_assert!(
            block.terminator.is_none(),
            "block {} terminated twice",
            block.id.raw(),
        );
        block.terminator = Some(terminator);
    }

    pub fn ret(&mut self, value: ValueId) {
        self.terminate(Terminator::Return { value });
    }

    pub fn unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }

    pub fn br(&mut self, target: BlockId, args: Vec<ValueId>) {
        self.terminate(Terminator::Br { target, args });
    }

    pub fn cond_br(
        &mut self,
        cond: ValueId,
        true_block: BlockId,
        true_args: Vec<ValueId>,
        false_block: BlockId,
        false_args: Vec<ValueId>,
    ) {
        self.terminate(Terminator::CondBr {
            cond,
            true_block,
            true_args,
            false_block,
            false_args,
        });
    }

    pub fn switch_enum(
        &mut self,
        operand: ValueId,
        cases: Vec<(CaseId, BlockId)>,
        default: Option<BlockId>,
    ) {
        self.terminate(Terminator::SwitchEnum {
            operand,
            cases,
            default,
        });
    }

    pub fn checked_cast_br(
        &mut self,
        operand: ValueId,
        target_ty: TypeId,
        success: BlockId,
        failure: BlockId,
    ) {
        self.terminate(Terminator::CheckedCastBr {
            operand,
            target_ty,
            success,
            failure,
        });
    }

    /// Finish building. Blocks left without a terminator get
    /// [`Terminator::Unreachable`].
    pub fn finish(self) -> Function {
        let blocks = self
            .blocks
            .into_iter()
            .map(|b| {
                let terminator = b.terminator.unwrap_or_else(|| {
                    tracing::warn!(
                        block = b.id.raw(),
                        "unterminated block, defaulting to unreachable"
                    );
                    Terminator::Unreachable
                });
                Block {
                    id: b.id,
                    params: b.params,
                    body: b.body,
                    terminator,
                }
            })
            .collect();

        Function {
            name: self.name,
            blocks,
            entry: BlockId::new(0),
            value_types: self.value_types,
        }
    }
}
