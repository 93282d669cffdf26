//! rcm IR: SSA basic-block IR with explicit reference counting.
//!
//! # Architecture
//!
//! - **[`Function`](crate::Function)**: blocks, entry, value types
//! - **[`Block`]**: parameters, body instructions, terminator
//! - **[`Instr`]**: an optional result value plus an [`InstrKind`]
//! - **[`Terminator`]**: block exit (return, branch, switch, cast)
//!
//! Values are named via [`ValueId`] and are defined exactly once, either by
//! an instruction result or by a block parameter. Branches pass arguments
//! to the parameters of their target block instead of using phi nodes.

use bitflags::bitflags;
use smallvec::{smallvec, SmallVec};

use crate::types::{CaseId, TypeId};
use crate::Name;

// ── ID newtypes ─────────────────────────────────────────────────────

/// SSA value ID within a [`Function`](crate::Function).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    /// Create a new value ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic block ID within a [`Function`](crate::Function).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    /// Create a new block ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Position of an instruction: block plus index into the block body.
///
/// Positions are only valid until the next mutation of that block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstrPos {
    pub block: BlockId,
    pub index: usize,
}

impl InstrPos {
    #[inline]
    pub fn new(block: BlockId, index: usize) -> Self {
        Self { block, index }
    }
}

// ── Effects ─────────────────────────────────────────────────────────

bitflags! {
    /// Memory and reference-counting behavior of an instruction.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct Effects: u8 {
        /// May read memory (loads, calls, releases running deinits).
        const READS_MEMORY = 1 << 0;
        /// Has effects beyond producing its result.
        const SIDE_EFFECTS = 1 << 1;
        /// May decrement a reference count.
        const MAY_RELEASE = 1 << 2;
        /// Observes a reference count (uniqueness checks).
        const RC_CHECK = 1 << 3;
        /// Allocates a fresh object or stack slot.
        const ALLOCATION = 1 << 4;
    }
}

// ── Instructions ────────────────────────────────────────────────────

/// Pure scalar builtin operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    CmpEq,
    CmpLt,
}

/// The operation performed by an instruction.
///
/// Every operand is a [`ValueId`]; everything else is immediate data that
/// takes part in structural comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstrKind {
    // ── Literals ────────────────────────────────────────────────
    IntLiteral { value: i64 },
    FloatLiteral { bits: u64 },
    StringLiteral { value: Name },

    // ── Pure value operations ───────────────────────────────────
    Builtin { op: BuiltinOp, args: Vec<ValueId> },
    Struct { args: Vec<ValueId> },
    Tuple { args: Vec<ValueId> },
    StructExtract { operand: ValueId, field: u32 },
    TupleExtract { operand: ValueId, index: u32 },

    // ── Enums ───────────────────────────────────────────────────
    /// Construct an enum value of case `case`.
    Enum {
        case: CaseId,
        payload: Option<ValueId>,
    },
    /// Read the payload of `operand`, assuming it holds `case`.
    UncheckedEnumData { operand: ValueId, case: CaseId },
    /// Map the case of `operand` to one of the given values.
    SelectEnum {
        operand: ValueId,
        cases: Vec<(CaseId, ValueId)>,
        default: Option<ValueId>,
    },

    // ── Conversions ─────────────────────────────────────────────
    Upcast { operand: ValueId },
    UncheckedRefCast { operand: ValueId },
    UnownedToRef { operand: ValueId },
    RefToUnowned { operand: ValueId },

    // ── Memory ──────────────────────────────────────────────────
    AllocRef { class: Name },
    AllocStack,
    Load { address: ValueId },
    Store { value: ValueId, address: ValueId },

    /// Call with unknown effects.
    Apply { callee: Name, args: Vec<ValueId> },

    // ── Reference counting ──────────────────────────────────────
    StrongRetain { operand: ValueId },
    StrongRelease { operand: ValueId },
    RetainValue { operand: ValueId },
    ReleaseValue { operand: ValueId },
    /// Uniqueness check of a reference.
    IsUnique { operand: ValueId },

    /// Trap if `cond` is true.
    CondFail { cond: ValueId },
}

impl InstrKind {
    /// All operand values in a fixed order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            InstrKind::IntLiteral { .. }
            | InstrKind::FloatLiteral { .. }
            | InstrKind::StringLiteral { .. }
            | InstrKind::AllocRef { .. }
            | InstrKind::AllocStack => SmallVec::new(),

            InstrKind::Builtin { args, .. }
            | InstrKind::Struct { args }
            | InstrKind::Tuple { args }
            | InstrKind::Apply { args, .. } => args.iter().copied().collect(),

            InstrKind::StructExtract { operand, .. }
            | InstrKind::TupleExtract { operand, .. }
            | InstrKind::UncheckedEnumData { operand, .. }
            | InstrKind::Upcast { operand }
            | InstrKind::UncheckedRefCast { operand }
            | InstrKind::UnownedToRef { operand }
            | InstrKind::RefToUnowned { operand }
            | InstrKind::StrongRetain { operand }
            | InstrKind::StrongRelease { operand }
            | InstrKind::RetainValue { operand }
            | InstrKind::ReleaseValue { operand }
            | InstrKind::IsUnique { operand } => smallvec![*operand],

            InstrKind::Enum { payload, .. } => payload.iter().copied().collect(),

            InstrKind::SelectEnum {
                operand,
                cases,
                default,
            } => {
                let mut ops = SmallVec::with_capacity(cases.len() + 2);
                ops.push(*operand);
                ops.extend(cases.iter().map(|&(_, v)| v));
                ops.extend(default.iter().copied());
                ops
            }

            InstrKind::Load { address } => smallvec![*address],
            InstrKind::Store { value, address } => smallvec![*value, *address],
            InstrKind::CondFail { cond } => smallvec![*cond],
        }
    }

    /// Mutable references to all operands, in the same order as
    /// [`operands`](Self::operands).
    pub fn operands_mut(&mut self) -> SmallVec<[&mut ValueId; 4]> {
        match self {
            InstrKind::IntLiteral { .. }
            | InstrKind::FloatLiteral { .. }
            | InstrKind::StringLiteral { .. }
            | InstrKind::AllocRef { .. }
            | InstrKind::AllocStack => SmallVec::new(),

            InstrKind::Builtin { args, .. }
            | InstrKind::Struct { args }
            | InstrKind::Tuple { args }
            | InstrKind::Apply { args, .. } => args.iter_mut().collect(),

            InstrKind::StructExtract { operand, .. }
            | InstrKind::TupleExtract { operand, .. }
            | InstrKind::UncheckedEnumData { operand, .. }
            | InstrKind::Upcast { operand }
            | InstrKind::UncheckedRefCast { operand }
            | InstrKind::UnownedToRef { operand }
            | InstrKind::RefToUnowned { operand }
            | InstrKind::StrongRetain { operand }
            | InstrKind::StrongRelease { operand }
            | InstrKind::RetainValue { operand }
            | InstrKind::ReleaseValue { operand }
            | InstrKind::IsUnique { operand } => smallvec![operand],

            InstrKind::Enum { payload, .. } => payload.iter_mut().collect(),

            InstrKind::SelectEnum {
                operand,
                cases,
                default,
            } => {
                let mut ops: SmallVec<[&mut ValueId; 4]> = SmallVec::new();
                ops.push(operand);
                ops.extend(cases.iter_mut().map(|(_, v)| v));
                ops.extend(default.iter_mut());
                ops
            }

            InstrKind::Load { address } => smallvec![address],
            InstrKind::Store { value, address } => smallvec![value, address],
            InstrKind::CondFail { cond } => smallvec![cond],
        }
    }

    /// Number of operands.
    pub fn num_operands(&self) -> usize {
        self.operands().len()
    }

    /// Replace the operand at `index` (in [`operands`](Self::operands) order).
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn set_operand(&mut self, index: usize, value: ValueId) {
        let mut ops = self.operands_mut();
        let count = ops.len();
        match ops.get_mut(index) {
            Some(slot) => **slot = value,
            None => panic!("operand index {index} out of range ({count} operands)"),
        }
    }

    /// Replace every read of `old` with `new`.
    pub fn substitute_value(&mut self, old: ValueId, new: ValueId) {
        for op in self.operands_mut() {
            if *op == old {
                *op = new;
            }
        }
    }

    /// Returns `true` if this instruction reads `value`.
    pub fn uses_value(&self, value: ValueId) -> bool {
        self.operands().contains(&value)
    }

    /// Returns `true` if `self` and `other` are the same operation with the
    /// same immediates and operand count, ignoring the operand values.
    pub fn same_shape(&self, other: &InstrKind) -> bool {
        if std::mem::discriminant(self) != std::mem::discriminant(other) {
            return false;
        }
        let mut a = self.clone();
        let mut b = other.clone();
        let placeholder = ValueId::new(0);
        for op in a.operands_mut() {
            *op = placeholder;
        }
        for op in b.operands_mut() {
            *op = placeholder;
        }
        a == b
    }

    /// Memory and reference-counting behavior.
    pub fn effects(&self) -> Effects {
        match self {
            InstrKind::IntLiteral { .. }
            | InstrKind::FloatLiteral { .. }
            | InstrKind::StringLiteral { .. }
            | InstrKind::Builtin { .. }
            | InstrKind::Struct { .. }
            | InstrKind::Tuple { .. }
            | InstrKind::StructExtract { .. }
            | InstrKind::TupleExtract { .. }
            | InstrKind::Enum { .. }
            | InstrKind::UncheckedEnumData { .. }
            | InstrKind::SelectEnum { .. }
            | InstrKind::Upcast { .. }
            | InstrKind::UncheckedRefCast { .. }
            | InstrKind::UnownedToRef { .. }
            | InstrKind::RefToUnowned { .. } => Effects::empty(),

            InstrKind::AllocRef { .. } | InstrKind::AllocStack => {
                Effects::ALLOCATION | Effects::SIDE_EFFECTS
            }

            InstrKind::Load { .. } => Effects::READS_MEMORY,

            // A store may overwrite (and release) the previous value.
            InstrKind::Store { .. } => Effects::SIDE_EFFECTS | Effects::MAY_RELEASE,

            InstrKind::Apply { .. } => {
                Effects::READS_MEMORY | Effects::SIDE_EFFECTS | Effects::MAY_RELEASE
            }

            InstrKind::StrongRetain { .. } | InstrKind::RetainValue { .. } => {
                Effects::SIDE_EFFECTS
            }

            InstrKind::StrongRelease { .. } | InstrKind::ReleaseValue { .. } => {
                Effects::READS_MEMORY | Effects::SIDE_EFFECTS | Effects::MAY_RELEASE
            }

            InstrKind::IsUnique { .. } => {
                Effects::READS_MEMORY | Effects::SIDE_EFFECTS | Effects::RC_CHECK
            }

            InstrKind::CondFail { .. } => Effects::SIDE_EFFECTS,
        }
    }

    #[inline]
    pub fn may_have_side_effects(&self) -> bool {
        self.effects().contains(Effects::SIDE_EFFECTS)
    }

    #[inline]
    pub fn may_read_memory(&self) -> bool {
        self.effects().contains(Effects::READS_MEMORY)
    }

    #[inline]
    pub fn is_allocation(&self) -> bool {
        self.effects().contains(Effects::ALLOCATION)
    }

    /// Returns `true` for literal instructions.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            InstrKind::IntLiteral { .. }
                | InstrKind::FloatLiteral { .. }
                | InstrKind::StringLiteral { .. }
        )
    }

    /// Returns `true` for `strong_retain` and `retain_value`.
    pub fn is_increment(&self) -> bool {
        matches!(
            self,
            InstrKind::StrongRetain { .. } | InstrKind::RetainValue { .. }
        )
    }

    /// Returns `true` for `strong_release` and `release_value`.
    pub fn is_decrement(&self) -> bool {
        matches!(
            self,
            InstrKind::StrongRelease { .. } | InstrKind::ReleaseValue { .. }
        )
    }

    /// The reference-counted operand of a retain or release.
    pub fn rc_operand(&self) -> Option<ValueId> {
        match self {
            InstrKind::StrongRetain { operand }
            | InstrKind::StrongRelease { operand }
            | InstrKind::RetainValue { operand }
            | InstrKind::ReleaseValue { operand } => Some(*operand),
            _ => None,
        }
    }

    /// The same retain or release operation applied to a different operand.
    ///
    /// Returns `None` for non-RC instructions.
    pub fn with_rc_operand(&self, operand: ValueId) -> Option<InstrKind> {
        match self {
            InstrKind::StrongRetain { .. } => Some(InstrKind::StrongRetain { operand }),
            InstrKind::StrongRelease { .. } => Some(InstrKind::StrongRelease { operand }),
            InstrKind::RetainValue { .. } => Some(InstrKind::RetainValue { operand }),
            InstrKind::ReleaseValue { .. } => Some(InstrKind::ReleaseValue { operand }),
            _ => None,
        }
    }
}

/// A single instruction: an optional result value plus the operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instr {
    pub dst: Option<ValueId>,
    pub kind: InstrKind,
}

impl Instr {
    /// An instruction producing `dst`.
    pub fn value(dst: ValueId, kind: InstrKind) -> Self {
        Self {
            dst: Some(dst),
            kind,
        }
    }

    /// An instruction executed only for its effects.
    pub fn effect(kind: InstrKind) -> Self {
        Self { dst: None, kind }
    }
}

// ── Terminators ─────────────────────────────────────────────────────

/// Block terminator: how control leaves a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminator {
    /// Return a value from the function.
    Return { value: ValueId },

    /// Control never reaches the end of this block.
    Unreachable,

    /// Unconditional branch, passing `args` to the target's parameters.
    Br { target: BlockId, args: Vec<ValueId> },

    /// Two-way branch on an `i1`.
    CondBr {
        cond: ValueId,
        true_block: BlockId,
        true_args: Vec<ValueId>,
        false_block: BlockId,
        false_args: Vec<ValueId>,
    },

    /// Multi-way branch on the case of an enum. Successors take no
    /// parameters; the payload is read with `UncheckedEnumData`.
    SwitchEnum {
        operand: ValueId,
        cases: Vec<(CaseId, BlockId)>,
        default: Option<BlockId>,
    },

    /// Type-refining cast. `success` takes one parameter, the cast value;
    /// `failure` takes none.
    CheckedCastBr {
        operand: ValueId,
        target_ty: TypeId,
        success: BlockId,
        failure: BlockId,
    },
}

impl Terminator {
    /// Successor blocks in edge order. A block targeted by two edges
    /// appears twice.
    pub fn successors(&self) -> SmallVec<[BlockId; 4]> {
        match self {
            Terminator::Return { .. } | Terminator::Unreachable => SmallVec::new(),
            Terminator::Br { target, .. } => smallvec![*target],
            Terminator::CondBr {
                true_block,
                false_block,
                ..
            } => smallvec![*true_block, *false_block],
            Terminator::SwitchEnum { cases, default, .. } => {
                let mut targets: SmallVec<[BlockId; 4]> =
                    cases.iter().map(|&(_, b)| b).collect();
                targets.extend(default.iter().copied());
                targets
            }
            Terminator::CheckedCastBr {
                success, failure, ..
            } => smallvec![*success, *failure],
        }
    }

    /// The single successor, if this terminator has exactly one edge.
    pub fn single_successor(&self) -> Option<BlockId> {
        match self {
            Terminator::Br { target, .. } => Some(*target),
            Terminator::SwitchEnum { cases, default, .. } => match (cases.as_slice(), default) {
                ([(_, only)], None) => Some(*only),
                ([], Some(only)) => Some(*only),
                _ => None,
            },
            _ => None,
        }
    }

    /// The explicit arguments passed along the edge to `succ`.
    ///
    /// `None` if `succ` is not a successor or the edge binds its parameters
    /// implicitly (checked-cast success). For a conditional branch with both
    /// edges to `succ` the false edge wins.
    pub fn args_for(&self, succ: BlockId) -> Option<&[ValueId]> {
        match self {
            Terminator::Br { target, args } if *target == succ => Some(args.as_slice()),
            Terminator::CondBr {
                true_block,
                true_args,
                false_block,
                false_args,
                ..
            } => {
                if *false_block == succ {
                    Some(false_args.as_slice())
                } else if *true_block == succ {
                    Some(true_args.as_slice())
                } else {
                    None
                }
            }
            Terminator::SwitchEnum { .. } if self.successors().contains(&succ) => Some(&[][..]),
            Terminator::CheckedCastBr { failure, .. } if *failure == succ => Some(&[][..]),
            _ => None,
        }
    }

    /// Every explicit argument list that feeds `succ`. Empty for edges
    /// without argument lists (switches, checked casts).
    pub fn arg_lists_for(&self, succ: BlockId) -> SmallVec<[&[ValueId]; 2]> {
        match self {
            Terminator::Br { target, args } if *target == succ => smallvec![args.as_slice()],
            Terminator::CondBr {
                true_block,
                true_args,
                false_block,
                false_args,
                ..
            } => {
                let mut lists: SmallVec<[&[ValueId]; 2]> = SmallVec::new();
                if *true_block == succ {
                    lists.push(true_args);
                }
                if *false_block == succ {
                    lists.push(false_args);
                }
                lists
            }
            _ => SmallVec::new(),
        }
    }

    /// Mutable access to every argument list that feeds `succ`.
    pub fn args_for_mut(&mut self, succ: BlockId) -> SmallVec<[&mut Vec<ValueId>; 2]> {
        match self {
            Terminator::Br { target, args } if *target == succ => smallvec![args],
            Terminator::CondBr {
                true_block,
                true_args,
                false_block,
                false_args,
                ..
            } => {
                let mut lists: SmallVec<[&mut Vec<ValueId>; 2]> = SmallVec::new();
                if *true_block == succ {
                    lists.push(true_args);
                }
                if *false_block == succ {
                    lists.push(false_args);
                }
                lists
            }
            _ => SmallVec::new(),
        }
    }

    /// All values read by this terminator.
    pub fn used_values(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            Terminator::Return { value } => smallvec![*value],
            Terminator::Unreachable => SmallVec::new(),
            Terminator::Br { args, .. } => args.iter().copied().collect(),
            Terminator::CondBr {
                cond,
                true_args,
                false_args,
                ..
            } => {
                let mut vals = SmallVec::with_capacity(1 + true_args.len() + false_args.len());
                vals.push(*cond);
                vals.extend_from_slice(true_args);
                vals.extend_from_slice(false_args);
                vals
            }
            Terminator::SwitchEnum { operand, .. } | Terminator::CheckedCastBr { operand, .. } => {
                smallvec![*operand]
            }
        }
    }

    /// Replace every read of `old` with `new`.
    pub fn substitute_value(&mut self, old: ValueId, new: ValueId) {
        fn sub(v: &mut ValueId, old: ValueId, new: ValueId) {
            if *v == old {
                *v = new;
            }
        }
        match self {
            Terminator::Return { value } => sub(value, old, new),
            Terminator::Unreachable => {}
            Terminator::Br { args, .. } => {
                for a in args {
                    sub(a, old, new);
                }
            }
            Terminator::CondBr {
                cond,
                true_args,
                false_args,
                ..
            } => {
                sub(cond, old, new);
                for a in true_args.iter_mut().chain(false_args.iter_mut()) {
                    sub(a, old, new);
                }
            }
            Terminator::SwitchEnum { operand, .. } | Terminator::CheckedCastBr { operand, .. } => {
                sub(operand, old, new);
            }
        }
    }
}

// ── Blocks ──────────────────────────────────────────────────────────

/// A basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    /// This block's identifier.
    pub id: BlockId,
    /// Block parameters, bound by the arguments of incoming branches.
    pub params: Vec<ValueId>,
    /// Sequential instructions executed in order.
    pub body: Vec<Instr>,
    /// How control leaves this block.
    pub terminator: Terminator,
}
