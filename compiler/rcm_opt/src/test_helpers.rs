//! Shared test utilities for the code-motion steps.
//!
//! Provides a small type universe, a [`PassContext`] over it, and counting
//! helpers. Only compiled in test builds.

use rcm_ir::{
    BlockId, CaseId, EnumCase, Function, Instr, InstrKind, Name, TypeClassifier, TypeId, TypePool,
    ValueId,
};

use crate::analysis::{BasicAliasAnalysis, RcIdentityAnalysis};
use crate::context::PassContext;

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// Shorthand for `Name::from_raw(n)`.
pub(crate) fn name(n: u32) -> Name {
    Name::from_raw(n)
}

/// Types most tests need.
///
/// - `class`: a class `C`
/// - `option`: `enum { none, some(C) }`
/// - `pair`: `struct { C, C }`
/// - `shape`: `enum { empty, count(i64), obj(C), pair(pair) }`
/// - `point`: `struct { i64, i64 }`
pub(crate) struct Types {
    pub pool: TypePool,
    pub class: TypeId,
    pub option: TypeId,
    pub pair: TypeId,
    pub shape: TypeId,
    pub point: TypeId,
}

impl Types {
    pub fn new() -> Self {
        let mut pool = TypePool::new();
        let class = pool.class(name(10));
        let option = pool.enumeration(
            name(11),
            vec![
                EnumCase {
                    name: name(12),
                    payload: None,
                },
                EnumCase {
                    name: name(13),
                    payload: Some(class),
                },
            ],
        );
        let pair = pool.structure(name(14), vec![class, class]);
        let shape = pool.enumeration(
            name(15),
            vec![
                EnumCase {
                    name: name(16),
                    payload: None,
                },
                EnumCase {
                    name: name(17),
                    payload: Some(TypeId::I64),
                },
                EnumCase {
                    name: name(18),
                    payload: Some(class),
                },
                EnumCase {
                    name: name(19),
                    payload: Some(pair),
                },
            ],
        );
        let point = pool.structure(name(20), vec![TypeId::I64, TypeId::I64]);
        Self {
            pool,
            class,
            option,
            pair,
            shape,
            point,
        }
    }

    pub fn none(&self) -> CaseId {
        CaseId::new(self.option, 0)
    }

    pub fn some(&self) -> CaseId {
        CaseId::new(self.option, 1)
    }

    /// Case `index` of `shape`: 0 `empty`, 1 `count`, 2 `obj`, 3 `pair`.
    pub fn shape_case(&self, index: u32) -> CaseId {
        CaseId::new(self.shape, index)
    }
}

/// Run `f` with the default analyses over `pool`.
pub(crate) fn with_ctx<R>(pool: &TypePool, f: impl FnOnce(&PassContext<'_>) -> R) -> R {
    let types = TypeClassifier::new(pool);
    let rc_identity = RcIdentityAnalysis::new(&types);
    let alias = BasicAliasAnalysis::new(&types, &rc_identity);
    let ctx = PassContext {
        pool,
        types: &types,
        alias: &alias,
        rc_identity: &rc_identity,
    };
    f(&ctx)
}

/// Instruction kinds of `block`, in order.
pub(crate) fn kinds(func: &Function, block: BlockId) -> Vec<InstrKind> {
    func.block(block)
        .body
        .iter()
        .map(|instr| instr.kind.clone())
        .collect()
}

/// Number of instructions in the whole function matching `pred`.
pub(crate) fn count_instrs(func: &Function, pred: impl Fn(&InstrKind) -> bool) -> usize {
    func.blocks
        .iter()
        .flat_map(|block| block.body.iter())
        .filter(|instr| pred(&instr.kind))
        .count()
}

/// The instruction defining `value`.
///
/// # Panics
///
/// Panics if `value` is not an instruction result.
pub(crate) fn def_of(func: &Function, value: ValueId) -> &Instr {
    match func.defining_instr(value) {
        Some(pos) => func.instr(pos),
        None => panic!("v{} is not defined by an instruction", value.raw()),
    }
}
