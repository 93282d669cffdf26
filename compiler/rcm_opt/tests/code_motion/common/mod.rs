//! Shared builders for code-motion tests.

use rcm_ir::{
    verify_function, BlockId, CaseId, EnumCase, Function, InstrKind, Name, TypeId, TypePool,
    ValueId,
};
use rcm_opt::{init_tracing, run_code_motion, CodeMotionConfig, CodeMotionOutcome};

pub fn name(n: u32) -> Name {
    Name::from_raw(n)
}

/// The types the tests are written against.
pub struct Universe {
    pub pool: TypePool,
    /// A class `C`.
    pub class: TypeId,
    /// `enum { none, some(C) }`
    pub option: TypeId,
    /// `struct { C, C }`
    pub pair: TypeId,
    /// `enum { empty, count(i64), obj(C), pair(pair) }`
    pub shape: TypeId,
    /// `struct { i64, i64 }`
    pub point: TypeId,
}

impl Universe {
    pub fn new() -> Self {
        let mut pool = TypePool::new();
        let class = pool.class(name(100));
        let option = pool.enumeration(
            name(101),
            vec![
                EnumCase {
                    name: name(102),
                    payload: None,
                },
                EnumCase {
                    name: name(103),
                    payload: Some(class),
                },
            ],
        );
        let pair = pool.structure(name(104), vec![class, class]);
        let shape = pool.enumeration(
            name(105),
            vec![
                EnumCase {
                    name: name(106),
                    payload: None,
                },
                EnumCase {
                    name: name(107),
                    payload: Some(TypeId::I64),
                },
                EnumCase {
                    name: name(108),
                    payload: Some(class),
                },
                EnumCase {
                    name: name(109),
                    payload: Some(pair),
                },
            ],
        );
        let point = pool.structure(name(110), vec![TypeId::I64, TypeId::I64]);
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

    /// 0 `empty`, 1 `count`, 2 `obj`, 3 `pair`.
    pub fn shape_case(&self, index: u32) -> CaseId {
        CaseId::new(self.shape, index)
    }
}

/// Run code motion and check the result still verifies.
pub fn run(func: &mut Function, u: &Universe, config: CodeMotionConfig) -> CodeMotionOutcome {
    init_tracing();
    let outcome = run_code_motion(func, &u.pool, config);
    if let Err(err) = verify_function(func) {
        panic!("invalid IR after code motion: {err}\n{func:#?}");
    }
    outcome
}

pub fn kinds(func: &Function, block: BlockId) -> Vec<InstrKind> {
    func.block(block)
        .body
        .iter()
        .map(|instr| instr.kind.clone())
        .collect()
}

/// Number of instructions in `func` matching `pred`.
pub fn count(func: &Function, pred: impl Fn(&InstrKind) -> bool) -> usize {
    func.blocks
        .iter()
        .flat_map(|block| &block.body)
        .filter(|instr| pred(&instr.kind))
        .count()
}

/// Asserts that `block` holds exactly `unchecked_enum_data(enum_value,
/// case)` followed by an RC operation on its result, and returns that
/// operation.
pub fn payload_op(func: &Function, block: BlockId, enum_value: ValueId, case: CaseId) -> InstrKind {
    let body = &func.block(block).body;
    assert_eq!(body.len(), 2, "expected a payload RC pair in b{}", block.raw());
    assert_eq!(
        body[0].kind,
        InstrKind::UncheckedEnumData {
            operand: enum_value,
            case
        }
    );
    assert_eq!(body[1].kind.rc_operand(), body[0].dst);
    body[1].kind.clone()
}
