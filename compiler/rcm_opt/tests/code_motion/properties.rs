//! Property-based tests.

#![allow(
    clippy::doc_markdown,
    clippy::redundant_closure_for_method_calls,
    reason = "Proptest macros generate code with these patterns"
)]

use proptest::prelude::*;

use rcm_ir::{verify_function, BlockId, Cfg, Function, FunctionBuilder, InstrKind, TypeClassifier, TypeId, ValueId};
use rcm_opt::canonicalize::canonicalize_ref_count_ops;
use rcm_opt::enum_dataflow::BlotMap;
use rcm_opt::{run_code_motion, CodeMotionConfig, Invalidation};

use crate::common::{name, Universe};

// -- Blot map against a model --

#[derive(Clone, Debug)]
enum MapOp {
    Insert(u8, u32),
    Blot(u8),
    Bump(u8),
    Clear,
}

fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        4 => (0u8..8, any::<u32>()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        2 => (0u8..8).prop_map(MapOp::Blot),
        2 => (0u8..8).prop_map(MapOp::Bump),
        1 => Just(MapOp::Clear),
    ]
}

/// Slots in insertion order; `None` marks a blotted slot.
#[derive(Default)]
struct Model {
    slots: Vec<(u8, Option<u32>)>,
}

impl Model {
    fn slot(&mut self, key: u8) -> &mut Option<u32> {
        let index = match self.slots.iter().position(|&(k, _)| k == key) {
            Some(index) => index,
            None => {
                self.slots.push((key, None));
                self.slots.len() - 1
            }
        };
        &mut self.slots[index].1
    }

    fn apply(&mut self, op: &MapOp) {
        match *op {
            MapOp::Insert(k, v) => *self.slot(k) = Some(v),
            MapOp::Blot(k) => {
                if let Some(slot) = self.slots.iter_mut().find(|(key, _)| *key == k) {
                    slot.1 = None;
                }
            }
            MapOp::Bump(k) => {
                let slot = self.slot(k);
                *slot = Some(slot.unwrap_or_default().wrapping_add(1));
            }
            MapOp::Clear => self.slots.clear(),
        }
    }

    fn live(&self) -> Vec<(u8, u32)> {
        self.slots
            .iter()
            .filter_map(|&(k, v)| v.map(|v| (k, v)))
            .collect()
    }
}

// -- Canonicalization over branch chains --

/// A chain of blocks, each passing a class value to the next through a
/// parameter. Block `at` retains its own copy of the value.
fn param_chain(u: &Universe, len: usize, at: usize) -> (Function, ValueId, BlockId) {
    let mut fb = FunctionBuilder::new(name(1));
    let mut block = fb.entry_block();
    let root = fb.add_block_param(block, u.class);
    let mut value = root;
    let mut retain_block = block;

    for i in 0..=len {
        fb.position_at(block);
        if i == at {
            fb.strong_retain(value);
            retain_block = block;
        }
        if i == len {
            fb.ret(value);
            break;
        }
        let next = fb.new_block();
        let param = fb.add_block_param(next, u.class);
        fb.br(next, vec![value]);
        block = next;
        value = param;
    }
    (fb.finish(), root, retain_block)
}

// -- Whole-pass validity --

#[derive(Clone, Copy, Debug)]
enum ArmOp {
    RetainClass,
    ReleaseClass,
    RetainEnum,
    ReleaseEnum,
    PayloadRetain,
    Call(u32),
    Point,
    Literal(i64),
}

fn arm_op_strategy() -> impl Strategy<Value = ArmOp> {
    prop_oneof![
        Just(ArmOp::RetainClass),
        Just(ArmOp::ReleaseClass),
        Just(ArmOp::RetainEnum),
        Just(ArmOp::ReleaseEnum),
        Just(ArmOp::PayloadRetain),
        (30u32..32).prop_map(ArmOp::Call),
        Just(ArmOp::Point),
        (0i64..3).prop_map(ArmOp::Literal),
    ]
}

/// Entry parameters every generated instruction may read.
struct Inputs {
    c: ValueId,
    e: ValueId,
    x: ValueId,
}

fn emit(fb: &mut FunctionBuilder, u: &Universe, inputs: &Inputs, op: ArmOp) {
    match op {
        ArmOp::RetainClass => fb.strong_retain(inputs.c),
        ArmOp::ReleaseClass => fb.strong_release(inputs.c),
        ArmOp::RetainEnum => fb.retain_value(inputs.e),
        ArmOp::ReleaseEnum => fb.release_value(inputs.e),
        ArmOp::PayloadRetain => {
            let payload = fb.unchecked_enum_data(u.class, inputs.e, u.some());
            fb.strong_retain(payload);
        }
        ArmOp::Call(callee) => {
            fb.apply(TypeId::I64, name(callee), vec![]);
        }
        ArmOp::Point => {
            fb.emit(
                u.point,
                InstrKind::Struct {
                    args: vec![inputs.x, inputs.x],
                },
            );
        }
        ArmOp::Literal(value) => {
            fb.int_literal(TypeId::I64, value);
        }
    }
}

/// A diamond over `option` parameter `e`: a `switch_enum` on it when
/// `switch` is set, otherwise a `cond_br` on a flag.
fn diamond(u: &Universe, switch: bool, left: &[ArmOp], right: &[ArmOp], merge: &[ArmOp]) -> Function {
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let inputs = Inputs {
        c: fb.add_block_param(entry, u.class),
        e: fb.add_block_param(entry, u.option),
        x: fb.add_block_param(entry, TypeId::I64),
    };
    let left_block = fb.new_block();
    let right_block = fb.new_block();
    let merge_block = fb.new_block();
    if switch {
        fb.switch_enum(
            inputs.e,
            vec![(u.none(), left_block), (u.some(), right_block)],
            None,
        );
    } else {
        fb.cond_br(flag, left_block, vec![], right_block, vec![]);
    }
    for (block, ops) in [(left_block, left), (right_block, right)] {
        fb.position_at(block);
        for &op in ops {
            emit(&mut fb, u, &inputs, op);
        }
        fb.br(merge_block, vec![]);
    }
    fb.position_at(merge_block);
    for &op in merge {
        emit(&mut fb, u, &inputs, op);
    }
    fb.ret(inputs.e);
    fb.finish()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn blot_map_matches_model(ops in prop::collection::vec(map_op_strategy(), 0..40)) {
        let mut map: BlotMap<u8, u32> = BlotMap::new();
        let mut model = Model::default();
        for op in &ops {
            match *op {
                MapOp::Insert(k, v) => {
                    map.insert(k, v);
                }
                MapOp::Blot(k) => {
                    map.blot(&k);
                }
                MapOp::Bump(k) => {
                    let value = map.get_or_default(k);
                    *value = value.wrapping_add(1);
                }
                MapOp::Clear => map.clear(),
            }
            model.apply(op);

            let live: Vec<(u8, u32)> = map.iter().map(|(k, v)| (k, *v)).collect();
            prop_assert_eq!(live, model.live());
            prop_assert_eq!(map.len(), model.live().len());
            for key in 0u8..8 {
                let blotted = model.slots.iter().any(|&(k, v)| k == key && v.is_none());
                prop_assert_eq!(map.is_blotted(&key), blotted);
            }
        }
    }

    #[test]
    fn canonicalization_reaches_the_root_and_is_idempotent(len in 0usize..8, at in 0usize..8) {
        let at = at.min(len);
        let u = Universe::new();
        let (mut func, root, block) = param_chain(&u, len, at);
        let types = TypeClassifier::new(&u.pool);
        let cfg = Cfg::build(&func);

        let changed = canonicalize_ref_count_ops(&mut func, &cfg, &types, block);
        prop_assert_eq!(changed, at > 0);
        prop_assert_eq!(
            &func.block(block).body[0].kind,
            &InstrKind::StrongRetain { operand: root }
        );
        prop_assert!(!canonicalize_ref_count_ops(&mut func, &cfg, &types, block));
        prop_assert!(verify_function(&func).is_ok());
    }

    #[test]
    fn code_motion_keeps_functions_valid(
        switch in any::<bool>(),
        left in prop::collection::vec(arm_op_strategy(), 0..6),
        right in prop::collection::vec(arm_op_strategy(), 0..6),
        merge in prop::collection::vec(arm_op_strategy(), 0..4),
        late in any::<bool>(),
        rr in any::<bool>(),
    ) {
        let u = Universe::new();
        let mut func = diamond(&u, switch, &left, &right, &merge);
        let config = if late {
            CodeMotionConfig::late()
        } else {
            CodeMotionConfig::early()
        }
        .with_rr_code_motion(rr);

        let outcome = run_code_motion(&mut func, &u.pool, config);
        prop_assert!(verify_function(&func).is_ok(), "invalid IR: {:#?}", func);
        prop_assert_eq!(
            outcome.invalidation == Invalidation::Instructions,
            outcome.changed
        );
    }
}
