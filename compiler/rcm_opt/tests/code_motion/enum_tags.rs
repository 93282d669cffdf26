//! Enum-tag dataflow through the whole pass.

use pretty_assertions::assert_eq;

use rcm_ir::{BlockId, Function, FunctionBuilder, InstrKind, TypeId, ValueId};
use rcm_opt::CodeMotionConfig;

use crate::common::{count, kinds, name, payload_op, run, Universe};

#[test]
fn retain_of_a_freshly_built_enum_is_narrowed() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let c = fb.add_block_param(fb.entry_block(), u.class);
    let e = fb.enum_value(u.option, u.some(), Some(c));
    fb.retain_value(e);
    fb.ret(e);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert!(outcome.changed);
    assert_eq!(outcome.stats.ref_count_ops_simplified, 1);
    let body = &func.block(func.entry).body;
    assert_eq!(body.len(), 3);
    assert_eq!(
        body[1].kind,
        InstrKind::UncheckedEnumData {
            operand: e,
            case: u.some()
        }
    );
    assert_eq!(body[2].kind.rc_operand(), body[1].dst);
    assert!(matches!(body[2].kind, InstrKind::StrongRetain { .. }));
}

#[test]
fn release_of_a_payload_free_case_disappears() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let e = fb.enum_value(u.option, u.none(), None);
    fb.release_value(e);
    fb.ret(e);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert_eq!(outcome.stats.ref_count_ops_simplified, 1);
    assert_eq!(
        kinds(&func, func.entry),
        vec![InstrKind::Enum {
            case: u.none(),
            payload: None
        }]
    );
}

/// `entry` switches on an `option` parameter; `fill` emits the body of each
/// arm (`is_some` tells which) and `tail` the body of the merge block.
fn switch_region(
    u: &Universe,
    mut fill: impl FnMut(&mut FunctionBuilder, ValueId, bool),
    tail: impl FnOnce(&mut FunctionBuilder, ValueId),
) -> (Function, ValueId, [BlockId; 3]) {
    let mut fb = FunctionBuilder::new(name(1));
    let e = fb.add_block_param(fb.entry_block(), u.option);
    let none = fb.new_block();
    let some = fb.new_block();
    let merge = fb.new_block();
    fb.switch_enum(e, vec![(u.none(), none), (u.some(), some)], None);
    for (arm, is_some) in [(none, false), (some, true)] {
        fb.position_at(arm);
        fill(&mut fb, e, is_some);
        fb.br(merge, vec![]);
    }
    fb.position_at(merge);
    tail(&mut fb, e);
    fb.ret(e);
    (fb.finish(), e, [none, some, merge])
}

#[test]
fn release_after_a_switch_is_split_into_its_arms() {
    let u = Universe::new();
    let (mut func, e, [none, some, merge]) =
        switch_region(&u, |_, _, _| {}, |fb, e| fb.release_value(e));

    let outcome = run(&mut func, &u, CodeMotionConfig::late());
    assert_eq!(outcome.stats.hoisted, 1);
    assert!(func.block(merge).body.is_empty());
    assert!(func.block(none).body.is_empty());
    assert!(matches!(
        payload_op(&func, some, e, u.some()),
        InstrKind::StrongRelease { .. }
    ));
}

#[test]
fn early_variant_leaves_the_release_after_the_switch() {
    let u = Universe::new();
    let (mut func, e, [_, _, merge]) =
        switch_region(&u, |_, _, _| {}, |fb, e| fb.release_value(e));
    let before = func.clone();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert!(!outcome.changed);
    assert_eq!(func, before);
    assert_eq!(kinds(&func, merge), vec![InstrKind::ReleaseValue { operand: e }]);
}

#[test]
fn payload_retain_in_the_arm_becomes_one_retain_after_the_switch() {
    let u = Universe::new();
    let (mut func, e, [_, some, merge]) = switch_region(
        &u,
        |fb, e, is_some| {
            if is_some {
                let payload = fb.unchecked_enum_data(u.class, e, u.some());
                fb.strong_retain(payload);
            }
        },
        |_, _| {},
    );

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert_eq!(outcome.stats.sunk, 1);
    assert_eq!(kinds(&func, merge), vec![InstrKind::RetainValue { operand: e }]);
    assert_eq!(
        count(&func, |k| matches!(k, InstrKind::StrongRetain { .. })),
        0
    );
    assert_eq!(func.block(some).body.len(), 1);
}

#[test]
fn default_arm_hides_the_case() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let e = fb.add_block_param(fb.entry_block(), u.option);
    let none = fb.new_block();
    let other = fb.new_block();
    fb.switch_enum(e, vec![(u.none(), none)], Some(other));
    fb.position_at(none);
    fb.release_value(e);
    fb.ret(e);
    fb.position_at(other);
    fb.release_value(e);
    fb.ret(e);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::late());
    assert_eq!(outcome.stats.ref_count_ops_simplified, 1);
    assert!(func.block(none).body.is_empty());
    assert_eq!(kinds(&func, other), vec![InstrKind::ReleaseValue { operand: e }]);
}

#[test]
fn select_enum_branch_narrows_both_sides() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let e = fb.add_block_param(fb.entry_block(), u.option);
    let on_some = fb.new_block();
    let on_none = fb.new_block();
    let one = fb.int_literal(TypeId::I1, 1);
    let zero = fb.int_literal(TypeId::I1, 0);
    let is_some = fb.emit(
        TypeId::I1,
        InstrKind::SelectEnum {
            operand: e,
            cases: vec![(u.some(), one), (u.none(), zero)],
            default: None,
        },
    );
    fb.cond_br(is_some, on_some, vec![], on_none, vec![]);
    for arm in [on_some, on_none] {
        fb.position_at(arm);
        fb.release_value(e);
        fb.ret(e);
    }
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert_eq!(outcome.stats.ref_count_ops_simplified, 2);
    assert!(matches!(
        payload_op(&func, on_some, e, u.some()),
        InstrKind::StrongRelease { .. }
    ));
    assert!(func.block(on_none).body.is_empty());
}

#[test]
fn disagreeing_predecessors_forget_the_case() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let c = fb.add_block_param(entry, u.class);
    let left = fb.new_block();
    let right = fb.new_block();
    let merge = fb.new_block();
    let e = fb.add_block_param(merge, u.option);
    fb.cond_br(flag, left, vec![], right, vec![]);
    fb.position_at(left);
    let some = fb.enum_value(u.option, u.some(), Some(c));
    fb.br(merge, vec![some]);
    fb.position_at(right);
    let none = fb.enum_value(u.option, u.none(), None);
    fb.br(merge, vec![none]);
    fb.position_at(merge);
    fb.retain_value(e);
    fb.ret(e);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::late());
    assert_eq!(outcome.stats.ref_count_ops_simplified, 0);
    assert_eq!(kinds(&func, merge), vec![InstrKind::RetainValue { operand: e }]);
}

#[test]
fn agreeing_predecessors_keep_the_case() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let c = fb.add_block_param(entry, u.class);
    let left = fb.new_block();
    let right = fb.new_block();
    let merge = fb.new_block();
    let e = fb.enum_value(u.option, u.some(), Some(c));
    fb.cond_br(flag, left, vec![], right, vec![]);
    for (arm, callee) in [(left, name(30)), (right, name(31))] {
        fb.position_at(arm);
        fb.apply(TypeId::I64, callee, vec![]);
        fb.br(merge, vec![]);
    }
    fb.position_at(merge);
    fb.release_value(e);
    fb.ret(c);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert_eq!(outcome.stats.ref_count_ops_simplified, 1);
    assert!(matches!(
        payload_op(&func, merge, e, u.some()),
        InstrKind::StrongRelease { .. }
    ));
}
