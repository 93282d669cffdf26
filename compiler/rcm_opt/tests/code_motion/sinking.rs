//! Sinking from predecessors into a merge block.

use pretty_assertions::assert_eq;

use rcm_ir::{verify_function, FunctionBuilder, InstrKind, Terminator, TypeId, VerifyError};
use rcm_opt::{init_tracing, run_code_motion, CodeMotionConfig, Invalidation};

use crate::common::{kinds, name, run, Universe};

#[test]
fn identical_tails_are_sunk_into_the_merge() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let x = fb.add_block_param(entry, TypeId::I64);
    let y = fb.add_block_param(entry, TypeId::I64);
    let left = fb.new_block();
    let right = fb.new_block();
    let merge = fb.new_block();
    fb.cond_br(flag, left, vec![], right, vec![]);
    for arm in [left, right] {
        fb.position_at(arm);
        fb.emit(u.point, InstrKind::Struct { args: vec![x, y] });
        fb.br(merge, vec![]);
    }
    fb.position_at(merge);
    fb.ret(x);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert!(outcome.changed);
    assert_eq!(outcome.invalidation, Invalidation::Instructions);
    assert_eq!(outcome.stats.sunk, 1);
    assert!(func.block(left).body.is_empty());
    assert!(func.block(right).body.is_empty());
    assert_eq!(
        kinds(&func, merge),
        vec![InstrKind::Struct { args: vec![x, y] }]
    );

    let again = run(&mut func, &u, CodeMotionConfig::early());
    assert!(!again.changed);
    assert_eq!(again.invalidation, Invalidation::Nothing);
}

#[test]
fn argument_definitions_are_sunk_and_uses_rewired() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let x = fb.add_block_param(entry, TypeId::I64);
    let y = fb.add_block_param(entry, TypeId::I64);
    let left = fb.new_block();
    let right = fb.new_block();
    let merge = fb.new_block();
    let p = fb.add_block_param(merge, u.point);
    fb.cond_br(flag, left, vec![], right, vec![]);
    for arm in [left, right] {
        fb.position_at(arm);
        let s = fb.emit(u.point, InstrKind::Struct { args: vec![x, y] });
        fb.br(merge, vec![s]);
    }
    fb.position_at(merge);
    let r = fb.apply(TypeId::I64, name(30), vec![p]);
    fb.ret(r);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert!(outcome.changed);
    assert_eq!(outcome.stats.sunk, 1);
    assert!(func.block(merge).params.is_empty());
    assert!(func.block(left).body.is_empty());
    assert!(func.block(right).body.is_empty());
    assert_eq!(func.edge_args(left, merge), Some(&[][..]));

    let body = &func.block(merge).body;
    assert_eq!(body.len(), 2);
    assert_eq!(body[0].kind, InstrKind::Struct { args: vec![x, y] });
    let sunk = body[0].dst.unwrap();
    assert_eq!(
        body[1].kind,
        InstrKind::Apply {
            callee: name(30),
            args: vec![sunk]
        }
    );
}

#[test]
fn integer_fields_that_differ_become_the_parameter() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let x = fb.add_block_param(entry, TypeId::I64);
    let y = fb.add_block_param(entry, TypeId::I64);
    let z = fb.add_block_param(entry, TypeId::I64);
    let left = fb.new_block();
    let right = fb.new_block();
    let merge = fb.new_block();
    let p = fb.add_block_param(merge, u.point);
    fb.cond_br(flag, left, vec![], right, vec![]);
    for (arm, second) in [(left, y), (right, z)] {
        fb.position_at(arm);
        let s = fb.emit(u.point, InstrKind::Struct { args: vec![x, second] });
        fb.br(merge, vec![s]);
    }
    fb.position_at(merge);
    fb.ret(p);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert!(outcome.changed);
    assert_eq!(outcome.stats.sunk, 1);

    let param = func.block(merge).params[0];
    assert_eq!(func.value_type(param), TypeId::I64);
    assert_eq!(func.edge_args(left, merge), Some(&[y][..]));
    assert_eq!(func.edge_args(right, merge), Some(&[z][..]));
    assert_eq!(
        kinds(&func, merge),
        vec![InstrKind::Struct {
            args: vec![x, param]
        }]
    );
    let Terminator::Return { value } = *func.terminator(merge) else {
        panic!("merge should still return");
    };
    assert_eq!(Some(value), func.block(merge).body[0].dst);
}

#[test]
fn shared_literal_arguments_are_rematerialized() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let side = fb.new_block();
    let merge = fb.new_block();
    let p = fb.add_block_param(merge, TypeId::I64);
    let seven = fb.int_literal(TypeId::I64, 7);
    fb.cond_br(flag, merge, vec![seven], side, vec![]);
    fb.position_at(side);
    let also_seven = fb.int_literal(TypeId::I64, 7);
    fb.br(merge, vec![also_seven]);
    fb.position_at(merge);
    fb.ret(p);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert!(outcome.changed);
    // Literals are copied, not moved; no counter tracks them.
    assert_eq!(outcome.stats.total(), 0);
    assert_eq!(kinds(&func, merge), vec![InstrKind::IntLiteral { value: 7 }]);
    let Terminator::Return { value } = *func.terminator(merge) else {
        panic!("merge should still return");
    };
    assert_eq!(Some(value), func.block(merge).body[0].dst);
}

#[test]
fn identical_calls_at_the_tails_are_merged() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let left = fb.new_block();
    let right = fb.new_block();
    let merge = fb.new_block();
    fb.cond_br(flag, left, vec![], right, vec![]);
    for arm in [left, right] {
        fb.position_at(arm);
        fb.apply(TypeId::I64, name(30), vec![]);
        fb.br(merge, vec![]);
    }
    fb.position_at(merge);
    fb.ret(flag);
    let mut func = fb.finish();

    let outcome = run(&mut func, &u, CodeMotionConfig::early());
    assert_eq!(outcome.stats.sunk, 1);
    assert_eq!(
        kinds(&func, merge),
        vec![InstrKind::Apply {
            callee: name(30),
            args: vec![]
        }]
    );
}

#[test]
fn different_calls_shield_the_code_above_them() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let flag = fb.add_block_param(entry, TypeId::I1);
    let x = fb.add_block_param(entry, TypeId::I64);
    let left = fb.new_block();
    let right = fb.new_block();
    let merge = fb.new_block();
    fb.cond_br(flag, left, vec![], right, vec![]);
    for (arm, callee) in [(left, name(30)), (right, name(31))] {
        fb.position_at(arm);
        fb.emit(u.point, InstrKind::Struct { args: vec![x, x] });
        fb.apply(TypeId::I64, callee, vec![]);
        fb.br(merge, vec![]);
    }
    fb.position_at(merge);
    fb.ret(flag);
    let mut func = fb.finish();
    let before = func.clone();

    let outcome = run(&mut func, &u, CodeMotionConfig::late().with_rr_code_motion(true));
    assert!(!outcome.changed);
    assert_eq!(func, before);
}

// Loops back to the entry block. The verifier rejects these, but the pass
// must still leave them alone rather than corrupt them.

#[test]
fn literal_back_edges_leave_the_entry_alone() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let p = fb.add_block_param(entry, TypeId::I64);
    let f = fb.add_block_param(entry, TypeId::I1);
    fb.apply(TypeId::I64, name(30), vec![p]);
    let left = fb.new_block();
    let right = fb.new_block();
    fb.cond_br(f, left, vec![], right, vec![]);
    for arm in [left, right] {
        fb.position_at(arm);
        let seven = fb.int_literal(TypeId::I64, 7);
        fb.br(entry, vec![seven, f]);
    }
    let mut func = fb.finish();
    let before = func.clone();

    init_tracing();
    let outcome = run_code_motion(
        &mut func,
        &u.pool,
        CodeMotionConfig::late().with_rr_code_motion(true),
    );
    assert!(!outcome.changed);
    assert_eq!(func, before);
    assert_eq!(func.block(entry).params, vec![p, f]);
    assert_eq!(
        verify_function(&func),
        Err(VerifyError::EntryHasPredecessor { block: left.raw() })
    );
}

#[test]
fn back_edge_tails_are_not_sunk_into_the_entry() {
    let u = Universe::new();
    let mut fb = FunctionBuilder::new(name(1));
    let entry = fb.entry_block();
    let f = fb.add_block_param(entry, TypeId::I1);
    let x = fb.apply(TypeId::I64, name(30), vec![]);
    let left = fb.new_block();
    let right = fb.new_block();
    fb.cond_br(f, left, vec![], right, vec![]);
    for arm in [left, right] {
        fb.position_at(arm);
        fb.apply(TypeId::I64, name(31), vec![x]);
        fb.br(entry, vec![f]);
    }
    let mut func = fb.finish();
    let before = func.clone();

    init_tracing();
    let outcome = run_code_motion(
        &mut func,
        &u.pool,
        CodeMotionConfig::late().with_rr_code_motion(true),
    );
    assert!(!outcome.changed);
    assert_eq!(func, before);
    assert_eq!(
        verify_function(&func),
        Err(VerifyError::EntryHasPredecessor { block: left.raw() })
    );
}
