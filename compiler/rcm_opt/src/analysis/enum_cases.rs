//! Case facts derivable from `select_enum` conditions.

use rcm_ir::{CaseId, Function, InstrKind, TypePool, ValueId};

/// If `cond` is a `select_enum` yielding a nonzero literal for exactly one
/// case and zero for every other case (and the default), returns the enum
/// operand and that case.
pub fn single_true_case(func: &Function, cond: ValueId) -> Option<(ValueId, CaseId)> {
    let pos = func.defining_instr(cond)?;
    let InstrKind::SelectEnum {
        operand,
        cases,
        default,
    } = &func.instr(pos).kind
    else {
        return None;
    };

    let literal = |value: ValueId| -> Option<i64> {
        let pos = func.defining_instr(value)?;
        match func.instr(pos).kind {
            InstrKind::IntLiteral { value } => Some(value),
            _ => None,
        }
    };

    if let Some(default) = default {
        if literal(*default)? != 0 {
            return None;
        }
    }

    let mut true_case = None;
    for &(case, value) in cases {
        if literal(value)? == 0 {
            continue;
        }
        if true_case.is_some() {
            return None;
        }
        true_case = Some(case);
    }
    true_case.map(|case| (*operand, case))
}

/// The other case of a two-case enum. `None` if the enum has any other
/// number of cases.
pub fn only_other_case(pool: &TypePool, case: CaseId) -> Option<CaseId> {
    let mut others = pool.case_ids(case.enum_ty).filter(|&c| c != case);
    match (others.next(), others.next()) {
        (Some(other), None) => Some(other),
        _ => None,
    }
}
