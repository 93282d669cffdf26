//! RC-identity roots.
//!
//! Two values share an RC-identity root when retaining one is the same as
//! retaining the other: casts, enum wrapping and unwrapping, and aggregates
//! with a single non-trivial field do not change which object is counted.

use rustc_hash::FxHashSet;

use rcm_ir::{Function, InstrKind, RcClassification, ValueId};

/// Resolves a value to its canonical RC-identity root.
pub trait RcIdentity {
    /// The RC-identity root of `value`. Returns `value` itself when nothing
    /// can be stripped.
    fn root(&self, func: &Function, value: ValueId) -> ValueId;
}

/// Maximum number of values followed from the queried value to its root.
const MAX_DEPTH: u32 = 16;

/// Default [`RcIdentity`] implementation over the IR.
pub struct RcIdentityAnalysis<'t> {
    types: &'t dyn RcClassification,
}

impl<'t> RcIdentityAnalysis<'t> {
    pub fn new(types: &'t dyn RcClassification) -> Self {
        Self { types }
    }

    fn strip(
        &self,
        func: &Function,
        value: ValueId,
        depth: u32,
        visiting: &mut FxHashSet<ValueId>,
    ) -> ValueId {
        if depth >= MAX_DEPTH {
            return value;
        }

        if let Some(pos) = func.defining_instr(value) {
            return match self.strip_instr(func, &func.instr(pos).kind) {
                Some(next) => self.strip(func, next, depth + 1, visiting),
                None => value,
            };
        }

        self.strip_block_param(func, value, depth, visiting)
    }

    /// The operand an instruction forwards its RC identity from.
    fn strip_instr(&self, func: &Function, kind: &InstrKind) -> Option<ValueId> {
        match kind {
            InstrKind::Upcast { operand }
            | InstrKind::UncheckedRefCast { operand }
            | InstrKind::UncheckedEnumData { operand, .. } => Some(*operand),
            InstrKind::Enum { payload, .. } => *payload,
            InstrKind::Struct { args } | InstrKind::Tuple { args } => {
                let mut non_trivial = args
                    .iter()
                    .copied()
                    .filter(|&arg| !self.types.is_trivial(func.value_type(arg)));
                match (non_trivial.next(), non_trivial.next()) {
                    (Some(only), None) => Some(only),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// A block parameter whose every incoming argument has the same root
    /// shares that root.
    fn strip_block_param(
        &self,
        func: &Function,
        value: ValueId,
        depth: u32,
        visiting: &mut FxHashSet<ValueId>,
    ) -> ValueId {
        let Some((block, index)) = func.block_param_position(value) else {
            return value;
        };
        if !visiting.insert(value) {
            return value;
        }

        let mut common: Option<ValueId> = None;
        for pred in &func.blocks {
            if !pred.terminator.successors().contains(&block) {
                continue;
            }
            let lists = pred.terminator.arg_lists_for(block);
            if lists.is_empty() {
                // Implicitly bound (checked cast result).
                visiting.remove(&value);
                return value;
            }
            for args in lists {
                let Some(&arg) = args.get(index) else {
                    visiting.remove(&value);
                    return value;
                };
                let root = self.strip(func, arg, depth + 1, visiting);
                match common {
                    None => common = Some(root),
                    Some(c) if c == root => {}
                    Some(_) => {
                        visiting.remove(&value);
                        return value;
                    }
                }
            }
        }
        visiting.remove(&value);

        common.unwrap_or(value)
    }
}

impl RcIdentity for RcIdentityAnalysis<'_> {
    fn root(&self, func: &Function, value: ValueId) -> ValueId {
        let mut visiting = FxHashSet::default();
        self.strip(func, value, 0, &mut visiting)
    }
}
