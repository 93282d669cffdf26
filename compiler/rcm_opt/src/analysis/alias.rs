//! Conservative alias analysis for reference-counted values.

use rcm_ir::{Function, InstrKind, RcClassification, ValueId};

use super::RcIdentity;

/// Answers whether two values may refer to the same counted object.
pub trait AliasAnalysis {
    /// Returns `false` only if `a` and `b` provably never share an object.
    fn may_alias(&self, func: &Function, a: ValueId, b: ValueId) -> bool;
}

/// What a value's RC-identity root is known to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AliasClass {
    /// A distinct object allocated by the `alloc_ref` defining this root.
    Fresh(ValueId),
    Unknown,
}

/// Root-based alias analysis.
///
/// Identical roots alias; trivial values alias nothing; two distinct fresh
/// allocations never alias; everything else may alias.
pub struct BasicAliasAnalysis<'a> {
    types: &'a dyn RcClassification,
    rc_identity: &'a dyn RcIdentity,
}

impl<'a> BasicAliasAnalysis<'a> {
    pub fn new(types: &'a dyn RcClassification, rc_identity: &'a dyn RcIdentity) -> Self {
        Self { types, rc_identity }
    }

    fn class_of(func: &Function, root: ValueId) -> AliasClass {
        match func.defining_instr(root).map(|pos| &func.instr(pos).kind) {
            Some(InstrKind::AllocRef { .. }) => AliasClass::Fresh(root),
            _ => AliasClass::Unknown,
        }
    }
}

impl AliasAnalysis for BasicAliasAnalysis<'_> {
    fn may_alias(&self, func: &Function, a: ValueId, b: ValueId) -> bool {
        if a == b {
            return true;
        }
        if self.types.is_trivial(func.value_type(a)) || self.types.is_trivial(func.value_type(b))
        {
            return false;
        }

        let root_a = self.rc_identity.root(func, a);
        let root_b = self.rc_identity.root(func, b);
        if root_a == root_b {
            return true;
        }

        match (Self::class_of(func, root_a), Self::class_of(func, root_b)) {
            (AliasClass::Fresh(x), AliasClass::Fresh(y)) => x == y,
            _ => true,
        }
    }
}
