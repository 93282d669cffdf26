//! Borrowed analyses shared by every step of the pass.

use rcm_ir::{RcClassification, TypePool};

use crate::analysis::{AliasAnalysis, RcIdentity};

/// Everything a code-motion step may query besides the function itself.
///
/// All fields are shared borrows; steps mutate only the [`Function`]
/// they are handed.
///
/// [`Function`]: rcm_ir::Function
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    /// Enum case payload types.
    pub pool: &'a TypePool,
    /// Trivial / reference / non-trivial classification of types.
    pub types: &'a dyn RcClassification,
    pub alias: &'a dyn AliasAnalysis,
    pub rc_identity: &'a dyn RcIdentity,
}
