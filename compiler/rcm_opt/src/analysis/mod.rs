//! Oracles the code-motion pass queries: alias analysis, RC identity, and
//! ARC range queries built on top of them.
//!
//! The pass only sees these through traits, so tests can substitute fixed
//! answers and a host compiler can plug in stronger analyses.

mod alias;
pub mod arc;
mod enum_cases;
mod rc_identity;

pub use alias::{AliasAnalysis, BasicAliasAnalysis};
pub use enum_cases::{only_other_case, single_true_case};
pub use rc_identity::{RcIdentity, RcIdentityAnalysis};
