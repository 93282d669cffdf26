//! Rewrite counters and the result reported to the pass manager.

/// Counters for successful rewrites. Informational only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeMotionStats {
    /// Instructions sunk into a successor (duplicates removed, block
    /// arguments sunk, retains sunk across a branch or out of a switch
    /// region).
    pub sunk: usize,
    /// Releases hoisted into predecessors.
    pub hoisted: usize,
    /// Enum `retain_value`/`release_value` operations removed or narrowed
    /// to their payload because the enum case was known.
    pub ref_count_ops_simplified: usize,
}

impl CodeMotionStats {
    /// Sum of all counters.
    pub fn total(&self) -> usize {
        self.sunk + self.hoisted + self.ref_count_ops_simplified
    }
}

/// Which cached analyses the caller must drop after the pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalidation {
    Nothing,
    /// Instructions were moved, created or deleted. The CFG is unchanged.
    Instructions,
}

/// Result of running code motion on one function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeMotionOutcome {
    pub changed: bool,
    pub invalidation: Invalidation,
    pub stats: CodeMotionStats,
}

impl CodeMotionOutcome {
    pub(crate) fn new(changed: bool, stats: CodeMotionStats) -> Self {
        let invalidation = if changed {
            Invalidation::Instructions
        } else {
            Invalidation::Nothing
        };
        Self {
            changed,
            invalidation,
            stats,
        }
    }
}
