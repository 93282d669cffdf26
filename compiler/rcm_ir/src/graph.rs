//! CFG queries derived from terminators.
//!
//! Nothing here is cached on the [`Function`]: passes build a [`Cfg`] or
//! [`PostOrder`] when they need one and rebuild after changing edges.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::ir::BlockId;
use crate::Function;

// ── Predecessors ────────────────────────────────────────────────────

/// Predecessor lists and incoming edge counts for every block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cfg {
    /// Distinct predecessors of each block, in block order.
    preds: Vec<SmallVec<[BlockId; 4]>>,
    /// Number of incoming edges per block. A conditional branch with both
    /// arms targeting the same block contributes two edges.
    incoming_edges: Vec<u32>,
}

impl Cfg {
    /// Compute predecessors for every block of `func`.
    pub fn build(func: &Function) -> Self {
        let num_blocks = func.num_blocks();
        let mut preds: Vec<SmallVec<[BlockId; 4]>> = vec![SmallVec::new(); num_blocks];
        let mut incoming_edges = vec![0u32; num_blocks];

        for block in &func.blocks {
            let mut seen = FxHashSet::default();
            for succ in block.terminator.successors() {
                let idx = succ.index();
                if idx >= num_blocks {
                    continue;
                }
                incoming_edges[idx] += 1;
                if seen.insert(idx) {
                    preds[idx].push(block.id);
                }
            }
        }

        Self {
            preds,
            incoming_edges,
        }
    }

    /// Distinct predecessors of `block`, in block order.
    #[inline]
    pub fn preds(&self, block: BlockId) -> &[BlockId] {
        &self.preds[block.index()]
    }

    /// Number of incoming edges of `block`.
    #[inline]
    pub fn incoming_edge_count(&self, block: BlockId) -> usize {
        self.incoming_edges[block.index()] as usize
    }

    /// The predecessor of `block` if it is reached along exactly one edge.
    pub fn single_predecessor(&self, block: BlockId) -> Option<BlockId> {
        if self.incoming_edges[block.index()] == 1 {
            self.preds[block.index()].first().copied()
        } else {
            None
        }
    }

    #[inline]
    pub fn has_preds(&self, block: BlockId) -> bool {
        !self.preds[block.index()].is_empty()
    }
}

/// The single successor of `block`, if its terminator has exactly one
/// outgoing edge.
pub fn single_successor(func: &Function, block: BlockId) -> Option<BlockId> {
    func.terminator(block).single_successor()
}

// ── Post-order ──────────────────────────────────────────────────────

/// Reverse post-order numbering of the blocks reachable from the entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostOrder {
    rpo: Vec<BlockId>,
    /// RPO position per block; `None` for unreachable blocks.
    rpo_number: Vec<Option<u32>>,
}

impl PostOrder {
    /// Compute the reverse post-order of `func`.
    ///
    /// Uses an iterative DFS with an explicit stack to avoid recursion depth
    /// issues on deeply nested CFGs. Only visits reachable blocks.
    pub fn compute(func: &Function) -> Self {
        let num_blocks = func.num_blocks();
        let mut visited = vec![false; num_blocks];
        let mut postorder = Vec::with_capacity(num_blocks);

        // Stack entries: (block, children_pushed).
        let mut stack: Vec<(BlockId, bool)> = vec![(func.entry, false)];

        while let Some(&mut (block, ref mut children_done)) = stack.last_mut() {
            if *children_done {
                postorder.push(block);
                stack.pop();
                continue;
            }
            *children_done = true;

            if block.index() >= num_blocks || visited[block.index()] {
                stack.pop();
                continue;
            }
            visited[block.index()] = true;

            // Push in reverse so the first successor is explored first.
            for succ in func.terminator(block).successors().into_iter().rev() {
                if succ.index() < num_blocks && !visited[succ.index()] {
                    stack.push((succ, false));
                }
            }
        }

        postorder.reverse();
        let mut rpo_number = vec![None; num_blocks];
        for (pos, block) in postorder.iter().enumerate() {
            rpo_number[block.index()] = u32::try_from(pos).ok();
        }

        Self {
            rpo: postorder,
            rpo_number,
        }
    }

    /// Reachable blocks in reverse post-order. The entry comes first.
    #[inline]
    pub fn reverse_post_order(&self) -> &[BlockId] {
        &self.rpo
    }

    /// The RPO position of `block`, or `None` if it is unreachable.
    #[inline]
    pub fn rpo_number(&self, block: BlockId) -> Option<u32> {
        self.rpo_number.get(block.index()).copied().flatten()
    }

    #[inline]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.rpo_number(block).is_some()
    }
}
