//! Block cursor and edge wiring.
//!
//! Blocks come in two flavours:
//!
//! - **merge blocks** (label targets, loop steps, dispatch joins) may be
//!   reached from several edges. The first wired edge fixes their *shape*:
//!   one phi per stack slot, typed like the incoming value. Every later edge
//!   must carry a stack of the same length and types.
//! - **direct blocks** (branch fall-throughs, dispatch fast/slow paths) have
//!   exactly one predecessor and are entered with the stack as it is.
//!
//! ```text
//!        pred A            pred B
//!     [%1, %2]           [%5, %6]
//!          \                /
//!           v              v
//!        merge: %8 = phi [A: %1, B: %5]
//!               %9 = phi [A: %2, B: %6]
//!        stack on entry: [%8, %9]
//! ```

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Fault;
use crate::ir::{BlockId, Cfg, Op, Terminator, ValueId, ValueType};

/// Cursor over a graph under construction
#[derive(Debug)]
pub struct Builder {
    cfg: Cfg,
    cursor: BlockId,
    shapes: FxHashMap<BlockId, Vec<ValueId>>,
    direct: FxHashSet<BlockId>,
    /// Step block -> (index phi, next index)
    loop_indices: FxHashMap<BlockId, (ValueId, ValueId)>,
}

impl Builder {
    /// Start a graph positioned at its empty entry block
    pub fn new(name: impl Into<String>) -> Self {
        let cfg = Cfg::new(name);
        let entry = cfg.entry();
        let mut shapes = FxHashMap::default();
        shapes.insert(entry, Vec::new());
        Self {
            cfg,
            cursor: entry,
            shapes,
            direct: FxHashSet::default(),
            loop_indices: FxHashMap::default(),
        }
    }

    /// Graph built so far
    #[inline]
    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    /// Current block
    #[inline]
    pub fn cursor(&self) -> BlockId {
        self.cursor
    }

    /// Index the next statement of the current block will get
    pub fn stmt_index(&self) -> usize {
        self.cfg.block(self.cursor).map_or(0, |bb| bb.stmts.len())
    }

    /// Is the cursor at the very start of `block`
    pub fn at_start_of(&self, block: BlockId) -> bool {
        self.cursor == block
            && self
                .cfg
                .block(block)
                .is_some_and(|bb| bb.stmts.is_empty() && bb.terminator.is_none())
    }

    /// Allocate a block that may have several predecessors
    pub fn new_merge_block(&mut self) -> BlockId {
        self.cfg.add_block()
    }

    /// Allocate a block with exactly one predecessor
    pub fn new_direct_block(&mut self) -> BlockId {
        let block = self.cfg.add_block();
        self.direct.insert(block);
        block
    }

    /// Stack shape of a merge block, once its first edge is wired
    pub fn shape(&self, block: BlockId) -> Option<&[ValueId]> {
        self.shapes.get(&block).map(Vec::as_slice)
    }

    /// Is `block` entered with the stack of its single predecessor
    pub fn is_direct(&self, block: BlockId) -> bool {
        self.direct.contains(&block)
    }

    /// Append a statement to the current block
    pub fn emit(&mut self, op: Op) -> ValueId {
        self.cfg.append(self.cursor, op)
    }

    /// Move the cursor
    pub fn move_to(&mut self, block: BlockId) {
        tracing::trace!(target: "sable::ssa", %block, "enter block");
        self.cursor = block;
    }

    /// Terminate the current block and wire every successor edge with `stack`
    pub fn terminate(&mut self, terminator: Terminator, stack: &[ValueId]) -> Result<(), Fault> {
        let from = self.cursor;
        let succs = terminator.successors();
        self.cfg.set_terminator(from, terminator);
        for target in succs {
            self.add_phi_inputs(from, target, stack)?;
        }
        Ok(())
    }

    /// Record the edge `from -> target` carrying `stack`
    pub fn add_phi_inputs(
        &mut self,
        from: BlockId,
        target: BlockId,
        stack: &[ValueId],
    ) -> Result<(), Fault> {
        if self.direct.contains(&target) {
            return Ok(());
        }

        let phis = match self.shapes.get(&target).cloned() {
            Some(phis) => {
                let matches = phis.len() == stack.len()
                    && phis
                        .iter()
                        .zip(stack)
                        .all(|(p, v)| self.cfg.value_type(*p) == self.cfg.value_type(*v));
                if !matches {
                    return Err(Fault::PhiMismatch {
                        block: target,
                        expected: self.describe(&phis),
                        actual: self.describe(stack),
                    });
                }
                phis
            }
            None => {
                let phis: Vec<ValueId> = stack
                    .iter()
                    .map(|v| {
                        let ty = self.cfg.value_type(*v);
                        self.cfg.add_phi(target, ty)
                    })
                    .collect();
                self.shapes.insert(target, phis.clone());
                phis
            }
        };

        for (phi, value) in phis.into_iter().zip(stack) {
            self.cfg.add_phi_input(target, phi, from, *value);
        }
        if let Some((phi, next)) = self.loop_indices.get(&target).copied() {
            self.cfg.add_phi_input(target, phi, from, next);
        }
        Ok(())
    }

    /// Add a loop counter phi to `block`, fed `initial` along the edge from `pred`
    pub fn add_index_phi(&mut self, block: BlockId, pred: BlockId, initial: ValueId) -> ValueId {
        let phi = self.cfg.add_phi(block, ValueType::Index);
        self.cfg.add_phi_input(block, phi, pred, initial);
        phi
    }

    /// Feed `next` to `phi` along every edge into `block` wired from now on
    pub fn register_loop_index(&mut self, block: BlockId, phi: ValueId, next: ValueId) {
        self.loop_indices.insert(block, (phi, next));
    }

    /// Finish building
    pub fn finish(self) -> Cfg {
        self.cfg
    }

    fn describe(&self, values: &[ValueId]) -> String {
        values
            .iter()
            .map(|v| self.cfg.value_type(*v).to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
