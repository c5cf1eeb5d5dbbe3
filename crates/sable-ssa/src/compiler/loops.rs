//! Loop contexts.
//!
//! A `for` loop gets a synthesized step block that owns the native counter:
//!
//! ```text
//!   pre:   len = length(seq); zero = idx 0; goto step
//!   step:  i = phi [pre: zero, <back edges>: i']
//!          i' = i + 1
//!          branch i' <= len ? body : end
//!   body:  x <- seq[[i']]; ...; goto step
//! ```

use sable_bytecode::{AstIndex, Label, SymbolIndex};

use super::Compiler;
use crate::error::Fault;
use crate::ir::{Op, Scope};
use crate::options::UnitKind;
use crate::protocol::{LoopContext, LoopKind};

impl Compiler<'_> {
    /// `StartLoopCntxt`: the loop head is the code right after the instruction
    pub(super) fn start_loop(&mut self, end: Label) -> Result<(), Fault> {
        let end = self.labels.block(end)?;
        // A `break` from inside an argument lands with these brackets open
        self.note_edge(end);
        let head = match self.labels.block_at(self.pc + 1) {
            Some(block) => block,
            None => self.builder.new_merge_block(),
        };
        self.jump(head)?;
        self.enter(head)?;
        self.loops.push(LoopContext {
            kind: LoopKind::WhileOrRepeat,
            next: head,
            end,
            open: self.open_depths(),
        });
        Ok(())
    }

    /// `StartFor`: pop the sequence and open the counting loop
    pub(super) fn start_for(
        &mut self,
        call: AstIndex,
        symbol: SymbolIndex,
        end: Label,
    ) -> Result<(), Fault> {
        let seq = self.stack.pop()?;
        self.pool.ast(call)?;
        let var = self.symbol(symbol)?;
        let end = self.labels.block(end)?;

        let len = self.builder.emit(Op::Length { seq });
        let zero = self.builder.emit(Op::IndexConst(0));
        let pre = self.builder.cursor();
        let step = self.builder.new_merge_block();
        self.jump(step)?;
        let index = self.builder.add_index_phi(step, pre, zero);

        self.enter(step)?;
        let one = self.builder.emit(Op::IndexConst(1));
        let next = self.builder.emit(Op::IndexAdd {
            lhs: index,
            rhs: one,
        });
        let more = self.builder.emit(Op::IndexLe {
            lhs: next,
            rhs: len,
        });
        let body = self.builder.new_direct_block();
        self.branch(more, body, end)?;
        self.builder.register_loop_index(step, index, next);

        self.enter(body)?;
        let element = self.builder.emit(Op::ForElement { seq, index: next });
        self.builder.emit(Op::StVar {
            name: var,
            scope: Scope::Local,
            value: element,
        });

        self.loops.push(LoopContext {
            kind: LoopKind::For,
            next: step,
            end,
            open: self.open_depths(),
        });
        Ok(())
    }

    /// `StepFor`: end of a `for` body
    pub(super) fn step_for(&mut self) -> Result<(), Fault> {
        let ctx = *self.loops.top()?;
        if ctx.kind != LoopKind::For {
            return Err(Fault::unbalanced("loop", "STEPFOR inside a while/repeat loop"));
        }
        self.jump(ctx.next)
    }

    /// `DoLoopBreak` / `DoLoopNext`
    pub(super) fn loop_jump(&mut self, is_break: bool) -> Result<(), Fault> {
        let ctx = match self.loops.top() {
            Ok(ctx) => *ctx,
            Err(_) if self.options.unit_kind == UnitKind::Promise => {
                return Err(Fault::unsupported(
                    "break/next in a promise leaves the loop of the calling function",
                ));
            }
            Err(fault) => return Err(fault),
        };
        let target = if is_break { ctx.end } else { ctx.next };
        self.jump(target)
    }

    /// `EndLoopCntxt` / `EndFor`: the pass must be at the start of the
    /// loop's end block
    pub(super) fn end_loop(&mut self, kind: LoopKind) -> Result<(), Fault> {
        let ctx = self
            .loops
            .pop()
            .map_err(|_| Fault::unbalanced("loop", "loop end with no open loop"))?;
        if ctx.kind != kind {
            return Err(Fault::unbalanced(
                "loop",
                format!("{:?} loop closed as {:?}", ctx.kind, kind),
            ));
        }
        if !self.builder.at_start_of(ctx.end) {
            return Err(Fault::unbalanced(
                "loop",
                format!(
                    "loop end {} is not the start of the current block {}",
                    ctx.end,
                    self.builder.cursor()
                ),
            ));
        }
        Ok(())
    }

    /// Close a loop whose end block nothing jumps to (`repeat` without
    /// `break`). Only closes the innermost loop, and only when its end is
    /// the block starting at the current offset.
    pub(super) fn end_dead_loop(&mut self, kind: LoopKind) -> Result<bool, Fault> {
        let here = self.labels.block_at(self.pc);
        let Ok(ctx) = self.loops.top() else {
            return Ok(false);
        };
        if here != Some(ctx.end) {
            return Ok(false);
        }
        let ctx = self.loops.pop()?;
        if ctx.kind != kind {
            return Err(Fault::unbalanced(
                "loop",
                format!("{:?} loop closed as {:?}", ctx.kind, kind),
            ));
        }
        self.truncate_brackets(ctx.open);
        Ok(true)
    }
}
