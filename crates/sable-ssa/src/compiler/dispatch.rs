//! Generic dispatch for `[`, `[[`, their assignment forms and `c`.
//!
//! ```text
//!              plain = isplain(target)
//!              branch plain ? fast : slow
//!               /                      \
//!         fast: indices...         slow: r = generic(target[, rhs])
//!               r = extract/call         goto after
//!               goto after                 /
//!                         \               /
//!                      after: phi per stack slot
//! ```
//!
//! The slow path leaves the generic result in the target's stack slot, so
//! both paths reach `after` with the same depth.

use sable_bytecode::{AstIndex, Instruction, Label};

use super::Compiler;
use crate::error::Fault;
use crate::ir::{CallSite, Op, ValueId};
use crate::protocol::{Callee, DispatchKind, PendingCall, PendingDispatch};

fn opening_kind(instruction: &Instruction) -> Option<(DispatchKind, AstIndex, Label)> {
    use Instruction::*;

    let (kind, call, after) = match *instruction {
        StartSubset { call, after } => (DispatchKind::Subset, call, after),
        StartSubset2 { call, after } => (DispatchKind::Subset2, call, after),
        StartSubassign { call, after } => (DispatchKind::Subassign, call, after),
        StartSubassign2 { call, after } => (DispatchKind::Subassign2, call, after),
        StartC { call, after } => (DispatchKind::C, call, after),
        StartSubsetN { call, after } => (DispatchKind::SubsetN, call, after),
        StartSubset2N { call, after } => (DispatchKind::Subset2N, call, after),
        StartSubassignN { call, after } => (DispatchKind::SubassignN, call, after),
        StartSubassign2N { call, after } => (DispatchKind::Subassign2N, call, after),
        _ => return None,
    };
    Some((kind, call, after))
}

fn closing_kind(instruction: &Instruction) -> Option<DispatchKind> {
    use Instruction::*;

    Some(match instruction {
        DfltSubset => DispatchKind::Subset,
        DfltSubset2 => DispatchKind::Subset2,
        DfltSubassign => DispatchKind::Subassign,
        DfltSubassign2 => DispatchKind::Subassign2,
        DfltC => DispatchKind::C,
        DfltSubsetN { .. } => DispatchKind::SubsetN,
        DfltSubset2N { .. } => DispatchKind::Subset2N,
        DfltSubassignN { .. } => DispatchKind::SubassignN,
        DfltSubassign2N { .. } => DispatchKind::Subassign2N,
        _ => return None,
    })
}

impl Compiler<'_> {
    /// Opening `Start*`: split into the fast and slow paths and continue in
    /// the fast one
    pub(super) fn start_dispatch(&mut self, instruction: &Instruction) -> Result<(), Fault> {
        let (kind, call, after) = opening_kind(instruction).ok_or_else(|| {
            Fault::invalid(format!("{} does not open a dispatch", instruction.name()))
        })?;
        self.pool.ast(call)?;
        let after = self.labels.block(after)?;

        let rhs = if kind.is_write() {
            Some(self.stack.pop()?)
        } else {
            None
        };
        let target = self.stack.peek()?;
        let plain = self.builder.emit(Op::IsPlain { arg: target });
        let fast = self.builder.new_direct_block();
        let slow = self.builder.new_direct_block();
        self.branch(plain, fast, slow)?;

        self.enter(slow)?;
        let args = std::iter::once(target).chain(rhs).collect();
        let result = self.builder.emit(Op::CallBuiltin {
            builtin: kind.builtin().to_owned(),
            args,
            call: CallSite::Pool(call),
        });
        let saved = self.stack.replace_top(result)?;
        self.jump(after)?;
        self.stack.replace_top(saved)?;

        self.enter(fast)?;
        if !kind.is_nary() {
            let mut pending = PendingCall::new(Callee::Builtin(kind.builtin().to_owned()));
            pending.add_arg(target);
            self.calls.push(pending);
        }
        self.dispatches.push(PendingDispatch {
            kind,
            call,
            after,
            rhs,
        });
        Ok(())
    }

    /// Closing `Dflt*`: emit the default operation, then continue in the
    /// after block, which must start at the next instruction
    pub(super) fn finish_dispatch(
        &mut self,
        instruction: &Instruction,
        n: Option<u32>,
    ) -> Result<(), Fault> {
        let kind = closing_kind(instruction).ok_or_else(|| {
            Fault::invalid(format!("{} does not close a dispatch", instruction.name()))
        })?;
        let open = self.dispatches.pop().map_err(|_| {
            Fault::unbalanced(
                "dispatch",
                format!("{} with no open dispatch", instruction.name()),
            )
        })?;
        if open.kind != kind {
            return Err(Fault::unbalanced(
                "dispatch",
                format!("{} closes {:?}", instruction.name(), open.kind),
            ));
        }

        let site = CallSite::Pool(open.call);
        let result = match n {
            None => {
                let pending = self.calls.pop()?;
                let target = self.stack.pop()?;
                self.default_from_call(kind, pending, target, open.rhs, site)
            }
            Some(n) => {
                let indices = self.stack.pop_n(n as usize)?;
                let target = self.stack.pop()?;
                self.default_from_stack(kind, target, indices, open.rhs, site)
            }
        };
        self.stack.push(result);

        if self.labels.block_at(self.pc + 1) != Some(open.after) {
            return Err(Fault::NotBeforeAfterBlock(open.after));
        }
        self.jump(open.after)?;
        self.enter(open.after)
    }

    /// Indices were assembled as call arguments after the target
    fn default_from_call(
        &mut self,
        kind: DispatchKind,
        mut pending: PendingCall,
        target: ValueId,
        rhs: Option<ValueId>,
        call: CallSite,
    ) -> ValueId {
        let simple = !pending.has_names() && !pending.has_dots();
        let index_count = pending.args.len().saturating_sub(1);

        if kind == DispatchKind::C && simple {
            return self.finish_call(pending, call);
        }
        if kind != DispatchKind::C && simple && (1..=3).contains(&index_count) {
            let indices = pending
                .args
                .split_off(1)
                .into_iter()
                .map(|arg| self.arg_value(arg.value))
                .collect();
            return self.access(kind, target, indices, rhs, call);
        }

        if let Some(rhs) = rhs {
            pending.add_named_arg(rhs, "value");
        }
        let callee = self.builder.emit(Op::LdBuiltin {
            name: kind.builtin().to_owned(),
        });
        let (args, names) = self.materialize_args(pending.args);
        self.builder.emit(Op::NamedCall {
            callee,
            args,
            names,
            call,
        })
    }

    /// Indices were left on the stack above the target
    fn default_from_stack(
        &mut self,
        kind: DispatchKind,
        target: ValueId,
        indices: Vec<ValueId>,
        rhs: Option<ValueId>,
        call: CallSite,
    ) -> ValueId {
        if (1..=3).contains(&indices.len()) {
            return self.access(kind, target, indices, rhs, call);
        }
        let args = std::iter::once(target).chain(indices).chain(rhs).collect();
        self.builder.emit(Op::CallBuiltin {
            builtin: kind.builtin().to_owned(),
            args,
            call,
        })
    }

    fn access(
        &mut self,
        kind: DispatchKind,
        target: ValueId,
        indices: Vec<ValueId>,
        rhs: Option<ValueId>,
        call: CallSite,
    ) -> ValueId {
        let double = kind.is_double();
        match rhs {
            Some(value) => self.builder.emit(Op::Subassign {
                double,
                target,
                indices,
                value,
                call,
            }),
            None => self.builder.emit(Op::Extract {
                double,
                target,
                indices,
                call,
            }),
        }
    }
}
