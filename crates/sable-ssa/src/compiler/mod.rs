//! Bytecode to SSA translation.
//!
//! A single forward pass over the instructions. The virtual stack holds the
//! SSA value of every operand slot; control-flow instructions terminate the
//! current block and wire phi inputs into their targets. After a diverting
//! instruction the pass is *unreachable* until it reaches a block that some
//! live edge has already targeted; instructions in between are dead and are
//! skipped.

mod calls;
mod control;
mod dispatch;
mod loops;

use rustc_hash::FxHashMap;
use sable_bytecode::{AstIndex, CodeUnit, ConstantPool, Instruction, SymbolIndex};

use crate::assign::PendingComplexAssign;
use crate::builder::Builder;
use crate::error::{CompileError, CompileResult, Fault, Location};
use crate::ir::{
    BinaryOp, BlockId, CallSite, Cfg, Literal, Op, Scope, Terminator, TypeTest, UnaryOp, ValueId,
};
use crate::labels::LabelMap;
use crate::options::CompileOptions;
use crate::protocol::{
    LoopContext, LoopKind, OpenDepths, PendingCall, PendingDispatch, ProtocolStack,
};
use crate::stack::VirtualStack;

/// Translation state for one unit
pub(crate) struct Compiler<'a> {
    unit: &'a CodeUnit,
    pool: &'a ConstantPool,
    options: CompileOptions,
    builder: Builder,
    labels: LabelMap,
    stack: VirtualStack,
    loops: ProtocolStack<LoopContext>,
    calls: ProtocolStack<PendingCall>,
    assigns: ProtocolStack<PendingComplexAssign>,
    dispatches: ProtocolStack<PendingDispatch>,
    /// Fewest open brackets along any edge into a block
    edge_depths: FxHashMap<BlockId, OpenDepths>,
    /// Is the current block reachable and still open
    live: bool,
    pc: usize,
}

impl<'a> Compiler<'a> {
    /// Create a compiler for `unit`, resolving its labels
    pub(crate) fn new(
        unit: &'a CodeUnit,
        pool: &'a ConstantPool,
        options: CompileOptions,
    ) -> CompileResult<Self> {
        let mut builder = Builder::new(unit.display_name());
        let labels = match LabelMap::resolve(unit, pool, &mut builder) {
            Ok(labels) => labels,
            Err((pc, fault)) => {
                return Err(CompileError {
                    location: Location {
                        pc,
                        block: builder.cursor(),
                        stmt: 0,
                    },
                    fault,
                });
            }
        };

        Ok(Self {
            unit,
            pool,
            options,
            builder,
            labels,
            stack: VirtualStack::new(),
            loops: ProtocolStack::new("loop-context"),
            calls: ProtocolStack::new("call"),
            assigns: ProtocolStack::new("complex-assign"),
            dispatches: ProtocolStack::new("dispatch"),
            edge_depths: FxHashMap::default(),
            live: true,
            pc: 0,
        })
    }

    /// Translate the whole unit
    pub(crate) fn compile(mut self) -> CompileResult<Cfg> {
        let unit = self.unit;
        tracing::debug!(
            target: "sable::ssa",
            unit = unit.display_name(),
            kind = ?self.options.unit_kind,
            instructions = unit.len(),
            "compiling unit"
        );

        for (pc, instruction) in unit.instructions.iter().enumerate() {
            self.pc = pc;
            self.at_offset(pc).map_err(|fault| self.locate(fault))?;
            if !self.live {
                let closed = match instruction {
                    Instruction::EndLoopCntxt => self.end_dead_loop(LoopKind::WhileOrRepeat),
                    Instruction::EndFor => self.end_dead_loop(LoopKind::For),
                    _ => Ok(false),
                }
                .map_err(|fault| self.locate(fault))?;
                tracing::trace!(
                    target: "sable::ssa",
                    pc,
                    op = instruction.name(),
                    closed,
                    "unreachable"
                );
                continue;
            }
            tracing::trace!(
                target: "sable::ssa",
                pc,
                op = instruction.name(),
                depth = self.stack.depth(),
                "translate"
            );
            self.translate(instruction)
                .map_err(|fault| self.locate(fault))?;
            if instruction.diverts() {
                self.live = false;
            }
        }

        self.pc = unit.len();
        self.check_complete().map_err(|fault| self.locate(fault))?;

        let mut cfg = self.builder.finish();
        crate::cleanup::run(&mut cfg, &self.options);
        tracing::debug!(
            target: "sable::ssa",
            unit = unit.display_name(),
            blocks = cfg.block_count(),
            "compiled unit"
        );
        Ok(cfg)
    }

    fn locate(&self, fault: Fault) -> CompileError {
        CompileError {
            location: Location {
                pc: self.pc,
                block: self.builder.cursor(),
                stmt: self.builder.stmt_index(),
            },
            fault,
        }
    }

    /// Handle a label at `pc`: fall through from a live block, then enter
    /// the target if any live edge reaches it
    fn at_offset(&mut self, pc: usize) -> Result<(), Fault> {
        let Some(block) = self.labels.block_at(pc) else {
            return Ok(());
        };
        if self.builder.cursor() == block {
            return Ok(());
        }
        let falls_through = self.live;
        if falls_through {
            self.jump(block)?;
        }
        match self.builder.shape(block) {
            Some(shape) => {
                self.stack.reset(shape);
                self.builder.move_to(block);
                self.live = true;
            }
            None => self.live = false,
        }
        if self.live && !falls_through {
            self.close_dead_brackets(block);
        }
        Ok(())
    }

    fn open_depths(&self) -> OpenDepths {
        OpenDepths {
            calls: self.calls.len(),
            assigns: self.assigns.len(),
            dispatches: self.dispatches.len(),
        }
    }

    /// Entering `block` out of dead code: drop brackets whose closing
    /// instruction was skipped, keeping those open along every edge into it
    fn close_dead_brackets(&mut self, block: BlockId) {
        if let Some(depths) = self.edge_depths.get(&block).copied() {
            self.truncate_brackets(depths);
        }
    }

    fn truncate_brackets(&mut self, depths: OpenDepths) {
        let dropped = self.calls.truncate(depths.calls)
            + self.assigns.truncate(depths.assigns)
            + self.dispatches.truncate(depths.dispatches);
        if dropped > 0 {
            tracing::trace!(target: "sable::ssa", pc = self.pc, dropped, "closed dead brackets");
        }
    }

    fn check_complete(&self) -> Result<(), Fault> {
        let open = [
            (self.loops.name(), self.loops.len()),
            (self.calls.name(), self.calls.len()),
            (self.assigns.name(), self.assigns.len()),
            (self.dispatches.name(), self.dispatches.len()),
        ];
        if let Some((bracket, n)) = open.into_iter().find(|(_, n)| *n > 0) {
            return Err(Fault::unbalanced(
                bracket,
                format!("{} still open at end of code", n),
            ));
        }
        if self.live {
            return Err(Fault::invalid("control falls off the end of code"));
        }

        let cfg = self.builder.cfg();
        if let Some(bb) = cfg
            .blocks()
            .find(|bb| !bb.preds.is_empty() && bb.terminator.is_none())
        {
            return Err(Fault::invalid(format!(
                "{} is jumped to but its code is unreachable in bytecode order",
                bb.id
            )));
        }
        Ok(())
    }

    // ==================== Helpers ====================

    fn symbol(&self, symbol: SymbolIndex) -> Result<String, Fault> {
        Ok(self.pool.symbol(symbol)?.to_owned())
    }

    fn site(&self, call: AstIndex) -> Result<CallSite, Fault> {
        self.pool.ast(call)?;
        Ok(CallSite::Pool(call))
    }

    fn push_op(&mut self, op: Op) -> ValueId {
        let value = self.builder.emit(op);
        self.stack.push(value);
        value
    }

    /// Record the brackets open along an edge into `target`
    fn note_edge(&mut self, target: BlockId) {
        let depths = self.open_depths();
        self.edge_depths
            .entry(target)
            .and_modify(|seen| *seen = seen.min(depths))
            .or_insert(depths);
    }

    /// Unconditional jump carrying the current stack
    fn jump(&mut self, target: BlockId) -> Result<(), Fault> {
        self.note_edge(target);
        self.builder
            .terminate(Terminator::Goto(target), self.stack.as_slice())
    }

    /// Two-way branch carrying the current stack on both edges
    fn branch(&mut self, cond: ValueId, then: BlockId, otherwise: BlockId) -> Result<(), Fault> {
        self.note_edge(then);
        self.note_edge(otherwise);
        self.builder.terminate(
            Terminator::Branch {
                cond,
                then,
                otherwise,
            },
            self.stack.as_slice(),
        )
    }

    /// Continue in `block`, reloading the stack from its phis when it is a
    /// merge block
    fn enter(&mut self, block: BlockId) -> Result<(), Fault> {
        if !self.builder.is_direct(block) {
            let shape = self
                .builder
                .shape(block)
                .ok_or_else(|| Fault::invalid(format!("{} entered before any edge", block)))?;
            self.stack.reset(shape);
        }
        self.builder.move_to(block);
        self.live = true;
        Ok(())
    }

    fn binary(&mut self, op: BinaryOp, call: AstIndex) -> Result<(), Fault> {
        let rhs = self.stack.pop()?;
        let lhs = self.stack.pop()?;
        let call = self.site(call)?;
        self.push_op(Op::Binary { op, lhs, rhs, call });
        Ok(())
    }

    fn unary(&mut self, op: UnaryOp, call: AstIndex) -> Result<(), Fault> {
        let arg = self.stack.pop()?;
        let call = self.site(call)?;
        self.push_op(Op::Unary { op, arg, call });
        Ok(())
    }

    fn type_test(&mut self, test: TypeTest) -> Result<(), Fault> {
        let arg = self.stack.pop()?;
        self.push_op(Op::IsType { test, arg });
        Ok(())
    }

    fn load_var(&mut self, symbol: SymbolIndex, missing_ok: bool) -> Result<(), Fault> {
        let name = self.symbol(symbol)?;
        self.push_op(Op::LdVar {
            name,
            scope: Scope::Local,
            missing_ok,
        });
        Ok(())
    }

    fn store_var(&mut self, symbol: SymbolIndex, scope: Scope) -> Result<(), Fault> {
        let name = self.symbol(symbol)?;
        let value = self.stack.peek()?;
        self.builder.emit(Op::StVar { name, scope, value });
        Ok(())
    }

    // ==================== Dispatcher ====================

    fn translate(&mut self, instruction: &Instruction) -> Result<(), Fault> {
        use Instruction::*;

        match *instruction {
            // Constants
            LdConst { constant } => {
                self.pool.get(constant)?;
                self.push_op(Op::Const(Literal::Pool(constant)));
            }
            LdNull => {
                self.push_op(Op::Const(Literal::Null));
            }
            LdTrue => {
                self.push_op(Op::Const(Literal::True));
            }
            LdFalse => {
                self.push_op(Op::Const(Literal::False));
            }

            // Variables
            GetVar { symbol } => self.load_var(symbol, false)?,
            GetVarMissOk { symbol } => self.load_var(symbol, true)?,
            DdVal { symbol } | DdValMissOk { symbol } => {
                let name = self.symbol(symbol)?;
                let missing_ok = matches!(instruction, DdValMissOk { .. });
                self.push_op(Op::LdDdVal { name, missing_ok });
            }
            SetVar { symbol } => self.store_var(symbol, Scope::Local)?,
            SetVar2 { symbol } => self.store_var(symbol, Scope::Super)?,

            // Stack
            Pop => {
                self.stack.pop()?;
            }
            Dup => {
                let top = self.stack.peek()?;
                self.stack.push(top);
            }
            Dup2nd => {
                let second = self.stack.peek_nth(1)?;
                self.stack.push(second);
            }
            Swap => self.stack.swap()?,
            SetLoopVal => {
                self.stack.pop_n(2)?;
                self.push_op(Op::Const(Literal::Null));
            }
            Invisible => {
                self.builder.emit(Op::SetVisible(false));
            }
            Visible => {
                self.builder.emit(Op::SetVisible(true));
            }

            // Control flow
            Goto { label } => {
                let target = self.labels.block(label)?;
                self.jump(target)?;
            }
            BrIfNot { call, label } => self.branch_if_not(call, label)?,
            Return => {
                let value = self.stack.pop()?;
                self.builder
                    .terminate(Terminator::Return(value), self.stack.as_slice())?;
            }
            ReturnJmp => {
                let value = self.stack.pop()?;
                self.builder
                    .terminate(Terminator::NonLocalReturn(value), self.stack.as_slice())?;
            }
            Switch {
                call,
                names,
                chr_labels,
                num_labels,
            } => self.switch(call, names, chr_labels, num_labels)?,
            And1st { call, label } => self.short_circuit_first(call, label, true)?,
            Or1st { call, label } => self.short_circuit_first(call, label, false)?,
            And2nd { call } => self.short_circuit_second(call, true)?,
            Or2nd { call } => self.short_circuit_second(call, false)?,

            // Loops
            StartLoopCntxt { end } => self.start_loop(end)?,
            EndLoopCntxt => self.end_loop(LoopKind::WhileOrRepeat)?,
            DoLoopNext => self.loop_jump(false)?,
            DoLoopBreak => self.loop_jump(true)?,
            StartFor { call, symbol, end } => self.start_for(call, symbol, end)?,
            StepFor => self.step_for()?,
            EndFor => self.end_loop(LoopKind::For)?,

            // Calls
            GetFun { .. }
            | GetGlobFun { .. }
            | GetSymFun { .. }
            | GetBuiltin { .. }
            | GetIntlBuiltin { .. }
            | CheckFun => self.begin_call(instruction)?,
            MakeProm { code } => self.make_promise(code)?,
            DoMissing => self.calls.top_mut()?.add_missing_arg(),
            DoDots => self.calls.top_mut()?.add_varargs_expansion(),
            SetTag { symbol } => {
                let name = self.symbol(symbol)?;
                self.calls.top_mut()?.set_last_arg_name(name)?;
            }
            PushArg => {
                let value = self.stack.pop()?;
                self.calls.top_mut()?.add_arg(value);
            }
            PushConstArg { constant } => {
                self.pool.get(constant)?;
                self.push_literal_arg(Literal::Pool(constant))?;
            }
            PushNullArg => self.push_literal_arg(Literal::Null)?,
            PushTrueArg => self.push_literal_arg(Literal::True)?,
            PushFalseArg => self.push_literal_arg(Literal::False)?,
            Call { call } | CallBuiltin { call } => {
                let pending = self.calls.pop()?;
                let site = self.site(call)?;
                let result = self.finish_call(pending, site);
                self.stack.push(result);
            }
            CallSpecial { call } => {
                let call = self.site(call)?;
                self.push_op(Op::CallSpecial { call });
            }
            MakeClosure { closure } => {
                self.pool.code(closure)?;
                self.push_op(Op::MkClosure { closure });
            }

            // Arithmetic
            Add { call } => self.binary(BinaryOp::Add, call)?,
            Sub { call } => self.binary(BinaryOp::Sub, call)?,
            Mul { call } => self.binary(BinaryOp::Mul, call)?,
            Div { call } => self.binary(BinaryOp::Div, call)?,
            Expt { call } => self.binary(BinaryOp::Expt, call)?,
            Colon { call } => self.binary(BinaryOp::Colon, call)?,
            LogBase { call } => self.binary(BinaryOp::LogBase, call)?,
            Sqrt { call } => self.unary(UnaryOp::Sqrt, call)?,
            Exp { call } => self.unary(UnaryOp::Exp, call)?,
            UMinus { call } => self.unary(UnaryOp::Minus, call)?,
            UPlus { call } => self.unary(UnaryOp::Plus, call)?,
            SeqAlong { call } => self.unary(UnaryOp::SeqAlong, call)?,
            SeqLen { call } => self.unary(UnaryOp::SeqLen, call)?,
            Log { call } => self.unary(UnaryOp::Log, call)?,
            Math1 { call, op } => self.unary(UnaryOp::Math1(op), call)?,

            // Comparison / logic
            Eq { call } => self.binary(BinaryOp::Eq, call)?,
            Ne { call } => self.binary(BinaryOp::Ne, call)?,
            Lt { call } => self.binary(BinaryOp::Lt, call)?,
            Le { call } => self.binary(BinaryOp::Le, call)?,
            Ge { call } => self.binary(BinaryOp::Ge, call)?,
            Gt { call } => self.binary(BinaryOp::Gt, call)?,
            And { call } => self.binary(BinaryOp::And, call)?,
            Or { call } => self.binary(BinaryOp::Or, call)?,
            Not { call } => self.unary(UnaryOp::Not, call)?,

            // Type tests
            IsNull => self.type_test(TypeTest::Null)?,
            IsLogical => self.type_test(TypeTest::Logical)?,
            IsInteger => self.type_test(TypeTest::Integer)?,
            IsDouble => self.type_test(TypeTest::Double)?,
            IsComplex => self.type_test(TypeTest::Complex)?,
            IsCharacter => self.type_test(TypeTest::Character)?,
            IsSymbol => self.type_test(TypeTest::Symbol)?,
            IsObject => self.type_test(TypeTest::Object)?,
            IsNumeric => self.type_test(TypeTest::Numeric)?,

            // Complex assignment
            StartAssign { symbol, call } => self.start_assign(symbol, call, Scope::Local)?,
            StartAssign2 { symbol, call } => self.start_assign(symbol, call, Scope::Super)?,
            EndAssign { symbol } => self.end_assign(symbol, Scope::Local)?,
            EndAssign2 { symbol } => self.end_assign(symbol, Scope::Super)?,
            GetterCall { layer } => self.getter_call(layer)?,
            SetterCall { layer } => self.setter_call(layer)?,

            // Generic dispatch
            StartSubset { .. }
            | StartSubset2 { .. }
            | StartSubassign { .. }
            | StartSubassign2 { .. }
            | StartC { .. }
            | StartSubsetN { .. }
            | StartSubset2N { .. }
            | StartSubassignN { .. }
            | StartSubassign2N { .. } => self.start_dispatch(instruction)?,
            DfltSubset | DfltSubset2 | DfltSubassign | DfltSubassign2 | DfltC => {
                self.finish_dispatch(instruction, None)?
            }
            DfltSubsetN { n }
            | DfltSubset2N { n }
            | DfltSubassignN { n }
            | DfltSubassign2N { n } => self.finish_dispatch(instruction, Some(n))?,
            Dollar { .. } | DollarGets { .. } | BaseGuard { .. } => {
                return Err(Fault::unsupported(format!(
                    "{} is not supported",
                    instruction.name()
                )));
            }

            // Reference-count hints carry no semantics here
            IncLnk | DecLnk | DecLnkN { .. } | IncLnkStk | DecLnkStk => {}
        }
        Ok(())
    }
}
