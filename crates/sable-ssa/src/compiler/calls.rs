//! Call assembly and complex assignment

use sable_bytecode::{AstIndex, ConstantIndex, Instruction, SymbolIndex};

use super::Compiler;
use crate::assign::PendingComplexAssign;
use crate::error::Fault;
use crate::ir::{CallSite, FunLookup, Literal, Op, Scope, ValueId};
use crate::protocol::{ArgValue, CallArg, Callee, PendingCall};

impl Compiler<'_> {
    /// Open a pending call. Named lookups emit a function load; `CheckFun`
    /// takes the function value from the stack.
    pub(super) fn begin_call(&mut self, instruction: &Instruction) -> Result<(), Fault> {
        let callee = match *instruction {
            Instruction::GetFun { symbol } => self.load_fun(symbol, FunLookup::Local)?,
            Instruction::GetGlobFun { symbol } => self.load_fun(symbol, FunLookup::Global)?,
            Instruction::GetSymFun { symbol } => self.load_fun(symbol, FunLookup::Symbol)?,
            Instruction::GetBuiltin { symbol } | Instruction::GetIntlBuiltin { symbol } => {
                Callee::Builtin(self.symbol(symbol)?)
            }
            Instruction::CheckFun => Callee::Dynamic(self.stack.pop()?),
            _ => {
                return Err(Fault::invalid(format!(
                    "{} does not begin a call",
                    instruction.name()
                )));
            }
        };
        self.calls.push(PendingCall::new(callee));
        Ok(())
    }

    fn load_fun(&mut self, symbol: SymbolIndex, lookup: FunLookup) -> Result<Callee, Fault> {
        let name = self.symbol(symbol)?;
        Ok(Callee::Dynamic(self.builder.emit(Op::LdFun { name, lookup })))
    }

    /// `MakeProm`: add a promise over a nested unit as the next argument
    pub(super) fn make_promise(&mut self, code: ConstantIndex) -> Result<(), Fault> {
        self.pool.code(code)?;
        self.calls.top()?;
        let promise = self.builder.emit(Op::MkPromise { code });
        self.calls.top_mut()?.add_arg(promise);
        Ok(())
    }

    pub(super) fn push_literal_arg(&mut self, literal: Literal) -> Result<(), Fault> {
        self.calls.top()?;
        let value = self.builder.emit(Op::Const(literal));
        self.calls.top_mut()?.add_arg(value);
        Ok(())
    }

    /// Emit a finished call. Builtins are called positionally since they
    /// ignore argument names; function values get the named variant when any
    /// argument carries a name.
    pub(super) fn finish_call(&mut self, pending: PendingCall, call: CallSite) -> ValueId {
        let (args, names) = self.materialize_args(pending.args);
        match pending.callee {
            Callee::Builtin(builtin) => self.builder.emit(Op::CallBuiltin {
                builtin,
                args,
                call,
            }),
            Callee::Dynamic(callee) if names.iter().any(Option::is_some) => {
                self.builder.emit(Op::NamedCall {
                    callee,
                    args,
                    names,
                    call,
                })
            }
            Callee::Dynamic(callee) => self.builder.emit(Op::Call { callee, args, call }),
        }
    }

    /// Turn argument records into values, emitting markers for missing
    /// arguments and `...`
    pub(super) fn materialize_args(
        &mut self,
        args: Vec<CallArg>,
    ) -> (Vec<ValueId>, Vec<Option<String>>) {
        args.into_iter()
            .map(|arg| (self.arg_value(arg.value), arg.name))
            .unzip()
    }

    pub(super) fn arg_value(&mut self, value: ArgValue) -> ValueId {
        match value {
            ArgValue::Value(value) => value,
            ArgValue::Missing => self.builder.emit(Op::MissingArg),
            ArgValue::Dots => self.builder.emit(Op::ExpandDots),
        }
    }

    // ==================== Complex assignment ====================

    /// `StartAssign`: `[v] -> [v, x, v]` where `x` is the current value of
    /// the target variable
    pub(super) fn start_assign(
        &mut self,
        symbol: SymbolIndex,
        call: AstIndex,
        scope: Scope,
    ) -> Result<(), Fault> {
        let name = self.symbol(symbol)?;
        let rhs = self.stack.peek()?;
        let pending = PendingComplexAssign::new(scope, &name, self.pool.ast(call)?)?;
        let target = self.builder.emit(Op::LdVar {
            name,
            scope,
            missing_ok: false,
        });
        self.stack.push(target);
        self.stack.push(rhs);
        self.assigns.push(pending);
        Ok(())
    }

    /// `GetterCall`: `[x] -> [f(x, ...)]`
    pub(super) fn getter_call(&mut self, layer: u32) -> Result<(), Fault> {
        let site = self.assigns.top_mut()?.getter(layer)?;
        let x = self.stack.pop()?;
        let mut pending = self.calls.pop()?;
        pending.prepend_arg(x);
        let result = self.finish_call(pending, site);
        self.stack.push(result);
        Ok(())
    }

    /// `SetterCall`: `[x, value] -> [f<-(x, ..., value = value)]`
    pub(super) fn setter_call(&mut self, layer: u32) -> Result<(), Fault> {
        let site = self.assigns.top_mut()?.setter(layer)?;
        let value = self.stack.pop()?;
        let x = self.stack.pop()?;
        let mut pending = self.calls.pop()?;
        pending.prepend_arg(x);
        pending.add_named_arg(value, "value");
        let result = self.finish_call(pending, site);
        self.stack.push(result);
        Ok(())
    }

    /// `EndAssign`: store the new target value, leaving the right-hand side
    /// as the value of the expression
    pub(super) fn end_assign(&mut self, symbol: SymbolIndex, scope: Scope) -> Result<(), Fault> {
        let name = self.symbol(symbol)?;
        let pending = self.assigns.pop()?;
        if pending.name != name || pending.scope != scope {
            return Err(Fault::AssignMismatch(format!(
                "closing {:?} assignment to `{}` while {:?} assignment to `{}` is open",
                scope, name, pending.scope, pending.name
            )));
        }
        let value = self.stack.pop()?;
        self.builder.emit(Op::StVar { name, scope, value });
        Ok(())
    }
}
