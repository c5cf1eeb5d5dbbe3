//! Compile-time protocol stacks.
//!
//! Bytecode brackets several constructs between an opening and a closing
//! instruction (loops, calls, complex assignments, dispatched accessors). Each
//! kind of bracket has its own stack of pending entries. Brackets nest
//! strictly, so only the top entry is ever examined.

use sable_bytecode::AstIndex;

use crate::error::Fault;
use crate::ir::{BlockId, ValueId};

/// Named LIFO of pending protocol entries
#[derive(Debug, Clone)]
pub struct ProtocolStack<T> {
    name: &'static str,
    items: Vec<T>,
}

impl<T> ProtocolStack<T> {
    /// Create an empty stack; `name` appears in underflow errors
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Vec::new(),
        }
    }

    /// Stack name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Open an entry
    #[inline]
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Close the top entry
    pub fn pop(&mut self) -> Result<T, Fault> {
        self.items.pop().ok_or(Fault::ProtocolUnderflow(self.name))
    }

    /// Innermost entry
    pub fn top(&self) -> Result<&T, Fault> {
        self.items.last().ok_or(Fault::ProtocolUnderflow(self.name))
    }

    /// Innermost entry, mutable
    pub fn top_mut(&mut self) -> Result<&mut T, Fault> {
        self.items
            .last_mut()
            .ok_or(Fault::ProtocolUnderflow(self.name))
    }

    /// Number of open entries
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Are there no open entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop entries above the first `len`, returning how many were dropped
    pub fn truncate(&mut self, len: usize) -> usize {
        let dropped = self.items.len().saturating_sub(len);
        self.items.truncate(len);
        dropped
    }
}

/// Open calls, complex assignments and dispatches along one edge
///
/// Jumping out of an argument or index (`break`, `return`) leaves its
/// bracket open on the jumping edge while the closing instruction becomes
/// dead code. Merge blocks keep the fewest open entries seen on any edge into
/// them; entering one out of dead code cuts the stacks back to that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenDepths {
    /// Pending calls
    pub calls: usize,
    /// Open complex assignments
    pub assigns: usize,
    /// Open dispatches
    pub dispatches: usize,
}

impl OpenDepths {
    /// Element-wise minimum
    pub fn min(self, other: Self) -> Self {
        Self {
            calls: self.calls.min(other.calls),
            assigns: self.assigns.min(other.assigns),
            dispatches: self.dispatches.min(other.dispatches),
        }
    }
}

// ==================== Loops ====================

/// Kind of an open loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `while` or `repeat`
    WhileOrRepeat,
    /// `for`
    For,
}

/// An open loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopContext {
    /// Loop kind
    pub kind: LoopKind,
    /// Target of `next`: the loop head, or the step block of a `for`
    pub next: BlockId,
    /// Target of `break`
    pub end: BlockId,
    /// Brackets open outside the loop
    pub open: OpenDepths,
}

// ==================== Calls ====================

/// Function being called
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// Function value computed at run time
    Dynamic(ValueId),
    /// Builtin known by name
    Builtin(String),
}

/// Argument payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue {
    /// Evaluated value or promise
    Value(ValueId),
    /// Explicitly missing argument
    Missing,
    /// `...` expansion
    Dots,
}

/// One argument of a pending call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallArg {
    /// Payload
    pub value: ArgValue,
    /// Tag, if the argument is named
    pub name: Option<String>,
}

/// A call whose arguments are being assembled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    /// Callee
    pub callee: Callee,
    /// Arguments in order
    pub args: Vec<CallArg>,
}

impl PendingCall {
    /// Begin a call with no arguments
    pub fn new(callee: Callee) -> Self {
        Self {
            callee,
            args: Vec::new(),
        }
    }

    /// Append an unnamed argument
    pub fn add_arg(&mut self, value: ValueId) {
        self.push(ArgValue::Value(value), None);
    }

    /// Append a named argument
    pub fn add_named_arg(&mut self, value: ValueId, name: impl Into<String>) {
        self.push(ArgValue::Value(value), Some(name.into()));
    }

    /// Append a missing argument
    pub fn add_missing_arg(&mut self) {
        self.push(ArgValue::Missing, None);
    }

    /// Append a `...` expansion
    pub fn add_varargs_expansion(&mut self) {
        self.push(ArgValue::Dots, None);
    }

    /// Name the most recently added argument
    pub fn set_last_arg_name(&mut self, name: impl Into<String>) -> Result<(), Fault> {
        let last = self
            .args
            .last_mut()
            .ok_or_else(|| Fault::invalid("argument tag with no argument to name"))?;
        last.name = Some(name.into());
        Ok(())
    }

    /// Insert an unnamed argument in front of the others
    pub fn prepend_arg(&mut self, value: ValueId) {
        self.args.insert(
            0,
            CallArg {
                value: ArgValue::Value(value),
                name: None,
            },
        );
    }

    /// Does any argument carry a name
    pub fn has_names(&self) -> bool {
        self.args.iter().any(|a| a.name.is_some())
    }

    /// Does any argument expand `...`
    pub fn has_dots(&self) -> bool {
        self.args.iter().any(|a| a.value == ArgValue::Dots)
    }

    fn push(&mut self, value: ArgValue, name: Option<String>) {
        self.args.push(CallArg { value, name });
    }
}

// ==================== Dispatch ====================

/// Accessor bracketed by a generic-dispatch pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// `x[...]`
    Subset,
    /// `x[[...]]`
    Subset2,
    /// `x[...] <- v`
    Subassign,
    /// `x[[...]] <- v`
    Subassign2,
    /// `c(...)`
    C,
    /// `x[...]`, indices on the stack
    SubsetN,
    /// `x[[...]]`, indices on the stack
    Subset2N,
    /// `x[...] <- v`, indices on the stack
    SubassignN,
    /// `x[[...]] <- v`, indices on the stack
    Subassign2N,
}

impl DispatchKind {
    /// Builtin implementing the accessor
    pub const fn builtin(self) -> &'static str {
        match self {
            Self::Subset | Self::SubsetN => "[",
            Self::Subset2 | Self::Subset2N => "[[",
            Self::Subassign | Self::SubassignN => "[<-",
            Self::Subassign2 | Self::Subassign2N => "[[<-",
            Self::C => "c",
        }
    }

    /// Does the accessor write (and so carry a right-hand side)
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::Subassign | Self::Subassign2 | Self::SubassignN | Self::Subassign2N
        )
    }

    /// Are indices passed on the stack instead of as call arguments
    pub const fn is_nary(self) -> bool {
        matches!(
            self,
            Self::SubsetN | Self::Subset2N | Self::SubassignN | Self::Subassign2N
        )
    }

    /// `[[` family
    pub const fn is_double(self) -> bool {
        matches!(
            self,
            Self::Subset2 | Self::Subassign2 | Self::Subset2N | Self::Subassign2N
        )
    }
}

/// An open generic-dispatch bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDispatch {
    /// Accessor
    pub kind: DispatchKind,
    /// Call site
    pub call: AstIndex,
    /// Block where the fast and slow paths rejoin
    pub after: BlockId,
    /// Right-hand side of a write
    pub rhs: Option<ValueId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underflow_names_the_stack() {
        let mut calls: ProtocolStack<PendingCall> = ProtocolStack::new("call");
        assert_eq!(calls.pop().unwrap_err(), Fault::ProtocolUnderflow("call"));
        assert_eq!(calls.pop().unwrap_err().to_string(), "call stack underflow");
        assert!(calls.top().is_err());
    }

    #[test]
    fn test_truncate_drops_inner_entries() {
        let mut calls = ProtocolStack::new("call");
        for i in 0..3 {
            calls.push(PendingCall::new(Callee::Dynamic(ValueId(i))));
        }
        assert_eq!(calls.truncate(1), 2);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls.top().unwrap().callee, Callee::Dynamic(ValueId(0)));
        assert_eq!(calls.truncate(4), 0);
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_open_depths_min_is_per_stack() {
        let a = OpenDepths {
            calls: 2,
            assigns: 0,
            dispatches: 1,
        };
        let b = OpenDepths {
            calls: 1,
            assigns: 1,
            dispatches: 1,
        };
        assert_eq!(
            a.min(b),
            OpenDepths {
                calls: 1,
                assigns: 0,
                dispatches: 1,
            }
        );
    }

    #[test]
    fn test_pending_call_arguments() {
        let mut call = PendingCall::new(Callee::Builtin("list".into()));
        call.add_arg(ValueId(1));
        call.set_last_arg_name("a").unwrap();
        call.add_missing_arg();
        call.add_varargs_expansion();
        call.prepend_arg(ValueId(0));

        assert_eq!(call.args.len(), 4);
        assert_eq!(call.args[0].value, ArgValue::Value(ValueId(0)));
        assert_eq!(call.args[1].name.as_deref(), Some("a"));
        assert!(call.has_names());
        assert!(call.has_dots());
    }

    #[test]
    fn test_tag_without_argument_is_rejected() {
        let mut call = PendingCall::new(Callee::Dynamic(ValueId(0)));
        assert!(call.set_last_arg_name("x").is_err());
    }

    #[test]
    fn test_dispatch_kinds() {
        assert_eq!(DispatchKind::Subassign2N.builtin(), "[[<-");
        assert!(DispatchKind::SubassignN.is_write());
        assert!(DispatchKind::SubassignN.is_nary());
        assert!(!DispatchKind::C.is_nary());
        assert!(DispatchKind::Subset2.is_double());
    }
}
