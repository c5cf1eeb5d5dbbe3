//! AST descriptors stored in the constant pool.
//!
//! The compiler never evaluates these; they are call-site descriptors attached
//! to emitted calls and the place expressions walked by complex assignment.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::operand::ConstantIndex;

/// Synthetic symbol standing in for the sub-target of an assignment layer
pub const TMP_SYMBOL: &str = "*tmp*";

/// Synthetic symbol standing in for the value produced by the previous layer
pub const VTMP_SYMBOL: &str = "*vtmp*";

/// A source expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ast {
    /// Variable reference
    Symbol(String),
    /// Literal, by reference into the pool
    Const(ConstantIndex),
    /// Function application `fun(args...)`
    Call {
        /// Callee expression
        fun: Box<Ast>,
        /// Arguments in source order
        args: Vec<AstArg>,
    },
}

/// One (optionally named) call argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstArg {
    /// Argument tag (`name = value`)
    pub name: Option<String>,
    /// Argument expression
    pub value: Ast,
}

impl AstArg {
    /// Positional argument
    pub fn positional(value: Ast) -> Self {
        Self { name: None, value }
    }

    /// Named argument
    pub fn named(name: impl Into<String>, value: Ast) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

impl Ast {
    /// Symbol node
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Call node with a symbol callee and positional arguments
    pub fn call(fun: impl Into<String>, args: impl IntoIterator<Item = Ast>) -> Self {
        Self::Call {
            fun: Box::new(Self::symbol(fun)),
            args: args.into_iter().map(AstArg::positional).collect(),
        }
    }

    /// Call node with explicit argument records
    pub fn call_with(fun: impl Into<String>, args: Vec<AstArg>) -> Self {
        Self::Call {
            fun: Box::new(Self::symbol(fun)),
            args,
        }
    }

    /// `*tmp*`
    pub fn tmp() -> Self {
        Self::symbol(TMP_SYMBOL)
    }

    /// `*vtmp*`
    pub fn vtmp() -> Self {
        Self::symbol(VTMP_SYMBOL)
    }

    /// Symbol name, if this is a symbol
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Callee name, if this is a call whose callee is a symbol
    pub fn fun_name(&self) -> Option<&str> {
        match self {
            Self::Call { fun, .. } => fun.as_symbol(),
            _ => None,
        }
    }

    /// Call arguments (empty for non-calls)
    pub fn args(&self) -> &[AstArg] {
        match self {
            Self::Call { args, .. } => args,
            _ => &[],
        }
    }

    /// Is this a call node
    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. })
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(name) => f.write_str(name),
            Self::Const(idx) => write!(f, "#{}", idx.index()),
            Self::Call { fun, args } => {
                write!(f, "{}(", fun)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(name) = &arg.name {
                        write!(f, "{} = ", name)?;
                    }
                    write!(f, "{}", arg.value)?;
                }
                f.write_str(")")
            }
        }
    }
}
