//! Compilation errors
//!
//! Every failure is fatal to the unit being compiled. [`Fault`] says what went
//! wrong, [`CompileError`] adds where.

use std::fmt;

use sable_bytecode::{BytecodeError, Label};
use thiserror::Error;

use crate::ir::BlockId;

/// Broad class of a compilation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The bytecode is inconsistent or truncated
    Malformed,
    /// Valid bytecode using a construct this compiler does not handle
    Unsupported,
}

/// What went wrong
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    /// Pop from an empty virtual stack
    #[error("stack underflow")]
    StackUnderflow,

    /// Pop from an empty protocol stack
    #[error("{0} stack underflow")]
    ProtocolUnderflow(&'static str),

    /// Edges into a block disagree on the stack shape
    #[error("stack/phi mismatch entering {block}: expected [{expected}], got [{actual}]")]
    PhiMismatch {
        /// Merge block
        block: BlockId,
        /// Shape established by the first edge
        expected: String,
        /// Shape of the offending edge
        actual: String,
    },

    /// A protocol bracket was left open or closed by the wrong instruction
    #[error("unbalanced {bracket} bracket: {detail}")]
    Unbalanced {
        /// Protocol name
        bracket: &'static str,
        /// What was found
        detail: String,
    },

    /// End of a complex assignment does not match its start
    #[error("complex-assign stack mismatch: {0}")]
    AssignMismatch(String),

    /// A closing dispatch instruction is not followed by its after block
    #[error("expected to be immediately before the after block {0}")]
    NotBeforeAfterBlock(BlockId),

    /// Label that does not name an instruction
    #[error("label {label} targets a non-existent block (offset {offset:?})")]
    BadLabel {
        /// Label id
        label: Label,
        /// Bound offset, if any
        offset: Option<u32>,
    },

    /// Constant operand of the wrong kind or out of range
    #[error("bad constant operand: {0}")]
    Constant(#[from] BytecodeError),

    /// Any other inconsistency in the bytecode
    #[error("{0}")]
    Invalid(String),

    /// Construct this compiler does not handle
    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

impl Fault {
    /// Classify the fault
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported(_) => ErrorKind::Unsupported,
            _ => ErrorKind::Malformed,
        }
    }

    /// Create an invalid-bytecode fault
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Create an unsupported-construct fault
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an unbalanced-bracket fault
    pub fn unbalanced(bracket: &'static str, detail: impl Into<String>) -> Self {
        Self::Unbalanced {
            bracket,
            detail: detail.into(),
        }
    }
}

/// Position of the compiler when a fault was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Bytecode offset
    pub pc: usize,
    /// Block under construction
    pub block: BlockId,
    /// Index of the next statement in that block
    pub stmt: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at bytecode instruction {}, while building block {} statement {}",
            self.pc, self.block, self.stmt
        )
    }
}

/// A located compilation failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}: {fault}")]
pub struct CompileError {
    /// Where the compiler was
    pub location: Location,
    /// What went wrong
    pub fault: Fault,
}

impl CompileError {
    /// Classify the error
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.fault.kind()
    }

    /// Is this an unsupported-construct error
    #[inline]
    pub fn is_unsupported(&self) -> bool {
        self.kind() == ErrorKind::Unsupported
    }
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
